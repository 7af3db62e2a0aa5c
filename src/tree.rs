//! Branch navigation over a forest of messages linked by parent ids.
//!
//! Every message names its parent; a parent may have any number of children (regenerated
//! replies, edited prompts).  [`ConversationTree`] remembers, per parent, which child is
//! displayed.  The active path is a root followed by the selected child of each node in turn.
//!
//! Selections are created lazily: the first time a node's children are asked for, its first
//! child in arrival order is selected.  Because selections are keyed by parent, switching a
//! branch at one level leaves every other level's selection alone; descendants of a branch that
//! was shown before come back the way they were left.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use crate::observability::{
    TREE_DEFAULT_SELECTIONS, TREE_DUPLICATES, TREE_NAVIGATION_NOOPS, TREE_NAVIGATIONS,
};
use crate::types::{Message, MessageId};

/// The node whose children a selection chooses between.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParentKey {
    /// The virtual root above all top-level messages.
    Root,
    /// A message.
    Node(MessageId),
}

impl ParentKey {
    fn of(parent: Option<&str>) -> Self {
        match parent {
            Some(id) => ParentKey::Node(MessageId::new(id)),
            None => ParentKey::Root,
        }
    }

    fn parent_of(message: &Message) -> Self {
        match &message.parent_id {
            Some(id) => ParentKey::Node(id.clone()),
            None => ParentKey::Root,
        }
    }
}

/// Where a message sits among its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SiblingPosition {
    /// Zero-based index in arrival order.
    pub index: usize,
    /// Number of siblings, the message included.
    pub count: usize,
}

impl SiblingPosition {
    /// Returns true if there is a sibling before this one.
    pub fn has_previous(&self) -> bool {
        self.index > 0
    }

    /// Returns true if there is a sibling after this one.
    pub fn has_next(&self) -> bool {
        self.index + 1 < self.count
    }
}

impl fmt::Display for SiblingPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index + 1, self.count)
    }
}

/// Integrity problems found in the message records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeDiagnostics {
    /// Messages whose parent id names no message.
    pub orphaned: Vec<MessageId>,
    /// Messages that no root leads to: orphans, their descendants and parent cycles.
    pub unreachable: Vec<MessageId>,
    /// Ids that appeared more than once.  The first record with the id was kept.
    pub duplicates: Vec<MessageId>,
}

impl TreeDiagnostics {
    /// Returns true if no problems were found.
    pub fn is_clean(&self) -> bool {
        self.orphaned.is_empty() && self.unreachable.is_empty() && self.duplicates.is_empty()
    }
}

/// The message forest and the per-parent selections over it.
#[derive(Debug, Clone, Default)]
pub struct ConversationTree {
    messages: Vec<Message>,
    index: HashMap<MessageId, usize>,
    children: HashMap<ParentKey, Vec<MessageId>>,
    selections: HashMap<ParentKey, MessageId>,
    duplicates: Vec<MessageId>,
}

impl ConversationTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tree from message records in arrival order.
    pub fn from_messages(messages: impl IntoIterator<Item = Message>) -> Self {
        let mut tree = Self::new();
        for message in messages {
            tree.insert(message);
        }
        tree
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if there are no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns true if a message with `id` exists.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// The message with `id`.
    pub fn get(&self, id: &str) -> Option<&Message> {
        self.index.get(id).map(|&idx| &self.messages[idx])
    }

    /// All messages in arrival order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Top-level messages in arrival order.
    pub fn roots(&self) -> Vec<&Message> {
        self.children_of(None)
    }

    /// Messages whose parent is `parent` (top-level messages for `None`), in arrival order.
    pub fn children_of(&self, parent: Option<&str>) -> Vec<&Message> {
        self.child_ids(&ParentKey::of(parent))
            .iter()
            .filter_map(|id| self.get(id.as_str()))
            .collect()
    }

    fn child_ids(&self, key: &ParentKey) -> &[MessageId] {
        self.children.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The displayed child of `parent`, selecting the first child if none is selected yet.
    pub fn selected_child_of(&mut self, parent: Option<&str>) -> Option<&Message> {
        let id = self.resolve_selection(ParentKey::of(parent))?;
        self.get(id.as_str())
    }

    fn resolve_selection(&mut self, key: ParentKey) -> Option<MessageId> {
        let children = self.children.get(&key)?;
        if let Some(selected) = self.selections.get(&key)
            && children.contains(selected)
        {
            return Some(selected.clone());
        }
        let first = children.first()?.clone();
        TREE_DEFAULT_SELECTIONS.click();
        self.selections.insert(key, first.clone());
        Some(first)
    }

    /// The displayed top-level message.
    pub fn selected_root(&mut self) -> Option<&Message> {
        self.selected_child_of(None)
    }

    /// `root` followed by the selected child of each message in turn.
    ///
    /// Empty if `root` is unknown.  The path never visits a message twice.
    pub fn active_path(&mut self, root: &str) -> Vec<&Message> {
        let ids = self.active_path_ids(root);
        ids.iter().filter_map(|id| self.get(id.as_str())).collect()
    }

    /// The active path from the selected top-level message.
    pub fn active_path_from_selected_root(&mut self) -> Vec<&Message> {
        match self.resolve_selection(ParentKey::Root) {
            Some(root) => self.active_path(root.as_str()),
            None => Vec::new(),
        }
    }

    pub(crate) fn active_path_ids(&mut self, root: &str) -> Vec<MessageId> {
        let Some(root) = self.get(root).map(|m| m.id.clone()) else {
            return Vec::new();
        };
        let mut visited = HashSet::new();
        visited.insert(root.clone());
        let mut path = vec![root.clone()];
        let mut current = root;
        while let Some(child) = self.resolve_selection(ParentKey::Node(current)) {
            if !visited.insert(child.clone()) {
                break;
            }
            path.push(child.clone());
            current = child;
        }
        path
    }

    /// Displays `id` in place of its currently selected sibling.
    ///
    /// Returns true if the selection changed.  Unknown ids are ignored.
    pub fn select_node(&mut self, id: &str) -> bool {
        TREE_NAVIGATIONS.click();
        let Some(message) = self.get(id) else {
            return self.noop("select", id);
        };
        let key = ParentKey::parent_of(message);
        let id = message.id.clone();
        self.select(key, id)
    }

    /// Displays the sibling after `id`.  The last sibling stays put.
    pub fn advance(&mut self, id: &str) -> bool {
        self.step(id, 1, "advance")
    }

    /// Displays the sibling before `id`.  The first sibling stays put.
    pub fn retreat(&mut self, id: &str) -> bool {
        self.step(id, -1, "retreat")
    }

    fn step(&mut self, id: &str, delta: isize, action: &'static str) -> bool {
        TREE_NAVIGATIONS.click();
        let Some(message) = self.get(id) else {
            return self.noop(action, id);
        };
        let key = ParentKey::parent_of(message);
        let siblings = self.child_ids(&key);
        let target = siblings
            .iter()
            .position(|sibling| sibling.as_str() == id)
            .and_then(|index| index.checked_add_signed(delta))
            .and_then(|index| siblings.get(index))
            .cloned();
        match target {
            Some(target) => self.select(key, target),
            None => self.noop(action, id),
        }
    }

    fn select(&mut self, key: ParentKey, id: MessageId) -> bool {
        tracing::debug!(parent = ?key, selected = %id, "selected branch");
        let previous = self.selections.insert(key, id.clone());
        if previous.as_ref() == Some(&id) {
            TREE_NAVIGATION_NOOPS.click();
            false
        } else {
            true
        }
    }

    fn noop(&self, action: &'static str, id: &str) -> bool {
        TREE_NAVIGATION_NOOPS.click();
        tracing::debug!(action, id, "navigation had no effect");
        false
    }

    /// Selects every ancestor of `id` so that `id` lies on the active path of its root.
    ///
    /// Returns true if `id` is now reachable from a top-level message.  Selections are left alone
    /// when the ancestors end at a missing parent or a cycle.
    pub fn reveal(&mut self, id: &str) -> bool {
        TREE_NAVIGATIONS.click();
        let mut visited = HashSet::new();
        let mut chain = Vec::new();
        let mut current = match self.get(id) {
            Some(message) => message.id.clone(),
            None => return self.noop("reveal", id),
        };
        loop {
            if !visited.insert(current.clone()) {
                return self.noop("reveal", id);
            }
            let Some(message) = self.get(current.as_str()) else {
                return self.noop("reveal", id);
            };
            let parent = message.parent_id.clone();
            chain.push((ParentKey::parent_of(message), current));
            match parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        self.selections.extend(chain);
        true
    }

    /// Position of `id` among its siblings.
    pub fn sibling_position(&self, id: &str) -> Option<SiblingPosition> {
        let message = self.get(id)?;
        let siblings = self.child_ids(&ParentKey::parent_of(message));
        let index = siblings.iter().position(|sibling| sibling.as_str() == id)?;
        Some(SiblingPosition {
            index,
            count: siblings.len(),
        })
    }

    /// Returns true if `id` has at least one sibling to switch to.
    pub fn has_siblings(&self, id: &str) -> bool {
        self.sibling_position(id).is_some_and(|pos| pos.count > 1)
    }

    /// Appends a message record.
    ///
    /// Returns false, and records the id as a duplicate, if a message with the same id exists.
    pub fn insert(&mut self, message: Message) -> bool {
        if self.index.contains_key(&message.id) {
            TREE_DUPLICATES.click();
            tracing::warn!(id = %message.id, "ignoring duplicate message id");
            if !self.duplicates.contains(&message.id) {
                self.duplicates.push(message.id);
            }
            return false;
        }
        if let Some(parent) = &message.parent_id
            && !self.index.contains_key(parent)
        {
            tracing::debug!(id = %message.id, parent = %parent, "parent not seen yet");
        }
        self.children
            .entry(ParentKey::parent_of(&message))
            .or_default()
            .push(message.id.clone());
        self.index.insert(message.id.clone(), self.messages.len());
        self.messages.push(message);
        true
    }

    /// Removes a message record.  Its children become orphans.
    pub fn remove(&mut self, id: &str) -> Option<Message> {
        let idx = self.index.remove(id)?;
        let message = self.messages.remove(idx);
        for (offset, later) in self.messages[idx..].iter().enumerate() {
            self.index.insert(later.id.clone(), idx + offset);
        }
        let key = ParentKey::parent_of(&message);
        if let Some(siblings) = self.children.get_mut(&key) {
            siblings.retain(|sibling| sibling != &message.id);
            if siblings.is_empty() {
                self.children.remove(&key);
            }
        }
        if self.selections.get(&key) == Some(&message.id) {
            self.selections.remove(&key);
        }
        tracing::debug!(id = %message.id, "removed message");
        Some(message)
    }

    /// Replaces every record, keeping each selection whose child is still under the same parent.
    pub fn replace_messages(&mut self, messages: impl IntoIterator<Item = Message>) {
        let selections = std::mem::take(&mut self.selections);
        *self = Self::from_messages(messages);
        self.selections = selections
            .into_iter()
            .filter(|(key, child)| {
                self.get(child.as_str())
                    .is_some_and(|message| &ParentKey::parent_of(message) == key)
            })
            .collect();
    }

    /// Orphans, unreachable messages and duplicate ids.
    pub fn diagnostics(&self) -> TreeDiagnostics {
        let orphaned = self
            .messages
            .iter()
            .filter(|m| m.parent_id.as_ref().is_some_and(|p| !self.contains(p.as_str())))
            .map(|m| m.id.clone())
            .collect();
        let reachable = self.reachable();
        let unreachable = self
            .messages
            .iter()
            .filter(|m| !reachable.contains(&m.id))
            .map(|m| m.id.clone())
            .collect();
        TreeDiagnostics {
            orphaned,
            unreachable,
            duplicates: self.duplicates.clone(),
        }
    }

    fn reachable(&self) -> HashSet<MessageId> {
        let mut reachable = HashSet::new();
        let mut queue: VecDeque<&MessageId> = self.child_ids(&ParentKey::Root).iter().collect();
        while let Some(id) = queue.pop_front() {
            if reachable.insert(id.clone()) {
                queue.extend(self.child_ids(&ParentKey::Node(id.clone())));
            }
        }
        reachable
    }

    /// Every reachable message with its depth, depth first in arrival order.
    pub fn outline(&self) -> Vec<(usize, &Message)> {
        let mut outline = Vec::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<(usize, &MessageId)> = self
            .child_ids(&ParentKey::Root)
            .iter()
            .rev()
            .map(|id| (0, id))
            .collect();
        while let Some((depth, id)) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(message) = self.get(id.as_str()) {
                outline.push((depth, message));
            }
            let children = self.child_ids(&ParentKey::Node(id.clone()));
            stack.extend(children.iter().rev().map(|child| (depth + 1, child)));
        }
        outline
    }

    /// The selected child of `id`, if a selection has been made.
    pub fn selection(&self, id: Option<&str>) -> Option<&MessageId> {
        self.selections.get(&ParentKey::of(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(path: &[&Message]) -> Vec<String> {
        path.iter().map(|m| m.id.to_string()).collect()
    }

    fn branching() -> ConversationTree {
        ConversationTree::from_messages([
            Message::new("1", "Hi"),
            Message::reply("2", "1", "A"),
            Message::reply("3", "1", "B"),
        ])
    }

    fn two_levels() -> ConversationTree {
        ConversationTree::from_messages([
            Message::new("1", "root"),
            Message::reply("2", "1", "a"),
            Message::reply("3", "1", "b"),
            Message::reply("4", "2", "a.1"),
            Message::reply("5", "2", "a.2"),
            Message::reply("6", "3", "b.1"),
            Message::reply("7", "3", "b.2"),
        ])
    }

    #[test]
    fn advance_switches_branch() {
        let mut tree = branching();
        assert_eq!(ids(&tree.active_path("1")), vec!["1", "2"]);
        assert!(tree.advance("2"));
        assert_eq!(ids(&tree.active_path("1")), vec!["1", "3"]);
        assert!(tree.retreat("3"));
        assert_eq!(ids(&tree.active_path("1")), vec!["1", "2"]);
    }

    #[test]
    fn stepping_past_the_ends_is_a_noop() {
        let mut tree = branching();
        assert!(!tree.retreat("2"));
        assert_eq!(ids(&tree.active_path("1")), vec!["1", "2"]);
        assert!(tree.advance("2"));
        assert!(!tree.advance("3"));
        assert_eq!(ids(&tree.active_path("1")), vec!["1", "3"]);
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut tree = branching();
        assert!(!tree.advance("nope"));
        assert!(!tree.select_node("nope"));
        assert!(!tree.reveal("nope"));
        assert!(tree.active_path("nope").is_empty());
        assert_eq!(ids(&tree.active_path("1")), vec!["1", "2"]);
    }

    #[test]
    fn default_selection_is_the_first_child() {
        let mut tree = two_levels();
        assert!(tree.selection(Some("1")).is_none());
        assert_eq!(tree.selected_child_of(Some("1")).unwrap().id.as_str(), "2");
        assert_eq!(tree.selection(Some("1")).map(MessageId::as_str), Some("2"));
        assert_eq!(ids(&tree.active_path("1")), vec!["1", "2", "4"]);
        assert_eq!(ids(&tree.active_path_from_selected_root()), vec!["1", "2", "4"]);
        assert!(tree.selected_child_of(Some("4")).is_none());
    }

    #[test]
    fn selections_are_remembered_per_branch() {
        let mut tree = two_levels();
        assert!(tree.select_node("5"));
        assert_eq!(ids(&tree.active_path("1")), vec!["1", "2", "5"]);

        assert!(tree.advance("2"));
        assert_eq!(ids(&tree.active_path("1")), vec!["1", "3", "6"]);

        assert!(tree.retreat("3"));
        assert_eq!(ids(&tree.active_path("1")), vec!["1", "2", "5"]);
        assert_eq!(tree.selection(Some("3")).map(MessageId::as_str), Some("6"));
    }

    #[test]
    fn select_node_twice_reports_no_change() {
        let mut tree = branching();
        assert!(tree.select_node("3"));
        assert!(!tree.select_node("3"));
    }

    #[test]
    fn forests_select_among_roots() {
        let mut tree = ConversationTree::from_messages([
            Message::new("a", "first"),
            Message::new("b", "second"),
            Message::reply("b1", "b", "reply"),
        ]);
        assert_eq!(ids(&tree.roots()), vec!["a", "b"]);
        assert_eq!(tree.selected_root().unwrap().id.as_str(), "a");
        assert!(tree.advance("a"));
        assert_eq!(ids(&tree.active_path_from_selected_root()), vec!["b", "b1"]);
    }

    #[test]
    fn parent_cycles_terminate() {
        let mut tree = ConversationTree::from_messages([
            Message::new("r", "root"),
            Message::reply("a", "b", "x"),
            Message::reply("b", "a", "y"),
        ]);
        let path = ids(&tree.active_path("a"));
        assert_eq!(path, vec!["a", "b"]);
        assert!(path.len() <= tree.len());

        let diagnostics = tree.diagnostics();
        assert!(diagnostics.orphaned.is_empty());
        assert_eq!(
            diagnostics.unreachable,
            vec![MessageId::new("a"), MessageId::new("b")]
        );
        assert!(!tree.reveal("a"));
    }

    #[test]
    fn failed_reveal_keeps_selections() {
        let mut tree = ConversationTree::from_messages([
            Message::new("1", "root"),
            Message::reply("2", "1", "a"),
            Message::reply("x", "missing", "lost"),
            Message::reply("y", "x", "lost reply"),
            Message::reply("z", "x", "other lost reply"),
            Message::reply("p", "q", "loop"),
            Message::reply("q", "p", "loop"),
        ]);
        assert!(tree.select_node("y"));
        assert!(!tree.reveal("z"));
        assert_eq!(tree.selection(Some("x")).map(MessageId::as_str), Some("y"));
        assert!(tree.selection(Some("missing")).is_none());

        assert!(!tree.reveal("p"));
        assert!(tree.selection(Some("q")).is_none());
        assert!(tree.selection(Some("p")).is_none());
        assert_eq!(ids(&tree.active_path("1")), vec!["1", "2"]);
    }

    #[test]
    fn children_before_parents_are_not_orphans() {
        let mut tree = ConversationTree::from_messages([
            Message::reply("2", "1", "early reply"),
            Message::new("1", "root"),
        ]);
        assert!(tree.diagnostics().is_clean());
        assert_eq!(ids(&tree.children_of(Some("1"))), vec!["2"]);
        assert_eq!(ids(&tree.active_path("1")), vec!["1", "2"]);
    }

    #[test]
    fn orphans_are_reported_not_fatal() {
        let tree = ConversationTree::from_messages([
            Message::new("1", "root"),
            Message::reply("x", "missing", "lost"),
            Message::reply("y", "x", "also lost"),
        ]);
        let diagnostics = tree.diagnostics();
        assert_eq!(diagnostics.orphaned, vec![MessageId::new("x")]);
        assert_eq!(
            diagnostics.unreachable,
            vec![MessageId::new("x"), MessageId::new("y")]
        );
        assert!(!diagnostics.is_clean());
        assert_eq!(tree.outline().len(), 1);
    }

    #[test]
    fn duplicates_keep_the_first_record() {
        let mut tree = branching();
        assert!(!tree.insert(Message::reply("2", "1", "impostor")));
        assert!(!tree.insert(Message::reply("2", "1", "again")));
        assert_eq!(tree.get("2").unwrap().content, "A");
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.diagnostics().duplicates, vec![MessageId::new("2")]);
    }

    #[test]
    fn inserting_a_sibling_keeps_the_selection() {
        let mut tree = branching();
        assert_eq!(ids(&tree.active_path("1")), vec!["1", "2"]);
        assert!(tree.insert(Message::reply("9", "1", "regenerated")));
        assert_eq!(ids(&tree.active_path("1")), vec!["1", "2"]);
        assert_eq!(
            tree.sibling_position("9"),
            Some(SiblingPosition { index: 2, count: 3 })
        );
    }

    #[test]
    fn removing_the_selected_child_falls_back_to_first() {
        let mut tree = branching();
        tree.insert(Message::reply("4", "1", "C"));
        tree.select_node("3");
        assert_eq!(tree.remove("3").unwrap().content, "B");
        assert_eq!(ids(&tree.active_path("1")), vec!["1", "2"]);
        assert_eq!(tree.get("4").unwrap().content, "C");
        assert!(tree.remove("3").is_none());
    }

    #[test]
    fn removing_a_parent_orphans_its_children() {
        let mut tree = two_levels();
        tree.remove("2");
        let diagnostics = tree.diagnostics();
        assert_eq!(
            diagnostics.orphaned,
            vec![MessageId::new("4"), MessageId::new("5")]
        );
        assert_eq!(ids(&tree.active_path("1")), vec!["1", "3", "6"]);
    }

    #[test]
    fn replace_messages_keeps_valid_selections() {
        let mut tree = two_levels();
        tree.select_node("7");
        tree.select_node("3");
        tree.replace_messages([
            Message::new("1", "root"),
            Message::reply("2", "1", "a"),
            Message::reply("3", "1", "b"),
            Message::reply("6", "3", "b.1"),
            Message::reply("7", "2", "moved"),
        ]);
        assert_eq!(tree.selection(Some("1")).map(MessageId::as_str), Some("3"));
        assert!(tree.selection(Some("3")).is_none());
        assert_eq!(ids(&tree.active_path("1")), vec!["1", "3", "6"]);
    }

    #[test]
    fn reveal_selects_every_ancestor() {
        let mut tree = two_levels();
        assert_eq!(ids(&tree.active_path("1")), vec!["1", "2", "4"]);
        assert!(tree.reveal("7"));
        assert_eq!(ids(&tree.active_path("1")), vec!["1", "3", "7"]);
    }

    #[test]
    fn sibling_positions() {
        let tree = two_levels();
        let position = tree.sibling_position("5").unwrap();
        assert_eq!(position, SiblingPosition { index: 1, count: 2 });
        assert!(position.has_previous());
        assert!(!position.has_next());
        assert_eq!(position.to_string(), "2/2");
        assert!(tree.has_siblings("5"));
        assert!(!tree.has_siblings("1"));
        assert!(tree.sibling_position("nope").is_none());
    }

    #[test]
    fn outline_is_depth_first() {
        let tree = two_levels();
        let outline: Vec<(usize, &str)> = tree
            .outline()
            .into_iter()
            .map(|(depth, m)| (depth, m.id.as_str()))
            .collect();
        assert_eq!(
            outline,
            vec![
                (0, "1"),
                (1, "2"),
                (2, "4"),
                (2, "5"),
                (1, "3"),
                (2, "6"),
                (2, "7"),
            ]
        );
    }
}

//! The conversation view model.
//!
//! [`ConversationView`] joins the branch navigator with one span sequence per message.  Message
//! bodies are either complete text, segmented once, or live [`ContentStream`]s that are
//! re-segmented on every chunk.  [`ConversationView::next_event`] drives the live streams;
//! navigation methods take `&mut self`, so chunk updates and navigation never overlap.

use std::collections::HashMap;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::StreamExt;
use futures::future;
use futures::stream;
use tokio_util::sync::CancellationToken;

use crate::config::{OpenSpanDisplay, ViewConfig};
use crate::content_stream::{ChunkStream, ContentSource, ContentStream, split_chunks};
use crate::observability::TREE_ORPHANS;
use crate::plugin::PluginRegistry;
use crate::segment::Segmenter;
use crate::store::MessageStore;
use crate::tree::{ConversationTree, SiblingPosition, TreeDiagnostics};
use crate::types::{Message, MessageId, Span};
use crate::{Error, Result};

/// Something that changed in the view while driving live streams.
#[derive(Clone, Debug)]
pub enum ViewEvent {
    /// The buffer and spans of a message changed.
    ContentChanged {
        /// The message.
        id: MessageId,
        /// True if the message will not change again.
        is_final: bool,
    },
    /// A message's source failed.  Its buffer so far is kept as final.
    StreamFailed {
        /// The message.
        id: MessageId,
        /// Why the source failed.
        error: Error,
    },
    /// A message's stream was cancelled.  Its buffer so far is kept as final.
    Cancelled {
        /// The message.
        id: MessageId,
    },
}

impl ViewEvent {
    /// The message this event is about.
    pub fn id(&self) -> &MessageId {
        match self {
            ViewEvent::ContentChanged { id, .. }
            | ViewEvent::StreamFailed { id, .. }
            | ViewEvent::Cancelled { id } => id,
        }
    }
}

/// The active path before and after a navigation action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathChange {
    /// The active path before the action.
    pub before: Vec<MessageId>,
    /// The active path after the action.
    pub after: Vec<MessageId>,
    /// Index of the first position at which the paths differ, `None` if they are equal.
    pub divergence: Option<usize>,
}

impl PathChange {
    /// Compares two paths.
    pub fn new(before: Vec<MessageId>, after: Vec<MessageId>) -> Self {
        let divergence = if before == after {
            None
        } else {
            Some(
                before
                    .iter()
                    .zip(after.iter())
                    .take_while(|(b, a)| b == a)
                    .count(),
            )
        };
        Self {
            before,
            after,
            divergence,
        }
    }

    /// Returns true if the active path changed.
    pub fn changed(&self) -> bool {
        self.divergence.is_some()
    }

    /// The messages that are displayed now but were not displayed at the same position before.
    pub fn newly_displayed(&self) -> &[MessageId] {
        match self.divergence {
            Some(index) => &self.after[index..],
            None => &[],
        }
    }
}

/// Everything needed to display one message of the active path.
#[derive(Clone, Debug)]
pub struct RenderedMessage {
    /// The message record.
    pub message: Message,
    /// The current buffer.
    pub buffer: String,
    /// The spans of the buffer.
    pub spans: Vec<Span>,
    /// Where the message sits among its siblings.
    pub position: SiblingPosition,
    /// True if there are other siblings to switch to.
    pub has_siblings: bool,
    /// True while more text may arrive.
    pub streaming: bool,
    /// Why the source failed, if it did.
    pub failure: Option<Error>,
}

enum BodyContent {
    Static(String),
    Streaming(ContentStream),
}

struct MessageBody {
    content: BodyContent,
    segmenter: Segmenter,
    // The complete text while a replay re-streams it.
    replay_of: Option<String>,
}

impl MessageBody {
    fn new(source: ContentSource, registry: &Arc<PluginRegistry>, display: OpenSpanDisplay) -> Self {
        let segmenter = Segmenter::with_display(Arc::clone(registry), display);
        let content = match source {
            ContentSource::Text(text) => BodyContent::Static(text),
            chunks @ ContentSource::Chunks(_) => BodyContent::Streaming(ContentStream::new(chunks)),
        };
        let mut body = Self {
            content,
            segmenter,
            replay_of: None,
        };
        body.resegment();
        body
    }

    /// The text the message record holds: the replayed text during a replay, the buffer otherwise.
    fn record_text(&self) -> &str {
        self.replay_of.as_deref().unwrap_or_else(|| self.buffer())
    }

    fn buffer(&self) -> &str {
        match &self.content {
            BodyContent::Static(text) => text,
            BodyContent::Streaming(stream) => stream.buffer(),
        }
    }

    fn is_live(&self) -> bool {
        matches!(&self.content, BodyContent::Streaming(stream) if !stream.is_final())
    }

    fn failure(&self) -> Option<&Error> {
        match &self.content {
            BodyContent::Static(_) => None,
            BodyContent::Streaming(stream) => stream.failure(),
        }
    }

    fn cancellation_token(&self) -> Option<CancellationToken> {
        match &self.content {
            BodyContent::Static(_) => None,
            BodyContent::Streaming(stream) => Some(stream.cancellation_token()),
        }
    }

    fn resegment(&mut self) {
        let is_final = !self.is_live();
        let Self {
            content, segmenter, ..
        } = self;
        let buffer = match content {
            BodyContent::Static(text) => text.as_str(),
            BodyContent::Streaming(stream) => stream.buffer(),
        };
        segmenter.update(buffer, is_final);
    }

    /// Ends a replay.  An interrupted replay puts the complete text back.
    fn settle_replay(&mut self, interrupted: bool) {
        let Some(text) = self.replay_of.take() else {
            return;
        };
        if interrupted {
            tracing::debug!(bytes = text.len(), "replay interrupted; restoring message text");
            self.content = BodyContent::Static(text);
            self.segmenter.reset();
            self.resegment();
        }
    }
}

/// A branching conversation with per-message span sequences.
pub struct ConversationView {
    tree: ConversationTree,
    config: ViewConfig,
    registry: Arc<PluginRegistry>,
    bodies: HashMap<MessageId, MessageBody>,
    next_poll: usize,
}

impl ConversationView {
    /// Creates a view over message records whose content is complete.
    pub fn new(messages: Vec<Message>, config: ViewConfig) -> Self {
        let registry = Arc::new(config.plugins.clone());
        let mut view = Self {
            tree: ConversationTree::new(),
            config,
            registry,
            bodies: HashMap::new(),
            next_poll: 0,
        };
        for message in messages {
            view.insert_message(message, None);
        }
        view.report_integrity();
        view
    }

    /// Creates a view over the records of `store`.
    pub async fn load(store: &dyn MessageStore, config: ViewConfig) -> Result<Self> {
        let messages = store.messages().await?;
        Ok(Self::new(messages, config))
    }

    /// Re-reads the records of `store`, keeping selections and live streams that still apply.
    pub async fn reload(&mut self, store: &dyn MessageStore) -> Result<()> {
        let messages = store.messages().await?;
        self.tree.replace_messages(messages);
        let mut bodies = std::mem::take(&mut self.bodies);
        for message in self.tree.messages() {
            let body = match bodies.remove(&message.id) {
                Some(body) if body.is_live() || body.buffer() == message.content => body,
                _ => MessageBody::new(
                    ContentSource::Text(message.content.clone()),
                    &self.registry,
                    self.config.open_span_display,
                ),
            };
            self.bodies.insert(message.id.clone(), body);
        }
        self.report_integrity();
        Ok(())
    }

    fn report_integrity(&self) {
        for id in self.tree.diagnostics().orphaned {
            TREE_ORPHANS.click();
            let parent = self.tree.get(id.as_str()).and_then(|m| m.parent_id.as_ref());
            tracing::warn!(id = %id, parent = ?parent, "message parent is missing");
        }
    }

    /// The view configuration.
    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    /// The branch navigator.
    pub fn tree(&self) -> &ConversationTree {
        &self.tree
    }

    /// Integrity problems in the message records.
    pub fn diagnostics(&self) -> TreeDiagnostics {
        self.tree.diagnostics()
    }

    /// Adds a message.  Without a source its record content is used.
    ///
    /// Returns false if a message with the same id exists.
    pub fn insert_message(&mut self, message: Message, source: Option<ContentSource>) -> bool {
        let source = source.unwrap_or_else(|| ContentSource::Text(message.content.clone()));
        let id = message.id.clone();
        if !self.tree.insert(message) {
            return false;
        }
        let body = MessageBody::new(source, &self.registry, self.config.open_span_display);
        self.bodies.insert(id, body);
        true
    }

    /// Replaces the body of message `id` with `source`.
    ///
    /// Returns the token that cancels the new stream, or `None` if the message is unknown or the
    /// source is complete text.
    pub fn attach_stream(&mut self, id: &str, source: ContentSource) -> Option<CancellationToken> {
        let message = self.tree.get(id)?;
        let id = message.id.clone();
        if let Some(token) = self.bodies.get(&id).and_then(MessageBody::cancellation_token) {
            token.cancel();
        }
        let body = MessageBody::new(source, &self.registry, self.config.open_span_display);
        let token = body.cancellation_token();
        tracing::debug!(id = %id, streaming = token.is_some(), "attached message body");
        self.bodies.insert(id, body);
        token
    }

    /// Re-streams the text of message `id` in chunks of `chunk_chars` characters, waiting `delay`
    /// before each chunk.
    ///
    /// The message keeps its complete text: [`transcript`](Self::transcript) reports it throughout,
    /// and it is put back if the replay is cancelled.
    pub fn replay(
        &mut self,
        id: &str,
        chunk_chars: usize,
        delay: Duration,
    ) -> Result<CancellationToken> {
        let Some(body) = self.bodies.get(id) else {
            return Err(Error::not_found(
                "cannot replay an unknown message",
                Some(id.to_string()),
            ));
        };
        let text = body.record_text().to_string();
        let chunks = split_chunks(&text, chunk_chars);
        let chunks: ChunkStream = Box::pin(stream::iter(chunks).then(move |chunk| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok::<_, Error>(chunk)
        }));
        let token = self
            .attach_stream(id, ContentSource::Chunks(chunks))
            .ok_or_else(|| Error::unknown("replay did not produce a stream"))?;
        if let Some(body) = self.bodies.get_mut(id) {
            body.replay_of = Some(text);
        }
        Ok(token)
    }

    /// Cancels the live stream of message `id`.  Returns true if there was one.
    pub fn cancel(&self, id: &str) -> bool {
        match self.bodies.get(id) {
            Some(body) if body.is_live() => {
                body.cancellation_token().is_some_and(|token| {
                    token.cancel();
                    true
                })
            }
            _ => false,
        }
    }

    /// Cancels every live stream.
    pub fn cancel_all(&self) {
        for body in self.bodies.values().filter(|body| body.is_live()) {
            if let Some(token) = body.cancellation_token() {
                token.cancel();
            }
        }
    }

    /// Returns true if any message is still streaming.
    pub fn has_live_streams(&self) -> bool {
        self.bodies.values().any(MessageBody::is_live)
    }

    /// Returns true if message `id` is still streaming.
    pub fn is_streaming(&self, id: &str) -> bool {
        self.bodies.get(id).is_some_and(MessageBody::is_live)
    }

    /// Waits for the next chunk of any live stream and applies it.
    ///
    /// Returns `None` once no stream is live.
    pub async fn next_event(&mut self) -> Option<ViewEvent> {
        future::poll_fn(|cx| self.poll_event(cx)).await
    }

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<ViewEvent>> {
        let live: Vec<MessageId> = self
            .tree
            .messages()
            .iter()
            .filter(|message| self.bodies.get(&message.id).is_some_and(MessageBody::is_live))
            .map(|message| message.id.clone())
            .collect();
        if live.is_empty() {
            return Poll::Ready(None);
        }
        for offset in 0..live.len() {
            let index = (self.next_poll + offset) % live.len();
            let id = &live[index];
            let Some(body) = self.bodies.get_mut(id) else {
                continue;
            };
            let BodyContent::Streaming(stream) = &mut body.content else {
                continue;
            };
            let event = match stream.poll_next_unpin(cx) {
                Poll::Pending => continue,
                Poll::Ready(Some(update)) => match update.failure {
                    Some(error) => ViewEvent::StreamFailed {
                        id: id.clone(),
                        error,
                    },
                    None => ViewEvent::ContentChanged {
                        id: id.clone(),
                        is_final: update.is_final,
                    },
                },
                Poll::Ready(None) => ViewEvent::Cancelled { id: id.clone() },
            };
            body.resegment();
            if !body.is_live() {
                body.settle_replay(!matches!(event, ViewEvent::ContentChanged { .. }));
            }
            self.next_poll = index + 1;
            return Poll::Ready(Some(event));
        }
        Poll::Pending
    }

    /// Applies events until no stream is live.
    pub async fn drain(&mut self) -> Vec<ViewEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        events
    }

    /// The active path from the selected top-level message.
    pub fn active_path(&mut self) -> Vec<MessageId> {
        self.tree
            .active_path_from_selected_root()
            .into_iter()
            .map(|message| message.id.clone())
            .collect()
    }

    /// The active path from `root`.
    pub fn active_path_from(&mut self, root: &str) -> Vec<MessageId> {
        self.tree.active_path_ids(root)
    }

    fn navigate(&mut self, action: impl FnOnce(&mut ConversationTree) -> bool) -> PathChange {
        let before = self.active_path();
        action(&mut self.tree);
        let after = self.active_path();
        let change = PathChange::new(before, after);
        tracing::debug!(divergence = ?change.divergence, "active path updated");
        change
    }

    /// Displays the sibling after `id`.
    pub fn advance(&mut self, id: &str) -> PathChange {
        self.navigate(|tree| tree.advance(id))
    }

    /// Displays the sibling before `id`.
    pub fn retreat(&mut self, id: &str) -> PathChange {
        self.navigate(|tree| tree.retreat(id))
    }

    /// Displays `id` in place of its selected sibling.
    pub fn select_node(&mut self, id: &str) -> PathChange {
        self.navigate(|tree| tree.select_node(id))
    }

    /// Puts `id` on the active path, selecting its top-level ancestor and every message between.
    pub fn reveal(&mut self, id: &str) -> PathChange {
        self.navigate(|tree| tree.reveal(id))
    }

    /// The current buffer of message `id`.
    pub fn buffer(&self, id: &str) -> Option<&str> {
        self.bodies.get(id).map(MessageBody::buffer)
    }

    /// The spans of message `id`.
    pub fn spans(&self, id: &str) -> Option<&[Span]> {
        self.bodies.get(id).map(|body| body.segmenter.spans())
    }

    /// Everything needed to display message `id`.
    pub fn render_message(&self, id: &str) -> Option<RenderedMessage> {
        let message = self.tree.get(id)?;
        let body = self.bodies.get(id)?;
        let position = self.tree.sibling_position(id)?;
        Some(RenderedMessage {
            message: message.clone(),
            buffer: body.buffer().to_string(),
            spans: body.segmenter.spans().to_vec(),
            position,
            has_siblings: position.count > 1,
            streaming: body.is_live(),
            failure: body.failure().cloned(),
        })
    }

    /// Every message of the active path, ready to display.
    pub fn render_path(&mut self) -> Vec<RenderedMessage> {
        self.active_path()
            .iter()
            .filter_map(|id| self.render_message(id.as_str()))
            .collect()
    }

    /// Replaces the renderer plugins and re-segments every message.
    pub fn set_plugins(&mut self, plugins: PluginRegistry) {
        tracing::debug!(plugins = ?plugins.names(), "replacing renderer plugins");
        self.registry = Arc::new(plugins.clone());
        self.config.plugins = plugins;
        for body in self.bodies.values_mut() {
            body.segmenter.set_registry(Arc::clone(&self.registry));
            body.resegment();
        }
    }

    /// Changes how open regions are shown and re-segments every message.
    pub fn set_open_span_display(&mut self, display: OpenSpanDisplay) {
        self.config.open_span_display = display;
        for body in self.bodies.values_mut() {
            body.segmenter.set_display(display);
            body.resegment();
        }
    }

    /// The message records with their current buffers as content, in arrival order.
    pub fn transcript(&self) -> Vec<Message> {
        self.tree
            .messages()
            .iter()
            .map(|message| {
                let mut message = message.clone();
                if let Some(body) = self.bodies.get(&message.id) {
                    message.content = body.record_text().to_string();
                }
                message
            })
            .collect()
    }
}

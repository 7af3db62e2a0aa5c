//! The renderer plugin contract and the priority-ordered registry of plugins.
//!
//! A plugin claims one formatting dialect (fenced code, display math, ...).  It finds the
//! delimiters that open and close a region and turns a closed region into a [`Rendered`] value.
//! The [`Segmenter`](crate::Segmenter) decides which plugin owns which region; plugins never see
//! each other.

use std::fmt;
use std::sync::Arc;

use crate::Error;
use crate::error::Result;
use crate::types::{Delimiter, Rendered};

/// A pluggable delimiter-matching and formatting unit for one content dialect.
///
/// Implementations must be free of side effects.  Offsets are byte offsets into `text` and must
/// lie on character boundaries.
///
/// Detection may look at most one character past the delimiter it reports (for example, to
/// reject `$ ` as the start of inline math).  While a buffer is still growing the segmenter keeps
/// any delimiter that touches the end of the buffer tentative, so such lookahead is always
/// re-evaluated once the next character arrives.
pub trait RendererPlugin: Send + Sync {
    /// Stable name of the plugin, used to tag spans.
    fn name(&self) -> &str;

    /// Find the first opening delimiter at or after `from`.
    ///
    /// Returns `None` when the remainder of `text` holds no opening delimiter.
    fn detect_start_sequence(&self, text: &str, from: usize) -> Option<Delimiter>;

    /// Find the closing delimiter for a region whose content starts at `from`.
    ///
    /// `from` is the end of the opening delimiter, so plugins with several delimiter pairs can
    /// inspect `text[..from]` to tell which opener they are closing.
    fn detect_end_sequence(&self, text: &str, from: usize) -> Option<Delimiter>;

    /// Format the closed region `text[start..end]`, delimiters included.
    fn render(&self, text: &str, start: usize, end: usize) -> Rendered;
}

/// The renderer plugins of a view, in priority order.
///
/// When two plugins report an opening delimiter at the same offset, the one registered first
/// wins.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn RendererPlugin>>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in plugins: fenced code, display math, inline math.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.push(crate::plugins::FencedCode);
        registry.push(crate::plugins::DisplayMath);
        registry.push(crate::plugins::InlineMath);
        registry
    }

    /// Creates a registry of built-in plugins from a comma-separated list of names, in the order
    /// given.
    pub fn from_names(names: &str) -> Result<Self> {
        let builtins = Self::with_defaults();
        let mut registry = Self::new();
        for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let plugin = builtins.get(name).ok_or_else(|| {
                Error::validation(
                    format!("unknown renderer plugin {name:?}"),
                    Some("plugins".to_string()),
                )
            })?;
            registry.push_shared(Arc::clone(plugin));
        }
        Ok(registry)
    }

    /// Appends a plugin with the lowest priority.
    pub fn push(&mut self, plugin: impl RendererPlugin + 'static) {
        self.plugins.push(Arc::new(plugin));
    }

    /// Appends a shared plugin with the lowest priority.
    pub fn push_shared(&mut self, plugin: Arc<dyn RendererPlugin>) {
        self.plugins.push(plugin);
    }

    /// Inserts a plugin at `index` in priority order.  Indices past the end append.
    pub fn insert(&mut self, index: usize, plugin: impl RendererPlugin + 'static) {
        let index = index.min(self.plugins.len());
        self.plugins.insert(index, Arc::new(plugin));
    }

    /// Removes every plugin called `name`.  Returns true if any was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.plugins.len();
        self.plugins.retain(|plugin| plugin.name() != name);
        self.plugins.len() != before
    }

    /// Returns the plugin called `name`, if registered.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn RendererPlugin>> {
        self.plugins.iter().find(|plugin| plugin.name() == name)
    }

    /// Names of the registered plugins in priority order.
    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|plugin| plugin.name()).collect()
    }

    /// Iterates the plugins in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn RendererPlugin>> {
        self.plugins.iter()
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Returns true if no plugins are registered.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Finds the earliest opening delimiter at or after `from` among all plugins.
    ///
    /// Ties go to the plugin with higher priority.
    pub(crate) fn earliest_start(
        &self,
        text: &str,
        from: usize,
    ) -> Option<(&Arc<dyn RendererPlugin>, Delimiter)> {
        let mut best: Option<(&Arc<dyn RendererPlugin>, Delimiter)> = None;
        for plugin in &self.plugins {
            let Some(found) = plugin.detect_start_sequence(text, from) else {
                continue;
            };
            debug_assert!(found.start >= from && found.end <= text.len());
            if best.is_none_or(|(_, current)| found.start < current.start) {
                best = Some((plugin, found));
            }
        }
        best
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}

// Public modules
pub mod commands;
pub mod config;
pub mod content_stream;
pub mod error;
pub mod observability;
pub mod plugin;
pub mod plugins;
pub mod render;
pub mod segment;
pub mod store;
pub mod tree;
pub mod types;
pub mod utils;
pub mod view;

// Re-exports
pub use config::{OpenSpanDisplay, ViewArgs, ViewConfig};
pub use content_stream::{ChunkStream, ContentSource, ContentStream, ContentUpdate};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use plugin::{PluginRegistry, RendererPlugin};
pub use plugins::{DisplayMath, FencedCode, InlineMath};
pub use render::{PlainTextPresenter, Presenter};
pub use segment::{Segmenter, segment};
pub use store::{MessageStore, TranscriptFormat, TranscriptStore};
pub use tree::{ConversationTree, ParentKey, SiblingPosition, TreeDiagnostics};
pub use types::*;
pub use view::{ConversationView, PathChange, RenderedMessage, ViewEvent};

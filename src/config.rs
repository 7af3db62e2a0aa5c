//! Configuration for a conversation view.
//!
//! [`ViewConfig`] is what the library consumes.  [`ViewArgs`] is the `arrrg` command line of the
//! `chatbranch-view` binary and converts into a `ViewConfig`.

use std::path::PathBuf;

use arrrg_derive::CommandLine;

use crate::plugin::PluginRegistry;

/// Default number of characters per chunk when replaying a message.
const DEFAULT_REPLAY_CHUNK_SIZE: usize = 8;

/// How a formatted region whose closing delimiter has not arrived yet is shown while streaming.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OpenSpanDisplay {
    /// Show the region, opening delimiter included, as plain text in the `Open` state.
    #[default]
    Raw,
    /// Show a [`SpanKind::Pending`](crate::SpanKind::Pending) placeholder instead.
    Pending,
}

/// Command-line arguments for the chatbranch-view tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ViewArgs {
    /// Transcript to open.
    #[arrrg(optional, "Transcript file to open (.json, .yaml or .yml)", "PATH")]
    pub transcript: Option<String>,

    /// Comma-separated renderer plugins, in priority order.
    #[arrrg(
        optional,
        "Renderer plugins in priority order (default: fenced_code,display_math,inline_math)",
        "NAMES"
    )]
    pub plugins: Option<String>,

    /// Characters per chunk for /replay.
    #[arrrg(optional, "Characters per chunk when replaying a message (default: 8)", "CHARS")]
    pub replay_chunk_size: Option<usize>,

    /// Show placeholders for unterminated formatting while streaming.
    #[arrrg(flag, "Show a placeholder for formatting that is still open")]
    pub pending_spans: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a conversation view.
#[derive(Debug, Clone)]
pub struct ViewConfig {
    /// Renderer plugins in priority order.
    pub plugins: PluginRegistry,

    /// How open regions are shown while streaming.
    pub open_span_display: OpenSpanDisplay,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Transcript the view was loaded from and saves to.
    pub transcript_path: Option<PathBuf>,

    /// Characters per chunk when replaying a message.
    pub replay_chunk_size: usize,
}

impl ViewConfig {
    /// Creates a new ViewConfig with default values.
    ///
    /// Defaults:
    /// - Plugins: fenced code, display math, inline math
    /// - Open spans: raw
    /// - Color: enabled
    /// - Replay chunk size: 8
    pub fn new() -> Self {
        Self {
            plugins: PluginRegistry::with_defaults(),
            open_span_display: OpenSpanDisplay::Raw,
            use_color: true,
            transcript_path: None,
            replay_chunk_size: DEFAULT_REPLAY_CHUNK_SIZE,
        }
    }

    /// Sets the renderer plugins.
    pub fn with_plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins;
        self
    }

    /// Sets how open regions are shown.
    pub fn with_open_span_display(mut self, display: OpenSpanDisplay) -> Self {
        self.open_span_display = display;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Sets the transcript path.
    pub fn with_transcript_path(mut self, path: Option<PathBuf>) -> Self {
        self.transcript_path = path;
        self
    }

    /// Sets the replay chunk size.  Zero is treated as one.
    pub fn with_replay_chunk_size(mut self, chars: usize) -> Self {
        self.replay_chunk_size = chars.max(1);
        self
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ViewArgs> for ViewConfig {
    fn from(args: ViewArgs) -> Self {
        let plugins = match args.plugins {
            Some(names) => PluginRegistry::from_names(&names).unwrap_or_else(|err| {
                tracing::warn!(error = %err, "falling back to the default renderer plugins");
                PluginRegistry::with_defaults()
            }),
            None => PluginRegistry::with_defaults(),
        };
        ViewConfig {
            plugins,
            open_span_display: if args.pending_spans {
                OpenSpanDisplay::Pending
            } else {
                OpenSpanDisplay::Raw
            },
            use_color: !args.no_color,
            transcript_path: args.transcript.map(PathBuf::from),
            replay_chunk_size: args
                .replay_chunk_size
                .unwrap_or(DEFAULT_REPLAY_CHUNK_SIZE)
                .max(1),
        }
    }
}

use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::{Delimiter, Rendered};

/// What a span of a message buffer holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpanKind {
    /// Plain text, displayed as is.
    Plain,

    /// A region claimed by the named renderer plugin.
    Formatted {
        /// Name of the plugin that claimed the region.
        plugin: String,
    },

    /// A placeholder for a region whose closing delimiter has not arrived yet.
    Pending {
        /// Name of the plugin whose opening delimiter was seen.
        plugin: String,
    },
}

/// How settled a span is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanState {
    /// The span will never change as the buffer grows.
    Final,
    /// The span reflects the buffer so far and may be re-derived when more text arrives.
    Tentative,
    /// A formatted region whose closing delimiter has not been seen.
    Open,
}

/// A classified, contiguous slice of a message buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// What this span holds.
    pub kind: SpanKind,
    /// How settled this span is.
    pub state: SpanState,
    /// Byte range of the whole region, delimiters included.
    pub range: Range<usize>,
    /// Byte range of the content, delimiters excluded.  Equal to `range` for plain text.
    pub content_range: Range<usize>,
    /// Text of `range`.
    pub raw: String,
    /// Text of `content_range`.
    pub text: String,
    /// The plugin's rendering of a closed formatted region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered: Option<Rendered>,
}

impl Span {
    /// A plain-text span over `range` of `buffer`.
    pub fn plain(buffer: &str, range: Range<usize>, state: SpanState) -> Self {
        let text = buffer[range.clone()].to_string();
        Self {
            kind: SpanKind::Plain,
            state,
            content_range: range.clone(),
            range,
            raw: text.clone(),
            text,
            rendered: None,
        }
    }

    /// A closed formatted span from the start of `open` to the end of `close`.
    pub fn formatted(
        buffer: &str,
        plugin: impl Into<String>,
        open: Delimiter,
        close: Delimiter,
        state: SpanState,
        rendered: Rendered,
    ) -> Self {
        Self {
            kind: SpanKind::Formatted {
                plugin: plugin.into(),
            },
            state,
            range: open.start..close.end,
            content_range: open.end..close.start,
            raw: buffer[open.start..close.end].to_string(),
            text: buffer[open.end..close.start].to_string(),
            rendered: Some(rendered),
        }
    }

    /// An open region from `open` to the end of `buffer`, shown as a placeholder.
    pub fn pending(buffer: &str, plugin: impl Into<String>, open: Delimiter) -> Self {
        Self {
            kind: SpanKind::Pending {
                plugin: plugin.into(),
            },
            state: SpanState::Open,
            range: open.start..buffer.len(),
            content_range: open.end..buffer.len(),
            raw: buffer[open.start..].to_string(),
            text: buffer[open.end..].to_string(),
            rendered: None,
        }
    }

    /// Returns true for plain text.
    pub fn is_plain(&self) -> bool {
        matches!(self.kind, SpanKind::Plain)
    }

    /// Returns true for a closed formatted region.
    pub fn is_formatted(&self) -> bool {
        matches!(self.kind, SpanKind::Formatted { .. })
    }

    /// Returns true for a pending placeholder.
    pub fn is_pending(&self) -> bool {
        matches!(self.kind, SpanKind::Pending { .. })
    }

    /// Returns true if the span will never change.
    pub fn is_final(&self) -> bool {
        self.state == SpanState::Final
    }

    /// Name of the plugin that claimed this span, if any.
    pub fn plugin(&self) -> Option<&str> {
        match &self.kind {
            SpanKind::Plain => None,
            SpanKind::Formatted { plugin } | SpanKind::Pending { plugin } => Some(plugin),
        }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// Returns true if the span covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

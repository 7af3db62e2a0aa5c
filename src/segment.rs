//! Incremental segmentation of a growing message buffer into spans.
//!
//! A [`Segmenter`] is driven by "the buffer is now this" events.  It keeps a cursor at the end of
//! the last committed span and only rescans the tail:
//!
//! - The earliest opening delimiter reported by any plugin wins; ties go to registry order.
//! - Text before an opening delimiter is plain.
//! - A formatted span is committed, together with the plain text before it, once its closing
//!   delimiter is followed by at least one more byte or the stream is final.  Plugins may look
//!   one character past a delimiter, so a delimiter touching the end of a growing buffer is never
//!   trusted.
//! - A region with no closing delimiter is open.  It is rescanned from the same place on every
//!   update and, once the stream is final, becomes plain text, delimiters included.
//!
//! Because nothing is committed on the strength of bytes that have not arrived, the final spans
//! do not depend on how the text was split into chunks, and [`segment`] over the whole text gives
//! the same answer as any sequence of [`Segmenter::update`] calls.

use std::ops::Range;
use std::sync::Arc;

use crate::config::OpenSpanDisplay;
use crate::observability::{
    SEGMENT_RESCANS, SEGMENT_RESCAN_BYTES, SEGMENT_RESETS, SEGMENT_SPANS_COMMITTED,
};
use crate::plugin::PluginRegistry;
use crate::types::{Span, SpanState};

/// Segments the complete text in one pass.
pub fn segment(registry: &PluginRegistry, text: &str) -> Vec<Span> {
    let mut segmenter = Segmenter::new(Arc::new(registry.clone()));
    segmenter.update(text, true);
    segmenter.into_spans()
}

/// The span state machine for one message buffer.
#[derive(Debug, Clone)]
pub struct Segmenter {
    registry: Arc<PluginRegistry>,
    display: OpenSpanDisplay,
    spans: Vec<Span>,
    committed: usize,
    cursor: usize,
    finished: bool,
}

impl Segmenter {
    /// Creates a segmenter that shows open regions as raw text.
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self::with_display(registry, OpenSpanDisplay::default())
    }

    /// Creates a segmenter with the given open-region policy.
    pub fn with_display(registry: Arc<PluginRegistry>, display: OpenSpanDisplay) -> Self {
        Self {
            registry,
            display,
            spans: Vec::new(),
            committed: 0,
            cursor: 0,
            finished: false,
        }
    }

    /// The plugins this segmenter consults.
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Replaces the plugins and forgets every span.
    pub fn set_registry(&mut self, registry: Arc<PluginRegistry>) {
        self.registry = registry;
        self.reset();
    }

    /// The open-region policy.
    pub fn display(&self) -> OpenSpanDisplay {
        self.display
    }

    /// Changes the open-region policy.  Committed spans are unaffected.
    pub fn set_display(&mut self, display: OpenSpanDisplay) {
        self.display = display;
    }

    /// Forgets every span so the next update scans from the start.
    pub fn reset(&mut self) {
        SEGMENT_RESETS.click();
        self.spans.clear();
        self.committed = 0;
        self.cursor = 0;
        self.finished = false;
    }

    /// Byte offset up to which the buffer is covered by final spans.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns true once an update with `is_final` has been applied.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The spans from the most recent update.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// The final spans from the most recent update.
    pub fn committed(&self) -> &[Span] {
        &self.spans[..self.committed]
    }

    /// Consumes the segmenter, returning its spans.
    pub fn into_spans(self) -> Vec<Span> {
        self.spans
    }

    /// Re-derives the spans for `buffer`, which must extend the buffer of the previous update.
    ///
    /// A buffer that is shorter than the committed prefix, or that cuts it mid-character, resets
    /// the segmenter first.
    pub fn update(&mut self, buffer: &str, is_final: bool) -> &[Span] {
        if buffer.len() < self.cursor || !buffer.is_char_boundary(self.cursor) {
            tracing::debug!(
                cursor = self.cursor,
                len = buffer.len(),
                "buffer no longer covers committed spans; rescanning"
            );
            self.reset();
        }
        self.spans.truncate(self.committed);
        SEGMENT_RESCANS.click();
        SEGMENT_RESCAN_BYTES.add((buffer.len() - self.cursor) as f64);

        let before = self.committed;
        self.scan(buffer, is_final);
        self.finished = is_final;

        let newly_committed = self.committed - before;
        if newly_committed > 0 {
            SEGMENT_SPANS_COMMITTED.count(newly_committed as u64);
            tracing::debug!(
                committed = newly_committed,
                cursor = self.cursor,
                is_final,
                "committed spans"
            );
        }
        &self.spans
    }

    fn scan(&mut self, buffer: &str, is_final: bool) {
        let registry = Arc::clone(&self.registry);
        let len = buffer.len();
        let mut pos = self.cursor;
        // Until something stays tentative, every span pushed is final and advances the cursor.
        let mut settled = true;
        loop {
            let Some((plugin, open)) = registry.earliest_start(buffer, pos) else {
                let state = if is_final {
                    SpanState::Final
                } else {
                    SpanState::Tentative
                };
                self.push_plain(buffer, pos..len, state, &mut settled);
                return;
            };
            let Some(close) = plugin.detect_end_sequence(buffer, open.end) else {
                if is_final {
                    self.push_plain(buffer, pos..len, SpanState::Final, &mut settled);
                    return;
                }
                self.push_plain(buffer, pos..open.start, SpanState::Tentative, &mut settled);
                let span = match self.display {
                    OpenSpanDisplay::Raw => Span::plain(buffer, open.start..len, SpanState::Open),
                    OpenSpanDisplay::Pending => Span::pending(buffer, plugin.name(), open),
                };
                self.spans.push(span);
                return;
            };
            let state = if is_final || close.end < len {
                SpanState::Final
            } else {
                SpanState::Tentative
            };
            self.push_plain(buffer, pos..open.start, state, &mut settled);
            let rendered = plugin.render(buffer, open.start, close.end);
            self.push(
                Span::formatted(buffer, plugin.name(), open, close, state, rendered),
                &mut settled,
            );
            pos = close.end;
        }
    }

    fn push_plain(
        &mut self,
        buffer: &str,
        range: Range<usize>,
        state: SpanState,
        settled: &mut bool,
    ) {
        if !range.is_empty() {
            self.push(Span::plain(buffer, range, state), settled);
        }
    }

    fn push(&mut self, span: Span, settled: &mut bool) {
        *settled = *settled && span.state == SpanState::Final;
        if *settled {
            self.cursor = span.range.end;
            self.committed += 1;
        }
        self.spans.push(span);
    }
}

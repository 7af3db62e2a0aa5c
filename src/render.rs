//! Terminal presentation of rendered messages.
//!
//! A [`Presenter`] receives messages of the active path and their spans.  [`PlainTextPresenter`]
//! writes them to stdout with optional ANSI styling; spans can be printed one at a time so that a
//! replayed message appears as its spans become final.

use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::{Rendered, Span, SpanKind, SpanState};
use crate::view::RenderedMessage;

/// ANSI escape code for dim text (used for open regions and placeholders).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for bold text (used for message headers).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for code languages and sibling positions).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for code).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for red text (used for stream failures).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for magenta text (used for math).
const ANSI_MAGENTA: &str = "\x1b[35m";

/// Trait for presenting conversation output.
pub trait Presenter: Send {
    /// Called before the spans of a message.
    fn start_message(&mut self, message: &RenderedMessage);

    /// Print one span.
    fn print_span(&mut self, span: &Span);

    /// Called after the spans of a message.
    fn finish_message(&mut self, message: &RenderedMessage);

    /// Print a whole message.
    fn present_message(&mut self, message: &RenderedMessage) {
        self.start_message(message);
        for span in &message.spans {
            self.print_span(span);
        }
        self.finish_message(message);
    }

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when a replay is interrupted by the user.
    fn print_interrupted(&mut self) {}

    /// Returns true if the current replay should stop.
    fn should_interrupt(&self) -> bool {
        false
    }
}

/// The header line of a message: id, author, sibling position and streaming state.
pub fn format_header(message: &RenderedMessage, use_color: bool) -> String {
    let mut header = format!("[{}]", message.message.id);
    if let Some(author) = &message.message.author {
        header.push(' ');
        header.push_str(author);
    }
    if use_color {
        header = format!("{ANSI_BOLD}{header}{ANSI_RESET}");
    }
    if message.has_siblings {
        let position = format!("< {} >", message.position);
        if use_color {
            header.push_str(&format!(" {ANSI_CYAN}{position}{ANSI_RESET}"));
        } else {
            header.push(' ');
            header.push_str(&position);
        }
    }
    if message.streaming {
        header.push_str(" (streaming)");
    }
    header
}

/// One span as terminal text.
pub fn format_span(span: &Span, use_color: bool) -> String {
    match (&span.kind, &span.rendered) {
        (SpanKind::Plain, _) if span.state == SpanState::Open && use_color => {
            format!("{ANSI_DIM}{}{ANSI_RESET}", span.raw)
        }
        (SpanKind::Plain, _) => span.raw.clone(),
        (SpanKind::Pending { plugin }, _) => {
            if use_color {
                format!("{ANSI_DIM}[{plugin}...]{ANSI_RESET}")
            } else {
                format!("[{plugin}...]")
            }
        }
        (SpanKind::Formatted { .. }, Some(rendered)) if use_color => match rendered {
            Rendered::Code { language, code } => {
                let language = language.as_deref().unwrap_or("code");
                format!("\n{ANSI_CYAN}[{language}]{ANSI_RESET}\n{ANSI_YELLOW}{code}{ANSI_RESET}")
            }
            Rendered::Math {
                display: true,
                source,
            } => format!("\n{ANSI_MAGENTA}{source}{ANSI_RESET}\n"),
            Rendered::Math {
                display: false,
                source,
            } => format!("{ANSI_MAGENTA}{source}{ANSI_RESET}"),
            Rendered::Text { text } => text.clone(),
        },
        (SpanKind::Formatted { .. }, _) => span.raw.clone(),
    }
}

/// Plain text presenter with optional ANSI styling.
pub struct PlainTextPresenter {
    stdout: Stdout,
    use_color: bool,
    interrupted: Option<Arc<AtomicBool>>,
}

impl PlainTextPresenter {
    /// Creates a new PlainTextPresenter with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextPresenter with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            interrupted: None,
        }
    }

    /// Attaches an interrupt flag to the presenter.
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(interrupted);
        self
    }

    /// Returns true if ANSI styling is enabled.
    pub fn use_color(&self) -> bool {
        self.use_color
    }

    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }
}

impl Default for PlainTextPresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Presenter for PlainTextPresenter {
    fn start_message(&mut self, message: &RenderedMessage) {
        println!("{}", format_header(message, self.use_color));
    }

    fn print_span(&mut self, span: &Span) {
        print!("{}", format_span(span, self.use_color));
        self.flush();
    }

    fn finish_message(&mut self, message: &RenderedMessage) {
        println!();
        if let Some(failure) = &message.failure {
            if self.use_color {
                println!("{ANSI_RED}[stream failed: {failure}]{ANSI_RESET}");
            } else {
                println!("[stream failed: {failure}]");
            }
        }
        println!();
    }

    fn print_error(&mut self, error: &str) {
        eprintln!("Error: {error}");
    }

    fn print_info(&mut self, info: &str) {
        println!("{info}");
    }

    fn print_interrupted(&mut self) {
        println!("\n[interrupted]");
    }

    fn should_interrupt(&self) -> bool {
        self.interrupted
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

//! Interactive viewer for branching chat transcripts.
//!
//! Loads a JSON or YAML transcript, prints the active path and lets you switch branches with
//! slash commands.
//!
//! # Usage
//!
//! ```bash
//! # Open a transcript
//! chatbranch-view conversation.json
//!
//! # Only recognize fenced code, show placeholders for unterminated regions
//! chatbranch-view --plugins fenced_code --pending-spans conversation.yaml
//!
//! # Disable colors (useful for piping output)
//! chatbranch-view --no-color conversation.json
//! ```
//!
//! # Commands
//!
//! - `/next <id>`, `/prev <id>` - Switch to the sibling after/before a message
//! - `/select <id>` - Show a message in place of its sibling
//! - `/replay <id>` - Re-stream a message chunk by chunk; Ctrl+C stops it
//! - `/help` - Show available commands
//! - `/quit` - Exit the application

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use chatbranch::commands::{ViewCommand, help_text, parse_command};
use chatbranch::{
    ConversationView, OpenSpanDisplay, PathChange, PlainTextPresenter,
    PluginRegistry, Presenter, TranscriptStore, ViewArgs, ViewConfig,
};

/// Pause before each chunk of a replayed message.
const REPLAY_DELAY: Duration = Duration::from_millis(40);

/// Main entry point for the chatbranch-view application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, free) =
        ViewArgs::from_command_line_relaxed("chatbranch-view [OPTIONS] [TRANSCRIPT]");
    let mut config = ViewConfig::from(args);
    if config.transcript_path.is_none() {
        config.transcript_path = free.first().map(PathBuf::from);
    }
    let Some(path) = config.transcript_path.clone() else {
        eprintln!("usage: chatbranch-view [OPTIONS] TRANSCRIPT");
        std::process::exit(1);
    };
    let use_color = config.use_color;
    let replay_chunk_size = config.replay_chunk_size;

    let store = TranscriptStore::new(&path);
    let mut view = ConversationView::load(&store, config).await?;

    // Flag for interrupt handling during replays
    let interrupted = Arc::new(AtomicBool::new(false));
    let mut presenter = PlainTextPresenter::with_color(use_color).with_interrupt(interrupted.clone());

    // Set up Ctrl+C handler
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    println!(
        "chatbranch ({} messages from {})",
        view.tree().len(),
        path.display()
    );
    println!("Type /help for commands, /quit to exit\n");
    report_diagnostics(&view, &mut presenter);
    present_path(&mut view, &mut presenter);

    let mut rl = DefaultEditor::new()?;
    loop {
        // Reset interrupt flag before each input
        interrupted.store(false, Ordering::Relaxed);

        let readline = rl.readline("> ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                let Some(cmd) = parse_command(line) else {
                    presenter.print_error("Not a command. Type /help for commands.");
                    continue;
                };
                match cmd {
                    ViewCommand::Quit => {
                        println!("Goodbye!");
                        break;
                    }
                    ViewCommand::Help => {
                        for line in help_text().lines() {
                            println!("    {}", line);
                        }
                    }
                    ViewCommand::Next(id) => {
                        let change = view.advance(&id);
                        present_change(&mut view, &mut presenter, &change);
                    }
                    ViewCommand::Prev(id) => {
                        let change = view.retreat(&id);
                        present_change(&mut view, &mut presenter, &change);
                    }
                    ViewCommand::Select(id) => {
                        let change = view.select_node(&id);
                        present_change(&mut view, &mut presenter, &change);
                    }
                    ViewCommand::Reveal(id) => {
                        let change = view.reveal(&id);
                        present_change(&mut view, &mut presenter, &change);
                    }
                    ViewCommand::Path => {
                        present_path(&mut view, &mut presenter);
                    }
                    ViewCommand::Tree => {
                        print_tree(&mut view);
                    }
                    ViewCommand::Diagnostics => {
                        if view.diagnostics().is_clean() {
                            presenter.print_info("No problems found.");
                        } else {
                            report_diagnostics(&view, &mut presenter);
                        }
                    }
                    ViewCommand::Replay(id) => {
                        replay(&mut view, &mut presenter, &id, replay_chunk_size).await;
                    }
                    ViewCommand::Plugins(None) => {
                        let names = view.config().plugins.names().join(", ");
                        presenter.print_info(&format!("Renderer plugins: {names}"));
                    }
                    ViewCommand::Plugins(Some(names)) => {
                        match PluginRegistry::from_names(&names) {
                            Ok(registry) => {
                                view.set_plugins(registry);
                                present_path(&mut view, &mut presenter);
                            }
                            Err(err) => presenter.print_error(&err.to_string()),
                        }
                    }
                    ViewCommand::Pending(enabled) => {
                        let display = if enabled {
                            OpenSpanDisplay::Pending
                        } else {
                            OpenSpanDisplay::Raw
                        };
                        view.set_open_span_display(display);
                        presenter.print_info(&format!("Open regions shown as {display:?}."));
                    }
                    ViewCommand::Reload => match view.reload(&store).await {
                        Ok(()) => {
                            report_diagnostics(&view, &mut presenter);
                            present_path(&mut view, &mut presenter);
                        }
                        Err(err) => {
                            presenter.print_error(&format!("Failed to reload transcript: {err}"))
                        }
                    },
                    ViewCommand::Save(target) => {
                        let target = target.map(PathBuf::from).unwrap_or_else(|| path.clone());
                        match TranscriptStore::new(&target).save(&view.transcript()) {
                            Ok(()) => presenter
                                .print_info(&format!("Transcript saved to {}", target.display())),
                            Err(err) => presenter
                                .print_error(&format!("Failed to save transcript: {err}")),
                        }
                    }
                    ViewCommand::Invalid(message) => {
                        presenter.print_error(&message);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                presenter.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

fn present_path(view: &mut ConversationView, presenter: &mut dyn Presenter) {
    let messages = view.render_path();
    if messages.is_empty() {
        presenter.print_info("(no messages)");
    }
    for message in &messages {
        presenter.present_message(message);
    }
}

fn present_change(view: &mut ConversationView, presenter: &mut dyn Presenter, change: &PathChange) {
    if !change.changed() {
        presenter.print_info("Nothing to switch to.");
        return;
    }
    let path: Vec<&str> = change.after.iter().map(|id| id.as_str()).collect();
    presenter.print_info(&format!("path: {}\n", path.join(" > ")));
    for id in change.newly_displayed() {
        if let Some(message) = view.render_message(id.as_str()) {
            presenter.present_message(&message);
        }
    }
}

fn print_tree(view: &mut ConversationView) {
    let active = view.active_path();
    for (depth, message) in view.tree().outline() {
        let marker = if active.contains(&message.id) { '*' } else { ' ' };
        let preview: String = message
            .content
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(60)
            .collect();
        println!("{marker} {}[{}] {preview}", "  ".repeat(depth), message.id);
    }
}

fn report_diagnostics(view: &ConversationView, presenter: &mut dyn Presenter) {
    let diagnostics = view.diagnostics();
    let describe = |ids: &[chatbranch::MessageId]| {
        ids.iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    if !diagnostics.orphaned.is_empty() {
        presenter.print_error(&format!(
            "messages with a missing parent: {}",
            describe(&diagnostics.orphaned)
        ));
    }
    if !diagnostics.unreachable.is_empty() {
        presenter.print_error(&format!(
            "messages no root leads to: {}",
            describe(&diagnostics.unreachable)
        ));
    }
    if !diagnostics.duplicates.is_empty() {
        presenter.print_error(&format!(
            "duplicate message ids: {}",
            describe(&diagnostics.duplicates)
        ));
    }
}

async fn replay(
    view: &mut ConversationView,
    presenter: &mut dyn Presenter,
    id: &str,
    chunk_chars: usize,
) {
    if let Err(err) = view.replay(id, chunk_chars, REPLAY_DELAY) {
        presenter.print_error(&err.to_string());
        return;
    }
    if let Some(message) = view.render_message(id) {
        presenter.start_message(&message);
    }
    let mut printed = 0;
    let mut stopped = false;
    while view.next_event().await.is_some() {
        if !stopped && presenter.should_interrupt() {
            view.cancel(id);
            stopped = true;
        }
        let spans = view.spans(id).unwrap_or_default();
        let settled = spans.iter().take_while(|span| span.is_final()).count();
        for span in &spans[printed.min(settled)..settled] {
            presenter.print_span(span);
        }
        printed = settled;
    }
    if stopped {
        presenter.print_interrupted();
        return;
    }
    let spans = view.spans(id).unwrap_or_default();
    for span in &spans[printed.min(spans.len())..] {
        presenter.print_span(span);
    }
    if let Some(message) = view.render_message(id) {
        presenter.finish_message(&message);
    }
}

//! Slash command parsing for the conversation viewer.
//!
//! Navigation is addressed by message id: `/next 2` shows the sibling after message 2 in its
//! place.

/// A parsed viewer command.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCommand {
    /// Show the sibling after the given message.
    Next(String),

    /// Show the sibling before the given message.
    Prev(String),

    /// Show the given message in place of its selected sibling.
    Select(String),

    /// Put the given message on the active path.
    Reveal(String),

    /// Print the active path.
    Path,

    /// Print every reachable message as an outline.
    Tree,

    /// Print orphaned, unreachable and duplicate messages.
    Diagnostics,

    /// Re-stream a message through the segmenter.
    Replay(String),

    /// Set the renderer plugins, or list them when `None`.
    Plugins(Option<String>),

    /// Show placeholders for open formatting while streaming.
    Pending(bool),

    /// Re-read the transcript, keeping selections.
    Reload,

    /// Save the transcript, to the given file or the one it was loaded from.
    Save(Option<String>),

    /// Display help information.
    Help,

    /// Exit the viewer.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ViewCommand)` if the input is a command, or `None` otherwise.
///
/// # Examples
///
/// ```
/// # use chatbranch::commands::{parse_command, ViewCommand};
/// assert_eq!(parse_command("/next 2"), Some(ViewCommand::Next("2".to_string())));
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("hello").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ViewCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "next" | "n" => with_id(argument, ViewCommand::Next, "/next"),
        "prev" | "p" => with_id(argument, ViewCommand::Prev, "/prev"),
        "select" | "s" => with_id(argument, ViewCommand::Select, "/select"),
        "reveal" => with_id(argument, ViewCommand::Reveal, "/reveal"),
        "replay" => with_id(argument, ViewCommand::Replay, "/replay"),
        "path" => ViewCommand::Path,
        "tree" => ViewCommand::Tree,
        "diagnostics" | "diag" => ViewCommand::Diagnostics,
        "plugins" => ViewCommand::Plugins(argument.map(|s| s.to_string())),
        "pending" => match argument.and_then(parse_on_off) {
            Some(enabled) => ViewCommand::Pending(enabled),
            None => ViewCommand::Invalid("/pending expects 'on' or 'off'".to_string()),
        },
        "reload" => ViewCommand::Reload,
        "save" => ViewCommand::Save(argument.map(|s| s.to_string())),
        "help" | "?" => ViewCommand::Help,
        "quit" | "exit" | "q" => ViewCommand::Quit,
        _ => ViewCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

fn with_id<F>(argument: Option<&str>, constructor: F, name: &str) -> ViewCommand
where
    F: Fn(String) -> ViewCommand,
{
    match argument {
        Some(id) if !id.contains(char::is_whitespace) => constructor(id.to_string()),
        Some(_) => ViewCommand::Invalid(format!("{name} expects a single message id")),
        None => ViewCommand::Invalid(format!("{name} requires a message id")),
    }
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /next <id>             Show the sibling after message <id>
  /prev <id>             Show the sibling before message <id>
  /select <id>           Show message <id> in place of its sibling
  /reveal <id>           Jump to message <id> from anywhere in the tree
  /path                  Print the active path
  /tree                  Print every reachable message
  /diagnostics           Report orphaned, unreachable and duplicate messages
  /replay <id>           Re-stream message <id> chunk by chunk (Ctrl+C stops)
  /plugins [names]       List or set renderer plugins (comma-separated)
  /pending on|off        Show placeholders for unterminated formatting
  /reload                Re-read the transcript
  /save [file]           Save the transcript
  /help                  Show this help message
  /quit                  Exit the viewer"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_navigation() {
        assert_eq!(
            parse_command("/next 2"),
            Some(ViewCommand::Next("2".to_string()))
        );
        assert_eq!(
            parse_command("  /PREV   msg-7  "),
            Some(ViewCommand::Prev("msg-7".to_string()))
        );
        assert_eq!(
            parse_command("/s 3"),
            Some(ViewCommand::Select("3".to_string()))
        );
        assert_eq!(
            parse_command("/reveal 9"),
            Some(ViewCommand::Reveal("9".to_string()))
        );
    }

    #[test]
    fn navigation_requires_one_id() {
        assert!(matches!(
            parse_command("/next"),
            Some(ViewCommand::Invalid(_))
        ));
        assert!(matches!(
            parse_command("/select 1 2"),
            Some(ViewCommand::Invalid(_))
        ));
        assert!(matches!(
            parse_command("/replay"),
            Some(ViewCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_views() {
        assert_eq!(parse_command("/path"), Some(ViewCommand::Path));
        assert_eq!(parse_command("/tree"), Some(ViewCommand::Tree));
        assert_eq!(parse_command("/diag"), Some(ViewCommand::Diagnostics));
        assert_eq!(parse_command("/reload"), Some(ViewCommand::Reload));
    }

    #[test]
    fn parse_plugins_and_pending() {
        assert_eq!(parse_command("/plugins"), Some(ViewCommand::Plugins(None)));
        assert_eq!(
            parse_command("/plugins fenced_code,inline_math"),
            Some(ViewCommand::Plugins(Some(
                "fenced_code,inline_math".to_string()
            )))
        );
        assert_eq!(parse_command("/pending on"), Some(ViewCommand::Pending(true)));
        assert_eq!(parse_command("/pending NO"), Some(ViewCommand::Pending(false)));
        assert!(matches!(
            parse_command("/pending maybe"),
            Some(ViewCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_save() {
        assert_eq!(parse_command("/save"), Some(ViewCommand::Save(None)));
        assert_eq!(
            parse_command("/save out.yaml"),
            Some(ViewCommand::Save(Some("out.yaml".to_string())))
        );
    }

    #[test]
    fn parse_quit_and_help() {
        assert_eq!(parse_command("/quit"), Some(ViewCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ViewCommand::Quit));
        assert_eq!(parse_command("/?"), Some(ViewCommand::Help));
    }

    #[test]
    fn unknown_commands_are_invalid() {
        assert_eq!(
            parse_command("/frobnicate"),
            Some(ViewCommand::Invalid("Unknown command: /frobnicate".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
    }

    #[test]
    fn help_text_not_empty() {
        let help = help_text();
        assert!(help.contains("/next"));
        assert!(help.contains("/replay"));
        assert!(help.contains("/quit"));
    }
}

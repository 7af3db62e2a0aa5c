use crate::plugin::RendererPlugin;
use crate::types::{Delimiter, Rendered};

const FENCE: &str = "```";

/// Fenced code: ```` ```lang\ncode\n``` ````.
///
/// The first line of the content is taken as the language when it is a single word; a fence
/// without a newline (```` ```x``` ````) is all code.
#[derive(Debug, Clone, Copy, Default)]
pub struct FencedCode;

impl RendererPlugin for FencedCode {
    fn name(&self) -> &str {
        "fenced_code"
    }

    fn detect_start_sequence(&self, text: &str, from: usize) -> Option<Delimiter> {
        text[from..]
            .find(FENCE)
            .map(|offset| Delimiter::at(from + offset, FENCE))
    }

    fn detect_end_sequence(&self, text: &str, from: usize) -> Option<Delimiter> {
        self.detect_start_sequence(text, from)
    }

    fn render(&self, text: &str, start: usize, end: usize) -> Rendered {
        let region = &text[start..end];
        let content = region
            .strip_prefix(FENCE)
            .and_then(|rest| rest.strip_suffix(FENCE))
            .unwrap_or(region);
        let (language, code) = split_info_string(content);
        Rendered::Code {
            language,
            code: code.to_string(),
        }
    }
}

fn split_info_string(content: &str) -> (Option<String>, &str) {
    let Some((first, rest)) = content.split_once('\n') else {
        return (None, content);
    };
    let info = first.trim();
    if info.is_empty() {
        return (None, rest);
    }
    if info.split_whitespace().count() != 1 {
        return (None, content);
    }
    (Some(info.to_string()), rest)
}

use crate::plugin::RendererPlugin;
use crate::types::{Delimiter, Rendered};

use super::find_first_of;

/// Display math: `$$ ... $$` and `\[ ... \]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayMath;

const DISPLAY_OPENERS: [&str; 2] = ["$$", "\\["];

impl RendererPlugin for DisplayMath {
    fn name(&self) -> &str {
        "display_math"
    }

    fn detect_start_sequence(&self, text: &str, from: usize) -> Option<Delimiter> {
        find_first_of(text, from, &DISPLAY_OPENERS)
    }

    fn detect_end_sequence(&self, text: &str, from: usize) -> Option<Delimiter> {
        let closer = if text[..from].ends_with("\\[") {
            "\\]"
        } else {
            "$$"
        };
        find_first_of(text, from, &[closer])
    }

    fn render(&self, text: &str, start: usize, end: usize) -> Rendered {
        Rendered::Math {
            display: true,
            source: strip_pair(&text[start..end], &[("$$", "$$"), ("\\[", "\\]")]),
        }
    }
}

/// Inline math: `$ ... $` and `\( ... \)`.
///
/// A `$` opens math only when the next character is not whitespace, `$` or an ASCII digit, so
/// prices such as `$5` stay plain text.  A `$` closes math only when the previous character is not
/// whitespace.  Dollars escaped with a backslash never count.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineMath;

impl InlineMath {
    fn find_dollar_opener(text: &str, from: usize) -> Option<Delimiter> {
        let mut cursor = from;
        while let Some(offset) = text[cursor..].find('$') {
            let at = cursor + offset;
            cursor = at + 1;
            if is_escaped(text, at) {
                continue;
            }
            match text[at + 1..].chars().next() {
                Some(next) if !next.is_whitespace() && next != '$' && !next.is_ascii_digit() => {
                    return Some(Delimiter::at(at, "$"));
                }
                _ => continue,
            }
        }
        None
    }

    fn find_dollar_closer(text: &str, from: usize) -> Option<Delimiter> {
        let mut cursor = from;
        while let Some(offset) = text[cursor..].find('$') {
            let at = cursor + offset;
            cursor = at + 1;
            if is_escaped(text, at) {
                continue;
            }
            if text[..at].chars().next_back().is_some_and(char::is_whitespace) {
                continue;
            }
            return Some(Delimiter::at(at, "$"));
        }
        None
    }
}

impl RendererPlugin for InlineMath {
    fn name(&self) -> &str {
        "inline_math"
    }

    fn detect_start_sequence(&self, text: &str, from: usize) -> Option<Delimiter> {
        let dollar = Self::find_dollar_opener(text, from);
        let paren = find_first_of(text, from, &["\\("]);
        match (dollar, paren) {
            (Some(dollar), Some(paren)) if paren.start < dollar.start => Some(paren),
            (Some(dollar), _) => Some(dollar),
            (None, paren) => paren,
        }
    }

    fn detect_end_sequence(&self, text: &str, from: usize) -> Option<Delimiter> {
        if text[..from].ends_with("\\(") {
            find_first_of(text, from, &["\\)"])
        } else {
            Self::find_dollar_closer(text, from)
        }
    }

    fn render(&self, text: &str, start: usize, end: usize) -> Rendered {
        Rendered::Math {
            display: false,
            source: strip_pair(&text[start..end], &[("\\(", "\\)"), ("$", "$")]),
        }
    }
}

fn is_escaped(text: &str, at: usize) -> bool {
    text[..at].ends_with('\\')
}

fn strip_pair(region: &str, pairs: &[(&str, &str)]) -> String {
    for (open, close) in pairs {
        if region.len() >= open.len() + close.len()
            && let Some(inner) = region
                .strip_prefix(open)
                .and_then(|rest| rest.strip_suffix(close))
        {
            return inner.trim().to_string();
        }
    }
    region.to_string()
}

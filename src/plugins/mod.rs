//! Built-in renderer plugins.
//!
//! These cover the dialects a chat transcript commonly carries.  They detect delimiters and
//! extract content; turning code or math into pixels is left to whatever presents the
//! [`Rendered`](crate::Rendered) values.

mod fenced_code;
mod math;

pub use fenced_code::FencedCode;
pub use math::{DisplayMath, InlineMath};

use crate::types::Delimiter;

/// Finds the earliest occurrence of any of `tokens` in `text` at or after `from`.
fn find_first_of(text: &str, from: usize, tokens: &[&str]) -> Option<Delimiter> {
    tokens
        .iter()
        .filter_map(|token| {
            text[from..]
                .find(token)
                .map(|offset| Delimiter::at(from + offset, token))
        })
        .min_by_key(|found| found.start)
}

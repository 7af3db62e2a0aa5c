use serde::{Deserialize, Serialize};

/// The formatted representation a renderer plugin produces for a closed region.
///
/// The segmenter treats this as opaque; presenters match on it to decide how to display a span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Rendered {
    /// A block of source code.
    Code {
        /// Language named by the fence's info string.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        /// The code with the info line removed.
        code: String,
    },

    /// A math expression, left as source for an external typesetter.
    Math {
        /// True for display (block) math, false for inline math.
        display: bool,
        /// The expression without its delimiters.
        source: String,
    },

    /// Free-form output of a custom plugin.
    Text {
        /// The formatted text.
        text: String,
    },
}

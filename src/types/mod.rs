//! Data types shared by the navigator, the segmenter and the view model.

pub mod delimiter;
pub mod message;
pub mod rendered;
pub mod span;

pub use delimiter::Delimiter;
pub use message::{Message, MessageId};
pub use rendered::Rendered;
pub use span::{Span, SpanKind, SpanState};

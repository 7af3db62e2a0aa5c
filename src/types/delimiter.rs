use std::ops::Range;

/// Byte offsets `[start, end)` of a delimiter (not the content it encloses) within a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Delimiter {
    /// Offset of the first byte of the delimiter.
    pub start: usize,
    /// Offset one past the last byte of the delimiter.
    pub end: usize,
}

impl Delimiter {
    /// Create a new `Delimiter` spanning `[start, end)`.
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Create a `Delimiter` for the `token` found at `start`.
    pub fn at(start: usize, token: &str) -> Self {
        Self::new(start, start + token.len())
    }

    /// Length of the delimiter in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if the delimiter covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The delimiter as a range.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

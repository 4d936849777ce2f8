use std::fmt::{Display, Formatter};
use std::ops::Range;
use std::sync::Arc;

/// Range of the parsed text a node was built from.
///
/// Offsets are byte offsets into the parsed string, `end` is exclusive. The optional origin tags
/// the text with the element it was read from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    start: usize,
    end: usize,
    origin: Option<Arc<str>>,
}

impl SourceLocation {
    pub fn new(start: usize, end: usize) -> Self {
        SourceLocation {
            start,
            end,
            origin: None,
        }
    }

    pub fn with_origin(start: usize, end: usize, origin: Option<Arc<str>>) -> Self {
        SourceLocation { start, end, origin }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn contains(&self, other: &SourceLocation) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Slice of `text` covered by this location, if it lies on character boundaries.
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.range())
    }
}

impl Display for SourceLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.origin {
            Some(origin) => write!(f, "{}:{}..{}", origin, self.start, self.end),
            None => write!(f, "{}..{}", self.start, self.end),
        }
    }
}

//! Lexical token model (§3): the output of the streaming tokenizer and the
//! input to the grammar parser.

use crate::position::Range;
use std::fmt::{self, Display, Formatter};

/// Semantic classification of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LexTokenKind {
    MultilineCommentOrString,
    SinglelineComment,
    String,
    Spacing,
    Brace,
    Comma,
    Other,
}

/// A single classified span of source. Lexical tokens are contiguous and
/// non-overlapping; concatenating `text` across a whole stream exactly
/// reproduces the source (§8, property 4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexToken {
    pub kind: LexTokenKind,
    pub text: String,
    pub range: Range,
}

impl LexToken {
    pub fn new(kind: LexTokenKind, text: String, range: Range) -> Self {
        Self { kind, text, range }
    }
}

impl Display for LexToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:?}) @ {}", self.kind, self.text, self.range)
    }
}

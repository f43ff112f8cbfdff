//! The two error classes of §7: input-side syntax failures and
//! implementation-side detector contract violations.

use crate::position::Index;
use std::fmt::{self, Display, Formatter};

/// An input-side failure: the source text does not conform to the
/// language's surface syntax (mismatched braces, mixed tab/space
/// indentation, an unterminated string or comment, non-parsed residue,
/// a class/function missing its `:`/`{`, …).
#[derive(Debug, Clone)]
pub struct CodeParsingError {
    pub pointer: Index,
    pub message: String,
}

impl CodeParsingError {
    pub fn new(pointer: Index, message: impl Into<String>) -> Self {
        Self { pointer, message: message.into() }
    }
}

impl Display for CodeParsingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "CodeParsingError at {}: {}", self.pointer, self.message)
    }
}

impl std::error::Error for CodeParsingError {}

/// An implementation-side failure: a language detector (or a matcher it is
/// built from) violated its contract — emitted a disallowed symbol,
/// produced a zero-length split, mis-declared a `parse_len`, or two
/// suffix-ambiguous expression-matcher patterns both completed at once.
/// This signals a bug in the detector, never in the parsed source.
#[derive(Debug, Clone)]
pub struct CodeParserImplError {
    pub what: &'static str,
    pub message: String,
}

impl CodeParserImplError {
    pub fn new(what: &'static str, message: impl Into<String>) -> Self {
        Self { what, message: message.into() }
    }
}

impl Display for CodeParserImplError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "CodeParserImplError[{}]: {}", self.what, self.message)
    }
}

impl std::error::Error for CodeParserImplError {}

/// Either of §7's two error classes, as returned by the public parsing
/// entry points — callers distinguish "your source is malformed" from
/// "this detector has a bug" by matching on the variant.
#[derive(Debug, Clone)]
pub enum ParseError {
    Syntax(CodeParsingError),
    Impl(CodeParserImplError),
}

impl From<CodeParsingError> for ParseError {
    fn from(e: CodeParsingError) -> Self {
        ParseError::Syntax(e)
    }
}

impl From<CodeParserImplError> for ParseError {
    fn from(e: CodeParserImplError) -> Self {
        ParseError::Impl(e)
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Syntax(e) => Display::fmt(e, f),
            ParseError::Impl(e) => Display::fmt(e, f),
        }
    }
}

impl std::error::Error for ParseError {}

//! Stack-based balanced-bracket tracking (§4.3).

use crate::error::{CodeParserImplError, CodeParsingError};
use crate::position::Index;

/// Tracks nesting depth over a fixed set of `(open, close)` character
/// pairs. Construction validates that every open/close character is
/// unique across the whole pair list. Non-brace characters must be
/// filtered out by the caller before being passed to [`BracesMatcher::next`].
pub struct BracesMatcher {
    pairs: Vec<(char, char)>,
    stack: Vec<char>,
}

impl BracesMatcher {
    pub fn new(pairs: Vec<(char, char)>) -> Result<Self, CodeParserImplError> {
        let mut seen = std::collections::HashSet::new();
        for &(open, close) in &pairs {
            if !seen.insert(open) || !seen.insert(close) {
                return Err(CodeParserImplError::new(
                    "BracesMatcher::new",
                    format!("bracket character reused across pairs near '{open}'/'{close}'"),
                ));
            }
        }
        Ok(Self { pairs, stack: Vec::new() })
    }

    fn closing_for(&self, open: char) -> Option<char> {
        self.pairs.iter().find(|&&(o, _)| o == open).map(|&(_, c)| c)
    }

    fn is_open(&self, ch: char) -> bool {
        self.pairs.iter().any(|&(o, _)| o == ch)
    }

    fn is_close(&self, ch: char) -> bool {
        self.pairs.iter().any(|&(_, c)| c == ch)
    }

    /// Consume one bracket character, pushing on open and popping on a
    /// matching close. Returns the resulting depth.
    pub fn next(&mut self, ch: char, at: Index) -> Result<usize, CodeParsingError> {
        if self.is_open(ch) {
            self.stack.push(ch);
        } else if self.is_close(ch) {
            match self.stack.pop() {
                Some(open) if self.closing_for(open) == Some(ch) => {}
                Some(open) => {
                    return Err(CodeParsingError::new(
                        at,
                        format!("expected '{}' to close '{}', found '{}'", self.closing_for(open).unwrap(), open, ch),
                    ));
                }
                None => {
                    return Err(CodeParsingError::new(at, format!("unmatched closing bracket '{ch}'")));
                }
            }
        } else {
            return Err(CodeParsingError::new(at, format!("'{ch}' is not a recognized bracket character")));
        }
        Ok(self.stack.len())
    }

    pub fn current_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn reset(&mut self) {
        self.stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero() -> Index {
        Index::new(0, 0)
    }

    #[test]
    fn depth_tracks_net_unmatched_opens() {
        let mut m = BracesMatcher::new(vec![('{', '}'), ('[', ']'), ('(', ')')]).unwrap();
        let depths: Vec<usize> = "{[()]}".chars().map(|c| m.next(c, zero()).unwrap()).collect();
        assert_eq!(depths, vec![1, 2, 3, 2, 1, 0]);
    }

    #[test]
    fn mismatch_throws() {
        let mut m = BracesMatcher::new(vec![('{', '}'), ('[', ']')]).unwrap();
        m.next('{', zero()).unwrap();
        assert!(m.next(']', zero()).is_err());
    }

    #[test]
    fn underflow_throws() {
        let mut m = BracesMatcher::new(vec![('{', '}')]).unwrap();
        assert!(m.next('}', zero()).is_err());
    }

    #[test]
    fn construction_rejects_reused_characters() {
        assert!(BracesMatcher::new(vec![('{', '}'), ('}', ']')]).is_err());
    }
}

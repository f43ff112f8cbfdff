//! Streaming lexical tokenizer framework (§4.4).
//!
//! The base automaton feeds one character at a time to a [`CharLexer`] and
//! asks it for an [`LexAction`] directive describing what to do with the
//! growing buffer. This is the "minimum expressive set" the design notes
//! call for: `Continue` to keep accumulating, `Emit` to flush the whole
//! buffer as one token, `SplitEmit` to flush the buffer's head and the
//! trailing `tail_len` characters as two separate tokens, and `RetainTail`
//! to flush the head but keep the tail as the start of the *next* buffer
//! (the `CONTINUATION` case — modeled as its own variant rather than an
//! overloaded token kind, per the design notes).

pub mod python;
pub mod typescript;

use crate::error::CodeParsingError;
use crate::lex::{LexToken, LexTokenKind};
use crate::position::{Index, SourceMap};
use once_cell::unsync::OnceCell;

/// What to do with the tokenizer's buffer after consuming one character.
#[derive(Debug, Clone, Copy)]
pub enum LexAction {
    /// Keep accumulating; no token boundary yet.
    Continue,
    /// Emit the entire buffer as one token, then reset.
    Emit(LexTokenKind),
    /// Emit `buffer[..len-tail_len]` as `head_kind`, then
    /// `buffer[len-tail_len..]` as `tail_kind`; reset.
    SplitEmit { head_kind: LexTokenKind, tail_kind: LexTokenKind, tail_len: usize },
    /// Emit `buffer[..len-tail_len]` as `head_kind`; keep
    /// `buffer[len-tail_len..]` as the new buffer.
    RetainTail { head_kind: LexTokenKind, tail_len: usize },
}

/// A concrete per-language character state machine.
pub trait CharLexer {
    /// Classify the buffer's state after appending `ch`.
    fn match_next(&mut self, ch: char) -> LexAction;

    /// Classify the trailing buffer once the character feed ends. Returning
    /// `None` means the buffer (if non-empty) is an unterminated construct
    /// — the driver reports it as a [`CodeParsingError`].
    fn match_end(&mut self) -> Option<LexTokenKind>;

    /// Return to the lexer's well-defined initial state.
    fn reset(&mut self);
}

/// Drives a [`CharLexer`] over a whole source string, producing the full
/// lexical token stream. Reusable across parses via [`LexicalTokenizer::reset`].
pub struct LexicalTokenizer<L: CharLexer> {
    lexer: L,
    debug_label: OnceCell<&'static str>,
}

impl<L: CharLexer> LexicalTokenizer<L> {
    pub fn new(lexer: L) -> Self {
        Self { lexer, debug_label: OnceCell::new() }
    }

    pub fn set_debug_label(&self, label: &'static str) {
        let _ = self.debug_label.set(label);
    }

    pub fn reset(&mut self) {
        self.lexer.reset();
    }

    pub fn tokenize(&mut self, source: &str) -> Result<Vec<LexToken>, CodeParsingError> {
        self.lexer.reset();
        let map = SourceMap::new(source);
        let mut tokens = Vec::new();

        let mut buffer = String::new();
        let mut buffer_start = Index::new(0, 0);
        let mut cur = Index::new(0, 0);
        let eof = map.eof();

        while cur != eof {
            let ch = map.char_at(cur);
            let next = map.next(cur);
            buffer.push(ch);
            let action = self.lexer.match_next(ch);
            #[cfg(debug_assertions)]
            if let Some(label) = self.debug_label.get() {
                eprintln!("[{label}] at {cur}: {ch:?} -> {action:?}");
            }
            apply_action(action, &mut buffer, &mut buffer_start, next, &map, &mut tokens)?;
            cur = next;
        }

        if !buffer.is_empty() {
            match self.lexer.match_end() {
                Some(kind) => tokens.push(LexToken::new(kind, buffer, crate::position::Range::new(buffer_start, eof))),
                None => {
                    return Err(CodeParsingError::new(buffer_start, "unterminated construct at end of input"));
                }
            }
        }

        Ok(tokens)
    }
}

fn apply_action(
    action: LexAction,
    buffer: &mut String,
    buffer_start: &mut Index,
    cur_end: Index,
    map: &SourceMap,
    tokens: &mut Vec<LexToken>,
) -> Result<(), CodeParsingError> {
    match action {
        LexAction::Continue => {}
        LexAction::Emit(kind) => {
            let text = std::mem::take(buffer);
            tokens.push(LexToken::new(kind, text, crate::position::Range::new(*buffer_start, cur_end)));
            *buffer_start = cur_end;
        }
        LexAction::SplitEmit { head_kind, tail_kind, tail_len } => {
            let chars: Vec<char> = buffer.chars().collect();
            if tail_len == 0 || tail_len >= chars.len() {
                return Err(CodeParsingError::new(*buffer_start, "SplitEmit requires a non-empty head and tail"));
            }
            let split_at = chars.len() - tail_len;
            let head: String = chars[..split_at].iter().collect();
            let tail: String = chars[split_at..].iter().collect();
            let mid = char_offset_index(*buffer_start, split_at, map);
            tokens.push(LexToken::new(head_kind, head, crate::position::Range::new(*buffer_start, mid)));
            tokens.push(LexToken::new(tail_kind, tail, crate::position::Range::new(mid, cur_end)));
            buffer.clear();
            *buffer_start = cur_end;
        }
        LexAction::RetainTail { head_kind, tail_len } => {
            let chars: Vec<char> = buffer.chars().collect();
            if tail_len == 0 || tail_len >= chars.len() {
                return Err(CodeParsingError::new(*buffer_start, "RetainTail requires a non-empty head and tail"));
            }
            let split_at = chars.len() - tail_len;
            let head: String = chars[..split_at].iter().collect();
            let tail: String = chars[split_at..].iter().collect();
            let mid = char_offset_index(*buffer_start, split_at, map);
            tokens.push(LexToken::new(head_kind, head, crate::position::Range::new(*buffer_start, mid)));
            *buffer = tail;
            *buffer_start = mid;
        }
    }
    Ok(())
}

fn char_offset_index(start: Index, offset: usize, map: &SourceMap) -> Index {
    let mut idx = start;
    for _ in 0..offset {
        idx = map.next(idx);
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_round_trip_reconstructs_source() {
        let source = "class A:\n    x: int = 1\n";
        let mut tokenizer = LexicalTokenizer::new(python::PythonLexer::new());
        let tokens = tokenizer.tokenize(source).unwrap();
        let rebuilt: String = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(rebuilt, source);
    }
}

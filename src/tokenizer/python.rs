//! Python's character state machine (§4.4).
//!
//! Tracks whether it is inside a single/double/triple-quoted string or a
//! `#` comment, an escape-seen bit, and (while deciding whether `''`/`""`
//! opens an empty string or a triple-quoted one) a run of consecutive
//! identical opening quote characters.

use super::{CharLexer, LexAction};
use crate::lex::LexTokenKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    LineComment,
    /// Seen `run` consecutive copies of `quote` with no content yet — still
    /// deciding between an empty string (`run == 2` then a different char)
    /// and a triple-quoted string (`run` reaches 3).
    StringOpening { quote: char, run: u8 },
    InString { quote: char },
    InTripleString { quote: char, closing_run: u8 },
}

fn is_brace(ch: char) -> bool {
    matches!(ch, '(' | ')' | '[' | ']' | '{' | '}')
}

fn classify_plain(ch: char) -> LexTokenKind {
    match ch {
        ' ' | '\t' | '\n' => LexTokenKind::Spacing,
        _ => LexTokenKind::Other,
    }
}

pub struct PythonLexer {
    mode: Mode,
    run_kind: Option<LexTokenKind>,
    escape: bool,
}

impl PythonLexer {
    pub fn new() -> Self {
        Self { mode: Mode::Normal, run_kind: None, escape: false }
    }

    fn start_token(&mut self, ch: char, prev: Option<LexTokenKind>) -> LexAction {
        if ch == '#' {
            self.mode = Mode::LineComment;
            match prev {
                None => LexAction::Continue,
                Some(k) => LexAction::RetainTail { head_kind: k, tail_len: 1 },
            }
        } else if ch == '\'' || ch == '"' {
            self.mode = Mode::StringOpening { quote: ch, run: 1 };
            match prev {
                None => LexAction::Continue,
                Some(k) => LexAction::RetainTail { head_kind: k, tail_len: 1 },
            }
        } else if is_brace(ch) {
            match prev {
                None => LexAction::Emit(LexTokenKind::Brace),
                Some(k) => LexAction::SplitEmit { head_kind: k, tail_kind: LexTokenKind::Brace, tail_len: 1 },
            }
        } else if ch == ',' {
            match prev {
                None => LexAction::Emit(LexTokenKind::Comma),
                Some(k) => LexAction::SplitEmit { head_kind: k, tail_kind: LexTokenKind::Comma, tail_len: 1 },
            }
        } else {
            self.run_kind = Some(classify_plain(ch));
            match prev {
                None => LexAction::Continue,
                Some(k) => LexAction::RetainTail { head_kind: k, tail_len: 1 },
            }
        }
    }
}

impl Default for PythonLexer {
    fn default() -> Self {
        Self::new()
    }
}

impl CharLexer for PythonLexer {
    fn match_next(&mut self, ch: char) -> LexAction {
        match self.mode {
            Mode::LineComment => {
                if ch == '\n' {
                    self.mode = Mode::Normal;
                    self.run_kind = Some(LexTokenKind::Spacing);
                    LexAction::RetainTail { head_kind: LexTokenKind::SinglelineComment, tail_len: 1 }
                } else {
                    LexAction::Continue
                }
            }
            Mode::StringOpening { quote, run } => {
                if ch == quote {
                    if run == 1 {
                        self.mode = Mode::StringOpening { quote, run: 2 };
                        LexAction::Continue
                    } else {
                        self.mode = Mode::InTripleString { quote, closing_run: 0 };
                        LexAction::Continue
                    }
                } else if run == 2 {
                    // buffer is exactly the empty string `quote quote`; ch starts the next token.
                    self.mode = Mode::Normal;
                    self.run_kind = None;
                    if is_brace(ch) {
                        LexAction::SplitEmit { head_kind: LexTokenKind::String, tail_kind: LexTokenKind::Brace, tail_len: 1 }
                    } else if ch == ',' {
                        LexAction::SplitEmit { head_kind: LexTokenKind::String, tail_kind: LexTokenKind::Comma, tail_len: 1 }
                    } else {
                        self.start_token(ch, Some(LexTokenKind::String))
                    }
                } else {
                    // run == 1: an ordinary string body has begun; ch is its first content character.
                    self.mode = Mode::InString { quote };
                    self.escape = ch == '\\';
                    LexAction::Continue
                }
            }
            Mode::InString { quote } => {
                if self.escape {
                    self.escape = false;
                    LexAction::Continue
                } else if ch == '\\' {
                    self.escape = true;
                    LexAction::Continue
                } else if ch == quote {
                    self.mode = Mode::Normal;
                    self.run_kind = None;
                    LexAction::Emit(LexTokenKind::String)
                } else {
                    LexAction::Continue
                }
            }
            Mode::InTripleString { quote, closing_run } => {
                if ch == quote {
                    if closing_run + 1 == 3 {
                        self.mode = Mode::Normal;
                        self.run_kind = None;
                        LexAction::Emit(LexTokenKind::MultilineCommentOrString)
                    } else {
                        self.mode = Mode::InTripleString { quote, closing_run: closing_run + 1 };
                        LexAction::Continue
                    }
                } else {
                    self.mode = Mode::InTripleString { quote, closing_run: 0 };
                    LexAction::Continue
                }
            }
            Mode::Normal => {
                if ch == '#' || ch == '\'' || ch == '"' || is_brace(ch) || ch == ',' {
                    let prev = self.run_kind.take();
                    self.start_token(ch, prev)
                } else {
                    let cls = classify_plain(ch);
                    match self.run_kind {
                        None => {
                            self.run_kind = Some(cls);
                            LexAction::Continue
                        }
                        Some(k) if k == cls => LexAction::Continue,
                        Some(k) => {
                            self.run_kind = Some(cls);
                            LexAction::RetainTail { head_kind: k, tail_len: 1 }
                        }
                    }
                }
            }
        }
    }

    fn match_end(&mut self) -> Option<LexTokenKind> {
        match self.mode {
            Mode::Normal => self.run_kind,
            Mode::LineComment => Some(LexTokenKind::SinglelineComment),
            Mode::StringOpening { run: 2, .. } => Some(LexTokenKind::String),
            Mode::StringOpening { .. } | Mode::InString { .. } | Mode::InTripleString { .. } => None,
        }
    }

    fn reset(&mut self) {
        self.mode = Mode::Normal;
        self.run_kind = None;
        self.escape = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::LexicalTokenizer;

    fn tokenize(src: &str) -> Vec<(LexTokenKind, String)> {
        let mut t = LexicalTokenizer::new(PythonLexer::new());
        t.tokenize(src).unwrap().into_iter().map(|tok| (tok.kind, tok.text)).collect()
    }

    #[test]
    fn classifies_comment_string_and_braces() {
        let toks = tokenize("f(x) # hi\n");
        assert_eq!(
            toks,
            vec![
                (LexTokenKind::Other, "f".into()),
                (LexTokenKind::Brace, "(".into()),
                (LexTokenKind::Other, "x".into()),
                (LexTokenKind::Brace, ")".into()),
                (LexTokenKind::Spacing, " ".into()),
                (LexTokenKind::SinglelineComment, "# hi".into()),
                (LexTokenKind::Spacing, "\n".into()),
            ]
        );
    }

    #[test]
    fn triple_quoted_string_is_one_token() {
        let toks = tokenize("\"\"\"doc\"\"\"\n");
        assert_eq!(toks[0], (LexTokenKind::MultilineCommentOrString, "\"\"\"doc\"\"\"".into()));
    }

    #[test]
    fn empty_string_does_not_upgrade_to_triple() {
        let toks = tokenize("''\n");
        assert_eq!(toks[0], (LexTokenKind::String, "''".into()));
    }

    #[test]
    fn unterminated_string_is_a_parsing_error() {
        let mut t = LexicalTokenizer::new(PythonLexer::new());
        assert!(t.tokenize("'abc").is_err());
    }
}

//! TypeScript-like character state machine (§4.4).
//!
//! Multi-character delimiters (`//`, `/*`, `*/`) are detected with the same
//! [`StringExpressionMatcher`] used to ground §4.2 — a concrete instance of
//! the streaming multi-pattern matcher doing real work inside a lexer,
//! rather than only in its own unit tests.

use super::{CharLexer, LexAction};
use crate::expression_matcher::{string_patterns, StringExpressionMatcher};
use crate::lex::LexTokenKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DelimKey {
    LineComment,
    BlockStart,
    BlockEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    LineComment,
    BlockComment,
    InString { quote: char },
    InTemplate,
    PendingEquals,
}

fn is_brace(ch: char) -> bool {
    matches!(ch, '(' | ')' | '[' | ']' | '{' | '}')
}

fn classify_plain(ch: char) -> LexTokenKind {
    match ch {
        ' ' | '\t' | '\n' | ';' => LexTokenKind::Spacing,
        _ => LexTokenKind::Other,
    }
}

pub struct TypeScriptLexer {
    mode: Mode,
    run_kind: Option<LexTokenKind>,
    run_len: usize,
    escape: bool,
    open_matcher: StringExpressionMatcher<DelimKey>,
    close_matcher: StringExpressionMatcher<DelimKey>,
}

impl TypeScriptLexer {
    pub fn new() -> Self {
        Self {
            mode: Mode::Normal,
            run_kind: None,
            run_len: 0,
            escape: false,
            open_matcher: StringExpressionMatcher::new(string_patterns(vec![
                (DelimKey::LineComment, "//"),
                (DelimKey::BlockStart, "/*"),
            ]))
            .unwrap(),
            close_matcher: StringExpressionMatcher::new(string_patterns(vec![(DelimKey::BlockEnd, "*/")])).unwrap(),
        }
    }

    fn merge_or_start(&mut self, ch: char) -> LexAction {
        let cls = classify_plain(ch);
        match self.run_kind {
            None => {
                self.run_kind = Some(cls);
                self.run_len = 1;
                LexAction::Continue
            }
            Some(k) if k == cls => {
                self.run_len += 1;
                LexAction::Continue
            }
            Some(k) => {
                self.run_kind = Some(cls);
                self.run_len = 1;
                LexAction::RetainTail { head_kind: k, tail_len: 1 }
            }
        }
    }

    /// Enter a single-character-determined sub-lexeme (string/template
    /// opener). `prev` is the run that was accumulating right before `ch`.
    fn open_delimited(&mut self, new_mode: Mode, prev: Option<LexTokenKind>) -> LexAction {
        self.mode = new_mode;
        self.run_kind = None;
        self.run_len = 0;
        match prev {
            None => LexAction::Continue,
            Some(k) => LexAction::RetainTail { head_kind: k, tail_len: 1 },
        }
    }
}

impl Default for TypeScriptLexer {
    fn default() -> Self {
        Self::new()
    }
}

impl CharLexer for TypeScriptLexer {
    fn match_next(&mut self, ch: char) -> LexAction {
        match self.mode {
            Mode::LineComment => {
                if ch == '\n' {
                    self.mode = Mode::Normal;
                    self.run_kind = Some(LexTokenKind::Spacing);
                    self.run_len = 1;
                    LexAction::RetainTail { head_kind: LexTokenKind::SinglelineComment, tail_len: 1 }
                } else {
                    LexAction::Continue
                }
            }
            Mode::BlockComment => {
                if self.close_matcher.next(ch).unwrap().is_some() {
                    self.mode = Mode::Normal;
                    self.close_matcher.reset();
                    LexAction::Emit(LexTokenKind::MultilineCommentOrString)
                } else {
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
                    LexAction::Emit(LexTokenKind::String)
                } else {
                    LexAction::Continue
                }
            }
            Mode::InTemplate => {
                if self.escape {
                    self.escape = false;
                    LexAction::Continue
                } else if ch == '\\' {
                    self.escape = true;
                    LexAction::Continue
                } else if ch == '`' {
                    self.mode = Mode::Normal;
                    LexAction::Emit(LexTokenKind::String)
                } else {
                    LexAction::Continue
                }
            }
            Mode::PendingEquals => {
                if ch == '>' {
                    self.mode = Mode::Normal;
                    self.run_kind = Some(LexTokenKind::Other);
                    self.run_len = 2;
                    LexAction::Continue
                } else {
                    self.mode = Mode::Normal;
                    self.run_kind = None;
                    self.run_len = 0;
                    self.dispatch_normal(ch, Some(LexTokenKind::Other))
                }
            }
            Mode::Normal => {
                let open_hit = self.open_matcher.next(ch).unwrap();
                if let Some(key) = open_hit {
                    let head_kind = self.run_kind;
                    let flush_needed = self.run_len > 1;
                    self.mode = match key {
                        DelimKey::LineComment => Mode::LineComment,
                        DelimKey::BlockStart => {
                            self.close_matcher.reset();
                            Mode::BlockComment
                        }
                        DelimKey::BlockEnd => unreachable!("open_matcher only tracks //, /*"),
                    };
                    self.run_kind = None;
                    self.run_len = 0;
                    if flush_needed {
                        LexAction::RetainTail { head_kind: head_kind.unwrap(), tail_len: 2 }
                    } else {
                        LexAction::Continue
                    }
                } else {
                    self.dispatch_normal(ch, self.run_kind)
                }
            }
        }
    }

    fn match_end(&mut self) -> Option<LexTokenKind> {
        match self.mode {
            Mode::Normal => self.run_kind,
            Mode::LineComment => Some(LexTokenKind::SinglelineComment),
            Mode::PendingEquals => Some(LexTokenKind::Other),
            Mode::BlockComment | Mode::InString { .. } | Mode::InTemplate => None,
        }
    }

    fn reset(&mut self) {
        self.mode = Mode::Normal;
        self.run_kind = None;
        self.run_len = 0;
        self.escape = false;
        self.open_matcher.reset();
        self.close_matcher.reset();
    }
}

impl TypeScriptLexer {
    fn dispatch_normal(&mut self, ch: char, prev: Option<LexTokenKind>) -> LexAction {
        if ch == '\'' || ch == '"' {
            let quote = ch;
            self.open_delimited(Mode::InString { quote }, prev)
        } else if ch == '`' {
            self.open_delimited(Mode::InTemplate, prev)
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
        } else if ch == '=' {
            self.mode = Mode::PendingEquals;
            self.run_kind = None;
            self.run_len = 0;
            match prev {
                None => LexAction::Continue,
                Some(k) => LexAction::RetainTail { head_kind: k, tail_len: 1 },
            }
        } else {
            self.merge_or_start(ch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::LexicalTokenizer;

    fn tokenize(src: &str) -> Vec<(LexTokenKind, String)> {
        let mut t = LexicalTokenizer::new(TypeScriptLexer::new());
        t.tokenize(src).unwrap().into_iter().map(|tok| (tok.kind, tok.text)).collect()
    }

    #[test]
    fn line_comment_is_its_own_token() {
        let toks = tokenize("x // hi\n");
        assert_eq!(toks[2], (LexTokenKind::SinglelineComment, "// hi".into()));
    }

    #[test]
    fn block_comment_is_one_token() {
        let toks = tokenize("/** hello */\n");
        assert_eq!(toks[0], (LexTokenKind::MultilineCommentOrString, "/** hello */".into()));
    }

    #[test]
    fn semicolon_is_spacing() {
        let toks = tokenize("x;\n");
        assert_eq!(toks[1].0, LexTokenKind::Spacing);
    }

    #[test]
    fn arrow_is_merged_other_token() {
        let toks = tokenize("a=>b\n");
        assert_eq!(toks[1], (LexTokenKind::Other, "=>".into()));
    }

    #[test]
    fn single_char_run_before_line_comment_is_not_swallowed() {
        let toks = tokenize("5//2\n");
        assert_eq!(toks[0], (LexTokenKind::Other, "5".into()));
        assert_eq!(toks[1], (LexTokenKind::SinglelineComment, "//2".into()));
    }

    #[test]
    fn single_char_run_before_block_comment_is_not_swallowed() {
        let toks = tokenize("x/* c */\n");
        assert_eq!(toks[0], (LexTokenKind::Other, "x".into()));
        assert_eq!(toks[1], (LexTokenKind::MultilineCommentOrString, "/* c */".into()));
    }
}

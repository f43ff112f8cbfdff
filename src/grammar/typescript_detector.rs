//! The TypeScript-like language detector (§4.7).
//!
//! Statement extent is found by tracking bracket depth across the whole
//! statement rather than literally running the three named matchers
//! (general, curly, type) side by side — `;` and `\n` are both folded into
//! `SPACING` by the lexer, so termination is decided by scanning a
//! `Spacing` token's text for either character at the matching depth.
//! Function shape detection (`(args) [: RetType] { body }`) is attempted at
//! every statement start and simply fails to match non-function statements,
//! which is what naturally demotes them to `STATEMENTS_FILLER`.

use crate::error::{CodeParsingError, ParseError};
use crate::grammar::{
    apply_directive, GrammarSymbol, LanguageDetector, NodeCreation, NonTerminal,
    SymbolAdditionDirective, SymbolEntry, Terminal,
};
use crate::lex::{LexToken, LexTokenKind};
use crate::position::Range;

const CONTROL_KEYWORDS: &[&str] = &["if", "for", "while", "switch", "catch", "do", "else"];

#[derive(Default)]
pub struct TypeScriptDetector;

impl TypeScriptDetector {
    pub fn new() -> Self {
        Self
    }

    fn detect_block(
        &mut self,
        tokens: &[LexToken],
        range: std::ops::Range<usize>,
        in_classes: bool,
    ) -> Result<Vec<SymbolEntry>, ParseError> {
        let mut entries = Vec::new();
        let mut i = range.start;
        while i < range.end {
            if tokens[i].kind == LexTokenKind::Spacing {
                let s = i;
                while i < range.end && tokens[i].kind == LexTokenKind::Spacing {
                    i += 1;
                }
                entries.push(filler_entry(tokens, s..i)?);
                continue;
            }
            if tokens[i].kind == LexTokenKind::MultilineCommentOrString {
                entries.push(one_symbol_entry(
                    tokens,
                    i..i + 1,
                    GrammarSymbol::Terminal(Terminal::CommentMultiline),
                    NodeCreation::Comment { is_multi_line: true, contents: strip_block_comment(&tokens[i].text) },
                    None,
                )?);
                i += 1;
                continue;
            }
            if tokens[i].kind == LexTokenKind::SinglelineComment {
                entries.push(one_symbol_entry(
                    tokens,
                    i..i + 1,
                    GrammarSymbol::Terminal(Terminal::CommentSingleline),
                    NodeCreation::Comment { is_multi_line: false, contents: strip_line_comment(&tokens[i].text) },
                    None,
                )?);
                i += 1;
                continue;
            }
            if let Some((next_i, entry)) = self.try_function(tokens, i, range.end)? {
                entries.push(entry);
                i = next_i;
                continue;
            }

            let word = leading_word(tokens, i);
            if word == "class" || word == "interface" {
                let (next_i, entry) = self.scan_class(tokens, i, range.end, &word)?;
                entries.push(entry);
                i = next_i;
                continue;
            }

            let stmt_end = ts_statement_end(tokens, i, range.end);
            let text = joined_text(tokens, i..stmt_end);
            if !in_classes && (word == "import" || (word == "export" && text.contains("from"))) {
                let entry = self.scan_reference(tokens, i, stmt_end, &text)?;
                entries.push(entry);
                i = stmt_end;
                continue;
            }
            if in_classes {
                if let Some(entry) = self.try_attribute(tokens, i, stmt_end)? {
                    entries.push(entry);
                    i = stmt_end;
                    continue;
                }
            }
            entries.push(statements_filler_entry(tokens, i, stmt_end)?);
            i = stmt_end;
        }
        Ok(entries)
    }

    /// `(args) [: RetType] { body }`, starting at `start`. Returns `None`
    /// (never an error) when the shape doesn't match — the caller treats
    /// that as "this is not a function", matching §4.7's downgrade rule.
    fn try_function(&self, tokens: &[LexToken], start: usize, end: usize) -> Result<Option<(usize, SymbolEntry)>, ParseError> {
        if CONTROL_KEYWORDS.contains(&leading_word(tokens, start).as_str()) {
            return Ok(None);
        }
        let full_end = ts_statement_end(tokens, start, end);

        let Some(open_paren) = (start..full_end).find(|&i| tokens[i].kind == LexTokenKind::Brace && tokens[i].text == "(") else {
            return Ok(None);
        };
        let Some(close_paren) = matching_close(tokens, open_paren, full_end) else {
            return Ok(None);
        };

        let mut k = close_paren + 1;
        let mut type_depth = 0i32;
        let mut open_curly = None;
        while k < full_end {
            if tokens[k].kind == LexTokenKind::Brace {
                let ch = tokens[k].text.chars().next().unwrap_or(' ');
                if ch == '{' && type_depth == 0 {
                    open_curly = Some(k);
                    break;
                }
                if "([{".contains(ch) {
                    type_depth += 1;
                } else {
                    type_depth -= 1;
                }
            }
            k += 1;
        }
        let Some(open_curly) = open_curly else {
            return Ok(None);
        };
        let Some(close_curly) = matching_close(tokens, open_curly, full_end) else {
            return Ok(None);
        };
        if (close_curly + 1..full_end).any(|t| tokens[t].kind != LexTokenKind::Spacing) {
            return Ok(None);
        }

        let header_text = joined_text(tokens, start..open_curly + 1);
        let full_range = Range::new(tokens[start].range.start, tokens[close_curly].range.end);
        let parse_range = Range::new(tokens[open_curly].range.end, tokens[close_curly].range.start);
        Ok(Some((
            close_curly + 1,
            SymbolEntry {
                symbol: GrammarSymbol::NonTerminal(NonTerminal::Functions),
                range: full_range,
                parse_range: Some(parse_range),
                node: NodeCreation::Function { header_text },
            },
        )))
    }

    fn scan_class(
        &self,
        tokens: &[LexToken],
        start: usize,
        end: usize,
        keyword: &str,
    ) -> Result<(usize, SymbolEntry), ParseError> {
        let mut depth = 0i32;
        let mut j = start;
        let mut open_curly = None;
        while j < end {
            if tokens[j].kind == LexTokenKind::Brace {
                let ch = tokens[j].text.chars().next().unwrap_or(' ');
                if ch == '{' && depth == 0 {
                    open_curly = Some(j);
                    break;
                }
                if "([{".contains(ch) {
                    depth += 1;
                } else {
                    depth -= 1;
                }
            }
            j += 1;
        }
        let open_curly =
            open_curly.ok_or_else(|| CodeParsingError::new(tokens[start].range.start, "class/interface missing '{'"))?;
        let close_curly = matching_close(tokens, open_curly, end)
            .ok_or_else(|| CodeParsingError::new(tokens[open_curly].range.start, "class/interface missing closing '}'"))?;

        let header_text = joined_text(tokens, start..open_curly + 1);
        let full_range = Range::new(tokens[start].range.start, tokens[close_curly].range.end);
        let parse_range = Range::new(tokens[open_curly].range.end, tokens[close_curly].range.start);
        Ok((
            close_curly + 1,
            SymbolEntry {
                symbol: GrammarSymbol::NonTerminal(NonTerminal::Classes),
                range: full_range,
                parse_range: Some(parse_range),
                node: NodeCreation::Class { class_type: Some(keyword.to_string()), header_text },
            },
        ))
    }

    fn scan_reference(&self, tokens: &[LexToken], start: usize, stmt_end: usize, text: &str) -> Result<SymbolEntry, ParseError> {
        let literal = (start..stmt_end).rev().find(|&i| tokens[i].kind == LexTokenKind::String);
        let path = match literal {
            Some(i) => resolve_reference_path(tokens[i].text.trim_matches(|c| c == '"' || c == '\'')),
            None => String::new(),
        };
        one_symbol_entry(
            tokens,
            start..stmt_end,
            GrammarSymbol::Terminal(Terminal::References),
            NodeCreation::Reference { reference_text: text.to_string(), ref_relative_path: path },
            None,
        )
    }

    /// Called with the full `Functions` range (header and body); only the
    /// parameter list is classified, same simplification as the Python
    /// detector.
    fn detect_function_declaration(&self, tokens: &[LexToken], range: std::ops::Range<usize>) -> Result<Vec<SymbolEntry>, ParseError> {
        let mut entries = Vec::new();
        let Some(open) = (range.start..range.end).find(|&i| tokens[i].kind == LexTokenKind::Brace && tokens[i].text == "(") else {
            return Ok(entries);
        };
        let mut depth = 1i32;
        let mut j = open + 1;
        let mut piece_start = j;
        while j < range.end && depth > 0 {
            match tokens[j].kind {
                LexTokenKind::Brace => {
                    let ch = tokens[j].text.chars().next().unwrap_or(' ');
                    if "([{".contains(ch) {
                        depth += 1;
                    } else {
                        depth -= 1;
                    }
                    if depth == 0 {
                        if let Some(entry) = self.argument_entry(tokens, piece_start, j)? {
                            entries.push(entry);
                        }
                    }
                }
                LexTokenKind::Comma if depth == 1 => {
                    if let Some(entry) = self.argument_entry(tokens, piece_start, j)? {
                        entries.push(entry);
                    }
                    piece_start = j + 1;
                }
                _ => {}
            }
            j += 1;
        }
        Ok(entries)
    }

    fn argument_entry(&self, tokens: &[LexToken], start: usize, end: usize) -> Result<Option<SymbolEntry>, ParseError> {
        let Some(first) = (start..end).find(|&i| tokens[i].kind != LexTokenKind::Spacing) else {
            return Ok(None);
        };
        let last = (start..end).rev().find(|&i| tokens[i].kind != LexTokenKind::Spacing).unwrap();
        let raw = joined_text(tokens, first..last + 1).replace('\n', " ");
        let before_eq = raw.split('=').next().unwrap_or(&raw).trim();
        let (name, ty) = match before_eq.split_once(':') {
            Some((n, t)) => (n.trim().to_string(), Some(t.trim().to_string())),
            None => (before_eq.to_string(), None),
        };
        if name.is_empty() {
            return Ok(None);
        }
        Ok(Some(one_symbol_entry(
            tokens,
            first..last + 1,
            GrammarSymbol::Terminal(Terminal::Argument),
            NodeCreation::Argument { name, arg_type: ty },
            None,
        )?))
    }

    fn detect_function_body(&self, tokens: &[LexToken], range: std::ops::Range<usize>) -> Result<Vec<SymbolEntry>, ParseError> {
        let mut entries = Vec::new();
        let mut i = range.start;
        while i < range.end {
            match tokens[i].kind {
                LexTokenKind::Spacing => {
                    let s = i;
                    while i < range.end && tokens[i].kind == LexTokenKind::Spacing {
                        i += 1;
                    }
                    entries.push(filler_entry(tokens, s..i)?);
                }
                LexTokenKind::SinglelineComment => {
                    entries.push(one_symbol_entry(
                        tokens,
                        i..i + 1,
                        GrammarSymbol::Terminal(Terminal::CommentSingleline),
                        NodeCreation::Comment { is_multi_line: false, contents: strip_line_comment(&tokens[i].text) },
                        None,
                    )?);
                    i += 1;
                }
                LexTokenKind::MultilineCommentOrString => {
                    entries.push(one_symbol_entry(
                        tokens,
                        i..i + 1,
                        GrammarSymbol::Terminal(Terminal::CommentMultiline),
                        NodeCreation::Comment { is_multi_line: true, contents: strip_block_comment(&tokens[i].text) },
                        None,
                    )?);
                    i += 1;
                }
                _ => {
                    let stmt_end = ts_statement_end(tokens, i, range.end);
                    entries.push(statements_filler_entry(tokens, i, stmt_end)?);
                    i = stmt_end;
                }
            }
        }
        Ok(entries)
    }

    fn try_attribute(&self, tokens: &[LexToken], start: usize, stmt_end: usize) -> Result<Option<SymbolEntry>, ParseError> {
        let mut depth = 0i32;
        let mut colon = None;
        for k in start..stmt_end {
            match tokens[k].kind {
                LexTokenKind::Brace => {
                    let ch = tokens[k].text.chars().next().unwrap_or(' ');
                    if "([{".contains(ch) {
                        depth += 1;
                    } else {
                        depth -= 1;
                    }
                }
                LexTokenKind::Other if depth == 0 => {
                    if let Some(pos) = tokens[k].text.find(':') {
                        colon = Some((k, pos));
                        break;
                    }
                }
                _ => {}
            }
        }
        let Some((colon_tok, colon_pos)) = colon else {
            return Ok(None);
        };
        let name = format!("{}{}", joined_text(tokens, start..colon_tok), &tokens[colon_tok].text[..colon_pos]);
        let name = name.trim().to_string();
        if name.is_empty() {
            return Ok(None);
        }
        let after_colon =
            format!("{}{}", &tokens[colon_tok].text[colon_pos + 1..], joined_text(tokens, colon_tok + 1..stmt_end));
        let ty = after_colon.split('=').next().unwrap_or("").trim();
        let ty = if ty.is_empty() { None } else { Some(ty.to_string()) };
        Ok(Some(one_symbol_entry(
            tokens,
            start..stmt_end,
            GrammarSymbol::Terminal(Terminal::Attributes),
            NodeCreation::Attribute { name, attr_type: ty },
            None,
        )?))
    }
}

impl LanguageDetector for TypeScriptDetector {
    fn is_comment_before_function(&self) -> bool {
        true
    }

    fn detect(
        &mut self,
        tokens: &[LexToken],
        range_in_tokens: std::ops::Range<usize>,
        nt: NonTerminal,
    ) -> Result<Vec<SymbolEntry>, ParseError> {
        match nt {
            NonTerminal::TopLevel => self.detect_block(tokens, range_in_tokens, false),
            NonTerminal::Classes => self.detect_block(tokens, range_in_tokens, true),
            NonTerminal::FunctionDeclaration => self.detect_function_declaration(tokens, range_in_tokens),
            NonTerminal::FunctionBody => self.detect_function_body(tokens, range_in_tokens),
        }
    }
}

fn one_symbol_entry(
    tokens: &[LexToken],
    range: std::ops::Range<usize>,
    symbol: GrammarSymbol,
    node: NodeCreation,
    parse_range: Option<Range>,
) -> Result<SymbolEntry, ParseError> {
    let buffer: Vec<&LexToken> = tokens[range].iter().collect();
    let (mut entries, _) = apply_directive(SymbolAdditionDirective::OneSymbol { symbol, node, parse_range }, &buffer)?;
    Ok(entries.remove(0))
}

fn filler_entry(tokens: &[LexToken], range: std::ops::Range<usize>) -> Result<SymbolEntry, ParseError> {
    one_symbol_entry(tokens, range, GrammarSymbol::Terminal(Terminal::Filler), NodeCreation::None, None)
}

fn statements_filler_entry(tokens: &[LexToken], start: usize, end: usize) -> Result<SymbolEntry, ParseError> {
    one_symbol_entry(tokens, start..end, GrammarSymbol::Terminal(Terminal::StatementsFiller), NodeCreation::None, None)
}

fn leading_word(tokens: &[LexToken], idx: usize) -> String {
    if tokens[idx].kind == LexTokenKind::Other {
        tokens[idx].text.clone()
    } else {
        String::new()
    }
}

fn joined_text(tokens: &[LexToken], range: std::ops::Range<usize>) -> String {
    tokens[range].iter().map(|t| t.text.as_str()).collect()
}

/// The token at `open` must be a `Brace` opener; returns the index of its
/// matching closer within `[open, end)`, tracking nested brackets of every
/// kind (not just its own).
fn matching_close(tokens: &[LexToken], open: usize, end: usize) -> Option<usize> {
    let opener = tokens[open].text.chars().next()?;
    let closer = match opener {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        _ => return None,
    };
    let mut depth = 1i32;
    let mut j = open + 1;
    while j < end {
        if tokens[j].kind == LexTokenKind::Brace {
            let ch = tokens[j].text.chars().next().unwrap_or(' ');
            if ch == opener {
                depth += 1;
            } else if ch == closer {
                depth -= 1;
                if depth == 0 {
                    return Some(j);
                }
            }
        }
        j += 1;
    }
    None
}

/// End (exclusive) of the statement starting at `start`: a `\n` at general
/// bracket depth 0, or a `;` at curly depth 0 — both characters live inside
/// a merged `SPACING` run, so its text is inspected directly (§4.7).
fn ts_statement_end(tokens: &[LexToken], start: usize, end: usize) -> usize {
    let mut gen_depth = 0i32;
    let mut curly_depth = 0i32;
    let mut j = start;
    while j < end {
        match tokens[j].kind {
            LexTokenKind::Brace => {
                let ch = tokens[j].text.chars().next().unwrap_or(' ');
                match ch {
                    '{' => {
                        gen_depth += 1;
                        curly_depth += 1;
                    }
                    '}' => {
                        gen_depth -= 1;
                        curly_depth -= 1;
                    }
                    '(' | '[' => gen_depth += 1,
                    ')' | ']' => gen_depth -= 1,
                    _ => {}
                }
                j += 1;
            }
            LexTokenKind::Spacing => {
                if gen_depth <= 0 && tokens[j].text.contains('\n') {
                    return j;
                }
                if curly_depth <= 0 && tokens[j].text.contains(';') {
                    return j;
                }
                j += 1;
            }
            _ => {
                j += 1;
            }
        }
    }
    end
}

fn strip_line_comment(s: &str) -> String {
    s.trim_start_matches('/').trim().to_string()
}

fn strip_block_comment(s: &str) -> String {
    let s = s.trim();
    s.strip_prefix("/*").and_then(|r| r.strip_suffix("*/")).unwrap_or(s).trim().to_string()
}

fn resolve_reference_path(path_literal: &str) -> String {
    if let Some(rest) = path_literal.strip_prefix("./") {
        format!("local-file://{rest}")
    } else if path_literal.starts_with("../") {
        format!("local-file://{path_literal}")
    } else {
        format!("environment://{path_literal}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarParser;
    use crate::tokenizer::typescript::TypeScriptLexer;
    use crate::tokenizer::LexicalTokenizer;

    #[test]
    fn resolve_reference_path_strips_same_directory_dot_slash() {
        assert_eq!(resolve_reference_path("./mod"), "local-file://mod");
        assert_eq!(resolve_reference_path("../mod"), "local-file://../mod");
        assert_eq!(resolve_reference_path("lodash"), "environment://lodash");
    }

    #[test]
    fn import_and_class_with_method() {
        let source = "import {X} from \"./mod\";\nclass B { y: string = \"hi\"; fn(a: number): void { return; } }\n";
        let mut lexer = LexicalTokenizer::new(TypeScriptLexer::new());
        let tokens = lexer.tokenize(source).unwrap();
        let ast = GrammarParser::new(&tokens, TypeScriptDetector::new()).parse().unwrap();

        let root = ast.borrow();
        assert_eq!(root.children.len(), 2);
        match &root.children[0].borrow().kind {
            crate::ast::NodeKind::References { ref_relative_path, .. } => {
                assert_eq!(ref_relative_path, "local-file://mod");
            }
            other => panic!("expected References, got {other:?}"),
        }

        let class = root.children[1].borrow();
        assert_eq!(class.children.len(), 2);
        match &class.children[0].borrow().kind {
            crate::ast::NodeKind::Attributes { attribute_name, attribute_type } => {
                assert_eq!(attribute_name, "y");
                assert_eq!(attribute_type.as_deref(), Some("string"));
            }
            other => panic!("expected Attributes, got {other:?}"),
        }

        let group = class.children[1].borrow();
        assert!(matches!(group.kind, crate::ast::NodeKind::FunctionGroups));
        let func = group.children[0].borrow();
        match &func.kind {
            crate::ast::NodeKind::Functions { function_definition_text, has_function_body } => {
                assert_eq!(function_definition_text, "fn(a: number): void {");
                assert!(*has_function_body);
            }
            other => panic!("expected Functions, got {other:?}"),
        }
        match &func.children[0].borrow().kind {
            crate::ast::NodeKind::Argument { argument_name, argument_type } => {
                assert_eq!(argument_name, "a");
                assert_eq!(argument_type.as_deref(), Some("number"));
            }
            other => panic!("expected Argument, got {other:?}"),
        }
    }

    #[test]
    fn doc_comment_groups_with_following_function() {
        let source = "/** hello */\nfunction f() {}\n";
        let mut lexer = LexicalTokenizer::new(TypeScriptLexer::new());
        let tokens = lexer.tokenize(source).unwrap();
        let ast = GrammarParser::new(&tokens, TypeScriptDetector::new()).parse().unwrap();

        let root = ast.borrow();
        assert_eq!(root.children.len(), 1);
        let group = root.children[0].borrow();
        assert_eq!(group.children.len(), 2);
        assert!(matches!(group.children[0].borrow().kind, crate::ast::NodeKind::Comments { .. }));
        match &group.children[1].borrow().kind {
            crate::ast::NodeKind::Functions { has_function_body, .. } => assert!(!*has_function_body),
            other => panic!("expected Functions, got {other:?}"),
        }
    }
}

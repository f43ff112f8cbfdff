//! Python's language detector (§4.6).
//!
//! Block boundaries are found by comparing a token's own source column
//! against the block's baseline column, rather than literally computing
//! `depth × indentUnit` — the indent-unit search still runs (and still
//! gates the mixed tab/space fatal error), but raw column comparison is
//! what actually decides where a `def`/`class` body ends. Because the
//! lexer folds punctuation like `:` and `=` into whatever `OTHER` run
//! surrounds it, argument/attribute/reference details are pulled out by
//! re-joining token text and splitting it as a string, not by matching on
//! token kind.

use crate::error::{CodeParsingError, ParseError};
use crate::grammar::{
    apply_directive, GrammarSymbol, LanguageDetector, NodeCreation, NonTerminal,
    SymbolAdditionDirective, SymbolEntry, Terminal,
};
use crate::lex::{LexToken, LexTokenKind};
use crate::position::{Index, Range};

pub struct PythonDetector {
    indent_candidates: Vec<usize>,
}

impl PythonDetector {
    pub fn new() -> Self {
        Self::with_indent_candidates(&[12, 6, 4, 3, 2])
    }

    pub fn with_indent_candidates(candidates: &[usize]) -> Self {
        Self { indent_candidates: candidates.to_vec() }
    }

    /// The largest candidate for which at most 20% of observed indents are
    /// not a multiple of it (§4.6, §9 open question).
    fn detect_indent_unit(&self, indents: &[usize]) -> usize {
        if indents.is_empty() {
            return *self.indent_candidates.last().unwrap_or(&2);
        }
        for &cand in &self.indent_candidates {
            let non_multiples = indents.iter().filter(|&&v| v % cand != 0).count();
            if (non_multiples as f64) <= 0.2 * indents.len() as f64 {
                return cand;
            }
        }
        *self.indent_candidates.last().unwrap_or(&2)
    }

    /// Mixed tab/space indentation is a fatal error; the indent-unit search
    /// otherwise plays no role in block-boundary detection (see module doc).
    fn check_indentation(&self, tokens: &[LexToken]) -> Result<(), ParseError> {
        let mut seen_tab = false;
        let mut space_indents = Vec::new();
        for t in tokens {
            if t.kind == LexTokenKind::Spacing && t.text.contains('\n') {
                if let Some(indent) = t.text.rsplit('\n').next() {
                    if indent.contains('\t') {
                        seen_tab = true;
                    }
                    if !indent.is_empty() && indent.chars().all(|c| c == ' ') {
                        space_indents.push(indent.len());
                    }
                }
            }
        }
        if seen_tab && !space_indents.is_empty() {
            let at = tokens.first().map(|t| t.range.start).unwrap_or(Index::new(0, 0));
            return Err(CodeParsingError::new(at, "mixed tab and space indentation").into());
        }
        let _unit = self.detect_indent_unit(&space_indents);
        Ok(())
    }

    fn detect_block(
        &mut self,
        tokens: &[LexToken],
        range: std::ops::Range<usize>,
        in_classes: bool,
    ) -> Result<Vec<SymbolEntry>, ParseError> {
        if range.start >= range.end {
            return Ok(Vec::new());
        }
        self.check_indentation(&tokens[range.clone()])?;

        let baseline = match tokens[range.clone()].iter().find(|t| t.kind != LexTokenKind::Spacing) {
            Some(t) => t.range.start.character,
            None => return Ok(vec![filler_entry(tokens, range)?]),
        };

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

            let word = leading_word(tokens, i);
            if !in_classes && (word == "from" || word == "import") {
                let (next_i, entry) = self.scan_reference(tokens, i, range.end)?;
                entries.push(entry);
                i = next_i;
            } else if word == "def" {
                let (next_i, entry) = self.scan_function(tokens, i, range.end, baseline)?;
                entries.push(entry);
                i = next_i;
            } else if word == "class" {
                let (next_i, entry) = self.scan_class(tokens, i, range.end, baseline)?;
                entries.push(entry);
                i = next_i;
            } else if tokens[i].kind == LexTokenKind::MultilineCommentOrString
                && is_standalone(tokens, i, range.start, range.end)
            {
                entries.push(one_symbol_entry(
                    tokens,
                    i..i + 1,
                    GrammarSymbol::Terminal(Terminal::CommentMultiline),
                    NodeCreation::Comment { is_multi_line: true, contents: strip_triple_quotes(&tokens[i].text) },
                    None,
                )?);
                i += 1;
            } else if tokens[i].kind == LexTokenKind::SinglelineComment {
                entries.push(one_symbol_entry(
                    tokens,
                    i..i + 1,
                    GrammarSymbol::Terminal(Terminal::CommentSingleline),
                    NodeCreation::Comment { is_multi_line: false, contents: strip_hash(&tokens[i].text) },
                    None,
                )?);
                i += 1;
            } else if in_classes {
                if let Some((next_i, entry)) = self.try_attribute(tokens, i, range.end)? {
                    entries.push(entry);
                    i = next_i;
                } else {
                    let stmt_end = scan_statement_end(tokens, i, range.end);
                    entries.push(statements_filler_entry(tokens, i, stmt_end)?);
                    i = stmt_end;
                }
            } else {
                let stmt_end = scan_statement_end(tokens, i, range.end);
                entries.push(statements_filler_entry(tokens, i, stmt_end)?);
                i = stmt_end;
            }
        }
        Ok(entries)
    }

    fn scan_reference(&self, tokens: &[LexToken], start: usize, end: usize) -> Result<(usize, SymbolEntry), ParseError> {
        let stmt_end = scan_statement_end(tokens, start, end);
        let text = joined_text(tokens, start..stmt_end);
        let path = resolve_reference_path(&text);
        let entry = one_symbol_entry(
            tokens,
            start..stmt_end,
            GrammarSymbol::Terminal(Terminal::References),
            NodeCreation::Reference { reference_text: text, ref_relative_path: path },
            None,
        )?;
        Ok((stmt_end, entry))
    }

    fn scan_function(
        &self,
        tokens: &[LexToken],
        start: usize,
        end: usize,
        baseline: usize,
    ) -> Result<(usize, SymbolEntry), ParseError> {
        let header_colon = find_header_colon(tokens, start, end)
            .ok_or_else(|| CodeParsingError::new(tokens[start].range.start, "function definition missing ':'"))?;
        let header_text = joined_text(tokens, start..header_colon + 1);

        let body_start = header_colon + 1;
        let block_end = find_block_end(tokens, body_start, end, baseline);
        let last_body = last_non_spacing_before(tokens, body_start, block_end);
        let (inner_end, resume) = match last_body {
            Some(li) => (tokens[li].range.end, li + 1),
            None => (tokens[header_colon].range.end, header_colon + 1),
        };

        let full_range = Range::new(tokens[start].range.start, inner_end);
        let parse_range = Range::new(tokens[header_colon].range.end, inner_end);
        Ok((
            resume,
            SymbolEntry {
                symbol: GrammarSymbol::NonTerminal(NonTerminal::Functions),
                range: full_range,
                parse_range: Some(parse_range),
                node: NodeCreation::Function { header_text },
            },
        ))
    }

    fn scan_class(
        &self,
        tokens: &[LexToken],
        start: usize,
        end: usize,
        baseline: usize,
    ) -> Result<(usize, SymbolEntry), ParseError> {
        let header_colon = find_header_colon(tokens, start, end)
            .ok_or_else(|| CodeParsingError::new(tokens[start].range.start, "class definition missing ':'"))?;
        let header_text = joined_text(tokens, start..header_colon + 1);

        let body_start = header_colon + 1;
        let block_end = find_block_end(tokens, body_start, end, baseline);
        let last_body = last_non_spacing_before(tokens, body_start, block_end);
        let (inner_end, resume) = match last_body {
            Some(li) => (tokens[li].range.end, li + 1),
            None => (tokens[header_colon].range.end, header_colon + 1),
        };

        let full_range = Range::new(tokens[start].range.start, inner_end);
        let parse_range = Range::new(tokens[header_colon].range.end, inner_end);
        Ok((
            resume,
            SymbolEntry {
                symbol: GrammarSymbol::NonTerminal(NonTerminal::Classes),
                range: full_range,
                parse_range: Some(parse_range),
                node: NodeCreation::Class { class_type: None, header_text },
            },
        ))
    }

    /// Called with the full `Functions` token range (header *and* body); the
    /// driver performs no coverage check here, so only the header's
    /// parameter list is classified.
    fn detect_function_declaration(
        &self,
        tokens: &[LexToken],
        range: std::ops::Range<usize>,
    ) -> Result<Vec<SymbolEntry>, ParseError> {
        let mut entries = Vec::new();
        let open = match (range.start..range.end).find(|&i| tokens[i].kind == LexTokenKind::Brace && tokens[i].text == "(") {
            Some(i) => i,
            None => return Ok(entries),
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

        let raw = joined_text(tokens, first..last + 1);
        let cleaned = clean_arg_text(&raw);
        let before_eq = cleaned.split('=').next().unwrap_or(&cleaned).trim();
        let (name, ty) = match before_eq.split_once(':') {
            Some((n, t)) => (n.trim().to_string(), Some(t.trim().to_string())),
            None => (before_eq.to_string(), None),
        };
        if name.is_empty() || !is_identifier_like(&name) {
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

    /// Called with exactly the body's own token range — every returned
    /// entry tiles it so `emit_functions`' `hasFunctionBody` computation
    /// sees real statement content as non-filler.
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
                        NodeCreation::Comment { is_multi_line: false, contents: strip_hash(&tokens[i].text) },
                        None,
                    )?);
                    i += 1;
                }
                LexTokenKind::MultilineCommentOrString if is_standalone(tokens, i, range.start, range.end) => {
                    entries.push(one_symbol_entry(
                        tokens,
                        i..i + 1,
                        GrammarSymbol::Terminal(Terminal::CommentMultiline),
                        NodeCreation::Comment { is_multi_line: true, contents: strip_triple_quotes(&tokens[i].text) },
                        None,
                    )?);
                    i += 1;
                }
                _ => {
                    let stmt_end = scan_statement_end(tokens, i, range.end);
                    entries.push(statements_filler_entry(tokens, i, stmt_end)?);
                    i = stmt_end;
                }
            }
        }
        Ok(entries)
    }

    fn try_attribute(
        &self,
        tokens: &[LexToken],
        start: usize,
        end: usize,
    ) -> Result<Option<(usize, SymbolEntry)>, ParseError> {
        let stmt_end = scan_statement_end(tokens, start, end);

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
        if name.is_empty() || !is_identifier_like(&name) {
            return Ok(None);
        }
        let after_colon = format!("{}{}", &tokens[colon_tok].text[colon_pos + 1..], joined_text(tokens, colon_tok + 1..stmt_end));
        let ty = after_colon.split('=').next().unwrap_or("").trim();
        let ty = if ty.is_empty() { None } else { Some(ty.to_string()) };

        let entry = one_symbol_entry(
            tokens,
            start..stmt_end,
            GrammarSymbol::Terminal(Terminal::Attributes),
            NodeCreation::Attribute { name, attr_type: ty },
            None,
        )?;
        Ok(Some((stmt_end, entry)))
    }
}

impl Default for PythonDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageDetector for PythonDetector {
    fn is_comment_before_function(&self) -> bool {
        false
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

/// Whether `tokens[idx]` is the only non-filler content on its physical
/// line, within the slice `[start, end)`.
fn is_standalone(tokens: &[LexToken], idx: usize, start: usize, end: usize) -> bool {
    let before_ok = if idx == start {
        true
    } else {
        let p = idx - 1;
        tokens[p].kind == LexTokenKind::Spacing && tokens[p].range.start.line != tokens[p].range.end.line
    };
    let after_ok = if idx + 1 >= end {
        true
    } else {
        let n = idx + 1;
        tokens[n].kind == LexTokenKind::Spacing && tokens[n].range.start.line != tokens[n].range.end.line
    };
    before_ok && after_ok
}

/// End (exclusive) of the logical line/statement starting at `start`:
/// continues through backslash continuations and while bracket depth > 0.
fn scan_statement_end(tokens: &[LexToken], start: usize, end: usize) -> usize {
    let mut depth = 0i32;
    let mut j = start;
    let mut last_text = "";
    while j < end {
        match tokens[j].kind {
            LexTokenKind::Brace => {
                let ch = tokens[j].text.chars().next().unwrap_or(' ');
                if "([{".contains(ch) {
                    depth += 1;
                } else {
                    depth -= 1;
                }
                last_text = &tokens[j].text;
                j += 1;
            }
            LexTokenKind::Spacing => {
                let crosses_line = tokens[j].range.start.line != tokens[j].range.end.line;
                if crosses_line && depth <= 0 && !last_text.trim_end().ends_with('\\') {
                    return j;
                }
                j += 1;
            }
            _ => {
                last_text = &tokens[j].text;
                j += 1;
            }
        }
    }
    end
}

fn find_header_colon(tokens: &[LexToken], start: usize, end: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut j = start;
    while j < end {
        match tokens[j].kind {
            LexTokenKind::Brace => {
                let ch = tokens[j].text.chars().next().unwrap_or(' ');
                if "([{".contains(ch) {
                    depth += 1;
                } else {
                    depth -= 1;
                }
            }
            LexTokenKind::Other if depth == 0 && tokens[j].text.trim_end().ends_with(':') => {
                return Some(j);
            }
            _ => {}
        }
        j += 1;
    }
    None
}

/// First token at or below `baseline`'s column that is not itself a
/// single-line comment (§4.6).
fn find_block_end(tokens: &[LexToken], start: usize, end: usize, baseline: usize) -> usize {
    let mut j = start;
    while j < end {
        if tokens[j].kind != LexTokenKind::Spacing
            && tokens[j].range.start.character <= baseline
            && tokens[j].kind != LexTokenKind::SinglelineComment
        {
            return j;
        }
        j += 1;
    }
    end
}

fn last_non_spacing_before(tokens: &[LexToken], start: usize, end: usize) -> Option<usize> {
    (start..end).rev().find(|&i| tokens[i].kind != LexTokenKind::Spacing)
}

fn joined_text(tokens: &[LexToken], range: std::ops::Range<usize>) -> String {
    tokens[range].iter().map(|t| t.text.as_str()).collect()
}

fn clean_arg_text(raw: &str) -> String {
    raw.replace("\\\n", "").replace('\n', " ").trim().to_string()
}

fn strip_hash(s: &str) -> String {
    s.trim_start_matches('#').trim().to_string()
}

fn strip_triple_quotes(s: &str) -> String {
    let s = s.trim();
    for q in ["\"\"\"", "'''"] {
        if let Some(inner) = s.strip_prefix(q).and_then(|r| r.strip_suffix(q)) {
            return inner.trim().to_string();
        }
    }
    s.to_string()
}

fn is_identifier_like(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// `from X import Y` / `import X` → the reference-path scheme of §6,
/// unifying the "leading dots" and "`.` alone" cases into one formula.
fn resolve_reference_path(statement_text: &str) -> String {
    let t = statement_text.trim();
    let module = if let Some(rest) = t.strip_prefix("from ") {
        rest.split_whitespace().next().unwrap_or("").to_string()
    } else if let Some(rest) = t.strip_prefix("import ") {
        rest.split_whitespace().next().unwrap_or("").split(',').next().unwrap_or("").trim().to_string()
    } else {
        String::new()
    };
    let dots = module.chars().take_while(|&c| c == '.').count();
    let rest = &module[dots..];
    if dots > 0 {
        format!("local-file://{}{}", "../".repeat(dots.saturating_sub(1)), rest.replace('.', "/"))
    } else {
        format!("environment://{}", rest.replace('.', "/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarParser;
    use crate::tokenizer::python::PythonLexer;
    use crate::tokenizer::LexicalTokenizer;

    #[test]
    fn resolve_reference_path_handles_dots_and_plain_module() {
        assert_eq!(resolve_reference_path("from . import x"), "local-file://");
        assert_eq!(resolve_reference_path("from ..pkg import y"), "local-file://../pkg");
        assert_eq!(resolve_reference_path("import os.path"), "environment://os/path");
    }

    #[test]
    fn strip_helpers_remove_delimiters() {
        assert_eq!(strip_hash("# hi"), "hi");
        assert_eq!(strip_triple_quotes("\"\"\"doc\"\"\""), "doc");
    }

    #[test]
    fn function_with_typed_and_defaulted_arguments() {
        let source = "def f(a, b: int = 1):\n    pass\n";
        let mut lexer = LexicalTokenizer::new(PythonLexer::new());
        let tokens = lexer.tokenize(source).unwrap();
        let ast = GrammarParser::new(&tokens, PythonDetector::new()).parse().unwrap();

        let root = ast.borrow();
        assert_eq!(root.children.len(), 1);
        let group = root.children[0].borrow();
        assert!(matches!(group.kind, crate::ast::NodeKind::FunctionGroups));
        assert_eq!(group.children.len(), 1);

        let func = group.children[0].borrow();
        match &func.kind {
            crate::ast::NodeKind::Functions { function_definition_text, has_function_body } => {
                assert_eq!(function_definition_text, "def f(a, b: int = 1):");
                assert!(*has_function_body);
            }
            other => panic!("expected Functions, got {other:?}"),
        }
        assert_eq!(func.children.len(), 2);
        match &func.children[0].borrow().kind {
            crate::ast::NodeKind::Argument { argument_name, argument_type } => {
                assert_eq!(argument_name, "a");
                assert_eq!(*argument_type, None);
            }
            other => panic!("expected Argument, got {other:?}"),
        }
        match &func.children[1].borrow().kind {
            crate::ast::NodeKind::Argument { argument_name, argument_type } => {
                assert_eq!(argument_name, "b");
                assert_eq!(argument_type.as_deref(), Some("int"));
            }
            other => panic!("expected Argument, got {other:?}"),
        }
    }

    #[test]
    fn class_with_attribute_and_method() {
        let source = "class A:\n    x: int = 1\n    def m(self):\n        pass\n";
        let mut lexer = LexicalTokenizer::new(PythonLexer::new());
        let tokens = lexer.tokenize(source).unwrap();
        let ast = GrammarParser::new(&tokens, PythonDetector::new()).parse().unwrap();

        let root = ast.borrow();
        assert_eq!(root.children.len(), 1);
        let class = root.children[0].borrow();
        match &class.kind {
            crate::ast::NodeKind::Classes { class_definition_text, .. } => {
                assert_eq!(class_definition_text, "class A:");
            }
            other => panic!("expected Classes, got {other:?}"),
        }
        assert_eq!(class.children.len(), 2);
        match &class.children[0].borrow().kind {
            crate::ast::NodeKind::Attributes { attribute_name, attribute_type } => {
                assert_eq!(attribute_name, "x");
                assert_eq!(attribute_type.as_deref(), Some("int"));
            }
            other => panic!("expected Attributes, got {other:?}"),
        }
        assert!(matches!(class.children[1].borrow().kind, crate::ast::NodeKind::FunctionGroups));
    }
}

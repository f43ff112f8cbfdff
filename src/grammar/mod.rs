//! The generic grammar-driven parser framework (§4.5).
//!
//! The grammar is fixed and language-agnostic:
//!
//! ```text
//! TOP_LEVEL            → (FILLER | STATEMENTS_FILLER | COMMENT_* | REFERENCES | CLASSES | FUNCTIONS)*
//! CLASSES               → (FILLER | STATEMENTS_FILLER | COMMENT_* | ATTRIBUTES | FUNCTIONS)*
//! FUNCTIONS             → FUNCTION_DECLARATION FUNCTION_BODY (with fillers allowed around)
//! FUNCTION_DECLARATION   → (FILLER | COMMENT_* | ARGUMENT)*
//! FUNCTION_BODY          → (FILLER | STATEMENTS_FILLER | COMMENT_*)*
//! ```
//!
//! A [`LanguageDetector`] classifies one non-terminal's token range into a
//! list of [`SymbolEntry`] by building up [`SymbolAdditionDirective`]s as it
//! scans; [`apply_directive`] turns each directive into validated entries.
//! [`GrammarParser`] then checks production-rule conformance, builds AST
//! nodes, and recurses into every non-terminal's `parse_range`.

pub mod python_detector;
pub mod typescript_detector;

use crate::ast::{attach_child, AstNode, NodeKind, NodeRef};
use crate::error::{CodeParserImplError, CodeParsingError, ParseError};
use crate::lex::LexToken;
use crate::position::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonTerminal {
    TopLevel,
    Classes,
    Functions,
    FunctionDeclaration,
    FunctionBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    References,
    Argument,
    Attributes,
    CommentSingleline,
    CommentMultiline,
    Filler,
    StatementsFiller,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrammarSymbol {
    Terminal(Terminal),
    NonTerminal(NonTerminal),
}

impl GrammarSymbol {
    fn is_top_level(&self) -> bool {
        matches!(self, GrammarSymbol::NonTerminal(NonTerminal::TopLevel))
    }
}

/// Opaque per-symbol payload a detector fills in while classifying a token
/// run (§4.5's `nodeCreationInformation`). `None` for symbols that produce
/// no node (FILLER, STATEMENTS_FILLER, FUNCTION_BODY, and non-terminals
/// whose node the driver builds itself).
#[derive(Debug, Clone)]
pub enum NodeCreation {
    None,
    Reference { reference_text: String, ref_relative_path: String },
    Class { class_type: Option<String>, header_text: String },
    Function { header_text: String },
    Argument { name: String, arg_type: Option<String> },
    Attribute { name: String, attr_type: Option<String> },
    Comment { is_multi_line: bool, contents: String },
}

/// One classified entry in a non-terminal's symbol list.
#[derive(Debug, Clone)]
pub struct SymbolEntry {
    pub symbol: GrammarSymbol,
    /// The token sub-range this symbol covers.
    pub range: Range,
    /// For non-terminal symbols: where the recursive sub-parse happens.
    /// Always contained in `range`; `None` for terminals.
    pub parse_range: Option<Range>,
    pub node: NodeCreation,
}

/// The minimum expressive directive algebra (§9): a detector names one
/// symbol, optionally a second, and optionally an uncommitted tail kept for
/// continued detection — never an options bag.
#[derive(Debug, Clone)]
pub enum SymbolAdditionDirective {
    /// The whole consumed range is one symbol.
    OneSymbol { symbol: GrammarSymbol, node: NodeCreation, parse_range: Option<Range> },
    /// Split the consumed range into two adjacent symbols; `second_len` is
    /// the second symbol's length in tokens.
    SplitTwo {
        first: (GrammarSymbol, NodeCreation, Option<Range>),
        second: (GrammarSymbol, NodeCreation, Option<Range>),
        second_len: usize,
    },
    /// Emit one symbol over the head, retaining `retained_len` tokens as the
    /// start of the next buffer (the CONTINUATION case, §9).
    RetainSuffix {
        symbol: GrammarSymbol,
        node: NodeCreation,
        parse_range: Option<Range>,
        retained_len: usize,
    },
    /// Emit two symbols, then retain a further uncommitted tail.
    ThreeWaySplit {
        first: (GrammarSymbol, NodeCreation, Option<Range>),
        second: (GrammarSymbol, NodeCreation, Option<Range>),
        second_len: usize,
        retained_len: usize,
    },
}

/// Validate and expand one directive against the consumed token buffer
/// `buffer` (in source order). Appends zero, one, or two [`SymbolEntry`]
/// into `out`, and returns the retained tail of `buffer`, if any, to be
/// prepended to the detector's next buffer.
pub fn apply_directive<'a>(
    directive: SymbolAdditionDirective,
    buffer: &'a [&'a LexToken],
) -> Result<(Vec<SymbolEntry>, &'a [&'a LexToken]), CodeParserImplError> {
    fn token_range(tokens: &[&LexToken]) -> Range {
        Range::new(tokens.first().unwrap().range.start, tokens.last().unwrap().range.end)
    }
    fn check_parse_range(symbol: &GrammarSymbol, range: Range, parse_range: &Option<Range>) -> Result<(), CodeParserImplError> {
        if symbol.is_top_level() {
            return Err(CodeParserImplError::new("apply_directive", "a detector may not emit TOP_LEVEL"));
        }
        match (symbol, parse_range) {
            (GrammarSymbol::NonTerminal(_), None) => {
                Err(CodeParserImplError::new("apply_directive", "non-terminal symbol is missing a parse_range"))
            }
            (GrammarSymbol::NonTerminal(_), Some(pr)) if !range.contains(pr) => {
                Err(CodeParserImplError::new("apply_directive", "parse_range is not contained in its symbol's range"))
            }
            (GrammarSymbol::Terminal(_), Some(_)) => {
                Err(CodeParserImplError::new("apply_directive", "a terminal symbol must not carry a parse_range"))
            }
            _ => Ok(()),
        }
    }

    if buffer.is_empty() {
        return Err(CodeParserImplError::new("apply_directive", "directive issued over an empty buffer"));
    }

    match directive {
        SymbolAdditionDirective::OneSymbol { symbol, node, parse_range } => {
            let range = token_range(buffer);
            check_parse_range(&symbol, range, &parse_range)?;
            Ok((vec![SymbolEntry { symbol, range, parse_range, node }], &[]))
        }
        SymbolAdditionDirective::SplitTwo { first, second, second_len } => {
            if second_len == 0 || second_len >= buffer.len() {
                return Err(CodeParserImplError::new("apply_directive", "SplitTwo requires a non-empty head and tail"));
            }
            let split_at = buffer.len() - second_len;
            let (head, tail) = buffer.split_at(split_at);
            let head_range = token_range(head);
            let tail_range = token_range(tail);
            check_parse_range(&first.0, head_range, &first.2)?;
            check_parse_range(&second.0, tail_range, &second.2)?;
            Ok((
                vec![
                    SymbolEntry { symbol: first.0, range: head_range, parse_range: first.2, node: first.1 },
                    SymbolEntry { symbol: second.0, range: tail_range, parse_range: second.2, node: second.1 },
                ],
                &[],
            ))
        }
        SymbolAdditionDirective::RetainSuffix { symbol, node, parse_range, retained_len } => {
            if retained_len == 0 || retained_len >= buffer.len() {
                return Err(CodeParserImplError::new("apply_directive", "RetainSuffix requires a non-empty head and tail"));
            }
            let split_at = buffer.len() - retained_len;
            let (head, tail) = buffer.split_at(split_at);
            let head_range = token_range(head);
            check_parse_range(&symbol, head_range, &parse_range)?;
            Ok((vec![SymbolEntry { symbol, range: head_range, parse_range, node }], tail))
        }
        SymbolAdditionDirective::ThreeWaySplit { first, second, second_len, retained_len } => {
            if second_len == 0 || retained_len == 0 || second_len + retained_len >= buffer.len() {
                return Err(CodeParserImplError::new("apply_directive", "ThreeWaySplit requires three non-empty pieces"));
            }
            let first_len = buffer.len() - second_len - retained_len;
            let (head, rest) = buffer.split_at(first_len);
            let (mid, tail) = rest.split_at(second_len);
            let head_range = token_range(head);
            let mid_range = token_range(mid);
            check_parse_range(&first.0, head_range, &first.2)?;
            check_parse_range(&second.0, mid_range, &second.2)?;
            Ok((
                vec![
                    SymbolEntry { symbol: first.0, range: head_range, parse_range: first.2, node: first.1 },
                    SymbolEntry { symbol: second.0, range: mid_range, parse_range: second.2, node: second.1 },
                ],
                tail,
            ))
        }
    }
}

/// Legal right-hand-side symbols for a non-terminal (§4.5's grammar table).
fn legal_rhs(nt: NonTerminal, symbol: GrammarSymbol) -> bool {
    use GrammarSymbol::*;
    use NonTerminal::*;
    use Terminal::*;
    match nt {
        TopLevel => matches!(
            symbol,
            Terminal(Filler) | Terminal(StatementsFiller) | Terminal(CommentSingleline) | Terminal(CommentMultiline)
                | Terminal(References) | NonTerminal(Classes) | NonTerminal(Functions)
        ),
        Classes => matches!(
            symbol,
            Terminal(Filler) | Terminal(StatementsFiller) | Terminal(CommentSingleline) | Terminal(CommentMultiline)
                | Terminal(Attributes) | NonTerminal(Functions)
        ),
        Functions => matches!(symbol, NonTerminal(FunctionDeclaration) | NonTerminal(FunctionBody) | Terminal(Filler)),
        FunctionDeclaration => {
            matches!(symbol, Terminal(Filler) | Terminal(CommentSingleline) | Terminal(CommentMultiline) | Terminal(Argument))
        }
        FunctionBody => matches!(
            symbol,
            Terminal(Filler) | Terminal(StatementsFiller) | Terminal(CommentSingleline) | Terminal(CommentMultiline)
        ),
    }
}

/// Per-language classification contract (§4.5, §4.6, §4.7).
pub trait LanguageDetector {
    /// Whether a doc comment attaches *before* its function (TS-like,
    /// `true`) or is lifted out of the function body (Python-like, `false`).
    fn is_comment_before_function(&self) -> bool;

    /// Classify the full token range `tokens[range_in_tokens]` belonging to
    /// non-terminal `nt`, returning its ordered [`SymbolEntry`] list.
    /// Implementations reset their own internal state on entry.
    fn detect(
        &mut self,
        tokens: &[LexToken],
        range_in_tokens: std::ops::Range<usize>,
        nt: NonTerminal,
    ) -> Result<Vec<SymbolEntry>, ParseError>;
}

/// The recursive driver (§4.5 "Parse driver"). Holds the flat token stream;
/// each call descends into one non-terminal's `parse_range`, converted back
/// to a token-index range via `range_to_indices`.
pub struct GrammarParser<'a, D: LanguageDetector> {
    tokens: &'a [LexToken],
    detector: D,
}

impl<'a, D: LanguageDetector> GrammarParser<'a, D> {
    pub fn new(tokens: &'a [LexToken], detector: D) -> Self {
        Self { tokens, detector }
    }

    pub fn parse(mut self) -> Result<NodeRef, ParseError> {
        let whole = if self.tokens.is_empty() {
            crate::position::Range::new(crate::position::Index::new(0, 0), crate::position::Index::new(0, 0))
        } else {
            Range::new(self.tokens.first().unwrap().range.start, self.tokens.last().unwrap().range.end)
        };
        let root = AstNode::new(NodeKind::TopLevel, whole);
        self.parse_non_terminal(&root, 0..self.tokens.len(), NonTerminal::TopLevel)?;
        Ok(root)
    }

    fn range_to_indices(&self, range: Range) -> std::ops::Range<usize> {
        let start = self.tokens.iter().position(|t| t.range.start == range.start).unwrap_or(0);
        let end = self
            .tokens
            .iter()
            .position(|t| t.range.start == range.end)
            .unwrap_or(self.tokens.len());
        start..end
    }

    /// Implements §4.5 steps 1-5 for one non-terminal's token range,
    /// attaching resulting nodes to `parent`.
    fn parse_non_terminal(
        &mut self,
        parent: &NodeRef,
        indices: std::ops::Range<usize>,
        nt: NonTerminal,
    ) -> Result<(), ParseError> {
        let entries = self.detector.detect(self.tokens, indices.clone(), nt)?;

        // Step 1: the accumulated parsed extent must equal the whole range.
        if !entries.is_empty() {
            let expected_start = self.tokens[indices.start].range.start;
            let expected_end = if indices.end == 0 {
                expected_start
            } else {
                self.tokens[indices.end - 1].range.end
            };
            if entries.first().unwrap().range.start != expected_start || entries.last().unwrap().range.end != expected_end {
                return Err(CodeParsingError::new(expected_start, "non-parsed portions within a non-terminal").into());
            }
            let mut cursor = expected_start;
            for e in &entries {
                if e.range.start != cursor {
                    return Err(CodeParsingError::new(e.range.start, "non-parsed portions between symbols").into());
                }
                cursor = e.range.end;
            }
        }

        // Step 2: production-rule conformance.
        for e in &entries {
            if !legal_rhs(nt, e.symbol) {
                return Err(CodeParsingError::new(e.range.start, "symbol is not legal in this non-terminal's production").into());
            }
        }

        // Steps 3-5: build nodes, assemble FunctionGroups, recurse.
        self.build_children(parent, &entries, nt)
    }

    fn build_children(&mut self, parent: &NodeRef, entries: &[SymbolEntry], nt: NonTerminal) -> Result<(), ParseError> {
        let mut i = 0;
        while i < entries.len() {
            let e = &entries[i];
            match e.symbol {
                GrammarSymbol::Terminal(Terminal::Filler) | GrammarSymbol::Terminal(Terminal::StatementsFiller) => {
                    i += 1;
                }
                GrammarSymbol::Terminal(Terminal::References) => {
                    let (text, path) = match &e.node {
                        NodeCreation::Reference { reference_text, ref_relative_path } => (reference_text.clone(), ref_relative_path.clone()),
                        _ => return Err(CodeParsingError::new(e.range.start, "REFERENCES symbol is missing its node payload").into()),
                    };
                    let node = AstNode::new(NodeKind::References { reference_text: text, ref_relative_path: path }, e.range);
                    attach_child(parent, node);
                    i += 1;
                }
                GrammarSymbol::Terminal(Terminal::Attributes) => {
                    let (name, ty) = match &e.node {
                        NodeCreation::Attribute { name, attr_type } => (name.clone(), attr_type.clone()),
                        _ => return Err(CodeParsingError::new(e.range.start, "ATTRIBUTES symbol is missing its node payload").into()),
                    };
                    let node = AstNode::new(NodeKind::Attributes { attribute_name: name, attribute_type: ty }, e.range);
                    attach_child(parent, node);
                    i += 1;
                }
                GrammarSymbol::Terminal(Terminal::Argument) => {
                    let (name, ty) = match &e.node {
                        NodeCreation::Argument { name, arg_type } => (name.clone(), arg_type.clone()),
                        _ => return Err(CodeParsingError::new(e.range.start, "ARGUMENT symbol is missing its node payload").into()),
                    };
                    let node = AstNode::new(NodeKind::Argument { argument_name: name, argument_type: ty }, e.range);
                    attach_child(parent, node);
                    i += 1;
                }
                GrammarSymbol::Terminal(Terminal::CommentSingleline) | GrammarSymbol::Terminal(Terminal::CommentMultiline) => {
                    // May be consumed into a FunctionGroups below if the detector
                    // is TS-like and the very next non-filler entry is FUNCTIONS.
                    if self.detector.is_comment_before_function() && nt != NonTerminal::FunctionBody {
                        if let Some((group_range, consumed)) = self.try_group_with_following_function(entries, i) {
                            let group = AstNode::new(NodeKind::FunctionGroups, group_range);
                            self.emit_comment(&group, e)?;
                            let func_entry = &entries[i + consumed - 1];
                            self.emit_functions(&group, func_entry)?;
                            attach_child(parent, group);
                            i += consumed;
                            continue;
                        }
                    }
                    let is_multi = matches!(e.symbol, GrammarSymbol::Terminal(Terminal::CommentMultiline));
                    let contents = match &e.node {
                        NodeCreation::Comment { contents, .. } => contents.clone(),
                        _ => return Err(CodeParsingError::new(e.range.start, "COMMENT symbol is missing its node payload").into()),
                    };
                    let node = AstNode::new(NodeKind::Comments { is_multi_line: is_multi, comment_contents: contents }, e.range);
                    attach_child(parent, node);
                    i += 1;
                }
                GrammarSymbol::NonTerminal(NonTerminal::Functions) => {
                    let group = AstNode::new(NodeKind::FunctionGroups, e.range);
                    self.emit_functions(&group, e)?;
                    attach_child(parent, group);
                    i += 1;
                }
                GrammarSymbol::NonTerminal(NonTerminal::Classes) => {
                    let (class_type, header) = match &e.node {
                        NodeCreation::Class { class_type, header_text } => (class_type.clone(), header_text.clone()),
                        _ => return Err(CodeParsingError::new(e.range.start, "CLASSES symbol is missing its node payload").into()),
                    };
                    let parse_range = e.parse_range.expect("validated non-terminal carries parse_range");
                    let node = AstNode::with_inner_range(
                        NodeKind::Classes { class_type, class_definition_text: header },
                        e.range,
                        parse_range,
                    );
                    let indices = self.range_to_indices(parse_range);
                    self.parse_non_terminal(&node, indices, NonTerminal::Classes)?;
                    attach_child(parent, node);
                    i += 1;
                }
                GrammarSymbol::NonTerminal(NonTerminal::FunctionDeclaration) | GrammarSymbol::NonTerminal(NonTerminal::FunctionBody) => {
                    return Err(CodeParsingError::new(
                        e.range.start,
                        "FUNCTION_DECLARATION/FUNCTION_BODY may only appear as part of a FUNCTIONS production",
                    )
                    .into());
                }
                GrammarSymbol::NonTerminal(NonTerminal::TopLevel) => {
                    return Err(CodeParsingError::new(e.range.start, "TOP_LEVEL cannot be nested").into());
                }
            }
        }
        Ok(())
    }

    /// If `entries[at]` is a multi-line comment immediately followed
    /// (modulo filler) by a FUNCTIONS symbol, return the merged range and
    /// how many entries the pair consumes (§4.5 doc-comment attachment,
    /// TS-like branch).
    fn try_group_with_following_function(&self, entries: &[SymbolEntry], at: usize) -> Option<(Range, usize)> {
        if entries[at].symbol != GrammarSymbol::Terminal(Terminal::CommentMultiline) {
            return None;
        }
        let mut j = at + 1;
        while j < entries.len() && entries[j].symbol == GrammarSymbol::Terminal(Terminal::Filler) {
            j += 1;
        }
        if j < entries.len() && entries[j].symbol == GrammarSymbol::NonTerminal(NonTerminal::Functions) {
            let merged = Range::new(entries[at].range.start, entries[j].range.end);
            Some((merged, j - at + 1))
        } else {
            None
        }
    }

    fn emit_comment(&mut self, group: &NodeRef, e: &SymbolEntry) -> Result<(), ParseError> {
        let contents = match &e.node {
            NodeCreation::Comment { contents, .. } => contents.clone(),
            _ => return Err(CodeParsingError::new(e.range.start, "COMMENT symbol is missing its node payload").into()),
        };
        let node = AstNode::new(NodeKind::Comments { is_multi_line: true, comment_contents: contents }, e.range);
        attach_child(group, node);
        Ok(())
    }

    /// Build the `Functions` node for a FUNCTIONS entry and sub-parse its
    /// FUNCTION_DECLARATION/FUNCTION_BODY children directly into it (§4.5
    /// "FUNCTIONS special case").
    fn emit_functions(&mut self, group: &NodeRef, e: &SymbolEntry) -> Result<(), ParseError> {
        let header = match &e.node {
            NodeCreation::Function { header_text } => header_text.clone(),
            _ => return Err(CodeParsingError::new(e.range.start, "FUNCTIONS symbol is missing its node payload").into()),
        };
        let parse_range = e.parse_range.expect("validated non-terminal carries parse_range");
        let func_node = AstNode::with_inner_range(
            NodeKind::Functions { function_definition_text: header, has_function_body: false },
            e.range,
            parse_range,
        );

        let indices = self.range_to_indices(e.range);
        let decl_entries = self.detector.detect(self.tokens, indices.clone(), NonTerminal::FunctionDeclaration)?;
        for de in &decl_entries {
            if !legal_rhs(NonTerminal::FunctionDeclaration, de.symbol) {
                return Err(CodeParsingError::new(de.range.start, "illegal symbol in FUNCTION_DECLARATION").into());
            }
        }
        self.build_children(&func_node, &decl_entries, NonTerminal::FunctionDeclaration)?;

        let body_indices = self.range_to_indices(parse_range);
        let body_entries = self.detector.detect(self.tokens, body_indices, NonTerminal::FunctionBody)?;
        for be in &body_entries {
            if !legal_rhs(NonTerminal::FunctionBody, be.symbol) {
                return Err(CodeParsingError::new(be.range.start, "illegal symbol in FUNCTION_BODY").into());
            }
        }

        // Python-like lifting: a leading multi-line comment in the body
        // (sibling rank 0) is pulled out to the enclosing FunctionGroups
        // instead of staying in the function, and does not count toward
        // `has_function_body`.
        let mut lifted = None;
        let mut remaining: Vec<&SymbolEntry> = body_entries.iter().collect();
        if !self.detector.is_comment_before_function() {
            if let Some(first_non_filler) = remaining.iter().position(|e| {
                !matches!(e.symbol, GrammarSymbol::Terminal(Terminal::Filler))
            }) {
                if remaining[first_non_filler].symbol == GrammarSymbol::Terminal(Terminal::CommentMultiline) {
                    lifted = Some(remaining.remove(first_non_filler).clone());
                }
            }
        }

        let mut has_body = false;
        for be in &remaining {
            if !matches!(be.symbol, GrammarSymbol::Terminal(Terminal::Filler)) {
                has_body = true;
            }
        }
        if let NodeKind::Functions { has_function_body, .. } = &mut func_node.borrow_mut().kind {
            *has_function_body = has_body;
        }

        if let Some(lifted_comment) = lifted {
            self.emit_comment(group, &lifted_comment)?;
        }
        attach_child(group, std::rc::Rc::clone(&func_node));

        let body_owned: Vec<SymbolEntry> = remaining.into_iter().cloned().collect();
        self.build_children(&func_node, &body_owned, NonTerminal::FunctionBody)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Index;

    fn tok(a: (usize, usize), b: (usize, usize)) -> LexToken {
        LexToken::new(crate::lex::LexTokenKind::Other, "x".into(), Range::new(Index::new(a.0, a.1), Index::new(b.0, b.1)))
    }

    #[test]
    fn directive_rejects_top_level_symbol() {
        let t1 = tok((0, 0), (0, 1));
        let buf = [&t1];
        let result = apply_directive(
            SymbolAdditionDirective::OneSymbol {
                symbol: GrammarSymbol::NonTerminal(NonTerminal::TopLevel),
                node: NodeCreation::None,
                parse_range: Some(Range::new(Index::new(0, 0), Index::new(0, 1))),
            },
            &buf,
        );
        assert!(result.is_err());
    }

    #[test]
    fn split_two_requires_non_empty_pieces() {
        let t1 = tok((0, 0), (0, 1));
        let buf = [&t1];
        let result = apply_directive(
            SymbolAdditionDirective::SplitTwo {
                first: (GrammarSymbol::Terminal(Terminal::Filler), NodeCreation::None, None),
                second: (GrammarSymbol::Terminal(Terminal::Filler), NodeCreation::None, None),
                second_len: 1,
            },
            &buf,
        );
        assert!(result.is_err());
    }

    #[test]
    fn legal_rhs_rejects_attributes_at_top_level() {
        assert!(!legal_rhs(NonTerminal::TopLevel, GrammarSymbol::Terminal(Terminal::Attributes)));
        assert!(legal_rhs(NonTerminal::Classes, GrammarSymbol::Terminal(Terminal::Attributes)));
    }
}

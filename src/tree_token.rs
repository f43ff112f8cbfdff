//! The tree tokenizer (§4.8): a second AST walk producing a flat, gap-free
//! sequence of labeled spans.
//!
//! Faithful mode tracks a single running `prev_end` cursor and fills any gap
//! before a ranged emission with `OTHERS`, exactly as §4.8 describes. The one
//! simplification from a literal reading: header/footer punctuation *within*
//! a split class or function (commas between arguments, the `): ` before a
//! body, a still-collapsed body chunk) is tagged with that node's own kind
//! rather than introducing a separate filler concept — `OTHERS` is reserved
//! for gaps between top-level/class members, matching the one case §4.8
//! actually names. Simplification mode renders straight from the AST's own
//! stored text fields and never touches the source, so it carries no
//! `SourceMap` dependency at all.

use crate::ast::{NodeKind, NodeRef};
use crate::position::{compare, Range, SourceMap};
use crate::Language;
use std::cmp::Ordering;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeTokenKind {
    TopLevel,
    References,
    FunctionGroup,
    Function,
    FunctionDefinition,
    Comments,
    Class,
    Attribute,
    Argument,
    Others,
}

#[derive(Debug, Clone)]
pub struct TreeToken {
    pub text: String,
    pub kind: TreeTokenKind,
    pub range: Option<Range>,
    pub original_node: Option<NodeRef>,
}

impl TreeToken {
    fn ranged(kind: TreeTokenKind, text: String, range: Range, node: Option<NodeRef>) -> Self {
        Self { text, kind, range: Some(range), original_node: node }
    }

    fn scaffold(kind: TreeTokenKind, text: String) -> Self {
        Self { text, kind, range: None, original_node: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FidelityLevel {
    None,
    TopLevelOnly,
    FunctionsAndClasses,
    FunctionsAndClassesAndArguments,
    Everything,
}

/// Identifies a node by its `Rc` allocation, for the replace/target variants.
fn same_node(a: &NodeRef, b: &NodeRef) -> bool {
    Rc::ptr_eq(a, b)
}

struct Flattener<'a> {
    source_map: &'a SourceMap,
    level: FidelityLevel,
    exclude_inner: bool,
    prev_end: crate::position::Index,
    out: Vec<TreeToken>,
    replace: Option<(&'a NodeRef, &'a str)>,
    target: Option<&'a NodeRef>,
    target_index: Option<usize>,
}

const PLACEHOLDER: &str = "\u{2026}";

impl<'a> Flattener<'a> {
    fn new(source_map: &'a SourceMap, level: FidelityLevel, exclude_inner: bool, start: crate::position::Index) -> Self {
        Self { source_map, level, exclude_inner, prev_end: start, out: Vec::new(), replace: None, target: None, target_index: None }
    }

    fn emit(&mut self, kind: TreeTokenKind, range: Range, node: Option<NodeRef>, gap_kind: TreeTokenKind) {
        if compare(&self.prev_end, &range.start) == Ordering::Less {
            let gap = Range::new(self.prev_end, range.start);
            let text = self.source_map.slice(gap);
            self.out.push(TreeToken::ranged(gap_kind, text, gap, None));
        }
        let text = self.source_map.slice(range);
        self.out.push(TreeToken::ranged(kind, text, range, node));
        self.prev_end = range.end;
    }

    fn emit_top(&mut self, kind: TreeTokenKind, range: Range, node: Option<NodeRef>) {
        self.emit(kind, range, node, TreeTokenKind::Others);
    }

    fn function_is_collapsed(&self) -> bool {
        !self.exclude_inner || matches!(self.level, FidelityLevel::None | FidelityLevel::TopLevelOnly | FidelityLevel::FunctionsAndClasses)
    }

    fn class_is_collapsed(&self) -> bool {
        !self.exclude_inner || matches!(self.level, FidelityLevel::None | FidelityLevel::TopLevelOnly)
    }

    fn maybe_replace(&mut self, node: &NodeRef, range: Range, kind: TreeTokenKind) -> bool {
        if let Some((target, text)) = self.replace {
            if same_node(target, node) {
                self.emit(kind, range, Some(Rc::clone(node)), TreeTokenKind::Others);
                let last = self.out.len() - 1;
                self.out[last].text = text.to_string();
                return true;
            }
        }
        if let Some(target) = self.target {
            if same_node(target, node) {
                self.emit(kind, range, Some(Rc::clone(node)), TreeTokenKind::Others);
                let last = self.out.len() - 1;
                self.out[last].text = PLACEHOLDER.to_string();
                self.target_index = Some(last);
                return true;
            }
        }
        false
    }

    fn walk_children(&mut self, node: &NodeRef) {
        let children = node.borrow().children.clone();
        for c in &children {
            self.walk(c);
        }
    }

    fn walk(&mut self, node: &NodeRef) {
        let kind_label = node.borrow().kind.clone();
        let range = node.borrow().range;
        match kind_label {
            NodeKind::TopLevel => self.walk_children(node),
            NodeKind::References { .. } => {
                if !self.maybe_replace(node, range, TreeTokenKind::References) && self.level != FidelityLevel::None {
                    self.emit_top(TreeTokenKind::References, range, Some(Rc::clone(node)));
                }
            }
            NodeKind::Comments { .. } => {
                if !self.maybe_replace(node, range, TreeTokenKind::Comments) && self.level != FidelityLevel::None {
                    self.emit_top(TreeTokenKind::Comments, range, Some(Rc::clone(node)));
                }
            }
            NodeKind::Classes { .. } => self.walk_classes(node, range),
            NodeKind::FunctionGroups => self.walk_function_group(node),
            NodeKind::Functions { .. } => self.walk_functions(node, range, None),
            NodeKind::Argument { .. } => {
                if !self.maybe_replace(node, range, TreeTokenKind::Argument) {
                    self.emit(TreeTokenKind::Argument, range, Some(Rc::clone(node)), TreeTokenKind::FunctionDefinition);
                }
            }
            NodeKind::Attributes { .. } => {
                if !self.maybe_replace(node, range, TreeTokenKind::Attribute) {
                    self.emit(TreeTokenKind::Attribute, range, Some(Rc::clone(node)), TreeTokenKind::Class);
                }
            }
            NodeKind::FunctionDeclaration => {}
        }
    }

    fn walk_classes(&mut self, node: &NodeRef, range: Range) {
        if self.maybe_replace(node, range, TreeTokenKind::Class) {
            return;
        }
        if self.level == FidelityLevel::None {
            return;
        }
        if self.class_is_collapsed() {
            self.emit_top(TreeTokenKind::Class, range, Some(Rc::clone(node)));
            return;
        }
        let inner = node.borrow().inner_range();
        let prefix = Range::new(range.start, inner.start);
        if !prefix.is_empty() {
            self.emit_top(TreeTokenKind::Class, prefix, Some(Rc::clone(node)));
        }
        self.walk_children(node);
        let suffix = Range::new(self.prev_end, range.end);
        if !suffix.is_empty() {
            self.emit_top(TreeTokenKind::Class, suffix, Some(Rc::clone(node)));
        }
    }

    /// `lifted_comment` is a doc comment that the parser pulled out of this
    /// function's body into the enclosing `FunctionGroups` (Python-like
    /// languages, §4.5): its range falls *inside* `range`, not before it, so
    /// it must be re-inserted in source order among the body comments rather
    /// than walked ahead of the function the way a TS-like leading comment
    /// is.
    fn walk_functions(&mut self, node: &NodeRef, range: Range, lifted_comment: Option<&NodeRef>) {
        if self.maybe_replace(node, range, TreeTokenKind::Function) {
            return;
        }
        if self.level == FidelityLevel::None {
            return;
        }
        if self.function_is_collapsed() {
            self.emit_top(TreeTokenKind::Function, range, Some(Rc::clone(node)));
            return;
        }
        let inner = node.borrow().inner_range();
        let children = node.borrow().children.clone();
        let arguments: Vec<NodeRef> = children
            .iter()
            .filter(|c| matches!(c.borrow().kind, NodeKind::Argument { .. }))
            .cloned()
            .collect();

        for arg in &arguments {
            self.walk(arg);
        }

        if self.level == FidelityLevel::FunctionsAndClassesAndArguments {
            let rest = Range::new(self.prev_end, range.end);
            if !rest.is_empty() {
                self.emit(TreeTokenKind::Function, rest, Some(Rc::clone(node)), TreeTokenKind::FunctionDefinition);
            }
        } else {
            let mut body_comments: Vec<NodeRef> = children
                .iter()
                .filter(|c| matches!(c.borrow().kind, NodeKind::Comments { .. }))
                .cloned()
                .collect();
            if let Some(lifted) = lifted_comment {
                body_comments.push(Rc::clone(lifted));
            }
            body_comments.sort_by_key(|c| c.borrow().range.start);
            for c in &body_comments {
                self.emit(TreeTokenKind::Comments, c.borrow().range, Some(Rc::clone(c)), TreeTokenKind::FunctionDefinition);
            }
            let suffix = Range::new(self.prev_end, range.end);
            if !suffix.is_empty() {
                self.emit(TreeTokenKind::FunctionDefinition, suffix, Some(Rc::clone(node)), TreeTokenKind::FunctionDefinition);
            }
            let _ = inner;
        }
    }

    fn walk_function_group(&mut self, node: &NodeRef) {
        let children = node.borrow().children.clone();
        if children.len() == 2 {
            let comment = &children[0];
            let func = &children[1];
            let func_range = func.borrow().range;
            let comment_range = comment.borrow().range;
            let collapsing = self.function_is_collapsed() && self.replace.map(|(t, _)| !same_node(t, func)).unwrap_or(true)
                && self.target.map(|t| !same_node(t, func)).unwrap_or(true);
            // A comment lifted out of the function body (Python-like) has a
            // range nested inside the function's own range; it must be
            // re-inserted in source order by `walk_functions` instead of
            // walked ahead of it, or `prev_end` would jump past text the
            // function still needs to emit (§8 property 3).
            let comment_precedes_function = compare(&comment_range.end, &func_range.start) != Ordering::Greater;
            if !collapsing && comment_precedes_function {
                self.walk(comment);
            }
            if collapsing || comment_precedes_function {
                self.walk(func);
            } else {
                self.walk_functions(func, func_range, Some(comment));
            }
        } else if let Some(func) = children.first() {
            self.walk(func);
        }
    }
}

/// `parse(source)`'s AST, faithfully flattened (§6 `flattenFaithfully`).
pub fn flatten_faithfully(root: &NodeRef, source_map: &SourceMap, level: FidelityLevel, exclude_inner_range_if_possible: bool) -> Vec<TreeToken> {
    let mut f = Flattener::new(source_map, level, exclude_inner_range_if_possible, crate::position::Index::new(0, 0));
    f.walk(root);
    flush(&mut f, source_map);
    f.out
}

fn flush(f: &mut Flattener, source_map: &SourceMap) {
    let eof = source_map.eof();
    if compare(&f.prev_end, &eof) == Ordering::Less {
        let gap = Range::new(f.prev_end, eof);
        let text = source_map.slice(gap);
        f.out.push(TreeToken::ranged(TreeTokenKind::Others, text, gap, None));
        f.prev_end = eof;
    }
}

/// Flatten the whole tree but replace `target`'s emission with literal text
/// `replacement` (its descendants are not visited).
pub fn tokenize_replace_node(
    root: &NodeRef,
    source_map: &SourceMap,
    level: FidelityLevel,
    exclude_inner_range_if_possible: bool,
    target: &NodeRef,
    replacement: &str,
) -> Vec<TreeToken> {
    let mut f = Flattener::new(source_map, level, exclude_inner_range_if_possible, crate::position::Index::new(0, 0));
    f.replace = Some((target, replacement));
    f.walk(root);
    flush(&mut f, source_map);
    f.out
}

/// Flatten the whole tree, replacing `target`'s emission with a placeholder
/// and reporting the placeholder's index in the returned list.
pub fn tokenize_target_node(
    root: &NodeRef,
    source_map: &SourceMap,
    level: FidelityLevel,
    exclude_inner_range_if_possible: bool,
    target: &NodeRef,
) -> (Vec<TreeToken>, Option<usize>) {
    let mut f = Flattener::new(source_map, level, exclude_inner_range_if_possible, crate::position::Index::new(0, 0));
    f.target = Some(target);
    f.walk(root);
    flush(&mut f, source_map);
    (f.out, f.target_index)
}

fn pad(depth: usize, indent: &str) -> String {
    indent.repeat(depth)
}

/// Simplification mode (§4.8, §6 `flatten`): a re-indented, minified view
/// built straight from the AST's own stored text fields. Function bodies
/// collapse to a single elided span; class bodies get a brace scaffold.
pub fn flatten(root: &NodeRef, _language: Language, indentation: Option<&str>) -> Vec<TreeToken> {
    let indent = indentation.unwrap_or("    ");
    let mut out = Vec::new();
    render_children(&root.borrow().children, 0, indent, &mut out);
    out
}

/// Emit only the subtree rooted at `node`, preceded by the opening scaffold
/// of each enclosing class on the path from the document root down to it
/// (§4.8: "optionally preceded by ancestor prefixes down a path"). Only the
/// simplification tokenizer supports this — the faithful one can't, since a
/// prefix-only ancestor emission has no well-defined source range to anchor
/// a gap-free round trip on.
pub fn tokenize_subtree(node: &NodeRef, indentation: Option<&str>) -> Vec<TreeToken> {
    let indent = indentation.unwrap_or("    ");
    let mut ancestors = Vec::new();
    let mut cur = node.borrow().parent.clone();
    while let Some(weak) = cur {
        let Some(parent) = weak.upgrade() else { break };
        cur = parent.borrow().parent.clone();
        ancestors.push(parent);
    }
    ancestors.reverse();

    let mut out = Vec::new();
    let mut depth = 0;
    for ancestor in &ancestors {
        if let NodeKind::Classes { class_definition_text, .. } = &ancestor.borrow().kind {
            out.push(TreeToken::scaffold(TreeTokenKind::Class, format!("{}{} {{\n", pad(depth, indent), class_definition_text)));
            depth += 1;
        }
    }
    render_node(node, depth, indent, &mut out);
    out
}

fn render_children(children: &[NodeRef], depth: usize, indent: &str, out: &mut Vec<TreeToken>) {
    for child in children {
        render_node(child, depth, indent, out);
    }
}

fn render_node(node: &NodeRef, depth: usize, indent: &str, out: &mut Vec<TreeToken>) {
    let kind = node.borrow().kind.clone();
    match kind {
        NodeKind::TopLevel | NodeKind::FunctionDeclaration => {}
        NodeKind::References { reference_text, .. } => {
            out.push(TreeToken::scaffold(TreeTokenKind::References, format!("{}{}\n", pad(depth, indent), reference_text)));
        }
        NodeKind::Comments { is_multi_line, comment_contents } => {
            let text = if is_multi_line {
                format!("{}/* {} */\n", pad(depth, indent), comment_contents)
            } else {
                format!("{}// {}\n", pad(depth, indent), comment_contents)
            };
            out.push(TreeToken::scaffold(TreeTokenKind::Comments, text));
        }
        NodeKind::Classes { class_definition_text, .. } => {
            out.push(TreeToken::scaffold(TreeTokenKind::Class, format!("{}{} {{\n", pad(depth, indent), class_definition_text)));
            render_children(&node.borrow().children, depth + 1, indent, out);
            out.push(TreeToken::scaffold(TreeTokenKind::Class, format!("{}}}\n", pad(depth, indent))));
        }
        NodeKind::FunctionGroups => {
            render_children(&node.borrow().children, depth, indent, out);
        }
        NodeKind::Functions { function_definition_text, .. } => {
            out.push(TreeToken::scaffold(
                TreeTokenKind::FunctionDefinition,
                format!("{}{} {}\n", pad(depth, indent), function_definition_text, PLACEHOLDER),
            ));
        }
        NodeKind::Argument { .. } => {}
        NodeKind::Attributes { attribute_name, attribute_type } => {
            let ty = attribute_type.map(|t| format!(": {t}")).unwrap_or_default();
            out.push(TreeToken::scaffold(TreeTokenKind::Attribute, format!("{}{}{}\n", pad(depth, indent), attribute_name, ty)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::python_detector::PythonDetector;
    use crate::grammar::GrammarParser;
    use crate::tokenizer::python::PythonLexer;
    use crate::tokenizer::LexicalTokenizer;

    fn parse_python(source: &str) -> NodeRef {
        let mut lexer = LexicalTokenizer::new(PythonLexer::new());
        let tokens = lexer.tokenize(source).unwrap();
        GrammarParser::new(&tokens, PythonDetector::new()).parse().unwrap()
    }

    #[test]
    fn faithful_round_trip_reproduces_source() {
        let source = "def f(a, b: int = 1):\n    pass\n";
        let ast = parse_python(source);
        let map = SourceMap::new(source);
        for level in [
            FidelityLevel::None,
            FidelityLevel::TopLevelOnly,
            FidelityLevel::FunctionsAndClasses,
            FidelityLevel::FunctionsAndClassesAndArguments,
            FidelityLevel::Everything,
        ] {
            for exclude_inner in [true, false] {
                let tokens = flatten_faithfully(&ast, &map, level, exclude_inner);
                let joined: String = tokens.iter().map(|t| t.text.as_str()).collect();
                assert_eq!(joined, source, "level={level:?} exclude_inner={exclude_inner}");
            }
        }
    }

    #[test]
    fn faithful_round_trip_survives_lifted_python_docstring() {
        // The docstring is lifted out of the function body onto the
        // enclosing FunctionGroups (§4.5), so its range sits *after* the
        // function header rather than before the function's own range —
        // the case that used to desynchronize `prev_end`.
        let source = "def f(self, n):\n    \"\"\"doc\"\"\"\n    return n\n";
        let ast = parse_python(source);
        let map = SourceMap::new(source);
        for level in [
            FidelityLevel::FunctionsAndClassesAndArguments,
            FidelityLevel::Everything,
        ] {
            for exclude_inner in [true, false] {
                let tokens = flatten_faithfully(&ast, &map, level, exclude_inner);
                let joined: String = tokens.iter().map(|t| t.text.as_str()).collect();
                assert_eq!(joined, source, "level={level:?} exclude_inner={exclude_inner}");
            }
        }
    }

    #[test]
    fn top_level_only_emits_whole_function_span() {
        let source = "def f(a):\n    pass\n";
        let ast = parse_python(source);
        let map = SourceMap::new(source);
        let tokens = flatten_faithfully(&ast, &map, FidelityLevel::TopLevelOnly, true);
        assert!(tokens.iter().any(|t| t.kind == TreeTokenKind::Function));
        assert!(!tokens.iter().any(|t| t.kind == TreeTokenKind::Argument));
    }

    #[test]
    fn arguments_level_reveals_argument_tokens() {
        let source = "def f(a, b: int = 1):\n    pass\n";
        let ast = parse_python(source);
        let map = SourceMap::new(source);
        let tokens = flatten_faithfully(&ast, &map, FidelityLevel::FunctionsAndClassesAndArguments, true);
        let args: Vec<_> = tokens.iter().filter(|t| t.kind == TreeTokenKind::Argument).collect();
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].text, "a");
    }

    #[test]
    fn simplification_mode_renders_class_scaffold() {
        let source = "class A:\n    x: int = 1\n    def m(self):\n        pass\n";
        let ast = parse_python(source);
        let tokens = flatten(&ast, Language::Python, None);
        assert!(tokens.iter().any(|t| t.kind == TreeTokenKind::Class && t.text.contains("class A:")));
        assert!(tokens.iter().any(|t| t.kind == TreeTokenKind::Attribute && t.text.contains("x: int")));
    }

    #[test]
    fn subtree_prefixes_enclosing_class_header_only() {
        let source = "class A:\n    x: int = 1\n    def m(self):\n        pass\n";
        let ast = parse_python(source);
        let attribute = ast.borrow().children[0].borrow().children[0].clone();
        let tokens = tokenize_subtree(&attribute, None);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, TreeTokenKind::Class);
        assert!(tokens[0].text.contains("class A:"));
        assert_eq!(tokens[1].kind, TreeTokenKind::Attribute);
        assert!(tokens[1].text.contains("x: int"));
        assert!(tokens[1].text.starts_with("        "), "attribute should be indented two levels deep: {:?}", tokens[1].text);
    }

    #[test]
    fn subtree_at_document_root_has_no_prefix() {
        let source = "def f(a):\n    pass\n";
        let ast = parse_python(source);
        let function = ast.borrow().children[0].borrow().children[0].clone();
        let tokens = tokenize_subtree(&function, None);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TreeTokenKind::FunctionDefinition);
        assert!(tokens[0].text.starts_with("def f"));
    }
}

//! The AST node model (§3, §9): a tagged sum over the fixed variant list,
//! owned top-down (`children`) and referenced bottom-up by a non-owning
//! (`Weak`) `parent` link, exactly as the design notes prescribe.

use crate::position::Range;
use ptree::TreeItem;
use std::cell::RefCell;
use std::fmt::{self, Debug, Formatter};
use std::rc::{Rc, Weak};

pub type NodeRef = Rc<RefCell<AstNode>>;

/// The tagged variant set of §3. Per-variant data is a plain field set;
/// callers dispatch on this tag, never on a type hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    TopLevel,
    References { reference_text: String, ref_relative_path: String },
    Classes { class_type: Option<String>, class_definition_text: String },
    Functions { function_definition_text: String, has_function_body: bool },
    FunctionGroups,
    FunctionDeclaration,
    Argument { argument_name: String, argument_type: Option<String> },
    Attributes { attribute_name: String, attribute_type: Option<String> },
    Comments { is_multi_line: bool, comment_contents: String },
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::TopLevel => "TopLevel",
            NodeKind::References { .. } => "References",
            NodeKind::Classes { .. } => "Classes",
            NodeKind::Functions { .. } => "Functions",
            NodeKind::FunctionGroups => "FunctionGroups",
            NodeKind::FunctionDeclaration => "FunctionDeclaration",
            NodeKind::Argument { .. } => "Argument",
            NodeKind::Attributes { .. } => "Attributes",
            NodeKind::Comments { .. } => "Comments",
        }
    }
}

pub struct AstNode {
    pub kind: NodeKind,
    pub range: Range,
    /// Tighter "body" range for classes/functions; prefix/suffix are
    /// everything in `range` outside this (§3).
    pub inner_range_override: Option<Range>,
    pub children: Vec<NodeRef>,
    pub parent: Option<Weak<RefCell<AstNode>>>,
    pub sibling_rank: usize,
}

impl AstNode {
    pub fn new(kind: NodeKind, range: Range) -> NodeRef {
        Rc::new(RefCell::new(Self {
            kind,
            range,
            inner_range_override: None,
            children: Vec::new(),
            parent: None,
            sibling_rank: 0,
        }))
    }

    pub fn with_inner_range(kind: NodeKind, range: Range, inner: Range) -> NodeRef {
        let node = Self::new(kind, range);
        node.borrow_mut().inner_range_override = Some(inner);
        node
    }

    /// The range callers should treat as "the body": `inner_range_override`
    /// when set, otherwise the node's own `range`.
    pub fn inner_range(&self) -> Range {
        self.inner_range_override.unwrap_or(self.range)
    }

    /// Derived by walking parents to the root (§3); never cached, since
    /// nodes are never re-parented after attachment.
    pub fn depth(node: &NodeRef) -> usize {
        let mut depth = 0;
        let mut cur = Rc::clone(node);
        loop {
            let parent = cur.borrow().parent.as_ref().and_then(Weak::upgrade);
            match parent {
                Some(p) => {
                    depth += 1;
                    cur = p;
                }
                None => break,
            }
        }
        depth
    }
}

/// Attach `child` as the next sibling of `parent`, assigning its
/// `sibling_rank` and back-reference. Insertion order is the sibling rank
/// (§3); callers must attach children in left-to-right source order.
pub fn attach_child(parent: &NodeRef, child: NodeRef) {
    let rank = parent.borrow().children.len();
    {
        let mut c = child.borrow_mut();
        c.sibling_rank = rank;
        c.parent = Some(Rc::downgrade(parent));
    }
    parent.borrow_mut().children.push(child);
}

impl Debug for AstNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AstNode")
            .field("kind", &self.kind)
            .field("range", &self.range)
            .field("inner_range_override", &self.inner_range_override)
            .field("children", &self.children.len())
            .finish()
    }
}

/// `ptree`-backed debug printing, mirrored from the teacher's own
/// `ASTNode::print`.
#[derive(Clone)]
pub struct AstNodeView(pub NodeRef);

impl TreeItem for AstNodeView {
    type Child = Self;

    fn write_self<W: std::io::Write>(&self, f: &mut W, _: &ptree::Style) -> std::io::Result<()> {
        let node = self.0.borrow();
        write!(f, "{} # {}", node.kind.label(), node.range)
    }

    fn children(&self) -> std::borrow::Cow<[Self::Child]> {
        std::borrow::Cow::from(self.0.borrow().children.iter().map(|c| AstNodeView(Rc::clone(c))).collect::<Vec<_>>())
    }
}

impl AstNode {
    pub fn print(node: &NodeRef) -> Result<(), std::io::Error> {
        ptree::print_tree(&AstNodeView(Rc::clone(node)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Index;

    fn rng(a: (usize, usize), b: (usize, usize)) -> Range {
        Range::new(Index::new(a.0, a.1), Index::new(b.0, b.1))
    }

    #[test]
    fn attach_child_assigns_rank_and_parent() {
        let root = AstNode::new(NodeKind::TopLevel, rng((0, 0), (5, 0)));
        let a = AstNode::new(NodeKind::Comments { is_multi_line: false, comment_contents: "x".into() }, rng((0, 0), (0, 2)));
        let b = AstNode::new(NodeKind::Comments { is_multi_line: false, comment_contents: "y".into() }, rng((1, 0), (1, 2)));
        attach_child(&root, Rc::clone(&a));
        attach_child(&root, Rc::clone(&b));

        assert_eq!(a.borrow().sibling_rank, 0);
        assert_eq!(b.borrow().sibling_rank, 1);
        assert_eq!(AstNode::depth(&a), 1);
        let parent = a.borrow().parent.clone().unwrap().upgrade().unwrap();
        assert!(Rc::ptr_eq(&parent, &root));
    }

    #[test]
    fn inner_range_falls_back_to_range() {
        let node = AstNode::new(NodeKind::TopLevel, rng((0, 0), (5, 0)));
        assert_eq!(node.borrow().inner_range(), rng((0, 0), (5, 0)));
    }

    #[test]
    fn with_inner_range_overrides() {
        let node = AstNode::with_inner_range(NodeKind::TopLevel, rng((0, 0), (5, 0)), rng((1, 0), (4, 0)));
        assert_eq!(node.borrow().inner_range(), rng((1, 0), (4, 0)));
    }
}

//! AST node model.
//!
//! Input trees are built by a host (a parser or the [`Expr`] builder) out of
//! [`Node`]s. A node carries its kind, its source span and two memo cells:
//! the resolved expression type and the folded constant value. Both are
//! computed at most once per compilation.
//!
//! Resolution slots inside some kinds (`target`, `binding`, `scope`,
//! `method`) start out empty and are filled by the closure conversion pass;
//! type resolution and emission read them.

mod builder;
mod constant;
mod signature;
pub(crate) mod typing;

use std::cell::OnceCell;

use lantern_core::{BinaryOp, CompareOp, LogicalOp, Span, TypeDesc, UnaryOp, Value};

use crate::entities::MethodId;
use crate::scope::{BindingId, ScopeId};

pub use builder::Expr;
pub use signature::TypeSignature;

/// A node of the input tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    ty: OnceCell<TypeDesc>,
    constant: OnceCell<Option<Value>>,
}

/// What a name in a `Get` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// A local, parameter or captured variable.
    Binding(BindingId),
    /// A top-level function used as a value.
    Function(MethodId),
}

/// Initializer of a `var` declaration.
#[derive(Debug, Clone)]
pub enum VarInit {
    Value(Box<Node>),
    /// Declared type only; the variable starts at the type's default value.
    Type(TypeSignature),
}

/// A parameter of a function or lambda.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub signature: TypeSignature,
    pub by_ref: bool,
    pub span: Span,
}

impl Param {
    pub fn new(name: impl Into<String>, signature: impl Into<TypeSignature>) -> Self {
        Self {
            name: name.into(),
            signature: signature.into(),
            by_ref: false,
            span: Span::default(),
        }
    }

    pub fn by_ref(mut self) -> Self {
        self.by_ref = true;
        self
    }
}

/// `type Shape = Circle of double | Square of double | Empty`
#[derive(Debug, Clone)]
pub struct TypeDefinition {
    pub name: String,
    pub labels: Vec<LabelDefinition>,
}

#[derive(Debug, Clone)]
pub struct LabelDefinition {
    pub name: String,
    /// Type of the optional `Tag` field.
    pub tag: Option<TypeSignature>,
}

#[derive(Debug, Clone)]
pub struct RecordDefinition {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
}

#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: String,
    pub signature: TypeSignature,
}

#[derive(Debug, Clone)]
pub struct FunctionDefinition {
    pub name: String,
    /// User type the function is a static method of.
    pub owner: Option<String>,
    pub params: Vec<Param>,
    /// Inferred from the body when absent.
    pub return_type: Option<TypeSignature>,
    pub body: Box<Node>,
}

/// The closed set of node kinds.
#[derive(Debug, Clone)]
pub enum NodeKind {
    // Literals
    Unit,
    Null,
    Literal(Value),

    // Names
    Get {
        name: String,
        target: Option<Target>,
    },
    Set {
        name: String,
        value: Box<Node>,
        binding: Option<BindingId>,
    },
    /// Argument of the current function by position.
    GetArgument(u16),

    // Members and indexers
    GetMember {
        target: Box<Node>,
        name: String,
    },
    SetMember {
        target: Box<Node>,
        name: String,
        value: Box<Node>,
    },
    GetIndex {
        target: Box<Node>,
        index: Box<Node>,
    },
    SetIndex {
        target: Box<Node>,
        index: Box<Node>,
        value: Box<Node>,
    },

    // Operators
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Compare {
        op: CompareOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Cast {
        value: Box<Node>,
        ty: TypeSignature,
    },
    Is {
        value: Box<Node>,
        ty: TypeSignature,
    },
    Default(TypeSignature),

    // Construction
    New {
        ty: TypeSignature,
        args: Vec<Node>,
    },
    NewList(Vec<Node>),
    NewDictionary(Vec<(Node, Node)>),

    // Control flow
    Block {
        body: Vec<Node>,
        scope: Option<ScopeId>,
    },
    If {
        condition: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Option<Box<Node>>,
    },
    While {
        condition: Box<Node>,
        body: Box<Node>,
    },

    // Declarations
    Let {
        name: String,
        value: Box<Node>,
        binding: Option<BindingId>,
    },
    Var {
        name: String,
        init: VarInit,
        binding: Option<BindingId>,
    },

    // Functions
    Lambda {
        params: Vec<Param>,
        /// Moved into the lambda's method entity by closure conversion.
        body: Option<Box<Node>>,
        method: Option<MethodId>,
    },
    Invoke {
        target: Box<Node>,
        args: Vec<Node>,
    },

    // Top level only
    TypeDefinition(TypeDefinition),
    RecordDefinition(RecordDefinition),
    FunctionDefinition(FunctionDefinition),
    Using(String),
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self::with_span(kind, Span::default())
    }

    pub fn with_span(kind: NodeKind, span: Span) -> Self {
        Self {
            kind,
            span,
            ty: OnceCell::new(),
            constant: OnceCell::new(),
        }
    }

    /// Attach a source position.
    pub fn at(mut self, line: u32, col: u32) -> Self {
        self.span = Span::point(line, col);
        self
    }

    /// The memoized expression type, if it was already resolved.
    pub fn cached_type(&self) -> Option<&TypeDesc> {
        self.ty.get()
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self.kind, NodeKind::Null)
    }

    /// Whether this node may only appear at the top level.
    pub fn is_definition(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::TypeDefinition(_)
                | NodeKind::RecordDefinition(_)
                | NodeKind::FunctionDefinition(_)
                | NodeKind::Using(_)
        )
    }

    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<&Node> {
        match &self.kind {
            NodeKind::Unit
            | NodeKind::Null
            | NodeKind::Literal(_)
            | NodeKind::Get { .. }
            | NodeKind::GetArgument(_)
            | NodeKind::Default(_)
            | NodeKind::TypeDefinition(_)
            | NodeKind::RecordDefinition(_)
            | NodeKind::Using(_) => Vec::new(),
            NodeKind::Set { value, .. } | NodeKind::Let { value, .. } => vec![value.as_ref()],
            NodeKind::Var { init, .. } => match init {
                VarInit::Value(value) => vec![value.as_ref()],
                VarInit::Type(_) => Vec::new(),
            },
            NodeKind::GetMember { target, .. } => vec![target.as_ref()],
            NodeKind::SetMember { target, value, .. } => vec![target.as_ref(), value.as_ref()],
            NodeKind::GetIndex { target, index } => vec![target.as_ref(), index.as_ref()],
            NodeKind::SetIndex { target, index, value } => vec![target.as_ref(), index.as_ref(), value.as_ref()],
            NodeKind::Binary { left, right, .. }
            | NodeKind::Compare { left, right, .. }
            | NodeKind::Logical { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            NodeKind::Unary { operand, .. } => vec![operand.as_ref()],
            NodeKind::Cast { value, .. } | NodeKind::Is { value, .. } => vec![value.as_ref()],
            NodeKind::New { args, .. } => args.iter().collect(),
            NodeKind::NewList(items) => items.iter().collect(),
            NodeKind::NewDictionary(pairs) => pairs.iter().flat_map(|(k, v)| [k, v]).collect(),
            NodeKind::Block { body, .. } => body.iter().collect(),
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut children: Vec<&Node> = vec![condition.as_ref(), then_branch.as_ref()];
                children.extend(else_branch.as_deref());
                children
            }
            NodeKind::While { condition, body } => vec![condition.as_ref(), body.as_ref()],
            NodeKind::Lambda { body, .. } => body.as_deref().into_iter().collect(),
            NodeKind::Invoke { target, args } => std::iter::once(target.as_ref()).chain(args.iter()).collect(),
            NodeKind::FunctionDefinition(def) => vec![def.body.as_ref()],
        }
    }

    /// Mutable access to the direct children, in the same order as [`Node::children`].
    pub fn children_mut(&mut self) -> Vec<&mut Node> {
        match &mut self.kind {
            NodeKind::Unit
            | NodeKind::Null
            | NodeKind::Literal(_)
            | NodeKind::Get { .. }
            | NodeKind::GetArgument(_)
            | NodeKind::Default(_)
            | NodeKind::TypeDefinition(_)
            | NodeKind::RecordDefinition(_)
            | NodeKind::Using(_) => Vec::new(),
            NodeKind::Set { value, .. } | NodeKind::Let { value, .. } => vec![value.as_mut()],
            NodeKind::Var { init, .. } => match init {
                VarInit::Value(value) => vec![value.as_mut()],
                VarInit::Type(_) => Vec::new(),
            },
            NodeKind::GetMember { target, .. } => vec![target.as_mut()],
            NodeKind::SetMember { target, value, .. } => vec![target.as_mut(), value.as_mut()],
            NodeKind::GetIndex { target, index } => vec![target.as_mut(), index.as_mut()],
            NodeKind::SetIndex { target, index, value } => vec![target.as_mut(), index.as_mut(), value.as_mut()],
            NodeKind::Binary { left, right, .. }
            | NodeKind::Compare { left, right, .. }
            | NodeKind::Logical { left, right, .. } => vec![left.as_mut(), right.as_mut()],
            NodeKind::Unary { operand, .. } => vec![operand.as_mut()],
            NodeKind::Cast { value, .. } | NodeKind::Is { value, .. } => vec![value.as_mut()],
            NodeKind::New { args, .. } => args.iter_mut().collect(),
            NodeKind::NewList(items) => items.iter_mut().collect(),
            NodeKind::NewDictionary(pairs) => pairs.iter_mut().flat_map(|(k, v)| [k, v]).collect(),
            NodeKind::Block { body, .. } => body.iter_mut().collect(),
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut children: Vec<&mut Node> = vec![condition.as_mut(), then_branch.as_mut()];
                children.extend(else_branch.as_deref_mut());
                children
            }
            NodeKind::While { condition, body } => vec![condition.as_mut(), body.as_mut()],
            NodeKind::Lambda { body, .. } => body.as_deref_mut().into_iter().collect(),
            NodeKind::Invoke { target, args } => std::iter::once(target.as_mut()).chain(args.iter_mut()).collect(),
            NodeKind::FunctionDefinition(def) => vec![def.body.as_mut()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_follow_evaluation_order() {
        let node = Expr::if_else(Expr::bool(true), Expr::int(1), Expr::int(2));
        let children = node.children();
        assert_eq!(children.len(), 3);
        assert!(matches!(children[2].kind, NodeKind::Literal(Value::Int32(2))));

        let call = Expr::call("f", vec![Expr::int(1), Expr::int(2)]);
        assert_eq!(call.children().len(), 3);
    }

    #[test]
    fn leaves_have_no_children() {
        assert!(Expr::int(1).children().is_empty());
        assert!(Expr::get("x").children().is_empty());
        assert!(Expr::var_typed("x", "int").children().is_empty());
    }

    #[test]
    fn dictionary_children_interleave_keys_and_values() {
        let mut dict = Expr::dict(vec![(Expr::string("a"), Expr::int(1)), (Expr::string("b"), Expr::int(2))]);
        assert_eq!(dict.children().len(), 4);
        assert_eq!(dict.children_mut().len(), 4);
    }

    #[test]
    fn definitions_are_recognized() {
        assert!(Expr::using("Collections").is_definition());
        assert!(!Expr::block(vec![]).is_definition());
    }
}

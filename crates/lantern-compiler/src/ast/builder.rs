//! Builder DSL for input trees.
//!
//! Hosts without a parser (and the tests) build scripts with these
//! constructors:
//!
//! ```
//! use lantern_compiler::ast::Expr;
//!
//! let script = vec![
//!     Expr::var("x", Expr::int(0)),
//!     Expr::let_("inc", Expr::lambda(vec![], Expr::set("x", Expr::add(Expr::get("x"), Expr::int(1))))),
//!     Expr::call("inc", vec![]),
//!     Expr::get("x"),
//! ];
//! assert_eq!(script.len(), 4);
//! ```

use lantern_core::{BinaryOp, CompareOp, LogicalOp, UnaryOp, Value};

use super::{
    FieldDefinition, FunctionDefinition, LabelDefinition, Node, NodeKind, Param, RecordDefinition,
    TypeDefinition, TypeSignature, VarInit,
};

/// Namespace of node constructors.
pub struct Expr;

impl Expr {
    // ==========================================================================
    // Literals
    // ==========================================================================

    pub fn unit() -> Node {
        Node::new(NodeKind::Unit)
    }

    pub fn null() -> Node {
        Node::new(NodeKind::Null)
    }

    pub fn literal(value: impl Into<Value>) -> Node {
        Node::new(NodeKind::Literal(value.into()))
    }

    pub fn bool(value: bool) -> Node {
        Self::literal(value)
    }

    pub fn int(value: i32) -> Node {
        Self::literal(value)
    }

    pub fn long(value: i64) -> Node {
        Self::literal(value)
    }

    pub fn uint(value: u32) -> Node {
        Self::literal(Value::Uint32(value))
    }

    pub fn float(value: f32) -> Node {
        Self::literal(Value::Float(value))
    }

    pub fn double(value: f64) -> Node {
        Self::literal(value)
    }

    pub fn string(value: &str) -> Node {
        Self::literal(value)
    }

    // ==========================================================================
    // Names
    // ==========================================================================

    pub fn get(name: &str) -> Node {
        Node::new(NodeKind::Get {
            name: name.to_string(),
            target: None,
        })
    }

    pub fn set(name: &str, value: Node) -> Node {
        Node::new(NodeKind::Set {
            name: name.to_string(),
            value: Box::new(value),
            binding: None,
        })
    }

    pub fn arg(index: u16) -> Node {
        Node::new(NodeKind::GetArgument(index))
    }

    pub fn member(target: Node, name: &str) -> Node {
        Node::new(NodeKind::GetMember {
            target: Box::new(target),
            name: name.to_string(),
        })
    }

    pub fn set_member(target: Node, name: &str, value: Node) -> Node {
        Node::new(NodeKind::SetMember {
            target: Box::new(target),
            name: name.to_string(),
            value: Box::new(value),
        })
    }

    pub fn index(target: Node, index: Node) -> Node {
        Node::new(NodeKind::GetIndex {
            target: Box::new(target),
            index: Box::new(index),
        })
    }

    pub fn set_index(target: Node, index: Node, value: Node) -> Node {
        Node::new(NodeKind::SetIndex {
            target: Box::new(target),
            index: Box::new(index),
            value: Box::new(value),
        })
    }

    // ==========================================================================
    // Operators
    // ==========================================================================

    pub fn binary(op: BinaryOp, left: Node, right: Node) -> Node {
        Node::new(NodeKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn add(left: Node, right: Node) -> Node {
        Self::binary(BinaryOp::Add, left, right)
    }

    pub fn sub(left: Node, right: Node) -> Node {
        Self::binary(BinaryOp::Sub, left, right)
    }

    pub fn mul(left: Node, right: Node) -> Node {
        Self::binary(BinaryOp::Mul, left, right)
    }

    pub fn div(left: Node, right: Node) -> Node {
        Self::binary(BinaryOp::Div, left, right)
    }

    pub fn rem(left: Node, right: Node) -> Node {
        Self::binary(BinaryOp::Rem, left, right)
    }

    pub fn pow(left: Node, right: Node) -> Node {
        Self::binary(BinaryOp::Pow, left, right)
    }

    pub fn shl(left: Node, right: Node) -> Node {
        Self::binary(BinaryOp::Shl, left, right)
    }

    pub fn shr(left: Node, right: Node) -> Node {
        Self::binary(BinaryOp::Shr, left, right)
    }

    pub fn compare(op: CompareOp, left: Node, right: Node) -> Node {
        Node::new(NodeKind::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn equal(left: Node, right: Node) -> Node {
        Self::compare(CompareOp::Equal, left, right)
    }

    pub fn not_equal(left: Node, right: Node) -> Node {
        Self::compare(CompareOp::NotEqual, left, right)
    }

    pub fn less(left: Node, right: Node) -> Node {
        Self::compare(CompareOp::Less, left, right)
    }

    pub fn less_equal(left: Node, right: Node) -> Node {
        Self::compare(CompareOp::LessEqual, left, right)
    }

    pub fn greater(left: Node, right: Node) -> Node {
        Self::compare(CompareOp::Greater, left, right)
    }

    pub fn greater_equal(left: Node, right: Node) -> Node {
        Self::compare(CompareOp::GreaterEqual, left, right)
    }

    pub fn logical(op: LogicalOp, left: Node, right: Node) -> Node {
        Node::new(NodeKind::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn and(left: Node, right: Node) -> Node {
        Self::logical(LogicalOp::And, left, right)
    }

    pub fn or(left: Node, right: Node) -> Node {
        Self::logical(LogicalOp::Or, left, right)
    }

    pub fn xor(left: Node, right: Node) -> Node {
        Self::logical(LogicalOp::Xor, left, right)
    }

    pub fn neg(operand: Node) -> Node {
        Node::new(NodeKind::Unary {
            op: UnaryOp::Negate,
            operand: Box::new(operand),
        })
    }

    pub fn not(operand: Node) -> Node {
        Node::new(NodeKind::Unary {
            op: UnaryOp::Not,
            operand: Box::new(operand),
        })
    }

    pub fn cast(value: Node, ty: &str) -> Node {
        Node::new(NodeKind::Cast {
            value: Box::new(value),
            ty: TypeSignature::parse(ty),
        })
    }

    pub fn is(value: Node, ty: &str) -> Node {
        Node::new(NodeKind::Is {
            value: Box::new(value),
            ty: TypeSignature::parse(ty),
        })
    }

    pub fn default(ty: &str) -> Node {
        Node::new(NodeKind::Default(TypeSignature::parse(ty)))
    }

    // ==========================================================================
    // Construction
    // ==========================================================================

    pub fn new_instance(ty: &str, args: Vec<Node>) -> Node {
        Node::new(NodeKind::New {
            ty: TypeSignature::parse(ty),
            args,
        })
    }

    pub fn list(items: Vec<Node>) -> Node {
        Node::new(NodeKind::NewList(items))
    }

    pub fn dict(pairs: Vec<(Node, Node)>) -> Node {
        Node::new(NodeKind::NewDictionary(pairs))
    }

    // ==========================================================================
    // Control flow and declarations
    // ==========================================================================

    pub fn block(body: Vec<Node>) -> Node {
        Node::new(NodeKind::Block { body, scope: None })
    }

    pub fn if_then(condition: Node, then_branch: Node) -> Node {
        Node::new(NodeKind::If {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: None,
        })
    }

    pub fn if_else(condition: Node, then_branch: Node, else_branch: Node) -> Node {
        Node::new(NodeKind::If {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Some(Box::new(else_branch)),
        })
    }

    pub fn while_loop(condition: Node, body: Node) -> Node {
        Node::new(NodeKind::While {
            condition: Box::new(condition),
            body: Box::new(body),
        })
    }

    /// Immutable binding.
    pub fn let_(name: &str, value: Node) -> Node {
        Node::new(NodeKind::Let {
            name: name.to_string(),
            value: Box::new(value),
            binding: None,
        })
    }

    /// Mutable binding with an initial value.
    pub fn var(name: &str, value: Node) -> Node {
        Node::new(NodeKind::Var {
            name: name.to_string(),
            init: VarInit::Value(Box::new(value)),
            binding: None,
        })
    }

    /// Mutable binding starting at the default value of `ty`.
    pub fn var_typed(name: &str, ty: &str) -> Node {
        Node::new(NodeKind::Var {
            name: name.to_string(),
            init: VarInit::Type(TypeSignature::parse(ty)),
            binding: None,
        })
    }

    // ==========================================================================
    // Functions
    // ==========================================================================

    pub fn param(name: &str, ty: &str) -> Param {
        Param::new(name, ty)
    }

    pub fn lambda(params: Vec<Param>, body: Node) -> Node {
        Node::new(NodeKind::Lambda {
            params,
            body: Some(Box::new(body)),
            method: None,
        })
    }

    pub fn invoke(target: Node, args: Vec<Node>) -> Node {
        Node::new(NodeKind::Invoke {
            target: Box::new(target),
            args,
        })
    }

    /// Call a function, or a function value, by name.
    pub fn call(name: &str, args: Vec<Node>) -> Node {
        Self::invoke(Self::get(name), args)
    }

    /// Call a static method of a user type.
    pub fn call_static(owner: &str, name: &str, args: Vec<Node>) -> Node {
        Self::invoke(Self::member(Self::get(owner), name), args)
    }

    // ==========================================================================
    // Top-level definitions
    // ==========================================================================

    pub fn fun(name: &str, params: Vec<Param>, return_type: Option<&str>, body: Node) -> Node {
        Node::new(NodeKind::FunctionDefinition(FunctionDefinition {
            name: name.to_string(),
            owner: None,
            params,
            return_type: return_type.map(TypeSignature::parse),
            body: Box::new(body),
        }))
    }

    /// Static method `owner.name`.
    pub fn method(owner: &str, name: &str, params: Vec<Param>, return_type: Option<&str>, body: Node) -> Node {
        Node::new(NodeKind::FunctionDefinition(FunctionDefinition {
            name: name.to_string(),
            owner: Some(owner.to_string()),
            params,
            return_type: return_type.map(TypeSignature::parse),
            body: Box::new(body),
        }))
    }

    /// `record name = { field: type; ... }`
    pub fn record(name: &str, fields: &[(&str, &str)]) -> Node {
        Node::new(NodeKind::RecordDefinition(RecordDefinition {
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|(field, ty)| FieldDefinition {
                    name: field.to_string(),
                    signature: TypeSignature::parse(ty),
                })
                .collect(),
        }))
    }

    /// Algebraic type; each label has an optional tag type.
    pub fn type_def(name: &str, labels: &[(&str, Option<&str>)]) -> Node {
        Node::new(NodeKind::TypeDefinition(TypeDefinition {
            name: name.to_string(),
            labels: labels
                .iter()
                .map(|(label, tag)| LabelDefinition {
                    name: label.to_string(),
                    tag: tag.map(TypeSignature::parse),
                })
                .collect(),
        }))
    }

    pub fn using(namespace: &str) -> Node {
        Node::new(NodeKind::Using(namespace.to_string()))
    }
}

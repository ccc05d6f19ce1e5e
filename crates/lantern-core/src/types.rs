//! Resolved type descriptors.
//!
//! A [`TypeDesc`] is what the type resolver produces from a textual
//! signature and what every node's expression type is expressed in.

use std::fmt;
use std::rc::Rc;

use crate::{PrimitiveKind, TypeHash, Value};

/// A fully resolved type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    /// The type of statements and of expressions without a value.
    Unit,
    /// The type of the `null` literal. Assignable to any nullable type.
    Null,
    Primitive(PrimitiveKind),
    String,
    /// The root of every type.
    Object,
    /// An optional value type, `T?`.
    Nullable(Box<TypeDesc>),
    List(Box<TypeDesc>),
    Dict(Box<TypeDesc>, Box<TypeDesc>),
    Function(Rc<FunctionType>),
    /// A record, algebraic type, type label or closure carrier.
    User(UserType),
}

/// Signature of a function value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub params: Vec<TypeDesc>,
    pub ret: TypeDesc,
}

/// Reference to a user-declared or synthesized type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserType {
    pub name: Rc<str>,
    pub hash: TypeHash,
}

impl UserType {
    pub fn new(name: &str) -> Self {
        Self {
            name: Rc::from(name),
            hash: TypeHash::from_name(name),
        }
    }
}

impl TypeDesc {
    pub const BOOL: TypeDesc = TypeDesc::Primitive(PrimitiveKind::Bool);
    pub const INT: TypeDesc = TypeDesc::Primitive(PrimitiveKind::Int32);
    pub const LONG: TypeDesc = TypeDesc::Primitive(PrimitiveKind::Int64);
    pub const UINT: TypeDesc = TypeDesc::Primitive(PrimitiveKind::Uint32);
    pub const FLOAT: TypeDesc = TypeDesc::Primitive(PrimitiveKind::Float);
    pub const DOUBLE: TypeDesc = TypeDesc::Primitive(PrimitiveKind::Double);

    /// `T?` for a value type.
    pub fn nullable(inner: TypeDesc) -> TypeDesc {
        TypeDesc::Nullable(Box::new(inner))
    }

    pub fn list(item: TypeDesc) -> TypeDesc {
        TypeDesc::List(Box::new(item))
    }

    pub fn dict(key: TypeDesc, value: TypeDesc) -> TypeDesc {
        TypeDesc::Dict(Box::new(key), Box::new(value))
    }

    pub fn function(params: Vec<TypeDesc>, ret: TypeDesc) -> TypeDesc {
        TypeDesc::Function(Rc::new(FunctionType { params, ret }))
    }

    pub fn user(name: &str) -> TypeDesc {
        TypeDesc::User(UserType::new(name))
    }

    #[inline]
    pub fn as_primitive(&self) -> Option<PrimitiveKind> {
        match self {
            TypeDesc::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    #[inline]
    pub fn is_numeric(&self) -> bool {
        self.as_primitive().is_some_and(PrimitiveKind::is_numeric)
    }

    #[inline]
    pub fn is_integer(&self) -> bool {
        self.as_primitive().is_some_and(PrimitiveKind::is_integer)
    }

    #[inline]
    pub fn is_unit(&self) -> bool {
        matches!(self, TypeDesc::Unit)
    }

    /// Value types can be wrapped in `T?` and are never null themselves.
    #[inline]
    pub fn is_value_type(&self) -> bool {
        matches!(self, TypeDesc::Primitive(_))
    }

    /// Types whose values may be `null`.
    pub fn is_nullable_reference(&self) -> bool {
        matches!(
            self,
            TypeDesc::Null
                | TypeDesc::String
                | TypeDesc::Object
                | TypeDesc::Nullable(_)
                | TypeDesc::List(_)
                | TypeDesc::Dict(..)
                | TypeDesc::Function(_)
                | TypeDesc::User(_)
        )
    }

    /// The underlying type of `T?`.
    pub fn nullable_base(&self) -> Option<&TypeDesc> {
        match self {
            TypeDesc::Nullable(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn as_user(&self) -> Option<&UserType> {
        match self {
            TypeDesc::User(user) => Some(user),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionType> {
        match self {
            TypeDesc::Function(func) => Some(func),
            _ => None,
        }
    }

    /// Identity hash, used for function signature hashing.
    pub fn type_hash(&self) -> TypeHash {
        match self {
            TypeDesc::Unit => TypeHash::from_name("unit"),
            TypeDesc::Null => TypeHash::from_name("null"),
            TypeDesc::Primitive(kind) => TypeHash::from_name(kind.name()),
            TypeDesc::String => TypeHash::from_name("string"),
            TypeDesc::Object => TypeHash::from_name("object"),
            TypeDesc::Nullable(inner) => TypeHash::from_instance("?", &[inner.type_hash()]),
            TypeDesc::List(item) => TypeHash::from_instance("List", &[item.type_hash()]),
            TypeDesc::Dict(key, value) => {
                TypeHash::from_instance("Dict", &[key.type_hash(), value.type_hash()])
            }
            TypeDesc::Function(func) => {
                let mut parts: Vec<TypeHash> = func.params.iter().map(TypeDesc::type_hash).collect();
                parts.push(func.ret.type_hash());
                TypeHash::from_instance("Func", &parts)
            }
            TypeDesc::User(user) => user.hash,
        }
    }

    /// The value a fresh variable or field of this type holds.
    pub fn default_value(&self) -> Value {
        match self {
            TypeDesc::Unit => Value::Unit,
            TypeDesc::Primitive(kind) => Value::zero(*kind),
            _ => Value::Null,
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Unit => f.write_str("unit"),
            TypeDesc::Null => f.write_str("null"),
            TypeDesc::Primitive(kind) => f.write_str(kind.name()),
            TypeDesc::String => f.write_str("string"),
            TypeDesc::Object => f.write_str("object"),
            TypeDesc::Nullable(inner) => write!(f, "{inner}?"),
            TypeDesc::List(item) => write!(f, "List<{item}>"),
            TypeDesc::Dict(key, value) => write!(f, "Dict<{key}, {value}>"),
            TypeDesc::Function(func) => {
                f.write_str("Func<")?;
                for param in &func.params {
                    write!(f, "{param}, ")?;
                }
                write!(f, "{}>", func.ret)
            }
            TypeDesc::User(user) => f.write_str(&user.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names() {
        assert_eq!(TypeDesc::INT.to_string(), "int");
        assert_eq!(TypeDesc::nullable(TypeDesc::LONG).to_string(), "long?");
        assert_eq!(TypeDesc::dict(TypeDesc::String, TypeDesc::list(TypeDesc::DOUBLE)).to_string(), "Dict<string, List<double>>");
        assert_eq!(TypeDesc::function(vec![TypeDesc::INT], TypeDesc::BOOL).to_string(), "Func<int, bool>");
        assert_eq!(TypeDesc::function(vec![], TypeDesc::Unit).to_string(), "Func<unit>");
    }

    #[test]
    fn defaults_per_type() {
        assert_eq!(TypeDesc::INT.default_value(), Value::Int32(0));
        assert_eq!(TypeDesc::BOOL.default_value(), Value::Bool(false));
        assert_eq!(TypeDesc::nullable(TypeDesc::INT).default_value(), Value::Null);
        assert_eq!(TypeDesc::String.default_value(), Value::Null);
        assert_eq!(TypeDesc::Unit.default_value(), Value::Unit);
    }

    #[test]
    fn user_types_compare_by_name() {
        assert_eq!(TypeDesc::user("Point"), TypeDesc::user("Point"));
        assert_ne!(TypeDesc::user("Point"), TypeDesc::user("Size"));
        assert_eq!(TypeDesc::user("Point").type_hash(), TypeHash::from_name("Point"));
    }

    #[test]
    fn generic_hashes_follow_arguments() {
        assert_ne!(TypeDesc::list(TypeDesc::INT).type_hash(), TypeDesc::list(TypeDesc::LONG).type_hash());
        assert_eq!(TypeDesc::list(TypeDesc::INT).type_hash(), TypeDesc::list(TypeDesc::INT).type_hash());
    }
}

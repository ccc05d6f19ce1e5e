//! Dynamically typed values.
//!
//! [`Value`] is both the constant representation used by folding and the
//! runtime representation used by the VM. Optional values are stored as the
//! plain value or [`Value::Null`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;

use crate::PrimitiveKind;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Unit,
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Float(f32),
    Double(f64),
    Str(Rc<str>),
    Object(Rc<RefCell<Object>>),
    List(Rc<RefCell<Vec<Value>>>),
    Dict(Rc<RefCell<FxHashMap<ValueKey, Value>>>),
    Function(Rc<FunctionValue>),
}

/// An instance of a record, type label or closure carrier.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    /// Index of the type in the compiled unit's type table.
    pub type_index: u32,
    pub type_name: Rc<str>,
    pub fields: Vec<Value>,
}

/// A callable value: a function of the compiled unit plus its receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionValue {
    pub function: u32,
    /// Carrier instance for closures, `None` for plain functions.
    pub receiver: Option<Value>,
}

/// Hashable projection of a value used as dictionary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Unit,
    Null,
    Bool(bool),
    Int(i128),
    Float(OrderedFloat<f64>),
    Str(Rc<str>),
    /// Reference identity of a heap value.
    Ref(usize),
}

impl Value {
    pub fn str(text: &str) -> Value {
        Value::Str(Rc::from(text))
    }

    /// The zero of a primitive kind (`false` for `bool`).
    pub fn zero(kind: PrimitiveKind) -> Value {
        match kind {
            PrimitiveKind::Bool => Value::Bool(false),
            PrimitiveKind::Int8 => Value::Int8(0),
            PrimitiveKind::Int16 => Value::Int16(0),
            PrimitiveKind::Int32 => Value::Int32(0),
            PrimitiveKind::Int64 => Value::Int64(0),
            PrimitiveKind::Uint8 => Value::Uint8(0),
            PrimitiveKind::Uint16 => Value::Uint16(0),
            PrimitiveKind::Uint32 => Value::Uint32(0),
            PrimitiveKind::Uint64 => Value::Uint64(0),
            PrimitiveKind::Float => Value::Float(0.0),
            PrimitiveKind::Double => Value::Double(0.0),
        }
    }

    pub fn new_list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn new_object(type_index: u32, type_name: Rc<str>, fields: Vec<Value>) -> Value {
        Value::Object(Rc::new(RefCell::new(Object {
            type_index,
            type_name,
            fields,
        })))
    }

    /// The primitive kind of a primitive value.
    pub fn kind(&self) -> Option<PrimitiveKind> {
        let kind = match self {
            Value::Bool(_) => PrimitiveKind::Bool,
            Value::Int8(_) => PrimitiveKind::Int8,
            Value::Int16(_) => PrimitiveKind::Int16,
            Value::Int32(_) => PrimitiveKind::Int32,
            Value::Int64(_) => PrimitiveKind::Int64,
            Value::Uint8(_) => PrimitiveKind::Uint8,
            Value::Uint16(_) => PrimitiveKind::Uint16,
            Value::Uint32(_) => PrimitiveKind::Uint32,
            Value::Uint64(_) => PrimitiveKind::Uint64,
            Value::Float(_) => PrimitiveKind::Float,
            Value::Double(_) => PrimitiveKind::Double,
            _ => return None,
        };
        Some(kind)
    }

    /// Runtime type name, for diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            Value::Unit => "unit".into(),
            Value::Null => "null".into(),
            Value::Str(_) => "string".into(),
            Value::Object(obj) => obj.borrow().type_name.to_string(),
            Value::List(_) => "List".into(),
            Value::Dict(_) => "Dict".into(),
            Value::Function(_) => "Func".into(),
            other => other.kind().map(|k| k.name()).unwrap_or("?").into(),
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer value widened to `i128`, for any integer kind.
    pub fn as_integer(&self) -> Option<i128> {
        let int = match self {
            Value::Int8(v) => *v as i128,
            Value::Int16(v) => *v as i128,
            Value::Int32(v) => *v as i128,
            Value::Int64(v) => *v as i128,
            Value::Uint8(v) => *v as i128,
            Value::Uint16(v) => *v as i128,
            Value::Uint32(v) => *v as i128,
            Value::Uint64(v) => *v as i128,
            _ => return None,
        };
        Some(int)
    }

    /// Numeric value as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            other => other.as_integer().map(|i| i as f64),
        }
    }

    /// Convert a numeric value to another numeric kind.
    ///
    /// Integer narrowing truncates, float to integer saturates. `bool` only
    /// converts to itself.
    pub fn convert(&self, kind: PrimitiveKind) -> Option<Value> {
        if self.kind() == Some(kind) {
            return Some(self.clone());
        }
        if kind == PrimitiveKind::Bool || !self.kind()?.is_numeric() {
            return None;
        }
        if let Some(int) = self.as_integer() {
            return Some(match kind {
                PrimitiveKind::Int8 => Value::Int8(int as i8),
                PrimitiveKind::Int16 => Value::Int16(int as i16),
                PrimitiveKind::Int32 => Value::Int32(int as i32),
                PrimitiveKind::Int64 => Value::Int64(int as i64),
                PrimitiveKind::Uint8 => Value::Uint8(int as u8),
                PrimitiveKind::Uint16 => Value::Uint16(int as u16),
                PrimitiveKind::Uint32 => Value::Uint32(int as u32),
                PrimitiveKind::Uint64 => Value::Uint64(int as u64),
                PrimitiveKind::Float => Value::Float(int as f32),
                PrimitiveKind::Double => Value::Double(int as f64),
                PrimitiveKind::Bool => return None,
            });
        }
        let float = self.as_f64()?;
        Some(match kind {
            PrimitiveKind::Int8 => Value::Int8(float as i8),
            PrimitiveKind::Int16 => Value::Int16(float as i16),
            PrimitiveKind::Int32 => Value::Int32(float as i32),
            PrimitiveKind::Int64 => Value::Int64(float as i64),
            PrimitiveKind::Uint8 => Value::Uint8(float as u8),
            PrimitiveKind::Uint16 => Value::Uint16(float as u16),
            PrimitiveKind::Uint32 => Value::Uint32(float as u32),
            PrimitiveKind::Uint64 => Value::Uint64(float as u64),
            PrimitiveKind::Float => Value::Float(float as f32),
            PrimitiveKind::Double => Value::Double(float),
            PrimitiveKind::Bool => return None,
        })
    }

    /// Dictionary key of this value.
    pub fn key(&self) -> ValueKey {
        match self {
            Value::Unit => ValueKey::Unit,
            Value::Null => ValueKey::Null,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Float(f) => ValueKey::Float(OrderedFloat(*f as f64)),
            Value::Double(f) => ValueKey::Float(OrderedFloat(*f)),
            Value::Str(s) => ValueKey::Str(s.clone()),
            Value::Object(obj) => ValueKey::Ref(Rc::as_ptr(obj) as *const () as usize),
            Value::List(list) => ValueKey::Ref(Rc::as_ptr(list) as *const () as usize),
            Value::Dict(dict) => ValueKey::Ref(Rc::as_ptr(dict) as *const () as usize),
            Value::Function(func) => ValueKey::Ref(Rc::as_ptr(func) as *const () as usize),
            other => ValueKey::Int(other.as_integer().unwrap_or_default()),
        }
    }

    /// Reference identity for heap values, value equality is in [`crate::fold`].
    pub fn same_reference(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::str(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => f.write_str("()"),
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int8(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Uint8(v) => write!(f, "{v}"),
            Value::Uint16(v) => write!(f, "{v}"),
            Value::Uint32(v) => write!(f, "{v}"),
            Value::Uint64(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
            Value::Object(obj) => {
                let obj = obj.borrow();
                write!(f, "{} {{ ", obj.type_name)?;
                for (i, field) in obj.fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{field}")?;
                }
                f.write_str(" }")
            }
            Value::List(list) => {
                f.write_str("[")?;
                for (i, item) in list.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Dict(dict) => write!(f, "{{{} entries}}", dict.borrow().len()),
            Value::Function(func) => write!(f, "<function #{}>", func.function),
        }
    }
}

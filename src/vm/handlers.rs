//! Instruction handlers for objects, collections, conversions and intrinsics.

use std::cell::RefCell;
use std::rc::Rc;

use lantern_compiler::Intrinsic;
use lantern_core::{PrimitiveKind, RuntimeError, Value, fold};
use rustc_hash::FxHashMap;

use super::{Machine, Result};

impl Machine<'_> {
    pub(super) fn execute_new(&mut self, type_index: u16, argc: u8) -> Result<()> {
        let ty = self
            .unit
            .types
            .get(type_index as usize)
            .ok_or_else(|| RuntimeError::TypeMismatch {
                message: format!("unknown type index {type_index}"),
            })?;
        let mut fields = self.stack.pop_n(argc as usize)?;
        if fields.len() > ty.field_defaults.len() {
            return Err(RuntimeError::TypeMismatch {
                message: format!("'{}' has {} fields, got {}", ty.name, ty.field_defaults.len(), fields.len()),
            });
        }
        fields.extend_from_slice(&ty.field_defaults[fields.len()..]);
        self.stack
            .push(Value::new_object(u32::from(type_index), Rc::from(ty.name.as_str()), fields));
        Ok(())
    }

    pub(super) fn execute_get_field(&mut self, index: u16) -> Result<()> {
        let target = self.stack.pop()?;
        let value = match &target {
            Value::Object(obj) => obj.borrow().fields.get(index as usize).cloned(),
            Value::Null => return Err(null_value("an object")),
            _ => None,
        };
        let value = value.ok_or_else(|| mismatch(format!("{} has no field {index}", target.type_name())))?;
        self.stack.push(value);
        Ok(())
    }

    pub(super) fn execute_set_field(&mut self, index: u16) -> Result<()> {
        let value = self.stack.pop()?;
        let target = self.stack.pop()?;
        match &target {
            Value::Object(obj) => match obj.borrow_mut().fields.get_mut(index as usize) {
                Some(field) => {
                    *field = value;
                    Ok(())
                }
                None => Err(mismatch(format!("{} has no field {index}", target.type_name()))),
            },
            Value::Null => Err(null_value("an object")),
            other => Err(mismatch(format!("cannot set a field of {}", other.type_name()))),
        }
    }

    pub(super) fn execute_new_list(&mut self, count: u16) -> Result<()> {
        let items = self.stack.pop_n(count as usize)?;
        self.stack.push(Value::new_list(items));
        Ok(())
    }

    pub(super) fn execute_new_dict(&mut self, count: u16) -> Result<()> {
        let flat = self.stack.pop_n(count as usize * 2)?;
        let mut entries = FxHashMap::default();
        let mut iter = flat.into_iter();
        while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
            if entries.insert(key.key(), value).is_some() {
                return Err(RuntimeError::DuplicateKey { key: key.to_string() });
            }
        }
        self.stack.push(Value::Dict(Rc::new(RefCell::new(entries))));
        Ok(())
    }

    pub(super) fn execute_get_index(&mut self) -> Result<()> {
        let index = self.stack.pop()?;
        let target = self.stack.pop()?;
        let item = match &target {
            Value::List(list) => {
                let list = list.borrow();
                let position = list_position(&index, list.len())?;
                list[position].clone()
            }
            Value::Dict(dict) => dict
                .borrow()
                .get(&index.key())
                .cloned()
                .ok_or_else(|| RuntimeError::KeyNotFound { key: index.to_string() })?,
            Value::Null => return Err(null_value("a collection")),
            other => return Err(mismatch(format!("{} cannot be indexed", other.type_name()))),
        };
        self.stack.push(item);
        Ok(())
    }

    pub(super) fn execute_set_index(&mut self) -> Result<()> {
        let value = self.stack.pop()?;
        let index = self.stack.pop()?;
        let target = self.stack.pop()?;
        match &target {
            Value::List(list) => {
                let mut list = list.borrow_mut();
                let position = list_position(&index, list.len())?;
                list[position] = value;
            }
            Value::Dict(dict) => {
                dict.borrow_mut().insert(index.key(), value);
            }
            Value::Null => return Err(null_value("a collection")),
            other => return Err(mismatch(format!("{} cannot be indexed", other.type_name()))),
        }
        Ok(())
    }

    pub(super) fn execute_length(&mut self) -> Result<()> {
        let target = self.stack.pop()?;
        let len = match &target {
            Value::List(list) => list.borrow().len(),
            Value::Dict(dict) => dict.borrow().len(),
            Value::Str(text) => text.chars().count(),
            Value::Null => return Err(null_value("a collection")),
            other => return Err(mismatch(format!("{} has no length", other.type_name()))),
        };
        let len = i32::try_from(len).map_err(|_| mismatch("length exceeds the int range"))?;
        self.stack.push(Value::Int32(len));
        Ok(())
    }

    pub(super) fn execute_convert(&mut self, tag: u8) -> Result<()> {
        let kind = PrimitiveKind::from_tag(tag).ok_or_else(|| mismatch(format!("unknown primitive tag {tag}")))?;
        let value = self.stack.pop()?;
        // Optional values convert their content.
        let converted = if value.is_null() {
            Value::Null
        } else {
            value
                .convert(kind)
                .ok_or_else(|| mismatch(format!("cannot convert {} to {}", value.type_name(), kind.name())))?
        };
        self.stack.push(converted);
        Ok(())
    }

    /// `CHECK_CAST`. Null passes a reference test and fails a primitive one.
    pub(super) fn execute_check_cast(&mut self, test: u16) -> Result<()> {
        let test = self.type_test(test)?;
        let value = self.stack.pop()?;
        match (&value, test) {
            (Value::Null, lantern_compiler::TypeTest::Primitive(kind)) => Err(null_value(kind.name())),
            (Value::Null, _) => {
                self.stack.push(value);
                Ok(())
            }
            (_, test) if test.accepts(&value) => {
                self.stack.push(value);
                Ok(())
            }
            (_, test) => Err(RuntimeError::InvalidCast {
                expected: format!("{test:?}"),
                actual: value.type_name(),
            }),
        }
    }

    pub(super) fn execute_is_instance(&mut self, test: u16) -> Result<()> {
        let test = self.type_test(test)?;
        let value = self.stack.pop()?;
        self.stack.push(Value::Bool(test.accepts(&value)));
        Ok(())
    }
}

/// Run a built-in helper function.
pub(super) fn call_intrinsic(intrinsic: Intrinsic, args: &[Value]) -> Result<Value> {
    let [left, right] = args else {
        return Err(mismatch(format!("{intrinsic:?} takes two arguments, got {}", args.len())));
    };
    match intrinsic {
        Intrinsic::StringEquals => Ok(Value::Bool(fold::equals(left, right)?)),
        Intrinsic::StringCompare => match (left, right) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Int32(fold::compare_text(a, b))),
            _ => Err(null_value("a string")),
        },
        Intrinsic::RecordEquals => Ok(Value::Bool(record_equals(left, right)?)),
    }
}

/// Field-by-field equality of two instances of the same record.
fn record_equals(left: &Value, right: &Value) -> Result<bool> {
    match (left, right) {
        (Value::Null, other) | (other, Value::Null) => Ok(other.is_null()),
        (Value::Object(a), Value::Object(b)) => {
            if Rc::ptr_eq(a, b) {
                return Ok(true);
            }
            let (a, b) = (a.borrow(), b.borrow());
            if a.type_index != b.type_index {
                return Ok(false);
            }
            for (l, r) in a.fields.iter().zip(&b.fields) {
                if !fold::equals(l, r)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (l, r) => Err(mismatch(format!("cannot compare {} and {} as records", l.type_name(), r.type_name()))),
    }
}

fn list_position(index: &Value, len: usize) -> Result<usize> {
    let index = index
        .as_integer()
        .ok_or_else(|| mismatch(format!("list index must be an integer, got {}", index.type_name())))?;
    usize::try_from(index)
        .ok()
        .filter(|position| *position < len)
        .ok_or(RuntimeError::IndexOutOfRange { index, len })
}

pub(super) fn null_value(target: &str) -> RuntimeError {
    RuntimeError::NullValue { target: target.into() }
}

pub(super) fn mismatch(message: impl Into<String>) -> RuntimeError {
    RuntimeError::TypeMismatch {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_intrinsics() {
        let (a, b) = (Value::str("a"), Value::str("b"));
        assert_eq!(
            call_intrinsic(Intrinsic::StringCompare, &[a.clone(), b.clone()]).unwrap(),
            Value::Int32(-1)
        );
        assert_eq!(call_intrinsic(Intrinsic::StringEquals, &[a.clone(), a.clone()]).unwrap(), Value::Bool(true));
        assert_eq!(call_intrinsic(Intrinsic::StringEquals, &[a.clone(), Value::Null]).unwrap(), Value::Bool(false));
        assert!(matches!(
            call_intrinsic(Intrinsic::StringCompare, &[Value::Null, b]),
            Err(RuntimeError::NullValue { .. })
        ));
    }

    #[test]
    fn records_compare_field_by_field() {
        let point = |x: i32, y: i32| Value::new_object(4, Rc::from("Point"), vec![Value::Int32(x), Value::Int32(y)]);
        assert_eq!(record_equals(&point(1, 2), &point(1, 2)), Ok(true));
        assert_eq!(record_equals(&point(1, 2), &point(2, 1)), Ok(false));
        assert_eq!(record_equals(&point(1, 2), &Value::Null), Ok(false));
        assert_eq!(record_equals(&Value::Null, &Value::Null), Ok(true));
    }

    #[test]
    fn list_positions_are_bounds_checked() {
        assert_eq!(list_position(&Value::Int32(1), 2), Ok(1));
        assert_eq!(
            list_position(&Value::Int32(2), 2),
            Err(RuntimeError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            list_position(&Value::Int64(-1), 2),
            Err(RuntimeError::IndexOutOfRange { index: -1, len: 2 })
        );
    }
}

//! Implicit conversions and explicit casts between types.
//!
//! Optional values are represented at run time as the plain value or null,
//! so wrapping a value into its optional type, passing `null` and up-casting
//! references cost no instruction. Numeric conversions emit `CONVERT`.

use lantern_core::{PrimitiveKind, TypeDesc};

use crate::entities::Registry;
use crate::unit::TypeTest;

/// How a value of one type becomes a value of another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    Identity,
    /// Numeric conversion to the given kind.
    Numeric(PrimitiveKind),
    /// Value into its optional type, converting the value first if a kind is given.
    Wrap(Option<PrimitiveKind>),
    /// `null` into an optional or reference type.
    Null,
    /// Reference to `object`, value to `object`, label to its algebraic base.
    Upcast,
    /// Optional to its base type, failing on null at run time.
    Unwrap(Option<PrimitiveKind>),
    /// Run-time checked down-cast.
    Checked(TypeTest),
}

impl Conversion {
    /// Ranking weight used by overload resolution.
    pub fn cost(&self) -> u32 {
        match self {
            Conversion::Identity => 0,
            _ => 1,
        }
    }
}

/// Conversion applied implicitly on assignment, argument passing and return.
pub fn find_conversion(from: &TypeDesc, to: &TypeDesc, registry: &Registry) -> Option<Conversion> {
    if from == to {
        return Some(Conversion::Identity);
    }
    match (from, to) {
        (TypeDesc::Unit, _) | (_, TypeDesc::Unit) => None,
        (_, TypeDesc::Object) => Some(Conversion::Upcast),
        (TypeDesc::Null, to) if to.is_nullable_reference() => Some(Conversion::Null),
        (TypeDesc::Primitive(a), TypeDesc::Primitive(b)) if a.widens_to(*b) => Some(Conversion::Numeric(*b)),
        (TypeDesc::Primitive(a), TypeDesc::Nullable(inner)) => match inner.as_primitive() {
            Some(b) if *a == b => Some(Conversion::Wrap(None)),
            Some(b) if a.widens_to(b) => Some(Conversion::Wrap(Some(b))),
            _ => None,
        },
        (TypeDesc::User(_), TypeDesc::User(_)) => {
            let label = registry.entity_of(from)?;
            let base = registry.entity_of(to)?;
            registry.is_label_of(label, base).then_some(Conversion::Upcast)
        }
        _ => None,
    }
}

/// Conversion performed by an explicit cast.
pub fn find_cast(from: &TypeDesc, to: &TypeDesc, registry: &Registry) -> Option<Conversion> {
    if let Some(conversion) = find_conversion(from, to, registry) {
        return Some(conversion);
    }
    match (from, to) {
        (TypeDesc::Primitive(a), TypeDesc::Primitive(b)) if a.is_numeric() && b.is_numeric() => {
            Some(Conversion::Numeric(*b))
        }
        (TypeDesc::Nullable(inner), to) => match (inner.as_primitive(), to.as_primitive()) {
            (Some(a), Some(b)) if a == b => Some(Conversion::Unwrap(None)),
            (Some(a), Some(b)) if a.is_numeric() && b.is_numeric() => Some(Conversion::Unwrap(Some(b))),
            _ => None,
        },
        (TypeDesc::Object, to) if !to.is_unit() && to.nullable_base().is_none() => {
            type_test(to, registry).map(Conversion::Checked)
        }
        (TypeDesc::User(_), TypeDesc::User(_)) => {
            let base = registry.entity_of(from)?;
            let label = registry.entity_of(to)?;
            registry
                .is_label_of(label, base)
                .then(|| Conversion::Checked(TypeTest::Types(vec![label.0])))
        }
        _ => None,
    }
}

/// Run-time instance test for values of `ty`.
pub fn type_test(ty: &TypeDesc, registry: &Registry) -> Option<TypeTest> {
    let test = match ty {
        TypeDesc::Unit | TypeDesc::Null => return None,
        TypeDesc::Primitive(kind) => TypeTest::Primitive(*kind),
        TypeDesc::Nullable(inner) => TypeTest::Primitive(inner.as_primitive()?),
        TypeDesc::String => TypeTest::String,
        TypeDesc::Object => TypeTest::Any,
        TypeDesc::List(_) => TypeTest::List,
        TypeDesc::Dict(..) => TypeTest::Dict,
        TypeDesc::Function(_) => TypeTest::Function,
        TypeDesc::User(_) => TypeTest::Types(registry.instance_types(registry.entity_of(ty)?)),
    };
    Some(test)
}

/// The first of `types` every other one converts to.
///
/// `null` entries make a value-type candidate optional. Returns `None` when
/// there is no such type, including when every entry is `null`.
pub fn common_type(types: &[TypeDesc], registry: &Registry) -> Option<TypeDesc> {
    let has_null = types.iter().any(|ty| *ty == TypeDesc::Null);
    types
        .iter()
        .filter(|ty| **ty != TypeDesc::Null)
        .map(|ty| {
            if has_null && ty.is_value_type() {
                TypeDesc::nullable(ty.clone())
            } else {
                ty.clone()
            }
        })
        .find(|candidate| types.iter().all(|ty| find_conversion(ty, candidate, registry).is_some()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{TypeEntity, TypeKind};

    fn shapes() -> Registry {
        let mut registry = Registry::new();
        let base = registry.add_type(TypeEntity::new("Shape", TypeKind::Algebraic)).unwrap();
        let mut circle = TypeEntity::new("Circle", TypeKind::Label);
        circle.base = Some(base);
        let circle = registry.add_type(circle).unwrap();
        registry.type_mut(base).labels.push(circle);
        registry
    }

    #[test]
    fn numeric_widening_keeps_signedness() {
        let registry = Registry::new();
        assert_eq!(
            find_conversion(&TypeDesc::INT, &TypeDesc::LONG, &registry),
            Some(Conversion::Numeric(PrimitiveKind::Int64))
        );
        assert_eq!(
            find_conversion(&TypeDesc::INT, &TypeDesc::DOUBLE, &registry),
            Some(Conversion::Numeric(PrimitiveKind::Double))
        );
        assert_eq!(find_conversion(&TypeDesc::UINT, &TypeDesc::LONG, &registry), None);
        assert_eq!(find_conversion(&TypeDesc::LONG, &TypeDesc::INT, &registry), None);
    }

    #[test]
    fn values_and_null_convert_to_optionals() {
        let registry = Registry::new();
        let int_opt = TypeDesc::nullable(TypeDesc::INT);
        assert_eq!(find_conversion(&TypeDesc::INT, &int_opt, &registry), Some(Conversion::Wrap(None)));
        assert_eq!(find_conversion(&TypeDesc::Null, &int_opt, &registry), Some(Conversion::Null));
        assert_eq!(find_conversion(&TypeDesc::Null, &TypeDesc::String, &registry), Some(Conversion::Null));
        assert_eq!(find_conversion(&TypeDesc::Null, &TypeDesc::INT, &registry), None);
        assert_eq!(find_conversion(&int_opt, &TypeDesc::INT, &registry), None);
    }

    #[test]
    fn labels_upcast_to_their_base() {
        let registry = shapes();
        let circle = TypeDesc::user("Circle");
        let shape = TypeDesc::user("Shape");
        assert_eq!(find_conversion(&circle, &shape, &registry), Some(Conversion::Upcast));
        assert_eq!(find_conversion(&shape, &circle, &registry), None);
        assert!(matches!(find_cast(&shape, &circle, &registry), Some(Conversion::Checked(_))));
    }

    #[test]
    fn explicit_casts() {
        let registry = Registry::new();
        assert_eq!(
            find_cast(&TypeDesc::DOUBLE, &TypeDesc::INT, &registry),
            Some(Conversion::Numeric(PrimitiveKind::Int32))
        );
        assert_eq!(
            find_cast(&TypeDesc::nullable(TypeDesc::INT), &TypeDesc::INT, &registry),
            Some(Conversion::Unwrap(None))
        );
        assert_eq!(
            find_cast(&TypeDesc::Object, &TypeDesc::INT, &registry),
            Some(Conversion::Checked(TypeTest::Primitive(PrimitiveKind::Int32)))
        );
        assert_eq!(find_cast(&TypeDesc::String, &TypeDesc::INT, &registry), None);
    }

    #[test]
    fn common_type_of_literal_items() {
        let registry = Registry::new();
        assert_eq!(
            common_type(&[TypeDesc::INT, TypeDesc::LONG], &registry),
            Some(TypeDesc::LONG)
        );
        assert_eq!(
            common_type(&[TypeDesc::INT, TypeDesc::Null], &registry),
            Some(TypeDesc::nullable(TypeDesc::INT))
        );
        assert_eq!(common_type(&[TypeDesc::Null, TypeDesc::Null], &registry), None);
        assert_eq!(common_type(&[TypeDesc::INT, TypeDesc::String], &registry), None);
    }
}

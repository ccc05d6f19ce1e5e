//! Type resolution from textual signatures.
//!
//! The [`TypeResolver`] maps a [`TypeSignature`] to a [`TypeDesc`] using the
//! built-in type table, the entity registry for user types, and the set of
//! namespaces opened with `using`. It also enforces the restricted-type
//! mode for resolved signatures and for node types.

use lantern_core::{CompilationError, PrimitiveKind, Span, TypeDesc};
use rustc_hash::FxHashSet;

use crate::ast::TypeSignature;
use crate::entities::Registry;
use crate::options::SafeMode;

/// Namespace of the built-in generic containers.
pub const COLLECTIONS: &str = "Collections";

#[derive(Debug, Clone, Default)]
pub struct TypeResolver {
    safe_mode: SafeMode,
    namespaces: FxHashSet<String>,
}

impl TypeResolver {
    pub fn new(safe_mode: SafeMode) -> Self {
        Self {
            safe_mode,
            namespaces: FxHashSet::default(),
        }
    }

    /// Make the types of `namespace` resolvable without qualification.
    pub fn open_namespace(&mut self, namespace: &str) {
        self.namespaces.insert(namespace.to_string());
    }

    pub fn is_open(&self, namespace: &str) -> bool {
        self.namespaces.contains(namespace)
    }

    /// Resolve a signature to a type descriptor.
    pub fn resolve(&self, sig: &TypeSignature, registry: &Registry, span: Span) -> Result<TypeDesc, CompilationError> {
        let base = self.resolve_base(sig, registry, span)?;
        let ty = match base {
            TypeDesc::Unit if sig.nullable => return Err(not_found(sig, span)),
            // Reference types are nullable already.
            base if sig.nullable && base.is_value_type() => TypeDesc::nullable(base),
            base => base,
        };
        self.check_allowed(&ty, span)?;
        Ok(ty)
    }

    fn resolve_base(&self, sig: &TypeSignature, registry: &Registry, span: Span) -> Result<TypeDesc, CompilationError> {
        let name = sig.simple_name();
        match sig.namespace() {
            Some(COLLECTIONS) => return self.resolve_collection(sig, registry, span),
            Some(_) => return Err(not_found(sig, span)),
            None if matches!(name, "List" | "Dict") && self.is_open(COLLECTIONS) => {
                return self.resolve_collection(sig, registry, span);
            }
            None => {}
        }

        if name == "Func" {
            let mut args = self.resolve_args(sig, registry, span)?;
            let ret = args.pop().ok_or_else(|| not_found(sig, span))?;
            return Ok(TypeDesc::function(args, ret));
        }
        if !sig.args.is_empty() {
            return Err(not_found(sig, span));
        }

        let ty = match name {
            "unit" | "void" => TypeDesc::Unit,
            "string" => TypeDesc::String,
            "object" => TypeDesc::Object,
            other => match PrimitiveKind::from_name(other) {
                Some(kind) => TypeDesc::Primitive(kind),
                None => {
                    let id = registry.nameable_type(other).ok_or_else(|| not_found(sig, span))?;
                    registry.type_desc(id)
                }
            },
        };
        Ok(ty)
    }

    fn resolve_collection(&self, sig: &TypeSignature, registry: &Registry, span: Span) -> Result<TypeDesc, CompilationError> {
        let mut args = self.resolve_args(sig, registry, span)?;
        match (sig.simple_name(), args.len()) {
            ("List", 1) => Ok(TypeDesc::list(args.remove(0))),
            ("Dict", 2) => {
                let value = args.remove(1);
                Ok(TypeDesc::dict(args.remove(0), value))
            }
            _ => Err(not_found(sig, span)),
        }
    }

    fn resolve_args(&self, sig: &TypeSignature, registry: &Registry, span: Span) -> Result<Vec<TypeDesc>, CompilationError> {
        sig.args.iter().map(|arg| self.resolve(arg, registry, span)).collect()
    }

    /// Fail with `DisallowedType` if the restricted-type mode forbids `ty`
    /// or any type it is built from.
    pub fn check_allowed(&self, ty: &TypeDesc, span: Span) -> Result<(), CompilationError> {
        if self.safe_mode == SafeMode::Disabled {
            return Ok(());
        }
        let disallowed = |name: &str| CompilationError::DisallowedType {
            name: name.to_string(),
            span,
        };
        match ty {
            TypeDesc::Unit | TypeDesc::Null => Ok(()),
            TypeDesc::Nullable(inner) => self.check_allowed(inner, span),
            TypeDesc::List(item) => {
                if !self.safe_mode.allows("List") {
                    return Err(disallowed("List"));
                }
                self.check_allowed(item, span)
            }
            TypeDesc::Dict(key, value) => {
                if !self.safe_mode.allows("Dict") {
                    return Err(disallowed("Dict"));
                }
                self.check_allowed(key, span)?;
                self.check_allowed(value, span)
            }
            TypeDesc::Function(func) => {
                if !self.safe_mode.allows("Func") {
                    return Err(disallowed("Func"));
                }
                func.params
                    .iter()
                    .chain(std::iter::once(&func.ret))
                    .try_for_each(|part| self.check_allowed(part, span))
            }
            other => {
                let name = other.to_string();
                if self.safe_mode.allows(&name) {
                    Ok(())
                } else {
                    Err(disallowed(&name))
                }
            }
        }
    }
}

fn not_found(sig: &TypeSignature, span: Span) -> CompilationError {
    CompilationError::TypeNotFound {
        name: sig.to_string(),
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{TypeEntity, TypeKind};

    fn resolve(resolver: &TypeResolver, registry: &Registry, text: &str) -> Result<TypeDesc, CompilationError> {
        resolver.resolve(&TypeSignature::parse(text), registry, Span::point(1, 1))
    }

    #[test]
    fn resolves_builtins_and_aliases() {
        let resolver = TypeResolver::default();
        let registry = Registry::new();
        assert_eq!(resolve(&resolver, &registry, "int").unwrap(), TypeDesc::INT);
        assert_eq!(resolve(&resolver, &registry, "int64").unwrap(), TypeDesc::LONG);
        assert_eq!(resolve(&resolver, &registry, "float64").unwrap(), TypeDesc::DOUBLE);
        assert_eq!(resolve(&resolver, &registry, "void").unwrap(), TypeDesc::Unit);
        assert_eq!(resolve(&resolver, &registry, "string").unwrap(), TypeDesc::String);
        assert_eq!(resolve(&resolver, &registry, "object").unwrap(), TypeDesc::Object);
    }

    #[test]
    fn nullable_applies_to_value_types_only() {
        let resolver = TypeResolver::default();
        let registry = Registry::new();
        assert_eq!(resolve(&resolver, &registry, "int?").unwrap(), TypeDesc::nullable(TypeDesc::INT));
        assert_eq!(resolve(&resolver, &registry, "string?").unwrap(), TypeDesc::String);
        assert!(resolve(&resolver, &registry, "unit?").is_err());
    }

    #[test]
    fn collections_require_namespace() {
        let mut resolver = TypeResolver::default();
        let registry = Registry::new();

        assert!(matches!(
            resolve(&resolver, &registry, "List<int>"),
            Err(CompilationError::TypeNotFound { .. })
        ));
        assert_eq!(
            resolve(&resolver, &registry, "Collections.List<int>").unwrap(),
            TypeDesc::list(TypeDesc::INT)
        );

        resolver.open_namespace(COLLECTIONS);
        assert_eq!(
            resolve(&resolver, &registry, "Dict<string, List<long>>").unwrap(),
            TypeDesc::dict(TypeDesc::String, TypeDesc::list(TypeDesc::LONG))
        );
        assert!(resolve(&resolver, &registry, "Dict<string>").is_err());
    }

    #[test]
    fn resolves_function_types() {
        let resolver = TypeResolver::default();
        let registry = Registry::new();
        assert_eq!(
            resolve(&resolver, &registry, "Func<int, string, bool>").unwrap(),
            TypeDesc::function(vec![TypeDesc::INT, TypeDesc::String], TypeDesc::BOOL)
        );
        assert!(resolve(&resolver, &registry, "Func").is_err());
    }

    #[test]
    fn resolves_user_types_but_not_synthesized_ones() {
        let resolver = TypeResolver::default();
        let mut registry = Registry::new();
        registry.add_type(TypeEntity::new("Point", TypeKind::Record)).unwrap();
        registry.add_type(TypeEntity::new("<Closure_1>", TypeKind::Closure)).unwrap();

        assert_eq!(resolve(&resolver, &registry, "Point").unwrap(), TypeDesc::user("Point"));
        assert!(resolve(&resolver, &registry, "<Closure_1>").is_err());
        assert!(matches!(
            resolve(&resolver, &registry, "Unknown"),
            Err(CompilationError::TypeNotFound { name, .. }) if name == "Unknown"
        ));
    }

    #[test]
    fn safe_mode_rejects_disallowed_types() {
        let mut resolver = TypeResolver::new(SafeMode::blacklist(["double"]));
        resolver.open_namespace(COLLECTIONS);
        let registry = Registry::new();

        assert!(resolve(&resolver, &registry, "int").is_ok());
        assert!(matches!(
            resolve(&resolver, &registry, "double"),
            Err(CompilationError::DisallowedType { name, .. }) if name == "double"
        ));
        assert!(matches!(
            resolve(&resolver, &registry, "List<double?>"),
            Err(CompilationError::DisallowedType { .. })
        ));

        let white = TypeResolver::new(SafeMode::whitelist(["int", "bool"]));
        assert!(white.check_allowed(&TypeDesc::nullable(TypeDesc::INT), Span::default()).is_ok());
        assert!(white.check_allowed(&TypeDesc::String, Span::default()).is_err());
    }
}

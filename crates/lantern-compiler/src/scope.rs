//! Lexical scope tree.
//!
//! Every function, lambda and block owns a [`Scope`]. Scopes form a tree
//! through their parent links; a lambda's root scope hangs below the scope
//! it is defined in, so name lookup naturally crosses into enclosing
//! functions. The tree is an arena owned by the compilation context.
//!
//! A [`Binding`] is the compile-time record of a declared name. Its storage
//! starts [`Storage::Unassigned`]; parameters are bound to their argument
//! index, locals get a frame slot during code generation, and captured
//! bindings move to a field of their scope's closure carrier exactly once
//! during closure conversion.

use lantern_core::{CompilationError, Span, TypeDesc, Value};
use rustc_hash::FxHashMap;

use crate::entities::{MethodId, TypeId};

/// Index of a scope in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub(crate) u32);

/// Index of a binding in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(pub(crate) u32);

/// Where the value of a binding lives at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Unassigned,
    /// Slot in the frame of the owning function.
    Local(u16),
    /// Argument of the owning function.
    Argument(u8),
    /// Field of the carrier instance of the declaring scope.
    Field { carrier: TypeId, index: u16 },
}

/// A declared name.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub ty: TypeDesc,
    pub mutable: bool,
    /// Folded initializer of an immutable binding.
    pub constant: Option<Value>,
    /// Referenced from a function other than the declaring one.
    pub captured: bool,
    pub storage: Storage,
    /// Argument index of a parameter, kept after the parameter is captured.
    pub argument: Option<u8>,
    pub scope: ScopeId,
    /// Compiler-private temporary, invisible to lookup.
    pub implicit: bool,
    pub span: Span,
}

/// A lexical region.
#[derive(Debug, Clone)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    /// Function the scope belongs to.
    pub method: MethodId,
    names: FxHashMap<String, BindingId>,
    implicit: Vec<BindingId>,
    captured: Vec<BindingId>,
    carrier: Option<Carrier>,
}

/// Closure carrier of a scope: its type and the hidden local holding the
/// instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Carrier {
    pub ty: TypeId,
    pub instance: BindingId,
}

impl Scope {
    pub fn captured(&self) -> &[BindingId] {
        &self.captured
    }

    pub fn implicit(&self) -> &[BindingId] {
        &self.implicit
    }

    pub fn carrier(&self) -> Option<Carrier> {
        self.carrier
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Arena of every scope and binding of a compilation.
#[derive(Debug, Default)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    bindings: Vec<Binding>,
    /// Counter for implicit temporary names.
    next_implicit: u32,
}

impl ScopeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope below `parent`.
    pub fn create(&mut self, parent: Option<ScopeId>, method: MethodId) -> ScopeId {
        self.scopes.push(Scope {
            parent,
            method,
            names: FxHashMap::default(),
            implicit: Vec::new(),
            captured: Vec::new(),
            carrier: None,
        });
        ScopeId(self.scopes.len() as u32 - 1)
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn binding(&self, id: BindingId) -> &Binding {
        &self.bindings[id.0 as usize]
    }

    pub fn binding_mut(&mut self, id: BindingId) -> &mut Binding {
        &mut self.bindings[id.0 as usize]
    }

    /// Declare `name` in `scope`.
    ///
    /// Names must be unique within one scope; shadowing a name of an
    /// enclosing scope is allowed.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        ty: TypeDesc,
        mutable: bool,
        span: Span,
    ) -> Result<BindingId, CompilationError> {
        if let Some(&existing) = self.scopes[scope.0 as usize].names.get(name) {
            return Err(CompilationError::Redeclaration {
                name: name.to_string(),
                original_span: self.binding(existing).span,
                new_span: span,
            });
        }
        let id = self.push_binding(scope, name.to_string(), ty, mutable, false, span);
        self.scopes[scope.0 as usize].names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Declare a compiler-private temporary in `scope`.
    ///
    /// The generated name is unique and cannot be found by [`ScopeTree::find`].
    pub fn declare_implicit(&mut self, scope: ScopeId, ty: TypeDesc, mutable: bool) -> BindingId {
        let name = format!("<tmp_{}>", self.next_implicit);
        self.next_implicit += 1;
        let id = self.push_binding(scope, name, ty, mutable, true, Span::default());
        self.scopes[scope.0 as usize].implicit.push(id);
        id
    }

    fn push_binding(
        &mut self,
        scope: ScopeId,
        name: String,
        ty: TypeDesc,
        mutable: bool,
        implicit: bool,
        span: Span,
    ) -> BindingId {
        self.bindings.push(Binding {
            name,
            ty,
            mutable,
            constant: None,
            captured: false,
            storage: Storage::Unassigned,
            argument: None,
            scope,
            implicit,
            span,
        });
        BindingId(self.bindings.len() as u32 - 1)
    }

    /// Attach a folded constant to an immutable binding.
    pub fn make_constant(&mut self, id: BindingId, value: Value) -> Result<(), CompilationError> {
        let binding = self.binding_mut(id);
        if binding.mutable {
            return Err(CompilationError::invalid_state(format!(
                "mutable binding '{}' cannot be constant",
                binding.name
            )));
        }
        binding.constant = Some(value);
        Ok(())
    }

    /// Innermost binding of `name` visible from `scope`.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<BindingId> {
        self.ancestors(scope)
            .find_map(|id| self.scope(id).names.get(name).copied())
    }

    /// Like [`ScopeTree::lookup`] but failing with `NameResolution`.
    pub fn find(&self, scope: ScopeId, name: &str, span: Span) -> Result<BindingId, CompilationError> {
        self.lookup(scope, name).ok_or_else(|| CompilationError::NameResolution {
            name: name.to_string(),
            span,
        })
    }

    /// `scope` and its ancestors, innermost first.
    pub fn ancestors(&self, scope: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(scope), |id| self.scope(*id).parent)
    }

    /// Mark a binding as captured by a nested function.
    pub fn capture(&mut self, id: BindingId) {
        let binding = &mut self.bindings[id.0 as usize];
        if binding.captured {
            return;
        }
        binding.captured = true;
        let scope = binding.scope;
        self.scopes[scope.0 as usize].captured.push(id);
    }

    /// Move the captured bindings of `scope` into the fields of `carrier`.
    ///
    /// Field 0 of a carrier links to the enclosing carrier, so captured
    /// bindings take fields 1 onwards in capture order.
    pub fn attach_carrier(&mut self, scope: ScopeId, carrier: TypeId) -> Result<Carrier, CompilationError> {
        if self.scope(scope).carrier.is_some() {
            return Err(CompilationError::invalid_state("scope already has a closure carrier"));
        }
        let captured = self.scope(scope).captured.clone();
        for (i, id) in captured.into_iter().enumerate() {
            let binding = self.binding_mut(id);
            if matches!(binding.storage, Storage::Field { .. }) {
                return Err(CompilationError::invalid_state(format!(
                    "binding '{}' was already moved to a carrier",
                    binding.name
                )));
            }
            binding.storage = Storage::Field {
                carrier,
                index: i as u16 + 1,
            };
        }
        let instance = self.declare_implicit(scope, TypeDesc::Object, false);
        let attached = Carrier { ty: carrier, instance };
        self.scopes[scope.0 as usize].carrier = Some(attached);
        Ok(attached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN: MethodId = MethodId(0);

    #[test]
    fn redeclaration_in_same_scope_fails() {
        let mut tree = ScopeTree::new();
        let scope = tree.create(None, MAIN);
        tree.declare(scope, "x", TypeDesc::INT, false, Span::point(1, 1)).unwrap();

        let err = tree.declare(scope, "x", TypeDesc::INT, true, Span::point(2, 1)).unwrap_err();
        match err {
            CompilationError::Redeclaration {
                name,
                original_span,
                new_span,
            } => {
                assert_eq!(name, "x");
                assert_eq!(original_span, Span::point(1, 1));
                assert_eq!(new_span, Span::point(2, 1));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn nested_scope_shadows_outer_binding() {
        let mut tree = ScopeTree::new();
        let outer = tree.create(None, MAIN);
        let inner = tree.create(Some(outer), MAIN);
        let outer_x = tree.declare(outer, "x", TypeDesc::INT, false, Span::default()).unwrap();
        let inner_x = tree.declare(inner, "x", TypeDesc::String, false, Span::default()).unwrap();

        assert_eq!(tree.find(inner, "x", Span::default()).unwrap(), inner_x);
        assert_eq!(tree.find(outer, "x", Span::default()).unwrap(), outer_x);
        assert_eq!(tree.binding(inner_x).ty, TypeDesc::String);
    }

    #[test]
    fn declarations_are_invisible_to_siblings_and_ancestors() {
        let mut tree = ScopeTree::new();
        let root = tree.create(None, MAIN);
        let left = tree.create(Some(root), MAIN);
        let right = tree.create(Some(root), MAIN);
        tree.declare(left, "y", TypeDesc::INT, true, Span::default()).unwrap();

        assert!(tree.lookup(right, "y").is_none());
        assert!(matches!(
            tree.find(root, "y", Span::point(4, 2)),
            Err(CompilationError::NameResolution { .. })
        ));
    }

    #[test]
    fn implicit_temporaries_are_unique_and_hidden() {
        let mut tree = ScopeTree::new();
        let scope = tree.create(None, MAIN);
        let a = tree.declare_implicit(scope, TypeDesc::INT, true);
        let b = tree.declare_implicit(scope, TypeDesc::INT, true);

        assert_ne!(tree.binding(a).name, tree.binding(b).name);
        assert!(tree.binding(a).implicit);
        assert!(tree.lookup(scope, &tree.binding(a).name.clone()).is_none());
        assert_eq!(tree.scope(scope).implicit(), &[a, b]);
    }

    #[test]
    fn constant_bindings_must_be_immutable() {
        let mut tree = ScopeTree::new();
        let scope = tree.create(None, MAIN);
        let fixed = tree.declare(scope, "a", TypeDesc::INT, false, Span::default()).unwrap();
        let mutable = tree.declare(scope, "b", TypeDesc::INT, true, Span::default()).unwrap();

        assert!(tree.make_constant(fixed, Value::Int32(1)).is_ok());
        assert!(tree.make_constant(mutable, Value::Int32(1)).is_err());
    }

    #[test]
    fn captured_bindings_move_to_carrier_fields_once() {
        let mut tree = ScopeTree::new();
        let scope = tree.create(None, MAIN);
        let x = tree.declare(scope, "x", TypeDesc::INT, true, Span::default()).unwrap();
        let y = tree.declare(scope, "y", TypeDesc::INT, true, Span::default()).unwrap();
        tree.capture(y);
        tree.capture(x);
        tree.capture(y);

        let carrier = tree.attach_carrier(scope, TypeId(3)).unwrap();
        assert_eq!(carrier.ty, TypeId(3));
        assert_eq!(tree.binding(y).storage, Storage::Field { carrier: TypeId(3), index: 1 });
        assert_eq!(tree.binding(x).storage, Storage::Field { carrier: TypeId(3), index: 2 });
        assert!(tree.attach_carrier(scope, TypeId(4)).is_err());
    }
}

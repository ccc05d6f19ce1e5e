//! Entity registry.
//!
//! Entities are the user-declared types and functions being built, plus
//! the entities the compiler synthesizes (the script root type and entry
//! point, closure carriers, lambdas and intrinsic helpers). The registry is
//! owned by one compilation context.
//!
//! Entity indices double as indices into the compiled unit: a [`TypeId`] is
//! the unit type index and a [`MethodId`] the unit function index.
//!
//! Lookups go through [`TypeHash`]: types are keyed by the hash of their
//! name and prepared methods by the hash of their owner, name and
//! parameter types.

use lantern_core::{CompilationError, Span, TypeDesc, TypeHash};
use rustc_hash::FxHashMap;

use crate::ast::{Node, TypeSignature};
use crate::scope::ScopeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(pub(crate) u32);

impl TypeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl MethodId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Owner of the top-level functions and the entry point.
    Root,
    Record,
    /// Base type of an algebraic type definition.
    Algebraic,
    /// One case of an algebraic type.
    Label,
    /// Synthesized holder of captured variables.
    Closure,
}

#[derive(Debug, Clone)]
pub struct FieldEntity {
    pub name: String,
    pub signature: Option<TypeSignature>,
    /// Set when the entity is declared.
    pub ty: Option<TypeDesc>,
}

impl FieldEntity {
    pub fn declared(name: impl Into<String>, signature: TypeSignature) -> Self {
        Self {
            name: name.into(),
            signature: Some(signature),
            ty: None,
        }
    }

    pub fn typed(name: impl Into<String>, ty: TypeDesc) -> Self {
        Self {
            name: name.into(),
            signature: None,
            ty: Some(ty),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypeEntity {
    pub name: String,
    pub kind: TypeKind,
    pub fields: Vec<FieldEntity>,
    pub methods: Vec<MethodId>,
    /// Algebraic base of a label.
    pub base: Option<TypeId>,
    /// Labels of an algebraic base.
    pub labels: Vec<TypeId>,
    pub hash: TypeHash,
    /// Field types resolved.
    pub prepared: bool,
    pub span: Span,
}

impl TypeEntity {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        let name = name.into();
        Self {
            hash: TypeHash::from_name(&name),
            name,
            kind,
            fields: Vec::new(),
            methods: Vec::new(),
            base: None,
            labels: Vec::new(),
            prepared: false,
            span: Span::default(),
        }
    }

    pub fn with_fields(mut self, fields: Vec<FieldEntity>) -> Self {
        self.fields = fields;
        self
    }

    /// Whether scripts can name this type.
    pub fn is_nameable(&self) -> bool {
        !matches!(self.kind, TypeKind::Root | TypeKind::Closure)
    }

    pub fn field(&self, name: &str) -> Option<(u16, &FieldEntity)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, field)| field.name == name)
            .map(|(i, field)| (i as u16, field))
    }
}

// ============================================================================
// Methods
// ============================================================================

/// Functions implemented by the runtime rather than by bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    /// `(string, string) -> bool`
    StringEquals,
    /// `(string, string) -> int`, `-1`, `0` or `1`.
    StringCompare,
    /// Structural equality of two instances of the same type.
    RecordEquals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Function,
    /// The synthesized script body.
    Entry,
    /// Receives the enclosing closure carrier as argument 0.
    Lambda,
    Intrinsic(Intrinsic),
}

#[derive(Debug, Clone)]
pub struct ParamEntity {
    pub name: String,
    pub signature: Option<TypeSignature>,
    pub ty: Option<TypeDesc>,
    pub by_ref: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct MethodEntity {
    pub name: String,
    pub owner: TypeId,
    pub params: Vec<ParamEntity>,
    pub declared_return: Option<TypeSignature>,
    /// Declared, or inferred once the body was analysed.
    pub return_type: Option<TypeDesc>,
    pub body: Option<Node>,
    /// Root scope holding the parameters.
    pub scope: Option<ScopeId>,
    pub kind: MethodKind,
    pub hash: TypeHash,
    /// Closure conversion ran over the body.
    pub processed: bool,
    /// Signature resolved.
    pub prepared: bool,
    pub span: Span,
}

impl MethodEntity {
    pub fn new(name: impl Into<String>, owner: TypeId, kind: MethodKind) -> Self {
        Self {
            name: name.into(),
            owner,
            params: Vec::new(),
            declared_return: None,
            return_type: None,
            body: None,
            scope: None,
            kind,
            hash: TypeHash::EMPTY,
            processed: false,
            prepared: false,
            span: Span::default(),
        }
    }

    /// A prepared runtime-implemented function.
    pub fn intrinsic(name: &str, owner: TypeId, params: Vec<TypeDesc>, ret: TypeDesc, intrinsic: Intrinsic) -> Self {
        let mut method = Self::new(name, owner, MethodKind::Intrinsic(intrinsic));
        method.params = params
            .into_iter()
            .enumerate()
            .map(|(i, ty)| ParamEntity {
                name: format!("arg{i}"),
                signature: None,
                ty: Some(ty),
                by_ref: false,
                span: Span::default(),
            })
            .collect();
        method.return_type = Some(ret);
        method.processed = true;
        method.prepared = true;
        method
    }

    #[inline]
    pub fn has_receiver(&self) -> bool {
        self.kind == MethodKind::Lambda
    }

    /// Arguments the function takes at run time, receiver included.
    pub fn arity(&self) -> usize {
        self.params.len() + usize::from(self.has_receiver())
    }

    /// Resolved parameter types, `None` before the entity is prepared.
    pub fn param_types(&self) -> Option<Vec<TypeDesc>> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }

    /// Return type, failing when it has not been declared nor inferred yet.
    pub fn require_return_type(&self, span: Span) -> Result<&TypeDesc, CompilationError> {
        self.return_type
            .as_ref()
            .ok_or_else(|| CompilationError::UndeclaredReturnType {
                name: self.name.clone(),
                span,
            })
    }

    /// The `Func<..>` type of this function used as a value.
    pub fn function_type(&self, span: Span) -> Result<TypeDesc, CompilationError> {
        let ret = self.require_return_type(span)?.clone();
        let params = self
            .param_types()
            .ok_or_else(|| CompilationError::invalid_state(format!("'{}' used before declaration", self.name)))?;
        Ok(TypeDesc::function(params, ret))
    }
}

// ============================================================================
// Registry
// ============================================================================

/// All entities of one compilation.
#[derive(Debug, Default)]
pub struct Registry {
    types: Vec<TypeEntity>,
    methods: Vec<MethodEntity>,
    types_by_hash: FxHashMap<TypeHash, TypeId>,
    /// Prepared methods by signature hash.
    signatures: FxHashMap<TypeHash, MethodId>,
}

impl Registry {
    /// The script root type, always the first type of a context's registry.
    pub const ROOT: TypeId = TypeId(0);

    pub fn new() -> Self {
        Self::default()
    }

    /// A registry whose first type is the root type `name`.
    pub fn with_root(name: &str) -> Self {
        let mut registry = Self::new();
        let root = TypeEntity::new(name, TypeKind::Root);
        registry.types_by_hash.insert(root.hash, Self::ROOT);
        registry.types.push(root);
        registry
    }

    /// Register a type under a unique name.
    pub fn add_type(&mut self, entity: TypeEntity) -> Result<TypeId, CompilationError> {
        if self.types_by_hash.contains_key(&entity.hash) {
            return Err(CompilationError::fail(
                format!("type '{}' is already declared", entity.name),
                entity.span.is_known().then_some(entity.span),
            ));
        }
        let id = TypeId(self.types.len() as u32);
        self.types_by_hash.insert(entity.hash, id);
        self.types.push(entity);
        Ok(id)
    }

    /// Register a method and attach it to its owner.
    ///
    /// Methods created prepared (intrinsics) get their signature hash here;
    /// the others get it from [`Registry::register_signature`].
    pub fn add_method(&mut self, mut entity: MethodEntity) -> MethodId {
        let id = MethodId(self.methods.len() as u32);
        let owner = entity.owner;
        if entity.prepared
            && let Some(params) = entity.param_types()
        {
            entity.hash = self.signature_hash(owner, &entity.name, &params);
            self.signatures.entry(entity.hash).or_insert(id);
        }
        self.methods.push(entity);
        self.types[owner.index()].methods.push(id);
        id
    }

    /// Hash identifying a method of `owner` by name and parameter types.
    pub fn signature_hash(&self, owner: TypeId, name: &str, params: &[TypeDesc]) -> TypeHash {
        let params: Vec<TypeHash> = params.iter().map(TypeDesc::type_hash).collect();
        TypeHash::from_function(self.type_entity(owner).hash, name, &params)
    }

    /// Record the signature hash of a method whose parameter types were
    /// just resolved.
    ///
    /// Fails when another method of the same owner already has the same
    /// name and parameter types.
    pub fn register_signature(&mut self, id: MethodId, hash: TypeHash) -> Result<(), CompilationError> {
        match self.signatures.get(&hash) {
            Some(&existing) if existing != id => {
                let method = self.method(id);
                Err(CompilationError::fail(
                    format!(
                        "'{}' is already declared on '{}' with the same parameter types",
                        method.name,
                        self.type_entity(method.owner).name
                    ),
                    method.span.is_known().then_some(method.span),
                ))
            }
            _ => {
                self.signatures.insert(hash, id);
                self.method_mut(id).hash = hash;
                Ok(())
            }
        }
    }

    /// The method of `owner` called `name` taking exactly `params`.
    pub fn find_method(&self, owner: TypeId, name: &str, params: &[TypeDesc]) -> Option<MethodId> {
        self.signatures.get(&self.signature_hash(owner, name, params)).copied()
    }

    pub fn type_entity(&self, id: TypeId) -> &TypeEntity {
        &self.types[id.index()]
    }

    pub fn type_mut(&mut self, id: TypeId) -> &mut TypeEntity {
        &mut self.types[id.index()]
    }

    pub fn method(&self, id: MethodId) -> &MethodEntity {
        &self.methods[id.index()]
    }

    pub fn method_mut(&mut self, id: MethodId) -> &mut MethodEntity {
        &mut self.methods[id.index()]
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    pub fn type_ids(&self) -> impl Iterator<Item = TypeId> + use<> {
        (0..self.types.len() as u32).map(TypeId)
    }

    pub fn method_ids(&self) -> impl Iterator<Item = MethodId> + use<> {
        (0..self.methods.len() as u32).map(MethodId)
    }

    pub fn find_type(&self, name: &str) -> Option<TypeId> {
        self.find_type_by_hash(TypeHash::from_name(name))
    }

    #[inline]
    pub fn find_type_by_hash(&self, hash: TypeHash) -> Option<TypeId> {
        self.types_by_hash.get(&hash).copied()
    }

    /// A type scripts can refer to by name.
    pub fn nameable_type(&self, name: &str) -> Option<TypeId> {
        self.find_type(name).filter(|id| self.type_entity(*id).is_nameable())
    }

    /// Registry entity behind a user type descriptor.
    pub fn entity_of(&self, ty: &TypeDesc) -> Option<TypeId> {
        ty.as_user().and_then(|user| self.find_type_by_hash(user.hash))
    }

    pub fn type_desc(&self, id: TypeId) -> TypeDesc {
        TypeDesc::user(&self.type_entity(id).name)
    }

    /// Methods of `owner` called `name`, in declaration order.
    pub fn methods_named(&self, owner: TypeId, name: &str) -> Vec<MethodId> {
        self.type_entity(owner)
            .methods
            .iter()
            .copied()
            .filter(|id| self.method(*id).name == name)
            .collect()
    }

    /// Type indices whose instances pass a test for `id`: the type itself
    /// and, for an algebraic base, all of its labels.
    pub fn instance_types(&self, id: TypeId) -> Vec<u32> {
        std::iter::once(id.0)
            .chain(self.type_entity(id).labels.iter().map(|label| label.0))
            .collect()
    }

    /// Whether `label` is a case of the algebraic type `base`.
    pub fn is_label_of(&self, label: TypeId, base: TypeId) -> bool {
        self.type_entity(label).base == Some(base)
    }
}

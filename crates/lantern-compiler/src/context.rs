//! Compilation context and pipeline.
//!
//! A [`Context`] is one compilation session. It owns the entity registry,
//! the type resolver, the scope tree and the output under construction, and
//! drives the passes in their fixed order:
//!
//! ```text
//! Empty ─declare─▶ EntitiesDeclared ─closures─▶ ClosuresConverted
//!       ─declare─▶ EntitiesRedeclared ─bodies─▶ BodiesCompiled ─finalize─▶ Finalized
//! ```
//!
//! Entity declaration is idempotent: it prepares whatever entities are not
//! prepared yet, so it runs again after closure conversion to pick up the
//! synthesized carriers. Any error moves the context to `Failed`.
//!
//! Traversals do not read a mutable cursor from the context; they receive
//! an explicit [`Env`] naming the current type, function and scope.

use lantern_core::{CompilationError, Span, TypeDesc};

use crate::ast::{FunctionDefinition, Node, NodeKind, RecordDefinition, TypeDefinition};
use crate::bytecode::ConstantPool;
use crate::entities::{
    FieldEntity, Intrinsic, MethodEntity, MethodId, MethodKind, ParamEntity, Registry, TypeEntity, TypeId,
    TypeKind,
};
use crate::options::CompilerOptions;
use crate::scope::{ScopeId, ScopeTree};
use crate::type_resolver::TypeResolver;
use crate::unit::{CompiledFunction, CompiledUnit, TypeTest, UnitType};

/// Name of the type owning top-level functions.
pub const ROOT_TYPE_NAME: &str = "<ScriptRootType>";
/// Name of the entry point holding the script statements.
pub const ENTRY_NAME: &str = "<ScriptBody>";

/// Pipeline position of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Empty,
    EntitiesDeclared,
    ClosuresConverted,
    EntitiesRedeclared,
    BodiesCompiled,
    Finalized,
    Failed,
}

/// Where a traversal currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Env {
    pub owner: TypeId,
    pub method: MethodId,
    pub scope: ScopeId,
}

impl Env {
    pub fn new(owner: TypeId, method: MethodId, scope: ScopeId) -> Self {
        Self { owner, method, scope }
    }

    pub fn with_scope(self, scope: ScopeId) -> Self {
        Self { scope, ..self }
    }
}

/// Method ids of the runtime helpers operators compile to.
#[derive(Debug, Clone, Copy)]
pub struct Intrinsics {
    pub string_equals: MethodId,
    pub string_compare: MethodId,
}

/// One compilation session.
#[derive(Debug)]
pub struct Context {
    options: CompilerOptions,
    pub(crate) resolver: TypeResolver,
    pub(crate) registry: Registry,
    pub(crate) scopes: ScopeTree,
    /// Top-level nodes not registered yet.
    pending: Vec<Node>,
    entry: MethodId,
    intrinsics: Intrinsics,
    closure_id: u32,
    state: ContextState,
    pub(crate) constants: ConstantPool,
    pub(crate) type_tests: Vec<TypeTest>,
    pub(crate) functions: Vec<CompiledFunction>,
    unit: Option<CompiledUnit>,
}

impl Context {
    /// Create a context for the given top-level nodes.
    pub fn new(nodes: Vec<Node>, options: CompilerOptions) -> Self {
        let mut registry = Registry::with_root(ROOT_TYPE_NAME);
        let root = Registry::ROOT;
        let entry = registry.add_method(MethodEntity::new(ENTRY_NAME, root, MethodKind::Entry));
        let string_equals = registry.add_method(MethodEntity::intrinsic(
            "<String.Equals>",
            root,
            vec![TypeDesc::String, TypeDesc::String],
            TypeDesc::BOOL,
            Intrinsic::StringEquals,
        ));
        let string_compare = registry.add_method(MethodEntity::intrinsic(
            "<String.Compare>",
            root,
            vec![TypeDesc::String, TypeDesc::String],
            TypeDesc::INT,
            Intrinsic::StringCompare,
        ));

        Self {
            resolver: TypeResolver::new(options.safe_mode.clone()),
            options,
            registry,
            scopes: ScopeTree::new(),
            pending: nodes,
            entry,
            intrinsics: Intrinsics {
                string_equals,
                string_compare,
            },
            closure_id: 0,
            state: ContextState::Empty,
            constants: ConstantPool::new(),
            type_tests: Vec::new(),
            functions: Vec::new(),
            unit: None,
        }
    }

    // ==========================================================================
    // Accessors
    // ==========================================================================

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn scopes(&self) -> &ScopeTree {
        &self.scopes
    }

    pub fn resolver(&self) -> &TypeResolver {
        &self.resolver
    }

    pub fn root(&self) -> TypeId {
        Registry::ROOT
    }

    pub fn entry(&self) -> MethodId {
        self.entry
    }

    pub fn intrinsics(&self) -> Intrinsics {
        self.intrinsics
    }

    /// The compiled unit, once finalized.
    pub fn unit(&self) -> Option<&CompiledUnit> {
        self.unit.as_ref()
    }

    /// Next closure carrier id. Ids are unique within the session.
    pub(crate) fn next_closure_id(&mut self) -> u32 {
        self.closure_id += 1;
        self.closure_id
    }

    /// Index of a type test in the unit, registering it on first use.
    pub(crate) fn type_test_index(&mut self, test: TypeTest) -> Result<u16, CompilationError> {
        let index = match self.type_tests.iter().position(|t| *t == test) {
            Some(index) => index,
            None => {
                self.type_tests.push(test);
                self.type_tests.len() - 1
            }
        };
        u16::try_from(index).map_err(|_| CompilationError::invalid_state("too many type tests"))
    }

    // ==========================================================================
    // Pipeline
    // ==========================================================================

    /// Run every remaining pass.
    ///
    /// Compiling an already finalized context returns the existing unit.
    #[tracing::instrument(skip_all)]
    pub fn compile(&mut self) -> Result<&CompiledUnit, CompilationError> {
        if self.state == ContextState::Failed {
            return Err(CompilationError::invalid_state("a previous compilation of this context failed"));
        }
        if self.state != ContextState::Finalized {
            if self.state == ContextState::Empty {
                self.declare_entities()?;
            }
            if self.state == ContextState::EntitiesDeclared {
                self.convert_closures()?;
            }
            if self.state == ContextState::ClosuresConverted {
                self.declare_entities()?;
            }
            if self.state == ContextState::EntitiesRedeclared {
                self.compile_bodies()?;
            }
            if self.state == ContextState::BodiesCompiled {
                self.finalize()?;
            }
        }
        self.unit
            .as_ref()
            .ok_or_else(|| CompilationError::invalid_state("finalized context holds no unit"))
    }

    /// Run one pass, moving to `Failed` if it errors.
    pub(crate) fn run_pass(
        &mut self,
        expected: &[ContextState],
        pass: impl FnOnce(&mut Self) -> Result<ContextState, CompilationError>,
    ) -> Result<(), CompilationError> {
        if !expected.contains(&self.state) {
            return Err(CompilationError::invalid_state(format!(
                "pass cannot run in state {:?}",
                self.state
            )));
        }
        match pass(self) {
            Ok(next) => {
                tracing::debug!(from = ?self.state, to = ?next, "compilation state changed");
                self.state = next;
                Ok(())
            }
            Err(err) => {
                tracing::debug!(%err, "compilation failed");
                self.state = ContextState::Failed;
                Err(err)
            }
        }
    }

    /// Register the input nodes and prepare every unprepared entity.
    ///
    /// Re-running it only prepares entities added since the last run.
    #[tracing::instrument(skip_all)]
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn declare_entities(&mut self) -> Result<(), CompilationError> {
        use ContextState::*;
        self.run_pass(
            &[Empty, EntitiesDeclared, ClosuresConverted, EntitiesRedeclared],
            |ctx| {
                if ctx.state == Empty {
                    ctx.register_pending()?;
                }
                for id in ctx.registry.type_ids() {
                    if !ctx.registry.type_entity(id).prepared {
                        ctx.prepare_type(id)?;
                    }
                }
                for id in ctx.registry.method_ids() {
                    if !ctx.registry.method(id).prepared {
                        ctx.prepare_method(id)?;
                    }
                }
                tracing::debug!(
                    types = ctx.registry.type_count(),
                    methods = ctx.registry.method_count(),
                    "entities declared"
                );
                Ok(match ctx.state {
                    Empty | EntitiesDeclared => EntitiesDeclared,
                    _ => EntitiesRedeclared,
                })
            },
        )
    }

    /// Assemble the compiled unit.
    #[tracing::instrument(skip_all)]
    pub fn finalize(&mut self) -> Result<(), CompilationError> {
        self.run_pass(&[ContextState::BodiesCompiled], |ctx| {
            if ctx.functions.len() != ctx.registry.method_count() {
                return Err(CompilationError::invalid_state("not every function was compiled"));
            }
            let mut types = Vec::with_capacity(ctx.registry.type_count());
            for id in ctx.registry.type_ids() {
                let entity = ctx.registry.type_entity(id);
                let field_defaults = entity
                    .fields
                    .iter()
                    .map(|field| field.ty.as_ref().map(TypeDesc::default_value))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| {
                        CompilationError::invalid_state(format!("type '{}' was never declared", entity.name))
                    })?;
                types.push(UnitType {
                    name: entity.name.clone(),
                    field_defaults,
                });
            }
            ctx.unit = Some(CompiledUnit {
                constants: std::mem::take(&mut ctx.constants),
                functions: std::mem::take(&mut ctx.functions),
                types,
                type_tests: std::mem::take(&mut ctx.type_tests),
                entry: ctx.entry.0,
            });
            Ok(ContextState::Finalized)
        })
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    fn register_pending(&mut self) -> Result<(), CompilationError> {
        let nodes = std::mem::take(&mut self.pending);
        let mut functions = Vec::new();
        let mut statements = Vec::new();

        for node in nodes {
            let span = node.span;
            match node.kind {
                NodeKind::Using(namespace) => self.resolver.open_namespace(&namespace),
                NodeKind::TypeDefinition(def) => self.register_algebraic(def, span)?,
                NodeKind::RecordDefinition(def) => self.register_record(def, span)?,
                NodeKind::FunctionDefinition(def) => functions.push((def, span)),
                kind => statements.push(Node::with_span(kind, span)),
            }
        }
        // Functions may be static methods of types declared after them.
        for (def, span) in functions {
            self.register_function(def, span)?;
        }

        let span = statements.first().map(|node| node.span).unwrap_or_default();
        self.registry.method_mut(self.entry).body =
            Some(Node::with_span(NodeKind::Block { body: statements, scope: None }, span));
        Ok(())
    }

    fn register_record(&mut self, def: RecordDefinition, span: Span) -> Result<(), CompilationError> {
        let mut entity = TypeEntity::new(def.name.as_str(), TypeKind::Record).with_fields(
            def.fields
                .into_iter()
                .map(|field| FieldEntity::declared(field.name, field.signature))
                .collect(),
        );
        entity.span = span;
        let id = self.registry.add_type(entity)?;
        self.add_equals(id);
        tracing::trace!(name = %def.name, "record registered");
        Ok(())
    }

    fn register_algebraic(&mut self, def: TypeDefinition, span: Span) -> Result<(), CompilationError> {
        let mut base = TypeEntity::new(def.name.as_str(), TypeKind::Algebraic);
        base.span = span;
        let base = self.registry.add_type(base)?;
        self.add_equals(base);

        for label in def.labels {
            let mut entity = TypeEntity::new(label.name, TypeKind::Label)
                .with_fields(label.tag.map(|tag| FieldEntity::declared("Tag", tag)).into_iter().collect());
            entity.base = Some(base);
            entity.span = span;
            let id = self.registry.add_type(entity)?;
            self.registry.type_mut(base).labels.push(id);
            self.add_equals(id);
        }
        tracing::trace!(name = %def.name, "algebraic type registered");
        Ok(())
    }

    /// Structural `Equals(a, b)` used by `==` on two instances of the type.
    fn add_equals(&mut self, id: TypeId) {
        let ty = self.registry.type_desc(id);
        self.registry.add_method(MethodEntity::intrinsic(
            "Equals",
            id,
            vec![ty.clone(), ty],
            TypeDesc::BOOL,
            Intrinsic::RecordEquals,
        ));
    }

    fn register_function(&mut self, def: FunctionDefinition, span: Span) -> Result<(), CompilationError> {
        let owner = match &def.owner {
            Some(owner) => self.registry.nameable_type(owner).ok_or_else(|| CompilationError::TypeNotFound {
                name: owner.clone(),
                span,
            })?,
            None => Registry::ROOT,
        };
        let mut method = MethodEntity::new(def.name, owner, MethodKind::Function);
        method.params = def
            .params
            .into_iter()
            .map(|param| ParamEntity {
                name: param.name,
                signature: Some(param.signature),
                ty: None,
                by_ref: param.by_ref,
                span: param.span.or(span),
            })
            .collect();
        method.declared_return = def.return_type;
        method.body = Some(*def.body);
        method.span = span;
        self.registry.add_method(method);
        Ok(())
    }

    // ==========================================================================
    // Preparation
    // ==========================================================================

    fn prepare_type(&mut self, id: TypeId) -> Result<(), CompilationError> {
        let span = self.registry.type_entity(id).span;
        let mut resolved = Vec::new();
        for (i, field) in self.registry.type_entity(id).fields.iter().enumerate() {
            if let (None, Some(sig)) = (&field.ty, &field.signature) {
                resolved.push((i, self.resolver.resolve(sig, &self.registry, span)?));
            }
        }
        let entity = self.registry.type_mut(id);
        for (i, ty) in resolved {
            entity.fields[i].ty = Some(ty);
        }
        entity.prepared = true;
        Ok(())
    }

    /// Resolve the signature of a method.
    pub(crate) fn prepare_method(&mut self, id: MethodId) -> Result<(), CompilationError> {
        let method = self.registry.method(id);
        let mut param_types = Vec::with_capacity(method.params.len());
        for param in &method.params {
            if param.by_ref {
                return Err(CompilationError::UnsupportedReferenceArgument {
                    name: param.name.clone(),
                    span: param.span,
                });
            }
            let ty = match (&param.ty, &param.signature) {
                (Some(ty), _) => ty.clone(),
                (None, Some(sig)) => self.resolver.resolve(sig, &self.registry, param.span)?,
                (None, None) => {
                    return Err(CompilationError::invalid_state(format!(
                        "parameter '{}' has neither type nor signature",
                        param.name
                    )));
                }
            };
            param_types.push(ty);
        }
        let declared = match (&method.return_type, &method.declared_return) {
            (None, Some(sig)) => Some(self.resolver.resolve(sig, &self.registry, method.span)?),
            _ => None,
        };

        let hash = self.registry.signature_hash(method.owner, &method.name, &param_types);
        self.registry.register_signature(id, hash)?;

        let method = self.registry.method_mut(id);
        for (param, ty) in method.params.iter_mut().zip(param_types) {
            param.ty = Some(ty);
        }
        if declared.is_some() {
            method.return_type = declared;
        }
        method.prepared = true;
        Ok(())
    }
}

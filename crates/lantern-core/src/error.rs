//! Error types for compilation and execution.
//!
//! ## Error Hierarchy
//!
//! ```text
//! LanternError (top-level wrapper)
//! ├── CompilationError - type resolution, scoping, operators, closures
//! └── RuntimeError     - bytecode execution
//! ```
//!
//! Every compilation error is fatal: the first one aborts the compilation
//! and carries the location of the offending node.

use thiserror::Error;

use crate::{FoldError, Span};

// ============================================================================
// Compilation Errors
// ============================================================================

/// Errors that abort a compilation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompilationError {
    /// A type signature names no known type.
    #[error("at {span}: unknown type '{name}'")]
    TypeNotFound {
        /// The signature as written.
        name: String,
        span: Span,
    },

    /// A type exists but the restricted-type mode forbids it.
    #[error("at {span}: type '{name}' is not allowed in safe mode")]
    DisallowedType { name: String, span: Span },

    /// An identifier is not declared in any enclosing scope.
    #[error("at {span}: name '{name}' does not exist in the current scope")]
    NameResolution { name: String, span: Span },

    /// A name is declared twice in the same scope.
    #[error("at {new_span}: '{name}' is already declared in this scope (first declared at {original_span})")]
    Redeclaration {
        name: String,
        original_span: Span,
        new_span: Span,
    },

    /// No rule and no overload applies to a binary operator.
    #[error("at {span}: operator '{op}' cannot be applied to operands of type '{left}' and '{right}'")]
    OperatorTypeMismatch {
        /// Textual form of the operator.
        op: String,
        left: String,
        right: String,
        span: Span,
    },

    /// Numeric operands of different signedness.
    #[error("at {span}: operator '{op}' cannot mix signed and unsigned operands '{left}' and '{right}'")]
    SignednessMismatch {
        op: String,
        left: String,
        right: String,
        span: Span,
    },

    /// A constant value was requested from a non-constant node.
    #[error("at {span}: expression is not a constant")]
    NotConstant { span: Span },

    /// A collection literal without elements.
    #[error("at {span}: Use explicit constructor to create an empty {kind}!")]
    EmptyCollection {
        /// `list` or `dictionary`.
        kind: &'static str,
        span: Span,
    },

    /// Two constant keys of a dictionary literal are equal.
    #[error("at {span}: key '{key}' appears more than once in the dictionary literal")]
    DuplicateKey { key: String, span: Span },

    /// Every value of a dictionary literal is `null`.
    #[error("at {span}: dictionary value type cannot be inferred from null values only")]
    UninferableValueType { span: Span },

    #[error("at {span}: {message}")]
    TypeMismatch { message: String, span: Span },

    /// Assignment to a `let` binding or a parameter.
    #[error("at {span}: '{name}' is immutable and cannot be assigned")]
    ImmutableAssignment { name: String, span: Span },

    /// A field, method or member that does not exist on a type.
    #[error("at {span}: type '{ty}' has no member '{name}'")]
    UnknownMember { ty: String, name: String, span: Span },

    #[error("at {span}: no overload of '{name}' accepts ({args})")]
    NoMatchingOverload { name: String, args: String, span: Span },

    #[error("at {span}: call to '{name}' with ({args}) is ambiguous")]
    AmbiguousOverload { name: String, args: String, span: Span },

    #[error("at {span}: cannot cast '{from}' to '{to}'")]
    InvalidCast { from: String, to: String, span: Span },

    /// Folding a constant expression failed.
    #[error("at {span}: constant expression cannot be evaluated: {source}")]
    ConstantFold {
        #[source]
        source: FoldError,
        span: Span,
    },

    /// A function without declared return type is used before its body was analysed.
    #[error("at {span}: return type of '{name}' must be declared to use it before its definition")]
    UndeclaredReturnType { name: String, span: Span },

    #[error("at {span}: by-reference parameter '{name}' is not supported")]
    UnsupportedReferenceArgument { name: String, span: Span },

    /// Internal pipeline invariant violated.
    #[error("invalid compiler state: {message}")]
    InvalidState { message: String },

    /// The generic failure reported through [`CompilationError::fail`].
    #[error("{}{message}", .span.map(|s| format!("at {s}: ")).unwrap_or_default())]
    Failed { message: String, span: Option<Span> },
}

impl CompilationError {
    /// Fail compilation with a message and an optional location.
    pub fn fail(message: impl Into<String>, span: Option<Span>) -> Self {
        CompilationError::Failed {
            message: message.into(),
            span,
        }
    }

    /// Report a violated pipeline invariant.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        CompilationError::InvalidState {
            message: message.into(),
        }
    }

    /// Where this error occurred, if known.
    pub fn span(&self) -> Option<Span> {
        match self {
            CompilationError::TypeNotFound { span, .. }
            | CompilationError::DisallowedType { span, .. }
            | CompilationError::NameResolution { span, .. }
            | CompilationError::OperatorTypeMismatch { span, .. }
            | CompilationError::SignednessMismatch { span, .. }
            | CompilationError::NotConstant { span }
            | CompilationError::EmptyCollection { span, .. }
            | CompilationError::UninferableValueType { span }
            | CompilationError::DuplicateKey { span, .. }
            | CompilationError::TypeMismatch { span, .. }
            | CompilationError::ImmutableAssignment { span, .. }
            | CompilationError::UnknownMember { span, .. }
            | CompilationError::NoMatchingOverload { span, .. }
            | CompilationError::AmbiguousOverload { span, .. }
            | CompilationError::InvalidCast { span, .. }
            | CompilationError::ConstantFold { span, .. }
            | CompilationError::UndeclaredReturnType { span, .. }
            | CompilationError::UnsupportedReferenceArgument { span, .. } => Some(*span),
            CompilationError::Redeclaration { new_span, .. } => Some(*new_span),
            CompilationError::Failed { span, .. } => *span,
            CompilationError::InvalidState { .. } => None,
        }
    }

    /// Attach a location to an error that was raised without one.
    pub fn at(self, location: Span) -> Self {
        match self {
            CompilationError::TypeNotFound { name, span } => CompilationError::TypeNotFound {
                name,
                span: span.or(location),
            },
            CompilationError::DisallowedType { name, span } => CompilationError::DisallowedType {
                name,
                span: span.or(location),
            },
            CompilationError::Failed { message, span: None } => CompilationError::Failed {
                message,
                span: Some(location),
            },
            other => other,
        }
    }
}

// ============================================================================
// Runtime Errors
// ============================================================================

/// Errors raised while executing a compiled unit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// Integer division or remainder by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// A null value was used where a value was required.
    #[error("null value cannot be used as {target}")]
    NullValue { target: String },

    /// A checked cast failed.
    #[error("cannot cast value of type {actual} to {expected}")]
    InvalidCast { expected: String, actual: String },

    #[error("index {index} is out of range for a list of {len} items")]
    IndexOutOfRange { index: i128, len: usize },

    #[error("key '{key}' was not found in the dictionary")]
    KeyNotFound { key: String },

    /// A dictionary literal produced the same key twice.
    #[error("key '{key}' appears more than once in the dictionary literal")]
    DuplicateKey { key: String },

    /// The call depth limit was exceeded.
    #[error("stack overflow: call depth exceeded {limit}")]
    StackOverflow { limit: usize },

    #[error("operand stack underflow")]
    StackUnderflow,

    /// An instruction received operands of the wrong type.
    #[error("type mismatch: {message}")]
    TypeMismatch { message: String },

    /// Malformed instruction stream.
    #[error("invalid bytecode at offset {offset}: {message}")]
    InvalidBytecode { offset: usize, message: String },

    #[error("compiled unit has no entry point")]
    MissingEntryPoint,
}

impl From<FoldError> for RuntimeError {
    fn from(error: FoldError) -> Self {
        match error {
            FoldError::DivisionByZero => RuntimeError::DivisionByZero,
            other => RuntimeError::TypeMismatch {
                message: other.to_string(),
            },
        }
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Any error produced while compiling or running a script.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LanternError {
    #[error(transparent)]
    Compilation(#[from] CompilationError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl LanternError {
    pub fn is_compilation(&self) -> bool {
        matches!(self, LanternError::Compilation(_))
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, LanternError::Runtime(_))
    }
}

// ============================================================================
// Tests
// ============================================================================

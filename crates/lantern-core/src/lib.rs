//! Core types shared by the lantern compiler and virtual machine.
//!
//! - [`Span`] - source locations
//! - [`TypeHash`] - deterministic type and function identities
//! - [`PrimitiveKind`] - built-in value kinds and the promotion lattice
//! - [`TypeDesc`] - resolved types
//! - [`Value`] - constants and runtime values
//! - [`fold`] - operator evaluation shared by constant folding and the VM
//! - [`error`] - compilation and runtime errors

pub mod error;
pub mod fold;
pub mod ops;
pub mod primitive;
pub mod span;
pub mod type_hash;
pub mod types;
pub mod value;

pub use error::{CompilationError, LanternError, RuntimeError};
pub use fold::FoldError;
pub use ops::{BinaryOp, CompareOp, LogicalOp, UnaryOp};
pub use primitive::{PrimitiveKind, PromotionError};
pub use span::Span;
pub use type_hash::TypeHash;
pub use types::{FunctionType, TypeDesc, UserType};
pub use value::{FunctionValue, Object, Value, ValueKey};

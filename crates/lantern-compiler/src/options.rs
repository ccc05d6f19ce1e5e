//! Compiler configuration.

use bitflags::bitflags;
use rustc_hash::FxHashSet;

bitflags! {
    /// Behaviour switches of a compilation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CompilerFlags: u32 {
        /// Replace constant expressions by their folded value.
        const UNROLL_CONSTANTS = 1 << 0;
    }
}

impl Default for CompilerFlags {
    fn default() -> Self {
        CompilerFlags::UNROLL_CONSTANTS
    }
}

/// Restricted-type mode.
///
/// Names are the canonical type names (`int`, `string`, `List`, a record
/// name, ...). Nullable types are checked through their base type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SafeMode {
    #[default]
    Disabled,
    /// Only these types may be used.
    Whitelist(FxHashSet<String>),
    /// These types may not be used.
    Blacklist(FxHashSet<String>),
}

impl SafeMode {
    pub fn whitelist<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SafeMode::Whitelist(names.into_iter().map(Into::into).collect())
    }

    pub fn blacklist<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SafeMode::Blacklist(names.into_iter().map(Into::into).collect())
    }

    /// Whether a type with this canonical name may be used.
    pub fn allows(&self, name: &str) -> bool {
        match self {
            SafeMode::Disabled => true,
            SafeMode::Whitelist(names) => names.contains(name),
            SafeMode::Blacklist(names) => !names.contains(name),
        }
    }
}

/// Options of one compilation session.
#[derive(Debug, Clone, Default)]
pub struct CompilerOptions {
    pub flags: CompilerFlags,
    pub safe_mode: SafeMode,
}

impl CompilerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unroll_constants(mut self, enabled: bool) -> Self {
        self.flags.set(CompilerFlags::UNROLL_CONSTANTS, enabled);
        self
    }

    pub fn with_safe_mode(mut self, safe_mode: SafeMode) -> Self {
        self.safe_mode = safe_mode;
        self
    }

    #[inline]
    pub fn unroll_constants(&self) -> bool {
        self.flags.contains(CompilerFlags::UNROLL_CONSTANTS)
    }
}

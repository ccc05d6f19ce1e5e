//! Built-in value kinds and the numeric promotion lattice.

use std::fmt;

/// Primitive value kinds: `bool` and the numeric types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float,
    Double,
}

/// Why two numeric kinds have no common promoted kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionError {
    /// One side is `bool`.
    NotNumeric,
    /// One side is signed and the other unsigned.
    Signedness,
}

impl PrimitiveKind {
    /// Every numeric kind, narrowest integers first.
    pub const NUMERIC: [PrimitiveKind; 10] = [
        PrimitiveKind::Int8,
        PrimitiveKind::Int16,
        PrimitiveKind::Int32,
        PrimitiveKind::Int64,
        PrimitiveKind::Uint8,
        PrimitiveKind::Uint16,
        PrimitiveKind::Uint32,
        PrimitiveKind::Uint64,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
    ];

    /// The canonical script name of this kind.
    pub const fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Int8 => "int8",
            PrimitiveKind::Int16 => "int16",
            PrimitiveKind::Int32 => "int",
            PrimitiveKind::Int64 => "long",
            PrimitiveKind::Uint8 => "uint8",
            PrimitiveKind::Uint16 => "uint16",
            PrimitiveKind::Uint32 => "uint",
            PrimitiveKind::Uint64 => "ulong",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
        }
    }

    /// Look a kind up by its canonical name or one of its aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "bool" => PrimitiveKind::Bool,
            "int8" | "sbyte" => PrimitiveKind::Int8,
            "int16" | "short" => PrimitiveKind::Int16,
            "int" | "int32" => PrimitiveKind::Int32,
            "long" | "int64" => PrimitiveKind::Int64,
            "uint8" | "byte" => PrimitiveKind::Uint8,
            "uint16" | "ushort" => PrimitiveKind::Uint16,
            "uint" | "uint32" => PrimitiveKind::Uint32,
            "ulong" | "uint64" => PrimitiveKind::Uint64,
            "float" | "float32" => PrimitiveKind::Float,
            "double" | "float64" => PrimitiveKind::Double,
            _ => return None,
        };
        Some(kind)
    }

    /// Stable one-byte tag used as an instruction operand.
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Inverse of [`PrimitiveKind::tag`].
    pub fn from_tag(tag: u8) -> Option<Self> {
        const ALL: [PrimitiveKind; 11] = [
            PrimitiveKind::Bool,
            PrimitiveKind::Int8,
            PrimitiveKind::Int16,
            PrimitiveKind::Int32,
            PrimitiveKind::Int64,
            PrimitiveKind::Uint8,
            PrimitiveKind::Uint16,
            PrimitiveKind::Uint32,
            PrimitiveKind::Uint64,
            PrimitiveKind::Float,
            PrimitiveKind::Double,
        ];
        ALL.get(tag as usize).copied()
    }

    #[inline]
    pub const fn is_numeric(self) -> bool {
        !matches!(self, PrimitiveKind::Bool)
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, PrimitiveKind::Float | PrimitiveKind::Double)
    }

    #[inline]
    pub const fn is_integer(self) -> bool {
        self.is_numeric() && !self.is_float()
    }

    #[inline]
    pub const fn is_unsigned(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Uint8 | PrimitiveKind::Uint16 | PrimitiveKind::Uint32 | PrimitiveKind::Uint64
        )
    }

    #[inline]
    pub const fn is_signed_integer(self) -> bool {
        self.is_integer() && !self.is_unsigned()
    }

    /// Storage width in bits.
    pub const fn bits(self) -> u32 {
        match self {
            PrimitiveKind::Bool | PrimitiveKind::Int8 | PrimitiveKind::Uint8 => 8,
            PrimitiveKind::Int16 | PrimitiveKind::Uint16 => 16,
            PrimitiveKind::Int32 | PrimitiveKind::Uint32 | PrimitiveKind::Float => 32,
            PrimitiveKind::Int64 | PrimitiveKind::Uint64 | PrimitiveKind::Double => 64,
        }
    }

    /// Common kind of two numeric operands.
    ///
    /// Any floating operand gives a floating result (the wider float wins).
    /// Two integers of the same signedness give the wider of the two. Mixing
    /// signed and unsigned integers has no common kind.
    pub fn promote(self, other: PrimitiveKind) -> Result<PrimitiveKind, PromotionError> {
        if !self.is_numeric() || !other.is_numeric() {
            return Err(PromotionError::NotNumeric);
        }
        if self.is_float() || other.is_float() {
            let double = self == PrimitiveKind::Double || other == PrimitiveKind::Double;
            return Ok(if double { PrimitiveKind::Double } else { PrimitiveKind::Float });
        }
        if self.is_unsigned() != other.is_unsigned() {
            return Err(PromotionError::Signedness);
        }
        Ok(if other.bits() > self.bits() { other } else { self })
    }

    /// Whether a value of `self` converts to `target` without an explicit cast.
    pub fn widens_to(self, target: PrimitiveKind) -> bool {
        if self == target {
            return true;
        }
        if !self.is_numeric() || !target.is_numeric() {
            return false;
        }
        match (self.is_float(), target.is_float()) {
            (false, true) => true,
            (true, true) => target.bits() > self.bits(),
            (true, false) => false,
            (false, false) => self.is_unsigned() == target.is_unsigned() && target.bits() > self.bits(),
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PrimitiveKind::*;

    #[test]
    fn wider_integer_wins() {
        assert_eq!(Int32.promote(Int64), Ok(Int64));
        assert_eq!(Int64.promote(Int8), Ok(Int64));
        assert_eq!(Uint8.promote(Uint32), Ok(Uint32));
        assert_eq!(Int16.promote(Int16), Ok(Int16));
    }

    #[test]
    fn floating_operand_forces_floating_result() {
        assert_eq!(Int32.promote(Double), Ok(Double));
        assert_eq!(Int64.promote(Float), Ok(Float));
        assert_eq!(Float.promote(Double), Ok(Double));
        assert_eq!(Uint64.promote(Float), Ok(Float));
    }

    #[test]
    fn mixed_signedness_does_not_promote() {
        assert_eq!(Uint32.promote(Int32), Err(PromotionError::Signedness));
        assert_eq!(Int8.promote(Uint64), Err(PromotionError::Signedness));
        assert_eq!(Bool.promote(Int32), Err(PromotionError::NotNumeric));
    }

    #[test]
    fn widening_rules() {
        assert!(Int32.widens_to(Int64));
        assert!(Int64.widens_to(Double));
        assert!(Float.widens_to(Double));
        assert!(!Int64.widens_to(Int32));
        assert!(!Uint32.widens_to(Int64));
        assert!(!Double.widens_to(Float));
        assert!(!Bool.widens_to(Int32));
    }

    #[test]
    fn tags_round_trip_through_names() {
        for kind in PrimitiveKind::NUMERIC {
            assert_eq!(PrimitiveKind::from_tag(kind.tag()), Some(kind));
            assert_eq!(PrimitiveKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(PrimitiveKind::from_name("int64"), Some(Int64));
        assert_eq!(PrimitiveKind::from_name("decimal"), None);
    }
}

//! Operator kinds shared by the compiler (typing, emission) and the VM.

use std::fmt;

/// Arithmetic, bitwise and shift operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
}

/// Equality and relational operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

/// Boolean connectives. `And` and `Or` short-circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    Not,
}

impl BinaryOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
        }
    }

    /// Name of the static method a user type declares to overload this operator.
    pub const fn overload_name(self) -> Option<&'static str> {
        match self {
            BinaryOp::Add => Some("op_Addition"),
            BinaryOp::Sub => Some("op_Subtraction"),
            BinaryOp::Mul => Some("op_Multiply"),
            BinaryOp::Div => Some("op_Division"),
            BinaryOp::Rem => Some("op_Modulus"),
            BinaryOp::Pow => None,
            BinaryOp::Shl => Some("op_LeftShift"),
            BinaryOp::Shr => Some("op_RightShift"),
            BinaryOp::BitAnd => Some("op_BitwiseAnd"),
            BinaryOp::BitOr => Some("op_BitwiseOr"),
            BinaryOp::BitXor => Some("op_ExclusiveOr"),
        }
    }

    #[inline]
    pub const fn is_shift(self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr)
    }

    #[inline]
    pub const fn is_bitwise(self) -> bool {
        matches!(self, BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor)
    }
}

impl CompareOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            CompareOp::Equal => "==",
            CompareOp::NotEqual => "<>",
            CompareOp::Less => "<",
            CompareOp::LessEqual => "<=",
            CompareOp::Greater => ">",
            CompareOp::GreaterEqual => ">=",
        }
    }

    pub const fn overload_name(self) -> &'static str {
        match self {
            CompareOp::Equal => "op_Equality",
            CompareOp::NotEqual => "op_Inequality",
            CompareOp::Less => "op_LessThan",
            CompareOp::LessEqual => "op_LessThanOrEqual",
            CompareOp::Greater => "op_GreaterThan",
            CompareOp::GreaterEqual => "op_GreaterThanOrEqual",
        }
    }

    #[inline]
    pub const fn is_equality(self) -> bool {
        matches!(self, CompareOp::Equal | CompareOp::NotEqual)
    }
}

impl LogicalOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
            LogicalOp::Xor => "^^",
        }
    }
}

impl UnaryOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Not => "!",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

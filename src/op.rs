//! Closed set of operators the native provider supports.

use std::fmt;

/// A supported two-operand integer operator.
///
/// The wire encoding is the ASCII byte of the operator symbol; see
/// [`Operator::code`]. Validation against this set happens host-side, before
/// any native call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `+` addition
    Add,
    /// `-` subtraction
    Sub,
    /// `*` multiplication
    Mul,
    /// `/` division
    Div,
    /// `%` remainder
    Rem,
    /// `^` bitwise xor
    Xor,
}

impl Operator {
    /// Every supported operator, in wire-symbol order.
    pub const ALL: [Operator; 6] = [
        Operator::Add,
        Operator::Sub,
        Operator::Mul,
        Operator::Div,
        Operator::Rem,
        Operator::Xor,
    ];

    /// Parse from the operator symbol.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Sub),
            '*' => Some(Operator::Mul),
            '/' => Some(Operator::Div),
            '%' => Some(Operator::Rem),
            '^' => Some(Operator::Xor),
            _ => None,
        }
    }

    /// Parse from the single-byte wire encoding.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::from_char(code as char)
    }

    /// The operator symbol.
    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
            Operator::Div => '/',
            Operator::Rem => '%',
            Operator::Xor => '^',
        }
    }

    /// The single-byte code passed across the boundary.
    pub fn code(self) -> u8 {
        self.symbol() as u8
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_wire_code() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_code(op.code()), Some(op));
            assert_eq!(Operator::from_char(op.symbol()), Some(op));
        }
    }

    #[test]
    fn test_rejects_unknown_symbols() {
        assert_eq!(Operator::from_char('?'), None);
        assert_eq!(Operator::from_char('&'), None);
        assert_eq!(Operator::from_char('='), None);
        assert_eq!(Operator::from_code(0), None);
    }

    #[test]
    fn test_display_matches_symbol() {
        assert_eq!(Operator::Add.to_string(), "+");
        assert_eq!(Operator::Rem.to_string(), "%");
    }
}

//! Arithmetic-logic unit.
//!
//! Operands are staged into the ALU, an operation is selected, and the
//! result is computed in 64-bit precision before being folded back into
//! the 32-bit word range.
//!
//! The fold is not two's-complement truncation. A result below `MIN_WORD`
//! is reduced modulo `|MIN_WORD|` and a result above `MAX_WORD` is reduced
//! modulo `MAX_WORD`, both with a non-negative remainder. Programs compiled
//! for this machine observe that asymmetry, so it is kept as-is.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A machine word.
pub type Word = i32;

/// Largest representable word.
pub const MAX_WORD: i64 = Word::MAX as i64;
/// Smallest representable word.
pub const MIN_WORD: i64 = Word::MIN as i64;

/// The nine ALU operations, in selector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AluOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    NotEq,
    Eq,
    Less,
    Greater,
}

impl AluOp {
    pub const ALL: [AluOp; 9] = [
        AluOp::Add,
        AluOp::Sub,
        AluOp::Mul,
        AluOp::Div,
        AluOp::Mod,
        AluOp::NotEq,
        AluOp::Eq,
        AluOp::Less,
        AluOp::Greater,
    ];

    /// Selector index of the operation.
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Operation for a selector index.
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Compute the unfolded result.
    pub fn apply(self, a: i64, b: i64) -> Result<i64, AluError> {
        let result = match self {
            AluOp::Add => a + b,
            AluOp::Sub => a - b,
            AluOp::Mul => a * b,
            AluOp::Div => floor_div(a, b)?,
            AluOp::Mod => floor_mod(a, b)?,
            AluOp::NotEq => (a != b) as i64,
            AluOp::Eq => (a == b) as i64,
            AluOp::Less => (a < b) as i64,
            AluOp::Greater => (a > b) as i64,
        };
        Ok(result)
    }
}

/// Condition flags refreshed by every operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    pub negative: bool,
    pub zero: bool,
    pub overflow: bool,
}

impl Flags {
    /// Flags for a raw result, before it is folded into range.
    pub fn of(raw: i64) -> Self {
        Self {
            negative: raw < 0,
            zero: raw == 0,
            overflow: !(MIN_WORD..=MAX_WORD).contains(&raw),
        }
    }
}

/// The ALU with its staged operands and last result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Alu {
    /// Left operand, taken from TOS.
    pub first: Word,
    /// Right operand, popped from the stack.
    pub second: Word,
    /// Wrapped result of the last operation.
    pub result: Word,
    /// Flags of the last operation, from the unwrapped value.
    pub flags: Flags,
}

impl Alu {
    /// Create an ALU with zeroed operands and flags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage both operands.
    pub fn load(&mut self, first: Word, second: Word) {
        self.first = first;
        self.second = second;
    }

    /// Run `op` over the staged operands, refreshing flags and result.
    pub fn execute(&mut self, op: AluOp) -> Result<Word, AluError> {
        let raw = op.apply(self.first as i64, self.second as i64)?;
        let (result, flags) = apply_flags(raw);
        self.result = result;
        self.flags = flags;
        Ok(result)
    }
}

/// Compute flags for `raw` and fold it into the word range.
///
/// Flags describe the raw value: an underflowing result sets `negative`
/// even though the folded word is non-negative.
pub fn apply_flags(raw: i64) -> (Word, Flags) {
    let flags = Flags::of(raw);
    let folded = if raw < MIN_WORD {
        raw.rem_euclid(-MIN_WORD)
    } else if raw > MAX_WORD {
        raw.rem_euclid(MAX_WORD)
    } else {
        raw
    };
    // Both remainders are below 2^31.
    (folded as Word, flags)
}

/// Division rounding toward negative infinity.
fn floor_div(a: i64, b: i64) -> Result<i64, AluError> {
    if b == 0 {
        return Err(AluError::DivisionByZero);
    }
    let q = a / b;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

/// Remainder taking the sign of the divisor.
fn floor_mod(a: i64, b: i64) -> Result<i64, AluError> {
    if b == 0 {
        return Err(AluError::DivisionByZero);
    }
    let r = a % b;
    if r != 0 && ((r < 0) != (b < 0)) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

/// Errors raised by the ALU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AluError {
    #[error("division by zero")]
    DivisionByZero,
}

//! Register-to-register arithmetic, bitwise and compare operations.
//!
//! Values are plain `u8`s and every operation wraps at 8 bits.

use std::cmp::Ordering;

use crate::{Bytecode, ExecutionError, FLAG_EQUAL, FLAG_GREATER, FLAG_LESS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,
    Inc,
    Dec,
    Cmp,
}

impl AluOp {
    /// Unary operations only read their first register.
    pub fn is_unary(self) -> bool {
        matches!(self, AluOp::Not | AluOp::Inc | AluOp::Dec)
    }
}

impl TryFrom<Bytecode> for AluOp {
    type Error = ExecutionError;

    fn try_from(value: Bytecode) -> Result<Self, Self::Error> {
        Ok(match value {
            Bytecode::Add => AluOp::Add,
            Bytecode::Sub => AluOp::Sub,
            Bytecode::Mul => AluOp::Mul,
            Bytecode::Div => AluOp::Div,
            Bytecode::Mod => AluOp::Mod,
            Bytecode::And => AluOp::And,
            Bytecode::Or => AluOp::Or,
            Bytecode::Xor => AluOp::Xor,
            Bytecode::Not => AluOp::Not,
            Bytecode::Shl => AluOp::Shl,
            Bytecode::Shr => AluOp::Shr,
            Bytecode::Inc => AluOp::Inc,
            Bytecode::Dec => AluOp::Dec,
            Bytecode::Cmp => AluOp::Cmp,
            other => return Err(ExecutionError::UnsupportedAluOperation(other)),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluResult {
    /// New value for the first register.
    Value(u8),
    /// Comparison outcome, exactly one of the flag bits.
    Flags(u8),
}

pub fn evaluate(op: AluOp, a: u8, b: u8) -> Result<AluResult, ExecutionError> {
    let value = match op {
        AluOp::Add => a.wrapping_add(b),
        AluOp::Sub => a.wrapping_sub(b),
        AluOp::Mul => a.wrapping_mul(b),
        AluOp::Div => a.checked_div(b).ok_or(ExecutionError::DivisionByZero)?,
        AluOp::Mod => a.checked_rem(b).ok_or(ExecutionError::DivisionByZero)?,
        AluOp::And => a & b,
        AluOp::Or => a | b,
        AluOp::Xor => a ^ b,
        AluOp::Not => !a,
        // Shifting every bit out leaves zero
        AluOp::Shl => a.checked_shl(b as u32).unwrap_or(0),
        AluOp::Shr => a.checked_shr(b as u32).unwrap_or(0),
        AluOp::Inc => a.wrapping_add(1),
        AluOp::Dec => a.wrapping_sub(1),
        AluOp::Cmp => return Ok(AluResult::Flags(compare(a, b))),
    };
    Ok(AluResult::Value(value))
}

pub fn compare(a: u8, b: u8) -> u8 {
    match a.cmp(&b) {
        Ordering::Equal => FLAG_EQUAL,
        Ordering::Greater => FLAG_GREATER,
        Ordering::Less => FLAG_LESS,
    }
}

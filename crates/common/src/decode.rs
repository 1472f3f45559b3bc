//! Opcode byte layout:
//!
//! ```text
//!  7 6   5   4   3 2 1 0
//! [ AA | B | C | DDDD ]
//! ```
//!
//! `AA` is the operand count, `B` marks ALU operations, `C` is set when the
//! instruction moves the program counter itself and `DDDD` identifies the
//! instruction within its class.

const OPERAND_COUNT_SHIFT: u8 = 6;
const ALU_MASK: u8 = 0b0010_0000;
const SETS_PC_MASK: u8 = 0b0001_0000;
const IDENTIFIER_MASK: u8 = 0b0000_1111;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedOpcode {
    pub operand_count: u8,
    pub alu: bool,
    pub sets_pc: bool,
    pub identifier: u8,
}

impl DecodedOpcode {
    /// Total length of the instruction in memory, opcode included.
    pub fn size(&self) -> usize {
        self.operand_count as usize + 1
    }
}

/// Split an opcode into its fields. An operand count of 3 is not used by any
/// instruction and is rejected by the dispatcher, not here.
pub const fn decode(opcode: u8) -> DecodedOpcode {
    DecodedOpcode {
        operand_count: opcode >> OPERAND_COUNT_SHIFT,
        alu: opcode & ALU_MASK != 0,
        sets_pc: opcode & SETS_PC_MASK != 0,
        identifier: opcode & IDENTIFIER_MASK,
    }
}

use std::collections::HashMap;

use num_derive::{FromPrimitive, ToPrimitive};
use once_cell::sync::Lazy;
use strum::{Display, EnumIter};
use thiserror::Error;

pub mod alu;
pub mod decode;
pub mod native;
pub mod program;

pub use decode::{decode, DecodedOpcode};
pub use native::{BufferHostIO, HostIO, NativeCpu, NullHostIO};
pub use program::{Program, ProgramError};

/// Number of addressable memory cells.
pub const MEMORY_SIZE: usize = 256;
/// Number of general purpose registers.
pub const REGISTER_COUNT: usize = 8;
/// The stack pointer is not a separate register, it lives in R7.
pub const SP: usize = 7;
pub const STACK_START: u8 = 0xF4;

pub const FLAG_EQUAL: u8 = 0b0000_0001;
pub const FLAG_GREATER: u8 = 0b0000_0010;
pub const FLAG_LESS: u8 = 0b0000_0100;
pub const FLAG_MASK: u8 = FLAG_EQUAL | FLAG_GREATER | FLAG_LESS;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Invalid Opcode: {:#010b} at (@{:#04x}/@{})", .0, .1, .1)]
    InvalidOpcode(u8, usize),
    #[error("Invalid register: R{0}")]
    InvalidRegister(u8),
    #[error("Trying to access invalid memory location (@{:#04x}/@{})", .0, .0)]
    InvalidMemoryLocation(usize),
    #[error("Stack Overflow")]
    StackOverflow,
    #[error("Stack Underflow")]
    StackUnderflow,
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Unsupported ALU operation: {0}")]
    UnsupportedAluOperation(Bytecode),
    #[error("Failed to write program output")]
    Output(#[from] std::io::Error),
    #[error("`{instruction}` failed at (@{pc:#04x}/@{pc})")]
    Instruction {
        instruction: String,
        pc: usize,
        #[source]
        source: Box<ExecutionError>,
    },
}

impl ExecutionError {
    /// Process exit status for this error. Load errors use 1-3.
    pub fn exit_code(&self) -> u8 {
        match self {
            ExecutionError::InvalidOpcode(..) => 4,
            ExecutionError::Instruction { source, .. } => source.exit_code(),
            _ => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuStats {
    pub instructions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Run until the program halts or faults.
    Run,
    /// Execute at most this many instructions.
    RunFor(usize),
}

#[derive(
    Debug,
    Display,
    PartialEq,
    PartialOrd,
    Copy,
    Clone,
    Hash,
    Eq,
    Ord,
    FromPrimitive,
    ToPrimitive,
    EnumIter,
)]
#[strum(serialize_all = "UPPERCASE")]
#[repr(u8)]
pub enum Bytecode {
    //
    // 0b00xx_xxxx: no operands
    //
    Nop = 0b0000_0000,
    Hlt = 0b0000_0001,
    Ret = 0b0001_0001,

    //
    // 0b01xx_xxxx: one operand
    //
    Push = 0b0100_0101,
    Pop = 0b0100_0110,
    Prn = 0b0100_0111,
    Pra = 0b0100_1000,

    Call = 0b0101_0000,
    Jmp = 0b0101_0100,
    Jeq = 0b0101_0101,
    Jne = 0b0101_0110,
    Jgt = 0b0101_0111,
    Jlt = 0b0101_1000,
    Jle = 0b0101_1001,
    Jge = 0b0101_1010,

    Inc = 0b0110_0101,
    Dec = 0b0110_0110,
    Not = 0b0110_1001,

    //
    // 0b10xx_xxxx: two operands
    //
    Ldi = 0b1000_0010,
    Ld = 0b1000_0011,
    St = 0b1000_0100,

    Add = 0b1010_0000,
    Sub = 0b1010_0001,
    Mul = 0b1010_0010,
    Div = 0b1010_0011,
    Mod = 0b1010_0100,
    Cmp = 0b1010_0111,
    And = 0b1010_1000,
    Or = 0b1010_1010,
    Xor = 0b1010_1011,
    Shl = 0b1010_1100,
    Shr = 0b1010_1101,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedOperandType {
    Register,  // A register index
    Immediate, // 8-bit immediate value
}

#[derive(Debug, Clone)]
pub struct InstructionPattern {
    pub bytecode: Bytecode,
    pub operands: &'static [ExpectedOperandType],
    pub mnemonic: &'static str,
}

impl InstructionPattern {
    const fn new(
        bytecode: Bytecode,
        operands: &'static [ExpectedOperandType],
        mnemonic: &'static str,
    ) -> Self {
        Self {
            bytecode,
            operands,
            mnemonic,
        }
    }

    /// Human readable form, e.g. `ldi R0, 8`.
    pub fn render(&self, operands: &[u8]) -> String {
        let rendered = self
            .operands
            .iter()
            .zip(operands)
            .map(|(kind, value)| match kind {
                ExpectedOperandType::Register => format!("R{value}"),
                ExpectedOperandType::Immediate => format!("{value}"),
            })
            .collect::<Vec<_>>();

        if rendered.is_empty() {
            self.mnemonic.to_string()
        } else {
            format!("{} {}", self.mnemonic, rendered.join(", "))
        }
    }
}

pub static INSTRUCTION_PATTERNS: Lazy<HashMap<Bytecode, &'static InstructionPattern>> =
    Lazy::new(|| {
        use ExpectedOperandType::{Immediate, Register};

        static PATTERNS: &[InstructionPattern] = &[
            InstructionPattern::new(Bytecode::Nop, &[], "nop"),
            InstructionPattern::new(Bytecode::Hlt, &[], "hlt"),
            InstructionPattern::new(Bytecode::Ret, &[], "ret"),
            // Stack and output
            InstructionPattern::new(Bytecode::Push, &[Register], "push"),
            InstructionPattern::new(Bytecode::Pop, &[Register], "pop"),
            InstructionPattern::new(Bytecode::Prn, &[Register], "prn"),
            InstructionPattern::new(Bytecode::Pra, &[Register], "pra"),
            // Control flow
            InstructionPattern::new(Bytecode::Call, &[Register], "call"),
            InstructionPattern::new(Bytecode::Jmp, &[Register], "jmp"),
            InstructionPattern::new(Bytecode::Jeq, &[Register], "jeq"),
            InstructionPattern::new(Bytecode::Jne, &[Register], "jne"),
            InstructionPattern::new(Bytecode::Jgt, &[Register], "jgt"),
            InstructionPattern::new(Bytecode::Jlt, &[Register], "jlt"),
            InstructionPattern::new(Bytecode::Jle, &[Register], "jle"),
            InstructionPattern::new(Bytecode::Jge, &[Register], "jge"),
            // Unary ALU
            InstructionPattern::new(Bytecode::Inc, &[Register], "inc"),
            InstructionPattern::new(Bytecode::Dec, &[Register], "dec"),
            InstructionPattern::new(Bytecode::Not, &[Register], "not"),
            // Loads and stores
            InstructionPattern::new(Bytecode::Ldi, &[Register, Immediate], "ldi"),
            InstructionPattern::new(Bytecode::Ld, &[Register, Register], "ld"),
            InstructionPattern::new(Bytecode::St, &[Register, Register], "st"),
            // Binary ALU
            InstructionPattern::new(Bytecode::Add, &[Register, Register], "add"),
            InstructionPattern::new(Bytecode::Sub, &[Register, Register], "sub"),
            InstructionPattern::new(Bytecode::Mul, &[Register, Register], "mul"),
            InstructionPattern::new(Bytecode::Div, &[Register, Register], "div"),
            InstructionPattern::new(Bytecode::Mod, &[Register, Register], "mod"),
            InstructionPattern::new(Bytecode::Cmp, &[Register, Register], "cmp"),
            InstructionPattern::new(Bytecode::And, &[Register, Register], "and"),
            InstructionPattern::new(Bytecode::Or, &[Register, Register], "or"),
            InstructionPattern::new(Bytecode::Xor, &[Register, Register], "xor"),
            InstructionPattern::new(Bytecode::Shl, &[Register, Register], "shl"),
            InstructionPattern::new(Bytecode::Shr, &[Register, Register], "shr"),
        ];

        let mut map = HashMap::new();
        for pattern in PATTERNS {
            map.insert(pattern.bytecode, pattern);
        }
        map
    });

pub fn get_pattern(bytecode: Bytecode) -> Option<&'static InstructionPattern> {
    INSTRUCTION_PATTERNS.get(&bytecode).copied()
}

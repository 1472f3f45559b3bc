use std::{borrow::Cow, collections::BTreeMap};

use log::{debug, log_enabled, trace, Level};
use num_traits::FromPrimitive;

use crate::{
    alu::{self, AluOp, AluResult},
    decode, get_pattern, Bytecode, CpuStats, ExecutionError, Program, RunMode, FLAG_EQUAL,
    FLAG_GREATER, FLAG_LESS, FLAG_MASK, MEMORY_SIZE, REGISTER_COUNT, SP, STACK_START,
};

/// Where program output goes. `PRN` and `PRA` are the only instructions
/// that talk to the host.
pub trait HostIO: std::fmt::Debug {
    fn print_number(&mut self, value: u8) -> Result<(), ExecutionError>;
    fn print_char(&mut self, value: u8) -> Result<(), ExecutionError>;
}

#[derive(Debug)]
pub struct NullHostIO;

impl HostIO for NullHostIO {
    fn print_number(&mut self, _value: u8) -> Result<(), ExecutionError> {
        Ok(())
    }

    fn print_char(&mut self, _value: u8) -> Result<(), ExecutionError> {
        Ok(())
    }
}

/// Collects program output in memory.
#[derive(Debug, Default)]
pub struct BufferHostIO {
    pub output: Vec<u8>,
}

impl BufferHostIO {
    /// Output as text. Bytes that are not valid UTF-8 show up as U+FFFD.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }
}

impl HostIO for BufferHostIO {
    fn print_number(&mut self, value: u8) -> Result<(), ExecutionError> {
        self.output.extend_from_slice(format!("{value}\n").as_bytes());
        Ok(())
    }

    fn print_char(&mut self, value: u8) -> Result<(), ExecutionError> {
        self.output.push(value);
        Ok(())
    }
}

#[derive(Debug)]
pub struct NativeCpu<IO: HostIO> {
    memory: [u8; MEMORY_SIZE],
    registers: [u8; REGISTER_COUNT],
    pc: usize,
    flags: u8,
    running: bool,
    stats: CpuStats,
    host_io: IO,
    trace: bool,
}

impl<IO: HostIO> NativeCpu<IO> {
    pub fn new(host_io: IO) -> Self {
        let mut registers = [0; REGISTER_COUNT];
        registers[SP] = STACK_START;

        Self {
            memory: [0; MEMORY_SIZE],
            registers,
            pc: 0,
            flags: 0,
            running: true,
            stats: CpuStats::default(),
            host_io,
            trace: false,
        }
    }

    pub fn print_state(&self) {
        eprintln!();
        eprintln!("========== VM STATE ===========");
        eprintln!();
        eprintln!("PC: {:#04x}", self.pc);
        eprintln!("SP: {:#04x}", self.registers[SP]);
        eprintln!("FL: {:#010b}", self.flags);
        eprintln!("Instructions: {}", self.stats.instructions);
        eprintln!(
            "Registers: {:#?}",
            self.registers
                .iter()
                .enumerate()
                .collect::<BTreeMap<_, _>>()
        );
        eprintln!(
            "Memory: {:#?}",
            self.memory
                .iter()
                .enumerate()
                .filter(|(_, value)| **value != 0)
                .collect::<BTreeMap<_, _>>()
        );
    }

    /// One line snapshot: PC, the three bytes at PC, then R0-R7.
    pub fn trace_line(&self) -> String {
        let peek = |offset: usize| self.memory.get(self.pc + offset).copied().unwrap_or(0);

        let mut line = format!(
            "TRACE: {:02X} | {:02X} {:02X} {:02X} |",
            self.pc,
            peek(0),
            peek(1),
            peek(2)
        );
        for value in self.registers {
            line.push_str(&format!(" {value:02X}"));
        }
        line
    }

    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    pub fn get_halted(&self) -> bool {
        !self.running
    }

    pub fn get_registers(&self) -> &[u8] {
        &self.registers
    }

    pub fn get_memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn get_flags(&self) -> u8 {
        self.flags
    }

    pub fn get_pc(&self) -> usize {
        self.pc
    }

    pub fn get_stats(&self) -> CpuStats {
        self.stats
    }

    pub fn stack_pointer(&self) -> u8 {
        self.registers[SP]
    }

    pub fn host_io(&self) -> &IO {
        &self.host_io
    }

    pub fn into_host_io(self) -> IO {
        self.host_io
    }

    pub fn load_memory(&mut self, address: usize, memory: &[u8]) -> Result<(), ExecutionError> {
        let end = address + memory.len();
        if end > MEMORY_SIZE {
            return Err(ExecutionError::InvalidMemoryLocation(end - 1));
        }
        self.memory[address..end].copy_from_slice(memory);
        Ok(())
    }

    pub fn load_program(&mut self, program: &Program) -> Result<(), ExecutionError> {
        self.load_memory(0, &program.data)
    }

    pub fn execute(&mut self, run_mode: RunMode) -> Result<CpuStats, ExecutionError> {
        match run_mode {
            RunMode::Run => self.run(None),
            RunMode::RunFor(instructions) => self.run(Some(instructions)),
        }
    }

    fn run(&mut self, limit: Option<usize>) -> Result<CpuStats, ExecutionError> {
        let mut executed = 0;

        while self.running && limit.map_or(true, |limit| executed < limit) {
            self.step()?;
            executed += 1;
        }

        Ok(self.stats)
    }

    /// Fetch, decode and execute a single instruction.
    pub fn step(&mut self) -> Result<(), ExecutionError> {
        if !self.running {
            return Ok(());
        }

        if self.trace {
            eprintln!("{}", self.trace_line());
        }

        let pc = self.pc;
        let opcode = self.read_memory(pc)?;
        let instr = Bytecode::from_u8(opcode).ok_or(ExecutionError::InvalidOpcode(opcode, pc))?;
        let decoded = decode(opcode);

        let mut operands = [0; 2];
        for (offset, operand) in operands
            .iter_mut()
            .take(decoded.operand_count as usize)
            .enumerate()
        {
            *operand = self.read_memory(pc + 1 + offset)?;
        }
        let operands = &operands[..decoded.operand_count as usize];

        if log_enabled!(Level::Trace) {
            trace!("@{:#04x}: {}", pc, describe(instr, operands));
        }

        self.dispatch(instr, operands)
            .map_err(|source| ExecutionError::Instruction {
                instruction: describe(instr, operands),
                pc,
                source: Box::new(source),
            })?;

        if !decoded.sets_pc {
            self.pc += decoded.size();
        }
        self.stats.instructions += 1;

        Ok(())
    }

    fn dispatch(&mut self, instr: Bytecode, operands: &[u8]) -> Result<(), ExecutionError> {
        let a = operands.first().copied().unwrap_or_default();
        let b = operands.get(1).copied().unwrap_or_default();

        match instr {
            Bytecode::Nop => {}
            Bytecode::Hlt => {
                debug!(
                    "HLT at @{:#04x} after {} instructions",
                    self.pc, self.stats.instructions
                );
                self.running = false;
            }
            Bytecode::Ldi => self.write_register(a, b)?,
            Bytecode::Ld => {
                let address = self.read_register(b)?;
                let value = self.read_memory(address as usize)?;
                self.write_register(a, value)?;
            }
            Bytecode::St => {
                let address = self.read_register(a)?;
                let value = self.read_register(b)?;
                self.write_memory(address as usize, value)?;
            }
            Bytecode::Prn => {
                let value = self.read_register(a)?;
                self.host_io.print_number(value)?;
            }
            Bytecode::Pra => {
                let value = self.read_register(a)?;
                self.host_io.print_char(value)?;
            }
            Bytecode::Push => {
                let value = self.read_register(a)?;
                self.push_stack(value)?;
            }
            Bytecode::Pop => {
                let value = self.pop_stack()?;
                self.write_register(a, value)?;
            }
            Bytecode::Call => {
                // Return address is the instruction after this two byte CALL
                let return_address = self.pc + 2;
                let return_address = u8::try_from(return_address)
                    .map_err(|_| ExecutionError::InvalidMemoryLocation(return_address))?;
                self.push_stack(return_address)?;
                // The target is read after the push, so `CALL R7` jumps to the new stack top
                self.pc = self.read_register(a)? as usize;
            }
            Bytecode::Ret => {
                self.pc = self.pop_stack()? as usize;
            }
            Bytecode::Jmp => {
                self.pc = self.read_register(a)? as usize;
            }
            Bytecode::Jeq
            | Bytecode::Jne
            | Bytecode::Jgt
            | Bytecode::Jlt
            | Bytecode::Jle
            | Bytecode::Jge => {
                let target = self.read_register(a)?;
                if self.should_jump(instr) {
                    self.pc = target as usize;
                } else {
                    // The sets-PC bit is on for the whole family, so fall through by hand
                    self.pc += 2;
                }
            }
            Bytecode::Add
            | Bytecode::Sub
            | Bytecode::Mul
            | Bytecode::Div
            | Bytecode::Mod
            | Bytecode::Cmp
            | Bytecode::And
            | Bytecode::Or
            | Bytecode::Xor
            | Bytecode::Shl
            | Bytecode::Shr
            | Bytecode::Inc
            | Bytecode::Dec
            | Bytecode::Not => self.alu(instr, a, b)?,
        }

        Ok(())
    }

    fn alu(&mut self, instr: Bytecode, reg_a: u8, reg_b: u8) -> Result<(), ExecutionError> {
        let op = AluOp::try_from(instr)?;
        let a = self.read_register(reg_a)?;
        let b = if op.is_unary() {
            0
        } else {
            self.read_register(reg_b)?
        };

        match alu::evaluate(op, a, b)? {
            AluResult::Value(value) => self.write_register(reg_a, value)?,
            // Only the most recent comparison is visible in FL
            AluResult::Flags(flags) => self.flags = (self.flags & !FLAG_MASK) | flags,
        }

        Ok(())
    }

    fn should_jump(&self, instr: Bytecode) -> bool {
        let equal = self.flags & FLAG_EQUAL != 0;
        let greater = self.flags & FLAG_GREATER != 0;
        let less = self.flags & FLAG_LESS != 0;

        match instr {
            Bytecode::Jeq => equal,
            Bytecode::Jne => !equal,
            Bytecode::Jgt => greater,
            Bytecode::Jlt => less,
            Bytecode::Jle => less || equal,
            Bytecode::Jge => greater || equal,
            _ => false,
        }
    }

    fn read_register(&self, reg: u8) -> Result<u8, ExecutionError> {
        self.registers
            .get(reg as usize)
            .copied()
            .ok_or(ExecutionError::InvalidRegister(reg))
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), ExecutionError> {
        let slot = self
            .registers
            .get_mut(reg as usize)
            .ok_or(ExecutionError::InvalidRegister(reg))?;
        *slot = value;
        Ok(())
    }

    fn read_memory(&self, address: usize) -> Result<u8, ExecutionError> {
        self.memory
            .get(address)
            .copied()
            .ok_or(ExecutionError::InvalidMemoryLocation(address))
    }

    fn write_memory(&mut self, address: usize, value: u8) -> Result<(), ExecutionError> {
        let cell = self
            .memory
            .get_mut(address)
            .ok_or(ExecutionError::InvalidMemoryLocation(address))?;
        *cell = value;
        Ok(())
    }

    fn push_stack(&mut self, value: u8) -> Result<(), ExecutionError> {
        let sp = self.registers[SP]
            .checked_sub(1)
            .ok_or(ExecutionError::StackOverflow)?;
        self.registers[SP] = sp;
        self.write_memory(sp as usize, value)
    }

    fn pop_stack(&mut self) -> Result<u8, ExecutionError> {
        let sp = self.registers[SP];
        let value = self.read_memory(sp as usize)?;
        self.registers[SP] = sp.checked_add(1).ok_or(ExecutionError::StackUnderflow)?;
        Ok(value)
    }
}

fn describe(instr: Bytecode, operands: &[u8]) -> String {
    get_pattern(instr)
        .map(|pattern| pattern.render(operands))
        .unwrap_or_else(|| instr.to_string())
}

use std::{io::Write, path::PathBuf};

use ls8_common::{
    BufferHostIO, ExecutionError, NativeCpu, Program, ProgramError, RunMode, STACK_START,
};
use tempfile::NamedTempFile;

fn program_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../programs")
        .join(name)
}

fn run(program: &Program) -> NativeCpu<BufferHostIO> {
    let mut cpu = NativeCpu::new(BufferHostIO::default());
    cpu.load_program(program).unwrap();
    cpu.execute(RunMode::Run).unwrap();
    cpu
}

fn run_file(name: &str) -> String {
    let program = Program::load(program_path(name)).unwrap();
    run(&program).host_io().text().into_owned()
}

fn temp_program(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_print8() {
    assert_eq!(run_file("print8.ls8"), "8\n");
}

#[test]
fn test_mult() {
    assert_eq!(run_file("mult.ls8"), "54\n");
}

#[test]
fn test_stack() {
    assert_eq!(run_file("stack.ls8"), "42\n");
}

#[test]
fn test_call() {
    assert_eq!(run_file("call.ls8"), "20\n30\n36\n60\n");
}

#[test]
fn test_sctest() {
    assert_eq!(run_file("sctest.ls8"), "1\n4\n5\n");
}

#[test]
fn test_call_restores_stack_pointer() {
    let program = Program::load(program_path("call.ls8")).unwrap();
    let cpu = run(&program);
    assert_eq!(cpu.stack_pointer(), STACK_START);
    assert!(cpu.get_halted());
}

#[test]
fn test_inline_literal_file() {
    let file = temp_program("10000010\n00000000\n00001000\n01000111\n00000000\n00000001\n");
    let program = Program::load(file.path()).unwrap();
    assert_eq!(run(&program).host_io().text(), "8\n");
}

#[test]
fn test_malformed_literal_aborts_load() {
    let file = temp_program("102\n");
    let err = Program::load(file.path()).unwrap_err();
    assert!(matches!(err, ProgramError::InvalidLiteral { line: 1, .. }));
    assert!(err.to_string().contains("102"));
    assert_ne!(err.exit_code(), 0);
}

#[test]
fn test_missing_file_names_path() {
    let err = Program::load(program_path("no-such-program.ls8")).unwrap_err();
    assert!(err.to_string().contains("no-such-program.ls8"));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn test_error_kinds_have_distinct_exit_codes() {
    let literal = ProgramError::InvalidLiteral {
        line: 1,
        token: "2".to_string(),
    }
    .exit_code();
    let missing = Program::load(program_path("missing.ls8"))
        .unwrap_err()
        .exit_code();
    let opcode = ExecutionError::InvalidOpcode(0xFF, 0).exit_code();
    let fault = ExecutionError::DivisionByZero.exit_code();

    let mut codes = vec![literal, missing, opcode, fault];
    codes.sort_unstable();
    codes.dedup();
    assert_eq!(codes.len(), 4);
    assert!(!codes.contains(&0));
}

#[test]
fn test_invalid_opcode_reports_pc() {
    let file = temp_program("00000000 # NOP\n11111111\n");
    let program = Program::load(file.path()).unwrap();
    let mut cpu = NativeCpu::new(BufferHostIO::default());
    cpu.load_program(&program).unwrap();

    let err = cpu.execute(RunMode::Run).unwrap_err();
    assert!(matches!(err, ExecutionError::InvalidOpcode(0xFF, 1)));
    assert!(err.to_string().contains("@0x01"));
}

use std::{
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Output},
};

use tempfile::NamedTempFile;

fn ls8(path: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ls8"))
        .arg(path)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn program_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("programs")
        .join(name)
}

fn temp_program(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_print8_exits_cleanly() {
    let output = ls8(&program_path("print8.ls8"));
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "8\n");
}

#[test]
fn test_call_program_output() {
    let output = ls8(&program_path("call.ls8"));
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "20\n30\n36\n60\n");
}

#[test]
fn test_malformed_literal_exit_code() {
    let file = temp_program("102\n");
    let output = ls8(file.path());
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(stderr(&output).contains("102"));
}

#[test]
fn test_missing_file_exit_code() {
    let output = ls8(&program_path("no-such-program.ls8"));
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("no-such-program.ls8"));
}

#[test]
fn test_empty_program_exit_code() {
    let file = temp_program("# only a comment\n\n");
    let output = ls8(file.path());
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn test_invalid_opcode_exit_code() {
    let file = temp_program("11111111\n");
    let output = ls8(file.path());
    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).contains("Invalid Opcode"));
}

#[test]
fn test_execution_fault_exit_code() {
    let file = temp_program(
        "\
10000010 # LDI R0,10
00000000
00001010
10100100 # MOD R0,R1
00000000
00000001
00000001 # HLT
",
    );
    let output = ls8(file.path());
    assert_eq!(output.status.code(), Some(5));
    assert!(stderr(&output).contains("Division by zero"));
}

#[test]
fn test_missing_argument_is_usage_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_ls8")).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

use std::{
    fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use log::debug;
use thiserror::Error;

use crate::MEMORY_SIZE;

#[derive(Error, Debug)]
pub enum ProgramError {
    #[error("Couldn't open {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid number: {token} (line {line})")]
    InvalidLiteral { line: usize, token: String },
    #[error("Program was empty!")]
    Empty,
    #[error("Program is {size} bytes long, memory only holds {} bytes", MEMORY_SIZE)]
    TooLarge { size: usize },
}

impl ProgramError {
    pub fn exit_code(&self) -> u8 {
        match self {
            ProgramError::InvalidLiteral { .. } => 1,
            ProgramError::Io { .. } => 2,
            ProgramError::Empty | ProgramError::TooLarge { .. } => 3,
        }
    }
}

/// A program image, loaded into memory starting at address 0.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Program {
    pub data: Vec<u8>,
}

impl Program {
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn load<P: AsRef<Path>>(p: P) -> Result<Self, ProgramError> {
        let path = p.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ProgramError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let program = Self::parse(&source)?;
        debug!("loaded {} bytes from {}", program.len(), path.display());
        Ok(program)
    }

    /// Parse the text format: one binary literal per line, only the first
    /// whitespace separated token counts. Blank lines and lines starting
    /// with `#` are skipped.
    pub fn parse(source: &str) -> Result<Self, ProgramError> {
        let mut data = Vec::new();

        for (index, line) in source.lines().enumerate() {
            let Some(token) = line.split_whitespace().next() else {
                continue;
            };
            if token.starts_with('#') {
                continue;
            }
            data.push(parse_literal(token).ok_or_else(|| ProgramError::InvalidLiteral {
                line: index + 1,
                token: token.to_string(),
            })?);
        }

        if data.is_empty() {
            return Err(ProgramError::Empty);
        }
        if data.len() > MEMORY_SIZE {
            return Err(ProgramError::TooLarge { size: data.len() });
        }

        Ok(Self::new(data))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn parse_literal(token: &str) -> Option<u8> {
    if token.is_empty() || token.len() > 8 || !token.bytes().all(|b| b == b'0' || b == b'1') {
        return None;
    }
    u8::from_str_radix(token, 2).ok()
}

impl FromStr for Program {
    type Err = ProgramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_print8() {
        let source = "\
# print8.ls8
10000010 # LDI R0,8
00000000
00001000
01000111 # PRN R0
00000000
00000001 # HLT
";
        let program = Program::parse(source).unwrap();
        assert_eq!(program.data, vec![0x82, 0x00, 0x08, 0x47, 0x00, 0x01]);
    }

    #[test]
    fn test_blank_lines_and_indentation() {
        let program: Program = "\n   \n  00000001\n\t# comment\n".parse().unwrap();
        assert_eq!(program.data, vec![1]);
    }

    #[test]
    fn test_short_literals() {
        let program = Program::parse("1\n101\n").unwrap();
        assert_eq!(program.data, vec![1, 5]);
    }

    #[test]
    fn test_invalid_literal_names_token() {
        let err = Program::parse("00000001\n102\n").unwrap_err();
        match &err {
            ProgramError::InvalidLiteral { line, token } => {
                assert_eq!(*line, 2);
                assert_eq!(token, "102");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("102"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_literal_too_wide() {
        let err = Program::parse("100000000\n").unwrap_err();
        assert!(matches!(err, ProgramError::InvalidLiteral { line: 1, .. }));
    }

    #[test]
    fn test_sign_prefix_rejected() {
        assert!(Program::parse("+1\n").is_err());
    }

    #[test]
    fn test_empty_program() {
        let err = Program::parse("# nothing here\n\n").unwrap_err();
        assert!(matches!(err, ProgramError::Empty));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_program_too_large() {
        let source = "00000000\n".repeat(MEMORY_SIZE + 1);
        let err = Program::parse(&source).unwrap_err();
        assert!(matches!(err, ProgramError::TooLarge { size } if size == MEMORY_SIZE + 1));
    }

    #[test]
    fn test_missing_file() {
        let err = Program::load("/definitely/not/here.ls8").unwrap_err();
        assert!(matches!(err, ProgramError::Io { .. }));
        assert_eq!(err.exit_code(), 2);
    }
}

use crate::constant::NAME;
use colorize::AnsiColor;
use std::{fmt, iter::repeat_n};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileErrorCode {
    // instructions
    InvalidInstruction,
    InvalidTokenDirectMemory,
    InvalidTokenNumber,
    InvalidTokenRegister,
    UnexpectedToken,
    MissingToken,
    // libraries
    MissingLibraryIdentifier,
    UnknownLibraryIdentifier,
    // labels
    IllegalLabelRedefinition,
    UndefinedLabel,
    IllegalLabel,
    // constants
    IllegalConstantRedefinition,
    UndefinedConstant,
    IllegalNamingScheme,
    IllegalSizeScheme,
    IllegalStringSizeScheme,
    // operand checkers
    IllegalOperands,
    // global mode
    InvalidGlobalSymbol,
    MissingOptionValue,
}

impl CompileErrorCode {
    /// Stable identifier, part of the diagnostics contract.
    pub fn id(self) -> &'static str {
        match self {
            Self::InvalidInstruction => "C001",
            Self::InvalidTokenDirectMemory => "C002",
            Self::InvalidTokenNumber => "C003",
            Self::InvalidTokenRegister => "C004",
            Self::UnexpectedToken => "C005",
            Self::MissingToken => "C009",
            Self::MissingLibraryIdentifier => "C010",
            Self::UnknownLibraryIdentifier => "C011",
            Self::IllegalLabelRedefinition => "C020",
            Self::UndefinedLabel => "C021",
            Self::IllegalLabel => "C022",
            Self::IllegalConstantRedefinition => "C030",
            Self::UndefinedConstant => "C031",
            Self::IllegalNamingScheme => "C032",
            Self::IllegalSizeScheme => "C033",
            Self::IllegalStringSizeScheme => "C034",
            Self::IllegalOperands => "C040",
            Self::InvalidGlobalSymbol => "C090",
            Self::MissingOptionValue => "C091",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::InvalidInstruction => "invalid instruction name",
            Self::InvalidTokenDirectMemory => {
                "invalid token for direct memory access, expected [<number>]"
            }
            Self::InvalidTokenNumber => "invalid token, expected <number>",
            Self::InvalidTokenRegister => "invalid token, expected <register>",
            Self::UnexpectedToken => "unexpected token",
            Self::MissingToken => "missing token",
            Self::MissingLibraryIdentifier => {
                "missing library identifier after #include statement"
            }
            Self::UnknownLibraryIdentifier => "unknown library identifier",
            Self::IllegalLabelRedefinition => "illegal label redefinition",
            Self::UndefinedLabel => "missing definition for label",
            Self::IllegalLabel => "illegal label",
            Self::IllegalConstantRedefinition => "illegal redefinition of constant",
            Self::UndefinedConstant => "missing definition for constant",
            Self::IllegalNamingScheme => "invalid naming scheme, expected [A-z][A-z0-9_-]*",
            Self::IllegalSizeScheme => "invalid size scheme, expected DB DW DD",
            Self::IllegalStringSizeScheme => "strings require size scheme DB",
            Self::IllegalOperands => "invalid operands",
            Self::InvalidGlobalSymbol => "invalid global symbol",
            Self::MissingOptionValue => "missing value of option definition",
        }
    }
}

impl fmt::Display for CompileErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.id(), self.message())
    }
}

/// Character offsets within the offending line. `to == None` means end of line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Range {
    pub from: usize,
    pub to: Option<usize>,
}

impl Range {
    pub fn from(from: usize) -> Self {
        Self { from, to: None }
    }
    pub fn span(from: usize, to: usize) -> Self {
        Self { from, to: Some(to) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub code: CompileErrorCode,
    pub detail: Option<String>,
    pub line: usize,
    pub range: Range,
}

impl CompileError {
    pub fn new(code: CompileErrorCode, line: usize, range: Range) -> Self {
        Self {
            code,
            detail: None,
            line,
            range,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Renders the offending source line with the error range underlined.
    pub fn traceback(&self, source: &str) -> String {
        let line = source
            .split('\n')
            .nth(self.line)
            .unwrap_or_default()
            .trim_end_matches('\r');
        let width = line.chars().count();
        let from = self.range.from.min(width);
        let to = self.range.to.unwrap_or(width).clamp(from, width);
        let highlight = {
            let mut buf: String = repeat_n(' ', from).collect();
            buf.push_str("^".red().as_str());
            let squiggle: String = repeat_n('~', (to - from).saturating_sub(1)).collect();
            buf.push_str(&squiggle.yellow());
            buf
        };
        format!("at line {}:{}:\n{line}\n{highlight}", self.line + 1, from + 1)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let detail = match &self.detail {
            Some(detail) => format!(" :: {detail}"),
            None => String::new(),
        };
        write!(
            f,
            "{NAME}: {} {} (line {}){detail}",
            "error:".red(),
            self.code.to_string().yellow(),
            self.line + 1,
        )
    }
}

impl std::error::Error for CompileError {}

/// Failures raised while loading or executing a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("memory to memory operands are not supported")]
    Mem2Mem,
    #[error("immediate operand is not writable")]
    ImmediateNotWritable,
    #[error("unrecognized register `{0}`")]
    UnrecognizedRegister(String),
    #[error("stack underflow (esp {esp:#x} is not below ebp {ebp:#x})")]
    StackUnderflow { esp: u32, ebp: u32 },
    #[error("`{mnemonic}` expects {expected} operand(s), got {got}")]
    OperandCount {
        mnemonic: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("`{mnemonic}`: {reason}")]
    InvalidOperand {
        mnemonic: &'static str,
        reason: String,
    },
    #[error("operand `{0}` has no address")]
    NotAddressable(String),
    #[error("operand `{0}` has no scalar value")]
    NoValue(String),
    #[error("symbol `{0}` was never resolved by the loader")]
    UnresolvedSymbol(String),
    #[error("memory access of {width} byte(s) at {address:#x} is out of range")]
    AddressOutOfRange { address: u32, width: usize },
    #[error("unknown opcode `{0}`")]
    UnknownOpcode(String),
    #[error("bit index {index} is outside of a {bits} bit operand")]
    BitIndexOutOfRange { index: u32, bits: u32 },
    #[error("division by zero")]
    DivideByZero,
    #[error("program needs {needed:#x} bytes below entry {entry:#x}")]
    ProgramTooLarge { needed: u64, entry: u32 },
    #[error("instruction arena is full")]
    ArenaFull,
}

//! Static (assembler) errors. Every error carries the line it was raised on; the
//! `hoil2coil` binary adds the file name on top of that at the `main()` boundary.

use util::ParseEnumError;

use crate::labels::LabelError;
use crate::symbol::SymbolError;
use crate::tokenizer::TokenizeError;

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ErrorKind {
    Tokenize(TokenizeError),
    Symbol(SymbolError),
    Label(LabelError),
    ParseEnum(ParseEnumError),
    /// A category's token count didn't match any of its known operand shapes.
    WrongTokenCount { expected: &'static str, got: usize },
    UnknownCategory(String),
    UnknownOperation { category: &'static str, op: String },
    UnknownCondition(String),
    InvalidInteger(String),
    /// A `SYSC` line supplied more than the four argument lanes a syscall record
    /// can carry.
    TooManySyscallArgs(usize),
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ErrorKind::Tokenize(err) => write!(f, "{}", err),
            ErrorKind::Symbol(err) => write!(f, "{}", err),
            ErrorKind::Label(err) => write!(f, "{}", err),
            ErrorKind::ParseEnum(err) => write!(f, "{}", err),
            ErrorKind::WrongTokenCount { expected, got } => {
                write!(f, "expected {}, got {} token(s)", expected, got)
            }
            ErrorKind::UnknownCategory(cat) => write!(f, "unknown category \"{}\"", cat),
            ErrorKind::UnknownOperation { category, op } => {
                write!(f, "unknown {} operation \"{}\"", category, op)
            }
            ErrorKind::UnknownCondition(cond) => write!(f, "unknown condition \"{}\"", cond),
            ErrorKind::InvalidInteger(tok) => write!(f, "\"{}\" is not a valid integer", tok),
            ErrorKind::TooManySyscallArgs(count) => {
                write!(f, "syscall has {} argument(s), at most 4 are supported", count)
            }
        }
    }
}

impl From<TokenizeError> for ErrorKind {
    fn from(err: TokenizeError) -> ErrorKind {
        ErrorKind::Tokenize(err)
    }
}

impl From<SymbolError> for ErrorKind {
    fn from(err: SymbolError) -> ErrorKind {
        ErrorKind::Symbol(err)
    }
}

impl From<LabelError> for ErrorKind {
    fn from(err: LabelError) -> ErrorKind {
        ErrorKind::Label(err)
    }
}

impl From<ParseEnumError> for ErrorKind {
    fn from(err: ParseEnumError) -> ErrorKind {
        ErrorKind::ParseEnum(err)
    }
}

/// An [`ErrorKind`] tagged with the 1-based source line it was raised on.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct AssembleError {
    pub line: usize,
    pub kind: ErrorKind,
}

impl std::fmt::Display for AssembleError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.kind)
    }
}

impl std::error::Error for AssembleError {}

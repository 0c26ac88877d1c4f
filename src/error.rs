//////////////////////////////////////////////////////////////
/// error.rs
///
/// Every recoverable fault the interpreter can raise.
///
/// Word behaviors return Result<(), ForthError>. The outer interpreter catches
/// the error, unwinds any half-built definition and reports the Display text
/// through the output sink. Only DuplicateWord is fatal, and only at startup.
///
use crate::kernel::Cell;
use crate::stack::StackError;

#[derive(Debug, thiserror::Error)]
pub enum ForthError {
    #[error("Data stack underflow")]
    DataStackUnderflow,
    #[error("Data stack overflow")]
    DataStackOverflow,
    #[error("Return stack underflow")]
    ReturnStackUnderflow,
    #[error("Return stack overflow")]
    ReturnStackOverflow,
    #[error("{0} ?")]
    UnknownWord(String),
    #[error("Unbalanced control structure")]
    UnbalancedControl,
    #[error("Invalid execution token {0:#x}")]
    InvalidXt(Cell),
    #[error("Invalid memory address {0:#x}")]
    InvalidAddress(i64),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Dictionary full")]
    DictionaryFull,
    #[error("Missing name")]
    MissingName,
    #[error("{0} is compile-only")]
    CompileOnly(String),
    #[error("Call depth exceeded")]
    CallDepthExceeded,
    #[error("Line too long ({0} bytes)")]
    LineTooLong(usize),
    #[error("Invalid BASE {0}")]
    InvalidBase(Cell),
    #[error("File buffers exhausted")]
    FileBuffersExhausted,
    #[error("Invalid file id {0:#x}")]
    InvalidFileId(Cell),
    #[error("Invalid port {0}")]
    InvalidPort(Cell),
    #[error("Timer id {0} out of range")]
    InvalidTimerId(Cell),
    #[error("Invalid queue mode {0}")]
    InvalidQueueMode(Cell),
    #[error("No snapshot file configured")]
    NoSnapshotFile,
    #[error("Snapshot layout mismatch: expected {expected:#010x}, found {found:#010x}")]
    SnapshotMismatch { expected: u32, found: u32 },
    #[error("Duplicate built-in word {0}")]
    DuplicateWord(String),
    #[error("Built-in token space exhausted")]
    TokenSpaceExhausted,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ForthError {
    /// Stack bounds faults reset the stacks when the outer interpreter recovers.
    pub fn is_stack_fault(&self) -> bool {
        matches!(
            self,
            ForthError::DataStackUnderflow
                | ForthError::DataStackOverflow
                | ForthError::ReturnStackUnderflow
                | ForthError::ReturnStackOverflow
        )
    }
}

/// Stack faults map onto the data stack by default; the kernel remaps them for the return stack.
impl From<StackError> for ForthError {
    fn from(err: StackError) -> Self {
        match err {
            StackError::Underflow => ForthError::DataStackUnderflow,
            StackError::Overflow => ForthError::DataStackOverflow,
        }
    }
}

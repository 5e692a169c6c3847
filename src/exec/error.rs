use thiserror::Error;

use crate::host::value::Ty;
use crate::host::HostError;

/// Runtime failure while executing a command.
#[derive(Debug, Clone, Error)]
pub enum ExecError {
    #[error("null reference")]
    NullDeref,
    #[error("cannot cast value to `{to}`")]
    InvalidCast { to: Ty },
    #[error("division by zero")]
    DivisionByZero,
    #[error("index {index} out of range for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("array length {declared} does not match {got} initializer elements")]
    ArrayLengthMismatch { declared: i64, got: usize },
    #[error("negative array length {len}")]
    NegativeArraySize { len: i64 },
    #[error("loop exceeded {limit} iterations")]
    LoopBudgetExceeded { limit: u64 },
    #[error("host error: {0}")]
    Host(#[from] HostError),
}

use thiserror::Error;

/// Errors surfaced by the oracle and its model persistence.
///
/// The engine never silently corrects an invariant violation: every
/// rejected operation leaves the state untouched and reports one of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    /// A vector had the wrong length for the configured resource count
    #[error("Invalid dimensions for {what}: expected {expected}, got {actual}")]
    InvalidDimensions {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A process id outside `[0, num_processes)`
    #[error("Process {process} out of range (num_processes = {num_processes})")]
    ProcessOutOfRange { process: usize, num_processes: usize },

    /// Applying the request would break a non-negativity or claim invariant
    #[error("Invalid request for process {process} on resource {resource}: {reason}")]
    InvalidRequest {
        process: usize,
        resource: usize,
        reason: String,
    },

    /// Wait-Die was asked about a process with no timestamp
    #[error("Missing timestamp for process {0}")]
    MissingTimestamp(usize),

    /// Model save/load could not complete
    #[error("Model I/O failure on {path}: {message}")]
    ModelIo { path: String, message: String },
}

impl OracleError {
    /// True for both flavours of shape error (bad vector length, bad process id).
    pub fn is_dimension_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidDimensions { .. } | Self::ProcessOutOfRange { .. }
        )
    }

    pub(crate) fn model_io(path: impl AsRef<std::path::Path>, message: impl ToString) -> Self {
        Self::ModelIo {
            path: path.as_ref().display().to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, OracleError>;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    /// An option value or a combination of options the runner cannot assemble.
    #[error("unsupported configuration: {option}={value}")]
    Unsupported { option: &'static str, value: String },

    #[error("invalid hidden spec {spec:?}: {reason}")]
    HiddenSpec { spec: String, reason: String },

    #[error("log {0} already exists (pass --debug to overwrite)")]
    LogExists(PathBuf),

    /// A parallel sampler worker panicked or its environment is poisoned.
    #[error("sampler worker {worker} failed: {reason}")]
    SamplerWorker { worker: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Recorder(#[from] burn::record::RecorderError),
}

impl RunnerError {
    pub fn unsupported(option: &'static str, value: impl ToString) -> Self {
        RunnerError::Unsupported {
            option,
            value: value.to_string(),
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, RunnerError::Unsupported { .. })
    }
}

pub type Result<T> = std::result::Result<T, RunnerError>;

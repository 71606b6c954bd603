use thiserror::Error;

/// Errors raised by the benchmark harness.
///
/// Almost nothing is recovered locally; callers bubble these up to the CLI
/// entry point, which logs and exits nonzero.
#[derive(Debug, Error)]
pub enum BenchmarkError {
    #[error("Unsupported GPU: Neither AMD nor NVIDIA")]
    UnsupportedGpu,

    #[error("Unsupported host OS: no apt, yum or zypper found")]
    UnsupportedHostOs,

    #[error("Subprocess '{command}' failed with exit code {code}")]
    CommandFailed { command: String, code: i32 },

    #[error("Subprocess '{command}' timed out after {seconds} seconds")]
    CommandTimeout { command: String, seconds: u64 },

    #[error("Container with name {0} already exists. Stop (docker stop --time=1 SHA) and remove it (docker rm -f SHA) to proceed")]
    ContainerExists(String),

    #[error("Failed to probe environment: {0}")]
    Probe(String),

    #[error("{0}")]
    Schema(String),

    #[error("Missing required input: {0}")]
    MissingInput(&'static str),

    #[error("{0}")]
    LogParse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Regex(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, BenchmarkError>;

use thiserror::Error;

/// Run-level failures: configuration, startup of the diff run.
#[derive(Error, Debug)]
pub enum TreeDiffError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, TreeDiffError>;

/// Failures while classifying a single path.
///
/// These never leave the worker that produced them; the classifier turns
/// every one of them into `DiffStatus::Error`.
#[derive(Error, Debug)]
pub enum CompareError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File shrank during comparison: expected {expected} bytes, read {actual}")]
    Truncated { expected: u64, actual: u64 },

    #[error("Comparison panicked: {0}")]
    Panicked(String),
}

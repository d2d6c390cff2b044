//! Error types for job resolution, engine calls and the container lifecycle

use std::path::PathBuf;

/// Errors raised while resolving the reads and index directories.
///
/// These are reported before any container exists, so a job that fails with
/// one of them has no side effects.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("{0} directory is not set")]
    Unset(&'static str),

    #[error("Directory not found: {0}")]
    MissingDirectory(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Empty input: no files in {0}")]
    EmptyInput(PathBuf),

    #[error("Unbalanced pairs: {mate1} mate-1 files but {mate2} mate-2 files")]
    UnbalancedPairs { mate1: usize, mate2: usize },

    #[error("No recognizable read files (R1/R2 or .fq) in {0}")]
    NoRecognizedReads(PathBuf),

    #[error("No .bt2 index files in {0}")]
    NoIndex(PathBuf),

    #[error("Host path contains ':' and cannot be bound into a container: {0}")]
    UnbindablePath(PathBuf),

    #[error("Multiple index basenames found: {}", .0.join(", "))]
    AmbiguousIndex(Vec<String>),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors reported by a [`crate::ContainerEngine`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Container engine API error: {0}")]
    Api(#[from] bollard::errors::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Image pull error: {0}")]
    Pull(String),

    #[error("Container engine unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while a container is pulled, created, run or removed.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Failed to pull image {image}: {source}")]
    PullFailed {
        image: String,
        #[source]
        source: EngineError,
    },

    #[error("Container creation warning: {}", .0.join("; "))]
    CreationWarning(Vec<String>),

    #[error("Failed to start container {id}: {source}")]
    StartFailed {
        id: String,
        #[source]
        source: EngineError,
    },

    #[error("Container exited with code {0}")]
    NonZeroExit(i64),

    #[error("Container {0} did not finish within the configured wait")]
    TimedOut(String),

    #[error("Job cancelled while container {0} was running")]
    Cancelled(String),

    #[error("Job cancelled before a container was created")]
    CancelledBeforeStart,

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Terminal failure reason of a job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl JobError {
    /// True when the job failed before any container was created.
    pub fn is_input(&self) -> bool {
        matches!(self, JobError::Input(_))
    }
}

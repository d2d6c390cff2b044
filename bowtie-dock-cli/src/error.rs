//! Error handling for the bowtie-dock CLI

use bowtie_dock_core::{EngineError, InputError, JobError, LifecycleError};
use thiserror::Error;

/// Main error type for bowtie-dock CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Container engine error: {message}")]
    Engine { message: String },

    #[error(transparent)]
    Job(#[from] JobError),
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn engine<S: Into<String>>(message: S) -> Self {
        Self::Engine { message: message.into() }
    }
}

impl From<InputError> for CliError {
    fn from(err: InputError) -> Self {
        Self::Job(err.into())
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        Self::engine(err.to_string())
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Provide helpful error messages and suggestions
pub fn format_error_with_suggestions(error: &CliError) -> String {
    let mut message = error.to_string();

    match error {
        CliError::Engine { .. } | CliError::Job(JobError::Lifecycle(LifecycleError::Engine(_))) => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check that the Docker daemon is running\n\
                 • Check that your user may access the Docker socket\n\
                 • Set [engine] socket in bowtie-dock.toml if the daemon is not on the default socket"
            );
        }

        CliError::Job(JobError::Input(InputError::UnbalancedPairs { .. })) => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Every mate-1 file (R1, _1.fq) needs a matching mate-2 file (R2, _2.fq)\n\
                 • Move unrelated FASTQ files out of the reads directory"
            );
        }

        CliError::Job(JobError::Input(InputError::NoRecognizedReads(_))) => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Name paired files with an R1/R2 token, e.g. sample_R1.fq.gz\n\
                 • Single-end reads must end in .fq"
            );
        }

        CliError::Job(JobError::Input(InputError::NoIndex(_) | InputError::AmbiguousIndex(_))) => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • The index directory must hold the .bt2 files of exactly one index\n\
                 • Build an index with bowtie2-build <reference.fa> <basename>"
            );
        }

        CliError::Job(JobError::Lifecycle(LifecycleError::PullFailed { .. })) => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check the image name and tag under [image] in bowtie-dock.toml\n\
                 • Check your network connection and registry credentials"
            );
        }

        CliError::Job(JobError::Lifecycle(LifecycleError::NonZeroExit(_))) => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Rerun with -v to see the aligner command\n\
                 • Check that the index matches the reference of your reads"
            );
        }

        CliError::Config { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check your bowtie-dock.toml configuration file\n\
                 • Use 'bowtie-dock config --example' to generate a sample configuration"
            );
        }

        _ => {}
    }

    message
}

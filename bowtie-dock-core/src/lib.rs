//! bowtie-dock Core Library
//!
//! Read/index discovery, bowtie2 command building, container lifecycle and the
//! job orchestrator that ties them together.

pub mod error;
pub mod inputs;
pub mod command;
pub mod engine;
pub mod lifecycle;
pub mod orchestrator;

// Re-export commonly used types and functions
pub use error::{InputError, LifecycleError, EngineError, JobError};
pub use inputs::{resolve, resolve_reads, resolve_index, ReadSet, ReadPair, IndexReference};
pub use command::{build, CommandBuilder, ContainerLayout, JobCommand, VolumeBinding};
pub use engine::{ContainerEngine, ContainerCreated, ContainerStatus, ImageRef, PullProgress};
pub use engine::docker::{DockerEngine, DockerEngineConfig};
pub use engine::fake::FakeEngine;
pub use lifecycle::{LifecycleManager, ContainerHandle, ContainerExit, ImageStatus, PollSettings};
pub use orchestrator::{JobOrchestrator, JobInputs, JobResult, JobState, JobEvent, JobHandle, EventSink};

/// Version information for the bowtie-dock core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

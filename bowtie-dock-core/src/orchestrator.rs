//! Job orchestration
//!
//! A job walks `Idle -> ResolvingInputs -> (EnsuringImage)? -> Running -> Cleaning -> Done`.
//! Input failures end the job before any container exists. Once a container
//! has been created it is always removed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::command::CommandBuilder;
use crate::engine::ContainerEngine;
use crate::error::{InputError, JobError, LifecycleError};
use crate::inputs::{host_dir, resolve};
use crate::lifecycle::LifecycleManager;

/// Host directories of a job. `None` means the directory has not been chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobInputs {
    pub reads_dir: Option<PathBuf>,
    pub index_dir: Option<PathBuf>,
}

impl JobInputs {
    pub fn new(reads_dir: impl Into<PathBuf>, index_dir: impl Into<PathBuf>) -> Self {
        Self {
            reads_dir: Some(reads_dir.into()),
            index_dir: Some(index_dir.into()),
        }
    }

    /// Both directories are set.
    pub fn is_ready(&self) -> bool {
        self.reads_dir.is_some() && self.index_dir.is_some()
    }

    fn require(&self) -> Result<(&Path, &Path), InputError> {
        let reads = self.reads_dir.as_deref().ok_or(InputError::Unset("reads"))?;
        let index = self.index_dir.as_deref().ok_or(InputError::Unset("index"))?;
        Ok((reads, index))
    }
}

/// Stage of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    ResolvingInputs,
    EnsuringImage,
    Running,
    Cleaning,
    Done,
}

/// Progress notification emitted while a job runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    State(JobState),
    /// Image pull progress, 0-100
    PullProgress(u8),
    ContainerStarted(String),
}

/// Terminal outcome of a job
#[derive(Debug)]
pub enum JobResult {
    Succeeded {
        /// Host reads directory, forwarded to downstream consumers
        output_dir: PathBuf,
        /// Host path of the alignment output
        result_file: PathBuf,
        exit_code: Option<i64>,
    },
    Failed {
        reason: JobError,
    },
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        matches!(self, JobResult::Succeeded { .. })
    }

    pub fn output_dir(&self) -> Option<&Path> {
        match self {
            JobResult::Succeeded { output_dir, .. } => Some(output_dir),
            JobResult::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&JobError> {
        match self {
            JobResult::Failed { reason } => Some(reason),
            JobResult::Succeeded { .. } => None,
        }
    }
}

/// Non-blocking sender for [`JobEvent`]s. Events sent after the receiver is gone are dropped.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<JobEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards everything
    pub fn none() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: JobEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

/// A job running on a background task
pub struct JobHandle {
    events: mpsc::UnboundedReceiver<JobEvent>,
    cancel: CancellationToken,
    task: JoinHandle<JobResult>,
}

impl JobHandle {
    /// Next progress event; `None` once the job has finished and all events were read.
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    /// Request cancellation. A running container is removed before the job ends.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the terminal result.
    pub async fn wait(self) -> JobResult {
        match self.task.await {
            Ok(result) => result,
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }
}

/// Runs aligner jobs, one at a time per instance.
pub struct JobOrchestrator<E: ContainerEngine> {
    lifecycle: LifecycleManager<E>,
    builder: CommandBuilder,
    job_lock: Mutex<()>,
}

impl<E: ContainerEngine + 'static> JobOrchestrator<E> {
    pub fn new(lifecycle: LifecycleManager<E>, builder: CommandBuilder) -> Self {
        Self {
            lifecycle,
            builder,
            job_lock: Mutex::new(()),
        }
    }

    pub fn lifecycle(&self) -> &LifecycleManager<E> {
        &self.lifecycle
    }

    pub fn builder(&self) -> &CommandBuilder {
        &self.builder
    }

    /// Run a job on a background task.
    pub fn spawn(self: &Arc<Self>, inputs: JobInputs) -> JobHandle {
        let (events, rx) = EventSink::channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let this = Arc::clone(self);
        let task = tokio::spawn(async move { this.run_job(&inputs, &events, &token).await });
        JobHandle {
            events: rx,
            cancel,
            task,
        }
    }

    /// Run a job to completion. Every failure resolves to [`JobResult::Failed`].
    pub async fn run_job(&self, inputs: &JobInputs, events: &EventSink, cancel: &CancellationToken) -> JobResult {
        let _guard = self.job_lock.lock().await;
        events.emit(JobEvent::State(JobState::Idle));

        let result = match self.execute(inputs, events, cancel).await {
            Ok(result) => result,
            Err(reason) => {
                log::error!("Job failed: {}", reason);
                JobResult::Failed { reason }
            }
        };

        events.emit(JobEvent::State(JobState::Done));
        result
    }

    async fn execute(
        &self,
        inputs: &JobInputs,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<JobResult, JobError> {
        events.emit(JobEvent::State(JobState::ResolvingInputs));
        let (reads_dir, index_dir) = inputs.require()?;
        let (reads, index) = resolve(reads_dir, index_dir)?;
        let reads_dir = host_dir(reads_dir)?;
        let index_dir = host_dir(index_dir)?;
        let command = self.builder.build(&reads, &index);
        let bindings = self.builder.layout().bindings(&reads_dir, &index_dir);
        log::info!("Aligner command: {}", command);

        if !self.lifecycle.has_image().await? {
            events.emit(JobEvent::State(JobState::EnsuringImage));
            self.lifecycle
                .pull_image(&|percent: u8| events.emit(JobEvent::PullProgress(percent)))
                .await?;
        }

        if cancel.is_cancelled() {
            return Err(LifecycleError::CancelledBeforeStart.into());
        }

        events.emit(JobEvent::State(JobState::Running));
        let mut handle = self.lifecycle.run(&command, &bindings).await?;
        events.emit(JobEvent::ContainerStarted(handle.id().to_string()));
        let outcome = self.lifecycle.await_completion(&handle, cancel).await;

        events.emit(JobEvent::State(JobState::Cleaning));
        if let Err(e) = self.lifecycle.cleanup(&mut handle).await {
            log::warn!("Could not remove container {}: {}", handle.id(), e);
        }

        let exit = outcome?;
        if let Some(code) = exit.exit_code.filter(|code| *code != 0) {
            return Err(LifecycleError::NonZeroExit(code).into());
        }

        let result_file = index_dir.join(&self.builder.layout().output_name);
        log::info!("Alignment finished, output at {}", result_file.display());
        Ok(JobResult::Succeeded {
            output_dir: reads_dir,
            result_file,
            exit_code: exit.exit_code,
        })
    }
}

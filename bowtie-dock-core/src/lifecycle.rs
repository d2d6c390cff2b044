//! Container lifecycle: image check and pull, create, start, poll, remove
//!
//! The engine exposes no completion event, so [`LifecycleManager::await_completion`]
//! polls the container state at a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::command::{JobCommand, VolumeBinding};
use crate::engine::{ContainerEngine, ImageRef, ProgressFn};
use crate::error::{EngineError, LifecycleError};

/// How container completion is polled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// Give up after this long; `None` waits indefinitely
    pub max_wait: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_wait: None,
        }
    }
}

/// Outcome of [`LifecycleManager::ensure_image`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    AlreadyPresent,
    Pulled,
}

/// A created container, owned by the lifecycle manager until removed.
#[derive(Debug, PartialEq, Eq)]
pub struct ContainerHandle {
    id: String,
    removed: bool,
}

impl ContainerHandle {
    fn new(id: String) -> Self {
        Self { id, removed: false }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }
}

/// How a container finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerExit {
    pub exit_code: Option<i64>,
}

impl ContainerExit {
    /// True unless the engine reported a non-zero exit code.
    pub fn success(&self) -> bool {
        self.exit_code.map_or(true, |code| code == 0)
    }
}

/// Drives one image's containers through their lifecycle.
pub struct LifecycleManager<E: ContainerEngine> {
    engine: Arc<E>,
    image: ImageRef,
    poll: PollSettings,
}

impl<E: ContainerEngine> LifecycleManager<E> {
    pub fn new(engine: Arc<E>, image: ImageRef) -> Self {
        Self {
            engine,
            image,
            poll: PollSettings::default(),
        }
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn poll_settings(&self) -> PollSettings {
        self.poll
    }

    pub async fn has_image(&self) -> Result<bool, LifecycleError> {
        Ok(self.engine.has_image(&self.image).await?)
    }

    /// Pull the image, forwarding 0-100 progress. Returns once the pull has completed.
    pub async fn pull_image(&self, progress: ProgressFn<'_>) -> Result<(), LifecycleError> {
        log::info!("Pulling image {}", self.image);
        self.engine
            .pull_image(&self.image, progress)
            .await
            .map_err(|source| LifecycleError::PullFailed {
                image: self.image.to_string(),
                source,
            })?;
        log::info!("Finished pulling {}", self.image);
        Ok(())
    }

    /// Make sure the image is present locally, pulling it if needed.
    pub async fn ensure_image(&self, progress: ProgressFn<'_>) -> Result<ImageStatus, LifecycleError> {
        if self.has_image().await? {
            log::debug!("Image {} already present", self.image);
            return Ok(ImageStatus::AlreadyPresent);
        }
        self.pull_image(progress).await?;
        Ok(ImageStatus::Pulled)
    }

    /// Create a container running `command` and start it.
    ///
    /// A creation response carrying warnings counts as a failure: the
    /// container is removed without being started.
    pub async fn run(
        &self,
        command: &JobCommand,
        bindings: &[VolumeBinding],
    ) -> Result<ContainerHandle, LifecycleError> {
        log::debug!("Creating container from {}: {}", self.image, command);
        let created = self
            .engine
            .create_container(&self.image, bindings, &command.entrypoint())
            .await?;
        let mut handle = ContainerHandle::new(created.id);

        if !created.warnings.is_empty() {
            log::error!("Container {} created with warnings: {:?}", handle.id, created.warnings);
            self.discard(&mut handle).await;
            return Err(LifecycleError::CreationWarning(created.warnings));
        }

        if let Err(source) = self.engine.start_container(&handle.id).await {
            self.discard(&mut handle).await;
            return Err(LifecycleError::StartFailed {
                id: handle.id,
                source,
            });
        }

        log::info!("Started container {}", handle.id);
        Ok(handle)
    }

    /// Poll until the container stops running.
    pub async fn await_completion(
        &self,
        handle: &ContainerHandle,
        cancel: &CancellationToken,
    ) -> Result<ContainerExit, LifecycleError> {
        let started = Instant::now();
        loop {
            if cancel.is_cancelled() {
                return Err(LifecycleError::Cancelled(handle.id.clone()));
            }

            let status = self.engine.container_status(&handle.id).await?;
            if !status.running {
                log::info!(
                    "Container {} exited after {:.1}s (exit code {:?})",
                    handle.id,
                    started.elapsed().as_secs_f64(),
                    status.exit_code
                );
                return Ok(ContainerExit { exit_code: status.exit_code });
            }

            if let Some(max_wait) = self.poll.max_wait {
                if started.elapsed() >= max_wait {
                    return Err(LifecycleError::TimedOut(handle.id.clone()));
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(LifecycleError::Cancelled(handle.id.clone()));
                }
                _ = tokio::time::sleep(self.poll.interval) => {}
            }
        }
    }

    /// Remove the container. Safe to call again on a removed handle.
    pub async fn cleanup(&self, handle: &mut ContainerHandle) -> Result<(), LifecycleError> {
        if handle.removed {
            log::debug!("Container {} already removed", handle.id);
            return Ok(());
        }
        match self.engine.remove_container(&handle.id).await {
            Ok(()) => log::info!("Removed container {}", handle.id),
            Err(EngineError::NotFound(_)) => {
                log::debug!("Container {} was already gone", handle.id);
            }
            Err(e) => return Err(e.into()),
        }
        handle.removed = true;
        Ok(())
    }

    /// Best-effort removal after a failed run; the original error wins.
    async fn discard(&self, handle: &mut ContainerHandle) {
        if let Err(e) = self.cleanup(handle).await {
            log::warn!("Failed to remove container {}: {}", handle.id, e);
        }
    }
}

//! Container engine boundary
//!
//! The lifecycle manager talks to the container engine only through the
//! [`ContainerEngine`] trait. [`docker::DockerEngine`] is the production
//! implementation and [`fake::FakeEngine`] a scripted stand-in for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::command::VolumeBinding;
use crate::error::EngineError;

pub mod docker;
pub mod fake;

/// Default aligner image
pub const DEFAULT_IMAGE_NAME: &str = "biocontainers/bowtie2";
/// Default aligner image tag
pub const DEFAULT_IMAGE_TAG: &str = "latest";

/// Image name and tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(default = "default_image_name")]
    pub name: String,

    #[serde(default = "default_image_tag")]
    pub tag: String,
}

fn default_image_name() -> String { DEFAULT_IMAGE_NAME.to_string() }
fn default_image_tag() -> String { DEFAULT_IMAGE_TAG.to_string() }

impl ImageRef {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self { name: name.into(), tag: tag.into() }
    }
}

impl Default for ImageRef {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_NAME, DEFAULT_IMAGE_TAG)
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

/// Response to a container creation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerCreated {
    pub id: String,
    pub warnings: Vec<String>,
}

/// Run state of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerStatus {
    pub running: bool,
    /// Set by the engine once the container has exited
    pub exit_code: Option<i64>,
}

/// Callback receiving image pull progress as a percentage
pub type ProgressFn<'a> = &'a (dyn Fn(u8) + Send + Sync);

/// Operations the lifecycle manager needs from a container engine.
///
/// Implementations must be safe to share between tasks; an engine whose client
/// is not free-threaded serializes its own calls.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Whether `image` is present locally
    async fn has_image(&self, image: &ImageRef) -> Result<bool, EngineError>;

    /// Pull `image`, reporting 0-100 progress. Returns once the pull completes.
    async fn pull_image(&self, image: &ImageRef, progress: ProgressFn<'_>) -> Result<(), EngineError>;

    /// Create (but do not start) a container running `cmd`
    async fn create_container(
        &self,
        image: &ImageRef,
        bindings: &[VolumeBinding],
        cmd: &[String],
    ) -> Result<ContainerCreated, EngineError>;

    async fn start_container(&self, id: &str) -> Result<(), EngineError>;

    async fn container_status(&self, id: &str) -> Result<ContainerStatus, EngineError>;

    async fn is_running(&self, id: &str) -> Result<bool, EngineError> {
        Ok(self.container_status(id).await?.running)
    }

    /// Remove a container, killing it if still running.
    /// Unknown containers yield [`EngineError::NotFound`].
    async fn remove_container(&self, id: &str) -> Result<(), EngineError>;
}

/// Aggregates per-layer pull progress into one percentage.
///
/// Layers appear while the pull runs, so the raw ratio can drop; the reported
/// value never decreases.
#[derive(Debug, Default)]
pub struct PullProgress {
    layers: HashMap<String, (u64, u64)>,
    reported: u8,
}

impl PullProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record progress of one layer. Returns the new percentage if it grew.
    pub fn update(&mut self, layer: &str, current: u64, total: u64) -> Option<u8> {
        if total == 0 {
            return None;
        }
        self.layers.insert(layer.to_string(), (current.min(total), total));

        let (done, all) = self
            .layers
            .values()
            .fold((0u64, 0u64), |(d, a), (c, t)| (d + c, a + t));
        let percent = ((done * 100) / all).min(100) as u8;
        if percent > self.reported {
            self.reported = percent;
            Some(percent)
        } else {
            None
        }
    }

    /// Mark the pull as complete. Returns 100 unless already reported.
    pub fn finish(&mut self) -> Option<u8> {
        if self.reported < 100 {
            self.reported = 100;
            Some(100)
        } else {
            None
        }
    }

    pub fn percent(&self) -> u8 {
        self.reported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_ref_display() {
        assert_eq!(ImageRef::default().to_string(), "biocontainers/bowtie2:latest");
        assert_eq!(ImageRef::new("quay.io/bt2", "2.5").to_string(), "quay.io/bt2:2.5");
    }

    #[test]
    fn test_pull_progress_aggregates_layers() {
        let mut progress = PullProgress::new();
        assert_eq!(progress.update("a", 50, 100), Some(50));
        // A new layer lowers the raw ratio; the reported value holds
        assert_eq!(progress.update("b", 0, 100), None);
        assert_eq!(progress.percent(), 50);
        assert_eq!(progress.update("b", 100, 100), Some(75));
        assert_eq!(progress.update("a", 100, 100), Some(100));
        assert_eq!(progress.finish(), None);
    }

    #[test]
    fn test_pull_progress_ignores_unknown_totals() {
        let mut progress = PullProgress::new();
        assert_eq!(progress.update("a", 10, 0), None);
        assert_eq!(progress.finish(), Some(100));
    }
}

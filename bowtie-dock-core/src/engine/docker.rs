//! Docker engine backed by bollard
//!
//! Every API call goes through a connection-level lock, so one `DockerEngine`
//! can be shared by several orchestrators without interleaving requests.

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, RemoveContainerOptions,
    StartContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{ContainerCreated, ContainerEngine, ContainerStatus, ImageRef, ProgressFn, PullProgress};
use crate::command::VolumeBinding;
use crate::error::EngineError;

/// Connection settings for [`DockerEngine`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerEngineConfig {
    /// `unix:///var/run/docker.sock`, a bare socket path, or `http://host:port`.
    /// Local defaults (including `DOCKER_HOST`) are used when unset.
    #[serde(default)]
    pub socket: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 { 120 }

impl Default for DockerEngineConfig {
    fn default() -> Self {
        Self {
            socket: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// [`ContainerEngine`] talking to a Docker-compatible daemon
pub struct DockerEngine {
    client: Mutex<Docker>,
}

impl DockerEngine {
    /// Connect to the daemon described by `config`.
    pub fn connect(config: &DockerEngineConfig) -> Result<Self, EngineError> {
        let docker = match config.socket.as_deref() {
            Some(addr) if addr.starts_with("http://") || addr.starts_with("tcp://") => {
                Docker::connect_with_http(addr, config.timeout_secs, API_DEFAULT_VERSION)?
            }
            Some(addr) => Docker::connect_with_socket(addr, config.timeout_secs, API_DEFAULT_VERSION)?,
            None => Docker::connect_with_local_defaults()?,
        };
        log::debug!("Docker client configured ({})", config.socket.as_deref().unwrap_or("local defaults"));
        Ok(Self { client: Mutex::new(docker) })
    }

    /// Check that the daemon answers.
    pub async fn ping(&self) -> Result<(), EngineError> {
        let client = self.client.lock().await;
        client
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| EngineError::Unavailable(e.to_string()))
    }
}

/// Turn a 404 response into [`EngineError::NotFound`].
fn not_found_or(err: bollard::errors::Error, what: &str) -> EngineError {
    match err {
        bollard::errors::Error::DockerResponseServerError { status_code: 404, .. } => {
            EngineError::NotFound(what.to_string())
        }
        other => EngineError::Api(other),
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn has_image(&self, image: &ImageRef) -> Result<bool, EngineError> {
        let client = self.client.lock().await;
        match client.inspect_image(&image.to_string()).await {
            Ok(_) => Ok(true),
            Err(e) => match not_found_or(e, &image.to_string()) {
                EngineError::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn pull_image(&self, image: &ImageRef, progress: ProgressFn<'_>) -> Result<(), EngineError> {
        let client = self.client.lock().await;
        let options = CreateImageOptions {
            from_image: image.name.clone(),
            tag: image.tag.clone(),
            ..Default::default()
        };

        let mut tracker = PullProgress::new();
        let mut stream = Box::pin(client.create_image(Some(options), None, None));
        while let Some(item) = stream.next().await {
            let info = item.map_err(|e| EngineError::Pull(e.to_string()))?;
            if let Some(error) = info.error {
                return Err(EngineError::Pull(error));
            }
            if let (Some(layer), Some(detail)) = (info.id.as_deref(), info.progress_detail.as_ref()) {
                let current = detail.current.unwrap_or(0).max(0) as u64;
                let total = detail.total.unwrap_or(0).max(0) as u64;
                if let Some(percent) = tracker.update(layer, current, total) {
                    progress(percent);
                }
            }
            if let Some(status) = info.status.as_deref() {
                log::trace!("pull {}: {}", image, status);
            }
        }

        if let Some(percent) = tracker.finish() {
            progress(percent);
        }
        Ok(())
    }

    async fn create_container(
        &self,
        image: &ImageRef,
        bindings: &[VolumeBinding],
        cmd: &[String],
    ) -> Result<ContainerCreated, EngineError> {
        let client = self.client.lock().await;
        let config = Config {
            image: Some(image.to_string()),
            cmd: Some(cmd.to_vec()),
            host_config: Some(HostConfig {
                binds: Some(bindings.iter().map(VolumeBinding::to_bind).collect()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let response = client
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await?;
        Ok(ContainerCreated {
            id: response.id,
            warnings: response.warnings,
        })
    }

    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        let client = self.client.lock().await;
        client
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| not_found_or(e, id))
    }

    async fn container_status(&self, id: &str) -> Result<ContainerStatus, EngineError> {
        let client = self.client.lock().await;
        let response = client
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| not_found_or(e, id))?;

        let state = response.state.unwrap_or_default();
        let running = state.running.unwrap_or(false);
        Ok(ContainerStatus {
            running,
            exit_code: if running { None } else { state.exit_code },
        })
    }

    async fn remove_container(&self, id: &str) -> Result<(), EngineError> {
        let client = self.client.lock().await;
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        client
            .remove_container(id, Some(options))
            .await
            .map_err(|e| not_found_or(e, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DockerEngineConfig::default();
        assert!(config.socket.is_none());
        assert_eq!(config.timeout_secs, 120);
    }

    #[test]
    fn test_not_found_mapping() {
        let err = bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: "No such container".to_string(),
        };
        assert!(matches!(not_found_or(err, "abc"), EngineError::NotFound(id) if id == "abc"));

        let err = bollard::errors::Error::DockerResponseServerError {
            status_code: 500,
            message: "boom".to_string(),
        };
        assert!(matches!(not_found_or(err, "abc"), EngineError::Api(_)));
    }

    // Only runs against a live daemon
    #[tokio::test]
    async fn test_docker_integration() {
        let Ok(engine) = DockerEngine::connect(&DockerEngineConfig::default()) else {
            return;
        };
        if engine.ping().await.is_err() {
            return;
        }
        let present = engine.has_image(&ImageRef::new("bowtie-dock/does-not-exist", "none")).await;
        assert!(matches!(present, Ok(false)));
    }
}

//! Scripted in-memory container engine
//!
//! Records every call so tests can assert on the exact sequence the lifecycle
//! manager issued.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ContainerCreated, ContainerEngine, ContainerStatus, ImageRef, ProgressFn};
use crate::command::VolumeBinding;
use crate::error::EngineError;

/// One call received by a [`FakeEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    HasImage(String),
    Pull(String),
    Create {
        image: String,
        binds: Vec<String>,
        cmd: Vec<String>,
    },
    Start(String),
    Status(String),
    Remove(String),
}

#[derive(Debug)]
struct FakeContainer {
    started: bool,
    /// Status polls left before the container reports exited; `None` runs forever
    polls_left: Option<u32>,
}

#[derive(Debug)]
struct FakeState {
    images: HashSet<String>,
    pull_steps: Vec<u8>,
    pull_error: Option<String>,
    create_warnings: Vec<String>,
    start_error: Option<String>,
    run_polls: Option<u32>,
    exit_code: i64,
    containers: HashMap<String, FakeContainer>,
    next_id: u32,
    calls: Vec<EngineCall>,
}

/// In-memory [`ContainerEngine`] for tests
#[derive(Debug)]
pub struct FakeEngine {
    state: Mutex<FakeState>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEngine {
    /// Engine with no local images, containers exiting with code 0 after one poll
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                images: HashSet::new(),
                pull_steps: vec![25, 50, 75, 100],
                pull_error: None,
                create_warnings: Vec::new(),
                start_error: None,
                run_polls: Some(1),
                exit_code: 0,
                containers: HashMap::new(),
                next_id: 0,
                calls: Vec::new(),
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        // A panicking test thread must not hide the recorded calls
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_image(self, image: &ImageRef) -> Self {
        self.state().images.insert(image.to_string());
        self
    }

    pub fn with_pull_steps(self, steps: Vec<u8>) -> Self {
        self.state().pull_steps = steps;
        self
    }

    pub fn with_pull_failure(self, message: &str) -> Self {
        self.state().pull_error = Some(message.to_string());
        self
    }

    pub fn with_create_warnings(self, warnings: Vec<String>) -> Self {
        self.state().create_warnings = warnings;
        self
    }

    pub fn with_start_failure(self, message: &str) -> Self {
        self.state().start_error = Some(message.to_string());
        self
    }

    /// Containers report running for `polls` status queries after starting.
    pub fn with_run_polls(self, polls: u32) -> Self {
        self.state().run_polls = Some(polls);
        self
    }

    /// Containers never exit on their own.
    pub fn never_exits(self) -> Self {
        self.state().run_polls = None;
        self
    }

    pub fn with_exit_code(self, code: i64) -> Self {
        self.state().exit_code = code;
        self
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<EngineCall> {
        self.state().calls.clone()
    }

    /// Commands of every container created so far
    pub fn created_commands(&self) -> Vec<Vec<String>> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                EngineCall::Create { cmd, .. } => Some(cmd.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.state().calls.iter().filter(|c| pred(c)).count()
    }

    /// Containers created and not yet removed
    pub fn live_containers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state().containers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn has_local_image(&self, image: &ImageRef) -> bool {
        self.state().images.contains(&image.to_string())
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn has_image(&self, image: &ImageRef) -> Result<bool, EngineError> {
        let mut state = self.state();
        state.calls.push(EngineCall::HasImage(image.to_string()));
        Ok(state.images.contains(&image.to_string()))
    }

    async fn pull_image(&self, image: &ImageRef, progress: ProgressFn<'_>) -> Result<(), EngineError> {
        let steps = {
            let mut state = self.state();
            state.calls.push(EngineCall::Pull(image.to_string()));
            if let Some(error) = state.pull_error.clone() {
                return Err(EngineError::Pull(error));
            }
            state.pull_steps.clone()
        };
        for step in steps {
            progress(step);
            tokio::task::yield_now().await;
        }
        self.state().images.insert(image.to_string());
        Ok(())
    }

    async fn create_container(
        &self,
        image: &ImageRef,
        bindings: &[VolumeBinding],
        cmd: &[String],
    ) -> Result<ContainerCreated, EngineError> {
        let mut state = self.state();
        state.calls.push(EngineCall::Create {
            image: image.to_string(),
            binds: bindings.iter().map(VolumeBinding::to_bind).collect(),
            cmd: cmd.to_vec(),
        });
        if !state.images.contains(&image.to_string()) {
            return Err(EngineError::NotFound(image.to_string()));
        }

        state.next_id += 1;
        let id = format!("fake-{:04}", state.next_id);
        let polls_left = state.run_polls;
        state.containers.insert(id.clone(), FakeContainer { started: false, polls_left });
        Ok(ContainerCreated {
            id,
            warnings: state.create_warnings.clone(),
        })
    }

    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        let mut state = self.state();
        state.calls.push(EngineCall::Start(id.to_string()));
        if let Some(error) = state.start_error.clone() {
            return Err(EngineError::Unavailable(error));
        }
        match state.containers.get_mut(id) {
            Some(container) => {
                container.started = true;
                Ok(())
            }
            None => Err(EngineError::NotFound(id.to_string())),
        }
    }

    async fn container_status(&self, id: &str) -> Result<ContainerStatus, EngineError> {
        let mut state = self.state();
        state.calls.push(EngineCall::Status(id.to_string()));
        let exit_code = state.exit_code;
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        if !container.started {
            return Ok(ContainerStatus { running: false, exit_code: None });
        }
        let running = match container.polls_left.as_mut() {
            None => true,
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
        };
        Ok(ContainerStatus {
            running,
            exit_code: if running { None } else { Some(exit_code) },
        })
    }

    async fn remove_container(&self, id: &str) -> Result<(), EngineError> {
        let mut state = self.state();
        state.calls.push(EngineCall::Remove(id.to_string()));
        state
            .containers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }
}

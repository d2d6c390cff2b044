//! Run command - align a reads directory against an index inside a container

use std::path::PathBuf;
use std::sync::Arc;

use bowtie_dock_core::{DockerEngine, JobInputs, JobOrchestrator, JobResult, LifecycleManager};

use super::command_builder;
use crate::config::Config;
use crate::error::{CliError, CliResult};
use crate::progress::JobProgress;

pub async fn execute(
    config: &Config,
    reads: PathBuf,
    index: PathBuf,
    extra_args: Vec<String>,
    quiet: bool,
) -> CliResult<()> {
    log::info!("Reads directory: {}", reads.display());
    log::info!("Index directory: {}", index.display());

    let engine = DockerEngine::connect(&config.engine)?;
    engine.ping().await?;
    log::debug!("Connected to container engine");

    let lifecycle = LifecycleManager::new(Arc::new(engine), config.image.clone())
        .with_poll_settings(config.poll.to_settings());
    let orchestrator = Arc::new(JobOrchestrator::new(lifecycle, command_builder(config, extra_args)));

    let mut handle = orchestrator.spawn(JobInputs::new(reads, index));
    let mut progress = JobProgress::new(config.image.to_string(), quiet);
    let cancel = handle.cancel_token();
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(event) => progress.handle(&event),
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                log::warn!("Interrupted, stopping the container");
                interrupted = true;
                cancel.cancel();
            }
        }
    }
    progress.clear();

    match handle.wait().await {
        JobResult::Succeeded { output_dir, result_file, .. } => {
            log::info!("Alignment written to {}", result_file.display());
            // Downstream tools pick up the reads directory from stdout
            println!("{}", output_dir.display());
            Ok(())
        }
        JobResult::Failed { reason } => Err(CliError::Job(reason)),
    }
}

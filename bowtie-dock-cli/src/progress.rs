//! Terminal rendering of job events

use std::time::Duration;

use bowtie_dock_core::{JobEvent, JobState};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const PULL_TEMPLATE: &str = "{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos:>3}%";
const RUN_TEMPLATE: &str = "{spinner:.green} {msg} [{elapsed_precise}]";

/// Turns [`JobEvent`]s into a pull bar and a run spinner.
pub struct JobProgress {
    image: String,
    quiet: bool,
    pull: Option<ProgressBar>,
    run: Option<ProgressBar>,
}

impl JobProgress {
    pub fn new(image: String, quiet: bool) -> Self {
        Self { image, quiet, pull: None, run: None }
    }

    pub fn handle(&mut self, event: &JobEvent) {
        match event {
            JobEvent::State(JobState::EnsuringImage) => {
                let bar = self.bar(ProgressBar::new(100), PULL_TEMPLATE);
                bar.set_message(format!("Pulling {}", self.image));
                self.pull = Some(bar);
            }
            JobEvent::PullProgress(percent) => {
                if let Some(bar) = &self.pull {
                    bar.set_position(u64::from(*percent));
                }
            }
            JobEvent::State(JobState::Running) => {
                if let Some(bar) = self.pull.take() {
                    bar.finish_with_message(format!("Pulled {}", self.image));
                }
            }
            JobEvent::ContainerStarted(id) => {
                let spinner = self.bar(ProgressBar::new_spinner(), RUN_TEMPLATE);
                spinner.set_message(format!("Running bowtie2 in container {}", short_id(id)));
                spinner.enable_steady_tick(Duration::from_millis(200));
                self.run = Some(spinner);
            }
            JobEvent::State(JobState::Cleaning) => {
                if let Some(spinner) = self.run.take() {
                    spinner.finish_with_message("Container finished");
                }
            }
            JobEvent::State(JobState::Done) => self.clear(),
            JobEvent::State(_) => {}
        }
    }

    /// Drop any bar still on screen.
    pub fn clear(&mut self) {
        for bar in [self.pull.take(), self.run.take()].into_iter().flatten() {
            bar.abandon();
        }
    }

    fn bar(&self, bar: ProgressBar, template: &str) -> ProgressBar {
        if self.quiet {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        if let Ok(style) = ProgressStyle::default_bar().template(template) {
            bar.set_style(style.progress_chars("=> "));
        }
        bar
    }
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

//! Command implementations for the bowtie-dock CLI

pub mod run;
pub mod plan;

use bowtie_dock_core::CommandBuilder;

use crate::config::Config;

/// Command builder for the configured container layout and aligner options.
pub(crate) fn command_builder(config: &Config, extra_args: Vec<String>) -> CommandBuilder {
    let mut args = config.aligner.extra_args.clone();
    args.extend(extra_args);
    CommandBuilder::new(config.container.clone()).extra_args(args)
}

//! Plan command - resolve inputs and show the container invocation without running it

use std::path::PathBuf;

use bowtie_dock_core::inputs;

use super::command_builder;
use crate::config::Config;
use crate::error::CliResult;

pub fn execute(config: &Config, reads: PathBuf, index: PathBuf, extra_args: Vec<String>) -> CliResult<()> {
    let (read_set, index_ref) = inputs::resolve(&reads, &index)?;
    let reads = inputs::host_dir(&reads)?;
    let index = inputs::host_dir(&index)?;
    let builder = command_builder(config, extra_args);
    let command = builder.build(&read_set, &index_ref);

    println!("Image:    {}", config.image);
    println!("Mode:     {}", if read_set.is_paired() { "paired-end" } else { "single-end" });
    println!("Inputs:   {} {}", read_set.len(), if read_set.is_paired() { "pairs" } else { "files" });
    println!("Index:    {}", index_ref);
    for binding in builder.layout().bindings(&reads, &index) {
        println!("Volume:   {}", binding.to_bind());
    }
    println!("Command:  {}", command);
    println!("Output:   {}", index.join(&builder.layout().output_name).display());

    Ok(())
}

//! bowtie2 command building
//!
//! The command only ever references container-side paths. Host directories
//! reach the container through the two [`VolumeBinding`]s of a job.
//!
//! `bowtie2 [options]* -x <bt2-idx> {-1 <m1> -2 <m2> | -U <r>} -S [<hit>]`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::inputs::{container_path, IndexReference, ReadSet};

/// Default container mount point of the reads directory
pub const DEFAULT_CONTAINER_READS_DIR: &str = "/data/fastq";
/// Default container mount point of the index directory
pub const DEFAULT_CONTAINER_INDEX_DIR: &str = "/data/index";
/// Default alignment output file, written into the index directory
pub const DEFAULT_OUTPUT_NAME: &str = "result_test.sam";

/// Where the job's directories live inside the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerLayout {
    #[serde(default = "default_reads_dir")]
    pub reads_dir: String,

    #[serde(default = "default_index_dir")]
    pub index_dir: String,

    /// File name of the SAM output inside `index_dir`
    #[serde(default = "default_output_name")]
    pub output_name: String,
}

fn default_reads_dir() -> String { DEFAULT_CONTAINER_READS_DIR.to_string() }
fn default_index_dir() -> String { DEFAULT_CONTAINER_INDEX_DIR.to_string() }
fn default_output_name() -> String { DEFAULT_OUTPUT_NAME.to_string() }

impl Default for ContainerLayout {
    fn default() -> Self {
        Self {
            reads_dir: default_reads_dir(),
            index_dir: default_index_dir(),
            output_name: default_output_name(),
        }
    }
}

impl ContainerLayout {
    /// Bind the host reads and index directories to their container paths.
    pub fn bindings(&self, host_reads_dir: &Path, host_index_dir: &Path) -> [VolumeBinding; 2] {
        [
            VolumeBinding::new(host_reads_dir, &self.reads_dir),
            VolumeBinding::new(host_index_dir, &self.index_dir),
        ]
    }

    /// Container path of the alignment output.
    pub fn output_path(&self) -> String {
        container_path(&self.index_dir, &self.output_name)
    }
}

/// Host directory mounted at a container path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeBinding {
    pub host: PathBuf,
    pub container: String,
}

impl VolumeBinding {
    pub fn new(host: &Path, container: &str) -> Self {
        Self {
            host: host.to_path_buf(),
            container: container.to_string(),
        }
    }

    /// Docker bind string, `host:container`. The host path must be absolute
    /// and free of `:`, see [`crate::inputs::host_dir`].
    pub fn to_bind(&self) -> String {
        format!("{}:{}", self.host.display(), self.container)
    }
}

/// Materialized aligner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCommand {
    args: Vec<String>,
}

impl JobCommand {
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The aligner command line as one shell string.
    pub fn to_shell_string(&self) -> String {
        self.args
            .iter()
            .map(|a| shell_quote(a))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Entry point vector handing the command line to a shell.
    pub fn entrypoint(&self) -> Vec<String> {
        vec!["bash".to_string(), "-c".to_string(), self.to_shell_string()]
    }

    pub fn is_paired(&self) -> bool {
        self.args.iter().any(|a| a == "-1")
    }
}

impl std::fmt::Display for JobCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_shell_string())
    }
}

/// Builds [`JobCommand`]s for one container layout.
#[derive(Debug, Clone, Default)]
pub struct CommandBuilder {
    layout: ContainerLayout,
    extra_args: Vec<String>,
}

impl CommandBuilder {
    pub fn new(layout: ContainerLayout) -> Self {
        Self {
            layout,
            extra_args: Vec::new(),
        }
    }

    /// Aligner options placed before `-x`, e.g. `-p 8` or `--very-sensitive`.
    pub fn extra_args(mut self, extra_args: Vec<String>) -> Self {
        self.extra_args = extra_args;
        self
    }

    pub fn layout(&self) -> &ContainerLayout {
        &self.layout
    }

    pub fn build(&self, reads: &ReadSet, index: &IndexReference) -> JobCommand {
        let mut args = vec!["bowtie2".to_string()];
        args.extend(self.extra_args.iter().cloned());

        args.push("-x".to_string());
        args.push(container_path(&self.layout.index_dir, &index.basename));

        let mate1 = join_paths(&self.layout.reads_dir, reads.mate1_files());
        if reads.is_paired() {
            args.push("-1".to_string());
            args.push(mate1);
            args.push("-2".to_string());
            args.push(join_paths(&self.layout.reads_dir, reads.mate2_files()));
        } else {
            args.push("-U".to_string());
            args.push(mate1);
        }

        args.push("-S".to_string());
        args.push(self.layout.output_path());

        JobCommand { args }
    }
}

/// Build a command with default options.
pub fn build(
    reads: &ReadSet,
    index: &IndexReference,
    container_reads_prefix: &str,
    container_index_prefix: &str,
) -> JobCommand {
    let layout = ContainerLayout {
        reads_dir: container_reads_prefix.to_string(),
        index_dir: container_index_prefix.to_string(),
        ..ContainerLayout::default()
    };
    CommandBuilder::new(layout).build(reads, index)
}

fn join_paths<'a>(prefix: &str, names: impl Iterator<Item = &'a str>) -> String {
    names
        .map(|name| container_path(prefix, name))
        .collect::<Vec<_>>()
        .join(",")
}

/// Single-quote an argument if the shell would otherwise split or expand it.
fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./,=:+@%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

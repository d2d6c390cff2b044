use clap::{Parser, Subcommand};
use std::path::PathBuf;
use anyhow::Result;

mod config;
mod commands;
mod error;
mod progress;

use config::Config;
use error::{CliError, CliResult};

#[derive(Parser)]
#[command(name = "bowtie-dock")]
#[command(about = "Run the bowtie2 aligner in a container against a directory of reads")]
#[command(version)]
#[command(long_about = "
bowtie-dock pairs the FASTQ files of a reads directory by name (R1/R2, _1.fq/_2.fq),
finds the bowtie2 index in an index directory, and runs bowtie2 inside a container
with both directories mounted. The SAM output is written into the index directory.

Examples:
  bowtie-dock run --reads ./fastq --index ./index
  bowtie-dock plan --reads ./fastq --index ./index
  bowtie-dock config --example > bowtie-dock.toml
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Align all reads in a directory against a bowtie2 index
    Run {
        /// Directory holding the FASTQ files
        #[arg(long, required = true)]
        reads: PathBuf,

        /// Directory holding the .bt2 index files
        #[arg(long, required = true)]
        index: PathBuf,

        /// Image tag to use instead of the configured one
        #[arg(long)]
        tag: Option<String>,

        /// Additional bowtie2 arguments (e.g. --extra-args=-p --extra-args=8)
        #[arg(long, allow_hyphen_values = true)]
        extra_args: Vec<String>,
    },

    /// Show the resolved inputs and the container command without running it
    Plan {
        /// Directory holding the FASTQ files
        #[arg(long, required = true)]
        reads: PathBuf,

        /// Directory holding the .bt2 index files
        #[arg(long, required = true)]
        index: PathBuf,

        /// Additional bowtie2 arguments
        #[arg(long, allow_hyphen_values = true)]
        extra_args: Vec<String>,
    },

    /// Print or write the configuration
    Config {
        /// Print the default configuration
        #[arg(long)]
        example: bool,

        /// Write the effective configuration to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn setup_logging(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .try_init()?;

    Ok(())
}

async fn run(cli: Cli) -> CliResult<()> {
    let mut config = Config::load(cli.config.as_deref())
        .map_err(|e| CliError::config(format!("{:#}", e)))?;

    match cli.command {
        Commands::Run { reads, index, tag, extra_args } => {
            if let Some(tag) = tag {
                config.image.tag = tag;
            }
            commands::run::execute(&config, reads, index, extra_args, cli.quiet).await
        }

        Commands::Plan { reads, index, extra_args } => {
            commands::plan::execute(&config, reads, index, extra_args)
        }

        Commands::Config { example, output } => {
            if example {
                config = Config::default();
            }
            match output {
                Some(path) => {
                    config.save_to_file(&path).map_err(|e| CliError::config(format!("{:#}", e)))?;
                    log::info!("Wrote configuration to {}", path.display());
                }
                None if example => {
                    let content = Config::example_toml().map_err(|e| CliError::config(format!("{:#}", e)))?;
                    print!("{}", content);
                }
                None => {
                    let content = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::config(e.to_string()))?;
                    print!("{}", content);
                }
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(cli.verbose, cli.quiet)?;

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", error::format_error_with_suggestions(&e));
        std::process::exit(1);
    }

    Ok(())
}

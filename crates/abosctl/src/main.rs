//! abosctl - A/B base-OS partition tool
//!
//! Inspects and drives the two boot partitions and the record of which
//! base-OS image each one holds.
//!
//! Exit status is 0 on success, 1 on an ordinary failure and 2 when the boot
//! environment or the partition mapping can no longer be trusted.

mod commands;
mod config;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use abos_core::{AbosError, PartitionLabel};

use crate::commands::Runtime;
use crate::config::AppConfig;
use crate::output::{OutputContext, OutputFormat};

const DEFAULT_LOG_FILTER: &str = "abosctl=info,abos_zboot=info,abos_mapping=info";

/// Exit code for errors that leave the boot metadata untrustworthy
const EXIT_FATAL: u8 = 2;

#[derive(Parser)]
#[command(name = "abosctl")]
#[command(author, version, about = "A/B base-OS partition tool")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ABOS_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show both partitions and the image each one holds
    Status,

    /// Repair a boot environment with both partitions active
    Init,

    /// Commit the booted partition after an update boot
    Commit,

    /// Copy an image onto the other partition
    Write {
        /// Image file
        image: PathBuf,
    },

    /// Mark the other partition as holding an image to boot next
    MarkUpdating {
        /// Partition label (IMGA or IMGB)
        label: PartitionLabel,
    },

    /// Mark the other partition as not holding a usable image
    MarkUnused {
        /// Partition label (IMGA or IMGB)
        label: PartitionLabel,
    },

    /// Install a base-OS image onto its assigned partition
    Install {
        /// Base-OS config UUID
        uuid: Uuid,

        /// Staged image file
        image: PathBuf,
    },

    /// Undo an install that has not been booted
    Cancel {
        /// Base-OS config UUID
        uuid: Uuid,
    },

    /// Inspect and edit the partition mapping
    Mapping {
        #[command(subcommand)]
        command: MappingCommands,
    },

    /// Reset the device through the boot-control utility
    Reboot,
}

#[derive(Subcommand)]
enum MappingCommands {
    /// Show the mapping records
    Show,

    /// Find the partition holding an image
    Find {
        /// Base-OS image UUID
        uuid: Uuid,

        /// Image SHA-256, matched when no record carries the UUID
        #[arg(long, default_value = "")]
        sha256: String,
    },

    /// Drop the mapping of an image installed on the other partition
    Reset {
        /// Base-OS config UUID
        uuid: Uuid,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let ctx = OutputContext::new(cli.output, cli.no_color, cli.quiet);

    match run(&cli, &ctx).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if is_fatal(&e) {
                error!(error = %e, "Boot environment cannot be trusted, aborting");
                ctx.error(&format!("fatal: {:#}", e));
                ExitCode::from(EXIT_FATAL)
            } else {
                ctx.error(&format!("error: {:#}", e));
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: &Cli, ctx: &OutputContext) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let rt = Runtime::new(&config)?;

    match &cli.command {
        Commands::Status => commands::status(&rt, ctx).await,
        Commands::Init => commands::init(&rt, ctx).await,
        Commands::Commit => commands::commit(&rt, ctx).await,
        Commands::Write { image } => commands::write(&rt, image, ctx).await,
        Commands::MarkUpdating { label } => commands::mark_updating(&rt, *label, ctx).await,
        Commands::MarkUnused { label } => commands::mark_unused(&rt, *label, ctx).await,
        Commands::Install { uuid, image } => commands::install(&rt, uuid, image, ctx).await,
        Commands::Cancel { uuid } => commands::cancel(&rt, uuid, ctx).await,
        Commands::Mapping { command } => match command {
            MappingCommands::Show => commands::show_mapping(&rt, ctx).await,
            MappingCommands::Find { uuid, sha256 } => {
                commands::find(&rt, uuid, sha256, ctx).await
            }
            MappingCommands::Reset { uuid } => commands::reset_mapping(&rt, uuid, ctx).await,
        },
        Commands::Reboot => commands::reboot(&rt, ctx).await,
    }
}

fn is_fatal(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|e| e.downcast_ref::<AbosError>())
        .any(AbosError::is_fatal)
}

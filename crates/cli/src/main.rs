// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]

//! foundry - resumable AI pipelines with human review on one shared GPU

mod commands;
mod context;
mod demo;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{clarify, correct, job, lock, worker};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "foundry",
    version,
    about = "foundry runs AI pipelines that pause for human review and share one GPU"
)]
struct Cli {
    /// State directory shared by every foundry process
    #[arg(long, global = true, env = "FOUNDRY_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Config file (default: <state-dir>/foundry.toml)
    #[arg(long, global = true, env = "FOUNDRY_CONFIG")]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit, inspect, and run jobs
    Job(job::JobArgs),
    /// Human clarification requests
    Clarify(clarify::ClarifyArgs),
    /// Save a corrected output and complete the job
    Correct(correct::CorrectArgs),
    /// Move a saved correction between review states
    Review(correct::ReviewArgs),
    /// Print corrections as JSON lines
    Export(correct::ExportArgs),
    /// Inspect or recover the resource lease
    Lock(lock::LockArgs),
    /// Run resource-bound work in this process
    Worker(worker::WorkerArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = context::load_config(cli.config.as_deref(), cli.state_dir.as_deref())?;
    let log_path = cli.log_file.clone().or_else(|| config.log_path.clone());
    let _guard = setup_logging(log_path.as_deref())?;

    let ctx = context::Context::open(config)?;
    match cli.command {
        Commands::Job(args) => job::handle(&ctx, args).await,
        Commands::Clarify(args) => clarify::handle(&ctx, args).await,
        Commands::Correct(args) => correct::correct(&ctx, args),
        Commands::Review(args) => correct::review(&ctx, args),
        Commands::Export(args) => correct::export(&ctx, args),
        Commands::Lock(args) => lock::handle(&ctx, args),
        Commands::Worker(args) => worker::handle(&ctx, args).await,
    }
}

/// Logs go to stderr, or to `log_path` through a non-blocking writer whose
/// guard must live until exit
fn setup_logging(
    log_path: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(path) = log_path else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
        return Ok(None);
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("log path {} has no file name", path.display()))?;
    let (non_blocking, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(Some(guard))
}

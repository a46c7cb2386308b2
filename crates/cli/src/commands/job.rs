// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `foundry job` - submit, inspect, and run jobs

use crate::context::Context;
use crate::demo;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use clap::{Args, Subcommand};
use foundry_core::{Clock, JobId, JobStatus, PayloadRef, SystemClock};
use foundry_engine::RunOutcome;
use foundry_storage::{JobRecord, JobStore};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Args)]
pub struct JobArgs {
    #[command(subcommand)]
    pub command: JobCommand,
}

#[derive(Subcommand)]
pub enum JobCommand {
    /// Create a job for a pipeline
    Submit {
        #[arg(long)]
        pipeline: String,
        /// Opaque reference to the input data
        #[arg(long)]
        payload: String,
        /// Extra input as JSON
        #[arg(long)]
        input: Option<String>,
    },
    /// List jobs, oldest first
    List {
        #[arg(long)]
        status: Option<JobStatus>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Show one job (id or unique prefix)
    Show {
        id: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Run the job's remaining phases
    Run { id: String },
}

#[derive(Serialize)]
struct JobRow {
    id: String,
    pipeline: String,
    status: JobStatus,
    cursor: usize,
    open_requests: usize,
    progress: Option<String>,
}

impl fmt::Display for JobRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<14} {:<12} {:<26} {:<6} {}",
            output::short(&self.id),
            self.pipeline,
            self.status.name(),
            self.cursor,
            self.progress.as_deref().unwrap_or("-"),
        )
    }
}

fn row(ctx: &Context, record: &JobRecord) -> JobRow {
    let progress = record
        .job
        .current_progress(SystemClock.now(), ctx.config.status.ttl)
        .map(|p| format!("{}% {}", p.percent, p.message));
    JobRow {
        id: record.job.id.to_string(),
        pipeline: record.job.pipeline.clone(),
        status: record.job.status,
        cursor: record.job.cursor,
        open_requests: record.open_requests().count(),
        progress,
    }
}

pub async fn handle(ctx: &Context, args: JobArgs) -> Result<()> {
    match args.command {
        JobCommand::Submit {
            pipeline,
            payload,
            input,
        } => {
            let input = match input {
                Some(text) => super::parse_json("--input", &text)?,
                None => Value::Null,
            };
            let job = ctx
                .executor()
                .submit(&pipeline, PayloadRef::new(payload), input)?;
            println!("{}", job.id);
            Ok(())
        }
        JobCommand::List { status, format } => {
            let rows: Vec<JobRow> = ctx
                .store
                .list_jobs()?
                .iter()
                .filter(|r| status.is_none() || status == Some(r.job.status))
                .map(|r| row(ctx, r))
                .collect();
            output::print_list(
                &rows,
                &format!(
                    "{:<14} {:<12} {:<26} {:<6} PROGRESS",
                    "ID", "PIPELINE", "STATUS", "CURSOR"
                ),
                "No jobs",
                format,
            );
            Ok(())
        }
        JobCommand::Show { id, format } => {
            let record = ctx.store.find_job(&id)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
                OutputFormat::Text => show(ctx, &record),
            }
            Ok(())
        }
        JobCommand::Run { id } => {
            let record = ctx.store.find_job(&id)?;
            let outcome = run(ctx, &record.job.id).await?;
            println!("{}", describe(&record.job.id, &outcome));
            Ok(())
        }
    }
}

fn show(ctx: &Context, record: &JobRecord) {
    let job = &record.job;
    println!("Job: {}", job.id);
    println!("  Pipeline: {}", job.pipeline);
    println!("  Status: {}", job.status);
    println!("  Cursor: {}", job.cursor);
    println!("  Payload: {}", job.payload);
    println!("  Created: {}", job.created_at);
    println!("  Updated: {}", job.updated_at);
    if let Some(progress) = job.current_progress(SystemClock.now(), ctx.config.status.ttl) {
        println!("  Progress: {}% {}", progress.percent, progress.message);
    }
    if let Some(error) = &job.error {
        match &error.phase {
            Some(phase) => println!("  Error: {} (phase '{}')", error.message, phase),
            None => println!("  Error: {}", error.message),
        }
    }
    if let Some(output) = &job.ai_output {
        println!("  AI output: {}", output);
    }
    if let Some(output) = &job.corrected_output {
        println!("  Corrected output: {}", output);
    }
    let open: Vec<_> = record.open_requests().collect();
    if !open.is_empty() {
        println!("  Open requests:");
        for request in open {
            println!(
                "    {} {} {}",
                request.id,
                request.request_type,
                output::compact(&request.fields, 60)
            );
        }
    }
}

/// Run a job with the built-in pipelines and an in-process scheduler
pub(crate) async fn run(ctx: &Context, id: &JobId) -> Result<RunOutcome> {
    let (scheduler, supervisor) = ctx.start_scheduler()?;
    let registry = demo::registry(&scheduler)?;
    let outcome = ctx.executor().run(&registry, id).await;
    drop(registry);
    drop(scheduler);
    supervisor.await?;
    Ok(outcome?)
}

pub(crate) fn describe(id: &JobId, outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Ready => format!("job {} is ready for final processing", id),
        RunOutcome::AwaitingClarification { open } => {
            format!("job {} is waiting on {} clarification request(s)", id, open)
        }
        RunOutcome::Failed { reason } => format!("job {} failed: {}", id, reason),
        RunOutcome::Completed => format!("job {} is already completed", id),
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `foundry clarify` - the human side of clarification requests

use crate::commands::job;
use crate::context::Context;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use clap::{Args, Subcommand};
use foundry_core::{ClarificationId, ClarificationRequest};
use foundry_storage::JobStore;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Args)]
pub struct ClarifyArgs {
    #[command(subcommand)]
    pub command: ClarifyCommand,
}

#[derive(Subcommand)]
pub enum ClarifyCommand {
    /// List requests, oldest first
    List {
        /// Only this job's requests (id or unique prefix)
        #[arg(long)]
        job: Option<String>,
        /// Hide resolved requests
        #[arg(long)]
        open: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Show the oldest open request
    Next {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Resolve a request; the job runs again once nothing is left open
    Resolve {
        id: String,
        /// Resolution as JSON
        #[arg(long)]
        data: String,
        /// Only record the resolution
        #[arg(long)]
        no_run: bool,
    },
}

#[derive(Serialize)]
struct RequestRow<'a> {
    #[serde(flatten)]
    request: &'a ClarificationRequest,
}

impl fmt::Display for RequestRow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.request;
        write!(
            f,
            "{:<38} {:<14} {:<9} {:<14} {:<14} {}",
            r.id.as_str(),
            output::short(r.job_id.as_str()),
            if r.is_open() { "open" } else { "resolved" },
            r.phase,
            r.request_type,
            output::compact(&r.fields, 50),
        )
    }
}

fn header() -> String {
    format!(
        "{:<38} {:<14} {:<9} {:<14} {:<14} FIELDS",
        "ID", "JOB", "STATUS", "PHASE", "TYPE"
    )
}

pub async fn handle(ctx: &Context, args: ClarifyArgs) -> Result<()> {
    match args.command {
        ClarifyCommand::List { job, open, format } => {
            let job_id = match job {
                Some(prefix) => Some(ctx.store.find_job(&prefix)?.job.id),
                None => None,
            };
            let requests: Vec<ClarificationRequest> = ctx
                .store
                .clarifications(job_id.as_ref())?
                .into_iter()
                .filter(|r| !open || r.is_open())
                .collect();
            let rows: Vec<RequestRow<'_>> =
                requests.iter().map(|request| RequestRow { request }).collect();
            output::print_list(&rows, &header(), "No clarification requests", format);
            Ok(())
        }
        ClarifyCommand::Next { format } => {
            match ctx.store.next_open_clarification()? {
                Some(request) => match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&request)?),
                    OutputFormat::Text => {
                        println!("Request: {}", request.id);
                        println!("  Job: {}", request.job_id);
                        println!("  Phase: {}", request.phase);
                        println!("  Detector: {}", request.detector);
                        println!("  Type: {}", request.request_type);
                        println!("  Fields: {}", request.fields);
                    }
                },
                None => println!("No open clarification requests"),
            }
            Ok(())
        }
        ClarifyCommand::Resolve { id, data, no_run } => {
            let resolution: Value = super::parse_json("--data", &data)?;
            let resolved = ctx
                .executor()
                .resolve(&ClarificationId::new(id.clone()), resolution)?;
            println!("Resolved {}", id);
            if !resolved.unblocked() {
                println!(
                    "job {} still has {} open request(s)",
                    resolved.job_id, resolved.remaining
                );
                return Ok(());
            }
            if no_run {
                println!("job {} is unblocked", resolved.job_id);
                return Ok(());
            }
            let outcome = job::run(ctx, &resolved.job_id).await?;
            println!("{}", job::describe(&resolved.job_id, &outcome));
            Ok(())
        }
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `foundry worker` - resource-bound work in this process

use crate::context::Context;
use anyhow::Result;
use clap::{Args, Subcommand};
use foundry_core::{Priority, TaskKind, TaskOutcome, WorkTask};
use serde_json::json;

#[derive(Args)]
pub struct WorkerArgs {
    #[command(subcommand)]
    pub command: WorkerCommand,
}

#[derive(Subcommand)]
pub enum WorkerCommand {
    /// Fine-tune on approved corrections, yielding the GPU between quanta
    Train {
        /// Task id; reusing one resumes from its checkpoints
        #[arg(long)]
        task: String,
        /// Training steps (default: one per approved correction)
        #[arg(long)]
        steps: Option<u64>,
        #[arg(long, default_value_t = Priority::Low)]
        priority: Priority,
    },
}

pub async fn handle(ctx: &Context, args: WorkerArgs) -> Result<()> {
    match args.command {
        WorkerCommand::Train {
            task,
            steps,
            priority,
        } => {
            let payload = match steps {
                Some(steps) => json!({ "steps": steps }),
                None => json!({}),
            };
            let task = WorkTask::new(task, TaskKind::Training, payload).with_priority(priority);
            let (scheduler, supervisor) = ctx.start_scheduler()?;
            let outcome = scheduler.submit(task.clone()).await;
            drop(scheduler);
            supervisor.await?;

            match outcome? {
                TaskOutcome::Completed { output } => {
                    println!("task {} completed: {}", task.id, output)
                }
                TaskOutcome::Failed { reason } => {
                    anyhow::bail!("task {} failed: {}", task.id, reason)
                }
                TaskOutcome::Preempted { sequence } => {
                    println!("task {} paused at checkpoint {}", task.id, sequence)
                }
            }
            Ok(())
        }
    }
}

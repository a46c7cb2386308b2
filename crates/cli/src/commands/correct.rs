// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `foundry correct`, `review`, and `export` - final processing

use crate::context::Context;
use crate::output;
use anyhow::Result;
use clap::Args;
use foundry_core::CorrectionStatus;
use foundry_storage::JobStore;

#[derive(Args)]
pub struct CorrectArgs {
    /// Job id or unique prefix
    pub job: String,
    /// Corrected output as JSON
    #[arg(long)]
    pub data: String,
}

#[derive(Args)]
pub struct ReviewArgs {
    /// Job id or unique prefix
    pub job: String,
    #[arg(long)]
    pub status: CorrectionStatus,
}

#[derive(Args)]
pub struct ExportArgs {
    #[arg(long, default_value_t = CorrectionStatus::ApprovedForFinetuning)]
    pub status: CorrectionStatus,
}

pub fn correct(ctx: &Context, args: CorrectArgs) -> Result<()> {
    let corrected = super::parse_json("--data", &args.data)?;
    let job_id = ctx.store.find_job(&args.job)?.job.id;
    let record = ctx.desk().save_correction(&job_id, corrected)?;
    println!("job {} completed; correction is {}", job_id, record.status);
    Ok(())
}

pub fn review(ctx: &Context, args: ReviewArgs) -> Result<()> {
    let job_id = ctx.store.find_job(&args.job)?.job.id;
    let record = ctx.desk().review(&job_id, args.status)?;
    println!("correction for job {} is {}", job_id, record.status);
    Ok(())
}

pub fn export(ctx: &Context, args: ExportArgs) -> Result<()> {
    let examples = ctx.desk().export(args.status)?;
    output::print_lines(&examples)
}

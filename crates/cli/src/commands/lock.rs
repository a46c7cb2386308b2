// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `foundry lock` - inspect and recover the resource lease

use crate::context::Context;
use anyhow::Result;
use clap::{Args, Subcommand};
use foundry_core::{Clock, LockState, SystemClock};

#[derive(Args)]
pub struct LockArgs {
    #[command(subcommand)]
    pub command: LockCommand,
}

#[derive(Subcommand)]
pub enum LockCommand {
    /// Show the holder and the waiter queue
    Status,
    /// Free the lease if it has expired
    Reclaim,
}

pub fn handle(ctx: &Context, args: LockArgs) -> Result<()> {
    let arbiter = ctx.arbiter();
    match args.command {
        LockCommand::Status => {
            let lock = arbiter.status()?;
            let now = SystemClock.now();
            println!("Lock: {}", lock.name());
            match &lock.state {
                LockState::Free => println!("  State: free"),
                LockState::Held {
                    holder,
                    metadata,
                    acquired_at,
                    expires_at,
                } => {
                    let state = if lock.is_expired(now) { "expired" } else { "held" };
                    println!("  State: {}", state);
                    println!("  Holder: {}", holder);
                    if let Some(metadata) = metadata {
                        println!("  Working on: {}", metadata);
                    }
                    println!("  Acquired: {}", acquired_at);
                    println!("  Expires: {}", expires_at);
                }
            }
            let queue = lock.queue();
            if !queue.is_empty() {
                println!("  Waiters:");
                for (position, waiter) in queue.iter().enumerate() {
                    println!(
                        "    {}. {} ({}, since {})",
                        position + 1,
                        waiter.holder,
                        waiter.priority,
                        waiter.requested_at
                    );
                }
            }
        }
        LockCommand::Reclaim => match arbiter.reclaim_expired()? {
            Some(previous) => println!("Reclaimed lease from {}", previous),
            None => match arbiter.status()?.valid_holder(SystemClock.now()) {
                Some(holder) => println!("Lease held by {} has not expired", holder),
                None => println!("Lock is free"),
            },
        },
    }
    Ok(())
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource arbiter
//!
//! Grants exclusive use of a named resource (the GPU) through a lease
//! record in shared storage. Every operation is one atomic
//! read-modify-write of that record, so independent processes pointed at
//! the same state directory never hold the lock at the same time.

use foundry_core::{
    Clock, Event, HolderId, LeaseConfig, LockError, LockInput, Priority, ResourceLock,
};
use foundry_storage::{LeaseStore, StorageError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::Instrument;

#[derive(Debug, Error)]
pub enum ArbiterError {
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ArbiterError {
    pub fn is_lock_lost(&self) -> bool {
        matches!(self, ArbiterError::Lock(LockError::LockLost { .. }))
    }
}

pub struct ResourceArbiter<S, C> {
    store: Arc<S>,
    config: LeaseConfig,
    poll_interval: Duration,
    clock: C,
}

impl<S, C: Clone> Clone for ResourceArbiter<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            poll_interval: self.poll_interval,
            clock: self.clock.clone(),
        }
    }
}

impl<S, C> ResourceArbiter<S, C>
where
    S: LeaseStore,
    C: Clock,
{
    pub fn new(store: Arc<S>, config: LeaseConfig, clock: C) -> Self {
        Self {
            store,
            config,
            poll_interval: Duration::from_millis(500),
            clock,
        }
    }

    /// How long a blocked [`acquire`](Self::acquire) waits between attempts
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn config(&self) -> &LeaseConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Take the lock now or fail with `Busy`
    pub fn try_acquire(
        &self,
        holder: &HolderId,
        metadata: Option<String>,
    ) -> Result<LeaseGuard<S, C>, ArbiterError> {
        let mut outcome: Result<Vec<Event>, LockError> = Err(LockError::Busy { holder: None });
        self.store.update_lock(&self.config, &mut |lock| {
            match lock.try_acquire(holder, metadata.clone(), &self.clock) {
                Ok((next, events)) => {
                    outcome = Ok(events);
                    Some(next)
                }
                Err(e) => {
                    outcome = Err(e);
                    None
                }
            }
        })?;
        for event in &outcome? {
            event.log();
        }
        Ok(LeaseGuard {
            arbiter: self.clone(),
            holder: holder.clone(),
            released: false,
        })
    }

    /// Wait for the lock.
    ///
    /// Joins the waiter queue and retries every poll interval. Higher
    /// priority waiters are granted first, then earlier arrivals. Dropping
    /// the future leaves the caller queued until its entry goes stale.
    pub async fn acquire(
        &self,
        holder: &HolderId,
        priority: Priority,
        metadata: Option<String>,
    ) -> Result<LeaseGuard<S, C>, ArbiterError> {
        let span = tracing::info_span!(
            "lock.acquire",
            lock = %self.config.name,
            holder = %holder,
            priority = %priority
        );
        async {
            let start = Instant::now();
            let mut attempts = 0u32;
            loop {
                attempts += 1;
                self.apply(LockInput::Enqueue {
                    holder: holder.clone(),
                    priority,
                })?;
                match self.try_acquire(holder, metadata.clone()) {
                    Ok(guard) => {
                        let elapsed_ms = start.elapsed().as_millis() as u64;
                        tracing::info!(elapsed_ms, attempts, "acquired");
                        return Ok(guard);
                    }
                    Err(ArbiterError::Lock(LockError::Busy { holder: current })) => {
                        tracing::trace!(attempts, current = ?current, "busy");
                        tokio::time::sleep(self.poll_interval).await;
                    }
                    Err(e) => {
                        if let Err(cancel) = self.cancel(holder) {
                            tracing::warn!(error = %cancel, "failed to leave the wait queue");
                        }
                        return Err(e);
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Extend the holder's lease; `LockLost` if it expired or was taken
    pub fn renew(&self, holder: &HolderId) -> Result<(), ArbiterError> {
        let mut outcome: Result<Vec<Event>, LockError> = Err(LockError::LockLost {
            holder: holder.clone(),
        });
        self.store.update_lock(&self.config, &mut |lock| {
            match lock.renew(holder, &self.clock) {
                Ok((next, events)) => {
                    outcome = Ok(events);
                    Some(next)
                }
                Err(e) => {
                    outcome = Err(e);
                    None
                }
            }
        })?;
        match outcome {
            Ok(events) => {
                for event in &events {
                    event.log();
                }
                Ok(())
            }
            Err(e) => {
                Event::LockLost {
                    name: self.config.name.clone(),
                    holder: holder.clone(),
                }
                .log();
                Err(e.into())
            }
        }
    }

    /// Give the lock back. Returns false if `holder` did not hold it.
    pub fn release(&self, holder: &HolderId) -> Result<bool, ArbiterError> {
        let events = self.apply(LockInput::Release {
            holder: holder.clone(),
        })?;
        Ok(!events.is_empty())
    }

    /// Leave the waiter queue
    pub fn cancel(&self, holder: &HolderId) -> Result<(), ArbiterError> {
        self.apply(LockInput::Cancel {
            holder: holder.clone(),
        })?;
        Ok(())
    }

    /// Free an expired lease. Returns the holder that lost it, if any.
    pub fn reclaim_expired(&self) -> Result<Option<HolderId>, ArbiterError> {
        let events = self.apply(LockInput::Tick)?;
        Ok(events.into_iter().find_map(|e| match e {
            Event::LockReclaimed {
                previous_holder, ..
            } => Some(previous_holder),
            _ => None,
        }))
    }

    /// The lock record as currently stored
    pub fn status(&self) -> Result<ResourceLock, ArbiterError> {
        Ok(self.store.load_lock(&self.config)?)
    }

    fn apply(&self, input: LockInput) -> Result<Vec<Event>, ArbiterError> {
        let mut events = Vec::new();
        self.store.update_lock(&self.config, &mut |lock| {
            let (next, produced) = lock.transition(input.clone(), &self.clock);
            events = produced;
            (&next != lock).then_some(next)
        })?;
        for event in &events {
            event.log();
        }
        Ok(events)
    }
}

/// A granted lease. Released when dropped.
pub struct LeaseGuard<S: LeaseStore, C: Clock> {
    arbiter: ResourceArbiter<S, C>,
    holder: HolderId,
    released: bool,
}

impl<S: LeaseStore, C: Clock> LeaseGuard<S, C> {
    pub fn holder(&self) -> &HolderId {
        &self.holder
    }

    pub fn renew(&self) -> Result<(), ArbiterError> {
        self.arbiter.renew(&self.holder)
    }

    pub fn release(mut self) -> Result<(), ArbiterError> {
        self.released = true;
        self.arbiter.release(&self.holder)?;
        Ok(())
    }
}

impl<S: LeaseStore, C: Clock> std::fmt::Debug for LeaseGuard<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseGuard")
            .field("lock", &self.arbiter.config.name)
            .field("holder", &self.holder)
            .finish()
    }
}

impl<S: LeaseStore, C: Clock> Drop for LeaseGuard<S, C> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.arbiter.release(&self.holder) {
            tracing::warn!(holder = %self.holder, error = %e, "failed to release lease on drop");
        }
    }
}

#[cfg(test)]
#[path = "arbiter_tests.rs"]
mod tests;

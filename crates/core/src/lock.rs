// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease lock state machine for exclusive resource access
//!
//! Provides a named lock whose holder must renew a wall-clock lease. A
//! holder that stops renewing is reclaimed once its lease expires; there is
//! no other liveness check. Waiters queue by priority, then request order.

use crate::clock::{delta, Clock};
use crate::event::Event;
use crate::id::HolderId;
use crate::task::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Lease configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseConfig {
    /// Name identifying this lock
    pub name: String,
    /// How long a grant or renewal stays valid
    #[serde(with = "humantime_serde")]
    pub lease: Duration,
}

impl LeaseConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lease: Duration::from_secs(30),
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// Transient: another holder (or a waiter ahead of the caller) has the lock
    #[error("resource busy{}", holder.as_ref().map(|h| format!(" (held by {})", h)).unwrap_or_default())]
    Busy { holder: Option<HolderId> },
    /// The caller's lease expired or was reclaimed
    #[error("lock lost by {holder}")]
    LockLost { holder: HolderId },
}

/// Lock state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LockState {
    Free,
    Held {
        holder: HolderId,
        /// What the holder is doing (task id, job id)
        metadata: Option<String>,
        acquired_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
}

/// A caller blocked in acquire
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waiter {
    pub holder: HolderId,
    pub priority: Priority,
    pub requested_at: DateTime<Utc>,
    /// Arrival order; breaks ties between identical timestamps
    pub seq: u64,
    /// Refreshed on every poll; a waiter silent for a full lease is dropped
    pub last_seen: DateTime<Utc>,
}

/// Events that can trigger lock transitions
#[derive(Clone, Debug)]
pub enum LockInput {
    /// Take the lock if it is free (or expired) and no live waiter ranks ahead
    Acquire {
        holder: HolderId,
        metadata: Option<String>,
    },
    /// Join (or refresh a place in) the waiter queue
    Enqueue {
        holder: HolderId,
        priority: Priority,
    },
    /// Extend the caller's lease
    Renew { holder: HolderId },
    /// Give the lock back; a no-op for anyone but the holder
    Release { holder: HolderId },
    /// Leave the waiter queue
    Cancel { holder: HolderId },
    /// Reclaim an expired lease and prune silent waiters
    Tick,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLock {
    pub config: LeaseConfig,
    pub state: LockState,
    #[serde(default)]
    pub waiters: Vec<Waiter>,
    #[serde(default)]
    pub next_seq: u64,
}

impl ResourceLock {
    pub fn new(config: LeaseConfig) -> Self {
        Self {
            config,
            state: LockState::Free,
            waiters: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn holder(&self) -> Option<&HolderId> {
        match &self.state {
            LockState::Free => None,
            LockState::Held { holder, .. } => Some(holder),
        }
    }

    pub fn is_held_by(&self, holder: &HolderId) -> bool {
        self.holder() == Some(holder)
    }

    /// True when held and the lease has run out
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match &self.state {
            LockState::Free => false,
            LockState::Held { expires_at, .. } => now >= *expires_at,
        }
    }

    /// The holder whose lease is still valid at `now`, if any
    pub fn valid_holder(&self, now: DateTime<Utc>) -> Option<&HolderId> {
        if self.is_expired(now) {
            None
        } else {
            self.holder()
        }
    }

    /// Waiters in grant order: priority first, then request time, then arrival
    pub fn queue(&self) -> Vec<&Waiter> {
        let mut waiters: Vec<&Waiter> = self.waiters.iter().collect();
        waiters.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.requested_at.cmp(&b.requested_at))
                .then(a.seq.cmp(&b.seq))
        });
        waiters
    }

    /// Zero-based place of `holder` in the grant order
    pub fn position(&self, holder: &HolderId) -> Option<usize> {
        self.queue().iter().position(|w| &w.holder == holder)
    }

    fn prune_waiters(&mut self, now: DateTime<Utc>) {
        let lease = delta(self.config.lease);
        self.waiters.retain(|w| now - w.last_seen <= lease);
    }

    fn grant(&mut self, holder: &HolderId, metadata: Option<String>, now: DateTime<Utc>) {
        self.state = LockState::Held {
            holder: holder.clone(),
            metadata,
            acquired_at: now,
            expires_at: now + delta(self.config.lease),
        };
        self.waiters.retain(|w| &w.holder != holder);
    }

    /// Pure state transition function
    pub fn transition(&self, input: LockInput, clock: &impl Clock) -> (ResourceLock, Vec<Event>) {
        let now = clock.now();
        let name = self.config.name.clone();
        let mut lock = self.clone();
        let mut events = Vec::new();

        match input {
            LockInput::Acquire { holder, metadata } => {
                lock.prune_waiters(now);

                if let LockState::Held {
                    holder: current, ..
                } = &self.state
                {
                    if current == &holder && !self.is_expired(now) {
                        // Re-acquire by the holder extends the lease
                        lock.grant(&holder, metadata, now);
                        events.push(Event::LockRenewed { name, holder });
                        return (lock, events);
                    }
                    if !self.is_expired(now) {
                        events.push(Event::LockDenied {
                            name,
                            holder,
                            current_holder: Some(current.clone()),
                        });
                        return (lock, events);
                    }
                }

                let first = lock.queue().first().map(|w| w.holder.clone());
                if let Some(first) = first {
                    if first != holder {
                        events.push(Event::LockDenied {
                            name,
                            holder,
                            current_holder: None,
                        });
                        return (lock, events);
                    }
                }

                if let Some(previous) = self.holder().filter(|_| self.is_expired(now)) {
                    events.push(Event::LockReclaimed {
                        name: name.clone(),
                        previous_holder: previous.clone(),
                        new_holder: Some(holder.clone()),
                    });
                }
                lock.grant(&holder, metadata, now);
                events.push(Event::LockAcquired { name, holder });
            }

            LockInput::Enqueue { holder, priority } => {
                lock.prune_waiters(now);
                if let Some(waiter) = lock.waiters.iter_mut().find(|w| w.holder == holder) {
                    waiter.last_seen = now;
                    waiter.priority = priority;
                } else if !self.is_held_by(&holder) || self.is_expired(now) {
                    lock.waiters.push(Waiter {
                        holder: holder.clone(),
                        priority,
                        requested_at: now,
                        seq: lock.next_seq,
                        last_seen: now,
                    });
                    lock.next_seq += 1;
                    let position = lock.position(&holder).unwrap_or(0);
                    events.push(Event::LockQueued {
                        name,
                        holder,
                        position,
                    });
                }
            }

            LockInput::Renew { holder } => match &self.state {
                LockState::Held {
                    holder: current,
                    metadata,
                    acquired_at,
                    ..
                } if current == &holder && !self.is_expired(now) => {
                    lock.state = LockState::Held {
                        holder: current.clone(),
                        metadata: metadata.clone(),
                        acquired_at: *acquired_at,
                        expires_at: now + delta(self.config.lease),
                    };
                    events.push(Event::LockRenewed { name, holder });
                }
                _ => {
                    events.push(Event::LockLost { name, holder });
                }
            },

            LockInput::Release { holder } => {
                if self.is_held_by(&holder) {
                    lock.state = LockState::Free;
                    events.push(Event::LockReleased { name, holder });
                }
            }

            LockInput::Cancel { holder } => {
                lock.waiters.retain(|w| w.holder != holder);
            }

            LockInput::Tick => {
                if self.is_expired(now) {
                    if let Some(previous) = self.holder() {
                        events.push(Event::LockReclaimed {
                            name,
                            previous_holder: previous.clone(),
                            new_holder: None,
                        });
                    }
                    lock.state = LockState::Free;
                }
                lock.prune_waiters(now);
            }
        }

        (lock, events)
    }

    /// Non-blocking acquire: the new lock state, or `Busy`
    pub fn try_acquire(
        &self,
        holder: &HolderId,
        metadata: Option<String>,
        clock: &impl Clock,
    ) -> Result<(ResourceLock, Vec<Event>), LockError> {
        let (lock, events) = self.transition(
            LockInput::Acquire {
                holder: holder.clone(),
                metadata,
            },
            clock,
        );
        if lock.is_held_by(holder) {
            Ok((lock, events))
        } else {
            Err(LockError::Busy {
                holder: self.valid_holder(clock.now()).cloned(),
            })
        }
    }

    /// Extend the lease, or `LockLost` if the caller no longer holds it
    pub fn renew(
        &self,
        holder: &HolderId,
        clock: &impl Clock,
    ) -> Result<(ResourceLock, Vec<Event>), LockError> {
        let (lock, events) = self.transition(
            LockInput::Renew {
                holder: holder.clone(),
            },
            clock,
        );
        if events
            .iter()
            .any(|e| matches!(e, Event::LockRenewed { .. }))
        {
            Ok((lock, events))
        } else {
            Err(LockError::LockLost {
                holder: holder.clone(),
            })
        }
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;

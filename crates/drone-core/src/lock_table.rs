//! Process-wide drone lock table.
//!
//! Each drone id maps to the connection currently controlling it. Acquire is a
//! compare-and-set on the map entry, so two sessions racing for a free drone
//! never both win. Locks may carry a lease; an expired lease reads as free.

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Identity of one client connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolderId(String);

impl HolderId {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Peer address plus a random suffix, unique per connection.
    pub fn for_peer(addr: SocketAddr) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{}#{}", addr, &suffix[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of an acquire attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    Granted,
    Denied(HolderId),
}

#[derive(Debug, Clone)]
struct LockEntry {
    holder: HolderId,
    acquired_at: DateTime<Utc>,
    expires_at: Option<Instant>,
}

impl LockEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Read-only view of a held lock.
#[derive(Debug, Clone, Serialize)]
pub struct LockSnapshot {
    pub device_id: String,
    pub holder: HolderId,
    pub acquired_at: DateTime<Utc>,
    pub lease_remaining_s: Option<f64>,
}

pub struct LockTable {
    entries: DashMap<String, LockEntry>,
    lease: Option<Duration>,
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new(None)
    }
}

impl LockTable {
    /// `lease` of `None` means locks are held until released.
    pub fn new(lease: Option<Duration>) -> Self {
        Self {
            entries: DashMap::new(),
            lease,
        }
    }

    pub fn lease(&self) -> Option<Duration> {
        self.lease
    }

    pub fn acquire(&self, device_id: &str, holder: &HolderId) -> LockOutcome {
        self.acquire_at(device_id, holder, Instant::now())
    }

    pub fn acquire_at(&self, device_id: &str, holder: &HolderId, now: Instant) -> LockOutcome {
        match self.entries.entry(device_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    tracing::info!(
                        "Lease on drone {} held by {} expired, granting to {}",
                        device_id,
                        occupied.get().holder,
                        holder
                    );
                    occupied.insert(self.entry_for(holder, now));
                    LockOutcome::Granted
                } else {
                    LockOutcome::Denied(occupied.get().holder.clone())
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(self.entry_for(holder, now));
                LockOutcome::Granted
            }
        }
    }

    /// Remove the lock only if `holder` owns it. Returns whether it was removed.
    pub fn release(&self, device_id: &str, holder: &HolderId) -> bool {
        self.entries
            .remove_if(device_id, |_, entry| &entry.holder == holder)
            .is_some()
    }

    pub fn holder_of(&self, device_id: &str) -> Option<HolderId> {
        self.holder_of_at(device_id, Instant::now())
    }

    pub fn holder_of_at(&self, device_id: &str, now: Instant) -> Option<HolderId> {
        self.entries
            .get(device_id)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.holder.clone())
    }

    /// Push the lease of a lock `holder` still owns. False if it was lost.
    pub fn renew(&self, device_id: &str, holder: &HolderId) -> bool {
        self.renew_at(device_id, holder, Instant::now())
    }

    pub fn renew_at(&self, device_id: &str, holder: &HolderId, now: Instant) -> bool {
        match self.entries.get_mut(device_id) {
            Some(mut entry) if &entry.holder == holder && !entry.is_expired(now) => {
                entry.expires_at = self.deadline(now);
                true
            }
            _ => false,
        }
    }

    /// Drop every expired lock and report what was freed.
    pub fn sweep_expired(&self) -> Vec<(String, HolderId)> {
        self.sweep_expired_at(Instant::now())
    }

    pub fn sweep_expired_at(&self, now: Instant) -> Vec<(String, HolderId)> {
        let mut freed = Vec::new();
        self.entries.retain(|device_id, entry| {
            if entry.is_expired(now) {
                freed.push((device_id.clone(), entry.holder.clone()));
                false
            } else {
                true
            }
        });
        freed
    }

    pub fn snapshot(&self) -> Vec<LockSnapshot> {
        let now = Instant::now();
        let mut locks: Vec<LockSnapshot> = self
            .entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .map(|entry| LockSnapshot {
                device_id: entry.key().clone(),
                holder: entry.value().holder.clone(),
                acquired_at: entry.value().acquired_at,
                lease_remaining_s: entry
                    .value()
                    .expires_at
                    .map(|at| at.saturating_duration_since(now).as_secs_f64()),
            })
            .collect();
        locks.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        locks
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    fn entry_for(&self, holder: &HolderId, now: Instant) -> LockEntry {
        LockEntry {
            holder: holder.clone(),
            acquired_at: Utc::now(),
            expires_at: self.deadline(now),
        }
    }

    /// A lease too long to represent as an `Instant` never expires.
    fn deadline(&self, now: Instant) -> Option<Instant> {
        self.lease.and_then(|lease| now.checked_add(lease))
    }
}

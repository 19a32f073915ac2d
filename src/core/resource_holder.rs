//! Capacity accounting for one execution target.
//!
//! A [`ResourceHolder`] tracks total and committed units per
//! [`ResourceKind`] for the server or for a single agent. It performs no
//! locking of its own: every mutation happens under the coordinating lock
//! of the [`ResourceManager`](crate::core::ResourceManager), which is what
//! makes check-then-acquire atomic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::requirement::{ResourceKind, ResourceRequirement};

/// Total vs. committed capacity for one execution target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHolder {
    total: BTreeMap<ResourceKind, u32>,
    committed: BTreeMap<ResourceKind, u32>,
}

impl ResourceHolder {
    /// Create a holder offering `total`, with nothing committed.
    #[must_use]
    pub fn new(total: &ResourceRequirement) -> Self {
        Self {
            total: total.iter().collect(),
            committed: BTreeMap::new(),
        }
    }

    /// Total units for `kind` (zero if the holder does not offer it).
    #[must_use]
    pub fn total(&self, kind: ResourceKind) -> u32 {
        self.total.get(&kind).copied().unwrap_or(0)
    }

    /// Units of `kind` currently committed to running work.
    #[must_use]
    pub fn committed(&self, kind: ResourceKind) -> u32 {
        self.committed.get(&kind).copied().unwrap_or(0)
    }

    /// Free units of `kind`; zero when commitments exceed a shrunken total.
    #[must_use]
    pub fn available(&self, kind: ResourceKind) -> u32 {
        self.total(kind).saturating_sub(self.committed(kind))
    }

    /// Slack score of this holder against `requirement`.
    ///
    /// Returns 0 if any requested dimension has fewer available units than
    /// required. Otherwise returns the smallest available value across the
    /// requested dimensions, floored at 1 so that a satisfiable request never
    /// scores 0. An empty requirement scores 1.
    #[must_use]
    pub fn spare_score(&self, requirement: &ResourceRequirement) -> u32 {
        let mut score = u32::MAX;
        for (kind, units) in requirement.iter() {
            let available = self.available(kind);
            if available < units {
                return 0;
            }
            score = score.min(available);
        }
        if requirement.is_empty() {
            1
        } else {
            score.max(1)
        }
    }

    /// Commit `requirement` against this holder.
    ///
    /// Does not re-check capacity: callers verify `spare_score > 0` under the
    /// same lock immediately before acquiring.
    pub fn acquire(&mut self, requirement: &ResourceRequirement) {
        for (kind, units) in requirement.iter() {
            let committed = self.committed.entry(kind).or_insert(0);
            *committed = committed.saturating_add(units);
        }
    }

    /// Return `requirement` to this holder, clamping at zero.
    pub fn release(&mut self, requirement: &ResourceRequirement) {
        for (kind, units) in requirement.iter() {
            let committed = self.committed.entry(kind).or_insert(0);
            if *committed < units {
                tracing::error!(
                    resource = %kind,
                    committed = *committed,
                    releasing = units,
                    "release exceeds committed units; clamping to zero"
                );
            }
            *committed = committed.saturating_sub(units);
        }
    }

    /// Replace the total for one dimension, leaving commitments untouched.
    pub fn update_total(&mut self, kind: ResourceKind, total: u32) {
        self.total.insert(kind, total);
    }
}

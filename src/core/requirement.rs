//! Resource dimensions and additive requirements.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// A resource dimension tracked by a holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// CPU, in millicores.
    Cpu,
    /// Memory, in megabytes.
    Memory,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Units per resource dimension.
///
/// Used both for what a unit of work needs and for what a holder offers.
/// Dimensions that are absent count as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceRequirement(BTreeMap<ResourceKind, u32>);

impl ResourceRequirement {
    /// An empty requirement, satisfiable by any holder.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Requirement over both standard dimensions.
    #[must_use]
    pub fn cpu_memory(cpu: u32, memory: u32) -> Self {
        Self::new()
            .with(ResourceKind::Cpu, cpu)
            .with(ResourceKind::Memory, memory)
    }

    /// Set the units for one dimension.
    #[must_use]
    pub fn with(mut self, kind: ResourceKind, units: u32) -> Self {
        self.0.insert(kind, units);
        self
    }

    /// Units requested for `kind` (zero when absent).
    #[must_use]
    pub fn get(&self, kind: ResourceKind) -> u32 {
        self.0.get(&kind).copied().unwrap_or(0)
    }

    /// True when no dimension is requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate requested dimensions in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, u32)> + '_ {
        self.0.iter().map(|(kind, units)| (*kind, *units))
    }
}

impl FromIterator<(ResourceKind, u32)> for ResourceRequirement {
    fn from_iter<I: IntoIterator<Item = (ResourceKind, u32)>>(iter: I) -> Self {
        let mut requirement = Self::new();
        for (kind, units) in iter {
            requirement += Self::new().with(kind, units);
        }
        requirement
    }
}

impl AddAssign<&Self> for ResourceRequirement {
    fn add_assign(&mut self, rhs: &Self) {
        for (kind, units) in rhs.iter() {
            let entry = self.0.entry(kind).or_insert(0);
            *entry = entry.saturating_add(units);
        }
    }
}

impl AddAssign for ResourceRequirement {
    fn add_assign(&mut self, rhs: Self) {
        *self += &rhs;
    }
}

impl Add for ResourceRequirement {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += &rhs;
        self
    }
}

impl fmt::Display for ResourceRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (kind, units) in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{kind}={units}")?;
            first = false;
        }
        Ok(())
    }
}

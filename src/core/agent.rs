//! Agent records, declarative filters and the agent directory contract.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::error::SchedulerError;
use crate::core::requirement::ResourceRequirement;

/// Agent identifier.
pub type AgentId = u64;

/// Display names of the built-in agent fields. Custom attributes may not
/// reuse them, otherwise filters could not tell the two apart.
pub const AGENT_FIELDS: &[&str] = &["Name", "Ip Address", "Os", "Os Version", "Os Arch"];

/// Reject attribute names that collide with a built-in agent field.
///
/// # Errors
///
/// Returns [`SchedulerError::ReservedAttribute`] for a reserved name.
pub fn validate_attribute_name(name: &str) -> Result<(), SchedulerError> {
    if AGENT_FIELDS.contains(&name) {
        return Err(SchedulerError::ReservedAttribute(name.to_string()));
    }
    Ok(())
}

/// What an agent advertises when it connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Agent identifier.
    pub id: AgentId,
    /// Agent name.
    pub name: String,
    /// Address the agent connected from.
    pub ip_address: String,
    /// Operating system name.
    pub os_name: String,
    /// Operating system version.
    pub os_version: String,
    /// CPU architecture.
    pub os_arch: String,
    /// Advertised capacity.
    pub resources: ResourceRequirement,
    attributes: BTreeMap<String, String>,
}

impl AgentRecord {
    /// Create a record with the given identity and capacity.
    #[must_use]
    pub fn new(id: AgentId, name: impl Into<String>, resources: ResourceRequirement) -> Self {
        Self {
            id,
            name: name.into(),
            ip_address: String::new(),
            os_name: String::new(),
            os_version: String::new(),
            os_arch: String::new(),
            resources,
            attributes: BTreeMap::new(),
        }
    }

    /// Set operating system name, version and architecture.
    #[must_use]
    pub fn with_os(
        mut self,
        name: impl Into<String>,
        version: impl Into<String>,
        arch: impl Into<String>,
    ) -> Self {
        self.os_name = name.into();
        self.os_version = version.into();
        self.os_arch = arch.into();
        self
    }

    /// Set a custom attribute.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::ReservedAttribute`] if `name` is a built-in
    /// field name.
    pub fn set_attribute(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), SchedulerError> {
        let name = name.into();
        validate_attribute_name(&name)?;
        self.attributes.insert(name, value.into());
        Ok(())
    }

    /// Look up a custom attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// All custom attributes.
    #[must_use]
    pub const fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }
}

/// Opaque agent filter.
///
/// Parsing of the textual query language lives elsewhere; the scheduler
/// only needs a predicate it can evaluate against a connected agent.
pub trait AgentQuery: Send + Sync {
    /// Whether `agent` satisfies this filter.
    fn matches(&self, agent: &AgentRecord) -> bool;
}

impl<F> AgentQuery for F
where
    F: Fn(&AgentRecord) -> bool + Send + Sync,
{
    fn matches(&self, agent: &AgentRecord) -> bool {
        self(agent)
    }
}

/// Parsed agent criteria.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentCriteria {
    /// Every agent.
    All,
    /// Agent name equals the value.
    Name(String),
    /// Operating system name equals the value, ignoring case.
    Os(String),
    /// Architecture equals the value, ignoring case.
    OsArch(String),
    /// Custom attribute equals the value.
    Attribute {
        /// Attribute name.
        name: String,
        /// Expected value.
        value: String,
    },
    /// Negation.
    Not(Box<AgentCriteria>),
    /// All sub-criteria hold.
    And(Vec<AgentCriteria>),
    /// Any sub-criterion holds.
    Or(Vec<AgentCriteria>),
}

impl AgentQuery for AgentCriteria {
    fn matches(&self, agent: &AgentRecord) -> bool {
        match self {
            Self::All => true,
            Self::Name(name) => agent.name == *name,
            Self::Os(os) => agent.os_name.eq_ignore_ascii_case(os),
            Self::OsArch(arch) => agent.os_arch.eq_ignore_ascii_case(arch),
            Self::Attribute { name, value } => agent.attribute(name) == Some(value.as_str()),
            Self::Not(inner) => !inner.matches(agent),
            Self::And(all) => all.iter().all(|c| c.matches(agent)),
            Self::Or(any) => any.iter().any(|c| c.matches(agent)),
        }
    }
}

/// Directory of agents known to the server.
///
/// Implemented by whatever owns agent connections. The scheduler only asks
/// it for a live communication handle at dispatch time and for the pause
/// flags of all known agents when the system starts.
pub trait AgentDirectory: Send + Sync {
    /// Live communication handle to one agent.
    type Session: Send;

    /// Handle to `agent_id`, or `None` if it is no longer reachable.
    fn session(&self, agent_id: AgentId) -> Option<Self::Session>;

    /// Pause flag of every known agent, connected or not.
    fn paused_flags(&self) -> Vec<(AgentId, bool)>;
}

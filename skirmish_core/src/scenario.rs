//! Scenario boundary: the plain data the engine is constructed from.
//!
//! Loading and authoring of scenarios lives outside this crate; the engine
//! only consumes these structs.

use crate::host::{HostFile, Interface, User};
use crate::session::{AgentKind, NewSession};
use crate::subnet::Zone;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

/// A subnet definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubnetDef {
    pub name: String,
    pub cidr: Ipv4Net,
    pub zone: Zone,
}

/// A service definition on a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDef {
    pub name: String,
    pub active: bool,
    /// Percent chance that a use of the service succeeds
    pub reliability: u8,
    pub port: u16,
    /// Agent that owns the service's session
    pub agent: String,
    pub username: String,
}

/// A host definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostDef {
    pub hostname: String,
    pub interfaces: Vec<Interface>,
    #[serde(default)]
    pub services: Vec<ServiceDef>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub files: Vec<HostFile>,
    #[serde(default)]
    pub is_server: bool,
    #[serde(default = "default_os")]
    pub os: String,
    #[serde(default = "default_architecture")]
    pub architecture: String,
}

fn default_os() -> String {
    "linux".to_string()
}

fn default_architecture() -> String {
    "x86_64".to_string()
}

/// An agent registration.
///
/// `allowed_subnets` applies to green agents only: one list of subnet names
/// per mission phase, indexed by `Phase::index()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDef {
    pub name: String,
    pub kind: AgentKind,
    #[serde(default)]
    pub allowed_subnets: Vec<Vec<String>>,
}

/// The complete construction input for a state engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub subnets: Vec<SubnetDef>,
    pub hosts: Vec<HostDef>,
    pub agents: Vec<AgentDef>,
    /// Starting sessions; entries with a parent must come after the parent.
    #[serde(default)]
    pub sessions: Vec<NewSession>,
    /// Initial firewall block rules as (blocking zone, blocked zone) pairs.
    #[serde(default)]
    pub blocks: Vec<(Zone, Zone)>,
    /// Cumulative step budget per phase; the last entry bounds the episode.
    pub phase_steps: Vec<u64>,
}

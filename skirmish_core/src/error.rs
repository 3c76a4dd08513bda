//! Error types for the wargame state engine.
//!
//! Only bookkeeping and configuration failures surface as errors. Outcomes
//! that are merely unfavorable for an agent (unreachable target, firewall
//! block, unreliable service) are reported as unsuccessful observations and
//! never reach this enum.

use thiserror::Error;

/// Errors raised by the state engine and action constructors.
#[derive(Debug, Error)]
pub enum SimError {
    /// A session id was explicitly requested but is already taken
    /// within that agent's namespace.
    #[error("duplicate session id {id} for agent {agent}")]
    DuplicateSession { agent: String, id: u32 },

    /// A hostname that is not present in the host table.
    #[error("unknown host: {0}")]
    UnknownHost(String),

    /// An agent name with no entry in the agent registry.
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    /// A session reference that does not resolve in the global table.
    #[error("unknown session {id} for agent {agent}")]
    UnknownSession { agent: String, id: u32 },

    /// A service name not configured on the given host.
    #[error("unknown service {service} on host {hostname}")]
    UnknownService { hostname: String, service: String },

    /// No configured subnet contains the given address. With a well-formed
    /// topology this indicates a corrupted engine, not a runtime condition.
    #[error("no subnet contains address {0}")]
    SubnetNotFound(std::net::Ipv4Addr),

    /// A step number beyond the final phase boundary of the schedule.
    #[error("step {step} exceeds the configured phase schedule (last boundary {last})")]
    StepOutOfRange { step: u64, last: u64 },

    /// A true-state query without a field selector.
    #[error("true-state query requires a field selector")]
    MissingFilter,

    /// An action rate parameter outside [0, 1].
    #[error("rate parameter {name} = {value} is outside [0, 1]")]
    InvalidRate { name: &'static str, value: f64 },

    /// Malformed scenario data detected at construction time.
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),
}

impl SimError {
    /// Creates an invalid-scenario error.
    pub fn scenario(msg: impl Into<String>) -> Self {
        Self::InvalidScenario(msg.into())
    }
}

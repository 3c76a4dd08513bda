//! Agent sessions: logical footholds of an agent on a host.
//!
//! The global per-agent session table owns every session; hosts reference
//! sessions only by id. Ids are unique within the owning agent's namespace,
//! not globally.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The role of an agent in the exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    /// Attacker
    Red,

    /// Defender
    Blue,

    /// Background traffic
    Green,
}

/// How a session came to exist on its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionType {
    /// Interactive shell foothold
    Shell,

    /// Session provisioned for a running service
    Service,

    /// Foothold gained through a phishing lure
    Phished,
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionType::Shell => "shell",
            SessionType::Service => "service",
            SessionType::Phished => "phished",
        };
        write!(f, "{}", name)
    }
}

/// A request to register a session.
///
/// `id` is usually left unset so the engine assigns the next free id in the
/// agent's namespace; an explicit id that is already occupied is rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSession {
    /// Explicit id, or None to let the engine assign one
    pub id: Option<u32>,

    /// Owning agent name
    pub agent: String,

    /// Host the session lives on
    pub hostname: String,

    /// Username the session runs as
    pub username: String,

    /// Backing process, if any
    pub pid: Option<u32>,

    /// Session type tag
    pub session_type: SessionType,

    /// Parent session id within the same agent's namespace
    pub parent: Option<u32>,
}

impl NewSession {
    /// Creates a request with an engine-assigned id and no parent.
    pub fn new(
        agent: impl Into<String>,
        hostname: impl Into<String>,
        username: impl Into<String>,
        session_type: SessionType,
    ) -> Self {
        Self {
            id: None,
            agent: agent.into(),
            hostname: hostname.into(),
            username: username.into(),
            pid: None,
            session_type,
            parent: None,
        }
    }

    /// Requests an explicit id.
    pub fn with_id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }

    /// Attaches a backing process.
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Declares a parent session.
    pub fn with_parent(mut self, parent: u32) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// A registered session in the global table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Id, unique within the owning agent's namespace
    pub id: u32,

    /// Owning agent name
    pub agent: String,

    /// Host the session lives on
    pub hostname: String,

    /// Username the session runs as
    pub username: String,

    /// Backing process, if any
    pub pid: Option<u32>,

    /// Session type tag
    pub session_type: SessionType,

    /// Parent session id, if this session was spawned from another
    pub parent: Option<u32>,

    /// Child session ids spawned from this one
    pub children: BTreeSet<u32>,
}

impl Session {
    /// Builds the registered form of a request once an id is settled.
    pub fn from_request(id: u32, request: NewSession) -> Self {
        Self {
            id,
            agent: request.agent,
            hostname: request.hostname,
            username: request.username,
            pid: request.pid,
            session_type: request.session_type,
            parent: request.parent,
            children: BTreeSet::new(),
        }
    }

    /// Turns a registered session back into a request, dropping its id so
    /// the engine assigns a fresh one.
    pub fn into_request(self) -> NewSession {
        NewSession {
            id: None,
            agent: self.agent,
            hostname: self.hostname,
            username: self.username,
            pid: self.pid,
            session_type: self.session_type,
            parent: self.parent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = NewSession::new("green_0", "office_pc_1", "greta", SessionType::Shell)
            .with_id(3)
            .with_parent(0);

        assert_eq!(request.id, Some(3));
        assert_eq!(request.parent, Some(0));
        assert_eq!(request.pid, None);
    }

    #[test]
    fn test_from_request_keeps_parent() {
        let request = NewSession::new("red_0", "web_server", "www", SessionType::Service)
            .with_pid(1044)
            .with_parent(1);

        let session = Session::from_request(7, request);
        assert_eq!(session.id, 7);
        assert_eq!(session.parent, Some(1));
        assert_eq!(session.pid, Some(1044));
        assert!(session.children.is_empty());
    }
}

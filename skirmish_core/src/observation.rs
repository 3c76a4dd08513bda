//! Observations returned by actions and by the true-state oracle view.

use crate::session::SessionType;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Session details surfaced to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub agent: String,
    pub id: u32,
    pub hostname: String,
    pub username: String,
    pub session_type: SessionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

/// Interface details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceInfo {
    pub hostname: String,
    pub ip: Ipv4Addr,
    pub subnet: String,
}

/// Process details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub hostname: String,
    pub pid: u32,
    pub name: String,
    pub username: String,
}

/// File details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub hostname: String,
    pub path: String,
    pub name: String,
    pub owner: String,
}

/// User account details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub hostname: String,
    pub username: String,
    pub groups: Vec<String>,
}

/// Coarse host identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub hostname: String,
    pub os: String,
    pub architecture: String,
}

/// Service details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub hostname: String,
    pub name: String,
    pub active: bool,
    pub reliability: u8,
    pub port: u16,
}

/// The result of executing one action, or a projection of engine state.
///
/// `success` is None for pure information views; actions always set it.
/// Sub-records are additive: merging two observations concatenates the
/// record lists, which is how a nested sub-action folds its result into
/// the outer action's observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Whether the producing action succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub sessions: Vec<SessionInfo>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub interfaces: Vec<InterfaceInfo>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub processes: Vec<ProcessInfo>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub files: Vec<FileInfo>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub users: Vec<UserInfo>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub system: Vec<SystemInfo>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub services: Vec<ServiceInfo>,
}

impl Observation {
    /// An observation reporting success with no records.
    pub fn succeeded() -> Self {
        Self {
            success: Some(true),
            ..Self::default()
        }
    }

    /// An observation reporting failure with no records.
    pub fn failed() -> Self {
        Self {
            success: Some(false),
            ..Self::default()
        }
    }

    /// Returns true when the success flag is set and true.
    pub fn is_success(&self) -> bool {
        self.success == Some(true)
    }

    /// Folds another observation into this one. Record lists concatenate;
    /// the receiver's success flag wins when both are set, so an outer
    /// action's outcome is not overwritten by a nested sub-action.
    pub fn merge(&mut self, other: Observation) {
        self.success = self.success.or(other.success);
        self.sessions.extend(other.sessions);
        self.interfaces.extend(other.interfaces);
        self.processes.extend(other.processes);
        self.files.extend(other.files);
        self.users.extend(other.users);
        self.system.extend(other.system);
        self.services.extend(other.services);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_is_additive() {
        let mut outer = Observation::succeeded();
        let mut inner = Observation::failed();
        inner.sessions.push(SessionInfo {
            agent: "red_0".to_string(),
            id: 2,
            hostname: "office_pc_1".to_string(),
            username: "user".to_string(),
            session_type: SessionType::Phished,
            pid: None,
        });

        outer.merge(inner);

        // The outer action already settled its own outcome.
        assert_eq!(outer.success, Some(true));
        assert_eq!(outer.sessions.len(), 1);
    }

    #[test]
    fn test_merge_fills_unset_success() {
        let mut view = Observation::default();
        view.merge(Observation::failed());
        assert_eq!(view.success, Some(false));
    }
}

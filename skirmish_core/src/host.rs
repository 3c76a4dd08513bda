//! Per-host state: interfaces, services, processes, users, files, session
//! references, and the pending side-effect event queue.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::net::Ipv4Addr;

/// Name of the distinguished operational-technology service. Remote access
/// prefers this service over any other when it is configured on a host.
pub const OT_SERVICE: &str = "ot_service";

/// First pid handed out by a host's allocator.
const FIRST_PID: u32 = 1000;

/// Physical kind of a network interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InterfaceKind {
    /// Fixed cabling; link reachability never changes during an episode.
    Wired,

    /// Radio link; reachability follows position and range.
    Wireless {
        /// Antenna position in meters
        position: Vector3<f64>,

        /// Maximum usable radio range in meters
        max_range: f64,
    },
}

/// A network interface on a host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    /// Interface address; maps to exactly one host and one subnet
    pub ip: Ipv4Addr,

    /// Name of the subnet this interface belongs to
    pub subnet: String,

    /// Wired or wireless
    pub kind: InterfaceKind,
}

impl Interface {
    /// Creates a wired interface.
    pub fn wired(ip: Ipv4Addr, subnet: impl Into<String>) -> Self {
        Self {
            ip,
            subnet: subnet.into(),
            kind: InterfaceKind::Wired,
        }
    }

    /// Creates a wireless interface.
    pub fn wireless(
        ip: Ipv4Addr,
        subnet: impl Into<String>,
        position: Vector3<f64>,
        max_range: f64,
    ) -> Self {
        Self {
            ip,
            subnet: subnet.into(),
            kind: InterfaceKind::Wireless { position, max_range },
        }
    }

    /// Returns true for wireless interfaces.
    pub fn is_wireless(&self) -> bool {
        matches!(self.kind, InterfaceKind::Wireless { .. })
    }
}

/// A service configured on a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    /// Whether the service currently accepts work
    pub active: bool,

    /// Percent chance that a use of this service succeeds
    pub reliability: u8,

    /// Listening port
    pub port: u16,

    /// Backing process, if provisioned
    pub process: Option<u32>,

    /// Agent that owns the service's session
    pub agent: String,

    /// Username the service runs as
    pub username: String,
}

/// An entry in a host's process table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Process {
    /// Process id, unique on the host
    pub pid: u32,

    /// Parent process id
    pub ppid: Option<u32>,

    /// Executable name
    pub name: String,

    /// Owning username
    pub username: String,
}

/// A local user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Account name
    pub username: String,

    /// Group memberships
    pub groups: Vec<String>,
}

/// A file visible in observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostFile {
    /// File name
    pub name: String,

    /// Directory path
    pub path: String,

    /// Owning username
    pub owner: String,

    /// Permission bits, octal
    pub permissions: u16,
}

/// A pending side-effect event, queued on the host it was observed on and
/// consumed once per step by external detector logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostEvent {
    /// An inbound connection attempt reached this host.
    NetworkConnection {
        /// Address the connection arrived on
        local_address: Ipv4Addr,

        /// Originating address
        remote_address: Ipv4Addr,

        /// Originating port
        remote_port: u16,
    },

    /// A process appeared on this host.
    ProcessCreation {
        /// Address of the interface the activity was attributed to
        local_address: Ipv4Addr,

        /// Pid of the new process
        pid: u32,
    },
}

/// One simulated machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    /// Unique hostname
    pub hostname: String,

    /// Network interfaces
    pub interfaces: Vec<Interface>,

    /// Services by name
    pub services: BTreeMap<String, Service>,

    /// Process table
    pub processes: Vec<Process>,

    /// Local user accounts
    pub users: Vec<User>,

    /// Files visible in observations
    pub files: Vec<HostFile>,

    /// Per-agent lists of session ids present on this host. Non-owning;
    /// the global session table is authoritative.
    pub sessions: BTreeMap<String, Vec<u32>>,

    /// Pending side-effect events
    pub events: VecDeque<HostEvent>,

    /// Whether this host is a server (a candidate for remote access)
    pub is_server: bool,

    /// Operating system name
    pub os: String,

    /// Hardware architecture
    pub architecture: String,

    /// Next pid to hand out
    next_pid: u32,
}

impl Host {
    /// Creates an empty host.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            interfaces: Vec::new(),
            services: BTreeMap::new(),
            processes: Vec::new(),
            users: Vec::new(),
            files: Vec::new(),
            sessions: BTreeMap::new(),
            events: VecDeque::new(),
            is_server: false,
            os: "linux".to_string(),
            architecture: "x86_64".to_string(),
            next_pid: FIRST_PID,
        }
    }

    /// Primary address of the host, from its first interface.
    pub fn primary_ip(&self) -> Option<Ipv4Addr> {
        self.interfaces.first().map(|i| i.ip)
    }

    /// Returns true if any interface is wireless.
    pub fn has_wireless(&self) -> bool {
        self.interfaces.iter().any(Interface::is_wireless)
    }

    /// Spawns a process and returns its pid.
    pub fn spawn_process(
        &mut self,
        name: impl Into<String>,
        username: impl Into<String>,
        ppid: Option<u32>,
    ) -> u32 {
        let pid = self.next_pid;
        self.next_pid += 1;
        self.processes.push(Process {
            pid,
            ppid,
            name: name.into(),
            username: username.into(),
        });
        pid
    }

    /// Removes a process by pid. Returns the entry if it existed.
    pub fn remove_process_entry(&mut self, pid: u32) -> Option<Process> {
        let index = self.processes.iter().position(|p| p.pid == pid)?;
        Some(self.processes.remove(index))
    }

    /// Names of currently active services, in name order.
    pub fn active_services(&self) -> Vec<String> {
        self.services
            .iter()
            .filter(|(_, service)| service.active)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Appends a pending side-effect event.
    pub fn push_event(&mut self, event: HostEvent) {
        self.events.push_back(event);
    }

    /// Drains all pending events in arrival order.
    pub fn drain_events(&mut self) -> Vec<HostEvent> {
        self.events.drain(..).collect()
    }

    /// Records a session id under an agent.
    pub fn attach_session(&mut self, agent: &str, id: u32) {
        self.sessions.entry(agent.to_string()).or_default().push(id);
    }

    /// Removes a session id from an agent's list.
    pub fn detach_session(&mut self, agent: &str, id: u32) {
        if let Some(list) = self.sessions.get_mut(agent) {
            list.retain(|&existing| existing != id);
            if list.is_empty() {
                self.sessions.remove(agent);
            }
        }
    }

    /// Session ids present for the given agent.
    pub fn sessions_of(&self, agent: &str) -> &[u32] {
        self.sessions.get(agent).map(Vec::as_slice).unwrap_or(&[])
    }
}

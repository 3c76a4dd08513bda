//! The aggregate simulation state and its mutation API.
//!
//! `SimState` is the single owner of all hosts, the global session tables,
//! subnet membership, firewall block rules, the connectivity graph, and the
//! mission-phase counter. Actions and external collaborators mutate it only
//! through this API, one at a time, within a step.
//!
//! All maps are ordered so that iteration feeding a seeded random draw is
//! stable across runs.

use crate::error::SimError;
use crate::host::{Host, HostEvent, InterfaceKind, Service};
use crate::observation::{
    FileInfo, InterfaceInfo, Observation, ProcessInfo, ServiceInfo, SessionInfo, SystemInfo,
    UserInfo,
};
use crate::phase::Phase;
use crate::scenario::{AgentDef, Scenario, ServiceDef};
use crate::session::{AgentKind, NewSession, Session, SessionType};
use crate::subnet::{Subnet, Zone};
use crate::topology::TopologyGraph;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use tracing::{debug, info};

/// Per-host field selector for the true-state oracle view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InfoKind {
    Interfaces,
    Sessions,
    Processes,
    Files,
    Users,
    Services,
    SystemInfo,
}

/// Selects which fields of which hosts a true-state query projects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateFilter {
    pub hosts: BTreeMap<String, BTreeSet<InfoKind>>,
}

impl StateFilter {
    /// Creates an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects fields for one host.
    pub fn host(mut self, hostname: impl Into<String>, kinds: &[InfoKind]) -> Self {
        self.hosts
            .entry(hostname.into())
            .or_default()
            .extend(kinds.iter().copied());
        self
    }
}

/// The simulation state engine.
#[derive(Debug)]
pub struct SimState {
    /// All hosts by hostname
    hosts: BTreeMap<String, Host>,

    /// Global session tables: agent name to id to session
    sessions: BTreeMap<String, BTreeMap<u32, Session>>,

    /// Count of sessions ever created per agent
    session_counters: BTreeMap<String, u32>,

    /// All subnets, scan order for CIDR containment
    subnets: Vec<Subnet>,

    /// Hostnames per subnet name
    subnet_hosts: BTreeMap<String, Vec<String>>,

    /// Host lookup by interface address
    ip_hosts: BTreeMap<Ipv4Addr, String>,

    /// Firewall block rules: zone to the zones it refuses traffic with
    blocks: BTreeMap<Zone, BTreeSet<Zone>>,

    /// Live connectivity graph
    topology: TopologyGraph,

    /// Current mission phase; never decreases within an episode
    phase: Phase,

    /// Cumulative step budget per phase
    phase_steps: Vec<u64>,

    /// Registered agents
    agents: BTreeMap<String, AgentDef>,
}

impl SimState {
    /// Builds the engine from a scenario. Malformed scenario data is a
    /// fatal configuration error.
    pub fn from_scenario(scenario: &Scenario) -> Result<Self, SimError> {
        if scenario.phase_steps.len() != Phase::ALL.len() {
            return Err(SimError::scenario(format!(
                "phase schedule must have {} entries, got {}",
                Phase::ALL.len(),
                scenario.phase_steps.len()
            )));
        }
        if !scenario.phase_steps.windows(2).all(|w| w[0] < w[1]) {
            return Err(SimError::scenario("phase schedule must be strictly increasing"));
        }

        let mut state = Self {
            hosts: BTreeMap::new(),
            sessions: BTreeMap::new(),
            session_counters: BTreeMap::new(),
            subnets: Vec::new(),
            subnet_hosts: BTreeMap::new(),
            ip_hosts: BTreeMap::new(),
            blocks: BTreeMap::new(),
            topology: TopologyGraph::new(),
            phase: Phase::Preplanning,
            phase_steps: scenario.phase_steps.clone(),
            agents: BTreeMap::new(),
        };

        for def in &scenario.subnets {
            if state.subnet_hosts.contains_key(&def.name) {
                return Err(SimError::scenario(format!("duplicate subnet {}", def.name)));
            }
            state.subnets.push(Subnet::new(&def.name, def.cidr, def.zone));
            state.subnet_hosts.insert(def.name.clone(), Vec::new());
        }

        for def in &scenario.agents {
            if state.agents.contains_key(&def.name) {
                return Err(SimError::scenario(format!("duplicate agent {}", def.name)));
            }
            for phase_list in &def.allowed_subnets {
                for subnet in phase_list {
                    if !state.subnet_hosts.contains_key(subnet) {
                        return Err(SimError::scenario(format!(
                            "agent {} references unknown subnet {}",
                            def.name, subnet
                        )));
                    }
                }
            }
            state.agents.insert(def.name.clone(), def.clone());
        }

        for def in &scenario.hosts {
            if state.hosts.contains_key(&def.hostname) {
                return Err(SimError::scenario(format!("duplicate host {}", def.hostname)));
            }
            let mut host = Host::new(&def.hostname);
            for interface in &def.interfaces {
                if !state.subnet_hosts.contains_key(&interface.subnet) {
                    return Err(SimError::scenario(format!(
                        "host {} references unknown subnet {}",
                        def.hostname, interface.subnet
                    )));
                }
                if state.ip_hosts.contains_key(&interface.ip) {
                    return Err(SimError::scenario(format!("duplicate address {}", interface.ip)));
                }
                state.ip_hosts.insert(interface.ip, def.hostname.clone());
                if let Some(members) = state.subnet_hosts.get_mut(&interface.subnet) {
                    members.push(def.hostname.clone());
                }
                host.interfaces.push(interface.clone());
            }
            host.users = def.users.clone();
            host.files = def.files.clone();
            host.is_server = def.is_server;
            host.os = def.os.clone();
            host.architecture = def.architecture.clone();
            state.topology.add_node(&def.hostname);
            state.hosts.insert(def.hostname.clone(), host);
        }

        // Wired links: every pair of hosts with wired interfaces on the
        // same subnet shares a data link.
        let membership = state.subnet_hosts.clone();
        for (subnet, members) in &membership {
            for (i, a) in members.iter().enumerate() {
                for b in members.iter().skip(i + 1) {
                    let both_wired = [a, b].iter().all(|hostname| {
                        state.hosts.get(*hostname).is_some_and(|host| {
                            host.interfaces
                                .iter()
                                .any(|iface| iface.subnet == *subnet && !iface.is_wireless())
                        })
                    });
                    if both_wired {
                        state.topology.add_wired_edge(a, b);
                    }
                }
            }
        }
        state.update_wireless_topology();

        for def in &scenario.hosts {
            for service in &def.services {
                state.install_service(&def.hostname, service)?;
            }
        }

        for request in &scenario.sessions {
            state.add_session(request.clone())?;
        }

        for (blocking, blocked) in &scenario.blocks {
            state.block_zone(*blocking, *blocked);
        }

        info!(
            scenario = %scenario.name,
            hosts = state.hosts.len(),
            subnets = state.subnets.len(),
            agents = state.agents.len(),
            "state engine constructed"
        );
        Ok(state)
    }

    // ── Sessions ────────────────────────────────────────────────────────

    /// Registers a session.
    ///
    /// An unset id gets `max(existing) + 1` within the agent's namespace
    /// (0 when the namespace is empty); an explicit id that is occupied is
    /// rejected. The global table, the host's per-agent list, and the
    /// parent's child set are updated together; callers never observe a
    /// partial registration.
    pub fn add_session(&mut self, request: NewSession) -> Result<u32, SimError> {
        if !self.hosts.contains_key(&request.hostname) {
            return Err(SimError::UnknownHost(request.hostname));
        }
        let agent = request.agent.clone();
        let table = self.sessions.entry(agent.clone()).or_default();

        let id = match request.id {
            Some(id) => {
                if table.contains_key(&id) {
                    return Err(SimError::DuplicateSession { agent, id });
                }
                id
            }
            None => table.keys().next_back().map_or(0, |max| max + 1),
        };
        if let Some(parent) = request.parent {
            if !table.contains_key(&parent) {
                return Err(SimError::UnknownSession { agent, id: parent });
            }
        }

        let hostname = request.hostname.clone();
        let parent = request.parent;
        table.insert(id, Session::from_request(id, request));
        if let Some(parent) = parent {
            if let Some(parent_session) = table.get_mut(&parent) {
                parent_session.children.insert(id);
            }
        }
        *self.session_counters.entry(agent.clone()).or_insert(0) += 1;
        if let Some(host) = self.hosts.get_mut(&hostname) {
            host.attach_session(&agent, id);
        }
        debug!(agent = %agent, id, host = %hostname, "session added");
        Ok(id)
    }

    /// Removes a session, detaching it from its parent's child set and its
    /// host's per-agent list. Children of the removed session lose their
    /// parent reference. Returns the removed session, or None if it did
    /// not exist.
    pub fn remove_session(&mut self, agent: &str, id: u32) -> Option<Session> {
        let table = self.sessions.get_mut(agent)?;
        let session = table.remove(&id)?;

        if let Some(parent) = session.parent {
            if let Some(parent_session) = table.get_mut(&parent) {
                parent_session.children.remove(&id);
            }
        }
        for child in &session.children {
            if let Some(child_session) = table.get_mut(child) {
                child_session.parent = None;
            }
        }
        if table.is_empty() {
            self.sessions.remove(agent);
        }
        if let Some(host) = self.hosts.get_mut(&session.hostname) {
            host.detach_session(agent, id);
        }
        debug!(agent = %agent, id, host = %session.hostname, "session removed");
        Some(session)
    }

    /// Looks up a session.
    pub fn session(&self, agent: &str, id: u32) -> Option<&Session> {
        self.sessions.get(agent)?.get(&id)
    }

    /// All sessions of an agent, in id order.
    pub fn sessions_of(&self, agent: &str) -> Vec<&Session> {
        self.sessions
            .get(agent)
            .map(|table| table.values().collect())
            .unwrap_or_default()
    }

    /// Returns true if the agent currently holds at least one session.
    pub fn has_active_session(&self, agent: &str) -> bool {
        self.sessions.get(agent).is_some_and(|table| !table.is_empty())
    }

    /// Count of sessions ever created for an agent.
    pub fn sessions_created(&self, agent: &str) -> u32 {
        self.session_counters.get(agent).copied().unwrap_or(0)
    }

    // ── Processes and services ──────────────────────────────────────────

    /// Removes a process from a host. A pid that is not present is a
    /// no-op. An active service backed by the pid survives with a fresh
    /// placeholder process, decoupled from any session. A plain session
    /// process takes its session down with it; a service-type session is
    /// re-provisioned immediately so the service outlives process churn.
    pub fn remove_process(&mut self, hostname: &str, pid: u32) -> Result<(), SimError> {
        let removed = {
            let host = self
                .hosts
                .get_mut(hostname)
                .ok_or_else(|| SimError::UnknownHost(hostname.to_string()))?;
            host.remove_process_entry(pid)
        };
        if removed.is_none() {
            return Ok(());
        }

        let service_name = self.hosts.get(hostname).and_then(|host| {
            host.services
                .iter()
                .find(|(_, service)| service.active && service.process == Some(pid))
                .map(|(name, _)| name.clone())
        });

        if let Some(name) = service_name {
            if let Some(host) = self.hosts.get_mut(hostname) {
                let username = host
                    .services
                    .get(&name)
                    .map(|service| service.username.clone())
                    .unwrap_or_default();
                let fresh = host.spawn_process(&name, username, None);
                if let Some(service) = host.services.get_mut(&name) {
                    service.process = Some(fresh);
                }
            }
            for table in self.sessions.values_mut() {
                for session in table.values_mut() {
                    if session.hostname == hostname && session.pid == Some(pid) {
                        session.pid = None;
                    }
                }
            }
            debug!(host = hostname, service = %name, pid, "service process replaced");
            return Ok(());
        }

        let owner = self.sessions.iter().find_map(|(agent, table)| {
            table
                .values()
                .find(|session| session.hostname == hostname && session.pid == Some(pid))
                .map(|session| (agent.clone(), session.id))
        });
        if let Some((agent, id)) = owner {
            if let Some(session) = self.remove_session(&agent, id) {
                if session.session_type == SessionType::Service {
                    let username = session.username.clone();
                    let fresh = self.hosts.get_mut(hostname).map(|host| {
                        let fresh = host.spawn_process(&username, &username, None);
                        if let Some(service) = host.services.values_mut().find(|service| {
                            service.active
                                && service.username == username
                                && (service.process.is_none() || service.process == Some(pid))
                        }) {
                            service.process = Some(fresh);
                        }
                        fresh
                    });
                    let mut request = session.into_request();
                    request.pid = fresh;
                    self.add_session(request)?;
                }
            }
        }
        Ok(())
    }

    /// Marks a service active and provisions its backing process and
    /// session. A service that is already running is left alone.
    pub fn start_service(&mut self, hostname: &str, name: &str) -> Result<(), SimError> {
        let (agent, username) = {
            let host = self
                .hosts
                .get_mut(hostname)
                .ok_or_else(|| SimError::UnknownHost(hostname.to_string()))?;
            let service = host.services.get(name).ok_or_else(|| SimError::UnknownService {
                hostname: hostname.to_string(),
                service: name.to_string(),
            })?;
            if service.active && service.process.is_some() {
                return Ok(());
            }
            (service.agent.clone(), service.username.clone())
        };

        let pid = {
            // Host presence was checked above.
            let Some(host) = self.hosts.get_mut(hostname) else {
                return Err(SimError::UnknownHost(hostname.to_string()));
            };
            let pid = host.spawn_process(name, &username, None);
            if let Some(service) = host.services.get_mut(name) {
                service.active = true;
                service.process = Some(pid);
            }
            pid
        };

        self.add_session(
            NewSession::new(&agent, hostname, &username, SessionType::Service).with_pid(pid),
        )?;
        debug!(host = hostname, service = name, pid, "service started");
        Ok(())
    }

    /// Marks a service inactive and tears down its backing process and
    /// session.
    pub fn stop_service(&mut self, hostname: &str, name: &str) -> Result<(), SimError> {
        let (pid, agent) = {
            let host = self
                .hosts
                .get_mut(hostname)
                .ok_or_else(|| SimError::UnknownHost(hostname.to_string()))?;
            let service = host.services.get_mut(name).ok_or_else(|| SimError::UnknownService {
                hostname: hostname.to_string(),
                service: name.to_string(),
            })?;
            service.active = false;
            (service.process.take(), service.agent.clone())
        };

        if let Some(pid) = pid {
            let session_id = self.sessions.get(&agent).and_then(|table| {
                table
                    .values()
                    .find(|session| session.hostname == hostname && session.pid == Some(pid))
                    .map(|session| session.id)
            });
            if let Some(id) = session_id {
                self.remove_session(&agent, id);
            }
            if let Some(host) = self.hosts.get_mut(hostname) {
                host.remove_process_entry(pid);
            }
        }
        debug!(host = hostname, service = name, "service stopped");
        Ok(())
    }

    /// Clears a host back to its baseline: all sessions on it are removed
    /// (parents included), the process table and pending events are
    /// dropped, and active services are re-provisioned.
    pub fn reset_host(&mut self, hostname: &str) -> Result<(), SimError> {
        if !self.hosts.contains_key(hostname) {
            return Err(SimError::UnknownHost(hostname.to_string()));
        }

        let doomed: Vec<(String, u32)> = self
            .sessions
            .iter()
            .flat_map(|(agent, table)| {
                table
                    .values()
                    .filter(|session| session.hostname == hostname)
                    .map(|session| (agent.clone(), session.id))
                    .collect::<Vec<_>>()
            })
            .collect();
        for (agent, id) in doomed {
            self.remove_session(&agent, id);
        }

        let active: Vec<String> = {
            let Some(host) = self.hosts.get_mut(hostname) else {
                return Err(SimError::UnknownHost(hostname.to_string()));
            };
            host.processes.clear();
            host.events.clear();
            let active = host.active_services();
            for service in host.services.values_mut() {
                service.process = None;
                service.active = false;
            }
            active
        };
        for name in active {
            self.start_service(hostname, &name)?;
        }
        info!(host = hostname, "host reset");
        Ok(())
    }

    // ── Addressing and subnets ──────────────────────────────────────────

    /// The subnet whose CIDR contains the address. Failure here indicates
    /// a malformed topology, not a runtime condition.
    pub fn get_subnet_containing_ip(&self, ip: Ipv4Addr) -> Result<&Subnet, SimError> {
        self.subnets
            .iter()
            .find(|subnet| subnet.contains(ip))
            .ok_or(SimError::SubnetNotFound(ip))
    }

    /// Zone classification of the subnet containing the address.
    pub fn zone_of_ip(&self, ip: Ipv4Addr) -> Result<Zone, SimError> {
        self.get_subnet_containing_ip(ip).map(|subnet| subnet.zone)
    }

    /// Primary address of a host.
    pub fn ip_of(&self, hostname: &str) -> Option<Ipv4Addr> {
        self.hosts.get(hostname).and_then(Host::primary_ip)
    }

    /// Host owning the given interface address.
    pub fn host_of_ip(&self, ip: Ipv4Addr) -> Option<&str> {
        self.ip_hosts.get(&ip).map(String::as_str)
    }

    /// Hostnames with an interface in the named subnet.
    pub fn hosts_in_subnet(&self, subnet: &str) -> &[String] {
        self.subnet_hosts.get(subnet).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Subnet lookup by name.
    pub fn subnet_by_name(&self, name: &str) -> Option<&Subnet> {
        self.subnets.iter().find(|subnet| subnet.name == name)
    }

    /// All subnets.
    pub fn subnets(&self) -> &[Subnet] {
        &self.subnets
    }

    // ── Firewall blocks ─────────────────────────────────────────────────

    /// Registers a block: `blocking` refuses traffic with `blocked`.
    pub fn block_zone(&mut self, blocking: Zone, blocked: Zone) {
        self.blocks.entry(blocking).or_default().insert(blocked);
        debug!(%blocking, %blocked, "zone block added");
    }

    /// Removes a block rule.
    pub fn unblock_zone(&mut self, blocking: Zone, blocked: Zone) {
        if let Some(set) = self.blocks.get_mut(&blocking) {
            set.remove(&blocked);
            if set.is_empty() {
                self.blocks.remove(&blocking);
            }
        }
    }

    /// A block registered on either endpoint applies to both directions.
    pub fn is_blocked(&self, a: Zone, b: Zone) -> bool {
        self.blocks.get(&a).is_some_and(|set| set.contains(&b))
            || self.blocks.get(&b).is_some_and(|set| set.contains(&a))
    }

    // ── Topology ────────────────────────────────────────────────────────

    /// Read access to the connectivity graph.
    pub fn topology(&self) -> &TopologyGraph {
        &self.topology
    }

    /// Rebuilds wireless edges from current positions and ranges. A link
    /// exists when each radio is within the other's declared range. Only
    /// hosts with at least one wireless interface enter the pairwise pass.
    pub fn update_wireless_topology(&mut self) {
        let radios: Vec<(String, Vector3<f64>, f64)> = self
            .hosts
            .values()
            .flat_map(|host| {
                host.interfaces.iter().filter_map(|iface| match iface.kind {
                    InterfaceKind::Wireless { position, max_range } => {
                        Some((host.hostname.clone(), position, max_range))
                    }
                    InterfaceKind::Wired => None,
                })
            })
            .collect();

        let mut edges = Vec::new();
        for (i, (host_a, pos_a, range_a)) in radios.iter().enumerate() {
            for (host_b, pos_b, range_b) in radios.iter().skip(i + 1) {
                if host_a == host_b {
                    continue;
                }
                let distance = (pos_a - pos_b).norm();
                if distance <= *range_a && distance <= *range_b {
                    edges.push((host_a.clone(), host_b.clone()));
                }
            }
        }
        self.topology.set_wireless_edges(&edges);
    }

    /// Moves every wireless interface of a host to a new position and
    /// rebuilds the wireless overlay.
    pub fn move_host(&mut self, hostname: &str, position: Vector3<f64>) -> Result<(), SimError> {
        let host = self
            .hosts
            .get_mut(hostname)
            .ok_or_else(|| SimError::UnknownHost(hostname.to_string()))?;
        for iface in &mut host.interfaces {
            if let InterfaceKind::Wireless { position: current, .. } = &mut iface.kind {
                *current = position;
            }
        }
        self.update_wireless_topology();
        Ok(())
    }

    // ── Phases ──────────────────────────────────────────────────────────

    /// Current mission phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Determines which phase the given step falls in and advances the
    /// engine when the schedule says so. Returns whether the phase
    /// advanced. Advancing is never reversed within an episode. A step
    /// past the final boundary is a configuration error.
    pub fn check_next_phase(&mut self, step: u64) -> Result<bool, SimError> {
        let Some(&last) = self.phase_steps.last() else {
            return Err(SimError::scenario("empty phase schedule"));
        };
        if step > last {
            return Err(SimError::StepOutOfRange { step, last });
        }
        let index = self
            .phase_steps
            .iter()
            .position(|&boundary| step <= boundary)
            .unwrap_or(0);
        let Some(target) = Phase::from_index(index) else {
            return Err(SimError::scenario("phase schedule longer than the phase set"));
        };
        if target > self.phase {
            info!(from = %self.phase, to = %target, step, "mission phase advanced");
            self.phase = target;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    // ── Agents ──────────────────────────────────────────────────────────

    /// Role of a registered agent.
    pub fn agent_kind(&self, agent: &str) -> Option<AgentKind> {
        self.agents.get(agent).map(|def| def.kind)
    }

    /// Names of all agents of the given kind, in name order.
    pub fn agents_of_kind(&self, kind: AgentKind) -> Vec<&str> {
        self.agents
            .values()
            .filter(|def| def.kind == kind)
            .map(|def| def.name.as_str())
            .collect()
    }

    /// Subnet names a green agent may reach in the current phase.
    pub fn allowed_subnets(&self, agent: &str) -> &[String] {
        self.agents
            .get(agent)
            .and_then(|def| def.allowed_subnets.get(self.phase.index()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    // ── Hosts and events ────────────────────────────────────────────────

    /// Host lookup.
    pub fn host(&self, hostname: &str) -> Option<&Host> {
        self.hosts.get(hostname)
    }

    /// Mutable host lookup.
    pub fn host_mut(&mut self, hostname: &str) -> Option<&mut Host> {
        self.hosts.get_mut(hostname)
    }

    /// All hostnames, in order.
    pub fn hostnames(&self) -> Vec<&str> {
        self.hosts.keys().map(String::as_str).collect()
    }

    /// Queues a side-effect event on a host.
    pub fn push_event(&mut self, hostname: &str, event: HostEvent) -> Result<(), SimError> {
        let host = self
            .hosts
            .get_mut(hostname)
            .ok_or_else(|| SimError::UnknownHost(hostname.to_string()))?;
        host.push_event(event);
        Ok(())
    }

    /// Drains the pending events of a host, oldest first.
    pub fn drain_events(&mut self, hostname: &str) -> Vec<HostEvent> {
        self.hosts
            .get_mut(hostname)
            .map(Host::drain_events)
            .unwrap_or_default()
    }

    // ── Oracle view ─────────────────────────────────────────────────────

    /// Projects the full state into an observation per the caller's field
    /// selector. This is a debug view, never what agents observe. A
    /// missing selector is a configuration error.
    pub fn get_true_state(&self, filter: Option<&StateFilter>) -> Result<Observation, SimError> {
        let filter = filter.ok_or(SimError::MissingFilter)?;
        let mut observation = Observation::default();

        for (hostname, kinds) in &filter.hosts {
            let host = self
                .hosts
                .get(hostname)
                .ok_or_else(|| SimError::UnknownHost(hostname.clone()))?;
            for kind in kinds {
                match kind {
                    InfoKind::Interfaces => {
                        for iface in &host.interfaces {
                            observation.interfaces.push(InterfaceInfo {
                                hostname: hostname.clone(),
                                ip: iface.ip,
                                subnet: iface.subnet.clone(),
                            });
                        }
                    }
                    InfoKind::Sessions => {
                        for (agent, ids) in &host.sessions {
                            for id in ids {
                                if let Some(session) =
                                    self.sessions.get(agent).and_then(|table| table.get(id))
                                {
                                    observation.sessions.push(SessionInfo {
                                        agent: agent.clone(),
                                        id: session.id,
                                        hostname: hostname.clone(),
                                        username: session.username.clone(),
                                        session_type: session.session_type,
                                        pid: session.pid,
                                    });
                                }
                            }
                        }
                    }
                    InfoKind::Processes => {
                        for process in &host.processes {
                            observation.processes.push(ProcessInfo {
                                hostname: hostname.clone(),
                                pid: process.pid,
                                name: process.name.clone(),
                                username: process.username.clone(),
                            });
                        }
                    }
                    InfoKind::Files => {
                        for file in &host.files {
                            observation.files.push(FileInfo {
                                hostname: hostname.clone(),
                                path: file.path.clone(),
                                name: file.name.clone(),
                                owner: file.owner.clone(),
                            });
                        }
                    }
                    InfoKind::Users => {
                        for user in &host.users {
                            observation.users.push(UserInfo {
                                hostname: hostname.clone(),
                                username: user.username.clone(),
                                groups: user.groups.clone(),
                            });
                        }
                    }
                    InfoKind::Services => {
                        for (name, service) in &host.services {
                            observation.services.push(ServiceInfo {
                                hostname: hostname.clone(),
                                name: name.clone(),
                                active: service.active,
                                reliability: service.reliability,
                                port: service.port,
                            });
                        }
                    }
                    InfoKind::SystemInfo => {
                        observation.system.push(SystemInfo {
                            hostname: hostname.clone(),
                            os: host.os.clone(),
                            architecture: host.architecture.clone(),
                        });
                    }
                }
            }
        }
        Ok(observation)
    }

    // ── Invariants ──────────────────────────────────────────────────────

    /// Reports violations of the session bookkeeping invariants: every
    /// host-side id resolves in the global table and vice versa, and all
    /// parent and child references resolve. Empty means consistent.
    pub fn session_invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for (hostname, host) in &self.hosts {
            for (agent, ids) in &host.sessions {
                for id in ids {
                    let resolves = self
                        .sessions
                        .get(agent)
                        .and_then(|table| table.get(id))
                        .is_some_and(|session| session.hostname == *hostname);
                    if !resolves {
                        violations.push(format!(
                            "host {hostname} lists {agent}/{id} but the table disagrees"
                        ));
                    }
                }
            }
        }

        for (agent, table) in &self.sessions {
            for session in table.values() {
                let listed = self
                    .hosts
                    .get(&session.hostname)
                    .is_some_and(|host| host.sessions_of(agent).contains(&session.id));
                if !listed {
                    violations.push(format!(
                        "table entry {agent}/{} missing from host {}",
                        session.id, session.hostname
                    ));
                }
                if let Some(parent) = session.parent {
                    let linked = table
                        .get(&parent)
                        .is_some_and(|p| p.children.contains(&session.id));
                    if !linked {
                        violations.push(format!(
                            "session {agent}/{} has unlinked parent {parent}",
                            session.id
                        ));
                    }
                }
                for child in &session.children {
                    let linked = table
                        .get(child)
                        .is_some_and(|c| c.parent == Some(session.id));
                    if !linked {
                        violations.push(format!(
                            "session {agent}/{} has unlinked child {child}",
                            session.id
                        ));
                    }
                }
            }
        }

        violations
    }

    fn install_service(&mut self, hostname: &str, def: &ServiceDef) -> Result<(), SimError> {
        if !self.agents.contains_key(&def.agent) {
            return Err(SimError::scenario(format!(
                "service {} on {} references unknown agent {}",
                def.name, hostname, def.agent
            )));
        }
        {
            let Some(host) = self.hosts.get_mut(hostname) else {
                return Err(SimError::UnknownHost(hostname.to_string()));
            };
            host.services.insert(
                def.name.clone(),
                Service {
                    active: false,
                    reliability: def.reliability.min(100),
                    port: def.port,
                    process: None,
                    agent: def.agent.clone(),
                    username: def.username.clone(),
                },
            );
        }
        if def.active {
            self.start_service(hostname, &def.name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Interface;
    use crate::scenario::{HostDef, SubnetDef};
    use proptest::prelude::*;

    fn fixture() -> Scenario {
        Scenario {
            name: "fixture".to_string(),
            subnets: vec![
                SubnetDef {
                    name: "office_lan".to_string(),
                    cidr: "10.0.1.0/24".parse().unwrap(),
                    zone: Zone::Office,
                },
                SubnetDef {
                    name: "ops_lan".to_string(),
                    cidr: "10.0.2.0/24".parse().unwrap(),
                    zone: Zone::OperationalA,
                },
            ],
            hosts: vec![
                HostDef {
                    hostname: "office_pc".to_string(),
                    interfaces: vec![Interface::wired("10.0.1.10".parse().unwrap(), "office_lan")],
                    services: vec![],
                    users: vec![],
                    files: vec![],
                    is_server: false,
                    os: "linux".to_string(),
                    architecture: "x86_64".to_string(),
                },
                HostDef {
                    hostname: "ops_server".to_string(),
                    interfaces: vec![Interface::wired("10.0.2.20".parse().unwrap(), "ops_lan")],
                    services: vec![ServiceDef {
                        name: crate::host::OT_SERVICE.to_string(),
                        active: true,
                        reliability: 100,
                        port: 4840,
                        agent: "blue_0".to_string(),
                        username: "otsvc".to_string(),
                    }],
                    users: vec![],
                    files: vec![],
                    is_server: true,
                    os: "linux".to_string(),
                    architecture: "x86_64".to_string(),
                },
            ],
            agents: vec![
                AgentDef {
                    name: "green_0".to_string(),
                    kind: AgentKind::Green,
                    allowed_subnets: vec![
                        vec!["office_lan".to_string(), "ops_lan".to_string()],
                        vec!["office_lan".to_string()],
                        vec!["office_lan".to_string()],
                    ],
                },
                AgentDef {
                    name: "red_0".to_string(),
                    kind: AgentKind::Red,
                    allowed_subnets: vec![],
                },
                AgentDef {
                    name: "blue_0".to_string(),
                    kind: AgentKind::Blue,
                    allowed_subnets: vec![],
                },
            ],
            sessions: vec![NewSession::new(
                "green_0",
                "office_pc",
                "greta",
                SessionType::Shell,
            )],
            blocks: vec![],
            phase_steps: vec![10, 20, 30],
        }
    }

    #[test]
    fn test_construction_registers_everything() {
        let state = SimState::from_scenario(&fixture()).unwrap();

        assert_eq!(state.hostnames().len(), 2);
        assert!(state.has_active_session("green_0"));
        // The active service was provisioned with a process and session.
        let ops = state.host("ops_server").unwrap();
        let service = &ops.services[crate::host::OT_SERVICE];
        assert!(service.active);
        assert!(service.process.is_some());
        assert!(state.has_active_session("blue_0"));
        assert!(state.session_invariant_violations().is_empty());
    }

    #[test]
    fn test_add_session_assigns_next_free_id() {
        let mut state = SimState::from_scenario(&fixture()).unwrap();

        let first = state
            .add_session(NewSession::new("red_0", "office_pc", "user", SessionType::Shell))
            .unwrap();
        let second = state
            .add_session(NewSession::new("red_0", "office_pc", "user", SessionType::Shell))
            .unwrap();
        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(state.sessions_created("red_0"), 2);
    }

    #[test]
    fn test_add_session_rejects_occupied_id() {
        let mut state = SimState::from_scenario(&fixture()).unwrap();

        state
            .add_session(
                NewSession::new("red_0", "office_pc", "user", SessionType::Shell).with_id(5),
            )
            .unwrap();
        let err = state
            .add_session(
                NewSession::new("red_0", "office_pc", "user", SessionType::Shell).with_id(5),
            )
            .unwrap_err();
        assert!(matches!(err, SimError::DuplicateSession { id: 5, .. }));

        // Engine-assigned ids continue above the explicit one.
        let next = state
            .add_session(NewSession::new("red_0", "office_pc", "user", SessionType::Shell))
            .unwrap();
        assert_eq!(next, 6);
    }

    #[test]
    fn test_add_session_unknown_host_fails() {
        let mut state = SimState::from_scenario(&fixture()).unwrap();
        let err = state
            .add_session(NewSession::new("red_0", "nonsense", "user", SessionType::Shell))
            .unwrap_err();
        assert!(matches!(err, SimError::UnknownHost(_)));
    }

    #[test]
    fn test_remove_session_detaches_parent_and_host() {
        let mut state = SimState::from_scenario(&fixture()).unwrap();

        let parent = state
            .add_session(NewSession::new("red_0", "office_pc", "user", SessionType::Shell))
            .unwrap();
        let child = state
            .add_session(
                NewSession::new("red_0", "office_pc", "user", SessionType::Shell)
                    .with_parent(parent),
            )
            .unwrap();
        assert!(state.session("red_0", parent).unwrap().children.contains(&child));

        state.remove_session("red_0", child);
        assert!(state.session("red_0", parent).unwrap().children.is_empty());
        assert!(!state.host("office_pc").unwrap().sessions_of("red_0").contains(&child));
        assert!(state.session_invariant_violations().is_empty());
    }

    #[test]
    fn test_remove_parent_clears_child_reference() {
        let mut state = SimState::from_scenario(&fixture()).unwrap();

        let parent = state
            .add_session(NewSession::new("red_0", "office_pc", "user", SessionType::Shell))
            .unwrap();
        let child = state
            .add_session(
                NewSession::new("red_0", "office_pc", "user", SessionType::Shell)
                    .with_parent(parent),
            )
            .unwrap();

        state.remove_session("red_0", parent);
        assert_eq!(state.session("red_0", child).unwrap().parent, None);
        assert!(state.session_invariant_violations().is_empty());
    }

    #[test]
    fn test_remove_process_absent_pid_is_noop() {
        let mut state = SimState::from_scenario(&fixture()).unwrap();
        state.remove_process("ops_server", 9999).unwrap();
        assert!(state.session_invariant_violations().is_empty());
    }

    #[test]
    fn test_remove_process_revives_active_service() {
        let mut state = SimState::from_scenario(&fixture()).unwrap();

        let old_pid = state
            .host("ops_server")
            .unwrap()
            .services[crate::host::OT_SERVICE]
            .process
            .unwrap();
        state.remove_process("ops_server", old_pid).unwrap();

        let service = &state.host("ops_server").unwrap().services[crate::host::OT_SERVICE];
        assert!(service.active);
        let new_pid = service.process.unwrap();
        assert_ne!(new_pid, old_pid);
        // The service survives and the engine stays consistent.
        assert!(state.session_invariant_violations().is_empty());
    }

    #[test]
    fn test_stop_service_tears_down_session_and_process() {
        let mut state = SimState::from_scenario(&fixture()).unwrap();

        state.stop_service("ops_server", crate::host::OT_SERVICE).unwrap();
        let host = state.host("ops_server").unwrap();
        assert!(!host.services[crate::host::OT_SERVICE].active);
        assert!(host.processes.is_empty());
        assert!(!state.has_active_session("blue_0"));

        state.start_service("ops_server", crate::host::OT_SERVICE).unwrap();
        assert!(state.host("ops_server").unwrap().services[crate::host::OT_SERVICE].active);
        assert!(state.has_active_session("blue_0"));
    }

    #[test]
    fn test_subnet_lookup() {
        let state = SimState::from_scenario(&fixture()).unwrap();

        let subnet = state
            .get_subnet_containing_ip("10.0.2.20".parse().unwrap())
            .unwrap();
        assert_eq!(subnet.zone, Zone::OperationalA);

        let err = state
            .get_subnet_containing_ip("192.168.0.1".parse().unwrap())
            .unwrap_err();
        assert!(matches!(err, SimError::SubnetNotFound(_)));
    }

    #[test]
    fn test_phase_advances_monotonically() {
        let mut state = SimState::from_scenario(&fixture()).unwrap();
        assert_eq!(state.phase(), Phase::Preplanning);

        assert!(!state.check_next_phase(5).unwrap());
        assert!(state.check_next_phase(11).unwrap());
        assert_eq!(state.phase(), Phase::MissionA);
        assert!(!state.check_next_phase(15).unwrap());
        assert!(state.check_next_phase(25).unwrap());
        assert_eq!(state.phase(), Phase::MissionB);

        let err = state.check_next_phase(31).unwrap_err();
        assert!(matches!(err, SimError::StepOutOfRange { step: 31, last: 30 }));
    }

    #[test]
    fn test_allowed_subnets_follow_phase() {
        let mut state = SimState::from_scenario(&fixture()).unwrap();
        assert_eq!(state.allowed_subnets("green_0").len(), 2);

        state.check_next_phase(11).unwrap();
        assert_eq!(state.allowed_subnets("green_0"), ["office_lan".to_string()]);
    }

    #[test]
    fn test_block_rules_apply_symmetrically() {
        let mut state = SimState::from_scenario(&fixture()).unwrap();
        assert!(!state.is_blocked(Zone::Office, Zone::OperationalA));

        state.block_zone(Zone::OperationalA, Zone::Office);
        assert!(state.is_blocked(Zone::Office, Zone::OperationalA));
        assert!(state.is_blocked(Zone::OperationalA, Zone::Office));

        state.unblock_zone(Zone::OperationalA, Zone::Office);
        assert!(!state.is_blocked(Zone::Office, Zone::OperationalA));
    }

    #[test]
    fn test_true_state_requires_filter() {
        let state = SimState::from_scenario(&fixture()).unwrap();
        let err = state.get_true_state(None).unwrap_err();
        assert!(matches!(err, SimError::MissingFilter));
    }

    #[test]
    fn test_true_state_projects_selected_fields() {
        let state = SimState::from_scenario(&fixture()).unwrap();
        let filter = StateFilter::new()
            .host("ops_server", &[InfoKind::Services, InfoKind::SystemInfo])
            .host("office_pc", &[InfoKind::Sessions]);

        let view = state.get_true_state(Some(&filter)).unwrap();
        assert_eq!(view.services.len(), 1);
        assert_eq!(view.system.len(), 1);
        assert_eq!(view.sessions.len(), 1);
        assert_eq!(view.sessions[0].agent, "green_0");
        // Information views carry no success flag.
        assert_eq!(view.success, None);
    }

    #[test]
    fn test_reset_host_clears_and_reprovisions() {
        let mut state = SimState::from_scenario(&fixture()).unwrap();
        state
            .add_session(NewSession::new("red_0", "ops_server", "user", SessionType::Shell))
            .unwrap();

        state.reset_host("ops_server").unwrap();

        assert!(!state.has_active_session("red_0"));
        // Active services come back with a fresh process and session.
        let service = &state.host("ops_server").unwrap().services[crate::host::OT_SERVICE];
        assert!(service.active);
        assert!(service.process.is_some());
        assert!(state.has_active_session("blue_0"));
        assert!(state.session_invariant_violations().is_empty());
    }

    proptest! {
        /// Random interleavings of session adds and removes never break
        /// the host/table agreement or parent/child linkage.
        #[test]
        fn prop_session_bookkeeping_stays_consistent(ops in prop::collection::vec(0u8..4, 1..40)) {
            let mut state = SimState::from_scenario(&fixture()).unwrap();
            let mut live: Vec<u32> = Vec::new();

            for op in ops {
                match op {
                    0 | 1 => {
                        let mut request =
                            NewSession::new("red_0", "office_pc", "user", SessionType::Shell);
                        if op == 1 {
                            if let Some(&parent) = live.first() {
                                request = request.with_parent(parent);
                            }
                        }
                        let id = state.add_session(request).unwrap();
                        live.push(id);
                    }
                    2 => {
                        if let Some(id) = live.pop() {
                            state.remove_session("red_0", id);
                        }
                    }
                    _ => {
                        if !live.is_empty() {
                            let id = live.remove(0);
                            state.remove_session("red_0", id);
                        }
                    }
                }
                prop_assert!(state.session_invariant_violations().is_empty());
            }
        }
    }
}

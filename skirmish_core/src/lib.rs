//! Skirmish state engine.
//!
//! A deterministic, seeded model of a computer network under exercise:
//! hosts, subnets, sessions, services, a live connectivity graph, firewall
//! block rules, and the mission-phase counter, behind a single mutation
//! API.
//!
//! # Determinism
//!
//! All sources of nondeterminism are intercepted and controlled:
//! - **Randomness**: every probabilistic decision draws from one owned,
//!   seeded [`RandomSource`] passed explicitly down the call chain.
//! - **Iteration**: the engine's maps are ordered, so any draw over "all
//!   hosts" or "all sessions" sees the same candidate order every run.
//!
//! Given the same seed and the same sequence of external agent choices, a
//! whole episode replays bit-for-bit.
//!
//! # Ownership
//!
//! The global per-agent session table is the sole owner of sessions; hosts
//! hold non-owning id lists resolved through the table. The two views are
//! kept in agreement by the mutation API and can be audited with
//! [`SimState::session_invariant_violations`].

pub mod error;
pub mod host;
pub mod observation;
pub mod phase;
pub mod rng;
pub mod scenario;
pub mod session;
pub mod state;
pub mod subnet;
pub mod topology;

pub use error::SimError;
pub use host::{Host, HostEvent, HostFile, Interface, InterfaceKind, Process, Service, User, OT_SERVICE};
pub use observation::{
    FileInfo, InterfaceInfo, Observation, ProcessInfo, ServiceInfo, SessionInfo, SystemInfo,
    UserInfo,
};
pub use phase::Phase;
pub use rng::RandomSource;
pub use scenario::{AgentDef, HostDef, Scenario, ServiceDef, SubnetDef};
pub use session::{AgentKind, NewSession, Session, SessionType};
pub use state::{InfoKind, SimState, StateFilter};
pub use subnet::{Subnet, Zone};
pub use topology::TopologyGraph;

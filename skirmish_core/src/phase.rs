//! Mission phases.

use serde::{Deserialize, Serialize};

/// Coarse episode stage. Advances monotonically over an episode and selects
/// both the active reward table and the allowed-subnet policy for
/// background traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Pre-mission staging; traffic is largely unrestricted.
    Preplanning,

    /// Mission window for site A.
    MissionA,

    /// Mission window for site B.
    MissionB,
}

impl Phase {
    /// All phases in episode order.
    pub const ALL: [Phase; 3] = [Phase::Preplanning, Phase::MissionA, Phase::MissionB];

    /// Zero-based index into the phase schedule.
    pub fn index(&self) -> usize {
        match self {
            Phase::Preplanning => 0,
            Phase::MissionA => 1,
            Phase::MissionB => 2,
        }
    }

    /// Phase for a zero-based schedule index.
    pub fn from_index(index: usize) -> Option<Phase> {
        Phase::ALL.get(index).copied()
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Preplanning => "preplanning",
            Phase::MissionA => "mission_a",
            Phase::MissionB => "mission_b",
        };
        write!(f, "{}", name)
    }
}

//! Mission-phase-aware reward computation.
//!
//! A stateless judge over the step's outcomes: it reads the same state
//! snapshot the actions just mutated, classifies each action, and sums the
//! configured penalties. The penalty table is fixed at construction and
//! never mutated at runtime.

use crate::action::Action;
use skirmish_core::{AgentKind, Observation, Phase, SimState, Zone};
use std::collections::BTreeMap;

/// The three penalty kinds a zone/phase cell carries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZonePenalties {
    /// Applied when a successful attacker impact lands in the zone.
    pub red_impact_access: f64,

    /// Applied when background local work fails in the zone.
    pub local_work_fails: f64,

    /// Applied when background service access fails from the zone.
    pub access_service_fails: f64,
}

impl ZonePenalties {
    /// A cell that contributes nothing.
    pub const ZERO: ZonePenalties = ZonePenalties {
        red_impact_access: 0.0,
        local_work_fails: 0.0,
        access_service_fails: 0.0,
    };
}

/// Penalty lookup per zone and phase, nine zones by three phases.
#[derive(Debug, Clone)]
pub struct RewardTable {
    cells: BTreeMap<(Zone, Phase), ZonePenalties>,
}

impl RewardTable {
    /// An empty table; every lookup yields zero.
    pub fn new() -> Self {
        Self {
            cells: BTreeMap::new(),
        }
    }

    /// Sets one cell. Intended for configuration time only.
    pub fn set(mut self, zone: Zone, phase: Phase, penalties: ZonePenalties) -> Self {
        self.cells.insert((zone, phase), penalties);
        self
    }

    /// Looks up a cell; unset cells contribute nothing.
    pub fn penalties(&self, zone: Zone, phase: Phase) -> ZonePenalties {
        self.cells
            .get(&(zone, phase))
            .copied()
            .unwrap_or(ZonePenalties::ZERO)
    }
}

impl Default for RewardTable {
    /// The standard mission table. Zones tied to the active mission window
    /// weigh an order of magnitude more than quiet zones; site A matters
    /// during mission A, site B during mission B.
    fn default() -> Self {
        let mut table = RewardTable::new();
        for zone in Zone::ALL {
            for phase in Phase::ALL {
                let critical = matches!(
                    (zone, phase),
                    (Zone::RestrictedA | Zone::OperationalA, Phase::MissionA)
                        | (Zone::RestrictedB | Zone::OperationalB, Phase::MissionB)
                );
                let operational = matches!(zone, Zone::OperationalA | Zone::OperationalB);
                let cell = if critical {
                    ZonePenalties {
                        red_impact_access: if operational { -10.0 } else { -3.0 },
                        local_work_fails: -5.0,
                        access_service_fails: -5.0,
                    }
                } else {
                    ZonePenalties {
                        red_impact_access: -1.0,
                        local_work_fails: -1.0,
                        access_service_fails: -1.0,
                    }
                };
                table = table.set(zone, phase, cell);
            }
        }
        table
    }
}

/// One resolved agent action for the step.
#[derive(Debug)]
pub struct StepOutcome {
    /// Acting agent
    pub agent: String,

    /// The chosen action
    pub action: Action,

    /// What execution reported
    pub observation: Observation,
}

/// Scores steps against a fixed penalty table.
#[derive(Debug, Clone)]
pub struct RewardEngine {
    table: RewardTable,
}

impl RewardEngine {
    /// Creates an engine over the given table.
    pub fn new(table: RewardTable) -> Self {
        Self { table }
    }

    /// Read access to the table.
    pub fn table(&self) -> &RewardTable {
        &self.table
    }

    /// Sums the step's penalty contributions.
    ///
    /// Impact scores by the destination host's zone; green actions score
    /// by the zone the green agent's address resolves to; all other kinds
    /// are skipped, as is any agent without a live session.
    pub fn score_step(&self, state: &SimState, outcomes: &[StepOutcome], phase: Phase) -> f64 {
        outcomes
            .iter()
            .map(|outcome| self.score_one(state, outcome, phase))
            .sum()
    }

    fn score_one(&self, state: &SimState, outcome: &StepOutcome, phase: Phase) -> f64 {
        if !state.has_active_session(&outcome.agent) {
            return 0.0;
        }
        match &outcome.action {
            Action::Impact(impact) => {
                if state.agent_kind(&outcome.agent) != Some(AgentKind::Red) {
                    return 0.0;
                }
                if !outcome.observation.is_success() {
                    return 0.0;
                }
                let Some(ip) = state.ip_of(impact.hostname()) else {
                    return 0.0;
                };
                let Ok(zone) = state.zone_of_ip(ip) else {
                    return 0.0;
                };
                self.table.penalties(zone, phase).red_impact_access
            }
            Action::LocalWork(work) => {
                if outcome.observation.success != Some(false) {
                    return 0.0;
                }
                let Ok(zone) = state.zone_of_ip(work.ip()) else {
                    return 0.0;
                };
                self.table.penalties(zone, phase).local_work_fails
            }
            Action::AccessService(access) => {
                if outcome.observation.success != Some(false) {
                    return 0.0;
                }
                let Ok(zone) = state.zone_of_ip(access.ip()) else {
                    return 0.0;
                };
                self.table.penalties(zone, phase).access_service_fails
            }
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_service::AccessService;
    use crate::action::Sleep;
    use crate::fixtures;
    use crate::impact::Impact;
    use crate::local_work::LocalWork;
    use skirmish_core::{NewSession, SessionType};
    use std::net::Ipv4Addr;

    fn green_ip() -> Ipv4Addr {
        "10.0.1.10".parse().unwrap()
    }

    fn engine() -> RewardEngine {
        RewardEngine::new(RewardTable::default())
    }

    #[test]
    fn test_failed_local_work_scores_its_zone_penalty() {
        let state = fixtures::state();
        let engine = engine();
        let expected = engine
            .table()
            .penalties(Zone::Office, Phase::Preplanning)
            .local_work_fails;

        let outcomes = vec![StepOutcome {
            agent: "green_0".to_string(),
            action: Action::LocalWork(LocalWork::new("green_0", 0, green_ip(), 0.0, 0.0).unwrap()),
            observation: Observation::failed(),
        }];
        let reward = engine.score_step(&state, &outcomes, Phase::Preplanning);
        assert_eq!(reward, expected);
        assert!(reward < 0.0);
    }

    #[test]
    fn test_failed_access_service_scores_its_zone_penalty() {
        let state = fixtures::state();
        let engine = engine();
        let expected = engine
            .table()
            .penalties(Zone::Office, Phase::MissionA)
            .access_service_fails;

        let outcomes = vec![StepOutcome {
            agent: "green_0".to_string(),
            action: Action::AccessService(AccessService::new("green_0", green_ip(), 0.0).unwrap()),
            observation: Observation::failed(),
        }];
        assert_eq!(engine.score_step(&state, &outcomes, Phase::MissionA), expected);
    }

    #[test]
    fn test_successful_green_actions_score_zero() {
        let state = fixtures::state();
        let outcomes = vec![StepOutcome {
            agent: "green_0".to_string(),
            action: Action::LocalWork(LocalWork::new("green_0", 0, green_ip(), 0.0, 0.0).unwrap()),
            observation: Observation::succeeded(),
        }];
        assert_eq!(engine().score_step(&state, &outcomes, Phase::Preplanning), 0.0);
    }

    #[test]
    fn test_successful_impact_scores_destination_zone() {
        let mut state = fixtures::state();
        state
            .add_session(NewSession::new("red_0", "ops_server", "user", SessionType::Shell))
            .unwrap();
        let engine = engine();
        let expected = engine
            .table()
            .penalties(Zone::OperationalA, Phase::MissionA)
            .red_impact_access;

        let outcomes = vec![StepOutcome {
            agent: "red_0".to_string(),
            action: Action::Impact(Impact::new("red_0", "ops_server")),
            observation: Observation::succeeded(),
        }];
        let reward = engine.score_step(&state, &outcomes, Phase::MissionA);
        assert_eq!(reward, expected);
        assert_eq!(reward, -10.0);
    }

    #[test]
    fn test_failed_impact_scores_zero() {
        let mut state = fixtures::state();
        state
            .add_session(NewSession::new("red_0", "office_pc", "user", SessionType::Shell))
            .unwrap();

        let outcomes = vec![StepOutcome {
            agent: "red_0".to_string(),
            action: Action::Impact(Impact::new("red_0", "ops_server")),
            observation: Observation::failed(),
        }];
        assert_eq!(engine().score_step(&state, &outcomes, Phase::MissionA), 0.0);
    }

    #[test]
    fn test_agent_without_session_scores_zero() {
        let state = fixtures::state();
        // red_0 never got a starting session in the fixture.
        let outcomes = vec![StepOutcome {
            agent: "red_0".to_string(),
            action: Action::Impact(Impact::new("red_0", "ops_server")),
            observation: Observation::succeeded(),
        }];
        assert_eq!(engine().score_step(&state, &outcomes, Phase::MissionA), 0.0);
    }

    #[test]
    fn test_unrelated_actions_score_zero() {
        let state = fixtures::state();
        let outcomes = vec![StepOutcome {
            agent: "green_0".to_string(),
            action: Action::Sleep(Sleep),
            observation: Observation::succeeded(),
        }];
        assert_eq!(engine().score_step(&state, &outcomes, Phase::Preplanning), 0.0);
    }

    #[test]
    fn test_contributions_sum_across_agents() {
        let state = fixtures::state();
        let engine = engine();
        let outcomes = vec![
            StepOutcome {
                agent: "green_0".to_string(),
                action: Action::LocalWork(
                    LocalWork::new("green_0", 0, green_ip(), 0.0, 0.0).unwrap(),
                ),
                observation: Observation::failed(),
            },
            StepOutcome {
                agent: "green_1".to_string(),
                action: Action::LocalWork(
                    LocalWork::new("green_1", 0, "10.0.1.30".parse().unwrap(), 0.0, 0.0).unwrap(),
                ),
                observation: Observation::failed(),
            },
        ];
        assert_eq!(engine.score_step(&state, &outcomes, Phase::Preplanning), -2.0);
    }
}

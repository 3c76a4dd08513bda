//! Attacker impact probe against a target host.

use crate::action::SimAction;
use skirmish_core::{Observation, RandomSource, SimState, OT_SERVICE};
use tracing::debug;

/// Disruptive attacker action. Requires an existing foothold on the
/// target; on success it takes the target's operational service down.
#[derive(Debug, Clone)]
pub struct Impact {
    agent: String,
    hostname: String,
}

impl Impact {
    /// Creates an impact probe for the given agent and target.
    pub fn new(agent: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            hostname: hostname.into(),
        }
    }

    /// Target hostname, used for zone scoring.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }
}

impl SimAction for Impact {
    fn execute(&self, state: &mut SimState, _rng: &mut RandomSource) -> Observation {
        let foothold = state
            .host(&self.hostname)
            .is_some_and(|host| !host.sessions_of(&self.agent).is_empty());
        if !foothold {
            debug!(agent = %self.agent, host = %self.hostname, "impact without a foothold");
            return Observation::failed();
        }

        let running = state
            .host(&self.hostname)
            .is_some_and(|host| host.services.get(OT_SERVICE).is_some_and(|s| s.active));
        if running {
            if let Err(error) = state.stop_service(&self.hostname, OT_SERVICE) {
                debug!(%error, host = %self.hostname, "impact could not stop service");
            }
        }
        Observation::succeeded()
    }

    fn name(&self) -> &str {
        "impact"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use skirmish_core::{NewSession, RandomSource, SessionType};

    #[test]
    fn test_impact_needs_a_foothold() {
        let mut state = fixtures::state();
        let mut rng = RandomSource::new(1);

        let action = Impact::new("red_0", "ops_server");
        assert_eq!(action.execute(&mut state, &mut rng).success, Some(false));
        // The operational service is untouched.
        assert!(state.host("ops_server").unwrap().services[OT_SERVICE].active);
    }

    #[test]
    fn test_impact_with_foothold_stops_operational_service() {
        let mut state = fixtures::state();
        let mut rng = RandomSource::new(1);
        state
            .add_session(NewSession::new("red_0", "ops_server", "user", SessionType::Shell))
            .unwrap();

        let action = Impact::new("red_0", "ops_server");
        let observation = action.execute(&mut state, &mut rng);

        assert!(observation.is_success());
        assert!(!state.host("ops_server").unwrap().services[OT_SERVICE].active);
        assert!(state.session_invariant_violations().is_empty());
    }

    #[test]
    fn test_impact_on_host_without_operational_service() {
        let mut state = fixtures::state();
        let mut rng = RandomSource::new(1);
        state
            .add_session(NewSession::new("red_0", "office_server", "user", SessionType::Shell))
            .unwrap();

        let action = Impact::new("red_0", "office_server");
        assert!(action.execute(&mut state, &mut rng).is_success());
    }
}

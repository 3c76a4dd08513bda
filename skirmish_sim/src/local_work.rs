//! Background work against a service on the agent's own host.

use crate::action::SimAction;
use crate::phishing::PhishingEmail;
use skirmish_core::{HostEvent, Observation, RandomSource, SimError, SimState};
use std::net::Ipv4Addr;
use tracing::debug;

pub(crate) fn validate_rate(name: &'static str, value: f64) -> Result<f64, SimError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(SimError::InvalidRate { name, value })
    }
}

/// Simulated legitimate user activity on the agent's own host, with its
/// incidental risk: a chance of looking like malicious process activity
/// and a chance of falling for a phishing lure.
#[derive(Debug, Clone)]
pub struct LocalWork {
    agent: String,
    session: u32,
    ip: Ipv4Addr,
    fp_detection_rate: f64,
    phishing_error_rate: f64,
}

impl LocalWork {
    /// Creates the action. Both rates must lie in [0, 1]; out-of-range
    /// values fail here, never at execution time.
    pub fn new(
        agent: impl Into<String>,
        session: u32,
        ip: Ipv4Addr,
        fp_detection_rate: f64,
        phishing_error_rate: f64,
    ) -> Result<Self, SimError> {
        Ok(Self {
            agent: agent.into(),
            session,
            ip,
            fp_detection_rate: validate_rate("fp_detection_rate", fp_detection_rate)?,
            phishing_error_rate: validate_rate("phishing_error_rate", phishing_error_rate)?,
        })
    }

    /// Address the acting agent resolves to, used for zone scoring.
    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }
}

impl SimAction for LocalWork {
    fn execute(&self, state: &mut SimState, rng: &mut RandomSource) -> Observation {
        // The declared session may have been cleaned up since the agent
        // chose this action.
        let Some(session) = state.session(&self.agent, self.session) else {
            debug!(agent = %self.agent, session = self.session, "local work without a session");
            return Observation::failed();
        };
        let hostname = session.hostname.clone();
        let username = session.username.clone();

        let Some(host) = state.host(&hostname) else {
            return Observation::failed();
        };
        let services = host.active_services();
        let Some(service_name) = rng.pick(&services).cloned() else {
            debug!(host = %hostname, "no service to use");
            return Observation::failed();
        };
        let reliability = host
            .services
            .get(&service_name)
            .map(|service| service.reliability)
            .unwrap_or(0);
        if rng.percentile() >= reliability {
            debug!(host = %hostname, service = %service_name, "service unreliable");
            return Observation::failed();
        }

        let mut observation = Observation::succeeded();

        // The work itself succeeded; side effects are drawn independently.
        if rng.chance(self.fp_detection_rate) {
            if let Some(host) = state.host_mut(&hostname) {
                let pid = host.spawn_process(format!("{service_name}_client"), username, None);
                host.push_event(HostEvent::ProcessCreation {
                    local_address: self.ip,
                    pid,
                });
            }
        }
        if rng.chance(self.phishing_error_rate) {
            let lure = PhishingEmail::new(self.ip);
            observation.merge(lure.execute(state, rng));
        }
        observation
    }

    fn name(&self) -> &str {
        "local_work"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use skirmish_core::{NewSession, SessionType};

    fn green_ip() -> Ipv4Addr {
        "10.0.1.10".parse().unwrap()
    }

    #[test]
    fn test_rates_validated_at_construction() {
        let err = LocalWork::new("green_0", 0, green_ip(), 1.5, 0.0).unwrap_err();
        assert!(matches!(
            err,
            SimError::InvalidRate { name: "fp_detection_rate", .. }
        ));

        let err = LocalWork::new("green_0", 0, green_ip(), 0.0, -0.1).unwrap_err();
        assert!(matches!(
            err,
            SimError::InvalidRate { name: "phishing_error_rate", .. }
        ));
    }

    #[test]
    fn test_missing_session_fails() {
        let mut state = fixtures::state();
        let mut rng = RandomSource::new(1);
        let action = LocalWork::new("green_0", 99, green_ip(), 0.0, 0.0).unwrap();

        assert_eq!(action.execute(&mut state, &mut rng).success, Some(false));
    }

    #[test]
    fn test_no_active_service_fails() {
        let mut state = fixtures::state();
        let mut rng = RandomSource::new(1);
        // green_1 sits on a host with no services at all.
        let action = LocalWork::new("green_1", 0, "10.0.1.30".parse().unwrap(), 0.0, 0.0).unwrap();

        assert_eq!(action.execute(&mut state, &mut rng).success, Some(false));
    }

    #[test]
    fn test_unreliable_service_fails() {
        let mut state = fixtures::state();
        let mut rng = RandomSource::new(1);
        if let Some(service) = state.host_mut("office_pc").unwrap().services.get_mut("mail") {
            service.reliability = 0;
        }
        let action = LocalWork::new("green_0", 0, green_ip(), 0.0, 0.0).unwrap();

        assert_eq!(action.execute(&mut state, &mut rng).success, Some(false));
    }

    #[test]
    fn test_certain_false_positive_appends_one_event() {
        let mut state = fixtures::state();
        let mut rng = RandomSource::new(1);
        let action = LocalWork::new("green_0", 0, green_ip(), 1.0, 0.0).unwrap();

        let observation = action.execute(&mut state, &mut rng);
        assert!(observation.is_success());

        let events = state.drain_events("office_pc");
        assert_eq!(events.len(), 1);
        match &events[0] {
            HostEvent::ProcessCreation { local_address, .. } => {
                assert_eq!(*local_address, green_ip());
            }
            other => panic!("expected a process creation event, got {other:?}"),
        }
    }

    #[test]
    fn test_certain_phishing_creates_attacker_session() {
        let mut state = fixtures::state();
        let mut rng = RandomSource::new(1);
        // A routable attacker foothold on the same subnet.
        state
            .add_session(NewSession::new("red_0", "office_server", "user", SessionType::Shell))
            .unwrap();

        let action = LocalWork::new("green_0", 0, green_ip(), 0.0, 1.0).unwrap();
        let observation = action.execute(&mut state, &mut rng);

        assert!(observation.is_success());
        assert_eq!(observation.sessions.len(), 1);
        assert_eq!(observation.sessions[0].agent, "red_0");
        assert_eq!(observation.sessions[0].hostname, "office_pc");
        // The phished session landed in the engine as well.
        assert!(!state.host("office_pc").unwrap().sessions_of("red_0").is_empty());
        assert!(state.session_invariant_violations().is_empty());
    }

    #[test]
    fn test_no_side_effects_with_zero_rates() {
        let mut state = fixtures::state();
        let mut rng = RandomSource::new(1);
        let action = LocalWork::new("green_0", 0, green_ip(), 0.0, 0.0).unwrap();

        let observation = action.execute(&mut state, &mut rng);
        assert!(observation.is_success());
        assert!(observation.sessions.is_empty());
        assert!(state.drain_events("office_pc").is_empty());
    }
}

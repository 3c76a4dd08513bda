//! Phishing lure sub-action.
//!
//! Never scheduled directly by an agent: local work invokes it when the
//! simulated user falls for a lure. It hands an attacker a foothold on the
//! phished host, provided some attacker session can actually route there.

use crate::action::SimAction;
use skirmish_core::{
    AgentKind, NewSession, Observation, RandomSource, SessionInfo, SessionType, SimState,
};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use tracing::{debug, warn};

/// Username given to footholds gained through a lure.
const PHISHED_USER: &str = "user";

/// A phishing lure originating from the given agent address.
#[derive(Debug, Clone)]
pub struct PhishingEmail {
    ip: Ipv4Addr,
}

impl PhishingEmail {
    /// Creates the sub-action for the phished agent's address.
    pub fn new(ip: Ipv4Addr) -> Self {
        Self { ip }
    }

    /// Address the lure originated from.
    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }
}

impl SimAction for PhishingEmail {
    fn execute(&self, state: &mut SimState, rng: &mut RandomSource) -> Observation {
        let Some(target) = state.host_of_ip(self.ip).map(str::to_string) else {
            warn!(ip = %self.ip, "phishing source address resolves to no host");
            return Observation::failed();
        };

        let red_agents: Vec<String> = state
            .agents_of_kind(AgentKind::Red)
            .into_iter()
            .map(str::to_string)
            .collect();

        // A host that already carries an attacker session has nothing
        // left to give up.
        let already_owned = red_agents.iter().any(|agent| {
            state
                .host(&target)
                .is_some_and(|host| !host.sessions_of(agent).is_empty())
        });
        if already_owned {
            debug!(host = %target, "phished host already compromised");
            return Observation::succeeded();
        }

        // Every (agent, host) pair currently holding an attacker session.
        let mut pairs: Vec<(String, String)> = Vec::new();
        for agent in &red_agents {
            for session in state.sessions_of(agent) {
                let pair = (agent.clone(), session.hostname.clone());
                if !pairs.contains(&pair) {
                    pairs.push(pair);
                }
            }
        }

        let target_subnets: BTreeSet<&str> = state
            .host(&target)
            .map(|host| host.interfaces.iter().map(|iface| iface.subnet.as_str()).collect())
            .unwrap_or_default();

        // A same-subnet attacker that can route to the target wins
        // outright; otherwise sample the remaining pool until one routes
        // or the pool runs dry.
        let direct = pairs
            .iter()
            .find(|(_, hostname)| {
                let co_subnet = state.host(hostname).is_some_and(|host| {
                    host.interfaces
                        .iter()
                        .any(|iface| target_subnets.contains(iface.subnet.as_str()))
                });
                co_subnet && state.topology().reachable(hostname, &target)
            })
            .cloned();

        let chosen = direct.or_else(|| {
            let mut pool = pairs;
            while let Some(pair) = rng.take(&mut pool) {
                if state.topology().reachable(&pair.1, &target) {
                    return Some(pair);
                }
            }
            None
        });

        let Some((agent, attacker_host)) = chosen else {
            debug!(host = %target, "no routable attacker for phishing");
            return Observation::failed();
        };

        match state.add_session(NewSession::new(&agent, &target, PHISHED_USER, SessionType::Phished))
        {
            Ok(id) => {
                debug!(agent = %agent, from = %attacker_host, host = %target, id, "phishing foothold created");
                let mut observation = Observation::succeeded();
                observation.sessions.push(SessionInfo {
                    agent,
                    id,
                    hostname: target,
                    username: PHISHED_USER.to_string(),
                    session_type: SessionType::Phished,
                    pid: None,
                });
                observation
            }
            Err(error) => {
                warn!(%error, host = %target, "phishing session registration failed");
                Observation::failed()
            }
        }
    }

    fn name(&self) -> &str {
        "phishing_email"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn green_ip() -> Ipv4Addr {
        "10.0.1.10".parse().unwrap()
    }

    #[test]
    fn test_already_compromised_host_succeeds_trivially() {
        let mut state = fixtures::state();
        let mut rng = RandomSource::new(1);
        state
            .add_session(NewSession::new("red_0", "office_pc", "user", SessionType::Shell))
            .unwrap();
        let before = state.sessions_of("red_0").len();

        let observation = PhishingEmail::new(green_ip()).execute(&mut state, &mut rng);

        assert!(observation.is_success());
        assert!(observation.sessions.is_empty());
        assert_eq!(state.sessions_of("red_0").len(), before);
    }

    #[test]
    fn test_same_subnet_attacker_is_preferred() {
        let mut state = fixtures::state();
        let mut rng = RandomSource::new(1);
        // One attacker across the gateway, one on the target's subnet.
        state
            .add_session(NewSession::new("red_0", "ops_server", "user", SessionType::Shell))
            .unwrap();
        state
            .add_session(NewSession::new("red_0", "office_server", "user", SessionType::Shell))
            .unwrap();

        let observation = PhishingEmail::new(green_ip()).execute(&mut state, &mut rng);

        assert!(observation.is_success());
        assert_eq!(observation.sessions.len(), 1);
        let info = &observation.sessions[0];
        assert_eq!(info.agent, "red_0");
        assert_eq!(info.hostname, "office_pc");
        assert_eq!(info.session_type, SessionType::Phished);
        assert!(state.session("red_0", info.id).is_some());
    }

    #[test]
    fn test_routable_attacker_found_by_sampling() {
        let mut state = fixtures::state();
        let mut rng = RandomSource::new(1);
        // Only a cross-subnet attacker exists; the gateway routes to it.
        state
            .add_session(NewSession::new("red_0", "ops_server", "user", SessionType::Shell))
            .unwrap();

        let observation = PhishingEmail::new(green_ip()).execute(&mut state, &mut rng);

        assert!(observation.is_success());
        assert_eq!(observation.sessions[0].hostname, "office_pc");
    }

    #[test]
    fn test_exhausted_pool_fails() {
        let mut state = fixtures::state();
        let mut rng = RandomSource::new(1);
        // The only attacker sits on an island no route reaches.
        state
            .add_session(NewSession::new("red_0", "island_box", "user", SessionType::Shell))
            .unwrap();

        let observation = PhishingEmail::new(green_ip()).execute(&mut state, &mut rng);
        assert_eq!(observation.success, Some(false));
    }

    #[test]
    fn test_no_attacker_at_all_fails() {
        let mut state = fixtures::state();
        let mut rng = RandomSource::new(1);

        let observation = PhishingEmail::new(green_ip()).execute(&mut state, &mut rng);
        assert_eq!(observation.success, Some(false));
    }

    #[test]
    fn test_phished_session_has_no_parent() {
        let mut state = fixtures::state();
        let mut rng = RandomSource::new(1);
        state
            .add_session(NewSession::new("red_0", "office_server", "user", SessionType::Shell))
            .unwrap();

        let observation = PhishingEmail::new(green_ip()).execute(&mut state, &mut rng);
        let id = observation.sessions[0].id;
        assert_eq!(state.session("red_0", id).unwrap().parent, None);
    }
}

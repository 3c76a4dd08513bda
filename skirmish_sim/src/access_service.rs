//! Background access of a remote server host.

use crate::action::SimAction;
use crate::local_work::validate_rate;
use skirmish_core::{HostEvent, Observation, RandomSource, SimError, SimState, OT_SERVICE};
use std::net::Ipv4Addr;
use tracing::debug;

/// Simulated legitimate use of a remote service, subject to the phase's
/// allowed-subnet policy, firewall blocks between the endpoint zones, and
/// service reliability.
#[derive(Debug, Clone)]
pub struct AccessService {
    agent: String,
    ip: Ipv4Addr,
    fp_detection_rate: f64,
}

impl AccessService {
    /// Creates the action. The rate must lie in [0, 1].
    pub fn new(
        agent: impl Into<String>,
        ip: Ipv4Addr,
        fp_detection_rate: f64,
    ) -> Result<Self, SimError> {
        Ok(Self {
            agent: agent.into(),
            ip,
            fp_detection_rate: validate_rate("fp_detection_rate", fp_detection_rate)?,
        })
    }

    /// Address the acting agent resolves to, used for zone scoring.
    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    /// Servers the agent may currently reach: not itself, inside the CIDR
    /// union of its allowed subnets. An agent whose own subnet is not in
    /// the allowed list is confined to its own subnet.
    fn candidate_pool(&self, state: &SimState) -> Vec<String> {
        let Ok(own_subnet) = state.get_subnet_containing_ip(self.ip) else {
            return Vec::new();
        };
        let own_name = own_subnet.name.clone();
        let own_cidr = own_subnet.cidr;

        let allowed = state.allowed_subnets(&self.agent);
        let cidrs: Vec<_> = if allowed.contains(&own_name) {
            allowed
                .iter()
                .filter_map(|name| state.subnet_by_name(name))
                .map(|subnet| subnet.cidr)
                .collect()
        } else {
            vec![own_cidr]
        };

        let own_host = state.host_of_ip(self.ip).map(str::to_string);
        let mut pool = Vec::new();
        for hostname in state.hostnames() {
            if Some(hostname) == own_host.as_deref() {
                continue;
            }
            let Some(host) = state.host(hostname) else {
                continue;
            };
            if !host.is_server {
                continue;
            }
            let in_reach = host
                .interfaces
                .iter()
                .any(|iface| cidrs.iter().any(|cidr| cidr.contains(&iface.ip)));
            if in_reach {
                pool.push(hostname.to_string());
            }
        }
        pool
    }
}

impl SimAction for AccessService {
    fn execute(&self, state: &mut SimState, rng: &mut RandomSource) -> Observation {
        let pool = self.candidate_pool(state);
        let Some(destination) = rng.pick(&pool).cloned() else {
            debug!(agent = %self.agent, "no reachable server this phase");
            return Observation::failed();
        };

        // Destination availability. The operational service is preferred
        // when configured; otherwise any active service will do.
        let Some(dest_host) = state.host(&destination) else {
            return Observation::failed();
        };
        let available = if let Some(ot) = dest_host.services.get(OT_SERVICE) {
            ot.active && rng.percentile() < ot.reliability
        } else {
            let actives = dest_host.active_services();
            match rng.pick(&actives) {
                Some(name) => {
                    let reliability = dest_host
                        .services
                        .get(name)
                        .map(|service| service.reliability)
                        .unwrap_or(0);
                    rng.percentile() < reliability
                }
                None => false,
            }
        };
        if !available {
            debug!(host = %destination, "destination service unavailable");
            return Observation::failed();
        }

        let Some(dest_ip) = state.ip_of(&destination) else {
            return Observation::failed();
        };
        let (Ok(src_zone), Ok(dst_zone)) = (state.zone_of_ip(self.ip), state.zone_of_ip(dest_ip))
        else {
            return Observation::failed();
        };

        // A blocked connection attempt is always visible at the target,
        // independent of the false-positive roll below.
        if state.is_blocked(src_zone, dst_zone) {
            let port = rng.ephemeral_port();
            let _ = state.push_event(
                &destination,
                HostEvent::NetworkConnection {
                    local_address: dest_ip,
                    remote_address: self.ip,
                    remote_port: port,
                },
            );
            debug!(%src_zone, %dst_zone, "connection blocked");
            return Observation::failed();
        }

        if rng.chance(self.fp_detection_rate) {
            let port = rng.ephemeral_port();
            let _ = state.push_event(
                &destination,
                HostEvent::NetworkConnection {
                    local_address: dest_ip,
                    remote_address: self.ip,
                    remote_port: port,
                },
            );
        }
        Observation::succeeded()
    }

    fn name(&self) -> &str {
        "access_service"
    }
}

//! Built-in scenario presets.

use ipnet::Ipv4Net;
use nalgebra::Vector3;
use skirmish_core::{
    AgentDef, AgentKind, HostDef, Interface, NewSession, Scenario, ServiceDef, SessionType,
    SubnetDef, Zone, OT_SERVICE,
};
use std::net::Ipv4Addr;

/// Preset identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// Two-site enterprise: nine wired subnets, one per zone, insider
    /// attacker on the contractor LAN.
    Enterprise,

    /// Mobile field deployment: wireless rovers around a base station,
    /// topology follows radio range.
    WirelessField,
}

impl ScenarioId {
    /// All presets.
    pub fn all() -> Vec<ScenarioId> {
        vec![ScenarioId::Enterprise, ScenarioId::WirelessField]
    }

    /// Preset name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Enterprise => "enterprise",
            ScenarioId::WirelessField => "wireless_field",
        }
    }

    /// One-line description.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Enterprise => {
                "Two-site enterprise with an insider foothold on the contractor LAN"
            }
            ScenarioId::WirelessField => {
                "Rovers and a base station; connectivity follows radio range"
            }
        }
    }

    /// Builds the scenario boundary data for this preset.
    pub fn build(&self) -> Scenario {
        match self {
            ScenarioId::Enterprise => enterprise(),
            ScenarioId::WirelessField => wireless_field(),
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "enterprise" => Ok(ScenarioId::Enterprise),
            "wireless_field" | "wireless" => Ok(ScenarioId::WirelessField),
            _ => Err(format!("unknown scenario: {}", s)),
        }
    }
}

fn ip(s: &str) -> Ipv4Addr {
    s.parse().expect("valid preset address")
}

fn cidr(s: &str) -> Ipv4Net {
    s.parse().expect("valid preset cidr")
}

fn subnet(name: &str, block: &str, zone: Zone) -> SubnetDef {
    SubnetDef {
        name: name.to_string(),
        cidr: cidr(block),
        zone,
    }
}

fn service(name: &str, reliability: u8, port: u16, username: &str) -> ServiceDef {
    ServiceDef {
        name: name.to_string(),
        active: true,
        reliability,
        port,
        agent: "blue_0".to_string(),
        username: username.to_string(),
    }
}

fn host(
    hostname: &str,
    interfaces: Vec<Interface>,
    services: Vec<ServiceDef>,
    is_server: bool,
) -> HostDef {
    HostDef {
        hostname: hostname.to_string(),
        interfaces,
        services,
        users: vec![],
        files: vec![],
        is_server,
        os: "linux".to_string(),
        architecture: "x86_64".to_string(),
    }
}

fn green(name: &str, allowed_subnets: Vec<Vec<&str>>) -> AgentDef {
    AgentDef {
        name: name.to_string(),
        kind: AgentKind::Green,
        allowed_subnets: allowed_subnets
            .into_iter()
            .map(|phase| phase.into_iter().map(str::to_string).collect())
            .collect(),
    }
}

fn agent(name: &str, kind: AgentKind) -> AgentDef {
    AgentDef {
        name: name.to_string(),
        kind,
        allowed_subnets: vec![],
    }
}

fn shell(agent: &str, hostname: &str, username: &str) -> NewSession {
    NewSession::new(agent, hostname, username, SessionType::Shell)
}

fn enterprise() -> Scenario {
    Scenario {
        name: "enterprise".to_string(),
        subnets: vec![
            subnet("internet", "203.0.113.0/24", Zone::Internet),
            subnet("public_dmz", "172.16.0.0/24", Zone::PublicAccess),
            subnet("admin_lan", "10.0.0.0/24", Zone::Admin),
            subnet("office_lan", "10.0.1.0/24", Zone::Office),
            subnet("contractor_lan", "10.0.2.0/24", Zone::Contractor),
            subnet("restricted_a", "10.1.0.0/24", Zone::RestrictedA),
            subnet("operational_a", "10.1.1.0/24", Zone::OperationalA),
            subnet("restricted_b", "10.2.0.0/24", Zone::RestrictedB),
            subnet("operational_b", "10.2.1.0/24", Zone::OperationalB),
        ],
        hosts: vec![
            host(
                "edge_gateway",
                vec![
                    Interface::wired(ip("203.0.113.1"), "internet"),
                    Interface::wired(ip("172.16.0.1"), "public_dmz"),
                ],
                vec![],
                false,
            ),
            host(
                "internet_relay",
                vec![Interface::wired(ip("203.0.113.10"), "internet")],
                vec![service("http", 90, 80, "www")],
                true,
            ),
            host(
                "web_server",
                vec![Interface::wired(ip("172.16.0.10"), "public_dmz")],
                vec![service("http", 95, 443, "www")],
                true,
            ),
            host(
                "core_gateway",
                vec![
                    Interface::wired(ip("172.16.0.2"), "public_dmz"),
                    Interface::wired(ip("10.0.0.1"), "admin_lan"),
                    Interface::wired(ip("10.0.1.1"), "office_lan"),
                    Interface::wired(ip("10.0.2.1"), "contractor_lan"),
                    Interface::wired(ip("10.1.0.1"), "restricted_a"),
                    Interface::wired(ip("10.2.0.1"), "restricted_b"),
                ],
                vec![],
                false,
            ),
            host(
                "admin_console",
                vec![Interface::wired(ip("10.0.0.10"), "admin_lan")],
                vec![service("directory", 99, 389, "dirsvc")],
                true,
            ),
            host(
                "office_pc_1",
                vec![Interface::wired(ip("10.0.1.10"), "office_lan")],
                vec![service("mail", 98, 25, "maild")],
                false,
            ),
            host(
                "office_pc_2",
                vec![Interface::wired(ip("10.0.1.11"), "office_lan")],
                vec![service("mail", 98, 25, "maild")],
                false,
            ),
            host(
                "file_server",
                vec![Interface::wired(ip("10.0.1.20"), "office_lan")],
                vec![service("smb", 90, 445, "filesvc")],
                true,
            ),
            host(
                "contractor_laptop",
                vec![Interface::wired(ip("10.0.2.10"), "contractor_lan")],
                vec![service("mail", 95, 25, "maild")],
                false,
            ),
            host(
                "gateway_a",
                vec![
                    Interface::wired(ip("10.1.0.2"), "restricted_a"),
                    Interface::wired(ip("10.1.1.1"), "operational_a"),
                ],
                vec![],
                false,
            ),
            host(
                "historian_a",
                vec![Interface::wired(ip("10.1.0.10"), "restricted_a")],
                vec![service("database", 90, 5432, "dba")],
                true,
            ),
            host(
                "plc_a",
                vec![Interface::wired(ip("10.1.1.10"), "operational_a")],
                vec![service(OT_SERVICE, 99, 4840, "otsvc")],
                true,
            ),
            host(
                "gateway_b",
                vec![
                    Interface::wired(ip("10.2.0.2"), "restricted_b"),
                    Interface::wired(ip("10.2.1.1"), "operational_b"),
                ],
                vec![],
                false,
            ),
            host(
                "historian_b",
                vec![Interface::wired(ip("10.2.0.10"), "restricted_b")],
                vec![service("database", 90, 5432, "dba")],
                true,
            ),
            host(
                "plc_b",
                vec![Interface::wired(ip("10.2.1.10"), "operational_b")],
                vec![service(OT_SERVICE, 99, 4840, "otsvc")],
                true,
            ),
        ],
        agents: vec![
            green(
                "green_1",
                vec![
                    vec!["office_lan", "public_dmz", "restricted_a", "restricted_b"],
                    vec!["office_lan", "public_dmz", "restricted_a"],
                    vec!["office_lan", "public_dmz", "restricted_b"],
                ],
            ),
            green(
                "green_2",
                vec![
                    vec!["office_lan", "public_dmz", "restricted_a", "restricted_b"],
                    vec!["office_lan", "public_dmz", "restricted_a"],
                    vec!["office_lan", "public_dmz", "restricted_b"],
                ],
            ),
            green(
                "green_3",
                vec![
                    vec!["contractor_lan", "public_dmz"],
                    vec!["public_dmz"],
                    vec!["public_dmz"],
                ],
            ),
            green(
                "green_4",
                vec![
                    vec!["admin_lan", "office_lan", "public_dmz"],
                    vec!["admin_lan", "office_lan", "public_dmz"],
                    vec!["admin_lan", "office_lan", "public_dmz"],
                ],
            ),
            agent("red_0", AgentKind::Red),
            agent("blue_0", AgentKind::Blue),
        ],
        sessions: vec![
            shell("green_1", "office_pc_1", "gwen"),
            shell("green_2", "office_pc_2", "omar"),
            shell("green_3", "contractor_laptop", "cass"),
            shell("green_4", "admin_console", "ada"),
            shell("red_0", "contractor_laptop", "user"),
        ],
        blocks: vec![
            (Zone::OperationalA, Zone::Internet),
            (Zone::OperationalA, Zone::Contractor),
            (Zone::OperationalB, Zone::Internet),
            (Zone::OperationalB, Zone::Contractor),
        ],
        phase_steps: vec![30, 70, 100],
    }
}

fn wireless_field() -> Scenario {
    Scenario {
        name: "wireless_field".to_string(),
        subnets: vec![
            subnet("base_net", "192.168.0.0/24", Zone::RestrictedA),
            subnet("field_net", "192.168.10.0/24", Zone::OperationalA),
        ],
        hosts: vec![
            host(
                "command_server",
                vec![Interface::wired(ip("192.168.0.10"), "base_net")],
                vec![service("database", 95, 5432, "dba")],
                true,
            ),
            host(
                "base_station",
                vec![
                    Interface::wired(ip("192.168.0.1"), "base_net"),
                    Interface::wireless(
                        ip("192.168.10.1"),
                        "field_net",
                        Vector3::new(0.0, 0.0, 0.0),
                        120.0,
                    ),
                ],
                vec![service(OT_SERVICE, 99, 4840, "otsvc")],
                true,
            ),
            host(
                "rover_1",
                vec![Interface::wireless(
                    ip("192.168.10.10"),
                    "field_net",
                    Vector3::new(60.0, 0.0, 0.0),
                    120.0,
                )],
                vec![service("telemetry", 95, 8080, "telem")],
                false,
            ),
            host(
                "rover_2",
                vec![Interface::wireless(
                    ip("192.168.10.11"),
                    "field_net",
                    Vector3::new(100.0, 40.0, 0.0),
                    120.0,
                )],
                vec![service("telemetry", 95, 8080, "telem")],
                false,
            ),
            host(
                "drifter",
                vec![Interface::wireless(
                    ip("192.168.10.12"),
                    "field_net",
                    Vector3::new(400.0, 0.0, 0.0),
                    120.0,
                )],
                vec![],
                false,
            ),
        ],
        agents: vec![
            green(
                "green_r1",
                vec![
                    vec!["field_net", "base_net"],
                    vec!["field_net"],
                    vec!["field_net"],
                ],
            ),
            green(
                "green_r2",
                vec![
                    vec!["field_net", "base_net"],
                    vec!["field_net"],
                    vec!["field_net"],
                ],
            ),
            agent("red_0", AgentKind::Red),
            agent("blue_0", AgentKind::Blue),
        ],
        sessions: vec![
            shell("green_r1", "rover_1", "ria"),
            shell("green_r2", "rover_2", "rob"),
            shell("red_0", "drifter", "user"),
        ],
        blocks: vec![],
        phase_steps: vec![20, 40, 60],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::SimState;

    #[test]
    fn test_presets_construct() {
        for preset in ScenarioId::all() {
            let scenario = preset.build();
            let state = SimState::from_scenario(&scenario)
                .unwrap_or_else(|e| panic!("{} failed to construct: {e}", preset.name()));
            assert!(state.hostnames().len() > 3);
        }
    }

    #[test]
    fn test_enterprise_routes_span_sites() {
        let state = SimState::from_scenario(&enterprise()).unwrap();
        let path = state.topology().route("contractor_laptop", "plc_a").unwrap();
        assert_eq!(path.first().map(String::as_str), Some("contractor_laptop"));
        assert_eq!(path.last().map(String::as_str), Some("plc_a"));
    }

    #[test]
    fn test_wireless_field_range_partition() {
        let state = SimState::from_scenario(&wireless_field()).unwrap();
        // In-range rovers route back to the wired command server.
        assert!(state.topology().route("command_server", "rover_2").is_some());
        // The drifter is beyond every radio's range.
        assert!(!state.topology().reachable("command_server", "drifter"));
    }

    #[test]
    fn test_scenario_names_parse() {
        for preset in ScenarioId::all() {
            let parsed: ScenarioId = preset.name().parse().unwrap();
            assert_eq!(parsed, preset);
        }
        assert!("nonsense".parse::<ScenarioId>().is_err());
    }
}

//! Shared test topology used by the action and reward tests.

use skirmish_core::{
    AgentDef, AgentKind, HostDef, Interface, NewSession, Scenario, ServiceDef, SessionType,
    SimState, SubnetDef, Zone, OT_SERVICE,
};

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

fn host(hostname: &str, interfaces: Vec<Interface>, services: Vec<ServiceDef>, is_server: bool) -> HostDef {
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

/// Three subnets: an office LAN, an operational LAN reachable through a
/// gateway, and an island subnet no route reaches.
pub fn scenario() -> Scenario {
    Scenario {
        name: "fixture".to_string(),
        subnets: vec![
            SubnetDef {
                name: "office_lan".to_string(),
                cidr: "10.0.1.0/24".parse().expect("valid cidr"),
                zone: Zone::Office,
            },
            SubnetDef {
                name: "ops_lan".to_string(),
                cidr: "10.0.2.0/24".parse().expect("valid cidr"),
                zone: Zone::OperationalA,
            },
            SubnetDef {
                name: "island_net".to_string(),
                cidr: "10.9.9.0/24".parse().expect("valid cidr"),
                zone: Zone::Contractor,
            },
        ],
        hosts: vec![
            host(
                "office_pc",
                vec![Interface::wired("10.0.1.10".parse().expect("valid ip"), "office_lan")],
                vec![service("mail", 100, 25, "maild")],
                false,
            ),
            host(
                "office_server",
                vec![Interface::wired("10.0.1.20".parse().expect("valid ip"), "office_lan")],
                vec![service("http", 100, 80, "www")],
                true,
            ),
            host(
                "bare_pc",
                vec![Interface::wired("10.0.1.30".parse().expect("valid ip"), "office_lan")],
                vec![],
                false,
            ),
            host(
                "gateway",
                vec![
                    Interface::wired("10.0.1.1".parse().expect("valid ip"), "office_lan"),
                    Interface::wired("10.0.2.1".parse().expect("valid ip"), "ops_lan"),
                ],
                vec![],
                false,
            ),
            host(
                "ops_server",
                vec![Interface::wired("10.0.2.10".parse().expect("valid ip"), "ops_lan")],
                vec![
                    service(OT_SERVICE, 100, 4840, "otsvc"),
                    service("telemetry", 100, 8080, "telem"),
                ],
                true,
            ),
            host(
                "island_box",
                vec![Interface::wired("10.9.9.10".parse().expect("valid ip"), "island_net")],
                vec![service("http", 100, 80, "www")],
                true,
            ),
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
                name: "green_1".to_string(),
                kind: AgentKind::Green,
                allowed_subnets: vec![
                    vec!["office_lan".to_string()],
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
        sessions: vec![
            NewSession::new("green_0", "office_pc", "gwen", SessionType::Shell),
            NewSession::new("green_1", "bare_pc", "barry", SessionType::Shell),
        ],
        blocks: vec![],
        phase_steps: vec![10, 20, 30],
    }
}

/// A constructed engine over [`scenario`].
pub fn state() -> SimState {
    SimState::from_scenario(&scenario()).expect("fixture scenario is well formed")
}

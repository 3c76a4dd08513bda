//! Subnets and their mission-relevant zone classification.

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

/// Mission-relevant classification of a subnet, used for reward lookup and
/// firewall block rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Zone {
    Internet,
    PublicAccess,
    Admin,
    Office,
    Contractor,
    RestrictedA,
    OperationalA,
    RestrictedB,
    OperationalB,
}

impl Zone {
    /// All zones, in reward-table order.
    pub const ALL: [Zone; 9] = [
        Zone::Internet,
        Zone::PublicAccess,
        Zone::Admin,
        Zone::Office,
        Zone::Contractor,
        Zone::RestrictedA,
        Zone::OperationalA,
        Zone::RestrictedB,
        Zone::OperationalB,
    ];
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Zone::Internet => "internet",
            Zone::PublicAccess => "public_access",
            Zone::Admin => "admin",
            Zone::Office => "office",
            Zone::Contractor => "contractor",
            Zone::RestrictedA => "restricted_a",
            Zone::OperationalA => "operational_a",
            Zone::RestrictedB => "restricted_b",
            Zone::OperationalB => "operational_b",
        };
        write!(f, "{}", name)
    }
}

/// A named CIDR block with its zone classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subnet {
    /// Unique subnet name
    pub name: String,

    /// The address block
    pub cidr: Ipv4Net,

    /// Zone classification for reward and block lookups
    pub zone: Zone,
}

impl Subnet {
    /// Creates a new subnet.
    pub fn new(name: impl Into<String>, cidr: Ipv4Net, zone: Zone) -> Self {
        Self {
            name: name.into(),
            cidr,
            zone,
        }
    }

    /// Returns true if the address falls inside this block.
    pub fn contains(&self, ip: std::net::Ipv4Addr) -> bool {
        self.cidr.contains(&ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subnet_containment() {
        let cidr: Ipv4Net = "10.0.1.0/24".parse().unwrap();
        let subnet = Subnet::new("office_lan", cidr, Zone::Office);

        assert!(subnet.contains("10.0.1.17".parse().unwrap()));
        assert!(!subnet.contains("10.0.2.17".parse().unwrap()));
    }
}

//! Pre-decoded traffic attributes presented to the resolver

use crate::Protocol;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

/// Session end a binding applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Role {
    /// Initiating end
    Client = 0,
    /// Responding end
    Server = 1,
    /// Either end
    #[default]
    Any = 2,
}

impl Role {
    /// Roles in `role` enumeration order (`client | server | any`)
    pub const BY_CHOICE: [Self; 3] = [Self::Client, Self::Server, Self::Any];
}

/// Attributes of one traffic unit
///
/// `src` is the client (initiating) end of the session and `dst` the server
/// end; decoding and session tracking happen before the resolver sees this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficDescriptor {
    /// External policy selector
    pub policy_id: u32,
    /// VLAN identifier (0 when untagged)
    pub vlan: u16,
    /// Client address
    pub src: IpAddr,
    /// Server address
    pub dst: IpAddr,
    /// Transport protocol
    pub protocol: Protocol,
    /// Service port
    pub port: u16,
    /// Session end this unit is evaluated for
    pub role: Role,
    /// Application service, if already identified
    pub service: Option<String>,
}

impl TrafficDescriptor {
    /// Create descriptor for a flow; remaining attributes take neutral values
    pub fn new(src: IpAddr, dst: IpAddr, protocol: Protocol, port: u16) -> Self {
        Self {
            policy_id: 0,
            vlan: 0,
            src,
            dst,
            protocol,
            port,
            role: Role::Any,
            service: None,
        }
    }

    /// Set policy selector
    pub fn with_policy(mut self, policy_id: u32) -> Self {
        self.policy_id = policy_id;
        self
    }

    /// Set VLAN identifier
    pub fn with_vlan(mut self, vlan: u16) -> Self {
        self.vlan = vlan;
        self
    }

    /// Set session role
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Set identified service
    pub fn with_service(mut self, service: &str) -> Self {
        self.service = Some(service.to_string());
        self
    }
}

impl Default for TrafficDescriptor {
    fn default() -> Self {
        let any = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        Self::new(any, any, Protocol::Ip, 0)
    }
}

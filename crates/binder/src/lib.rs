//! Traffic Binder
//!
//! Resolves, for every traffic unit, which inspection target and which
//! action (block / allow / inspect) applies.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  events  ┌─────────────┐  Vec<Rule>  ┌─────────────┐
//! │ config parser│─────────►│ RuleBuilder │────────────►│  RuleStore  │
//! └──────────────┘          └─────────────┘   publish   │ (ArcSwap)   │
//!                                                       └──────┬──────┘
//!                                                   load (no lock)│
//!        ┌──────────┐   ┌──────────┐   ┌──────────┐            │
//!        │ Worker 0 │   │ Worker 1 │   │ Worker N │◄───────────┘
//!        │ counters │   │ counters │   │ counters │  first match wins,
//!        └──────────┘   └──────────┘   └──────────┘  else inspect
//! ```
//!
//! Rules are evaluated in declaration order. Every unset `when` field is a
//! wildcard, so a rule with nothing set matches all traffic. When nothing
//! matches the resolver returns a built-in rule whose action is `inspect`.

#![warn(missing_docs)]

pub mod builder;
pub mod config;
pub mod engine;
pub mod stats;
pub mod store;

pub use builder::RuleBuilder;
pub use config::{BinderConfig, BindingConfig, UseConfig, WhenConfig};
pub use engine::{Binder, Worker};
pub use stats::{BindStats, StatsSnapshot, WorkerStats};
pub use store::{RuleSet, RuleStore};

pub use binder_common::{
    BindError, BindResult, BitList, ConfigEvent, ProtoBits, Protocol, Role, TrafficDescriptor,
    Value,
};

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

/// Disposition of matching traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Not configured yet; only seen while a rule is being built
    #[default]
    Unspecified,
    /// Drop matching traffic
    Block,
    /// Pass matching traffic without inspection
    Allow,
    /// Hand matching traffic to the bound inspector
    Inspect,
}

impl Action {
    /// Actions in `action` enumeration order (`block | allow | inspect`)
    pub const BY_CHOICE: [Self; 3] = [Self::Block, Self::Allow, Self::Inspect];

    /// Action actually applied; an omitted action means inspect
    #[inline(always)]
    pub const fn effective(self) -> Self {
        match self {
            Self::Unspecified => Self::Inspect,
            other => other,
        }
    }
}

/// Match criteria; unset fields match anything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct When {
    /// External policy selector (0 = any)
    pub policy_id: u32,
    /// VLAN identifiers
    pub vlans: Option<BitList>,
    /// Networks
    pub nets: Vec<IpNetwork>,
    /// Protocols
    pub protocols: ProtoBits,
    /// Ports
    pub ports: Option<BitList>,
    /// Session end
    pub role: Role,
    /// Application service
    pub service: Option<String>,
}

impl When {
    /// Check every set criterion against the descriptor
    #[inline]
    pub fn matches(&self, desc: &TrafficDescriptor) -> bool {
        if self.policy_id != 0 && self.policy_id != desc.policy_id {
            return false;
        }

        if let Some(vlans) = &self.vlans {
            if !vlans.is_empty() && !vlans.contains(u32::from(desc.vlan)) {
                return false;
            }
        }

        if !self.protocols.includes(desc.protocol) {
            return false;
        }

        if let Some(ports) = &self.ports {
            if !ports.is_empty() && !ports.contains(u32::from(desc.port)) {
                return false;
            }
        }

        if self.role != Role::Any && self.role != desc.role {
            return false;
        }

        if !self.nets.is_empty() && !self.check_addr(desc) {
            return false;
        }

        match &self.service {
            Some(svc) => desc.service.as_deref() == Some(svc.as_str()),
            None => true,
        }
    }

    // nets are checked against the session end picked by role
    #[inline]
    fn check_addr(&self, desc: &TrafficDescriptor) -> bool {
        let contains = |ip| self.nets.iter().any(|net| net.contains(ip));
        match self.role {
            Role::Client => contains(desc.src),
            Role::Server => contains(desc.dst),
            Role::Any => contains(desc.src) || contains(desc.dst),
        }
    }

    /// Check if no criterion is set
    pub fn is_wildcard(&self) -> bool {
        self.policy_id == 0
            && self.vlans.as_ref().map_or(true, BitList::is_empty)
            && self.nets.is_empty()
            && self.protocols.is_all()
            && self.ports.as_ref().map_or(true, BitList::is_empty)
            && self.role == Role::Any
            && self.service.is_none()
    }
}

/// Target configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Use {
    /// What to do with matching traffic
    pub action: Action,
    /// Externally loaded configuration
    pub file: Option<String>,
    /// Service override
    pub service: Option<String>,
    /// Module to bind
    pub module_type: Option<String>,
    /// Symbol name; defaults to the module type
    pub name: Option<String>,
}

impl Use {
    /// Apply defaults that depend on other fields
    fn finalize(&mut self) {
        self.action = self.action.effective();
        if self.name.is_none() {
            self.name = self.module_type.clone();
        }
    }
}

/// A binding: match criteria plus target
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rule {
    /// Match criteria
    pub when: When,
    /// Target
    pub target: Use,
}

impl Rule {
    /// Rule returned when nothing matches: inspect, no target
    pub fn fallback() -> Self {
        Self {
            when: When::default(),
            target: Use {
                action: Action::Inspect,
                ..Default::default()
            },
        }
    }

    /// Bind traffic identified as `service` to `module_type`
    pub fn for_service(service: &str, module_type: &str) -> Self {
        let mut rule = Self::default();
        rule.when.service = Some(service.to_string());
        rule.target.module_type = Some(module_type.to_string());
        rule.finalized()
    }

    /// Bind traffic of the given protocols to `module_type`
    pub fn for_protocol(protocols: ProtoBits, module_type: &str) -> Self {
        let mut rule = Self::default();
        rule.when.protocols = protocols;
        rule.target.module_type = Some(module_type.to_string());
        rule.finalized()
    }

    /// Rule with defaults applied
    pub(crate) fn finalized(mut self) -> Self {
        self.target.finalize();
        self
    }

    /// Match against descriptor
    #[inline(always)]
    pub fn matches(&self, desc: &TrafficDescriptor) -> bool {
        self.when.matches(desc)
    }

    /// Resolved action
    #[inline(always)]
    pub fn action(&self) -> Action {
        self.target.action.effective()
    }

    /// Symbol name of the bound module
    pub fn name(&self) -> Option<&str> {
        self.target.name.as_deref()
    }
}

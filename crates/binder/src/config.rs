//! Structured binder configuration
//!
//! Translates serde-deserialized bindings into the same event stream an
//! external parser produces, so every value goes through one validation
//! path in [`RuleBuilder`](crate::RuleBuilder).

use binder_common::{BindResult, ConfigEvent, Value, BIND_NAME};
use serde::{Deserialize, Serialize};

/// Binder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BinderConfig {
    /// Number of worker counter slots
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Bindings in priority order
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
}

/// One binding
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingConfig {
    /// Match criteria
    #[serde(default)]
    pub when: WhenConfig,
    /// Target configuration
    #[serde(default, rename = "use")]
    pub target: UseConfig,
}

/// Match criteria as written in configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhenConfig {
    /// Policy selector
    pub policy_id: Option<i64>,
    /// VLAN identifiers
    pub vlans: Option<Vec<u32>>,
    /// Addresses / CIDRs
    pub nets: Option<Vec<String>>,
    /// `any | ip | icmp | tcp | udp`
    #[serde(alias = "protocols")]
    pub proto: Option<String>,
    /// Ports
    pub ports: Option<Vec<u32>>,
    /// `client | server | any`
    pub role: Option<String>,
    /// Application service
    pub service: Option<String>,
}

/// Target as written in configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UseConfig {
    /// `block | allow | inspect`
    pub action: Option<String>,
    /// Configuration file
    pub file: Option<String>,
    /// Service override
    pub service: Option<String>,
    /// Module type
    #[serde(rename = "type")]
    pub module_type: Option<String>,
    /// Symbol name
    pub name: Option<String>,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            bindings: Vec::new(),
        }
    }
}

impl BinderConfig {
    /// Parse JSON configuration
    pub fn from_json(text: &str) -> BindResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Configuration event stream for the bindings
    pub fn events(&self) -> Vec<ConfigEvent> {
        let when = format!("{BIND_NAME}.when");
        let target = format!("{BIND_NAME}.use");
        let mut events = vec![ConfigEvent::begin(BIND_NAME, 0)];

        for (i, binding) in self.bindings.iter().enumerate() {
            let index = i + 1;
            events.push(ConfigEvent::begin(BIND_NAME, index));

            events.push(ConfigEvent::begin(&when, 0));
            binding.when.push_events(&when, &mut events);
            events.push(ConfigEvent::end(&when, 0));

            events.push(ConfigEvent::begin(&target, 0));
            binding.target.push_events(&target, &mut events);
            events.push(ConfigEvent::end(&target, 0));

            events.push(ConfigEvent::end(BIND_NAME, index));
        }

        events.push(ConfigEvent::end(BIND_NAME, 0));
        events
    }
}

impl WhenConfig {
    fn push_events(&self, table: &str, events: &mut Vec<ConfigEvent>) {
        let mut set = |field: &str, value: Value| {
            events.push(ConfigEvent::set(&format!("{table}.{field}"), value));
        };
        if let Some(id) = self.policy_id {
            set("policy_id", Value::Int(id));
        }
        if let Some(vlans) = &self.vlans {
            set("vlans", Value::Bits(vlans.clone()));
        }
        if let Some(nets) = &self.nets {
            set("nets", Value::Str(nets.join(" ")));
        }
        if let Some(proto) = &self.proto {
            set("proto", Value::Str(proto.clone()));
        }
        if let Some(ports) = &self.ports {
            set("ports", Value::Bits(ports.clone()));
        }
        if let Some(role) = &self.role {
            set("role", Value::Str(role.clone()));
        }
        if let Some(service) = &self.service {
            set("service", Value::Str(service.clone()));
        }
    }
}

impl UseConfig {
    fn push_events(&self, table: &str, events: &mut Vec<ConfigEvent>) {
        let fields = [
            ("action", &self.action),
            ("file", &self.file),
            ("service", &self.service),
            ("type", &self.module_type),
            ("name", &self.name),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                let fqn = format!("{table}.{field}");
                events.push(ConfigEvent::set(&fqn, Value::Str(value.clone())));
            }
        }
    }
}

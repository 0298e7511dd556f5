//! Binder parameter table
//!
//! Describes every key the binder accepts, its value kind, domain and
//! default. The builder validates incoming values against it and the same
//! table backs help output.

/// Module name, also the root of every configuration path
pub const BIND_NAME: &str = "binder";

/// Module help text
pub const BIND_HELP: &str = "configure processing based on CIDRs, ports, services, etc.";

/// Kind of value a parameter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Integer with `lo:hi` range (either side may be open)
    Int,
    /// Bit list; range is the largest member
    BitList,
    /// Address/CIDR list
    AddrList,
    /// Enumeration; range is `a | b | c`
    Enum,
    /// Free-form string
    Str,
    /// Nested table
    Table(&'static [Parameter]),
}

/// One configuration parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameter {
    /// Key name
    pub name: &'static str,
    /// Value kind
    pub kind: ParamKind,
    /// Domain, interpreted per kind
    pub range: Option<&'static str>,
    /// Default, as shown in help
    pub default: Option<&'static str>,
    /// Help text
    pub help: &'static str,
}

impl Parameter {
    const fn new(
        name: &'static str,
        kind: ParamKind,
        range: Option<&'static str>,
        default: Option<&'static str>,
        help: &'static str,
    ) -> Self {
        Self { name, kind, range, default, help }
    }

    /// Enumeration choices in index order (empty for non-enums)
    pub fn choices(&self) -> Vec<&'static str> {
        match (self.kind, self.range) {
            (ParamKind::Enum, Some(range)) => range.split('|').map(str::trim).collect(),
            _ => Vec::new(),
        }
    }

    /// Index of enumeration choice `name`
    pub fn choice_index(&self, name: &str) -> Option<usize> {
        self.choices().iter().position(|c| *c == name)
    }

    /// Inclusive integer bounds; open sides are unbounded
    pub fn int_bounds(&self) -> (i64, i64) {
        let Some((lo, hi)) = self.range.and_then(|r| r.split_once(':')) else {
            return (i64::MIN, i64::MAX);
        };
        (
            lo.trim().parse().unwrap_or(i64::MIN),
            hi.trim().parse().unwrap_or(i64::MAX),
        )
    }

    /// Largest bit list member
    pub fn bit_max(&self) -> Option<u32> {
        match self.kind {
            ParamKind::BitList => self.range.and_then(|r| r.trim().parse().ok()),
            _ => None,
        }
    }
}

/// Match criteria
pub const WHEN_PARAMS: &[Parameter] = &[
    Parameter::new(
        "policy_id",
        ParamKind::Int,
        Some("0:"),
        None,
        "unique ID for selection of this config by external logic",
    ),
    Parameter::new("vlans", ParamKind::BitList, Some("4095"), None, "list of VLAN IDs"),
    Parameter::new("nets", ParamKind::AddrList, None, None, "list of networks"),
    Parameter::new(
        "proto",
        ParamKind::Enum,
        Some("any | ip | icmp | tcp | udp"),
        None,
        "protocol",
    ),
    Parameter::new("ports", ParamKind::BitList, Some("65535"), None, "list of ports"),
    Parameter::new(
        "role",
        ParamKind::Enum,
        Some("client | server | any"),
        Some("any"),
        "use the given configuration on one or any end of a session",
    ),
    Parameter::new("service", ParamKind::Str, None, None, "override default configuration"),
];

/// Target configuration
pub const USE_PARAMS: &[Parameter] = &[
    Parameter::new(
        "action",
        ParamKind::Enum,
        Some("block | allow | inspect"),
        Some("inspect"),
        "what to do with matching traffic",
    ),
    Parameter::new("file", ParamKind::Str, None, None, "use configuration in given file"),
    Parameter::new(
        "service",
        ParamKind::Str,
        None,
        None,
        "override automatic service identification",
    ),
    Parameter::new("type", ParamKind::Str, None, None, "select module for binding"),
    Parameter::new("name", ParamKind::Str, None, Some("defaults to type"), "symbol name"),
];

/// Top-level binding tables
pub const BINDER_PARAMS: &[Parameter] = &[
    Parameter::new("when", ParamKind::Table(WHEN_PARAMS), None, None, "match criteria"),
    Parameter::new("use", ParamKind::Table(USE_PARAMS), None, None, "target configuration"),
];

/// Find parameter `name` inside top-level table `table`
pub fn lookup(table: &str, name: &str) -> Option<&'static Parameter> {
    let params = match BINDER_PARAMS.iter().find(|p| p.name == table)?.kind {
        ParamKind::Table(params) => params,
        _ => return None,
    };
    params.iter().find(|p| p.name == name)
}

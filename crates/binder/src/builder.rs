//! Rule construction from the configuration event stream
//!
//! The builder holds at most one binding under construction. A binding is
//! opened by `begin(root, n)` with `n > 0`, filled by `set` calls addressed
//! as `<root>.when.<field>` / `<root>.use.<field>`, and appended to the
//! output when `end(root, n)` closes it with the same `n`. Inside a binding
//! the `when` and `use` tables may be bracketed by their own begin/end pair;
//! while one is open, only its fields may be set. Nothing half-built ever
//! reaches the output: an unclosed binding fails [`RuleBuilder::finish`].

use crate::{Action, Rule};
use binder_common::params::{self, ParamKind, Parameter, BIND_NAME};
use binder_common::{
    BindError, BindResult, BitList, ConfigEvent, ProtoBits, Role, Value,
};
use tracing::debug;

/// Table within a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    When,
    Use,
}

impl Table {
    fn name(self) -> &'static str {
        match self {
            Self::When => "when",
            Self::Use => "use",
        }
    }
}

/// Builds an ordered list of rules
///
/// A builder that returned an error is poisoned for that load and should be
/// dropped; the error names the path that failed.
#[derive(Debug)]
pub struct RuleBuilder {
    root: String,
    work: Option<(usize, Rule)>,
    table: Option<Table>,
    rules: Vec<Rule>,
}

impl RuleBuilder {
    /// Create builder rooted at `binder`
    pub fn new() -> Self {
        Self::with_root(BIND_NAME)
    }

    /// Create builder for a differently named root table
    pub fn with_root(root: &str) -> Self {
        Self {
            root: root.to_string(),
            work: None,
            table: None,
            rules: Vec::new(),
        }
    }

    /// Build rules from a complete event stream
    pub fn build<I>(events: I) -> BindResult<Vec<Rule>>
    where
        I: IntoIterator<Item = ConfigEvent>,
    {
        let mut builder = Self::new();
        for event in events {
            builder.apply(&event)?;
        }
        builder.finish()
    }

    /// Apply one event
    pub fn apply(&mut self, event: &ConfigEvent) -> BindResult<()> {
        match event {
            ConfigEvent::Begin { fqn, index } => self.begin(fqn, *index),
            ConfigEvent::Set { fqn, value } => self.set(fqn, value),
            ConfigEvent::End { fqn, index } => self.end(fqn, *index),
        }
    }

    /// Open table `fqn`
    ///
    /// `begin(root, n)` with `n > 0` starts a new binding; index 0 is the
    /// enclosing list and carries no state.
    pub fn begin(&mut self, fqn: &str, index: usize) -> BindResult<()> {
        if fqn == self.root {
            if index == 0 {
                return Ok(());
            }
            if self.work.is_some() {
                return Err(BindError::NestedGroup { index });
            }
            self.work = Some((index, Rule::default()));
            return Ok(());
        }

        let table = self.table(fqn)?;
        self.working(fqn)?;
        if self.table.is_some() {
            return Err(BindError::UnbalancedTable { path: fqn.to_string() });
        }
        self.table = Some(table);
        Ok(())
    }

    /// Close table `fqn`; closing a binding appends it to the output
    pub fn end(&mut self, fqn: &str, index: usize) -> BindResult<()> {
        if fqn == self.root {
            let opened = match (&self.work, index) {
                (None, 0) => return Ok(()),
                (None, _) => return Err(BindError::NoOpenGroup { path: fqn.to_string() }),
                (Some((opened, _)), _) => *opened,
            };
            if opened != index {
                return Err(BindError::MismatchedGroup { opened, closed: index });
            }
            if let Some(table) = self.table {
                return Err(BindError::UnbalancedTable {
                    path: format!("{}.{}", self.root, table.name()),
                });
            }
            let Some((_, rule)) = self.work.take() else {
                return Err(BindError::NoOpenGroup { path: fqn.to_string() });
            };
            let rule = rule.finalized();
            debug!(
                index,
                action = ?rule.target.action,
                module = rule.target.module_type.as_deref().unwrap_or("-"),
                "binding built"
            );
            self.rules.push(rule);
            return Ok(());
        }

        let table = self.table(fqn)?;
        self.working(fqn)?;
        if self.table != Some(table) {
            return Err(BindError::UnbalancedTable { path: fqn.to_string() });
        }
        self.table = None;
        Ok(())
    }

    /// Apply a leaf value to the binding under construction
    pub fn set(&mut self, fqn: &str, value: &Value) -> BindResult<()> {
        let (table, param) = self.param(fqn)?;
        if self.table.is_some_and(|open| open != table) {
            return Err(BindError::UnbalancedTable { path: fqn.to_string() });
        }
        let rule = self.working(fqn)?;

        match (table, param.name) {
            (Table::When, "policy_id") => {
                let v = value.as_int(fqn)?;
                let (lo, hi) = param.int_bounds();
                let hi = hi.min(i64::from(u32::MAX));
                if v < lo || v > hi {
                    return Err(BindError::OutOfRange { path: fqn.to_string(), value: v, max: hi });
                }
                rule.when.policy_id = u32::try_from(v).unwrap_or_default();
            }
            (Table::When, "vlans") => rule.when.vlans = Some(bit_list(fqn, param, value)?),
            (Table::When, "nets") => rule.when.nets = value.to_networks(fqn)?,
            (Table::When, "proto") => {
                rule.when.protocols = ProtoBits::BY_CHOICE[choice(fqn, param, value)?];
            }
            (Table::When, "ports") => rule.when.ports = Some(bit_list(fqn, param, value)?),
            (Table::When, "role") => rule.when.role = Role::BY_CHOICE[choice(fqn, param, value)?],
            (Table::When, "service") => rule.when.service = Some(value.as_str(fqn)?.to_string()),

            (Table::Use, "action") => {
                rule.target.action = Action::BY_CHOICE[choice(fqn, param, value)?];
            }
            (Table::Use, "file") => rule.target.file = Some(value.as_str(fqn)?.to_string()),
            (Table::Use, "service") => rule.target.service = Some(value.as_str(fqn)?.to_string()),
            (Table::Use, "type") => rule.target.module_type = Some(value.as_str(fqn)?.to_string()),
            (Table::Use, "name") => rule.target.name = Some(value.as_str(fqn)?.to_string()),

            _ => return Err(BindError::UnknownKey { path: fqn.to_string() }),
        }
        Ok(())
    }

    /// Append a default binding for traffic identified as `service`
    pub fn bind_service(&mut self, service: &str, module_type: &str) {
        debug!(service, module = module_type, "default service binding");
        self.rules.push(Rule::for_service(service, module_type));
    }

    /// Append a default binding for traffic of the given protocols
    pub fn bind_protocol(&mut self, protocols: ProtoBits, module_type: &str) {
        debug!(protocols = protocols.bits(), module = module_type, "default protocol binding");
        self.rules.push(Rule::for_protocol(protocols, module_type));
    }

    /// Number of finished rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if no rule is finished
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Finish building and hand over the rules in declaration order
    pub fn finish(self) -> BindResult<Vec<Rule>> {
        if let Some((index, _)) = self.work {
            return Err(BindError::UnclosedGroup { index });
        }
        Ok(self.rules)
    }

    fn working(&mut self, fqn: &str) -> BindResult<&mut Rule> {
        self.work
            .as_mut()
            .map(|(_, rule)| rule)
            .ok_or_else(|| BindError::NoOpenGroup { path: fqn.to_string() })
    }

    // `<root>.when` / `<root>.use`
    fn table(&self, fqn: &str) -> BindResult<Table> {
        let unknown = || BindError::UnknownKey { path: fqn.to_string() };
        let name = fqn
            .strip_prefix(self.root.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .ok_or_else(unknown)?;
        match name {
            "when" => Ok(Table::When),
            "use" => Ok(Table::Use),
            _ => Err(unknown()),
        }
    }

    // `<root>.<table>.<field>`
    fn param(&self, fqn: &str) -> BindResult<(Table, &'static Parameter)> {
        let unknown = || BindError::UnknownKey { path: fqn.to_string() };
        let (table_fqn, field) = fqn.rsplit_once('.').ok_or_else(unknown)?;
        let table = self.table(table_fqn)?;
        let field = match (table, field) {
            (Table::When, "protocols") => "proto",
            (_, field) => field,
        };
        let param = params::lookup(table.name(), field).ok_or_else(unknown)?;
        if matches!(param.kind, ParamKind::Table(_)) {
            return Err(unknown());
        }
        Ok((table, param))
    }
}

impl Default for RuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve an enum value given by index or by name
fn choice(fqn: &str, param: &Parameter, value: &Value) -> BindResult<usize> {
    let choices = param.choices();
    let invalid = |v: String| BindError::InvalidEnum { path: fqn.to_string(), value: v };
    match value {
        Value::Enum(idx) if *idx < choices.len() => Ok(*idx),
        Value::Enum(idx) => Err(invalid(idx.to_string())),
        Value::Str(name) => param.choice_index(name).ok_or_else(|| invalid(name.clone())),
        _ => Err(BindError::TypeMismatch {
            path: fqn.to_string(),
            expected: "enum",
            found: value.kind(),
        }),
    }
}

/// Build a bit list bounded by the parameter's declared domain
fn bit_list(fqn: &str, param: &Parameter, value: &Value) -> BindResult<BitList> {
    let max = param.bit_max().ok_or_else(|| BindError::UnknownKey { path: fqn.to_string() })?;
    BitList::from_members(fqn, max, value.as_bits(fqn)?)
}

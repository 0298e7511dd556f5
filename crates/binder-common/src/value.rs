//! Typed configuration values and the event stream that carries them
//!
//! An external parser turns configuration text into a sequence of
//! [`ConfigEvent`]s: each top-level binding is bracketed by `Begin`/`End`
//! with a non-zero index, nested `when`/`use` tables are bracketed the same
//! way, and every leaf arrives as a fully-qualified `Set`.

use crate::{BindError, BindResult};
use ipnetwork::IpNetwork;

/// Typed configuration value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integer
    Int(i64),
    /// Bit list members
    Bits(Vec<u32>),
    /// Address ranges
    Addrs(Vec<IpNetwork>),
    /// Index into the parameter's enumeration
    Enum(usize),
    /// String
    Str(String),
}

impl Value {
    /// Short name of the value kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Bits(_) => "bit list",
            Self::Addrs(_) => "address list",
            Self::Enum(_) => "enum",
            Self::Str(_) => "string",
        }
    }

    fn mismatch(&self, path: &str, expected: &'static str) -> BindError {
        BindError::TypeMismatch { path: path.to_string(), expected, found: self.kind() }
    }

    /// Integer value
    pub fn as_int(&self, path: &str) -> BindResult<i64> {
        match self {
            Self::Int(v) => Ok(*v),
            _ => Err(self.mismatch(path, "int")),
        }
    }

    /// Enumeration index
    pub fn as_enum(&self, path: &str) -> BindResult<usize> {
        match self {
            Self::Enum(idx) => Ok(*idx),
            _ => Err(self.mismatch(path, "enum")),
        }
    }

    /// Bit list members
    pub fn as_bits(&self, path: &str) -> BindResult<&[u32]> {
        match self {
            Self::Bits(bits) => Ok(bits),
            _ => Err(self.mismatch(path, "bit list")),
        }
    }

    /// String value
    pub fn as_str(&self, path: &str) -> BindResult<&str> {
        match self {
            Self::Str(s) => Ok(s),
            _ => Err(self.mismatch(path, "string")),
        }
    }

    /// Address ranges, parsing a textual list if needed
    ///
    /// Text form is a whitespace or comma separated list of addresses and
    /// CIDRs, optionally wrapped in brackets: `[10.0.0.0/8, 192.168.1.1]`.
    pub fn to_networks(&self, path: &str) -> BindResult<Vec<IpNetwork>> {
        match self {
            Self::Addrs(nets) => Ok(nets.clone()),
            Self::Str(text) => parse_networks(path, text),
            _ => Err(self.mismatch(path, "address list")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<Vec<u32>> for Value {
    fn from(bits: Vec<u32>) -> Self {
        Self::Bits(bits)
    }
}

/// One step of the configuration stream
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigEvent {
    /// Table opened; a non-zero `index` on the root opens a new binding
    Begin {
        /// Fully-qualified table name
        fqn: String,
        /// Position within a list of tables, 0 for the list itself
        index: usize,
    },
    /// Leaf value
    Set {
        /// Fully-qualified key
        fqn: String,
        /// Typed value
        value: Value,
    },
    /// Table closed
    End {
        /// Fully-qualified table name
        fqn: String,
        /// Position matching the `Begin`
        index: usize,
    },
}

impl ConfigEvent {
    /// Open table `fqn` at `index`
    pub fn begin(fqn: &str, index: usize) -> Self {
        Self::Begin { fqn: fqn.to_string(), index }
    }

    /// Set `fqn` to `value`
    pub fn set(fqn: &str, value: impl Into<Value>) -> Self {
        Self::Set { fqn: fqn.to_string(), value: value.into() }
    }

    /// Close table `fqn` at `index`
    pub fn end(fqn: &str, index: usize) -> Self {
        Self::End { fqn: fqn.to_string(), index }
    }
}

fn parse_networks(path: &str, text: &str) -> BindResult<Vec<IpNetwork>> {
    text.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|tok| !tok.is_empty())
        .map(|tok| {
            tok.parse::<IpNetwork>().map_err(|_| BindError::MalformedAddress {
                path: path.to_string(),
                value: tok.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_network_list() {
        let v = Value::from("[10.0.0.0/8, 192.168.1.1 2001:db8::/32]");
        let nets = v.to_networks("binder.when.nets").unwrap();
        assert_eq!(nets.len(), 3);
        assert_eq!(nets[1].prefix(), 32);
        assert!(nets[2].is_ipv6());
    }

    #[test]
    fn test_malformed_network() {
        let v = Value::from("10.0.0.0/8 not-an-ip");
        match v.to_networks("binder.when.nets").unwrap_err() {
            BindError::MalformedAddress { path, value } => {
                assert_eq!(path, "binder.when.nets");
                assert_eq!(value, "not-an-ip");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_type_mismatch() {
        let err = Value::from("80").as_bits("binder.when.ports").unwrap_err();
        assert!(matches!(
            err,
            BindError::TypeMismatch { expected: "bit list", found: "string", .. }
        ));
        assert!(Value::Int(3).as_str("binder.use.type").is_err());
    }
}

//! Error types for binding configuration

use thiserror::Error;

/// Build-time binder error
///
/// Every variant carries the fully-qualified path that was being applied so
/// a rejected load can be traced back to the offending key.
#[derive(Error, Debug)]
pub enum BindError {
    /// Path outside the recognized `when` / `use` field set
    #[error("unknown binder key: {path}")]
    UnknownKey {
        /// Offending path
        path: String,
    },

    /// Value outside the field's domain
    #[error("{path}: value {value} out of range (max {max})")]
    OutOfRange {
        /// Offending path
        path: String,
        /// Rejected value
        value: i64,
        /// Largest accepted value
        max: i64,
    },

    /// Value of the wrong type for the field
    #[error("{path}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Offending path
        path: String,
        /// Expected value kind
        expected: &'static str,
        /// Kind of the value that was supplied
        found: &'static str,
    },

    /// Enum index or name outside the enumeration
    #[error("{path}: invalid choice '{value}'")]
    InvalidEnum {
        /// Offending path
        path: String,
        /// Rejected choice
        value: String,
    },

    /// Address list entry that is not an address or CIDR
    #[error("{path}: malformed address '{value}'")]
    MalformedAddress {
        /// Offending path
        path: String,
        /// Rejected entry
        value: String,
    },

    /// Value or table outside any open binding
    #[error("{path}: no binding open")]
    NoOpenGroup {
        /// Offending path
        path: String,
    },

    /// Binding closed with an index other than the one it was opened with
    #[error("binding {opened} closed as {closed}")]
    MismatchedGroup {
        /// Index the open binding was started with
        opened: usize,
        /// Index carried by the closing event
        closed: usize,
    },

    /// `when` / `use` table opened, closed or addressed out of turn
    #[error("{path}: table not balanced")]
    UnbalancedTable {
        /// Offending path
        path: String,
    },

    /// Binding opened while another is still being built
    #[error("binding {index} opened before previous binding was closed")]
    NestedGroup {
        /// Index of the binding that was opened
        index: usize,
    },

    /// Build finished with a binding still open
    #[error("binding {index} was never closed")]
    UnclosedGroup {
        /// Index of the unfinished binding
        index: usize,
    },

    /// Structured configuration could not be deserialized
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for binder configuration
pub type BindResult<T> = Result<T, BindError>;

//! Binder Common - shared types for traffic binding
//!
//! Value types that cross the boundary between an external configuration
//! parser, the rule builder and the per-packet resolver:
//! - Typed configuration values and the ingestion event stream
//! - Bounded bit lists for VLANs and ports
//! - Protocol bitmasks and session roles
//! - The pre-decoded traffic descriptor
//! - The binder parameter table
//! - Error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bits;
pub mod error;
pub mod params;
pub mod proto;
pub mod traffic;
pub mod value;

pub use bits::*;
pub use error::*;
pub use params::{Parameter, ParamKind, BIND_HELP, BIND_NAME};
pub use proto::*;
pub use traffic::*;
pub use value::*;

//! Shared foundational types used across the vshim workspace.
//!
//! This crate provides port identifiers and descriptors, the mapping from
//! port widths to the C storage classes a compiled model uses, and the
//! 2-state [`PortValue`] bit vector that carries port contents between the
//! host, the session, and the trace writer.

#![warn(missing_docs)]

pub mod port;
pub mod value;

pub use port::{is_c_identifier, CType, PortDirection, PortId, PortSpec};
pub use value::{ParseValueError, PortValue};

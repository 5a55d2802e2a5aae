//! Port identifiers and descriptors for a compiled model's interface.
//!
//! A model exposes a fixed list of ports. Each port is addressed by a
//! stable [`PortId`] (its index in that list) and described by a
//! [`PortSpec`]. The [`CType`] of a port is the storage class the external
//! simulator uses for it, which determines both the generated C declaration
//! and how the port's memory is read across the FFI boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, copyable index of a port in a model's port list.
///
/// Port ids are assigned in declaration order and never change during a
/// session.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct PortId(u32);

impl PortId {
    /// Creates a `PortId` from a raw `u32` index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw `u32` index.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Returns the index as a `usize` for slice access.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Direction of a port as seen from the model.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    /// Driven by the caller before `eval`.
    Input,
    /// Driven by the model, read after `eval`.
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => write!(f, "input"),
            PortDirection::Output => write!(f, "output"),
        }
    }
}

/// Name, width, and direction of a single model port.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct PortSpec {
    /// Port name, identical to the member name in the compiled model.
    pub name: String,
    /// Width in bits. Always at least 1.
    pub width: u32,
    /// Port direction.
    pub direction: PortDirection,
}

impl PortSpec {
    /// Creates an input port descriptor.
    pub fn input(name: impl Into<String>, width: u32) -> Self {
        Self {
            name: name.into(),
            width,
            direction: PortDirection::Input,
        }
    }

    /// Creates an output port descriptor.
    pub fn output(name: impl Into<String>, width: u32) -> Self {
        Self {
            name: name.into(),
            width,
            direction: PortDirection::Output,
        }
    }

    /// Returns the C storage class of this port.
    pub fn ctype(&self) -> CType {
        CType::for_width(self.width)
    }

    /// Returns true if the caller is allowed to drive this port.
    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }
}

/// C storage class the external simulator uses for a signal of a given width.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CType {
    /// 1 to 8 bits (`CData`).
    U8,
    /// 9 to 16 bits (`SData`).
    U16,
    /// 17 to 32 bits (`IData`).
    U32,
    /// 33 to 64 bits (`QData`).
    U64,
    /// More than 64 bits, stored as an array of 32-bit words (`WData`).
    Wide {
        /// Number of 32-bit words.
        words: u32,
    },
}

impl CType {
    /// Returns the storage class for a signal of `width` bits.
    ///
    /// A width of zero maps to [`CType::U8`]; callers validate widths before
    /// this point.
    pub fn for_width(width: u32) -> Self {
        match width {
            0..=8 => CType::U8,
            9..=16 => CType::U16,
            17..=32 => CType::U32,
            33..=64 => CType::U64,
            _ => CType::Wide {
                words: width.div_ceil(32),
            },
        }
    }

    /// Returns the C element type name (`uint8_t`, ..., `uint32_t` for wide).
    pub fn c_name(self) -> &'static str {
        match self {
            CType::U8 => "uint8_t",
            CType::U16 => "uint16_t",
            CType::U32 | CType::Wide { .. } => "uint32_t",
            CType::U64 => "uint64_t",
        }
    }

    /// Returns the number of bytes the port occupies in model memory.
    pub fn byte_size(self) -> usize {
        match self {
            CType::U8 => 1,
            CType::U16 => 2,
            CType::U32 => 4,
            CType::U64 => 8,
            CType::Wide { words } => words as usize * 4,
        }
    }
}

/// Returns true if `name` is a valid C identifier.
///
/// Port and model names are pasted into generated C++ and resolved as
/// symbols, so they must be plain identifiers.
pub fn is_c_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

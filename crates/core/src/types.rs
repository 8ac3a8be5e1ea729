//! Core types for the faceting layer
//!
//! This module defines the foundational types:
//! - DocId: segment-local document ordinal
//! - NO_MORE_DOCS: iterator exhaustion sentinel
//! - ValueKind: how a field's term values are typed and ordered

use serde::{Deserialize, Serialize};
use std::fmt;

/// Segment-local document ordinal
///
/// Signed so iterators can sit at `-1` before their first `next_doc()`.
pub type DocId = i32;

/// Sentinel returned by iterators and forward scans once exhausted
pub const NO_MORE_DOCS: DocId = i32::MAX;

/// Value-index reserved for "document has no value for this field"
pub const MISSING_VALUE_INDEX: i32 = 0;

/// Type of the values stored in a facet field
///
/// Determines how raw term strings are parsed, ordered and formatted.
/// Numeric kinds order numerically, so `"10"` sorts after `"9"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Plain strings, ordered lexicographically
    #[default]
    String,
    /// 32-bit integers
    Int,
    /// 64-bit integers
    Long,
    /// 32-bit floats
    Float,
    /// 64-bit floats
    Double,
}

impl ValueKind {
    /// Whether values of this kind are numeric
    pub fn is_numeric(&self) -> bool {
        !matches!(self, ValueKind::String)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Int => "int",
            ValueKind::Long => "long",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
        };
        f.write_str(name)
    }
}

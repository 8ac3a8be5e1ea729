//! Error types for the faceting layer
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Ordering violations on write-once structures are not represented here:
//! they are programming errors and panic at the call site.

use crate::types::DocId;
use std::io;
use thiserror::Error;

/// Result type alias for faceting operations
pub type FacetResult<T> = std::result::Result<T, FacetError>;

/// Error types for the faceting layer
#[derive(Debug, Error)]
pub enum FacetError {
    /// I/O error while scanning a segment
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The search layer failed to enumerate a segment
    #[error("Segment {segment} error: {reason}")]
    Segment {
        /// Segment identifier
        segment: u64,
        /// Underlying cause as reported by the segment reader
        reason: String,
    },

    /// Building the data of a facet failed
    #[error("Failed to load facet '{facet}': {source}")]
    Load {
        /// Facet name
        facet: String,
        /// Underlying failure
        #[source]
        source: Box<FacetError>,
    },

    /// A selection or spec referenced a facet nobody registered
    #[error("Unknown facet: {0}")]
    UnknownFacet(String),

    /// The data registered under a facet name is not of the expected kind
    #[error("Facet '{facet}' does not hold {expected} data")]
    WrongFacetData {
        /// Facet name
        facet: String,
        /// Kind of data the caller expected
        expected: &'static str,
    },

    /// Malformed range string
    #[error("Invalid range '{range}': {reason}")]
    InvalidRange {
        /// The range string as received
        range: String,
        /// Why it was rejected
        reason: String,
    },

    /// A value could not be interpreted for the field's type
    #[error("Invalid value '{value}' for {kind} field: {reason}")]
    InvalidValue {
        /// The raw value
        value: String,
        /// Field value kind
        kind: String,
        /// Why it was rejected
        reason: String,
    },

    /// Invalid configuration value
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// A document holds more values than the nested array allows
    #[error("Document {doc} exceeds the maximum of {max_items} values")]
    TooManyValues {
        /// Document id
        doc: DocId,
        /// Configured per-document limit
        max_items: usize,
    },

    /// The overflow arena of one nested-array page is full
    #[error("Nested array page {page} overflow: {required} slots required, {limit} addressable")]
    PageOverflow {
        /// Page number
        page: usize,
        /// Slots the page would need
        required: usize,
        /// Slots a page can address
        limit: usize,
    },

    /// A value does not fit the element width of a segmented array
    #[error("Value {value} does not fit in a {width} element")]
    ValueOutOfRange {
        /// Offending value
        value: i64,
        /// Element type name
        width: &'static str,
    },

    /// A compact multi-value field has too many distinct values
    #[error("Compact field has {count} distinct values, at most {max} supported")]
    TooManyCompactValues {
        /// Distinct values found
        count: usize,
        /// Bit capacity of the compact representation
        max: usize,
    },

    /// A single-valued field carried more than one value for a document
    #[error("Field '{field}' has more than one value for document {doc}")]
    MultipleValues {
        /// Field name
        field: String,
        /// Document id
        doc: DocId,
    },

    /// A segment-level cache build was cancelled
    #[error("Facet data build cancelled")]
    Cancelled,
}

impl FacetError {
    /// Wrap a cache construction failure with the facet it belongs to
    pub fn load(facet: impl Into<String>, source: FacetError) -> Self {
        FacetError::Load {
            facet: facet.into(),
            source: Box::new(source),
        }
    }

    /// Build an `InvalidRange` error
    pub fn invalid_range(range: impl Into<String>, reason: impl Into<String>) -> Self {
        FacetError::InvalidRange {
            range: range.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error is a capacity error raised at load time
    pub fn is_capacity_error(&self) -> bool {
        match self {
            FacetError::TooManyValues { .. }
            | FacetError::PageOverflow { .. }
            | FacetError::ValueOutOfRange { .. }
            | FacetError::TooManyCompactValues { .. } => true,
            FacetError::Load { source, .. } => source.is_capacity_error(),
            _ => false,
        }
    }

    /// Check if this error is a configuration or usage error
    pub fn is_usage_error(&self) -> bool {
        match self {
            FacetError::UnknownFacet(_)
            | FacetError::WrongFacetData { .. }
            | FacetError::InvalidRange { .. }
            | FacetError::InvalidValue { .. }
            | FacetError::InvalidConfig(_)
            | FacetError::MultipleValues { .. } => true,
            FacetError::Load { source, .. } => source.is_usage_error(),
            _ => false,
        }
    }
}

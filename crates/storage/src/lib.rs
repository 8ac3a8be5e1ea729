//! Storage structures for facet data
//!
//! This crate implements the in-memory building blocks facet caches are made of:
//! - OpenBitSet: flat bitset over value-indices
//! - BigSegmentedArray: paged 8/16/32-bit arrays with forward scan primitives
//! - LazyBigIntArray: paged array allocating pages on first write
//! - BigFloatArray: paged float array for geo coordinates
//! - BigNestedIntArray: write-once packed storage for multi-valued fields
//! - TermValueList: sorted distinct values of a field
//!
//! Everything here is built once per segment and then read concurrently
//! without locking.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bitset;
pub mod nested;
pub mod segmented;
pub mod values;

pub use bitset::OpenBitSet;
pub use nested::{BigNestedIntArray, NestedArrayBuilder, NestedArrayLoader, MAX_SLOTS, MISSING};
pub use segmented::{
    BigByteArray, BigFloatArray, BigIntArray, BigSegmentedArray, BigShortArray, Element,
    Histogram, LazyBigIntArray, SegmentedArray, BLOCK_SIZE,
};
pub use values::{
    build_term_list, compare_values, BuiltTermList, NumericTerm, TermNumberList, TermStringList,
    TermValueList,
};

/// Allocate an order array wide enough for `num_values` value-indices
///
/// More than `i16::MAX` values need 32-bit elements, more than `i8::MAX`
/// need 16-bit, anything smaller fits in bytes.
pub fn new_order_array(num_values: usize, size: usize) -> Box<dyn BigSegmentedArray> {
    if num_values > i16::MAX as usize {
        Box::new(BigIntArray::new(size))
    } else if num_values > i8::MAX as usize {
        Box::new(BigShortArray::new(size))
    } else {
        Box::new(BigByteArray::new(size))
    }
}

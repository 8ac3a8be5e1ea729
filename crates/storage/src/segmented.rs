//! Paged fixed-width integer arrays
//!
//! Order arrays map every document of a segment to a value-index. They are
//! stored as fixed pages of `BLOCK_SIZE` elements so growing never copies
//! existing data, and the element width is picked from the number of
//! distinct values (see `new_order_array` in the index crate).
//!
//! Besides O(1) `get`/`add`, every variant provides forward linear scans
//! (`find_value`, `find_value_range`, `find_bits`, `find_values`) that return
//! the first id in `[from, max_id]` whose element matches, or `NO_MORE_DOCS`.
//! Filter iterators are built entirely on these scans.
//!
//! # Known defect
//!
//! `add` truncates values that do not fit the element width, the same way an
//! `as` cast does. Loaders must go through `try_add`, which reports the
//! overflow as `ValueOutOfRange` instead.

use crate::bitset::OpenBitSet;
use facets_core::{DocId, FacetError, FacetResult, NO_MORE_DOCS};
use std::fmt;

/// Elements per page
pub const BLOCK_SIZE: usize = 1024;

/// `log2(BLOCK_SIZE)`
pub const SHIFT_SIZE: u32 = 10;

/// Mask selecting the in-page offset of an id
pub const MASK: usize = BLOCK_SIZE - 1;

// ============================================================================
// BigSegmentedArray trait
// ============================================================================

/// Paged integer array with forward scan primitives
///
/// # Thread Safety
///
/// Arrays are written once while a cache is built and then shared read-only,
/// so implementations must be Send + Sync.
pub trait BigSegmentedArray: Send + Sync + fmt::Debug {
    /// Element at `id`
    fn get(&self, id: DocId) -> i32;

    /// Store `val` at `id`, truncating to the element width
    fn add(&mut self, id: DocId, val: i32);

    /// Store `val` at `id`, failing if it does not fit the element width
    fn try_add(&mut self, id: DocId, val: i32) -> FacetResult<()>;

    /// Number of addressable elements
    fn capacity(&self) -> usize;

    /// Grow to hold at least `size` elements, preserving existing values
    fn ensure_capacity(&mut self, size: usize);

    /// Reset every element to `val`
    fn fill(&mut self, val: i32);

    /// Largest value the element width can hold
    fn max_value(&self) -> i32;

    /// First id in `[from, max_id]` whose element equals `val`
    fn find_value(&self, val: i32, from: DocId, max_id: DocId) -> DocId;

    /// First id in `[from, max_id]` whose element lies in `[min_val, max_val]`
    fn find_value_range(&self, min_val: i32, max_val: i32, from: DocId, max_id: DocId) -> DocId;

    /// First id in `[from, max_id]` whose element shares a bit with `bits`
    fn find_bits(&self, bits: i32, from: DocId, max_id: DocId) -> DocId;

    /// First id in `[from, max_id]` whose element is set in `bitset`
    fn find_values(&self, bitset: &OpenBitSet, from: DocId, max_id: DocId) -> DocId;

    /// First id in `[from, max_id]` whose element satisfies `pred`
    fn find_where(&self, from: DocId, max_id: DocId, pred: &dyn Fn(i32) -> bool) -> DocId;
}

/// Inclusive scan window `[from, end]` clipped to `capacity`, or `None` if empty
#[inline]
pub(crate) fn scan_window(from: DocId, max_id: DocId, capacity: usize) -> Option<(usize, usize)> {
    let from = from.max(0) as i64;
    let end = (max_id as i64).min(capacity as i64 - 1);
    if from > end {
        None
    } else {
        Some((from as usize, end as usize))
    }
}

// ============================================================================
// Element
// ============================================================================

/// Integer element stored in a `SegmentedArray`
pub trait Element: Copy + Default + PartialEq + Send + Sync + fmt::Debug + 'static {
    /// Type name used in overflow errors
    const WIDTH: &'static str;
    /// Largest representable value
    const MAX: i32;
    /// Narrow with `as` semantics
    fn truncate(v: i32) -> Self;
    /// Narrow, or `None` if `v` does not fit
    fn checked(v: i32) -> Option<Self>;
    /// Widen back to `i32`
    fn widen(self) -> i32;
}

macro_rules! impl_element {
    ($ty:ty, $name:expr) => {
        impl Element for $ty {
            const WIDTH: &'static str = $name;
            const MAX: i32 = <$ty>::MAX as i32;

            #[inline]
            fn truncate(v: i32) -> Self {
                v as $ty
            }

            #[inline]
            fn checked(v: i32) -> Option<Self> {
                <$ty>::try_from(v).ok()
            }

            #[inline]
            fn widen(self) -> i32 {
                self as i32
            }
        }
    };
}

impl_element!(i8, "i8");
impl_element!(i16, "i16");
impl_element!(i32, "i32");

// ============================================================================
// SegmentedArray
// ============================================================================

/// Eagerly allocated paged array of `T`
#[derive(Clone)]
pub struct SegmentedArray<T: Element> {
    pages: Vec<Box<[T]>>,
}

/// 8-bit order array
pub type BigByteArray = SegmentedArray<i8>;

/// 16-bit order array
pub type BigShortArray = SegmentedArray<i16>;

/// 32-bit order array
pub type BigIntArray = SegmentedArray<i32>;

impl<T: Element> SegmentedArray<T> {
    /// Create an array holding at least `size` zeroed elements
    pub fn new(size: usize) -> Self {
        let num_pages = (size + BLOCK_SIZE - 1) >> SHIFT_SIZE;
        Self {
            pages: (0..num_pages).map(|_| new_page(T::default())).collect(),
        }
    }

    /// Scan `[from, max_id]` for the first element satisfying `pred`
    #[inline]
    fn scan(&self, from: DocId, max_id: DocId, mut pred: impl FnMut(T) -> bool) -> DocId {
        let Some((mut id, end)) = scan_window(from, max_id, self.capacity()) else {
            return NO_MORE_DOCS;
        };
        while id <= end {
            let page = &self.pages[id >> SHIFT_SIZE];
            let start = id & MASK;
            let stop = (BLOCK_SIZE - 1).min(start + (end - id));
            if let Some(offset) = page[start..=stop].iter().position(|&v| pred(v)) {
                return (id + offset) as DocId;
            }
            id += stop - start + 1;
        }
        NO_MORE_DOCS
    }

    /// Copy out the first `len` elements
    pub fn to_vec(&self, len: usize) -> Vec<i32> {
        (0..len.min(self.capacity()))
            .map(|i| self.get(i as DocId))
            .collect()
    }
}

fn new_page<T: Copy>(fill: T) -> Box<[T]> {
    vec![fill; BLOCK_SIZE].into_boxed_slice()
}

impl<T: Element> fmt::Debug for SegmentedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentedArray")
            .field("width", &T::WIDTH)
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl<T: Element> BigSegmentedArray for SegmentedArray<T> {
    #[inline]
    fn get(&self, id: DocId) -> i32 {
        let id = id as usize;
        self.pages[id >> SHIFT_SIZE][id & MASK].widen()
    }

    #[inline]
    fn add(&mut self, id: DocId, val: i32) {
        let id = id as usize;
        self.pages[id >> SHIFT_SIZE][id & MASK] = T::truncate(val);
    }

    fn try_add(&mut self, id: DocId, val: i32) -> FacetResult<()> {
        let narrowed = T::checked(val).ok_or(FacetError::ValueOutOfRange {
            value: val as i64,
            width: T::WIDTH,
        })?;
        let id = id as usize;
        self.pages[id >> SHIFT_SIZE][id & MASK] = narrowed;
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.pages.len() << SHIFT_SIZE
    }

    fn ensure_capacity(&mut self, size: usize) {
        let num_pages = (size + BLOCK_SIZE - 1) >> SHIFT_SIZE;
        while self.pages.len() < num_pages {
            self.pages.push(new_page(T::default()));
        }
    }

    fn fill(&mut self, val: i32) {
        let v = T::truncate(val);
        for page in &mut self.pages {
            page.fill(v);
        }
    }

    fn max_value(&self) -> i32 {
        T::MAX
    }

    fn find_value(&self, val: i32, from: DocId, max_id: DocId) -> DocId {
        self.scan(from, max_id, |v| v.widen() == val)
    }

    fn find_value_range(&self, min_val: i32, max_val: i32, from: DocId, max_id: DocId) -> DocId {
        self.scan(from, max_id, |v| {
            let v = v.widen();
            v >= min_val && v <= max_val
        })
    }

    fn find_bits(&self, bits: i32, from: DocId, max_id: DocId) -> DocId {
        self.scan(from, max_id, |v| (v.widen() & bits) != 0)
    }

    fn find_values(&self, bitset: &OpenBitSet, from: DocId, max_id: DocId) -> DocId {
        self.scan(from, max_id, |v| bitset.get_i32(v.widen()))
    }

    fn find_where(&self, from: DocId, max_id: DocId, pred: &dyn Fn(i32) -> bool) -> DocId {
        self.scan(from, max_id, |v| pred(v.widen()))
    }
}

// ============================================================================
// LazyBigIntArray
// ============================================================================

/// 32-bit paged array that allocates a page on first write
///
/// Unallocated pages read back as the fill value. Used for hit-count
/// histograms, where most pages stay untouched when a query matches few
/// values.
#[derive(Clone)]
pub struct LazyBigIntArray {
    pages: Vec<Option<Box<[i32]>>>,
    fill_value: i32,
}

impl LazyBigIntArray {
    /// Create an array of at least `size` elements reading back as 0
    pub fn new(size: usize) -> Self {
        Self::with_fill_value(size, 0)
    }

    /// Create an array of at least `size` elements reading back as `fill_value`
    pub fn with_fill_value(size: usize, fill_value: i32) -> Self {
        let num_pages = (size + BLOCK_SIZE - 1) >> SHIFT_SIZE;
        Self {
            pages: vec![None; num_pages],
            fill_value,
        }
    }

    /// Value unallocated pages read back as
    pub fn fill_value(&self) -> i32 {
        self.fill_value
    }

    /// Number of pages holding their own storage
    pub fn allocated_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.is_some()).count()
    }

    #[inline]
    fn page_mut(&mut self, page_id: usize) -> &mut [i32] {
        let fill_value = self.fill_value;
        self.pages[page_id].get_or_insert_with(|| new_page(fill_value))
    }

    /// Add one to the element at `id`
    #[inline]
    pub fn increment(&mut self, id: DocId) {
        let id = id as usize;
        self.page_mut(id >> SHIFT_SIZE)[id & MASK] += 1;
    }

    fn scan(&self, from: DocId, max_id: DocId, pred: impl Fn(i32) -> bool) -> DocId {
        let Some((mut id, end)) = scan_window(from, max_id, self.capacity()) else {
            return NO_MORE_DOCS;
        };
        let fill_matches = pred(self.fill_value);
        while id <= end {
            let start = id & MASK;
            let stop = (BLOCK_SIZE - 1).min(start + (end - id));
            match &self.pages[id >> SHIFT_SIZE] {
                Some(page) => {
                    if let Some(offset) = page[start..=stop].iter().position(|&v| pred(v)) {
                        return (id + offset) as DocId;
                    }
                }
                None if fill_matches => return id as DocId,
                None => {}
            }
            id += stop - start + 1;
        }
        NO_MORE_DOCS
    }
}

impl fmt::Debug for LazyBigIntArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyBigIntArray")
            .field("capacity", &self.capacity())
            .field("allocated_pages", &self.allocated_pages())
            .field("fill_value", &self.fill_value)
            .finish()
    }
}

impl BigSegmentedArray for LazyBigIntArray {
    #[inline]
    fn get(&self, id: DocId) -> i32 {
        let id = id as usize;
        match &self.pages[id >> SHIFT_SIZE] {
            Some(page) => page[id & MASK],
            None => self.fill_value,
        }
    }

    #[inline]
    fn add(&mut self, id: DocId, val: i32) {
        let id = id as usize;
        self.page_mut(id >> SHIFT_SIZE)[id & MASK] = val;
    }

    fn try_add(&mut self, id: DocId, val: i32) -> FacetResult<()> {
        self.add(id, val);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.pages.len() << SHIFT_SIZE
    }

    fn ensure_capacity(&mut self, size: usize) {
        let num_pages = (size + BLOCK_SIZE - 1) >> SHIFT_SIZE;
        if self.pages.len() < num_pages {
            self.pages.resize(num_pages, None);
        }
    }

    fn fill(&mut self, val: i32) {
        self.fill_value = val;
        for page in &mut self.pages {
            *page = None;
        }
    }

    fn max_value(&self) -> i32 {
        i32::MAX
    }

    fn find_value(&self, val: i32, from: DocId, max_id: DocId) -> DocId {
        self.scan(from, max_id, |v| v == val)
    }

    fn find_value_range(&self, min_val: i32, max_val: i32, from: DocId, max_id: DocId) -> DocId {
        self.scan(from, max_id, |v| v >= min_val && v <= max_val)
    }

    fn find_bits(&self, bits: i32, from: DocId, max_id: DocId) -> DocId {
        self.scan(from, max_id, |v| (v & bits) != 0)
    }

    fn find_values(&self, bitset: &OpenBitSet, from: DocId, max_id: DocId) -> DocId {
        self.scan(from, max_id, |v| bitset.get_i32(v))
    }

    fn find_where(&self, from: DocId, max_id: DocId, pred: &dyn Fn(i32) -> bool) -> DocId {
        self.scan(from, max_id, pred)
    }
}

// ============================================================================
// Histogram
// ============================================================================

/// Counter array indexed by value-index
pub trait Histogram {
    /// Add one hit for `index`
    fn increment(&mut self, index: i32);
}

impl Histogram for [i32] {
    #[inline]
    fn increment(&mut self, index: i32) {
        self[index as usize] += 1;
    }
}

impl Histogram for LazyBigIntArray {
    #[inline]
    fn increment(&mut self, index: i32) {
        LazyBigIntArray::increment(self, index);
    }
}

// ============================================================================
// BigFloatArray
// ============================================================================

/// Paged `f32` array, used for precomputed geo coordinates
#[derive(Clone)]
pub struct BigFloatArray {
    pages: Vec<Box<[f32]>>,
}

impl BigFloatArray {
    /// Create an array holding at least `size` zeroed elements
    pub fn new(size: usize) -> Self {
        let num_pages = (size + BLOCK_SIZE - 1) >> SHIFT_SIZE;
        Self {
            pages: (0..num_pages).map(|_| new_page(0.0f32)).collect(),
        }
    }

    /// Element at `id`
    #[inline]
    pub fn get(&self, id: DocId) -> f32 {
        let id = id as usize;
        self.pages[id >> SHIFT_SIZE][id & MASK]
    }

    /// Store `val` at `id`
    #[inline]
    pub fn add(&mut self, id: DocId, val: f32) {
        let id = id as usize;
        self.pages[id >> SHIFT_SIZE][id & MASK] = val;
    }

    /// Number of addressable elements
    pub fn capacity(&self) -> usize {
        self.pages.len() << SHIFT_SIZE
    }

    /// Grow to hold at least `size` elements, preserving existing values
    pub fn ensure_capacity(&mut self, size: usize) {
        let num_pages = (size + BLOCK_SIZE - 1) >> SHIFT_SIZE;
        while self.pages.len() < num_pages {
            self.pages.push(new_page(0.0f32));
        }
    }

    /// Reset every element to `val`
    pub fn fill(&mut self, val: f32) {
        for page in &mut self.pages {
            page.fill(val);
        }
    }
}

impl fmt::Debug for BigFloatArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigFloatArray")
            .field("capacity", &self.capacity())
            .finish()
    }
}

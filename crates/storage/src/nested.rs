//! Write-once packed storage for multi-valued fields
//!
//! Documents are grouped into pages of `MAX_SLOTS` consecutive ids. A page is
//! one `i32` buffer: the first `MAX_SLOTS` words are slots, one per
//! document, and everything after them is the page's overflow arena.
//!
//! A slot word is one of:
//! - `MISSING`: the document has no value
//! - a non-negative value-index: the document has exactly that one value
//! - a negative pointer: `count` values stored at `offset` in the arena
//!
//! Pages whose documents are all missing are never allocated and read from
//! the shared `MISSING_PAGE`.
//!
//! Loading goes through `NestedArrayBuilder`, which requires strictly
//! increasing document ids. Once `finish` returns, the array is immutable and
//! can be shared across query threads without locking.

use crate::bitset::OpenBitSet;
use crate::segmented::{scan_window, Histogram};
use facets_core::{DocId, FacetError, FacetResult, MAX_ITEMS_LIMIT, NO_MORE_DOCS};
use std::cmp::Ordering;
use std::fmt;

/// Documents per page
pub const MAX_SLOTS: usize = 1024;

/// Slot word of a document without values
pub const MISSING: i32 = i32::MIN;

const SLOTID_MASK: usize = MAX_SLOTS - 1;
const PAGEID_SHIFT: u32 = 10;

/// Read-only page every unallocated page resolves to
static MISSING_PAGE: [i32; MAX_SLOTS] = [MISSING; MAX_SLOTS];

/// Slot word encoding
///
/// Pointer words pack an arena offset and a value count:
/// `-(offset << VALIDX_SHIFT) | count`. Arena offsets start after the slot
/// area, so a pointer word is always negative, and offsets stay below
/// `MAX_OFFSET` so it can never collide with `MISSING`.
pub mod slot {
    use super::MISSING;

    /// Bits reserved for the value count of a pointer word
    pub const VALIDX_SHIFT: u32 = 11;

    /// Mask extracting the value count of a pointer word
    pub const COUNT_MASK: i32 = 0x7FF;

    /// First arena offset a pointer word cannot express
    pub const MAX_OFFSET: usize = 1 << 20;

    /// Slot holds no value
    #[inline]
    pub fn is_missing(word: i32) -> bool {
        word == MISSING
    }

    /// Slot holds one value inline
    #[inline]
    pub fn is_inline(word: i32) -> bool {
        word >= 0
    }

    /// Slot points into the arena
    #[inline]
    pub fn is_pointer(word: i32) -> bool {
        word < 0 && word != MISSING
    }

    /// Encode an arena pointer
    #[inline]
    pub fn encode_pointer(offset: usize, count: usize) -> i32 {
        debug_assert!(offset > 0 && offset < MAX_OFFSET);
        debug_assert!(count <= COUNT_MASK as usize);
        -((offset as i32) << VALIDX_SHIFT) | count as i32
    }

    /// Decode an arena pointer into `(offset, count)`
    #[inline]
    pub fn decode_pointer(word: i32) -> (usize, usize) {
        ((-(word >> VALIDX_SHIFT)) as usize, (word & COUNT_MASK) as usize)
    }
}

/// Values a slot resolves to within its page
#[inline]
fn slot_values(page: &[i32], slot_id: usize) -> &[i32] {
    let word = page[slot_id];
    if slot::is_inline(word) {
        std::slice::from_ref(&page[slot_id])
    } else if slot::is_missing(word) {
        &[]
    } else {
        let (offset, count) = slot::decode_pointer(word);
        &page[offset..offset + count]
    }
}

// ============================================================================
// BigNestedIntArray
// ============================================================================

/// Immutable document → value-index list mapping
pub struct BigNestedIntArray {
    pages: Vec<Option<Box<[i32]>>>,
    size: usize,
    max_items: usize,
}

impl BigNestedIntArray {
    /// Build an array of `size` documents from a loader
    ///
    /// # Errors
    ///
    /// Propagates any capacity error raised while the loader adds values,
    /// and rejects `max_items` outside `1..=MAX_ITEMS_LIMIT`.
    pub fn load<L>(size: usize, max_items: usize, loader: &mut L) -> FacetResult<Self>
    where
        L: NestedArrayLoader + ?Sized,
    {
        let mut builder = NestedArrayBuilder::new(size, max_items)?;
        loader.load(&mut builder)?;
        builder.finish()
    }

    /// Number of documents
    pub fn size(&self) -> usize {
        self.size
    }

    /// Per-document value limit this array was built with
    pub fn max_items(&self) -> usize {
        self.max_items
    }

    #[inline]
    fn page(&self, page_id: usize) -> &[i32] {
        match self.pages.get(page_id) {
            Some(Some(page)) => page,
            _ => &MISSING_PAGE,
        }
    }

    /// Values of document `id`, in load order; empty when missing
    #[inline]
    pub fn values(&self, id: DocId) -> &[i32] {
        let id = id as usize;
        slot_values(self.page(id >> PAGEID_SHIFT), id & SLOTID_MASK)
    }

    /// Copy the values of `id` into `buf`, returning how many there are
    pub fn get_data(&self, id: DocId, buf: &mut Vec<i32>) -> usize {
        buf.clear();
        buf.extend_from_slice(self.values(id));
        buf.len()
    }

    /// Number of values document `id` holds
    #[inline]
    pub fn num_items(&self, id: DocId) -> usize {
        self.values(id).len()
    }

    /// Whether document `id` holds `value`
    #[inline]
    pub fn contains(&self, id: DocId, value: i32) -> bool {
        self.values(id).contains(&value)
    }

    /// Whether document `id` holds a value in `[lo, hi]`
    #[inline]
    pub fn contains_value_in_range(&self, id: DocId, lo: i32, hi: i32) -> bool {
        self.values(id).iter().any(|&v| v >= lo && v <= hi)
    }

    /// Whether document `id` holds a value set in `bits`
    #[inline]
    pub fn contains_any(&self, id: DocId, bits: &OpenBitSet) -> bool {
        self.values(id).iter().any(|&v| bits.get_i32(v))
    }

    /// Whether document `id` holds at least one value and none set in `bits`
    #[inline]
    pub fn contains_only_outside(&self, id: DocId, bits: &OpenBitSet) -> bool {
        let values = self.values(id);
        !values.is_empty() && !values.iter().any(|&v| bits.get_i32(v))
    }

    /// Increment `counts` for every value of `id`, returning the value count
    ///
    /// A missing document increments index 0.
    pub fn count<H: Histogram + ?Sized>(&self, id: DocId, counts: &mut H) -> usize {
        let values = self.values(id);
        if values.is_empty() {
            counts.increment(0);
            return 0;
        }
        for &v in values {
            counts.increment(v);
        }
        values.len()
    }

    /// `count` without the result
    #[inline]
    pub fn count_no_return<H: Histogram + ?Sized>(&self, id: DocId, counts: &mut H) {
        self.count(id, counts);
    }

    /// Order two documents by their value lists
    ///
    /// Missing sorts before any value; when one list is a prefix of the other
    /// the shorter one sorts first.
    pub fn compare(&self, i: DocId, j: DocId) -> Ordering {
        self.values(i).cmp(self.values(j))
    }

    /// First doc in `[from, max_id]` holding `value`
    pub fn find_value(&self, value: i32, from: DocId, max_id: DocId) -> DocId {
        self.scan(from, max_id, |values| values.contains(&value))
    }

    /// First doc in `[from, max_id]` holding a value set in `bits`
    pub fn find_values(&self, bits: &OpenBitSet, from: DocId, max_id: DocId) -> DocId {
        self.scan(from, max_id, |values| values.iter().any(|&v| bits.get_i32(v)))
    }

    /// First doc in `[from, max_id]` holding a value in `[lo, hi]`
    pub fn find_values_in_range(&self, lo: i32, hi: i32, from: DocId, max_id: DocId) -> DocId {
        self.scan(from, max_id, |values| {
            values.iter().any(|&v| v >= lo && v <= hi)
        })
    }

    /// First doc in `[from, max_id]` holding values, none of them set in `bits`
    pub fn find_values_outside(&self, bits: &OpenBitSet, from: DocId, max_id: DocId) -> DocId {
        self.scan(from, max_id, |values| {
            !values.is_empty() && !values.iter().any(|&v| bits.get_i32(v))
        })
    }

    fn scan(&self, from: DocId, max_id: DocId, pred: impl Fn(&[i32]) -> bool) -> DocId {
        let Some((mut id, end)) = scan_window(from, max_id, self.size) else {
            return NO_MORE_DOCS;
        };
        let missing_matches = pred(&[]);
        while id <= end {
            let page_id = id >> PAGEID_SHIFT;
            let stop = end.min((page_id << PAGEID_SHIFT) + SLOTID_MASK);
            match self.pages.get(page_id) {
                Some(Some(page)) => {
                    for doc in id..=stop {
                        if pred(slot_values(page, doc & SLOTID_MASK)) {
                            return doc as DocId;
                        }
                    }
                }
                _ if missing_matches => return id as DocId,
                _ => {}
            }
            id = stop + 1;
        }
        NO_MORE_DOCS
    }

    /// Number of pages holding their own storage
    pub fn allocated_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.is_some()).count()
    }
}

impl fmt::Debug for BigNestedIntArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigNestedIntArray")
            .field("size", &self.size)
            .field("max_items", &self.max_items)
            .field("allocated_pages", &self.allocated_pages())
            .finish()
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Source of document values for `BigNestedIntArray::load`
pub trait NestedArrayLoader {
    /// Add every document's values to `builder`, in increasing id order
    fn load(&mut self, builder: &mut NestedArrayBuilder) -> FacetResult<()>;
}

impl<F> NestedArrayLoader for F
where
    F: FnMut(&mut NestedArrayBuilder) -> FacetResult<()>,
{
    fn load(&mut self, builder: &mut NestedArrayBuilder) -> FacetResult<()> {
        self(builder)
    }
}

/// Incremental writer for `BigNestedIntArray`
///
/// Values of one document may be added with repeated `add` calls or a single
/// `add_data`; ids must never decrease.
pub struct NestedArrayBuilder {
    size: usize,
    max_items: usize,
    pages: Vec<Option<Box<[i32]>>>,
    current: Vec<i32>,
    current_page: usize,
    current_dirty: bool,
    pending_id: Option<DocId>,
    pending: Vec<i32>,
}

impl NestedArrayBuilder {
    /// Create a builder for `size` documents
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `max_items` is 0 or above `MAX_ITEMS_LIMIT`.
    pub fn new(size: usize, max_items: usize) -> FacetResult<Self> {
        if max_items == 0 || max_items > MAX_ITEMS_LIMIT {
            return Err(FacetError::InvalidConfig(format!(
                "nested array max_items must be in 1..={}, got {}",
                MAX_ITEMS_LIMIT, max_items
            )));
        }
        let num_pages = (size + MAX_SLOTS - 1) >> PAGEID_SHIFT;
        Ok(Self {
            size,
            max_items,
            pages: vec![None; num_pages],
            current: MISSING_PAGE.to_vec(),
            current_page: 0,
            current_dirty: false,
            pending_id: None,
            pending: Vec::new(),
        })
    }

    /// Append one value to document `id`
    ///
    /// # Panics
    ///
    /// Panics if `id` is below a previously added id, outside the array, or
    /// `val` is negative.
    pub fn add(&mut self, id: DocId, val: i32) -> FacetResult<()> {
        self.begin(id)?;
        assert!(val >= 0, "negative value-index {} for doc {}", val, id);
        self.push(id, val)
    }

    /// Append all of `data` to document `id`
    ///
    /// # Panics
    ///
    /// Same conditions as `add`.
    pub fn add_data(&mut self, id: DocId, data: &[i32]) -> FacetResult<()> {
        self.begin(id)?;
        for &val in data {
            assert!(val >= 0, "negative value-index {} for doc {}", val, id);
            self.push(id, val)?;
        }
        Ok(())
    }

    fn push(&mut self, id: DocId, val: i32) -> FacetResult<()> {
        if self.pending.len() >= self.max_items {
            return Err(FacetError::TooManyValues {
                doc: id,
                max_items: self.max_items,
            });
        }
        self.pending.push(val);
        Ok(())
    }

    fn begin(&mut self, id: DocId) -> FacetResult<()> {
        assert!(
            id >= 0 && (id as usize) < self.size,
            "doc {} outside nested array of size {}",
            id,
            self.size
        );
        match self.pending_id {
            Some(prev) if prev == id => Ok(()),
            Some(prev) => {
                assert!(
                    id > prev,
                    "nested array ids must increase: {} after {}",
                    id,
                    prev
                );
                self.flush()?;
                self.pending_id = Some(id);
                Ok(())
            }
            None => {
                self.pending_id = Some(id);
                Ok(())
            }
        }
    }

    fn flush(&mut self) -> FacetResult<()> {
        let Some(id) = self.pending_id else {
            return Ok(());
        };
        let id = id as usize;
        let page_id = id >> PAGEID_SHIFT;
        if page_id != self.current_page {
            self.seal();
            self.current_page = page_id;
        }
        let slot_id = id & SLOTID_MASK;
        match self.pending.len() {
            0 => {}
            1 => {
                self.current[slot_id] = self.pending[0];
                self.current_dirty = true;
            }
            count => {
                let offset = self.current.len();
                if offset >= slot::MAX_OFFSET {
                    return Err(FacetError::PageOverflow {
                        page: page_id,
                        required: offset + count,
                        limit: slot::MAX_OFFSET,
                    });
                }
                self.current[slot_id] = slot::encode_pointer(offset, count);
                self.current.extend_from_slice(&self.pending);
                self.current_dirty = true;
            }
        }
        self.pending.clear();
        Ok(())
    }

    fn seal(&mut self) {
        let page = std::mem::replace(&mut self.current, MISSING_PAGE.to_vec());
        if self.current_dirty {
            self.pages[self.current_page] = Some(page.into_boxed_slice());
        }
        self.current_dirty = false;
    }

    /// Freeze the loaded data
    pub fn finish(mut self) -> FacetResult<BigNestedIntArray> {
        self.flush()?;
        self.seal();
        Ok(BigNestedIntArray {
            pages: self.pages,
            size: self.size,
            max_items: self.max_items,
        })
    }
}

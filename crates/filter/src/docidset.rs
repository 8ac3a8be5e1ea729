//! Document id sets and their iterators
//!
//! Every filter result is a `DocIdSet`: something that can hand out a
//! forward-only iterator over matching doc ids. Facet filters additionally
//! produce `RandomAccessDocIdSet`s, which answer membership for a single doc
//! in O(1). For a random-access set, the iterator visits exactly the docs for
//! which `get` is true, in increasing order.
//!
//! Iterators start before the first document (`doc_id() == -1`) and report
//! `NO_MORE_DOCS` once exhausted. `advance(target)` with a target at or below
//! the current doc does not move.

use facets_core::{DocId, NO_MORE_DOCS};
use roaring::RoaringBitmap;

/// Forward-only cursor over increasing document ids
pub trait DocIdSetIterator: Send {
    /// Current document, -1 before the first `next_doc`
    fn doc_id(&self) -> DocId;

    /// Move to the next matching document
    fn next_doc(&mut self) -> DocId;

    /// Move to the first matching document at or after `target`
    fn advance(&mut self, target: DocId) -> DocId;
}

impl DocIdSetIterator for Box<dyn DocIdSetIterator + '_> {
    #[inline]
    fn doc_id(&self) -> DocId {
        (**self).doc_id()
    }

    #[inline]
    fn next_doc(&mut self) -> DocId {
        (**self).next_doc()
    }

    #[inline]
    fn advance(&mut self, target: DocId) -> DocId {
        (**self).advance(target)
    }
}

/// A set of documents that can be iterated
pub trait DocIdSet: Send + Sync {
    /// Fresh iterator positioned before the first document
    fn iterator(&self) -> Box<dyn DocIdSetIterator + '_>;
}

/// A doc id set that also answers membership directly
pub trait RandomAccessDocIdSet: DocIdSet {
    /// Whether `doc` is in the set
    fn get(&self, doc: DocId) -> bool;
}

/// Opaque view of a random-access set
pub struct RandomAccessAsDocIdSet(pub Box<dyn RandomAccessDocIdSet>);

impl DocIdSet for RandomAccessAsDocIdSet {
    fn iterator(&self) -> Box<dyn DocIdSetIterator + '_> {
        self.0.iterator()
    }
}

/// Drain an iterator into a vector
pub fn collect_docs(mut iter: impl DocIdSetIterator) -> Vec<DocId> {
    let mut docs = Vec::new();
    loop {
        let doc = iter.next_doc();
        if doc == NO_MORE_DOCS {
            return docs;
        }
        docs.push(doc);
    }
}

/// Whether `doc` lies in `0..max_doc`
#[inline]
pub fn in_segment(doc: DocId, max_doc: usize) -> bool {
    doc >= 0 && (doc as usize) < max_doc
}

// ============================================================================
// FindIterator
// ============================================================================

/// Iterator driven by a forward scan
///
/// `find(from, max_id)` must return the first matching doc in
/// `[from, max_id]` or `NO_MORE_DOCS`. The scan window is narrowed to
/// `[min_id, max_id]`, typically the doc bounds of the selected values.
pub struct FindIterator<F> {
    doc: DocId,
    min_id: DocId,
    max_id: DocId,
    find: F,
}

impl<F> FindIterator<F>
where
    F: Fn(DocId, DocId) -> DocId + Send,
{
    /// Iterator over `[min_id, max_id]` using `find`
    pub fn new(min_id: DocId, max_id: DocId, find: F) -> Self {
        Self {
            doc: -1,
            min_id,
            max_id,
            find,
        }
    }

    #[inline]
    fn find_from(&mut self, from: DocId) -> DocId {
        let from = from.max(self.min_id);
        self.doc = if from > self.max_id {
            NO_MORE_DOCS
        } else {
            (self.find)(from, self.max_id)
        };
        self.doc
    }
}

impl<F> DocIdSetIterator for FindIterator<F>
where
    F: Fn(DocId, DocId) -> DocId + Send,
{
    #[inline]
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> DocId {
        if self.doc == NO_MORE_DOCS {
            return NO_MORE_DOCS;
        }
        self.find_from(self.doc + 1)
    }

    fn advance(&mut self, target: DocId) -> DocId {
        if target <= self.doc || self.doc == NO_MORE_DOCS {
            return self.doc;
        }
        self.find_from(target)
    }
}

// ============================================================================
// Empty
// ============================================================================

/// The empty set
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyDocIdSet;

/// Iterator over the empty set
#[derive(Debug)]
pub struct EmptyIterator {
    doc: DocId,
}

impl EmptyIterator {
    /// Unstarted empty iterator
    pub fn new() -> Self {
        Self { doc: -1 }
    }
}

impl Default for EmptyIterator {
    fn default() -> Self {
        Self::new()
    }
}

impl DocIdSetIterator for EmptyIterator {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> DocId {
        self.doc = NO_MORE_DOCS;
        self.doc
    }

    fn advance(&mut self, _target: DocId) -> DocId {
        self.doc = NO_MORE_DOCS;
        self.doc
    }
}

impl DocIdSet for EmptyDocIdSet {
    fn iterator(&self) -> Box<dyn DocIdSetIterator + '_> {
        Box::new(EmptyIterator::new())
    }
}

impl RandomAccessDocIdSet for EmptyDocIdSet {
    fn get(&self, _doc: DocId) -> bool {
        false
    }
}

// ============================================================================
// All docs
// ============================================================================

/// Every document of a segment
#[derive(Debug, Clone, Copy)]
pub struct AllDocIdSet {
    max_doc: usize,
}

impl AllDocIdSet {
    /// Set of `0..max_doc`
    pub fn new(max_doc: usize) -> Self {
        Self { max_doc }
    }
}

impl DocIdSet for AllDocIdSet {
    fn iterator(&self) -> Box<dyn DocIdSetIterator + '_> {
        let last = self.max_doc as DocId - 1;
        Box::new(FindIterator::new(0, last, |from, _| from))
    }
}

impl RandomAccessDocIdSet for AllDocIdSet {
    fn get(&self, doc: DocId) -> bool {
        in_segment(doc, self.max_doc)
    }
}

// ============================================================================
// Bitmap
// ============================================================================

/// Set backed by a roaring bitmap of doc ids
#[derive(Debug, Clone)]
pub struct BitmapDocIdSet {
    bitmap: RoaringBitmap,
}

impl BitmapDocIdSet {
    /// Wrap `bitmap`
    pub fn new(bitmap: RoaringBitmap) -> Self {
        Self { bitmap }
    }

    /// Number of documents
    pub fn len(&self) -> u64 {
        self.bitmap.len()
    }

    /// True if no document is set
    pub fn is_empty(&self) -> bool {
        self.bitmap.is_empty()
    }
}

/// Iterator over a roaring bitmap using rank/select to skip
pub struct BitmapIterator<'a> {
    bitmap: &'a RoaringBitmap,
    doc: DocId,
}

impl<'a> BitmapIterator<'a> {
    /// Unstarted iterator over `bitmap`
    pub fn new(bitmap: &'a RoaringBitmap) -> Self {
        Self { bitmap, doc: -1 }
    }

    fn seek(&mut self, target: DocId) -> DocId {
        let target = target.max(0) as u32;
        // Number of members below target is the position of the next one
        let below = if target == 0 { 0 } else { self.bitmap.rank(target - 1) };
        self.doc = match u32::try_from(below).ok().and_then(|n| self.bitmap.select(n)) {
            Some(doc) if doc < NO_MORE_DOCS as u32 => doc as DocId,
            _ => NO_MORE_DOCS,
        };
        self.doc
    }
}

impl DocIdSetIterator for BitmapIterator<'_> {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> DocId {
        if self.doc == NO_MORE_DOCS {
            return NO_MORE_DOCS;
        }
        self.seek(self.doc + 1)
    }

    fn advance(&mut self, target: DocId) -> DocId {
        if target <= self.doc || self.doc == NO_MORE_DOCS {
            return self.doc;
        }
        self.seek(target)
    }
}

impl DocIdSet for BitmapDocIdSet {
    fn iterator(&self) -> Box<dyn DocIdSetIterator + '_> {
        Box::new(BitmapIterator::new(&self.bitmap))
    }
}

impl RandomAccessDocIdSet for BitmapDocIdSet {
    fn get(&self, doc: DocId) -> bool {
        doc >= 0 && self.bitmap.contains(doc as u32)
    }
}

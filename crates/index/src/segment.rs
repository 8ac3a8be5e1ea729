//! Segments and their facet data
//!
//! `SegmentReader` is the seam to the search engine: it enumerates a field's
//! (document, value) pairs in document order and hands out term postings.
//! `FacetSegment` wraps a reader and owns every facet cache built over it, so
//! caches are dropped together with the segment.

use facets_core::{DocId, FacetError, FacetResult};
use parking_lot::{Mutex, RwLock};
use roaring::RoaringBitmap;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// (document, raw value) pair of a field
pub type FieldValue = (DocId, String);

/// Boxed enumeration of a field's values
pub type FieldValues<'a> = Box<dyn Iterator<Item = FacetResult<FieldValue>> + 'a>;

/// Read access to one segment of the underlying index
pub trait SegmentReader: Send + Sync {
    /// Stable identifier of the segment
    fn segment_id(&self) -> u64;

    /// Number of documents in the segment
    fn max_doc(&self) -> usize;

    /// Every (doc, value) pair of `field`, in non-decreasing doc order
    ///
    /// A multi-valued field yields one pair per value.
    fn field_values<'a>(&'a self, field: &str) -> FieldValues<'a>;

    /// Documents holding `term` in `field`
    fn postings(&self, field: &str, term: &str) -> FacetResult<Option<RoaringBitmap>>;
}

// ============================================================================
// MemorySegment
// ============================================================================

/// In-memory segment
#[derive(Debug, Clone, Default)]
pub struct MemorySegment {
    id: u64,
    max_doc: usize,
    fields: FxHashMap<String, BTreeMap<DocId, Vec<String>>>,
    postings: FxHashMap<String, FxHashMap<String, RoaringBitmap>>,
}

impl MemorySegment {
    /// Create an empty segment of `max_doc` documents
    pub fn new(id: u64, max_doc: usize) -> Self {
        Self {
            id,
            max_doc,
            ..Default::default()
        }
    }

    /// Add one value of `field` to `doc`
    ///
    /// # Panics
    ///
    /// Panics if `doc` is outside `0..max_doc`.
    pub fn add(&mut self, doc: DocId, field: &str, value: &str) -> &mut Self {
        assert!(
            doc >= 0 && (doc as usize) < self.max_doc,
            "doc {} outside segment of {} docs",
            doc,
            self.max_doc
        );
        self.fields
            .entry(field.to_string())
            .or_default()
            .entry(doc)
            .or_default()
            .push(value.to_string());
        self.postings
            .entry(field.to_string())
            .or_default()
            .entry(value.to_string())
            .or_default()
            .insert(doc as u32);
        self
    }

    /// Add several values of `field` to `doc`
    pub fn add_values(&mut self, doc: DocId, field: &str, values: &[&str]) -> &mut Self {
        for value in values {
            self.add(doc, field, value);
        }
        self
    }
}

impl SegmentReader for MemorySegment {
    fn segment_id(&self) -> u64 {
        self.id
    }

    fn max_doc(&self) -> usize {
        self.max_doc
    }

    fn field_values<'a>(&'a self, field: &str) -> FieldValues<'a> {
        match self.fields.get(field) {
            Some(docs) => Box::new(docs.iter().flat_map(|(&doc, values)| {
                values.iter().map(move |v| Ok((doc, v.clone())))
            })),
            None => Box::new(std::iter::empty()),
        }
    }

    fn postings(&self, field: &str, term: &str) -> FacetResult<Option<RoaringBitmap>> {
        Ok(self
            .postings
            .get(field)
            .and_then(|terms| terms.get(term))
            .cloned())
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Shared flag that aborts in-flight cache builds
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create an untriggered token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// What a cache loader may touch while building
pub struct LoadContext<'a> {
    reader: &'a dyn SegmentReader,
    cancel: Option<&'a CancelToken>,
}

impl<'a> LoadContext<'a> {
    /// Segment being loaded
    pub fn reader(&self) -> &'a dyn SegmentReader {
        self.reader
    }

    /// Fail with `Cancelled` if the build was cancelled
    pub fn check_cancelled(&self) -> FacetResult<()> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(FacetError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Error for a malformed pair reported by the reader
    pub fn segment_error(&self, reason: impl Into<String>) -> FacetError {
        FacetError::Segment {
            segment: self.reader.segment_id(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// FacetSegment
// ============================================================================

type FacetData = Arc<dyn Any + Send + Sync>;

/// A segment plus the facet data built over it
///
/// Facet data is built at most once per facet name. Builds are serialized on
/// an internal mutex; readers of already-built data never wait on a build.
pub struct FacetSegment {
    reader: Arc<dyn SegmentReader>,
    data: RwLock<FxHashMap<String, FacetData>>,
    build_lock: Mutex<()>,
    cancel: Option<CancelToken>,
}

impl FacetSegment {
    /// Wrap a reader
    pub fn new(reader: Arc<dyn SegmentReader>) -> Self {
        Self {
            reader,
            data: RwLock::new(FxHashMap::default()),
            build_lock: Mutex::new(()),
            cancel: None,
        }
    }

    /// Abort cache builds once `token` is cancelled
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Underlying reader
    pub fn reader(&self) -> &dyn SegmentReader {
        self.reader.as_ref()
    }

    /// Segment identifier
    pub fn segment_id(&self) -> u64 {
        self.reader.segment_id()
    }

    /// Number of documents
    pub fn max_doc(&self) -> usize {
        self.reader.max_doc()
    }

    /// Names of the facets whose data is built
    pub fn loaded_facets(&self) -> Vec<String> {
        let mut names: Vec<String> = self.data.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Already-built data of `facet`, if any
    ///
    /// # Errors
    ///
    /// Returns `WrongFacetData` if the data is not a `D`.
    pub fn get<D: Any + Send + Sync>(
        &self,
        facet: &str,
        expected: &'static str,
    ) -> FacetResult<Option<Arc<D>>> {
        let entry = self.data.read().get(facet).cloned();
        entry.map(|data| downcast(facet, expected, data)).transpose()
    }

    /// Data of `facet`, building it with `load` on first access
    ///
    /// # Errors
    ///
    /// Load failures are wrapped in `FacetError::Load` naming the facet.
    /// Returns `WrongFacetData` if data of another type is registered under
    /// the name.
    pub fn get_or_load<D, F>(&self, facet: &str, expected: &'static str, load: F) -> FacetResult<Arc<D>>
    where
        D: Any + Send + Sync,
        F: FnOnce(&LoadContext<'_>) -> FacetResult<D>,
    {
        if let Some(data) = self.get::<D>(facet, expected)? {
            return Ok(data);
        }

        let _build = self.build_lock.lock();
        if let Some(data) = self.get::<D>(facet, expected)? {
            return Ok(data);
        }

        debug!(
            target: "strata::facets",
            segment = self.segment_id(),
            facet,
            "Building facet data"
        );
        let ctx = LoadContext {
            reader: self.reader.as_ref(),
            cancel: self.cancel.as_ref(),
        };
        ctx.check_cancelled()
            .and_then(|_| load(&ctx))
            .map_err(|e| FacetError::load(facet, e))
            .map(|data| {
                let data = Arc::new(data);
                self.data
                    .write()
                    .insert(facet.to_string(), data.clone() as FacetData);
                data
            })
    }

    /// Drop the data of `facet`, returning whether it was built
    pub fn evict(&self, facet: &str) -> bool {
        self.data.write().remove(facet).is_some()
    }
}

fn downcast<D: Any + Send + Sync>(
    facet: &str,
    expected: &'static str,
    data: FacetData,
) -> FacetResult<Arc<D>> {
    data.downcast::<D>().map_err(|_| FacetError::WrongFacetData {
        facet: facet.to_string(),
        expected,
    })
}

impl fmt::Debug for FacetSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacetSegment")
            .field("segment_id", &self.segment_id())
            .field("max_doc", &self.max_doc())
            .field("loaded_facets", &self.loaded_facets())
            .finish()
    }
}

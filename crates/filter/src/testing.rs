//! Fixtures shared by the filter tests

use crate::docidset::{collect_docs, RandomAccessDocIdSet};
use facets_core::{DocId, NO_MORE_DOCS};
use facets_index::{FacetSegment, MemorySegment};
use std::sync::Arc;

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

pub fn segment_with(max_doc: usize, fill: impl FnOnce(&mut MemorySegment)) -> FacetSegment {
    let mut seg = MemorySegment::new(0, max_doc);
    fill(&mut seg);
    FacetSegment::new(Arc::new(seg))
}

/// Seven docs: red red green blue blue green red
pub fn colors() -> FacetSegment {
    segment_with(7, |seg| {
        for (doc, color) in ["red", "red", "green", "blue", "blue", "green", "red"]
            .iter()
            .enumerate()
        {
            seg.add(doc as DocId, "color", color);
        }
    })
}

/// Seven docs with sizes 4 2 3 1 5 6 7
pub fn sizes() -> FacetSegment {
    segment_with(7, |seg| {
        for (doc, size) in ["4", "2", "3", "1", "5", "6", "7"].iter().enumerate() {
            seg.add(doc as DocId, "size", size);
        }
    })
}

/// doc0 = rabbit pet animal, doc1 = dog pet poodle, doc2 untagged
pub fn tags() -> FacetSegment {
    segment_with(3, |seg| {
        seg.add_values(0, "tag", &["rabbit", "pet", "animal"])
            .add_values(1, "tag", &["dog", "pet", "poodle"]);
    })
}

/// Iteration and `get` agree over the whole segment, including `advance`
pub fn assert_consistent(set: &dyn RandomAccessDocIdSet, max_doc: usize) {
    let expected: Vec<DocId> = (0..max_doc as DocId).filter(|&d| set.get(d)).collect();
    assert_eq!(collect_docs(set.iterator()), expected, "iterator disagrees with get");

    for target in 0..=max_doc as DocId {
        let want = expected
            .iter()
            .copied()
            .find(|&d| d >= target)
            .unwrap_or(NO_MORE_DOCS);
        let mut iter = set.iterator();
        assert_eq!(iter.advance(target), want, "advance({}) disagrees with get", target);
    }
}

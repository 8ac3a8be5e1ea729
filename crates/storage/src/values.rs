//! Sorted distinct values of a field
//!
//! A term value list maps value-indices to field values. Index 0 is reserved
//! for "no value" and formats as the empty string; real values start at 1 and
//! are sorted in the field's natural order (byte order for strings, numeric
//! order for typed fields), so a binary search resolves a query value to its
//! value-index and range bounds to insertion points.

use facets_core::{FacetError, FacetResult, ValueKind};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Read-only view of a field's distinct values
pub trait TermValueList: Send + Sync + fmt::Debug {
    /// Number of value-indices, including the reserved index 0
    fn len(&self) -> usize;

    /// True if the field has no real value
    fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Type of the values
    fn kind(&self) -> ValueKind;

    /// Formatted value at `index`; the empty string for index 0
    fn get(&self, index: usize) -> String;

    /// Value-index of `value`, or `None` if absent or not parsable
    fn index_of(&self, value: &str) -> Option<usize>;

    /// Binary search for `value` among indices `1..len`
    ///
    /// Returns `Ok(index)` when found, `Err(insertion_point)` otherwise.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` if `value` cannot be parsed as the field type.
    fn search(&self, value: &str) -> FacetResult<Result<usize, usize>>;

    /// Compare two formatted values in the field's order
    fn compare_values(&self, a: &str, b: &str) -> Ordering;

    /// Numeric value at `index`, for numeric lists
    fn raw_f64(&self, index: usize) -> Option<f64>;
}

// ============================================================================
// TermStringList
// ============================================================================

/// String values in byte order
#[derive(Debug, Clone)]
pub struct TermStringList {
    values: Vec<String>,
}

impl TermStringList {
    fn from_sorted(values: Vec<String>) -> Self {
        let mut all = Vec::with_capacity(values.len() + 1);
        all.push(String::new());
        all.extend(values);
        Self { values: all }
    }
}

impl TermValueList for TermStringList {
    fn len(&self) -> usize {
        self.values.len()
    }

    fn kind(&self) -> ValueKind {
        ValueKind::String
    }

    fn get(&self, index: usize) -> String {
        self.values.get(index).cloned().unwrap_or_default()
    }

    fn index_of(&self, value: &str) -> Option<usize> {
        self.values[1..]
            .binary_search_by(|probe| probe.as_str().cmp(value))
            .ok()
            .map(|i| i + 1)
    }

    fn search(&self, value: &str) -> FacetResult<Result<usize, usize>> {
        Ok(self.values[1..]
            .binary_search_by(|probe| probe.as_str().cmp(value))
            .map(|i| i + 1)
            .map_err(|i| i + 1))
    }

    fn compare_values(&self, a: &str, b: &str) -> Ordering {
        a.cmp(b)
    }

    fn raw_f64(&self, _index: usize) -> Option<f64> {
        None
    }
}

// ============================================================================
// TermNumberList
// ============================================================================

/// Numeric element of a typed term list
pub trait NumericTerm: Copy + Send + Sync + fmt::Debug + fmt::Display + 'static {
    /// Kind reported by the list
    const KIND: ValueKind;
    /// Parse a trimmed field value
    fn parse(s: &str) -> Option<Self>;
    /// Total order
    fn total_cmp(&self, other: &Self) -> Ordering;
    /// Widen for geo and range arithmetic
    fn to_f64(self) -> f64;
}

macro_rules! impl_numeric_term {
    ($ty:ty, $kind:expr, $cmp:expr) => {
        impl NumericTerm for $ty {
            const KIND: ValueKind = $kind;

            fn parse(s: &str) -> Option<Self> {
                s.trim().parse::<$ty>().ok()
            }

            fn total_cmp(&self, other: &Self) -> Ordering {
                $cmp(self, other)
            }

            fn to_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

impl_numeric_term!(i32, ValueKind::Int, Ord::cmp);
impl_numeric_term!(i64, ValueKind::Long, Ord::cmp);
impl_numeric_term!(f32, ValueKind::Float, f32::total_cmp);
impl_numeric_term!(f64, ValueKind::Double, f64::total_cmp);

/// Numeric values in numeric order
#[derive(Debug, Clone)]
pub struct TermNumberList<T: NumericTerm> {
    values: Vec<T>,
}

impl<T: NumericTerm> TermNumberList<T> {
    fn from_sorted(values: Vec<T>) -> Self {
        Self { values }
    }

    /// Typed value at `index`; `None` for index 0 or out of range
    pub fn value(&self, index: usize) -> Option<T> {
        index.checked_sub(1).and_then(|i| self.values.get(i).copied())
    }

    fn parse_or_err(value: &str) -> FacetResult<T> {
        T::parse(value).ok_or_else(|| FacetError::InvalidValue {
            value: value.to_string(),
            kind: T::KIND.to_string(),
            reason: "not parsable as a number".to_string(),
        })
    }
}

impl<T: NumericTerm> TermValueList for TermNumberList<T> {
    fn len(&self) -> usize {
        self.values.len() + 1
    }

    fn kind(&self) -> ValueKind {
        T::KIND
    }

    fn get(&self, index: usize) -> String {
        self.value(index).map(|v| v.to_string()).unwrap_or_default()
    }

    fn index_of(&self, value: &str) -> Option<usize> {
        let target = T::parse(value)?;
        self.values
            .binary_search_by(|probe| probe.total_cmp(&target))
            .ok()
            .map(|i| i + 1)
    }

    fn search(&self, value: &str) -> FacetResult<Result<usize, usize>> {
        let target = Self::parse_or_err(value)?;
        Ok(self
            .values
            .binary_search_by(|probe| probe.total_cmp(&target))
            .map(|i| i + 1)
            .map_err(|i| i + 1))
    }

    fn compare_values(&self, a: &str, b: &str) -> Ordering {
        compare_parsed::<T>(a, b)
    }

    fn raw_f64(&self, index: usize) -> Option<f64> {
        self.value(index).map(NumericTerm::to_f64)
    }
}

/// Numeric order of two formatted values; unparsable values sort last
fn compare_parsed<T: NumericTerm>(a: &str, b: &str) -> Ordering {
    match (T::parse(a), T::parse(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Compare two formatted values in the natural order of `kind`
///
/// Used where no value list is at hand, e.g. when merging facet counts
/// from several segments.
pub fn compare_values(kind: ValueKind, a: &str, b: &str) -> Ordering {
    match kind {
        ValueKind::String => a.cmp(b),
        ValueKind::Int => compare_parsed::<i32>(a, b),
        ValueKind::Long => compare_parsed::<i64>(a, b),
        ValueKind::Float => compare_parsed::<f32>(a, b),
        ValueKind::Double => compare_parsed::<f64>(a, b),
    }
}

// ============================================================================
// Building
// ============================================================================

/// A built term list plus the value-index of every input term
pub struct BuiltTermList {
    /// The sorted list
    pub list: Arc<dyn TermValueList>,
    /// `indices[i]` is the value-index of the i-th input term
    pub indices: Vec<usize>,
}

impl fmt::Debug for BuiltTermList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltTermList")
            .field("values", &self.list.len())
            .field("terms", &self.indices.len())
            .finish()
    }
}

/// Sort and deduplicate raw field terms into a typed list
///
/// Numeric terms that parse to the same value ("1", "01") share one index.
///
/// # Errors
///
/// Returns `InvalidValue` if a term of a numeric field does not parse.
pub fn build_term_list(kind: ValueKind, terms: &[String]) -> FacetResult<BuiltTermList> {
    match kind {
        ValueKind::String => {
            let (values, indices) = sort_dedup(terms.to_vec(), |a, b| a.cmp(b));
            Ok(BuiltTermList {
                list: Arc::new(TermStringList::from_sorted(values)),
                indices,
            })
        }
        ValueKind::Int => build_numeric::<i32>(terms),
        ValueKind::Long => build_numeric::<i64>(terms),
        ValueKind::Float => build_numeric::<f32>(terms),
        ValueKind::Double => build_numeric::<f64>(terms),
    }
}

fn build_numeric<T: NumericTerm>(terms: &[String]) -> FacetResult<BuiltTermList> {
    let parsed = terms
        .iter()
        .map(|t| TermNumberList::<T>::parse_or_err(t))
        .collect::<FacetResult<Vec<T>>>()?;
    let (values, indices) = sort_dedup(parsed, |a, b| a.total_cmp(b));
    Ok(BuiltTermList {
        list: Arc::new(TermNumberList::from_sorted(values)),
        indices,
    })
}

/// Sort `items`, drop duplicates, and map each input position to its 1-based
/// index in the result
fn sort_dedup<T>(items: Vec<T>, cmp: impl Fn(&T, &T) -> Ordering) -> (Vec<T>, Vec<usize>) {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| cmp(&items[a], &items[b]));

    let mut indices = vec![0usize; items.len()];
    let mut keep = vec![false; items.len()];
    let mut last: Option<usize> = None;
    let mut next_index = 0usize;
    for &pos in &order {
        let duplicate = matches!(last, Some(prev) if cmp(&items[prev], &items[pos]) == Ordering::Equal);
        if !duplicate {
            next_index += 1;
            keep[pos] = true;
            last = Some(pos);
        }
        indices[pos] = next_index;
    }

    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    let values = order
        .iter()
        .filter(|&&pos| keep[pos])
        .filter_map(|&pos| slots[pos].take())
        .collect();
    (values, indices)
}

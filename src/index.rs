//! Exact nearest-neighbor index over a batch of document vectors.
//!
//! This is a brute-force flat index: every query scans every stored
//! vector and computes the exact L2 distance, O(N·D) per query and
//! O(N²·D) for the full self-query batch. That bound is a deliberate
//! design constraint, appropriate for the hundreds-to-low-thousands of
//! documents a single user partition holds; it is never silently traded
//! for approximate search, which would change result semantics.
//!
//! The index is ephemeral: built fresh from one run's vector batch,
//! queried, and discarded. There is no incremental mutation and no
//! persistence.

use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during index operations
#[derive(Error, Debug)]
pub enum IndexError {
    #[error(
        "Vector dimension mismatch for '{id}': expected {expected}, got {actual}\nSuggestion: ensure all vectors come from the same embedding model"
    )]
    DimensionMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("Cannot build an index from zero vectors")]
    EmptyIndex,

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error("Distance to '{id}' is not finite\nSuggestion: check the embedder for NaN or infinite components")]
    NonFiniteDistance { id: String },
}

/// Type-safe wrapper for vector dimensions.
///
/// Ensures runtime validation of vector dimensions to prevent dimension
/// mismatches during operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, IndexError> {
        if dim == 0 {
            return Err(IndexError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        Ok(Self(dim))
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }
}

/// Type-safe wrapper for L2 distances.
///
/// Guaranteed finite, which makes the ordering total and the neighbor
/// sort deterministic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distance(f32);

impl Distance {
    /// Creates a new `Distance` with validation.
    ///
    /// Returns an error if the value is NaN or infinite.
    pub fn new(value: f32, id: &str) -> Result<Self, IndexError> {
        if !value.is_finite() {
            return Err(IndexError::NonFiniteDistance { id: id.to_string() });
        }
        Ok(Self(value))
    }

    /// Creates a distance of 0.0 (identical vectors).
    #[must_use]
    pub const fn zero() -> Self {
        Self(0.0)
    }

    /// Returns the underlying f32 value.
    #[must_use]
    pub fn get(&self) -> f32 {
        self.0
    }
}

impl Eq for Distance {}

impl PartialOrd for Distance {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Distance {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// One ranked search result: a document id and its L2 distance to the
/// query, nearest first in any result list.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: String,
    pub distance: Distance,
}

/// Brute-force exact L2 nearest-neighbor index.
///
/// Entries are held in ascending id order so that the tie-break contract
/// is cheap to honor and iteration is reproducible across runs.
#[derive(Debug)]
pub struct FlatIndex {
    dimension: VectorDimension,
    entries: Vec<(String, Vec<f32>)>,
}

impl FlatIndex {
    /// Builds an index over a full vector batch.
    ///
    /// The dimensionality is taken from the first vector; every other
    /// vector is validated against it and a mismatch aborts the build,
    /// leaving no partial index behind.
    ///
    /// # Errors
    /// `EmptyIndex` for an empty batch, `DimensionMismatch` for ragged
    /// input, `InvalidDimension` for zero-length vectors.
    pub fn build(vectors: &BTreeMap<String, Vec<f32>>) -> Result<Self, IndexError> {
        let Some((_, first)) = vectors.iter().next() else {
            return Err(IndexError::EmptyIndex);
        };
        let dimension = VectorDimension::new(first.len())?;

        let mut entries = Vec::with_capacity(vectors.len());
        for (id, vector) in vectors {
            if vector.len() != dimension.get() {
                return Err(IndexError::DimensionMismatch {
                    id: id.clone(),
                    expected: dimension.get(),
                    actual: vector.len(),
                });
            }
            entries.push((id.clone(), vector.clone()));
        }

        Ok(Self { dimension, entries })
    }

    /// Number of indexed vectors
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimensionality all indexed vectors share
    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Searches for the k nearest neighbors of a query vector.
    ///
    /// Exact scan over every entry; results ascend by L2 distance and
    /// are truncated to `min(k, N)`. Ties are deterministic: the query
    /// document itself (identified by `query_id`) ranks first among
    /// equal distances, then ascending id decides. The query document is
    /// a regular member of the index, so with `query_id` set the first
    /// neighbor is the document itself at distance 0; callers that want
    /// self-exclusion filter afterwards.
    ///
    /// # Errors
    /// `DimensionMismatch` if the query length differs from the indexed
    /// dimensionality, `NonFiniteDistance` if a distance computation
    /// overflows to a non-finite value.
    pub fn search(
        &self,
        query: &[f32],
        query_id: Option<&str>,
        k: usize,
    ) -> Result<Vec<Neighbor>, IndexError> {
        if query.len() != self.dimension.get() {
            return Err(IndexError::DimensionMismatch {
                id: query_id.unwrap_or("<query>").to_string(),
                expected: self.dimension.get(),
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        // (squared distance, not-self, id): sorting this tuple yields
        // ascending distance, self first among ties, then ascending id.
        let mut candidates: Vec<(f32, bool, &str)> = Vec::with_capacity(self.entries.len());
        for (id, vector) in &self.entries {
            let dist2 = squared_l2(query, vector);
            if !dist2.is_finite() {
                return Err(IndexError::NonFiniteDistance { id: id.clone() });
            }
            let is_self = query_id.is_some_and(|q| q == id);
            candidates.push((dist2, !is_self, id.as_str()));
        }

        candidates.sort_unstable_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.2.cmp(b.2))
        });
        candidates.truncate(k);

        candidates
            .into_iter()
            .map(|(dist2, _, id)| {
                Ok(Neighbor {
                    id: id.to_string(),
                    distance: Distance::new(dist2.sqrt(), id)?,
                })
            })
            .collect()
    }
}

/// Squared L2 distance; ordering-equivalent to true L2 and cheaper to
/// compute across the full scan.
fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

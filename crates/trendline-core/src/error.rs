//! Typed errors for malformed input to the pure subsystems.
//!
//! Well-understood edge cases (a `null` trend delta, singleton cohesion,
//! a single-cluster separation) are answered with sentinel values, never
//! with an error. A [`ValidationError`] means the caller handed over data
//! that cannot be interpreted at all.

use thiserror::Error;

/// Malformed input rejected by a core function.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The same field name appeared twice in a hash projection.
    #[error("duplicate field name in hash input: {0}")]
    DuplicateField(String),

    /// A hash projection contained an empty field name.
    #[error("empty field name in hash input")]
    EmptyFieldName,

    /// A vector has zero components.
    #[error("vector {index} is empty")]
    EmptyVector { index: usize },

    /// Vectors in one matrix do not share a dimension.
    #[error("vector {index} has dimension {found}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    /// A vector component is NaN or infinite.
    #[error("vector {index} contains a non-finite component")]
    NonFiniteComponent { index: usize },

    /// A vector cannot be L2-normalized.
    #[error("vector {index} has zero norm")]
    ZeroNorm { index: usize },

    /// The label assignment does not cover the vector set one-to-one.
    #[error("label count {labels} does not match vector count {vectors}")]
    LabelCountMismatch { labels: usize, vectors: usize },

    /// A trend sample has an empty keyword.
    #[error("trend sample {index} has an empty keyword")]
    EmptyKeyword { index: usize },

    /// A trend sample value is negative, NaN, or infinite.
    #[error("trend sample {index} has invalid value {value}")]
    InvalidTrendValue { index: usize, value: f64 },

    /// A source name that maps to no known [`Source`](crate::models::Source).
    #[error("unknown source: '{0}'. Must be news, trend, image, or social")]
    UnknownSource(String),
}

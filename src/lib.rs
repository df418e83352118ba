//! Stateful N-dimensional iteration over strided array views.
//!
//! This crate provides [`NdIter`], a cursor that walks the logical elements of
//! an [`ArrayView`] without requiring contiguous memory. It follows the
//! iteration model of numpy's `nditer` and borrows the stride-ordering and
//! dimension-fusion machinery of Strided.jl:
//!
//! - Axes are visited in memory order (smallest absolute stride innermost),
//!   while multi-indices are always reported in the caller's axis numbering
//! - Negative strides are flipped so traversal walks memory forward
//!   (disable with [`IterFlags::DONT_NEGATE_STRIDES`])
//! - Reads may cast to another element type under a [`CastingRule`],
//!   going through a scratch buffer ([`IterFlags::BUFFERED`])
//! - Traversal can be restricted to a sub-range of the flattened order,
//!   unit axes can be removed, and multi-index tracking can be dropped so
//!   contiguous axes coalesce
//!
//! # Example
//!
//! ```rust
//! use strided_nditer::{ArrayView, CastingRule, IterFlags, NdIter};
//!
//! let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
//! let view = ArrayView::new(&data, &[2, 3], &[3, 1], 0).unwrap();
//!
//! let mut it: NdIter<'_, f64> = NdIter::new(&view, IterFlags::empty(), CastingRule::Safe).unwrap();
//! it.set_range(2, 5).unwrap();
//! let values: Vec<f64> = it.values().collect::<Result<_, _>>().unwrap();
//! assert_eq!(values, vec![3.0, 4.0, 5.0]);
//! it.dispose();
//! ```
//!
//! # Casting Example
//!
//! ```rust
//! use strided_nditer::{ArrayView, CastingRule, IterFlags, NdIter, NdIterError};
//!
//! let data = vec![1.5f64, 2.5, 3.5];
//! let view = ArrayView::new(&data, &[3], &[1], 0).unwrap();
//!
//! // Narrowing is refused under the safe rule...
//! let err = NdIter::<f64, f32>::new(&view, IterFlags::BUFFERED, CastingRule::Safe).unwrap_err();
//! assert!(matches!(err, NdIterError::UnsafeCasting { .. }));
//!
//! // ...and allowed under same-kind casting.
//! let mut it = NdIter::<f64, f32>::new(&view, IterFlags::BUFFERED, CastingRule::SameKind).unwrap();
//! assert_eq!(it.value().unwrap(), 1.5f32);
//! ```

mod buffer;
mod casting;
mod cursor;
mod dtype;
mod flags;
mod fuse;
mod iter;
mod order;
mod plan;
pub mod view;

// ============================================================================
// Element types and casting
// ============================================================================
pub use casting::{can_cast, CastingRule};
pub use dtype::{DType, DTypeKind, Element, Scalar};

// ============================================================================
// Iteration engine
// ============================================================================
pub use flags::{IterFlags, IterOrder};
pub use iter::{IterState, NdIter, NdIterConfig, Values};

// ============================================================================
// View types and utilities
// ============================================================================
pub use view::{col_major_strides, row_major_strides, ArrayView};

// ============================================================================
// Constants
// ============================================================================

/// Default capacity, in elements, of the casting scratch buffer.
///
/// The effective capacity never exceeds the length of one innermost run.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

// ============================================================================
// Error types
// ============================================================================

/// Errors that can occur while building or driving an [`NdIter`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NdIterError {
    /// The operand has no elements and `ALLOW_ZERO_SIZE` was not set.
    #[error("cannot iterate over an empty operand without ALLOW_ZERO_SIZE")]
    EmptyOperand,

    /// The requested element type is not reachable under the casting rule.
    #[error("cannot cast {from} to {to} under the '{casting}' rule")]
    UnsafeCasting {
        from: DType,
        to: DType,
        casting: CastingRule,
    },

    /// A single element could not be represented in the requested type.
    #[error("value of type {from} at iteration index {iter_index} is not representable as {to}")]
    Casting {
        from: DType,
        to: DType,
        iter_index: usize,
    },

    /// Casting was requested without enabling buffering.
    #[error("casting {from} to {to} requires the BUFFERED flag")]
    BufferingRequired { from: DType, to: DType },

    /// Reference elements were used without `ALLOW_REFERENCE_ELEMENTS`.
    #[error("operand of type {0} holds references but ALLOW_REFERENCE_ELEMENTS is not set")]
    ReferencesNotAllowed(DType),

    /// Iteration range outside `[0, size]` or with `start > end`.
    #[error("invalid iteration range [{start}, {end}) for size {size}")]
    InvalidRange {
        start: usize,
        end: usize,
        size: usize,
    },

    /// Axis outside the current dimensionality.
    #[error("invalid axis {axis} for ndim {ndim}")]
    InvalidAxis { axis: usize, ndim: usize },

    /// Only unit-extent axes can be removed.
    #[error("axis {axis} has extent {extent}; only unit-extent axes can be removed")]
    NonUnitAxis { axis: usize, extent: usize },

    /// Multi-index with the wrong length or an entry past its extent.
    #[error("multi-index {index:?} is invalid for shape {shape:?}")]
    InvalidMultiIndex {
        index: Vec<usize>,
        shape: Vec<usize>,
    },

    /// Flat index past the number of elements.
    #[error("index {index} out of bounds for size {size}")]
    IndexOutOfBounds { index: usize, size: usize },

    /// Position outside the active iteration range.
    #[error("iteration index {index} outside the active range [{start}, {end})")]
    OutOfRange {
        index: usize,
        start: usize,
        end: usize,
    },

    /// Multi-index queried after tracking was removed.
    #[error("multi-index tracking has been removed from this iterator")]
    TrackingDisabled,

    /// Value requested after the iterator was exhausted.
    #[error("iterator is exhausted")]
    IterationExhausted,

    /// Any operation after `dispose()`.
    #[error("iterator used after dispose")]
    UseAfterDispose,

    /// Stride array length doesn't match dimensions.
    #[error("stride and dims length mismatch")]
    StrideLengthMismatch,

    /// Integer overflow or out-of-bounds access while computing an offset.
    #[error("offset overflow while computing element position")]
    OffsetOverflow,
}

/// Result type for iterator operations.
pub type Result<T> = std::result::Result<T, NdIterError>;

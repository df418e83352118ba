//! Borrowed strided view consumed by the iterator.
//!
//! [`ArrayView`] is the descriptor an array container hands to [`NdIter`]:
//! dims, strides, a base offset, and the backing slice. It never owns the
//! storage and never changes its layout.
//!
//! [`NdIter`]: crate::NdIter

use std::fmt;
use std::sync::Arc;

use crate::dtype::{DType, Element};
use crate::{NdIterError, Result};

// ============================================================================
// Layout checks
// ============================================================================

/// Number of elements a layout spans, with zero extents counted as one.
///
/// This bounds every product the iterator forms over `dims` (element count,
/// C-order strides), so it must fit in `isize`.
pub(crate) fn span(dims: &[usize]) -> Option<usize> {
    dims.iter()
        .try_fold(1isize, |acc, &d| acc.checked_mul(isize::try_from(d.max(1)).ok()?))
        .map(|n| n as usize)
}

/// Check a layout against a backing slice of `len` elements.
///
/// Every reachable offset `offset + sum(i_k * strides[k])` must lie in
/// `[0, len)`; empty views reach nothing.
pub(crate) fn check_layout(
    len: usize,
    dims: &[usize],
    strides: &[isize],
    offset: isize,
) -> Result<()> {
    if dims.len() != strides.len() {
        return Err(NdIterError::StrideLengthMismatch);
    }
    span(dims).ok_or(NdIterError::OffsetOverflow)?;
    if dims.contains(&0) {
        return Ok(());
    }

    // Lowest and highest reachable offsets
    let (lo, hi) = dims
        .iter()
        .zip(strides)
        .try_fold((offset, offset), |(lo, hi), (&d, &s)| {
            let reach = s.checked_mul(d as isize - 1)?;
            Some(if reach < 0 {
                (lo.checked_add(reach)?, hi)
            } else {
                (lo, hi.checked_add(reach)?)
            })
        })
        .ok_or(NdIterError::OffsetOverflow)?;

    match usize::try_from(hi) {
        Ok(hi) if lo >= 0 && hi < len => Ok(()),
        _ => Err(NdIterError::OffsetOverflow),
    }
}

/// Compute column-major strides (first index varies fastest).
///
/// Panics on overflow if the span of `dims` exceeds `isize::MAX`.
pub fn col_major_strides(dims: &[usize]) -> Vec<isize> {
    let mut strides = Vec::with_capacity(dims.len());
    let mut acc = 1isize;
    for &d in dims {
        strides.push(acc);
        acc *= d.max(1) as isize;
    }
    strides
}

/// Compute row-major strides (last index varies fastest).
///
/// Panics on overflow if the span of `dims` exceeds `isize::MAX`.
pub fn row_major_strides(dims: &[usize]) -> Vec<isize> {
    let mut strides = vec![0isize; dims.len()];
    let mut acc = 1isize;
    for (s, &d) in strides.iter_mut().zip(dims.iter()).rev() {
        *s = acc;
        acc *= d.max(1) as isize;
    }
    strides
}

// ============================================================================
// ArrayView
// ============================================================================

/// Immutable strided view over borrowed storage.
///
/// Strides and the offset are counted in elements, not bytes. Cloning a view
/// is cheap: dims and strides are shared.
pub struct ArrayView<'a, T> {
    data: &'a [T],
    dims: Arc<[usize]>,
    strides: Arc<[isize]>,
    offset: isize,
}

impl<T> Clone for ArrayView<'_, T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
        }
    }
}

impl<T> fmt::Debug for ArrayView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayView")
            .field("dims", &self.dims)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .finish()
    }
}

impl<'a, T> ArrayView<'a, T> {
    /// Create a view, checking that every reachable element lies inside `data`.
    pub fn new(data: &'a [T], dims: &[usize], strides: &[isize], offset: isize) -> Result<Self> {
        check_layout(data.len(), dims, strides, offset)?;
        Ok(Self {
            data,
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset,
        })
    }

    /// Row-major view over the whole slice.
    pub fn row_major(data: &'a [T], dims: &[usize]) -> Result<Self> {
        span(dims).ok_or(NdIterError::OffsetOverflow)?;
        Self::new(data, dims, &row_major_strides(dims), 0)
    }

    /// Column-major view over the whole slice.
    pub fn col_major(data: &'a [T], dims: &[usize]) -> Result<Self> {
        span(dims).ok_or(NdIterError::OffsetOverflow)?;
        Self::new(data, dims, &col_major_strides(dims), 0)
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> isize {
        self.offset
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Number of logical elements (product of dims). Bounded by `isize::MAX`
    /// since construction checks the span.
    #[inline]
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|&d| d == 0)
    }

    #[inline]
    pub fn data(&self) -> &'a [T] {
        self.data
    }

    /// Permute dimensions without touching the data.
    pub fn permute(&self, perm: &[usize]) -> Result<ArrayView<'a, T>> {
        let rank = self.dims.len();
        if perm.len() != rank {
            return Err(NdIterError::StrideLengthMismatch);
        }
        let mut seen = vec![false; rank];
        for &p in perm {
            if p >= rank || seen[p] {
                return Err(NdIterError::InvalidAxis { axis: p, ndim: rank });
            }
            seen[p] = true;
        }
        let dims: Vec<usize> = perm.iter().map(|&p| self.dims[p]).collect();
        let strides: Vec<isize> = perm.iter().map(|&p| self.strides[p]).collect();
        Ok(ArrayView {
            data: self.data,
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset: self.offset,
        })
    }

    /// Element at a logical multi-index, or `None` if out of bounds.
    pub fn get(&self, indices: &[usize]) -> Option<&'a T> {
        if indices.len() != self.dims.len() {
            return None;
        }
        let mut offset = self.offset;
        for ((&i, &d), &s) in indices.iter().zip(self.dims.iter()).zip(self.strides.iter()) {
            if i >= d {
                return None;
            }
            offset += i as isize * s;
        }
        self.data.get(offset as usize)
    }
}

impl<T: Element> ArrayView<'_, T> {
    /// Element type tag of the view.
    #[inline]
    pub fn dtype(&self) -> DType {
        T::DTYPE
    }
}

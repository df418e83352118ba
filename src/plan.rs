//! Iteration plan: the traversal layout derived once from a view.
//!
//! The plan lists the iterated axes in traversal order (outermost first) with
//! their effective memory strides and C-index strides. Negative-stride axes
//! are flipped here so the cursor only ever adds strides; the `flipped` bit is
//! kept so multi-indices can still be reported in the caller's numbering.

use std::any::TypeId;

use crate::dtype::{DType, Element};
use crate::flags::{IterFlags, IterOrder};
use crate::fuse::coalesce_axes;
use crate::iter::NdIterConfig;
use crate::order::traversal_order;
use crate::view::{row_major_strides, span, ArrayView};
use crate::{NdIterError, Result};

/// One iterated axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AxisPlan {
    /// Axis number in the caller's numbering (shifted down by axis removal).
    pub(crate) axis: usize,
    pub(crate) dim: usize,
    /// Memory step per traversal step, in elements.
    pub(crate) stride: isize,
    /// C-order flat-index step per traversal step.
    pub(crate) c_stride: isize,
    /// Traversal walks this axis from `dim - 1` down to 0.
    pub(crate) flipped: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct IterationPlan {
    /// Outer -> inner.
    pub(crate) axes: Vec<AxisPlan>,
    /// Data offset of the first visited element.
    pub(crate) base_offset: isize,
    /// C-order flat index of the first visited element.
    pub(crate) c_base: isize,
    pub(crate) size: usize,
    pub(crate) src: DType,
    pub(crate) dst: DType,
    /// Reads go through the casting buffer.
    pub(crate) buffered: bool,
    pub(crate) buffer_size: usize,
    /// Multi-index tracking was removed and axes were fused.
    pub(crate) coalesced: bool,
}

impl IterationPlan {
    /// Validate the request and lay out the traversal.
    pub(crate) fn build<S: Element, T: Element>(
        view: &ArrayView<'_, S>,
        config: &NdIterConfig,
    ) -> Result<Self> {
        let flags = config.flags;
        let (src, dst) = (S::DTYPE, T::DTYPE);

        if !flags.contains(IterFlags::ALLOW_REFERENCE_ELEMENTS) {
            if let Some(dtype) = [src, dst].into_iter().find(|d| d.is_reference()) {
                return Err(NdIterError::ReferencesNotAllowed(dtype));
            }
        }

        let size = view
            .dims()
            .iter()
            .try_fold(1usize, |n, &d| n.checked_mul(d))
            .ok_or(NdIterError::OffsetOverflow)?;
        if size == 0 && !flags.contains(IterFlags::ALLOW_ZERO_SIZE) {
            return Err(NdIterError::EmptyOperand);
        }

        let same_type = TypeId::of::<S>() == TypeId::of::<T>();
        // Two distinct Rust types sharing a tag (e.g. `Arc<A>` vs `Arc<B>`)
        // have no conversion path.
        if !same_type && (src == dst || !config.casting.permits(src, dst)) {
            return Err(NdIterError::UnsafeCasting {
                from: src,
                to: dst,
                casting: config.casting,
            });
        }
        let buffered = !same_type;
        if buffered && !flags.contains(IterFlags::BUFFERED) {
            return Err(NdIterError::BufferingRequired { from: src, to: dst });
        }

        let dims = view.dims();
        let strides = view.strides();
        span(dims).ok_or(NdIterError::OffsetOverflow)?;
        let c_strides = row_major_strides(dims);
        let negate =
            config.order == IterOrder::K && !flags.contains(IterFlags::DONT_NEGATE_STRIDES);

        let mut base_offset = view.offset();
        let mut c_base = 0isize;
        let mut axes = Vec::with_capacity(dims.len());
        for a in traversal_order(dims, strides, config.order) {
            let dim = dims[a];
            let mut stride = strides[a];
            let mut c_stride = c_strides[a];
            let flipped = negate && stride < 0 && dim > 1;
            if flipped {
                let last = dim as isize - 1;
                base_offset += stride * last;
                c_base += c_stride * last;
                stride = -stride;
                c_stride = -c_stride;
            }
            axes.push(AxisPlan {
                axis: a,
                dim,
                stride,
                c_stride,
                flipped,
            });
        }

        Ok(Self {
            axes,
            base_offset,
            c_base,
            size,
            src,
            dst,
            buffered,
            buffer_size: config.buffer_size.max(1),
            coalesced: false,
        })
    }

    #[inline]
    pub(crate) fn ndim(&self) -> usize {
        self.axes.len()
    }

    /// Memory stride of the innermost axis (0 for zero-dimensional plans).
    #[inline]
    pub(crate) fn inner_stride(&self) -> isize {
        self.axes.last().map_or(0, |a| a.stride)
    }

    /// Current shape: caller's axis order while tracking, traversal order after
    /// coalescing.
    pub(crate) fn shape(&self) -> Vec<usize> {
        if self.coalesced {
            return self.axes.iter().map(|a| a.dim).collect();
        }
        let mut shape = vec![0usize; self.axes.len()];
        for a in &self.axes {
            shape[a.axis] = a.dim;
        }
        shape
    }

    /// Capacity of the casting buffer: one innermost run when it is
    /// contiguous, capped by the configured size.
    pub(crate) fn buffer_capacity(&self) -> usize {
        match self.axes.last() {
            Some(inner) if inner.stride.unsigned_abs() == 1 => {
                inner.dim.clamp(1, self.buffer_size)
            }
            Some(_) => 1,
            None => 1,
        }
    }

    /// Drop a unit-extent axis. Positions are unaffected.
    pub(crate) fn remove_axis(&mut self, axis: usize) -> Result<()> {
        if self.coalesced {
            return Err(NdIterError::TrackingDisabled);
        }
        let ndim = self.axes.len();
        let pos = self
            .axes
            .iter()
            .position(|a| a.axis == axis)
            .ok_or(NdIterError::InvalidAxis { axis, ndim })?;
        let extent = self.axes[pos].dim;
        if extent != 1 {
            return Err(NdIterError::NonUnitAxis { axis, extent });
        }
        self.axes.remove(pos);
        for a in &mut self.axes {
            if a.axis > axis {
                a.axis -= 1;
            }
        }
        Ok(())
    }

    /// Fuse contiguous axes; the caller's axis numbering is lost.
    pub(crate) fn coalesce(&mut self) {
        self.axes = coalesce_axes(&self.axes);
        self.coalesced = true;
    }

    /// Traversal position of a logical multi-index.
    pub(crate) fn ravel_multi_index(&self, index: &[usize]) -> Result<usize> {
        if self.coalesced {
            return Err(NdIterError::TrackingDisabled);
        }
        let shape = self.shape();
        if index.len() != shape.len() || index.iter().zip(&shape).any(|(&i, &d)| i >= d) {
            return Err(NdIterError::InvalidMultiIndex {
                index: index.to_vec(),
                shape,
            });
        }
        Ok(self.axes.iter().fold(0usize, |flat, a| {
            let i = index[a.axis];
            let coord = if a.flipped { a.dim - 1 - i } else { i };
            flat * a.dim + coord
        }))
    }

    /// Logical multi-index of a C-order flat index.
    pub(crate) fn unravel_flat_index(&self, index: usize) -> Result<Vec<usize>> {
        if self.coalesced {
            return Err(NdIterError::TrackingDisabled);
        }
        if index >= self.size {
            return Err(NdIterError::IndexOutOfBounds {
                index,
                size: self.size,
            });
        }
        let shape = self.shape();
        let mut out = vec![0usize; shape.len()];
        let mut rem = index;
        for (o, &d) in out.iter_mut().zip(shape.iter()).rev() {
            *o = rem % d;
            rem /= d;
        }
        Ok(out)
    }
}

//! Axis coalescing, after Strided.jl's `_mapreduce_fuse!`.
//!
//! Once an iterator no longer reports multi-indices, neighbouring traversal
//! axes can be merged whenever the outer step equals a full sweep of the
//! inner axis. Both the memory stride and the C-index stride must agree, so
//! the flattened traversal position and the flat index of every element are
//! unchanged by fusion.

use crate::plan::AxisPlan;

/// Merge contiguous neighbouring axes and drop unit axes.
///
/// `axes` are in traversal order, outermost first. Empty operands are
/// returned unchanged.
pub(crate) fn coalesce_axes(axes: &[AxisPlan]) -> Vec<AxisPlan> {
    if axes.iter().any(|a| a.dim == 0) {
        return axes.to_vec();
    }

    let mut fused: Vec<AxisPlan> = Vec::with_capacity(axes.len());
    for ax in axes.iter().filter(|a| a.dim != 1) {
        if let Some(outer) = fused.last_mut() {
            if can_merge(outer, ax) {
                outer.dim *= ax.dim;
                outer.stride = ax.stride;
                outer.c_stride = ax.c_stride;
                outer.flipped = false;
                continue;
            }
        }
        fused.push(ax.clone());
    }
    fused
}

#[inline]
fn can_merge(outer: &AxisPlan, inner: &AxisPlan) -> bool {
    let n = inner.dim as isize;
    outer.stride == inner.stride * n && outer.c_stride == inner.c_stride * n
}

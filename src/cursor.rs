//! Mutable traversal state.

use smallvec::{smallvec, SmallVec};

use crate::plan::IterationPlan;
use crate::{NdIterError, Result};

/// Stack-allocated coordinates; 8 axes cover nearly every practical rank.
type SVec<T> = SmallVec<[T; 8]>;

/// Position of an iterator inside its plan.
///
/// `coords` are per plan axis in traversal direction, so the memory offset and
/// the C-order flat index are plain dot products with the plan's strides and
/// can be updated incrementally on each step.
#[derive(Debug, Clone)]
pub(crate) struct IteratorCursor {
    coords: SVec<usize>,
    iter_index: usize,
    offset: isize,
    c_index: isize,
    start: usize,
    end: usize,
}

impl IteratorCursor {
    /// Cursor over the full range, positioned at the first element.
    pub(crate) fn new(plan: &IterationPlan) -> Self {
        let mut cursor = Self {
            coords: smallvec![0; plan.ndim()],
            iter_index: 0,
            offset: plan.base_offset,
            c_index: plan.c_base,
            start: 0,
            end: plan.size,
        };
        cursor.goto(plan, 0);
        cursor
    }

    /// Jump to a traversal position by unravelling it against the plan.
    ///
    /// Positions at or past `plan.size` only record the index.
    pub(crate) fn goto(&mut self, plan: &IterationPlan, index: usize) {
        self.iter_index = index;
        self.coords.clear();
        self.coords.resize(plan.ndim(), 0);
        self.offset = plan.base_offset;
        self.c_index = plan.c_base;
        if index >= plan.size {
            return;
        }
        let mut rem = index;
        for (coord, axis) in self.coords.iter_mut().zip(plan.axes.iter()).rev() {
            *coord = rem % axis.dim;
            rem /= axis.dim;
            self.offset += *coord as isize * axis.stride;
            self.c_index += *coord as isize * axis.c_stride;
        }
    }

    /// Re-derive coordinates after the plan's axes changed shape.
    #[inline]
    pub(crate) fn rebind(&mut self, plan: &IterationPlan) {
        self.goto(plan, self.iter_index);
    }

    /// Step to the next position. Returns `false` once the range is exhausted.
    #[inline]
    pub(crate) fn advance(&mut self, plan: &IterationPlan) -> bool {
        if self.iter_index >= self.end {
            return false;
        }
        self.iter_index += 1;
        if self.iter_index >= self.end {
            return false;
        }
        for (coord, axis) in self.coords.iter_mut().zip(plan.axes.iter()).rev() {
            *coord += 1;
            self.offset += axis.stride;
            self.c_index += axis.c_stride;
            if *coord < axis.dim {
                return true;
            }
            // Carry into the next outer axis
            let n = axis.dim as isize;
            self.offset -= axis.stride * n;
            self.c_index -= axis.c_stride * n;
            *coord = 0;
        }
        true
    }

    pub(crate) fn set_range(&mut self, plan: &IterationPlan, start: usize, end: usize) -> Result<()> {
        if start > end || end > plan.size {
            return Err(NdIterError::InvalidRange {
                start,
                end,
                size: plan.size,
            });
        }
        self.start = start;
        self.end = end;
        self.goto(plan, start);
        Ok(())
    }

    #[inline]
    pub(crate) fn reset(&mut self, plan: &IterationPlan) {
        self.goto(plan, self.start);
    }

    #[inline]
    pub(crate) fn is_finished(&self) -> bool {
        self.iter_index >= self.end
    }

    #[inline]
    pub(crate) fn iter_index(&self) -> usize {
        self.iter_index
    }

    #[inline]
    pub(crate) fn range(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    #[inline]
    pub(crate) fn offset(&self) -> isize {
        self.offset
    }

    #[inline]
    pub(crate) fn c_index(&self) -> isize {
        self.c_index
    }

    /// Elements left in the current innermost run, clipped to the range.
    #[inline]
    pub(crate) fn inner_remaining(&self, plan: &IterationPlan) -> usize {
        let run = match (plan.axes.last(), self.coords.last()) {
            (Some(axis), Some(&coord)) => axis.dim - coord,
            _ => 1,
        };
        run.min(self.end.saturating_sub(self.iter_index))
    }

    /// Logical multi-index in the caller's axis numbering.
    pub(crate) fn multi_index(&self, plan: &IterationPlan) -> Vec<usize> {
        let mut index = vec![0usize; plan.ndim()];
        for (&coord, axis) in self.coords.iter().zip(plan.axes.iter()) {
            index[axis.axis] = if axis.flipped {
                axis.dim - 1 - coord
            } else {
                coord
            };
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iter::NdIterConfig;
    use crate::view::ArrayView;

    fn plan_for(data: &[f64], dims: &[usize], strides: &[isize], offset: isize) -> IterationPlan {
        let view = ArrayView::new(data, dims, strides, offset).unwrap();
        IterationPlan::build::<f64, f64>(&view, &NdIterConfig::default()).unwrap()
    }

    #[test]
    fn test_advance_row_major() {
        let data = vec![0.0; 6];
        let plan = plan_for(&data, &[2, 3], &[3, 1], 0);
        let mut cursor = IteratorCursor::new(&plan);
        let mut offsets = vec![cursor.offset()];
        while cursor.advance(&plan) {
            offsets.push(cursor.offset());
        }
        assert_eq!(offsets, vec![0, 1, 2, 3, 4, 5]);
        assert!(cursor.is_finished());
        assert_eq!(cursor.iter_index(), 6);
    }

    #[test]
    fn test_goto_matches_advance() {
        let data = vec![0.0; 60];
        let plan = plan_for(&data, &[3, 4, 5], &[1, 15, 3], 0);
        let mut walker = IteratorCursor::new(&plan);
        let mut jumper = IteratorCursor::new(&plan);
        for i in 0..60 {
            jumper.goto(&plan, i);
            assert_eq!(walker.offset(), jumper.offset());
            assert_eq!(walker.c_index(), jumper.c_index());
            assert_eq!(walker.multi_index(&plan), jumper.multi_index(&plan));
            walker.advance(&plan);
        }
    }

    #[test]
    fn test_flipped_axis_multi_index() {
        let data = vec![0.0; 4];
        let plan = plan_for(&data, &[4], &[-1], 3);
        let mut cursor = IteratorCursor::new(&plan);
        assert_eq!(cursor.offset(), 0);
        assert_eq!(cursor.multi_index(&plan), vec![3]);
        assert_eq!(cursor.c_index(), 3);
        cursor.advance(&plan);
        assert_eq!(cursor.multi_index(&plan), vec![2]);
        assert_eq!(cursor.c_index(), 2);
    }

    #[test]
    fn test_set_range() {
        let data = vec![0.0; 6];
        let plan = plan_for(&data, &[2, 3], &[3, 1], 0);
        let mut cursor = IteratorCursor::new(&plan);
        cursor.set_range(&plan, 2, 5).unwrap();
        assert_eq!(cursor.multi_index(&plan), vec![0, 2]);
        assert_eq!(cursor.inner_remaining(&plan), 1);
        assert!(cursor.advance(&plan));
        assert_eq!(cursor.inner_remaining(&plan), 2);
        assert!(cursor.advance(&plan));
        assert!(!cursor.advance(&plan));
        assert!(cursor.is_finished());

        assert_eq!(
            cursor.set_range(&plan, 4, 2),
            Err(NdIterError::InvalidRange {
                start: 4,
                end: 2,
                size: 6
            })
        );
        assert!(cursor.set_range(&plan, 0, 7).is_err());
        cursor.set_range(&plan, 3, 3).unwrap();
        assert!(cursor.is_finished());
    }

    #[test]
    fn test_zero_dim_cursor() {
        let data = vec![1.0];
        let plan = plan_for(&data, &[], &[], 0);
        let mut cursor = IteratorCursor::new(&plan);
        assert!(!cursor.is_finished());
        assert!(cursor.multi_index(&plan).is_empty());
        assert_eq!(cursor.inner_remaining(&plan), 1);
        assert!(!cursor.advance(&plan));
        assert!(cursor.is_finished());
    }
}

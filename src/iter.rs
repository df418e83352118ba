//! The iteration engine.
//!
//! [`NdIter`] composes an [`IterationPlan`] (built once), an
//! [`IteratorCursor`] (advanced repeatedly) and, when the requested element
//! type differs from the storage type, a [`BufferManager`] that converts
//! values on read.

use std::any::Any;
use std::fmt;
use std::iter::FusedIterator;

use tracing::{debug, trace};

use crate::buffer::BufferManager;
use crate::casting::CastingRule;
use crate::cursor::IteratorCursor;
use crate::dtype::{DType, Element};
use crate::flags::{IterFlags, IterOrder};
use crate::plan::IterationPlan;
use crate::view::ArrayView;
use crate::{NdIterError, Result, DEFAULT_BUFFER_SIZE};

/// Lifecycle state of an [`NdIter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IterState {
    /// An element is available.
    Iterating,
    /// The active range is exhausted; only `reset` brings it back.
    Finished,
    /// `dispose` was called; every further operation fails.
    Disposed,
}

/// Construction parameters of an [`NdIter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdIterConfig {
    pub flags: IterFlags,
    pub casting: CastingRule,
    pub order: IterOrder,
    /// Upper bound on the casting buffer, in elements.
    pub buffer_size: usize,
}

impl Default for NdIterConfig {
    fn default() -> Self {
        Self {
            flags: IterFlags::empty(),
            casting: CastingRule::Safe,
            order: IterOrder::K,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl NdIterConfig {
    pub fn new(flags: IterFlags, casting: CastingRule) -> Self {
        Self {
            flags,
            casting,
            ..Self::default()
        }
    }

    pub fn with_order(mut self, order: IterOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }
}

/// Stateful cursor over the elements of an [`ArrayView`].
///
/// `S` is the storage element type and `T` the type values are read as.
/// When they differ, construction requires [`IterFlags::BUFFERED`] and a
/// [`CastingRule`] that admits the conversion.
///
/// Every operation after [`dispose`](Self::dispose) fails with
/// [`NdIterError::UseAfterDispose`]. Dropping an undisposed iterator releases
/// its resources as well.
///
/// # Example
///
/// ```rust
/// use strided_nditer::{ArrayView, CastingRule, IterFlags, NdIter};
///
/// let data: Vec<i32> = (0..6).collect();
/// // Column-major 2x3: memory order visits axis 0 fastest
/// let view = ArrayView::col_major(&data, &[2, 3]).unwrap();
/// let mut it: NdIter<'_, i32> = NdIter::new(&view, IterFlags::empty(), CastingRule::Safe).unwrap();
///
/// assert_eq!(it.multi_index().unwrap(), vec![0, 0]);
/// it.advance().unwrap();
/// assert_eq!(it.multi_index().unwrap(), vec![1, 0]);
/// assert_eq!(it.value().unwrap(), 1);
/// ```
pub struct NdIter<'a, S: Element, T: Element = S> {
    view: ArrayView<'a, S>,
    config: NdIterConfig,
    plan: IterationPlan,
    cursor: IteratorCursor,
    buffer: Option<BufferManager<T>>,
    disposed: bool,
}

impl<'a, S: Element, T: Element> NdIter<'a, S, T> {
    /// Create an iterator in memory order with the default buffer size.
    pub fn new(view: &ArrayView<'a, S>, flags: IterFlags, casting: CastingRule) -> Result<Self> {
        Self::with_config(view, NdIterConfig::new(flags, casting))
    }

    pub fn with_config(view: &ArrayView<'a, S>, config: NdIterConfig) -> Result<Self> {
        let plan = IterationPlan::build::<S, T>(view, &config)?;
        let cursor = IteratorCursor::new(&plan);
        let buffer = plan.buffered.then(|| {
            BufferManager::new(
                plan.buffer_capacity(),
                config.flags.contains(IterFlags::DELAY_BUFFER_ALLOCATION),
            )
        });
        debug!(
            shape = ?view.dims(),
            size = plan.size,
            order = ?config.order,
            from = %plan.src,
            to = %plan.dst,
            buffered = plan.buffered,
            "created iterator"
        );
        Ok(Self {
            view: view.clone(),
            config,
            plan,
            cursor,
            buffer,
            disposed: false,
        })
    }

    #[inline]
    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            Err(NdIterError::UseAfterDispose)
        } else {
            Ok(())
        }
    }

    /// Independent iterator over the same view and configuration, positioned
    /// at the start of a fresh full range.
    pub fn duplicate(&self) -> Result<NdIter<'a, S, T>> {
        self.ensure_live()?;
        Self::with_config(&self.view, self.config)
    }

    /// Release the casting buffer and invalidate the iterator. Idempotent.
    pub fn dispose(&mut self) {
        if self.shutdown() {
            debug!(iter_index = self.cursor.iter_index(), "disposed iterator");
        }
    }

    /// Free the buffer and mark the iterator disposed. Returns `false` if that
    /// already happened.
    fn shutdown(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        if let Some(mut buffer) = self.buffer.take() {
            buffer.release();
        }
        self.disposed = true;
        true
    }

    // ------------------------------------------------------------------------
    // Reading and stepping
    // ------------------------------------------------------------------------

    /// Value at the current position, converted to `T`.
    ///
    /// Does not allocate, except for the first buffered read under
    /// [`IterFlags::DELAY_BUFFER_ALLOCATION`].
    #[inline]
    pub fn value(&mut self) -> Result<T> {
        self.ensure_live()?;
        if self.cursor.is_finished() {
            return Err(NdIterError::IterationExhausted);
        }
        match self.buffer.as_mut() {
            Some(buffer) => buffer.read(
                self.view.data(),
                self.cursor.offset(),
                self.plan.inner_stride(),
                self.cursor.iter_index(),
                self.cursor.inner_remaining(&self.plan),
                self.config.casting,
            ),
            None => self.read_direct(),
        }
    }

    #[inline]
    fn read_direct(&self) -> Result<T> {
        let value = usize::try_from(self.cursor.offset())
            .ok()
            .and_then(|offset| self.view.data().get(offset))
            .ok_or(NdIterError::OffsetOverflow)?;
        // S and T are the same type on this path
        (value as &dyn Any)
            .downcast_ref::<T>()
            .cloned()
            .ok_or(NdIterError::Casting {
                from: S::DTYPE,
                to: T::DTYPE,
                iter_index: self.cursor.iter_index(),
            })
    }

    /// Step forward. Returns whether an element is available afterwards.
    #[inline]
    pub fn advance(&mut self) -> Result<bool> {
        self.ensure_live()?;
        Ok(self.cursor.advance(&self.plan))
    }

    #[inline]
    pub fn is_finished(&self) -> Result<bool> {
        self.ensure_live()?;
        Ok(self.cursor.is_finished())
    }

    /// Current position in the caller's axis numbering (after any axis
    /// removals).
    pub fn multi_index(&self) -> Result<Vec<usize>> {
        self.ensure_live()?;
        if self.plan.coalesced {
            return Err(NdIterError::TrackingDisabled);
        }
        if self.cursor.is_finished() {
            return Err(NdIterError::IterationExhausted);
        }
        Ok(self.cursor.multi_index(&self.plan))
    }

    /// Lazy sequence of values from the current position to the end of the
    /// range. Exhaustion is shared with `self`; call [`reset`](Self::reset)
    /// to walk again.
    pub fn values(&mut self) -> Values<'_, 'a, S, T> {
        Values {
            iter: self,
            done: false,
        }
    }

    // ------------------------------------------------------------------------
    // Range and shape
    // ------------------------------------------------------------------------

    /// Restrict traversal to `[start, end)` of the flattened order and move
    /// to `start`.
    pub fn set_range(&mut self, start: usize, end: usize) -> Result<()> {
        self.ensure_live()?;
        self.cursor.set_range(&self.plan, start, end)?;
        trace!(start, end, "set iteration range");
        Ok(())
    }

    /// Return to the start of the active range.
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.cursor.reset(&self.plan);
        Ok(())
    }

    /// Remove a unit-extent axis. Later axes shift down by one.
    pub fn remove_axis(&mut self, axis: usize) -> Result<()> {
        self.ensure_live()?;
        self.plan.remove_axis(axis)?;
        self.cursor.rebind(&self.plan);
        self.refit_buffer();
        trace!(axis, ndim = self.plan.ndim(), "removed axis");
        Ok(())
    }

    /// Stop tracking the multi-index and coalesce contiguous axes.
    /// Irreversible; calling it again has no effect.
    pub fn remove_multi_index(&mut self) -> Result<()> {
        self.ensure_live()?;
        if self.plan.coalesced {
            return Ok(());
        }
        self.plan.coalesce();
        self.cursor.rebind(&self.plan);
        self.refit_buffer();
        trace!(shape = ?self.plan.shape(), "coalesced axes");
        Ok(())
    }

    fn refit_buffer(&mut self) {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.invalidate();
            buffer.set_capacity(self.plan.buffer_capacity());
        }
    }

    // ------------------------------------------------------------------------
    // Positioning
    // ------------------------------------------------------------------------

    /// Position in the flattened traversal order.
    #[inline]
    pub fn iter_index(&self) -> Result<usize> {
        self.ensure_live()?;
        Ok(self.cursor.iter_index())
    }

    pub fn goto_iter_index(&mut self, index: usize) -> Result<()> {
        self.ensure_live()?;
        let (start, end) = self.cursor.range();
        if index < start || index >= end {
            return Err(NdIterError::OutOfRange { index, start, end });
        }
        self.cursor.goto(&self.plan, index);
        Ok(())
    }

    /// C-order flat index of the current element in the viewed array.
    pub fn index(&self) -> Result<usize> {
        self.ensure_live()?;
        if self.cursor.is_finished() {
            return Err(NdIterError::IterationExhausted);
        }
        usize::try_from(self.cursor.c_index()).map_err(|_| NdIterError::OffsetOverflow)
    }

    /// Jump to the element with C-order flat index `index`.
    pub fn goto_index(&mut self, index: usize) -> Result<()> {
        self.ensure_live()?;
        let multi = self.plan.unravel_flat_index(index)?;
        self.goto_multi_index(&multi)
    }

    pub fn goto_multi_index(&mut self, index: &[usize]) -> Result<()> {
        self.ensure_live()?;
        let pos = self.plan.ravel_multi_index(index)?;
        self.goto_iter_index(pos)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Total number of elements, independent of the active range.
    #[inline]
    pub fn iter_size(&self) -> Result<usize> {
        self.ensure_live()?;
        Ok(self.plan.size)
    }

    #[inline]
    pub fn iter_range(&self) -> Result<(usize, usize)> {
        self.ensure_live()?;
        Ok(self.cursor.range())
    }

    /// Iterated shape: caller's axis order while the multi-index is tracked,
    /// traversal order after coalescing.
    pub fn shape(&self) -> Result<Vec<usize>> {
        self.ensure_live()?;
        Ok(self.plan.shape())
    }

    #[inline]
    pub fn ndim(&self) -> Result<usize> {
        self.ensure_live()?;
        Ok(self.plan.ndim())
    }

    #[inline]
    pub fn has_multi_index(&self) -> Result<bool> {
        self.ensure_live()?;
        Ok(!self.plan.coalesced)
    }

    /// Whether [`goto_index`](Self::goto_index) is available. The flat index
    /// itself stays readable through [`index`](Self::index) after coalescing.
    #[inline]
    pub fn has_index(&self) -> Result<bool> {
        self.ensure_live()?;
        Ok(!self.plan.coalesced)
    }

    /// Buffering was requested lazily and no read has allocated it yet.
    pub fn has_delayed_bufalloc(&self) -> Result<bool> {
        self.ensure_live()?;
        Ok(self.buffer.as_ref().is_some_and(|b| !b.is_allocated()))
    }

    /// Element type of the storage.
    #[inline]
    pub fn dtype(&self) -> DType {
        S::DTYPE
    }

    /// Element type values are read as.
    #[inline]
    pub fn requested_dtype(&self) -> DType {
        T::DTYPE
    }

    pub fn state(&self) -> IterState {
        if self.disposed {
            IterState::Disposed
        } else if self.cursor.is_finished() {
            IterState::Finished
        } else {
            IterState::Iterating
        }
    }

    #[inline]
    pub fn config(&self) -> &NdIterConfig {
        &self.config
    }

    #[inline]
    pub fn view(&self) -> &ArrayView<'a, S> {
        &self.view
    }
}

impl<S: Element, T: Element> fmt::Debug for NdIter<'_, S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NdIter")
            .field("state", &self.state())
            .field("dtype", &S::DTYPE)
            .field("requested_dtype", &T::DTYPE)
            .field("flags", &self.config.flags)
            .field("casting", &self.config.casting)
            .field("order", &self.config.order)
            .field("shape", &self.plan.shape())
            .field("iter_index", &self.cursor.iter_index())
            .field("range", &self.cursor.range())
            .field("has_multi_index", &!self.plan.coalesced)
            .field(
                "buffer_capacity",
                &self.buffer.as_ref().map(BufferManager::capacity),
            )
            .finish()
    }
}

impl<S: Element, T: Element> Drop for NdIter<'_, S, T> {
    fn drop(&mut self) {
        if self.shutdown() {
            debug!("iterator dropped without dispose; released");
        }
    }
}

/// Values produced by [`NdIter::values`].
///
/// Yields `Ok` for each element left in the range. A failing read (a
/// conversion that does not fit, or use after dispose) is yielded once as
/// `Err` and ends the sequence.
pub struct Values<'it, 'a, S: Element, T: Element> {
    iter: &'it mut NdIter<'a, S, T>,
    done: bool,
}

impl<S: Element, T: Element> Iterator for Values<'_, '_, S, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.iter.disposed && self.iter.cursor.is_finished() {
            self.done = true;
            return None;
        }
        match self.iter.value() {
            Ok(v) => {
                self.iter.cursor.advance(&self.iter.plan);
                Some(Ok(v))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        if self.iter.disposed {
            return (1, Some(1));
        }
        let (_, end) = self.iter.cursor.range();
        let remaining = end.saturating_sub(self.iter.cursor.iter_index());
        let lower = if self.iter.plan.buffered {
            remaining.min(1)
        } else {
            remaining
        };
        (lower, Some(remaining))
    }
}

impl<S: Element, T: Element> FusedIterator for Values<'_, '_, S, T> {}

//! Scratch buffer for casting reads.
//!
//! When the requested element type differs from the storage type, values are
//! converted one innermost run at a time into a fixed-capacity buffer owned by
//! the iterator. Subsequent reads inside the same run are served from the
//! buffer. Capacity is reserved once, so refills never allocate.

use tracing::trace;

use crate::casting::CastingRule;
use crate::dtype::{convert, Element};
use crate::{NdIterError, Result};

pub(crate) struct BufferManager<T> {
    slots: Vec<T>,
    capacity: usize,
    /// Traversal index of `slots[0]`.
    run_start: usize,
    allocated: bool,
}

impl<T: Element> BufferManager<T> {
    /// Create a buffer, allocating now unless `delay` is set.
    pub(crate) fn new(capacity: usize, delay: bool) -> Self {
        let mut buffer = Self {
            slots: Vec::new(),
            capacity: capacity.max(1),
            run_start: 0,
            allocated: false,
        };
        if !delay {
            buffer.allocate();
        }
        buffer
    }

    fn allocate(&mut self) {
        if !self.allocated {
            self.slots = Vec::with_capacity(self.capacity);
            self.allocated = true;
            trace!(capacity = self.capacity, "casting buffer allocated");
        }
    }

    #[inline]
    pub(crate) fn is_allocated(&self) -> bool {
        self.allocated
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change capacity after the plan was reshaped; buffered values are dropped.
    pub(crate) fn set_capacity(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        if capacity == self.capacity {
            return;
        }
        self.capacity = capacity;
        if self.allocated {
            self.slots = Vec::with_capacity(capacity);
        }
    }

    /// Forget buffered values; the next read refills.
    #[inline]
    pub(crate) fn invalidate(&mut self) {
        self.slots.clear();
    }

    /// Read the element at traversal position `iter_index`.
    ///
    /// `offset` and `stride` locate it and its run in `data`; `run_len` is the
    /// number of elements from it to the end of its innermost run.
    pub(crate) fn read<S: Element>(
        &mut self,
        data: &[S],
        offset: isize,
        stride: isize,
        iter_index: usize,
        run_len: usize,
        casting: CastingRule,
    ) -> Result<T> {
        if let Some(value) = iter_index
            .checked_sub(self.run_start)
            .and_then(|i| self.slots.get(i))
        {
            return Ok(value.clone());
        }
        self.fill(data, offset, stride, iter_index, run_len, casting)?;
        self.slots.first().cloned().ok_or(NdIterError::Casting {
            from: S::DTYPE,
            to: T::DTYPE,
            iter_index,
        })
    }

    /// Convert up to one run starting at `iter_index`, stopping at the first
    /// value that does not fit.
    fn fill<S: Element>(
        &mut self,
        data: &[S],
        offset: isize,
        stride: isize,
        iter_index: usize,
        run_len: usize,
        casting: CastingRule,
    ) -> Result<()> {
        self.allocate();
        self.slots.clear();
        self.run_start = iter_index;

        let lossy = casting.is_lossy();
        let count = run_len.clamp(1, self.capacity);
        let mut pos = offset;
        for _ in 0..count {
            let converted = usize::try_from(pos)
                .ok()
                .and_then(|p| data.get(p))
                .and_then(|v| convert::<S, T>(v, lossy));
            match converted {
                Some(v) => self.slots.push(v),
                None => break,
            }
            pos += stride;
        }

        if self.slots.is_empty() {
            return Err(NdIterError::Casting {
                from: S::DTYPE,
                to: T::DTYPE,
                iter_index,
            });
        }
        Ok(())
    }

    /// Free the scratch region. Safe to call more than once.
    pub(crate) fn release(&mut self) {
        if self.allocated {
            self.slots = Vec::new();
            self.allocated = false;
            trace!("casting buffer released");
        }
    }
}

//! Construction flags and traversal order.

use bitflags::bitflags;

bitflags! {
    /// Flags fixed at iterator construction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct IterFlags: u32 {
        /// Keep negative-stride axes walking backwards through memory.
        const DONT_NEGATE_STRIDES = 1 << 0;
        /// Accept reference elements (`Arc<T>`).
        const ALLOW_REFERENCE_ELEMENTS = 1 << 1;
        /// Accept operands with no elements; the iterator starts finished.
        const ALLOW_ZERO_SIZE = 1 << 2;
        /// Allow reads to go through a casting buffer.
        const BUFFERED = 1 << 3;
        /// Allocate the casting buffer on the first read that needs it.
        const DELAY_BUFFER_ALLOCATION = 1 << 4;
    }
}

/// Order in which elements are visited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum IterOrder {
    /// Logical row-major order (last axis fastest).
    C,
    /// Logical column-major order (first axis fastest).
    F,
    /// Memory order: smallest absolute stride fastest.
    #[default]
    K,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_set() {
        let flags = IterFlags::BUFFERED | IterFlags::DELAY_BUFFER_ALLOCATION;
        assert!(flags.contains(IterFlags::BUFFERED));
        assert!(!flags.contains(IterFlags::ALLOW_ZERO_SIZE));
        assert_eq!(IterFlags::default(), IterFlags::empty());
    }
}

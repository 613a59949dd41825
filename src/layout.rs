//! Block geometry shared by every layer of the heap.
//!
//! ```text
//!   offset 0          HEADER_SIZE     +FENCE_WIDTH          +size        +FENCE_WIDTH
//!   ┌─────────────────┬───────────────┬────────────────────┬─────────────┐
//!   │ size│prev│next│ck│     # #       │   payload (size)   │    # #      │
//!   └─────────────────┴───────────────┴────────────────────┴─────────────┘
//!                                     ▲
//!                                     └── address handed to the caller
//! ```

use std::mem;

use static_assertions::const_assert;

/// Width in bytes of one guard on either side of a payload.
pub const FENCE_WIDTH: usize = 2;

/// Sentinel written into every guard byte.
pub const FENCE_BYTE: u8 = b'#';

pub const WORD: usize = mem::size_of::<usize>();

/// `size`, `prev`, `next`, then the checksum word (`u32` checksum + reserved `u32`).
pub const HEADER_SIZE: usize = 3 * WORD + 2 * mem::size_of::<u32>();

/// Link value meaning "no neighbor".
pub const NIL: usize = usize::MAX;

pub const SIZE_FIELD: usize = 0;
pub const PREV_FIELD: usize = WORD;
pub const NEXT_FIELD: usize = 2 * WORD;
pub const CHECKSUM_FIELD: usize = 3 * WORD;
pub const RESERVED_FIELD: usize = CHECKSUM_FIELD + mem::size_of::<u32>();

const_assert!(RESERVED_FIELD + mem::size_of::<u32>() == HEADER_SIZE);
const_assert!(HEADER_SIZE % mem::align_of::<u32>() == 0);
const_assert!(FENCE_WIDTH > 0);

/// Rounds a byte count up to the machine word size.
///
/// ```rust
/// use fenceheap::align;
///
/// match std::mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16),
///     4 => assert_eq!(align!(11), 12),
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + ::core::mem::size_of::<usize>() - 1) & !(::core::mem::size_of::<usize>() - 1)
  };
}

/// Bytes a block with a `size`-byte payload occupies in the region.
#[inline]
pub const fn footprint(size: usize) -> usize {
  HEADER_SIZE + 2 * FENCE_WIDTH + size
}

/// Same as [`footprint`] but `None` instead of wrapping.
#[inline]
pub fn checked_footprint(size: usize) -> Option<usize> {
  size.checked_add(HEADER_SIZE + 2 * FENCE_WIDTH)
}

/// Offset of the payload of the block whose header sits at `header`.
#[inline]
pub const fn payload_offset(header: usize) -> usize {
  header + HEADER_SIZE + FENCE_WIDTH
}

/// Offset of the header owning the payload at `payload`, if one could exist there.
#[inline]
pub fn header_offset(payload: usize) -> Option<usize> {
  payload.checked_sub(HEADER_SIZE + FENCE_WIDTH)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_align() {
    for i in 0..10 {
      let sizes = (WORD * i + 1)..=(WORD * (i + 1));
      for size in sizes {
        assert_eq!(WORD * (i + 1), align!(size));
      }
    }
    assert_eq!(align!(0), 0);
  }

  #[test]
  fn test_footprint_counts_header_and_both_fences() {
    assert_eq!(footprint(10), HEADER_SIZE + 4 + 10);
    assert_eq!(checked_footprint(usize::MAX), None);
    assert_eq!(checked_footprint(1), Some(footprint(1)));
  }

  #[test]
  fn test_payload_and_header_offsets_are_inverse() {
    let header = 3 * HEADER_SIZE;
    assert_eq!(header_offset(payload_offset(header)), Some(header));
    assert_eq!(header_offset(1), None);
  }
}

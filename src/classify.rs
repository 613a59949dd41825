//! Mapping arbitrary addresses onto the structure of the heap.

use crate::{block::Block, brk::Break, heap::Heap};

/// Role of an address relative to the blocks of a [`Heap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
  Null,
  /// The heap failed validation; nothing can be said about the address.
  HeapCorrupted,
  /// Inside a block header.
  ControlBlock,
  /// Inside the leading or trailing fence of a block.
  InsideFences,
  /// Inside a payload, but not at its first byte.
  InsideDataBlock,
  /// Outside every block: a gap, or not in the region at all.
  Unallocated,
  /// First byte of a live payload, as returned by allocation.
  Valid,
}

impl<B: Break> Heap<B> {
  pub fn classify(
    &self,
    address: *const u8,
  ) -> PointerKind {
    if address.is_null() {
      return PointerKind::Null;
    }

    if self.validate().is_err() {
      return PointerKind::HeapCorrupted;
    }

    let Some(offset) = self.region.offset_of(address) else {
      return PointerKind::Unallocated;
    };

    for block in self.blocks() {
      if offset < block.offset {
        break;
      }

      if offset < block.end() {
        return within(&block, offset);
      }
    }

    PointerKind::Unallocated
  }
}

fn within(
  block: &Block,
  offset: usize,
) -> PointerKind {
  if offset == block.payload() {
    PointerKind::Valid
  } else if offset < block.leading_fence() {
    PointerKind::ControlBlock
  } else if offset < block.payload() || offset >= block.trailing_fence() {
    PointerKind::InsideFences
  } else {
    PointerKind::InsideDataBlock
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    brk::ArenaBreak,
    layout::{FENCE_WIDTH, HEADER_SIZE},
  };

  fn heap() -> Heap<ArenaBreak> {
    let mut heap = Heap::new(ArenaBreak::default());
    heap.initialize().unwrap();
    heap
  }

  #[test]
  fn test_null_wins_over_everything() {
    let heap = Heap::new(ArenaBreak::default());
    assert_eq!(heap.classify(std::ptr::null()), PointerKind::Null);
    assert_eq!(heap.classify(std::ptr::dangling()), PointerKind::HeapCorrupted);
  }

  #[test]
  fn test_every_byte_of_a_block() {
    let mut heap = heap();
    let size = 10;
    let payload = heap.allocate(size).unwrap().as_ptr();
    let header = unsafe { payload.sub(HEADER_SIZE + FENCE_WIDTH) };

    assert_eq!(heap.classify(payload), PointerKind::Valid);
    for i in 0..HEADER_SIZE {
      assert_eq!(heap.classify(unsafe { header.add(i) }), PointerKind::ControlBlock);
    }
    for i in 1..=FENCE_WIDTH {
      assert_eq!(heap.classify(unsafe { payload.sub(i) }), PointerKind::InsideFences);
    }
    for i in 1..size {
      assert_eq!(heap.classify(unsafe { payload.add(i) }), PointerKind::InsideDataBlock);
    }
    for i in size..size + FENCE_WIDTH {
      assert_eq!(heap.classify(unsafe { payload.add(i) }), PointerKind::InsideFences);
    }
    assert_eq!(
      heap.classify(unsafe { payload.add(size + FENCE_WIDTH) }),
      PointerKind::Unallocated
    );
  }

  #[test]
  fn test_gap_between_blocks_is_unallocated() {
    let mut heap = heap();
    let a = heap.allocate(8).unwrap();
    let b = heap.allocate(50).unwrap();
    let c = heap.allocate(8).unwrap();
    heap.release(b.as_ptr());

    assert_eq!(heap.classify(b.as_ptr()), PointerKind::Unallocated);
    assert_eq!(heap.classify(unsafe { b.as_ptr().add(20) }), PointerKind::Unallocated);
    assert_eq!(heap.classify(a.as_ptr()), PointerKind::Valid);
    assert_eq!(heap.classify(c.as_ptr()), PointerKind::Valid);
  }

  #[test]
  fn test_leading_gap_and_outside_region() {
    let mut heap = heap();
    let a = heap.allocate(8).unwrap();
    heap.allocate(8).unwrap();
    heap.release(a.as_ptr());

    let base = heap.region_base().unwrap().as_ptr();
    assert_eq!(heap.classify(base), PointerKind::Unallocated);
    assert_eq!(heap.classify(a.as_ptr()), PointerKind::Unallocated);
    assert_eq!(heap.classify(base.wrapping_sub(1)), PointerKind::Unallocated);
  }

  #[test]
  fn test_empty_heap() {
    let heap = heap();
    let base = heap.region_base().unwrap().as_ptr();
    assert_eq!(heap.classify(base), PointerKind::Unallocated);
  }

  #[test]
  fn test_any_address_after_fence_damage() {
    let mut heap = heap();
    let a = heap.allocate(5).unwrap();
    unsafe { a.as_ptr().add(5 + 1).write(b'!') };

    assert_eq!(heap.classify(a.as_ptr()), PointerKind::HeapCorrupted);
    assert_eq!(heap.classify(unsafe { a.as_ptr().add(1) }), PointerKind::HeapCorrupted);
  }
}

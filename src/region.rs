//! The single contiguous range of bytes the heap lives in.
//!
//! Everything the allocator stores (headers, fences, payloads) is addressed
//! by its byte offset from [`Region::base`]. Offsets stay valid no matter
//! where the [`Break`] decides to put the region.

use std::{ptr::NonNull, slice};

use log::debug;

use crate::{brk::Break, error::AllocError};

pub struct Region<B: Break> {
  brk: B,
  base: Option<NonNull<u8>>,
  size: usize,
}

impl<B: Break> Region<B> {
  pub fn new(brk: B) -> Self {
    Self {
      brk,
      base: None,
      size: 0,
    }
  }

  /// Claims a zero-length region starting at the current break.
  pub fn initialize(&mut self) -> Result<(), AllocError> {
    if self.base.is_some() {
      self.teardown();
    }

    let base = self.brk.sbrk(0).ok_or(AllocError::RegionExhausted)?;
    self.base = Some(base);
    self.size = 0;

    debug!("region initialized at {:?}", base);
    Ok(())
  }

  /// Gives every byte back to the break and forgets the base.
  pub fn teardown(&mut self) {
    if self.base.is_none() {
      return;
    }

    if self.size > 0 && self.brk.sbrk(-(self.size as isize)).is_none() {
      debug!("break refused to release {} bytes", self.size);
    }

    debug!("region torn down ({} bytes released)", self.size);
    self.base = None;
    self.size = 0;
  }

  /// Moves the end of the region by `delta` bytes and returns the offset of
  /// the previous end. `None` leaves the region as it was.
  pub fn grow(
    &mut self,
    delta: isize,
  ) -> Option<usize> {
    let base = self.base?;
    let size = self.size.checked_add_signed(delta)?;
    let previous = self.brk.sbrk(delta)?;

    if previous.as_ptr() as usize != base.as_ptr() as usize + self.size {
      // Someone else moved the break under us; undo and refuse.
      if self.brk.sbrk(-delta).is_none() {
        debug!("break refused to undo a foreign move of {delta} bytes");
      }
      debug!("break moved outside the heap, refusing to grow by {delta}");
      return None;
    }

    let previous_end = self.size;
    self.size = size;
    Some(previous_end)
  }

  pub fn base(&self) -> Option<NonNull<u8>> {
    self.base
  }

  pub fn size(&self) -> usize {
    self.size
  }

  pub fn is_initialized(&self) -> bool {
    self.base.is_some()
  }

  /// Offset of `address` inside the region, `None` when it lies outside
  /// `[base, base + size]`.
  pub fn offset_of(
    &self,
    address: *const u8,
  ) -> Option<usize> {
    let base = self.base?.as_ptr() as usize;
    let offset = (address as usize).checked_sub(base)?;
    (offset <= self.size).then_some(offset)
  }

  /// Absolute address of `offset`.
  pub fn address_of(
    &self,
    offset: usize,
  ) -> Option<NonNull<u8>> {
    let base = self.base?;
    (offset <= self.size).then(|| unsafe { base.add(offset) })
  }

  pub fn contains(
    &self,
    offset: usize,
    len: usize,
  ) -> bool {
    self.base.is_some() && offset.checked_add(len).is_some_and(|end| end <= self.size)
  }

  /// Borrow `len` bytes at `offset`, `None` when any of them is outside the region.
  pub fn get(
    &self,
    offset: usize,
    len: usize,
  ) -> Option<&[u8]> {
    if !self.contains(offset, len) {
      return None;
    }

    let base = self.base?;
    Some(unsafe { slice::from_raw_parts(base.as_ptr().add(offset), len) })
  }

  /// Mutable counterpart of [`Region::get`].
  pub fn slice_mut(
    &mut self,
    offset: usize,
    len: usize,
  ) -> Option<&mut [u8]> {
    if !self.contains(offset, len) {
      return None;
    }

    let base = self.base?;
    Some(unsafe { slice::from_raw_parts_mut(base.as_ptr().add(offset), len) })
  }

  /// `memmove` inside the region, `None` when either range leaves it.
  pub fn copy_within(
    &mut self,
    src: usize,
    dst: usize,
    len: usize,
  ) -> Option<()> {
    let end = src.max(dst).checked_add(len)?;
    self.slice_mut(0, end)?.copy_within(src..src + len, dst);
    Some(())
  }
}

impl<B: Break> Drop for Region<B> {
  fn drop(&mut self) {
    self.teardown();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::brk::ArenaBreak;

  #[test]
  fn test_uninitialized_region_refuses_growth() {
    let mut region = Region::new(ArenaBreak::with_capacity(64));
    assert!(!region.is_initialized());
    assert_eq!(region.grow(8), None);
    assert!(region.get(0, 0).is_none());
  }

  #[test]
  fn test_grow_returns_previous_end_offset() {
    let mut region = Region::new(ArenaBreak::with_capacity(64));
    region.initialize().unwrap();

    assert_eq!(region.grow(10), Some(0));
    assert_eq!(region.grow(6), Some(10));
    assert_eq!(region.size(), 16);
    assert_eq!(region.grow(-6), Some(16));
    assert_eq!(region.size(), 10);
  }

  #[test]
  fn test_failed_growth_changes_nothing() {
    let mut region = Region::new(ArenaBreak::with_capacity(32));
    region.initialize().unwrap();
    region.grow(16).unwrap();

    assert_eq!(region.grow(1024), None);
    assert_eq!(region.grow(-17), None);
    assert_eq!(region.size(), 16);
  }

  /// Lets something else move the break right before every growth.
  struct Contended {
    arena: ArenaBreak,
    refuse_undo: bool,
  }

  impl Break for Contended {
    fn sbrk(
      &mut self,
      delta: isize,
    ) -> Option<NonNull<u8>> {
      if delta > 0 {
        self.arena.sbrk(8)?;
      } else if delta < 0 && self.refuse_undo {
        return None;
      }
      self.arena.sbrk(delta)
    }
  }

  #[test]
  fn test_foreign_break_move_refuses_growth() {
    for refuse_undo in [false, true] {
      let mut region = Region::new(Contended {
        arena: ArenaBreak::with_capacity(128),
        refuse_undo,
      });
      region.initialize().unwrap();

      assert_eq!(region.grow(16), None);
      assert_eq!(region.size(), 0);
      assert!(region.is_initialized());
    }
  }

  #[test]
  fn test_offsets_and_addresses_agree() {
    let mut region = Region::new(ArenaBreak::with_capacity(64));
    region.initialize().unwrap();
    region.grow(32).unwrap();

    let address = region.address_of(12).unwrap();
    assert_eq!(region.offset_of(address.as_ptr()), Some(12));
    assert_eq!(region.offset_of(std::ptr::null()), None);
    assert!(region.address_of(33).is_none());
  }

  #[test]
  fn test_bounds_are_checked() {
    let mut region = Region::new(ArenaBreak::with_capacity(64));
    region.initialize().unwrap();
    region.grow(8).unwrap();

    assert!(region.get(0, 8).is_some());
    assert!(region.get(1, 8).is_none());
    assert!(region.get(usize::MAX, 2).is_none());

    region.slice_mut(0, 4).unwrap().copy_from_slice(&[1, 2, 3, 4]);
    assert_eq!(region.copy_within(0, 4, 4), Some(()));
    assert_eq!(region.get(0, 8).unwrap(), &[1, 2, 3, 4, 1, 2, 3, 4]);

    assert!(region.slice_mut(4, 5).is_none());
    assert_eq!(region.copy_within(0, 6, 4), None);
    assert_eq!(region.get(4, 4).unwrap(), &[1, 2, 3, 4]);
  }

  #[test]
  fn test_teardown_returns_everything() {
    let mut arena = ArenaBreak::with_capacity(64);
    {
      let mut region = Region::new(&mut arena);
      region.initialize().unwrap();
      region.grow(40).unwrap();
      region.teardown();
      assert!(!region.is_initialized());
      assert_eq!(region.size(), 0);
    }
    assert_eq!(arena.used(), 0);
  }
}

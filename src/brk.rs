//! Region-growth primitives.
//!
//! The heap never maps memory itself. It asks a [`Break`] to move the end
//! of its region up or down, exactly like `sbrk(2)` moves the program break:
//!
//! ```text
//!   before sbrk(+n)                     after sbrk(+n)
//!   ┌──────────────┐                    ┌──────────────┬─────────┐
//!   │   region     │                    │   region     │  +n     │
//!   └──────────────┘                    └──────────────┴─────────┘
//!                  ▲                                   ▲         ▲
//!                break                        returned value   break
//! ```

use std::{
  alloc::{self, Layout},
  fmt,
  ptr::NonNull,
};

use libc::{c_void, intptr_t, sbrk};

use crate::layout::WORD;

/// Something that can grow or shrink a contiguous region by a signed delta.
pub trait Break {
  /// Moves the end of the region by `delta` bytes and returns the previous end,
  /// or `None` when the request cannot be honoured. A failed call leaves the
  /// region untouched.
  fn sbrk(
    &mut self,
    delta: isize,
  ) -> Option<NonNull<u8>>;
}

impl<B: Break + ?Sized> Break for &mut B {
  fn sbrk(
    &mut self,
    delta: isize,
  ) -> Option<NonNull<u8>> {
    (**self).sbrk(delta)
  }
}

/// The process data segment, moved through `sbrk(2)`.
///
/// There is only one program break per process: two heaps backed by
/// `ProgramBreak` at the same time will trample each other.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProgramBreak;

impl Break for ProgramBreak {
  fn sbrk(
    &mut self,
    delta: isize,
  ) -> Option<NonNull<u8>> {
    let previous = unsafe { sbrk(delta as intptr_t) };

    if previous == usize::MAX as *mut c_void {
      return None;
    }

    NonNull::new(previous as *mut u8)
  }
}

/// A fixed-capacity, word-aligned buffer with `sbrk` semantics.
///
/// Lets any number of heaps coexist in one process.
pub struct ArenaBreak {
  base: NonNull<u8>,
  layout: Layout,
  brk: usize,
}

impl ArenaBreak {
  /// Capacity used by [`ArenaBreak::default`].
  pub const DEFAULT_CAPACITY: usize = 64 * 1024;

  /// Reserves `capacity` bytes (rounded up to a whole word).
  ///
  /// A capacity no allocation could satisfy goes through
  /// [`alloc::handle_alloc_error`], like any failed reservation.
  pub fn with_capacity(capacity: usize) -> Self {
    let words = capacity.max(WORD).div_ceil(WORD);
    let Ok(layout) = Layout::array::<usize>(words) else {
      alloc::handle_alloc_error(Layout::new::<usize>());
    };
    let base = unsafe { alloc::alloc_zeroed(layout) };

    let Some(base) = NonNull::new(base) else {
      alloc::handle_alloc_error(layout);
    };

    Self { base, layout, brk: 0 }
  }

  pub fn capacity(&self) -> usize {
    self.layout.size()
  }

  /// Bytes currently handed out.
  pub fn used(&self) -> usize {
    self.brk
  }
}

impl Default for ArenaBreak {
  fn default() -> Self {
    Self::with_capacity(Self::DEFAULT_CAPACITY)
  }
}

impl Break for ArenaBreak {
  fn sbrk(
    &mut self,
    delta: isize,
  ) -> Option<NonNull<u8>> {
    let next = self.brk.checked_add_signed(delta)?;

    if next > self.capacity() {
      return None;
    }

    let previous = unsafe { self.base.add(self.brk) };
    self.brk = next;
    Some(previous)
  }
}

impl fmt::Debug for ArenaBreak {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("ArenaBreak")
      .field("base", &self.base)
      .field("capacity", &self.capacity())
      .field("brk", &self.brk)
      .finish()
  }
}

impl Drop for ArenaBreak {
  fn drop(&mut self) {
    unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) };
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_arena_moves_like_sbrk() {
    let mut arena = ArenaBreak::with_capacity(100);
    let start = arena.sbrk(0).unwrap();

    assert_eq!(arena.sbrk(40), Some(start));
    let end = arena.sbrk(0).unwrap();
    assert_eq!(end.as_ptr() as usize - start.as_ptr() as usize, 40);

    assert_eq!(arena.sbrk(-40), Some(end));
    assert_eq!(arena.sbrk(0), Some(start));
    assert_eq!(arena.used(), 0);
  }

  #[test]
  fn test_arena_refuses_past_either_end() {
    let mut arena = ArenaBreak::with_capacity(13);
    assert_eq!(arena.capacity(), crate::align!(13));

    assert!(arena.sbrk(-1).is_none());
    assert!(arena.sbrk(arena.capacity() as isize + 1).is_none());
    assert_eq!(arena.used(), 0);

    assert!(arena.sbrk(arena.capacity() as isize).is_some());
    assert!(arena.sbrk(1).is_none());
  }

  #[test]
  fn test_arena_base_is_word_aligned() {
    let mut arena = ArenaBreak::default();
    let base = arena.sbrk(0).unwrap();
    assert_eq!(base.as_ptr() as usize % WORD, 0);
  }

  #[test]
  fn test_program_break_reports_current_end() {
    let mut brk = ProgramBreak;
    assert!(brk.sbrk(0).is_some());
  }
}

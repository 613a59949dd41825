//! Block directory and placement engine.
//!
//! Live blocks form a doubly linked list threaded through their headers,
//! ordered by offset. Free space is never recorded anywhere: a gap is simply
//! the distance between the end of one block and the start of the next (or
//! the region edges), recomputed on every search.
//!
//! ```text
//!   base                                                            end
//!   ┌──────┬─────────┬──────────┬─────────────────┬─────────┬────────┐
//!   │ gap  │ block A │   gap    │     block B     │ block C │  gap   │
//!   └──────┴─────────┴──────────┴─────────────────┴─────────┴────────┘
//!    head ─────────▶ A ◀──────────────────────▶ B ◀──────▶ C
//! ```

use std::{iter, ptr::NonNull};

use log::{debug, trace, warn};

use crate::{
  block::Block,
  brk::Break,
  checksum,
  error::AllocError,
  fence,
  layout::{FENCE_WIDTH, checked_footprint, header_offset},
  region::Region,
  validate::Corruption,
};

/// A first-fit heap with fenced, checksummed blocks.
///
/// Every public operation validates the whole heap first and refuses to
/// touch anything once corruption has been seen.
pub struct Heap<B: Break> {
  pub(crate) region: Region<B>,
  pub(crate) head: Option<usize>,
  pub(crate) count: usize,
}

/// Where a new block is about to be linked in.
#[derive(Debug)]
struct Placement {
  offset: usize,
  prev: Option<Block>,
  next: Option<usize>,
}

impl<B: Break> Heap<B> {
  /// Creates a heap backed by `brk`. Nothing is usable before [`Heap::initialize`].
  pub fn new(brk: B) -> Self {
    Self {
      region: Region::new(brk),
      head: None,
      count: 0,
    }
  }

  /// Claims an empty region at the current break. Re-initializing an
  /// initialized heap tears it down first.
  pub fn initialize(&mut self) -> Result<(), AllocError> {
    self.head = None;
    self.count = 0;
    self.region.initialize()
  }

  /// Returns the whole region to the break and forgets every block.
  pub fn teardown(&mut self) {
    debug!("tearing down heap with {} blocks", self.count);
    self.region.teardown();
    self.head = None;
    self.count = 0;
  }

  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    if size == 0 {
      return Err(AllocError::ZeroSize);
    }
    self.validate()?;

    let needed = checked_footprint(size).ok_or(AllocError::Overflow)?;
    let placement = match self.first_fit(needed) {
      Some(placement) => placement,
      None => self.extend(needed)?,
    };

    let block = self.link(placement, size)?;
    debug!("placed {size}-byte block at offset {}", block.offset);
    self.payload_address(&block)
  }

  /// Allocates `count * size` bytes, all zero.
  pub fn zero_allocate(
    &mut self,
    count: usize,
    size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    if count == 0 || size == 0 {
      return Err(AllocError::ZeroSize);
    }
    self.validate()?;

    let total = count.checked_mul(size).ok_or(AllocError::Overflow)?;
    let address = self.allocate(total)?;
    let block = self.find_block(address.as_ptr()).ok_or(Corruption::Metadata)?;
    self
      .region
      .slice_mut(block.payload(), total)
      .ok_or(Corruption::Metadata)?
      .fill(0);

    Ok(address)
  }

  /// Changes the payload size of the block at `address`.
  ///
  /// The block stays where it is when it is the last one, when it shrinks,
  /// or when the gap behind it can absorb the growth. Otherwise its payload
  /// moves to a fresh block and the old one is released. Resizing to zero
  /// releases the block and yields `None`; a null `address` allocates.
  pub fn resize(
    &mut self,
    address: *mut u8,
    new_size: usize,
  ) -> Result<Option<NonNull<u8>>, AllocError> {
    self.validate()?;

    let Some(address) = NonNull::new(address) else {
      return match new_size {
        0 => Ok(None),
        _ => self.allocate(new_size).map(Some),
      };
    };

    let mut block = self.find_block(address.as_ptr()).ok_or(AllocError::UnknownAddress)?;

    if new_size == 0 {
      self.unlink(block)?;
      return Ok(None);
    }

    match block.next {
      None => {
        let end = block
          .payload()
          .checked_add(new_size)
          .and_then(|end| end.checked_add(FENCE_WIDTH))
          .ok_or(AllocError::Overflow)?;
        let delta = signed_delta(self.region.size(), end).ok_or(AllocError::RegionExhausted)?;

        if delta != 0 {
          self.region.grow(delta).ok_or(AllocError::RegionExhausted)?;
        }
      }
      Some(next) => {
        let gap = next - block.end();

        if new_size > block.size && new_size - block.size > gap {
          return self.relocate(block, new_size).map(Some);
        }
      }
    }

    debug!(
      "resized block at offset {} in place: {} -> {new_size} bytes",
      block.offset, block.size
    );
    block.size = new_size;
    let prev = block.prev.map(|prev| self.load(prev)).transpose()?;
    let next = block.next.map(|next| self.load(next)).transpose()?;
    self.restamp([prev, Some(block), next].into_iter().flatten())?;
    Ok(Some(address))
  }

  /// Frees the block whose payload starts at `address`.
  ///
  /// Null, unknown or already released addresses are ignored, and so is
  /// every call once the heap is corrupted.
  pub fn release(
    &mut self,
    address: *mut u8,
  ) {
    if address.is_null() {
      return;
    }

    if let Err(error) = self.try_release(address) {
      warn!("release of {address:?} ignored: {error}");
    }
  }

  /// Largest payload among live blocks; zero when there are none or the
  /// heap is corrupted.
  pub fn largest_allocated_block_size(&self) -> usize {
    if self.validate().is_err() {
      return 0;
    }

    self.blocks().map(|block| block.size).max().unwrap_or(0)
  }

  /// Payload size of the live block starting at `address`.
  pub fn payload_size(
    &self,
    address: *const u8,
  ) -> Option<usize> {
    self.validate().ok()?;
    self.find_block(address).map(|block| block.size)
  }

  pub fn block_count(&self) -> usize {
    self.count
  }

  /// Bytes currently obtained from the break.
  pub fn region_size(&self) -> usize {
    self.region.size()
  }

  pub fn region_base(&self) -> Option<NonNull<u8>> {
    self.region.base()
  }

  pub fn is_initialized(&self) -> bool {
    self.region.is_initialized()
  }

  /// Live blocks in address order, at most `count` of them.
  pub(crate) fn blocks(&self) -> impl Iterator<Item = Block> + '_ {
    let mut cursor = self.head;

    iter::from_fn(move || {
      let block = Block::load(&self.region, cursor?)?;
      cursor = block.next;
      Some(block)
    })
    .take(self.count)
  }

  fn find_block(
    &self,
    address: *const u8,
  ) -> Option<Block> {
    let header = header_offset(self.region.offset_of(address)?)?;
    self.blocks().find(|block| block.offset == header)
  }

  /// First gap that can hold `needed` bytes.
  ///
  /// The space in front of the head is only considered while there is at
  /// most one block; otherwise only the gaps between neighbours are.
  fn first_fit(
    &self,
    needed: usize,
  ) -> Option<Placement> {
    if self.count <= 1 {
      let leading = self.head.unwrap_or(self.region.size());
      trace!("probing leading gap of {leading} bytes for {needed}");

      if leading >= needed {
        return Some(Placement {
          offset: 0,
          prev: None,
          next: self.head,
        });
      }
    }

    self.blocks().find_map(|block| {
      let gap = block.next? - block.end();
      trace!("probing {gap}-byte gap after offset {}", block.offset);

      (gap >= needed).then(|| Placement {
        offset: block.end(),
        next: block.next,
        prev: Some(block),
      })
    })
  }

  /// Places a block of `needed` bytes after the last one, growing the region
  /// by whatever the space left behind the tail does not cover.
  fn extend(
    &mut self,
    needed: usize,
  ) -> Result<Placement, AllocError> {
    let tail = self.blocks().last();
    let offset = tail.map_or(0, |block| block.end());
    let end = offset.checked_add(needed).ok_or(AllocError::Overflow)?;

    if end > self.region.size() {
      let delta = signed_delta(self.region.size(), end).ok_or(AllocError::RegionExhausted)?;
      self.region.grow(delta).ok_or(AllocError::RegionExhausted)?;
      debug!("region grew by {delta} bytes to {}", self.region.size());
    }

    Ok(Placement {
      offset,
      prev: tail,
      next: None,
    })
  }

  fn link(
    &mut self,
    placement: Placement,
    size: usize,
  ) -> Result<Block, AllocError> {
    let Placement { offset, prev, next } = placement;
    let block = Block::new(offset, size, prev.map(|prev| prev.offset), next);

    let prev = prev.map(|prev| Block {
      next: Some(offset),
      ..prev
    });
    let next = next
      .map(|next| self.load(next).map(|next| Block { prev: Some(offset), ..next }))
      .transpose()?;

    if prev.is_none() {
      self.head = Some(offset);
    }
    self.count += 1;
    self.restamp([Some(block), prev, next].into_iter().flatten())?;

    Ok(block)
  }

  fn unlink(
    &mut self,
    block: Block,
  ) -> Result<(), AllocError> {
    let prev = block
      .prev
      .map(|prev| self.load(prev).map(|prev| Block { next: block.next, ..prev }))
      .transpose()?;
    let next = block
      .next
      .map(|next| self.load(next).map(|next| Block { prev: block.prev, ..next }))
      .transpose()?;

    if prev.is_none() {
      self.head = block.next;
    }
    self.count -= 1;
    self.restamp([prev, next].into_iter().flatten())?;

    debug!("released {}-byte block at offset {}", block.size, block.offset);
    Ok(())
  }

  fn relocate(
    &mut self,
    block: Block,
    new_size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let address = self.allocate(new_size)?;
    let moved = self.find_block(address.as_ptr()).ok_or(Corruption::Metadata)?;

    self
      .region
      .copy_within(block.payload(), moved.payload(), block.size.min(new_size))
      .ok_or(Corruption::Metadata)?;

    // The new neighbour may have been linked next to the old block.
    let old = self.load(block.offset)?;
    self.unlink(old)?;

    debug!("moved block from offset {} to {}", block.offset, moved.offset);
    Ok(address)
  }

  fn try_release(
    &mut self,
    address: *mut u8,
  ) -> Result<(), AllocError> {
    self.validate()?;
    let block = self.find_block(address).ok_or(AllocError::UnknownAddress)?;
    self.unlink(block)
  }

  /// Writes fresh fences and checksums for every block a structural change
  /// touched, along with their updated headers.
  fn restamp(
    &mut self,
    blocks: impl IntoIterator<Item = Block>,
  ) -> Result<(), AllocError> {
    for mut block in blocks {
      fence::stamp(&mut self.region, &block).ok_or(Corruption::Metadata)?;
      checksum::stamp(&mut self.region, &mut block).ok_or(Corruption::Metadata)?;
    }
    Ok(())
  }

  fn load(
    &self,
    offset: usize,
  ) -> Result<Block, AllocError> {
    Block::load(&self.region, offset).ok_or(AllocError::Corrupted(Corruption::Metadata))
  }

  fn payload_address(
    &self,
    block: &Block,
  ) -> Result<NonNull<u8>, AllocError> {
    self
      .region
      .address_of(block.payload())
      .ok_or(AllocError::Corrupted(Corruption::Metadata))
  }
}

/// `to - from` as an `isize`.
fn signed_delta(
  from: usize,
  to: usize,
) -> Option<isize> {
  if to >= from {
    isize::try_from(to - from).ok()
  } else {
    isize::try_from(from - to).ok().map(|delta| -delta)
  }
}

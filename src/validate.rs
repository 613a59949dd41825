//! Heap-wide integrity checks.
//!
//! [`Heap::validate`] runs three layers and stops at the first failure:
//!
//! ```text
//!   setup ──ok──▶ block chain ──ok──▶ fences ──ok──▶ healthy
//!     │               │                  │
//!     ▼               ▼                  ▼
//!  Uninitialized    Metadata           Fence
//! ```
//!
//! The fence layer only runs on a chain already proven sound, so a garbage
//! size or link never steers it outside the region.

use std::{error, fmt};

use log::warn;

use crate::{block::Block, brk::Break, checksum, fence, heap::Heap};

/// What kind of damage [`Heap::validate`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
  /// The heap was never initialized, or has been torn down.
  Uninitialized,
  /// A header is inconsistent: checksum mismatch, broken or unordered links,
  /// or a block that does not fit in the region.
  Metadata,
  /// A guard byte next to a payload was overwritten.
  Fence,
}

impl fmt::Display for Corruption {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      Self::Uninitialized => write!(f, "heap is not initialized"),
      Self::Metadata => write!(f, "block metadata is corrupted"),
      Self::Fence => write!(f, "block fence is corrupted"),
    }
  }
}

impl error::Error for Corruption {}

impl<B: Break> Heap<B> {
  /// Checks the whole heap. `Ok(())` means it is healthy.
  pub fn validate(&self) -> Result<(), Corruption> {
    self.validate_setup()?;
    self.validate_blocks()?;
    self.validate_fences()
  }

  pub fn validate_setup(&self) -> Result<(), Corruption> {
    if self.region.is_initialized() {
      Ok(())
    } else {
      Err(Corruption::Uninitialized)
    }
  }

  /// Walks exactly `block_count` links from the head, checking each header.
  pub fn validate_blocks(&self) -> Result<(), Corruption> {
    let mut cursor = self.head;
    let mut expected_prev = None;
    let mut floor = 0;

    for index in 0..self.count {
      let Some(offset) = cursor else {
        warn!("block chain ends after {index} of {} blocks", self.count);
        return Err(Corruption::Metadata);
      };

      let block = self.sound_block(offset, floor, expected_prev).ok_or_else(|| {
        warn!("block #{index} at offset {offset} has corrupted metadata");
        Corruption::Metadata
      })?;

      expected_prev = Some(offset);
      floor = block.end();
      cursor = block.next;
    }

    if let Some(offset) = cursor {
      warn!("block chain continues past {} blocks to offset {offset}", self.count);
      return Err(Corruption::Metadata);
    }

    Ok(())
  }

  pub fn validate_fences(&self) -> Result<(), Corruption> {
    match self.blocks().find(|block| !fence::check(&self.region, block)) {
      Some(block) => {
        warn!("fence of block at offset {} is corrupted", block.offset);
        Err(Corruption::Fence)
      }
      None => Ok(()),
    }
  }

  fn sound_block(
    &self,
    offset: usize,
    floor: usize,
    expected_prev: Option<usize>,
  ) -> Option<Block> {
    if offset < floor {
      return None;
    }

    let block = Block::load(&self.region, offset)?;
    let fits = block.checked_end().is_some_and(|end| end <= self.region.size());

    (checksum::matches(&block) && block.size > 0 && block.prev == expected_prev && fits)
      .then_some(block)
  }
}

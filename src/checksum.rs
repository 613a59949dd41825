//! Per-block header checksum.
//!
//! Covers the bytes of `size`, `prev` and `next` as they are encoded in the
//! region and nothing else: neither the checksum itself nor the reserved word.

use crate::{block::Block, brk::Break, region::Region};

pub fn compute(block: &Block) -> u32 {
  block
    .encoded_fields()
    .iter()
    .flatten()
    .fold(0u32, |sum, &byte| sum.wrapping_add(u32::from(byte)))
}

/// Recomputes the checksum of `block` and writes the whole header back.
pub fn stamp<B: Break>(
  region: &mut Region<B>,
  block: &mut Block,
) -> Option<()> {
  block.checksum = compute(block);
  block.store(region)
}

pub fn matches(block: &Block) -> bool {
  block.checksum == compute(block)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{brk::ArenaBreak, layout::HEADER_SIZE};

  #[test]
  fn test_checksum_tracks_every_covered_field() {
    let block = Block::new(0, 10, Some(64), Some(128));
    let base = compute(&block);

    assert_ne!(compute(&Block { size: 11, ..block }), base);
    assert_ne!(compute(&Block { prev: None, ..block }), base);
    assert_ne!(compute(&Block { next: Some(129), ..block }), base);
  }

  #[test]
  fn test_checksum_ignores_its_own_field_and_offset() {
    let block = Block::new(0, 10, None, None);
    assert_eq!(compute(&Block { checksum: 42, ..block }), compute(&block));
    assert_eq!(compute(&Block { offset: 99, ..block }), compute(&block));
  }

  #[test]
  fn test_stamp_persists_checksum() {
    let mut region = Region::new(ArenaBreak::with_capacity(128));
    region.initialize().unwrap();
    region.grow(HEADER_SIZE as isize).unwrap();

    let mut block = Block::new(0, 3, None, None);
    stamp(&mut region, &mut block).unwrap();

    let loaded = Block::load(&region, 0).unwrap();
    assert!(matches(&loaded));
    assert_eq!(loaded.checksum, compute(&block));
  }
}

//! Guard bytes around every payload.
//!
//! The trailing fence moves with the size field, so any resize must call
//! [`stamp`] again rather than just [`check`].

use crate::{
  block::Block,
  brk::Break,
  layout::{FENCE_BYTE, FENCE_WIDTH},
  region::Region,
};

/// Writes both fences of `block`, `None` if either falls outside the region.
pub fn stamp<B: Break>(
  region: &mut Region<B>,
  block: &Block,
) -> Option<()> {
  let trailing = block.payload().checked_add(block.size)?;
  region.slice_mut(block.leading_fence(), FENCE_WIDTH)?.fill(FENCE_BYTE);
  region.slice_mut(trailing, FENCE_WIDTH)?.fill(FENCE_BYTE);
  Some(())
}

/// `true` when both fences still hold the sentinel.
pub fn check<B: Break>(
  region: &Region<B>,
  block: &Block,
) -> bool {
  let trailing = block.payload().checked_add(block.size);
  intact(region, block.leading_fence()) && trailing.is_some_and(|offset| intact(region, offset))
}

fn intact<B: Break>(
  region: &Region<B>,
  offset: usize,
) -> bool {
  region
    .get(offset, FENCE_WIDTH)
    .is_some_and(|fence| fence.iter().all(|&byte| byte == FENCE_BYTE))
}

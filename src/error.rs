use std::{error, fmt};

use crate::validate::Corruption;

/// Why an allocation, resize or lifecycle call did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
  /// A zero size or count was requested.
  ZeroSize,
  /// `count * size` does not fit in a `usize`.
  Overflow,
  /// The heap failed validation before the call touched anything.
  Corrupted(Corruption),
  /// The region-growth primitive refused to grow the region.
  RegionExhausted,
  /// The address is not the payload start of a live block.
  UnknownAddress,
}

impl fmt::Display for AllocError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      Self::ZeroSize => write!(f, "zero-sized allocation request"),
      Self::Overflow => write!(f, "allocation size overflows usize"),
      Self::Corrupted(corruption) => write!(f, "heap is corrupted: {corruption}"),
      Self::RegionExhausted => write!(f, "region cannot grow any further"),
      Self::UnknownAddress => write!(f, "address does not belong to a live block"),
    }
  }
}

impl error::Error for AllocError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      Self::Corrupted(corruption) => Some(corruption),
      _ => None,
    }
  }
}

impl From<Corruption> for AllocError {
  fn from(corruption: Corruption) -> Self {
    Self::Corrupted(corruption)
  }
}

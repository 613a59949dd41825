use crate::{
  brk::Break,
  layout::{
    CHECKSUM_FIELD, FENCE_WIDTH, HEADER_SIZE, NEXT_FIELD, NIL, PREV_FIELD, RESERVED_FIELD,
    SIZE_FIELD, WORD, footprint, payload_offset,
  },
  region::Region,
};

/// Decoded copy of a header embedded in the region.
///
/// Editing a `Block` changes nothing until it is written back with
/// [`Block::store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
  /// Offset of the header from the region base.
  pub offset: usize,
  pub size: usize,
  pub prev: Option<usize>,
  pub next: Option<usize>,
  pub checksum: u32,
}

impl Block {
  pub fn new(
    offset: usize,
    size: usize,
    prev: Option<usize>,
    next: Option<usize>,
  ) -> Self {
    Self {
      offset,
      size,
      prev,
      next,
      checksum: 0,
    }
  }

  /// Reads the header at `offset`, `None` if it does not fit in the region.
  pub fn load<B: Break>(
    region: &Region<B>,
    offset: usize,
  ) -> Option<Self> {
    let header = region.get(offset, HEADER_SIZE)?;

    Some(Self {
      offset,
      size: word(header, SIZE_FIELD),
      prev: link(word(header, PREV_FIELD)),
      next: link(word(header, NEXT_FIELD)),
      checksum: u32::from_ne_bytes(field(header, CHECKSUM_FIELD)),
    })
  }

  /// Writes every header field back into the region, `None` if the header
  /// does not fit in it.
  pub fn store<B: Break>(
    &self,
    region: &mut Region<B>,
  ) -> Option<()> {
    let header = region.slice_mut(self.offset, HEADER_SIZE)?;
    let [size, prev, next] = self.encoded_fields();

    header[SIZE_FIELD..SIZE_FIELD + WORD].copy_from_slice(&size);
    header[PREV_FIELD..PREV_FIELD + WORD].copy_from_slice(&prev);
    header[NEXT_FIELD..NEXT_FIELD + WORD].copy_from_slice(&next);
    header[CHECKSUM_FIELD..RESERVED_FIELD].copy_from_slice(&self.checksum.to_ne_bytes());
    header[RESERVED_FIELD..HEADER_SIZE].fill(0);
    Some(())
  }

  /// `size`, `prev` and `next` exactly as they sit in the region.
  pub fn encoded_fields(&self) -> [[u8; WORD]; 3] {
    [
      self.size.to_ne_bytes(),
      self.prev.unwrap_or(NIL).to_ne_bytes(),
      self.next.unwrap_or(NIL).to_ne_bytes(),
    ]
  }

  pub fn payload(&self) -> usize {
    payload_offset(self.offset)
  }

  pub fn leading_fence(&self) -> usize {
    self.offset + HEADER_SIZE
  }

  pub fn trailing_fence(&self) -> usize {
    self.payload() + self.size
  }

  /// One past the last byte of the trailing fence.
  pub fn end(&self) -> usize {
    self.offset + footprint(self.size)
  }

  /// Like [`Block::end`], for headers whose size field cannot be trusted.
  pub fn checked_end(&self) -> Option<usize> {
    self.payload().checked_add(self.size)?.checked_add(FENCE_WIDTH)
  }
}

fn field<const N: usize>(
  header: &[u8],
  at: usize,
) -> [u8; N] {
  let mut bytes = [0; N];
  bytes.copy_from_slice(&header[at..at + N]);
  bytes
}

fn word(
  header: &[u8],
  at: usize,
) -> usize {
  usize::from_ne_bytes(field(header, at))
}

fn link(raw: usize) -> Option<usize> {
  (raw != NIL).then_some(raw)
}

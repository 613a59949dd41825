//! # fenceheap - A Corruption-Detecting Heap
//!
//! This crate provides a small **first-fit heap** that manages one growable,
//! contiguous region obtained through an `sbrk`-like primitive. Every block
//! is wrapped in guard bytes and carries a header checksum, so buffer
//! overruns and trampled metadata are caught before the allocator touches
//! anything else.
//!
//! ## Overview
//!
//! ```text
//!   One block inside the region:
//!
//!   ┌───────────────────────────┬──────┬────────────────────────┬──────┐
//!   │        Block Header       │fence │        Payload         │fence │
//!   │  ┌─────────────────────┐  │      │                        │      │
//!   │  │ size: N             │  │ "##" │     N bytes usable     │ "##" │
//!   │  │ prev: offset / NIL  │  │      │                        │      │
//!   │  │ next: offset / NIL  │  │      │                        │      │
//!   │  │ checksum            │  │      │                        │      │
//!   │  └─────────────────────┘  │      │                        │      │
//!   └───────────────────────────┴──────┴────────────────────────┴──────┘
//!                                      ▲
//!                                      └── Pointer returned to user
//! ```
//!
//! Links are stored as byte offsets from the region base, never as raw
//! pointers. Free space is not tracked: the gap between two neighbouring
//! blocks is recomputed from their offsets whenever an allocation searches
//! for room.
//!
//! ## Crate Structure
//!
//! ```text
//!   fenceheap
//!   ├── layout     - Block geometry, fence constants, align! macro
//!   ├── brk        - Break trait, ProgramBreak (sbrk), ArenaBreak
//!   ├── region     - The managed region and byte access by offset
//!   ├── block      - Header encode/decode
//!   ├── fence      - Guard byte stamping and checking
//!   ├── checksum   - Header checksum
//!   ├── validate   - Heap-wide integrity check, Corruption
//!   ├── heap       - Heap: placement, resize, release
//!   ├── classify   - PointerKind for arbitrary addresses
//!   └── error      - AllocError
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use fenceheap::{ArenaBreak, Heap, PointerKind};
//!
//! let mut heap = Heap::new(ArenaBreak::default());
//! heap.initialize().unwrap();
//!
//! let ptr = heap.allocate(16).unwrap();
//! unsafe { ptr.as_ptr().write_bytes(0x42, 16) };
//!
//! assert_eq!(heap.classify(ptr.as_ptr()), PointerKind::Valid);
//! assert!(heap.validate().is_ok());
//!
//! heap.release(ptr.as_ptr());
//! heap.teardown();
//! ```
//!
//! ## Corruption
//!
//! Once [`Heap::validate`] reports a [`Corruption`], every operation refuses
//! to act: allocation and resize fail, release is ignored and classification
//! answers [`PointerKind::HeapCorrupted`]. Only [`Heap::initialize`] brings
//! the heap back.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: `Heap` takes `&mut self` and has no locking
//! - **No alignment beyond bytes**: payloads follow a 2-byte fence
//! - **No coalescing records**: gaps exist only as distances between blocks

pub mod layout;

mod block;
mod brk;
mod checksum;
mod classify;
mod error;
mod fence;
mod heap;
mod region;
mod validate;

pub use brk::{ArenaBreak, Break, ProgramBreak};
pub use classify::PointerKind;
pub use error::AllocError;
pub use heap::Heap;
pub use validate::Corruption;

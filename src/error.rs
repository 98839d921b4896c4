//! Error and diagnostic types for the allocator's internal collaborators.
//!
//! The four public operations (`allocate`, `free`, `reallocate`, `calloc`)
//! never surface a `Result` — per the spec they either succeed or return the
//! no-address sentinel, matching the classical C allocator ABI. These types
//! exist one layer down: [`HeapError`] is returned by the break-primitive
//! wrapper, and [`InvariantViolation`] is what the consistency checker
//! reports before aborting.

use std::fmt;

/// Failure of the underlying OS break interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
  /// `sbrk` returned its failure sentinel; the heap could not be grown.
  BreakFailed,
}

impl fmt::Display for HeapError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      HeapError::BreakFailed => write!(f, "heap break primitive failed to extend the heap"),
    }
  }
}

impl std::error::Error for HeapError {}

/// A single broken structural invariant, as found by [`crate::check`].
///
/// Every variant carries enough addresses to locate the offending block(s)
/// without re-walking the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
  /// Header and footer of the same block disagree on size or alloc bit.
  HeaderFooterMismatch { block: usize },
  /// A block's size is not a multiple of the word size, or is below the
  /// minimum block size.
  BadBlockSize { block: usize, size: usize },
  /// Two adjacent blocks are both free (violates I3).
  AdjacentFreeBlocks { first: usize, second: usize },
  /// A free block sits in the wrong size-class list.
  WrongClass { block: usize, expected: usize, actual: usize },
  /// `next(prev(node)) != node` for a free-list pair.
  BrokenLink { prev: usize, next: usize },
  /// A free-list pointer decodes outside the heap or is misaligned.
  UnalignedOrOutOfRange { pointer: usize },
  /// The prologue or epilogue sentinel no longer matches its expected
  /// signature.
  SentinelCorrupted { which: &'static str },
}

impl fmt::Display for InvariantViolation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      InvariantViolation::HeaderFooterMismatch { block } => {
        write!(f, "header/footer mismatch at block {:#x}", block)
      }
      InvariantViolation::BadBlockSize { block, size } => {
        write!(f, "block {:#x} has invalid size {}", block, size)
      }
      InvariantViolation::AdjacentFreeBlocks { first, second } => {
        write!(f, "adjacent free blocks at {:#x} and {:#x}", first, second)
      }
      InvariantViolation::WrongClass { block, expected, actual } => {
        write!(
          f,
          "block {:#x} found in class {} but belongs in class {}",
          block, actual, expected
        )
      }
      InvariantViolation::BrokenLink { prev, next } => {
        write!(f, "broken free-list link between {:#x} and {:#x}", prev, next)
      }
      InvariantViolation::UnalignedOrOutOfRange { pointer } => {
        write!(f, "free-list pointer {:#x} is unaligned or out of heap range", pointer)
      }
      InvariantViolation::SentinelCorrupted { which } => {
        write!(f, "{} sentinel signature corrupted", which)
      }
    }
  }
}

impl std::error::Error for InvariantViolation {}

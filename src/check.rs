//! # Invariant Checker
//!
//! Walks the heap and free lists verifying every structural invariant in
//! one pass. Debug-time only: callers use [`assert_heap_consistent`] at
//! quiescent points (before or after a public operation), never from inside
//! `coalesce` or `place`, where intermediate states are expected to violate
//! these rules.
//!
//! Three passes, in order:
//!
//! 1. Prologue and epilogue carry their initial size/alloc-bit signatures.
//! 2. The implicit block list, start to epilogue: every block's header and
//!    footer agree, every size is a multiple of 8 and at least `MIN_BLOCK`,
//!    and no two consecutive blocks are both free.
//! 3. Every class list: each node lies inside the heap and is word-aligned,
//!    the head's `prev` link is empty, `next(prev(node)) == node` for every
//!    node, and every node's size maps back to the class it's filed under.

use crate::allocator::Allocator;
use crate::block::{self, MIN_BLOCK, WORD};
use crate::error::InvariantViolation;
use crate::freelist;
use crate::index::Index;
use crate::policy::Policy;

/// Runs the full invariant walk and panics with a diagnostic naming the
/// call site if anything is wrong.
///
/// Mirrors the spec's call-site-tagged abort: `call_site` should be the
/// name of the operation (or test) that just quiesced.
pub fn assert_heap_consistent(allocator: &Allocator, call_site: &'static str) {
  if let Err(violation) = check(allocator) {
    log::error!("heap invariant violated at {call_site}: {violation}");
    panic!("heap invariant violated at {call_site}: {violation}");
  }
}

/// Non-panicking form of [`assert_heap_consistent`].
pub fn check(allocator: &Allocator) -> Result<(), InvariantViolation> {
  check_sentinels(allocator)?;
  check_implicit_list(allocator)?;
  check_free_lists(allocator)?;
  Ok(())
}

/// Pass 1: prologue and epilogue retain their fixed `(WORD, alloc)` /
/// `(0, alloc)` signatures.
fn check_sentinels(allocator: &Allocator) -> Result<(), InvariantViolation> {
  let (prologue_size, prologue_alloc) = block::decode_at(block::header(allocator.prologue_bp));
  if prologue_size != WORD || !prologue_alloc {
    return Err(InvariantViolation::SentinelCorrupted { which: "prologue" });
  }

  let (epilogue_size, epilogue_alloc) = block::decode_at(allocator.epilogue_addr);
  if epilogue_size != 0 || !epilogue_alloc {
    return Err(InvariantViolation::SentinelCorrupted { which: "epilogue" });
  }

  Ok(())
}

/// Pass 2: walks every real block between the prologue and the epilogue.
fn check_implicit_list(allocator: &Allocator) -> Result<(), InvariantViolation> {
  let mut bp = block::next_block(allocator.prologue_bp);
  let mut prev_free = false;

  while bp < allocator.epilogue_addr {
    if !allocator.heap.contains(bp) {
      return Err(InvariantViolation::UnalignedOrOutOfRange { pointer: bp });
    }
    if bp % WORD != 0 {
      return Err(InvariantViolation::UnalignedOrOutOfRange { pointer: bp });
    }

    let header = block::decode_at(block::header(bp));
    let footer = block::decode_at(block::footer(bp));
    if header != footer {
      return Err(InvariantViolation::HeaderFooterMismatch { block: bp });
    }

    let (size, alloc) = header;
    if size < MIN_BLOCK || size % WORD != 0 {
      return Err(InvariantViolation::BadBlockSize { block: bp, size });
    }

    if !alloc && prev_free {
      return Err(InvariantViolation::AdjacentFreeBlocks { first: block::prev_block(bp), second: bp });
    }
    prev_free = !alloc;

    bp = block::next_block(bp);
  }

  Ok(())
}

/// Pass 3: every per-class free list is well-formed and holds only blocks
/// whose size maps to that class.
fn check_free_lists(allocator: &Allocator) -> Result<(), InvariantViolation> {
  let base = allocator.index.anchor();

  for class in 0..Policy::NUM_CLASSES {
    let Some(head) = allocator.index.raw_head(class) else {
      continue;
    };

    if freelist::get_prev(head, base).is_some() {
      return Err(InvariantViolation::BrokenLink { prev: 0, next: head });
    }

    let mut cursor = Some(head);
    while let Some(bp) = cursor {
      if !allocator.heap.contains(bp) || bp % WORD != 0 {
        return Err(InvariantViolation::UnalignedOrOutOfRange { pointer: bp });
      }

      let actual_class = Index::class_of(block::size(bp));
      if actual_class != class {
        return Err(InvariantViolation::WrongClass { block: bp, expected: class, actual: actual_class });
      }

      let next = freelist::get_next(bp, base);
      if let Some(n) = next {
        match freelist::get_prev(n, base) {
          Some(p) if p == bp => {}
          _ => return Err(InvariantViolation::BrokenLink { prev: bp, next: n }),
        }
      }

      cursor = next;
    }
  }

  Ok(())
}

//! # Segregated Index
//!
//! Owns the class-heads table and the eleven per-class free lists it
//! anchors. A request's size maps to a *class* via [`Index::class_of`];
//! each class holds a LIFO-ordered free list of blocks whose size falls in
//! that class's range, except the last class, which is unbounded above and
//! searched best-fit instead of first-fit.

use std::ptr;

use crate::block::{self, WORD};
use crate::freelist;
use crate::policy::Policy;

#[inline]
fn read_word(addr: usize) -> usize {
  unsafe { ptr::read(addr as *const usize) }
}

#[inline]
fn write_word(addr: usize, value: usize) {
  unsafe { ptr::write(addr as *mut usize, value) }
}

/// The segregated class-heads table plus the free lists it anchors.
///
/// `heads_base` is `FULL_HEAP`: the address of `class_heads[0]`, and the
/// anchor every free-list offset in [`crate::freelist`] is computed
/// against.
pub struct Index {
  heads_base: usize,
}

impl Index {
  /// Number of bytes the class-heads table occupies in the heap.
  pub const TABLE_BYTES: usize = Policy::NUM_CLASSES * WORD;

  /// Builds an index whose class-heads table starts at `heads_base`. The
  /// caller is responsible for having reserved `TABLE_BYTES` there and
  /// zeroing it (a zeroed head means "empty list").
  pub fn new(heads_base: usize) -> Self {
    Self { heads_base }
  }

  /// `FULL_HEAP`: the anchor free-list offsets are computed against.
  pub fn anchor(&self) -> usize {
    self.heads_base
  }

  /// Maps a block size to its size class, per
  /// `class(s) = min(NUM_CLASSES - 1, max(0, floor(log2(s)) - 6))`.
  pub fn class_of(size: usize) -> usize {
    if size == 0 {
      return 0;
    }
    let log2 = (usize::BITS - 1 - size.leading_zeros()) as i64;
    let class = log2 - Policy::CLASS_BASE_LOG2 as i64;
    class.clamp(0, (Policy::NUM_CLASSES - 1) as i64) as usize
  }

  fn head_addr(&self, class: usize) -> usize {
    self.heads_base + class * WORD
  }

  fn head(&self, class: usize) -> Option<usize> {
    let addr = read_word(self.head_addr(class));
    if addr == 0 { None } else { Some(addr) }
  }

  fn set_head(&self, class: usize, bp: Option<usize>) {
    write_word(self.head_addr(class), bp.unwrap_or(0));
  }

  /// Inserts `bp` at the head of its class list (LIFO).
  pub fn insert(&self, bp: usize) {
    let class = Self::class_of(block::size(bp));
    let old_head = self.head(class);

    freelist::set_prev(bp, None, self.heads_base);
    freelist::set_next(bp, old_head, self.heads_base);
    if let Some(h) = old_head {
      freelist::set_prev(h, Some(bp), self.heads_base);
    }
    self.set_head(class, Some(bp));
  }

  /// Unlinks `bp` from whichever class list it currently sits in.
  pub fn remove(&self, bp: usize) {
    let prev = freelist::get_prev(bp, self.heads_base);
    let next = freelist::get_next(bp, self.heads_base);

    match (prev, next) {
      (Some(p), Some(n)) => {
        freelist::set_next(p, Some(n), self.heads_base);
        freelist::set_prev(n, Some(p), self.heads_base);
      }
      (Some(p), None) => {
        freelist::set_next(p, None, self.heads_base);
      }
      (None, Some(n)) => {
        freelist::set_prev(n, None, self.heads_base);
        self.set_head(Self::class_of(block::size(bp)), Some(n));
      }
      (None, None) => {
        self.set_head(Self::class_of(block::size(bp)), None);
      }
    }
  }

  /// Finds a free block able to satisfy `size`.
  ///
  /// Classes `class_of(size) ..= NUM_CLASSES - 2` are searched first-fit,
  /// in list order. The final, unbounded class is searched in full and the
  /// *smallest* qualifying block is returned (best-fit), since first-fit on
  /// an unbounded class can waste an arbitrarily large block.
  pub fn find_fit(&self, size: usize) -> Option<usize> {
    let start_class = Self::class_of(size);

    for class in start_class..Policy::NUM_CLASSES - 1 {
      let mut cursor = self.head(class);
      while let Some(bp) = cursor {
        if block::size(bp) >= size {
          return Some(bp);
        }
        cursor = freelist::get_next(bp, self.heads_base);
      }
    }

    let mut best: Option<(usize, usize)> = None;
    let mut cursor = self.head(Policy::NUM_CLASSES - 1);
    while let Some(bp) = cursor {
      let bp_size = block::size(bp);
      if bp_size >= size {
        let take = match best {
          None => true,
          Some((_, best_size)) => bp_size < best_size,
        };
        if take {
          best = Some((bp, bp_size));
        }
      }
      cursor = freelist::get_next(bp, self.heads_base);
    }
    best.map(|(bp, _)| bp)
  }

  /// Iterator over every free block currently filed in `class`, head to
  /// tail. Used by the invariant checker.
  pub fn class_members(&self, class: usize) -> ClassIter<'_> {
    ClassIter { index: self, cursor: self.head(class) }
  }

  /// Returns the raw head pointer of `class` without validating it — used
  /// by the invariant checker, which must tolerate a corrupt head.
  pub fn raw_head(&self, class: usize) -> Option<usize> {
    self.head(class)
  }

  /// Every free block across all classes, head to tail within each class,
  /// classes in ascending order. Used by the invariant checker and by
  /// tests that need to reason about total free space.
  pub fn all_free(&self) -> impl Iterator<Item = usize> + '_ {
    (0..Policy::NUM_CLASSES).flat_map(move |c| self.class_members(c))
  }
}

/// Iterator over a single class's free list, yielding block payload
/// pointers head to tail.
pub struct ClassIter<'a> {
  index: &'a Index,
  cursor: Option<usize>,
}

impl Iterator for ClassIter<'_> {
  type Item = usize;

  fn next(&mut self) -> Option<usize> {
    let bp = self.cursor?;
    self.cursor = freelist::get_next(bp, self.index.heads_base);
    Some(bp)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn class_of_matches_breakpoints() {
    assert_eq!(Index::class_of(64), 0);
    assert_eq!(Index::class_of(127), 0);
    assert_eq!(Index::class_of(128), 1);
    assert_eq!(Index::class_of(255), 1);
    assert_eq!(Index::class_of(256), 2);
    assert_eq!(Index::class_of(32_767), 9);
    assert_eq!(Index::class_of(32_768), 10);
    assert_eq!(Index::class_of(1_000_000), 10);
  }

  #[test]
  fn class_of_clamps_small_sizes_to_zero() {
    assert_eq!(Index::class_of(1), 0);
    assert_eq!(Index::class_of(16), 0);
  }

  fn with_index<F: FnOnce(&Index, usize)>(words: usize, f: F) {
    let mut buf = vec![0u8; words * WORD];
    let base = buf.as_mut_ptr() as usize;
    let heads_base = base;
    let heap_start = heads_base + Index::TABLE_BYTES;
    let index = Index::new(heads_base);
    f(&index, heap_start);
  }

  fn make_block(bp: usize, size: usize) {
    block::set_meta(bp, size, false);
  }

  #[test]
  fn insert_then_find_fit_first_class_is_lifo() {
    with_index(64, |index, heap_start| {
      let a = heap_start + block::HALF_WORD;
      make_block(a, 80);
      let b = a + 80 + block::HALF_WORD;
      make_block(b, 80);
      let c = b + 80 + block::HALF_WORD;
      make_block(c, 80);

      index.insert(a);
      index.insert(b);
      index.insert(c);

      assert_eq!(index.find_fit(64), Some(c));
      index.remove(c);
      assert_eq!(index.find_fit(64), Some(b));
      index.remove(b);
      assert_eq!(index.find_fit(64), Some(a));
    });
  }

  #[test]
  fn find_fit_top_class_is_best_fit() {
    with_index(256, |index, heap_start| {
      let a = heap_start + block::HALF_WORD;
      make_block(a, 200_000);
      let b = a + 200_000 + block::HALF_WORD;
      make_block(b, 100_000);
      let c = b + 100_000 + block::HALF_WORD;
      make_block(c, 150_000);

      index.insert(a);
      index.insert(b);
      index.insert(c);

      assert_eq!(index.find_fit(90_000), Some(b));
    });
  }

  #[test]
  fn remove_updates_head_and_neighbors() {
    with_index(64, |index, heap_start| {
      let a = heap_start + block::HALF_WORD;
      make_block(a, 96);
      let b = a + 96 + block::HALF_WORD;
      make_block(b, 96);

      index.insert(a);
      index.insert(b);
      // list is now: head -> b -> a
      index.remove(b);
      assert_eq!(index.find_fit(32), Some(a));
      index.remove(a);
      assert_eq!(index.find_fit(32), None);
    });
  }
}

//! # Heap Substrate
//!
//! Wraps the `sbrk(2)` break primitive. This is the only module that talks
//! to the operating system; everything above it deals exclusively in
//! block-relative arithmetic over the region this module hands back.
//!
//! The substrate does not understand blocks, headers, or free lists — it
//! only knows how to grow a contiguous byte region and report its current
//! bounds, mirroring the teacher crate's use of `libc::sbrk` in
//! `BumpAllocator`.

use libc::{c_void, intptr_t, sbrk};

use crate::error::HeapError;

/// Growth requests are rounded up to a multiple of two words (16 bytes),
/// matching the "even number of words" rounding the spec requires before
/// calling into the break primitive.
pub(crate) const GROWTH_GRANULARITY: usize = 16;

/// Owns the raw, growable heap region and the break primitive used to
/// extend it.
///
/// `Heap` never shrinks: the allocator core's non-goals explicitly exclude
/// returning memory to the OS outside of process exit.
pub struct Heap {
  lo: usize,
  hi: usize,
}

impl Heap {
  /// An empty heap; no `sbrk` call has been made yet.
  pub const fn new() -> Self {
    Self { lo: 0, hi: 0 }
  }

  /// Extends the heap tail by at least `n_bytes`, rounded up to an even
  /// number of words. Returns the address of the start of the new region
  /// (the previous break), or [`HeapError::BreakFailed`] if `sbrk` failed.
  pub fn extend(&mut self, n_bytes: usize) -> Result<usize, HeapError> {
    let rounded = crate::align::round_up(n_bytes, GROWTH_GRANULARITY);

    let prev_break = unsafe { sbrk(rounded as intptr_t) };
    if prev_break == usize::MAX as *mut c_void {
      return Err(HeapError::BreakFailed);
    }

    let base = prev_break as usize;
    if self.lo == 0 {
      self.lo = base;
    }
    self.hi = base + rounded;

    log::debug!(
      "heap extended by {} bytes (requested {}), base = {:#x}, new break = {:#x}",
      rounded,
      n_bytes,
      base,
      self.hi
    );

    Ok(base)
  }

  /// Lower bound of the managed region (the address of the first byte ever
  /// handed out by `sbrk` through this substrate).
  pub fn lo(&self) -> usize {
    self.lo
  }

  /// Current upper bound of the managed region (the current program
  /// break, as last observed by this substrate).
  pub fn hi(&self) -> usize {
    self.hi
  }

  /// `true` if `addr` lies within `[lo, hi)`.
  pub fn contains(&self, addr: usize) -> bool {
    addr >= self.lo && addr < self.hi
  }
}

impl Default for Heap {
  fn default() -> Self {
    Self::new()
  }
}

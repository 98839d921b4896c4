//! # Policy
//!
//! Tunable constants governing the allocator's layout and growth decisions.
//! The teacher crate had no equivalent — its only "policy" was always
//! `sbrk`-ing fresh memory per allocation. This crate's policy surface is a
//! handful of compile-time constants rather than a runtime-loaded
//! configuration file: the system being ported has no config file either,
//! and these values change the allocator's fragmentation behavior, not its
//! correctness (see `class_of`'s monotonicity requirement in
//! `crate::index`).

/// Marker type grouping the allocator's tunable constants.
pub struct Policy;

impl Policy {
  /// Number of segregated size classes.
  pub const NUM_CLASSES: usize = 11;

  /// `log2` of the smallest class's lower bound (class 0 starts at
  /// `2^CLASS_BASE_LOG2` bytes).
  pub const CLASS_BASE_LOG2: u32 = 6;

  /// Minimum extra bytes requested from the heap substrate on a cache miss,
  /// beyond what's needed to satisfy the triggering request.
  pub const PAGE_STEP: usize = 256;
}

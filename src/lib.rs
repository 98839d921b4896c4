//! # rallocator - A Segregated-Fit Memory Allocator
//!
//! This crate provides a general-purpose dynamic memory allocator built
//! directly on the `sbrk(2)` system call, in the style of the CS:APP
//! malloc lab: an explicit, segregated free list with boundary-tag
//! coalescing.
//!
//! ## Overview
//!
//! Unlike a bump allocator, which only ever grows, this allocator tracks
//! freed memory and reuses it:
//!
//! ```text
//!   Segregated-Fit Allocator Concept:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                         HEAP MEMORY                                  │
//!   │                                                                      │
//!   │  ┌────┬──────┬────┬──────────┬────┬────┬──────────────┬───────────┐ │
//!   │  │ Pro │ A1  │ F1 │   A2     │ F2 │ A3 │     F3       │  Epilogue  │ │
//!   │  └────┴──────┴────┴──────────┴────┴────┴──────────────┴───────────┘ │
//!   │                                                                      │
//!   │   Free blocks (F1, F2, F3) are linked into size-class lists; an     │
//!   │   allocation request walks the smallest class likely to satisfy it   │
//!   │   before ever touching `sbrk` again.                                 │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rallocator
//!   ├── align      - Alignment helpers (align!, align_to!, round_up)
//!   ├── error      - HeapError / InvariantViolation diagnostic types
//!   ├── heap       - C1: the sbrk-backed growable heap substrate
//!   ├── block      - C2: packed header/footer block layout
//!   ├── freelist   - C3: in-band doubly-linked free-list pointers
//!   ├── index      - C4: the segregated size-class table
//!   ├── policy     - Tunable layout/growth constants
//!   ├── allocator  - C5: allocate / free / reallocate / calloc
//!   └── check      - C6: the debug-time invariant checker
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rallocator::Allocator;
//!
//! fn main() {
//!     let mut allocator = Allocator::new();
//!
//!     unsafe {
//!         let p = allocator.allocate(64) as *mut u64;
//!         *p = 42;
//!         println!("Value: {}", *p);
//!         allocator.free(p as *mut u8);
//!     }
//! }
//! ```
//!
//! ## How It Works
//!
//! The allocator uses `sbrk(2)` to extend the program's data segment, same
//! as a bump allocator, but only on an index miss:
//!
//! ```text
//!   Program Memory Layout:
//!
//!   High Address ┌─────────────────────┐
//!                │       Stack         │ ↓ grows down
//!                │         │           │
//!                │         ▼           │
//!                │                     │
//!                │         ▲           │
//!                │         │           │
//!                │       Heap          │ ↑ grows up (sbrk)
//!                ├─────────────────────┤ ← Program Break
//!                │   Uninitialized     │
//!                │       Data          │
//!                ├─────────────────────┤
//!                │   Initialized       │
//!                │       Data          │
//!                ├─────────────────────┤
//!                │       Text          │
//!   Low Address  └─────────────────────┘
//! ```
//!
//! Every block carries its size and allocated bit twice, once in a leading
//! header half-word and once in a trailing footer half-word, so a block's
//! neighbors can be found (and their allocated state checked) from either
//! side without walking any list:
//!
//! ```text
//!   Single Block:
//!   ┌────────┬──────────────────────────────────────┬────────┐
//!   │ Header │            Payload / Links            │ Footer │
//!   │ size|a │  free: next, prev (4 bytes each)      │ size|a │
//!   │4 bytes │  allocated: user data                 │4 bytes │
//!   └────────┴──────────────────────────────────────┴────────┘
//!            ▲
//!            └── Pointer returned to (and passed back by) the caller
//! ```
//!
//! ## Features
//!
//! - **Reuse**: freed blocks are tracked in eleven size-class free lists
//!   and reused before the heap is ever grown again.
//! - **Coalescing**: adjacent free blocks are always merged immediately,
//!   bounding fragmentation.
//! - **Best-fit where it matters**: classes are first-fit, except the
//!   unbounded top class, which is searched in full for the tightest fit.
//! - **Debug-time self-check**: [`check::assert_heap_consistent`] walks
//!   every structural invariant in one pass.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization primitives; callers must
//!   serialize all access to one `Allocator`.
//! - **No memory return**: freed pages are never handed back to the OS.
//! - **Unix-only**: requires `libc` and `sbrk` (POSIX systems).
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory management.
//! Every module below `allocator` reads and writes heap memory through raw
//! pointers; the public surface (`Allocator::allocate` / `free` /
//! `reallocate` / `calloc`) is the safe-ish boundary callers are expected
//! to respect, in the same sense `malloc`/`free` are in C.

pub mod align;
mod allocator;
mod block;
pub mod check;
mod error;
mod freelist;
mod heap;
mod index;
mod policy;

pub use allocator::Allocator;
pub use error::{HeapError, InvariantViolation};

//! # rallocator - A Fixed-Region Heap Allocator
//!
//! This crate manages a single, fixed, contiguous byte region supplied by
//! the caller at initialization and services dynamic allocation,
//! deallocation, and resizing requests entirely within it — no growing the
//! region, no `sbrk`, no `mmap`. Two variants are provided, sharing the same
//! public contract and 8-byte alignment rules:
//!
//! - [`ImplicitAllocator`]: one-word in-place headers and a first-fit
//!   sequential scan. No free list; freeing a block only clears its status
//!   bit.
//! - [`ExplicitAllocator`]: three-word headers (status|payload, prev, next)
//!   and a doubly linked, LIFO free list with splitting on allocation and
//!   right-neighbor coalescing on free.
//!
//! ## Crate Structure
//!
//! ```text
//!   rallocator
//!   ├── align     - roundup(n) alignment utility
//!   ├── block     - header/link codec (packed status+payload word)
//!   ├── error     - HeapError (init-time failures only)
//!   ├── heap      - shared HeapAllocator trait + sequential walker
//!   ├── implicit  - ImplicitAllocator
//!   └── explicit  - ExplicitAllocator
//! ```
//!
//! ## Block Layout
//!
//! ```text
//!   Implicit variant — one-word header:
//!   ┌────────────────────┬────────────────────────────┐
//!   │  status|payload    │        payload bytes       │
//!   │      (8 bytes)      │   (multiple of 8 bytes)    │
//!   └────────────────────┴────────────────────────────┘
//!                         ▲
//!                         └── pointer returned to the caller
//!
//!   Explicit variant — three-word header:
//!   ┌─────────────────┬──────────┬──────────┬────────────────────────┐
//!   │  status|payload  │   prev   │   next   │      payload bytes    │
//!   │     (8 bytes)    │ (8 bytes)│ (8 bytes)│  (>= 16, multiple of 8)│
//!   └─────────────────┴──────────┴──────────┴────────────────────────┘
//!                                             ▲
//!                                             └── pointer returned
//!
//!   `prev`/`next` are only meaningful while the block is free; they are
//!   region offsets, not raw pointers, encoded as `u64::MAX` when absent.
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use rallocator::{ExplicitAllocator, HeapAllocator};
//!
//! let mut region = [0u8; 1024];
//! let mut heap = ExplicitAllocator::init(&mut region, 512).unwrap();
//!
//! unsafe {
//!     let p = heap.malloc(64) as *mut u64;
//!     assert!(!p.is_null());
//!     *p = 42;
//!     assert_eq!(*p, 42);
//!     heap.free(p as *mut u8);
//! }
//!
//! assert!(heap.validate_heap());
//! ```
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory management
//! over a caller-supplied byte region. `malloc` is safe to call (it only
//! ever hands out fresh, non-aliased payload ranges), but `free` and
//! `realloc` are `unsafe`: the caller must ensure the pointer was returned
//! by this same allocator and has not already been freed.
//!
//! ## Non-goals
//!
//! Thread safety, growing the region after initialization, left-neighbor
//! coalescing, best-fit/segregated-size free lists, boundary tags, and
//! alignment greater than 8 bytes are all out of scope. See `DESIGN.md` for
//! the reasoning.

pub mod align;
mod block;
mod error;
mod explicit;
mod heap;
mod implicit;

pub use error::HeapError;
pub use explicit::ExplicitAllocator;
pub use heap::HeapAllocator;
pub use implicit::ImplicitAllocator;

/// Default `MAX_REQUEST` bound: one 4 KiB page, per the specification's
/// "at least one page" requirement. Callers may supply any bound they like
/// to `init`; this constant is only a convenient default.
pub const DEFAULT_MAX_REQUEST: usize = 4096;

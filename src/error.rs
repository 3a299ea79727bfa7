//! Error taxonomy for the allocator's `init` boundary.
//!
//! `malloc`/`realloc`/`free` stay null/no-op on failure, per the public
//! contract — only `init` (and the raw-pointer entry points) surface a typed
//! error, since that is the one place a caller can hand the allocator
//! something irrecoverably wrong (a null or undersized region).

use thiserror::Error;

/// Failure reasons for [`crate::implicit::ImplicitAllocator::init`] and
/// [`crate::explicit::ExplicitAllocator::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeapError {
    /// The raw-pointer entry point was given a null region pointer.
    #[error("region pointer is null")]
    NullRegion,
    /// The region is too small to hold even one header.
    #[error("region of {actual} bytes is smaller than the {minimum} bytes required for one header")]
    RegionTooSmall {
        /// Minimum region length, in bytes, for this variant's header size.
        minimum: usize,
        /// Actual region length supplied by the caller.
        actual: usize,
    },
}

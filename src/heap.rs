//! Shared heap-wide machinery: the public allocator contract, the
//! sequential heap walker, and checked byte-level accessors for header and
//! link words. Used by both [`crate::implicit::ImplicitAllocator`] and
//! [`crate::explicit::ExplicitAllocator`].

use crate::block::{Header, WORD};
use crate::error::HeapError;

/// The public contract shared by both allocator variants.
///
/// `init` fails only when the caller-supplied region cannot hold a single
/// header; `malloc`/`realloc` return a null pointer on any rejection
/// (zero-size request, oversize request, or no fit) without perturbing heap
/// state, matching the language-neutral signatures in the specification.
pub trait HeapAllocator<'a>: Sized {
    /// Takes ownership of `region` and initializes it as one free block
    /// spanning the whole region. `max_request` bounds the payload size
    /// accepted by a single `malloc`/`realloc` call.
    fn init(region: &'a mut [u8], max_request: usize) -> Result<Self, HeapError>;

    /// Allocates `n` bytes, 8-aligned. Returns null on `n == 0`, an
    /// oversize request, or no fit.
    fn malloc(&mut self, n: usize) -> *mut u8;

    /// Frees a pointer previously returned by `malloc`/`realloc`. Null is a
    /// no-op.
    ///
    /// # Safety
    /// `ptr` must be null or a pointer this allocator previously returned
    /// from `malloc`/`realloc`, and must not already have been freed.
    unsafe fn free(&mut self, ptr: *mut u8);

    /// Resizes the allocation at `ptr` to `n` bytes, preserving the first
    /// `min(old_payload, n)` bytes. `realloc(null, n)` behaves as
    /// `malloc(n)`; `realloc(ptr, 0)` behaves as `free(ptr)` and returns
    /// null.
    ///
    /// # Safety
    /// Same requirements as [`HeapAllocator::free`] for a non-null `ptr`.
    unsafe fn realloc(&mut self, ptr: *mut u8, n: usize) -> *mut u8;

    /// Walks the heap checking invariants I1–I6 (and, for the explicit
    /// variant, the free-list walk P4/P7). Returns `false` and logs the
    /// violation on any mismatch; never mutates state.
    fn validate_heap(&self) -> bool;

    /// Prints region bounds, usage, and a sequential block-by-block dump.
    /// Diagnostic only; never mutates state.
    fn dump_heap(&self);
}

/// Reads the header word at `offset`.
///
/// # Panics
/// Panics if `offset + WORD` exceeds `region.len()`; callers only ever walk
/// offsets produced by the walker or arithmetic already checked against
/// `region.len()`.
pub(crate) fn read_header(region: &[u8], offset: usize) -> Header {
    let bytes: [u8; WORD] = region[offset..offset + WORD]
        .try_into()
        .expect("header read is always WORD bytes");
    Header::from_bytes(bytes)
}

/// Writes `header` at `offset`.
pub(crate) fn write_header(region: &mut [u8], offset: usize, header: Header) {
    region[offset..offset + WORD].copy_from_slice(&header.to_bytes());
}

/// Reads a free-list link word at `offset`.
pub(crate) fn read_link(region: &[u8], offset: usize) -> Option<usize> {
    let bytes: [u8; WORD] = region[offset..offset + WORD]
        .try_into()
        .expect("link read is always WORD bytes");
    crate::block::decode_link(bytes)
}

/// Writes a free-list link word at `offset`.
pub(crate) fn write_link(region: &mut [u8], offset: usize, link: Option<usize>) {
    region[offset..offset + WORD].copy_from_slice(&crate::block::encode_link(link));
}

/// Sequential heap walker: starting from offset 0, steps `header_size +
/// payload` bytes per block until it reaches the end of the region.
///
/// Shared by the implicit allocator's first-fit search and both variants'
/// `validate_heap`/`dump_heap`.
pub(crate) struct BlockWalk<'r> {
    region: &'r [u8],
    header_size: usize,
    offset: usize,
}

impl<'r> BlockWalk<'r> {
    pub(crate) fn new(region: &'r [u8], header_size: usize) -> Self {
        Self {
            region,
            header_size,
            offset: 0,
        }
    }
}

impl<'r> Iterator for BlockWalk<'r> {
    /// `(offset of this block's header, decoded header)`.
    type Item = (usize, Header);

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.region.len() {
            return None;
        }
        let header = read_header(self.region, self.offset);
        let current = self.offset;
        self.offset = current + self.header_size + header.payload();
        Some((current, header))
    }
}

/// Converts a payload pointer returned by `malloc`/`realloc` back into a
/// region offset, by subtracting the region's base address.
///
/// # Safety
/// `ptr` must point inside `region` at a payload boundary (i.e. it must
/// have been produced by this same region's `as_mut_ptr()` plus a valid
/// offset).
pub(crate) unsafe fn offset_of(region: &[u8], ptr: *mut u8) -> usize {
    let base = region.as_ptr();
    unsafe { ptr.offset_from(base) as usize }
}

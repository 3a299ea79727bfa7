//! Implicit allocator: one-word in-place headers, first-fit sequential
//! scan, no free list, no coalescing.

use std::ptr;

use crate::align::roundup;
use crate::block::{Header, IMPLICIT_HEADER_SIZE as W};
use crate::error::HeapError;
use crate::heap::{self, BlockWalk, HeapAllocator};

/// Minimum extra payload a remainder must have to be worth splitting off
/// into its own trailing free block (one header plus 8 bytes of payload).
const MIN_SPLIT_REMAINDER: usize = W + 8;

/// A heap allocator over a fixed region using sequential, in-place headers
/// and a first-fit scan. See the module docs for the layout.
pub struct ImplicitAllocator<'a> {
    region: &'a mut [u8],
    max_request: usize,
    size_used: usize,
}

impl<'a> ImplicitAllocator<'a> {
    /// Raw-pointer entry point mirroring the specification's
    /// language-neutral `init(region pointer, region length)` signature.
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes for `len` bytes for the
    /// lifetime `'a`, or null.
    pub unsafe fn init_from_raw_parts(
        ptr: *mut u8,
        len: usize,
        max_request: usize,
    ) -> Result<Self, HeapError> {
        if ptr.is_null() {
            return Err(HeapError::NullRegion);
        }
        let region = unsafe { std::slice::from_raw_parts_mut(ptr, len) };
        Self::init(region, max_request)
    }

    /// Takes ownership of `region` and writes the single free header that
    /// spans it.
    pub fn init(region: &'a mut [u8], max_request: usize) -> Result<Self, HeapError> {
        if region.len() < W {
            return Err(HeapError::RegionTooSmall {
                minimum: W,
                actual: region.len(),
            });
        }
        let payload = region.len() - W;
        let mut allocator = Self {
            region,
            max_request,
            size_used: 0,
        };
        heap::write_header(allocator.region, 0, Header::new(payload, false));
        log::info!(
            "implicit heap initialized: {} bytes, max_request {}",
            allocator.region.len(),
            max_request
        );
        Ok(allocator)
    }

    fn free_space(&self) -> usize {
        self.region.len() - self.size_used
    }

    fn walk(&self) -> BlockWalk<'_> {
        BlockWalk::new(self.region, W)
    }

    /// First-fit search for a free block able to hold `req` bytes of
    /// payload. On a hit, splits or takes the whole block and returns the
    /// header offset and the payload size it now holds.
    fn find_and_claim(&mut self, req: usize) -> Option<usize> {
        let hit = self
            .walk()
            .find(|(_, header)| !header.is_allocated() && header.payload() >= req)
            .map(|(offset, header)| (offset, header.payload()));

        let (offset, payload) = hit?;
        if payload - req >= MIN_SPLIT_REMAINDER {
            let new_offset = offset + W + req;
            let new_payload = payload - req - W;
            heap::write_header(self.region, new_offset, Header::new(new_payload, false));
            heap::write_header(self.region, offset, Header::new(req, true));
        } else {
            heap::write_header(self.region, offset, Header::new(payload, true));
        }
        self.size_used += W + heap::read_header(self.region, offset).payload();
        Some(offset)
    }

    fn payload_ptr(&mut self, offset: usize) -> *mut u8 {
        unsafe { self.region.as_mut_ptr().add(offset + W) }
    }
}

impl<'a> HeapAllocator<'a> for ImplicitAllocator<'a> {
    fn init(region: &'a mut [u8], max_request: usize) -> Result<Self, HeapError> {
        ImplicitAllocator::init(region, max_request)
    }

    fn malloc(&mut self, n: usize) -> *mut u8 {
        if n == 0 {
            return ptr::null_mut();
        }
        let req = roundup(n);
        if req > self.max_request {
            log::warn!("malloc({n}) rejected: exceeds max_request {}", self.max_request);
            return ptr::null_mut();
        }
        if req + W > self.free_space() {
            log::warn!("malloc({n}) rejected: insufficient remaining capacity");
            return ptr::null_mut();
        }
        match self.find_and_claim(req) {
            Some(offset) => self.payload_ptr(offset),
            None => {
                log::warn!("malloc({n}) found no fit after full walk");
                ptr::null_mut()
            }
        }
    }

    unsafe fn free(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        let payload_offset = unsafe { heap::offset_of(self.region, ptr) };
        let offset = payload_offset - W;
        let header = heap::read_header(self.region, offset);
        heap::write_header(self.region, offset, header.with_allocated(false));
        self.size_used -= W + header.payload();
    }

    unsafe fn realloc(&mut self, ptr: *mut u8, n: usize) -> *mut u8 {
        if ptr.is_null() {
            return self.malloc(n);
        }
        if n == 0 {
            unsafe { HeapAllocator::free(self, ptr) };
            return ptr::null_mut();
        }

        let payload_offset = unsafe { heap::offset_of(self.region, ptr) };
        let offset = payload_offset - W;
        let old_payload = heap::read_header(self.region, offset).payload();
        let req = roundup(n);
        if req > self.max_request {
            return ptr::null_mut();
        }
        if old_payload >= req {
            return ptr;
        }

        let new_offset = match self.find_and_claim(req) {
            Some(new_offset) => new_offset,
            None => return ptr::null_mut(),
        };
        unsafe { HeapAllocator::free(self, ptr) };

        let new_ptr = self.payload_ptr(new_offset);
        let copy_len = old_payload.min(req);
        unsafe { ptr::copy(ptr, new_ptr, copy_len) };
        new_ptr
    }

    fn validate_heap(&self) -> bool {
        let mut used = 0usize;
        let mut free = 0usize;
        let mut end = 0usize;

        for (offset, header) in self.walk() {
            end = offset + W + header.payload();
            if header.is_allocated() {
                used += W + header.payload();
            } else {
                free += W + header.payload();
            }
        }

        let mut ok = true;
        if end != self.region.len() {
            log::error!(
                "validate_heap: walk ended at {end}, expected {}",
                self.region.len()
            );
            ok = false;
        }
        if used + free != self.region.len() {
            log::error!(
                "validate_heap: used {used} + free {free} != region length {}",
                self.region.len()
            );
            ok = false;
        }
        if used != self.size_used {
            log::error!(
                "validate_heap: walked used {used} != tracked size_used {}",
                self.size_used
            );
            ok = false;
        }
        ok
    }

    fn dump_heap(&self) {
        println!(
            "implicit heap: {} bytes total, {} used, {} free",
            self.region.len(),
            self.size_used,
            self.free_space()
        );
        for (offset, header) in self.walk() {
            println!(
                "  [{offset:>8}] {} payload={}",
                if header.is_allocated() { "alloc" } else { "free " },
                header.payload()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alloc(size: usize) -> ImplicitAllocator<'static> {
        let region = vec![0u8; size].leak();
        ImplicitAllocator::init(region, 4096).unwrap()
    }

    #[test]
    fn init_rejects_region_smaller_than_one_header() {
        let mut region = [0u8; 4];
        assert_eq!(
            ImplicitAllocator::init(&mut region, 4096),
            Err(HeapError::RegionTooSmall {
                minimum: 8,
                actual: 4
            })
        );
    }

    #[test]
    fn malloc_zero_returns_null() {
        let mut a = alloc(256);
        assert!(a.malloc(0).is_null());
    }

    #[test]
    fn malloc_oversize_returns_null() {
        let mut a = alloc(256);
        assert!(a.malloc(100_000).is_null());
    }

    #[test]
    fn first_malloc_splits_remainder() {
        let mut a = alloc(256);
        let p = a.malloc(16);
        assert!(!p.is_null());
        assert_eq!(a.size_used, W + 16);
        assert!(a.validate_heap());
    }

    #[test]
    fn free_then_validate() {
        let mut a = alloc(256);
        let p = a.malloc(16);
        unsafe { HeapAllocator::free(&mut a, p) };
        assert_eq!(a.size_used, 0);
        assert!(a.validate_heap());
    }

    #[test]
    fn realloc_null_is_malloc() {
        let mut a = alloc(256);
        let p = unsafe { HeapAllocator::realloc(&mut a, ptr::null_mut(), 16) };
        assert!(!p.is_null());
    }

    #[test]
    fn realloc_zero_frees_and_returns_null() {
        let mut a = alloc(256);
        let p = a.malloc(16);
        let q = unsafe { HeapAllocator::realloc(&mut a, p, 0) };
        assert!(q.is_null());
        assert_eq!(a.size_used, 0);
    }

    #[test]
    fn realloc_shrink_is_in_place() {
        let mut a = alloc(256);
        let p = a.malloc(32);
        let q = unsafe { HeapAllocator::realloc(&mut a, p, 24) };
        assert_eq!(p, q);
    }

    #[test]
    fn realloc_grow_copies_and_moves() {
        let mut a = alloc(256);
        let p = a.malloc(16) as *mut u8;
        for i in 0..16u8 {
            unsafe { p.add(i as usize).write(i) };
        }
        // Force a neighboring allocation so the in-place block can't simply
        // extend into its right neighbor's territory.
        let _blocker = a.malloc(16);

        let q = unsafe { HeapAllocator::realloc(&mut a, p, 64) } as *mut u8;
        assert_ne!(p, q);
        for i in 0..16u8 {
            assert_eq!(unsafe { q.add(i as usize).read() }, i);
        }
        assert!(a.validate_heap());
    }

    #[test]
    fn exhaustion_keeps_heap_valid() {
        let mut a = alloc(256);
        loop {
            let p = a.malloc(32);
            if p.is_null() {
                break;
            }
        }
        assert!(a.validate_heap());
    }
}

//! Explicit allocator: three-word headers (status|payload, prev, next), a
//! doubly linked LIFO free list, splitting, and right-neighbor coalescing.

use std::ptr;

use crate::align::roundup;
use crate::block::{Header, EXPLICIT_HEADER_SIZE as W};
use crate::error::HeapError;
use crate::heap::{self, BlockWalk, HeapAllocator};

/// Offset of the `prev` link word within a block header, relative to the
/// header's own offset.
const PREV_OFFSET: usize = 8;
/// Offset of the `next` link word within a block header.
const NEXT_OFFSET: usize = 16;

/// A heap allocator over a fixed region using a doubly linked, LIFO free
/// list with splitting on allocation and right-neighbor coalescing on
/// free. See the module docs for the layout.
pub struct ExplicitAllocator<'a> {
    region: &'a mut [u8],
    max_request: usize,
    size_used: usize,
    free_space: usize,
    free_list_head: Option<usize>,
}

impl<'a> ExplicitAllocator<'a> {
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

    /// Takes ownership of `region`, writes the single free block spanning
    /// it, and points the free-list head at it.
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
            free_space: 0,
            free_list_head: None,
        };
        allocator.write_block(0, Header::new(payload, false), None, None);
        allocator.free_space = allocator.region.len();
        allocator.free_list_head = Some(0);
        log::info!(
            "explicit heap initialized: {} bytes, max_request {}",
            allocator.region.len(),
            max_request
        );
        Ok(allocator)
    }

    fn walk(&self) -> BlockWalk<'_> {
        BlockWalk::new(self.region, W)
    }

    fn header(&self, offset: usize) -> Header {
        heap::read_header(self.region, offset)
    }

    fn prev(&self, offset: usize) -> Option<usize> {
        heap::read_link(self.region, offset + PREV_OFFSET)
    }

    fn next(&self, offset: usize) -> Option<usize> {
        heap::read_link(self.region, offset + NEXT_OFFSET)
    }

    fn write_block(&mut self, offset: usize, header: Header, prev: Option<usize>, next: Option<usize>) {
        heap::write_header(self.region, offset, header);
        heap::write_link(self.region, offset + PREV_OFFSET, prev);
        heap::write_link(self.region, offset + NEXT_OFFSET, next);
    }

    fn set_prev(&mut self, offset: usize, prev: Option<usize>) {
        heap::write_link(self.region, offset + PREV_OFFSET, prev);
    }

    fn set_next(&mut self, offset: usize, next: Option<usize>) {
        heap::write_link(self.region, offset + NEXT_OFFSET, next);
    }

    /// Iterates the free list from `free_list_head`, following `next`,
    /// until it runs out — no size-derived loop bound (Open Question
    /// resolution: the original's `free_space`-derived counter is only
    /// coincidentally correct against an unordered free list).
    fn free_list(&self) -> FreeListWalk<'_, 'a> {
        FreeListWalk {
            allocator: self,
            current: self.free_list_head,
        }
    }

    /// Unlinks `offset` from the free list, rewiring its neighbors (and the
    /// head, if `offset` was the head).
    fn unlink(&mut self, offset: usize) {
        let prev = self.prev(offset);
        let next = self.next(offset);
        match prev {
            Some(p) => self.set_next(p, next),
            None => self.free_list_head = next,
        }
        if let Some(n) = next {
            self.set_prev(n, prev);
        }
    }

    /// Inserts a free block at the head of the list (LIFO).
    fn insert_head(&mut self, offset: usize) {
        let old_head = self.free_list_head;
        self.set_prev(offset, None);
        self.set_next(offset, old_head);
        if let Some(head) = old_head {
            self.set_prev(head, Some(offset));
        }
        self.free_list_head = Some(offset);
    }

    /// First-fit search of the free list for a block able to hold `req`
    /// bytes of payload. On a hit, splits or takes the whole block and
    /// returns the header offset it now lives at.
    fn find_and_claim(&mut self, req: usize) -> Option<usize> {
        let hit = self
            .free_list()
            .find(|&offset| self.header(offset).payload() >= req);
        let victim = hit?;

        let payload = self.header(victim).payload();
        let victim_prev = self.prev(victim);
        let victim_next = self.next(victim);

        if payload - req > W {
            let new_offset = victim + W + req;
            let new_payload = payload - req - W;
            self.write_block(new_offset, Header::new(new_payload, false), victim_prev, victim_next);
            match victim_prev {
                Some(p) => self.set_next(p, Some(new_offset)),
                None => self.free_list_head = Some(new_offset),
            }
            if let Some(n) = victim_next {
                self.set_prev(n, Some(new_offset));
            }
            heap::write_header(self.region, victim, Header::new(req, true));
        } else {
            self.unlink(victim);
            heap::write_header(self.region, victim, Header::new(payload, true));
        }

        self.size_used += W + self.header(victim).payload();
        self.free_space -= W + self.header(victim).payload();
        Some(victim)
    }

    fn payload_ptr(&mut self, offset: usize) -> *mut u8 {
        unsafe { self.region.as_mut_ptr().add(offset + W) }
    }

    unsafe fn free_offset(&mut self, header_offset: usize) {
        let payload = self.header(header_offset).payload();
        self.size_used -= W + payload;
        self.free_space += W + payload;

        let right_offset = header_offset + W + payload;
        if right_offset < self.region.len() && !self.header(right_offset).is_allocated() {
            let right_payload = self.header(right_offset).payload();
            let right_prev = self.prev(right_offset);
            let right_next = self.next(right_offset);
            let merged_payload = payload + W + right_payload;

            self.write_block(header_offset, Header::new(merged_payload, false), right_prev, right_next);
            match right_prev {
                Some(p) => self.set_next(p, Some(header_offset)),
                None => self.free_list_head = Some(header_offset),
            }
            if let Some(n) = right_next {
                self.set_prev(n, Some(header_offset));
            }
        } else {
            heap::write_header(self.region, header_offset, Header::new(payload, false));
            self.insert_head(header_offset);
        }
    }
}

/// Iterator over the free list, following `next` links.
struct FreeListWalk<'h, 'a> {
    allocator: &'h ExplicitAllocator<'a>,
    current: Option<usize>,
}

impl<'h, 'a> Iterator for FreeListWalk<'h, 'a> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let offset = self.current?;
        self.current = self.allocator.next(offset);
        Some(offset)
    }
}

impl<'a> HeapAllocator<'a> for ExplicitAllocator<'a> {
    fn init(region: &'a mut [u8], max_request: usize) -> Result<Self, HeapError> {
        ExplicitAllocator::init(region, max_request)
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
        if req + W > self.free_space {
            log::warn!("malloc({n}) rejected: insufficient remaining capacity");
            return ptr::null_mut();
        }
        match self.find_and_claim(req) {
            Some(offset) => self.payload_ptr(offset),
            None => {
                log::warn!("malloc({n}) found no fit in free list");
                ptr::null_mut()
            }
        }
    }

    unsafe fn free(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        let payload_offset = unsafe { heap::offset_of(self.region, ptr) };
        let header_offset = payload_offset - W;
        unsafe { self.free_offset(header_offset) };
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
        let header_offset = payload_offset - W;
        let old_payload = self.header(header_offset).payload();
        let req = roundup(n);
        if req > self.max_request {
            return ptr::null_mut();
        }
        if req <= old_payload {
            return ptr;
        }

        let new_offset = match self.find_and_claim(req) {
            Some(new_offset) => new_offset,
            None => return ptr::null_mut(),
        };
        let new_ptr = self.payload_ptr(new_offset);
        unsafe { ptr::copy(ptr, new_ptr, old_payload) };
        unsafe { self.free_offset(header_offset) };
        new_ptr
    }

    fn validate_heap(&self) -> bool {
        let mut used = 0usize;
        let mut free = 0usize;
        let mut end = 0usize;
        let mut ok = true;

        for (offset, header) in self.walk() {
            end = offset + W + header.payload();
            if header.is_allocated() {
                used += W + header.payload();
            } else {
                free += W + header.payload();
            }
        }
        if end != self.region.len() {
            log::error!("validate_heap: walk ended at {end}, expected {}", self.region.len());
            ok = false;
        }
        if used + free != self.region.len() {
            log::error!("validate_heap: used {used} + free {free} != region length {}", self.region.len());
            ok = false;
        }

        let mut free_list_total = 0usize;
        for offset in self.free_list() {
            let header = self.header(offset);
            if header.is_allocated() {
                log::error!("validate_heap: block at {offset} on free list but marked allocated");
                ok = false;
            }
            free_list_total += W + header.payload();
        }
        if free_list_total != free {
            log::error!(
                "validate_heap: free-list walk total {free_list_total} != sequential-walk free total {free}"
            );
            ok = false;
        }
        if self.free_space + self.size_used != self.region.len() {
            log::error!(
                "validate_heap: free_space {} + size_used {} != region length {}",
                self.free_space,
                self.size_used,
                self.region.len()
            );
            ok = false;
        }
        ok
    }

    fn dump_heap(&self) {
        println!(
            "explicit heap: {} bytes total, {} used, {} free, head={:?}",
            self.region.len(),
            self.size_used,
            self.free_space,
            self.free_list_head
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

    fn alloc(size: usize) -> ExplicitAllocator<'static> {
        let region = vec![0u8; size].leak();
        ExplicitAllocator::init(region, 4096).unwrap()
    }

    #[test]
    fn init_rejects_region_smaller_than_one_header() {
        let mut region = [0u8; 8];
        assert_eq!(
            ExplicitAllocator::init(&mut region, 4096),
            Err(HeapError::RegionTooSmall {
                minimum: 24,
                actual: 8
            })
        );
    }

    #[test]
    fn init_first_malloc_matches_scenario_one() {
        let mut a = alloc(1024);
        let p = a.malloc(8);
        assert!(!p.is_null());

        let base = a.region.as_ptr() as usize;
        assert_eq!(p as usize - base, W);
        assert_eq!(a.header(0), Header::new(8, true));

        let free_offset = W + 8;
        assert_eq!(a.header(free_offset).payload(), 1024 - 32 - 24);
        assert_eq!(a.size_used, 32);
    }

    #[test]
    fn split_threshold_boundary_consumes_whole_block() {
        // Continuing from scenario 1: after malloc(8), the trailing free
        // block has payload 968. Asking for 944 leaves a remainder of
        // exactly 24, which is not `> 24`, so the whole block is taken
        // rather than split.
        let mut a = alloc(1024);
        let _first = a.malloc(8);
        assert_eq!(a.header(W + 8).payload(), 968);

        let p = a.malloc(944);
        assert!(!p.is_null());
        assert_eq!(a.free_list_head, None);
        assert!(a.validate_heap());
    }

    #[test]
    fn right_coalesce_on_free() {
        let mut a = alloc(1024);
        let pa = a.malloc(16);
        let pb = a.malloc(16);
        let pa_offset = unsafe { heap::offset_of(a.region, pa) } - W;
        let pb_offset = unsafe { heap::offset_of(a.region, pb) } - W;

        // `pa`'s right neighbor (`pb`) is still allocated when it frees, so
        // it lands on the free list standalone.
        unsafe { HeapAllocator::free(&mut a, pa) };
        // `pb`'s right neighbor is the trailing free block, so freeing it
        // merges the two into one block living at `pb`'s own offset.
        unsafe { HeapAllocator::free(&mut a, pb) };

        assert!(a.validate_heap());
        let offsets: Vec<usize> = a.free_list().collect();
        assert_eq!(offsets, vec![pa_offset, pb_offset]);
        assert_eq!(a.header(pa_offset).payload(), 16);
        // Merged payload = region - (merged block's own header) - (a's
        // whole surviving block: header + 16 bytes payload).
        assert_eq!(a.header(pb_offset).payload(), 1024 - W - (W + 16));
    }

    #[test]
    fn lifo_insertion_order() {
        let mut a = alloc(1024);
        let x = a.malloc(16);
        let y = a.malloc(16);
        let z = a.malloc(16);

        unsafe { HeapAllocator::free(&mut a, x) };
        unsafe { HeapAllocator::free(&mut a, y) };

        let y_offset = unsafe { heap::offset_of(a.region, y) } - W;
        assert_eq!(a.free_list_head, Some(y_offset));

        unsafe { HeapAllocator::free(&mut a, z) };
        assert!(a.validate_heap());
    }

    #[test]
    fn realloc_in_place_shortcut_does_not_change_counters() {
        let mut a = alloc(1024);
        let p = a.malloc(32);
        let used_before = a.size_used;
        let q = unsafe { HeapAllocator::realloc(&mut a, p, 24) };
        assert_eq!(p, q);
        assert_eq!(a.size_used, used_before);
    }

    #[test]
    fn realloc_growing_copies_and_frees_old() {
        let mut a = alloc(1024);
        let p = a.malloc(16) as *mut u8;
        for i in 0..16u8 {
            unsafe { p.add(i as usize).write(i) };
        }
        let _blocker = a.malloc(16);

        let q = unsafe { HeapAllocator::realloc(&mut a, p, 64) } as *mut u8;
        assert_ne!(p, q);
        for i in 0..16u8 {
            assert_eq!(unsafe { q.add(i as usize).read() }, i);
        }
        assert!(a.validate_heap());
    }

    #[test]
    fn realloc_null_is_malloc_and_zero_is_free() {
        let mut a = alloc(1024);
        let p = unsafe { HeapAllocator::realloc(&mut a, ptr::null_mut(), 16) };
        assert!(!p.is_null());

        let q = unsafe { HeapAllocator::realloc(&mut a, p, 0) };
        assert!(q.is_null());
        assert!(a.validate_heap());
    }

    #[test]
    fn exhaustion_keeps_heap_valid() {
        let mut a = alloc(1024);
        loop {
            let p = a.malloc(32);
            if p.is_null() {
                break;
            }
        }
        assert!(a.validate_heap());
    }
}

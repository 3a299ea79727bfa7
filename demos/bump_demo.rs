use std::io::Read;

use rallocator::{ExplicitAllocator, HeapAllocator};

/// Waits until the user presses ENTER.
/// Useful when you want to step through `dump_heap()` output between each
/// operation instead of having it all scroll past at once.
fn block_until_enter_pressed() {
    println!("\n>>> Press ENTER to continue...");
    let _ = std::io::stdin().bytes().next();
}

fn main() {
    env_logger::init();

    // A fixed 1 KiB region, entirely on our own stack — no sbrk, no mmap.
    let mut region = [0u8; 1024];
    let mut heap = ExplicitAllocator::init(&mut region, 512).expect("region is large enough");

    println!("[start] fresh heap:");
    heap.dump_heap();
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 1) Allocate space for a u32.
    // --------------------------------------------------------------------
    let first_block = heap.malloc(4);
    println!("\n[1] Allocate 4 bytes for a u32");
    unsafe {
        let first_ptr = first_block as *mut u32;
        first_ptr.write(0xDEADBEEF);
        println!("[1] Value written = 0x{:X}", first_ptr.read());
    }
    heap.dump_heap();
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Allocate 12 bytes (odd-sized request, rounds up to 16).
    // --------------------------------------------------------------------
    let second_block = heap.malloc(12);
    println!("\n[2] Allocate 12 bytes (rounds up to 16)");
    unsafe {
        std::ptr::write_bytes(second_block, 0xAB, 12);
    }
    println!("[2] Initialized second block with 0xAB");
    heap.dump_heap();
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) Free the first block, then re-allocate something smaller — watch
    //    the explicit variant's free list reuse it.
    // --------------------------------------------------------------------
    println!("\n[3] Free first_block at {:?}", first_block);
    unsafe { heap.free(first_block) };
    heap.dump_heap();
    block_until_enter_pressed();

    let third_block = heap.malloc(2);
    println!("\n[4] Allocate 2 bytes (check reuse of freed block)");
    println!(
        "[4] third_block == first_block? {}",
        if third_block == first_block {
            "Yes, it reused the freed block"
        } else {
            "No, it allocated elsewhere"
        }
    );
    heap.dump_heap();
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Grow the second allocation past its current payload, forcing a
    //    realloc that copies into a fresh block.
    // --------------------------------------------------------------------
    println!("\n[5] Realloc second_block from 12 to 200 bytes");
    let grown = unsafe { heap.realloc(second_block, 200) };
    println!(
        "[5] grown == second_block? {}",
        if grown == second_block { "yes (in place)" } else { "no (moved)" }
    );
    heap.dump_heap();

    println!("\n[6] validate_heap() = {}", heap.validate_heap());
    println!("End of demo.");
}

use std::io::Read;

use libc::sbrk;
use rallocator::Allocator;

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
/// The program break is the upper boundary of the heap managed via brk/sbrk.
unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn main() {
  env_logger::init();

  // Our segregated-fit allocator. Unlike a bump allocator it holds:
  // - a heap substrate (`sbrk`-backed, growable, never shrinking)
  // - a class-heads table indexing eleven free lists
  // and reuses freed blocks before it ever touches `sbrk` again.
  let mut allocator = Allocator::new();

  unsafe {
    // Initial heap state (already grown by one page's worth of bookkeeping
    // plus the first free block).
    print_program_break("start");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 1) Allocate 4 bytes (room for a u32).
    // --------------------------------------------------------------------
    let first_block = allocator.allocate(4) as *mut u32;
    println!("\n[1] Allocate 4 bytes");
    println!("[1] address = {:?}", first_block);

    first_block.write(0xDEADBEEF);
    println!("[1] Value written to first_block = 0x{:X}", first_block.read());

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Allocate 12 bytes (u8[12]).
    //    This shows how the allocator handles "odd-sized" allocations.
    // --------------------------------------------------------------------
    let second_block = allocator.allocate(12);
    println!("\n[2] Allocate [u8; 12]");
    println!("[2] address = {:?}", second_block);

    std::ptr::write_bytes(second_block, 0xAB, 12);
    println!("[2] Initialized second block with 0xAB");

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) Allocate 8 bytes (room for a u64) to test alignment (always
    //    8-byte aligned, by construction of the block layout).
    // --------------------------------------------------------------------
    let third_block = allocator.allocate(8) as *mut u64;
    println!("\n[3] Allocate 8 bytes (observe alignment)");
    println!("[3] address = {:?}", third_block);

    third_block.write(0x1122334455667788);
    println!("[3] Value written = 0x{:X}", third_block.read());

    let addr_third = third_block as usize;
    println!("[3] Address = {:#X}, addr % 8 = {}", addr_third, addr_third % 8);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Allocate 32 bytes (an array of 16 u16s) to force more movement.
    // --------------------------------------------------------------------
    let fourth_block = allocator.allocate(32) as *mut u16;
    println!("\n[4] Allocate [u16; 16]");
    println!("[4] address = {:?}", fourth_block);

    for i in 0..16 {
      fourth_block.add(i).write(i as u16);
    }
    println!("[4] Wrote 0..15 into the u16 array");

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) Free the first block.
    //
    //    Unlike a pure bump allocator, this one files the freed block into
    //    its size-class free list (after coalescing with any free
    //    neighbors), so it's a real candidate for reuse.
    // --------------------------------------------------------------------
    allocator.free(first_block as *mut u8);
    println!("\n[5] Freed first_block at {:?}", first_block);
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 6) Allocate a small block (2 bytes) to see if the allocator
    //    reuses the freed block.
    // --------------------------------------------------------------------
    let fifth_block = allocator.allocate(2);
    println!("\n[6] Allocate [u8; 2] (check reuse of freed block)");
    println!("[6] address = {:?}", fifth_block);

    println!(
      "[6] fifth_block == first_block? {}",
      if fifth_block as usize == first_block as usize {
        "Yes, it reused the freed block"
      } else {
        "No, it allocated somewhere else (likely split from a different free block)"
      }
    );

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 7) Allocate a large block to observe heap growth.
    //    This usually changes the result of `sbrk(0)`.
    // --------------------------------------------------------------------
    print_program_break("before large alloc");

    // Example: 64 KiB
    let big_block = allocator.allocate(64 * 1024);
    println!("\n[7] Allocate large 64 KiB block");
    println!("[7] address = {:?}", big_block);

    print_program_break("after large alloc");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 8) Grow an allocation with reallocate, then check the heap's
    //    structural invariants with the debug-time checker.
    // --------------------------------------------------------------------
    std::ptr::write_bytes(big_block, 0x5A, 64 * 1024);
    let grown = allocator.reallocate(big_block, 128 * 1024);
    println!("\n[8] Reallocated 64 KiB block to 128 KiB at {:?}", grown);

    rallocator::check::assert_heap_consistent(&allocator, "tour::end");
    println!("[8] Heap invariants hold.");

    // --------------------------------------------------------------------
    // 9) End of demo.
    //
    //    The OS reclaims all memory when the process exits; this allocator
    //    never hands pages back to the OS itself.
    // --------------------------------------------------------------------
    println!("\n[9] End of example. Process will exit and the OS will reclaim all memory.");
  }
}

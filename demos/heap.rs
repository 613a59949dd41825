use std::io::Read;

use libc::sbrk;
use fenceheap::{Heap, PointerKind, ProgramBreak};

/// Waits until the user presses ENTER, so the program break can be inspected
/// with `pmap` or `gdb` between steps.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn print_heap(
  heap: &Heap<ProgramBreak>,
  label: &str,
) {
  println!(
    "[{}] blocks = {}, region = {} bytes, largest block = {}, validate = {:?}",
    label,
    heap.block_count(),
    heap.region_size(),
    heap.largest_allocated_block_size(),
    heap.validate(),
  );
}

fn main() {
  let mut heap = Heap::new(ProgramBreak);

  print_program_break("start");
  if let Err(error) = heap.initialize() {
    eprintln!("cannot set up heap: {error}");
    return;
  }
  print_heap(&heap, "initialized");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Two allocations, both written to the last byte.
  // --------------------------------------------------------------------
  let (Ok(first), Ok(second)) = (heap.allocate(10), heap.allocate(20)) else {
    eprintln!("allocation failed");
    return;
  };
  unsafe {
    first.as_ptr().write_bytes(0xAB, 10);
    second.as_ptr().write_bytes(0xCD, 20);
  }
  println!("\n[1] first = {:?}, second = {:?}", first, second);
  print_heap(&heap, "1");
  print_program_break("1");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Release the first block and allocate something smaller: it lands
  //    in the gap the first block left behind.
  // --------------------------------------------------------------------
  heap.release(first.as_ptr());
  let third = heap.allocate(5);
  println!(
    "\n[2] third = {:?}, reused first block? {}",
    third,
    third == Ok(first)
  );
  print_heap(&heap, "2");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Grow the tail in place.
  // --------------------------------------------------------------------
  let grown = heap.resize(second.as_ptr(), 50);
  println!("\n[3] resize second to 50 bytes -> {:?}", grown);
  print_heap(&heap, "3");
  print_program_break("3");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Classify a few addresses around the second block.
  // --------------------------------------------------------------------
  let payload = second.as_ptr();
  for (what, address) in [
    ("payload start", payload),
    ("one before payload", payload.wrapping_sub(1)),
    ("inside header", payload.wrapping_sub(10)),
    ("inside payload", payload.wrapping_add(3)),
  ] {
    println!("[4] {:<20} -> {:?}", what, heap.classify(address));
  }
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Overrun the second block by one byte and watch the heap lock up.
  // --------------------------------------------------------------------
  unsafe { payload.add(50).write(0) };
  println!("\n[5] wrote one byte past the end of second");
  print_heap(&heap, "5");
  println!(
    "[5] allocate(8) -> {:?}, classify(second) -> {:?}",
    heap.allocate(8),
    heap.classify(payload)
  );
  assert_eq!(heap.classify(payload), PointerKind::HeapCorrupted);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 6) Give everything back.
  // --------------------------------------------------------------------
  heap.teardown();
  print_program_break("end");
}

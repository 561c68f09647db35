//! The copying collector and the global symbols emitted code addresses
//! directly (`free_ptr(%rip)`, `fromspace_end(%rip)`, `rootstack_begin`).
//!
//! This is a two-space (Cheney) copying collector over the heap layout
//! spec.md §4.5/§8 describes: every heap object is a tuple prefixed by an
//! 8-byte tag whose low bit is 1. That low bit is also how a forwarded
//! object is told apart from a not-yet-forwarded one: once an object is
//! copied, its original tag word is overwritten with the (8-byte
//! aligned, so low-bit-0) address of the copy. Reading a 0 low bit at a
//! tuple's first word therefore always means "follow this pointer
//! instead", and a 1 low bit always means "this is a real tag".

use std::sync::Mutex;

use crate::error::RuntimeError;

/// State for one heap; kept behind a `Mutex` even though the generated
/// code is single-threaded (spec.md §5) so that `initialize`/`collect`
/// have a safe place to keep the two semispace buffers alive for the
/// life of the process.
struct Heap {
    fromspace: Vec<u8>,
    tospace: Vec<u8>,
    fromspace_base: i64,
    tospace_base: i64,
    space_size: usize,
    rootstack: Vec<u8>,
}

static HEAP: Mutex<Option<Heap>> = Mutex::new(None);

/// Bump allocation pointer, read by emitted code as `free_ptr(%rip)` and
/// advanced by the `allocate` stub `add_allocate` appends (spec.md §6).
#[no_mangle]
pub static mut free_ptr: i64 = 0;

/// First address past the current fromspace, read by `allocate` to
/// decide whether a collection is needed.
#[no_mangle]
pub static mut fromspace_end: i64 = 0;

/// Fixed base of the root stack; `r15` is initialized to this value in
/// every `main` prelude (spec.md §4.8) and never reset to it again.
#[no_mangle]
pub static mut rootstack_begin: i64 = 0;

fn as_ptr(addr: i64) -> *mut u8 {
    addr as *mut u8
}

fn read_i64(addr: i64) -> i64 {
    unsafe { (as_ptr(addr) as *const i64).read_unaligned() }
}

fn write_i64(addr: i64, value: i64) {
    unsafe { (as_ptr(addr) as *mut i64).write_unaligned(value) }
}

/// Decodes a vector tag (spec.md §4.5): `(length, pointer_mask)`.
/// The forwarding bit (bit 0) is not returned; callers that reach this
/// function already know the word is a tag, not a forwarding pointer.
pub fn decode_tag(tag: i64) -> (u32, u64) {
    let bits = tag as u64;
    let length = ((bits >> 1) & 0x3f) as u32;
    let pointer_mask = (bits >> 7) & ((1u64 << length) - 1).max(0);
    (length, pointer_mask)
}

/// Encodes a vector tag from a field length and pointer mask (bit `i`
/// set iff field `i` is itself a tuple). Forwarding bit is always set.
pub fn encode_tag(length: u32, pointer_mask: u64) -> i64 {
    let mut tag: u64 = pointer_mask << 7;
    tag |= (length as u64) << 1;
    tag |= 1;
    tag as i64
}

/// Sets up both semispaces and the root stack. Called once, from the
/// `main` prelude, before any allocation.
#[no_mangle]
pub extern "C" fn initialize(root_stack_size: i64, heap_size: i64) {
    if heap_size <= 8 || root_stack_size <= 0 {
        RuntimeError::InvalidConfiguration {
            heap_size,
            root_stack_size,
        }
        .abort();
    }

    let space_size = heap_size as usize;
    let mut fromspace = vec![0u8; space_size];
    let tospace = vec![0u8; space_size];
    let mut rootstack = vec![0u8; root_stack_size as usize];

    let fromspace_base = fromspace.as_mut_ptr() as i64;
    let tospace_base = tospace.as_ptr() as i64;
    let rootstack_base = rootstack.as_mut_ptr() as i64;

    unsafe {
        free_ptr = fromspace_base;
        fromspace_end = fromspace_base + space_size as i64;
        rootstack_begin = rootstack_base;
    }

    *HEAP.lock().unwrap() = Some(Heap {
        fromspace,
        tospace,
        fromspace_base,
        tospace_base,
        space_size,
        rootstack,
    });
}

/// Runs a full collection. `rootstack_top` is the current value of
/// `r15` (the address one past the last live root slot); roots live in
/// `[rootstack_begin, rootstack_top)`.
#[no_mangle]
pub extern "C" fn collect(rootstack_top: i64) {
    let mut guard = HEAP.lock().unwrap();
    let heap = guard.as_mut().expect("collect called before initialize");

    let fromspace_base = heap.fromspace_base;
    let fromspace_limit = fromspace_base + heap.space_size as i64;
    let tospace_base = heap.tospace_base;

    let in_fromspace = |addr: i64| addr >= fromspace_base && addr < fromspace_limit;

    // `next_free` is the Cheney allocation pointer into tospace; `scan`
    // trails it across objects whose fields still need forwarding.
    let mut next_free = tospace_base;

    let mut forward = |addr: i64, next_free: &mut i64| -> i64 {
        if !in_fromspace(addr) {
            return addr;
        }
        let tag = read_i64(addr);
        if tag & 1 == 0 {
            // Already forwarded: the word we just read *is* the new address.
            return tag;
        }
        let (length, _) = decode_tag(tag);
        let size = 8 * (1 + length as i64);
        let new_addr = *next_free;
        unsafe {
            std::ptr::copy_nonoverlapping(as_ptr(addr), as_ptr(new_addr), size as usize);
        }
        write_i64(addr, new_addr); // overwrite the old tag with a forwarding pointer
        *next_free += size;
        new_addr
    };

    let rootstack_begin_addr = unsafe { rootstack_begin };
    let mut slot = rootstack_begin_addr;
    while slot < rootstack_top {
        let val = read_i64(slot);
        if val != 0 {
            write_i64(slot, forward(val, &mut next_free));
        }
        slot += 8;
    }

    let mut scan = tospace_base;
    while scan < next_free {
        let tag = read_i64(scan);
        let (length, pointer_mask) = decode_tag(tag);
        for i in 0..length {
            if pointer_mask & (1 << i) != 0 {
                let field_addr = scan + 8 * (1 + i as i64);
                let field = read_i64(field_addr);
                if field != 0 {
                    write_i64(field_addr, forward(field, &mut next_free));
                }
            }
        }
        scan += 8 * (1 + length as i64);
    }

    std::mem::swap(&mut heap.fromspace, &mut heap.tospace);
    heap.fromspace_base = tospace_base;
    heap.tospace_base = fromspace_base;

    unsafe {
        free_ptr = next_free;
        fromspace_end = heap.fromspace_base + heap.space_size as i64;
    }
}

/// `print_int` intrinsic called directly by generated code.
#[no_mangle]
pub extern "C" fn print_int(n: i64) {
    println!("{n}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn tag_round_trip() {
        let tag = encode_tag(3, 0b101);
        let (length, mask) = decode_tag(tag);
        assert_eq!(length, 3);
        assert_eq!(mask, 0b101);
        assert_eq!(tag & 1, 1, "forwarding bit must be set on a live tag");
    }

    #[test]
    #[serial]
    fn initialize_sets_globals() {
        initialize(256, 4096);
        unsafe {
            assert_ne!(free_ptr, 0);
            assert!(fromspace_end > free_ptr);
            assert_ne!(rootstack_begin, 0);
        }
    }

    #[test]
    #[serial]
    fn collect_preserves_a_live_tuple_and_reclaims_space() {
        initialize(256, 4096);

        // Hand-allocate one 1-field tuple (tag + one int field) as the
        // generated `allocate` stub would, then register it as a root.
        let base = unsafe { free_ptr };
        write_i64(base, encode_tag(1, 0)); // one int field, no pointers
        write_i64(base + 8, 99);
        unsafe {
            free_ptr = base + 16;
        }

        let root_slot = unsafe { rootstack_begin };
        write_i64(root_slot, base);
        let rootstack_top = root_slot + 8;

        collect(rootstack_top);

        let new_base = read_i64(root_slot);
        assert_ne!(new_base, base, "live object must move to the other semispace");
        assert_eq!(read_i64(new_base + 8), 99, "field value survives collection");
    }
}

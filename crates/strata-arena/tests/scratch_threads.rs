//! Integration test: scratch arenas are private to each thread.
//!
//! Several threads install their own context and hammer nested scratch
//! checkpoints. Each thread checks that its data survives inner scratch
//! use and that every arena is back to empty when its checkpoints end.

use std::ptr;
use std::thread;

use strata_arena::{scratch, Arena, ThreadContext};
use strata_vm::page_size;

const THREADS: usize = 8;
const ROUNDS: usize = 200;

/// Fill `len` bytes from `scratch` with `tag`, call a nested helper that
/// uses the other scratch arena, and check the bytes survived.
fn nested_round(tag: u8, len: usize) {
    let Some(outer) = scratch(&[]) else {
        panic!("context missing");
    };
    let buf = outer.push(len);
    unsafe { ptr::write_bytes(buf.as_ptr(), tag, len) };

    inner_work(outer.arena(), tag.wrapping_add(1), len * 2);

    let bytes = unsafe { std::slice::from_raw_parts(buf.as_ptr(), len) };
    assert!(bytes.iter().all(|&b| b == tag));
}

fn inner_work(conflict: &Arena, tag: u8, len: usize) {
    let Some(inner) = scratch(&[conflict]) else {
        panic!("context missing");
    };
    assert!(!ptr::eq(inner.arena(), conflict));
    let buf = inner.push(len);
    unsafe { ptr::write_bytes(buf.as_ptr(), tag, len) };
}

#[test]
fn scratch_is_private_per_thread() {
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            thread::spawn(move || {
                ThreadContext::with_capacity(256 * page_size()).install();
                for round in 0..ROUNDS {
                    nested_round((t * 31 + round) as u8, 64 + round * 8);
                }

                let ctx = ThreadContext::uninstall().expect("installed above");
                for arena in ctx.arenas() {
                    assert_eq!(arena.used(), 0);
                    assert_eq!(arena.committed(), page_size());
                }
            })
        })
        .collect();

    for h in handles {
        h.join().expect("scratch thread panicked");
    }
}

#[test]
fn pushes_into_caller_arena_survive_callee_scratch() {
    thread::spawn(|| {
        ThreadContext::with_capacity(64 * page_size()).install();

        let result = Arena::new(16 * page_size());
        let values = result.push_array::<u64>(16);
        {
            let s = scratch(&[&result]).expect("context installed");
            let tmp = s.push_array::<u64>(1024);
            for i in 0..16 {
                unsafe { *tmp.as_ptr().add(i) = i as u64 * 3 };
            }
            for i in 0..16 {
                unsafe { *values.as_ptr().add(i) = *tmp.as_ptr().add(i) };
            }
        }
        let got = unsafe { std::slice::from_raw_parts(values.as_ptr(), 16) };
        assert_eq!(got[15], 45);
        assert_eq!(result.used(), 16 * 8);

        ThreadContext::uninstall();
    })
    .join()
    .expect("thread panicked");
}

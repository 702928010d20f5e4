//! Integration test: a full init → work → terminate cycle through the
//! facade, the way an application uses it.

use std::sync::{Mutex, PoisonError};

use crossbeam_channel::unbounded;
use strata::prelude::*;
use strata::types::ThreadConfig;

static SERIAL: Mutex<()> = Mutex::new(());

fn config() -> CoreConfig {
    CoreConfig {
        threads: ThreadConfig {
            thread_pool_capacity: 8,
            mutex_pool_capacity: 8,
        },
        ..CoreConfig::default()
    }
}

#[test]
fn workers_share_a_counter_under_a_strata_mutex() {
    let _g = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
    strata::init(config()).unwrap();

    let lock = strata::mutex::create();
    let (tx, rx) = unbounded::<u64>();
    let (result_tx, result_rx) = unbounded::<u64>();

    // One accumulator thread owns the total; workers feed it.
    let accumulator = strata::thread::spawn(move || {
        let total: u64 = rx.iter().sum();
        result_tx.send(total).unwrap();
    });

    let workers: Vec<_> = (1..=6u64)
        .map(|id| {
            let tx = tx.clone();
            strata::thread::spawn(move || {
                let tmp = scratch(&[]).expect("worker has a context");
                let values = tmp.push_array::<u64>(100);
                for i in 0..100 {
                    unsafe { *values.as_ptr().add(i) = id };
                }
                let local: u64 = (0..100).map(|i| unsafe { *values.as_ptr().add(i) }).sum();

                assert!(strata::mutex::lock(lock));
                tx.send(local).unwrap();
                assert!(strata::mutex::unlock(lock));
            })
        })
        .collect();
    drop(tx);

    for w in workers {
        assert!(strata::thread::join(w));
    }
    assert!(strata::thread::join(accumulator));
    assert_eq!(result_rx.recv().unwrap(), 100 * (1 + 2 + 3 + 4 + 5 + 6));

    assert!(strata::mutex::destroy(lock));
    strata::terminate();
}

#[test]
fn exhaustion_is_not_fatal() {
    let _g = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
    strata::init(config()).unwrap();

    let held: Vec<_> = (0..8).map(|_| strata::mutex::create()).collect();
    assert!(held.iter().all(|h| !h.is_invalid()));
    assert!(strata::mutex::create().is_invalid());

    let (tx, rx) = unbounded::<()>();
    let blocked: Vec<_> = (0..8)
        .map(|_| {
            let rx = rx.clone();
            strata::thread::spawn_without_context(move || {
                let _ = rx.recv();
            })
        })
        .collect();
    assert!(strata::thread::spawn(|| {}).is_invalid());

    drop(tx);
    for h in blocked {
        assert!(strata::thread::join(h));
    }
    // Leftover mutexes are cleaned up by terminate.
    strata::terminate();
    assert!(!strata::is_initialized());
}

#[test]
fn main_thread_scratch_lives_between_init_and_terminate() {
    let _g = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
    assert!(scratch(&[]).is_none());
    strata::init(config()).unwrap();
    {
        let a = scratch(&[]).unwrap();
        let b = scratch(&[a.arena()]).unwrap();
        assert!(!std::ptr::eq(a.arena(), b.arena()));
    }
    strata::terminate();
    assert!(scratch(&[]).is_none());
}

//! Lists and pools shared between threads

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use strata_memory::list::List;
use strata_memory::pool::PoolRegistry;

#[test]
fn acquired_list_blocks_other_threads() {
    let pool = PoolRegistry::new().create_root().unwrap();
    let list = List::<u32>::stack(&pool).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let mut guard = list.acquire();
    let writer = {
        let list = list.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            list.push(99).unwrap();
            done.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!done.load(Ordering::SeqCst));
    guard.push(1).unwrap();
    guard.push(2).unwrap();
    guard.release();

    writer.join().unwrap();
    assert!(done.load(Ordering::SeqCst));
    assert_eq!(list.entries_copy(), vec![1, 2, 99]);
}

#[test]
fn concurrent_appends_are_all_kept() {
    const THREADS: u32 = 8;
    const PER_THREAD: u32 = 200;

    let pool = PoolRegistry::new().create_root().unwrap();
    let list = List::<u32>::new(&pool).unwrap();
    let start = Arc::new(Barrier::new(THREADS as usize));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let list = list.clone();
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for i in 0..PER_THREAD {
                    list.new_entry(|e| *e = t * PER_THREAD + i).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut values = list.entries_copy();
    values.sort_unstable();
    assert_eq!(values, (0..THREADS * PER_THREAD).collect::<Vec<_>>());
}

#[test]
fn free_while_other_threads_write() {
    let registry = PoolRegistry::new();
    let pool = registry.create_root().unwrap();
    let lists: Vec<List<u64>> = (0..4).map(|_| List::new(&pool).unwrap()).collect();
    let start = Arc::new(Barrier::new(lists.len() + 1));

    let handles: Vec<_> = lists
        .iter()
        .cloned()
        .map(|list| {
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                // Writes either land or observe the freed list; never both.
                for i in 0..1_000 {
                    if list.new_entry(|e| *e = i).is_err() {
                        assert!(!list.is_valid());
                        break;
                    }
                }
            })
        })
        .collect();

    start.wait();
    pool.free();
    for handle in handles {
        handle.join().unwrap();
    }

    for list in &lists {
        assert!(!list.is_valid());
        assert!(list.entries_copy().is_empty());
    }
    // only the master remains
    assert_eq!(registry.live_pools(), 1);
}

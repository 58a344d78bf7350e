//! Process-wide cleanup registry

use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use strata_memory::cleanup::{self, CleanupRegistry};
use strata_memory::list::List;
use strata_memory::pool::PoolRegistry;

#[test]
fn global_registry_releases_pools_once() {
    let registry = PoolRegistry::new();
    let pool = registry.create_root().unwrap();
    let list = List::<u16>::new(&pool).unwrap();
    list.new_entry(|e| *e = 3).unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    let first = Arc::clone(&order);
    let last = Arc::clone(&order);
    cleanup::push(move || first.lock().push("first")).unwrap();
    cleanup::push_pool(pool.clone()).unwrap();
    cleanup::push_with("last", move |tag| last.lock().push(tag)).unwrap();
    assert_eq!(cleanup::global().len(), 3);

    assert_eq!(cleanup::run(), 3);
    assert_eq!(cleanup::run(), 0);

    assert_eq!(*order.lock(), vec!["last", "first"]);
    assert!(!pool.is_valid());
    assert!(!list.is_valid());
    assert!(cleanup::global().has_run());
    assert!(cleanup::push(|| {}).is_err());
}

#[test]
fn concurrent_run_invokes_actions_once() {
    let cleanup = Arc::new(CleanupRegistry::new());
    let hits = Arc::new(Mutex::new(0u32));
    for _ in 0..16 {
        let hits = Arc::clone(&hits);
        cleanup.push(move || *hits.lock() += 1).unwrap();
    }

    let runs: Vec<_> = (0..4)
        .map(|_| {
            let cleanup = Arc::clone(&cleanup);
            std::thread::spawn(move || cleanup.run())
        })
        .collect();
    let total: usize = runs.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(total, 16);
    assert_eq!(*hits.lock(), 16);
}

#[cfg(unix)]
#[test]
fn interrupt_handler_installs_once() {
    assert_eq!(cleanup::install_interrupt_handler(), Ok(()));
    assert_eq!(cleanup::install_interrupt_handler(), Ok(()));
}

//! List behaviour through the public API

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;
use strata_memory::list::{List, ListConfig, ListKind};
use strata_memory::pool::PoolRegistry;
use strata_memory::{MemoryError, Pool};

fn root() -> Pool {
    PoolRegistry::new().create_root().unwrap()
}

fn list_of(values: &[i32]) -> List<i32> {
    let list = List::new(&root()).unwrap();
    for &v in values {
        list.new_entry(|e| *e = v).unwrap();
    }
    list
}

#[test]
fn remove_from_ten_entries() {
    let pool = root();
    let list = List::<i32>::with_config(&pool, ListConfig::default().with_step(16)).unwrap();
    for i in 0..10 {
        assert_eq!(list.new_entry(|e| *e = i).unwrap(), i as usize);
    }

    list.remove_index(9).unwrap();
    assert_eq!(list.len(), 9);
    assert_eq!(list.get(8), Some(8));

    list.remove_index(2).unwrap();
    assert_eq!(list.len(), 8);
    assert!(!list.entries_copy().contains(&2));
    assert_eq!(list.entries_copy(), vec![0, 1, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn list_lives_in_a_private_subpool() {
    let pool = root();
    let list = List::<u64>::new(&pool).unwrap();
    list.new_entry(|e| *e = 1).unwrap();

    let backing = list.pool();
    assert_ne!(backing, pool);
    assert_eq!(backing.parent(), Some(pool.clone()));
    assert_eq!(pool.children(), vec![backing]);
    assert!(pool.allocations().is_empty());
}

#[rstest]
#[case(ListKind::Fifo, vec![10, 20, 30])]
#[case(ListKind::Stack, vec![30, 20, 10])]
fn pop_order(#[case] kind: ListKind, #[case] expected: Vec<i64>) {
    let list = List::<i64>::with_kind(&root(), kind).unwrap();
    for v in [10, 20, 30] {
        list.push(v).unwrap();
    }
    let popped: Vec<i64> = std::iter::from_fn(|| list.pop().unwrap()).collect();
    assert_eq!(popped, expected);
    assert!(list.is_empty());
}

#[test]
fn fifo_interleaved_push_pop() {
    let list = List::<u32>::fifo(&root()).unwrap();
    list.push(1).unwrap();
    list.push(2).unwrap();
    assert_eq!(list.pop().unwrap(), Some(1));
    list.push(3).unwrap();
    assert_eq!(list.pop().unwrap(), Some(2));
    assert_eq!(list.pop().unwrap(), Some(3));
    assert_eq!(list.pop().unwrap(), None);
}

#[test]
fn copy_does_not_alias() {
    let source = list_of(&[5, 6, 7]);
    let target_pool = root();
    let copy = source.copy(&target_pool).unwrap();

    copy.with_entries_mut(|e| e[0] = 50).unwrap();
    source.new_entry(|e| *e = 8).unwrap();

    assert_eq!(source.entries_copy(), vec![5, 6, 7, 8]);
    assert_eq!(copy.entries_copy(), vec![50, 6, 7]);
    assert_eq!(copy.pool().parent(), Some(target_pool));
}

#[test]
fn copy_of_destroyed_list_fails() {
    let list = list_of(&[1]);
    list.destroy();
    assert_eq!(list.copy(&root()).unwrap_err(), MemoryError::ListFreed);
}

#[test]
fn clones_share_state() {
    let list = list_of(&[1, 2]);
    let other = list.clone();
    other.remove_index(0).unwrap();
    assert_eq!(list.entries_copy(), vec![2]);
}

#[test]
fn buffer_shrunk_behind_the_list_errors_instead_of_panicking() {
    let pool = root();
    let list = List::<u64>::with_config(&pool, ListConfig::stack().with_step(16)).unwrap();
    for i in 0..12 {
        list.push(i).unwrap();
    }
    let backing = list.pool();
    let (buffer, len) = backing.allocations()[0];
    assert_eq!(len, 16 * 8);
    backing.reallocate(Some(buffer), 16).unwrap();

    let rejected = |e: &MemoryError| {
        matches!(e, MemoryError::InvalidOperation { .. } | MemoryError::NotTracked { .. })
    };
    assert!(list.remove_index(0).is_err_and(|e| rejected(&e)));
    assert!(list.pop().is_err_and(|e| rejected(&e)));
    assert!(list.push(99).is_err_and(|e| rejected(&e)));
    assert_eq!(list.len(), 12);
}

#[test]
fn freeing_the_pool_tree_invalidates_lists() {
    let registry = PoolRegistry::new();
    let pool = registry.create_root().unwrap();
    let list = List::<u8>::stack(&pool).unwrap();
    list.push(1).unwrap();

    registry.cleanup_all();

    assert!(!list.is_valid());
    assert!(list.entries_copy().is_empty());
    assert_eq!(list.push(2), Err(MemoryError::ListFreed));
    assert_eq!(list.pop(), Err(MemoryError::ListFreed));
}

proptest! {
    #[test]
    fn remove_index_matches_vec(values in prop::collection::vec(any::<i32>(), 0..40), index in 0usize..50) {
        let list = list_of(&values);
        let mut expected = values.clone();
        let removed = list.remove_index(index).unwrap();
        if index < expected.len() {
            expected.remove(index);
        }
        prop_assert_eq!(removed, index < values.len());
        prop_assert_eq!(list.entries_copy(), expected);
    }

    #[test]
    fn remove_before_matches_vec(values in prop::collection::vec(any::<i32>(), 0..40), index in 0usize..50) {
        let list = list_of(&values);
        let expected = if index < values.len() { values[index..].to_vec() } else { values.clone() };
        list.remove_before_index(index).unwrap();
        prop_assert_eq!(list.entries_copy(), expected);
    }

    #[test]
    fn remove_after_matches_vec(values in prop::collection::vec(any::<i32>(), 0..40), index in 0usize..50) {
        let list = list_of(&values);
        let expected = if index < values.len() { values[..=index].to_vec() } else { values.clone() };
        list.remove_after_index(index).unwrap();
        prop_assert_eq!(list.entries_copy(), expected);
    }

    #[test]
    fn capacity_grows_in_steps(count in 0usize..100, step in 1usize..20) {
        let list = List::<u16>::with_config(&root(), ListConfig::default().with_step(step)).unwrap();
        for _ in 0..count {
            list.new_entry(|_| {}).unwrap();
        }
        prop_assert_eq!(list.len(), count);
        prop_assert_eq!(list.capacity(), count.div_ceil(step) * step);
    }
}

//! Integration test: lifecycle laws of `VirtualVec`.
//!
//! Covers pointer stability across growth, clear-and-refill reuse, deep
//! copies, bounds-checked access, teardown order, and failure atomicity,
//! using both the OS allocator and the recording allocator.

use std::collections::HashSet;

use virtmem_test_utils::{DropLog, PageOp, Person, RecordingPages, POISON};
use virtmem_vec::{
    CloneCapacity, Exponential, Linear, PageError, ScrubPolicy, VecConfig, VecError, VirtualVec,
};

const PAGE: usize = RecordingPages::DEFAULT_PAGE_SIZE;

fn people() -> Vec<Person> {
    vec![
        Person::new("Ada Lovelace", 1815),
        Person::new("Charles Babbage", 1791),
        Person::new("Grace Hopper", 1906),
        Person::new("Alan Turing", 1912),
    ]
}

// ── Pointer stability ───────────────────────────────────────────

#[test]
fn references_survive_many_commit_steps() {
    let v: VirtualVec<Person> = VirtualVec::with_capacity(200_000).unwrap();
    let mut held = Vec::new();
    for i in 0..100_000u32 {
        let p = v.push(Person::new("p", i)).unwrap();
        if i % 997 == 0 {
            held.push((p, p as *const Person, i));
        }
    }
    for (p, addr, year) in held {
        assert_eq!(p as *const Person, addr);
        assert_eq!(p.birth_year, year);
    }
    assert!(v.committed_bytes() < v.reserved_bytes());
}

#[test]
fn addresses_are_distinct_and_contiguous() {
    let v: VirtualVec<u64, Exponential> =
        VirtualVec::with_config(VecConfig::new(50_000)).unwrap();
    let addrs: Vec<usize> = (0..50_000u64)
        .map(|i| v.push(i).unwrap() as *const u64 as usize)
        .collect();
    let unique: HashSet<_> = addrs.iter().collect();
    assert_eq!(unique.len(), addrs.len());
    assert!(addrs.windows(2).all(|w| w[1] - w[0] == 8));
}

// ── Clear and reuse ─────────────────────────────────────────────

#[test]
fn clear_then_refill_reproduces_sequence() {
    let mut v: VirtualVec<Person> = VirtualVec::with_capacity(1_000).unwrap();
    v.try_extend(people()).unwrap();
    let first_round: Vec<Person> = v.to_vec();
    v.clear();
    assert!(v.is_empty());
    assert_eq!(v.committed_bytes(), 0);
    assert!(v.is_reserved());
    v.try_extend(people()).unwrap();
    assert_eq!(v, first_round);
}

#[test]
fn cleared_pages_are_decommitted_and_poisoned() {
    let pages = RecordingPages::default();
    let mut v: VirtualVec<u8, Linear, _> =
        VirtualVec::with_config_in(VecConfig::new(3 * PAGE), pages.clone()).unwrap();
    v.try_extend(std::iter::repeat_n(1, 2 * PAGE + 1)).unwrap();
    let base = v.as_ptr();
    v.clear();
    assert_eq!(pages.committed_bytes(), 0);
    // The recording allocator poisons decommitted memory.
    // SAFETY: the recording allocator keeps the bytes addressable.
    assert_eq!(unsafe { *base }, POISON);
    v.push(5).unwrap();
    assert_eq!(v[0], 5);
}

// ── Copies ──────────────────────────────────────────────────────

#[test]
fn copy_is_deep() {
    let mut original: VirtualVec<Person> = VirtualVec::with_capacity(64).unwrap();
    original.try_extend(people()).unwrap();
    let mut copy = original.clone();
    assert_eq!(copy, original);

    copy[0].name.clear();
    copy.push(Person::new("Edsger Dijkstra", 1930)).unwrap();
    original.at_mut(1).unwrap().birth_year = 0;

    assert_eq!(original[0].name, "Ada Lovelace");
    assert_eq!(original.len(), 4);
    assert_eq!(copy[1].birth_year, 1791);
    assert_eq!(copy.len(), 5);
}

#[test]
fn copy_capacity_modes() {
    let pages = RecordingPages::default();
    for (mode, expected_capacity) in [
        (CloneCapacity::Full, 10 * PAGE),
        (CloneCapacity::Committed, PAGE),
    ] {
        let config = VecConfig::new(10 * PAGE).with_clone_capacity(mode);
        let v: VirtualVec<u8, Linear, _> =
            VirtualVec::with_config_in(config, pages.clone()).unwrap();
        v.try_extend(0..100).unwrap();
        let copy = v.try_clone_bitwise().unwrap();
        assert_eq!(copy.capacity(), expected_capacity);
        assert_eq!(copy, v);
        assert_eq!(copy.committed_bytes(), PAGE);
    }
}

#[test]
fn moved_vector_keeps_its_buffer() {
    let mut v: VirtualVec<u32> = VirtualVec::with_capacity(1_024).unwrap();
    v.try_extend(0..100).unwrap();
    let base = v.as_ptr();
    let moved = v.take();
    let boxed = Box::new(moved);
    assert_eq!(boxed.as_ptr(), base);
    assert_eq!(boxed.len(), 100);
    assert!(!v.is_reserved());
    assert_eq!(
        v.push(1),
        Err(VecError::CapacityExceeded {
            requested: 1,
            capacity: 0
        })
    );
}

// ── Access ──────────────────────────────────────────────────────

#[test]
fn at_fails_exactly_past_the_end() {
    let v: VirtualVec<u16> = VirtualVec::with_capacity(100).unwrap();
    v.try_extend(0..40).unwrap();
    for i in 0..40 {
        assert_eq!(v.at(i), Ok(&(i as u16)));
    }
    for i in 40..200 {
        assert_eq!(v.at(i), Err(VecError::OutOfRange { index: i, len: 40 }));
    }
}

// ── Teardown ────────────────────────────────────────────────────

#[test]
fn teardown_order_is_elements_then_pages_then_release() {
    let pages = RecordingPages::default();
    let log = DropLog::new();
    {
        let v: VirtualVec<_, Exponential, _> =
            VirtualVec::with_config_in(VecConfig::new(1_000), pages.clone()).unwrap();
        for id in 0..300 {
            v.push(log.track(id)).unwrap();
        }
        pages.clear_ops();
    }
    assert_eq!(log.dropped(), (0..300).collect::<Vec<u32>>());
    let ops = pages.ops();
    assert!(matches!(ops.last(), Some(PageOp::Release { .. })));
    assert!(ops[..ops.len() - 1]
        .iter()
        .all(|op| matches!(op, PageOp::Decommit { .. })));
    assert_eq!(pages.live_reservations(), 0);
}

#[test]
fn teardown_survives_decommit_failures() {
    let pages = RecordingPages::default();
    {
        let v: VirtualVec<u32, Linear, _> =
            VirtualVec::with_config_in(VecConfig::new(4 * PAGE), pages.clone()).unwrap();
        v.try_extend(0..3 * PAGE as u32).unwrap();
        pages.fail_decommits(true);
    }
    assert_eq!(pages.decommit_count(), 0);
    assert_eq!(pages.live_reservations(), 0);
}

// ── Failure atomicity ───────────────────────────────────────────

#[test]
fn refused_commit_changes_nothing() {
    let pages = RecordingPages::default();
    let v: VirtualVec<u64, Exponential, _> =
        VirtualVec::with_config_in(VecConfig::new(10 * PAGE), pages.clone()).unwrap();
    pages.fail_commits_after(2);
    let mut pushed = 0u64;
    let err = loop {
        match v.push(pushed) {
            Ok(_) => pushed += 1,
            Err(err) => break err,
        }
    };
    assert!(matches!(
        err,
        VecError::AllocationFailure(PageError::Commit { .. })
    ));
    // Two commits: 1 page then 2 pages.
    assert_eq!(v.committed_bytes(), 2 * PAGE);
    assert_eq!(v.len() as u64, pushed);
    assert_eq!(v.len(), 2 * PAGE / 8);
    assert!(v.iter().copied().eq(0..pushed));
}

#[test]
#[cfg(unix)]
fn lock_privilege_is_inert_on_unix() {
    let config = VecConfig::new(4_096).with_lock_privilege(true);
    let v: VirtualVec<u32> = VirtualVec::with_config(config).unwrap();
    v.try_extend(0..4_096).unwrap();
    assert_eq!(v.len(), 4_096);
}

#[test]
fn scrubbing_modes_keep_contents_intact() {
    for scrub in [
        ScrubPolicy::Never,
        ScrubPolicy::BeforeDecommit,
        ScrubPolicy::OnCommit,
    ] {
        let config = VecConfig::new(100_000).with_scrub(scrub);
        let mut v: VirtualVec<u32> = VirtualVec::with_config(config).unwrap();
        v.try_extend(0..50_000).unwrap();
        v.truncate(10);
        v.shrink_to_fit();
        assert!(v.iter().copied().eq(0..10));
        v.try_extend(10..20_000).unwrap();
        assert!(v.iter().copied().eq(0..20_000));
        v.clear();
        assert_eq!(v.committed_bytes(), 0);
    }
}

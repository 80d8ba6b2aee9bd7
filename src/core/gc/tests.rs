use rand::Rng;

use crate::{
  api::{write_reference, GcError, Reference, SlotCountLayout},
  core::gc::{Collector, RootSlot}
};

fn collector(capacity: usize) -> Collector {
  Collector::with_capacity(capacity, Box::new(SlotCountLayout))
      .expect("collector construction failed")
}

/// Fills a payload with a recognizable per-block pattern.
fn stamp(heap: &mut Collector, reference: Reference, seed: u8) {
  heap
      .payload_mut(reference)
      .expect("stamping a dead reference")
      .fill(seed);
}

fn assert_stamped(heap: &Collector, reference: Reference, seed: u8) {
  assert!(
    heap.payload(reference).unwrap().iter().all(|&byte| byte == seed),
    "payload contents changed across a collection"
  );
}


#[test]
fn zero_capacity_heap_is_rejected() {
  let outcome = Collector::with_capacity(0, Box::new(SlotCountLayout));
  assert!(matches!(outcome, Err(GcError::InvalidArgument(_))));
}

#[test]
fn allocations_are_sized_zeroed_and_disjoint() {
  let mut heap = collector(4096);

  let references: Vec<Reference> = (0..8)
      .map(|i| heap.allocate(24 + i, 0).unwrap())
      .collect();

  // At least the requested size, and zero-filled on handout.
  for (i, &reference) in references.iter().enumerate() {
    let payload = heap.payload(reference).unwrap();
    assert!(payload.len() >= 24 + i);
    assert!(payload.iter().all(|&byte| byte == 0));
  }

  // Disjoint: every block keeps its own pattern.
  for (i, &reference) in references.iter().enumerate() {
    stamp(&mut heap, reference, i as u8 + 1);
  }
  for (i, &reference) in references.iter().enumerate() {
    assert_stamped(&heap, reference, i as u8 + 1);
  }
}

#[test]
fn zero_size_allocation_fails_without_side_effects() {
  let mut heap = collector(1024);
  let reference = heap.allocate(100, 1).unwrap();
  assert!(heap.is_live(reference));

  let info_before  = heap.heap_info();
  let stats_before = heap.stats();

  assert_eq!(heap.allocate(0, 1), Err(GcError::InvalidArgument("zero-size allocation")));

  assert_eq!(heap.heap_info(), info_before);
  let stats_after = heap.stats();
  assert_eq!(stats_after.allocation_attempts, stats_before.allocation_attempts);
  assert_eq!(stats_after.allocation_failures, stats_before.allocation_failures);
}

#[test]
fn small_heap_scenario() {
  // A 1 KiB heap: a 100-byte allocation lands with at least 100 bytes accounted.
  let mut heap = collector(1024);
  let reference = heap.allocate(100, 1).unwrap();
  assert!(heap.is_live(reference));

  let info = heap.heap_info();
  assert!(info.used >= 100);
  assert_eq!(info.used + info.free, info.total);

  assert!(heap.allocate(0, 1).is_err());
  assert_eq!(heap.heap_info().used, info.used);
}

#[test]
fn unrooted_blocks_are_reclaimed_wholesale() {
  // Twenty objects of 1000..=2900 bytes in a 1 MiB heap, none rooted.
  let mut heap = collector(1024 * 1024);

  let mut requested = 0usize;
  for i in 0..20 {
    let size = 1000 + 100 * i;
    requested += size;
    heap.allocate(size, 0).unwrap();
  }
  assert!(heap.heap_info().used >= requested);

  let before = heap.stats();
  heap.collect().unwrap();
  let after = heap.stats();

  assert_eq!(after.collections, before.collections + 1);
  assert_eq!(after.objects_collected, before.objects_collected + 20);
  assert!(after.bytes_collected >= before.bytes_collected + requested as u64);
  assert_eq!(heap.heap_info().used, 0);
}

#[test]
fn rooted_block_survives_until_unrooted() {
  let mut heap = collector(8192);

  let precious = heap.allocate(128, 0).unwrap();
  stamp(&mut heap, precious, 0x5A);

  let root = RootSlot::holding(precious);
  heap.add_root(&root, Some("precious")).unwrap();

  for _ in 0..10 {
    heap.allocate(64, 0).unwrap();
  }

  heap.collect().unwrap();
  assert!(heap.is_live(precious));
  assert_stamped(&heap, precious, 0x5A);

  heap.remove_root(&root).unwrap();
  heap.collect().unwrap();
  assert!(!heap.is_live(precious));
  assert!(matches!(heap.payload(precious), Err(GcError::InvalidArgument(_))));

  // The space is reusable: a large allocation fits again.
  assert!(heap.allocate(4096, 0).is_ok());
}

#[test]
fn reference_graphs_survive_through_their_roots() {
  let mut heap = collector(16 * 1024);

  // parent -> (left, right), right -> leaf. Tags count leading reference slots.
  let leaf   = heap.allocate(32, 0).unwrap();
  let right  = heap.allocate(32, 1).unwrap();
  let left   = heap.allocate(32, 0).unwrap();
  let parent = heap.allocate(32, 2).unwrap();

  write_reference(heap.payload_mut(right).unwrap(), 0, Some(leaf));
  write_reference(heap.payload_mut(parent).unwrap(), 0, Some(left));
  write_reference(heap.payload_mut(parent).unwrap(), 8, Some(right));

  let root = RootSlot::holding(parent);
  heap.add_root(&root, Some("graph")).unwrap();

  heap.collect().unwrap();
  for reference in [parent, left, right, leaf] {
    assert!(heap.is_live(reference));
  }

  // Severing the right edge strands right and leaf at the next cycle.
  write_reference(heap.payload_mut(parent).unwrap(), 8, None);
  heap.collect().unwrap();
  assert!(heap.is_live(left));
  assert!(!heap.is_live(right));
  assert!(!heap.is_live(leaf));
}

#[test]
fn collection_is_idempotent_without_new_garbage() {
  let mut heap = collector(8192);
  for _ in 0..16 {
    heap.allocate(64, 0).unwrap();
  }

  heap.collect().unwrap();
  let once = heap.stats();
  assert_eq!(once.objects_collected, 16);

  heap.collect().unwrap();
  let twice = heap.stats();
  assert_eq!(twice.collections, once.collections + 1);
  assert_eq!(twice.objects_collected, once.objects_collected);
  assert_eq!(twice.bytes_collected, once.bytes_collected);
}

#[test]
fn accounting_invariant_holds_throughout() {
  let mut heap = collector(4096);
  let total = heap.heap_info().total;

  let mut kept = Vec::new();
  for i in 0..12 {
    let reference = heap.allocate(48 + 16 * (i % 3), 0).unwrap();
    if i % 2 == 0 {
      let slot = RootSlot::holding(reference);
      heap.add_root(&slot, None).unwrap();
      kept.push(slot);
    }
    let info = heap.heap_info();
    assert_eq!(info.used + info.free, total);
  }

  heap.collect().unwrap();
  let info = heap.heap_info();
  assert_eq!(info.used + info.free, total);

  heap.compact().unwrap();
  let info = heap.heap_info();
  assert_eq!(info.used + info.free, total);
}

#[test]
fn threshold_drives_the_pressure_check() {
  let mut heap = collector(1024);

  heap.set_threshold(100);
  assert!(!heap.should_collect());

  // Fill the heap completely: at 100 the check trips only when nothing is free.
  heap.allocate(1024, 0).unwrap();
  assert_eq!(heap.heap_info().free, 0);
  assert!(heap.should_collect());

  heap.set_threshold(0);
  assert!(heap.should_collect()); // trivially under pressure

  // Clamped, not rejected.
  heap.set_threshold(200);
  assert_eq!(heap.threshold(), 100);
}

#[test]
fn half_full_heap_respects_the_default_threshold() {
  let mut heap = collector(2048);
  heap.allocate(512, 0).unwrap();
  // 25% occupancy is below the default threshold.
  assert!(!heap.should_collect());
  heap.allocate(1024, 0).unwrap();
  assert!(heap.should_collect());
}

#[test]
fn exhaustion_forces_one_collection_then_fails_loudly() {
  let mut heap = collector(1024);

  // Fill with garbage, then ask for more than a fresh heap could even hold.
  for _ in 0..4 {
    heap.allocate(192, 0).unwrap();
  }
  let before = heap.stats();

  // The forced collection reclaims everything, so this fits.
  let reference = heap.allocate(768, 0).unwrap();
  assert!(heap.is_live(reference));
  assert_eq!(heap.stats().collections, before.collections + 1);

  // Nothing can make room for this; the failure is an explicit, counted result.
  let outcome = heap.allocate(64 * 1024, 0);
  assert_eq!(outcome, Err(GcError::AllocationFailed { requested: 64 * 1024 }));
  assert_eq!(heap.stats().allocation_failures, before.allocation_failures + 1);
}

#[test]
fn disabled_collector_neither_collects_nor_retries() {
  let mut heap = collector(1024);
  heap.set_enabled(false);

  for _ in 0..4 {
    heap.allocate(192, 0).unwrap();
  }

  // Explicit collection is a no-op that reports success.
  heap.collect().unwrap();
  assert_eq!(heap.stats().collections, 0);
  assert_eq!(heap.heap_info().used, 4 * 192);

  // The allocation fallback is also off: exhaustion fails immediately.
  let outcome = heap.allocate(512, 0);
  assert_eq!(outcome, Err(GcError::AllocationFailed { requested: 512 }));
  assert_eq!(heap.stats().collections, 0);

  // Re-enabling restores the fallback path.
  heap.set_enabled(true);
  assert!(heap.allocate(512, 0).is_ok());
  assert_eq!(heap.stats().collections, 1);
}

#[test]
fn compaction_defragments_while_preserving_survivors() {
  let mut heap = collector(2048);

  // Alternate keepers and garbage so the free space ends up riddled with holes.
  let mut keepers = Vec::new();
  for i in 0..8 {
    let reference = heap.allocate(128, 0).unwrap();
    if i % 2 == 0 {
      stamp(&mut heap, reference, 0xC0 + i as u8);
      let slot = RootSlot::holding(reference);
      heap.add_root(&slot, None).unwrap();
      keepers.push((slot, reference, 0xC0 + i as u8));
    }
  }

  heap.compact().unwrap();

  for (_slot, reference, seed) in &keepers {
    assert!(heap.is_live(*reference));
    assert_stamped(&heap, *reference, *seed);
  }

  // Four 128-byte survivors in 2048 bytes: after compaction the rest is one
  // contiguous run, so a 1536-byte block fits.
  assert!(heap.allocate(1536, 0).is_ok());
}

#[test]
fn stats_are_monotone_and_pause_bounded() {
  let mut heap = collector(8192);
  for round in 0u64..5 {
    for _ in 0..8 {
      heap.allocate(64, 0).unwrap();
    }
    heap.collect().unwrap();
    let stats = heap.stats();
    assert_eq!(stats.collections, round + 1);
    assert!(stats.max_pause <= stats.total_pause);
  }
  assert_eq!(heap.stats().allocation_attempts, 40);
}

#[test]
fn duplicate_and_unknown_roots_are_recoverable_errors() {
  let mut heap = collector(1024);
  let reference = heap.allocate(32, 0).unwrap();
  let slot      = RootSlot::holding(reference);
  let stranger  = RootSlot::new();

  heap.add_root(&slot, Some("the one")).unwrap();
  assert_eq!(heap.add_root(&slot, Some("again")), Err(GcError::DuplicateRoot));
  assert_eq!(heap.remove_root(&stranger), Err(GcError::RootNotFound));
  assert_eq!(heap.root_count(), 1);

  // Neither failure disturbed the registered root.
  heap.collect().unwrap();
  assert!(heap.is_live(reference));
}

#[test]
fn randomized_churn_stays_within_capacity() {
  const HEAP_BYTES: usize = 64 * 1024;
  const ITERATIONS: usize = 1000;

  let mut heap = collector(HEAP_BYTES);
  let mut rng  = rand::thread_rng();
  let mut live: Vec<RootSlot> = Vec::new();

  for iteration in 1..=ITERATIONS {
    let reference = heap
        .allocate(64, 0)
        .expect("heap exhausted although the live set fits");
    let slot = RootSlot::holding(reference);
    heap.add_root(&slot, None).unwrap();
    live.push(slot);

    // Randomly drop references so the live set hovers well under capacity.
    if rng.gen_bool(0.5) && !live.is_empty() {
      let victim = live.swap_remove(rng.gen_range(0..live.len()));
      heap.remove_root(&victim).unwrap();
    }

    if iteration % 100 == 0 {
      heap.collect().unwrap();
      let info = heap.heap_info();
      assert_eq!(info.used + info.free, info.total);
    }
  }

  // A live set that cannot fit is a distinguishable failure, not a crash.
  let outcome = heap.allocate(2 * HEAP_BYTES, 0);
  assert!(matches!(outcome, Err(GcError::AllocationFailed { .. })));
}

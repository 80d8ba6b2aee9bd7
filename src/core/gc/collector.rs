/*!

The collector: one per virtual-machine instance, owning the arena, the root set, the mark
bitmap, and the statistics. All access to heap state goes through this type; no other
component mutates block records or list links.

The scheduling model is single-threaded and cooperative. A collection runs to completion on
the calling context; there is no background thread and no cancellation. Callers sharing one
collector across logical threads must serialize access externally; this type does not lock.

A cycle is `verify -> mark -> sweep -> (compact) -> finalize`. Verification and marking
mutate nothing but the out-of-line bitmap, so any failure before the sweep leaves the heap
in its pre-collection state; the sweep itself runs only against a heap that just passed
validation.

*/

use std::{
  cmp::max,
  time::Instant
};

use bit_set::BitSet;
use enumflags2::{bitflags, make_bitflags, BitFlags};

use crate::{
  api::{GcError, Reference, ReferenceLayout, TypeTag},
  core::gc::{
    arena::Arena,
    roots::{RootSet, RootSlot},
    stats::{GcStats, HeapInfo},
    tracer
  },
  debug,
  info
};

/// Collection is recommended once occupancy reaches this percentage, unless reconfigured.
pub const DEFAULT_THRESHOLD: u8 = 75;

#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum CollectorFlag {
  /// Collection may run. When absent, `collect` and the allocator's fallback collection
  /// are no-ops and allocation simply fails once the heap is exhausted.
  Enabled,
  /// A cycle is on the calling stack. Guards against reentrant collection.
  CollectionInProgress,
  /// Emit the statistics table through the log layer after every cycle.
  LogStats,
}

pub type CollectorFlags = BitFlags<CollectorFlag, u8>;

pub struct Collector {
  arena    : Arena,
  roots    : RootSet,
  marked   : BitSet,
  layout   : Box<dyn ReferenceLayout>,
  flags    : CollectorFlags,
  threshold: u8,
  stats    : GcStats,
}

impl Collector {
  /// Binds a collector to a fresh heap region of `capacity` bytes (rounded down to whole
  /// alignment units) and the object layer's reference layout. The heap region is released
  /// when the collector is dropped, at which point every outstanding reference and root
  /// slot is permanently dead.
  pub fn with_capacity(capacity: usize, layout: Box<dyn ReferenceLayout>) -> Result<Collector, GcError> {
    let arena = Arena::new(capacity);
    if arena.total() == 0 {
      return Err(GcError::InvalidArgument("heap capacity must be at least one alignment unit"));
    }

    Ok(Collector {
      arena,
      roots    : RootSet::new(),
      marked   : BitSet::new(),
      layout,
      flags    : make_bitflags!(CollectorFlag::{Enabled}),
      threshold: DEFAULT_THRESHOLD,
      stats    : GcStats::default(),
    })
  }

  // region Allocation

  /// Allocates `size` usable bytes tagged with `tag`. On exhaustion one collection is
  /// forced (if enabled) and the search retried exactly once before the request fails.
  pub fn allocate(&mut self, size: usize, tag: TypeTag) -> Result<Reference, GcError> {
    if size == 0 {
      return Err(GcError::InvalidArgument("zero-size allocation"));
    }
    if self.flags.contains(CollectorFlag::CollectionInProgress) {
      return Err(GcError::CollectionFailed("allocation requested during a collection cycle"));
    }

    self.stats.allocation_attempts += 1;

    if let Some(index) = self.arena.allocate(size, tag) {
      return Ok(self.arena.reference_to(index));
    }

    if self.flags.contains(CollectorFlag::Enabled) {
      debug!(2, "allocation of {} bytes forcing a collection", size);
      self.collect()?;
      if let Some(index) = self.arena.allocate(size, tag) {
        return Ok(self.arena.reference_to(index));
      }
    }

    self.stats.allocation_failures += 1;
    Err(GcError::AllocationFailed { requested: size })
  }

  /// The payload of a live block. A stale or foreign reference is a usage error.
  pub fn payload(&self, reference: Reference) -> Result<&[u8], GcError> {
    match self.arena.resolve(reference) {
      Some(index) => Ok(self.arena.payload(index)),
      None => Err(GcError::InvalidArgument("stale or foreign reference")),
    }
  }

  pub fn payload_mut(&mut self, reference: Reference) -> Result<&mut [u8], GcError> {
    match self.arena.resolve(reference) {
      Some(index) => Ok(self.arena.payload_mut(index)),
      None => Err(GcError::InvalidArgument("stale or foreign reference")),
    }
  }

  pub fn type_tag(&self, reference: Reference) -> Result<TypeTag, GcError> {
    match self.arena.resolve(reference) {
      Some(index) => Ok(self.arena.block(index).tag),
      None => Err(GcError::InvalidArgument("stale or foreign reference")),
    }
  }

  /// Whether `reference` currently resolves to a live block.
  pub fn is_live(&self, reference: Reference) -> bool {
    self.arena.resolve(reference).is_some()
  }

  // endregion

  // region Collection

  /// Runs one mark-and-sweep cycle. Invoked while a cycle is already running, or while the
  /// collector is disabled, this is a no-op that reports success.
  pub fn collect(&mut self) -> Result<(), GcError> {
    self.run_cycle(false)
  }

  /// Runs one cycle and then relocates the surviving blocks to be contiguous from the
  /// arena's start. References are stable handles, so every root and intra-object
  /// reference remains consistent across the relocation.
  pub fn compact(&mut self) -> Result<(), GcError> {
    self.run_cycle(true)
  }

  fn run_cycle(&mut self, compacting: bool) -> Result<(), GcError> {
    if self.flags.contains(CollectorFlag::CollectionInProgress) {
      // Reentrant invocation, e.g. from a callback during a root walk. Harmless no-op.
      return Ok(());
    }
    if !self.flags.contains(CollectorFlag::Enabled) {
      return Ok(());
    }

    self.flags.insert(CollectorFlag::CollectionInProgress);
    let outcome = self.run_cycle_inner(compacting);
    self.flags.remove(CollectorFlag::CollectionInProgress);
    outcome
  }

  fn run_cycle_inner(&mut self, compacting: bool) -> Result<(), GcError> {
    let started = Instant::now();
    debug!(2, "collection {} starting: {}", self.stats.collections + 1, self.heap_info());

    // Nothing mutates the heap until verification and marking have both succeeded.
    self.arena.verify()?;
    let live = tracer::mark(&self.arena, self.layout.as_ref(), &self.roots, &mut self.marked)?;

    let (reclaimed, reclaimed_bytes) = self.arena.sweep(&self.marked);
    if compacting {
      self.arena.compact();
    }
    self.marked.clear();

    let pause = started.elapsed();
    self.stats.collections += 1;
    self.stats.objects_collected += reclaimed as u64;
    self.stats.bytes_collected += reclaimed_bytes as u64;
    self.stats.total_pause += pause;
    self.stats.max_pause = max(self.stats.max_pause, pause);

    debug!(
      2,
      "collection {} finished: {} live, {} reclaimed ({} bytes)",
      self.stats.collections,
      live,
      reclaimed,
      reclaimed_bytes
    );
    if self.flags.contains(CollectorFlag::LogStats) {
      info!(1, "{}", self.stats);
    }

    Ok(())
  }

  // endregion

  // region Roots

  pub fn add_root(&mut self, slot: &RootSlot, description: Option<&str>) -> Result<(), GcError> {
    self.roots.add(slot, description)
  }

  pub fn remove_root(&mut self, slot: &RootSlot) -> Result<(), GcError> {
    self.roots.remove(slot)
  }

  pub fn root_count(&self) -> usize {
    self.roots.len()
  }

  // endregion

  // region Policy and introspection

  /// Pressure check only; no side effects. True when `used / total` has reached the
  /// occupancy threshold. At a threshold of 100 this is true only when the heap is
  /// completely full.
  pub fn should_collect(&self) -> bool {
    self.arena.used_bytes() * 100 >= self.threshold as usize * self.arena.total()
  }

  pub fn heap_info(&self) -> HeapInfo {
    HeapInfo {
      used : self.arena.used_bytes(),
      free : self.arena.free_bytes(),
      total: self.arena.total(),
    }
  }

  /// A copy of the statistics, never a live handle.
  pub fn stats(&self) -> GcStats {
    self.stats
  }

  /// Sets the occupancy threshold as a percentage, clamped to 0–100.
  pub fn set_threshold(&mut self, percentage: u8) {
    self.threshold = percentage.min(100);
  }

  pub fn threshold(&self) -> u8 {
    self.threshold
  }

  pub fn set_enabled(&mut self, enabled: bool) {
    if enabled {
      self.flags.insert(CollectorFlag::Enabled);
    } else {
      self.flags.remove(CollectorFlag::Enabled);
    }
  }

  pub fn is_enabled(&self) -> bool {
    self.flags.contains(CollectorFlag::Enabled)
  }

  pub fn set_log_stats(&mut self, log_stats: bool) {
    if log_stats {
      self.flags.insert(CollectorFlag::LogStats);
    } else {
      self.flags.remove(CollectorFlag::LogStats);
    }
  }

  /// Prints the state of the collector.
  #[cfg(feature = "gc_debug")]
  pub fn dump_state(&self) {
    let info = self.heap_info();

    eprintln!("╭─────────────────────────────────────────────╮");
    eprintln!("│{:<32} {:>12}│", "Variable", "Value");
    eprintln!("├─────────────────────────────────────────────┤");
    eprintln!("│{:<32} {:>12}│", "total_bytes", info.total);
    eprintln!("│{:<32} {:>12}│", "used_bytes", info.used);
    eprintln!("│{:<32} {:>12}│", "free_bytes", info.free);
    eprintln!("│{:<32} {:>12}│", "used_blocks", self.arena.used_count());
    eprintln!("│{:<32} {:>12}│", "slab_slots", self.arena.slot_count());
    eprintln!("│{:<32} {:>12}│", "roots", self.roots.len());
    eprintln!("│{:<32} {:>12}│", "threshold", self.threshold);
    eprintln!("│{:<32} {:>12}│", "enabled", self.is_enabled());
    eprintln!("│{:<32} {:>12}│", "collections", self.stats.collections);
    eprintln!("╰─────────────────────────────────────────────╯");
  }

  // endregion
}

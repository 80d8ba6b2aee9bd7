/*!

Cumulative collector statistics and the heap occupancy snapshot. Both are plain `Copy`
values: callers get a snapshot, never a live handle into the collector's bookkeeping.

*/

use std::{
  fmt::{Display, Formatter},
  time::Duration
};

/// Monotone counters for one collector's lifetime. Never reset except by destruction.
#[derive(Copy, Clone, Debug, Default)]
pub struct GcStats {
  /// Collection cycles run to completion.
  pub collections        : u64,
  /// Blocks reclaimed by sweeps.
  pub objects_collected  : u64,
  /// Bytes reclaimed by sweeps.
  pub bytes_collected    : u64,
  /// Time spent inside collection cycles, cumulative.
  pub total_pause        : Duration,
  /// The longest single cycle.
  pub max_pause          : Duration,
  /// Well-formed allocation requests, successful or not.
  pub allocation_attempts: u64,
  /// Requests that failed even after the forced collection retry.
  pub allocation_failures: u64,
}

impl Display for GcStats {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    writeln!(
      f,
      "{:<12} {:<10} {:<12} {:<12} {:<12} {:<10} {:<10}",
      "Collections",
      "Objects",
      "Bytes",
      "Pause (ms)",
      "Max (ms)",
      "Allocs",
      "Failures"
    )?;
    write!(
      f,
      "{:<12} {:<10} {:<12} {:<12.3} {:<12.3} {:<10} {:<10}",
      self.collections,
      self.objects_collected,
      self.bytes_collected,
      self.total_pause.as_secs_f64() * 1000.0,
      self.max_pause.as_secs_f64() * 1000.0,
      self.allocation_attempts,
      self.allocation_failures
    )
  }
}

/// A consistent snapshot of heap occupancy. `used + free == total` always.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HeapInfo {
  pub used : usize,
  pub free : usize,
  pub total: usize,
}

impl HeapInfo {
  /// Occupancy as a whole percentage, 0 for an empty (or zero-sized) heap.
  pub fn occupancy_percent(&self) -> usize {
    if self.total == 0 {
      0
    } else {
      self.used * 100 / self.total
    }
  }
}

impl Display for HeapInfo {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "used {} / {} bytes ({}%), {} free",
      self.used,
      self.total,
      self.occupancy_percent(),
      self.free
    )
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn heap_info_occupancy() {
    let info = HeapInfo { used: 512, free: 512, total: 1024 };
    assert_eq!(info.occupancy_percent(), 50);
    assert_eq!(info.used + info.free, info.total);

    let empty = HeapInfo { used: 0, free: 0, total: 0 };
    assert_eq!(empty.occupancy_percent(), 0);
  }

  #[test]
  fn stats_format_is_two_aligned_rows() {
    let stats = GcStats { collections: 3, bytes_collected: 4096, ..GcStats::default() };
    let text  = format!("{}", stats);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Collections"));
    assert!(lines[1].starts_with('3'));
  }
}

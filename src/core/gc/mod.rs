/*!

The garbage collected heap: an arena of handle-addressed blocks, an explicit root set, a
work-list tracer, and the collector that orchestrates them.

One collection cycle flows one direction: allocation pressure (or an explicit call) starts
the cycle, the tracer reads the root set and colors the out-of-line bitmap, the sweep
returns unmarked blocks to the free list and merges neighbors, and the statistics absorb
the result. All mutation funnels through `Collector`; the submodules never reach around it.

*/
mod arena;
mod block;
mod collector;
mod roots;
mod stats;
mod tracer;

#[cfg(test)]
mod tests;

pub use collector::{Collector, CollectorFlag, CollectorFlags, DEFAULT_THRESHOLD};
pub use roots::RootSlot;
pub use stats::{GcStats, HeapInfo};

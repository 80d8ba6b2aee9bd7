/*!

A mark-and-sweep garbage collected heap for a small embedded virtual machine.

The collector owns a private heap region, hands out stable generation-checked `Reference`
handles, tracks externally registered roots, and reclaims unreachable blocks on demand or
under occupancy pressure. The object/array/string layer stays outside: it asks for blocks
by size and type tag, and teaches the collector to walk its graphs through the
`ReferenceLayout` seam.

```
use vmheap::{Collector, RootSlot};
use vmheap::api::{write_reference, SlotCountLayout};

fn main() -> Result<(), vmheap::api::GcError> {
    let mut heap = Collector::with_capacity(64 * 1024, Box::new(SlotCountLayout))?;

    // A pair whose first slot references a leaf.
    let leaf = heap.allocate(16, 0)?;
    let pair = heap.allocate(16, 1)?;
    write_reference(heap.payload_mut(pair)?, 0, Some(leaf));

    let root = RootSlot::holding(pair);
    heap.add_root(&root, Some("interpreter stack"))?;

    heap.collect()?; // both blocks survive
    assert!(heap.is_live(leaf));

    heap.remove_root(&root)?;
    heap.collect()?; // both blocks are reclaimed
    assert!(!heap.is_live(pair));
    Ok(())
}
```

*/

pub mod abstractions;
pub mod api;
mod core;

// We re-export abstractions that are meant to be used publicly.
pub use abstractions::{log, IString};

pub use api::{GcError, Reference, ReferenceLayout, SlotCountLayout, TypeTag, REFERENCE_SIZE};
pub use crate::core::gc::{
  Collector,
  CollectorFlag,
  CollectorFlags,
  GcStats,
  HeapInfo,
  RootSlot,
  DEFAULT_THRESHOLD
};

/*!

The mark phase: a work-list flood fill from the root set through the object graph.

Marking is read-only with respect to the heap. The only thing written is the out-of-line
bitmap, which means a failed mark leaves the heap exactly as it found it; the sweep runs
only after the whole graph has been walked successfully. Recursion is deliberately absent:
deep lists and cyclic structures are everyday shapes for a virtual machine heap, and the
explicit work list makes both safe. Marking a block twice is a no-op, which is precisely
what terminates cycles.

*/

use bit_set::BitSet;

use crate::{
  api::{read_reference, GcError, ReferenceLayout, REFERENCE_SIZE},
  core::gc::{
    arena::Arena,
    block::BlockIndex,
    roots::RootSet
  },
  warning
};

/// Colors every block reachable from the root set. Returns the number of live blocks.
///
/// A root whose slot is cleared contributes nothing. A root holding a stale handle is
/// tolerated as null with a diagnostic, since the owner may legitimately have outlived its
/// referent across an earlier cycle. Inside payloads the rules are stricter: payloads are
/// zeroed on allocation and only the object layer writes them, so an offset past the
/// payload or a non-null word that does not resolve is corruption, not staleness.
pub(crate) fn mark(
  arena : &Arena,
  layout: &dyn ReferenceLayout,
  roots : &RootSet,
  marked: &mut BitSet,
) -> Result<usize, GcError> {
  marked.clear();

  let mut work_list: Vec<BlockIndex> = Vec::new();
  for entry in roots.iter() {
    let Some(reference) = entry.slot.get() else {
      continue;
    };
    match arena.resolve(reference) {
      Some(index) => work_list.push(index),
      None => {
        warning!(1, "root '{}' holds a dead reference; treated as null", entry.description);
      }
    }
  }

  let mut live = 0usize;
  while let Some(index) = work_list.pop() {
    if marked.contains(index as usize) {
      continue;
    }
    marked.insert(index as usize);
    live += 1;

    let tag     = arena.block(index).tag;
    let payload = arena.payload(index);

    let mut fault: Option<&'static str> = None;
    layout.enumerate_references(tag, payload, &mut |offset| {
      if fault.is_some() {
        return;
      }
      if offset + REFERENCE_SIZE > payload.len() {
        fault = Some("layout enumerated an offset past the payload");
        return;
      }
      let Some(reference) = read_reference(payload, offset) else {
        return;
      };
      match arena.resolve(reference) {
        Some(child) => work_list.push(child),
        None => fault = Some("payload holds an unresolvable reference"),
      }
    });

    if let Some(message) = fault {
      return Err(GcError::CollectionFailed(message));
    }
  }

  Ok(live)
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::{write_reference, SlotCountLayout};
  use crate::core::gc::roots::RootSlot;

  /// Builds `parent -> child` with the slot-count layout: one leading reference slot.
  fn link(arena: &mut Arena, parent: BlockIndex, child: BlockIndex) {
    let child_reference = arena.reference_to(child);
    write_reference(arena.payload_mut(parent), 0, Some(child_reference));
  }

  #[test]
  fn marks_transitively_and_tolerates_cycles() {
    let mut arena = Arena::new(4096);
    let a = arena.allocate(32, 1).unwrap();
    let b = arena.allocate(32, 1).unwrap();
    let c = arena.allocate(32, 0).unwrap();
    let orphan = arena.allocate(32, 0).unwrap();

    // a -> b, b -> a: a cycle, with c rooted separately.
    link(&mut arena, a, b);
    link(&mut arena, b, a);

    let mut roots = RootSet::new();
    roots.add(&RootSlot::holding(arena.reference_to(a)), Some("cycle")).unwrap();
    roots.add(&RootSlot::holding(arena.reference_to(c)), Some("leaf")).unwrap();

    let mut marked = BitSet::new();
    let live = mark(&arena, &SlotCountLayout, &roots, &mut marked).unwrap();

    assert_eq!(live, 3);
    assert!(marked.contains(a as usize));
    assert!(marked.contains(b as usize));
    assert!(marked.contains(c as usize));
    assert!(!marked.contains(orphan as usize));
  }

  #[test]
  fn cleared_and_stale_roots_contribute_nothing() {
    let mut arena = Arena::new(1024);
    let a = arena.allocate(32, 0).unwrap();
    let stale = arena.reference_to(a);

    let cleared = RootSlot::new();
    let mut roots = RootSet::new();
    roots.add(&cleared, Some("cleared")).unwrap();

    let mut marked = BitSet::new();
    assert_eq!(mark(&arena, &SlotCountLayout, &roots, &mut marked).unwrap(), 0);

    // Reclaim a and recycle its slot, then root the now-stale handle.
    arena.sweep(&BitSet::new());
    let _ = arena.allocate(32, 0).unwrap();
    roots.add(&RootSlot::holding(stale), Some("stale")).unwrap();
    assert_eq!(mark(&arena, &SlotCountLayout, &roots, &mut marked).unwrap(), 0);
  }

  #[test]
  fn unresolvable_payload_reference_is_corruption() {
    let mut arena = Arena::new(1024);
    let a = arena.allocate(32, 1).unwrap();

    // Forge a word that decodes but resolves to nothing.
    let forged = crate::api::Reference::new(999, 7);
    write_reference(arena.payload_mut(a), 0, Some(forged));

    let mut roots = RootSet::new();
    roots.add(&RootSlot::holding(arena.reference_to(a)), None).unwrap();

    let mut marked = BitSet::new();
    let outcome = mark(&arena, &SlotCountLayout, &roots, &mut marked);
    assert_eq!(outcome, Err(GcError::CollectionFailed("payload holds an unresolvable reference")));
  }
}

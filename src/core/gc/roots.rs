/*!

The root set: externally owned slots whose current reference values anchor reachability.

A `RootSlot` is a cheaply clonable shared cell. The owner keeps clones wherever it likes and
stores or clears the reference at will; the collector reads whatever the slot holds at mark
time, so a slot the owner has cleared simply contributes nothing. Identity is cell identity,
which is what makes "the same location is registered at most once" checkable without
addresses.

*/

use std::{
  cell::Cell,
  rc::Rc
};

use crate::{
  abstractions::IString,
  api::{GcError, Reference}
};

/// One externally owned reference-typed location. Clones share the same cell.
#[derive(Clone, Debug, Default)]
pub struct RootSlot {
  cell: Rc<Cell<Option<Reference>>>,
}

impl RootSlot {
  pub fn new() -> RootSlot {
    RootSlot { cell: Rc::new(Cell::new(None)) }
  }

  pub fn holding(reference: Reference) -> RootSlot {
    let slot = RootSlot::new();
    slot.set(reference);
    slot
  }

  #[inline(always)]
  pub fn set(&self, reference: Reference) {
    self.cell.set(Some(reference));
  }

  #[inline(always)]
  pub fn clear(&self) {
    self.cell.set(None);
  }

  #[inline(always)]
  pub fn get(&self) -> Option<Reference> {
    self.cell.get()
  }

  /// Cell identity, used as the registration key.
  #[inline(always)]
  fn key(&self) -> usize {
    Rc::as_ptr(&self.cell) as usize
  }
}

pub(crate) struct RootEntry {
  pub slot       : RootSlot,
  pub description: IString,
}

/// The registry of root slots. Roots impose no ordering constraint on each other, so a flat
/// vector with identity search is all that is needed; root sets are small.
pub(crate) struct RootSet {
  entries: Vec<RootEntry>,
}

impl RootSet {
  pub fn new() -> RootSet {
    RootSet { entries: Vec::new() }
  }

  /// Registers a slot. A missing description degrades to the empty atom rather than
  /// failing the registration.
  pub fn add(&mut self, slot: &RootSlot, description: Option<&str>) -> Result<(), GcError> {
    if self.entries.iter().any(|entry| entry.slot.key() == slot.key()) {
      return Err(GcError::DuplicateRoot);
    }
    self.entries.push(RootEntry {
      slot       : slot.clone(),
      description: IString::from(description.unwrap_or("")),
    });
    Ok(())
  }

  pub fn remove(&mut self, slot: &RootSlot) -> Result<(), GcError> {
    match self.entries.iter().position(|entry| entry.slot.key() == slot.key()) {
      Some(position) => {
        self.entries.swap_remove(position);
        Ok(())
      }
      None => Err(GcError::RootNotFound),
    }
  }

  #[inline(always)]
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = &RootEntry> {
    self.entries.iter()
  }
}

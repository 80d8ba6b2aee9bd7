/*!

The heap arena: one contiguous byte region owning all payload storage, a slab of block
records, and the two doubly linked lists (free and used) threaded through the slab by index.

Carving proceeds from low addresses: bytes in `[0, high_water)` are partitioned exactly by
the non-vacant blocks, bytes in `[high_water, total)` are untouched wilderness. The free
list is kept strictly address ordered, which makes first-fit deterministic and lets the
sweep merge a freed block with an offset-adjacent free neighbor in constant time per splice.

The arena knows nothing about reachability. Marking happens elsewhere, against an
out-of-line bitmap; the arena only consumes the bitmap's verdict during `sweep`.

*/

use bit_set::BitSet;

use crate::{
  api::{GcError, Reference, TypeTag},
  core::gc::block::{align_up, Block, BlockIndex, BlockState, ALIGNMENT, MIN_SPLIT_BYTES},
};

pub(crate) struct Arena {
  data      : Box<[u8]>,
  blocks    : Vec<Block>,
  vacant    : Vec<BlockIndex>,
  free_head : Option<BlockIndex>,
  used_head : Option<BlockIndex>,
  used_count: usize,
  used_bytes: usize,
  high_water: usize,
}

impl Arena {
  /// Binds the arena to a fresh region of `capacity` bytes, rounded down to whole
  /// alignment units.
  pub fn new(capacity: usize) -> Arena {
    let capacity = capacity & !(ALIGNMENT - 1);
    Arena {
      data      : vec![0u8; capacity].into_boxed_slice(),
      blocks    : Vec::new(),
      vacant    : Vec::new(),
      free_head : None,
      used_head : None,
      used_count: 0,
      used_bytes: 0,
      high_water: 0,
    }
  }

  // region Accessors

  #[inline(always)]
  pub fn total(&self) -> usize {
    self.data.len()
  }

  #[inline(always)]
  pub fn used_bytes(&self) -> usize {
    self.used_bytes
  }

  #[inline(always)]
  pub fn free_bytes(&self) -> usize {
    self.total() - self.used_bytes
  }

  #[inline(always)]
  pub fn used_count(&self) -> usize {
    self.used_count
  }

  #[inline(always)]
  pub fn slot_count(&self) -> usize {
    self.blocks.len()
  }

  #[inline(always)]
  pub fn block(&self, index: BlockIndex) -> &Block {
    &self.blocks[index as usize]
  }

  #[inline(always)]
  fn block_mut(&mut self, index: BlockIndex) -> &mut Block {
    &mut self.blocks[index as usize]
  }

  pub fn payload(&self, index: BlockIndex) -> &[u8] {
    let block = &self.blocks[index as usize];
    &self.data[block.offset..block.end()]
  }

  pub fn payload_mut(&mut self, index: BlockIndex) -> &mut [u8] {
    let (offset, end) = {
      let block = &self.blocks[index as usize];
      (block.offset, block.end())
    };
    &mut self.data[offset..end]
  }

  /// The current handle for a block the arena has handed out.
  pub fn reference_to(&self, index: BlockIndex) -> Reference {
    Reference::new(index, self.blocks[index as usize].generation)
  }

  /// Resolves a handle to its slab index, or `None` when the handle is stale: the slot was
  /// reclaimed, recycled, or never existed.
  pub fn resolve(&self, reference: Reference) -> Option<BlockIndex> {
    let index = reference.index();
    let block = self.blocks.get(index as usize)?;
    if block.state == BlockState::Used && block.generation == reference.generation() {
      Some(index)
    } else {
      None
    }
  }

  // endregion

  // region Allocation

  /// First-fit allocation: carve a free block, or extend the carved region from the
  /// high-water mark. `None` means the arena itself is exhausted; collection policy lives
  /// with the caller.
  pub fn allocate(&mut self, size: usize, tag: TypeTag) -> Option<BlockIndex> {
    let size = align_up(size);

    if let Some(found) = self.first_fit(size) {
      self.carve(found, size);
      self.hand_out(found, tag);
      return Some(found);
    }

    if size <= self.total() - self.high_water {
      let index = self.new_slot(Block::free_at(self.high_water, size));
      self.high_water += size;
      self.hand_out(index, tag);
      return Some(index);
    }

    None
  }

  fn first_fit(&self, size: usize) -> Option<BlockIndex> {
    let mut cursor = self.free_head;
    while let Some(index) = cursor {
      let block = &self.blocks[index as usize];
      if block.size >= size {
        return Some(index);
      }
      cursor = block.next;
    }
    None
  }

  /// Shrinks `index` to `size` bytes and returns the remainder to the free list, or keeps
  /// the whole block when the remainder would be an unusable sliver. Either way `index`
  /// leaves the free list.
  fn carve(&mut self, index: BlockIndex, size: usize) {
    let remainder = self.blocks[index as usize].size - size;

    if remainder >= MIN_SPLIT_BYTES {
      self.blocks[index as usize].size = size;
      let rest_offset = self.blocks[index as usize].end();
      let rest        = self.new_slot(Block::free_at(rest_offset, remainder));

      // The remainder takes the carved block's position, keeping the list address ordered.
      let next = self.blocks[index as usize].next;
      self.blocks[rest as usize].prev = Some(index);
      self.blocks[rest as usize].next = next;
      if let Some(n) = next {
        self.blocks[n as usize].prev = Some(rest);
      }
      self.blocks[index as usize].next = Some(rest);
    }

    self.unlink_free(index);
  }

  fn hand_out(&mut self, index: BlockIndex, tag: TypeTag) {
    let (offset, end) = {
      let block        = self.block_mut(index);
      block.state      = BlockState::Used;
      block.tag        = tag;
      block.generation += 1;
      (block.offset, block.end())
    };

    // Fresh payloads read as all-null references until the object layer writes them.
    self.data[offset..end].fill(0);

    self.push_used(index);
    self.used_bytes += end - offset;
    self.used_count += 1;
  }

  // endregion

  // region Reclamation

  /// Sweeps the used list once: every block the bitmap did not mark is returned to the
  /// free list. Returns the count and total bytes reclaimed.
  pub fn sweep(&mut self, marked: &BitSet) -> (usize, usize) {
    let mut reclaimed       = 0usize;
    let mut reclaimed_bytes = 0usize;

    let mut cursor = self.used_head;
    while let Some(index) = cursor {
      cursor = self.blocks[index as usize].next;
      if !marked.contains(index as usize) {
        reclaimed += 1;
        reclaimed_bytes += self.release(index);
      }
    }

    (reclaimed, reclaimed_bytes)
  }

  /// Returns one used block to the free list and reports its size.
  fn release(&mut self, index: BlockIndex) -> usize {
    let size = self.blocks[index as usize].size;
    self.unlink_used(index);
    self.used_bytes -= size;
    self.used_count -= 1;

    let block   = self.block_mut(index);
    block.state = BlockState::Free;
    block.tag   = 0;

    self.insert_free(index);
    size
  }

  /// Relocates every used block to be contiguous from the arena's start, in address order.
  /// Handles are indices into the slab, so no reference anywhere needs rewriting; offsets
  /// move, identities do not. Afterward the free list is empty and everything above the
  /// live prefix is wilderness again.
  pub fn compact(&mut self) {
    let mut order: Vec<BlockIndex> = Vec::with_capacity(self.used_count);
    let mut cursor = self.used_head;
    while let Some(index) = cursor {
      order.push(index);
      cursor = self.blocks[index as usize].next;
    }
    order.sort_unstable_by_key(|&index| self.blocks[index as usize].offset);

    let mut floor = 0usize;
    for &index in &order {
      let (offset, size) = {
        let block = &self.blocks[index as usize];
        (block.offset, block.size)
      };
      if offset != floor {
        self.data.copy_within(offset..offset + size, floor);
        self.blocks[index as usize].offset = floor;
      }
      floor += size;
    }

    let mut cursor = self.free_head;
    while let Some(index) = cursor {
      cursor = self.blocks[index as usize].next;
      self.vacate(index);
    }
    self.free_head  = None;
    self.high_water = floor;
  }

  // endregion

  // region Verification

  /// Cheap structural validation of both lists. Runs before every sweep so corruption is
  /// reported instead of compounded; nothing is mutated on the failure path. The
  /// exhaustive partition check is feature gated.
  pub fn verify(&self) -> Result<(), GcError> {
    let mut last_end = 0usize;
    let mut previous: Option<BlockIndex> = None;
    let mut steps  = 0usize;
    let mut cursor = self.free_head;
    while let Some(index) = cursor {
      steps += 1;
      if steps > self.blocks.len() {
        return Err(GcError::CollectionFailed("free list contains a cycle"));
      }
      let block = self
          .blocks
          .get(index as usize)
          .ok_or(GcError::CollectionFailed("free list links out of the slab"))?;
      if block.state != BlockState::Free {
        return Err(GcError::CollectionFailed("free list holds a block that is not free"));
      }
      if block.prev != previous {
        return Err(GcError::CollectionFailed("free list back-link is broken"));
      }
      if block.size == 0 || block.offset % ALIGNMENT != 0 || block.end() > self.high_water {
        return Err(GcError::CollectionFailed("free block has a malformed extent"));
      }
      if previous.is_some() && block.offset < last_end {
        return Err(GcError::CollectionFailed("free list is not address ordered"));
      }
      last_end = block.end();
      previous = cursor;
      cursor   = block.next;
    }

    let mut count = 0usize;
    let mut bytes = 0usize;
    previous = None;
    steps    = 0;
    cursor   = self.used_head;
    while let Some(index) = cursor {
      steps += 1;
      if steps > self.blocks.len() {
        return Err(GcError::CollectionFailed("used list contains a cycle"));
      }
      let block = self
          .blocks
          .get(index as usize)
          .ok_or(GcError::CollectionFailed("used list links out of the slab"))?;
      if block.state != BlockState::Used {
        return Err(GcError::CollectionFailed("used list holds a block that is not used"));
      }
      if block.prev != previous {
        return Err(GcError::CollectionFailed("used list back-link is broken"));
      }
      if block.size == 0 || block.offset % ALIGNMENT != 0 || block.end() > self.high_water {
        return Err(GcError::CollectionFailed("used block has a malformed extent"));
      }
      count += 1;
      bytes += block.size;
      previous = cursor;
      cursor   = block.next;
    }
    if count != self.used_count || bytes != self.used_bytes {
      return Err(GcError::CollectionFailed("used list disagrees with the byte counters"));
    }

    #[cfg(feature = "gc_debug")]
    self.verify_partition()?;

    Ok(())
  }

  /// Every carved byte belongs to exactly one block: the non-vacant blocks, sorted by
  /// offset, must tile `[0, high_water)` with no gap and no overlap.
  #[cfg(feature = "gc_debug")]
  fn verify_partition(&self) -> Result<(), GcError> {
    let mut extents: Vec<(usize, usize)> = self
        .blocks
        .iter()
        .filter(|block| block.state != BlockState::Vacant)
        .map(|block| (block.offset, block.size))
        .collect();
    extents.sort_unstable();

    let mut floor = 0usize;
    for (offset, size) in extents {
      if offset != floor {
        return Err(GcError::CollectionFailed("blocks do not partition the carved region"));
      }
      floor = offset + size;
    }
    if floor != self.high_water {
      return Err(GcError::CollectionFailed("blocks do not partition the carved region"));
    }
    Ok(())
  }

  // endregion

  // region Slab and list plumbing

  fn new_slot(&mut self, block: Block) -> BlockIndex {
    match self.vacant.pop() {
      Some(index) => {
        // The generation survives vacancy so stale handles stay stale.
        let generation = self.blocks[index as usize].generation;
        self.blocks[index as usize] = Block { generation, ..block };
        index
      }
      None => {
        self.blocks.push(block);
        (self.blocks.len() - 1) as BlockIndex
      }
    }
  }

  fn vacate(&mut self, index: BlockIndex) {
    let block   = self.block_mut(index);
    block.state = BlockState::Vacant;
    block.prev  = None;
    block.next  = None;
    self.vacant.push(index);
  }

  fn push_used(&mut self, index: BlockIndex) {
    self.blocks[index as usize].prev = None;
    self.blocks[index as usize].next = self.used_head;
    if let Some(head) = self.used_head {
      self.blocks[head as usize].prev = Some(index);
    }
    self.used_head = Some(index);
  }

  fn unlink_used(&mut self, index: BlockIndex) {
    let (prev, next) = {
      let block = &self.blocks[index as usize];
      (block.prev, block.next)
    };
    match prev {
      Some(p) => self.blocks[p as usize].next = next,
      None    => self.used_head = next,
    }
    if let Some(n) = next {
      self.blocks[n as usize].prev = prev;
    }
    let block  = self.block_mut(index);
    block.prev = None;
    block.next = None;
  }

  fn unlink_free(&mut self, index: BlockIndex) {
    let (prev, next) = {
      let block = &self.blocks[index as usize];
      (block.prev, block.next)
    };
    match prev {
      Some(p) => self.blocks[p as usize].next = next,
      None    => self.free_head = next,
    }
    if let Some(n) = next {
      self.blocks[n as usize].prev = prev;
    }
    let block  = self.block_mut(index);
    block.prev = None;
    block.next = None;
  }

  /// Splices a free block into address order, then merges it with offset-adjacent free
  /// neighbors. Used blocks between two free blocks break offset adjacency, so contiguity
  /// of offsets is exactly the mergeability test.
  fn insert_free(&mut self, index: BlockIndex) {
    let offset = self.blocks[index as usize].offset;

    let mut prev: Option<BlockIndex> = None;
    let mut next = self.free_head;
    while let Some(n) = next {
      if self.blocks[n as usize].offset > offset {
        break;
      }
      prev = next;
      next = self.blocks[n as usize].next;
    }

    self.blocks[index as usize].prev = prev;
    self.blocks[index as usize].next = next;
    match prev {
      Some(p) => self.blocks[p as usize].next = Some(index),
      None    => self.free_head = Some(index),
    }
    if let Some(n) = next {
      self.blocks[n as usize].prev = Some(index);
    }

    let mut index = index;
    if let Some(p) = prev {
      if self.blocks[p as usize].end() == self.blocks[index as usize].offset {
        self.blocks[p as usize].size += self.blocks[index as usize].size;
        self.unlink_free(index);
        self.vacate(index);
        index = p;
      }
    }
    if let Some(n) = self.blocks[index as usize].next {
      if self.blocks[index as usize].end() == self.blocks[n as usize].offset {
        self.blocks[index as usize].size += self.blocks[n as usize].size;
        self.unlink_free(n);
        self.vacate(n);
      }
    }
  }

  // endregion
}

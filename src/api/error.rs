/*!

The failure taxonomy of the heap. Every fallible operation returns one of these variants
explicitly; nothing panics in library code and nothing is silently retried more than the
allocator's single forced-collection attempt.

*/

use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum GcError {
  /// A usage error: zero-size allocation, zero-capacity heap, or a stale/foreign reference
  /// handed to an accessor. Never mutates heap state.
  #[error("invalid argument: {0}")]
  InvalidArgument(&'static str),

  /// The slot is already registered as a root.
  #[error("a root is already registered for this slot")]
  DuplicateRoot,

  /// The slot is not registered as a root.
  #[error("no root is registered for this slot")]
  RootNotFound,

  /// The heap could not satisfy the request, even after one forced collection.
  #[error("heap exhausted: no block of {requested} bytes is available")]
  AllocationFailed { requested: usize },

  /// Structural corruption detected during a cycle, or an operation that is illegal while a
  /// cycle is running. The heap is left in its pre-collection state.
  #[error("collection failed: {0}")]
  CollectionFailed(&'static str),
}

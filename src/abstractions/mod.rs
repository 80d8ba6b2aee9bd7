/*!

Types/type aliases that abstract over the implementing backing type.

The `IString` interned string, for example, could be provided by a number of external crates. This
module redirects to whichever implementation we want.

*/

pub mod log;

// Interned string.
pub use string_cache::DefaultAtom as IString;

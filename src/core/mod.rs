/*!

Internal machinery of the heap. Everything callers may touch is re-exported at the crate
root; nothing in here is reachable except through `Collector` and the API types.

*/

pub(crate) mod gc;

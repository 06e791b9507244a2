//! Watch dispatch
//!
//! Turns node-changed events into typed cache updates and callbacks. Both
//! paths into the cache, a refetch driven by a watch event and a value the
//! directory already holds after its own write, go through the same
//! compare-and-swap step on the same per-type worker, so every accepted
//! version is announced exactly once.

mod callbacks;
mod dispatcher;

pub use callbacks::*;
pub use dispatcher::*;

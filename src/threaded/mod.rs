//! Multi-threaded execution helpers.
//!
//! Every stage splits its output buffer into disjoint chunks and hands
//! them to rayon workers. Worker count adapts to stage size: small stages
//! use fewer threads to avoid hand-off overhead.

pub mod parallel_for;

pub use parallel_for::{choose_thread_count, for_each_chunk};

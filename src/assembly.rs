//! The assembly engine: per-thread element data, dense local buffers, global storage and
//! the parallel element and node loops.
mod context;
mod engine;
pub mod global;
mod local;

pub use context::*;
pub use engine::*;
pub use local::*;

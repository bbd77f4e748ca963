//! Compute module - Treap primitives, Pareto layers and the archive.

mod archive;
mod hull;
mod index;
mod layer;
mod treap;

pub use archive::*;
pub use hull::*;
pub use index::*;
pub use layer::*;
pub use treap::*;

//! Schema module - Solution values, configuration and workload types.

mod config;
mod solution;
mod workload;

pub use config::*;
pub use solution::*;
pub use workload::*;

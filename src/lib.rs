//! Pareto Archive - Incremental non-dominated sorting for two objectives.
//!
//! This crate maintains a population of bi-objective solutions partitioned
//! into Pareto layers under single insertions and single evictions, as a
//! steady-state evolutionary loop needs them. Both operations touch
//! O(log n) cached statistics instead of re-sorting the population.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Solution values, configuration and synthetic workloads
//! - `compute`: Treap primitives, layer trees, the rank index, the hull
//!   accelerator and the [`Archive`] façade
//!
//! # Example
//!
//! ```rust,no_run
//! use pareto_archive::{
//!     compute::Archive,
//!     schema::{ArchiveConfig, HullPolicy, Solution},
//! };
//!
//! let config = ArchiveConfig {
//!     hull_policy: HullPolicy::RebuildWhenRangeInvalid,
//!     random_seed: Some(42),
//! };
//! let mut archive: Archive = Archive::with_config(config).expect("valid config");
//!
//! for (x, y) in [(0.0, 7.0), (1.0, 5.0), (2.0, 4.0), (5.0, 3.0), (3.0, 6.0)] {
//!     archive.add(Solution::new(x, y));
//! }
//!
//! // Keep four solutions: the least crowded point of the last layer goes.
//! let evicted = archive.remove_worst().expect("non-empty archive");
//! println!("evicted {evicted}, {} layers left", archive.layer_count());
//!
//! // Parent selection draws uniformly and reports rank and crowding.
//! let parent = archive.random().expect("non-empty archive");
//! println!("parent {} at rank {}", parent.solution, parent.rank);
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::{Archive, ArchiveError, Sample};
pub use schema::{ArchiveConfig, HullPolicy, Solution};

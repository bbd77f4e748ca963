//! Synthetic point streams for benchmarks and the command-line tool.

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use super::{Bounds, Solution};

/// Source of candidate solutions for an archive.
///
/// Implementations own their decision space; the archive only ever sees
/// the evaluated objective pair and carries the decision along.
pub trait Problem {
    type Decision;

    /// Draw a random decision.
    fn generate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Self::Decision;

    /// Map a decision to its objective values.
    fn evaluate(&self, decision: &Self::Decision) -> Solution<Self::Decision>;
}

/// Shape of the objective-space distribution.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkloadShape {
    /// Points uniform in the unit square. Fronts stay short.
    #[default]
    UniformSquare,
    /// Points near the anti-diagonal `x + y = 1`; a band of width zero
    /// puts every point on a single front.
    DiagonalBand { width: f64 },
    /// Points on `fronts` parallel anti-diagonals, jittered by Gaussian
    /// noise of standard deviation `noise`.
    ParallelFronts { fronts: usize, noise: f64 },
}

/// Workload configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkloadConfig {
    #[serde(default)]
    pub shape: WorkloadShape,
}

/// Decision of a synthetic workload: two uniform coordinates and one
/// standard-normal jitter term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Draw {
    pub u: f64,
    pub v: f64,
    pub z: f64,
}

/// Problem backed by a [`WorkloadShape`].
#[derive(Debug, Clone)]
pub struct Workload {
    shape: WorkloadShape,
}

impl Workload {
    pub fn new(config: &WorkloadConfig) -> Self {
        Self { shape: config.shape }
    }

    /// Reference box enclosing (almost) every generated point.
    pub fn bounds(&self) -> Bounds {
        match self.shape {
            WorkloadShape::UniformSquare => Bounds::new(0.0, 1.0, 0.0, 1.0),
            WorkloadShape::DiagonalBand { width } => Bounds::new(0.0, 1.0, 0.0, 1.0 + width),
            WorkloadShape::ParallelFronts { fronts, noise } => {
                let top = fronts as f64;
                Bounds::new(0.0, top, -3.0 * noise, top + 3.0 * noise)
            }
        }
    }
}

impl Problem for Workload {
    type Decision = Draw;

    fn generate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Draw {
        Draw {
            u: rng.r#gen::<f64>(),
            v: rng.r#gen::<f64>(),
            z: rng.sample(StandardNormal),
        }
    }

    fn evaluate(&self, decision: &Draw) -> Solution<Draw> {
        let Draw { u, v, z } = *decision;
        let (x, y) = match self.shape {
            WorkloadShape::UniformSquare => (u, v),
            WorkloadShape::DiagonalBand { width } => (u, 1.0 - u + width * v),
            WorkloadShape::ParallelFronts { fronts, noise } => {
                let front = ((v * fronts as f64) as usize).min(fronts.saturating_sub(1)) as f64;
                (u + front, 1.0 - u + front + noise * z)
            }
        };
        Solution::with_decision(x, y, *decision)
    }
}

//! Two-objective solution values and Pareto dominance.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::compute::ArchiveError;

/// A point in objective space together with an opaque caller payload.
///
/// Both objectives are minimized. The payload (typically the decision
/// vector that produced the point) is carried along and never inspected.
/// Equality compares coordinates only.
#[derive(Debug, Clone)]
pub struct Solution<D = ()> {
    x: f64,
    y: f64,
    decision: D,
}

impl Solution<()> {
    /// Create a solution without payload.
    ///
    /// # Panics
    ///
    /// Panics if either coordinate is NaN or infinite.
    pub fn new(x: f64, y: f64) -> Self {
        Self::with_decision(x, y, ())
    }
}

impl<D> Solution<D> {
    /// Create a solution carrying `decision`.
    ///
    /// # Panics
    ///
    /// Panics if either coordinate is NaN or infinite.
    pub fn with_decision(x: f64, y: f64, decision: D) -> Self {
        match Self::try_new(x, y, decision) {
            Ok(solution) => solution,
            Err(err) => panic!("{err}"),
        }
    }

    /// Create a solution, rejecting non-finite coordinates.
    pub fn try_new(x: f64, y: f64, decision: D) -> Result<Self, ArchiveError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(ArchiveError::NonFiniteObjective { x, y });
        }
        Ok(Self { x, y, decision })
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.y
    }

    /// The caller payload.
    pub fn decision(&self) -> &D {
        &self.decision
    }

    /// Consume the solution, returning its payload.
    pub fn into_decision(self) -> D {
        self.decision
    }

    /// Whether `self` Pareto-dominates `other`: no worse in both objectives
    /// and strictly better in at least one.
    pub fn dominates<E>(&self, other: &Solution<E>) -> bool {
        self.x <= other.x && self.y <= other.y && (self.x < other.x || self.y < other.y)
    }

    /// Same coordinates as `other`.
    pub fn same_point<E>(&self, other: &Solution<E>) -> bool {
        self.x == other.x && self.y == other.y
    }

    /// Normalized coordinates inside a reference box.
    pub fn normalized(&self, bounds: &Bounds) -> (f64, f64) {
        (
            (self.x - bounds.min_x) / (bounds.max_x - bounds.min_x),
            (self.y - bounds.min_y) / (bounds.max_y - bounds.min_y),
        )
    }
}

impl<D, E> PartialEq<Solution<E>> for Solution<D> {
    fn eq(&self, other: &Solution<E>) -> bool {
        self.same_point(other)
    }
}

impl<D> fmt::Display for Solution<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}; {})", self.x, self.y)
    }
}

/// Axis-aligned reference box in objective space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dominance() {
        let a = Solution::new(1.0, 1.0);
        let b = Solution::new(2.0, 1.0);
        let c = Solution::new(0.0, 3.0);

        assert!(a.dominates(&b));
        assert!(!b.dominates(&a));
        assert!(!a.dominates(&c));
        assert!(!c.dominates(&a));
        assert!(!a.dominates(&a.clone()));
    }

    #[test]
    fn test_equality_ignores_payload() {
        let a = Solution::with_decision(1.0, 2.0, vec![0.5, 0.25]);
        let b = Solution::with_decision(1.0, 2.0, vec![0.75]);
        assert_eq!(a, b);
        assert_eq!(a, Solution::new(1.0, 2.0));
    }

    #[test]
    fn test_rejects_non_finite() {
        assert!(matches!(
            Solution::try_new(f64::NAN, 0.0, ()),
            Err(ArchiveError::NonFiniteObjective { .. })
        ));
        assert!(Solution::try_new(0.0, f64::INFINITY, ()).is_err());
        assert!(Solution::try_new(-1.0, 1e300, ()).is_ok());
    }

    #[test]
    #[should_panic]
    fn test_new_panics_on_nan() {
        let _ = Solution::new(0.0, f64::NAN);
    }

    #[test]
    fn test_normalized() {
        let s = Solution::new(1.0, 3.0);
        let (x, y) = s.normalized(&Bounds::new(0.0, 4.0, 0.0, 4.0));
        assert_eq!(x, 0.25);
        assert_eq!(y, 0.75);
    }
}

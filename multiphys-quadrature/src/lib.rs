//! Quadrature rules for the reference domains used by `multiphys`.
//!
//! Reference segments are `[-1, 1]`, reference quadrilaterals are `[-1, 1]^2`.
//! A rule is stored as a pair of weights and points of equal length.

use std::fmt;
use std::fmt::{Display, Formatter};

pub mod tensor;
pub mod univariate;

/// Library-wide error type.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// No rule with the requested number of points or strength exists.
    NoRuleAvailable,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRuleAvailable => {
                write!(f, "There is no quadrature rule satisfying the requirements available")
            }
        }
    }
}

impl std::error::Error for Error {}

/// A D-dimensional point.
pub type Point<const D: usize> = [f64; D];

/// A D-dimensional rule.
pub type Rule<const D: usize> = (Vec<f64>, Vec<Point<D>>);

/// A one-dimensional rule.
pub type Rule1d = Rule<1>;

/// A two-dimensional rule.
pub type Rule2d = Rule<2>;

/// Approximates the integral of `f` over the reference domain of `rule`.
pub fn integrate<const D: usize>(rule: &Rule<D>, f: impl Fn(&Point<D>) -> f64) -> f64 {
    let (weights, points) = rule;
    weights
        .iter()
        .zip(points)
        .map(|(w, x)| w * f(x))
        .sum()
}

/// Number of 1D Gauss points needed to integrate polynomials of the given degree exactly.
pub fn gauss_points_for_strength(strength: usize) -> usize {
    // n points integrate degree 2n - 1 exactly
    (strength + 2) / 2
}

//! Quadrature rules converted to the scalar type of the problem.
use crate::connectivity::ElementType;
use crate::Real;
use eyre::eyre;
use multiphys_quadrature::{tensor, univariate};
use nalgebra::Point2;

/// Quadrature weights and reference points. One-dimensional rules store `xi` in the first
/// coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureRule<T: Real> {
    pub weights: Vec<T>,
    pub points: Vec<Point2<T>>,
}

impl<T: Real> QuadratureRule<T> {
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// A 1D Gauss rule on `[-1, 1]` with `n` points.
    pub fn gauss_1d(n: usize) -> eyre::Result<Self> {
        let (weights, points) = univariate::try_gauss(n).map_err(|err| eyre!(err))?;
        Ok(Self {
            weights: weights.into_iter().map(nalgebra::convert).collect(),
            points: points
                .into_iter()
                .map(|[x]| Point2::new(nalgebra::convert(x), T::zero()))
                .collect(),
        })
    }

    /// A tensor-product Gauss rule on `[-1, 1]^2` with `n` points per direction.
    pub fn gauss_2d(n: usize) -> eyre::Result<Self> {
        let (weights, points) = tensor::try_quadrilateral_gauss(n).map_err(|err| eyre!(err))?;
        Ok(Self {
            weights: weights.into_iter().map(nalgebra::convert).collect(),
            points: points
                .into_iter()
                .map(|[x, y]| Point2::new(nalgebra::convert(x), nalgebra::convert(y)))
                .collect(),
        })
    }

    /// Gauss rule on the reference domain of `element_type` that integrates polynomials of
    /// the given degree exactly in each direction.
    pub fn for_element(element_type: ElementType, strength: usize) -> eyre::Result<Self> {
        let n = multiphys_quadrature::gauss_points_for_strength(strength);
        match element_type {
            ElementType::Edge2 => Self::gauss_1d(n),
            ElementType::Quad4 => Self::gauss_2d(n),
        }
    }
}

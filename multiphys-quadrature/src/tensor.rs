//! Rules on the reference quadrilateral formed as tensor products of 1D rules.

use crate::univariate::try_gauss;
use crate::{Error, Rule};

/// A Gauss rule for the reference quadrilateral with `n` points per dimension.
///
/// Points are ordered with the first coordinate varying slowest.
pub fn try_quadrilateral_gauss(num_points_per_dim: usize) -> Result<Rule<2>, Error> {
    let n = num_points_per_dim;
    let (weights1d, points1d) = try_gauss(n)?;
    let mut weights2d = Vec::with_capacity(n * n);
    let mut points2d = Vec::with_capacity(n * n);

    for (&wx, &[x]) in weights1d.iter().zip(&points1d) {
        for (&wy, &[y]) in weights1d.iter().zip(&points1d) {
            weights2d.push(wx * wy);
            points2d.push([x, y]);
        }
    }

    Ok((weights2d, points2d))
}

/// Panicking variant of [`try_quadrilateral_gauss`].
pub fn quadrilateral_gauss(num_points_per_dim: usize) -> Rule<2> {
    try_quadrilateral_gauss(num_points_per_dim).expect("number of points must be positive")
}

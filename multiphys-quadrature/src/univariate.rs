//! Quadrature rules for the one-dimensional domain `[-1, 1]`.

use crate::{Error, Rule};
use nalgebra::{DMatrix, SymmetricEigen};

/// Gauss quadrature for the reference interval `[-1, 1]`.
///
/// Given `n` points, the rule integrates polynomials of degree up to `2 n - 1` exactly.
/// Points are sorted in ascending order.
///
/// The nodes are the eigenvalues of the symmetric Jacobi matrix of the Legendre three-term
/// recurrence, and the weights are `2 v_0^2` where `v_0` is the first component of the
/// normalized eigenvector (Golub-Welsch).
pub fn try_gauss(num_points: usize) -> Result<Rule<1>, Error> {
    let n = num_points;
    if n == 0 {
        return Err(Error::NoRuleAvailable);
    }

    let mut jacobi = DMatrix::<f64>::zeros(n, n);
    for k in 1..n {
        let k_f = k as f64;
        let beta = k_f / (4.0 * k_f * k_f - 1.0).sqrt();
        jacobi[(k - 1, k)] = beta;
        jacobi[(k, k - 1)] = beta;
    }

    let eigen = SymmetricEigen::new(jacobi);
    let mut pairs: Vec<(f64, f64)> = eigen
        .eigenvalues
        .iter()
        .zip(eigen.eigenvectors.column_iter())
        .map(|(&x, v)| (x, 2.0 * v[0] * v[0]))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    // The spectrum is symmetric about zero, enforce that exactly
    for i in 0..n / 2 {
        let j = n - i - 1;
        let x = 0.5 * (pairs[j].0 - pairs[i].0);
        let w = 0.5 * (pairs[i].1 + pairs[j].1);
        pairs[i] = (-x, w);
        pairs[j] = (x, w);
    }
    if n % 2 == 1 {
        pairs[n / 2].0 = 0.0;
    }

    let (weights, points) = pairs.into_iter().map(|(x, w)| (w, [x])).unzip();
    Ok((weights, points))
}

/// Gauss quadrature for the reference interval `[-1, 1]`.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn gauss(num_points: usize) -> Rule<1> {
    try_gauss(num_points).expect("number of points must be positive")
}

use crate::calculus::{DifferentiableVectorFunction, VectorFunction};
use crate::{BoxedError, Real};
use itertools::iterate;
use log::debug;
use nalgebra::{DVectorView, DVectorViewMut, Scalar};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "T: Real + Deserialize<'de>"))]
pub struct NewtonSettings<T> {
    pub max_iterations: usize,
    /// Converged once `|F(u)| <= abs_tolerance`.
    pub abs_tolerance: T,
    /// Converged once `|F(u)| <= rel_tolerance * |F(u_0)|`.
    pub rel_tolerance: T,
}

impl<T: Real> Default for NewtonSettings<T> {
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn default() -> Self {
        Self {
            max_iterations: 50,
            abs_tolerance: 1e-10,
            rel_tolerance: 1e-8,
        }
    }
}

/// Summary of a Newton solve.
///
/// Running out of iterations is reported through `converged == false` and is not an error.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NewtonOutcome<T> {
    pub iterations: usize,
    pub converged: bool,
    pub initial_residual_norm: T,
    pub residual_norm: T,
}

#[derive(Debug, Error)]
pub enum NewtonError {
    #[error("failed to evaluate the function: {0}")]
    FunctionError(#[source] BoxedError),
    #[error("failed to solve Jacobian system: {0}")]
    JacobianError(#[source] BoxedError),
    #[error("failed to compute damping factor: {0}")]
    DampingError(#[source] BoxedError),
    #[error("line search failed to produce a valid step: {0}")]
    LineSearchError(#[source] BoxedError),
}

/// Attempts to solve the non-linear equation `F(u) = 0` with full Newton steps.
pub fn newton<'a, T, F>(
    function: F,
    x: impl Into<DVectorViewMut<'a, T>>,
    f: impl Into<DVectorViewMut<'a, T>>,
    dx: impl Into<DVectorViewMut<'a, T>>,
    settings: &NewtonSettings<T>,
) -> Result<NewtonOutcome<T>, NewtonError>
where
    T: Real,
    F: DifferentiableVectorFunction<T>,
{
    newton_line_search(function, x, f, dx, settings, &mut NoLineSearch)
}

/// Same as `newton`, but allows specifying a line search.
///
/// Each step is scaled by the damping factor reported by the function before it is handed
/// to the line search.
pub fn newton_line_search<'a, T, F>(
    mut function: F,
    x: impl Into<DVectorViewMut<'a, T>>,
    f: impl Into<DVectorViewMut<'a, T>>,
    dx: impl Into<DVectorViewMut<'a, T>>,
    settings: &NewtonSettings<T>,
    line_search: &mut impl LineSearch<T, F>,
) -> Result<NewtonOutcome<T>, NewtonError>
where
    T: Real,
    F: DifferentiableVectorFunction<T>,
{
    let mut x = x.into();
    let mut f = f.into();
    let mut minus_dx = dx.into();

    assert_eq!(x.nrows(), f.nrows());
    assert_eq!(minus_dx.nrows(), f.nrows());

    function
        .eval_into(&mut f, &DVectorView::from(&x))
        .map_err(NewtonError::FunctionError)?;

    let initial_residual_norm = f.norm();
    let mut residual_norm = initial_residual_norm;
    let mut iter = 0;
    debug!("Newton iter {}: |F| = {}", iter, residual_norm);

    let converged = |norm: T| norm <= settings.abs_tolerance || norm <= settings.rel_tolerance * initial_residual_norm;

    while !converged(residual_norm) {
        if iter == settings.max_iterations {
            return Ok(NewtonOutcome {
                iterations: iter,
                converged: false,
                initial_residual_norm,
                residual_norm,
            });
        }

        // Solve the system J dx = -f   <=>   J (-dx) = f
        function
            .solve_jacobian_system(&mut minus_dx, &DVectorView::from(&x), &DVectorView::from(&f))
            .map_err(NewtonError::JacobianError)?;

        // Flip sign to make it consistent with line search
        let damping = function
            .damping(&DVectorView::from(&x), &DVectorView::from(&minus_dx))
            .map_err(NewtonError::DampingError)?;
        minus_dx *= -damping;
        let dx = &minus_dx;

        let step_length = line_search
            .step(
                &mut function,
                DVectorViewMut::from(&mut f),
                DVectorViewMut::from(&mut x),
                DVectorView::from(dx),
            )
            .map_err(NewtonError::LineSearchError)?;
        iter += 1;
        residual_norm = f.norm();
        debug!(
            "Newton iter {}: |F| = {}, damping = {}, step length = {}",
            iter, residual_norm, damping, step_length
        );
    }

    Ok(NewtonOutcome {
        iterations: iter,
        converged: true,
        initial_residual_norm,
        residual_norm,
    })
}

pub trait LineSearch<T: Scalar, F: VectorFunction<T>> {
    /// Moves `x` along `direction` and leaves `f = F(x)` at the accepted point.
    fn step(
        &mut self,
        function: &mut F,
        f: DVectorViewMut<T>,
        x: DVectorViewMut<T>,
        direction: DVectorView<T>,
    ) -> Result<T, BoxedError>;
}

/// Trivial line search. Equivalent to a single, full Newton step.
#[derive(Clone, Debug)]
pub struct NoLineSearch;

impl<T, F> LineSearch<T, F> for NoLineSearch
where
    T: Real,
    F: VectorFunction<T>,
{
    fn step(
        &mut self,
        function: &mut F,
        mut f: DVectorViewMut<T>,
        mut x: DVectorViewMut<T>,
        direction: DVectorView<T>,
    ) -> Result<T, BoxedError> {
        x.axpy(T::one(), &direction, T::one());
        function.eval_into(&mut f, &DVectorView::from(&x))?;
        Ok(T::one())
    }
}

/// Backtracking line search using the Armijo condition on `g(x) = |F(x)|^2 / 2`.
///
/// See Nocedal & Wright (2006), Numerical Optimization, Chapter 3.1.
#[derive(Clone, Debug)]
pub struct BacktrackingLineSearch<T> {
    pub sufficient_decrease: T,
    pub min_step: T,
}

impl<T: Real> Default for BacktrackingLineSearch<T> {
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn default() -> Self {
        Self {
            sufficient_decrease: 1e-4,
            min_step: 1e-6,
        }
    }
}

impl<T, F> LineSearch<T, F> for BacktrackingLineSearch<T>
where
    T: Real,
    F: VectorFunction<T>,
{
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn step(
        &mut self,
        function: &mut F,
        mut f: DVectorViewMut<T>,
        mut x: DVectorViewMut<T>,
        direction: DVectorView<T>,
    ) -> Result<T, BoxedError> {
        // Assuming grad F^T p ~= -F(x), sufficient decrease becomes
        //  g(x + alpha p) <= (1 - c alpha) g(x)
        let c = self.sufficient_decrease;
        let p = direction;
        let g_initial = 0.5 * f.magnitude_squared();

        // Slow decrease first, faster once the first few candidates are rejected
        let mut alphas = [1.0, 0.75, 0.5]
            .into_iter()
            .chain(iterate(0.25, |alpha_i| 0.25 * *alpha_i));

        let mut alpha_prev = 0.0;
        loop {
            let alpha = alphas.next().unwrap_or(T::zero());
            // x^{k + 1} = x^k + (alpha^k - alpha^{k - 1}) p
            x.axpy(alpha - alpha_prev, &p, T::one());
            function.eval_into(&mut f, &DVectorView::from(&x))?;

            let g = 0.5 * f.magnitude_squared();
            if g <= (1.0 - c * alpha) * g_initial {
                return Ok(alpha);
            } else if alpha < self.min_step {
                return Err(format!(
                    "step length {} is smaller than minimum allowed step {}",
                    alpha, self.min_step
                )
                .into());
            }
            alpha_prev = alpha;
        }
    }
}

//! Linear solvers and the bridge between a [`Problem`] and the Newton solver.
use crate::config::LineSearchKind;
use crate::optimize::calculus::{DifferentiableVectorFunction, VectorFunction};
use crate::optimize::newton::{newton, newton_line_search, BacktrackingLineSearch, NewtonOutcome, NewtonSettings};
use crate::optimize::BoxedError;
use crate::problem::Problem;
use crate::Real;
use eyre::eyre;
use log::warn;
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use nalgebra_sparse::convert::serial::convert_csr_dense;
use nalgebra_sparse::CsrMatrix;

/// Solves the linear systems arising in Newton's method.
pub trait LinearSolver<T: Real> {
    /// Solves `matrix * solution = rhs`.
    fn solve(
        &mut self,
        matrix: &CsrMatrix<T>,
        solution: &mut DVectorViewMut<T>,
        rhs: &DVectorView<T>,
    ) -> eyre::Result<()>;
}

/// Densifies the matrix and solves with an LU decomposition with partial pivoting.
#[derive(Debug, Copy, Clone, Default)]
pub struct DenseLu;

impl<T: Real> LinearSolver<T> for DenseLu {
    fn solve(
        &mut self,
        matrix: &CsrMatrix<T>,
        solution: &mut DVectorViewMut<T>,
        rhs: &DVectorView<T>,
    ) -> eyre::Result<()> {
        let lu = convert_csr_dense(matrix).lu();
        let x = lu
            .solve(&rhs.clone_owned())
            .ok_or_else(|| eyre!("Jacobian is singular"))?;
        solution.copy_from(&x);
        Ok(())
    }
}

/// Exposes the residual, Jacobian and damping of a [`Problem`] as a differentiable vector
/// function.
pub struct NonlinearSystem<'a, T: Real> {
    problem: &'a mut Problem<T>,
    linear_solver: &'a mut dyn LinearSolver<T>,
    jacobian: CsrMatrix<T>,
    u: DVector<T>,
    residual: DVector<T>,
}

impl<'a, T: Real> NonlinearSystem<'a, T> {
    pub fn new(problem: &'a mut Problem<T>, linear_solver: &'a mut dyn LinearSolver<T>) -> eyre::Result<Self> {
        let n = problem.n_dofs();
        let jacobian = problem.create_jacobian()?;
        Ok(Self {
            problem,
            linear_solver,
            jacobian,
            u: DVector::zeros(n),
            residual: DVector::zeros(n),
        })
    }
}

impl<'a, T: Real> VectorFunction<T> for NonlinearSystem<'a, T> {
    fn dimension(&self) -> usize {
        self.u.len()
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, x: &DVectorView<T>) -> Result<(), BoxedError> {
        self.u.copy_from(x);
        self.problem
            .compute_residual(&self.u, &mut self.residual)?;
        f.copy_from(&self.residual);
        Ok(())
    }
}

impl<'a, T: Real> DifferentiableVectorFunction<T> for NonlinearSystem<'a, T> {
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<T>,
        x: &DVectorView<T>,
        rhs: &DVectorView<T>,
    ) -> Result<(), BoxedError> {
        self.u.copy_from(x);
        self.problem
            .compute_jacobian(&self.u, &mut self.jacobian)?;
        self.linear_solver
            .solve(&self.jacobian, sol, rhs)?;
        Ok(())
    }

    /// `dx` is the negated Newton step.
    fn damping(&mut self, x: &DVectorView<T>, dx: &DVectorView<T>) -> Result<T, BoxedError> {
        self.u.copy_from(x);
        let step = -dx.clone_owned();
        Ok(self.problem.compute_damping(&self.u, &step)?)
    }
}

/// Runs Newton's method on `problem` with the settings of its configuration and stores the
/// final iterate as the current solution.
pub fn solve<T: Real>(
    problem: &mut Problem<T>,
    linear_solver: &mut dyn LinearSolver<T>,
) -> eyre::Result<NewtonOutcome<T>> {
    let config = problem.config();
    let settings = NewtonSettings {
        max_iterations: config.newton.max_iterations,
        abs_tolerance: nalgebra::convert(config.newton.abs_tolerance),
        rel_tolerance: nalgebra::convert(config.newton.rel_tolerance),
    };
    let line_search = config.line_search;

    let mut u = problem.solution().clone();
    problem.apply_constraints(&mut u)?;
    let n = u.len();
    let mut f = DVector::zeros(n);
    let mut dx = DVector::zeros(n);

    let outcome = {
        let mut system = NonlinearSystem::new(problem, linear_solver)?;
        match line_search {
            LineSearchKind::None => newton(&mut system, &mut u, &mut f, &mut dx, &settings)?,
            LineSearchKind::Backtracking => newton_line_search(
                &mut system,
                &mut u,
                &mut f,
                &mut dx,
                &settings,
                &mut BacktrackingLineSearch::default(),
            )?,
        }
    };
    problem.set_solution(u)?;

    if !outcome.converged {
        warn!(
            "Newton solver did not converge after {} iterations: |F| = {} (initial {})",
            outcome.iterations, outcome.residual_norm, outcome.initial_residual_norm
        );
    }
    Ok(outcome)
}

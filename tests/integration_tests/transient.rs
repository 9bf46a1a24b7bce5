use crate::{on, problem_on};
use matrixcompare::assert_scalar_eq;
use multiphys::error::ConfigurationError;
use multiphys::mesh::procedural::{create_line_mesh, LINE_RIGHT};
use multiphys::problem::Problem;
use multiphys::variables::FeType;
use nalgebra::DVector;

/// `u_t = 1` without boundary conditions, so that `u(t) = t` everywhere.
fn growth_problem() -> Problem<f64> {
    let mut problem = problem_on(create_line_mesh(4, 0.0, 1.0).unwrap(), 2);
    problem
        .add_variable("u", FeType::FirstLagrange, &[])
        .unwrap();
    problem
        .add_kernel("TimeDerivative", "u_dot", &[], &on("u"))
        .unwrap();
    problem
        .add_kernel("BodyForce", "growth", &[], &on("u").with("value", 1.0))
        .unwrap();
    problem.initialize().unwrap();
    problem
}

#[test]
fn backward_euler_steps_shift_time_levels() {
    let mut problem = growth_problem();
    assert_eq!(problem.time(), 0.0);

    problem.advance_time(0.1).unwrap();
    assert!(problem.solve().unwrap().converged);
    for &value in problem.solution().iter() {
        assert_scalar_eq!(value, 0.1, comp = abs, tol = 1e-12);
    }

    problem.advance_time(0.1).unwrap();
    assert_scalar_eq!(problem.time(), 0.2, comp = abs, tol = 1e-15);
    assert_eq!(problem.dt(), 0.1);
    assert!(problem.solve().unwrap().converged);

    let state = problem.state();
    for node in 0..5 {
        assert_scalar_eq!(state.primary[0][node], 0.2, comp = abs, tol = 1e-12);
        assert_scalar_eq!(state.primary[1][node], 0.1, comp = abs, tol = 1e-12);
        assert_scalar_eq!(state.primary[2][node], 0.0, comp = abs, tol = 1e-12);
    }
}

#[test]
fn time_derivative_requires_a_time_step() {
    let mut problem = growth_problem();
    let u = DVector::zeros(problem.n_dofs());
    let mut residual = DVector::zeros(problem.n_dofs());
    assert!(problem.compute_residual(&u, &mut residual).is_err());

    assert!(problem.advance_time(0.0).is_err());
    assert!(problem.advance_time(-1.0).is_err());
    assert_eq!(problem.time(), 0.0);
}

#[test]
fn advancing_before_initialization_is_an_error() {
    let mut problem = problem_on(create_line_mesh(2, 0.0, 1.0).unwrap(), 1);
    let error = problem.advance_time(0.1).unwrap_err();
    assert_eq!(
        error.downcast_ref::<ConfigurationError>(),
        Some(&ConfigurationError::NotInitialized)
    );
}

#[test]
fn dirichlet_values_follow_the_clock() {
    let mut problem = problem_on(create_line_mesh(2, 0.0, 1.0).unwrap(), 1);
    problem
        .add_variable("u", FeType::FirstLagrange, &[])
        .unwrap();
    problem
        .add_kernel("Diffusion", "diffusion", &[], &on("u"))
        .unwrap();
    let ramp = on("u").with("value", 1.0).with("rate", 2.0);
    problem
        .add_bc("DirichletBC", "ramp", &[LINE_RIGHT], &ramp)
        .unwrap();
    problem.initialize().unwrap();
    assert_eq!(problem.essential_constraints().unwrap()[0].value, 1.0);

    problem.advance_time(0.25).unwrap();
    let constraints = problem.essential_constraints().unwrap();
    assert_eq!(constraints.len(), 1);
    assert_eq!(constraints[0].dof, 2);
    assert_eq!(constraints[0].value, 1.5);
}

#[test]
fn objects_only_contribute_inside_their_activation_window() {
    let mut problem = problem_on(create_line_mesh(2, 0.0, 1.0).unwrap(), 1);
    problem
        .add_variable("u", FeType::FirstLagrange, &[])
        .unwrap();
    problem
        .add_kernel("Diffusion", "diffusion", &[], &on("u"))
        .unwrap();
    let pulse = on("u")
        .with("value", 1.0)
        .with("start_time", 1.0)
        .with("end_time", 2.0);
    problem
        .add_kernel("BodyForce", "pulse", &[], &pulse)
        .unwrap();
    problem.initialize().unwrap();

    let u = DVector::zeros(3);
    let mut residual = DVector::zeros(3);
    let mut source_norm = |problem: &mut Problem<f64>| {
        problem.compute_residual(&u, &mut residual).unwrap();
        residual.norm()
    };

    assert_eq!(source_norm(&mut problem), 0.0);
    problem.advance_time(1.0).unwrap();
    assert!(source_norm(&mut problem) > 0.0);
    problem.advance_time(1.0).unwrap();
    assert_eq!(source_norm(&mut problem), 0.0);
}

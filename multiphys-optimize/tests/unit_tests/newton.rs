use matrixcompare::assert_scalar_eq;
use multiphys_optimize::calculus::VectorFunctionBuilder;
use multiphys_optimize::newton::{newton, newton_line_search, BacktrackingLineSearch, NewtonSettings};
use nalgebra::{DVector, DVectorView, DVectorViewMut, Matrix2, Vector2};

fn eval(f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>) {
    f[0] = x[0] * x[0] - 4.0;
    f[1] = x[0] * x[1] - 2.0;
}

fn solve(
    sol: &mut DVectorViewMut<f64>,
    x: &DVectorView<f64>,
    rhs: &DVectorView<f64>,
) -> Result<(), multiphys_optimize::BoxedError> {
    let j = Matrix2::new(2.0 * x[0], 0.0, x[1], x[0]);
    let lu = j.lu();
    let s = lu
        .solve(&Vector2::new(rhs[0], rhs[1]))
        .ok_or("singular Jacobian")?;
    sol[0] = s[0];
    sol[1] = s[1];
    Ok(())
}

#[test]
fn newton_converges_to_root() {
    let function = VectorFunctionBuilder::with_dimension(2)
        .with_function(eval)
        .with_jacobian_solver(solve);

    let mut x = DVector::from_column_slice(&[3.0, 3.0]);
    let mut f = DVector::zeros(2);
    let mut dx = DVector::zeros(2);
    let settings = NewtonSettings {
        max_iterations: 20,
        abs_tolerance: 1e-12,
        rel_tolerance: 0.0,
    };

    let outcome = newton(function, &mut x, &mut f, &mut dx, &settings).unwrap();
    assert!(outcome.converged);
    assert!(outcome.iterations > 0);
    assert!(outcome.residual_norm <= 1e-12);
    assert_scalar_eq!(x[0], 2.0, comp = abs, tol = 1e-10);
    assert_scalar_eq!(x[1], 1.0, comp = abs, tol = 1e-10);
}

#[test]
fn newton_reports_non_convergence_without_error() {
    let function = VectorFunctionBuilder::with_dimension(2)
        .with_function(eval)
        .with_jacobian_solver(solve);

    let mut x = DVector::from_column_slice(&[3.0, 3.0]);
    let mut f = DVector::zeros(2);
    let mut dx = DVector::zeros(2);
    let settings = NewtonSettings {
        max_iterations: 1,
        abs_tolerance: 1e-14,
        rel_tolerance: 0.0,
    };

    let outcome = newton(function, &mut x, &mut f, &mut dx, &settings).unwrap();
    assert!(!outcome.converged);
    assert_eq!(outcome.iterations, 1);
    assert!(outcome.residual_norm < outcome.initial_residual_norm);
}

#[test]
fn backtracking_newton_converges() {
    let function = VectorFunctionBuilder::with_dimension(2)
        .with_function(eval)
        .with_jacobian_solver(solve);

    let mut x = DVector::from_column_slice(&[10.0, -5.0]);
    let mut f = DVector::zeros(2);
    let mut dx = DVector::zeros(2);
    let settings = NewtonSettings {
        rel_tolerance: 0.0,
        abs_tolerance: 1e-12,
        ..NewtonSettings::default()
    };

    let outcome = newton_line_search(
        function,
        &mut x,
        &mut f,
        &mut dx,
        &settings,
        &mut BacktrackingLineSearch::default(),
    )
    .unwrap();
    assert!(outcome.converged);
    assert_scalar_eq!(x[0], 2.0, comp = abs, tol = 1e-8);
    assert_scalar_eq!(x[1], 1.0, comp = abs, tol = 1e-8);
}

#[test]
fn settings_deserialize_with_defaults() {
    let settings: NewtonSettings<f64> = serde_json::from_str(r#"{ "max_iterations": 7 }"#).unwrap();
    assert_eq!(settings.max_iterations, 7);
    assert_eq!(settings.abs_tolerance, NewtonSettings::<f64>::default().abs_tolerance);
}

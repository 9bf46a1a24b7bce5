use crate::{on, problem_on};
use matrixcompare::assert_scalar_eq;
use multiphys::mesh::procedural::create_line_mesh;
use multiphys::parameters::Parameters;
use multiphys::problem::Problem;
use multiphys::variables::FeType;
use nalgebra::DVector;

fn problem_with_dampers(dampers: &[(&str, Parameters)]) -> Problem<f64> {
    let mut problem = problem_on(create_line_mesh(4, 0.0, 1.0).unwrap(), 2);
    problem
        .add_variable("u", FeType::FirstLagrange, &[])
        .unwrap();
    problem
        .add_kernel("Diffusion", "diffusion", &[], &on("u"))
        .unwrap();
    for (i, (kind, parameters)) in dampers.iter().enumerate() {
        problem
            .add_damper(kind, &format!("damper_{}", i), &[], parameters)
            .unwrap();
    }
    problem.initialize().unwrap();
    problem
}

fn damping_of(problem: &mut Problem<f64>, u: f64, step: f64) -> f64 {
    let n = problem.n_dofs();
    problem
        .compute_damping(&DVector::from_element(n, u), &DVector::from_element(n, step))
        .unwrap()
}

#[test]
fn without_dampers_the_full_step_is_taken() {
    let mut problem = problem_with_dampers(&[]);
    assert_eq!(damping_of(&mut problem, 0.0, 100.0), 1.0);
}

#[test]
fn constant_damper_scales_every_step() {
    let mut problem = problem_with_dampers(&[("ConstantDamper", on("u").with("damping", 0.4))]);
    assert_eq!(damping_of(&mut problem, 0.0, 1.0), 0.4);
    assert_eq!(damping_of(&mut problem, 3.0, -0.001), 0.4);
}

#[test]
fn bounding_value_damper_keeps_the_update_within_bounds() {
    let bounds = on("u").with("min_value", 0.0).with("max_value", 1.0);
    let mut problem = problem_with_dampers(&[("BoundingValueDamper", bounds)]);

    assert_eq!(damping_of(&mut problem, 0.5, 0.25), 1.0);
    assert_scalar_eq!(damping_of(&mut problem, 0.5, 1.0), 0.5, comp = abs, tol = 1e-12);
    assert_scalar_eq!(damping_of(&mut problem, 0.5, -2.0), 0.25, comp = abs, tol = 1e-12);
}

#[test]
fn bounding_value_damper_respects_the_minimum_damping() {
    let bounds = on("u")
        .with("max_value", 1.0)
        .with("min_damping", 0.8);
    let mut problem = problem_with_dampers(&[("BoundingValueDamper", bounds)]);
    assert_scalar_eq!(damping_of(&mut problem, 0.5, 1.0), 0.8, comp = abs, tol = 1e-12);
}

#[test]
fn the_most_restrictive_damper_wins() {
    let mut problem = problem_with_dampers(&[
        ("ConstantDamper", on("u").with("damping", 0.9)),
        ("BoundingValueDamper", on("u").with("max_value", 1.0)),
    ]);
    assert_scalar_eq!(damping_of(&mut problem, 0.0, 4.0), 0.25, comp = abs, tol = 1e-12);
    assert_scalar_eq!(damping_of(&mut problem, 0.0, 0.5), 0.9, comp = abs, tol = 1e-12);
}

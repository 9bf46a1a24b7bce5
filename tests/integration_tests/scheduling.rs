use crate::on;
use eyre::eyre;
use matrixcompare::assert_scalar_eq;
use multiphys::config::ProblemConfig;
use multiphys::mesh::procedural::{create_line_mesh, LINE_LEFT, LINE_RIGHT};
use multiphys::problem::Problem;
use multiphys::scheduler::{Block, Scheduler};
use multiphys::space::LagrangeSpace;
use multiphys::variables::FeType;

#[derive(Default)]
struct Simulation {
    problem: Option<Problem<f64>>,
}

impl Simulation {
    fn problem(&mut self) -> eyre::Result<&mut Problem<f64>> {
        self.problem
            .as_mut()
            .ok_or_else(|| eyre!("no problem has been created"))
    }
}

#[test]
fn configuration_blocks_build_and_solve_a_problem() {
    // Declared in reverse, so that everything but the mesh is deferred at first
    let mut root = Block::new("root").with_children([
        Block::new("solve")
            .with_prerequisites(["initialize"])
            .with_task(|sim: &mut Simulation| {
                let outcome = sim.problem()?.solve()?;
                eyre::ensure!(outcome.converged, "Newton did not converge");
                Ok(())
            }),
        Block::new("initialize")
            .with_prerequisites(["kernels", "bcs"])
            .with_task(|sim: &mut Simulation| sim.problem()?.initialize()),
        Block::new("bcs")
            .with_prerequisites(["variables"])
            .with_task(|sim: &mut Simulation| {
                let problem = sim.problem()?;
                problem.add_bc("DirichletBC", "left", &[LINE_LEFT], &on("u").with("value", 0.0))?;
                problem.add_bc("DirichletBC", "right", &[LINE_RIGHT], &on("u").with("value", 0.0))
            }),
        Block::new("kernels")
            .with_prerequisites(["variables"])
            .with_task(|sim: &mut Simulation| {
                let problem = sim.problem()?;
                problem.add_kernel("Diffusion", "diffusion", &[], &on("u"))?;
                problem.add_kernel("BodyForce", "source", &[], &on("u").with("value", 2.0))
            }),
        Block::new("variables")
            .with_prerequisites(["mesh"])
            .with_task(|sim: &mut Simulation| {
                sim.problem()?
                    .add_variable("u", FeType::FirstLagrange, &[])?;
                Ok(())
            }),
        Block::new("mesh").with_task(|sim: &mut Simulation| {
            let space = LagrangeSpace::new(create_line_mesh(4, 0.0, 1.0)?)?;
            sim.problem = Some(Problem::new(space, ProblemConfig::default())?);
            Ok(())
        }),
    ]);

    let mut sim = Simulation::default();
    let report = Scheduler::execute(&mut root, &mut sim).unwrap();
    assert_eq!(
        report.executed,
        vec!["root", "mesh", "variables", "bcs", "kernels", "initialize", "solve"]
    );
    assert_eq!(report.sweeps, 5);

    // -u'' = 2 with homogeneous boundary values gives u = x (1 - x)
    let problem = sim.problem().unwrap();
    for node in 0..5 {
        let x = node as f64 / 4.0;
        let value = problem.nodal_value("u", node).unwrap().unwrap();
        assert_scalar_eq!(value, x * (1.0 - x), comp = abs, tol = 1e-12);
    }
}

#[test]
fn configuration_errors_surface_through_the_failing_block() {
    let mut root = Block::new("root").with_children([
        Block::new("mesh").with_task(|sim: &mut Simulation| {
            let space = LagrangeSpace::new(create_line_mesh(2, 0.0, 1.0)?)?;
            sim.problem = Some(Problem::new(space, ProblemConfig::default())?);
            Ok(())
        }),
        Block::new("kernels")
            .with_prerequisites(["mesh"])
            .with_task(|sim: &mut Simulation| sim.problem()?.add_kernel("Diffusion", "diffusion", &[], &on("u"))),
    ]);

    let mut sim = Simulation::default();
    let error = Scheduler::execute(&mut root, &mut sim).unwrap_err();
    assert_eq!(error.to_string(), "block `kernels` failed");
    assert!(error
        .downcast_ref::<multiphys::error::ConfigurationError>()
        .is_some());
}

use matrixcompare::assert_scalar_eq;
use multiphys::mesh::procedural::{create_line_mesh, create_rectangular_quad_mesh};
use multiphys::space::{FiniteElementSpace, LagrangeSpace, ShapeValues};
use nalgebra::Vector2;

fn volume(shape: &ShapeValues<f64>) -> f64 {
    shape.jxw().iter().sum()
}

fn assert_partition_of_unity(shape: &ShapeValues<f64>) {
    for qp in 0..shape.n_qp() {
        let sum: f64 = (0..shape.n_basis()).map(|i| shape.phi(i, qp)).sum();
        let grad_sum: Vector2<f64> = (0..shape.n_basis())
            .map(|i| *shape.grad_phi(i, qp))
            .sum();
        assert_scalar_eq!(sum, 1.0, comp = abs, tol = 1e-12);
        assert_scalar_eq!(grad_sum.norm(), 0.0, comp = abs, tol = 1e-12);
    }
}

#[test]
fn edge2_shape_values_integrate_element_length() {
    let space = LagrangeSpace::new(create_line_mesh(2, 0.0, 2.0).unwrap()).unwrap();
    let mut shape = ShapeValues::default();
    space.reinit_element(1, &mut shape).unwrap();

    assert_eq!(shape.n_basis(), 2);
    assert_scalar_eq!(volume(&shape), 1.0, comp = abs, tol = 1e-12);
    assert_partition_of_unity(&shape);
    for qp in 0..shape.n_qp() {
        assert_scalar_eq!(shape.grad_phi(0, qp).x, -1.0, comp = abs, tol = 1e-12);
        assert_scalar_eq!(shape.grad_phi(1, qp).x, 1.0, comp = abs, tol = 1e-12);
        let x = shape.q_points()[qp].x;
        assert!(x > 1.0 && x < 2.0);
    }
}

#[test]
fn edge2_sides_are_end_points_with_outward_normals() {
    let space = LagrangeSpace::new(create_line_mesh(2, 0.0, 2.0).unwrap()).unwrap();
    let mut shape = ShapeValues::default();

    space.reinit_side(0, 0, &mut shape).unwrap();
    assert_eq!(shape.n_qp(), 1);
    assert_scalar_eq!(shape.q_points()[0].x, 0.0, comp = abs, tol = 1e-12);
    assert_eq!(shape.normals()[0], Vector2::new(-1.0, 0.0));
    assert_scalar_eq!(shape.phi(0, 0), 1.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(shape.phi(1, 0), 0.0, comp = abs, tol = 1e-12);

    space.reinit_side(1, 1, &mut shape).unwrap();
    assert_scalar_eq!(shape.q_points()[0].x, 2.0, comp = abs, tol = 1e-12);
    assert_eq!(shape.normals()[0], Vector2::new(1.0, 0.0));
}

#[test]
fn quad4_shape_values_integrate_element_area() {
    let space = LagrangeSpace::new(create_rectangular_quad_mesh(2, 1, 3.0, 0.5).unwrap()).unwrap();
    let mut shape = ShapeValues::default();
    space.reinit_element(1, &mut shape).unwrap();

    assert_eq!(shape.n_basis(), 4);
    assert_scalar_eq!(volume(&shape), 0.75, comp = abs, tol = 1e-12);
    assert_partition_of_unity(&shape);

    // Linear functions are interpolated exactly, so their gradient is recovered exactly
    let vertices = space.mesh().vertices();
    let nodes = space.mesh().connectivity()[1].vertex_indices().to_vec();
    for qp in 0..shape.n_qp() {
        let gradient: Vector2<f64> = nodes
            .iter()
            .enumerate()
            .map(|(i, &node)| shape.grad_phi(i, qp) * (2.0 * vertices[node].x + vertices[node].y))
            .sum();
        assert_scalar_eq!(gradient.x, 2.0, comp = abs, tol = 1e-12);
        assert_scalar_eq!(gradient.y, 1.0, comp = abs, tol = 1e-12);
    }
}

#[test]
fn quad4_sides_have_outward_normals_and_side_length_weights() {
    let space = LagrangeSpace::new(create_rectangular_quad_mesh(1, 1, 2.0, 1.0).unwrap()).unwrap();
    let mut shape = ShapeValues::default();
    let expected = [
        (Vector2::new(0.0, -1.0), 2.0),
        (Vector2::new(1.0, 0.0), 1.0),
        (Vector2::new(0.0, 1.0), 2.0),
        (Vector2::new(-1.0, 0.0), 1.0),
    ];
    for (side, (normal, length)) in expected.iter().enumerate() {
        space.reinit_side(0, side, &mut shape).unwrap();
        assert_scalar_eq!(volume(&shape), *length, comp = abs, tol = 1e-12);
        assert_partition_of_unity(&shape);
        for qp in 0..shape.n_qp() {
            assert_scalar_eq!((shape.normals()[qp] - normal).norm(), 0.0, comp = abs, tol = 1e-12);
        }
    }
}

#[test]
fn out_of_range_element_or_side_is_an_error() {
    let space = LagrangeSpace::new(create_line_mesh(2, 0.0, 1.0).unwrap()).unwrap();
    let mut shape = ShapeValues::default();
    assert!(space.reinit_element(2, &mut shape).is_err());
    assert!(space.reinit_side(0, 2, &mut shape).is_err());
}

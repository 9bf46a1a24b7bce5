//! Linear Lagrange reference elements.
use crate::Real;
use nalgebra::{Matrix2, Matrix2x4, Point2, Vector2};
use numeric_literals::replace_float_literals;

/// A two-node segment along the x-axis, with reference domain `[-1, 1]`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Edge2Element<T: Real> {
    vertices: [Point2<T>; 2],
}

impl<T: Real> Edge2Element<T> {
    pub fn from_vertices(vertices: [Point2<T>; 2]) -> Self {
        Self { vertices }
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn evaluate_basis(xi: T) -> [T; 2] {
        [(1.0 - xi) / 2.0, (1.0 + xi) / 2.0]
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn gradients() -> [T; 2] {
        [-0.5, 0.5]
    }

    pub fn map_reference_coords(&self, xi: T) -> Point2<T> {
        let [phi0, phi1] = Self::evaluate_basis(xi);
        Point2::from(self.vertices[0].coords * phi0 + self.vertices[1].coords * phi1)
    }

    /// Derivative of the physical x-coordinate with respect to `xi`.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn reference_jacobian(&self) -> T {
        (self.vertices[1].x - self.vertices[0].x) / 2.0
    }
}

/// A bilinear quadrilateral in two dimensions, with reference domain `[-1, 1]^2`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Quad4Element<T: Real> {
    vertices: [Point2<T>; 4],
}

impl<T: Real> Quad4Element<T> {
    pub fn from_vertices(vertices: [Point2<T>; 4]) -> Self {
        Self { vertices }
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn reference() -> Self {
        Self::from_vertices([
            Point2::new(-1.0, -1.0),
            Point2::new(1.0, -1.0),
            Point2::new(1.0, 1.0),
            Point2::new(-1.0, 1.0),
        ])
    }

    #[rustfmt::skip]
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn evaluate_basis(xi: &Point2<T>) -> [T; 4] {
        // N_{alpha, beta}([alpha, beta]) = 1 with alpha, beta = 1 or -1
        let phi = |alpha, beta, xi: &Point2<T>| (1.0 + alpha * xi[0]) * (1.0 + beta * xi[1]) / 4.0;
        [
            phi(-1.0, -1.0, xi),
            phi( 1.0, -1.0, xi),
            phi( 1.0,  1.0, xi),
            phi(-1.0,  1.0, xi),
        ]
    }

    #[rustfmt::skip]
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn gradients(xi: &Point2<T>) -> Matrix2x4<T> {
        let phi_grad = |alpha, beta, xi: &Point2<T>|
            Vector2::new(
                alpha * (1.0 + beta * xi[1]) / 4.0,
                beta * (1.0 + alpha * xi[0]) / 4.0,
            );

        Matrix2x4::from_columns(&[
            phi_grad(-1.0, -1.0, xi),
            phi_grad( 1.0, -1.0, xi),
            phi_grad( 1.0,  1.0, xi),
            phi_grad(-1.0,  1.0, xi),
        ])
    }

    #[allow(non_snake_case)]
    pub fn map_reference_coords(&self, xi: &Point2<T>) -> Point2<T> {
        let N = Self::evaluate_basis(xi);
        let mut x = Vector2::zeros();
        for (vertex, phi) in self.vertices.iter().zip(N) {
            x += vertex.coords * phi;
        }
        Point2::from(x)
    }

    /// The matrix `dx/dxi`.
    #[allow(non_snake_case)]
    pub fn reference_jacobian(&self, xi: &Point2<T>) -> Matrix2<T> {
        let X: Matrix2x4<T> = Matrix2x4::from_fn(|i, j| self.vertices[j][i]);
        let G = Self::gradients(xi);
        X * G.transpose()
    }
}

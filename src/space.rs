//! Finite element spaces evaluating shape functions on mesh elements and sides.
use crate::connectivity::Connectivity;
use crate::element::{Edge2Element, Quad4Element};
use crate::mesh::Mesh;
use crate::quadrature::QuadratureRule;
use crate::Real;
use eyre::{ensure, eyre};
use nalgebra::{Point2, Vector2};

/// Physical shape function values and gradients at the quadrature points of one element
/// or side.
#[derive(Debug, Clone)]
pub struct ShapeValues<T: Real> {
    n_basis: usize,
    phi: Vec<T>,
    grad_phi: Vec<Vector2<T>>,
    jxw: Vec<T>,
    q_points: Vec<Point2<T>>,
    normals: Vec<Vector2<T>>,
}

impl<T: Real> Default for ShapeValues<T> {
    fn default() -> Self {
        Self {
            n_basis: 0,
            phi: Vec::new(),
            grad_phi: Vec::new(),
            jxw: Vec::new(),
            q_points: Vec::new(),
            normals: Vec::new(),
        }
    }
}

impl<T: Real> ShapeValues<T> {
    /// Resizes all tables, keeping their allocations.
    pub fn resize(&mut self, n_basis: usize, n_qp: usize) {
        self.n_basis = n_basis;
        self.phi.resize(n_basis * n_qp, T::zero());
        self.grad_phi.resize(n_basis * n_qp, Vector2::zeros());
        self.jxw.resize(n_qp, T::zero());
        self.q_points.resize(n_qp, Point2::origin());
        self.normals.resize(n_qp, Vector2::zeros());
    }

    /// A single evaluation point carrying one basis function equal to one, unit weight and
    /// no gradient.
    pub fn set_single_point(&mut self, point: Point2<T>) {
        self.resize(1, 1);
        self.phi[0] = T::one();
        self.grad_phi[0] = Vector2::zeros();
        self.jxw[0] = T::one();
        self.q_points[0] = point;
        self.normals[0] = Vector2::zeros();
    }

    pub fn n_basis(&self) -> usize {
        self.n_basis
    }

    pub fn n_qp(&self) -> usize {
        self.jxw.len()
    }

    pub fn phi(&self, i: usize, qp: usize) -> T {
        self.phi[qp * self.n_basis + i]
    }

    pub fn grad_phi(&self, i: usize, qp: usize) -> &Vector2<T> {
        &self.grad_phi[qp * self.n_basis + i]
    }

    pub fn jxw(&self) -> &[T] {
        &self.jxw
    }

    pub fn q_points(&self) -> &[Point2<T>] {
        &self.q_points
    }

    /// Outward unit normals. Zero on element interiors.
    pub fn normals(&self) -> &[Vector2<T>] {
        &self.normals
    }

    fn set_basis(&mut self, qp: usize, i: usize, phi: T, grad_phi: Vector2<T>) {
        self.phi[qp * self.n_basis + i] = phi;
        self.grad_phi[qp * self.n_basis + i] = grad_phi;
    }
}

/// The discretization collaborator used by the assembly engine.
pub trait FiniteElementSpace<T: Real>: Send + Sync {
    fn mesh(&self) -> &Mesh<T>;

    /// Mutable access for topology or label changes. Callers must rebuild anything derived
    /// from the mesh afterwards.
    fn mesh_mut(&mut self) -> &mut Mesh<T>;

    /// Evaluates first-order Lagrange shape functions at the volume quadrature points of
    /// `element`.
    fn reinit_element(&self, element: usize, shape: &mut ShapeValues<T>) -> eyre::Result<()>;

    /// Evaluates first-order Lagrange shape functions at the quadrature points of one side of
    /// `element`, including outward normals.
    fn reinit_side(&self, element: usize, side: usize, shape: &mut ShapeValues<T>) -> eyre::Result<()>;
}

/// First-order Lagrange space on Edge2 and Quad4 meshes with Gauss quadrature.
#[derive(Debug, Clone)]
pub struct LagrangeSpace<T: Real> {
    mesh: Mesh<T>,
    volume_rule: QuadratureRule<T>,
    side_rule: QuadratureRule<T>,
}

impl<T: Real> LagrangeSpace<T> {
    /// A space with quadrature exact for polynomials of degree 3 along each direction.
    pub fn new(mesh: Mesh<T>) -> eyre::Result<Self> {
        Self::with_quadrature_strength(mesh, 3)
    }

    pub fn with_quadrature_strength(mesh: Mesh<T>, strength: usize) -> eyre::Result<Self> {
        let element_type = mesh
            .connectivity()
            .first()
            .map(Connectivity::element_type)
            .ok_or_else(|| eyre!("cannot build a space on an empty mesh"))?;
        let volume_rule = QuadratureRule::for_element(element_type, strength)?;
        let side_rule = QuadratureRule::gauss_1d(multiphys_quadrature::gauss_points_for_strength(strength))?;
        Ok(Self {
            mesh,
            volume_rule,
            side_rule,
        })
    }

    fn edge(&self, indices: &[usize; 2]) -> Edge2Element<T> {
        let v = self.mesh.vertices();
        Edge2Element::from_vertices([v[indices[0]], v[indices[1]]])
    }

    fn quad(&self, indices: &[usize; 4]) -> Quad4Element<T> {
        let v = self.mesh.vertices();
        Quad4Element::from_vertices([v[indices[0]], v[indices[1]], v[indices[2]], v[indices[3]]])
    }
}

fn edge_gradients<T: Real>(element: usize, edge: &Edge2Element<T>) -> eyre::Result<[Vector2<T>; 2]> {
    let j = edge.reference_jacobian();
    ensure!(j > T::zero(), "element {} is degenerate or inverted", element);
    Ok(Edge2Element::<T>::gradients().map(|g| Vector2::new(g / j, T::zero())))
}

/// Evaluates Quad4 basis functions and physical gradients at reference point `xi`.
/// Returns the determinant of the reference Jacobian.
fn evaluate_quad<T: Real>(
    element: usize,
    quad: &Quad4Element<T>,
    xi: &Point2<T>,
    qp: usize,
    shape: &mut ShapeValues<T>,
) -> eyre::Result<T> {
    let jacobian = quad.reference_jacobian(xi);
    let det = jacobian.determinant();
    ensure!(det > T::zero(), "element {} is degenerate or inverted", element);
    let inverse_transpose = jacobian
        .try_inverse()
        .ok_or_else(|| eyre!("element {} has a singular Jacobian", element))?
        .transpose();
    let phi = Quad4Element::evaluate_basis(xi);
    let gradients = Quad4Element::gradients(xi);
    for i in 0..4 {
        shape.set_basis(qp, i, phi[i], inverse_transpose * gradients.column(i));
    }
    Ok(det)
}

impl<T: Real> FiniteElementSpace<T> for LagrangeSpace<T> {
    fn mesh(&self) -> &Mesh<T> {
        &self.mesh
    }

    fn mesh_mut(&mut self) -> &mut Mesh<T> {
        &mut self.mesh
    }

    fn reinit_element(&self, element: usize, shape: &mut ShapeValues<T>) -> eyre::Result<()> {
        let conn = self
            .mesh
            .connectivity()
            .get(element)
            .ok_or_else(|| eyre!("element {} out of bounds", element))?;
        let rule = &self.volume_rule;
        match conn {
            Connectivity::Edge2(indices) => {
                let edge = self.edge(indices);
                let gradients = edge_gradients(element, &edge)?;
                let j = edge.reference_jacobian();
                shape.resize(2, rule.len());
                for (qp, (w, xi)) in rule.weights.iter().zip(&rule.points).enumerate() {
                    let phi = Edge2Element::evaluate_basis(xi.x);
                    for i in 0..2 {
                        shape.set_basis(qp, i, phi[i], gradients[i]);
                    }
                    shape.jxw[qp] = *w * j;
                    shape.q_points[qp] = edge.map_reference_coords(xi.x);
                    shape.normals[qp] = Vector2::zeros();
                }
            }
            Connectivity::Quad4(indices) => {
                let quad = self.quad(indices);
                shape.resize(4, rule.len());
                for (qp, (w, xi)) in rule.weights.iter().zip(&rule.points).enumerate() {
                    let det = evaluate_quad(element, &quad, xi, qp, shape)?;
                    shape.jxw[qp] = *w * det;
                    shape.q_points[qp] = quad.map_reference_coords(xi);
                    shape.normals[qp] = Vector2::zeros();
                }
            }
        }
        Ok(())
    }

    fn reinit_side(&self, element: usize, side: usize, shape: &mut ShapeValues<T>) -> eyre::Result<()> {
        let conn = self
            .mesh
            .connectivity()
            .get(element)
            .ok_or_else(|| eyre!("element {} out of bounds", element))?;
        ensure!(side < conn.num_sides(), "element {} has no side {}", element, side);
        match conn {
            Connectivity::Edge2(indices) => {
                let edge = self.edge(indices);
                let gradients = edge_gradients(element, &edge)?;
                let xi = if side == 0 { -T::one() } else { T::one() };
                let phi = Edge2Element::evaluate_basis(xi);
                shape.resize(2, 1);
                for i in 0..2 {
                    shape.set_basis(0, i, phi[i], gradients[i]);
                }
                shape.jxw[0] = T::one();
                shape.q_points[0] = edge.map_reference_coords(xi);
                shape.normals[0] = Vector2::new(xi, T::zero());
            }
            Connectivity::Quad4(indices) => {
                let quad = self.quad(indices);
                let rule = &self.side_rule;
                let one = T::one();
                shape.resize(4, rule.len());
                for (qp, (w, s)) in rule.weights.iter().zip(&rule.points).enumerate() {
                    let s = s.x;
                    // Sides are traversed counter-clockwise
                    let (xi, dxi_ds) = match side {
                        0 => (Point2::new(s, -one), Vector2::new(one, T::zero())),
                        1 => (Point2::new(one, s), Vector2::new(T::zero(), one)),
                        2 => (Point2::new(-s, one), Vector2::new(-one, T::zero())),
                        _ => (Point2::new(-one, -s), Vector2::new(T::zero(), -one)),
                    };
                    evaluate_quad(element, &quad, &xi, qp, shape)?;
                    let tangent = quad.reference_jacobian(&xi) * dxi_ds;
                    let length = tangent.norm();
                    shape.jxw[qp] = *w * length;
                    shape.q_points[qp] = quad.map_reference_coords(&xi);
                    shape.normals[qp] = Vector2::new(tangent.y, -tangent.x) / length;
                }
            }
        }
        Ok(())
    }
}

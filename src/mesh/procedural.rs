//! Basic procedural mesh generation routines.
use crate::connectivity::Connectivity;
use crate::mesh::Mesh;
use crate::{BoundaryId, Real, SubdomainId};
use nalgebra::{Point2, Vector2};

/// Boundary ids assigned by [`create_line_mesh`].
pub const LINE_LEFT: BoundaryId = 0;
pub const LINE_RIGHT: BoundaryId = 1;

/// Boundary ids assigned by [`create_rectangular_quad_mesh`].
pub const BOTTOM: BoundaryId = 0;
pub const RIGHT: BoundaryId = 1;
pub const TOP: BoundaryId = 2;
pub const LEFT: BoundaryId = 3;

/// Uniform 1D mesh of `[a, b]` with `num_elements` Edge2 elements in subdomain 0.
///
/// The left end point carries boundary [`LINE_LEFT`], the right end point boundary [`LINE_RIGHT`].
pub fn create_line_mesh<T: Real>(num_elements: usize, a: T, b: T) -> eyre::Result<Mesh<T>> {
    eyre::ensure!(num_elements > 0, "a line mesh needs at least one element");
    let n = T::from_usize(num_elements).expect("Must be able to fit usize in T");
    let h = (b - a) / n;
    let vertices = (0..=num_elements)
        .map(|i| {
            let i_as_t = T::from_usize(i).expect("Must be able to fit usize in T");
            Point2::new(a + h * i_as_t, T::zero())
        })
        .collect();
    let connectivity = (0..num_elements)
        .map(|i| Connectivity::Edge2([i, i + 1]))
        .collect();

    let mut mesh = Mesh::try_new(1, vertices, connectivity, vec![0; num_elements])?;
    mesh.add_side_boundary(0, 0, LINE_LEFT)?;
    mesh.add_side_boundary(num_elements - 1, 1, LINE_RIGHT)?;
    Ok(mesh)
}

/// Uniform mesh of the rectangle `[0, width] x [0, height]` with `nx * ny` Quad4 elements in
/// subdomain 0.
///
/// Elements are numbered row by row from the bottom left corner. The sides carry the
/// boundary ids [`BOTTOM`], [`RIGHT`], [`TOP`] and [`LEFT`].
pub fn create_rectangular_quad_mesh<T: Real>(nx: usize, ny: usize, width: T, height: T) -> eyre::Result<Mesh<T>> {
    eyre::ensure!(nx > 0 && ny > 0, "a rectangular mesh needs at least one element in each direction");
    let to_t = |i: usize| T::from_usize(i).expect("Must be able to fit usize in T");
    let cell_size = Vector2::new(width / to_t(nx), height / to_t(ny));
    let to_global_vertex_index = |i: usize, j: usize| (nx + 1) * j + i;

    let mut vertices = Vec::with_capacity((nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            vertices.push(Point2::new(to_t(i) * cell_size.x, to_t(j) * cell_size.y));
        }
    }

    let mut connectivity = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            connectivity.push(Connectivity::Quad4([
                to_global_vertex_index(i, j),
                to_global_vertex_index(i + 1, j),
                to_global_vertex_index(i + 1, j + 1),
                to_global_vertex_index(i, j + 1),
            ]));
        }
    }

    let mut mesh = Mesh::try_new(2, vertices, connectivity, vec![0; nx * ny])?;
    for j in 0..ny {
        for i in 0..nx {
            let element = j * nx + i;
            if j == 0 {
                mesh.add_side_boundary(element, 0, BOTTOM)?;
            }
            if i == nx - 1 {
                mesh.add_side_boundary(element, 1, RIGHT)?;
            }
            if j == ny - 1 {
                mesh.add_side_boundary(element, 2, TOP)?;
            }
            if i == 0 {
                mesh.add_side_boundary(element, 3, LEFT)?;
            }
        }
    }
    Ok(mesh)
}

/// Reassigns every element's subdomain from the position of its centroid.
pub fn assign_subdomains_by_centroid<T: Real>(
    mesh: &mut Mesh<T>,
    subdomain_at: impl Fn(&Point2<T>) -> SubdomainId,
) -> eyre::Result<()> {
    let centroids: Vec<Point2<T>> = mesh
        .connectivity()
        .iter()
        .map(|conn| {
            let indices = conn.vertex_indices();
            let sum = indices
                .iter()
                .fold(Vector2::zeros(), |acc, &v| acc + mesh.vertices()[v].coords);
            let count = T::from_usize(indices.len()).expect("Must be able to fit usize in T");
            Point2::from(sum / count)
        })
        .collect();
    for (element, centroid) in centroids.iter().enumerate() {
        mesh.set_element_subdomain(element, subdomain_at(centroid))?;
    }
    Ok(())
}

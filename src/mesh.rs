//! Unstructured meshes with subdomain and boundary labels.
use crate::connectivity::{Connectivity, ElementType};
use crate::{BoundaryId, Real, SubdomainId};
use eyre::{bail, ensure, eyre};
use nalgebra::Point2;
use std::collections::{BTreeMap, BTreeSet};

pub mod procedural;

/// A mesh of Edge2 elements on the x-axis (`dim == 1`) or of Quad4 elements in the plane
/// (`dim == 2`).
///
/// Every element carries exactly one subdomain id. Element sides may carry any number of
/// boundary ids. Side neighbors are derived from the connectivity and kept up to date.
#[derive(Debug, Clone)]
pub struct Mesh<T: Real> {
    dim: usize,
    vertices: Vec<Point2<T>>,
    connectivity: Vec<Connectivity>,
    subdomains: Vec<SubdomainId>,
    declared_subdomains: BTreeSet<SubdomainId>,
    side_boundaries: BTreeMap<(usize, usize), Vec<BoundaryId>>,
    neighbors: Vec<Vec<Option<usize>>>,
}

impl<T: Real> Mesh<T> {
    pub fn try_new(
        dim: usize,
        vertices: Vec<Point2<T>>,
        connectivity: Vec<Connectivity>,
        subdomains: Vec<SubdomainId>,
    ) -> eyre::Result<Self> {
        let expected_type = match dim {
            1 => ElementType::Edge2,
            2 => ElementType::Quad4,
            _ => bail!("unsupported mesh dimension {}", dim),
        };
        ensure!(
            subdomains.len() == connectivity.len(),
            "got {} subdomain ids for {} elements",
            subdomains.len(),
            connectivity.len()
        );
        for (element, conn) in connectivity.iter().enumerate() {
            ensure!(
                conn.element_type() == expected_type,
                "element {} is a {:?} element in a {}D mesh",
                element,
                conn.element_type(),
                dim
            );
            if let Some(&v) = conn.vertex_indices().iter().find(|&&v| v >= vertices.len()) {
                bail!("element {} refers to vertex {}, but the mesh has {} vertices", element, v, vertices.len());
            }
        }

        let neighbors = compute_neighbors(&connectivity);
        Ok(Self {
            dim,
            vertices,
            connectivity,
            subdomains,
            declared_subdomains: BTreeSet::new(),
            side_boundaries: BTreeMap::new(),
            neighbors,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn vertices(&self) -> &[Point2<T>] {
        &self.vertices
    }

    pub fn connectivity(&self) -> &[Connectivity] {
        &self.connectivity
    }

    pub fn num_elements(&self) -> usize {
        self.connectivity.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.vertices.len()
    }

    pub fn element_subdomain(&self, element: usize) -> SubdomainId {
        self.subdomains[element]
    }

    pub fn element_subdomains(&self) -> &[SubdomainId] {
        &self.subdomains
    }

    pub fn set_element_subdomain(&mut self, element: usize, subdomain: SubdomainId) -> eyre::Result<()> {
        let slot = self
            .subdomains
            .get_mut(element)
            .ok_or_else(|| eyre!("element {} out of bounds", element))?;
        *slot = subdomain;
        Ok(())
    }

    /// Registers a subdomain id that is valid for restrictions even if no element carries it.
    pub fn declare_subdomain(&mut self, subdomain: SubdomainId) {
        self.declared_subdomains.insert(subdomain);
    }

    /// All subdomain ids: those carried by elements plus the declared ones.
    pub fn subdomain_ids(&self) -> BTreeSet<SubdomainId> {
        let mut ids: BTreeSet<_> = self.subdomains.iter().copied().collect();
        ids.extend(&self.declared_subdomains);
        ids
    }

    /// Subdomain ids carried by at least one element.
    pub fn occupied_subdomain_ids(&self) -> BTreeSet<SubdomainId> {
        self.subdomains.iter().copied().collect()
    }

    pub fn neighbor(&self, element: usize, side: usize) -> Option<usize> {
        self.neighbors
            .get(element)
            .and_then(|sides| sides.get(side))
            .copied()
            .flatten()
    }

    pub fn add_side_boundary(&mut self, element: usize, side: usize, boundary: BoundaryId) -> eyre::Result<()> {
        let conn = self
            .connectivity
            .get(element)
            .ok_or_else(|| eyre!("element {} out of bounds", element))?;
        ensure!(side < conn.num_sides(), "element {} has no side {}", element, side);
        let ids = self.side_boundaries.entry((element, side)).or_default();
        if !ids.contains(&boundary) {
            ids.push(boundary);
        }
        Ok(())
    }

    /// Boundary ids attached to the given element side. Empty if there are none.
    pub fn side_boundary_ids(&self, element: usize, side: usize) -> &[BoundaryId] {
        self.side_boundaries
            .get(&(element, side))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn boundary_ids(&self) -> BTreeSet<BoundaryId> {
        self.side_boundaries.values().flatten().copied().collect()
    }

    /// Sorted, deduplicated vertices on sides carrying the given boundary id.
    pub fn boundary_nodes(&self, boundary: BoundaryId) -> Vec<usize> {
        let mut nodes: Vec<usize> = self
            .side_boundaries
            .iter()
            .filter(|(_, ids)| ids.contains(&boundary))
            .filter_map(|(&(element, side), _)| self.connectivity[element].side_vertices(side))
            .flatten()
            .collect();
        nodes.sort_unstable();
        nodes.dedup();
        nodes
    }

    /// For every node, the sorted set of subdomains of elements touching it.
    pub fn node_subdomains(&self) -> Vec<Vec<SubdomainId>> {
        let mut result = vec![Vec::new(); self.num_nodes()];
        for (conn, &subdomain) in self.connectivity.iter().zip(&self.subdomains) {
            for &v in conn.vertex_indices() {
                result[v].push(subdomain);
            }
        }
        for ids in &mut result {
            ids.sort_unstable();
            ids.dedup();
        }
        result
    }

    /// Element sides not shared with another element, as `(element, side)`.
    pub fn find_boundary_sides(&self) -> Vec<(usize, usize)> {
        self.neighbors
            .iter()
            .enumerate()
            .flat_map(|(element, sides)| {
                sides
                    .iter()
                    .enumerate()
                    .filter(|(_, neighbor)| neighbor.is_none())
                    .map(move |(side, _)| (element, side))
            })
            .collect()
    }
}

fn compute_neighbors(connectivity: &[Connectivity]) -> Vec<Vec<Option<usize>>> {
    let mut neighbors: Vec<Vec<Option<usize>>> = connectivity
        .iter()
        .map(|conn| vec![None; conn.num_sides()])
        .collect();

    // Sides are matched by their sorted vertex lists. BTreeMap keeps this deterministic.
    let mut sides: BTreeMap<Vec<usize>, Vec<(usize, usize)>> = BTreeMap::new();
    for (element, conn) in connectivity.iter().enumerate() {
        for side in 0..conn.num_sides() {
            if let Some(mut key) = conn.side_vertices(side) {
                key.sort_unstable();
                sides.entry(key).or_default().push((element, side));
            }
        }
    }

    for owners in sides.values() {
        if let [(e1, s1), (e2, s2)] = owners.as_slice() {
            neighbors[*e1][*s1] = Some(*e2);
            neighbors[*e2][*s2] = Some(*e1);
        }
    }
    neighbors
}

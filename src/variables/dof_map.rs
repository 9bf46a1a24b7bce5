use crate::mesh::Mesh;
use crate::variables::{FeType, SystemKind, Variable, VariableId};
use crate::Real;

/// Degree-of-freedom numbering of one system.
///
/// Nodal dofs are numbered first, node by node, with the variables of a node adjacent.
/// Elemental dofs follow, element by element. A variable gets no dof on nodes or elements
/// outside its subdomain restriction.
#[derive(Debug, Clone)]
pub struct DofMap {
    system: SystemKind,
    n_dofs: usize,
    // node_dofs[var][node], element_dofs[var][element]
    node_dofs: Vec<Vec<Option<usize>>>,
    element_dofs: Vec<Vec<Vec<usize>>>,
}

impl DofMap {
    pub fn build<T: Real>(mesh: &Mesh<T>, system: SystemKind, variables: &[Variable]) -> Self {
        let num_nodes = mesh.num_nodes();
        let num_elements = mesh.num_elements();
        let node_subdomains = mesh.node_subdomains();

        let mut n_dofs = 0;
        let mut node_dofs = vec![vec![None; num_nodes]; variables.len()];
        for node in 0..num_nodes {
            for (v, variable) in variables.iter().enumerate() {
                let on_node = variable.fe_type.is_nodal()
                    && node_subdomains[node]
                        .iter()
                        .any(|&subdomain| variable.is_defined_on(subdomain));
                if on_node {
                    node_dofs[v][node] = Some(n_dofs);
                    n_dofs += 1;
                }
            }
        }

        let mut element_dofs = vec![vec![Vec::new(); num_elements]; variables.len()];
        for element in 0..num_elements {
            let subdomain = mesh.element_subdomain(element);
            for (v, variable) in variables.iter().enumerate() {
                if variable.fe_type == FeType::ConstantMonomial && variable.is_defined_on(subdomain) {
                    element_dofs[v][element] = vec![n_dofs];
                    n_dofs += 1;
                }
            }
        }

        // Nodal element dof lists follow the element's local node order
        for (conn, element) in mesh.connectivity().iter().zip(0..) {
            let subdomain = mesh.element_subdomain(element);
            for (v, variable) in variables.iter().enumerate() {
                if variable.fe_type.is_nodal() && variable.is_defined_on(subdomain) {
                    element_dofs[v][element] = conn
                        .vertex_indices()
                        .iter()
                        .filter_map(|&node| node_dofs[v][node])
                        .collect();
                }
            }
        }

        Self {
            system,
            n_dofs,
            node_dofs,
            element_dofs,
        }
    }

    pub fn system(&self) -> SystemKind {
        self.system
    }

    pub fn n_dofs(&self) -> usize {
        self.n_dofs
    }

    pub fn num_variables(&self) -> usize {
        self.node_dofs.len()
    }

    /// Global dofs of `variable` on `element`, empty if the variable is not defined there.
    pub fn element_dofs(&self, variable: VariableId, element: usize) -> &[usize] {
        debug_assert_eq!(variable.system, self.system);
        &self.element_dofs[variable.index][element]
    }

    pub fn node_dof(&self, variable: VariableId, node: usize) -> Option<usize> {
        debug_assert_eq!(variable.system, self.system);
        self.node_dofs[variable.index][node]
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Edge2,
    Quad4,
}

/// Connectivity of a single mesh element.
///
/// Quad4 nodes are numbered counter-clockwise starting in the reference corner `(-1, -1)`:
///
/// ```text
/// 3_______2
/// |       |
/// |       |
/// 0_______1
/// ```
///
/// Side `i` of a Quad4 connects node `i` to node `(i + 1) % 4`. The sides of an Edge2 are its
/// two end points.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Connectivity {
    Edge2([usize; 2]),
    Quad4([usize; 4]),
}

impl Connectivity {
    pub fn element_type(&self) -> ElementType {
        match self {
            Self::Edge2(_) => ElementType::Edge2,
            Self::Quad4(_) => ElementType::Quad4,
        }
    }

    pub fn vertex_indices(&self) -> &[usize] {
        match self {
            Self::Edge2(indices) => indices,
            Self::Quad4(indices) => indices,
        }
    }

    pub fn num_sides(&self) -> usize {
        match self {
            Self::Edge2(_) => 2,
            Self::Quad4(_) => 4,
        }
    }

    /// Global vertex indices of the given side, in the element's orientation.
    pub fn side_vertices(&self, side: usize) -> Option<Vec<usize>> {
        match self {
            Self::Edge2(indices) => indices.get(side).map(|&v| vec![v]),
            Self::Quad4(indices) if side < 4 => Some(vec![indices[side], indices[(side + 1) % 4]]),
            Self::Quad4(_) => None,
        }
    }

    /// Local node numbers of the given side.
    pub fn side_local_nodes(&self, side: usize) -> &'static [usize] {
        const EDGE2_SIDES: [&[usize]; 2] = [&[0], &[1]];
        const QUAD4_SIDES: [&[usize]; 4] = [&[0, 1], &[1, 2], &[2, 3], &[3, 0]];
        match self {
            Self::Edge2(_) => EDGE2_SIDES.get(side).copied().unwrap_or(&[]),
            Self::Quad4(_) => QUAD4_SIDES.get(side).copied().unwrap_or(&[]),
        }
    }
}

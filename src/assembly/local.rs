//! Dense element-local residual and Jacobian buffers.
use crate::assembly::ElementData;
use crate::variables::{SystemKind, VariableId};
use crate::Real;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorViewMut};

/// Local residual and Jacobian of all primary variables on one element.
///
/// Rows and columns are laid out variable by variable, following the order of the primary
/// variables. A variable without dofs on the element occupies an empty block.
#[derive(Debug, Clone)]
pub struct LocalBuffers<T: Real> {
    offsets: Vec<usize>,
    sizes: Vec<usize>,
    dofs: Vec<usize>,
    residual: DVector<T>,
    jacobian: DMatrix<T>,
}

impl<T: Real> Default for LocalBuffers<T> {
    fn default() -> Self {
        Self {
            offsets: Vec::new(),
            sizes: Vec::new(),
            dofs: Vec::new(),
            residual: DVector::zeros(0),
            jacobian: DMatrix::zeros(0, 0),
        }
    }
}

impl<T: Real> LocalBuffers<T> {
    /// Lays out the buffers for the primary variables of `data` and zeroes them.
    pub fn prepare(&mut self, data: &ElementData<T>, num_primary: usize, with_jacobian: bool) {
        self.offsets.clear();
        self.sizes.clear();
        self.dofs.clear();
        for index in 0..num_primary {
            let var = VariableId {
                system: SystemKind::Primary,
                index,
            };
            self.offsets.push(self.dofs.len());
            self.sizes.push(data.n_dofs(var));
            self.dofs.extend_from_slice(data.dof_indices(var));
        }

        let n = self.dofs.len();
        if self.residual.len() != n {
            self.residual = DVector::zeros(n);
        } else {
            self.residual.fill(T::zero());
        }
        if with_jacobian {
            if self.jacobian.shape() != (n, n) {
                self.jacobian = DMatrix::zeros(n, n);
            } else {
                self.jacobian.fill(T::zero());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dofs.is_empty()
    }

    /// Global indices of the local rows.
    pub fn dofs(&self) -> &[usize] {
        &self.dofs
    }

    pub fn residual(&self) -> &DVector<T> {
        &self.residual
    }

    pub fn jacobian(&self) -> &DMatrix<T> {
        &self.jacobian
    }

    pub fn residual_block(&mut self, var: VariableId) -> DVectorViewMut<T> {
        debug_assert_eq!(var.system, SystemKind::Primary);
        self.residual
            .rows_mut(self.offsets[var.index], self.sizes[var.index])
    }

    pub fn jacobian_block(&mut self, ivar: VariableId, jvar: VariableId) -> DMatrixViewMut<T> {
        debug_assert_eq!(ivar.system, SystemKind::Primary);
        debug_assert_eq!(jvar.system, SystemKind::Primary);
        let (i, j) = (ivar.index, jvar.index);
        self.jacobian
            .view_mut((self.offsets[i], self.offsets[j]), (self.sizes[i], self.sizes[j]))
    }
}

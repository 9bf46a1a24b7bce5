//! Global residual and Jacobian storage, sparsity patterns and essential constraints.
use crate::Real;
use eyre::{ensure, eyre};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use rayon::prelude::*;
use std::cell::RefCell;
use thread_local::ThreadLocal;

/// A global vector the engine scatters element residuals into.
pub trait GlobalVector<T: Real>: Send {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn zero(&mut self);

    /// `self[dofs[i]] += local[i]`
    fn add_local(&mut self, dofs: &[usize], local: &DVector<T>) -> eyre::Result<()>;

    fn set_entry(&mut self, index: usize, value: T) -> eyre::Result<()>;
}

/// A global matrix the engine scatters element Jacobians into.
pub trait GlobalMatrix<T: Real>: Send {
    fn nrows(&self) -> usize;

    fn zero(&mut self);

    /// `self[dofs[i], dofs[j]] += local[i, j]`
    fn add_local(&mut self, dofs: &[usize], local: &DMatrix<T>) -> eyre::Result<()>;

    /// Zeroes the given rows and places `diagonal` on their diagonal entries.
    fn zero_rows_set_diagonal(&mut self, rows: &[usize], diagonal: T) -> eyre::Result<()>;
}

impl<T: Real> GlobalVector<T> for DVector<T> {
    fn len(&self) -> usize {
        self.nrows()
    }

    fn zero(&mut self) {
        self.fill(T::zero());
    }

    fn add_local(&mut self, dofs: &[usize], local: &DVector<T>) -> eyre::Result<()> {
        ensure!(dofs.len() == local.len(), "dof count does not match local vector length");
        let length = GlobalVector::len(self);
        for (&dof, &value) in dofs.iter().zip(local.iter()) {
            let entry = self
                .get_mut(dof)
                .ok_or_else(|| eyre!("dof {} out of bounds for vector of length {}", dof, length))?;
            *entry += value;
        }
        Ok(())
    }

    fn set_entry(&mut self, index: usize, value: T) -> eyre::Result<()> {
        let length = GlobalVector::len(self);
        let entry = self
            .get_mut(index)
            .ok_or_else(|| eyre!("dof {} out of bounds for vector of length {}", index, length))?;
        *entry = value;
        Ok(())
    }
}

impl<T: Real> GlobalMatrix<T> for CsrMatrix<T> {
    fn nrows(&self) -> usize {
        CsrMatrix::nrows(self)
    }

    fn zero(&mut self) {
        self.values_mut().fill(T::zero());
    }

    fn add_local(&mut self, dofs: &[usize], local: &DMatrix<T>) -> eyre::Result<()> {
        ensure!(
            local.shape() == (dofs.len(), dofs.len()),
            "local matrix shape does not match dof count"
        );
        let nrows = CsrMatrix::nrows(self);
        for (i, &row_index) in dofs.iter().enumerate() {
            ensure!(row_index < nrows, "row {} out of bounds", row_index);
            let mut row = self.row_mut(row_index);
            let (cols, values) = row.cols_and_values_mut();
            for (j, &col_index) in dofs.iter().enumerate() {
                let position = cols
                    .binary_search(&col_index)
                    .map_err(|_| eyre!("entry ({}, {}) is not in the sparsity pattern", row_index, col_index))?;
                values[position] += local[(i, j)];
            }
        }
        Ok(())
    }

    fn zero_rows_set_diagonal(&mut self, rows: &[usize], diagonal: T) -> eyre::Result<()> {
        let nrows = CsrMatrix::nrows(self);
        for &row_index in rows {
            ensure!(row_index < nrows, "row {} out of bounds", row_index);
            let mut row = self.row_mut(row_index);
            let (cols, values) = row.cols_and_values_mut();
            values.fill(T::zero());
            let position = cols
                .binary_search(&row_index)
                .map_err(|_| eyre!("diagonal entry of row {} is not in the sparsity pattern", row_index))?;
            values[position] = diagonal;
        }
        Ok(())
    }
}

impl<T: Real> GlobalMatrix<T> for DMatrix<T> {
    fn nrows(&self) -> usize {
        self.shape().0
    }

    fn zero(&mut self) {
        self.fill(T::zero());
    }

    fn add_local(&mut self, dofs: &[usize], local: &DMatrix<T>) -> eyre::Result<()> {
        ensure!(
            local.shape() == (dofs.len(), dofs.len()),
            "local matrix shape does not match dof count"
        );
        let (nrows, ncols) = self.shape();
        ensure!(
            dofs.iter().all(|&dof| dof < nrows.min(ncols)),
            "dof out of bounds for {}x{} matrix",
            nrows,
            ncols
        );
        for (i, &row) in dofs.iter().enumerate() {
            for (j, &col) in dofs.iter().enumerate() {
                self[(row, col)] += local[(i, j)];
            }
        }
        Ok(())
    }

    fn zero_rows_set_diagonal(&mut self, rows: &[usize], diagonal: T) -> eyre::Result<()> {
        let (nrows, ncols) = self.shape();
        for &row in rows {
            ensure!(row < nrows && row < ncols, "row {} out of bounds", row);
            self.row_mut(row).fill(T::zero());
            self[(row, row)] = diagonal;
        }
        Ok(())
    }
}

/// Builds the pattern coupling all dofs of each element with each other, plus the full
/// diagonal, in parallel.
pub fn assemble_sparsity_pattern<F>(n_dofs: usize, num_elements: usize, element_dofs: F) -> eyre::Result<SparsityPattern>
where
    F: Fn(usize, &mut Vec<usize>) + Sync,
{
    let workspace: ThreadLocal<RefCell<(Vec<usize>, Vec<(usize, usize)>)>> = ThreadLocal::new();
    (0..num_elements)
        .into_par_iter()
        .with_min_len(50)
        .for_each(|element| {
            let mut ws = workspace.get_or_default().borrow_mut();
            let (dofs, coordinates) = &mut *ws;
            dofs.clear();
            element_dofs(element, dofs);
            for &i in dofs.iter() {
                for &j in dofs.iter() {
                    coordinates.push((i, j));
                }
            }
        });

    let mut coordinates: Vec<(usize, usize)> = workspace
        .into_iter()
        .flat_map(|ws| ws.into_inner().1)
        .chain((0..n_dofs).map(|i| (i, i)))
        .collect();
    coordinates.par_sort_unstable();
    coordinates.dedup();

    let mut row_offsets = Vec::with_capacity(n_dofs + 1);
    let mut column_indices = Vec::with_capacity(coordinates.len());
    row_offsets.push(0);
    for (i, j) in coordinates {
        ensure!(i < n_dofs && j < n_dofs, "coordinate ({}, {}) out of bounds", i, j);
        // Consecutive empty rows are impossible since every diagonal entry is present
        while i + 1 > row_offsets.len() {
            row_offsets.push(column_indices.len());
        }
        column_indices.push(j);
    }
    while row_offsets.len() < n_dofs + 1 {
        row_offsets.push(column_indices.len());
    }

    SparsityPattern::try_from_offsets_and_indices(n_dofs, n_dofs, row_offsets, column_indices)
        .map_err(|err| eyre!("invalid sparsity pattern: {}", err))
}

/// A prescribed value for one degree of freedom.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EssentialConstraint<T> {
    pub dof: usize,
    pub value: T,
}

/// Overwrites constrained residual entries with `u[dof] - value`.
///
/// Idempotent, since the result does not depend on the previous residual entries.
pub fn constrain_residual<T: Real>(
    residual: &mut impl GlobalVector<T>,
    u: &DVector<T>,
    constraints: &[EssentialConstraint<T>],
) -> eyre::Result<()> {
    for constraint in constraints {
        let current = *u
            .get(constraint.dof)
            .ok_or_else(|| eyre!("constrained dof {} out of bounds", constraint.dof))?;
        residual.set_entry(constraint.dof, current - constraint.value)?;
    }
    Ok(())
}

/// Replaces constrained Jacobian rows with rows of the identity.
pub fn constrain_jacobian<T: Real>(
    jacobian: &mut impl GlobalMatrix<T>,
    constraints: &[EssentialConstraint<T>],
) -> eyre::Result<()> {
    let rows: Vec<usize> = constraints.iter().map(|constraint| constraint.dof).collect();
    jacobian.zero_rows_set_diagonal(&rows, T::one())
}

/// A zero CSR matrix on the given pattern.
pub fn zero_csr_matrix<T: Real>(pattern: SparsityPattern) -> eyre::Result<CsrMatrix<T>> {
    let values = vec![T::zero(); pattern.nnz()];
    CsrMatrix::try_from_pattern_and_values(pattern, values).map_err(|err| eyre!("failed to create CSR matrix: {}", err))
}

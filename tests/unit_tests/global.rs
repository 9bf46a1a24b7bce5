use matrixcompare::assert_matrix_eq;
use multiphys::assembly::global::{
    assemble_sparsity_pattern, constrain_jacobian, constrain_residual, zero_csr_matrix, EssentialConstraint,
    GlobalMatrix, GlobalVector,
};
use nalgebra::{dmatrix, dvector, DMatrix, DVector};
use nalgebra_sparse::convert::serial::convert_csr_dense;
use nalgebra_sparse::CsrMatrix;
use proptest::collection::{btree_set, vec};
use proptest::prelude::*;

/// Two elements on a 1D chain of three dofs.
fn chain_elements(element: usize, dofs: &mut Vec<usize>) {
    dofs.extend([element, element + 1]);
}

#[test]
fn sparsity_pattern_couples_element_dofs_and_includes_the_diagonal() {
    // Dof 3 belongs to no element but still gets a diagonal entry
    let pattern = assemble_sparsity_pattern(4, 2, chain_elements).unwrap();
    assert_eq!(pattern.major_dim(), 4);
    assert_eq!(pattern.lane(0), &[0, 1]);
    assert_eq!(pattern.lane(1), &[0, 1, 2]);
    assert_eq!(pattern.lane(2), &[1, 2]);
    assert_eq!(pattern.lane(3), &[3]);
}

#[test]
fn csr_add_local_matches_dense_add_local() {
    let pattern = assemble_sparsity_pattern(3, 2, chain_elements).unwrap();
    let mut csr: CsrMatrix<f64> = zero_csr_matrix(pattern).unwrap();
    let mut dense = DMatrix::zeros(3, 3);
    let local = dmatrix![1.0, -1.0;
                         -1.0, 1.0];
    for element in 0..2 {
        let dofs = [element, element + 1];
        csr.add_local(&dofs, &local).unwrap();
        dense.add_local(&dofs, &local).unwrap();
    }

    let expected = dmatrix![1.0, -1.0, 0.0;
                            -1.0, 2.0, -1.0;
                            0.0, -1.0, 1.0];
    assert_matrix_eq!(convert_csr_dense(&csr), expected);
    assert_matrix_eq!(dense, expected);

    GlobalMatrix::zero(&mut csr);
    assert!(csr.values().iter().all(|&v| v == 0.0));
}

#[test]
fn csr_add_local_outside_pattern_is_an_error() {
    let pattern = assemble_sparsity_pattern(3, 2, chain_elements).unwrap();
    let mut csr: CsrMatrix<f64> = zero_csr_matrix(pattern).unwrap();
    let local = DMatrix::from_element(2, 2, 1.0);
    assert!(csr.add_local(&[0, 2], &local).is_err());
    assert!(csr.add_local(&[0, 5], &local).is_err());
}

#[test]
fn vector_add_local_accumulates_and_checks_bounds() {
    let mut r = DVector::zeros(3);
    r.add_local(&[0, 1], &dvector![1.0, 2.0]).unwrap();
    r.add_local(&[1, 2], &dvector![3.0, 4.0]).unwrap();
    assert_eq!(r, dvector![1.0, 5.0, 4.0]);
    assert!(r.add_local(&[3], &dvector![1.0]).is_err());
    assert!(r.add_local(&[0, 1], &dvector![1.0]).is_err());
}

#[test]
fn constraints_replace_rows_and_are_idempotent() {
    let pattern = assemble_sparsity_pattern(3, 2, chain_elements).unwrap();
    let mut jacobian: CsrMatrix<f64> = zero_csr_matrix(pattern).unwrap();
    let local = dmatrix![2.0, -1.0;
                         -1.0, 2.0];
    jacobian.add_local(&[0, 1], &local).unwrap();
    jacobian.add_local(&[1, 2], &local).unwrap();

    let constraints = [
        EssentialConstraint { dof: 0, value: 1.0 },
        EssentialConstraint { dof: 2, value: -2.0 },
    ];
    let u = dvector![3.0, 0.5, 0.0];
    let mut residual = dvector![10.0, 20.0, 30.0];

    for _ in 0..2 {
        constrain_residual(&mut residual, &u, &constraints).unwrap();
        constrain_jacobian(&mut jacobian, &constraints).unwrap();
    }

    assert_eq!(residual, dvector![2.0, 20.0, 2.0]);
    let expected = dmatrix![1.0, 0.0, 0.0;
                            -1.0, 4.0, -1.0;
                            0.0, 0.0, 1.0];
    assert_matrix_eq!(convert_csr_dense(&jacobian), expected);
}

#[test]
fn constraining_an_out_of_bounds_dof_is_an_error() {
    let mut residual = DVector::<f64>::zeros(2);
    let u = DVector::zeros(2);
    let constraints = [EssentialConstraint { dof: 2, value: 0.0 }];
    assert!(constrain_residual(&mut residual, &u, &constraints).is_err());
    assert!(GlobalVector::set_entry(&mut residual, 5, 1.0).is_err());
}

proptest! {
    #[test]
    fn sparsity_pattern_contains_every_element_coupling(
        elements in vec(btree_set(0..12usize, 1..5), 1..10)
    ) {
        let pattern = assemble_sparsity_pattern(12, elements.len(), |e, dofs| dofs.extend(elements[e].iter().copied()))
            .unwrap();
        for i in 0..12 {
            let lane = pattern.lane(i);
            prop_assert!(lane.contains(&i));
            prop_assert!(lane.windows(2).all(|w| w[0] < w[1]));
        }
        for dofs in &elements {
            for &i in dofs {
                for j in dofs {
                    prop_assert!(pattern.lane(i).contains(j));
                }
            }
        }
    }
}

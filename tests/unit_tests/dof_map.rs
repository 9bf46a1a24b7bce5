use multiphys::error::ConfigurationError;
use multiphys::mesh::procedural::create_line_mesh;
use multiphys::variables::{DofMap, FeType, SystemKind, VariableRegistry};
use std::collections::BTreeSet;

#[test]
fn nodal_dofs_precede_elemental_dofs_and_respect_restrictions() {
    let mut mesh = create_line_mesh(3, 0.0, 3.0).unwrap();
    mesh.set_element_subdomain(0, 1).unwrap();
    mesh.set_element_subdomain(1, 1).unwrap();
    mesh.set_element_subdomain(2, 2).unwrap();

    let mut registry = VariableRegistry::new();
    let u = registry
        .add("u", SystemKind::Primary, FeType::FirstLagrange, None)
        .unwrap();
    let v = registry
        .add("v", SystemKind::Primary, FeType::FirstLagrange, Some(BTreeSet::from([2])))
        .unwrap();
    let w = registry
        .add("w", SystemKind::Primary, FeType::ConstantMonomial, Some(BTreeSet::from([1])))
        .unwrap();

    let dof_map = DofMap::build(&mesh, SystemKind::Primary, registry.system(SystemKind::Primary));
    assert_eq!(dof_map.n_dofs(), 8);
    assert_eq!(dof_map.num_variables(), 3);

    // Variables of a node are adjacent
    assert_eq!(dof_map.node_dof(u, 2), Some(2));
    assert_eq!(dof_map.node_dof(v, 2), Some(3));
    assert_eq!(dof_map.node_dof(v, 1), None);
    assert_eq!(dof_map.node_dof(w, 0), None);

    assert_eq!(dof_map.element_dofs(u, 2), &[2, 4]);
    assert_eq!(dof_map.element_dofs(v, 2), &[3, 5]);
    assert!(dof_map.element_dofs(v, 0).is_empty());
    assert_eq!(dof_map.element_dofs(w, 0), &[6]);
    assert_eq!(dof_map.element_dofs(w, 1), &[7]);
    assert!(dof_map.element_dofs(w, 2).is_empty());
}

#[test]
fn systems_are_numbered_independently() {
    let mesh = create_line_mesh(2, 0.0, 1.0).unwrap();
    let mut registry = VariableRegistry::new();
    registry
        .add("u", SystemKind::Primary, FeType::FirstLagrange, None)
        .unwrap();
    let a = registry
        .add("a", SystemKind::Auxiliary, FeType::ConstantMonomial, None)
        .unwrap();
    assert_eq!(a.index, 0);

    let aux = DofMap::build(&mesh, SystemKind::Auxiliary, registry.system(SystemKind::Auxiliary));
    assert_eq!(aux.system(), SystemKind::Auxiliary);
    assert_eq!(aux.n_dofs(), 2);
    assert_eq!(aux.element_dofs(a, 1), &[1]);
}

#[test]
fn variable_names_are_unique_across_systems() {
    let mut registry = VariableRegistry::new();
    registry
        .add("T", SystemKind::Primary, FeType::FirstLagrange, None)
        .unwrap();
    let error = registry
        .add("T", SystemKind::Auxiliary, FeType::ConstantMonomial, None)
        .unwrap_err();
    assert_eq!(error, ConfigurationError::DuplicateName { name: "T".to_string() });

    let error = registry.resolve("diffusion", "c").unwrap_err();
    assert!(matches!(error, ConfigurationError::UnresolvedVariable { .. }));
}

use multiphys::connectivity::Connectivity;
use multiphys::mesh::procedural::{
    assign_subdomains_by_centroid, create_line_mesh, create_rectangular_quad_mesh, BOTTOM, LEFT, LINE_LEFT,
    LINE_RIGHT, RIGHT, TOP,
};
use multiphys::mesh::Mesh;
use nalgebra::Point2;
use std::collections::BTreeSet;

#[test]
fn line_mesh_has_end_point_boundaries() {
    let mesh = create_line_mesh(4, 0.0, 2.0).unwrap();
    assert_eq!(mesh.dim(), 1);
    assert_eq!(mesh.num_elements(), 4);
    assert_eq!(mesh.num_nodes(), 5);
    assert_eq!(mesh.vertices()[2], Point2::new(1.0, 0.0));
    assert_eq!(mesh.boundary_nodes(LINE_LEFT), vec![0]);
    assert_eq!(mesh.boundary_nodes(LINE_RIGHT), vec![4]);
    assert_eq!(mesh.boundary_ids(), BTreeSet::from([LINE_LEFT, LINE_RIGHT]));
    assert_eq!(mesh.find_boundary_sides(), vec![(0, 0), (3, 1)]);
}

#[test]
fn line_mesh_neighbors_are_adjacent_elements() {
    let mesh = create_line_mesh(3, 0.0, 1.0).unwrap();
    assert_eq!(mesh.neighbor(0, 0), None);
    assert_eq!(mesh.neighbor(0, 1), Some(1));
    assert_eq!(mesh.neighbor(1, 0), Some(0));
    assert_eq!(mesh.neighbor(1, 1), Some(2));
    assert_eq!(mesh.neighbor(2, 1), None);
}

#[test]
fn rectangular_mesh_labels_all_four_sides() {
    let mesh = create_rectangular_quad_mesh(3, 2, 3.0, 2.0).unwrap();
    assert_eq!(mesh.dim(), 2);
    assert_eq!(mesh.num_elements(), 6);
    assert_eq!(mesh.num_nodes(), 12);
    assert_eq!(mesh.boundary_nodes(BOTTOM), vec![0, 1, 2, 3]);
    assert_eq!(mesh.boundary_nodes(RIGHT), vec![3, 7, 11]);
    assert_eq!(mesh.boundary_nodes(TOP), vec![8, 9, 10, 11]);
    assert_eq!(mesh.boundary_nodes(LEFT), vec![0, 4, 8]);
    assert_eq!(mesh.side_boundary_ids(0, 0), &[BOTTOM]);
    assert_eq!(mesh.side_boundary_ids(0, 3), &[LEFT]);
    assert!(mesh.side_boundary_ids(0, 1).is_empty());
    assert_eq!(mesh.find_boundary_sides().len(), 10);
}

#[test]
fn rectangular_mesh_neighbors_share_sides() {
    let mesh = create_rectangular_quad_mesh(2, 2, 1.0, 1.0).unwrap();
    // Element 0 is the bottom left cell, element 3 the top right one
    assert_eq!(mesh.neighbor(0, 1), Some(1));
    assert_eq!(mesh.neighbor(0, 2), Some(2));
    assert_eq!(mesh.neighbor(0, 0), None);
    assert_eq!(mesh.neighbor(3, 3), Some(2));
    assert_eq!(mesh.neighbor(3, 0), Some(1));
}

#[test]
fn subdomains_include_declared_but_empty_ones() {
    let mut mesh = create_rectangular_quad_mesh(2, 1, 2.0, 1.0).unwrap();
    assign_subdomains_by_centroid(&mut mesh, |x| if x.x < 1.0 { 1 } else { 2 }).unwrap();
    mesh.declare_subdomain(7);

    assert_eq!(mesh.element_subdomains(), &[1, 2]);
    assert_eq!(mesh.occupied_subdomain_ids(), BTreeSet::from([1, 2]));
    assert_eq!(mesh.subdomain_ids(), BTreeSet::from([1, 2, 7]));

    let node_subdomains = mesh.node_subdomains();
    assert_eq!(node_subdomains[0], vec![1]);
    assert_eq!(node_subdomains[1], vec![1, 2]);
    assert_eq!(node_subdomains[2], vec![2]);
}

#[test]
fn invalid_meshes_are_rejected() {
    let vertices = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)];
    let out_of_range = Mesh::try_new(1, vertices.clone(), vec![Connectivity::Edge2([0, 2])], vec![0]);
    assert!(out_of_range.is_err());

    let missing_subdomain = Mesh::try_new(1, vertices.clone(), vec![Connectivity::Edge2([0, 1])], vec![]);
    assert!(missing_subdomain.is_err());

    let wrong_type = Mesh::try_new(2, vertices.clone(), vec![Connectivity::Edge2([0, 1])], vec![0]);
    assert!(wrong_type.is_err());

    let mut mesh = Mesh::try_new(1, vertices, vec![Connectivity::Edge2([0, 1])], vec![0]).unwrap();
    assert!(mesh.add_side_boundary(0, 2, 5).is_err());
    assert!(mesh.set_element_subdomain(1, 3).is_err());
}

use std::collections::BTreeSet;
use weakform::mesh::{segment_mesh, unit_square_quad_mesh};
use weakform::space::{Family, FiniteElementSpace, FunctionSpace};

fn h1(order: usize, components: usize) -> FunctionSpace {
    FunctionSpace {
        family: Family::H1,
        order,
        components,
    }
}

#[test]
fn h1_spaces_share_nodes_between_elements() {
    let mesh = unit_square_quad_mesh(2);
    let space = FiniteElementSpace::new(&mesh, h1(1, 1)).unwrap();
    assert_eq!(space.num_nodes(), 9);
    assert_eq!(space.num_true_dofs(), 9);
    assert_eq!(space.nodes_per_element(), 4);
    assert_eq!(space.dofs_per_element(), 4);
    assert_eq!(space.element_nodes()[0], vec![0, 1, 4, 3]);
}

#[test]
fn l2_spaces_duplicate_nodes_per_element() {
    let mesh = unit_square_quad_mesh(2);
    let space = FiniteElementSpace::new(
        &mesh,
        FunctionSpace {
            family: Family::L2,
            order: 1,
            components: 1,
        },
    )
    .unwrap();
    assert_eq!(space.num_nodes(), 16);
    assert_eq!(space.element_nodes()[1], vec![4, 5, 6, 7]);
    assert!(space.boundary_facet_nodes().is_err());
}

#[test]
fn higher_order_h1_on_segments_appends_interior_nodes() {
    let mesh = segment_mesh(2);
    let space = FiniteElementSpace::new(&mesh, h1(3, 1)).unwrap();
    // 3 vertices plus 2 interior nodes per element
    assert_eq!(space.num_nodes(), 7);
    assert_eq!(space.element_nodes()[0], vec![0, 1, 3, 4]);
    assert_eq!(space.element_nodes()[1], vec![1, 2, 5, 6]);
}

#[test]
fn dofs_interleave_components_per_node() {
    let mesh = unit_square_quad_mesh(1);
    let space = FiniteElementSpace::new(&mesh, h1(1, 3)).unwrap();
    assert_eq!(space.num_true_dofs(), 12);
    assert_eq!(space.dof_index(2, 0), 6);
    assert_eq!(space.dof_index(2, 2), 8);
}

#[test]
fn boundary_attribute_dofs_are_sorted_and_unique() {
    let mesh = unit_square_quad_mesh(2);
    let space = FiniteElementSpace::new(&mesh, h1(1, 1)).unwrap();

    // Bottom edge, nodes 0, 1, 2
    let bottom = space
        .boundary_attribute_dofs(&BTreeSet::from([1]), None)
        .unwrap();
    assert_eq!(bottom, vec![0, 1, 2]);

    // Bottom and right together share the corner node 2
    let both = space
        .boundary_attribute_dofs(&BTreeSet::from([1, 2]), None)
        .unwrap();
    assert_eq!(both, vec![0, 1, 2, 5, 8]);
}

#[test]
fn boundary_attribute_dofs_respect_the_component_restriction() {
    let mesh = unit_square_quad_mesh(2);
    let space = FiniteElementSpace::new(&mesh, h1(1, 2)).unwrap();
    let bottom_y = space
        .boundary_attribute_dofs(&BTreeSet::from([1]), Some(1))
        .unwrap();
    assert_eq!(bottom_y, vec![1, 3, 5]);

    assert!(space
        .boundary_attribute_dofs(&BTreeSet::from([1]), Some(2))
        .is_err());
}

#[test]
fn unsupported_configurations_are_rejected() {
    let mesh = unit_square_quad_mesh(1);
    // Higher-order continuous spaces exist only on segment meshes
    assert!(FiniteElementSpace::new(&mesh, h1(2, 1)).is_err());
    assert!(FiniteElementSpace::new(
        &mesh,
        FunctionSpace {
            family: Family::HCurl,
            order: 1,
            components: 1,
        }
    )
    .is_err());
    assert!(FiniteElementSpace::new(
        &mesh,
        FunctionSpace {
            family: Family::HDiv,
            order: 1,
            components: 1,
        }
    )
    .is_err());
    assert!(FiniteElementSpace::new(&mesh, h1(1, 0)).is_err());
}

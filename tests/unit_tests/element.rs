use matrixcompare::assert_scalar_eq;
use paste::paste;
use weakform::element::{tabulate_basis, ElementGeometry};
use weakform::quadrature::rule_for_geometry;
use weakform::tensor::{norm, Tensor, Vector};

macro_rules! partition_of_unity_tests {
    ($($name:ident: ($geometry:expr, $order:expr, $dim:literal),)*) => {
        $(
            paste! {
                #[test]
                fn [<partition_of_unity_ $name>]() {
                    let rule = rule_for_geometry::<$dim>($geometry, 3).unwrap();
                    let basis = tabulate_basis($geometry, $order, rule.points()).unwrap();
                    for q in 0..rule.num_points() {
                        let value_sum: f64 = basis.values[q].iter().sum();
                        assert_scalar_eq!(value_sum, 1.0, comp = abs, tol = 1e-12);

                        let mut gradient_sum = Vector::<$dim>::zeros();
                        for gradient in &basis.gradients[q] {
                            gradient_sum += *gradient;
                        }
                        assert!(norm(gradient_sum) <= 1e-11);
                    }
                }
            }
        )*
    }
}

partition_of_unity_tests! {
    segment_p1: (ElementGeometry::Segment, 1, 1),
    segment_p3: (ElementGeometry::Segment, 3, 1),
    triangle_p1: (ElementGeometry::Triangle, 1, 2),
    quad_p1: (ElementGeometry::Quadrilateral, 1, 2),
    quad_p2: (ElementGeometry::Quadrilateral, 2, 2),
    tet_p1: (ElementGeometry::Tetrahedron, 1, 3),
    hex_p1: (ElementGeometry::Hexahedron, 1, 3),
    hex_p2: (ElementGeometry::Hexahedron, 2, 3),
}

#[test]
fn first_order_quad_basis_is_nodal_at_the_vertices() {
    // Conventional counterclockwise vertex ordering on the unit square.
    let vertices = [
        Tensor([0.0, 0.0]),
        Tensor([1.0, 0.0]),
        Tensor([1.0, 1.0]),
        Tensor([0.0, 1.0]),
    ];
    let basis = tabulate_basis(ElementGeometry::Quadrilateral, 1, &vertices).unwrap();
    for q in 0..4 {
        for n in 0..4 {
            let expected = if q == n { 1.0 } else { 0.0 };
            assert_scalar_eq!(basis.values[q][n], expected, comp = abs, tol = 1e-13);
        }
    }
}

#[test]
fn first_order_hex_basis_is_nodal_at_the_vertices() {
    let vertices = [
        Tensor([0.0, 0.0, 0.0]),
        Tensor([1.0, 0.0, 0.0]),
        Tensor([1.0, 1.0, 0.0]),
        Tensor([0.0, 1.0, 0.0]),
        Tensor([0.0, 0.0, 1.0]),
        Tensor([1.0, 0.0, 1.0]),
        Tensor([1.0, 1.0, 1.0]),
        Tensor([0.0, 1.0, 1.0]),
    ];
    let basis = tabulate_basis(ElementGeometry::Hexahedron, 1, &vertices).unwrap();
    for q in 0..8 {
        for n in 0..8 {
            let expected = if q == n { 1.0 } else { 0.0 };
            assert_scalar_eq!(basis.values[q][n], expected, comp = abs, tol = 1e-13);
        }
    }
}

#[test]
fn second_order_segment_basis_is_nodal_endpoints_first() {
    // Nodes are ordered 0, 1, then the midpoint.
    let points = [Tensor([0.0]), Tensor([1.0]), Tensor([0.5])];
    let basis = tabulate_basis(ElementGeometry::Segment, 2, &points).unwrap();
    assert_eq!(basis.nodes_per_element, 3);
    for q in 0..3 {
        for n in 0..3 {
            let expected = if q == n { 1.0 } else { 0.0 };
            assert_scalar_eq!(basis.values[q][n], expected, comp = abs, tol = 1e-13);
        }
    }
}

#[test]
fn simplex_gradients_are_constant() {
    let rule = rule_for_geometry::<2>(ElementGeometry::Triangle, 2).unwrap();
    let basis = tabulate_basis(ElementGeometry::Triangle, 1, rule.points()).unwrap();
    let reference = &basis.gradients[0];
    for q in 1..rule.num_points() {
        for n in 0..3 {
            assert!(norm(basis.gradients[q][n] - reference[n]) <= 1e-14);
        }
    }
    assert!(norm(reference[0] - Tensor([-1.0, -1.0])) <= 1e-14);
    assert!(norm(reference[1] - Tensor([1.0, 0.0])) <= 1e-14);
    assert!(norm(reference[2] - Tensor([0.0, 1.0])) <= 1e-14);
}

#[test]
fn segment_gradients_interpolate_linear_functions_exactly() {
    // An order-2 basis reproduces the derivative of x^2 at its nodes.
    let points = [Tensor([0.25]), Tensor([0.75])];
    let basis = tabulate_basis(ElementGeometry::Segment, 2, &points).unwrap();
    let node_coords = [0.0, 1.0, 0.5];
    for (q, point) in points.iter().enumerate() {
        let mut derivative = 0.0;
        for n in 0..3 {
            derivative += node_coords[n] * node_coords[n] * basis.gradients[q][n][0];
        }
        assert_scalar_eq!(derivative, 2.0 * point[0], comp = abs, tol = 1e-12);
    }
}

#[test]
fn node_counts_per_geometry() {
    assert_eq!(ElementGeometry::Segment.num_nodes(3).unwrap(), 4);
    assert_eq!(ElementGeometry::Quadrilateral.num_nodes(2).unwrap(), 9);
    assert_eq!(ElementGeometry::Hexahedron.num_nodes(2).unwrap(), 27);
    assert_eq!(ElementGeometry::Triangle.num_nodes(1).unwrap(), 3);
    assert_eq!(ElementGeometry::Tetrahedron.num_nodes(1).unwrap(), 4);
}

#[test]
fn unsupported_orders_are_configuration_errors() {
    assert!(ElementGeometry::Triangle.num_nodes(2).is_err());
    assert!(ElementGeometry::Tetrahedron.num_nodes(3).is_err());
    assert!(ElementGeometry::Quadrilateral.num_nodes(0).is_err());
    assert!(tabulate_basis::<2>(ElementGeometry::Triangle, 2, &[]).is_err());
}

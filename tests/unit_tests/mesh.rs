use std::collections::BTreeSet;
use weakform::element::ElementGeometry;
use weakform::mesh::{segment_mesh, unit_cube_hex_mesh, unit_square_quad_mesh, BoundaryFacet, Mesh};
use weakform::tensor::Tensor;

#[test]
fn segment_mesh_layout() {
    let mesh = segment_mesh(4);
    assert_eq!(mesh.geometry(), ElementGeometry::Segment);
    assert_eq!(mesh.num_vertices(), 5);
    assert_eq!(mesh.num_elements(), 4);
    assert_eq!(mesh.boundary_facets().len(), 2);
    assert_eq!(mesh.boundary_attributes(), BTreeSet::from([1, 2]));
    assert_eq!(mesh.vertices()[2][0], 0.5);
}

#[test]
fn unit_square_mesh_layout() {
    let mesh = unit_square_quad_mesh(2);
    assert_eq!(mesh.geometry(), ElementGeometry::Quadrilateral);
    assert_eq!(mesh.num_vertices(), 9);
    assert_eq!(mesh.num_elements(), 4);
    assert_eq!(mesh.boundary_facets().len(), 8);
    assert_eq!(mesh.boundary_attributes(), BTreeSet::from([1, 2, 3, 4]));
    assert_eq!(mesh.max_boundary_attribute(), 4);

    // Vertices are numbered row-major from the origin.
    assert_eq!(mesh.vertices()[0], Tensor([0.0, 0.0]));
    assert_eq!(mesh.vertices()[4], Tensor([0.5, 0.5]));
    assert_eq!(mesh.vertices()[8], Tensor([1.0, 1.0]));

    // Elements are traversed counterclockwise.
    assert_eq!(mesh.connectivity()[0], vec![0, 1, 4, 3]);
}

#[test]
fn square_boundary_facets_are_oriented_outward() {
    let mesh = unit_square_quad_mesh(1);
    for facet in mesh.boundary_facets() {
        let a = mesh.vertices()[facet.vertices[0]];
        let b = mesh.vertices()[facet.vertices[1]];
        let tangent = b - a;
        // Rotating the tangent clockwise must point away from the centroid.
        let normal = Tensor([tangent[1], -tangent[0]]);
        let midpoint = (a + b) * 0.5;
        let outward = midpoint - Tensor([0.5, 0.5]);
        assert!(normal[0] * outward[0] + normal[1] * outward[1] > 0.0);
    }
}

#[test]
fn unit_cube_mesh_layout() {
    let mesh = unit_cube_hex_mesh(2);
    assert_eq!(mesh.geometry(), ElementGeometry::Hexahedron);
    assert_eq!(mesh.num_vertices(), 27);
    assert_eq!(mesh.num_elements(), 8);
    assert_eq!(mesh.boundary_facets().len(), 24);
    assert_eq!(mesh.boundary_attributes(), BTreeSet::from([1, 2, 3, 4, 5, 6]));
}

#[test]
fn cube_boundary_facets_are_oriented_outward() {
    let mesh = unit_cube_hex_mesh(1);
    for facet in mesh.boundary_facets() {
        let v: Vec<_> = facet
            .vertices
            .iter()
            .map(|&i| mesh.vertices()[i])
            .collect();
        let t0 = v[1] - v[0];
        let t1 = v[3] - v[0];
        let normal = Tensor([
            t0[1] * t1[2] - t0[2] * t1[1],
            t0[2] * t1[0] - t0[0] * t1[2],
            t0[0] * t1[1] - t0[1] * t1[0],
        ]);
        let centroid = (v[0] + v[1] + v[2] + v[3]) * 0.25;
        let outward = centroid - Tensor([0.5, 0.5, 0.5]);
        let alignment =
            normal[0] * outward[0] + normal[1] * outward[1] + normal[2] * outward[2];
        assert!(alignment > 0.0);
    }
}

#[test]
fn construction_validates_its_inputs() {
    let vertices = vec![
        Tensor([0.0, 0.0]),
        Tensor([1.0, 0.0]),
        Tensor([1.0, 1.0]),
        Tensor([0.0, 1.0]),
    ];

    // Wrong vertex arity for the geometry
    assert!(Mesh::new(
        ElementGeometry::Quadrilateral,
        vertices.clone(),
        vec![vec![0, 1, 2]],
        vec![],
    )
    .is_err());

    // Out-of-range vertex index
    assert!(Mesh::new(
        ElementGeometry::Quadrilateral,
        vertices.clone(),
        vec![vec![0, 1, 2, 7]],
        vec![],
    )
    .is_err());

    // Boundary attributes must be positive
    assert!(Mesh::new(
        ElementGeometry::Quadrilateral,
        vertices.clone(),
        vec![vec![0, 1, 2, 3]],
        vec![BoundaryFacet {
            vertices: vec![0, 1],
            attribute: 0,
        }],
    )
    .is_err());

    // Geometry dimension must match the embedding dimension
    assert!(Mesh::<2>::new(ElementGeometry::Hexahedron, vertices, vec![], vec![]).is_err());

    let valid = Mesh::new(
        ElementGeometry::Quadrilateral,
        vec![
            Tensor([0.0, 0.0]),
            Tensor([1.0, 0.0]),
            Tensor([1.0, 1.0]),
            Tensor([0.0, 1.0]),
        ],
        vec![vec![0, 1, 2, 3]],
        vec![BoundaryFacet {
            vertices: vec![0, 1],
            attribute: 1,
        }],
    );
    assert!(valid.is_ok());
}

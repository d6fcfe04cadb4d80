//! Minimal single-geometry meshes with attributed boundary facets.
//!
//! A mesh stores vertices, element connectivity and a list of boundary facets.
//! Each facet carries a positive integer attribute, the handle through which
//! boundary conditions and boundary integrals select parts of the boundary.
//!
//! Boundary facets are oriented outward: in 2D a facet `(a, b)` has outward
//! normal obtained by rotating the tangent `b - a` clockwise; in 3D the facet
//! vertices are ordered so that the right-handed cross product of the first
//! two reference tangents points out of the domain.

use crate::element::ElementGeometry;
use crate::tensor::{Tensor, Vector};
use eyre::{bail, Result};
use std::collections::BTreeSet;

/// A boundary facet: its vertices (outward-oriented) and its attribute.
///
/// On 1D meshes facets are single vertices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryFacet {
    pub vertices: Vec<usize>,
    pub attribute: i32,
}

/// A conforming mesh of a single element geometry, embedded in dimension `D`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh<const D: usize> {
    geometry: ElementGeometry,
    vertices: Vec<Vector<D>>,
    connectivity: Vec<Vec<usize>>,
    boundary_facets: Vec<BoundaryFacet>,
}

impl<const D: usize> Mesh<D> {
    pub fn new(
        geometry: ElementGeometry,
        vertices: Vec<Vector<D>>,
        connectivity: Vec<Vec<usize>>,
        boundary_facets: Vec<BoundaryFacet>,
    ) -> Result<Self> {
        if geometry.reference_dim() != D {
            bail!(
                "geometry {:?} cannot tile a mesh of dimension {}",
                geometry,
                D
            );
        }
        for element in &connectivity {
            if element.len() != geometry.num_vertices() {
                bail!(
                    "element with {} vertices in a {:?} mesh",
                    element.len(),
                    geometry
                );
            }
            if let Some(&v) = element.iter().find(|&&v| v >= vertices.len()) {
                bail!("element references nonexistent vertex {}", v);
            }
        }
        let facet_vertices = geometry
            .facet_geometry()
            .map(|g| g.num_vertices())
            // 1D meshes have point facets.
            .unwrap_or(1);
        for facet in &boundary_facets {
            if facet.vertices.len() != facet_vertices {
                bail!(
                    "boundary facet with {} vertices in a {:?} mesh",
                    facet.vertices.len(),
                    geometry
                );
            }
            if let Some(&v) = facet.vertices.iter().find(|&&v| v >= vertices.len()) {
                bail!("boundary facet references nonexistent vertex {}", v);
            }
            if facet.attribute < 1 {
                bail!("boundary attributes are positive, got {}", facet.attribute);
            }
        }
        Ok(Self {
            geometry,
            vertices,
            connectivity,
            boundary_facets,
        })
    }

    pub fn geometry(&self) -> ElementGeometry {
        self.geometry
    }

    pub fn vertices(&self) -> &[Vector<D>] {
        &self.vertices
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn connectivity(&self) -> &[Vec<usize>] {
        &self.connectivity
    }

    pub fn num_elements(&self) -> usize {
        self.connectivity.len()
    }

    pub fn boundary_facets(&self) -> &[BoundaryFacet] {
        &self.boundary_facets
    }

    pub fn boundary_attributes(&self) -> BTreeSet<i32> {
        self.boundary_facets.iter().map(|f| f.attribute).collect()
    }

    pub fn max_boundary_attribute(&self) -> i32 {
        self.boundary_facets
            .iter()
            .map(|f| f.attribute)
            .max()
            .unwrap_or(0)
    }
}

/// A uniform mesh of `n` segments on `[0, 1]`.
///
/// Boundary attributes: `1` at `x = 0`, `2` at `x = 1`.
pub fn segment_mesh(n: usize) -> Mesh<1> {
    assert!(n > 0);
    let vertices = (0..=n).map(|i| Tensor([i as f64 / n as f64])).collect();
    let connectivity = (0..n).map(|i| vec![i, i + 1]).collect();
    let boundary_facets = vec![
        BoundaryFacet {
            vertices: vec![0],
            attribute: 1,
        },
        BoundaryFacet {
            vertices: vec![n],
            attribute: 2,
        },
    ];
    Mesh {
        geometry: ElementGeometry::Segment,
        vertices,
        connectivity,
        boundary_facets,
    }
}

/// An `n x n` quadrilateral mesh of the unit square.
///
/// Boundary attributes: `1` bottom, `2` right, `3` top, `4` left, with facets
/// traversed counterclockwise so normals point outward.
pub fn unit_square_quad_mesh(n: usize) -> Mesh<2> {
    assert!(n > 0);
    let idx = |i: usize, j: usize| i + (n + 1) * j;
    let mut vertices = Vec::with_capacity((n + 1) * (n + 1));
    for j in 0..=n {
        for i in 0..=n {
            vertices.push(Tensor([i as f64 / n as f64, j as f64 / n as f64]));
        }
    }
    let mut connectivity = Vec::with_capacity(n * n);
    for j in 0..n {
        for i in 0..n {
            connectivity.push(vec![
                idx(i, j),
                idx(i + 1, j),
                idx(i + 1, j + 1),
                idx(i, j + 1),
            ]);
        }
    }
    let mut boundary_facets = Vec::with_capacity(4 * n);
    for i in 0..n {
        boundary_facets.push(BoundaryFacet {
            vertices: vec![idx(i, 0), idx(i + 1, 0)],
            attribute: 1,
        });
    }
    for j in 0..n {
        boundary_facets.push(BoundaryFacet {
            vertices: vec![idx(n, j), idx(n, j + 1)],
            attribute: 2,
        });
    }
    for i in 0..n {
        boundary_facets.push(BoundaryFacet {
            vertices: vec![idx(i + 1, n), idx(i, n)],
            attribute: 3,
        });
    }
    for j in 0..n {
        boundary_facets.push(BoundaryFacet {
            vertices: vec![idx(0, j + 1), idx(0, j)],
            attribute: 4,
        });
    }
    Mesh {
        geometry: ElementGeometry::Quadrilateral,
        vertices,
        connectivity,
        boundary_facets,
    }
}

/// An `n x n x n` hexahedral mesh of the unit cube.
///
/// Boundary attributes: `1` at `z = 0`, `2` at `z = 1`, `3` at `x = 0`,
/// `4` at `x = 1`, `5` at `y = 0`, `6` at `y = 1`.
pub fn unit_cube_hex_mesh(n: usize) -> Mesh<3> {
    assert!(n > 0);
    let idx = |i: usize, j: usize, k: usize| i + (n + 1) * (j + (n + 1) * k);
    let coord = |i: usize| i as f64 / n as f64;
    let mut vertices = Vec::with_capacity((n + 1).pow(3));
    for k in 0..=n {
        for j in 0..=n {
            for i in 0..=n {
                vertices.push(Tensor([coord(i), coord(j), coord(k)]));
            }
        }
    }
    let mut connectivity = Vec::with_capacity(n.pow(3));
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                connectivity.push(vec![
                    idx(i, j, k),
                    idx(i + 1, j, k),
                    idx(i + 1, j + 1, k),
                    idx(i, j + 1, k),
                    idx(i, j, k + 1),
                    idx(i + 1, j, k + 1),
                    idx(i + 1, j + 1, k + 1),
                    idx(i, j + 1, k + 1),
                ]);
            }
        }
    }
    let mut boundary_facets = Vec::with_capacity(6 * n * n);
    for a in 0..n {
        for b in 0..n {
            // z = 0 and z = 1
            boundary_facets.push(BoundaryFacet {
                vertices: vec![
                    idx(a, b, 0),
                    idx(a, b + 1, 0),
                    idx(a + 1, b + 1, 0),
                    idx(a + 1, b, 0),
                ],
                attribute: 1,
            });
            boundary_facets.push(BoundaryFacet {
                vertices: vec![
                    idx(a, b, n),
                    idx(a + 1, b, n),
                    idx(a + 1, b + 1, n),
                    idx(a, b + 1, n),
                ],
                attribute: 2,
            });
            // x = 0 and x = 1
            boundary_facets.push(BoundaryFacet {
                vertices: vec![
                    idx(0, a, b),
                    idx(0, a, b + 1),
                    idx(0, a + 1, b + 1),
                    idx(0, a + 1, b),
                ],
                attribute: 3,
            });
            boundary_facets.push(BoundaryFacet {
                vertices: vec![
                    idx(n, a, b),
                    idx(n, a + 1, b),
                    idx(n, a + 1, b + 1),
                    idx(n, a, b + 1),
                ],
                attribute: 4,
            });
            // y = 0 and y = 1
            boundary_facets.push(BoundaryFacet {
                vertices: vec![
                    idx(a, 0, b),
                    idx(a + 1, 0, b),
                    idx(a + 1, 0, b + 1),
                    idx(a, 0, b + 1),
                ],
                attribute: 5,
            });
            boundary_facets.push(BoundaryFacet {
                vertices: vec![
                    idx(a, n, b),
                    idx(a, n, b + 1),
                    idx(a + 1, n, b + 1),
                    idx(a + 1, n, b),
                ],
                attribute: 6,
            });
        }
    }
    Mesh {
        geometry: ElementGeometry::Hexahedron,
        vertices,
        connectivity,
        boundary_facets,
    }
}

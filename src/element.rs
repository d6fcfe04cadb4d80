//! Reference element geometries and nodal Lagrange bases.
//!
//! Geometries are runtime tags; the basis for a `(geometry, order)` pair is
//! tabulated once per integral at the quadrature points of a rule, so shape
//! function evaluation never sits on a hot path.
//!
//! Reference elements are the unit segment/square/cube and the unit
//! right-angle triangle/tetrahedron. Tensor-product geometries support
//! arbitrary order (vertex-first node ordering on segments, lexicographic
//! interior ordering above order one); simplices are first order.

use crate::tensor::{Tensor, Vector};
use eyre::{bail, Result};
use serde::{Deserialize, Serialize};

/// The reference geometry of a mesh element.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementGeometry {
    Segment,
    Triangle,
    Quadrilateral,
    Tetrahedron,
    Hexahedron,
}

impl ElementGeometry {
    pub fn reference_dim(&self) -> usize {
        match self {
            Self::Segment => 1,
            Self::Triangle | Self::Quadrilateral => 2,
            Self::Tetrahedron | Self::Hexahedron => 3,
        }
    }

    pub fn num_vertices(&self) -> usize {
        match self {
            Self::Segment => 2,
            Self::Triangle => 3,
            Self::Quadrilateral => 4,
            Self::Tetrahedron => 4,
            Self::Hexahedron => 8,
        }
    }

    /// Measure (length/area/volume) of the reference element.
    pub fn reference_measure(&self) -> f64 {
        match self {
            Self::Segment | Self::Quadrilateral | Self::Hexahedron => 1.0,
            Self::Triangle => 0.5,
            Self::Tetrahedron => 1.0 / 6.0,
        }
    }

    /// The geometry of this element's boundary facets, if facets have
    /// positive dimension.
    pub fn facet_geometry(&self) -> Option<ElementGeometry> {
        match self {
            Self::Segment => None,
            Self::Triangle | Self::Quadrilateral => Some(Self::Segment),
            Self::Tetrahedron => Some(Self::Triangle),
            Self::Hexahedron => Some(Self::Quadrilateral),
        }
    }

    /// Number of basis functions of the nodal Lagrange basis of `order`.
    pub fn num_nodes(&self, order: usize) -> Result<usize> {
        check_supported(*self, order)?;
        Ok(match self {
            Self::Segment => order + 1,
            Self::Triangle => 3,
            Self::Quadrilateral => (order + 1) * (order + 1),
            Self::Tetrahedron => 4,
            Self::Hexahedron => (order + 1) * (order + 1) * (order + 1),
        })
    }
}

fn check_supported(geometry: ElementGeometry, order: usize) -> Result<()> {
    if order == 0 {
        bail!("nodal bases start at order 1");
    }
    match geometry {
        ElementGeometry::Triangle | ElementGeometry::Tetrahedron if order > 1 => {
            bail!(
                "order {} is not supported on {:?} elements (simplices are first order)",
                order,
                geometry
            )
        }
        _ => Ok(()),
    }
}

/// Basis function values and reference gradients tabulated at a set of points.
///
/// `values[q][n]` and `gradients[q][n]` refer to node `n` at point `q`.
#[derive(Debug, Clone)]
pub struct BasisTable<const D: usize> {
    pub values: Vec<Vec<f64>>,
    pub gradients: Vec<Vec<Vector<D>>>,
    pub nodes_per_element: usize,
}

/// Tabulates the Lagrange basis of `(geometry, order)` at the given points.
pub fn tabulate_basis<const D: usize>(
    geometry: ElementGeometry,
    order: usize,
    points: &[Vector<D>],
) -> Result<BasisTable<D>> {
    if geometry.reference_dim() != D {
        bail!(
            "geometry {:?} has reference dimension {}, points have dimension {}",
            geometry,
            geometry.reference_dim(),
            D
        );
    }
    let nodes_per_element = geometry.num_nodes(order)?;
    let mut values = Vec::with_capacity(points.len());
    let mut gradients = Vec::with_capacity(points.len());
    for point in points {
        let (vals, grads) = shape_functions(geometry, order, *point);
        debug_assert_eq!(vals.len(), nodes_per_element);
        values.push(vals);
        gradients.push(grads);
    }
    Ok(BasisTable {
        values,
        gradients,
        nodes_per_element,
    })
}

/// Values and gradients of every shape function at one reference point.
///
/// `(geometry, order)` must already have passed [`ElementGeometry::num_nodes`].
fn shape_functions<const D: usize>(
    geometry: ElementGeometry,
    order: usize,
    xi: Vector<D>,
) -> (Vec<f64>, Vec<Vector<D>>) {
    match geometry {
        ElementGeometry::Segment => {
            let (vals, derivs) = lagrange_1d(order, xi[0]);
            let grads = derivs.into_iter().map(|d| Tensor::from_fn(|_| d)).collect();
            (vals, grads)
        }
        ElementGeometry::Triangle => {
            let vals = vec![1.0 - xi[0] - xi[1], xi[0], xi[1]];
            let grads = vec![
                grad2(-1.0, -1.0),
                grad2(1.0, 0.0),
                grad2(0.0, 1.0),
            ];
            (vals, grads)
        }
        ElementGeometry::Tetrahedron => {
            let vals = vec![1.0 - xi[0] - xi[1] - xi[2], xi[0], xi[1], xi[2]];
            let grads = vec![
                grad3(-1.0, -1.0, -1.0),
                grad3(1.0, 0.0, 0.0),
                grad3(0.0, 1.0, 0.0),
                grad3(0.0, 0.0, 1.0),
            ];
            (vals, grads)
        }
        ElementGeometry::Quadrilateral => {
            let (vx, dx) = lagrange_1d(order, xi[0]);
            let (vy, dy) = lagrange_1d(order, xi[1]);
            let n1 = order + 1;
            let mut vals = Vec::with_capacity(n1 * n1);
            let mut grads = Vec::with_capacity(n1 * n1);
            for j in 0..n1 {
                for i in 0..n1 {
                    vals.push(vx[i] * vy[j]);
                    grads.push(grad2(dx[i] * vy[j], vx[i] * dy[j]));
                }
            }
            reorder_vertices_first(order, &QUAD_VERTEX_PERM, &mut vals, &mut grads);
            (vals, grads)
        }
        ElementGeometry::Hexahedron => {
            let (vx, dx) = lagrange_1d(order, xi[0]);
            let (vy, dy) = lagrange_1d(order, xi[1]);
            let (vz, dz) = lagrange_1d(order, xi[2]);
            let n1 = order + 1;
            let mut vals = Vec::with_capacity(n1 * n1 * n1);
            let mut grads = Vec::with_capacity(n1 * n1 * n1);
            for k in 0..n1 {
                for j in 0..n1 {
                    for i in 0..n1 {
                        vals.push(vx[i] * vy[j] * vz[k]);
                        grads.push(grad3(
                            dx[i] * vy[j] * vz[k],
                            vx[i] * dy[j] * vz[k],
                            vx[i] * vy[j] * dz[k],
                        ));
                    }
                }
            }
            reorder_vertices_first(order, &HEX_VERTEX_PERM, &mut vals, &mut grads);
            (vals, grads)
        }
    }
}

// Lexicographic index of each vertex in conventional vertex ordering, for
// first-order tensor-product elements.
const QUAD_VERTEX_PERM: [usize; 4] = [0, 1, 3, 2];
const HEX_VERTEX_PERM: [usize; 8] = [0, 1, 3, 2, 4, 5, 7, 6];

fn reorder_vertices_first<const D: usize>(
    order: usize,
    perm: &[usize],
    vals: &mut [f64],
    grads: &mut [Vector<D>],
) {
    // Above order one the lexicographic ordering is kept as-is; it is only
    // consumed element-locally (discontinuous spaces).
    if order == 1 {
        let vals_lex: Vec<_> = vals.to_vec();
        let grads_lex: Vec<_> = grads.to_vec();
        for (n, &lex) in perm.iter().enumerate() {
            vals[n] = vals_lex[lex];
            grads[n] = grads_lex[lex];
        }
    }
}

fn grad2<const D: usize>(x: f64, y: f64) -> Vector<D> {
    let entries = [x, y];
    Tensor::from_fn(|d| entries[d])
}

fn grad3<const D: usize>(x: f64, y: f64, z: f64) -> Vector<D> {
    let entries = [x, y, z];
    Tensor::from_fn(|d| entries[d])
}

/// Values and first derivatives of the 1D Lagrange basis of degree `p` on
/// `[0, 1]`, with equispaced nodes ordered endpoints first.
fn lagrange_1d(p: usize, x: f64) -> (Vec<f64>, Vec<f64>) {
    let nodes = lagrange_nodes_1d(p);
    let n = nodes.len();
    let mut values = Vec::with_capacity(n);
    let mut derivatives = Vec::with_capacity(n);
    for k in 0..n {
        let mut value = 1.0;
        for j in 0..n {
            if j != k {
                value *= (x - nodes[j]) / (nodes[k] - nodes[j]);
            }
        }
        values.push(value);

        let mut derivative = 0.0;
        for m in 0..n {
            if m == k {
                continue;
            }
            let mut term = 1.0 / (nodes[k] - nodes[m]);
            for j in 0..n {
                if j != k && j != m {
                    term *= (x - nodes[j]) / (nodes[k] - nodes[j]);
                }
            }
            derivative += term;
        }
        derivatives.push(derivative);
    }
    (values, derivatives)
}

/// Node coordinates for [`lagrange_1d`]: `0`, `1`, then interior nodes.
fn lagrange_nodes_1d(p: usize) -> Vec<f64> {
    let mut nodes = vec![0.0, 1.0];
    for k in 1..p {
        nodes.push(k as f64 / p as f64);
    }
    nodes
}

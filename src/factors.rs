//! Geometric factors: quantities of the reference-to-physical map, evaluated
//! once per integral at every (element, quadrature point) pair.
//!
//! The map is isoparametric with the first-order vertex basis of the element
//! geometry, so curved elements are approximated by their vertex positions.

use crate::element::tabulate_basis;
use crate::mesh::Mesh;
use crate::tensor::{Matrix, Tensor, Vector};
use eyre::{bail, Result};

/// Jacobians and physical positions for every quadrature point of every
/// element, flattened as `element * num_quadrature_points + q`.
#[derive(Debug, Clone)]
pub struct DomainFactors<const D: usize> {
    pub jacobians: Vec<Matrix<D, D>>,
    pub positions: Vec<Vector<D>>,
    pub num_quadrature_points: usize,
}

pub fn domain_factors<const D: usize>(
    mesh: &Mesh<D>,
    points: &[Vector<D>],
) -> Result<DomainFactors<D>> {
    let basis = tabulate_basis(mesh.geometry(), 1, points)?;
    let mut jacobians = Vec::with_capacity(mesh.num_elements() * points.len());
    let mut positions = Vec::with_capacity(mesh.num_elements() * points.len());
    for element in mesh.connectivity() {
        for q in 0..points.len() {
            let mut x = Vector::<D>::zeros();
            let mut jacobian = Matrix::<D, D>::zeros();
            for (v, &vertex) in element.iter().enumerate() {
                let position = mesh.vertices()[vertex];
                let value = basis.values[q][v];
                let gradient = basis.gradients[q][v];
                for d in 0..D {
                    x[d] += value * position[d];
                    for r in 0..D {
                        jacobian[d][r] += position[d] * gradient[r];
                    }
                }
            }
            positions.push(x);
            jacobians.push(jacobian);
        }
    }
    Ok(DomainFactors {
        jacobians,
        positions,
        num_quadrature_points: points.len(),
    })
}

/// Surface quantities for a subset of boundary facets, flattened as
/// `facet_index_in_subset * num_quadrature_points + q`.
///
/// `measures` holds the surface Jacobian (the quadrature weight multiplier);
/// `normals` are unit outward normals, relying on the mesh's facet
/// orientation convention.
#[derive(Debug, Clone)]
pub struct BoundaryFactors<const D: usize> {
    pub positions: Vec<Vector<D>>,
    pub normals: Vec<Vector<D>>,
    pub measures: Vec<f64>,
    pub num_quadrature_points: usize,
}

pub fn boundary_factors<const D: usize, const FD: usize>(
    mesh: &Mesh<D>,
    facets: &[usize],
    points: &[Vector<FD>],
) -> Result<BoundaryFactors<D>> {
    if FD + 1 != D {
        bail!("boundary facets of a {}-dimensional mesh have dimension {}", D, D - 1);
    }
    let facet_geometry = match mesh.geometry().facet_geometry() {
        Some(g) => g,
        None => bail!("a 1-dimensional mesh has no boundary facets to integrate over"),
    };
    let basis = tabulate_basis(facet_geometry, 1, points)?;
    let mut positions = Vec::with_capacity(facets.len() * points.len());
    let mut normals = Vec::with_capacity(facets.len() * points.len());
    let mut measures = Vec::with_capacity(facets.len() * points.len());
    for &facet_index in facets {
        let facet = &mesh.boundary_facets()[facet_index];
        for q in 0..points.len() {
            let mut x = Vector::<D>::zeros();
            // Columns of the (D x FD) surface Jacobian.
            let mut tangents = [Vector::<D>::zeros(); FD];
            for (v, &vertex) in facet.vertices.iter().enumerate() {
                let position = mesh.vertices()[vertex];
                let value = basis.values[q][v];
                let gradient = basis.gradients[q][v];
                for d in 0..D {
                    x[d] += value * position[d];
                    for (k, tangent) in tangents.iter_mut().enumerate() {
                        tangent[d] += position[d] * gradient[k];
                    }
                }
            }
            let (normal, measure) = facet_normal(&tangents);
            positions.push(x);
            normals.push(normal);
            measures.push(measure);
        }
    }
    Ok(BoundaryFactors {
        positions,
        normals,
        measures,
        num_quadrature_points: points.len(),
    })
}

/// Unit outward normal and surface measure from the facet tangents.
fn facet_normal<const D: usize, const FD: usize>(
    tangents: &[Vector<D>; FD],
) -> (Vector<D>, f64) {
    match D {
        2 => {
            let t = tangents[0];
            let measure = (t[0] * t[0] + t[1] * t[1]).sqrt();
            let normal = [t[1] / measure, -t[0] / measure];
            (Tensor::from_fn(|d| normal[d]), measure)
        }
        3 => {
            let (a, b) = (tangents[0], tangents[1]);
            let cross = [
                a[1] * b[2] - a[2] * b[1],
                a[2] * b[0] - a[0] * b[2],
                a[0] * b[1] - a[1] * b[0],
            ];
            let measure = (cross[0] * cross[0] + cross[1] * cross[1] + cross[2] * cross[2]).sqrt();
            (Tensor::from_fn(|d| cross[d] / measure), measure)
        }
        _ => unreachable!("boundary factors exist for D in {{2, 3}} only"),
    }
}

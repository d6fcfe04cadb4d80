//! Kernels for integrals over attributed boundary facets.
//!
//! Structured like the domain kernels, but the integrand sees `(x, n, u)` and
//! no field gradient, the Jacobian scaling is the surface measure, and the
//! derivative cache reduces to `∂s/∂u` per quadrature point.

use crate::element::BasisTable;
use crate::factors::BoundaryFactors;
use crate::tensor::{dot, DifferentiableScalar, Dual, Matrix, Tensor, Vector};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

/// A pointwise integrand for boundary integrals: physical position, unit
/// outward normal and the trace of the bound trial field.
pub trait BoundaryQFunction<const D: usize, const C: usize>: Send + Sync {
    fn call<S: DifferentiableScalar>(
        &self,
        x: Vector<D>,
        n: Vector<D>,
        u: Tensor<S, C>,
    ) -> Tensor<S, C>;
}

/// Geometric and basis data for one boundary integral. `FD` is the facet
/// reference dimension, `D - 1`.
pub(crate) struct BoundaryData<const D: usize, const FD: usize> {
    pub factors: BoundaryFactors<D>,
    pub weights: Vec<f64>,
    pub test_basis: BasisTable<FD>,
    pub trial_basis: BasisTable<FD>,
}

impl<const D: usize, const FD: usize> BoundaryData<D, FD> {
    fn num_quadrature_points(&self) -> usize {
        self.factors.num_quadrature_points
    }
}

fn interpolate<const FD: usize, const C: usize>(
    basis: &BasisTable<FD>,
    q: usize,
    u_e: &[f64],
) -> Vector<C> {
    let mut u = Vector::<C>::zeros();
    for n in 0..basis.nodes_per_element {
        let value = basis.values[q][n];
        for c in 0..C {
            u[c] += value * u_e[n * C + c];
        }
    }
    u
}

pub(crate) fn evaluation_kernel<const D: usize, const FD: usize, const C: usize, F>(
    qf: &F,
    data: &BoundaryData<D, FD>,
    input: &DVector<f64>,
    output: &mut DVector<f64>,
) where
    F: BoundaryQFunction<D, C>,
{
    let nq = data.num_quadrature_points();
    let test_dofs = data.test_basis.nodes_per_element * C;
    let trial_dofs = data.trial_basis.nodes_per_element * C;
    output
        .as_mut_slice()
        .par_chunks_mut(test_dofs)
        .zip(input.as_slice().par_chunks(trial_dofs))
        .enumerate()
        .for_each(|(facet, (out, u_e))| {
            out.fill(0.0);
            for q in 0..nq {
                let position = data.factors.positions[facet * nq + q];
                let normal = data.factors.normals[facet * nq + q];
                let scale = data.weights[q] * data.factors.measures[facet * nq + q];
                let u = interpolate::<FD, C>(&data.trial_basis, q, u_e);
                let s = qf.call(position, normal, u);
                for i in 0..data.test_basis.nodes_per_element {
                    let value = data.test_basis.values[q][i];
                    for c in 0..C {
                        out[i * C + c] += scale * s[c] * value;
                    }
                }
            }
        });
}

pub(crate) fn evaluation_with_derivatives_kernel<
    const D: usize,
    const FD: usize,
    const C: usize,
    F,
>(
    qf: &F,
    data: &BoundaryData<D, FD>,
    cache: &mut [Matrix<C, C>],
    input: &DVector<f64>,
    output: &mut DVector<f64>,
) where
    F: BoundaryQFunction<D, C>,
{
    let nq = data.num_quadrature_points();
    let test_dofs = data.test_basis.nodes_per_element * C;
    let trial_dofs = data.trial_basis.nodes_per_element * C;
    output
        .as_mut_slice()
        .par_chunks_mut(test_dofs)
        .zip(input.as_slice().par_chunks(trial_dofs))
        .zip(cache.par_chunks_mut(nq))
        .enumerate()
        .for_each(|(facet, ((out, u_e), tangents))| {
            out.fill(0.0);
            for q in 0..nq {
                let position = data.factors.positions[facet * nq + q];
                let normal = data.factors.normals[facet * nq + q];
                let scale = data.weights[q] * data.factors.measures[facet * nq + q];
                let u = interpolate::<FD, C>(&data.trial_basis, q, u_e);
                let u_dual: Tensor<Dual<Vector<C>>, C> = Tensor::from_fn(|c| Dual {
                    value: u[c],
                    gradient: Tensor::from_fn(|k| if k == c { 1.0 } else { 0.0 }),
                });
                let s_dual = qf.call(position, normal, u_dual);
                tangents[q] = Tensor::from_fn(|c| s_dual[c].gradient);
                for i in 0..data.test_basis.nodes_per_element {
                    let value = data.test_basis.values[q][i];
                    for c in 0..C {
                        out[i * C + c] += scale * s_dual[c].value * value;
                    }
                }
            }
        });
}

pub(crate) fn gradient_kernel<const D: usize, const FD: usize, const C: usize>(
    data: &BoundaryData<D, FD>,
    cache: &[Matrix<C, C>],
    input: &DVector<f64>,
    output: &mut DVector<f64>,
) {
    let nq = data.num_quadrature_points();
    let test_dofs = data.test_basis.nodes_per_element * C;
    let trial_dofs = data.trial_basis.nodes_per_element * C;
    output
        .as_mut_slice()
        .par_chunks_mut(test_dofs)
        .zip(input.as_slice().par_chunks(trial_dofs))
        .zip(cache.par_chunks(nq))
        .enumerate()
        .for_each(|(facet, ((out, du_e), tangents))| {
            out.fill(0.0);
            for q in 0..nq {
                let scale = data.weights[q] * data.factors.measures[facet * nq + q];
                let delta_u = interpolate::<FD, C>(&data.trial_basis, q, du_e);
                let ds: Vector<C> = Tensor::from_fn(|c| dot(tangents[q][c], delta_u));
                for i in 0..data.test_basis.nodes_per_element {
                    let value = data.test_basis.values[q][i];
                    for c in 0..C {
                        out[i * C + c] += scale * ds[c] * value;
                    }
                }
            }
        });
}

pub(crate) fn element_gradient_kernel<const D: usize, const FD: usize, const C: usize>(
    data: &BoundaryData<D, FD>,
    cache: &[Matrix<C, C>],
    output: &mut [DMatrix<f64>],
) {
    let nq = data.num_quadrature_points();
    output
        .par_iter_mut()
        .zip(cache.par_chunks(nq))
        .enumerate()
        .for_each(|(facet, (matrix, tangents))| {
            matrix.fill(0.0);
            for q in 0..nq {
                let scale = data.weights[q] * data.factors.measures[facet * nq + q];
                for j in 0..data.trial_basis.nodes_per_element {
                    let trial_value = data.trial_basis.values[q][j];
                    for i in 0..data.test_basis.nodes_per_element {
                        let test_value = data.test_basis.values[q][i];
                        for cj in 0..C {
                            for ci in 0..C {
                                matrix[(i * C + ci, j * C + cj)] += scale
                                    * test_value
                                    * tangents[q][ci][cj]
                                    * trial_value;
                            }
                        }
                    }
                }
            }
        });
}

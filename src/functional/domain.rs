//! Kernels for integrals over the mesh interior.
//!
//! Every kernel loops over elements in parallel and over quadrature points
//! within an element. The integrand is evaluated at `(x, u, du)` with `du` the
//! physical gradient `du_ref · J⁻¹`; its outputs `(s, F)` are tested against
//! shape values and physical shape gradients and scaled by `w · |det J|`.

use crate::element::BasisTable;
use crate::factors::DomainFactors;
use crate::tensor::dual::Gradient;
use crate::tensor::{
    det, dot, inner, inv, DifferentiableScalar, Dual, Matrix, Tensor, Tensor3, Tensor4, Vector,
};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// A pointwise integrand for domain integrals.
///
/// Implementors provide one generic evaluation over the scalar type `S`; the
/// kernels instantiate it with `f64` for plain evaluation and with dual
/// numbers for differentiation. `x` is the physical position, `u` the value of
/// the bound trial field, `du` its physical gradient. The returned pair
/// `(s, F)` enters the weak form as `∫ s · v + F : ∇v`.
pub trait DomainQFunction<const D: usize, const C: usize>: Send + Sync {
    fn call<S: DifferentiableScalar>(
        &self,
        x: Vector<D>,
        u: Tensor<S, C>,
        du: Tensor<Tensor<S, D>, C>,
    ) -> (Tensor<S, C>, Tensor<Tensor<S, D>, C>);
}

/// Joint gradient carrier for differentiating an integrand with respect to
/// its value and gradient arguments in a single pass.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ArgumentGradient<const C: usize, const D: usize> {
    pub d_u: Vector<C>,
    pub d_du: Matrix<C, D>,
}

impl<const C: usize, const D: usize> ArgumentGradient<C, D> {
    fn zeros() -> Self {
        Self {
            d_u: Vector::zeros(),
            d_du: Matrix::zeros(),
        }
    }
}

impl<const C: usize, const D: usize> Add for ArgumentGradient<C, D> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            d_u: self.d_u + rhs.d_u,
            d_du: self.d_du + rhs.d_du,
        }
    }
}

impl<const C: usize, const D: usize> Sub for ArgumentGradient<C, D> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            d_u: self.d_u - rhs.d_u,
            d_du: self.d_du - rhs.d_du,
        }
    }
}

impl<const C: usize, const D: usize> Neg for ArgumentGradient<C, D> {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            d_u: -self.d_u,
            d_du: -self.d_du,
        }
    }
}

impl<const C: usize, const D: usize> Mul<f64> for ArgumentGradient<C, D> {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self {
            d_u: self.d_u * rhs,
            d_du: self.d_du * rhs,
        }
    }
}

impl<const C: usize, const D: usize> AddAssign for ArgumentGradient<C, D> {
    fn add_assign(&mut self, rhs: Self) {
        self.d_u += rhs.d_u;
        self.d_du += rhs.d_du;
    }
}

impl<const C: usize, const D: usize> SubAssign for ArgumentGradient<C, D> {
    fn sub_assign(&mut self, rhs: Self) {
        self.d_u -= rhs.d_u;
        self.d_du -= rhs.d_du;
    }
}

impl<const C: usize, const D: usize> Gradient for ArgumentGradient<C, D> {
    fn zero() -> Self {
        Self::zeros()
    }
}

/// Integrand derivatives at one quadrature point, stored by the derivative
/// pass and consumed by the gradient kernels.
#[derive(Debug, Copy, Clone)]
pub struct QPointTangent<const C: usize, const D: usize> {
    pub ds_du: Matrix<C, C>,
    pub ds_ddu: Tensor3<C, C, D>,
    pub df_du: Tensor3<C, D, C>,
    pub df_ddu: Tensor4<C, D, C, D>,
}

impl<const C: usize, const D: usize> QPointTangent<C, D> {
    pub fn zeros() -> Self {
        Self {
            ds_du: Matrix::zeros(),
            ds_ddu: Tensor::zeros(),
            df_du: Tensor::zeros(),
            df_ddu: Tensor::zeros(),
        }
    }
}

/// Everything a domain kernel needs besides the state vector: geometric
/// factors, quadrature weights and the tabulated test/trial bases.
pub(crate) struct DomainData<const D: usize> {
    pub factors: DomainFactors<D>,
    pub weights: Vec<f64>,
    pub test_basis: BasisTable<D>,
    pub trial_basis: BasisTable<D>,
}

impl<const D: usize> DomainData<D> {
    fn num_quadrature_points(&self) -> usize {
        self.factors.num_quadrature_points
    }
}

fn interpolate<const D: usize, const C: usize>(
    basis: &BasisTable<D>,
    q: usize,
    u_e: &[f64],
) -> (Vector<C>, Matrix<C, D>) {
    let mut u = Vector::<C>::zeros();
    let mut du_ref = Matrix::<C, D>::zeros();
    for n in 0..basis.nodes_per_element {
        let value = basis.values[q][n];
        let gradient = basis.gradients[q][n];
        for c in 0..C {
            let coefficient = u_e[n * C + c];
            u[c] += value * coefficient;
            for r in 0..D {
                du_ref[c][r] += coefficient * gradient[r];
            }
        }
    }
    (u, du_ref)
}

/// Accumulates `scale * (s · v_i + F : ∇v_i)` over the element's test dofs.
fn accumulate<const D: usize, const C: usize>(
    out: &mut [f64],
    test_basis: &BasisTable<D>,
    q: usize,
    jac_inv: Matrix<D, D>,
    scale: f64,
    s: Vector<C>,
    f: Matrix<C, D>,
) {
    for i in 0..test_basis.nodes_per_element {
        let value = test_basis.values[q][i];
        let grad_phys = dot(test_basis.gradients[q][i], jac_inv);
        for c in 0..C {
            out[i * C + c] += scale * (s[c] * value + dot(f[c], grad_phys));
        }
    }
}

/// Residual kernel: evaluates the integrand and tests it, without touching
/// derivatives.
pub(crate) fn evaluation_kernel<const D: usize, const C: usize, F>(
    qf: &F,
    data: &DomainData<D>,
    input: &DVector<f64>,
    output: &mut DVector<f64>,
) where
    F: DomainQFunction<D, C>,
{
    let nq = data.num_quadrature_points();
    let test_dofs = data.test_basis.nodes_per_element * C;
    let trial_dofs = data.trial_basis.nodes_per_element * C;
    output
        .as_mut_slice()
        .par_chunks_mut(test_dofs)
        .zip(input.as_slice().par_chunks(trial_dofs))
        .enumerate()
        .for_each(|(element, (out, u_e))| {
            out.fill(0.0);
            for q in 0..nq {
                let jacobian = data.factors.jacobians[element * nq + q];
                let position = data.factors.positions[element * nq + q];
                let jac_inv = inv(jacobian);
                let scale = data.weights[q] * det(jacobian).abs();
                let (u, du_ref) = interpolate::<D, C>(&data.trial_basis, q, u_e);
                let du = dot(du_ref, jac_inv);
                let (s, f) = qf.call(position, u, du);
                accumulate(out, &data.test_basis, q, jac_inv, scale, s, f);
            }
        });
}

/// Residual kernel that additionally records the integrand's derivatives at
/// every quadrature point.
pub(crate) fn evaluation_with_derivatives_kernel<const D: usize, const C: usize, F>(
    qf: &F,
    data: &DomainData<D>,
    cache: &mut [QPointTangent<C, D>],
    input: &DVector<f64>,
    output: &mut DVector<f64>,
) where
    F: DomainQFunction<D, C>,
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
        .for_each(|(element, ((out, u_e), tangents))| {
            out.fill(0.0);
            for q in 0..nq {
                let jacobian = data.factors.jacobians[element * nq + q];
                let position = data.factors.positions[element * nq + q];
                let jac_inv = inv(jacobian);
                let scale = data.weights[q] * det(jacobian).abs();
                let (u, du_ref) = interpolate::<D, C>(&data.trial_basis, q, u_e);
                let du = dot(du_ref, jac_inv);

                // Seed both arguments jointly: the dual carried by u[c] is the
                // basis direction e_c of the value slot, the dual carried by
                // du[c][d] the basis direction e_cd of the gradient slot.
                let u_dual: Tensor<Dual<ArgumentGradient<C, D>>, C> = Tensor::from_fn(|c| Dual {
                    value: u[c],
                    gradient: ArgumentGradient {
                        d_u: Tensor::from_fn(|k| if k == c { 1.0 } else { 0.0 }),
                        d_du: Matrix::zeros(),
                    },
                });
                let du_dual: Tensor<Tensor<Dual<ArgumentGradient<C, D>>, D>, C> =
                    Tensor::from_fn(|c| {
                        Tensor::from_fn(|d| Dual {
                            value: du[c][d],
                            gradient: ArgumentGradient {
                                d_u: Vector::zeros(),
                                d_du: crate::tensor::make_matrix(|k, l| {
                                    if (k, l) == (c, d) {
                                        1.0
                                    } else {
                                        0.0
                                    }
                                }),
                            },
                        })
                    });
                let (s_dual, f_dual) = qf.call(position, u_dual, du_dual);

                tangents[q] = QPointTangent {
                    ds_du: Tensor::from_fn(|c| s_dual[c].gradient.d_u),
                    ds_ddu: Tensor::from_fn(|c| s_dual[c].gradient.d_du),
                    df_du: Tensor::from_fn(|c| {
                        Tensor::from_fn(|d| f_dual[c][d].gradient.d_u)
                    }),
                    df_ddu: Tensor::from_fn(|c| {
                        Tensor::from_fn(|d| f_dual[c][d].gradient.d_du)
                    }),
                };

                let s: Vector<C> = Tensor::from_fn(|c| s_dual[c].value);
                let f = crate::tensor::make_matrix(|c, d| f_dual[c][d].value);
                accumulate(out, &data.test_basis, q, jac_inv, scale, s, f);
            }
        });
}

/// Directional-derivative kernel: applies the cached tangents to a
/// perturbation of the bound trial field.
pub(crate) fn gradient_kernel<const D: usize, const C: usize>(
    data: &DomainData<D>,
    cache: &[QPointTangent<C, D>],
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
        .for_each(|(element, ((out, du_e), tangents))| {
            out.fill(0.0);
            for q in 0..nq {
                let jacobian = data.factors.jacobians[element * nq + q];
                let jac_inv = inv(jacobian);
                let scale = data.weights[q] * det(jacobian).abs();
                let (delta_u, delta_du_ref) = interpolate::<D, C>(&data.trial_basis, q, du_e);
                let delta_du = dot(delta_du_ref, jac_inv);
                let tangent = &tangents[q];

                let ds: Vector<C> = Tensor::from_fn(|c| {
                    dot(tangent.ds_du[c], delta_u) + inner(tangent.ds_ddu[c], delta_du)
                });
                let df: Matrix<C, D> = crate::tensor::make_matrix(|c, d| {
                    dot(tangent.df_du[c][d], delta_u) + inner(tangent.df_ddu[c][d], delta_du)
                });
                accumulate(out, &data.test_basis, q, jac_inv, scale, ds, df);
            }
        });
}

/// Element-matrix kernel: materializes the cached tangents as dense
/// per-element blocks of `∂R/∂u`.
pub(crate) fn element_gradient_kernel<const D: usize, const C: usize>(
    data: &DomainData<D>,
    cache: &[QPointTangent<C, D>],
    output: &mut [DMatrix<f64>],
) {
    let nq = data.num_quadrature_points();
    output
        .par_iter_mut()
        .zip(cache.par_chunks(nq))
        .enumerate()
        .for_each(|(element, (matrix, tangents))| {
            matrix.fill(0.0);
            for q in 0..nq {
                let jacobian = data.factors.jacobians[element * nq + q];
                let jac_inv = inv(jacobian);
                let scale = data.weights[q] * det(jacobian).abs();
                let tangent = &tangents[q];
                for j in 0..data.trial_basis.nodes_per_element {
                    let trial_value = data.trial_basis.values[q][j];
                    let trial_grad = dot(data.trial_basis.gradients[q][j], jac_inv);
                    for cj in 0..C {
                        // Response of (s, F) to the basis perturbation of
                        // trial dof (j, cj).
                        let ds: Vector<C> = Tensor::from_fn(|ci| {
                            tangent.ds_du[ci][cj] * trial_value
                                + dot(tangent.ds_ddu[ci][cj], trial_grad)
                        });
                        let df: Matrix<C, D> = crate::tensor::make_matrix(|ci, d| {
                            tangent.df_du[ci][d][cj] * trial_value
                                + dot(tangent.df_ddu[ci][d][cj], trial_grad)
                        });
                        for i in 0..data.test_basis.nodes_per_element {
                            let test_value = data.test_basis.values[q][i];
                            let test_grad = dot(data.test_basis.gradients[q][i], jac_inv);
                            for ci in 0..C {
                                matrix[(i * C + ci, j * C + cj)] +=
                                    scale * (test_value * ds[ci] + dot(df[ci], test_grad));
                            }
                        }
                    }
                }
            }
        });
}

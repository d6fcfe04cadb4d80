//! Residuals and Jacobians of sums of weak-form integrals.
//!
//! A [`Functional`] represents a residual
//! `R(u_1, ..., u_n) = Σ ∫_Ω s · v + F : ∇v + Σ ∫_∂Ω s · v`
//! over one test space and any number of trial spaces, with the pointwise
//! integrands supplied by the user as [`DomainQFunction`] /
//! [`BoundaryQFunction`] implementations. Evaluating with
//! [`Functional::residual_and_gradient`] additionally records, at every
//! quadrature point, the integrand's derivatives with respect to the selected
//! trial field, from which the returned [`GradientOperator`] applies or
//! assembles `∂R/∂u_k` without further integrand evaluations.
//!
//! Each integral term binds to exactly one trial space, the one its integrand
//! reads; terms bound to other spaces contribute nothing to `∂R/∂u_k`.

pub mod boundary;
pub mod domain;
pub mod integral;

pub use boundary::BoundaryQFunction;
pub use domain::{ArgumentGradient, DomainQFunction, QPointTangent};
pub use integral::Integral;

use crate::element::tabulate_basis;
use crate::factors::{boundary_factors, domain_factors};
use crate::mesh::Mesh;
use crate::quadrature::rule_for_geometry;
use crate::space::{FiniteElementSpace, FunctionSpace};
use crate::tensor::Matrix;
use boundary::BoundaryData;
use domain::DomainData;
use eyre::{bail, Result};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Selects the trial space a derivative is taken with respect to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DifferentiateWrt(pub usize);

/// A weak-form residual operator with compile-time-shaped integrands.
pub struct Functional<const D: usize> {
    mesh: Mesh<D>,
    test_space: FiniteElementSpace,
    trial_spaces: Vec<FiniteElementSpace>,
    integrals: Vec<Integral>,
}

impl<const D: usize> Functional<D> {
    /// Realizes the test and trial space descriptors on `mesh`.
    pub fn new(
        mesh: Mesh<D>,
        test_space: FunctionSpace,
        trial_spaces: &[FunctionSpace],
    ) -> Result<Self> {
        if trial_spaces.is_empty() {
            bail!("a functional needs at least one trial space");
        }
        let test_space = FiniteElementSpace::new(&mesh, test_space)?;
        let trial_spaces = trial_spaces
            .iter()
            .map(|space| FiniteElementSpace::new(&mesh, *space))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            mesh,
            test_space,
            trial_spaces,
            integrals: Vec::new(),
        })
    }

    pub fn mesh(&self) -> &Mesh<D> {
        &self.mesh
    }

    pub fn test_space(&self) -> &FiniteElementSpace {
        &self.test_space
    }

    pub fn trial_space(&self, index: usize) -> &FiniteElementSpace {
        &self.trial_spaces[index]
    }

    pub fn num_trial_spaces(&self) -> usize {
        self.trial_spaces.len()
    }

    /// Registers `∫_Ω s(x, u, du) · v + F(x, u, du) : ∇v` over the whole
    /// mesh, with `u` the trial field `trial_index`.
    ///
    /// `C` must match the component count of both the test space and the
    /// bound trial space.
    pub fn add_domain_integral<const C: usize, F>(
        &mut self,
        trial_index: usize,
        qf: F,
    ) -> Result<()>
    where
        F: DomainQFunction<D, C> + 'static,
    {
        let trial = self.check_integral_spaces::<C>(trial_index)?;
        // One point more than the largest polynomial order per direction.
        let q = self.test_space.order().max(trial.order()) + 1;
        let rule = rule_for_geometry::<D>(self.mesh.geometry(), q)?;
        let factors = domain_factors(&self.mesh, rule.points())?;
        let test_basis = tabulate_basis(self.mesh.geometry(), self.test_space.order(), rule.points())?;
        let trial_basis = tabulate_basis(self.mesh.geometry(), trial.order(), rule.points())?;
        let num_qpts = rule.num_points();
        let num_elements = self.mesh.num_elements();

        let test_element_dofs = expand_dofs(self.test_space.element_nodes(), C);
        let trial_element_dofs = expand_dofs(trial.element_nodes(), C);
        let test_dofs_per_element = test_basis.nodes_per_element * C;
        let trial_dofs_per_element = trial_basis.nodes_per_element * C;

        let data = Arc::new(DomainData {
            factors,
            weights: rule.weights().to_vec(),
            test_basis,
            trial_basis,
        });
        let qf = Arc::new(qf);
        let cache = Arc::new(RwLock::new(vec![
            QPointTangent::<C, D>::zeros();
            num_elements * num_qpts
        ]));

        let evaluation = {
            let data = Arc::clone(&data);
            let qf = Arc::clone(&qf);
            Box::new(move |input: &DVector<f64>, output: &mut DVector<f64>| {
                domain::evaluation_kernel::<D, C, F>(&qf, &data, input, output);
            }) as integral::EvalFn
        };
        let evaluation_with_derivatives = {
            let data = Arc::clone(&data);
            let qf = Arc::clone(&qf);
            let cache = Arc::clone(&cache);
            Box::new(move |input: &DVector<f64>, output: &mut DVector<f64>| {
                let mut cache = cache.write();
                domain::evaluation_with_derivatives_kernel::<D, C, F>(
                    &qf, &data, &mut cache, input, output,
                );
            }) as integral::EvalFn
        };
        let action_of_gradient = {
            let data = Arc::clone(&data);
            let cache = Arc::clone(&cache);
            Box::new(move |input: &DVector<f64>, output: &mut DVector<f64>| {
                let cache = cache.read();
                domain::gradient_kernel::<D, C>(&data, &cache, input, output);
            }) as integral::EvalFn
        };
        let element_gradient = {
            let data = Arc::clone(&data);
            let cache = Arc::clone(&cache);
            Box::new(move |matrices: &mut [DMatrix<f64>]| {
                let cache = cache.read();
                domain::element_gradient_kernel::<D, C>(&data, &cache, matrices);
            }) as integral::ElementGradientFn
        };

        self.integrals.push(Integral {
            trial_index,
            test_element_dofs,
            trial_element_dofs,
            test_dofs_per_element,
            trial_dofs_per_element,
            evaluation,
            evaluation_with_derivatives,
            action_of_gradient,
            element_gradient,
        });
        Ok(())
    }

    fn add_boundary_integral_impl<const FD: usize, const C: usize, F>(
        &mut self,
        trial_index: usize,
        attrs: &BTreeSet<i32>,
        qf: F,
    ) -> Result<()>
    where
        F: BoundaryQFunction<D, C> + 'static,
    {
        let trial = self.check_integral_spaces::<C>(trial_index)?;
        if self.test_space.order() != 1 || trial.order() != 1 {
            bail!("boundary integrals require first-order spaces");
        }
        let facet_geometry = match self.mesh.geometry().facet_geometry() {
            Some(g) => g,
            None => bail!("a 1-dimensional mesh has no boundary facets to integrate over"),
        };
        let facets: Vec<usize> = self
            .mesh
            .boundary_facets()
            .iter()
            .enumerate()
            .filter(|(_, f)| attrs.contains(&f.attribute))
            .map(|(i, _)| i)
            .collect();

        let q = self.test_space.order().max(trial.order()) + 1;
        let rule = rule_for_geometry::<FD>(facet_geometry, q)?;
        let factors = boundary_factors::<D, FD>(&self.mesh, &facets, rule.points())?;
        let test_basis = tabulate_basis(facet_geometry, 1, rule.points())?;
        let trial_basis = tabulate_basis(facet_geometry, 1, rule.points())?;
        let num_qpts = rule.num_points();

        let test_facet_nodes = self.test_space.boundary_facet_nodes()?;
        let trial_facet_nodes = trial.boundary_facet_nodes()?;
        let test_element_dofs = expand_dofs_subset(test_facet_nodes, &facets, C);
        let trial_element_dofs = expand_dofs_subset(trial_facet_nodes, &facets, C);
        let test_dofs_per_element = test_basis.nodes_per_element * C;
        let trial_dofs_per_element = trial_basis.nodes_per_element * C;

        let data = Arc::new(BoundaryData {
            factors,
            weights: rule.weights().to_vec(),
            test_basis,
            trial_basis,
        });
        let qf = Arc::new(qf);
        let cache = Arc::new(RwLock::new(vec![
            Matrix::<C, C>::zeros();
            facets.len() * num_qpts
        ]));

        let evaluation = {
            let data = Arc::clone(&data);
            let qf = Arc::clone(&qf);
            Box::new(move |input: &DVector<f64>, output: &mut DVector<f64>| {
                boundary::evaluation_kernel::<D, FD, C, F>(&qf, &data, input, output);
            }) as integral::EvalFn
        };
        let evaluation_with_derivatives = {
            let data = Arc::clone(&data);
            let qf = Arc::clone(&qf);
            let cache = Arc::clone(&cache);
            Box::new(move |input: &DVector<f64>, output: &mut DVector<f64>| {
                let mut cache = cache.write();
                boundary::evaluation_with_derivatives_kernel::<D, FD, C, F>(
                    &qf, &data, &mut cache, input, output,
                );
            }) as integral::EvalFn
        };
        let action_of_gradient = {
            let data = Arc::clone(&data);
            let cache = Arc::clone(&cache);
            Box::new(move |input: &DVector<f64>, output: &mut DVector<f64>| {
                let cache = cache.read();
                boundary::gradient_kernel::<D, FD, C>(&data, &cache, input, output);
            }) as integral::EvalFn
        };
        let element_gradient = {
            let data = Arc::clone(&data);
            let cache = Arc::clone(&cache);
            Box::new(move |matrices: &mut [DMatrix<f64>]| {
                let cache = cache.read();
                boundary::element_gradient_kernel::<D, FD, C>(&data, &cache, matrices);
            }) as integral::ElementGradientFn
        };

        self.integrals.push(Integral {
            trial_index,
            test_element_dofs,
            trial_element_dofs,
            test_dofs_per_element,
            trial_dofs_per_element,
            evaluation,
            evaluation_with_derivatives,
            action_of_gradient,
            element_gradient,
        });
        Ok(())
    }

    fn check_integral_spaces<const C: usize>(
        &self,
        trial_index: usize,
    ) -> Result<&FiniteElementSpace> {
        let Some(trial) = self.trial_spaces.get(trial_index) else {
            bail!(
                "trial index {} out of range for {} trial spaces",
                trial_index,
                self.trial_spaces.len()
            );
        };
        if trial.components() != C {
            bail!(
                "integrand has {} components, trial space {} has {}",
                C,
                trial_index,
                trial.components()
            );
        }
        if self.test_space.components() != C {
            bail!(
                "integrand has {} components, test space has {}",
                C,
                self.test_space.components()
            );
        }
        Ok(trial)
    }

    /// Evaluates the residual at the given trial states (true-dof vectors).
    pub fn residual(&self, us: &[DVector<f64>]) -> Result<DVector<f64>> {
        self.apply(us, None)
    }

    /// Evaluates the residual and records the integrand derivatives with
    /// respect to trial space `wrt`, returning an operator for `∂R/∂u_wrt`.
    pub fn residual_and_gradient(
        &self,
        wrt: DifferentiateWrt,
        us: &[DVector<f64>],
    ) -> Result<(DVector<f64>, GradientOperator<'_, D>)> {
        let DifferentiateWrt(which) = wrt;
        if which >= self.trial_spaces.len() {
            bail!(
                "cannot differentiate with respect to trial space {} of {}",
                which,
                self.trial_spaces.len()
            );
        }
        let residual = self.apply(us, Some(which))?;
        Ok((residual, GradientOperator {
            functional: self,
            which,
        }))
    }

    fn apply(&self, us: &[DVector<f64>], which: Option<usize>) -> Result<DVector<f64>> {
        if us.len() != self.trial_spaces.len() {
            bail!(
                "got {} trial states for {} trial spaces",
                us.len(),
                self.trial_spaces.len()
            );
        }
        let locals: Vec<DVector<f64>> = us
            .iter()
            .zip(&self.trial_spaces)
            .map(|(u, space)| {
                if u.len() != space.num_true_dofs() {
                    bail!(
                        "trial state has {} dofs, its space has {}",
                        u.len(),
                        space.num_true_dofs()
                    );
                }
                Ok(space.prolong(u))
            })
            .collect::<Result<_>>()?;
        let mut residual_local = DVector::zeros(self.test_space.num_local_dofs());
        for term in &self.integrals {
            let input = gather(&locals[term.trial_index], &term.trial_element_dofs);
            let mut output = DVector::zeros(term.num_blocks() * term.test_dofs_per_element);
            term.mult(&input, &mut output, which);
            scatter_add(&output, &term.test_element_dofs, &mut residual_local);
        }
        Ok(self.test_space.restrict(&residual_local))
    }
}

impl Functional<2> {
    /// Registers `∫ s(x, n, u) · v` over the boundary facets whose attribute
    /// lies in `attrs`.
    pub fn add_boundary_integral<const C: usize, F>(
        &mut self,
        trial_index: usize,
        attrs: &BTreeSet<i32>,
        qf: F,
    ) -> Result<()>
    where
        F: BoundaryQFunction<2, C> + 'static,
    {
        self.add_boundary_integral_impl::<1, C, F>(trial_index, attrs, qf)
    }
}

impl Functional<3> {
    /// Registers `∫ s(x, n, u) · v` over the boundary facets whose attribute
    /// lies in `attrs`.
    pub fn add_boundary_integral<const C: usize, F>(
        &mut self,
        trial_index: usize,
        attrs: &BTreeSet<i32>,
        qf: F,
    ) -> Result<()>
    where
        F: BoundaryQFunction<3, C> + 'static,
    {
        self.add_boundary_integral_impl::<2, C, F>(trial_index, attrs, qf)
    }
}

/// The Jacobian `∂R/∂u_k` backed by the derivative caches of the most recent
/// [`Functional::residual_and_gradient`] call.
pub struct GradientOperator<'a, const D: usize> {
    functional: &'a Functional<D>,
    which: usize,
}

impl<'a, const D: usize> GradientOperator<'a, D> {
    /// Matrix-free application to a perturbation of trial state `k`.
    pub fn apply(&self, du: &DVector<f64>) -> DVector<f64> {
        let trial = &self.functional.trial_spaces[self.which];
        assert_eq!(du.len(), trial.num_true_dofs());
        let du_local = trial.prolong(du);
        let test = &self.functional.test_space;
        let mut out_local = DVector::zeros(test.num_local_dofs());
        for term in &self.functional.integrals {
            if term.trial_index != self.which {
                continue;
            }
            let input = gather(&du_local, &term.trial_element_dofs);
            let mut output = DVector::zeros(term.num_blocks() * term.test_dofs_per_element);
            term.gradient_mult(&input, &mut output);
            scatter_add(&output, &term.test_element_dofs, &mut out_local);
        }
        test.restrict(&out_local)
    }

    /// Assembles the Jacobian as a CSR matrix from per-element dense blocks.
    pub fn assemble(&self) -> CsrMatrix<f64> {
        let nrows = self.functional.test_space.num_true_dofs();
        let ncols = self.functional.trial_spaces[self.which].num_true_dofs();
        log::debug!(
            "assembling {} x {} gradient from {} integral terms",
            nrows,
            ncols,
            self.functional
                .integrals
                .iter()
                .filter(|t| t.trial_index == self.which)
                .count()
        );
        let mut result: Option<CsrMatrix<f64>> = None;
        for term in &self.functional.integrals {
            if term.trial_index != self.which {
                continue;
            }
            let mut matrices = vec![
                DMatrix::zeros(term.test_dofs_per_element, term.trial_dofs_per_element);
                term.num_blocks()
            ];
            term.element_gradients(&mut matrices);
            let term_matrix = crate::assembly::assemble_csr(
                nrows,
                ncols,
                &term.test_element_dofs,
                &term.trial_element_dofs,
                &matrices,
            );
            result = Some(match result {
                None => term_matrix,
                Some(accumulated) => &accumulated + &term_matrix,
            });
        }
        result.unwrap_or_else(|| CsrMatrix::zeros(nrows, ncols))
    }
}

/// Expands per-block node lists into per-block dof lists, components
/// interleaved per node.
fn expand_dofs(element_nodes: &[Vec<usize>], components: usize) -> Vec<Vec<usize>> {
    element_nodes
        .iter()
        .map(|nodes| {
            nodes
                .iter()
                .flat_map(|&n| (0..components).map(move |c| n * components + c))
                .collect()
        })
        .collect()
}

fn expand_dofs_subset(
    facet_nodes: &[Vec<usize>],
    facets: &[usize],
    components: usize,
) -> Vec<Vec<usize>> {
    facets
        .iter()
        .map(|&f| {
            facet_nodes[f]
                .iter()
                .flat_map(|&n| (0..components).map(move |c| n * components + c))
                .collect()
        })
        .collect()
}

fn gather(u_local: &DVector<f64>, element_dofs: &[Vec<usize>]) -> DVector<f64> {
    let block: usize = element_dofs.first().map(|d| d.len()).unwrap_or(0);
    let mut out = DVector::zeros(element_dofs.len() * block);
    let mut offset = 0;
    for dofs in element_dofs {
        for &dof in dofs {
            out[offset] = u_local[dof];
            offset += 1;
        }
    }
    out
}

fn scatter_add(e_vector: &DVector<f64>, element_dofs: &[Vec<usize>], out: &mut DVector<f64>) {
    let mut offset = 0;
    for dofs in element_dofs {
        for &dof in dofs {
            out[dof] += e_vector[offset];
            offset += 1;
        }
    }
}

//! Type-erased integral terms.
//!
//! An [`Integral`] hides the integrand type and the compile-time shapes of its
//! kernels behind boxed function handles, so that a `Functional` can hold a
//! heterogeneous collection of terms. The handles close over shared ownership
//! of the geometric data and the derivative cache, which therefore outlive
//! the registration scope.

use nalgebra::{DMatrix, DVector};

pub(crate) type EvalFn = Box<dyn Fn(&DVector<f64>, &mut DVector<f64>) + Send + Sync>;
pub(crate) type ElementGradientFn = Box<dyn Fn(&mut [DMatrix<f64>]) + Send + Sync>;

/// One integral term: its kernels as function handles plus the dof maps that
/// gather its inputs and scatter its outputs.
///
/// `test_element_dofs[b]` / `trial_element_dofs[b]` list the local dofs of
/// block `b` (an element or a boundary facet) in the order of the block's
/// slice of the corresponding element vector.
pub struct Integral {
    pub(crate) trial_index: usize,
    pub(crate) test_element_dofs: Vec<Vec<usize>>,
    pub(crate) trial_element_dofs: Vec<Vec<usize>>,
    pub(crate) test_dofs_per_element: usize,
    pub(crate) trial_dofs_per_element: usize,
    pub(crate) evaluation: EvalFn,
    pub(crate) evaluation_with_derivatives: EvalFn,
    pub(crate) action_of_gradient: EvalFn,
    pub(crate) element_gradient: ElementGradientFn,
}

impl Integral {
    /// Index of the trial space this term's integrand reads.
    pub fn trial_index(&self) -> usize {
        self.trial_index
    }

    /// Number of blocks (elements or facets) this term integrates over.
    pub fn num_blocks(&self) -> usize {
        self.test_element_dofs.len()
    }

    /// Evaluates the term on an element vector. When `which` names this
    /// term's trial space the derivative cache is refreshed along the way;
    /// otherwise the plain kernel runs.
    pub(crate) fn mult(
        &self,
        input_e: &DVector<f64>,
        output_e: &mut DVector<f64>,
        which: Option<usize>,
    ) {
        if which == Some(self.trial_index) {
            (self.evaluation_with_derivatives)(input_e, output_e);
        } else {
            (self.evaluation)(input_e, output_e);
        }
    }

    /// Applies the cached derivative to a perturbation element vector.
    pub(crate) fn gradient_mult(&self, input_e: &DVector<f64>, output_e: &mut DVector<f64>) {
        (self.action_of_gradient)(input_e, output_e);
    }

    /// Fills per-block dense derivative matrices from the cache.
    pub(crate) fn element_gradients(&self, matrices: &mut [DMatrix<f64>]) {
        (self.element_gradient)(matrices);
    }
}

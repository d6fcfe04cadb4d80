//! Boundary condition bookkeeping.
//!
//! The [`BoundaryConditionManager`] records essential (Dirichlet), natural
//! and user-tagged boundary conditions against mesh boundary attributes,
//! resolves their dofs through a [`FiniteElementSpace`], and consolidates all
//! essential dofs into sorted, duplicate-free lists computed lazily and
//! invalidated whenever a condition is added.

use crate::assembly;
use crate::mesh::Mesh;
use crate::space::FiniteElementSpace;
use eyre::{bail, Result};
use nalgebra_sparse::CsrMatrix;
use std::any::Any;
use std::cell::{Cell, Ref, RefCell};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A boundary coefficient: a scalar or vector valued function of position.
#[derive(Clone)]
pub enum Coefficient {
    Scalar(Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>),
    /// A function writing `components` values into its output slice.
    Vector(Arc<dyn Fn(&[f64], &mut [f64]) + Send + Sync>, usize),
}

impl Coefficient {
    pub fn scalar(f: impl Fn(&[f64]) -> f64 + Send + Sync + 'static) -> Self {
        Self::Scalar(Arc::new(f))
    }

    pub fn vector(
        components: usize,
        f: impl Fn(&[f64], &mut [f64]) + Send + Sync + 'static,
    ) -> Self {
        Self::Vector(Arc::new(f), components)
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Self::Vector(..))
    }
}

impl fmt::Debug for Coefficient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(_) => f.write_str("Coefficient::Scalar"),
            Self::Vector(_, n) => write!(f, "Coefficient::Vector({n})"),
        }
    }
}

/// Marker for types usable as boundary condition tags.
///
/// Implement this for the (typically field-less enum) type an application
/// uses to label its generic boundary conditions.
pub trait BoundaryTag: Any + Copy + PartialEq + Send + Sync {}

/// One boundary condition: the attributes it applies to, its coefficient,
/// an optional restriction to a single vector component, and its dofs.
pub struct BoundaryCondition {
    attrs: BTreeSet<i32>,
    coefficient: Coefficient,
    component: Option<usize>,
    true_dofs: Vec<usize>,
    local_dofs: Vec<usize>,
    tag: Option<Box<dyn Any + Send + Sync>>,
}

impl BoundaryCondition {
    fn from_attrs(
        space: &FiniteElementSpace,
        attrs: &BTreeSet<i32>,
        coefficient: Coefficient,
        component: Option<usize>,
    ) -> Result<Self> {
        let true_dofs = space.boundary_attribute_dofs(attrs, component)?;
        // True and local dofs coincide in the serial setting; both views are
        // kept so hosts with a nontrivial prolongation can diverge.
        let local_dofs = true_dofs.clone();
        Ok(Self {
            attrs: attrs.clone(),
            coefficient,
            component,
            true_dofs,
            local_dofs,
            tag: None,
        })
    }

    fn from_true_dofs(true_dofs: &[usize], coefficient: Coefficient) -> Self {
        let mut dofs: Vec<usize> = true_dofs.to_vec();
        dofs.sort_unstable();
        dofs.dedup();
        Self {
            attrs: BTreeSet::new(),
            coefficient,
            component: None,
            local_dofs: dofs.clone(),
            true_dofs: dofs,
            tag: None,
        }
    }

    pub fn attrs(&self) -> &BTreeSet<i32> {
        &self.attrs
    }

    pub fn coefficient(&self) -> &Coefficient {
        &self.coefficient
    }

    pub fn component(&self) -> Option<usize> {
        self.component
    }

    /// Sorted, duplicate-free true dofs constrained by this condition.
    pub fn true_dofs(&self) -> &[usize] {
        &self.true_dofs
    }

    pub fn local_dofs(&self) -> &[usize] {
        &self.local_dofs
    }

    /// Whether this condition carries `tag`, comparing within the tag's
    /// concrete type.
    pub fn tag_is<T: BoundaryTag>(&self, tag: T) -> bool {
        self.tag
            .as_ref()
            .and_then(|stored| stored.downcast_ref::<T>())
            == Some(&tag)
    }
}

impl fmt::Debug for BoundaryCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundaryCondition")
            .field("attrs", &self.attrs)
            .field("coefficient", &self.coefficient)
            .field("component", &self.component)
            .field("true_dofs", &self.true_dofs)
            .finish_non_exhaustive()
    }
}

/// A lazily filtering view over a slice: iteration yields only the items the
/// predicate accepts.
pub struct FilterView<'a, T, P> {
    items: std::slice::Iter<'a, T>,
    predicate: P,
}

impl<'a, T, P: Fn(&T) -> bool> FilterView<'a, T, P> {
    pub fn new(items: &'a [T], predicate: P) -> Self {
        Self {
            items: items.iter(),
            predicate,
        }
    }
}

impl<'a, T, P: Fn(&T) -> bool> Iterator for FilterView<'a, T, P> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        loop {
            let item = self.items.next()?;
            if (self.predicate)(item) {
                return Some(item);
            }
        }
    }
}

/// Stores and consolidates the boundary conditions of one physics module.
pub struct BoundaryConditionManager {
    valid_attributes: BTreeSet<i32>,
    essentials: Vec<BoundaryCondition>,
    naturals: Vec<BoundaryCondition>,
    generics: Vec<BoundaryCondition>,
    attrs_in_use: BTreeSet<i32>,
    all_true_dofs: RefCell<Vec<usize>>,
    all_local_dofs: RefCell<Vec<usize>>,
    dofs_valid: Cell<bool>,
}

impl BoundaryConditionManager {
    pub fn new<const D: usize>(mesh: &Mesh<D>) -> Self {
        Self {
            valid_attributes: mesh.boundary_attributes(),
            essentials: Vec::new(),
            naturals: Vec::new(),
            generics: Vec::new(),
            attrs_in_use: BTreeSet::new(),
            all_true_dofs: RefCell::new(Vec::new()),
            all_local_dofs: RefCell::new(Vec::new()),
            dofs_valid: Cell::new(false),
        }
    }

    /// Registers an essential (Dirichlet) condition on the given attributes.
    ///
    /// With `component: Some(c)` only that component is constrained,
    /// otherwise every component of every boundary node on the attributes.
    /// Each attribute may carry at most one essential condition; registering
    /// a second one on the same attribute is an error.
    pub fn add_essential(
        &mut self,
        attrs: &BTreeSet<i32>,
        coefficient: Coefficient,
        space: &FiniteElementSpace,
        component: Option<usize>,
    ) -> Result<()> {
        self.check_attrs_exist(attrs)?;
        if !self.attrs_in_use.is_disjoint(attrs) {
            bail!(
                "boundary attributes {:?} already carry an essential condition",
                attrs & &self.attrs_in_use
            );
        }
        let bc = BoundaryCondition::from_attrs(space, attrs, coefficient, component)?;
        self.attrs_in_use.extend(attrs.iter().copied());
        self.essentials.push(bc);
        self.dofs_valid.set(false);
        Ok(())
    }

    /// Registers an essential condition directly on a set of true dofs of
    /// `space`.
    ///
    /// The coefficient must be vector valued, since component information
    /// cannot be recovered from bare dof indices.
    pub fn add_essential_true_dofs(
        &mut self,
        true_dofs: &[usize],
        coefficient: Coefficient,
        space: &FiniteElementSpace,
    ) -> Result<()> {
        if !coefficient.is_vector() {
            bail!("essential conditions on explicit dofs need a vector coefficient");
        }
        if let Some(&out_of_range) = true_dofs.iter().find(|&&d| d >= space.num_true_dofs()) {
            bail!(
                "true dof {} out of range for a space with {} true dofs",
                out_of_range,
                space.num_true_dofs()
            );
        }
        self.essentials
            .push(BoundaryCondition::from_true_dofs(true_dofs, coefficient));
        self.dofs_valid.set(false);
        Ok(())
    }

    /// Registers a natural (flux/traction) condition on the given attributes.
    ///
    /// Natural conditions may share attributes with each other and with
    /// essential conditions.
    pub fn add_natural(
        &mut self,
        attrs: &BTreeSet<i32>,
        coefficient: Coefficient,
        space: &FiniteElementSpace,
        component: Option<usize>,
    ) -> Result<()> {
        self.check_attrs_exist(attrs)?;
        let bc = BoundaryCondition::from_attrs(space, attrs, coefficient, component)?;
        self.naturals.push(bc);
        Ok(())
    }

    /// Registers a condition labeled with an application-defined tag, to be
    /// retrieved later with [`BoundaryConditionManager::generics_with_tag`].
    pub fn add_generic<T: BoundaryTag>(
        &mut self,
        attrs: &BTreeSet<i32>,
        coefficient: Coefficient,
        tag: T,
        space: &FiniteElementSpace,
        component: Option<usize>,
    ) -> Result<()> {
        self.check_attrs_exist(attrs)?;
        let mut bc = BoundaryCondition::from_attrs(space, attrs, coefficient, component)?;
        bc.tag = Some(Box::new(tag));
        self.generics.push(bc);
        self.dofs_valid.set(false);
        Ok(())
    }

    fn check_attrs_exist(&self, attrs: &BTreeSet<i32>) -> Result<()> {
        if let Some(unknown) = attrs.iter().find(|a| !self.valid_attributes.contains(a)) {
            bail!("boundary attribute {} does not exist in the mesh", unknown);
        }
        Ok(())
    }

    pub fn essentials(&self) -> &[BoundaryCondition] {
        &self.essentials
    }

    pub fn naturals(&self) -> &[BoundaryCondition] {
        &self.naturals
    }

    pub fn generics(&self) -> &[BoundaryCondition] {
        &self.generics
    }

    /// Iterates over the generic conditions carrying `tag`.
    pub fn generics_with_tag<T: BoundaryTag>(
        &self,
        tag: T,
    ) -> FilterView<'_, BoundaryCondition, impl Fn(&BoundaryCondition) -> bool> {
        FilterView::new(&self.generics, move |bc: &BoundaryCondition| bc.tag_is(tag))
    }

    /// All essential true dofs, sorted and duplicate-free across conditions.
    pub fn all_essential_true_dofs(&self) -> Ref<'_, Vec<usize>> {
        self.update_all_dofs();
        self.all_true_dofs.borrow()
    }

    /// Local-dof counterpart of
    /// [`BoundaryConditionManager::all_essential_true_dofs`].
    pub fn all_essential_local_dofs(&self) -> Ref<'_, Vec<usize>> {
        self.update_all_dofs();
        self.all_local_dofs.borrow()
    }

    fn update_all_dofs(&self) {
        if self.dofs_valid.get() {
            return;
        }
        let mut true_dofs = BTreeSet::new();
        let mut local_dofs = BTreeSet::new();
        for bc in &self.essentials {
            true_dofs.extend(bc.true_dofs().iter().copied());
            local_dofs.extend(bc.local_dofs().iter().copied());
        }
        *self.all_true_dofs.borrow_mut() = true_dofs.into_iter().collect();
        *self.all_local_dofs.borrow_mut() = local_dofs.into_iter().collect();
        self.dofs_valid.set(true);
    }

    /// Eliminates every essential dof from `matrix` (rows and columns zeroed,
    /// ones on the diagonal) and returns the eliminated entries.
    pub fn eliminate_all_essential_dofs_from_matrix(
        &self,
        matrix: &mut CsrMatrix<f64>,
    ) -> CsrMatrix<f64> {
        let dofs = self.all_essential_true_dofs();
        assembly::eliminate_rows_cols(matrix, &dofs)
    }
}

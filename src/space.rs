//! Function space descriptors and concrete dof layouts.
//!
//! [`FunctionSpace`] is a plain descriptor (family, polynomial order, number
//! of vector components). [`FiniteElementSpace`] realizes a descriptor on a
//! mesh: it numbers nodes, maps elements and boundary facets to their nodes,
//! and provides the true-dof/local-dof seam.
//!
//! Dofs are interleaved by node: the dof of component `c` at node `n` is
//! `n * components + c`.

use crate::element::ElementGeometry;
use crate::mesh::Mesh;
use eyre::{bail, Result};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Conformity family of a function space.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    /// Continuous nodal elements.
    H1,
    /// Discontinuous (element-local) nodal elements.
    L2,
    /// Tangentially continuous edge elements. Descriptor only.
    HCurl,
    /// Normally continuous face elements. Descriptor only.
    HDiv,
}

/// Descriptor of a function space: family, order and vector components.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSpace {
    pub family: Family,
    pub order: usize,
    pub components: usize,
}

/// A function space realized on a mesh.
#[derive(Debug, Clone)]
pub struct FiniteElementSpace {
    space: FunctionSpace,
    num_elements: usize,
    num_nodes: usize,
    nodes_per_element: usize,
    element_nodes: Vec<Vec<usize>>,
    /// Nodes of each boundary facet; `None` for spaces without boundary
    /// traces (discontinuous families).
    facet_nodes: Option<Vec<Vec<usize>>>,
    facet_attributes: Vec<i32>,
}

impl FiniteElementSpace {
    /// Numbers the dofs of `space` on `mesh`.
    ///
    /// Supported combinations: `L2` of any order the geometry supports, `H1`
    /// of order 1 on any geometry, and `H1` of arbitrary order on segment
    /// meshes. Everything else is a configuration error.
    pub fn new<const D: usize>(mesh: &Mesh<D>, space: FunctionSpace) -> Result<Self> {
        if space.components == 0 {
            bail!("a function space needs at least one component");
        }
        let geometry = mesh.geometry();
        let nodes_per_element = geometry.num_nodes(space.order)?;
        let facet_attributes = mesh
            .boundary_facets()
            .iter()
            .map(|f| f.attribute)
            .collect();

        match space.family {
            Family::H1 => {
                let (num_nodes, element_nodes) = h1_nodes(mesh, space.order)?;
                let facet_nodes = mesh
                    .boundary_facets()
                    .iter()
                    .map(|f| f.vertices.clone())
                    .collect();
                Ok(Self {
                    space,
                    num_elements: mesh.num_elements(),
                    num_nodes,
                    nodes_per_element,
                    element_nodes,
                    facet_nodes: Some(facet_nodes),
                    facet_attributes,
                })
            }
            Family::L2 => {
                let element_nodes = (0..mesh.num_elements())
                    .map(|e| {
                        (e * nodes_per_element..(e + 1) * nodes_per_element).collect()
                    })
                    .collect();
                Ok(Self {
                    space,
                    num_elements: mesh.num_elements(),
                    num_nodes: mesh.num_elements() * nodes_per_element,
                    nodes_per_element,
                    element_nodes,
                    facet_nodes: None,
                    facet_attributes,
                })
            }
            Family::HCurl | Family::HDiv => {
                bail!("covariant/Piola element families are not implemented")
            }
        }
    }

    pub fn space(&self) -> FunctionSpace {
        self.space
    }

    pub fn components(&self) -> usize {
        self.space.components
    }

    pub fn order(&self) -> usize {
        self.space.order
    }

    pub fn family(&self) -> Family {
        self.space.family
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn nodes_per_element(&self) -> usize {
        self.nodes_per_element
    }

    /// Dofs per element, `nodes_per_element * components`.
    pub fn dofs_per_element(&self) -> usize {
        self.nodes_per_element * self.space.components
    }

    pub fn num_local_dofs(&self) -> usize {
        self.num_nodes * self.space.components
    }

    /// In this serial setting true dofs and local dofs coincide.
    pub fn num_true_dofs(&self) -> usize {
        self.num_local_dofs()
    }

    pub fn element_nodes(&self) -> &[Vec<usize>] {
        &self.element_nodes
    }

    /// Nodes of each boundary facet, in facet orientation order.
    pub fn boundary_facet_nodes(&self) -> Result<&[Vec<usize>]> {
        match &self.facet_nodes {
            Some(nodes) => Ok(nodes),
            None => bail!("a discontinuous space has no boundary trace"),
        }
    }

    pub fn dof_index(&self, node: usize, component: usize) -> usize {
        node * self.space.components + component
    }

    /// Maps a true-dof vector to the local (processor) vector.
    ///
    /// The distributed variant of this map lives in the host application; here
    /// it is the identity.
    pub fn prolong(&self, u_true: &DVector<f64>) -> DVector<f64> {
        assert_eq!(u_true.len(), self.num_true_dofs());
        u_true.clone()
    }

    /// Transpose counterpart of [`FiniteElementSpace::prolong`].
    pub fn restrict(&self, u_local: &DVector<f64>) -> DVector<f64> {
        assert_eq!(u_local.len(), self.num_local_dofs());
        u_local.clone()
    }

    /// Sorted, deduplicated true dofs on boundary facets whose attribute lies
    /// in `attrs`.
    ///
    /// With `component: Some(c)` only that component's dofs are returned,
    /// otherwise all components of every boundary node.
    pub fn boundary_attribute_dofs(
        &self,
        attrs: &BTreeSet<i32>,
        component: Option<usize>,
    ) -> Result<Vec<usize>> {
        if let Some(c) = component {
            if c >= self.space.components {
                bail!(
                    "component {} out of range for a space with {} components",
                    c,
                    self.space.components
                );
            }
        }
        let facet_nodes = self.boundary_facet_nodes()?;
        let mut dofs = BTreeSet::new();
        for (nodes, attribute) in facet_nodes.iter().zip(&self.facet_attributes) {
            if !attrs.contains(attribute) {
                continue;
            }
            for &node in nodes {
                match component {
                    Some(c) => {
                        dofs.insert(self.dof_index(node, c));
                    }
                    None => {
                        for c in 0..self.space.components {
                            dofs.insert(self.dof_index(node, c));
                        }
                    }
                }
            }
        }
        Ok(dofs.into_iter().collect())
    }
}

fn h1_nodes<const D: usize>(mesh: &Mesh<D>, order: usize) -> Result<(usize, Vec<Vec<usize>>)> {
    if order == 1 {
        return Ok((mesh.num_vertices(), mesh.connectivity().to_vec()));
    }
    if mesh.geometry() != ElementGeometry::Segment {
        bail!(
            "continuous spaces of order {} are only supported on segment meshes",
            order
        );
    }
    // Vertices first, then the order - 1 interior nodes of each element, in
    // the same order as the 1D basis.
    let interior = order - 1;
    let num_nodes = mesh.num_vertices() + mesh.num_elements() * interior;
    let element_nodes = mesh
        .connectivity()
        .iter()
        .enumerate()
        .map(|(e, conn)| {
            let mut nodes = conn.clone();
            nodes.extend((0..interior).map(|k| mesh.num_vertices() + e * interior + k));
            nodes
        })
        .collect();
    Ok((num_nodes, element_nodes))
}

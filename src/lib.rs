//! `weakform` assembles residuals and Jacobians of finite element weak forms
//! whose integrands are ordinary Rust closures over small stack-allocated
//! tensors.
//!
//! An integrand is written once, generically over its scalar type, and
//! evaluated both in `f64` and in forward-mode dual numbers; the same code
//! therefore yields the residual, the matrix-free action of its derivative
//! and the assembled sparse Jacobian. The central entry point is
//! [`functional::Functional`], which couples a test space with one or more
//! trial spaces over a [`mesh::Mesh`] and accumulates domain and boundary
//! integral terms.

pub mod assembly;
pub mod bc;
pub mod element;
pub mod factors;
pub mod functional;
pub mod mesh;
pub mod quadrature;
pub mod space;
pub mod tensor;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeSet;
use weakform::functional::{
    BoundaryQFunction, DifferentiateWrt, DomainQFunction, Functional,
};
use weakform::mesh::{segment_mesh, unit_square_quad_mesh};
use weakform::space::{Family, FunctionSpace};
use weakform::tensor::{DifferentiableScalar, Tensor, Vector};

fn h1(order: usize, components: usize) -> FunctionSpace {
    FunctionSpace {
        family: Family::H1,
        order,
        components,
    }
}

/// `∫ u v`, the bilinear mass form.
struct Mass;

impl<const D: usize> DomainQFunction<D, 1> for Mass {
    fn call<S: DifferentiableScalar>(
        &self,
        _x: Vector<D>,
        u: Tensor<S, 1>,
        _du: Tensor<Tensor<S, D>, 1>,
    ) -> (Tensor<S, 1>, Tensor<Tensor<S, D>, 1>) {
        (u, Tensor::zeros())
    }
}

/// `∫ ∇u · ∇v`, the bilinear diffusion form.
struct Diffusion;

impl<const D: usize> DomainQFunction<D, 1> for Diffusion {
    fn call<S: DifferentiableScalar>(
        &self,
        _x: Vector<D>,
        _u: Tensor<S, 1>,
        du: Tensor<Tensor<S, D>, 1>,
    ) -> (Tensor<S, 1>, Tensor<Tensor<S, D>, 1>) {
        (Tensor::zeros(), du)
    }
}

/// `∫ (u³ - 1) v + ∇u · ∇v`, a nonlinear reaction-diffusion residual.
struct ReactionDiffusion;

impl DomainQFunction<2, 1> for ReactionDiffusion {
    fn call<S: DifferentiableScalar>(
        &self,
        _x: Vector<2>,
        u: Tensor<S, 1>,
        du: Tensor<Tensor<S, 2>, 1>,
    ) -> (Tensor<S, 1>, Tensor<Tensor<S, 2>, 1>) {
        (Tensor([u[0] * u[0] * u[0] - 1.0]), du)
    }
}

/// Boundary flux `∫ u v` on the selected attributes.
struct BoundaryMass;

impl BoundaryQFunction<2, 1> for BoundaryMass {
    fn call<S: DifferentiableScalar>(
        &self,
        _x: Vector<2>,
        _n: Vector<2>,
        u: Tensor<S, 1>,
    ) -> Tensor<S, 1> {
        u
    }
}

fn vertex_function<const D: usize>(
    functional: &Functional<D>,
    f: impl Fn(Vector<D>) -> f64,
) -> DVector<f64> {
    DVector::from_iterator(
        functional.mesh().num_vertices(),
        functional.mesh().vertices().iter().map(|&v| f(v)),
    )
}

#[test]
fn assembled_mass_matrix_on_a_single_bilinear_element() {
    let mesh = unit_square_quad_mesh(1);
    let mut functional = Functional::<2>::new(mesh, h1(1, 1), &[h1(1, 1)]).unwrap();
    functional.add_domain_integral(0, Mass).unwrap();

    let u = DVector::zeros(4);
    let (_, gradient) = functional
        .residual_and_gradient(DifferentiateWrt(0), &[u])
        .unwrap();
    let mass = gradient.assemble();

    // Vertex ordering (0,0), (1,0), (0,1), (1,1)
    let expected = DMatrix::from_row_slice(
        4,
        4,
        &[
            4.0, 2.0, 2.0, 1.0, //
            2.0, 4.0, 1.0, 2.0, //
            2.0, 1.0, 4.0, 2.0, //
            1.0, 2.0, 2.0, 4.0,
        ],
    ) / 36.0;
    assert_matrix_eq!(mass, expected, comp = abs, tol = 1e-13);
}

#[test]
fn interior_diffusion_residual_vanishes_for_linear_fields() {
    // u = x + y is in the bilinear space, and ∆u = 0, so the residual can only
    // be nonzero on the boundary.
    let mesh = unit_square_quad_mesh(2);
    let mut functional = Functional::<2>::new(mesh, h1(1, 1), &[h1(1, 1)]).unwrap();
    functional.add_domain_integral(0, Diffusion).unwrap();

    let u = vertex_function(&functional, |v| v[0] + v[1]);
    let residual = functional.residual(&[u]).unwrap();

    // The single interior vertex of the 2x2 mesh
    assert_scalar_eq!(residual[4], 0.0, comp = abs, tol = 1e-13);
    // The residual of a harmonic field sums to zero by the divergence theorem
    assert_scalar_eq!(residual.sum(), 0.0, comp = abs, tol = 1e-12);
}

#[test]
fn linear_forms_satisfy_residual_equals_gradient_action() {
    let mesh = unit_square_quad_mesh(2);
    let mut functional = Functional::<2>::new(mesh, h1(1, 1), &[h1(1, 1)]).unwrap();
    functional.add_domain_integral(0, Diffusion).unwrap();

    let u = vertex_function(&functional, |v| v[0] * v[1] + 2.0 * v[0]);
    let (residual, gradient) = functional
        .residual_and_gradient(DifferentiateWrt(0), &[u.clone()])
        .unwrap();

    // For a linear integrand, R(u) = K u exactly.
    let applied = gradient.apply(&u);
    assert_matrix_eq!(residual, applied, comp = abs, tol = 1e-12);

    let assembled = gradient.assemble();
    let multiplied = &assembled * &u;
    assert_matrix_eq!(residual, multiplied, comp = abs, tol = 1e-12);
}

#[test]
fn nonlinear_gradient_matches_finite_differences() {
    let mesh = unit_square_quad_mesh(2);
    let mut functional = Functional::<2>::new(mesh, h1(1, 1), &[h1(1, 1)]).unwrap();
    functional.add_domain_integral(0, ReactionDiffusion).unwrap();

    let n = functional.trial_space(0).num_true_dofs();
    let u = DVector::from_fn(n, |i, _| 0.3 + 0.1 * (i as f64).sin());
    let v = DVector::from_fn(n, |i, _| (1.7 * i as f64 + 0.2).cos());

    let (_, gradient) = functional
        .residual_and_gradient(DifferentiateWrt(0), &[u.clone()])
        .unwrap();
    let jv = gradient.apply(&v);

    // Matrix-free action and assembled matrix agree to machine precision.
    let assembled = gradient.assemble();
    let assembled_jv = &assembled * &v;
    assert_matrix_eq!(jv, assembled_jv, comp = abs, tol = 1e-12);

    // Central differences of the residual approximate the same action.
    let eps = 1e-6;
    let step = &v * eps;
    let r_plus = functional.residual(&[&u + &step]).unwrap();
    let r_minus = functional.residual(&[&u - &step]).unwrap();
    let fd = (r_plus - r_minus) / (2.0 * eps);
    assert_matrix_eq!(jv, fd, comp = abs, tol = 1e-7);
}

#[test]
fn vector_valued_residual_per_component() {
    // s = u with u constant: every dof receives value * ∫ φ_i = value / 4 on
    // the single-element unit square.
    struct VectorMass;

    impl DomainQFunction<2, 2> for VectorMass {
        fn call<S: DifferentiableScalar>(
            &self,
            _x: Vector<2>,
            u: Tensor<S, 2>,
            _du: Tensor<Tensor<S, 2>, 2>,
        ) -> (Tensor<S, 2>, Tensor<Tensor<S, 2>, 2>) {
            (u, Tensor::zeros())
        }
    }

    let mesh = unit_square_quad_mesh(1);
    let mut functional = Functional::<2>::new(mesh, h1(1, 2), &[h1(1, 2)]).unwrap();
    functional.add_domain_integral(0, VectorMass).unwrap();

    let u = DVector::from_fn(8, |i, _| if i % 2 == 0 { 3.0 } else { -1.0 });
    let residual = functional.residual(&[u]).unwrap();
    for node in 0..4 {
        assert_scalar_eq!(residual[2 * node], 0.75, comp = abs, tol = 1e-13);
        assert_scalar_eq!(residual[2 * node + 1], -0.25, comp = abs, tol = 1e-13);
    }
}

#[test]
fn boundary_integral_tests_the_trace() {
    let mesh = unit_square_quad_mesh(1);
    let mut functional = Functional::<2>::new(mesh, h1(1, 1), &[h1(1, 1)]).unwrap();
    functional
        .add_boundary_integral(0, &BTreeSet::from([2]), BoundaryMass)
        .unwrap();

    // u = 1: each node of the right edge receives ∫ φ_i over an edge of
    // length one, i.e. 1/2; all other dofs are untouched.
    let u = DVector::from_element(4, 1.0);
    let residual = functional.residual(&[u]).unwrap();
    assert_scalar_eq!(residual[0], 0.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(residual[1], 0.5, comp = abs, tol = 1e-13);
    assert_scalar_eq!(residual[2], 0.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(residual[3], 0.5, comp = abs, tol = 1e-13);
}

#[test]
fn boundary_gradient_assembles_the_edge_mass_matrix() {
    let mesh = unit_square_quad_mesh(1);
    let mut functional = Functional::<2>::new(mesh, h1(1, 1), &[h1(1, 1)]).unwrap();
    functional
        .add_boundary_integral(0, &BTreeSet::from([2]), BoundaryMass)
        .unwrap();

    let u = DVector::zeros(4);
    let (_, gradient) = functional
        .residual_and_gradient(DifferentiateWrt(0), &[u])
        .unwrap();
    let matrix = gradient.assemble();

    // The right edge couples nodes 1 and 3 through the segment mass matrix.
    let mut expected = DMatrix::zeros(4, 4);
    expected[(1, 1)] = 2.0 / 6.0;
    expected[(1, 3)] = 1.0 / 6.0;
    expected[(3, 1)] = 1.0 / 6.0;
    expected[(3, 3)] = 2.0 / 6.0;
    assert_matrix_eq!(matrix, expected, comp = abs, tol = 1e-13);
}

#[test]
fn terms_bound_to_other_trial_spaces_do_not_contribute_to_the_gradient() {
    let mesh = unit_square_quad_mesh(1);
    let mut functional = Functional::<2>::new(mesh, h1(1, 1), &[h1(1, 1), h1(1, 1)]).unwrap();
    functional.add_domain_integral(1, Mass).unwrap();

    let u0 = DVector::zeros(4);
    let u1 = DVector::from_element(4, 2.0);
    let (residual, gradient) = functional
        .residual_and_gradient(DifferentiateWrt(0), &[u0, u1])
        .unwrap();

    // The term bound to trial space 1 still contributes to the residual...
    assert_scalar_eq!(residual.sum(), 2.0, comp = abs, tol = 1e-12);

    // ...but the derivative with respect to trial space 0 is empty.
    let v = DVector::from_element(4, 1.0);
    let jv = gradient.apply(&v);
    assert_scalar_eq!(jv.norm(), 0.0, comp = abs, tol = 1e-14);
    let assembled = gradient.assemble();
    assert_eq!(assembled.nnz(), 0);
}

#[test]
fn higher_order_segments_integrate_exactly() {
    // With an order-2 space, the interpolant of x^2 is exact, and
    // Σ_i R_i = ∫ u Σ_i φ_i = ∫ x^2 = 1/3 by partition of unity.
    let mesh = segment_mesh(2);
    let mut functional = Functional::<1>::new(mesh, h1(2, 1), &[h1(2, 1)]).unwrap();
    functional.add_domain_integral(0, Mass).unwrap();

    // 3 vertices at 0, 0.5, 1 followed by the element midpoints 0.25, 0.75
    let coords = [0.0, 0.5, 1.0, 0.25, 0.75];
    let u = DVector::from_iterator(5, coords.iter().map(|x| x * x));
    let residual = functional.residual(&[u]).unwrap();
    assert_scalar_eq!(residual.sum(), 1.0 / 3.0, comp = abs, tol = 1e-13);
}

#[test]
fn configuration_errors_are_reported() {
    let mesh = unit_square_quad_mesh(1);
    assert!(Functional::<2>::new(mesh.clone(), h1(1, 1), &[]).is_err());

    let mut functional = Functional::<2>::new(mesh, h1(1, 1), &[h1(1, 1)]).unwrap();
    // Component count of the integrand must match the spaces
    struct TwoComponents;
    impl DomainQFunction<2, 2> for TwoComponents {
        fn call<S: DifferentiableScalar>(
            &self,
            _x: Vector<2>,
            u: Tensor<S, 2>,
            _du: Tensor<Tensor<S, 2>, 2>,
        ) -> (Tensor<S, 2>, Tensor<Tensor<S, 2>, 2>) {
            (u, Tensor::zeros())
        }
    }
    assert!(functional.add_domain_integral(0, TwoComponents).is_err());
    // Trial index out of range
    assert!(functional.add_domain_integral(1, Mass).is_err());

    functional.add_domain_integral(0, Mass).unwrap();
    // Differentiation target out of range
    let u = DVector::zeros(4);
    assert!(functional
        .residual_and_gradient(DifferentiateWrt(1), &[u.clone()])
        .is_err());
    // State count and sizes are checked
    assert!(functional.residual(&[]).is_err());
    assert!(functional.residual(&[DVector::zeros(3)]).is_err());
}

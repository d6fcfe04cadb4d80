use matrixcompare::assert_scalar_eq;
use proptest::prelude::*;
use weakform::tensor::{
    ddot, det, dot, get_gradient, get_value, inv, linear_solve, make_dual, make_dual_matrix,
    make_dual_vector, norm, transpose, DifferentiableScalar, Dual, Matrix, Tensor, Vector, Zero,
};

#[test]
fn scalar_arithmetic_propagates_derivatives() {
    // f(x) = x^2 sin(x), f'(x) = 2 x sin(x) + x^2 cos(x)
    let x = 1.3;
    let d = make_dual(x);
    let f = d * d * d.sin();
    assert_scalar_eq!(f.value, x * x * x.sin(), comp = abs, tol = 1e-14);
    assert_scalar_eq!(
        f.gradient,
        2.0 * x * x.sin() + x * x * x.cos(),
        comp = abs,
        tol = 1e-13
    );
}

#[test]
fn quotient_rule() {
    // f(x) = (x + 1) / (x^2 + 2), f'(x) = (x^2 + 2 - 2 x (x + 1)) / (x^2 + 2)^2
    let x = 0.7;
    let d = make_dual(x);
    let f = (d + 1.0) / (d * d + 2.0);
    let denom = x * x + 2.0;
    assert_scalar_eq!(f.value, (x + 1.0) / denom, comp = abs, tol = 1e-14);
    assert_scalar_eq!(
        f.gradient,
        (denom - 2.0 * x * (x + 1.0)) / (denom * denom),
        comp = abs,
        tol = 1e-13
    );
}

#[test]
fn elementary_functions_match_analytic_derivatives() {
    let x = 0.9;
    let d = make_dual(x);
    assert_scalar_eq!(d.sqrt().gradient, 0.5 / x.sqrt(), comp = abs, tol = 1e-13);
    assert_scalar_eq!(d.exp().gradient, x.exp(), comp = abs, tol = 1e-13);
    assert_scalar_eq!(d.ln().gradient, 1.0 / x, comp = abs, tol = 1e-13);
    assert_scalar_eq!(d.sin().gradient, x.cos(), comp = abs, tol = 1e-13);
    assert_scalar_eq!(d.cos().gradient, -x.sin(), comp = abs, tol = 1e-13);
    assert_scalar_eq!(
        d.powi(4).gradient,
        4.0 * x.powi(3),
        comp = abs,
        tol = 1e-13
    );
    assert_scalar_eq!(d.abs().gradient, 1.0, comp = abs, tol = 1e-14);
    // On the negative branch d|x|/dx = -1
    assert_scalar_eq!(make_dual(-x).abs().gradient, -1.0, comp = abs, tol = 1e-14);
}

#[test]
fn vector_seeding_accumulates_the_full_gradient() {
    // f(v) = v · v has gradient 2 v
    let v = Tensor([1.0, -2.0, 0.5]);
    let v_dual = make_dual_vector(v);
    let f = dot(v_dual, v_dual);
    assert_scalar_eq!(get_value(f), dot(v, v), comp = abs, tol = 1e-14);
    let gradient: Vector<3> = get_gradient(f);
    assert!(norm(gradient - v * 2.0) <= 1e-13);
}

#[test]
fn matrix_seeding_recovers_the_determinant_derivative() {
    // d det(A) / dA = det(A) A^{-T}
    let a = Matrix::<2, 2>::from([[3.0, 1.0], [2.0, 4.0]]);
    let a_dual = make_dual_matrix(a);
    let f = det(a_dual);
    assert_scalar_eq!(get_value(f), det(a), comp = abs, tol = 1e-13);
    let gradient: Matrix<2, 2> = get_gradient(f);
    let expected = transpose(inv(a)) * det(a);
    assert!(norm(gradient - expected) <= 1e-12);
}

#[test]
fn dual_matrix_inverse_matches_finite_differences() {
    let a = Matrix::<3, 3>::from([[4.0, 1.0, 0.0], [1.0, 3.0, 1.0], [0.0, 1.0, 2.0]]);
    let a_inv_dual = inv(make_dual_matrix(a));

    // Perturb one entry and compare the propagated derivative against a
    // central difference of the plain inverse.
    let (p, q) = (1, 2);
    let eps = 1e-6;
    let mut plus = a;
    let mut minus = a;
    plus[p][q] += eps;
    minus[p][q] -= eps;
    let fd = (inv(plus) - inv(minus)) * (0.5 / eps);

    for i in 0..3 {
        for j in 0..3 {
            assert_scalar_eq!(
                a_inv_dual[i][j].gradient[p][q],
                fd[i][j],
                comp = abs,
                tol = 1e-7
            );
        }
    }
}

#[test]
fn linear_solve_carries_derivatives_through_elimination() {
    let a = Matrix::<2, 2>::from([[4.0, 1.0], [2.0, 5.0]]);
    let b = Tensor([1.0, -3.0]);
    let a_dual = make_dual_matrix(a);
    let b_dual = Tensor::from_fn(|i| Dual {
        value: b[i],
        gradient: Matrix::<2, 2>::zeros(),
    });

    // Elimination on duals must agree with the analytic dual inverse.
    let x = linear_solve(a_dual, b_dual);
    let by_inverse = dot(inv(a_dual), b_dual);
    for i in 0..2 {
        assert_scalar_eq!(x[i].value, by_inverse[i].value, comp = abs, tol = 1e-13);
        assert!(norm(x[i].gradient - by_inverse[i].gradient) <= 1e-12);
    }

    let values: Vector<2> = Tensor::from_fn(|i| x[i].value);
    assert!(norm(dot(a, values) - b) <= 1e-13);
}

#[test]
fn plain_quantities_report_statically_zero_gradients() {
    let _: Zero = get_gradient(2.0);
    let _: Zero = get_gradient(Tensor([1.0, 2.0]));
    let _: Zero = get_gradient(Matrix::<2, 2>::from([[1.0, 0.0], [0.0, 1.0]]));
    assert_scalar_eq!(get_value(2.0), 2.0);
}

fn finite_difference(f: impl Fn(f64) -> f64, x: f64) -> f64 {
    let eps = 1e-6;
    (f(x + eps) - f(x - eps)) / (2.0 * eps)
}

proptest! {
    #[test]
    fn dual_derivative_matches_finite_differences(x in 0.1..3.0f64) {
        let f = |s: f64| (s * s + 1.0).sqrt() * s.sin();
        let d = make_dual(x);
        let dual_result = (d * d + 1.0).sqrt() * d.sin();
        prop_assert!((dual_result.value - f(x)).abs() <= 1e-12);
        prop_assert!((dual_result.gradient - finite_difference(f, x)).abs() <= 1e-7);
    }

    #[test]
    fn product_rule_holds(x in -2.0..2.0f64, y in -2.0..2.0f64) {
        let d = make_dual(x);
        let c = y; // constant with respect to x
        let f = d * d * c + d * 3.0;
        prop_assert!((f.gradient - (2.0 * x * c + 3.0)).abs() <= 1e-12);
    }

    #[test]
    fn dual_inner_product_gradient_is_linear(
        v in prop::array::uniform3(-5.0..5.0f64).prop_map(Tensor),
        w in prop::array::uniform3(-5.0..5.0f64).prop_map(Tensor),
    ) {
        // f(v) = w · v has constant gradient w
        let v_dual = make_dual_vector(v);
        let mut f = weakform::tensor::Dual::<Vector<3>>::constant(0.0);
        for i in 0..3 {
            f = f + v_dual[i] * w[i];
        }
        let gradient: Vector<3> = get_gradient(f);
        prop_assert!(norm(gradient - w) <= 1e-12);
    }
}

#[test]
fn joint_contraction_through_ddot() {
    // F(A) = A : A has derivative 2 A
    let a = Matrix::<2, 3>::from([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    let a_dual = make_dual_matrix(a);
    let f = ddot(a_dual, a_dual);
    let gradient: Matrix<2, 3> = get_gradient(f);
    assert!(norm(gradient - a * 2.0) <= 1e-12);
}

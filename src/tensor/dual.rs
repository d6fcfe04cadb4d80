use crate::tensor::zero::Zero;
use crate::tensor::{Matrix, Tensor, TensorElement, Vector};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// Gradient carrier types for [`Dual`] numbers.
///
/// A gradient must form a vector space over `f64`. Implementors are `f64`
/// (scalar seed), [`Zero`] (statically vanishing derivative), fixed-shape
/// tensors of gradients, and user-defined blocks such as the per-quadrature
/// tangents used by the integral kernels.
pub trait Gradient:
    Copy
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + Mul<f64, Output = Self>
{
    fn zero() -> Self;
}

impl Gradient for f64 {
    fn zero() -> f64 {
        0.0
    }
}

impl Gradient for Zero {
    fn zero() -> Zero {
        Zero
    }
}

impl<G: Gradient, const M: usize> Gradient for Tensor<G, M> {
    fn zero() -> Self {
        Tensor([G::zero(); M])
    }
}

/// A forward-mode dual number: a value together with the gradient it carries.
///
/// Arithmetic propagates derivatives by the usual rules, e.g.
/// `(a, g) * (b, h) = (a * b, g * b + h * a)`. The gradient type is generic so
/// that a single differentiation pass can carry scalar, tensor or composite
/// seeds.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Dual<G> {
    pub value: f64,
    pub gradient: G,
}

impl<G: Gradient> Dual<G> {
    pub fn constant(value: f64) -> Self {
        Dual {
            value,
            gradient: G::zero(),
        }
    }
}

impl<G: Gradient> TensorElement for Dual<G> {
    fn zero() -> Self {
        Dual::constant(0.0)
    }
}

impl<G: Gradient> From<f64> for Dual<G> {
    fn from(value: f64) -> Self {
        Dual::constant(value)
    }
}

impl<G: Add<Output = G>> Add for Dual<G> {
    type Output = Dual<G>;

    fn add(self, rhs: Self) -> Self {
        Dual {
            value: self.value + rhs.value,
            gradient: self.gradient + rhs.gradient,
        }
    }
}

impl<G> Add<f64> for Dual<G> {
    type Output = Dual<G>;

    fn add(self, rhs: f64) -> Self {
        Dual {
            value: self.value + rhs,
            gradient: self.gradient,
        }
    }
}

impl<G> Add<Dual<G>> for f64 {
    type Output = Dual<G>;

    fn add(self, rhs: Dual<G>) -> Dual<G> {
        Dual {
            value: self + rhs.value,
            gradient: rhs.gradient,
        }
    }
}

impl<G: Sub<Output = G>> Sub for Dual<G> {
    type Output = Dual<G>;

    fn sub(self, rhs: Self) -> Self {
        Dual {
            value: self.value - rhs.value,
            gradient: self.gradient - rhs.gradient,
        }
    }
}

impl<G> Sub<f64> for Dual<G> {
    type Output = Dual<G>;

    fn sub(self, rhs: f64) -> Self {
        Dual {
            value: self.value - rhs,
            gradient: self.gradient,
        }
    }
}

impl<G: Neg<Output = G>> Sub<Dual<G>> for f64 {
    type Output = Dual<G>;

    fn sub(self, rhs: Dual<G>) -> Dual<G> {
        Dual {
            value: self - rhs.value,
            gradient: -rhs.gradient,
        }
    }
}

impl<G: Neg<Output = G>> Neg for Dual<G> {
    type Output = Dual<G>;

    fn neg(self) -> Self {
        Dual {
            value: -self.value,
            gradient: -self.gradient,
        }
    }
}

impl<G: Gradient> Mul for Dual<G> {
    type Output = Dual<G>;

    fn mul(self, rhs: Self) -> Self {
        Dual {
            value: self.value * rhs.value,
            gradient: self.gradient * rhs.value + rhs.gradient * self.value,
        }
    }
}

impl<G: Mul<f64, Output = G>> Mul<f64> for Dual<G> {
    type Output = Dual<G>;

    fn mul(self, rhs: f64) -> Self {
        Dual {
            value: self.value * rhs,
            gradient: self.gradient * rhs,
        }
    }
}

impl<G: Mul<f64, Output = G>> Mul<Dual<G>> for f64 {
    type Output = Dual<G>;

    fn mul(self, rhs: Dual<G>) -> Dual<G> {
        Dual {
            value: self * rhs.value,
            gradient: rhs.gradient * self,
        }
    }
}

impl<G: Gradient> Div for Dual<G> {
    type Output = Dual<G>;

    fn div(self, rhs: Self) -> Self {
        let inv = 1.0 / rhs.value;
        Dual {
            value: self.value * inv,
            gradient: self.gradient * inv - rhs.gradient * (self.value * inv * inv),
        }
    }
}

impl<G: Mul<f64, Output = G>> Div<f64> for Dual<G> {
    type Output = Dual<G>;

    fn div(self, rhs: f64) -> Self {
        Dual {
            value: self.value / rhs,
            gradient: self.gradient * (1.0 / rhs),
        }
    }
}

impl<G: Gradient> Div<Dual<G>> for f64 {
    type Output = Dual<G>;

    fn div(self, rhs: Dual<G>) -> Dual<G> {
        let inv = 1.0 / rhs.value;
        Dual {
            value: self * inv,
            gradient: rhs.gradient * (-self * inv * inv),
        }
    }
}

impl<G: Gradient> AddAssign for Dual<G> {
    fn add_assign(&mut self, rhs: Self) {
        self.value += rhs.value;
        self.gradient += rhs.gradient;
    }
}

impl<G: Gradient> SubAssign for Dual<G> {
    fn sub_assign(&mut self, rhs: Self) {
        self.value -= rhs.value;
        self.gradient -= rhs.gradient;
    }
}

/// Scalar types admissible in quadrature functions.
///
/// Integrands are written once, generically over `S`, and instantiated with
/// `S = f64` for plain evaluation and `S = Dual<_>` for differentiation.
pub trait DifferentiableScalar:
    Copy
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + Add<f64, Output = Self>
    + Sub<f64, Output = Self>
    + Mul<f64, Output = Self>
    + Div<f64, Output = Self>
    + From<f64>
    + TensorElement
{
    fn sqrt(self) -> Self;
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn abs(self) -> Self;
    fn powi(self, n: i32) -> Self;
}

impl DifferentiableScalar for f64 {
    fn sqrt(self) -> f64 {
        f64::sqrt(self)
    }

    fn exp(self) -> f64 {
        f64::exp(self)
    }

    fn ln(self) -> f64 {
        f64::ln(self)
    }

    fn sin(self) -> f64 {
        f64::sin(self)
    }

    fn cos(self) -> f64 {
        f64::cos(self)
    }

    fn abs(self) -> f64 {
        f64::abs(self)
    }

    fn powi(self, n: i32) -> f64 {
        f64::powi(self, n)
    }
}

impl<G: Gradient> DifferentiableScalar for Dual<G> {
    fn sqrt(self) -> Self {
        let root = self.value.sqrt();
        Dual {
            value: root,
            gradient: self.gradient * (0.5 / root),
        }
    }

    fn exp(self) -> Self {
        let value = self.value.exp();
        Dual {
            value,
            gradient: self.gradient * value,
        }
    }

    fn ln(self) -> Self {
        Dual {
            value: self.value.ln(),
            gradient: self.gradient * (1.0 / self.value),
        }
    }

    fn sin(self) -> Self {
        Dual {
            value: self.value.sin(),
            gradient: self.gradient * self.value.cos(),
        }
    }

    fn cos(self) -> Self {
        Dual {
            value: self.value.cos(),
            gradient: self.gradient * (-self.value.sin()),
        }
    }

    fn abs(self) -> Self {
        if self.value < 0.0 {
            -self
        } else {
            self
        }
    }

    fn powi(self, n: i32) -> Self {
        Dual {
            value: self.value.powi(n),
            gradient: self.gradient * (f64::from(n) * self.value.powi(n - 1)),
        }
    }
}

/// Seeds a scalar for differentiation: the returned dual has unit gradient.
pub fn make_dual(x: f64) -> Dual<f64> {
    Dual {
        value: x,
        gradient: 1.0,
    }
}

/// Seeds a vector for differentiation.
///
/// Entry `i` of the result carries the basis gradient `e_i`, so a function of
/// the result accumulates its full Jacobian with respect to `v` in one pass.
pub fn make_dual_vector<const N: usize>(v: Vector<N>) -> Tensor<Dual<Vector<N>>, N> {
    Tensor::from_fn(|i| Dual {
        value: v[i],
        gradient: Tensor::from_fn(|k| if k == i { 1.0 } else { 0.0 }),
    })
}

/// Seeds a matrix for differentiation; entry `(i, j)` carries the basis
/// gradient `e_i ⊗ e_j`.
pub fn make_dual_matrix<const M: usize, const N: usize>(
    m: Matrix<M, N>,
) -> Tensor<Tensor<Dual<Matrix<M, N>>, N>, M> {
    Tensor::from_fn(|i| {
        Tensor::from_fn(|j| Dual {
            value: m[i][j],
            gradient: Tensor::from_fn(|k| {
                Tensor::from_fn(|l| if (k, l) == (i, j) { 1.0 } else { 0.0 })
            }),
        })
    })
}

/// Value/gradient extraction from (possibly dual-valued) scalars and tensors.
///
/// For plain `f64` quantities the gradient is [`Zero`], which downstream
/// arithmetic eliminates at compile time.
pub trait DualField {
    type Value;
    type Gradient;

    fn value(self) -> Self::Value;
    fn gradient(self) -> Self::Gradient;
}

impl DualField for f64 {
    type Value = f64;
    type Gradient = Zero;

    fn value(self) -> f64 {
        self
    }

    fn gradient(self) -> Zero {
        Zero
    }
}

impl<const N: usize> DualField for Tensor<f64, N> {
    type Value = Vector<N>;
    type Gradient = Zero;

    fn value(self) -> Vector<N> {
        self
    }

    fn gradient(self) -> Zero {
        Zero
    }
}

impl<const M: usize, const N: usize> DualField for Tensor<Tensor<f64, N>, M> {
    type Value = Matrix<M, N>;
    type Gradient = Zero;

    fn value(self) -> Matrix<M, N> {
        self
    }

    fn gradient(self) -> Zero {
        Zero
    }
}

impl<G: Gradient> DualField for Dual<G> {
    type Value = f64;
    type Gradient = G;

    fn value(self) -> f64 {
        self.value
    }

    fn gradient(self) -> G {
        self.gradient
    }
}

impl<G: Gradient, const N: usize> DualField for Tensor<Dual<G>, N> {
    type Value = Vector<N>;
    type Gradient = Tensor<G, N>;

    fn value(self) -> Vector<N> {
        Tensor::from_fn(|i| self[i].value)
    }

    fn gradient(self) -> Tensor<G, N> {
        Tensor::from_fn(|i| self[i].gradient)
    }
}

impl<G: Gradient, const M: usize, const N: usize> DualField for Tensor<Tensor<Dual<G>, N>, M> {
    type Value = Matrix<M, N>;
    type Gradient = Tensor<Tensor<G, N>, M>;

    fn value(self) -> Matrix<M, N> {
        Tensor::from_fn(|i| Tensor::from_fn(|j| self[i][j].value))
    }

    fn gradient(self) -> Tensor<Tensor<G, N>, M> {
        Tensor::from_fn(|i| Tensor::from_fn(|j| self[i][j].gradient))
    }
}

/// Extracts the value part of a dual-valued quantity (identity on plain ones).
pub fn get_value<T: DualField>(x: T) -> T::Value {
    x.value()
}

/// Extracts the derivative part of a dual-valued quantity.
///
/// For quantities that carry no dual content the result is [`Zero`].
pub fn get_gradient<T: DualField>(x: T) -> T::Gradient {
    x.gradient()
}

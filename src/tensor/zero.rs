use crate::tensor::dual::Dual;
use crate::tensor::{Tensor, TensorElement};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// An algebraic sentinel for eliding no-op tensor operations.
///
/// `Zero` behaves as the additive identity and the multiplicative annihilator:
/// `Zero + x == x`, `Zero * x == Zero`, and contractions with `Zero` are `Zero`.
/// Derivative terms that are statically known to vanish are represented by `Zero`,
/// so that monomorphization prunes the corresponding arithmetic entirely.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Zero;

impl<T> Add<T> for Zero {
    type Output = T;

    fn add(self, other: T) -> T {
        other
    }
}

impl Add<Zero> for f64 {
    type Output = f64;

    fn add(self, _: Zero) -> f64 {
        self
    }
}

impl<T: Copy, const M: usize> Add<Zero> for Tensor<T, M> {
    type Output = Self;

    fn add(self, _: Zero) -> Self {
        self
    }
}

impl<G> Add<Zero> for Dual<G> {
    type Output = Self;

    fn add(self, _: Zero) -> Self {
        self
    }
}

impl<T: Neg> Sub<T> for Zero {
    type Output = T::Output;

    fn sub(self, other: T) -> T::Output {
        -other
    }
}

impl Sub<Zero> for f64 {
    type Output = f64;

    fn sub(self, _: Zero) -> f64 {
        self
    }
}

impl<T: Copy, const M: usize> Sub<Zero> for Tensor<T, M> {
    type Output = Self;

    fn sub(self, _: Zero) -> Self {
        self
    }
}

impl<G> Sub<Zero> for Dual<G> {
    type Output = Self;

    fn sub(self, _: Zero) -> Self {
        self
    }
}

impl Neg for Zero {
    type Output = Zero;

    fn neg(self) -> Zero {
        Zero
    }
}

impl<T> Mul<T> for Zero {
    type Output = Zero;

    fn mul(self, _: T) -> Zero {
        Zero
    }
}

impl Mul<Zero> for f64 {
    type Output = Zero;

    fn mul(self, _: Zero) -> Zero {
        Zero
    }
}

impl<T: Copy, const M: usize> Mul<Zero> for Tensor<T, M> {
    type Output = Zero;

    fn mul(self, _: Zero) -> Zero {
        Zero
    }
}

impl<G> Mul<Zero> for Dual<G> {
    type Output = Zero;

    fn mul(self, _: Zero) -> Zero {
        Zero
    }
}

impl<T> Div<T> for Zero {
    type Output = Zero;

    fn div(self, _: T) -> Zero {
        Zero
    }
}

impl AddAssign<Zero> for Zero {
    fn add_assign(&mut self, _: Zero) {}
}

impl SubAssign<Zero> for Zero {
    fn sub_assign(&mut self, _: Zero) {}
}

impl AddAssign<Zero> for f64 {
    fn add_assign(&mut self, _: Zero) {}
}

impl SubAssign<Zero> for f64 {
    fn sub_assign(&mut self, _: Zero) {}
}

impl<T, const M: usize> AddAssign<Zero> for Tensor<T, M> {
    fn add_assign(&mut self, _: Zero) {}
}

impl<T, const M: usize> SubAssign<Zero> for Tensor<T, M> {
    fn sub_assign(&mut self, _: Zero) {}
}

impl<G> AddAssign<Zero> for Dual<G> {
    fn add_assign(&mut self, _: Zero) {}
}

impl<G> SubAssign<Zero> for Dual<G> {
    fn sub_assign(&mut self, _: Zero) {}
}

impl From<Zero> for f64 {
    fn from(_: Zero) -> f64 {
        0.0
    }
}

impl<T: TensorElement, const M: usize> From<Zero> for Tensor<T, M> {
    fn from(_: Zero) -> Self {
        Tensor::zeros()
    }
}

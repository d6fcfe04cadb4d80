//! Fixed-shape tensors and forward-mode differentiation for quadrature functions.
//!
//! Shapes are part of the type: a rank-`r` tensor is `r` nested levels of
//! [`Tensor`], so `Matrix<M, N>` is `Tensor<Tensor<f64, N>, M>`. Contractions
//! are exposed through operation traits ([`Dot`], [`Inner`], [`Ddot`],
//! [`Outer`], [`ChainRule`]) whose implementations double as the overload set:
//! each admissible shape pair has its own impl with the exact result type, and
//! the [`Zero`] sentinel absorbs contractions that are statically known to
//! vanish.

use std::ops::{Add, AddAssign, Div, Index, IndexMut, Mul, Neg, Sub, SubAssign};

pub mod dual;
pub mod zero;

pub use dual::{
    get_gradient, get_value, make_dual, make_dual_matrix, make_dual_vector, DifferentiableScalar,
    Dual, DualField, Gradient,
};
pub use zero::Zero;

/// A dense tensor of `M` entries of type `T`, stored inline.
///
/// Rank is encoded by nesting: `Tensor<f64, N>` is a vector,
/// `Tensor<Tensor<f64, N>, M>` an `M × N` matrix, and so on. All arithmetic is
/// by value; entries are `Copy`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Tensor<T, const M: usize>(pub [T; M]);

pub type Vector<const M: usize> = Tensor<f64, M>;
pub type Matrix<const M: usize, const N: usize> = Tensor<Tensor<f64, N>, M>;
pub type Tensor3<const M: usize, const N: usize, const P: usize> = Tensor<Matrix<N, P>, M>;
pub type Tensor4<const M: usize, const N: usize, const P: usize, const Q: usize> =
    Tensor<Tensor3<N, P, Q>, M>;

/// Types that can populate tensor entries: `f64`, [`Dual`] numbers, or nested
/// tensors thereof.
pub trait TensorElement: Copy {
    fn zero() -> Self;
}

impl TensorElement for f64 {
    fn zero() -> f64 {
        0.0
    }
}

impl<T: TensorElement, const M: usize> TensorElement for Tensor<T, M> {
    fn zero() -> Self {
        Tensor([T::zero(); M])
    }
}

impl<T: TensorElement, const M: usize> Tensor<T, M> {
    pub fn zeros() -> Self {
        <Self as TensorElement>::zero()
    }
}

impl<T, const M: usize> Tensor<T, M> {
    pub fn from_fn(f: impl FnMut(usize) -> T) -> Self {
        Tensor(std::array::from_fn(f))
    }

    pub const fn len(&self) -> usize {
        M
    }

    pub const fn is_empty(&self) -> bool {
        M == 0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }
}

impl<T: TensorElement, const M: usize> Default for Tensor<T, M> {
    fn default() -> Self {
        Self::zeros()
    }
}

impl<T, const M: usize> From<[T; M]> for Tensor<T, M> {
    fn from(entries: [T; M]) -> Self {
        Tensor(entries)
    }
}

impl<const M: usize, const N: usize> From<[[f64; N]; M]> for Matrix<M, N> {
    fn from(rows: [[f64; N]; M]) -> Self {
        Tensor(rows.map(Tensor))
    }
}

impl From<Tensor<f64, 1>> for f64 {
    fn from(t: Tensor<f64, 1>) -> f64 {
        t.0[0]
    }
}

impl<T, const M: usize> Index<usize> for Tensor<T, M> {
    type Output = T;

    fn index(&self, i: usize) -> &T {
        &self.0[i]
    }
}

impl<T, const M: usize> IndexMut<usize> for Tensor<T, M> {
    fn index_mut(&mut self, i: usize) -> &mut T {
        &mut self.0[i]
    }
}

impl<'a, T, const M: usize> IntoIterator for &'a Tensor<T, M> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Builds a rank-1 tensor entry by entry.
pub fn make_vector<T, const M: usize>(f: impl FnMut(usize) -> T) -> Tensor<T, M> {
    Tensor::from_fn(f)
}

/// Builds a rank-2 tensor entry by entry.
pub fn make_matrix<T, const M: usize, const N: usize>(
    mut f: impl FnMut(usize, usize) -> T,
) -> Tensor<Tensor<T, N>, M> {
    Tensor::from_fn(|i| Tensor::from_fn(|j| f(i, j)))
}

/// Builds a rank-3 tensor entry by entry.
pub fn make_tensor3<T, const M: usize, const N: usize, const P: usize>(
    mut f: impl FnMut(usize, usize, usize) -> T,
) -> Tensor<Tensor<Tensor<T, P>, N>, M> {
    Tensor::from_fn(|i| Tensor::from_fn(|j| Tensor::from_fn(|k| f(i, j, k))))
}

/// Builds a rank-4 tensor entry by entry.
pub fn make_tensor4<T, const M: usize, const N: usize, const P: usize, const Q: usize>(
    mut f: impl FnMut(usize, usize, usize, usize) -> T,
) -> Tensor<Tensor<Tensor<Tensor<T, Q>, P>, N>, M> {
    Tensor::from_fn(|i| {
        Tensor::from_fn(|j| Tensor::from_fn(|k| Tensor::from_fn(|l| f(i, j, k, l))))
    })
}

// Elementwise arithmetic. The element types of the two operands may differ
// (e.g. dual-valued minus plain), as long as the elements themselves combine.

impl<S, U, const M: usize> Add<Tensor<U, M>> for Tensor<S, M>
where
    S: Add<U> + Copy,
    U: Copy,
{
    type Output = Tensor<S::Output, M>;

    fn add(self, rhs: Tensor<U, M>) -> Self::Output {
        Tensor::from_fn(|i| self.0[i] + rhs.0[i])
    }
}

impl<S, U, const M: usize> Sub<Tensor<U, M>> for Tensor<S, M>
where
    S: Sub<U> + Copy,
    U: Copy,
{
    type Output = Tensor<S::Output, M>;

    fn sub(self, rhs: Tensor<U, M>) -> Self::Output {
        Tensor::from_fn(|i| self.0[i] - rhs.0[i])
    }
}

impl<T: Neg<Output = T> + Copy, const M: usize> Neg for Tensor<T, M> {
    type Output = Self;

    fn neg(self) -> Self {
        Tensor::from_fn(|i| -self.0[i])
    }
}

impl<S: AddAssign<U> + Copy, U: Copy, const M: usize> AddAssign<Tensor<U, M>> for Tensor<S, M> {
    fn add_assign(&mut self, rhs: Tensor<U, M>) {
        for i in 0..M {
            self.0[i] += rhs.0[i];
        }
    }
}

impl<S: SubAssign<U> + Copy, U: Copy, const M: usize> SubAssign<Tensor<U, M>> for Tensor<S, M> {
    fn sub_assign(&mut self, rhs: Tensor<U, M>) {
        for i in 0..M {
            self.0[i] -= rhs.0[i];
        }
    }
}

impl<T: Copy, const M: usize> Mul<Tensor<T, M>> for f64
where
    f64: Mul<T>,
{
    type Output = Tensor<<f64 as Mul<T>>::Output, M>;

    fn mul(self, rhs: Tensor<T, M>) -> Self::Output {
        Tensor::from_fn(|i| self * rhs.0[i])
    }
}

impl<T: Mul<f64> + Copy, const M: usize> Mul<f64> for Tensor<T, M> {
    type Output = Tensor<T::Output, M>;

    fn mul(self, rhs: f64) -> Self::Output {
        Tensor::from_fn(|i| self.0[i] * rhs)
    }
}

impl<G: Gradient, T: Copy, const M: usize> Mul<Tensor<T, M>> for Dual<G>
where
    Dual<G>: Mul<T>,
{
    type Output = Tensor<<Dual<G> as Mul<T>>::Output, M>;

    fn mul(self, rhs: Tensor<T, M>) -> Self::Output {
        Tensor::from_fn(|i| self * rhs.0[i])
    }
}

impl<G: Gradient, T: Mul<Dual<G>> + Copy, const M: usize> Mul<Dual<G>> for Tensor<T, M> {
    type Output = Tensor<T::Output, M>;

    fn mul(self, rhs: Dual<G>) -> Self::Output {
        Tensor::from_fn(|i| self.0[i] * rhs)
    }
}

impl<T: Div<f64> + Copy, const M: usize> Div<f64> for Tensor<T, M> {
    type Output = Tensor<T::Output, M>;

    fn div(self, rhs: f64) -> Self::Output {
        Tensor::from_fn(|i| self.0[i] / rhs)
    }
}

impl<G: Gradient, T: Div<Dual<G>> + Copy, const M: usize> Div<Dual<G>> for Tensor<T, M> {
    type Output = Tensor<T::Output, M>;

    fn div(self, rhs: Dual<G>) -> Self::Output {
        Tensor::from_fn(|i| self.0[i] / rhs)
    }
}

/// The closed set of scalar operations tensor contractions are generic over.
pub trait Ring:
    Copy
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + Mul<f64, Output = Self>
    + TensorElement
{
}

impl Ring for f64 {}

impl<G: Gradient> Ring for Dual<G> {}

/// Single-index contraction (matrix-style product) between adjacent indices.
pub trait Dot<Rhs> {
    type Output;

    fn dot_impl(self, rhs: Rhs) -> Self::Output;
}

/// Contracts the last index of `a` with the first index of `b`.
pub fn dot<A: Dot<B>, B>(a: A, b: B) -> A::Output {
    a.dot_impl(b)
}

// vec · vec for the two concrete scalar families. These cannot be generic over
// the scalar without colliding with the square mat · mat impl.
impl<const M: usize> Dot<Tensor<f64, M>> for Tensor<f64, M> {
    type Output = f64;

    fn dot_impl(self, rhs: Tensor<f64, M>) -> f64 {
        let mut out = 0.0;
        for i in 0..M {
            out += self.0[i] * rhs.0[i];
        }
        out
    }
}

impl<G: Gradient, const M: usize> Dot<Tensor<Dual<G>, M>> for Tensor<Dual<G>, M> {
    type Output = Dual<G>;

    fn dot_impl(self, rhs: Tensor<Dual<G>, M>) -> Dual<G> {
        let mut out = Dual::constant(0.0);
        for i in 0..M {
            out += self.0[i] * rhs.0[i];
        }
        out
    }
}

// mat · vec
impl<S: Ring, const M: usize, const N: usize> Dot<Tensor<S, N>> for Tensor<Tensor<S, N>, M> {
    type Output = Tensor<S, M>;

    fn dot_impl(self, rhs: Tensor<S, N>) -> Tensor<S, M> {
        Tensor::from_fn(|i| {
            let mut out = S::zero();
            for j in 0..N {
                out += self.0[i].0[j] * rhs.0[j];
            }
            out
        })
    }
}

// vec · mat
impl<S: Ring, const M: usize, const N: usize> Dot<Tensor<Tensor<S, N>, M>> for Tensor<S, M> {
    type Output = Tensor<S, N>;

    fn dot_impl(self, rhs: Tensor<Tensor<S, N>, M>) -> Tensor<S, N> {
        Tensor::from_fn(|j| {
            let mut out = S::zero();
            for i in 0..M {
                out += self.0[i] * rhs.0[i].0[j];
            }
            out
        })
    }
}

// mat · mat
impl<S: Ring, const M: usize, const N: usize, const P: usize> Dot<Tensor<Tensor<S, P>, N>>
    for Tensor<Tensor<S, N>, M>
{
    type Output = Tensor<Tensor<S, P>, M>;

    fn dot_impl(self, rhs: Tensor<Tensor<S, P>, N>) -> Self::Output {
        Tensor::from_fn(|i| {
            Tensor::from_fn(|j| {
                let mut out = S::zero();
                for k in 0..N {
                    out += self.0[i].0[k] * rhs.0[k].0[j];
                }
                out
            })
        })
    }
}

// rank-3 · vec
impl<S: Ring, const M: usize, const N: usize, const P: usize> Dot<Tensor<S, P>>
    for Tensor<Tensor<Tensor<S, P>, N>, M>
{
    type Output = Tensor<Tensor<S, N>, M>;

    fn dot_impl(self, rhs: Tensor<S, P>) -> Self::Output {
        Tensor::from_fn(|i| {
            Tensor::from_fn(|j| {
                let mut out = S::zero();
                for k in 0..P {
                    out += self.0[i].0[j].0[k] * rhs.0[k];
                }
                out
            })
        })
    }
}

// vec · rank-3
impl<S: Ring, const M: usize, const N: usize, const P: usize>
    Dot<Tensor<Tensor<Tensor<S, P>, N>, M>> for Tensor<S, M>
{
    type Output = Tensor<Tensor<S, P>, N>;

    fn dot_impl(self, rhs: Tensor<Tensor<Tensor<S, P>, N>, M>) -> Self::Output {
        Tensor::from_fn(|j| {
            Tensor::from_fn(|k| {
                let mut out = S::zero();
                for i in 0..M {
                    out += self.0[i] * rhs.0[i].0[j].0[k];
                }
                out
            })
        })
    }
}

// rank-4 · vec
impl<S: Ring, const M: usize, const N: usize, const P: usize, const Q: usize> Dot<Tensor<S, Q>>
    for Tensor<Tensor<Tensor<Tensor<S, Q>, P>, N>, M>
{
    type Output = Tensor<Tensor<Tensor<S, P>, N>, M>;

    fn dot_impl(self, rhs: Tensor<S, Q>) -> Self::Output {
        Tensor::from_fn(|i| {
            Tensor::from_fn(|j| {
                Tensor::from_fn(|k| {
                    let mut out = S::zero();
                    for l in 0..Q {
                        out += self.0[i].0[j].0[k].0[l] * rhs.0[l];
                    }
                    out
                })
            })
        })
    }
}

// vec · rank-4
impl<S: Ring, const M: usize, const N: usize, const P: usize, const Q: usize>
    Dot<Tensor<Tensor<Tensor<Tensor<S, Q>, P>, N>, M>> for Tensor<S, M>
{
    type Output = Tensor<Tensor<Tensor<S, Q>, P>, N>;

    fn dot_impl(self, rhs: Tensor<Tensor<Tensor<Tensor<S, Q>, P>, N>, M>) -> Self::Output {
        Tensor::from_fn(|j| {
            Tensor::from_fn(|k| {
                Tensor::from_fn(|l| {
                    let mut out = S::zero();
                    for i in 0..M {
                        out += self.0[i] * rhs.0[i].0[j].0[k].0[l];
                    }
                    out
                })
            })
        })
    }
}

impl<T> Dot<T> for Zero {
    type Output = Zero;

    fn dot_impl(self, _: T) -> Zero {
        Zero
    }
}

impl<T: Copy, const M: usize> Dot<Zero> for Tensor<T, M> {
    type Output = Zero;

    fn dot_impl(self, _: Zero) -> Zero {
        Zero
    }
}

/// Full contraction over all indices of two same-shape tensors.
pub trait Inner<Rhs = Self> {
    type Output;

    fn inner_impl(self, rhs: Rhs) -> Self::Output;
}

/// Contracts every index of `a` against the corresponding index of `b`.
pub fn inner<A: Inner<B>, B>(a: A, b: B) -> A::Output {
    a.inner_impl(b)
}

impl Inner for f64 {
    type Output = f64;

    fn inner_impl(self, rhs: f64) -> f64 {
        self * rhs
    }
}

impl<G: Gradient> Inner for Dual<G> {
    type Output = Dual<G>;

    fn inner_impl(self, rhs: Self) -> Self {
        self * rhs
    }
}

impl<T, const M: usize> Inner for Tensor<T, M>
where
    T: Inner<T> + Copy,
    T::Output: Add<Output = T::Output> + Copy,
{
    type Output = T::Output;

    fn inner_impl(self, rhs: Self) -> T::Output {
        let mut out = self.0[0].inner_impl(rhs.0[0]);
        for i in 1..M {
            out = out + self.0[i].inner_impl(rhs.0[i]);
        }
        out
    }
}

impl<T> Inner<T> for Zero {
    type Output = Zero;

    fn inner_impl(self, _: T) -> Zero {
        Zero
    }
}

impl<T: Copy, const M: usize> Inner<Zero> for Tensor<T, M> {
    type Output = Zero;

    fn inner_impl(self, _: Zero) -> Zero {
        Zero
    }
}

/// Double contraction of the two trailing indices of `a` with a rank-2 `b`.
pub trait Ddot<Rhs> {
    type Output;

    fn ddot_impl(self, rhs: Rhs) -> Self::Output;
}

/// Contracts the last two indices of `a` against the rank-2 tensor `b`.
pub fn ddot<A: Ddot<B>, B>(a: A, b: B) -> A::Output {
    a.ddot_impl(b)
}

// mat : mat
impl<S: Ring, const M: usize, const N: usize> Ddot<Tensor<Tensor<S, N>, M>>
    for Tensor<Tensor<S, N>, M>
{
    type Output = S;

    fn ddot_impl(self, rhs: Self) -> S {
        let mut out = S::zero();
        for i in 0..M {
            for j in 0..N {
                out += self.0[i].0[j] * rhs.0[i].0[j];
            }
        }
        out
    }
}

// rank-3 : mat
impl<S: Ring, const M: usize, const N: usize, const P: usize> Ddot<Tensor<Tensor<S, P>, N>>
    for Tensor<Tensor<Tensor<S, P>, N>, M>
{
    type Output = Tensor<S, M>;

    fn ddot_impl(self, rhs: Tensor<Tensor<S, P>, N>) -> Tensor<S, M> {
        Tensor::from_fn(|i| {
            let mut out = S::zero();
            for j in 0..N {
                for k in 0..P {
                    out += self.0[i].0[j].0[k] * rhs.0[j].0[k];
                }
            }
            out
        })
    }
}

// rank-4 : mat
impl<S: Ring, const M: usize, const N: usize, const P: usize, const Q: usize>
    Ddot<Tensor<Tensor<S, Q>, P>> for Tensor<Tensor<Tensor<Tensor<S, Q>, P>, N>, M>
{
    type Output = Tensor<Tensor<S, N>, M>;

    fn ddot_impl(self, rhs: Tensor<Tensor<S, Q>, P>) -> Self::Output {
        Tensor::from_fn(|i| {
            Tensor::from_fn(|j| {
                let mut out = S::zero();
                for k in 0..P {
                    for l in 0..Q {
                        out += self.0[i].0[j].0[k].0[l] * rhs.0[k].0[l];
                    }
                }
                out
            })
        })
    }
}

impl<T> Ddot<T> for Zero {
    type Output = Zero;

    fn ddot_impl(self, _: T) -> Zero {
        Zero
    }
}

impl<T: Copy, const M: usize> Ddot<Zero> for Tensor<T, M> {
    type Output = Zero;

    fn ddot_impl(self, _: Zero) -> Zero {
        Zero
    }
}

/// Tensor (outer) product.
pub trait Outer<Rhs> {
    type Output;

    fn outer_impl(self, rhs: Rhs) -> Self::Output;
}

/// Outer product of two tensors; ranks add.
pub fn outer<A: Outer<B>, B>(a: A, b: B) -> A::Output {
    a.outer_impl(b)
}

impl<const N: usize> Outer<Tensor<f64, N>> for f64 {
    type Output = Tensor<f64, N>;

    fn outer_impl(self, rhs: Tensor<f64, N>) -> Tensor<f64, N> {
        self * rhs
    }
}

impl<const M: usize> Outer<f64> for Tensor<f64, M> {
    type Output = Tensor<f64, M>;

    fn outer_impl(self, rhs: f64) -> Tensor<f64, M> {
        self * rhs
    }
}

// vec ⊗ vec
impl<S: Ring, const M: usize, const N: usize> Outer<Tensor<S, N>> for Tensor<S, M> {
    type Output = Tensor<Tensor<S, N>, M>;

    fn outer_impl(self, rhs: Tensor<S, N>) -> Self::Output {
        Tensor::from_fn(|i| Tensor::from_fn(|j| self.0[i] * rhs.0[j]))
    }
}

// vec ⊗ mat
impl<S: Ring, const M: usize, const N: usize, const P: usize> Outer<Tensor<Tensor<S, P>, N>>
    for Tensor<S, M>
{
    type Output = Tensor<Tensor<Tensor<S, P>, N>, M>;

    fn outer_impl(self, rhs: Tensor<Tensor<S, P>, N>) -> Self::Output {
        Tensor::from_fn(|i| Tensor::from_fn(|j| Tensor::from_fn(|k| self.0[i] * rhs.0[j].0[k])))
    }
}

// mat ⊗ vec
impl<S: Ring, const M: usize, const N: usize, const P: usize> Outer<Tensor<S, P>>
    for Tensor<Tensor<S, N>, M>
{
    type Output = Tensor<Tensor<Tensor<S, P>, N>, M>;

    fn outer_impl(self, rhs: Tensor<S, P>) -> Self::Output {
        Tensor::from_fn(|i| Tensor::from_fn(|j| Tensor::from_fn(|k| self.0[i].0[j] * rhs.0[k])))
    }
}

impl<T> Outer<T> for Zero {
    type Output = Zero;

    fn outer_impl(self, _: T) -> Zero {
        Zero
    }
}

impl<T: Copy, const M: usize> Outer<Zero> for Tensor<T, M> {
    type Output = Zero;

    fn outer_impl(self, _: Zero) -> Zero {
        Zero
    }
}

impl Outer<Zero> for f64 {
    type Output = Zero;

    fn outer_impl(self, _: Zero) -> Zero {
        Zero
    }
}

/// Contraction of a derivative `df_dx` with a perturbation `dx`.
///
/// The trailing indices of `df_dx` (those of the differentiation argument) are
/// contracted against all of `dx`, yielding the directional derivative with
/// the shape of `f`. Either side may be [`Zero`].
pub trait ChainRule<Dx> {
    type Output;

    fn chain_impl(self, dx: Dx) -> Self::Output;
}

/// Applies the chain rule: contracts a derivative against a perturbation.
pub fn chain_rule<Df: ChainRule<Dx>, Dx>(df_dx: Df, dx: Dx) -> Df::Output {
    df_dx.chain_impl(dx)
}

impl<Dx> ChainRule<Dx> for Zero {
    type Output = Zero;

    fn chain_impl(self, _: Dx) -> Zero {
        Zero
    }
}

impl ChainRule<Zero> for f64 {
    type Output = Zero;

    fn chain_impl(self, _: Zero) -> Zero {
        Zero
    }
}

impl<T: Copy, const M: usize> ChainRule<Zero> for Tensor<T, M> {
    type Output = Zero;

    fn chain_impl(self, _: Zero) -> Zero {
        Zero
    }
}

impl ChainRule<f64> for f64 {
    type Output = f64;

    fn chain_impl(self, dx: f64) -> f64 {
        self * dx
    }
}

// scalar f, vector x
impl<const N: usize> ChainRule<Vector<N>> for Vector<N> {
    type Output = f64;

    fn chain_impl(self, dx: Vector<N>) -> f64 {
        dot(self, dx)
    }
}

// scalar f, matrix x
impl<const M: usize, const N: usize> ChainRule<Matrix<M, N>> for Matrix<M, N> {
    type Output = f64;

    fn chain_impl(self, dx: Matrix<M, N>) -> f64 {
        ddot(self, dx)
    }
}

// vector f, vector x
impl<const M: usize, const N: usize> ChainRule<Vector<N>> for Matrix<M, N> {
    type Output = Vector<M>;

    fn chain_impl(self, dx: Vector<N>) -> Vector<M> {
        dot(self, dx)
    }
}

// vector f, matrix x
impl<const M: usize, const N: usize, const P: usize> ChainRule<Matrix<N, P>> for Tensor3<M, N, P> {
    type Output = Vector<M>;

    fn chain_impl(self, dx: Matrix<N, P>) -> Vector<M> {
        ddot(self, dx)
    }
}

// matrix f, vector x
impl<const M: usize, const N: usize, const P: usize> ChainRule<Vector<P>> for Tensor3<M, N, P> {
    type Output = Matrix<M, N>;

    fn chain_impl(self, dx: Vector<P>) -> Matrix<M, N> {
        dot(self, dx)
    }
}

// matrix f, matrix x
impl<const M: usize, const N: usize, const P: usize, const Q: usize> ChainRule<Matrix<P, Q>>
    for Tensor4<M, N, P, Q>
{
    type Output = Matrix<M, N>;

    fn chain_impl(self, dx: Matrix<P, Q>) -> Matrix<M, N> {
        ddot(self, dx)
    }
}

/// The identity matrix.
pub fn identity<const N: usize>() -> Matrix<N, N> {
    make_matrix(|i, j| if i == j { 1.0 } else { 0.0 })
}

/// Trace of a square rank-2 tensor.
pub fn tr<S: Ring, const N: usize>(a: Tensor<Tensor<S, N>, N>) -> S {
    let mut out = S::zero();
    for i in 0..N {
        out += a.0[i].0[i];
    }
    out
}

/// Transpose of a rank-2 tensor.
pub fn transpose<S: Copy, const M: usize, const N: usize>(
    a: Tensor<Tensor<S, N>, M>,
) -> Tensor<Tensor<S, M>, N> {
    Tensor::from_fn(|i| Tensor::from_fn(|j| a.0[j].0[i]))
}

/// Symmetric part, `(A + Aᵀ) / 2`.
pub fn sym<S: Ring, const N: usize>(a: Tensor<Tensor<S, N>, N>) -> Tensor<Tensor<S, N>, N> {
    make_matrix(|i, j| (a.0[i].0[j] + a.0[j].0[i]) * 0.5)
}

/// Antisymmetric part, `(A - Aᵀ) / 2`.
pub fn antisym<S: Ring, const N: usize>(a: Tensor<Tensor<S, N>, N>) -> Tensor<Tensor<S, N>, N> {
    make_matrix(|i, j| (a.0[i].0[j] - a.0[j].0[i]) * 0.5)
}

/// Deviatoric part, `A - (tr A / n) I`.
pub fn dev<S: Ring, const N: usize>(a: Tensor<Tensor<S, N>, N>) -> Tensor<Tensor<S, N>, N> {
    let mean = tr(a) * (1.0 / N as f64);
    make_matrix(|i, j| {
        if i == j {
            a.0[i].0[j] - mean
        } else {
            a.0[i].0[j]
        }
    })
}

/// Determinant of a square rank-2 tensor, in closed form.
///
/// Defined for `n ≤ 3`; larger shapes have no closed form here and panic.
pub fn det<S: Ring, const N: usize>(a: Tensor<Tensor<S, N>, N>) -> S {
    match N {
        1 => a.0[0].0[0],
        2 => a.0[0].0[0] * a.0[1].0[1] - a.0[0].0[1] * a.0[1].0[0],
        3 => {
            a.0[0].0[0] * (a.0[1].0[1] * a.0[2].0[2] - a.0[1].0[2] * a.0[2].0[1])
                - a.0[0].0[1] * (a.0[1].0[0] * a.0[2].0[2] - a.0[1].0[2] * a.0[2].0[0])
                + a.0[0].0[2] * (a.0[1].0[0] * a.0[2].0[1] - a.0[1].0[1] * a.0[2].0[0])
        }
        _ => panic!("det has no closed form for {N}x{N} tensors"),
    }
}

/// Matrix inversion for square rank-2 tensors.
pub trait Inverse: Sized {
    fn inverse(self) -> Self;
}

/// Inverts a square rank-2 tensor.
///
/// Uses closed forms for `n ≤ 3` and Gauss-Jordan elimination with partial
/// pivoting above. Dual-valued matrices propagate the derivative through
/// `d(A⁻¹) = -A⁻¹ (dA) A⁻¹`.
pub fn inv<T: Inverse>(a: T) -> T {
    a.inverse()
}

impl<const N: usize> Inverse for Matrix<N, N> {
    fn inverse(self) -> Self {
        match N {
            1 => make_matrix(|_, _| 1.0 / self.0[0].0[0]),
            2 => {
                let inv_det = 1.0 / det(self);
                let mut out = Self::zeros();
                out.0[0].0[0] = self.0[1].0[1] * inv_det;
                out.0[0].0[1] = -self.0[0].0[1] * inv_det;
                out.0[1].0[0] = -self.0[1].0[0] * inv_det;
                out.0[1].0[1] = self.0[0].0[0] * inv_det;
                out
            }
            3 => {
                let inv_det = 1.0 / det(self);
                let a = &self;
                make_matrix(|i, j| {
                    // adjugate entry (j, i)
                    let r0 = (j + 1) % 3;
                    let r1 = (j + 2) % 3;
                    let c0 = (i + 1) % 3;
                    let c1 = (i + 2) % 3;
                    (a.0[r0].0[c0] * a.0[r1].0[c1] - a.0[r0].0[c1] * a.0[r1].0[c0]) * inv_det
                })
            }
            _ => gauss_jordan_inverse(self),
        }
    }
}

impl<G: Gradient, const N: usize> Inverse for Tensor<Tensor<Dual<G>, N>, N> {
    fn inverse(self) -> Self {
        let values: Matrix<N, N> = get_value(self);
        let inv_values = inv(values);
        Tensor::from_fn(|i| {
            Tensor::from_fn(|j| {
                let mut gradient = G::zero();
                for k in 0..N {
                    for l in 0..N {
                        gradient -= self.0[k].0[l].gradient
                            * (inv_values.0[i].0[k] * inv_values.0[l].0[j]);
                    }
                }
                Dual {
                    value: inv_values.0[i].0[j],
                    gradient,
                }
            })
        })
    }
}

fn gauss_jordan_inverse<const N: usize>(a: Matrix<N, N>) -> Matrix<N, N> {
    let mut lhs = a;
    let mut rhs = identity::<N>();
    for col in 0..N {
        let pivot_row = (col..N)
            .max_by(|&p, &q| {
                lhs.0[p].0[col]
                    .abs()
                    .total_cmp(&lhs.0[q].0[col].abs())
            })
            .unwrap_or(col);
        lhs.0.swap(col, pivot_row);
        rhs.0.swap(col, pivot_row);
        let inv_pivot = 1.0 / lhs.0[col].0[col];
        for j in 0..N {
            lhs.0[col].0[j] *= inv_pivot;
            rhs.0[col].0[j] *= inv_pivot;
        }
        for row in 0..N {
            if row != col {
                let factor = lhs.0[row].0[col];
                for j in 0..N {
                    lhs.0[row].0[j] -= factor * lhs.0[col].0[j];
                    rhs.0[row].0[j] -= factor * rhs.0[col].0[j];
                }
            }
        }
    }
    rhs
}

/// Solves `A x = b` by Gaussian elimination with partial pivoting.
///
/// Generic over the scalar, so dual-valued systems carry their derivatives
/// through the elimination; pivots are selected by the magnitude of the value
/// part.
pub fn linear_solve<S, const N: usize>(a: Tensor<Tensor<S, N>, N>, b: Tensor<S, N>) -> Tensor<S, N>
where
    S: Ring + Div<Output = S> + DualField<Value = f64>,
{
    let mut lhs = a;
    let mut rhs = b;
    for col in 0..N {
        let pivot_row = (col..N)
            .max_by(|&p, &q| {
                lhs.0[p].0[col]
                    .value()
                    .abs()
                    .total_cmp(&lhs.0[q].0[col].value().abs())
            })
            .unwrap_or(col);
        lhs.0.swap(col, pivot_row);
        rhs.0.swap(col, pivot_row);
        let pivot = lhs.0[col].0[col];
        for row in (col + 1)..N {
            let factor = lhs.0[row].0[col] / pivot;
            for j in col..N {
                let delta = factor * lhs.0[col].0[j];
                lhs.0[row].0[j] -= delta;
            }
            let delta = factor * rhs.0[col];
            rhs.0[row] -= delta;
        }
    }
    let mut x = Tensor::<S, N>::zeros();
    for row in (0..N).rev() {
        let mut sum = rhs.0[row];
        for j in (row + 1)..N {
            let delta = lhs.0[row].0[j] * x.0[j];
            sum -= delta;
        }
        x.0[row] = sum / lhs.0[row].0[row];
    }
    x
}

/// Squared Frobenius norm, summed in index order.
pub trait SqNorm {
    fn sqnorm_impl(self) -> f64;
}

impl SqNorm for f64 {
    fn sqnorm_impl(self) -> f64 {
        self * self
    }
}

impl<T: SqNorm + Copy, const M: usize> SqNorm for Tensor<T, M> {
    fn sqnorm_impl(self) -> f64 {
        let mut out = 0.0;
        for i in 0..M {
            out += self.0[i].sqnorm_impl();
        }
        out
    }
}

pub fn sqnorm<T: SqNorm>(a: T) -> f64 {
    a.sqnorm_impl()
}

/// Frobenius norm.
pub fn norm<T: SqNorm>(a: T) -> f64 {
    sqnorm(a).sqrt()
}

/// Scales a tensor to unit Frobenius norm.
pub fn normalize<T: SqNorm + Mul<f64, Output = T> + Copy>(a: T) -> T {
    a * (1.0 / norm(a))
}

const CHOP_THRESHOLD: f64 = 1.0e-10;

/// Replaces entries smaller than `1e-10` in magnitude by exact zeros.
pub trait Chop {
    fn chop_impl(self) -> Self;
}

pub fn chop<T: Chop>(a: T) -> T {
    a.chop_impl()
}

impl Chop for f64 {
    fn chop_impl(self) -> f64 {
        if self.abs() < CHOP_THRESHOLD {
            0.0
        } else {
            self
        }
    }
}

impl<T: Chop + Copy, const M: usize> Chop for Tensor<T, M> {
    fn chop_impl(self) -> Self {
        Tensor::from_fn(|i| self.0[i].chop_impl())
    }
}

const SYMMETRY_TOLERANCE: f64 = 1.0e-8;

/// Checks `|A_ij - A_ji| < 1e-8` for all entries.
pub fn is_symmetric<const N: usize>(a: Matrix<N, N>) -> bool {
    for i in 0..N {
        for j in (i + 1)..N {
            if (a.0[i].0[j] - a.0[j].0[i]).abs() >= SYMMETRY_TOLERANCE {
                return false;
            }
        }
    }
    true
}

/// Sylvester's criterion: symmetric with all leading principal minors positive.
pub fn is_symmetric_and_positive_definite<const N: usize>(a: Matrix<N, N>) -> bool {
    if !is_symmetric(a) {
        return false;
    }
    (1..=N).all(|k| leading_principal_minor(a, k) > 0.0)
}

fn leading_principal_minor<const N: usize>(a: Matrix<N, N>, k: usize) -> f64 {
    let mut sub = a;
    let mut minor = 1.0;
    for col in 0..k {
        let pivot_row = (col..k)
            .max_by(|&p, &q| {
                sub.0[p].0[col]
                    .abs()
                    .total_cmp(&sub.0[q].0[col].abs())
            })
            .unwrap_or(col);
        if pivot_row != col {
            sub.0.swap(col, pivot_row);
            minor = -minor;
        }
        let pivot = sub.0[col].0[col];
        if pivot == 0.0 {
            return 0.0;
        }
        minor *= pivot;
        for row in (col + 1)..k {
            let factor = sub.0[row].0[col] / pivot;
            for j in col..k {
                sub.0[row].0[j] -= factor * sub.0[col].0[j];
            }
        }
    }
    minor
}

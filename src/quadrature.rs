//! Quadrature rules on the reference elements.
//!
//! All rules integrate over the unit reference elements: the unit segment,
//! square and cube, and the unit (right-angle) triangle and tetrahedron.
//! Univariate Gauss-Legendre rules are computed on demand and combined by
//! tensor products; simplex rules are obtained by collapsing the tensor rules
//! with the Duffy transformation.

use crate::element::ElementGeometry;
use crate::tensor::{Tensor, Vector};
use eyre::{bail, Result};

/// A quadrature rule: weights and reference-element points of dimension `D`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureRule<const D: usize> {
    weights: Vec<f64>,
    points: Vec<Vector<D>>,
}

impl<const D: usize> QuadratureRule<D> {
    pub fn from_points_and_weights(points: Vec<Vector<D>>, weights: Vec<f64>) -> Self {
        assert_eq!(points.len(), weights.len());
        Self { weights, points }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn points(&self) -> &[Vector<D>] {
        &self.points
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }
}

/// The `n`-point Gauss-Legendre rule on `[0, 1]`, exact for polynomials of
/// degree `2n - 1`.
///
/// Nodes are roots of the Legendre polynomial `P_n`, found by Newton iteration
/// from the Chebyshev initial guess, then mapped from `[-1, 1]` to `[0, 1]`.
pub fn gauss_legendre(n: usize) -> QuadratureRule<1> {
    assert!(n > 0, "a quadrature rule needs at least one point");
    let mut points = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);
    for i in 0..n {
        let mut x = (std::f64::consts::PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut dp = 1.0;
        for _ in 0..100 {
            let (p, d) = legendre(n, x);
            dp = d;
            let dx = p / d;
            x -= dx;
            if dx.abs() <= 1e-15 {
                break;
            }
        }
        let w = 2.0 / ((1.0 - x * x) * dp * dp);
        // Map from [-1, 1] to [0, 1]; the Chebyshev guesses enumerate nodes in
        // descending order, so the mapped nodes come out ascending.
        points.push(Tensor([0.5 * (1.0 - x)]));
        weights.push(0.5 * w);
    }
    QuadratureRule { weights, points }
}

/// Evaluates `P_n(x)` and its derivative by the three-term recurrence.
fn legendre(n: usize, x: f64) -> (f64, f64) {
    let mut p_prev = 1.0;
    let mut p = x;
    for k in 2..=n {
        let k = k as f64;
        let p_next = ((2.0 * k - 1.0) * x * p - (k - 1.0) * p_prev) / k;
        p_prev = p;
        p = p_next;
    }
    let derivative = n as f64 * (x * p - p_prev) / (x * x - 1.0);
    (p, derivative)
}

/// A rule with `q` points per direction on the reference element of `geometry`.
///
/// Errors if the reference dimension of `geometry` is not `D`.
pub fn rule_for_geometry<const D: usize>(
    geometry: ElementGeometry,
    q: usize,
) -> Result<QuadratureRule<D>> {
    if geometry.reference_dim() != D {
        bail!(
            "geometry {:?} has reference dimension {}, requested rule dimension is {}",
            geometry,
            geometry.reference_dim(),
            D
        );
    }
    let line = gauss_legendre(q);
    let mut points = Vec::new();
    let mut weights = Vec::new();
    match geometry {
        ElementGeometry::Segment => {
            for (w, p) in line.weights().iter().zip(line.points()) {
                points.push(Tensor::from_fn(|_| p[0]));
                weights.push(*w);
            }
        }
        ElementGeometry::Quadrilateral => {
            for (wx, px) in line.weights().iter().zip(line.points()) {
                for (wy, py) in line.weights().iter().zip(line.points()) {
                    let mapped = [px[0], py[0]];
                    points.push(Tensor::from_fn(|d| mapped[d]));
                    weights.push(wx * wy);
                }
            }
        }
        ElementGeometry::Triangle => {
            // Duffy collapse of the unit square onto the unit triangle:
            // (u, v) -> (u, (1 - u) v), with Jacobian (1 - u). The collapsed
            // direction takes one extra point so the Jacobian factor does not
            // eat into the exactness degree.
            let line_u = gauss_legendre(q + 1);
            for (wx, px) in line_u.weights().iter().zip(line_u.points()) {
                for (wy, py) in line.weights().iter().zip(line.points()) {
                    let (u, v) = (px[0], py[0]);
                    let mapped = [u, (1.0 - u) * v];
                    points.push(Tensor::from_fn(|d| mapped[d]));
                    weights.push(wx * wy * (1.0 - u));
                }
            }
        }
        ElementGeometry::Hexahedron => {
            for (wx, px) in line.weights().iter().zip(line.points()) {
                for (wy, py) in line.weights().iter().zip(line.points()) {
                    for (wz, pz) in line.weights().iter().zip(line.points()) {
                        let mapped = [px[0], py[0], pz[0]];
                        points.push(Tensor::from_fn(|d| mapped[d]));
                        weights.push(wx * wy * wz);
                    }
                }
            }
        }
        ElementGeometry::Tetrahedron => {
            // (u, v, w) -> (u, (1 - u) v, (1 - u)(1 - v) w), with Jacobian
            // (1 - u)^2 (1 - v). The u direction carries a quadratic Jacobian
            // factor and v a linear one, so both take an extra point.
            let line_u = gauss_legendre(q + 1);
            let line_v = gauss_legendre(q + 1);
            for (wx, px) in line_u.weights().iter().zip(line_u.points()) {
                for (wy, py) in line_v.weights().iter().zip(line_v.points()) {
                    for (wz, pz) in line.weights().iter().zip(line.points()) {
                        let (u, v, w) = (px[0], py[0], pz[0]);
                        let mapped = [u, (1.0 - u) * v, (1.0 - u) * (1.0 - v) * w];
                        points.push(Tensor::from_fn(|d| mapped[d]));
                        weights.push(wx * wy * wz * (1.0 - u) * (1.0 - u) * (1.0 - v));
                    }
                }
            }
        }
    }
    Ok(QuadratureRule { weights, points })
}

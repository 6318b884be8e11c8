//! Quadrature rules on the reference interval [-1, 1]
//!
//! Nodes are returned in ascending order. Chebyshev weights include the
//! weight function `1/sqrt(1-t^2)`, second kind Chebyshev weights
//! `sqrt(1-t^2)`, Legendre weights are unweighted.
use super::{Family, Quadrature};
use crate::error::{Result, SpectralError};
use crate::Real;
use ndarray::prelude::*;
use std::f64::consts::PI;

const NEWTON_TOL: Real = 1e-15;
const NEWTON_MAX_ITER: usize = 100;

/// Return nodes and weights of `n`-point rule of given family
///
/// # Errors
/// Gauss-Lobatto rules need at least two points.
pub fn nodes_and_weights(
    family: Family,
    quad: Quadrature,
    n: usize,
) -> Result<(Array1<Real>, Array1<Real>)> {
    if n == 0 || (quad == Quadrature::GaussLobatto && n < 2) {
        return Err(SpectralError::Configuration(format!(
            "{:?} quadrature with {} points is not defined",
            quad, n
        )));
    }
    match (family, quad) {
        (Family::Chebyshev, Quadrature::Gauss) => Ok(chebyshev_gauss(n)),
        (Family::Chebyshev, Quadrature::GaussLobatto) => Ok(chebyshev_gauss_lobatto(n)),
        (Family::ChebyshevU, Quadrature::Gauss) => Ok(chebyshev_u_gauss(n)),
        (Family::ChebyshevU, Quadrature::GaussLobatto) => Err(SpectralError::Configuration(
            "second kind Chebyshev bases support Gauss quadrature only".to_string(),
        )),
        (Family::Legendre, Quadrature::Gauss) => Ok(legendre_gauss(n)),
        (Family::Legendre, Quadrature::GaussLobatto) => Ok(legendre_gauss_lobatto(n)),
        (Family::Fourier, _) => Err(SpectralError::Configuration(
            "Fourier bases use equispaced points, not a polynomial quadrature".to_string(),
        )),
    }
}

/// Chebyshev nodes of the first kind
pub fn chebyshev_gauss(n: usize) -> (Array1<Real>, Array1<Real>) {
    let nodes = Array1::from_shape_fn(n, |j| {
        -(PI * (2 * j + 1) as Real / (2 * n) as Real).cos()
    });
    let weights = Array1::from_elem(n, PI / n as Real);
    (nodes, weights)
}

/// Chebyshev nodes of the second kind, includes -1 and 1
pub fn chebyshev_gauss_lobatto(n: usize) -> (Array1<Real>, Array1<Real>) {
    let m = (n - 1) as Real;
    let mut nodes = Array1::zeros(n);
    for (k, x) in nodes.iter_mut().enumerate() {
        let arg = PI * (m - 2. * k as Real) / (2. * m);
        *x = -arg.sin();
    }
    let mut weights = Array1::from_elem(n, PI / m);
    weights[0] /= 2.;
    weights[n - 1] /= 2.;
    (nodes, weights)
}

/// Gauss nodes of the second kind polynomials, roots of `U_n`
pub fn chebyshev_u_gauss(n: usize) -> (Array1<Real>, Array1<Real>) {
    let h = PI / (n + 1) as Real;
    let theta = Array1::from_shape_fn(n, |j| PI - h * (j + 1) as Real);
    let nodes = theta.mapv(Real::cos);
    let weights = theta.mapv(|t| h * t.sin().powi(2));
    (nodes, weights)
}

/// Legendre polynomial `P_n(t)` and its predecessor `P_{n-1}(t)`
fn legendre_pair(n: usize, t: Real) -> (Real, Real) {
    let (mut p0, mut p1) = (1.0, t);
    if n == 0 {
        return (1.0, 0.0);
    }
    for k in 1..n {
        let k = k as Real;
        let p2 = ((2. * k + 1.) * t * p1 - k * p0) / (k + 1.);
        p0 = p1;
        p1 = p2;
    }
    (p1, p0)
}

/// Legendre-Gauss nodes via Newton iteration on `P_n`
pub fn legendre_gauss(n: usize) -> (Array1<Real>, Array1<Real>) {
    let mut nodes = Array1::<Real>::zeros(n);
    let mut weights = Array1::<Real>::zeros(n);
    let nf = n as Real;
    for j in 0..n {
        let mut t = -(PI * (j as Real + 0.75) / (nf + 0.5)).cos();
        for _ in 0..NEWTON_MAX_ITER {
            let (p, pm) = legendre_pair(n, t);
            let dt = p / (nf * (t * p - pm) / (t * t - 1.));
            t -= dt;
            if dt.abs() < NEWTON_TOL {
                break;
            }
        }
        let (p, pm) = legendre_pair(n, t);
        let dp = nf * (t * p - pm) / (t * t - 1.);
        nodes[j] = t;
        weights[j] = 2. / ((1. - t * t) * dp * dp);
    }
    (nodes, weights)
}

/// Legendre-Gauss-Lobatto nodes, roots of `(1-t^2) P'_{n-1}`
pub fn legendre_gauss_lobatto(n: usize) -> (Array1<Real>, Array1<Real>) {
    let m = n - 1;
    let mf = m as Real;
    let mut nodes = Array1::<Real>::zeros(n);
    let mut weights = Array1::<Real>::zeros(n);
    for j in 0..n {
        let mut t = -(PI * j as Real / mf).cos();
        for _ in 0..NEWTON_MAX_ITER {
            let (p, pm) = legendre_pair(m, t);
            let t_old = t;
            t = t_old - (t * p - pm) / (n as Real * p);
            if (t - t_old).abs() < NEWTON_TOL {
                break;
            }
        }
        let (p, _) = legendre_pair(m, t);
        nodes[j] = t;
        weights[j] = 2. / (mf * n as Real * p * p);
    }
    (nodes, weights)
}

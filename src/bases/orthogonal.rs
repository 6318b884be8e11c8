//! # Orthogonal polynomial bases
//! Chebyshev (first and second kind) and Legendre polynomials on a
//! mapped interval `(a, b)`.
//!
//! The physical coordinate is `x = c0 + c1 t` with `t` in `[-1, 1]`.
//! Transforms are discrete Galerkin projections with the quadrature rule
//! of the basis, so that `forward(backward(c)) == c` holds exactly.
use super::quadrature::nodes_and_weights;
use super::{BaseSize, Differentiate, Family, Quadrature, Transform};
use crate::error::{Result, SpectralError};
use crate::{c64, Real};
use ndarray::array;
use ndarray::prelude::*;
use ndarray_linalg::Inverse;

/// # Orthogonal set of polynomials
#[derive(Debug, Clone)]
pub struct Orthogonal {
    /// Polynomial family
    pub family: Family,
    /// Number of coefficients (= number of quadrature points)
    pub n: usize,
    /// Quadrature rule
    pub quad: Quadrature,
    /// Physical domain
    pub domain: (Real, Real),
    /// Reference nodes in [-1, 1]
    pub t: Array1<Real>,
    /// Reference weights
    pub w: Array1<Real>,
    /// Physical nodes
    pub x: Array1<Real>,
    /// Polynomial values at nodes, `vander[[j, k]] = P_k(t_j)`
    pub vander: Array2<Real>,
    forward_mat: Array2<Real>,
}

impl Orthogonal {
    /// Create new orthogonal basis.
    ///
    /// # Example
    /// ```
    /// use rustgalerkin::bases::{Family, Orthogonal, Quadrature};
    /// let cheby = Orthogonal::new(Family::Chebyshev, 10, Quadrature::Gauss, (-1., 1.)).unwrap();
    /// assert_eq!(cheby.x.len(), 10);
    /// ```
    ///
    /// # Errors
    /// Non-polynomial family, empty basis or degenerate domain.
    pub fn new(family: Family, n: usize, quad: Quadrature, domain: (Real, Real)) -> Result<Self> {
        if family == Family::Fourier {
            return Err(SpectralError::Configuration(
                "Orthogonal requires a polynomial family".to_string(),
            ));
        }
        check_domain(domain)?;
        let (t, w) = nodes_and_weights(family, quad, n)?;
        let (c0, c1) = map_coefficients(domain);
        let x = t.mapv(|t| c0 + c1 * t);
        let vander = vandermonde(family, n, &t);
        let identity = Array2::<Real>::eye(n);
        let forward_mat = projection_matrix(&vander, &w, &identity)?;
        Ok(Self {
            family,
            n,
            quad,
            domain,
            t,
            w,
            x,
            vander,
            forward_mat,
        })
    }

    /// Coefficients `(c0, c1)` of the map `x = c0 + c1 t`
    pub fn map(&self) -> (Real, Real) {
        map_coefficients(self.domain)
    }

    /// Reference coordinate of physical point `x`
    pub fn reference(&self, x: Real) -> Real {
        let (c0, c1) = self.map();
        (x - c0) / c1
    }

    /// Differentiation matrix in physical coordinates
    /// acting on coefficient vectors of length `n`.
    pub fn diff_mat(&self, n: usize, order: usize) -> Array2<Real> {
        let (_, c1) = self.map();
        let d = differentiation_matrix(self.family, n);
        let mut out = Array2::<Real>::eye(n);
        for _ in 0..order {
            out = d.dot(&out);
        }
        out.mapv(|v| v / c1.powi(order as i32))
    }

    /// Norms `(P_k, P_k)` including the domain scaling `c1`.
    pub fn norms(&self, n: usize) -> Array1<Real> {
        let (_, c1) = self.map();
        norms(self.family, n).mapv(|v| v * c1)
    }
}

impl BaseSize for Orthogonal {
    fn len_phys(&self) -> usize {
        self.n
    }

    fn len_spec(&self) -> usize {
        self.n
    }

    fn coords(&self) -> &Array1<Real> {
        &self.x
    }

    fn domain(&self) -> (Real, Real) {
        self.domain
    }

    fn family(&self) -> Family {
        self.family
    }
}

impl Transform for Orthogonal {
    fn forward_lane(&self, input: &ArrayView1<c64>, output: &mut ArrayViewMut1<c64>) {
        matvec_lane(&self.forward_mat, input, output);
    }

    fn backward_lane(&self, input: &ArrayView1<c64>, output: &mut ArrayViewMut1<c64>) {
        matvec_lane(&self.vander, input, output);
    }

    fn scalar_product_lane(&self, input: &ArrayView1<c64>, output: &mut ArrayViewMut1<c64>) {
        let (_, c1) = self.map();
        for (k, out) in output.iter_mut().enumerate() {
            let mut acc = c64::new(0., 0.);
            for (j, f) in input.iter().enumerate() {
                acc += *f * self.vander[[j, k]] * self.w[j];
            }
            *out = acc * c1;
        }
    }

    fn evaluate(&self, x: Real) -> Array1<c64> {
        let t = array![self.reference(x)];
        vandermonde(self.family, self.n, &t)
            .row(0)
            .mapv(|v| c64::new(v, 0.))
    }

    fn integration_weights(&self) -> Array1<Real> {
        integration_weights(self.family, &self.t, &self.w, self.domain)
    }
}

impl Differentiate for Orthogonal {
    fn len_deriv(&self) -> usize {
        self.n
    }

    fn differentiate_lane(
        &self,
        input: &ArrayView1<c64>,
        output: &mut ArrayViewMut1<c64>,
        order: usize,
    ) {
        differentiate_parent(self, input, output, order);
    }
}

/// Differentiate parent coefficients `order` times (physical coordinates).
pub(crate) fn differentiate_parent(
    parent: &Orthogonal,
    input: &ArrayView1<c64>,
    output: &mut ArrayViewMut1<c64>,
    order: usize,
) {
    let n = parent.n;
    let (_, c1) = parent.map();
    output.assign(input);
    for _ in 0..order {
        match parent.family {
            Family::Chebyshev => {
                if n < 3 {
                    let c = if n == 2 { output[1] } else { c64::new(0., 0.) };
                    output.fill(c64::new(0., 0.));
                    output[0] = c;
                } else {
                    output[0] = output[1];
                    for i in 1..n - 1 {
                        output[i] = output[i + 1] * (2. * (i as Real + 1.));
                    }
                    output[n - 1] = c64::new(0., 0.);
                    // Add d_x(T_(n-2))
                    for i in (1..n - 2).rev() {
                        output[i] = output[i] + output[i + 2];
                    }
                    output[0] = output[0] + output[2] / 2.;
                }
            }
            Family::ChebyshevU => {
                // U_k' = sum 2 (i+1) U_i over i < k with k - i odd
                let a = output.to_owned();
                let mut tail = vec![c64::new(0., 0.); n + 2];
                for i in (0..n - 1).rev() {
                    tail[i] = a[i + 1] + tail[i + 2];
                }
                for (i, out) in output.iter_mut().enumerate() {
                    *out = tail[i] * (2. * (i as Real + 1.));
                }
            }
            _ => {
                let a = output.to_owned();
                output[n - 1] = c64::new(0., 0.);
                for k in (0..n - 1).rev() {
                    let next = if k + 2 < n {
                        output[k + 2] / (2. * k as Real + 5.)
                    } else {
                        c64::new(0., 0.)
                    };
                    output[k] = (a[k + 1] + next) * (2. * k as Real + 1.);
                }
            }
        }
        output.mapv_inplace(|v| v / c1);
    }
}

/// Multiply real matrix with complex lane
pub(crate) fn matvec_lane(
    mat: &Array2<Real>,
    input: &ArrayView1<c64>,
    output: &mut ArrayViewMut1<c64>,
) {
    for (out, row) in output.iter_mut().zip(mat.outer_iter()) {
        let mut acc = c64::new(0., 0.);
        for (m, v) in row.iter().zip(input.iter()) {
            acc += *v * *m;
        }
        *out = acc;
    }
}

/// Discrete projection `F = (S V^T W V S^T)^{-1} S V^T W`
pub(crate) fn projection_matrix(
    vander: &Array2<Real>,
    w: &Array1<Real>,
    stencil: &Array2<Real>,
) -> Result<Array2<Real>> {
    let basis = vander.dot(&stencil.t());
    let mut weighted = basis.t().to_owned();
    for (mut col, wj) in weighted.axis_iter_mut(Axis(1)).zip(w.iter()) {
        col.mapv_inplace(|v| v * wj);
    }
    let mass = weighted.dot(&basis);
    let inv = mass.inv().map_err(|e| {
        SpectralError::Configuration(format!("discrete mass matrix is singular: {}", e))
    })?;
    Ok(inv.dot(&weighted))
}

/// Return coefficients of the affine map from [-1, 1] to `domain`
pub fn map_coefficients(domain: (Real, Real)) -> (Real, Real) {
    ((domain.0 + domain.1) / 2., (domain.1 - domain.0) / 2.)
}

pub(crate) fn check_domain(domain: (Real, Real)) -> Result<()> {
    if !(domain.1 > domain.0) || !domain.0.is_finite() || !domain.1.is_finite() {
        return Err(SpectralError::Configuration(format!(
            "invalid domain {:?}",
            domain
        )));
    }
    Ok(())
}

/// Polynomial values `P_k(t_j)` for `k < n` by three term recurrence
pub fn vandermonde(family: Family, n: usize, t: &Array1<Real>) -> Array2<Real> {
    let mut v = Array2::<Real>::zeros((t.len(), n));
    for (j, &tj) in t.iter().enumerate() {
        if n > 0 {
            v[[j, 0]] = 1.;
        }
        if n > 1 {
            v[[j, 1]] = if family == Family::ChebyshevU { 2. * tj } else { tj };
        }
        for k in 1..n.saturating_sub(1) {
            v[[j, k + 1]] = match family {
                Family::Chebyshev | Family::ChebyshevU => 2. * tj * v[[j, k]] - v[[j, k - 1]],
                _ => {
                    let kf = k as Real;
                    ((2. * kf + 1.) * tj * v[[j, k]] - kf * v[[j, k - 1]]) / (kf + 1.)
                }
            };
        }
    }
    v
}

/// Exact differentiation matrix on reference interval, `D[[i, k]]`
/// is the coefficient of `P_i` in `P_k'`.
pub fn differentiation_matrix(family: Family, n: usize) -> Array2<Real> {
    let mut d = Array2::<Real>::zeros((n, n));
    for k in 1..n {
        for i in (0..k).rev().step_by(2) {
            d[[i, k]] = match family {
                Family::Chebyshev => {
                    let ci = if i == 0 { 2. } else { 1. };
                    2. * k as Real / ci
                }
                Family::ChebyshevU => 2. * (i as Real + 1.),
                _ => 2. * i as Real + 1.,
            };
        }
    }
    d
}

/// Matrix of multiplication with `t`, `J[[i, k]]` is the coefficient
/// of `P_i` in `t P_k`. Truncated at size `n`.
pub fn jacobi_matrix(family: Family, n: usize) -> Array2<Real> {
    let mut j = Array2::<Real>::zeros((n, n));
    for k in 0..n {
        match family {
            Family::Chebyshev => {
                if k == 0 {
                    if n > 1 {
                        j[[1, 0]] = 1.;
                    }
                } else {
                    j[[k - 1, k]] = 0.5;
                    if k + 1 < n {
                        j[[k + 1, k]] = 0.5;
                    }
                }
            }
            Family::ChebyshevU => {
                if k > 0 {
                    j[[k - 1, k]] = 0.5;
                }
                if k + 1 < n {
                    j[[k + 1, k]] = 0.5;
                }
            }
            _ => {
                let kf = k as Real;
                if k > 0 {
                    j[[k - 1, k]] = kf / (2. * kf + 1.);
                }
                if k + 1 < n {
                    j[[k + 1, k]] = (kf + 1.) / (2. * kf + 1.);
                }
            }
        }
    }
    j
}

/// Continuous (weighted) norms on the reference interval
pub fn norms(family: Family, n: usize) -> Array1<Real> {
    use std::f64::consts::PI;
    Array1::from_shape_fn(n, |k| match family {
        Family::Chebyshev => {
            if k == 0 {
                PI
            } else {
                PI / 2.
            }
        }
        Family::ChebyshevU => PI / 2.,
        _ => 2. / (2. * k as Real + 1.),
    })
}

/// Value of the `order`-th derivative of `P_k` at `t = +-1` (reference coordinates)
pub fn boundary_value(family: Family, k: usize, order: usize, right: bool) -> Real {
    let kf = k as Real;
    let sign = |p: usize| if right || p % 2 == 0 { 1. } else { -1. };
    match (family, order) {
        (Family::ChebyshevU, 0) => sign(k) * (kf + 1.),
        (Family::ChebyshevU, 1) => sign(k + 1) * kf * (kf + 1.) * (kf + 2.) / 3.,
        (Family::ChebyshevU, 2) => {
            sign(k) * (kf - 1.) * kf * (kf + 1.) * (kf + 2.) * (kf + 3.) / 15.
        }
        (_, 0) => sign(k),
        (Family::Chebyshev, 1) => sign(k + 1) * kf * kf,
        (_, 1) => sign(k + 1) * kf * (kf + 1.) / 2.,
        (Family::Chebyshev, 2) => sign(k) * kf * kf * (kf * kf - 1.) / 3.,
        (_, 2) => sign(k) * (kf - 1.) * kf * (kf + 1.) * (kf + 2.) / 8.,
        _ => Real::NAN,
    }
}

/// Quadrature weights of the unweighted physical measure `dx`
pub(crate) fn integration_weights(
    family: Family,
    t: &Array1<Real>,
    w: &Array1<Real>,
    domain: (Real, Real),
) -> Array1<Real> {
    let (_, c1) = map_coefficients(domain);
    match family {
        Family::Chebyshev => Array1::from_shape_fn(t.len(), |j| {
            w[j] * (1. - t[j] * t[j]).max(0.).sqrt() * c1
        }),
        Family::ChebyshevU => Array1::from_shape_fn(t.len(), |j| {
            w[j] / (1. - t[j] * t[j]).sqrt() * c1
        }),
        _ => w.mapv(|v| v * c1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq<S, D>(result: &ArrayBase<S, D>, expected: &ArrayBase<S, D>)
    where
        S: ndarray::Data<Elem = f64>,
        D: Dimension,
    {
        let dif = 1e-10;
        for (a, b) in expected.iter().zip(result.iter()) {
            if (a - b).abs() > dif {
                panic!("Large difference of values, got {} expected {}.", b, a)
            }
        }
    }

    #[test]
    fn test_cheby_differentiate() {
        let cheby = Orthogonal::new(Family::Chebyshev, 6, Quadrature::GaussLobatto, (-1., 1.))
            .unwrap();
        // d/dx (T_3) = 3 T_0 + 6 T_2
        let mut data = Array1::<c64>::zeros(6);
        data[3] = c64::new(1., 0.);
        let mut diff = Array1::<c64>::zeros(6);
        cheby.differentiate_lane(&data.view(), &mut diff.view_mut(), 1);
        let expected = array![3., 0., 6., 0., 0., 0.];
        approx_eq(&diff.mapv(|v| v.re), &expected);
        // matrix gives the same result
        let mat = cheby.diff_mat(6, 1);
        approx_eq(&mat.column(3).to_owned(), &expected);
    }

    #[test]
    fn test_legendre_differentiate_twice() {
        let leg = Orthogonal::new(Family::Legendre, 6, Quadrature::Gauss, (0., 2.)).unwrap();
        // P_4'' = 10 P_0 + 35 P_2 on [-1, 1]; domain of length 2 keeps the scale
        let mut data = Array1::<c64>::zeros(6);
        data[4] = c64::new(1., 0.);
        let mut diff = Array1::<c64>::zeros(6);
        leg.differentiate_lane(&data.view(), &mut diff.view_mut(), 2);
        let expected = array![10., 0., 35., 0., 0., 0.];
        approx_eq(&diff.mapv(|v| v.re), &expected);
        approx_eq(&leg.diff_mat(6, 2).column(4).to_owned(), &expected);
    }

    #[test]
    fn test_cheby_fwd_bwd() {
        for quad in [Quadrature::Gauss, Quadrature::GaussLobatto].iter() {
            let cheby = Orthogonal::new(Family::Chebyshev, 7, *quad, (-1., 3.)).unwrap();
            let coef = Array1::from_shape_fn(7, |i| c64::new(i as f64, 1. - i as f64));
            let mut phys = Array1::<c64>::zeros(7);
            let mut back = Array1::<c64>::zeros(7);
            cheby.backward_lane(&coef.view(), &mut phys.view_mut());
            cheby.forward_lane(&phys.view(), &mut back.view_mut());
            approx_eq(&back.mapv(|v| v.re), &coef.mapv(|v| v.re));
            approx_eq(&back.mapv(|v| v.im), &coef.mapv(|v| v.im));
        }
    }

    #[test]
    fn test_jacobi_matrix() {
        // t * P_2 = 2/5 P_1 + 3/5 P_3
        let j = jacobi_matrix(Family::Legendre, 5);
        approx_eq(&j.column(2).to_owned(), &array![0., 0.4, 0., 0.6, 0.]);
        // t * T_0 = T_1
        let j = jacobi_matrix(Family::Chebyshev, 3);
        approx_eq(&j.column(0).to_owned(), &array![0., 1., 0.]);
    }

    #[test]
    fn test_chebyshev_u() {
        let cheb_u = Orthogonal::new(Family::ChebyshevU, 6, Quadrature::Gauss, (-1., 1.)).unwrap();
        // U_3 = 8 t^3 - 4 t
        let t = 0.3;
        let v = vandermonde(Family::ChebyshevU, 6, &array![t]);
        assert!((v[[0, 3]] - (8. * t * t * t - 4. * t)).abs() < 1e-14);
        // U_4' = 8 U_3 + 4 U_1
        let mut data = Array1::<c64>::zeros(6);
        data[4] = c64::new(1., 0.);
        let mut diff = Array1::<c64>::zeros(6);
        cheb_u.differentiate_lane(&data.view(), &mut diff.view_mut(), 1);
        let expected = array![0., 4., 0., 8., 0., 0.];
        approx_eq(&diff.mapv(|v| v.re), &expected);
        approx_eq(&cheb_u.diff_mat(6, 1).column(4).to_owned(), &expected);
        // U_k(1) = k + 1, U_2'(-1) = -8, U_2''(1) = 8
        let ends = vandermonde(Family::ChebyshevU, 6, &array![-1., 1.]);
        for k in 0..6 {
            let left = boundary_value(Family::ChebyshevU, k, 0, false);
            assert!((ends[[0, k]] - left).abs() < 1e-13);
            assert!((ends[[1, k]] - (k + 1) as f64).abs() < 1e-13);
        }
        assert!((boundary_value(Family::ChebyshevU, 2, 1, false) + 8.).abs() < 1e-14);
        assert!((boundary_value(Family::ChebyshevU, 2, 2, true) - 8.).abs() < 1e-14);
        // t U_1 = (U_0 + U_2) / 2
        let j = jacobi_matrix(Family::ChebyshevU, 4);
        approx_eq(&j.column(1).to_owned(), &array![0.5, 0., 0.5, 0.]);
        // int_{-1}^{1} t^2 sqrt(1-t^2) dx = pi / 8 with the weights of dx
        let total: f64 = cheb_u
            .integration_weights()
            .iter()
            .zip(cheb_u.t.iter())
            .map(|(w, t)| w * t * t * (1. - t * t).sqrt())
            .sum();
        assert!((total - std::f64::consts::PI / 8.).abs() < 1e-13);
    }

    #[test]
    fn test_boundary_values() {
        let v = vandermonde(Family::Legendre, 6, &array![-1., 1.]);
        for k in 0..6 {
            assert!((v[[0, k]] - boundary_value(Family::Legendre, k, 0, false)).abs() < 1e-14);
            assert!((v[[1, k]] - boundary_value(Family::Legendre, k, 0, true)).abs() < 1e-14);
        }
        // T_3'(-1) = 9
        assert!((boundary_value(Family::Chebyshev, 3, 1, false) - 9.).abs() < 1e-14);
    }
}

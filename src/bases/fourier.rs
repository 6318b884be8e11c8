//! # Fourier
//! Transform of periodic functions from physical space to
//! Fourier spectral space and vice versa.
//!
//! Complex-to-complex bases keep all `n` wavenumbers in FFT order,
//! real-to-complex bases keep the `n/2 + 1` non-negative ones.
//! Coefficients are normalized such that `u(x) = sum_k u_k exp(i k (x - a))`.
use super::{BaseSize, Differentiate, Family, Transform};
use crate::error::{Result, SpectralError};
use crate::{c64, Real};
use ndarray::prelude::*;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

/// Flavour of Fourier basis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FourierKind {
    /// Complex data, all wavenumbers
    C2c,
    /// Real data, non-negative wavenumbers only
    R2c,
}

/// # Fourier basis on a periodic interval
#[derive(Clone)]
pub struct Fourier {
    /// Number of grid points
    pub n: usize,
    /// Number of coefficients
    pub m: usize,
    /// Flavour
    pub kind: FourierKind,
    /// Periodic interval
    pub domain: (Real, Real),
    /// Equispaced grid points
    pub x: Array1<Real>,
    /// Integer wavenumbers of the coefficients
    pub k: Array1<i64>,
    plan_fwd: Arc<dyn Fft<Real>>,
    plan_bwd: Arc<dyn Fft<Real>>,
}

impl fmt::Debug for Fourier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fourier")
            .field("n", &self.n)
            .field("kind", &self.kind)
            .field("domain", &self.domain)
            .finish()
    }
}

impl Fourier {
    /// Create new Fourier basis.
    ///
    /// # Example
    /// ```
    /// use rustgalerkin::bases::{Fourier, FourierKind};
    /// let fo = Fourier::new(8, FourierKind::R2c, (0., 2. * std::f64::consts::PI)).unwrap();
    /// assert_eq!(fo.m, 5);
    /// assert_eq!(fo.k[4], 4);
    /// ```
    ///
    /// # Errors
    /// Empty basis or degenerate domain
    pub fn new(n: usize, kind: FourierKind, domain: (Real, Real)) -> Result<Self> {
        if n == 0 {
            return Err(SpectralError::Configuration(
                "Fourier basis needs at least one point".to_string(),
            ));
        }
        super::orthogonal::check_domain(domain)?;
        let length = domain.1 - domain.0;
        let x = Array1::from_shape_fn(n, |j| domain.0 + length * j as Real / n as Real);
        let (m, k) = match kind {
            FourierKind::C2c => (
                n,
                Array1::from_shape_fn(n, |i| {
                    if i < (n + 1) / 2 {
                        i as i64
                    } else {
                        i as i64 - n as i64
                    }
                }),
            ),
            FourierKind::R2c => (n / 2 + 1, Array1::from_shape_fn(n / 2 + 1, |i| i as i64)),
        };
        let mut planner = FftPlanner::<Real>::new();
        Ok(Self {
            n,
            m,
            kind,
            domain,
            x,
            k,
            plan_fwd: planner.plan_fft_forward(n),
            plan_bwd: planner.plan_fft_inverse(n),
        })
    }

    /// Length of periodic interval
    pub fn length(&self) -> Real {
        self.domain.1 - self.domain.0
    }

    /// Physical wavenumbers `2 pi k / L`
    pub fn wavenumbers(&self) -> Array1<Real> {
        let scale = 2. * PI / self.length();
        self.k.mapv(|k| k as Real * scale)
    }

    /// Index of the Nyquist mode, only present for even `n`
    pub fn nyquist(&self) -> Option<usize> {
        if self.n % 2 == 0 && self.n > 1 {
            Some(self.n / 2)
        } else {
            None
        }
    }

    /// Factor of the `order`-th derivative of coefficient `i`.
    /// Odd derivatives of the Nyquist mode vanish.
    pub fn derivative_factor(&self, i: usize, order: usize) -> c64 {
        if order % 2 == 1 && self.nyquist() == Some(i) {
            return c64::new(0., 0.);
        }
        let kappa = self.k[i] as Real * 2. * PI / self.length();
        c64::new(0., kappa).powu(order as u32)
    }

    /// Weight of coefficient `i` in the real-valued synthesis
    fn r2c_weight(&self, i: usize) -> Real {
        if i == 0 || self.nyquist() == Some(i) {
            1.
        } else {
            2.
        }
    }
}

impl BaseSize for Fourier {
    fn len_phys(&self) -> usize {
        self.n
    }

    fn len_spec(&self) -> usize {
        self.m
    }

    fn coords(&self) -> &Array1<Real> {
        &self.x
    }

    fn domain(&self) -> (Real, Real) {
        self.domain
    }

    fn family(&self) -> Family {
        Family::Fourier
    }
}

impl Transform for Fourier {
    fn forward_lane(&self, input: &ArrayView1<c64>, output: &mut ArrayViewMut1<c64>) {
        let mut buffer: Vec<c64> = input.iter().copied().collect();
        self.plan_fwd.process(&mut buffer);
        let norm = 1. / self.n as Real;
        for (out, b) in output.iter_mut().zip(buffer.iter()) {
            *out = *b * norm;
        }
    }

    /// For r2c bases the output is complex; its real part is the
    /// synthesized function once every axis has been transformed.
    fn backward_lane(&self, input: &ArrayView1<c64>, output: &mut ArrayViewMut1<c64>) {
        let mut buffer = vec![c64::new(0., 0.); self.n];
        match self.kind {
            FourierKind::C2c => {
                for (b, v) in buffer.iter_mut().zip(input.iter()) {
                    *b = *v;
                }
            }
            FourierKind::R2c => {
                for (i, v) in input.iter().enumerate() {
                    buffer[i] = *v * self.r2c_weight(i);
                }
            }
        }
        self.plan_bwd.process(&mut buffer);
        for (out, b) in output.iter_mut().zip(buffer.iter()) {
            *out = *b;
        }
    }

    fn scalar_product_lane(&self, input: &ArrayView1<c64>, output: &mut ArrayViewMut1<c64>) {
        self.forward_lane(input, output);
        let length = self.length();
        output.mapv_inplace(|v| v * length);
    }

    fn evaluate(&self, x: Real) -> Array1<c64> {
        let kappa = self.wavenumbers();
        Array1::from_shape_fn(self.m, |i| {
            let weight = match self.kind {
                FourierKind::C2c => 1.,
                FourierKind::R2c => self.r2c_weight(i),
            };
            c64::new(0., kappa[i] * (x - self.domain.0)).exp() * weight
        })
    }

    fn integration_weights(&self) -> Array1<Real> {
        Array1::from_elem(self.n, self.length() / self.n as Real)
    }
}

impl Differentiate for Fourier {
    fn len_deriv(&self) -> usize {
        self.m
    }

    fn differentiate_lane(
        &self,
        input: &ArrayView1<c64>,
        output: &mut ArrayViewMut1<c64>,
        order: usize,
    ) {
        for (i, (out, v)) in output.iter_mut().zip(input.iter()).enumerate() {
            *out = *v * self.derivative_factor(i, order);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn approx_eq_complex(result: &Array1<c64>, expected: &Array1<c64>) {
        let dif = 1e-10;
        for (a, b) in expected.iter().zip(result.iter()) {
            if (a - b).norm() > dif {
                panic!("Large difference of values, got {} expected {}.", b, a)
            }
        }
    }

    #[test]
    fn test_wavenumbers() {
        let fo = Fourier::new(6, FourierKind::C2c, (0., 2. * PI)).unwrap();
        assert_eq!(fo.k, array![0i64, 1, 2, -3, -2, -1]);
        let fo = Fourier::new(5, FourierKind::C2c, (0., 2. * PI)).unwrap();
        assert_eq!(fo.k, array![0i64, 1, 2, -2, -1]);
        assert_eq!(fo.nyquist(), None);
    }

    #[test]
    fn test_forward_cosine() {
        let fo = Fourier::new(16, FourierKind::R2c, (0., 2. * PI)).unwrap();
        let v = fo.x.mapv(|x| c64::new((4. * x).cos(), 0.));
        let mut vhat = Array1::<c64>::zeros(fo.m);
        fo.forward_lane(&v.view(), &mut vhat.view_mut());
        let mut expected = Array1::<c64>::zeros(fo.m);
        expected[4] = c64::new(0.5, 0.);
        approx_eq_complex(&vhat, &expected);
        // backward returns the real function
        let mut back = Array1::<c64>::zeros(16);
        fo.backward_lane(&vhat.view(), &mut back.view_mut());
        approx_eq_complex(&back.mapv(|v| c64::new(v.re, 0.)), &v);
    }

    #[test]
    fn test_c2c_roundtrip_shifted_domain() {
        let fo = Fourier::new(9, FourierKind::C2c, (1., 4.)).unwrap();
        let v = fo
            .x
            .mapv(|x| c64::new(0., 1.) * (2. * PI * 2. * (x - 1.) / 3.).sin() + 0.5);
        let mut vhat = Array1::<c64>::zeros(9);
        let mut back = Array1::<c64>::zeros(9);
        fo.forward_lane(&v.view(), &mut vhat.view_mut());
        fo.backward_lane(&vhat.view(), &mut back.view_mut());
        approx_eq_complex(&back, &v);
    }

    #[test]
    fn test_derivative_nyquist() {
        let fo = Fourier::new(8, FourierKind::C2c, (0., 2. * PI)).unwrap();
        assert_eq!(fo.derivative_factor(4, 1), c64::new(0., 0.));
        assert_eq!(fo.derivative_factor(4, 2), c64::new(-16., 0.));
        assert_eq!(fo.derivative_factor(1, 1), c64::new(0., 1.));
    }

    #[test]
    fn test_evaluate() {
        let fo = Fourier::new(8, FourierKind::R2c, (0., 2. * PI)).unwrap();
        let mut vhat = Array1::<c64>::zeros(fo.m);
        vhat[2] = c64::new(0., -0.5);
        // u = sin(2x)
        let x = 0.3;
        let u: c64 = fo.evaluate(x).iter().zip(vhat.iter()).map(|(a, b)| a * b).sum();
        assert!((u.re - (2. * x).sin()).abs() < 1e-12);
    }
}

//! Orr-Sommerfeld eigenvalue problem of plane Poiseuille flow
//!
//! The trial space is the Chebyshev biharmonic basis, `phi = phi' = 0` at
//! both walls. The eigenvalues are the phase speeds `c` of disturbances
//! `phi(y) exp(i alpha (x - c t))`, instabilities have a positive
//! imaginary part.
use crate::bases::{Basis, BoundaryConditions, Dtype, Family, Quadrature, TestKind};
use crate::coefficient::Coefficient;
use crate::error::{Result, SpectralError};
use crate::field::Function;
use crate::form::{dx, inner, TestFunction, TrialFunction};
use crate::solver::{eigensolve, scale_pair, EigenPairs};
use crate::space::TensorSpace;
use crate::{c64, Real};
use ndarray::prelude::*;

/// Parameters of the eigenvalue problem
#[derive(Debug, Clone)]
pub struct OrrSommerfeld {
    /// Streamwise wavenumber
    pub alpha: Real,
    /// Reynolds number
    pub re: Real,
    /// Size of the parent Chebyshev basis
    pub n: usize,
    /// Quadrature points
    pub quad: Quadrature,
    /// Galerkin or Petrov-Galerkin test functions
    pub test: TestKind,
}

impl Default for OrrSommerfeld {
    fn default() -> Self {
        Self {
            alpha: 1.,
            re: 8000.,
            n: 100,
            quad: Quadrature::Gauss,
            test: TestKind::Galerkin,
        }
    }
}

impl OrrSommerfeld {
    /// Trial space of the streamfunction
    ///
    /// # Errors
    /// Basis too small
    pub fn trial_space(&self) -> Result<TensorSpace> {
        let basis = Basis::new(
            self.n,
            Family::Chebyshev,
            BoundaryConditions::biharmonic(),
            Dtype::Complex,
            self.quad,
        )?;
        TensorSpace::new(vec![basis])
    }

    /// Matrices `(A, B)` of `A x = c B x`, optionally scaled with
    /// `(i+1)^s0 (j+1)^s1`
    ///
    /// # Errors
    /// Basis too small or incompatible test space
    pub fn assemble(&self, scale: Option<(Real, Real)>) -> Result<(Array2<c64>, Array2<c64>)> {
        let trial = self.trial_space()?;
        let test = trial.test_space(self.test)?;
        let u = TrialFunction::new(&trial).scalar(0)?;
        let v = TestFunction::new(&test).scalar(0)?;
        let (a, re) = (self.alpha, self.re);
        let g = c64::new(0., a * re);
        let parabola = Coefficient::polynomial(&[1., 0., -1.]);
        let vu = v.clone().times(0, parabola);

        let k = inner(&v, &dx(&u, 0, 2));
        let k1 = inner(&vu, &u);
        let k2 = inner(&vu, &dx(&u, 0, 2));
        let q = inner(&v, &dx(&u, 0, 4));
        let m = inner(&v, &u);

        let b_form = (k.clone() - m.clone() * (a * a)) * -g;
        let a_form = q + k * (-2. * a * a) + m * c64::new(a.powi(4), -2. * a * re)
            - (k2 - k1 * (a * a)) * g;
        let mut a_mat = a_form.matrix()?.dense()?;
        let mut b_mat = b_form.matrix()?.dense()?;
        if let Some(scale) = scale {
            scale_pair(&mut a_mat, &mut b_mat, scale);
        }
        Ok((a_mat, b_mat))
    }

    /// All eigenpairs, sorted by descending imaginary part
    ///
    /// # Errors
    /// Assembly fails or eigen-solve does not converge
    pub fn solve(&self, scale: Option<(Real, Real)>) -> Result<EigenPairs> {
        tracing::info!(
            "Orr-Sommerfeld Re = {} alpha = {} N = {}",
            self.re,
            self.alpha,
            self.n
        );
        let (a, b) = self.assemble(scale)?;
        let mut pairs = eigensolve(&a, &b)?;
        if let Some((_, s1)) = scale {
            // undo the column scaling of the eigenvectors
            for (j, mut row) in pairs.vectors.outer_iter_mut().enumerate() {
                let d = ((j + 1) as Real).powf(s1);
                row.mapv_inplace(|x| x * d);
            }
        }
        Ok(pairs)
    }

    /// Eigenvalue of `rank` (`0` is the least stable) with its
    /// eigenfunction and derivative at `y`
    ///
    /// # Errors
    /// `rank` out of range
    pub fn interp(
        &self,
        y: &[Real],
        pairs: &EigenPairs,
        rank: usize,
    ) -> Result<(c64, Array1<c64>, Array1<c64>)> {
        let (value, vector) = pairs.nth(rank).ok_or_else(|| {
            SpectralError::Configuration(format!("rank {} of {} eigenvalues", rank, pairs.len()))
        })?;
        let space = self.trial_space()?;
        let phi_hat = Function::from_arrays(&space, vec![vector.to_owned().into_dyn()])?;
        let points = Array2::from_shape_vec((y.len(), 1), y.to_vec())?;
        let phi = phi_hat.eval(0, &points)?;
        let dphi = phi_hat.dx(0, 1)?.eval(0, &points)?;
        Ok((value, phi, dphi))
    }
}

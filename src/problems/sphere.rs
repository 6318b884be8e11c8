//! Helmholtz equation on the surface of the unit sphere
//!
//! `-lap u + alpha u = f` in spherical coordinates `(theta, phi)`, with a
//! Chebyshev basis on `(0, pi)` in `theta` and a complex Fourier basis in
//! `phi`. The exact solution is the spherical harmonic of degree 6 and
//! order 3, so `f = (42 + alpha) u`.
//!
//! With `by_parts` the stiffness term is assembled as `inner(grad v, grad u)`.
//! The boundary terms vanish at the poles with the measure `sin(theta)`,
//! which requires the unweighted inner product of a Legendre basis.
use crate::bases::{fourier_c2c, Basis, BoundaryConditions, Dtype, Family, Quadrature};
use crate::coordinates::Spherical;
use crate::error::{Result, SpectralError};
use crate::field::{Function, PhysicalArray};
use crate::form::{div, grad, inner, TestFunction, TrialFunction};
use crate::solver::ModeSolver;
use crate::space::TensorSpace;
use crate::{c64, Real};
use std::f64::consts::PI;

/// Unnormalized spherical harmonic `Y_6^3`
fn harmonic(q: &[Real]) -> c64 {
    let (theta, phi) = (q[0], q[1]);
    let (s, c) = (theta.sin(), theta.cos());
    let amplitude = s.powi(3) * (11. * c.powi(3) - 3. * c);
    c64::new(0., 3. * phi).exp() * amplitude
}

/// Helmholtz problem on the sphere
#[derive(Debug, Clone)]
pub struct SphereHelmholtz {
    /// Points in the polar angle
    pub n: usize,
    /// Points in the azimuth
    pub m: usize,
    /// Helmholtz coefficient
    pub alpha: Real,
    /// Polynomial family in the polar angle
    pub family: Family,
    /// Integrate the Laplacian by parts
    pub by_parts: bool,
}

impl Default for SphereHelmholtz {
    fn default() -> Self {
        Self {
            n: 60,
            m: 40,
            alpha: 2.,
            family: Family::Chebyshev,
            by_parts: false,
        }
    }
}

impl SphereHelmholtz {
    /// Solve and return the L2 error on the sphere
    ///
    /// # Errors
    /// `Configuration` for `by_parts` with a weighted family, otherwise
    /// propagates space, assembly and solver errors
    pub fn solve(&self) -> Result<Real> {
        if self.by_parts && self.family != Family::Legendre {
            return Err(SpectralError::Configuration(format!(
                "integration by parts needs unweighted Legendre polynomials, got {:?}",
                self.family
            )));
        }
        let polar = Basis::new(
            self.n,
            self.family,
            BoundaryConditions::none(),
            Dtype::Real,
            Quadrature::Gauss,
        )?;
        let space = TensorSpace::new(vec![polar.with_domain(0., PI)?, fourier_c2c(self.m)?])?
            .with_coordinates(Spherical::default())?;
        let u = TrialFunction::new(&space).scalar(0)?;
        let v = TestFunction::new(&space).scalar(0)?;
        let form = if self.by_parts {
            inner(&grad(&v), &grad(&u)) + inner(&v, &(u * self.alpha))
        } else {
            inner(&v, &(-div(&grad(&u)) + u * self.alpha))
        };

        let scale = 42. + self.alpha;
        let gj = PhysicalArray::from_fn(&space, |q| harmonic(q) * scale)?;
        let g_hat = gj.scalar_product(&space)?;
        let mut u_hat = Function::zeros(&space);
        ModeSolver::new(&form, &[])?.solve(&g_hat, &mut u_hat)?;

        let exact = PhysicalArray::from_fn(&space, harmonic)?;
        let error = u_hat.backward()?.l2_error(&exact)?[0];
        tracing::info!("sphere helmholtz L2 error {:.6e}", error);
        Ok(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere() {
        let error = SphereHelmholtz::default().solve().unwrap();
        assert!(error < 1e-6, "error {}", error);
    }

    #[test]
    fn test_sphere_by_parts() {
        let sphere = SphereHelmholtz {
            family: Family::Legendre,
            by_parts: true,
            ..SphereHelmholtz::default()
        };
        let error = sphere.solve().unwrap();
        assert!(error < 1e-6, "error {}", error);

        let weighted = SphereHelmholtz {
            by_parts: true,
            ..SphereHelmholtz::default()
        };
        assert!(matches!(
            weighted.solve(),
            Err(SpectralError::Configuration(_))
        ));
    }

    #[test]
    fn test_harmonic_is_eigenfunction() {
        // lap_s Y = Y_tt + cot(t) Y_t - 9 Y / sin^2(t) = -42 Y
        let (t, p, h) = (0.9, 0.4, 1e-4);
        let y = |t: Real| harmonic(&[t, p]);
        let ytt = (y(t + h) - y(t) * 2. + y(t - h)) / (h * h);
        let yt = (y(t + h) - y(t - h)) / (2. * h);
        let lap = ytt + yt * (t.cos() / t.sin()) - y(t) * (9. / t.sin().powi(2));
        assert!((lap + y(t) * 42.).norm() < 1e-5);
    }
}

//! Helmholtz equation on the unit disc in polar coordinates
//!
//! `-lap u + alpha u = f` with `u = 0` at `r = 1`. Every wavenumber but
//! zero vanishes at the origin and is solved on a Dirichlet basis in `r`.
//! The mean mode is solved separately on a basis that is only constrained
//! at `r = 1`.
use crate::bases::{fourier_r2c, Basis, BoundaryConditions, Dtype, Family, Quadrature};
use crate::coordinates::Polar;
use crate::error::Result;
use crate::field::{Function, PhysicalArray};
use crate::form::{div, grad, inner, BilinearForm, TestFunction, TrialFunction};
use crate::solver::{MeanModeSolver, ModeSolver};
use crate::space::TensorSpace;
use crate::{c64, Real};
use ndarray::prelude::*;

/// `(r (1 - r))^2` and its first two derivatives
fn radial(r: Real) -> (Real, Real, Real) {
    let p = (r * (1. - r)).powi(2);
    let dp = 2. * r - 6. * r * r + 4. * r.powi(3);
    let ddp = 2. - 12. * r + 12. * r * r;
    (p, dp, ddp)
}

fn ue(q: &[Real]) -> Real {
    let (theta, r) = (q[0], q[1]);
    radial(r).0 * (8. * theta).cos() - 0.1 * (r - 1.)
}

fn laplacian(q: &[Real]) -> Real {
    let (theta, r) = (q[0], q[1]);
    let (p, dp, ddp) = radial(r);
    (8. * theta).cos() * (ddp + dp / r - 64. * p / (r * r)) - 0.1 / r
}

/// Contravariant components `(g^tt du/dt, du/dr)` of the exact gradient
fn gradient(q: &[Real]) -> (Real, Real) {
    let (theta, r) = (q[0], q[1]);
    let (p, dp, _) = radial(r);
    (
        -8. * p * (8. * theta).sin() / (r * r),
        dp * (8. * theta).cos() - 0.1,
    )
}

/// Errors of the unit disc solve
#[derive(Debug, Clone, Copy)]
pub struct UnitDiscErrors {
    /// L2 error of `u`
    pub u: Real,
    /// L2 error of the gradient in the metric of the disc
    pub gradient: Real,
}

/// Helmholtz problem on the unit disc
#[derive(Debug, Clone)]
pub struct UnitDiscHelmholtz {
    /// Points in angle and radius
    pub n: usize,
    /// Helmholtz coefficient
    pub alpha: Real,
}

impl Default for UnitDiscHelmholtz {
    fn default() -> Self {
        Self { n: 32, alpha: 0. }
    }
}

impl UnitDiscHelmholtz {
    /// Right hand side `f`
    pub fn forcing(&self, q: &[Real]) -> Real {
        -laplacian(q) + self.alpha * ue(q)
    }

    fn space(&self, n_theta: usize, bcs: BoundaryConditions) -> Result<TensorSpace> {
        let rbasis = Basis::new(self.n, Family::Legendre, bcs, Dtype::Real, Quadrature::Gauss)?
            .with_domain(0., 1.)?;
        TensorSpace::with_axes(vec![fourier_r2c(n_theta)?, rbasis], vec![1, 0])?
            .with_coordinates(Polar)
    }

    fn form(&self, space: &TensorSpace) -> Result<BilinearForm> {
        let u = TrialFunction::new(space).scalar(0)?;
        let v = TestFunction::new(space).scalar(0)?;
        Ok(inner(&v, &(-div(&grad(&u)) + u * self.alpha)))
    }

    /// Solve and compare with the exact solution and its gradient
    ///
    /// # Errors
    /// Propagates space, assembly and solver errors
    pub fn solve(&self) -> Result<UnitDiscErrors> {
        let space = self.space(self.n, BoundaryConditions::dirichlet(0., 0.))?;
        let fj = PhysicalArray::from_fn(&space, |q| c64::new(self.forcing(q), 0.))?;
        let mut f_hat = fj.scalar_product(&space)?;
        f_hat.v[0].index_axis_mut(Axis(0), 0).fill(c64::new(0., 0.));

        let mut u_hat = Function::zeros(&space);
        ModeSolver::new(&self.form(&space)?, &[])?.solve(&f_hat, &mut u_hat)?;

        let space0 = self.space(1, BoundaryConditions::from_values(&[None, Some(0.)])?)?;
        let mean = MeanModeSolver::new(&self.form(&space0)?, 0)?;
        let u0_hat = mean.solve(&fj.v[0])?;

        let mut uj = u_hat.backward()?.v.remove(0);
        uj += &mean.broadcast(&u0_hat, &space)?;

        let exact = PhysicalArray::from_fn(&space, |q| c64::new(ue(q), 0.))?;
        let error_u = space.l2_error(&uj, &exact.v[0])?;

        // gradient on the space without boundary conditions
        let ortho = space.orthogonal();
        let uh = PhysicalArray::from_arrays(&ortho, vec![uj])?.forward()?;
        let du = uh.gradient()?;
        let gt = |q: &[Real]| c64::new(gradient(q).0, 0.);
        let gr = |q: &[Real]| c64::new(gradient(q).1, 0.);
        let exact_grad = PhysicalArray::from_fns(du.space(), &[&gt, &gr])?;
        let metric = ortho.covariant_metric()?;
        let mut sq = ArrayD::<c64>::zeros(IxDyn(&ortho.shape_phys()));
        for ((a, b), g) in du.v.iter().zip(exact_grad.v.iter()).zip(metric.iter()) {
            ndarray::Zip::from(&mut sq)
                .and(a)
                .and(b)
                .and(g)
                .for_each(|s, x, y, gi| *s += (x - y).norm_sqr() * gi);
        }
        let error_grad = ortho.integrate(&sq)?.re.max(0.).sqrt();

        tracing::info!(
            "unit disc N={}: error {:.3e}, gradient error {:.3e}",
            self.n,
            error_u,
            error_grad
        );
        Ok(UnitDiscErrors {
            u: error_u,
            gradient: error_grad,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_disc() {
        let errors = UnitDiscHelmholtz::default().solve().unwrap();
        assert!(errors.u < 1e-8, "{:?}", errors);
        assert!(errors.gradient < 1e-7, "{:?}", errors);
    }

    #[test]
    fn test_unit_disc_helmholtz() {
        let problem = UnitDiscHelmholtz { n: 32, alpha: 1. };
        let errors = problem.solve().unwrap();
        assert!(errors.u < 1e-8, "{:?}", errors);
    }

    #[test]
    fn test_exact_laplacian() {
        // radial part: u'' + u'/r, compare with differences
        let (t, r, h) = (0.4, 0.6, 1e-4);
        let d2r = (ue(&[t, r + h]) - 2. * ue(&[t, r]) + ue(&[t, r - h])) / (h * h);
        let dr = (ue(&[t, r + h]) - ue(&[t, r - h])) / (2. * h);
        let d2t = (ue(&[t + h, r]) - 2. * ue(&[t, r]) + ue(&[t - h, r])) / (h * h);
        let fd = d2r + dr / r + d2t / (r * r);
        assert!((fd - laplacian(&[t, r])).abs() < 1e-4);
    }
}

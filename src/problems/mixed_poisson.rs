//! Poisson equation in mixed form on `(0, 2 pi) x (-1, 1)`
//!
//! Solves `g - grad(u) = 0`, `div(g) = f` for the pair `(g, u)`, with
//! `u = 0` at `y = -1, 1` and periodic in `x`. The flux `g` lives on the
//! orthogonal space, `u` on the Dirichlet space.
use crate::bases::{Basis, BoundaryConditions, Dtype, Family, Quadrature};
use crate::error::Result;
use crate::field::{Function, PhysicalArray};
use crate::form::{div, grad, inner, TestFunction, TrialFunction};
use crate::solver::ModeSolver;
use crate::space::{CompositeSpace, FieldKind, TensorSpace};
use crate::{c64, Real};

fn ue(x: &[Real]) -> Real {
    (4. * x[0]).sin() * (5. * x[1]).cos() * (1. - x[1] * x[1])
}

fn dudx(x: &[Real]) -> Real {
    4. * (4. * x[0]).cos() * (5. * x[1]).cos() * (1. - x[1] * x[1])
}

fn dudy(x: &[Real]) -> Real {
    let y = x[1];
    (4. * x[0]).sin() * (-5. * (5. * y).sin() * (1. - y * y) - 2. * y * (5. * y).cos())
}

fn lap(x: &[Real]) -> Real {
    let y = x[1];
    let uyy = (4. * x[0]).sin()
        * (-25. * (5. * y).cos() * (1. - y * y) + 20. * y * (5. * y).sin() - 2. * (5. * y).cos());
    -16. * ue(x) + uyy
}

/// L2 errors of the mixed solve
#[derive(Debug, Clone, Copy)]
pub struct MixedPoissonErrors {
    /// Error of `u`
    pub u: Real,
    /// Error of `du/dx`
    pub dudx: Real,
    /// Error of `du/dy`
    pub dudy: Real,
}

impl MixedPoissonErrors {
    /// Largest of the three errors
    pub fn max(&self) -> Real {
        self.u.max(self.dudx).max(self.dudy)
    }
}

/// Mixed Poisson problem
#[derive(Debug, Clone)]
pub struct MixedPoisson {
    /// Size of both bases
    pub n: usize,
    /// Polynomial family along `y`
    pub family: Family,
}

impl Default for MixedPoisson {
    fn default() -> Self {
        Self {
            n: 24,
            family: Family::Chebyshev,
        }
    }
}

impl MixedPoisson {
    /// Problem of size `n` with polynomials of `family`
    pub fn new(n: usize, family: Family) -> Self {
        Self { n, family }
    }

    fn spaces(&self) -> Result<(TensorSpace, TensorSpace)> {
        let fourier = Basis::new(
            self.n,
            Family::Fourier,
            BoundaryConditions::none(),
            Dtype::Real,
            Quadrature::Gauss,
        )?;
        let dirichlet = Basis::new(
            self.n,
            self.family,
            BoundaryConditions::dirichlet(0., 0.),
            Dtype::Real,
            Quadrature::Gauss,
        )?;
        let orthogonal = dirichlet.orthogonal();
        let td = TensorSpace::with_axes(vec![fourier.clone(), dirichlet], vec![1, 0])?;
        let tt = TensorSpace::with_axes(vec![fourier, orthogonal], vec![1, 0])?;
        Ok((td, tt))
    }

    /// Solve the coupled system
    ///
    /// # Errors
    /// Propagates space, assembly and solver errors
    pub fn solve(&self) -> Result<MixedPoissonErrors> {
        let (td, tt) = self.spaces()?;
        let q = CompositeSpace::new(vec![FieldKind::Vector(tt), FieldKind::Scalar(td)])?;

        let trial = TrialFunction::new(&q);
        let test = TestFunction::new(&q);
        let (g, u) = (trial.vector(0)?, trial.scalar(1)?);
        let (p, s) = (test.vector(0)?, test.scalar(1)?);

        let a00 = inner(&p, &g);
        let a01 = match self.family {
            Family::Legendre => inner(&div(&p), &u),
            _ => inner(&p, &-grad(&u)),
        };
        let a10 = inner(&s, &div(&g));
        let form = a00 + a01 + a10;

        let zero = |_: &[Real]| c64::new(0., 0.);
        let forcing = |x: &[Real]| c64::new(lap(x), 0.);
        let fj = PhysicalArray::from_fns(&q, &[&zero, &zero, &forcing])?;
        let f_hat = fj.scalar_product(&q)?;

        let mut gu_hat = Function::zeros(&q);
        ModeSolver::new(&form, &[])?.solve(&f_hat, &mut gu_hat)?;

        let exact_gx = |x: &[Real]| c64::new(dudx(x), 0.);
        let exact_gy = |x: &[Real]| c64::new(dudy(x), 0.);
        let exact_u = |x: &[Real]| c64::new(ue(x), 0.);
        let exact = PhysicalArray::from_fns(&q, &[&exact_gx, &exact_gy, &exact_u])?;
        let errors = gu_hat.backward()?.l2_error(&exact)?;
        let errors = MixedPoissonErrors {
            u: errors[2],
            dudx: errors[0],
            dudy: errors[1],
        };
        tracing::info!(
            "mixed poisson {:?} N={}: {:.4e} {:.4e} {:.4e}",
            self.family,
            self.n,
            errors.u,
            errors.dudx,
            errors.dudy
        );
        Ok(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_chebyshev() {
        let errors = MixedPoisson::default().solve().unwrap();
        assert!(errors.max() < 1e-8, "{:?}", errors);
    }

    #[test]
    fn test_mixed_legendre() {
        let errors = MixedPoisson::new(24, Family::Legendre).solve().unwrap();
        assert!(errors.max() < 1e-8, "{:?}", errors);
    }

    #[test]
    fn test_mixed_chebyshev_u() {
        let errors = MixedPoisson::new(24, Family::ChebyshevU).solve().unwrap();
        assert!(errors.max() < 1e-8, "{:?}", errors);
    }

    #[test]
    fn test_manufactured_derivatives() {
        // central differences of the exact solution
        let (x, y, h) = (0.7, 0.3, 1e-5);
        let fd = (ue(&[x + h, y]) - ue(&[x - h, y])) / (2. * h);
        assert!((fd - dudx(&[x, y])).abs() < 1e-6);
        let fd = (ue(&[x, y + h]) - ue(&[x, y - h])) / (2. * h);
        assert!((fd - dudy(&[x, y])).abs() < 1e-6);
        let fd = (ue(&[x + h, y]) + ue(&[x - h, y]) + ue(&[x, y + h]) + ue(&[x, y - h])
            - 4. * ue(&[x, y]))
            / (h * h);
        assert!((fd - lap(&[x, y])).abs() < 1e-3);
    }
}

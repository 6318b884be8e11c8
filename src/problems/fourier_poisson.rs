//! Poisson equation on the periodic box `(0, 2 pi)^d`
//!
//! `lap u = f` with `u = cos(4x) + sin(4y) + sin(6z) + cos(6r) + sin(4s)`,
//! truncated to the number of axes. All axes are complex Fourier bases
//! except the last, which is real.
use crate::bases::{fourier_c2c, fourier_r2c, Basis};
use crate::error::Result;
use crate::field::{Function, PhysicalArray};
use crate::form::{div, grad, inner, TestFunction, TrialFunction};
use crate::solver::{Constraint, ModeSolver};
use crate::space::TensorSpace;
use crate::{c64, Real};
use ndarray::prelude::*;

/// Wavenumber and shape of each term, `true` for cosine
const TERMS: [(Real, bool); 5] = [(4., true), (4., false), (6., false), (6., true), (4., false)];

fn term(axis: usize, x: Real) -> (Real, Real) {
    let (k, cosine) = TERMS[axis % TERMS.len()];
    let value = if cosine { (k * x).cos() } else { (k * x).sin() };
    (value, -k * k * value)
}

/// Errors of a periodic Poisson solve
#[derive(Debug, Clone, Copy)]
pub struct PoissonSummary {
    /// L2 error on the grid
    pub l2_error: Real,
    /// Largest deviation at the evaluation points
    pub point_error: Real,
}

/// Periodic Poisson problem
#[derive(Debug, Clone)]
pub struct FourierPoisson {
    /// Grid points per axis
    pub sizes: Vec<usize>,
    /// Evaluation points, shape `(npoints, ndim)`
    pub points: Array2<Real>,
}

impl Default for FourierPoisson {
    fn default() -> Self {
        Self {
            sizes: vec![14, 15, 16],
            points: array![[0.1, 0.5, 0.1], [0.5, 0.6, 0.2]],
        }
    }
}

impl FourierPoisson {
    /// Problem with `sizes` and no evaluation points
    pub fn new(sizes: &[usize]) -> Self {
        Self {
            sizes: sizes.to_vec(),
            points: Array2::zeros((0, sizes.len())),
        }
    }

    /// Exact solution
    pub fn solution(x: &[Real]) -> Real {
        x.iter().enumerate().map(|(a, xa)| term(a, *xa).0).sum()
    }

    /// Right hand side `lap u`
    pub fn forcing(x: &[Real]) -> Real {
        x.iter().enumerate().map(|(a, xa)| term(a, *xa).1).sum()
    }

    /// Solve with the zero mode pinned to zero
    ///
    /// # Errors
    /// Invalid sizes, or a singular mode
    pub fn solve(&self) -> Result<PoissonSummary> {
        let last = self.sizes.len().saturating_sub(1);
        let bases = self
            .sizes
            .iter()
            .enumerate()
            .map(|(a, n)| if a == last { fourier_r2c(*n) } else { fourier_c2c(*n) })
            .collect::<Result<Vec<Basis>>>()?;
        let space = TensorSpace::new(bases)?;

        let u = TrialFunction::new(&space).scalar(0)?;
        let v = TestFunction::new(&space).scalar(0)?;
        let form = inner(&v, &div(&grad(&u)));

        let fj = PhysicalArray::from_fn(&space, |x| c64::new(Self::forcing(x), 0.))?;
        let f_hat = fj.scalar_product(&space)?;
        let solver = ModeSolver::new(&form, &[Constraint::new(0, 0, c64::new(0., 0.))])?;
        let mut u_hat = Function::zeros(&space);
        solver.solve(&f_hat, &mut u_hat)?;

        let exact = PhysicalArray::from_fn(&space, |x| c64::new(Self::solution(x), 0.))?;
        let l2_error = u_hat.backward()?.l2_error(&exact)?[0];

        let mut point_error: Real = 0.;
        if self.points.nrows() > 0 {
            let values = u_hat.eval(0, &self.points)?;
            for (p, value) in self.points.outer_iter().zip(values.iter()) {
                let expected = Self::solution(&p.to_vec());
                point_error = point_error.max((value - expected).norm());
            }
        }
        tracing::info!(
            "fourier poisson {:?}: L2 error {:.3e}, point error {:.3e}",
            self.sizes,
            l2_error,
            point_error
        );
        Ok(PoissonSummary {
            l2_error,
            point_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poisson_1d() {
        let summary = FourierPoisson::new(&[16]).solve().unwrap();
        assert!(summary.l2_error < 1e-10, "error {}", summary.l2_error);
    }

    #[test]
    fn test_poisson_3d() {
        let summary = FourierPoisson::default().solve().unwrap();
        assert!(summary.l2_error < 1e-6, "error {}", summary.l2_error);
        assert!(summary.point_error < 1e-8, "error {}", summary.point_error);
    }

    #[test]
    fn test_poisson_5d() {
        let summary = FourierPoisson::new(&[8, 10, 12, 14, 12]).solve().unwrap();
        assert!(summary.l2_error < 1e-6, "error {}", summary.l2_error);
    }

    #[test]
    fn test_forcing() {
        let x: [f64; 2] = [0.3, 1.2];
        let expected = -16. * (4. * x[0]).cos() - 16. * (4. * x[1]).sin();
        assert!((FourierPoisson::forcing(&x) - expected).abs() < 1e-12);
    }
}

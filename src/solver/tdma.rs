//! Tri-diagonal matrix solver
use super::utils::diag;
use super::{Magnitude, Solve, SolverScalar};
use ndarray::prelude::*;
use ndarray::{Data, DataMut, RemoveAxis, Zip};
use std::ops::{Add, Div, Mul};

/// Relative size below which a pivot counts as zero
const PIVOT_TOL: f64 = 1e-14;

/// Solve tridiagonal system with diagonals-offsets: -2, 0, 2
#[derive(Debug, Clone)]
pub struct Tdma<T> {
    /// Size of matrix (= size of main diagonal)
    pub n: usize,
    /// Lower diagonal (-2)
    pub low: Array1<T>,
    /// Main diagonal
    pub dia: Array1<T>,
    /// Upper diagonal (+2)
    pub upp: Array1<T>,
    /// Pivots of the forward sweep
    pivots: Array1<T>,
    /// Upper diagonal divided by the pivots
    w: Array1<T>,
}

impl<T: SolverScalar + Magnitude> Tdma<T> {
    /// Initialize Tdma from matrix.
    /// Extracts the diagonals and precomputes the forward sweep.
    ///
    /// Returns `None` for matrices smaller than 4 and if a pivot vanishes.
    pub fn from_matrix(a: &Array2<T>) -> Option<Self> {
        let n = a.nrows();
        if n < 4 || !a.is_square() {
            return None;
        }
        let low = diag(a, -2);
        let dia = diag(a, 0);
        let upp = diag(a, 2);
        let scale = dia.iter().fold(0., |acc: f64, v| acc.max(v.magnitude()));
        let mut pivots = Array1::<T>::zeros(n);
        let mut w = Array1::<T>::zeros(n - 2);
        for i in 0..n {
            pivots[i] = if i < 2 {
                dia[i]
            } else {
                dia[i] - low[i - 2] * w[i - 2]
            };
            if pivots[i].magnitude() <= PIVOT_TOL * scale || !pivots[i].magnitude().is_finite() {
                return None;
            }
            if i < n - 2 {
                w[i] = upp[i] / pivots[i];
            }
        }
        Some(Tdma {
            n,
            low,
            dia,
            upp,
            pivots,
            w,
        })
    }

    /// Tridiagonal matrix solver
    ///     Ax = d
    /// where A is banded with diagonals in offsets -2, 0, 2
    #[allow(clippy::many_single_char_names)]
    fn tdma<A>(&self, d: &mut ArrayViewMut1<A>)
    where
        A: SolverScalar + Div<T, Output = A> + Mul<T, Output = A> + Add<T, Output = A>,
    {
        let n = self.n;
        let a = self.low.view();
        let w = self.w.view();
        let mut g = vec![A::zero(); n];

        // Forward sweep
        g[0] = d[0] / self.pivots[0];
        g[1] = d[1] / self.pivots[1];
        for i in 2..n {
            g[i] = (d[i] - g[i - 2] * a[i - 2]) / self.pivots[i];
        }

        // Back substitution
        d[n - 1] = g[n - 1];
        d[n - 2] = g[n - 2];
        for i in (1..n - 1).rev() {
            d[i - 1] = g[i - 1] - d[i + 1] * w[i - 1];
        }
    }
}

impl<T, A, D> Solve<A, D> for Tdma<T>
where
    T: SolverScalar + Magnitude,
    A: SolverScalar + Div<T, Output = A> + Mul<T, Output = A> + Add<T, Output = A>,
    D: Dimension + RemoveAxis,
{
    /// # Example
    ///```
    /// use rustgalerkin::solver::{Solve, Tdma};
    /// use ndarray::prelude::*;
    /// let nx =  6;
    /// let mut data = Array1::<f64>::zeros(nx);
    /// let mut result = Array1::<f64>::zeros(nx);
    /// let mut matrix = Array2::<f64>::zeros((nx,nx));
    /// for (i, v) in data.iter_mut().enumerate() {
    ///     *v = i as f64;
    /// }
    /// for i in 0..nx {
    ///     let j = (i+1) as f64;
    ///     matrix[[i,i]] = 0.5*j;
    ///     if i>1 {
    ///         matrix[[i,i-2]] = 10.*j;
    ///     }
    ///     if i<nx-2 {
    ///         matrix[[i,i+2]] = 1.5*j;
    ///     }
    /// }
    /// let solver = Tdma::from_matrix(&matrix).unwrap();
    /// solver.solve(&data, &mut result,0);
    /// let recover = matrix.dot(&result);
    /// for (a, b) in recover.iter().zip(data.iter()) {
    ///     if (a - b).abs() > 1e-4 {
    ///         panic!("Large difference of values, got {} expected {}.", b, a)
    ///     }
    /// }
    ///```
    fn solve<S1: Data<Elem = A>, S2: Data<Elem = A> + DataMut>(
        &self,
        input: &ArrayBase<S1, D>,
        output: &mut ArrayBase<S2, D>,
        axis: usize,
    ) {
        output.assign(input);
        Zip::from(output.lanes_mut(Axis(axis))).for_each(|mut out| {
            self.tdma(&mut out);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::c64;
    use ndarray::{Array1, Array2};

    fn approx_eq_complex<S, D>(result: &ArrayBase<S, D>, expected: &ArrayBase<S, D>)
    where
        S: Data<Elem = c64>,
        D: Dimension,
    {
        let dif = 1e-6;
        for (a, b) in expected.iter().zip(result.iter()) {
            if (a.re - b.re).abs() > dif || (a.im - b.im).abs() > dif {
                panic!("Large difference of values, got {} expected {}.", b, a)
            }
        }
    }

    #[test]
    fn test_tdma_dim1_complex() {
        let nx = 7;
        let mut data = Array1::<c64>::zeros(nx);
        let mut result = Array1::<c64>::zeros(nx);
        let mut matrix = Array2::<c64>::zeros((nx, nx));
        for (i, v) in data.iter_mut().enumerate() {
            v.re = (i + 0) as f64;
            v.im = (i + 1) as f64;
        }
        for i in 0..nx {
            let j = (i + 1) as f64;
            matrix[[i, i]].re = 0.5 * j;
            matrix[[i, i]].im = 0.5 * j;
            if i > 1 {
                matrix[[i, i - 2]].re = 10. * j;
                matrix[[i, i - 2]].im = 10. * j;
            }
            if i < nx - 2 {
                matrix[[i, i + 2]].re = 1.5 * j;
                matrix[[i, i + 2]].im = 1.5 * j;
            }
        }
        let solver = Tdma::<c64>::from_matrix(&matrix).unwrap();
        solver.solve(&data, &mut result, 0);
        let recover: Array1<c64> = matrix.dot(&result);
        approx_eq_complex(&recover, &data);
    }

    #[test]
    fn test_tdma_zero_pivot() {
        let mut matrix = Array2::<f64>::eye(6);
        matrix[[3, 3]] = 0.;
        assert!(Tdma::from_matrix(&matrix).is_none());
        assert!(Tdma::from_matrix(&Array2::<f64>::eye(3)).is_none());
    }
}

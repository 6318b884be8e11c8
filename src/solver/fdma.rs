//! Four-diagonal matrix solver
use super::utils::diag;
use super::{Magnitude, Solve, SolverScalar};
use ndarray::prelude::*;
use ndarray::{Data, DataMut, RemoveAxis, Zip};
use std::ops::{Add, Div, Mul};

/// Relative size below which a pivot counts as zero
const PIVOT_TOL: f64 = 1e-14;

/// Solve banded system with diagonals-offsets: -2, 0, 2, 4
#[derive(Debug, Clone)]
pub struct Fdma<T> {
    /// Size of matrix (= size of main diagonal)
    pub n: usize,
    /// Lower diagonal (-2)
    pub low: Array1<T>,
    /// Main diagonal
    pub dia: Array1<T>,
    /// Upper diagonal (+2)
    pub up1: Array1<T>,
    /// Upper diagonal (+4)
    pub up2: Array1<T>,
}

impl<T> Fdma<T>
where
    T: SolverScalar + Magnitude,
{
    /// Initialize Fdma from matrix.
    /// Extracts the diagonals and precomputes the forward sweep.
    ///
    /// Returns `None` for matrices smaller than 8 and if a pivot vanishes.
    pub fn from_matrix(a: &Array2<T>) -> Option<Self> {
        if a.nrows() < 8 || !a.is_square() {
            return None;
        }
        let mut fdma = Fdma {
            n: a.nrows(),
            low: diag(a, -2),
            dia: diag(a, 0),
            up1: diag(a, 2),
            up2: diag(a, 4),
        };
        if fdma.sweep() {
            Some(fdma)
        } else {
            None
        }
    }

    /// Precompute forward sweep.
    /// The Arrays l,m,u1,u2 will deviate from the
    /// diagonals of the original matrix.
    ///
    /// Returns false if a pivot vanishes.
    fn sweep(&mut self) -> bool {
        let scale = self
            .dia
            .iter()
            .fold(0., |acc: f64, v| acc.max(v.magnitude()));
        let vanishes = |v: &T| v.magnitude() <= PIVOT_TOL * scale || !v.magnitude().is_finite();
        for i in 2..self.n {
            if vanishes(&self.dia[i - 2]) {
                return false;
            }
            self.low[i - 2] /= self.dia[i - 2];
            self.dia[i] -= self.low[i - 2] * self.up1[i - 2];
            if i < self.n - 2 {
                self.up1[i] -= self.low[i - 2] * self.up2[i - 2];
            }
        }
        !vanishes(&self.dia[self.n - 2]) && !vanishes(&self.dia[self.n - 1])
    }

    /// Banded matrix solver
    ///     Ax = b
    /// where A is banded with diagonals in offsets -2, 0, 2, 4
    #[allow(clippy::many_single_char_names)]
    #[allow(clippy::assign_op_pattern)]
    pub fn fdma<A>(&self, x: &mut ArrayViewMut1<A>)
    where
        A: SolverScalar + Div<T, Output = A> + Mul<T, Output = A> + Add<T, Output = A>,
    {
        let n = self.n;

        for i in 2..n {
            x[i] = x[i] - x[i - 2] * self.low[i - 2];
        }

        x[n - 1] = x[n - 1] / self.dia[n - 1];
        x[n - 2] = x[n - 2] / self.dia[n - 2];
        x[n - 3] = (x[n - 3] - x[n - 1] * self.up1[n - 3]) / self.dia[n - 3];
        x[n - 4] = (x[n - 4] - x[n - 2] * self.up1[n - 4]) / self.dia[n - 4];
        for i in (0..n - 4).rev() {
            x[i] = (x[i] - x[i + 2] * self.up1[i] - x[i + 4] * self.up2[i]) / self.dia[i];
        }
    }
}

impl<T, A, D> Solve<A, D> for Fdma<T>
where
    T: SolverScalar + Magnitude,
    A: SolverScalar + Div<T, Output = A> + Mul<T, Output = A> + Add<T, Output = A>,
    D: Dimension + RemoveAxis,
{
    /// # Example
    ///```
    /// use rustgalerkin::solver::{Fdma, Solve};
    /// use ndarray::prelude::*;
    /// let nx =  10;
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
    ///  if i<nx-4 {
    ///         matrix[[i,i+4]] = 2.5*j;
    ///     }
    /// }
    /// let solver = Fdma::from_matrix(&matrix).unwrap();
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
            self.fdma(&mut out);
        });
    }
}

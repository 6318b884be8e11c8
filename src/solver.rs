//! # Collection of linear algebra Solver
//!
//! [`ModeSolver`] solves the block system of every Fourier mode of a
//! bilinear form. Depending on the structure of a block it uses a direct
//! division, the banded sweeps [`Tdma`] and [`Fdma`], or a dense LU
//! factorization. Modes whose blocks coincide share one factorization.
pub mod eig;
pub mod fdma;
pub mod mean_mode;
pub mod tdma;
pub mod utils;
use crate::error::{ModeFailure, ModeFailures, Result, SpectralError};
use crate::field::Function;
use crate::form::{BilinearForm, ModeMatrices};
use crate::{c64, Real};
pub use eig::{eigensolve, scale_pair, EigenPairs};
pub use fdma::Fdma;
pub use mean_mode::MeanModeSolver;
use ndarray::prelude::*;
use ndarray::{ArrayBase, Data, DataMut};
use ndarray_linalg::{Factorize, LUFactorized, ReciprocalConditionNum, Solve as LuSolve};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;
pub use tdma::Tdma;

/// Combination of linear algebra traits
pub trait SolverScalar:
    ndarray::LinalgScalar
    + std::ops::SubAssign
    + std::ops::DivAssign
    + From<f64>
    + num_traits::Zero
    + num_traits::One
    + std::marker::Copy
    + std::ops::Div
    + std::ops::Sub
{
}
impl<T> SolverScalar for T where
    T: ndarray::LinalgScalar
        + std::ops::SubAssign
        + std::ops::DivAssign
        + From<f64>
        + num_traits::Zero
        + num_traits::One
        + std::marker::Copy
        + std::ops::Div
        + std::ops::Sub
{
}

/// Absolute value used in pivot checks
pub trait Magnitude {
    /// Absolute value
    fn magnitude(&self) -> Real;
}

impl Magnitude for f64 {
    fn magnitude(&self) -> Real {
        self.abs()
    }
}

impl Magnitude for c64 {
    fn magnitude(&self) -> Real {
        self.norm()
    }
}

/// Solve linear algebraix systems of the form: M x = b.
pub trait Solve<A, D> {
    /// Solves M x = b, returns x, which is of type A
    /// Output (x) matches input (b) in type and size.
    fn solve<S1, S2>(&self, input: &ArrayBase<S1, D>, output: &mut ArrayBase<S2, D>, axis: usize)
    where
        A: SolverScalar,
        S1: Data<Elem = A>,
        S2: Data<Elem = A> + DataMut;
}

/// Replace the equation of one coefficient by `u[index] = value`.
///
/// `index` is the flat (row-major) position in the coefficient array of
/// trial component `component`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraint {
    /// Component of the composite space
    pub component: usize,
    /// Flat index into the coefficient array
    pub index: usize,
    /// Prescribed value
    pub value: c64,
}

impl Constraint {
    /// New constraint
    pub fn new(component: usize, index: usize, value: c64) -> Self {
        Self {
            component,
            index,
            value,
        }
    }
}

/// Factorized block of one or more modes
#[allow(clippy::large_enum_variant)]
enum Factorization {
    /// 1x1 block
    Diagonal(c64),
    /// Offsets -2, 0, 2
    Tdma(Tdma<c64>),
    /// Offsets -2, 0, 2, 4
    Fdma(Fdma<c64>),
    /// Dense LU
    Dense(LUFactorized<ndarray::OwnedRepr<c64>>),
}

impl fmt::Debug for Factorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Factorization::Diagonal(d) => write!(f, "Diagonal({})", d),
            Factorization::Tdma(t) => write!(f, "Tdma({})", t.n),
            Factorization::Fdma(t) => write!(f, "Fdma({})", t.n),
            Factorization::Dense(_) => write!(f, "Dense"),
        }
    }
}

impl Factorization {
    /// Pick the cheapest factorization for `a`. On failure the
    /// reciprocal condition estimate and a reason are returned.
    fn new(a: &Array2<c64>) -> std::result::Result<Self, (Real, String)> {
        let n = a.nrows();
        if n == 1 {
            let d = a[[0, 0]];
            if d.norm() == 0. || !d.norm().is_finite() {
                return Err((0., "zero diagonal".to_string()));
            }
            return Ok(Factorization::Diagonal(d));
        }
        let scale = a.iter().fold(0., |acc: Real, v| acc.max(v.norm()));
        let offsets = utils::nonzero_offsets(a, |v: &c64| v.norm(), scale * 1e-15);
        if offsets.iter().all(|o| [-2, 0, 2].contains(o)) {
            if let Some(t) = Tdma::from_matrix(a) {
                return Self::banded(a, Factorization::Tdma(t));
            }
        }
        if offsets.iter().all(|o| [-2, 0, 2, 4].contains(o)) {
            if let Some(f) = Fdma::from_matrix(a) {
                return Self::banded(a, Factorization::Fdma(f));
            }
        }
        let lu = a
            .factorize()
            .map_err(|e| (0., format!("LU factorization failed: {}", e)))?;
        let rcond = lu
            .rcond()
            .map_err(|e| (0., format!("condition estimate failed: {}", e)))?;
        if rcond.is_nan() || rcond < Real::EPSILON {
            return Err((rcond, "matrix is singular to working precision".to_string()));
        }
        Ok(Factorization::Dense(lu))
    }

    /// Accept a banded sweep if its condition estimate is above machine
    /// precision
    fn banded(a: &Array2<c64>, f: Self) -> std::result::Result<Self, (Real, String)> {
        let rcond = f.rcond_estimate(a);
        if rcond.is_nan() || rcond < Real::EPSILON {
            return Err((
                rcond,
                format!("{} system is singular to working precision", f.name()),
            ));
        }
        Ok(f)
    }

    /// Reciprocal 1-norm condition estimate `1 / (|A| |A^-1|)`.
    ///
    /// `|A^-1|` is bounded from below by solves against a constant and a
    /// sign-alternating right hand side, so the estimate never undershoots
    /// the true reciprocal condition number.
    fn rcond_estimate(&self, a: &Array2<c64>) -> Real {
        let n = a.nrows();
        let norm_a = a
            .axis_iter(Axis(1))
            .map(|col| col.iter().map(|v| v.norm()).sum::<Real>())
            .fold(0., Real::max);
        let rhs = [
            Array1::from_elem(n, c64::new(1., 0.)),
            Array1::from_shape_fn(n, |i| c64::new(if (i / 2) % 2 == 0 { 1. } else { -1. }, 0.)),
        ];
        let mut norm_inv: Real = 0.;
        for b in rhs.iter() {
            let x = match self.solve(b) {
                Ok(x) => x,
                Err(_) => return 0.,
            };
            let ratio = x.iter().map(|v| v.norm()).sum::<Real>() / n as Real;
            if !ratio.is_finite() {
                return 0.;
            }
            norm_inv = norm_inv.max(ratio);
        }
        if norm_a == 0. || norm_inv == 0. {
            return 0.;
        }
        1. / (norm_a * norm_inv)
    }

    fn solve(&self, b: &Array1<c64>) -> Result<Array1<c64>> {
        match self {
            Factorization::Diagonal(d) => Ok(b.mapv(|v| v / *d)),
            Factorization::Tdma(t) => {
                let mut x = Array1::zeros(b.len());
                t.solve(b, &mut x, 0);
                Ok(x)
            }
            Factorization::Fdma(f) => {
                let mut x = Array1::zeros(b.len());
                f.solve(b, &mut x, 0);
                Ok(x)
            }
            Factorization::Dense(lu) => Ok(lu.solve(b)?),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Factorization::Diagonal(_) => "diagonal",
            Factorization::Tdma(_) => "tdma",
            Factorization::Fdma(_) => "fdma",
            Factorization::Dense(_) => "dense",
        }
    }
}

/// Solver of all decoupled modes of a bilinear form
pub struct ModeSolver {
    mats: ModeMatrices,
    constraints: Vec<Constraint>,
    /// Constraints per mode as (row, value)
    pinned: HashMap<usize, Vec<(usize, c64)>>,
    /// Group of every mode
    groups: Vec<usize>,
    /// Factorization of every group
    factors: Vec<std::result::Result<Factorization, (Real, String)>>,
    /// Right hand side correction from boundary values, per mode
    lift: HashMap<usize, Array1<c64>>,
}

impl fmt::Debug for ModeSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeSolver")
            .field("modes", &self.mats.nmodes())
            .field("groups", &self.factors.len())
            .field("constraints", &self.constraints)
            .finish()
    }
}

impl ModeSolver {
    /// Assemble and factorize the blocks of every mode of `form`.
    ///
    /// Singular modes do not fail here, they are reported by
    /// [`ModeSolver::solve`] once every other mode is solved.
    ///
    /// # Errors
    /// Form cannot be assembled, blocks are not square, or a constraint
    /// points outside the trial space
    pub fn new(form: &BilinearForm, constraints: &[Constraint]) -> Result<Self> {
        let mats = form.matrix()?;
        let (rows, cols) = mats.block_shape();
        if rows != cols {
            return Err(SpectralError::IncompatibleForm(format!(
                "mode blocks are {}x{}, a square system is required",
                rows, cols
            )));
        }
        let pinned = Self::pin(&mats, constraints)?;

        // Modes with equal term factors and constraints share a factorization
        let mut keys: HashMap<Vec<u64>, usize> = HashMap::new();
        let mut groups = Vec::with_capacity(mats.nmodes());
        let mut representatives = vec![];
        for flat in 0..mats.nmodes() {
            let mode = mats.mode_index(flat);
            let mut key: Vec<u64> = mats
                .term_factors(&mode)
                .iter()
                .flat_map(|f| vec![f.re.to_bits(), f.im.to_bits()])
                .collect();
            if let Some(rows) = pinned.get(&flat) {
                key.push(u64::MAX);
                key.extend(rows.iter().map(|(r, _)| *r as u64));
            }
            let next = keys.len();
            let group = *keys.entry(key).or_insert(next);
            if group == representatives.len() {
                representatives.push(flat);
            }
            groups.push(group);
        }
        let factors: Vec<std::result::Result<Factorization, (Real, String)>> = representatives
            .par_iter()
            .map(|flat| {
                let mode = mats.mode_index(*flat);
                let mut block = mats.block(&mode);
                if let Some(rows) = pinned.get(flat) {
                    for (r, _) in rows.iter() {
                        block.row_mut(*r).fill(c64::new(0., 0.));
                        block[[*r, *r]] = c64::new(1., 0.);
                    }
                }
                Factorization::new(&block)
            })
            .collect();
        let mut counts: HashMap<&'static str, usize> = HashMap::new();
        for f in factors.iter().flatten() {
            *counts.entry(f.name()).or_insert(0) += 1;
        }
        tracing::info!(
            "factorized {} modes in {} groups {:?}",
            mats.nmodes(),
            factors.len(),
            counts
        );
        let lift = Self::lift_correction(form, &mats)?;
        Ok(Self {
            mats,
            constraints: constraints.to_vec(),
            pinned,
            groups,
            factors,
            lift,
        })
    }

    /// Map constraints to (mode, row)
    fn pin(
        mats: &ModeMatrices,
        constraints: &[Constraint],
    ) -> Result<HashMap<usize, Vec<(usize, c64)>>> {
        let comps = mats.trial_space().components();
        let fourier = mats.fourier_axes().to_vec();
        let mut pinned: HashMap<usize, Vec<(usize, c64)>> = HashMap::new();
        for c in constraints.iter() {
            let space = comps.get(c.component).ok_or_else(|| {
                SpectralError::Configuration(format!(
                    "constraint on component {} of {}",
                    c.component,
                    comps.len()
                ))
            })?;
            let shape = space.shape_spec();
            let size: usize = shape.iter().product();
            if c.index >= size {
                return Err(SpectralError::mismatch(&shape, &[c.index]));
            }
            // split the flat index into Fourier and polynomial parts
            let mut rest = c.index;
            let mut idx = vec![0; shape.len()];
            for (i, n) in idx.iter_mut().zip(shape.iter()).rev() {
                *i = rest % n;
                rest /= n;
            }
            let mut mode = 0;
            let mut row = 0;
            for (axis, (i, n)) in idx.iter().zip(shape.iter()).enumerate() {
                if fourier.contains(&axis) {
                    mode = mode * n + i;
                } else {
                    row = row * n + i;
                }
            }
            let row = mats.col_offsets()[c.component] + row;
            pinned.entry(mode).or_default().push((row, c.value));
        }
        Ok(pinned)
    }

    /// `A_ortho * lift` for every mode that carries boundary values
    fn lift_correction(
        form: &BilinearForm,
        mats: &ModeMatrices,
    ) -> Result<HashMap<usize, Array1<c64>>> {
        let comps = form.trial_space().components();
        if comps.iter().all(|s| s.lift_axis().is_none()) {
            return Ok(HashMap::new());
        }
        let ortho = form.with_orthogonal_trial().matrix()?;
        let lift: Vec<ArrayD<c64>> = comps
            .iter()
            .map(|s| {
                let o = s.orthogonal();
                let mut arr = ArrayD::<c64>::zeros(IxDyn(&o.shape_spec()));
                if let Some(axis) = s.lift_axis() {
                    let mut idx = vec![0; s.ndim()];
                    for (j, l) in s.basis(axis).lift_coefficients().iter().enumerate() {
                        idx[axis] = j;
                        arr[IxDyn(&idx)] = c64::new(*l, 0.);
                    }
                }
                arr
            })
            .collect();
        let mut out = HashMap::new();
        for flat in 0..mats.nmodes() {
            let mode = mats.mode_index(flat);
            let vec = ortho.gather(&lift, &mode);
            if vec.iter().any(|v| v.norm() > 0.) {
                out.insert(flat, ortho.block(&mode).dot(&vec));
            }
        }
        Ok(out)
    }

    /// Block matrices of the form
    pub fn matrices(&self) -> &ModeMatrices {
        &self.mats
    }

    /// Modes whose factorization failed
    pub fn failures(&self) -> Vec<ModeFailure> {
        let mut failures = vec![];
        for (flat, group) in self.groups.iter().enumerate() {
            if let Err((rcond, reason)) = &self.factors[*group] {
                let index = self.mats.mode_index(flat);
                failures.push(ModeFailure {
                    wavenumber: self.mats.wavenumber(&index),
                    index,
                    rcond: *rcond,
                    reason: reason.clone(),
                });
            }
        }
        failures
    }

    /// Solve for every mode. Modes with a singular block are set to zero
    /// and listed in the returned error after all others are solved.
    ///
    /// # Errors
    /// `DimensionMismatch` if `rhs` or `solution` do not match the form,
    /// `SingularSystem` listing every failed mode
    pub fn solve(&self, rhs: &Function, solution: &mut Function) -> Result<()> {
        let test = self.mats.test_space().components();
        let trial = self.mats.trial_space().components();
        if rhs.v.len() != test.len() || solution.v.len() != trial.len() {
            return Err(SpectralError::mismatch(
                &[test.len(), trial.len()],
                &[rhs.v.len(), solution.v.len()],
            ));
        }
        for (s, a) in test.iter().zip(rhs.v.iter()) {
            if a.shape() != s.shape_spec().as_slice() {
                return Err(SpectralError::mismatch(&s.shape_spec(), a.shape()));
            }
        }
        for (s, a) in trial.iter().zip(solution.v.iter()) {
            if a.shape() != s.shape_spec().as_slice() {
                return Err(SpectralError::mismatch(&s.shape_spec(), a.shape()));
            }
        }
        self.mats.test_space().check_alive()?;

        let results: Vec<(usize, std::result::Result<Array1<c64>, ModeFailure>)> = (0..self
            .mats
            .nmodes())
            .into_par_iter()
            .map(|flat| {
                let mode = self.mats.mode_index(flat);
                let failure = |rcond: Real, reason: String| ModeFailure {
                    wavenumber: self.mats.wavenumber(&mode),
                    index: mode.clone(),
                    rcond,
                    reason,
                };
                let x = match &self.factors[self.groups[flat]] {
                    Ok(f) => {
                        let mut b = self.mats.gather(&rhs.v, &mode);
                        if let Some(corr) = self.lift.get(&flat) {
                            b = b - corr;
                        }
                        if let Some(rows) = self.pinned.get(&flat) {
                            for (r, v) in rows.iter() {
                                b[*r] = *v;
                            }
                        }
                        f.solve(&b).map_err(|e| failure(0., e.to_string()))
                    }
                    Err((rcond, reason)) => Err(failure(*rcond, reason.clone())),
                };
                (flat, x)
            })
            .collect();

        let mut failures = vec![];
        let zero = Array1::<c64>::zeros(self.mats.block_shape().1);
        for (flat, x) in results.into_iter() {
            let mode = self.mats.mode_index(flat);
            match x {
                Ok(x) => self.mats.scatter(&x, &mut solution.v, &mode),
                Err(f) => {
                    self.mats.scatter(&zero, &mut solution.v, &mode);
                    failures.push(f);
                }
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            for f in failures.iter() {
                tracing::warn!("singular {}", f);
            }
            Err(SpectralError::SingularSystem {
                failures: ModeFailures(failures),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bases::{cheb_biharmonic, cheb_dirichlet, fourier_c2c, fourier_r2c, BaseSize};
    use crate::field::PhysicalArray;
    use crate::form::{div, dx, grad, inner, TestFunction, TrialFunction};
    use crate::space::TensorSpace;

    #[test]
    fn test_singular_without_constraint() {
        // -u'' = f on a periodic line, mode k = 0 is singular
        let space = TensorSpace::new(vec![fourier_c2c(8).unwrap()]).unwrap();
        let u = TrialFunction::new(&space).scalar(0).unwrap();
        let v = TestFunction::new(&space).scalar(0).unwrap();
        let form = inner(&v, &dx(&u, 0, 2));
        let solver = ModeSolver::new(&form, &[]).unwrap();
        assert_eq!(solver.failures().len(), 1);
        let f = PhysicalArray::from_fn(&space, |x| c64::new((2. * x[0]).cos(), 0.)).unwrap();
        let rhs = f.scalar_product(&space).unwrap();
        let mut sol = Function::zeros(&space);
        let err = solver.solve(&rhs, &mut sol).unwrap_err();
        let failures = err.failures().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].wavenumber, vec![0]);
        // all other modes are solved, u = -cos(2x) / 4
        assert!((sol.v[0][[2]].re + 0.5 / 4.).abs() < 1e-12);

        let pinned = ModeSolver::new(&form, &[Constraint::new(0, 0, c64::new(0., 0.))]).unwrap();
        assert!(pinned.failures().is_empty());
        assert!(pinned.solve(&rhs, &mut sol).is_ok());
    }

    #[test]
    fn test_banded_factorizations() {
        let space = TensorSpace::new(vec![cheb_dirichlet(16).unwrap()]).unwrap();
        let u = TrialFunction::new(&space).scalar(0).unwrap();
        let v = TestFunction::new(&space).scalar(0).unwrap();
        // mass matrix of the Dirichlet basis has offsets -2, 0, 2
        let solver = ModeSolver::new(&inner(&v, &u), &[]).unwrap();
        assert_eq!(format!("{:?}", solver.factors[0].as_ref().unwrap()), "Tdma(14)");

        let space = TensorSpace::new(vec![cheb_biharmonic(16).unwrap()]).unwrap();
        let u = TrialFunction::new(&space).scalar(0).unwrap();
        let v = TestFunction::new(&space).scalar(0).unwrap();
        let solver = ModeSolver::new(&inner(&v, &u), &[]).unwrap();
        assert!(solver.factors[0].is_ok());
    }

    #[test]
    fn test_near_singular_tridiagonal() {
        // unit pivots, but each chain of x[i] - 4 x[i-2] grows like 4^k
        let n = 60;
        let mut a = Array2::<c64>::eye(n);
        for i in 2..n {
            a[[i, i - 2]] = c64::new(-4., 0.);
        }
        let (rcond, reason) = Factorization::new(&a).unwrap_err();
        assert!(rcond > 0. && rcond < Real::EPSILON, "rcond {}", rcond);
        assert!(reason.starts_with("tdma"), "{}", reason);

        // same structure, diagonally dominant
        for i in 2..n {
            a[[i, i - 2]] = c64::new(-0.25, 0.);
            if i < n - 2 {
                a[[i, i + 2]] = c64::new(0.25, 0.);
            }
        }
        let f = Factorization::new(&a).unwrap();
        assert_eq!(f.name(), "tdma");
        assert!(f.rcond_estimate(&a) > 0.1);
    }

    #[test]
    fn test_poisson_2d() {
        // -lap u = f, u = sin(2x) (1 - y^2)
        let space = TensorSpace::with_axes(
            vec![fourier_r2c(16).unwrap(), cheb_dirichlet(20).unwrap()],
            vec![1, 0],
        )
        .unwrap();
        let u = TrialFunction::new(&space).scalar(0).unwrap();
        let v = TestFunction::new(&space).scalar(0).unwrap();
        let form = inner(&v, &(div(&grad(&u)) * -1.));
        let exact = |x: &[f64]| c64::new((2. * x[0]).sin() * (1. - x[1] * x[1]), 0.);
        let f = PhysicalArray::from_fn(&space, |x| {
            c64::new((2. * x[0]).sin() * (4. * (1. - x[1] * x[1]) + 2.), 0.)
        })
        .unwrap();
        let rhs = f.scalar_product(&space).unwrap();
        let mut sol = Function::zeros(&space);
        ModeSolver::new(&form, &[]).unwrap().solve(&rhs, &mut sol).unwrap();
        let ue = PhysicalArray::from_fn(&space, exact).unwrap();
        let err = sol.backward().unwrap().l2_error(&ue).unwrap();
        assert!(err[0] < 1e-10, "error {}", err[0]);
        assert_eq!(sol.v[0].shape(), &[9, space.basis(1).len_spec()]);
    }

    #[test]
    fn test_inhomogeneous_dirichlet() {
        // u'' = 0, u(-1) = 1, u(1) = 3 gives u = 2 + x
        use crate::bases::{Basis, BoundaryConditions, Dtype, Family, Quadrature};
        let basis = Basis::new(
            10,
            Family::Chebyshev,
            BoundaryConditions::dirichlet(1., 3.),
            Dtype::Real,
            Quadrature::Gauss,
        )
        .unwrap();
        let space = TensorSpace::new(vec![basis]).unwrap();
        let u = TrialFunction::new(&space).scalar(0).unwrap();
        let v = TestFunction::new(&space).scalar(0).unwrap();
        let form = inner(&v, &dx(&u, 0, 2));
        let rhs = Function::zeros(&space);
        let mut sol = Function::zeros(&space);
        ModeSolver::new(&form, &[]).unwrap().solve(&rhs, &mut sol).unwrap();
        let values = sol.eval(0, &array![[-0.5], [0.25]]).unwrap();
        assert!((values[0].re - 1.5).abs() < 1e-12);
        assert!((values[1].re - 2.25).abs() < 1e-12);
    }

    #[test]
    fn test_constraint_out_of_range() {
        let space = TensorSpace::new(vec![fourier_c2c(8).unwrap()]).unwrap();
        let u = TrialFunction::new(&space).scalar(0).unwrap();
        let v = TestFunction::new(&space).scalar(0).unwrap();
        let c = Constraint::new(0, 8, c64::new(0., 0.));
        assert!(matches!(
            ModeSolver::new(&inner(&v, &u), &[c]),
            Err(SpectralError::DimensionMismatch { .. })
        ));
    }
}

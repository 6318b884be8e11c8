//! Assembly of bilinear forms into per-mode block matrices
//!
//! Each term is a product of one factor per axis. Polynomial axes give a
//! real matrix, Fourier axes a diagonal factor `L (-i k)^e (i k)^d`. The
//! Kronecker product of the polynomial factors does not depend on the
//! mode and is built once per term.
use super::{BilinearForm, BilinearTerm};
use crate::bases::orthogonal::jacobi_matrix;
use crate::bases::{BaseSize, Basis};
use crate::coefficient::Coefficient;
use crate::error::{Result, SpectralError};
use crate::solver::utils::kron;
use crate::space::{CompositeSpace, TensorSpace};
use crate::{c64, Real};
use ndarray::prelude::*;
use ndarray::s;
use std::collections::HashMap;

/// Memoized axis matrices, keyed by the structural signatures of test
/// and trial basis, derivative orders and coefficient
#[derive(Debug, Default)]
pub struct MatrixCache {
    matrices: HashMap<String, Array2<Real>>,
    hits: usize,
    misses: usize,
}

impl MatrixCache {
    /// Number of cached matrices
    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    /// Cache is empty
    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    /// Number of lookups served from the cache
    pub fn hits(&self) -> usize {
        self.hits
    }

    fn get_or_build(
        &mut self,
        test: &Basis,
        trial: &Basis,
        e: usize,
        d: usize,
        coef: &Coefficient,
    ) -> Result<Array2<Real>> {
        let key = format!(
            "{:x}|{:x}|{}|{}|{}",
            test.signature(),
            trial.signature(),
            e,
            d,
            coef.key()
        );
        if let Some(mat) = self.matrices.get(&key) {
            self.hits += 1;
            return Ok(mat.clone());
        }
        self.misses += 1;
        let mat = axis_matrix(test, trial, e, d, coef)?;
        tracing::debug!(
            "axis matrix {}x{} (e = {}, d = {}, c = {:?})",
            mat.nrows(),
            mat.ncols(),
            e,
            d,
            coef
        );
        self.matrices.insert(key, mat.clone());
        Ok(mat)
    }
}

/// Term after assembly
#[derive(Debug, Clone)]
struct AssembledTerm {
    scale: c64,
    test_component: usize,
    trial_component: usize,
    /// One factor vector per Fourier axis
    fourier: Vec<Array1<c64>>,
    /// Kronecker product over polynomial axes
    matrix: Array2<Real>,
}

/// Per-mode block matrices of a bilinear form
///
/// A mode is a multi-index over the Fourier axes. Rows are ordered by
/// test component, columns by trial component; inside a component the
/// polynomial axes are flattened in row-major order.
#[derive(Debug, Clone)]
pub struct ModeMatrices {
    test: CompositeSpace,
    trial: CompositeSpace,
    fourier_axes: Vec<usize>,
    mode_shape: Vec<usize>,
    row_offsets: Vec<usize>,
    col_offsets: Vec<usize>,
    terms: Vec<AssembledTerm>,
}

/// Size of a component inside a mode block
fn block_len(space: &TensorSpace) -> usize {
    space
        .bases()
        .iter()
        .filter(|b| !b.is_periodic())
        .map(BaseSize::len_spec)
        .product()
}

fn offsets(space: &CompositeSpace) -> Vec<usize> {
    let mut offsets = vec![0];
    for comp in space.components().iter() {
        let last = offsets.last().copied().unwrap_or(0);
        offsets.push(last + block_len(comp));
    }
    offsets
}

pub(crate) fn assemble(form: &BilinearForm, cache: &mut MatrixCache) -> Result<ModeMatrices> {
    let test_comps = form.test.components();
    let trial_comps = form.trial.components();
    let first = form.trial.first();
    let fourier_axes = first.fourier_axes();
    let mode_shape: Vec<usize> = fourier_axes
        .iter()
        .map(|a| first.basis(*a).len_spec())
        .collect();
    let test_first = form.test.first();
    if test_first.fourier_axes() != fourier_axes {
        return Err(SpectralError::IncompatibleForm(format!(
            "Fourier axes of test {:?} and trial {:?} differ",
            test_first.fourier_axes(),
            fourier_axes
        )));
    }
    let mut terms = Vec::with_capacity(form.terms.len());
    for term in form.terms.iter() {
        let test = &test_comps[term.test_component];
        let trial = &trial_comps[term.trial_component];
        terms.push(assemble_term(term, test, trial, cache)?);
    }
    tracing::debug!(
        "assembled {} terms over modes {:?} (axis matrices: {} hits, {} built)",
        terms.len(),
        mode_shape,
        cache.hits,
        cache.misses
    );
    Ok(ModeMatrices {
        test: form.test.clone(),
        trial: form.trial.clone(),
        fourier_axes,
        mode_shape,
        row_offsets: offsets(&form.test),
        col_offsets: offsets(&form.trial),
        terms,
    })
}

fn assemble_term(
    term: &BilinearTerm,
    test: &TensorSpace,
    trial: &TensorSpace,
    cache: &mut MatrixCache,
) -> Result<AssembledTerm> {
    if test.ndim() != trial.ndim() {
        return Err(SpectralError::IncompatibleForm(format!(
            "test space has {} axes, trial space {}",
            test.ndim(),
            trial.ndim()
        )));
    }
    let mut fourier = vec![];
    let mut matrix = Array2::<Real>::ones((1, 1));
    for axis in 0..trial.ndim() {
        let (bt, bu) = (test.basis(axis), trial.basis(axis));
        let (e, d) = (term.test_derivs[axis], term.trial_derivs[axis]);
        let coef = &term.coeffs[axis];
        match (bt.as_fourier(), bu.as_fourier()) {
            (Some(ft), Some(fu)) => {
                if ft.n != fu.n || ft.kind != fu.kind || ft.domain != fu.domain {
                    return Err(SpectralError::IncompatibleForm(format!(
                        "Fourier bases of axis {} differ",
                        axis
                    )));
                }
                let c = coef.as_constant().ok_or_else(|| {
                    SpectralError::IncompatibleForm(format!(
                        "coefficient {} varies along periodic axis {}",
                        coef.key(),
                        axis
                    ))
                })?;
                let length = fu.length();
                fourier.push(Array1::from_shape_fn(fu.m, |i| {
                    fu.derivative_factor(i, e).conj() * fu.derivative_factor(i, d) * c * length
                }));
            }
            (None, None) => {
                let mat = cache.get_or_build(bt, bu, e, d, coef)?;
                matrix = kron(&matrix, &mat);
            }
            _ => {
                return Err(SpectralError::IncompatibleForm(format!(
                    "axis {} mixes periodic and polynomial bases",
                    axis
                )))
            }
        }
    }
    Ok(AssembledTerm {
        scale: term.scale,
        test_component: term.test_component,
        trial_component: term.trial_component,
        fourier,
        matrix,
    })
}

/// Matrix `A[i, j] = int c (d^e psi_i) (d^d phi_j) w dx` of one polynomial axis.
///
/// Polynomial coefficients use exact coefficient algebra, other
/// coefficients the quadrature of the trial basis.
fn axis_matrix(
    test: &Basis,
    trial: &Basis,
    e: usize,
    d: usize,
    coef: &Coefficient,
) -> Result<Array2<Real>> {
    let (pt, pu) = match (test.parent(), trial.parent()) {
        (Some(pt), Some(pu)) => (pt, pu),
        _ => {
            return Err(SpectralError::IncompatibleForm(
                "polynomial axis without orthogonal parent".to_string(),
            ))
        }
    };
    if pt.family != pu.family || pt.n != pu.n || pt.domain != pu.domain {
        return Err(SpectralError::IncompatibleForm(format!(
            "test {:?}({}) on {:?} and trial {:?}({}) on {:?} differ",
            pt.family, pt.n, pt.domain, pu.family, pu.n, pu.domain
        )));
    }
    let n = pu.n;
    match coef {
        Coefficient::Polynomial(c) => {
            let nw = n + c.len().saturating_sub(1);
            let st = pad_columns(&test.stencil(), nw);
            let su = pad_columns(&trial.stencil(), nw);
            let psi = pu.diff_mat(nw, e).dot(&st.t());
            let mut phi = pu.diff_mat(nw, d).dot(&su.t());
            // multiplication with c(x), x = c0 + c1 t
            let (c0, c1) = pu.map();
            let x = Array2::<Real>::eye(nw) * c0 + jacobi_matrix(pu.family, nw) * c1;
            let mut mult = Array2::<Real>::zeros((nw, nw));
            for ci in c.iter().rev() {
                mult = x.dot(&mult) + Array2::<Real>::eye(nw) * *ci;
            }
            phi = mult.dot(&phi);
            let norms = pu.norms(nw);
            for (mut row, nk) in phi.outer_iter_mut().zip(norms.iter()) {
                row.mapv_inplace(|v| v * nk);
            }
            Ok(psi.t().dot(&phi))
        }
        Coefficient::Function { .. } => {
            let (_, c1) = pu.map();
            let psi = pu.vander.dot(&pu.diff_mat(n, e)).dot(&test.stencil().t());
            let mut phi = pu.vander.dot(&pu.diff_mat(n, d)).dot(&trial.stencil().t());
            for ((mut row, w), x) in phi.outer_iter_mut().zip(pu.w.iter()).zip(pu.x.iter()) {
                let weight = coef.value(*x) * w * c1;
                row.mapv_inplace(|v| v * weight);
            }
            Ok(psi.t().dot(&phi))
        }
    }
}

/// Extend a stencil with zero columns up to `n`
fn pad_columns(stencil: &Array2<Real>, n: usize) -> Array2<Real> {
    let mut out = Array2::<Real>::zeros((stencil.nrows(), n));
    out.slice_mut(s![.., ..stencil.ncols()]).assign(stencil);
    out
}

impl ModeMatrices {
    /// Test space
    pub fn test_space(&self) -> &CompositeSpace {
        &self.test
    }

    /// Trial space
    pub fn trial_space(&self) -> &CompositeSpace {
        &self.trial
    }

    /// Axes with Fourier bases
    pub fn fourier_axes(&self) -> &[usize] {
        &self.fourier_axes
    }

    /// Number of coefficients per Fourier axis
    pub fn mode_shape(&self) -> &[usize] {
        &self.mode_shape
    }

    /// Total number of modes
    pub fn nmodes(&self) -> usize {
        self.mode_shape.iter().product()
    }

    /// Multi-index of flat mode number `flat`
    pub fn mode_index(&self, flat: usize) -> Vec<usize> {
        let mut rest = flat;
        let mut idx = vec![0; self.mode_shape.len()];
        for (i, n) in idx.iter_mut().zip(self.mode_shape.iter()).rev() {
            *i = rest % n;
            rest /= n;
        }
        idx
    }

    /// Integer wavenumbers of a mode
    pub fn wavenumber(&self, mode: &[usize]) -> Vec<i64> {
        let first = self.trial.first();
        self.fourier_axes
            .iter()
            .zip(mode.iter())
            .map(|(a, i)| first.basis(*a).as_fourier().map_or(0, |fo| fo.k[*i]))
            .collect()
    }

    /// Rows and columns of every block
    pub fn block_shape(&self) -> (usize, usize) {
        (
            self.row_offsets.last().copied().unwrap_or(0),
            self.col_offsets.last().copied().unwrap_or(0),
        )
    }

    /// First row of each test component
    pub fn row_offsets(&self) -> &[usize] {
        &self.row_offsets
    }

    /// First column of each trial component
    pub fn col_offsets(&self) -> &[usize] {
        &self.col_offsets
    }

    /// Mode dependent factor of every term
    pub fn term_factors(&self, mode: &[usize]) -> Vec<c64> {
        self.terms
            .iter()
            .map(|t| {
                t.fourier
                    .iter()
                    .zip(mode.iter())
                    .fold(t.scale, |acc, (f, i)| acc * f[*i])
            })
            .collect()
    }

    /// Dense block matrix of `mode`
    pub fn block(&self, mode: &[usize]) -> Array2<c64> {
        let (rows, cols) = self.block_shape();
        let mut out = Array2::<c64>::zeros((rows, cols));
        for (t, f) in self.terms.iter().zip(self.term_factors(mode)) {
            if f == c64::new(0., 0.) {
                continue;
            }
            let r0 = self.row_offsets[t.test_component];
            let c0 = self.col_offsets[t.trial_component];
            let (nr, nc) = t.matrix.dim();
            let mut view = out.slice_mut(s![r0..r0 + nr, c0..c0 + nc]);
            view.zip_mut_with(&t.matrix, |o, m| *o += f * *m);
        }
        out
    }

    /// Matrix of a form without Fourier axes
    ///
    /// # Errors
    /// The form has Fourier axes
    pub fn dense(&self) -> Result<Array2<c64>> {
        if !self.fourier_axes.is_empty() {
            return Err(SpectralError::IncompatibleForm(format!(
                "form has {} modes, select one with block()",
                self.nmodes()
            )));
        }
        Ok(self.block(&[]))
    }

    /// Block vector of `mode`, components of `arrays` concatenated
    pub fn gather(&self, arrays: &[ArrayD<c64>], mode: &[usize]) -> Array1<c64> {
        let mut out = vec![];
        for arr in arrays.iter() {
            let mut view = arr.view();
            for (axis, idx) in self.fourier_axes.iter().zip(mode.iter()).rev() {
                view = view.index_axis_move(Axis(*axis), *idx);
            }
            out.extend(view.iter().copied());
        }
        Array1::from(out)
    }

    /// Write block vector of `mode` into `arrays`
    pub fn scatter(&self, vector: &Array1<c64>, arrays: &mut [ArrayD<c64>], mode: &[usize]) {
        let mut values = vector.iter();
        for arr in arrays.iter_mut() {
            let mut view = arr.view_mut();
            for (axis, idx) in self.fourier_axes.iter().zip(mode.iter()).rev() {
                view = view.index_axis_move(Axis(*axis), *idx);
            }
            for (v, x) in view.iter_mut().zip(&mut values) {
                *v = *x;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bases::{cheb_dirichlet, chebyshev, fourier_c2c, leg_dirichlet, legendre};
    use crate::form::{div, dx, grad, inner, TestFunction, TrialFunction};
    use std::f64::consts::PI;

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
    fn test_chebyshev_dirichlet_mass() {
        // (T_i - T_i+2, T_j - T_j+2)_w
        let space = TensorSpace::new(vec![cheb_dirichlet(8).unwrap()]).unwrap();
        let u = TrialFunction::new(&space).scalar(0).unwrap();
        let v = TestFunction::new(&space).scalar(0).unwrap();
        let mass = inner(&v, &u).matrix().unwrap().dense().unwrap();
        assert!((mass[[0, 0]].re - 1.5 * PI).abs() < 1e-12);
        assert!((mass[[1, 1]].re - PI).abs() < 1e-12);
        assert!((mass[[0, 2]].re + PI / 2.).abs() < 1e-12);
        assert!(mass[[0, 1]].norm() < 1e-12);
    }

    #[test]
    fn test_chebyshev_dirichlet_stiffness() {
        // (phi_j'', phi_i)_w is upper triangular with -2 pi (j+1)(j+2) on the diagonal
        let space = TensorSpace::new(vec![cheb_dirichlet(8).unwrap()]).unwrap();
        let u = TrialFunction::new(&space).scalar(0).unwrap();
        let v = TestFunction::new(&space).scalar(0).unwrap();
        let k = inner(&v, &dx(&u, 0, 2)).matrix().unwrap().dense().unwrap();
        for j in 0..6 {
            let expected = -2. * PI * (j as f64 + 1.) * (j as f64 + 2.);
            assert!((k[[j, j]].re - expected).abs() < 1e-10);
            for i in j + 1..6 {
                assert!(k[[i, j]].norm() < 1e-10);
            }
        }
    }

    #[test]
    fn test_polynomial_against_quadrature() {
        // exact algebra and quadrature agree for polynomial coefficients
        let b = legendre(10).unwrap().with_domain(0., 2.).unwrap();
        let c = Coefficient::polynomial(&[1., 0., -1.]);
        let f = Coefficient::function("1-x^2", |x| 1. - x * x);
        let exact = axis_matrix(&b, &b, 0, 1, &c).unwrap();
        let quad = axis_matrix(&b, &b, 0, 1, &f).unwrap();
        approx_eq(&exact.slice(s![..7, ..]).to_owned(), &quad.slice(s![..7, ..]).to_owned());
        let b = leg_dirichlet(12).unwrap();
        let exact = axis_matrix(&b, &b, 1, 1, &c).unwrap();
        let quad = axis_matrix(&b, &b, 1, 1, &f).unwrap();
        approx_eq(&exact, &quad);
    }

    #[test]
    fn test_fourier_factor() {
        let space = TensorSpace::new(vec![fourier_c2c(8).unwrap(), chebyshev(4).unwrap()]).unwrap();
        let u = TrialFunction::new(&space).scalar(0).unwrap();
        let v = TestFunction::new(&space).scalar(0).unwrap();
        let mats = inner(&v, &div(&grad(&u))).matrix().unwrap();
        assert_eq!(mats.nmodes(), 8);
        assert_eq!(mats.mode_shape(), &[8]);
        assert_eq!(mats.wavenumber(&[7]), vec![-1]);
        // -k^2 L M for the Chebyshev mass, T_0 entry
        let block = mats.block(&[3]);
        assert!((block[[0, 0]].re + 9. * 2. * PI * PI).abs() < 1e-10);
    }

    #[test]
    fn test_gather_scatter() {
        let space = TensorSpace::new(vec![chebyshev(3).unwrap(), fourier_c2c(4).unwrap()]).unwrap();
        let u = TrialFunction::new(&space).scalar(0).unwrap();
        let v = TestFunction::new(&space).scalar(0).unwrap();
        let mats = inner(&v, &u).matrix().unwrap();
        let arr = ArrayD::from_shape_fn(IxDyn(&[3, 4]), |idx| {
            c64::new(idx[0] as f64, idx[1] as f64)
        });
        let vec = mats.gather(&[arr.clone()], &[2]);
        assert_eq!(vec.len(), 3);
        assert_eq!(vec[1], c64::new(1., 2.));
        let mut out = vec![ArrayD::zeros(IxDyn(&[3, 4]))];
        mats.scatter(&vec, &mut out, &[2]);
        assert_eq!(out[0][[2, 2]], c64::new(2., 2.));
        assert_eq!(out[0][[2, 1]], c64::new(0., 0.));
    }

    #[test]
    fn test_incompatible_bases() {
        let a = TensorSpace::new(vec![chebyshev(8).unwrap()]).unwrap();
        let b = TensorSpace::new(vec![legendre(8).unwrap()]).unwrap();
        let u = TrialFunction::new(&a).scalar(0).unwrap();
        let v = TestFunction::new(&b).scalar(0).unwrap();
        assert!(matches!(
            inner(&v, &u).matrix(),
            Err(SpectralError::IncompatibleForm(_))
        ));
        let f = TensorSpace::new(vec![fourier_c2c(8).unwrap()]).unwrap();
        let u = TrialFunction::new(&f).scalar(0).unwrap();
        let v = TestFunction::new(&f).scalar(0).unwrap();
        let varying = u.times(0, Coefficient::polynomial(&[0., 1.]));
        assert!(matches!(
            inner(&v, &varying).matrix(),
            Err(SpectralError::IncompatibleForm(_))
        ));
    }
}

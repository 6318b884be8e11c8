//! Generalized eigenvalue problems `A x = lambda B x`
use super::utils::argsort_descending;
use crate::error::{Result, SpectralError};
use crate::{c64, Real};
use lapack::zggev;
use ndarray::prelude::*;

/// Eigenpairs sorted by descending imaginary part
#[derive(Debug, Clone)]
pub struct EigenPairs {
    /// Eigenvalues
    pub values: Array1<c64>,
    /// Eigenvectors as columns
    pub vectors: Array2<c64>,
}

impl EigenPairs {
    /// Eigenpair of `rank`, `0` has the largest imaginary part
    pub fn nth(&self, rank: usize) -> Option<(c64, ArrayView1<c64>)> {
        if rank < self.values.len() {
            Some((self.values[rank], self.vectors.column(rank)))
        } else {
            None
        }
    }

    /// Number of eigenpairs
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// No eigenpairs
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn lapack_info(info: i32) -> Result<()> {
    match info {
        0 => Ok(()),
        i if i < 0 => Err(SpectralError::Convergence(format!(
            "zggev: argument {} has an illegal value",
            -i
        ))),
        i => Err(SpectralError::Convergence(format!(
            "zggev: QZ iteration failed (info = {})",
            i
        ))),
    }
}

/// Solve `A x = lambda B x` with the QZ algorithm (LAPACK `zggev`).
///
/// Infinite eigenvalues (`beta = 0`) are dropped.
///
/// # Errors
/// `Convergence` if the QZ iteration fails or every eigenvalue is
/// infinite, `DimensionMismatch` for non-square or unequal matrices
pub fn eigensolve(a: &Array2<c64>, b: &Array2<c64>) -> Result<EigenPairs> {
    if !a.is_square() || a.dim() != b.dim() {
        return Err(SpectralError::mismatch(a.shape(), b.shape()));
    }
    let n = a.nrows();
    if n == 0 {
        return Ok(EigenPairs {
            values: Array1::zeros(0),
            vectors: Array2::zeros((0, 0)),
        });
    }
    let zero = c64::new(0., 0.);
    let ld = n as i32;
    // column-major copies, overwritten by the generalized Schur form
    let mut af: Vec<c64> = a.t().iter().cloned().collect();
    let mut bf: Vec<c64> = b.t().iter().cloned().collect();
    let mut alpha = vec![zero; n];
    let mut beta = vec![zero; n];
    let mut vl = [zero];
    let mut vr = vec![zero; n * n];
    let mut rwork = vec![0.; 8 * n];
    let mut info = 0;

    let mut query = [zero];
    unsafe {
        zggev(
            b'N',
            b'V',
            ld,
            &mut af,
            ld,
            &mut bf,
            ld,
            &mut alpha[0],
            &mut beta[0],
            &mut vl[0],
            1,
            &mut vr[0],
            ld,
            &mut query,
            -1,
            &mut rwork,
            &mut info,
        )
    };
    lapack_info(info)?;
    let lwork = (query[0].re as usize).max(2 * n);
    let mut work = vec![zero; lwork];
    unsafe {
        zggev(
            b'N',
            b'V',
            ld,
            &mut af,
            ld,
            &mut bf,
            ld,
            &mut alpha[0],
            &mut beta[0],
            &mut vl[0],
            1,
            &mut vr[0],
            ld,
            &mut work,
            lwork as i32,
            &mut rwork,
            &mut info,
        )
    };
    lapack_info(info)?;

    let finite: Vec<usize> = (0..n)
        .filter(|i| beta[*i].norm() > Real::EPSILON * alpha[*i].norm())
        .collect();
    if finite.is_empty() {
        return Err(SpectralError::Convergence(
            "B is singular, every eigenvalue is infinite".to_string(),
        ));
    }
    if finite.len() < n {
        tracing::debug!("dropped {} infinite eigenvalues", n - finite.len());
    }
    let values: Array1<c64> = finite.iter().map(|i| alpha[*i] / beta[*i]).collect();
    let vectors = Array2::from_shape_vec((n, n).f(), vr)?.select(Axis(1), &finite);
    let imag: Vec<Real> = values.iter().map(|v| v.im).collect();
    let perm = argsort_descending(&imag);
    tracing::info!(
        "eigen-solve of size {}, largest growth rate {:?}",
        n,
        perm.first().map(|i| values[*i])
    );
    Ok(EigenPairs {
        values: values.select(Axis(0), &perm),
        vectors: vectors.select(Axis(1), &perm),
    })
}

/// Scale `A` and `B` in place by `d[i, j] = (i+1)^s0 (j+1)^s1`.
/// Eigenvalues are unchanged for `s1 = 0`, the eigenvectors are
/// divided by `(j+1)^s1` otherwise.
pub fn scale_pair(a: &mut Array2<c64>, b: &mut Array2<c64>, scale: (Real, Real)) {
    let (s0, s1) = scale;
    if s0 == 0. && s1 == 0. {
        return;
    }
    for mat in [a, b] {
        for ((i, j), v) in mat.indexed_iter_mut() {
            *v *= ((i + 1) as Real).powf(s0) * ((j + 1) as Real).powf(s1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagonal_pencil() {
        let a = Array2::from_diag(&array![
            c64::new(1., 1.),
            c64::new(2., -1.),
            c64::new(0., 6.)
        ]);
        let b = Array2::from_diag(&array![c64::new(1., 0.), c64::new(1., 0.), c64::new(3., 0.)]);
        let pairs = eigensolve(&a, &b).unwrap();
        assert_eq!(pairs.len(), 3);
        let (first, v) = pairs.nth(0).unwrap();
        assert!((first - c64::new(0., 2.)).norm() < 1e-12);
        assert!(v[2].norm() > 0.99);
        assert!((pairs.values[1] - c64::new(1., 1.)).norm() < 1e-12);
        assert!((pairs.values[2] - c64::new(2., -1.)).norm() < 1e-12);
        assert!(pairs.nth(3).is_none());
    }

    #[test]
    fn test_scaling_keeps_eigenvalues() {
        let a = array![
            [c64::new(2., 0.), c64::new(1., 0.)],
            [c64::new(0., 1.), c64::new(3., 0.)]
        ];
        let b = Array2::<c64>::eye(2);
        let plain = eigensolve(&a, &b).unwrap();
        let (mut sa, mut sb) = (a.clone(), b.clone());
        scale_pair(&mut sa, &mut sb, (2., 0.));
        let scaled = eigensolve(&sa, &sb).unwrap();
        for (x, y) in plain.values.iter().zip(scaled.values.iter()) {
            assert!((x - y).norm() < 1e-10);
        }
    }

    #[test]
    fn test_singular_b() {
        let a = Array2::<c64>::eye(2);
        let b = Array2::<c64>::zeros((2, 2));
        assert!(matches!(
            eigensolve(&a, &b),
            Err(SpectralError::Convergence(_))
        ));
    }

    #[test]
    fn test_infinite_eigenvalue_dropped() {
        // B = diag(1, 0) has one infinite eigenvalue
        let a = array![
            [c64::new(3., 1.), c64::new(1., 0.)],
            [c64::new(0., 0.), c64::new(2., 0.)]
        ];
        let b = Array2::from_diag(&array![c64::new(1., 0.), c64::new(0., 0.)]);
        let pairs = eigensolve(&a, &b).unwrap();
        assert_eq!(pairs.len(), 1);
        assert!((pairs.values[0] - c64::new(3., 1.)).norm() < 1e-12);
        assert_eq!(pairs.vectors.dim(), (2, 1));
    }

    #[test]
    fn test_ill_conditioned_mass() {
        // B = diag(1, 1e-10), cond(B) does not spoil the eigenvalues
        let a = Array2::from_diag(&array![c64::new(0.5, 0.25), c64::new(1e-10, 3e-10)]);
        let b = Array2::from_diag(&array![c64::new(1., 0.), c64::new(1e-10, 0.)]);
        let pairs = eigensolve(&a, &b).unwrap();
        assert!((pairs.values[0] - c64::new(1., 3.)).norm() < 1e-14);
        assert!((pairs.values[1] - c64::new(0.5, 0.25)).norm() < 1e-14);
    }
}

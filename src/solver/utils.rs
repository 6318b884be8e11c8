//! Collection of usefull algebra methods
use crate::Real;
use ndarray::LinalgScalar;
use ndarray::{s, Array1, Array2};
use std::cmp::Ordering;

/// Return the diagonal of a square matrix.
/// Parameter offset defines which diagonal is returned,
/// offsets beyond the size give an empty diagonal.
pub fn diag<T: LinalgScalar>(a: &Array2<T>, offset: i8) -> Array1<T> {
    let n: usize = a.nrows().min(a.ncols());
    let m = offset.unsigned_abs() as usize;
    let mut diag: Array1<T> = Array1::zeros(n.saturating_sub(m));
    if offset >= 0 {
        for (i, d) in &mut diag.iter_mut().enumerate() {
            *d = a[[i, i + m]];
        }
    } else {
        for (i, d) in &mut diag.iter_mut().enumerate() {
            *d = a[[i + m, i]];
        }
    }
    diag
}

/// Offsets of all diagonals with an entry larger than `tol`
///
/// ```
/// use rustgalerkin::solver::utils::nonzero_offsets;
/// use ndarray::array;
/// let a = array![[1., 0., 2.], [0., 1., 0.], [0., 0., 1.]];
/// assert_eq!(nonzero_offsets(&a, |v: &f64| v.abs(), 0.), vec![0, 2]);
/// ```
pub fn nonzero_offsets<T, F>(a: &Array2<T>, magnitude: F, tol: Real) -> Vec<isize>
where
    F: Fn(&T) -> Real,
{
    let mut offsets = vec![];
    for ((i, j), v) in a.indexed_iter() {
        if magnitude(v) > tol {
            let off = j as isize - i as isize;
            if !offsets.contains(&off) {
                offsets.push(off);
            }
        }
    }
    offsets.sort_unstable();
    offsets
}

/// Kronecker product of two matrices
///
/// ```
/// use rustgalerkin::solver::utils::kron;
/// use ndarray::array;
/// let a = array![[1., 2.], [3., 4.]];
/// let b = array![[0., 1.], [1., 0.]];
/// let k = kron(&a, &b);
/// assert_eq!(k[[0, 1]], 1.);
/// assert_eq!(k[[3, 2]], 4.);
/// ```
pub fn kron<T: LinalgScalar>(a: &Array2<T>, b: &Array2<T>) -> Array2<T> {
    let (ra, ca) = a.dim();
    let (rb, cb) = b.dim();
    let mut out = Array2::<T>::zeros((ra * rb, ca * cb));
    for ((i, j), v) in a.indexed_iter() {
        out.slice_mut(s![i * rb..(i + 1) * rb, j * cb..(j + 1) * cb])
            .assign(&b.mapv(|x| x * *v));
    }
    out
}

/// Argsort Vector ( largest -> smallest ).
/// Returns permutation vector. The sort is stable, equal values keep
/// their order.
///
/// ```
/// use rustgalerkin::solver::utils::argsort_descending;
/// use ndarray::{array,Axis};
/// let vec = array![3., 1., 2., 9., 7.];
/// let permut: Vec<usize> = argsort_descending(vec.as_slice().unwrap());
/// let vec = vec.select(Axis(0), &permut).to_owned();
/// assert_eq!(vec,array![9.0, 7.0, 3.0, 2.0, 1.0]);
/// ```
pub fn argsort_descending(vec: &[f64]) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..vec.len()).collect();

    perm.sort_by(|i, j| {
        if vec[*i] > vec[*j] {
            Ordering::Less
        } else if vec[*i] < vec[*j] {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    });
    perm
}

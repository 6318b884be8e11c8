//! # Function spaces
//!
//! A [`TensorSpace`] is the tensor product of one basis per axis, with an
//! optional coordinate map. A [`CompositeSpace`] bundles the fields of a
//! coupled problem, each a scalar or a vector field over one tensor space.
//!
//! Arrays live on the full grid of one process; all axes are local.
use crate::bases::{apply_lanes, BaseSize, Basis, FourierKind, TestKind, Transform};
use crate::coordinates::{self, CoordinateMap, Separable};
use crate::error::{Result, SpectralError};
use crate::{c64, Real};
use ndarray::prelude::*;
use ndarray::Zip;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

static SPACE_ID: AtomicU64 = AtomicU64::new(0);

fn next_id() -> u64 {
    SPACE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Tensor product of bases
#[derive(Debug, Clone)]
pub struct TensorSpace {
    bases: Arc<Vec<Basis>>,
    axes: Vec<usize>,
    coordinates: Option<Arc<dyn CoordinateMap>>,
    released: Arc<AtomicBool>,
    /// Release flags of the spaces this one was derived from
    ancestors: Vec<Arc<AtomicBool>>,
    id: u64,
}

impl TensorSpace {
    /// Space with default transform order `axes = (0, 1, ..)`.
    ///
    /// ```
    /// use rustgalerkin::bases::{cheb_dirichlet, fourier_r2c};
    /// use rustgalerkin::space::TensorSpace;
    /// let space = TensorSpace::new(vec![cheb_dirichlet(8).unwrap(), fourier_r2c(6).unwrap()]).unwrap();
    /// assert_eq!(space.shape_spec(), vec![6, 4]);
    /// ```
    ///
    /// # Errors
    /// See [`TensorSpace::with_axes`]
    pub fn new(bases: Vec<Basis>) -> Result<Self> {
        let axes = (0..bases.len()).collect();
        Self::with_axes(bases, axes)
    }

    /// Space with transform order `axes`. Forward transforms start with
    /// the last entry of `axes`, backward transforms with the first.
    ///
    /// # Errors
    /// Empty space, `axes` is no permutation, more than one real Fourier
    /// axis or a real Fourier axis that is not transformed first, or more
    /// than one axis with nonzero boundary values
    pub fn with_axes(bases: Vec<Basis>, axes: Vec<usize>) -> Result<Self> {
        let ndim = bases.len();
        if ndim == 0 {
            return Err(SpectralError::Configuration(
                "space needs at least one basis".to_string(),
            ));
        }
        let mut sorted = axes.clone();
        sorted.sort_unstable();
        if sorted != (0..ndim).collect::<Vec<usize>>() {
            return Err(SpectralError::Configuration(format!(
                "axes {:?} are no permutation of 0..{}",
                axes, ndim
            )));
        }
        let r2c: Vec<usize> = (0..ndim).filter(|a| bases[*a].is_r2c()).collect();
        if r2c.len() > 1 || (r2c.len() == 1 && axes.last() != r2c.first()) {
            return Err(SpectralError::Configuration(format!(
                "real Fourier axes {:?} must be a single axis transformed first (axes {:?})",
                r2c, axes
            )));
        }
        if bases.iter().filter(|b| b.has_lift()).count() > 1 {
            return Err(SpectralError::Configuration(
                "nonzero boundary values are supported on one axis only".to_string(),
            ));
        }
        Ok(Self {
            bases: Arc::new(bases),
            axes,
            coordinates: None,
            released: Arc::new(AtomicBool::new(false)),
            ancestors: vec![],
            id: next_id(),
        })
    }

    /// Attach a coordinate map
    ///
    /// # Errors
    /// Dimension of map does not match, or Jacobian is degenerate or
    /// the metric is not diagonal on the mesh
    pub fn with_coordinates<C>(mut self, map: C) -> Result<Self>
    where
        C: CoordinateMap + 'static,
    {
        if map.ndim() != self.ndim() {
            return Err(SpectralError::UnsupportedCoordinate(format!(
                "{} has {} coordinates, space has {} axes",
                map.name(),
                map.ndim(),
                self.ndim()
            )));
        }
        coordinates::validate(&map, &self.mesh_points())?;
        tracing::debug!("space {} uses {} coordinates", self.id, map.name());
        self.coordinates = Some(Arc::new(map));
        Ok(self)
    }

    fn derived(&self, bases: Vec<Basis>) -> Self {
        let mut ancestors = self.ancestors.clone();
        ancestors.push(Arc::clone(&self.released));
        Self {
            bases: Arc::new(bases),
            axes: self.axes.clone(),
            coordinates: self.coordinates.clone(),
            released: Arc::new(AtomicBool::new(false)),
            ancestors,
            id: next_id(),
        }
    }

    /// Unique id of the space
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of axes
    pub fn ndim(&self) -> usize {
        self.bases.len()
    }

    /// Bases, one per axis
    pub fn bases(&self) -> &[Basis] {
        &self.bases
    }

    /// Basis of `axis`
    pub fn basis(&self, axis: usize) -> &Basis {
        &self.bases[axis]
    }

    /// Transform order
    pub fn axes(&self) -> &[usize] {
        &self.axes
    }

    /// Coordinate map, if curvilinear
    pub fn coordinates(&self) -> Option<&Arc<dyn CoordinateMap>> {
        self.coordinates.as_ref()
    }

    /// Shape of physical arrays
    pub fn shape_phys(&self) -> Vec<usize> {
        self.bases.iter().map(BaseSize::len_phys).collect()
    }

    /// Shape of coefficient arrays
    pub fn shape_spec(&self) -> Vec<usize> {
        self.bases.iter().map(BaseSize::len_spec).collect()
    }

    /// Axes with Fourier bases, ascending
    pub fn fourier_axes(&self) -> Vec<usize> {
        (0..self.ndim())
            .filter(|a| self.bases[*a].is_periodic())
            .collect()
    }

    /// Has a real Fourier axis, physical values are real
    pub fn is_real(&self) -> bool {
        self.bases.iter().any(Basis::is_r2c)
    }

    /// Axis with nonzero boundary values
    pub fn lift_axis(&self) -> Option<usize> {
        (0..self.ndim()).find(|a| self.bases[*a].has_lift())
    }

    /// Fails once the space was released
    ///
    /// # Errors
    /// `SpaceReleased`
    pub fn check_alive(&self) -> Result<()> {
        let released = std::iter::once(&self.released)
            .chain(self.ancestors.iter())
            .any(|flag| flag.load(Ordering::Acquire));
        if released {
            Err(SpectralError::SpaceReleased)
        } else {
            Ok(())
        }
    }

    /// Release the space. Every later operation on it, on spaces derived
    /// from it and on their arrays fails with `SpaceReleased`. Releasing a
    /// derived space leaves its parent usable. FFT plans are dropped
    /// together with the last handle.
    pub fn destroy(&self) {
        self.released.store(true, Ordering::Release);
        tracing::debug!("space {} released", self.id);
    }

    /// Computational coordinates of the grid, one vector per axis
    ///
    /// # Errors
    /// Released space
    pub fn local_mesh(&self) -> Result<Vec<Array1<Real>>> {
        self.check_alive()?;
        Ok(self.bases.iter().map(|b| b.coords().clone()).collect())
    }

    /// Computational coordinates broadcast to the full physical shape
    ///
    /// # Errors
    /// Released space
    pub fn local_mesh_broadcast(&self) -> Result<Vec<ArrayD<Real>>> {
        let mesh = self.local_mesh()?;
        let shape = self.shape_phys();
        Ok((0..self.ndim())
            .map(|a| ArrayD::from_shape_fn(IxDyn(&shape), |idx| mesh[a][idx[a]]))
            .collect())
    }

    /// Cartesian coordinates of the grid, one array per Cartesian direction
    ///
    /// # Errors
    /// Released space
    pub fn cartesian_mesh(&self) -> Result<Vec<ArrayD<Real>>> {
        let mesh = self.local_mesh_broadcast()?;
        match &self.coordinates {
            None => Ok(mesh),
            Some(map) => {
                let shape = self.shape_phys();
                let ncart = map.position(&vec![0.; self.ndim()]).len();
                let mut out = vec![ArrayD::<Real>::zeros(IxDyn(&shape)); ncart];
                for (flat, q) in self.mesh_points().iter().enumerate() {
                    let pos = map.position(q);
                    for (o, p) in out.iter_mut().zip(pos.iter()) {
                        if let Some(v) = o.as_slice_mut().and_then(|s| s.get_mut(flat)) {
                            *v = *p;
                        }
                    }
                }
                Ok(out)
            }
        }
    }

    /// All grid points in row-major order
    fn mesh_points(&self) -> Vec<Vec<Real>> {
        let shape = self.shape_phys();
        let n: usize = shape.iter().product();
        (0..n)
            .map(|flat| {
                let mut rest = flat;
                let mut q = vec![0.; shape.len()];
                for a in (0..shape.len()).rev() {
                    q[a] = self.bases[a].coords()[rest % shape[a]];
                    rest /= shape[a];
                }
                q
            })
            .collect()
    }

    /// Separable product evaluated on the grid
    fn separable_on_mesh(&self, factors: &Separable) -> ArrayD<Real> {
        let vectors: Vec<Array1<Real>> = self
            .bases
            .iter()
            .zip(factors.iter())
            .map(|(b, c)| b.coords().mapv(|x| c.value(x)))
            .collect();
        outer(&vectors)
    }

    /// Jacobian determinant `sqrt(g)` on the grid (ones if Cartesian)
    ///
    /// # Errors
    /// Released space
    pub fn jacobian(&self) -> Result<ArrayD<Real>> {
        self.check_alive()?;
        Ok(match &self.coordinates {
            Some(map) => self.separable_on_mesh(&map.sqrt_det()),
            None => ArrayD::ones(IxDyn(&self.shape_phys())),
        })
    }

    /// Diagonal of the covariant metric `g_ii` on the grid
    ///
    /// # Errors
    /// Released space
    pub fn covariant_metric(&self) -> Result<Vec<ArrayD<Real>>> {
        self.check_alive()?;
        Ok((0..self.ndim())
            .map(|i| match &self.coordinates {
                Some(map) => self.separable_on_mesh(&map.covariant(i)),
                None => ArrayD::ones(IxDyn(&self.shape_phys())),
            })
            .collect())
    }

    /// Diagonal of the contravariant metric `g^ii` on the grid
    ///
    /// # Errors
    /// Released space
    pub fn contravariant_metric(&self) -> Result<Vec<ArrayD<Real>>> {
        self.check_alive()?;
        Ok((0..self.ndim())
            .map(|i| match &self.coordinates {
                Some(map) => self.separable_on_mesh(&map.contravariant(i)),
                None => ArrayD::ones(IxDyn(&self.shape_phys())),
            })
            .collect())
    }

    fn check_shape(&self, arr: &ArrayD<c64>, expected: &[usize]) -> Result<()> {
        self.check_alive()?;
        if arr.shape() != expected {
            return Err(SpectralError::mismatch(expected, arr.shape()));
        }
        Ok(())
    }

    fn lift_on_mesh(&self) -> Option<ArrayD<Real>> {
        self.lift_axis().map(|axis| {
            let vectors: Vec<Array1<Real>> = (0..self.ndim())
                .map(|a| {
                    if a == axis {
                        self.bases[a].lift_values()
                    } else {
                        Array1::ones(self.bases[a].len_phys())
                    }
                })
                .collect();
            outer(&vectors)
        })
    }

    /// Physical values --> coefficients
    ///
    /// # Errors
    /// Wrong shape or released space
    pub fn forward(&self, input: &ArrayD<c64>) -> Result<ArrayD<c64>> {
        self.check_shape(input, &self.shape_phys())?;
        let mut buffer = input.clone();
        if let Some(lift) = self.lift_on_mesh() {
            buffer.zip_mut_with(&lift, |v, l| *v -= *l);
        }
        for &axis in self.axes.iter().rev() {
            buffer = self.bases[axis].forward(&buffer, axis);
        }
        Ok(buffer)
    }

    /// Coefficients --> physical values. Real spaces return a vanishing
    /// imaginary part.
    ///
    /// # Errors
    /// Wrong shape or released space
    pub fn backward(&self, input: &ArrayD<c64>) -> Result<ArrayD<c64>> {
        self.check_shape(input, &self.shape_spec())?;
        let mut buffer = input.clone();
        for &axis in self.axes.iter() {
            buffer = self.bases[axis].backward(&buffer, axis);
        }
        if self.is_real() {
            buffer.mapv_inplace(|v| c64::new(v.re, 0.));
        }
        if let Some(lift) = self.lift_on_mesh() {
            buffer.zip_mut_with(&lift, |v, l| *v += *l);
        }
        Ok(buffer)
    }

    /// Scalar product with all basis functions, including the measure
    /// `sqrt(g)` of curvilinear coordinates
    ///
    /// # Errors
    /// Wrong shape or released space
    pub fn scalar_product(&self, input: &ArrayD<c64>) -> Result<ArrayD<c64>> {
        self.check_shape(input, &self.shape_phys())?;
        let mut buffer = input.clone();
        if let Some(map) = &self.coordinates {
            let jac = self.separable_on_mesh(&map.sqrt_det());
            buffer.zip_mut_with(&jac, |v, j| *v *= *j);
        }
        for &axis in self.axes.iter().rev() {
            buffer = self.bases[axis].scalar_product(&buffer, axis);
        }
        Ok(buffer)
    }

    /// Evaluate coefficients at arbitrary points by direct summation.
    /// `points` has shape `(npoints, ndim)` in computational coordinates.
    ///
    /// # Errors
    /// Wrong shapes or released space
    pub fn eval(&self, points: &Array2<Real>, coefs: &ArrayD<c64>) -> Result<Array1<c64>> {
        self.check_shape(coefs, &self.shape_spec())?;
        if points.ncols() != self.ndim() {
            return Err(SpectralError::mismatch(
                &[points.nrows(), self.ndim()],
                points.shape(),
            ));
        }
        let coefs = coefs.as_standard_layout().to_owned();
        let lift_axis = self.lift_axis();
        let values: Vec<c64> = (0..points.nrows())
            .into_par_iter()
            .map(|p| -> Result<c64> {
                let mut t = coefs.clone();
                for a in (0..self.ndim()).rev() {
                    let e = self.bases[a].evaluate(points[[p, a]]);
                    t = contract_last(&t, &e)?;
                }
                let mut v = t.iter().copied().next().unwrap_or_else(|| c64::new(0., 0.));
                if self.is_real() {
                    v = c64::new(v.re, 0.);
                }
                if let Some(axis) = lift_axis {
                    v += self.bases[axis].lift_at(points[[p, axis]]);
                }
                Ok(v)
            })
            .collect::<Result<Vec<c64>>>()?;
        Ok(Array1::from(values))
    }

    /// Uniformly spaced points per axis. Periodic axes exclude the
    /// right end, polynomial axes include both ends.
    pub fn uniform_mesh(&self, sizes: &[usize]) -> Vec<Array1<Real>> {
        self.bases
            .iter()
            .zip(sizes.iter())
            .map(|(b, &n)| {
                let (a, c) = b.domain();
                if b.is_periodic() {
                    Array1::from_shape_fn(n, |j| a + (c - a) * j as Real / n as Real)
                } else {
                    Array1::linspace(a, c, n)
                }
            })
            .collect()
    }

    /// Coefficients --> values on the uniform mesh of `sizes`
    ///
    /// # Errors
    /// Wrong shapes or released space
    pub fn backward_uniform(&self, input: &ArrayD<c64>, sizes: &[usize]) -> Result<ArrayD<c64>> {
        self.check_shape(input, &self.shape_spec())?;
        if sizes.len() != self.ndim() {
            return Err(SpectralError::mismatch(&[self.ndim()], &[sizes.len()]));
        }
        let mesh = self.uniform_mesh(sizes);
        let mut buffer = input.clone();
        for &axis in self.axes.iter() {
            let basis = &self.bases[axis];
            let mut mat = Array2::<c64>::zeros((sizes[axis], basis.len_spec()));
            for (mut row, x) in mat.outer_iter_mut().zip(mesh[axis].iter()) {
                row.assign(&basis.evaluate(*x));
            }
            buffer = apply_lanes(&buffer, axis, sizes[axis], |inp, out| {
                for (o, row) in out.iter_mut().zip(mat.outer_iter()) {
                    *o = row.iter().zip(inp.iter()).map(|(m, v)| m * v).sum();
                }
            });
        }
        if self.is_real() {
            buffer.mapv_inplace(|v| c64::new(v.re, 0.));
        }
        if let Some(axis) = self.lift_axis() {
            let vectors: Vec<Array1<Real>> = (0..self.ndim())
                .map(|a| {
                    if a == axis {
                        mesh[a].mapv(|x| self.bases[a].lift_at(x))
                    } else {
                        Array1::ones(sizes[a])
                    }
                })
                .collect();
            buffer.zip_mut_with(&outer(&vectors), |v, l| *v += *l);
        }
        Ok(buffer)
    }

    /// Space with `sizes` points per axis and the coefficients embedded
    /// into it. High modes are zero, the Nyquist mode of even Fourier
    /// bases is split evenly between `+n/2` and `-n/2`.
    ///
    /// # Errors
    /// Smaller sizes than the current ones, or released space
    pub fn refine(&self, input: &ArrayD<c64>, sizes: &[usize]) -> Result<(Self, ArrayD<c64>)> {
        self.check_shape(input, &self.shape_spec())?;
        if sizes.len() != self.ndim() {
            return Err(SpectralError::mismatch(&[self.ndim()], &[sizes.len()]));
        }
        let mut bases = vec![];
        let mut buffer = input.clone();
        for (axis, (old, &n)) in self.bases.iter().zip(sizes.iter()).enumerate() {
            if n < old.len_phys() {
                return Err(SpectralError::Configuration(format!(
                    "refine cannot shrink axis {} from {} to {}",
                    axis,
                    old.len_phys(),
                    n
                )));
            }
            let new = old.resized(n)?;
            buffer = refine_axis(&buffer, axis, old, &new);
            bases.push(new);
        }
        let space = self.derived(bases);
        Ok((space, buffer))
    }

    /// Quadrature of physical values over the domain, including `sqrt(g)`
    ///
    /// # Errors
    /// Wrong shape or released space
    pub fn integrate(&self, input: &ArrayD<c64>) -> Result<c64> {
        self.check_shape(input, &self.shape_phys())?;
        let mut weights: Vec<Array1<Real>> =
            self.bases.iter().map(Transform::integration_weights).collect();
        if let Some(map) = &self.coordinates {
            for ((w, b), c) in weights.iter_mut().zip(self.bases.iter()).zip(map.sqrt_det()) {
                for (wj, x) in w.iter_mut().zip(b.coords().iter()) {
                    *wj *= c.value(*x);
                }
            }
        }
        let weights = outer(&weights);
        Ok(input
            .iter()
            .zip(weights.iter())
            .map(|(v, w)| *v * *w)
            .sum())
    }

    /// L2 norm of the difference of two physical arrays
    ///
    /// # Errors
    /// Wrong shapes or released space
    pub fn l2_error(&self, a: &ArrayD<c64>, b: &ArrayD<c64>) -> Result<Real> {
        if a.shape() != b.shape() {
            return Err(SpectralError::mismatch(a.shape(), b.shape()));
        }
        let diff = Zip::from(a).and(b).map_collect(|x, y| c64::new((x - y).norm_sqr(), 0.));
        Ok(self.integrate(&diff)?.re.max(0.).sqrt())
    }

    /// Space of test functions
    ///
    /// # Errors
    /// Propagates basis construction errors
    pub fn test_space(&self, kind: TestKind) -> Result<Self> {
        if kind == TestKind::Galerkin {
            return Ok(self.clone());
        }
        let bases = self
            .bases
            .iter()
            .map(|b| b.test_basis(kind))
            .collect::<Result<Vec<Basis>>>()?;
        Ok(self.derived(bases))
    }

    /// Space of the orthogonal parents, no boundary constraints
    pub fn orthogonal(&self) -> Self {
        self.derived(self.bases.iter().map(Basis::orthogonal).collect())
    }

    /// Composite coefficients --> orthogonal coefficients
    ///
    /// # Errors
    /// Wrong shape or released space
    pub fn to_orthogonal(&self, input: &ArrayD<c64>) -> Result<ArrayD<c64>> {
        self.check_shape(input, &self.shape_spec())?;
        let mut buffer = input.clone();
        for (axis, b) in self.bases.iter().enumerate() {
            buffer = b.to_orthogonal(&buffer, axis);
        }
        if let Some(axis) = self.lift_axis() {
            let mut idx = vec![0; self.ndim()];
            for (j, l) in self.bases[axis].lift_coefficients().iter().enumerate() {
                idx[axis] = j;
                buffer[IxDyn(&idx)] += *l;
            }
        }
        Ok(buffer)
    }

    /// Derivative of coefficients in the orthogonal space
    ///
    /// # Errors
    /// Wrong shape or released space
    pub fn differentiate(&self, input: &ArrayD<c64>, axis: usize, order: usize) -> Result<ArrayD<c64>> {
        let ortho = self.to_orthogonal(input)?;
        let parent = self.bases[axis].orthogonal();
        Ok(parent.differentiate(&ortho, order, axis))
    }
}

/// Outer product of vectors
pub(crate) fn outer(vectors: &[Array1<Real>]) -> ArrayD<Real> {
    let shape: Vec<usize> = vectors.iter().map(Array1::len).collect();
    ArrayD::from_shape_fn(IxDyn(&shape), |idx| {
        vectors
            .iter()
            .enumerate()
            .map(|(a, v)| v[idx[a]])
            .product()
    })
}

/// Contract the last axis of `t` with vector `e`
fn contract_last(t: &ArrayD<c64>, e: &Array1<c64>) -> Result<ArrayD<c64>> {
    let shape = t.shape().to_vec();
    let (last, rest) = match shape.split_last() {
        Some((l, r)) => (*l, r.to_vec()),
        None => return Ok(t.clone()),
    };
    if e.len() != last {
        return Err(SpectralError::mismatch(&[last], &[e.len()]));
    }
    let outer_len: usize = rest.iter().product();
    let mut out = Vec::with_capacity(outer_len);
    let flat = t.as_standard_layout();
    let data: Vec<c64> = flat.iter().copied().collect();
    for chunk in data.chunks(last.max(1)) {
        out.push(chunk.iter().zip(e.iter()).map(|(a, b)| a * b).sum());
    }
    out.truncate(outer_len);
    Ok(ArrayD::from_shape_vec(IxDyn(&rest), out)?)
}

/// Embed coefficients of `old` into the larger basis `new` along `axis`
fn refine_axis(input: &ArrayD<c64>, axis: usize, old: &Basis, new: &Basis) -> ArrayD<c64> {
    let n_old = old.len_phys();
    let n_new = new.len_phys();
    match (old.as_fourier(), new.as_fourier()) {
        (Some(fo), Some(fn_)) => {
            let nyquist = fo.nyquist();
            let grows = n_new > n_old;
            let kind = fo.kind;
            let k_old = fo.k.clone();
            let m_new = fn_.m;
            apply_lanes(input, axis, m_new, move |inp, out| {
                for (i, v) in inp.iter().enumerate() {
                    let k = k_old[i];
                    let is_nyq = nyquist == Some(i) && grows;
                    match kind {
                        FourierKind::C2c => {
                            let j = if k >= 0 { k as usize } else { (n_new as i64 + k) as usize };
                            if is_nyq {
                                out[j] += *v * 0.5;
                                out[n_old / 2] += *v * 0.5;
                            } else {
                                out[j] += *v;
                            }
                        }
                        FourierKind::R2c => {
                            out[i] = if is_nyq { *v * 0.5 } else { *v };
                        }
                    }
                }
            })
        }
        _ => {
            let m_new = new.len_spec();
            apply_lanes(input, axis, m_new, |inp, out| {
                for (o, v) in out.iter_mut().zip(inp.iter()) {
                    *o = *v;
                }
            })
        }
    }
}

/// Kind of field in a composite space
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// One scalar component
    Scalar(TensorSpace),
    /// `ndim` components over the same tensor space
    Vector(TensorSpace),
}

impl FieldKind {
    /// Underlying tensor space
    pub fn space(&self) -> &TensorSpace {
        match self {
            FieldKind::Scalar(s) | FieldKind::Vector(s) => s,
        }
    }

    /// Number of components
    pub fn ncomp(&self) -> usize {
        match self {
            FieldKind::Scalar(_) => 1,
            FieldKind::Vector(s) => s.ndim(),
        }
    }
}

/// Ordered list of scalar and vector fields
#[derive(Debug, Clone)]
pub struct CompositeSpace {
    fields: Vec<FieldKind>,
    id: u64,
}

impl CompositeSpace {
    /// Composite of `fields`
    ///
    /// # Errors
    /// Empty list, or fields that differ in physical shape, domains or
    /// Fourier layout
    pub fn new(fields: Vec<FieldKind>) -> Result<Self> {
        let first = match fields.first() {
            Some(f) => f.space().clone(),
            None => {
                return Err(SpectralError::Configuration(
                    "composite space needs at least one field".to_string(),
                ))
            }
        };
        for f in fields.iter().skip(1) {
            let s = f.space();
            let compatible = s.ndim() == first.ndim()
                && s.shape_phys() == first.shape_phys()
                && s.fourier_axes() == first.fourier_axes()
                && s
                    .bases()
                    .iter()
                    .zip(first.bases().iter())
                    .all(|(a, b)| a.domain() == b.domain() && a.family() == b.family());
            if !compatible {
                return Err(SpectralError::Configuration(
                    "fields of a composite space must share grid, domains and Fourier layout"
                        .to_string(),
                ));
            }
        }
        Ok(Self {
            fields,
            id: next_id(),
        })
    }

    /// Single scalar field
    pub fn scalar(space: &TensorSpace) -> Self {
        Self {
            fields: vec![FieldKind::Scalar(space.clone())],
            id: space.id(),
        }
    }

    /// Single vector field
    pub fn vector(space: &TensorSpace) -> Self {
        Self {
            fields: vec![FieldKind::Vector(space.clone())],
            id: space.id() | (1 << 63),
        }
    }

    /// Unique id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Fields
    pub fn fields(&self) -> &[FieldKind] {
        &self.fields
    }

    /// Tensor space of every component
    pub fn components(&self) -> Vec<TensorSpace> {
        self.fields
            .iter()
            .flat_map(|f| vec![f.space().clone(); f.ncomp()])
            .collect()
    }

    /// Total number of components
    pub fn ncomp(&self) -> usize {
        self.fields.iter().map(FieldKind::ncomp).sum()
    }

    /// Index of the first component of `field`
    pub fn offset(&self, field: usize) -> usize {
        self.fields.iter().take(field).map(FieldKind::ncomp).sum()
    }

    /// First component space
    pub fn first(&self) -> &TensorSpace {
        self.fields[0].space()
    }

    /// Test space of every field
    ///
    /// # Errors
    /// Propagates basis construction errors
    pub fn test_space(&self, kind: TestKind) -> Result<Self> {
        if kind == TestKind::Galerkin {
            return Ok(self.clone());
        }
        let fields = self
            .fields
            .iter()
            .map(|f| {
                Ok(match f {
                    FieldKind::Scalar(s) => FieldKind::Scalar(s.test_space(kind)?),
                    FieldKind::Vector(s) => FieldKind::Vector(s.test_space(kind)?),
                })
            })
            .collect::<Result<Vec<FieldKind>>>()?;
        Ok(Self {
            fields,
            id: next_id(),
        })
    }

    /// Composite of the orthogonal parents
    pub fn orthogonal(&self) -> Self {
        let fields = self
            .fields
            .iter()
            .map(|f| match f {
                FieldKind::Scalar(s) => FieldKind::Scalar(s.orthogonal()),
                FieldKind::Vector(s) => FieldKind::Vector(s.orthogonal()),
            })
            .collect();
        Self {
            fields,
            id: next_id(),
        }
    }

    /// Fails if any field was released
    ///
    /// # Errors
    /// `SpaceReleased`
    pub fn check_alive(&self) -> Result<()> {
        self.fields.iter().try_for_each(|f| f.space().check_alive())
    }

    /// Release all fields
    pub fn destroy(&self) {
        for f in self.fields.iter() {
            f.space().destroy();
        }
    }
}

impl From<&TensorSpace> for CompositeSpace {
    fn from(space: &TensorSpace) -> Self {
        Self::scalar(space)
    }
}

impl From<&CompositeSpace> for CompositeSpace {
    fn from(space: &CompositeSpace) -> Self {
        space.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bases::{
        cheb_dirichlet, chebyshev, fourier_c2c, fourier_r2c, leg_dirichlet, BoundaryConditions,
        Dtype, Family, Quadrature,
    };
    use crate::coordinates::Polar;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use std::f64::consts::PI;

    fn approx_eq_complex(result: &ArrayD<c64>, expected: &ArrayD<c64>) {
        let dif = 1e-10;
        for (a, b) in expected.iter().zip(result.iter()) {
            if (a - b).norm() > dif {
                panic!("Large difference of values, got {} expected {}.", b, a)
            }
        }
    }

    fn random_coefficients(shape: &[usize]) -> ArrayD<c64> {
        let re = ArrayD::random(IxDyn(shape), Uniform::new(-1., 1.));
        let im = ArrayD::random(IxDyn(shape), Uniform::new(-1., 1.));
        Zip::from(&re).and(&im).map_collect(|a, b| c64::new(*a, *b))
    }

    #[test]
    fn test_roundtrip_c2c_cheb() {
        let space = TensorSpace::new(vec![fourier_c2c(8).unwrap(), cheb_dirichlet(10).unwrap()])
            .unwrap();
        let c = random_coefficients(&space.shape_spec());
        let v = space.backward(&c).unwrap();
        let back = space.forward(&v).unwrap();
        approx_eq_complex(&back, &c);
    }

    #[test]
    fn test_roundtrip_r2c() {
        let space = TensorSpace::with_axes(
            vec![fourier_r2c(8).unwrap(), leg_dirichlet(9).unwrap()],
            vec![1, 0],
        )
        .unwrap();
        let v = space.local_mesh_broadcast().unwrap();
        let u = Zip::from(&v[0])
            .and(&v[1])
            .map_collect(|x, y| c64::new((3. * x).sin() * (1. - y * y) * y, 0.));
        let uhat = space.forward(&u).unwrap();
        approx_eq_complex(&space.backward(&uhat).unwrap(), &u);
    }

    #[test]
    fn test_r2c_axis_rule() {
        let err = TensorSpace::new(vec![fourier_r2c(8).unwrap(), chebyshev(6).unwrap()]);
        assert!(matches!(err, Err(SpectralError::Configuration(_))));
    }

    #[test]
    fn test_dimension_mismatch() {
        let space = TensorSpace::new(vec![chebyshev(6).unwrap()]).unwrap();
        let wrong = ArrayD::<c64>::zeros(IxDyn(&[5]));
        assert!(matches!(
            space.backward(&wrong),
            Err(SpectralError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_mesh_idempotent() {
        let space = TensorSpace::new(vec![fourier_c2c(6).unwrap(), chebyshev(5).unwrap()]).unwrap();
        assert_eq!(space.local_mesh().unwrap(), space.local_mesh().unwrap());
        let c = random_coefficients(&space.shape_spec());
        let points = array![[0.3, 0.1], [1.2, -0.7]];
        assert_eq!(space.eval(&points, &c).unwrap(), space.eval(&points, &c).unwrap());
    }

    #[test]
    fn test_eval_matches_backward() {
        let space = TensorSpace::new(vec![chebyshev(6).unwrap(), fourier_c2c(6).unwrap()]).unwrap();
        let c = random_coefficients(&space.shape_spec());
        let v = space.backward(&c).unwrap();
        let mesh = space.local_mesh().unwrap();
        let points = array![[mesh[0][2], mesh[1][3]]];
        let e = space.eval(&points, &c).unwrap();
        assert!((e[0] - v[[2, 3]]).norm() < 1e-10);
    }

    #[test]
    fn test_lift_roundtrip() {
        let basis = Basis::new(
            10,
            Family::Legendre,
            BoundaryConditions::dirichlet(1., 2.),
            Dtype::Real,
            Quadrature::GaussLobatto,
        )
        .unwrap();
        let space = TensorSpace::new(vec![basis]).unwrap();
        let x = space.local_mesh().unwrap()[0].clone();
        let u = x.mapv(|x| c64::new(1.5 + 0.5 * x + (1. - x * x) * x.cos(), 0.)).into_dyn();
        let uhat = space.forward(&u).unwrap();
        let back = space.backward(&uhat).unwrap();
        assert!((back[[0]].re - 1.).abs() < 1e-12);
        assert!((back[[9]].re - 2.).abs() < 1e-12);
    }

    #[test]
    fn test_integrate_polar() {
        let space = TensorSpace::with_axes(
            vec![
                fourier_r2c(8).unwrap(),
                leg_dirichlet(8).unwrap().with_domain(0., 1.).unwrap(),
            ],
            vec![1, 0],
        )
        .unwrap()
        .with_coordinates(Polar)
        .unwrap();
        let ones = ArrayD::from_elem(IxDyn(&space.shape_phys()), c64::new(1., 0.));
        // area of the unit disc
        assert!((space.integrate(&ones).unwrap().re - PI).abs() < 1e-12);
    }

    #[test]
    fn test_refine_keeps_function() {
        let space = TensorSpace::new(vec![fourier_c2c(8).unwrap(), cheb_dirichlet(8).unwrap()])
            .unwrap();
        let c = random_coefficients(&space.shape_spec());
        let (fine, cf) = space.refine(&c, &[12, 14]).unwrap();
        assert_eq!(cf.shape(), &[12, 12]);
        // on the coarse grid both agree
        let mesh = space.local_mesh().unwrap();
        let p = array![[mesh[0][3], mesh[1][2]]];
        let a = space.eval(&p, &c).unwrap();
        let b = fine.eval(&p, &cf).unwrap();
        assert!((a[0] - b[0]).norm() < 1e-10);
        // without Nyquist mode they agree everywhere
        let mut c0 = c.clone();
        c0.index_axis_mut(Axis(0), 4).fill(c64::new(0., 0.));
        let (_, cf0) = space.refine(&c0, &[12, 14]).unwrap();
        let points = array![[0.4, 0.3], [2.0, -0.9]];
        let a0 = space.eval(&points, &c0).unwrap();
        let b0 = fine.eval(&points, &cf0).unwrap();
        assert!((a0[0] - b0[0]).norm() < 1e-10);
        assert!((a0[1] - b0[1]).norm() < 1e-10);
    }

    #[test]
    fn test_destroy() {
        let space = TensorSpace::new(vec![chebyshev(6).unwrap()]).unwrap();
        let test = space.test_space(TestKind::PetrovGalerkin).unwrap();
        space.destroy();
        assert!(matches!(space.local_mesh(), Err(SpectralError::SpaceReleased)));
        assert!(matches!(test.check_alive(), Err(SpectralError::SpaceReleased)));
    }

    #[test]
    fn test_contract_last_checks_length() {
        let t = ArrayD::from_shape_fn(IxDyn(&[2, 3]), |idx| {
            c64::new((idx[0] * 3 + idx[1]) as f64, 0.)
        });
        let out = contract_last(&t, &Array1::from_elem(3, c64::new(1., 0.))).unwrap();
        let sums: Vec<f64> = out.iter().map(|v| v.re).collect();
        assert_eq!(sums, vec![3., 12.]);
        assert!(matches!(
            contract_last(&t, &Array1::zeros(2)),
            Err(SpectralError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_destroy_derived_keeps_parent() {
        let space = TensorSpace::new(vec![cheb_dirichlet(8).unwrap()]).unwrap();
        let test = space.test_space(TestKind::PetrovGalerkin).unwrap();
        let (fine, _) = space
            .refine(&ArrayD::zeros(IxDyn(&space.shape_spec())), &[12])
            .unwrap();
        let finer = fine.orthogonal();
        test.destroy();
        fine.destroy();
        assert!(space.check_alive().is_ok());
        assert!(space.local_mesh().is_ok());
        assert!(matches!(test.check_alive(), Err(SpectralError::SpaceReleased)));
        // release reaches every descendant
        assert!(matches!(finer.check_alive(), Err(SpectralError::SpaceReleased)));
    }
}

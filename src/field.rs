//! # Coefficient and physical arrays bound to a space
//!
//! [`Function`] holds expansion coefficients, [`PhysicalArray`] holds
//! values on the quadrature grid. Both keep one array per component of
//! their [`CompositeSpace`].
use crate::error::{Result, SpectralError};
use crate::space::{CompositeSpace, TensorSpace};
use crate::{c64, Real};
use ndarray::prelude::*;

/// Physical values of every component
#[derive(Debug, Clone)]
pub struct PhysicalArray {
    space: CompositeSpace,
    /// Values, one array per component
    pub v: Vec<ArrayD<c64>>,
}

/// Coefficients of every component
#[derive(Debug, Clone)]
pub struct Function {
    space: CompositeSpace,
    /// Coefficients, one array per component
    pub v: Vec<ArrayD<c64>>,
}

/// Space and array of component `i`
fn component_of<'a>(
    space: &CompositeSpace,
    v: &'a [ArrayD<c64>],
    i: usize,
) -> Result<(TensorSpace, &'a ArrayD<c64>)> {
    match (space.components().into_iter().nth(i), v.get(i)) {
        (Some(s), Some(a)) => Ok((s, a)),
        _ => Err(SpectralError::mismatch(&[v.len()], &[i])),
    }
}

fn check_shapes(space: &CompositeSpace, v: &[ArrayD<c64>], phys: bool) -> Result<()> {
    space.check_alive()?;
    let comps = space.components();
    if comps.len() != v.len() {
        return Err(SpectralError::mismatch(&[comps.len()], &[v.len()]));
    }
    for (s, a) in comps.iter().zip(v.iter()) {
        let shape = if phys { s.shape_phys() } else { s.shape_spec() };
        if a.shape() != shape.as_slice() {
            return Err(SpectralError::mismatch(&shape, a.shape()));
        }
    }
    Ok(())
}

impl PhysicalArray {
    /// Zero values on `space`
    pub fn zeros<S: Into<CompositeSpace>>(space: S) -> Self {
        let space = space.into();
        let v = space
            .components()
            .iter()
            .map(|s| ArrayD::zeros(IxDyn(&s.shape_phys())))
            .collect();
        Self { space, v }
    }

    /// Wrap existing values
    ///
    /// # Errors
    /// Shapes do not match the space
    pub fn from_arrays<S: Into<CompositeSpace>>(space: S, v: Vec<ArrayD<c64>>) -> Result<Self> {
        let space = space.into();
        check_shapes(&space, &v, true)?;
        Ok(Self { space, v })
    }

    /// Sample `f` on the grid of a scalar space. `f` receives the
    /// computational coordinates of a grid point.
    ///
    /// ```
    /// use rustgalerkin::bases::fourier_r2c;
    /// use rustgalerkin::field::PhysicalArray;
    /// use rustgalerkin::space::TensorSpace;
    /// use rustgalerkin::c64;
    /// let space = TensorSpace::new(vec![fourier_r2c(8).unwrap()]).unwrap();
    /// let u = PhysicalArray::from_fn(&space, |x| c64::new(x[0].cos(), 0.)).unwrap();
    /// assert_eq!(u.v[0][[0]], c64::new(1., 0.));
    /// ```
    ///
    /// # Errors
    /// Released space
    pub fn from_fn<F>(space: &TensorSpace, f: F) -> Result<Self>
    where
        F: Fn(&[Real]) -> c64,
    {
        let v = sample(space, &f)?;
        Ok(Self {
            space: CompositeSpace::scalar(space),
            v: vec![v],
        })
    }

    /// Sample one closure per component
    ///
    /// # Errors
    /// Wrong number of closures or released space
    pub fn from_fns(space: &CompositeSpace, fs: &[&dyn Fn(&[Real]) -> c64]) -> Result<Self> {
        let comps = space.components();
        if comps.len() != fs.len() {
            return Err(SpectralError::mismatch(&[comps.len()], &[fs.len()]));
        }
        let v = comps
            .iter()
            .zip(fs.iter())
            .map(|(s, f)| sample(s, *f))
            .collect::<Result<Vec<ArrayD<c64>>>>()?;
        Ok(Self {
            space: space.clone(),
            v,
        })
    }

    /// Space of the array
    pub fn space(&self) -> &CompositeSpace {
        &self.space
    }

    /// Values of component `i`
    ///
    /// # Errors
    /// `i` out of range
    pub fn component(&self, i: usize) -> Result<&ArrayD<c64>> {
        component_of(&self.space, &self.v, i).map(|(_, a)| a)
    }

    /// Coefficients by forward transform
    ///
    /// # Errors
    /// Shapes do not match or released space
    pub fn forward(&self) -> Result<Function> {
        check_shapes(&self.space, &self.v, true)?;
        let v = self
            .space
            .components()
            .iter()
            .zip(self.v.iter())
            .map(|(s, a)| s.forward(a))
            .collect::<Result<Vec<ArrayD<c64>>>>()?;
        Ok(Function {
            space: self.space.clone(),
            v,
        })
    }

    /// Scalar product against the basis functions of `test`, which
    /// must have the same grid
    ///
    /// # Errors
    /// Grid of `test` differs or released space
    pub fn scalar_product<S: Into<CompositeSpace>>(&self, test: S) -> Result<Function> {
        let test = test.into();
        check_shapes(&test, &self.v, true)?;
        let v = test
            .components()
            .iter()
            .zip(self.v.iter())
            .map(|(s, a)| s.scalar_product(a))
            .collect::<Result<Vec<ArrayD<c64>>>>()?;
        Ok(Function { space: test, v })
    }

    /// Integral of component `i` over the domain
    ///
    /// # Errors
    /// `i` out of range or released space
    pub fn integrate(&self, i: usize) -> Result<c64> {
        let (space, a) = component_of(&self.space, &self.v, i)?;
        space.integrate(a)
    }

    /// L2 norm of the difference to `other`, per component
    ///
    /// # Errors
    /// Shapes differ or released space
    pub fn l2_error(&self, other: &PhysicalArray) -> Result<Vec<Real>> {
        if self.v.len() != other.v.len() {
            return Err(SpectralError::mismatch(&[self.v.len()], &[other.v.len()]));
        }
        self.space
            .components()
            .iter()
            .zip(self.v.iter().zip(other.v.iter()))
            .map(|(s, (a, b))| s.l2_error(a, b))
            .collect()
    }
}

fn sample(space: &TensorSpace, f: &dyn Fn(&[Real]) -> c64) -> Result<ArrayD<c64>> {
    let mesh = space.local_mesh()?;
    let shape = space.shape_phys();
    let mut q = vec![0.; shape.len()];
    Ok(ArrayD::from_shape_fn(IxDyn(&shape), |idx| {
        for (a, qa) in q.iter_mut().enumerate() {
            *qa = mesh[a][idx[a]];
        }
        f(&q)
    }))
}

impl Function {
    /// Zero coefficients on `space`
    pub fn zeros<S: Into<CompositeSpace>>(space: S) -> Self {
        let space = space.into();
        let v = space
            .components()
            .iter()
            .map(|s| ArrayD::zeros(IxDyn(&s.shape_spec())))
            .collect();
        Self { space, v }
    }

    /// Wrap existing coefficients
    ///
    /// # Errors
    /// Shapes do not match the space
    pub fn from_arrays<S: Into<CompositeSpace>>(space: S, v: Vec<ArrayD<c64>>) -> Result<Self> {
        let space = space.into();
        check_shapes(&space, &v, false)?;
        Ok(Self { space, v })
    }

    /// Space of the coefficients
    pub fn space(&self) -> &CompositeSpace {
        &self.space
    }

    /// Coefficients of component `i`
    ///
    /// # Errors
    /// `i` out of range
    pub fn component(&self, i: usize) -> Result<&ArrayD<c64>> {
        component_of(&self.space, &self.v, i).map(|(_, a)| a)
    }

    /// Physical values by backward transform
    ///
    /// # Errors
    /// Shapes do not match or released space
    pub fn backward(&self) -> Result<PhysicalArray> {
        check_shapes(&self.space, &self.v, false)?;
        let v = self
            .space
            .components()
            .iter()
            .zip(self.v.iter())
            .map(|(s, a)| s.backward(a))
            .collect::<Result<Vec<ArrayD<c64>>>>()?;
        Ok(PhysicalArray {
            space: self.space.clone(),
            v,
        })
    }

    /// Values of component `i` at `points` (shape `(npoints, ndim)`,
    /// computational coordinates)
    ///
    /// # Errors
    /// `i` out of range, shapes do not match or released space
    pub fn eval(&self, i: usize, points: &Array2<Real>) -> Result<Array1<c64>> {
        let (space, a) = component_of(&self.space, &self.v, i)?;
        space.eval(points, a)
    }

    /// Values of every component on a uniform grid of `sizes`
    ///
    /// # Errors
    /// Shapes do not match or released space
    pub fn backward_uniform(&self, sizes: &[usize]) -> Result<Vec<ArrayD<c64>>> {
        self.space
            .components()
            .iter()
            .zip(self.v.iter())
            .map(|(s, a)| s.backward_uniform(a, sizes))
            .collect()
    }

    /// Embed a scalar function into a space with `sizes` points per axis
    ///
    /// # Errors
    /// Not a scalar function, smaller sizes, or released space
    pub fn refine(&self, sizes: &[usize]) -> Result<Function> {
        let space = self.scalar_space()?;
        let (fine, v) = space.refine(&self.v[0], sizes)?;
        Ok(Function {
            space: CompositeSpace::scalar(&fine),
            v: vec![v],
        })
    }

    /// Scalar function in the orthogonal space of its parent basis
    ///
    /// # Errors
    /// Not a scalar function or released space
    pub fn to_orthogonal(&self) -> Result<Function> {
        let space = self.scalar_space()?;
        let v = space.to_orthogonal(&self.v[0])?;
        Ok(Function {
            space: CompositeSpace::scalar(&space.orthogonal()),
            v: vec![v],
        })
    }

    /// Spectral derivative of a scalar function, in the orthogonal space
    ///
    /// # Errors
    /// Not a scalar function or released space
    pub fn dx(&self, axis: usize, order: usize) -> Result<Function> {
        let space = self.scalar_space()?;
        if axis >= space.ndim() {
            return Err(SpectralError::mismatch(&[space.ndim()], &[axis]));
        }
        let v = space.differentiate(&self.v[0], axis, order)?;
        Ok(Function {
            space: CompositeSpace::scalar(&space.orthogonal()),
            v: vec![v],
        })
    }

    /// Contravariant components `g^ii du/dq_i` of the gradient of a scalar
    /// function, as physical values on the orthogonal space
    ///
    /// # Errors
    /// Not a scalar function or released space
    pub fn gradient(&self) -> Result<PhysicalArray> {
        let space = self.scalar_space()?;
        let ortho = space.orthogonal();
        let ginv = space.contravariant_metric()?;
        let mut v = vec![];
        for (axis, g) in ginv.iter().enumerate() {
            let du = self.dx(axis, 1)?;
            let mut phys = ortho.backward(&du.v[0])?;
            phys.zip_mut_with(g, |a, b| *a *= *b);
            v.push(phys);
        }
        Ok(PhysicalArray {
            space: CompositeSpace::vector(&ortho),
            v,
        })
    }

    fn scalar_space(&self) -> Result<TensorSpace> {
        if self.space.ncomp() != 1 {
            return Err(SpectralError::Configuration(format!(
                "operation needs a scalar function, got {} components",
                self.space.ncomp()
            )));
        }
        self.space.check_alive()?;
        Ok(self.space.first().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bases::{cheb_dirichlet, chebyshev, fourier_r2c, legendre};
    use crate::space::FieldKind;

    #[test]
    fn test_dx_chebyshev() {
        let space = TensorSpace::new(vec![cheb_dirichlet(10).unwrap().with_domain(0., 2.).unwrap()])
            .unwrap();
        // u = x (2 - x), du/dx = 2 - 2 x
        let u = PhysicalArray::from_fn(&space, |q| c64::new(q[0] * (2. - q[0]), 0.)).unwrap();
        let du = u.forward().unwrap().dx(0, 1).unwrap();
        let points = array![[0.25], [1.5]];
        let v = du.eval(0, &points).unwrap();
        assert!((v[0].re - 1.5).abs() < 1e-12);
        assert!((v[1].re + 1.).abs() < 1e-12);
    }

    #[test]
    fn test_component_out_of_range() {
        let space = TensorSpace::new(vec![legendre(6).unwrap()]).unwrap();
        let u = PhysicalArray::from_fn(&space, |q| c64::new(q[0] * q[0], 0.)).unwrap();
        assert!((u.integrate(0).unwrap().re - 2. / 3.).abs() < 1e-12);
        assert!(matches!(
            u.integrate(1),
            Err(SpectralError::DimensionMismatch { .. })
        ));
        assert!(u.component(1).is_err());
        let u_hat = u.forward().unwrap();
        assert_eq!(u_hat.component(0).unwrap().shape(), &[6]);
        assert!(matches!(
            u_hat.eval(2, &array![[0.5]]),
            Err(SpectralError::DimensionMismatch { .. })
        ));
        assert!(u_hat.component(1).is_err());
    }

    #[test]
    fn test_composite_shapes() {
        let fo = fourier_r2c(8).unwrap();
        let tt = TensorSpace::with_axes(vec![fo.clone(), chebyshev(6).unwrap()], vec![1, 0])
            .unwrap();
        let td = TensorSpace::with_axes(vec![fo, cheb_dirichlet(6).unwrap()], vec![1, 0])
            .unwrap();
        let q = CompositeSpace::new(vec![FieldKind::Vector(tt), FieldKind::Scalar(td)]).unwrap();
        assert_eq!(q.ncomp(), 3);
        let f = Function::zeros(&q);
        assert_eq!(f.v[2].shape(), &[5, 4]);
        assert_eq!(f.v[0].shape(), &[5, 6]);
        let wrong = PhysicalArray::from_arrays(&q, vec![ArrayD::zeros(IxDyn(&[8, 6]))]);
        assert!(matches!(wrong, Err(SpectralError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_backward_uniform() {
        let space = TensorSpace::new(vec![fourier_r2c(8).unwrap()]).unwrap();
        let u = PhysicalArray::from_fn(&space, |q| c64::new((2. * q[0]).sin(), 0.)).unwrap();
        let uu = u.forward().unwrap().backward_uniform(&[16]).unwrap();
        let x = space.uniform_mesh(&[16])[0].clone();
        for (v, x) in uu[0].iter().zip(x.iter()) {
            assert!((v.re - (2. * x).sin()).abs() < 1e-12);
        }
    }
}

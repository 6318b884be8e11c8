//! # Bases
//! Collection of various basis functions which implement forward/backward transforms,
//! differentiation and other methods to conveniently work in different spaces.
//!
//! Implemented:
//! - Fourier (c2c and r2c)
//! - Chebyshev (first and second kind), Legendre (orthogonal)
//! - Composite Chebyshev/Legendre with Dirichlet, Neumann, biharmonic
//!   or mixed boundary constraints
//!
//! All transforms act on one axis of an n-dimensional complex array,
//! lane by lane.
pub mod composite;
pub mod fourier;
pub mod orthogonal;
pub mod quadrature;
use crate::error::{Result, SpectralError};
use crate::{c64, Real};
pub use composite::{BcKind, BoundaryCondition, BoundaryConditions, Composite, CompositeKind, Side};
use enum_dispatch::enum_dispatch;
pub use fourier::{Fourier, FourierKind};
use ndarray::prelude::*;
use ndarray::Zip;
pub use orthogonal::Orthogonal;
use std::collections::hash_map::DefaultHasher;
use std::f64::consts::PI;
use std::hash::{Hash, Hasher};

/// Family of basis functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Periodic exponentials
    Fourier,
    /// Chebyshev polynomials of the first kind
    Chebyshev,
    /// Chebyshev polynomials of the second kind
    ChebyshevU,
    /// Legendre polynomials
    Legendre,
}

/// Quadrature rule of polynomial bases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrature {
    /// Interior nodes only
    Gauss,
    /// Includes both endpoints
    GaussLobatto,
}

/// Data type of the physical values of a Fourier basis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dtype {
    /// Real data, r2c transform
    Real,
    /// Complex data, c2c transform
    Complex,
}

/// Choice of test functions for a trial basis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestKind {
    /// Test space equals trial space
    Galerkin,
    /// Truncated orthogonal parent as test space
    PetrovGalerkin,
}

/// Sizes and grid of a basis
#[enum_dispatch]
pub trait BaseSize {
    /// Number of physical grid points
    fn len_phys(&self) -> usize;
    /// Number of spectral coefficients
    fn len_spec(&self) -> usize;
    /// Physical grid points
    fn coords(&self) -> &Array1<Real>;
    /// Physical domain
    fn domain(&self) -> (Real, Real);
    /// Family
    fn family(&self) -> Family;
}

/// Defines transform from physical to spectral space and vice versa
#[enum_dispatch]
pub trait Transform {
    /// Physical values of one lane --> coefficients
    fn forward_lane(&self, input: &ArrayView1<c64>, output: &mut ArrayViewMut1<c64>);
    /// Coefficients of one lane --> physical values
    fn backward_lane(&self, input: &ArrayView1<c64>, output: &mut ArrayViewMut1<c64>);
    /// Quadrature of physical values against every basis function
    fn scalar_product_lane(&self, input: &ArrayView1<c64>, output: &mut ArrayViewMut1<c64>);
    /// Values of all basis functions at physical point `x`
    fn evaluate(&self, x: Real) -> Array1<c64>;
    /// Quadrature weights of `dx` at the grid points
    fn integration_weights(&self) -> Array1<Real>;
}

/// Defines differentiation in spectral space
#[enum_dispatch]
pub trait Differentiate {
    /// Length of the derivative's coefficient vector
    fn len_deriv(&self) -> usize;
    /// Differentiate lane `order` times
    fn differentiate_lane(
        &self,
        input: &ArrayView1<c64>,
        output: &mut ArrayViewMut1<c64>,
        order: usize,
    );
}

/// Enum of all implemented basis functions.
///
/// All bases implement the size, transform and differentiation
/// traits, which are derived for this enum.
#[enum_dispatch(BaseSize, Transform, Differentiate)]
#[derive(Debug, Clone)]
pub enum Basis {
    /// Periodic Fourier basis
    Fourier(Fourier),
    /// Orthogonal Chebyshev or Legendre basis
    Orthogonal(Orthogonal),
    /// Composite basis satisfying boundary constraints
    Composite(Composite),
}

/// Function space: chebyshev polynomials
///
/// ```
/// use rustgalerkin::bases::{chebyshev, BaseSize};
/// let cheby = chebyshev(10).unwrap();
/// assert_eq!(cheby.len_spec(), 10);
/// ```
///
/// # Errors
/// Invalid size
pub fn chebyshev(n: usize) -> Result<Basis> {
    Basis::new(n, Family::Chebyshev, BoundaryConditions::none(), Dtype::Real, Quadrature::Gauss)
}

/// Function space with homogeneous Dirichlet boundary conditions
/// ```
/// use rustgalerkin::bases::{cheb_dirichlet, BaseSize};
/// let cd = cheb_dirichlet(10).unwrap();
/// assert_eq!(cd.len_spec(), 8);
/// ```
///
/// # Errors
/// Invalid size
pub fn cheb_dirichlet(n: usize) -> Result<Basis> {
    Basis::new(
        n,
        Family::Chebyshev,
        BoundaryConditions::dirichlet(0., 0.),
        Dtype::Real,
        Quadrature::Gauss,
    )
}

/// Function space with homogeneous Neumann boundary conditions
///
/// # Errors
/// Invalid size
pub fn cheb_neumann(n: usize) -> Result<Basis> {
    Basis::new(
        n,
        Family::Chebyshev,
        BoundaryConditions::neumann(0., 0.),
        Dtype::Real,
        Quadrature::Gauss,
    )
}

/// Function space with `u = u' = 0` on both sides
///
/// # Errors
/// Invalid size
pub fn cheb_biharmonic(n: usize) -> Result<Basis> {
    Basis::new(
        n,
        Family::Chebyshev,
        BoundaryConditions::biharmonic(),
        Dtype::Real,
        Quadrature::Gauss,
    )
}

/// Function space: legendre polynomials
///
/// # Errors
/// Invalid size
pub fn legendre(n: usize) -> Result<Basis> {
    Basis::new(n, Family::Legendre, BoundaryConditions::none(), Dtype::Real, Quadrature::Gauss)
}

/// Legendre space with homogeneous Dirichlet boundary conditions
///
/// # Errors
/// Invalid size
pub fn leg_dirichlet(n: usize) -> Result<Basis> {
    Basis::new(
        n,
        Family::Legendre,
        BoundaryConditions::dirichlet(0., 0.),
        Dtype::Real,
        Quadrature::Gauss,
    )
}

/// Legendre space with homogeneous Neumann boundary conditions
///
/// # Errors
/// Invalid size
pub fn leg_neumann(n: usize) -> Result<Basis> {
    Basis::new(
        n,
        Family::Legendre,
        BoundaryConditions::neumann(0., 0.),
        Dtype::Real,
        Quadrature::Gauss,
    )
}

/// Legendre space with `u = u' = 0` on both sides
///
/// # Errors
/// Invalid size
pub fn leg_biharmonic(n: usize) -> Result<Basis> {
    Basis::new(
        n,
        Family::Legendre,
        BoundaryConditions::biharmonic(),
        Dtype::Real,
        Quadrature::Gauss,
    )
}

/// Complex Fourier space on `(0, 2 pi)`
///
/// # Errors
/// Invalid size
pub fn fourier_c2c(n: usize) -> Result<Basis> {
    Basis::new(n, Family::Fourier, BoundaryConditions::none(), Dtype::Complex, Quadrature::Gauss)
}

/// Real Fourier space on `(0, 2 pi)`
///
/// # Errors
/// Invalid size
pub fn fourier_r2c(n: usize) -> Result<Basis> {
    Basis::new(n, Family::Fourier, BoundaryConditions::none(), Dtype::Real, Quadrature::Gauss)
}

impl Basis {
    /// Generic constructor on the reference domain of the family,
    /// `(0, 2 pi)` for Fourier and `(-1, 1)` for polynomials.
    ///
    /// # Errors
    /// Invalid size, boundary constraints on a Fourier basis or
    /// constraints that cannot be satisfied
    pub fn new(
        n: usize,
        family: Family,
        bcs: BoundaryConditions,
        dtype: Dtype,
        quad: Quadrature,
    ) -> Result<Self> {
        match family {
            Family::Fourier => {
                if !bcs.is_empty() {
                    return Err(SpectralError::Configuration(
                        "Fourier bases are periodic and take no boundary conditions".to_string(),
                    ));
                }
                let kind = match dtype {
                    Dtype::Real => FourierKind::R2c,
                    Dtype::Complex => FourierKind::C2c,
                };
                Ok(Basis::Fourier(Fourier::new(n, kind, (0., 2. * PI))?))
            }
            _ => {
                let parent = Orthogonal::new(family, n, quad, (-1., 1.))?;
                if bcs.is_empty() {
                    Ok(Basis::Orthogonal(parent))
                } else {
                    Ok(Basis::Composite(Composite::new(parent, bcs)?))
                }
            }
        }
    }

    /// Same basis on the physical interval `(a, b)`
    ///
    /// # Errors
    /// Degenerate interval
    pub fn with_domain(&self, a: Real, b: Real) -> Result<Self> {
        match self {
            Basis::Fourier(fo) => Ok(Basis::Fourier(Fourier::new(fo.n, fo.kind, (a, b))?)),
            Basis::Orthogonal(p) => Ok(Basis::Orthogonal(Orthogonal::new(
                p.family,
                p.n,
                p.quad,
                (a, b),
            )?)),
            Basis::Composite(c) => {
                let parent = Orthogonal::new(c.parent.family, c.parent.n, c.parent.quad, (a, b))?;
                Ok(Basis::Composite(match c.kind {
                    CompositeKind::Constrained => Composite::new(parent, c.bcs.clone())?,
                    CompositeKind::Truncated => Composite::truncated(parent, c.m)?,
                }))
            }
        }
    }

    /// Same basis with `n` physical points. Used to refine spaces.
    ///
    /// # Errors
    /// Size too small for the boundary constraints
    pub fn resized(&self, n: usize) -> Result<Self> {
        match self {
            Basis::Fourier(fo) => Ok(Basis::Fourier(Fourier::new(n, fo.kind, fo.domain)?)),
            Basis::Orthogonal(p) => Ok(Basis::Orthogonal(Orthogonal::new(
                p.family, n, p.quad, p.domain,
            )?)),
            Basis::Composite(c) => {
                let parent = Orthogonal::new(c.parent.family, n, c.parent.quad, c.parent.domain)?;
                Ok(Basis::Composite(match c.kind {
                    CompositeKind::Constrained => Composite::new(parent, c.bcs.clone())?,
                    CompositeKind::Truncated => {
                        Composite::truncated(parent, n.saturating_sub(c.parent.n - c.m))?
                    }
                }))
            }
        }
    }

    /// Test basis of the given kind. Fourier and orthogonal
    /// bases are their own test bases.
    ///
    /// # Errors
    /// Propagates construction errors
    pub fn test_basis(&self, kind: TestKind) -> Result<Self> {
        match (self, kind) {
            (Basis::Composite(c), TestKind::PetrovGalerkin) => Ok(Basis::Composite(
                Composite::truncated(c.parent.clone(), c.m)?,
            )),
            _ => Ok(self.clone()),
        }
    }

    /// Orthogonal parent basis (identity for Fourier and orthogonal bases)
    pub fn orthogonal(&self) -> Self {
        match self {
            Basis::Composite(c) => Basis::Orthogonal(c.parent.clone()),
            _ => self.clone(),
        }
    }

    /// Orthogonal polynomial parent, `None` for Fourier bases
    pub fn parent(&self) -> Option<&Orthogonal> {
        match self {
            Basis::Fourier(_) => None,
            Basis::Orthogonal(p) => Some(p),
            Basis::Composite(c) => Some(&c.parent),
        }
    }

    /// Fourier basis, if periodic
    pub fn as_fourier(&self) -> Option<&Fourier> {
        match self {
            Basis::Fourier(fo) => Some(fo),
            _ => None,
        }
    }

    /// Periodic basis
    pub fn is_periodic(&self) -> bool {
        matches!(self, Basis::Fourier(_))
    }

    /// Real-to-complex Fourier basis
    pub fn is_r2c(&self) -> bool {
        matches!(self, Basis::Fourier(fo) if fo.kind == FourierKind::R2c)
    }

    /// Stencil matrix from basis to its orthogonal parent
    pub fn stencil(&self) -> Array2<Real> {
        match self {
            Basis::Composite(c) => c.stencil.clone(),
            _ => Array2::eye(self.len_spec()),
        }
    }

    /// Boundary conditions (empty for unconstrained bases)
    pub fn bcs(&self) -> BoundaryConditions {
        match self {
            Basis::Composite(c) => c.bcs.clone(),
            _ => BoundaryConditions::none(),
        }
    }

    /// Carries nonzero boundary values
    pub fn has_lift(&self) -> bool {
        matches!(self, Basis::Composite(c) if c.lift.is_some())
    }

    /// Lift values at the grid points (zero if homogeneous)
    pub fn lift_values(&self) -> Array1<Real> {
        match self {
            Basis::Composite(c) => match c.lift_values() {
                Some(v) => v.clone(),
                None => Array1::zeros(c.len_phys()),
            },
            _ => Array1::zeros(self.len_phys()),
        }
    }

    /// Lift at physical point `x`
    pub fn lift_at(&self, x: Real) -> Real {
        match self {
            Basis::Composite(c) => c.lift_at(x),
            _ => 0.,
        }
    }

    /// Lift in parent coefficients (zero if homogeneous)
    pub fn lift_coefficients(&self) -> Array1<Real> {
        match self {
            Basis::Composite(c) => match &c.lift {
                Some(l) => l.clone(),
                None => Array1::zeros(c.parent.n),
            },
            _ => Array1::zeros(self.len_spec()),
        }
    }

    /// Structural hash, equal for bases whose matrices coincide
    pub fn signature(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.family().hash(&mut hasher);
        self.len_phys().hash(&mut hasher);
        self.len_spec().hash(&mut hasher);
        self.domain().0.to_bits().hash(&mut hasher);
        self.domain().1.to_bits().hash(&mut hasher);
        match self {
            Basis::Fourier(fo) => fo.kind.hash(&mut hasher),
            Basis::Orthogonal(p) => p.quad.hash(&mut hasher),
            Basis::Composite(c) => {
                c.parent.quad.hash(&mut hasher);
                c.signature().hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    /// Forward transform along `axis`
    pub fn forward(&self, input: &ArrayD<c64>, axis: usize) -> ArrayD<c64> {
        apply_lanes(input, axis, self.len_spec(), |inp, out| {
            self.forward_lane(inp, out)
        })
    }

    /// Backward transform along `axis`
    pub fn backward(&self, input: &ArrayD<c64>, axis: usize) -> ArrayD<c64> {
        apply_lanes(input, axis, self.len_phys(), |inp, out| {
            self.backward_lane(inp, out)
        })
    }

    /// Scalar product along `axis`
    pub fn scalar_product(&self, input: &ArrayD<c64>, axis: usize) -> ArrayD<c64> {
        apply_lanes(input, axis, self.len_spec(), |inp, out| {
            self.scalar_product_lane(inp, out)
        })
    }

    /// Differentiate along `axis`. Composite coefficients are
    /// returned in parent space.
    pub fn differentiate(&self, input: &ArrayD<c64>, order: usize, axis: usize) -> ArrayD<c64> {
        apply_lanes(input, axis, self.len_deriv(), |inp, out| {
            self.differentiate_lane(inp, out, order)
        })
    }

    /// Composite coefficients --> parent coefficients along `axis`
    pub fn to_orthogonal(&self, input: &ArrayD<c64>, axis: usize) -> ArrayD<c64> {
        match self {
            Basis::Composite(c) => {
                let st = c.stencil.t().to_owned();
                apply_lanes(input, axis, c.parent.n, |inp, out| {
                    orthogonal::matvec_lane(&st, inp, out)
                })
            }
            _ => input.clone(),
        }
    }
}

/// Apply a lane operation along `axis`, the output lanes have length `len`.
pub(crate) fn apply_lanes<F>(input: &ArrayD<c64>, axis: usize, len: usize, f: F) -> ArrayD<c64>
where
    F: Fn(&ArrayView1<c64>, &mut ArrayViewMut1<c64>) + Sync + Send,
{
    let mut shape = input.shape().to_vec();
    shape[axis] = len;
    let mut output = ArrayD::<c64>::zeros(shape);
    Zip::from(output.lanes_mut(Axis(axis)))
        .and(input.lanes(Axis(axis)))
        .par_for_each(|mut out, inp| f(&inp, &mut out));
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(fourier_r2c(10).unwrap().len_spec(), 6);
        assert_eq!(fourier_c2c(10).unwrap().len_spec(), 10);
        assert_eq!(cheb_biharmonic(10).unwrap().len_spec(), 6);
        assert_eq!(leg_neumann(10).unwrap().len_spec(), 8);
    }

    #[test]
    fn test_fourier_rejects_bcs() {
        let err = Basis::new(
            8,
            Family::Fourier,
            BoundaryConditions::dirichlet(0., 0.),
            Dtype::Real,
            Quadrature::Gauss,
        );
        assert!(matches!(err, Err(SpectralError::Configuration(_))));
    }

    #[test]
    fn test_petrov_galerkin_basis() {
        let trial = cheb_dirichlet(12).unwrap();
        let test = trial.test_basis(TestKind::PetrovGalerkin).unwrap();
        assert_eq!(test.len_spec(), trial.len_spec());
        assert_eq!(test.len_phys(), 12);
        assert_ne!(test.signature(), trial.signature());
        let test = trial.test_basis(TestKind::Galerkin).unwrap();
        assert_eq!(test.signature(), trial.signature());
    }

    #[test]
    fn test_with_domain() {
        let b = leg_dirichlet(8).unwrap().with_domain(0., 2.).unwrap();
        assert_eq!(b.domain(), (0., 2.));
        assert!(b.coords().iter().all(|x| *x > 0. && *x < 2.));
        assert!(chebyshev(8).unwrap().with_domain(1., 1.).is_err());
    }

    #[test]
    fn test_forward_along_axis() {
        let b = chebyshev(6).unwrap();
        let x = b.coords().clone();
        let mut v = ArrayD::<c64>::zeros(vec![3, 6]);
        for mut lane in v.lanes_mut(Axis(1)) {
            for (vi, xi) in lane.iter_mut().zip(x.iter()) {
                *vi = c64::new(2. * xi * xi - 1., 0.);
            }
        }
        let vhat = b.forward(&v, 1);
        for lane in vhat.lanes(Axis(1)) {
            assert!((lane[2].re - 1.).abs() < 1e-12);
            assert!(lane[0].norm() < 1e-12);
        }
    }
}

//! Separate solve of the mean (zero wavenumber) mode along one periodic
//! axis.
//!
//! In polar coordinates the mean mode needs other boundary conditions at
//! the origin than every other mode. It is solved on a reduced space with
//! a single Fourier coefficient on the periodic axis and added back to the
//! solution on the full grid.
use super::{Constraint, ModeSolver};
use crate::error::{Result, SpectralError};
use crate::field::{Function, PhysicalArray};
use crate::form::BilinearForm;
use crate::space::TensorSpace;
use crate::c64;
use ndarray::prelude::*;

/// Solver of the mean mode on a reduced space
#[derive(Debug)]
pub struct MeanModeSolver {
    solver: ModeSolver,
    space: TensorSpace,
    axis: usize,
}

impl MeanModeSolver {
    /// `form` lives on the reduced space, whose basis along `axis` is a
    /// Fourier basis with a single point.
    ///
    /// # Errors
    /// `axis` of the reduced space is not periodic with one point, or
    /// the form cannot be factorized
    pub fn new(form: &BilinearForm, axis: usize) -> Result<Self> {
        Self::with_constraints(form, axis, &[])
    }

    /// Same as [`MeanModeSolver::new`] with pinned coefficients
    ///
    /// # Errors
    /// See [`MeanModeSolver::new`]
    pub fn with_constraints(
        form: &BilinearForm,
        axis: usize,
        constraints: &[Constraint],
    ) -> Result<Self> {
        let space = form.test_space().first().clone();
        if axis >= space.ndim() {
            return Err(SpectralError::Configuration(format!(
                "axis {} of a {}-dimensional space",
                axis,
                space.ndim()
            )));
        }
        let basis = space.basis(axis);
        if !basis.is_periodic() || space.shape_phys()[axis] != 1 {
            return Err(SpectralError::Configuration(format!(
                "mean mode space needs a single periodic point along axis {}",
                axis
            )));
        }
        let solver = ModeSolver::new(form, constraints)?;
        Ok(Self {
            solver,
            space,
            axis,
        })
    }

    /// Reduced space
    pub fn space(&self) -> &TensorSpace {
        &self.space
    }

    /// Solve with `forcing`, given on the full grid. The forcing is
    /// averaged along the periodic axis and projected on the reduced
    /// space.
    ///
    /// # Errors
    /// Grid of `forcing` does not match the reduced space on the other
    /// axes, or the system is singular
    pub fn solve(&self, forcing: &ArrayD<c64>) -> Result<Function> {
        let mut expected = self.space.shape_phys();
        expected[self.axis] = forcing.shape().get(self.axis).copied().unwrap_or(0);
        if forcing.shape() != expected.as_slice() || expected[self.axis] == 0 {
            return Err(SpectralError::mismatch(&expected, forcing.shape()));
        }
        let mean = forcing
            .mean_axis(Axis(self.axis))
            .ok_or_else(|| SpectralError::mismatch(&expected, forcing.shape()))?
            .insert_axis(Axis(self.axis));
        let f0 = PhysicalArray::from_arrays(&self.space, vec![mean])?;
        let rhs = f0.scalar_product(self.solver.matrices().test_space())?;
        let mut u0 = Function::zeros(self.solver.matrices().trial_space());
        self.solver.solve(&rhs, &mut u0)?;
        tracing::debug!("solved mean mode along axis {}", self.axis);
        Ok(u0)
    }

    /// Physical values of `u0` repeated along the periodic axis of
    /// `target`
    ///
    /// # Errors
    /// Grids differ on the other axes
    pub fn broadcast(&self, u0: &Function, target: &TensorSpace) -> Result<ArrayD<c64>> {
        let values = u0.backward()?;
        let shape = target.shape_phys();
        let v = &values.v[0];
        v.broadcast(IxDyn(&shape))
            .map(|b| b.to_owned())
            .ok_or_else(|| SpectralError::mismatch(&shape, v.shape()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bases::{cheb_dirichlet, fourier_r2c};
    use crate::form::{div, grad, inner, TestFunction, TrialFunction};

    #[test]
    fn test_mean_of_forcing() {
        // -u'' = 2 on (-1, 1) with u(-1) = u(1) = 0 gives u = 1 - y^2
        let space = TensorSpace::with_axes(
            vec![fourier_r2c(1).unwrap(), cheb_dirichlet(12).unwrap()],
            vec![1, 0],
        )
        .unwrap();
        let u = TrialFunction::new(&space).scalar(0).unwrap();
        let v = TestFunction::new(&space).scalar(0).unwrap();
        let form = inner(&v, &-div(&grad(&u)));
        let solver = MeanModeSolver::new(&form, 0).unwrap();

        let full = TensorSpace::with_axes(
            vec![fourier_r2c(16).unwrap(), cheb_dirichlet(12).unwrap()],
            vec![1, 0],
        )
        .unwrap();
        // the oscillating part averages out
        let f = PhysicalArray::from_fn(&full, |x| c64::new(2. + (3. * x[0]).cos(), 0.)).unwrap();
        let u0 = solver.solve(&f.v[0]).unwrap();
        let values = solver.broadcast(&u0, &full).unwrap();
        let exact = PhysicalArray::from_fn(&full, |x| c64::new(1. - x[1] * x[1], 0.)).unwrap();
        for (a, b) in values.iter().zip(exact.v[0].iter()) {
            if (a - b).norm() > 1e-10 {
                panic!("Large difference of values, got {} expected {}.", a, b)
            }
        }
    }

    #[test]
    fn test_requires_single_point() {
        let space = TensorSpace::new(vec![fourier_r2c(4).unwrap(), cheb_dirichlet(6).unwrap()]);
        assert!(space.is_err());
        let space = TensorSpace::with_axes(
            vec![fourier_r2c(4).unwrap(), cheb_dirichlet(6).unwrap()],
            vec![1, 0],
        )
        .unwrap();
        let u = TrialFunction::new(&space).scalar(0).unwrap();
        let v = TestFunction::new(&space).scalar(0).unwrap();
        assert!(MeanModeSolver::new(&inner(&v, &u), 0).is_err());
    }
}

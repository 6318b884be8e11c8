#![warn(missing_docs)]
//! # rustgalerkin: Spectral-Galerkin methods on tensor product spaces
//!
//! Solve linear partial differential equations with Fourier, Chebyshev
//! and Legendre bases. Weak forms are written in terms of trial and test
//! functions, assembled per Fourier wavenumber, and solved mode by mode.
//!
//! Supported bases:
//! - Fourier (complex and real transforms)
//! - Chebyshev and Legendre (orthogonal)
//! - Composite Chebyshev and Legendre with Dirichlet, Neumann and
//!   biharmonic boundary conditions
//!
//! Composite bases combine several basis functions of their parent space
//! to satisfy the boundary conditions, this is often called a Galerkin
//! method. Spaces may carry polar or spherical coordinates.
//!
//! ```
//! use rustgalerkin::bases::fourier_r2c;
//! use rustgalerkin::field::{Function, PhysicalArray};
//! use rustgalerkin::form::{div, grad, inner, TestFunction, TrialFunction};
//! use rustgalerkin::solver::{Constraint, ModeSolver};
//! use rustgalerkin::space::TensorSpace;
//! use rustgalerkin::c64;
//!
//! let space = TensorSpace::new(vec![fourier_r2c(16).unwrap()]).unwrap();
//! let u = TrialFunction::new(&space).scalar(0).unwrap();
//! let v = TestFunction::new(&space).scalar(0).unwrap();
//! let form = inner(&v, &div(&grad(&u)));
//! // u'' = -16 cos(4x)
//! let f = PhysicalArray::from_fn(&space, |x| c64::new(-16. * (4. * x[0]).cos(), 0.)).unwrap();
//! let f_hat = f.scalar_product(&space).unwrap();
//! let pin = Constraint::new(0, 0, c64::new(0., 0.));
//! let solver = ModeSolver::new(&form, &[pin]).unwrap();
//! let mut u_hat = Function::zeros(&space);
//! solver.solve(&f_hat, &mut u_hat).unwrap();
//! assert!((u_hat.v[0][[4]].re - 0.5).abs() < 1e-12);
//! ```
pub mod bases;
pub mod coefficient;
pub mod coordinates;
pub mod error;
pub mod field;
pub mod form;
pub mod problems;
pub mod solver;
pub mod space;
pub use bases::{BaseSize, Basis, Differentiate, Transform};
pub use error::{Result, SpectralError};
pub use field::{Function, PhysicalArray};
pub use space::{CompositeSpace, FieldKind, TensorSpace};

/// Real type
pub type Real = f64;

/// Complex type
#[allow(non_camel_case_types)]
pub type c64 = num_complex::Complex<f64>;

//! # Demo problems with manufactured solutions
//!
//! Every problem builds its spaces and forms, solves, and reports the
//! error against the exact solution. Parameters default to the values
//! the problems are known to converge with.
//!
//! ```no_run
//! use rustgalerkin::problems::FourierPoisson;
//! let summary = FourierPoisson::default().solve().unwrap();
//! assert!(summary.l2_error < 1e-6);
//! ```
pub mod fourier_poisson;
pub mod mixed_poisson;
pub mod orr_sommerfeld;
pub mod sphere;
pub mod unit_disc;
pub use fourier_poisson::{FourierPoisson, PoissonSummary};
pub use mixed_poisson::{MixedPoisson, MixedPoissonErrors};
pub use orr_sommerfeld::OrrSommerfeld;
pub use sphere::SphereHelmholtz;
pub use unit_disc::{UnitDiscErrors, UnitDiscHelmholtz};

//! # Curvilinear coordinates
//!
//! Orthogonal coordinate maps from computational coordinates `q` (one per
//! axis of a space, in the order of its bases) to Cartesian positions.
//!
//! Every metric quantity the weak forms need is a product of one factor
//! per axis. Implementations return these factors in closed form, so that
//! assembly can stay separated axis by axis.
use crate::coefficient::Coefficient;
use crate::error::{Result, SpectralError};
use crate::Real;
use ndarray::prelude::*;
use std::fmt::Debug;

/// Separable product, one coefficient per axis
pub type Separable = Vec<Coefficient>;

/// Orthogonal coordinate map
pub trait CoordinateMap: Debug + Send + Sync {
    /// Number of computational coordinates
    fn ndim(&self) -> usize;

    /// Name used in cache keys and logs
    fn name(&self) -> String;

    /// Cartesian position of computational point `q`
    fn position(&self, q: &[Real]) -> Vec<Real>;

    /// Covariant basis vectors `b_i = dr/dq_i` as rows
    fn covariant_basis(&self, q: &[Real]) -> Array2<Real>;

    /// Factors of `sqrt(g)`
    fn sqrt_det(&self) -> Separable;

    /// Factors of `d sqrt(g) / dq_i`
    fn sqrt_det_derivative(&self, i: usize) -> Separable;

    /// Factors of the covariant metric `g_ii`
    fn covariant(&self, i: usize) -> Separable;

    /// Factors of the contravariant metric `g^ii`
    fn contravariant(&self, i: usize) -> Separable;

    /// Factors of `sqrt(g) g^ii`
    fn stiffness(&self, i: usize) -> Separable;

    /// Factors of `d (sqrt(g) g^ii) / dq_i`
    fn stiffness_derivative(&self, i: usize) -> Separable;

    /// Covariant metric tensor `g_ij = b_i . b_j` at `q`
    fn covariant_metric(&self, q: &[Real]) -> Array2<Real> {
        let b = self.covariant_basis(q);
        b.dot(&b.t())
    }

    /// Contravariant metric tensor at `q`
    fn contravariant_metric(&self, q: &[Real]) -> Array2<Real> {
        let g = self.covariant_metric(q);
        let mut inv = Array2::zeros(g.raw_dim());
        for i in 0..g.nrows() {
            inv[[i, i]] = 1. / g[[i, i]];
        }
        inv
    }

    /// Jacobian determinant `sqrt(g)` at `q`
    fn jacobian(&self, q: &[Real]) -> Real {
        evaluate(&self.sqrt_det(), q)
    }
}

/// Evaluate separable product at computational point `q`
pub fn evaluate(factors: &[Coefficient], q: &[Real]) -> Real {
    factors
        .iter()
        .zip(q.iter())
        .map(|(c, x)| c.value(*x))
        .product()
}

/// Check that `map` is orthogonal with positive finite Jacobian at `points`
///
/// # Errors
/// `UnsupportedCoordinate` at the first offending point
pub fn validate(map: &dyn CoordinateMap, points: &[Vec<Real>]) -> Result<()> {
    for q in points {
        let det = map.jacobian(q);
        if !det.is_finite() || det <= 0. {
            return Err(SpectralError::UnsupportedCoordinate(format!(
                "{}: Jacobian {} at {:?}",
                map.name(),
                det,
                q
            )));
        }
        let g = map.covariant_metric(q);
        let scale = g.diag().iter().fold(0f64, |acc, v| acc.max(v.abs()));
        for i in 0..g.nrows() {
            for j in 0..g.ncols() {
                if i != j && g[[i, j]].abs() > 1e-10 * scale {
                    return Err(SpectralError::UnsupportedCoordinate(format!(
                        "{}: metric is not orthogonal at {:?}",
                        map.name(),
                        q
                    )));
                }
            }
        }
    }
    Ok(())
}

fn unit(n: usize) -> Separable {
    vec![Coefficient::one(); n]
}

/// Polar coordinates `(theta, r)`, `x = r cos(theta)`, `y = r sin(theta)`
#[derive(Debug, Clone, Default)]
pub struct Polar;

impl CoordinateMap for Polar {
    fn ndim(&self) -> usize {
        2
    }

    fn name(&self) -> String {
        "polar".to_string()
    }

    fn position(&self, q: &[Real]) -> Vec<Real> {
        let (theta, r) = (q[0], q[1]);
        vec![r * theta.cos(), r * theta.sin()]
    }

    fn covariant_basis(&self, q: &[Real]) -> Array2<Real> {
        let (theta, r) = (q[0], q[1]);
        array![
            [-r * theta.sin(), r * theta.cos()],
            [theta.cos(), theta.sin()]
        ]
    }

    fn sqrt_det(&self) -> Separable {
        vec![Coefficient::one(), Coefficient::polynomial(&[0., 1.])]
    }

    fn sqrt_det_derivative(&self, i: usize) -> Separable {
        match i {
            1 => unit(2),
            _ => vec![Coefficient::constant(0.), Coefficient::one()],
        }
    }

    fn covariant(&self, i: usize) -> Separable {
        match i {
            0 => vec![Coefficient::one(), Coefficient::polynomial(&[0., 0., 1.])],
            _ => unit(2),
        }
    }

    fn contravariant(&self, i: usize) -> Separable {
        match i {
            0 => vec![
                Coefficient::one(),
                Coefficient::function("1/r^2", |r| 1. / (r * r)),
            ],
            _ => unit(2),
        }
    }

    fn stiffness(&self, i: usize) -> Separable {
        match i {
            0 => vec![Coefficient::one(), Coefficient::function("1/r", |r| 1. / r)],
            _ => vec![Coefficient::one(), Coefficient::polynomial(&[0., 1.])],
        }
    }

    fn stiffness_derivative(&self, i: usize) -> Separable {
        match i {
            0 => vec![Coefficient::constant(0.), Coefficient::one()],
            _ => unit(2),
        }
    }
}

/// Spherical surface coordinates `(theta, phi)` on a sphere of radius `radius`
#[derive(Debug, Clone)]
pub struct Spherical {
    /// Radius of the sphere
    pub radius: Real,
}

impl Default for Spherical {
    fn default() -> Self {
        Self { radius: 1. }
    }
}

impl Spherical {
    fn r2(&self) -> Coefficient {
        Coefficient::constant(self.radius * self.radius)
    }
}

impl CoordinateMap for Spherical {
    fn ndim(&self) -> usize {
        2
    }

    fn name(&self) -> String {
        format!("spherical(r={})", self.radius)
    }

    fn position(&self, q: &[Real]) -> Vec<Real> {
        let (theta, phi, r) = (q[0], q[1], self.radius);
        vec![
            r * theta.sin() * phi.cos(),
            r * theta.sin() * phi.sin(),
            r * theta.cos(),
        ]
    }

    fn covariant_basis(&self, q: &[Real]) -> Array2<Real> {
        let (theta, phi, r) = (q[0], q[1], self.radius);
        array![
            [
                r * theta.cos() * phi.cos(),
                r * theta.cos() * phi.sin(),
                -r * theta.sin()
            ],
            [-r * theta.sin() * phi.sin(), r * theta.sin() * phi.cos(), 0.]
        ]
    }

    fn sqrt_det(&self) -> Separable {
        let r2 = self.radius * self.radius;
        vec![
            Coefficient::function(&format!("{}*sin", r2), move |t| r2 * t.sin()),
            Coefficient::one(),
        ]
    }

    fn sqrt_det_derivative(&self, i: usize) -> Separable {
        let r2 = self.radius * self.radius;
        match i {
            0 => vec![
                Coefficient::function(&format!("{}*cos", r2), move |t| r2 * t.cos()),
                Coefficient::one(),
            ],
            _ => vec![Coefficient::constant(0.), Coefficient::one()],
        }
    }

    fn covariant(&self, i: usize) -> Separable {
        let r2 = self.radius * self.radius;
        match i {
            0 => vec![self.r2(), Coefficient::one()],
            _ => vec![
                Coefficient::function(&format!("{}*sin^2", r2), move |t| {
                    r2 * t.sin() * t.sin()
                }),
                Coefficient::one(),
            ],
        }
    }

    fn contravariant(&self, i: usize) -> Separable {
        let r2 = self.radius * self.radius;
        match i {
            0 => vec![Coefficient::constant(1. / r2), Coefficient::one()],
            _ => vec![
                Coefficient::function(&format!("1/({}*sin^2)", r2), move |t| {
                    1. / (r2 * t.sin() * t.sin())
                }),
                Coefficient::one(),
            ],
        }
    }

    fn stiffness(&self, i: usize) -> Separable {
        match i {
            0 => vec![Coefficient::function("sin", f64::sin), Coefficient::one()],
            _ => vec![
                Coefficient::function("1/sin", |t| 1. / t.sin()),
                Coefficient::one(),
            ],
        }
    }

    fn stiffness_derivative(&self, i: usize) -> Separable {
        match i {
            0 => vec![Coefficient::function("cos", f64::cos), Coefficient::one()],
            _ => vec![Coefficient::constant(0.), Coefficient::one()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polar_metric() {
        let q = [0.4, 0.7];
        let g = Polar.covariant_metric(&q);
        assert!((g[[0, 0]] - 0.49).abs() < 1e-14);
        assert!((g[[1, 1]] - 1.).abs() < 1e-14);
        assert!(g[[0, 1]].abs() < 1e-14);
        assert!((Polar.jacobian(&q) - 0.7).abs() < 1e-14);
        // closed form factors agree with the metric
        let ginv = Polar.contravariant_metric(&q);
        assert!((evaluate(&Polar.contravariant(0), &q) - ginv[[0, 0]]).abs() < 1e-12);
        assert!((evaluate(&Polar.covariant(0), &q) - g[[0, 0]]).abs() < 1e-12);
        assert!((evaluate(&Polar.stiffness(0), &q) - 0.7 / 0.49).abs() < 1e-12);
    }

    #[test]
    fn test_spherical_metric() {
        let map = Spherical { radius: 2. };
        let q = [1.1, 0.3];
        let g = map.covariant_metric(&q);
        assert!((g[[0, 0]] - 4.).abs() < 1e-12);
        assert!((g[[1, 1]] - 4. * 1.1f64.sin().powi(2)).abs() < 1e-12);
        assert!((map.jacobian(&q) - 4. * 1.1f64.sin()).abs() < 1e-12);
        let det = g[[0, 0]] * g[[1, 1]];
        assert!((det.sqrt() - map.jacobian(&q)).abs() < 1e-12);
        let sg_ginv = map.jacobian(&q) * map.contravariant_metric(&q)[[1, 1]];
        assert!((evaluate(&map.stiffness(1), &q) * 4. - sg_ginv * 4.).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_origin() {
        let points = vec![vec![0.1, 0.5], vec![0.2, 0.]];
        assert!(matches!(
            validate(&Polar, &points),
            Err(SpectralError::UnsupportedCoordinate(_))
        ));
        assert!(validate(&Polar, &points[..1]).is_ok());
    }
}

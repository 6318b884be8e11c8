//! Variable coefficients of weak form terms along one axis
//!
//! Polynomial coefficients are assembled with exact coefficient-space
//! algebra, everything else by quadrature on the basis' own nodes.
use crate::Real;
use std::fmt;
use std::sync::Arc;

/// Coefficient as function of the physical coordinate of one axis
#[derive(Clone)]
pub enum Coefficient {
    /// `c[0] + c[1] x + c[2] x^2 + ...`
    Polynomial(Vec<Real>),
    /// Arbitrary function, identified by `name` in matrix caches.
    /// Two functions with the same name must be identical.
    Function {
        /// Cache key
        name: String,
        /// Function of the physical coordinate
        f: Arc<dyn Fn(Real) -> Real + Send + Sync>,
    },
}

impl fmt::Debug for Coefficient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coefficient::Polynomial(c) => write!(f, "Polynomial({:?})", c),
            Coefficient::Function { name, .. } => write!(f, "Function({})", name),
        }
    }
}

impl Coefficient {
    /// Constant coefficient
    pub fn constant(c: Real) -> Self {
        Coefficient::Polynomial(vec![c])
    }

    /// Unit coefficient
    pub fn one() -> Self {
        Self::constant(1.)
    }

    /// Polynomial from monomial coefficients in ascending order
    ///
    /// ```
    /// use rustgalerkin::coefficient::Coefficient;
    /// // 1 - x^2
    /// let c = Coefficient::polynomial(&[1., 0., -1.]);
    /// assert_eq!(c.value(0.5), 0.75);
    /// ```
    pub fn polynomial(c: &[Real]) -> Self {
        let mut c = c.to_vec();
        while c.len() > 1 && c.last() == Some(&0.) {
            c.pop();
        }
        if c.is_empty() {
            c.push(0.);
        }
        Coefficient::Polynomial(c)
    }

    /// Named function coefficient
    pub fn function<F>(name: &str, f: F) -> Self
    where
        F: Fn(Real) -> Real + Send + Sync + 'static,
    {
        Coefficient::Function {
            name: name.to_string(),
            f: Arc::new(f),
        }
    }

    /// Value at physical coordinate `x`
    pub fn value(&self, x: Real) -> Real {
        match self {
            Coefficient::Polynomial(c) => c.iter().rev().fold(0., |acc, ci| acc * x + ci),
            Coefficient::Function { f, .. } => f(x),
        }
    }

    /// Value if the coefficient is constant
    pub fn as_constant(&self) -> Option<Real> {
        match self {
            Coefficient::Polynomial(c) if c.len() == 1 => Some(c[0]),
            _ => None,
        }
    }

    /// Constant equal to one
    pub fn is_one(&self) -> bool {
        self.as_constant() == Some(1.)
    }

    /// Product of two coefficients. Polynomials stay polynomials.
    pub fn product(&self, other: &Self) -> Self {
        match (self, other) {
            (Coefficient::Polynomial(a), Coefficient::Polynomial(b)) => {
                let mut c = vec![0.; (a.len() + b.len()).saturating_sub(1).max(1)];
                for (i, ai) in a.iter().enumerate() {
                    for (j, bj) in b.iter().enumerate() {
                        c[i + j] += ai * bj;
                    }
                }
                Self::polynomial(&c)
            }
            _ => {
                if self.is_one() {
                    return other.clone();
                }
                if other.is_one() {
                    return self.clone();
                }
                let (f, g) = (self.clone(), other.clone());
                Coefficient::Function {
                    name: format!("({})*({})", f.key(), g.key()),
                    f: Arc::new(move |x| f.value(x) * g.value(x)),
                }
            }
        }
    }

    /// Structural key used by matrix caches
    pub fn key(&self) -> String {
        match self {
            Coefficient::Polynomial(c) => {
                let bits: Vec<String> = c.iter().map(|v| format!("{:x}", v.to_bits())).collect();
                format!("p[{}]", bits.join(","))
            }
            Coefficient::Function { name, .. } => name.clone(),
        }
    }
}

/// Product of a list of coefficients
pub fn product(coefs: &[Coefficient]) -> Coefficient {
    coefs
        .iter()
        .fold(Coefficient::one(), |acc, c| acc.product(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polynomial_product() {
        let a = Coefficient::polynomial(&[1., 1.]);
        let b = Coefficient::polynomial(&[1., -1.]);
        match a.product(&b) {
            Coefficient::Polynomial(c) => assert_eq!(c, vec![1., 0., -1.]),
            _ => panic!("product of polynomials must be a polynomial"),
        }
    }

    #[test]
    fn test_function_product() {
        let a = Coefficient::function("sin", f64::sin);
        let b = Coefficient::polynomial(&[0., 2.]);
        let c = product(&[a, b, Coefficient::one()]);
        assert!(c.as_constant().is_none());
        assert!((c.value(0.3) - 0.6 * 0.3f64.sin()).abs() < 1e-15);
    }

    #[test]
    fn test_trailing_zeros() {
        let c = Coefficient::polynomial(&[2., 0., 0.]);
        assert_eq!(c.as_constant(), Some(2.));
    }
}

//! Composite bases are produced by a combination of basis functions from an orthogonal set.
//!
//! Parent (p) and composite space (c) are connected by a stencil matrix S, i.e.
//! p = S^T c. Every composite function is
//!
//! phi_k = P_k + sum_{j=1..m} a_kj P_{k+j},
//!
//! where the `m` coefficients follow from the boundary constraints. This
//! reproduces `T_k - T_{k+2}` for Dirichlet conditions and Shen's
//! biharmonic basis for four constraints.
//!
//! Nonzero boundary values are represented by a lift polynomial in the
//! lowest parent functions, added in physical space.
use super::orthogonal::{boundary_value, matvec_lane, projection_matrix, Orthogonal};
use super::{BaseSize, Differentiate, Family, Transform};
use crate::error::{Result, SpectralError};
use crate::{c64, Real};
use ndarray::prelude::*;
use ndarray_linalg::Solve;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Side of the interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// x = a
    Left,
    /// x = b
    Right,
}

/// Kind of boundary constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BcKind {
    /// Prescribed value
    Dirichlet,
    /// Prescribed first derivative
    Neumann,
}

/// Single boundary constraint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryCondition {
    /// Side of the interval
    pub side: Side,
    /// Kind of constraint
    pub kind: BcKind,
    /// Prescribed value (physical coordinates)
    pub value: Real,
}

impl BoundaryCondition {
    fn order(&self) -> usize {
        match self.kind {
            BcKind::Dirichlet => 0,
            BcKind::Neumann => 1,
        }
    }
}

/// Ordered list of boundary constraints
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundaryConditions(pub Vec<BoundaryCondition>);

impl BoundaryConditions {
    /// No constraints
    pub fn none() -> Self {
        Self(vec![])
    }

    /// u(a) = left, u(b) = right
    pub fn dirichlet(left: Real, right: Real) -> Self {
        Self(vec![
            BoundaryCondition {
                side: Side::Left,
                kind: BcKind::Dirichlet,
                value: left,
            },
            BoundaryCondition {
                side: Side::Right,
                kind: BcKind::Dirichlet,
                value: right,
            },
        ])
    }

    /// u'(a) = left, u'(b) = right
    pub fn neumann(left: Real, right: Real) -> Self {
        Self(vec![
            BoundaryCondition {
                side: Side::Left,
                kind: BcKind::Neumann,
                value: left,
            },
            BoundaryCondition {
                side: Side::Right,
                kind: BcKind::Neumann,
                value: right,
            },
        ])
    }

    /// Homogeneous clamped conditions u = u' = 0 on both sides
    pub fn biharmonic() -> Self {
        let mut bcs = Self::dirichlet(0., 0.);
        bcs.0.extend(Self::neumann(0., 0.).0);
        bcs
    }

    /// Build from a tuple of optional values.
    ///
    /// Two values are Dirichlet conditions `(left, right)`, four values are
    /// `(left, right)` Dirichlet followed by `(left, right)` Neumann. `None`
    /// leaves the corresponding constraint out.
    ///
    /// ```
    /// use rustgalerkin::bases::BoundaryConditions;
    /// let bcs = BoundaryConditions::from_values(&[None, Some(0.)]).unwrap();
    /// assert_eq!(bcs.len(), 1);
    /// ```
    ///
    /// # Errors
    /// Length other than 0, 2 or 4.
    pub fn from_values(values: &[Option<Real>]) -> Result<Self> {
        let kinds = match values.len() {
            0 => vec![],
            2 => vec![BcKind::Dirichlet; 2],
            4 => vec![
                BcKind::Dirichlet,
                BcKind::Dirichlet,
                BcKind::Neumann,
                BcKind::Neumann,
            ],
            n => {
                return Err(SpectralError::Configuration(format!(
                    "boundary tuple must have 0, 2 or 4 entries, got {}",
                    n
                )))
            }
        };
        let mut bcs = vec![];
        for (i, (value, kind)) in values.iter().zip(kinds.into_iter()).enumerate() {
            if let Some(value) = value {
                let side = if i % 2 == 0 { Side::Left } else { Side::Right };
                bcs.push(BoundaryCondition {
                    side,
                    kind,
                    value: *value,
                });
            }
        }
        Ok(Self(bcs))
    }

    /// Number of constraints
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// No constraints
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Any nonzero prescribed value
    pub fn is_inhomogeneous(&self) -> bool {
        self.0.iter().any(|bc| bc.value != 0.)
    }

    /// Value of constraint functional applied to `P_k` on the reference interval
    fn functional(bc: &BoundaryCondition, family: Family, k: usize) -> Real {
        boundary_value(family, k, bc.order(), bc.side == Side::Right)
    }
}

/// Kind of composite basis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeKind {
    /// Functions satisfy boundary constraints
    Constrained,
    /// First `m` parent functions, used as Petrov-Galerkin test functions
    Truncated,
}

/// # Composite basis from orthogonal parent
#[derive(Debug, Clone)]
pub struct Composite {
    /// Parent space
    pub parent: Orthogonal,
    /// Number of coefficients in composite space
    pub m: usize,
    /// Stencil, row k holds the parent coefficients of phi_k
    pub stencil: Array2<Real>,
    /// Boundary conditions
    pub bcs: BoundaryConditions,
    /// Kind of composite
    pub kind: CompositeKind,
    /// Parent coefficients of the lift, if boundary values are nonzero
    pub lift: Option<Array1<Real>>,
    lift_values: Option<Array1<Real>>,
    forward_mat: Array2<Real>,
    backward_mat: Array2<Real>,
    signature: u64,
}

impl Composite {
    /// Composite basis satisfying `bcs`.
    ///
    /// # Errors
    /// Too few coefficients for the number of constraints, or
    /// constraints that cannot be satisfied by the stencil.
    pub fn new(parent: Orthogonal, bcs: BoundaryConditions) -> Result<Self> {
        let n = parent.n;
        let nb = bcs.len();
        if n < nb + 1 {
            return Err(SpectralError::Configuration(format!(
                "basis of size {} cannot satisfy {} boundary constraints",
                n, nb
            )));
        }
        let stencil = Self::stencil(parent.family, n, &bcs)?;
        let lift = if bcs.is_inhomogeneous() {
            Some(Self::lift(&parent, &bcs)?)
        } else {
            None
        };
        Self::build(parent, stencil, bcs, CompositeKind::Constrained, lift)
    }

    /// Truncated parent basis with `m` functions, the Petrov-Galerkin
    /// companion of a constrained basis.
    ///
    /// # Errors
    /// `m` larger than the parent space
    pub fn truncated(parent: Orthogonal, m: usize) -> Result<Self> {
        if m > parent.n || m == 0 {
            return Err(SpectralError::Configuration(format!(
                "truncated basis of size {} from parent of size {}",
                m, parent.n
            )));
        }
        let mut stencil = Array2::<Real>::zeros((m, parent.n));
        for k in 0..m {
            stencil[[k, k]] = 1.;
        }
        Self::build(
            parent,
            stencil,
            BoundaryConditions::none(),
            CompositeKind::Truncated,
            None,
        )
    }

    fn build(
        parent: Orthogonal,
        stencil: Array2<Real>,
        bcs: BoundaryConditions,
        kind: CompositeKind,
        lift: Option<Array1<Real>>,
    ) -> Result<Self> {
        let m = stencil.nrows();
        let forward_mat = projection_matrix(&parent.vander, &parent.w, &stencil)?;
        let backward_mat = parent.vander.dot(&stencil.t());
        let lift_values = lift.as_ref().map(|l| parent.vander.dot(l));
        let mut hasher = DefaultHasher::new();
        kind.hash(&mut hasher);
        for v in stencil.iter() {
            v.to_bits().hash(&mut hasher);
        }
        let signature = hasher.finish();
        Ok(Self {
            parent,
            m,
            stencil,
            bcs,
            kind,
            lift,
            lift_values,
            forward_mat,
            backward_mat,
            signature,
        })
    }

    /// Stencil from constraint functionals, one small system per row.
    fn stencil(family: Family, n: usize, bcs: &BoundaryConditions) -> Result<Array2<Real>> {
        let nb = bcs.len();
        let m = n - nb;
        let mut stencil = Array2::<Real>::zeros((m, n));
        for k in 0..m {
            stencil[[k, k]] = 1.;
            if nb == 0 {
                continue;
            }
            let mut mat = Array2::<Real>::zeros((nb, nb));
            let mut rhs = Array1::<Real>::zeros(nb);
            for (c, bc) in bcs.0.iter().enumerate() {
                rhs[c] = -BoundaryConditions::functional(bc, family, k);
                for j in 0..nb {
                    mat[[c, j]] = BoundaryConditions::functional(bc, family, k + 1 + j);
                }
            }
            let a = mat.solve_into(rhs).map_err(|_| {
                SpectralError::Configuration(format!(
                    "boundary constraints {:?} cannot be satisfied by a stencil (row {})",
                    bcs.0, k
                ))
            })?;
            for (j, v) in a.iter().enumerate() {
                if v.abs() > 1e-14 {
                    stencil[[k, k + 1 + j]] = *v;
                }
            }
        }
        Ok(stencil)
    }

    /// Lift coefficients in the lowest parent functions. Pure
    /// Neumann conditions shift the lift one degree up.
    fn lift(parent: &Orthogonal, bcs: &BoundaryConditions) -> Result<Array1<Real>> {
        let nb = bcs.len();
        let (_, c1) = parent.map();
        for shift in 0..2 {
            if shift + nb > parent.n {
                break;
            }
            let mut mat = Array2::<Real>::zeros((nb, nb));
            let mut rhs = Array1::<Real>::zeros(nb);
            for (c, bc) in bcs.0.iter().enumerate() {
                rhs[c] = bc.value * c1.powi(bc.order() as i32);
                for j in 0..nb {
                    mat[[c, j]] = BoundaryConditions::functional(bc, parent.family, shift + j);
                }
            }
            if let Ok(b) = mat.solve_into(rhs) {
                if b.iter().all(|v| v.is_finite()) {
                    let mut lift = Array1::<Real>::zeros(parent.n);
                    for (j, v) in b.iter().enumerate() {
                        lift[shift + j] = *v;
                    }
                    return Ok(lift);
                }
            }
        }
        Err(SpectralError::Configuration(format!(
            "no lift polynomial for boundary values {:?}",
            bcs.0
        )))
    }

    /// Lift evaluated at the quadrature nodes
    pub fn lift_values(&self) -> Option<&Array1<Real>> {
        self.lift_values.as_ref()
    }

    /// Lift evaluated at physical point `x`
    pub fn lift_at(&self, x: Real) -> Real {
        match &self.lift {
            Some(lift) => {
                let t = ndarray::array![self.parent.reference(x)];
                let v = super::orthogonal::vandermonde(self.parent.family, self.parent.n, &t);
                v.row(0).dot(lift)
            }
            None => 0.,
        }
    }

    /// Hash of kind and stencil entries
    pub fn signature(&self) -> u64 {
        self.signature
    }
}

impl BaseSize for Composite {
    fn len_phys(&self) -> usize {
        self.parent.n
    }

    fn len_spec(&self) -> usize {
        self.m
    }

    fn coords(&self) -> &Array1<Real> {
        &self.parent.x
    }

    fn domain(&self) -> (Real, Real) {
        self.parent.domain
    }

    fn family(&self) -> Family {
        self.parent.family
    }
}

impl Transform for Composite {
    /// Physical space --> composite coefficients (homogeneous part)
    fn forward_lane(&self, input: &ArrayView1<c64>, output: &mut ArrayViewMut1<c64>) {
        matvec_lane(&self.forward_mat, input, output);
    }

    /// Composite coefficients --> physical space (homogeneous part)
    fn backward_lane(&self, input: &ArrayView1<c64>, output: &mut ArrayViewMut1<c64>) {
        matvec_lane(&self.backward_mat, input, output);
    }

    fn scalar_product_lane(&self, input: &ArrayView1<c64>, output: &mut ArrayViewMut1<c64>) {
        let mut buffer = Array1::<c64>::zeros(self.parent.n);
        self.parent.scalar_product_lane(input, &mut buffer.view_mut());
        matvec_lane(&self.stencil, &buffer.view(), output);
    }

    fn evaluate(&self, x: Real) -> Array1<c64> {
        let p = self.parent.evaluate(x);
        let mut out = Array1::<c64>::zeros(self.m);
        matvec_lane(&self.stencil, &p.view(), &mut out.view_mut());
        out
    }

    fn integration_weights(&self) -> Array1<Real> {
        self.parent.integration_weights()
    }
}

impl Differentiate for Composite {
    fn len_deriv(&self) -> usize {
        self.parent.n
    }

    /// Returns derivative coefficients in parent space
    fn differentiate_lane(
        &self,
        input: &ArrayView1<c64>,
        output: &mut ArrayViewMut1<c64>,
        order: usize,
    ) {
        let mut buffer = Array1::<c64>::zeros(self.parent.n);
        let stencil_t = self.stencil.t();
        for (out, row) in buffer.iter_mut().zip(stencil_t.outer_iter()) {
            *out = row
                .iter()
                .zip(input.iter())
                .fold(c64::new(0., 0.), |acc, (s, v)| acc + *v * *s);
        }
        super::orthogonal::differentiate_parent(&self.parent, &buffer.view(), output, order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bases::Quadrature;
    use ndarray::array;

    fn approx_eq<S, D>(result: &ArrayBase<S, D>, expected: &ArrayBase<S, D>)
    where
        S: ndarray::Data<Elem = f64>,
        D: Dimension,
    {
        let dif = 1e-10;
        for (a, b) in expected.iter().zip(result.iter()) {
            if (a - b).abs() > dif {
                panic!("Large difference of values, got {} expected {}.", b, a)
            }
        }
    }

    fn parent(family: Family, n: usize) -> Orthogonal {
        Orthogonal::new(family, n, Quadrature::Gauss, (-1., 1.)).unwrap()
    }

    #[test]
    fn test_stencil_chebdirichlet() {
        let c = Composite::new(parent(Family::Chebyshev, 6), BoundaryConditions::dirichlet(0., 0.))
            .unwrap();
        assert_eq!(c.m, 4);
        approx_eq(&c.stencil.row(1).to_owned(), &array![0., 1., 0., -1., 0., 0.]);
    }

    #[test]
    fn test_stencil_chebneumann() {
        let c = Composite::new(parent(Family::Chebyshev, 6), BoundaryConditions::neumann(0., 0.))
            .unwrap();
        // phi_k = T_k - k^2/(k+2)^2 T_k+2
        approx_eq(
            &c.stencil.row(1).to_owned(),
            &array![0., 1., 0., -1. / 9., 0., 0.],
        );
        approx_eq(&c.stencil.row(0).to_owned(), &array![1., 0., 0., 0., 0., 0.]);
    }

    #[test]
    fn test_stencil_biharmonic() {
        let c = Composite::new(parent(Family::Chebyshev, 8), BoundaryConditions::biharmonic())
            .unwrap();
        // phi_k = T_k - 2(k+2)/(k+3) T_k+2 + (k+1)/(k+3) T_k+4
        let k = 1.;
        approx_eq(
            &c.stencil.row(1).to_owned(),
            &array![
                0.,
                1.,
                0.,
                -2. * (k + 2.) / (k + 3.),
                0.,
                (k + 1.) / (k + 3.),
                0.,
                0.
            ],
        );
    }

    #[test]
    fn test_upper_dirichlet() {
        let bcs = BoundaryConditions::from_values(&[None, Some(0.)]).unwrap();
        let c = Composite::new(parent(Family::Legendre, 5), bcs).unwrap();
        assert_eq!(c.m, 4);
        approx_eq(&c.stencil.row(2).to_owned(), &array![0., 0., 1., -1., 0.]);
    }

    #[test]
    fn test_too_small() {
        let err = Composite::new(parent(Family::Chebyshev, 4), BoundaryConditions::biharmonic());
        assert!(matches!(err, Err(SpectralError::Configuration(_))));
    }

    #[test]
    fn test_lift_satisfies_bc() {
        let c = Composite::new(
            Orthogonal::new(Family::Chebyshev, 8, Quadrature::GaussLobatto, (0., 2.)).unwrap(),
            BoundaryConditions::dirichlet(1.5, -0.5),
        )
        .unwrap();
        assert!((c.lift_at(0.) - 1.5).abs() < 1e-12);
        assert!((c.lift_at(2.) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_neumann_lift() {
        let c = Composite::new(parent(Family::Legendre, 8), BoundaryConditions::neumann(1., 1.))
            .unwrap();
        // Lift is x itself
        let lift = c.lift.as_ref().unwrap();
        approx_eq(lift, &array![0., 1., 0., 0., 0., 0., 0., 0.]);
    }

    #[test]
    fn test_composite_fwd_bwd() {
        let c = Composite::new(parent(Family::Legendre, 9), BoundaryConditions::biharmonic())
            .unwrap();
        let coef = Array1::from_shape_fn(c.m, |i| c64::new(1. / (i + 1) as f64, i as f64));
        let mut phys = Array1::<c64>::zeros(9);
        let mut back = Array1::<c64>::zeros(c.m);
        c.backward_lane(&coef.view(), &mut phys.view_mut());
        c.forward_lane(&phys.view(), &mut back.view_mut());
        approx_eq(&back.mapv(|v| v.re), &coef.mapv(|v| v.re));
        approx_eq(&back.mapv(|v| v.im), &coef.mapv(|v| v.im));
    }
}

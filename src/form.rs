//! # Weak forms
//!
//! Bilinear forms are built from linear expressions in trial and test
//! functions:
//!
//! ```
//! use rustgalerkin::bases::{cheb_dirichlet, fourier_r2c};
//! use rustgalerkin::form::{div, grad, inner, TestFunction, TrialFunction};
//! use rustgalerkin::space::TensorSpace;
//! let space = TensorSpace::with_axes(
//!     vec![fourier_r2c(8).unwrap(), cheb_dirichlet(10).unwrap()],
//!     vec![1, 0],
//! )
//! .unwrap();
//! let u = TrialFunction::new(&space).scalar(0).unwrap();
//! let v = TestFunction::new(&space).scalar(0).unwrap();
//! let form = inner(&v, &(div(&grad(&u)) * -1.));
//! let mats = form.matrix().unwrap();
//! assert_eq!(mats.block_shape(), (8, 8));
//! ```
//!
//! Every term of a form is a product of one-dimensional factors, one per
//! axis, which [`assemble`] turns into per-mode block matrices.
//!
//! Curvilinear spaces multiply every term by the measure `sqrt(g)`.
//! `div(grad(u))` yields the Laplace-Beltrami operator in a form where
//! the measure is already folded in, `sqrt(g) g^ii d_ii u + d_i(sqrt(g) g^ii) d_i u`.
pub mod assemble;
use crate::coefficient::Coefficient;
use crate::coordinates::Separable;
use crate::error::{Result, SpectralError};
use crate::space::{CompositeSpace, FieldKind};
use crate::{c64, Real};
pub use assemble::{MatrixCache, ModeMatrices};
use std::ops::{Add, Mul, Neg, Sub};

/// Trial or test side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Unknown function
    Trial,
    /// Test function
    Test,
}

/// Term `scale * prod_a c_a(x_a) d^n_a/dx_a^n_a` acting on one component
#[derive(Debug, Clone)]
pub struct LinearTerm {
    /// Scale
    pub scale: c64,
    /// Component of the composite space
    pub component: usize,
    /// Derivative order per axis
    pub derivs: Vec<usize>,
    /// Coefficient per axis
    pub coeffs: Vec<Coefficient>,
    /// Measure `sqrt(g)` is included in the coefficients
    pub folded: bool,
}

/// Scalar linear expression in a trial or test function
#[derive(Debug, Clone)]
pub struct Expr {
    space: CompositeSpace,
    role: Role,
    terms: Vec<LinearTerm>,
    issue: Option<String>,
}

/// Vector valued linear expression, one [`Expr`] per axis
#[derive(Debug, Clone)]
pub struct VectorExpr {
    comps: Vec<Expr>,
    gradient_of: Option<Expr>,
}

/// Unknown function of a composite space
#[derive(Debug, Clone)]
pub struct TrialFunction {
    space: CompositeSpace,
}

/// Test function of a composite space
#[derive(Debug, Clone)]
pub struct TestFunction {
    space: CompositeSpace,
}

fn field_exprs(space: &CompositeSpace, role: Role, field: usize) -> Result<(FieldKind, Vec<Expr>)> {
    let kind = match space.fields().get(field) {
        Some(kind) => kind.clone(),
        None => {
            return Err(SpectralError::Configuration(format!(
                "field {} out of range, space has {} fields",
                field,
                space.fields().len()
            )))
        }
    };
    let ndim = kind.space().ndim();
    let offset = space.offset(field);
    let exprs = (0..kind.ncomp())
        .map(|c| Expr {
            space: space.clone(),
            role,
            terms: vec![LinearTerm {
                scale: c64::new(1., 0.),
                component: offset + c,
                derivs: vec![0; ndim],
                coeffs: vec![Coefficient::one(); ndim],
                folded: false,
            }],
            issue: None,
        })
        .collect();
    Ok((kind, exprs))
}

macro_rules! impl_function {
    ($name: ident, $role: expr) => {
        impl $name {
            /// Function on `space`
            pub fn new<S: Into<CompositeSpace>>(space: S) -> Self {
                Self {
                    space: space.into(),
                }
            }

            /// Space of the function
            pub fn space(&self) -> &CompositeSpace {
                &self.space
            }

            /// Scalar field `field`
            ///
            /// # Errors
            /// Field does not exist or is a vector field
            pub fn scalar(&self, field: usize) -> Result<Expr> {
                match field_exprs(&self.space, $role, field)? {
                    (FieldKind::Scalar(_), mut exprs) => Ok(exprs.remove(0)),
                    (FieldKind::Vector(_), _) => Err(SpectralError::Configuration(format!(
                        "field {} is a vector field",
                        field
                    ))),
                }
            }

            /// Vector field `field`
            ///
            /// # Errors
            /// Field does not exist or is a scalar field
            pub fn vector(&self, field: usize) -> Result<VectorExpr> {
                match field_exprs(&self.space, $role, field)? {
                    (FieldKind::Vector(_), comps) => Ok(VectorExpr {
                        comps,
                        gradient_of: None,
                    }),
                    (FieldKind::Scalar(_), _) => Err(SpectralError::Configuration(format!(
                        "field {} is a scalar field",
                        field
                    ))),
                }
            }
        }
    };
}

impl_function!(TrialFunction, Role::Trial);
impl_function!(TestFunction, Role::Test);

impl Expr {
    /// Space of the expression
    pub fn space(&self) -> &CompositeSpace {
        &self.space
    }

    /// Trial or test side
    pub fn role(&self) -> Role {
        self.role
    }

    /// Terms
    pub fn terms(&self) -> &[LinearTerm] {
        &self.terms
    }

    fn ndim(&self) -> usize {
        self.space.first().ndim()
    }

    fn with_issue(mut self, issue: String) -> Self {
        if self.issue.is_none() {
            self.issue = Some(issue);
        }
        self
    }

    /// Multiply with `coefficient` along `axis`
    pub fn times(mut self, axis: usize, coefficient: Coefficient) -> Self {
        if axis >= self.ndim() {
            let ndim = self.ndim();
            return self.with_issue(format!("axis {} out of range for {} axes", axis, ndim));
        }
        for t in self.terms.iter_mut() {
            t.coeffs[axis] = t.coeffs[axis].product(&coefficient);
        }
        self
    }

    /// Multiply every term with a separable product
    fn times_separable(mut self, factors: &Separable) -> Self {
        for t in self.terms.iter_mut() {
            for (c, f) in t.coeffs.iter_mut().zip(factors.iter()) {
                *c = c.product(f);
            }
        }
        self
    }

    fn folded(mut self) -> Self {
        for t in self.terms.iter_mut() {
            t.folded = true;
        }
        self
    }

    fn is_zero(factors: &Separable) -> bool {
        factors.iter().any(|c| c.as_constant() == Some(0.))
    }

    fn combine(mut self, other: Self) -> Self {
        if self.space.id() != other.space.id() || self.role != other.role {
            return self.with_issue("sum of expressions from different functions".to_string());
        }
        if self.issue.is_none() {
            self.issue = other.issue;
        }
        self.terms.extend(other.terms);
        self
    }
}

/// Partial derivative of `order` along `axis`
///
/// Terms with a variable coefficient along `axis` cannot be differentiated,
/// the expression then reports an incompatible form on assembly.
pub fn dx(expr: &Expr, axis: usize, order: usize) -> Expr {
    let mut out = expr.clone();
    if axis >= out.ndim() {
        let ndim = out.ndim();
        return out.with_issue(format!("axis {} out of range for {} axes", axis, ndim));
    }
    let mut issue = None;
    for t in out.terms.iter_mut() {
        if t.coeffs[axis].as_constant().is_none() {
            issue = Some(format!(
                "derivative along axis {} of variable coefficient {}",
                axis,
                t.coeffs[axis].key()
            ));
        }
        if t.folded {
            issue = Some("derivative of a folded expression".to_string());
        }
        t.derivs[axis] += order;
    }
    match issue {
        Some(issue) => out.with_issue(issue),
        None => out,
    }
}

/// Gradient with contravariant components `g^ii du/dq_i`
pub fn grad(expr: &Expr) -> VectorExpr {
    let ndim = expr.ndim();
    let map = expr.space.first().coordinates().cloned();
    let comps = (0..ndim)
        .map(|i| {
            let d = dx(expr, i, 1);
            match &map {
                Some(map) => d.times_separable(&map.contravariant(i)),
                None => d,
            }
        })
        .collect();
    VectorExpr {
        comps,
        gradient_of: Some(expr.clone()),
    }
}

/// Divergence. `div(grad(u))` is the Laplace-Beltrami operator.
pub fn div(vector: &VectorExpr) -> Expr {
    let first = &vector.comps[0];
    let map = first.space.first().coordinates().cloned();
    let mut terms: Vec<Expr> = vec![];
    match (&vector.gradient_of, &map) {
        (Some(u), None) => {
            for i in 0..u.ndim() {
                terms.push(dx(u, i, 2));
            }
        }
        (Some(u), Some(map)) => {
            for i in 0..u.ndim() {
                terms.push(dx(u, i, 2).times_separable(&map.stiffness(i)).folded());
                let deriv = map.stiffness_derivative(i);
                if !Expr::is_zero(&deriv) {
                    terms.push(dx(u, i, 1).times_separable(&deriv).folded());
                }
            }
        }
        (None, None) => {
            for (i, v) in vector.comps.iter().enumerate() {
                terms.push(dx(v, i, 1));
            }
        }
        (None, Some(map)) => {
            for (i, v) in vector.comps.iter().enumerate() {
                terms.push(dx(v, i, 1).times_separable(&map.sqrt_det()).folded());
                let deriv = map.sqrt_det_derivative(i);
                if !Expr::is_zero(&deriv) {
                    terms.push(v.clone().times_separable(&deriv).folded());
                }
            }
        }
    }
    let mut iter = terms.into_iter();
    let init = iter.next().unwrap_or_else(|| first.clone() * 0.);
    iter.fold(init, Expr::combine)
}

impl Add for Expr {
    type Output = Expr;

    fn add(self, other: Self) -> Self::Output {
        self.combine(other)
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(self, other: Self) -> Self::Output {
        self.combine(-other)
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Self::Output {
        self * -1.
    }
}

impl Mul<c64> for Expr {
    type Output = Expr;

    fn mul(mut self, scale: c64) -> Self::Output {
        for t in self.terms.iter_mut() {
            t.scale *= scale;
        }
        self
    }
}

impl Mul<Real> for Expr {
    type Output = Expr;

    fn mul(self, scale: Real) -> Self::Output {
        self * c64::new(scale, 0.)
    }
}

impl VectorExpr {
    /// Components
    pub fn comps(&self) -> &[Expr] {
        &self.comps
    }
}

impl Add for VectorExpr {
    type Output = VectorExpr;

    fn add(self, other: Self) -> Self::Output {
        let comps = self
            .comps
            .into_iter()
            .zip(other.comps)
            .map(|(a, b)| a + b)
            .collect();
        VectorExpr {
            comps,
            gradient_of: None,
        }
    }
}

impl Neg for VectorExpr {
    type Output = VectorExpr;

    fn neg(self) -> Self::Output {
        self * -1.
    }
}

impl Mul<Real> for VectorExpr {
    type Output = VectorExpr;

    fn mul(self, scale: Real) -> Self::Output {
        VectorExpr {
            comps: self.comps.into_iter().map(|c| c * scale).collect(),
            gradient_of: self.gradient_of.map(|g| g * scale),
        }
    }
}

/// Operand of [`inner`]
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a> {
    /// Scalar expression
    Scalar(&'a Expr),
    /// Vector expression
    Vector(&'a VectorExpr),
}

impl<'a> From<&'a Expr> for Operand<'a> {
    fn from(e: &'a Expr) -> Self {
        Operand::Scalar(e)
    }
}

impl<'a> From<&'a VectorExpr> for Operand<'a> {
    fn from(e: &'a VectorExpr) -> Self {
        Operand::Vector(e)
    }
}

/// Single term of a bilinear form
#[derive(Debug, Clone)]
pub struct BilinearTerm {
    /// Scale
    pub scale: c64,
    /// Component of the test space
    pub test_component: usize,
    /// Component of the trial space
    pub trial_component: usize,
    /// Derivative orders of the test function per axis
    pub test_derivs: Vec<usize>,
    /// Derivative orders of the trial function per axis
    pub trial_derivs: Vec<usize>,
    /// Coefficient per axis, including the measure
    pub coeffs: Vec<Coefficient>,
}

/// Sum of bilinear terms between a test and a trial space
#[derive(Debug, Clone)]
pub struct BilinearForm {
    test: CompositeSpace,
    trial: CompositeSpace,
    terms: Vec<BilinearTerm>,
    issues: Vec<String>,
}

/// Inner product `(test, trial)` with the measure of the space.
///
/// Scalar operands give `int conj(v) u sqrt(g)`, vector operands
/// `sum_i int conj(v^i) u^i g_ii sqrt(g)`. Problems are recorded in the
/// form and reported by [`BilinearForm::matrix`].
pub fn inner<'a, 'b, T, U>(test: T, trial: U) -> BilinearForm
where
    T: Into<Operand<'a>>,
    U: Into<Operand<'b>>,
{
    match (test.into(), trial.into()) {
        (Operand::Scalar(v), Operand::Scalar(u)) => inner_scalar(v, u, None),
        (Operand::Vector(v), Operand::Vector(u)) => {
            let first = &u.comps[0];
            let map = first.space.first().coordinates().cloned();
            let mut forms = v.comps.iter().zip(u.comps.iter()).enumerate().map(|(i, (vi, ui))| {
                let metric = map.as_ref().map(|m| m.covariant(i));
                inner_scalar(vi, ui, metric.as_ref())
            });
            let mut form = match forms.next() {
                Some(f) => f,
                None => empty_form(&v.comps[0], first),
            };
            for f in forms {
                form = form + f;
            }
            if v.comps.len() != u.comps.len() {
                form.issues.push("vector operands differ in length".to_string());
            }
            form
        }
        (Operand::Scalar(v), Operand::Vector(u)) => {
            let mut form = empty_form(v, &u.comps[0]);
            form.issues.push("inner product of scalar and vector".to_string());
            form
        }
        (Operand::Vector(v), Operand::Scalar(u)) => {
            let mut form = empty_form(&v.comps[0], u);
            form.issues.push("inner product of vector and scalar".to_string());
            form
        }
    }
}

fn empty_form(test: &Expr, trial: &Expr) -> BilinearForm {
    BilinearForm {
        test: test.space.clone(),
        trial: trial.space.clone(),
        terms: vec![],
        issues: vec![],
    }
}

fn inner_scalar(test: &Expr, trial: &Expr, metric: Option<&Separable>) -> BilinearForm {
    let mut form = empty_form(test, trial);
    if test.role != Role::Test || trial.role != Role::Trial {
        form.issues
            .push("inner expects a test expression and a trial expression".to_string());
    }
    form.issues.extend(test.issue.iter().cloned());
    form.issues.extend(trial.issue.iter().cloned());
    let test_space = test.space.first();
    let trial_space = trial.space.first();
    if test_space.ndim() != trial_space.ndim() {
        form.issues.push(format!(
            "test space has {} axes, trial space {}",
            test_space.ndim(),
            trial_space.ndim()
        ));
        return form;
    }
    let measure = trial_space.coordinates().map(|m| m.sqrt_det());
    for t in test.terms.iter() {
        for u in trial.terms.iter() {
            if t.folded && u.folded {
                form.issues
                    .push("measure is folded into both test and trial expression".to_string());
                continue;
            }
            if metric.is_some() && (t.folded || u.folded) {
                form.issues
                    .push("vector inner product of folded expressions".to_string());
                continue;
            }
            let mut coeffs: Vec<Coefficient> = t
                .coeffs
                .iter()
                .zip(u.coeffs.iter())
                .map(|(a, b)| a.product(b))
                .collect();
            let mut factors: Vec<&Separable> = vec![];
            if let Some(m) = metric {
                factors.push(m);
            }
            if let (false, false, Some(m)) = (t.folded, u.folded, &measure) {
                factors.push(m);
            }
            for f in factors {
                for (c, fi) in coeffs.iter_mut().zip(f.iter()) {
                    *c = c.product(fi);
                }
            }
            form.terms.push(BilinearTerm {
                scale: t.scale.conj() * u.scale,
                test_component: t.component,
                trial_component: u.component,
                test_derivs: t.derivs.clone(),
                trial_derivs: u.derivs.clone(),
                coeffs,
            });
        }
    }
    form
}

impl BilinearForm {
    /// Test space
    pub fn test_space(&self) -> &CompositeSpace {
        &self.test
    }

    /// Trial space
    pub fn trial_space(&self) -> &CompositeSpace {
        &self.trial
    }

    /// Terms
    pub fn terms(&self) -> &[BilinearTerm] {
        &self.terms
    }

    /// Problems recorded while building the form
    pub fn issues(&self) -> &[String] {
        &self.issues
    }

    /// Same form acting on the orthogonal parents of the trial space
    pub fn with_orthogonal_trial(&self) -> Self {
        Self {
            test: self.test.clone(),
            trial: self.trial.orthogonal(),
            terms: self.terms.clone(),
            issues: self.issues.clone(),
        }
    }

    /// Assemble per-mode block matrices
    ///
    /// # Errors
    /// `IncompatibleForm` if the form recorded problems or test and
    /// trial spaces cannot be combined
    pub fn matrix(&self) -> Result<ModeMatrices> {
        self.matrix_with_cache(&mut MatrixCache::default())
    }

    /// Assemble reusing axis matrices of `cache`
    ///
    /// # Errors
    /// See [`BilinearForm::matrix`]
    pub fn matrix_with_cache(&self, cache: &mut MatrixCache) -> Result<ModeMatrices> {
        if !self.issues.is_empty() {
            return Err(SpectralError::IncompatibleForm(self.issues.join("; ")));
        }
        self.test.check_alive()?;
        self.trial.check_alive()?;
        assemble::assemble(self, cache)
    }

    fn scaled(mut self, scale: c64) -> Self {
        for t in self.terms.iter_mut() {
            t.scale *= scale;
        }
        self
    }
}

impl Add for BilinearForm {
    type Output = BilinearForm;

    fn add(mut self, other: Self) -> Self::Output {
        if self.test.id() != other.test.id() || self.trial.id() != other.trial.id() {
            self.issues
                .push("sum of forms over different spaces".to_string());
        }
        self.terms.extend(other.terms);
        self.issues.extend(other.issues);
        self
    }
}

impl Sub for BilinearForm {
    type Output = BilinearForm;

    fn sub(self, other: Self) -> Self::Output {
        self + other.scaled(c64::new(-1., 0.))
    }
}

impl Neg for BilinearForm {
    type Output = BilinearForm;

    fn neg(self) -> Self::Output {
        self.scaled(c64::new(-1., 0.))
    }
}

impl Mul<c64> for BilinearForm {
    type Output = BilinearForm;

    fn mul(self, scale: c64) -> Self::Output {
        self.scaled(scale)
    }
}

impl Mul<Real> for BilinearForm {
    type Output = BilinearForm;

    fn mul(self, scale: Real) -> Self::Output {
        self.scaled(c64::new(scale, 0.))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bases::{cheb_dirichlet, chebyshev, fourier_r2c, leg_dirichlet};
    use crate::coordinates::Polar;
    use crate::space::TensorSpace;

    fn polar_space() -> TensorSpace {
        let fo = fourier_r2c(8).unwrap();
        let leg = leg_dirichlet(10).unwrap().with_domain(0., 1.).unwrap();
        TensorSpace::with_axes(vec![fo, leg], vec![1, 0])
            .unwrap()
            .with_coordinates(Polar)
            .unwrap()
    }

    #[test]
    fn test_laplace_cartesian() {
        let space = TensorSpace::new(vec![cheb_dirichlet(8).unwrap()]).unwrap();
        let u = TrialFunction::new(&space).scalar(0).unwrap();
        let v = TestFunction::new(&space).scalar(0).unwrap();
        let form = inner(&v, &div(&grad(&u)));
        assert_eq!(form.terms().len(), 1);
        assert_eq!(form.terms()[0].trial_derivs, vec![2]);
        assert!(form.issues().is_empty());
    }

    #[test]
    fn test_laplace_polar_is_folded() {
        let space = polar_space();
        let u = TrialFunction::new(&space).scalar(0).unwrap();
        let v = TestFunction::new(&space).scalar(0).unwrap();
        let lap = div(&grad(&u));
        // (1/r) u_tt + r u_rr + u_r
        assert_eq!(lap.terms().len(), 3);
        assert!(lap.terms().iter().all(|t| t.folded));
        let form = inner(&v, &lap);
        assert!(form.issues().is_empty());
        let r = form.terms()[1].coeffs[1].value(0.5);
        assert!((r - 0.5).abs() < 1e-14);
        // mass term picks up sqrt(g) = r
        let mass = inner(&v, &u);
        assert!((mass.terms()[0].coeffs[1].value(0.25) - 0.25).abs() < 1e-14);
    }

    #[test]
    fn test_issues() {
        let space = TensorSpace::new(vec![chebyshev(8).unwrap()]).unwrap();
        let u = TrialFunction::new(&space).scalar(0).unwrap();
        let v = TestFunction::new(&space).scalar(0).unwrap();
        // derivative of a variable coefficient
        let e = dx(&u.clone().times(0, Coefficient::polynomial(&[0., 1.])), 0, 1);
        assert!(matches!(
            inner(&v, &e).matrix(),
            Err(SpectralError::IncompatibleForm(_))
        ));
        // roles swapped
        assert!(!inner(&u, &v).issues().is_empty());
        // different spaces
        let other = TensorSpace::new(vec![chebyshev(8).unwrap()]).unwrap();
        let w = TrialFunction::new(&other).scalar(0).unwrap();
        let form = inner(&v, &u) + inner(&v, &w);
        assert!(!form.issues().is_empty());
        assert!(TrialFunction::new(&space).vector(0).is_err());
    }

    #[test]
    fn test_vector_inner() {
        let fo = fourier_r2c(8).unwrap();
        let space = TensorSpace::with_axes(vec![fo, chebyshev(6).unwrap()], vec![1, 0]).unwrap();
        let q = CompositeSpace::vector(&space);
        let p = TrialFunction::new(&q).vector(0).unwrap();
        let r = TestFunction::new(&q).vector(0).unwrap();
        let form = inner(&r, &p);
        assert_eq!(form.terms().len(), 2);
        assert_eq!(form.terms()[1].test_component, 1);
        assert_eq!(form.terms()[1].trial_component, 1);
        let d = div(&p);
        assert_eq!(d.terms().len(), 2);
        assert_eq!(d.terms()[1].derivs, vec![0, 1]);
    }
}

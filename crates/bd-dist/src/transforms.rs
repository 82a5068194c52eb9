//! Invertible transforms (bijectors) between constrained spaces.
//!
//! A [`Bijector`] is the kernel of a transform: a differentiable map with
//! a known domain/codomain constraint and a log-Jacobian-determinant. A
//! [`Transform`] is the shared handle callers use: it adds the optional
//! single-slot memo cache and the inverse view. A transform and its
//! inverse view share one kernel and one cache, so a fill from either
//! direction is visible to both and `t.inv().inv()` round-trips to the
//! identical underlying objects.

use std::any::Any;
use std::sync::{Arc, Mutex, PoisonError};

use bd_core::tensor::{
    map1, map2, map3, map_rows, same_storage, sum_trailing, zip_reduce_rows, IntoTensor, Tensor,
};
use bd_core::{Error, Result};
use ndarray::{Axis, IxDyn};

use crate::constraint::Constraint;
use crate::math::{clamp_probs, log_sigmoid, sigmoid, softmax_slice};

/// The kernel of a transform: forward/inverse evaluation plus Jacobian
/// bookkeeping between a domain and a codomain constraint.
pub trait Bijector: Send + Sync {
    /// Constraint satisfied by inputs of the forward map.
    fn domain(&self) -> Constraint;

    /// Constraint satisfied by outputs of the forward map.
    fn codomain(&self) -> Constraint;

    /// Whether the map is a true bijection onto its codomain.
    fn bijective(&self) -> bool {
        true
    }

    /// Number of trailing axes consumed as one unit.
    ///
    /// At least the larger of the domain/codomain event dims.
    fn event_dim(&self) -> usize {
        self.domain().event_dim().max(self.codomain().event_dim())
    }

    /// Evaluate the forward map.
    fn forward(&self, x: &Tensor) -> Result<Tensor>;

    /// Evaluate the inverse (or pseudo-inverse) map.
    fn inverse(&self, _y: &Tensor) -> Result<Tensor> {
        Err(Error::NotImplemented("inverse for this transform".into()))
    }

    /// `log |det J_forward(x)|` with `y = forward(x)`, summed over the
    /// transform's event dims.
    fn log_abs_det_jacobian(&self, _x: &Tensor, _y: &Tensor) -> Result<Tensor> {
        Err(Error::NotImplemented(
            "log_abs_det_jacobian for this transform".into(),
        ))
    }

    /// Downcasting hook for equality tests.
    fn as_any(&self) -> &dyn Any;

    /// Structural equality: same constructing type with equal parameters.
    fn same_as(&self, other: &dyn Bijector) -> bool;

    /// Whether this kernel is the identity (empty composition).
    fn is_identity(&self) -> bool {
        false
    }
}

/// Most recent `(x, y)` pair, in kernel-forward orientation.
#[derive(Default)]
struct MemoSlot {
    pair: Option<(Tensor, Tensor)>,
}

/// A shared handle to a transform kernel.
///
/// Cloning is cheap; clones and inverse views all share the kernel and
/// (when enabled) the memo cache.
#[derive(Clone)]
pub struct Transform {
    kernel: Arc<dyn Bijector>,
    memo: Option<Arc<Mutex<MemoSlot>>>,
    inverted: bool,
}

impl std::fmt::Debug for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transform")
            .field("domain", &self.domain())
            .field("codomain", &self.codomain())
            .field("inverted", &self.inverted)
            .field("cached", &self.memo.is_some())
            .finish()
    }
}

impl Transform {
    /// Wrap a kernel with no memo cache.
    pub fn new(kernel: impl Bijector + 'static) -> Self {
        Self { kernel: Arc::new(kernel), memo: None, inverted: false }
    }

    /// Wrap a kernel with a single-slot memo cache.
    pub fn cached(kernel: impl Bijector + 'static) -> Self {
        Transform::new(kernel).with_cache()
    }

    /// A view of this transform with a (fresh) single-slot memo cache.
    pub fn with_cache(&self) -> Self {
        let mut t = self.clone();
        if t.memo.is_none() {
            t.memo = Some(Arc::new(Mutex::new(MemoSlot::default())));
        }
        t
    }

    /// The inverse view: swaps domain/codomain and forward/inverse roles
    /// while sharing this transform's kernel and cache.
    pub fn inv(&self) -> Self {
        let mut t = self.clone();
        t.inverted = !t.inverted;
        t
    }

    /// Constraint satisfied by inputs.
    pub fn domain(&self) -> Constraint {
        if self.inverted { self.kernel.codomain() } else { self.kernel.domain() }
    }

    /// Constraint satisfied by outputs.
    pub fn codomain(&self) -> Constraint {
        if self.inverted { self.kernel.domain() } else { self.kernel.codomain() }
    }

    /// Whether the map is a true bijection.
    pub fn bijective(&self) -> bool {
        self.kernel.bijective()
    }

    /// Number of trailing axes consumed as one unit.
    pub fn event_dim(&self) -> usize {
        self.kernel.event_dim()
    }

    /// Evaluate the map.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        if self.inverted { self.run_inv(x) } else { self.run_fwd(x) }
    }

    /// Evaluate the inverse (or pseudo-inverse) map.
    pub fn inverse(&self, y: &Tensor) -> Result<Tensor> {
        if self.inverted { self.run_fwd(y) } else { self.run_inv(y) }
    }

    /// `log |det J(x)|` of this view's forward map at `x`, with
    /// `y = forward(x)`, summed over the event dims.
    pub fn log_abs_det_jacobian(&self, x: &Tensor, y: &Tensor) -> Result<Tensor> {
        if self.inverted {
            // log|det J_inv|(y) = -log|det J_fwd|(x) at x = inv(y)
            Ok(map1(&self.kernel.log_abs_det_jacobian(y, x)?, |v| -v))
        } else {
            self.kernel.log_abs_det_jacobian(x, y)
        }
    }

    fn run_fwd(&self, x: &Tensor) -> Result<Tensor> {
        if let Some(memo) = &self.memo {
            let mut slot = lock(memo);
            if let Some((cx, cy)) = &slot.pair {
                if same_storage(cx, x) {
                    return Ok(cy.clone());
                }
            }
            let y = self.kernel.forward(x)?;
            slot.pair = Some((x.clone(), y.clone()));
            return Ok(y);
        }
        self.kernel.forward(x)
    }

    fn run_inv(&self, y: &Tensor) -> Result<Tensor> {
        if let Some(memo) = &self.memo {
            let mut slot = lock(memo);
            if let Some((cx, cy)) = &slot.pair {
                if same_storage(cy, y) {
                    return Ok(cx.clone());
                }
            }
            let x = self.kernel.inverse(y)?;
            slot.pair = Some((x.clone(), y.clone()));
            return Ok(x);
        }
        self.kernel.inverse(y)
    }
}

fn lock(memo: &Arc<Mutex<MemoSlot>>) -> std::sync::MutexGuard<'_, MemoSlot> {
    memo.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        // The identity is its own inverse view.
        if self.kernel.is_identity() && other.kernel.is_identity() {
            return true;
        }
        self.inverted == other.inverted && self.kernel.same_as(other.kernel.as_ref())
    }
}

/// The identity transform (empty composition).
pub fn identity_transform() -> Transform {
    Transform::new(ComposeTransform::new(Vec::new()))
}

/// `x -> exp(x)`: reals onto the positive half-line.
pub struct ExpTransform;

impl Bijector for ExpTransform {
    fn domain(&self) -> Constraint {
        Constraint::Real
    }
    fn codomain(&self) -> Constraint {
        Constraint::Positive
    }
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        Ok(map1(x, f64::exp))
    }
    fn inverse(&self, y: &Tensor) -> Result<Tensor> {
        Ok(map1(y, f64::ln))
    }
    fn log_abs_det_jacobian(&self, x: &Tensor, _y: &Tensor) -> Result<Tensor> {
        // d exp(x)/dx = exp(x), so log|J| = x
        Ok(x.to_owned().into_shared())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn same_as(&self, other: &dyn Bijector) -> bool {
        other.as_any().is::<ExpTransform>()
    }
}

/// `x -> loc + scale * x` with pointwise `loc`/`scale`.
///
/// `event_dim` can be raised to treat trailing axes jointly (the
/// Jacobian term is then summed over them).
pub struct AffineTransform {
    loc: Tensor,
    scale: Tensor,
    event_dim: usize,
}

impl AffineTransform {
    /// Create an affine transform; `scale` must be nonzero everywhere.
    pub fn new(
        loc: impl IntoTensor,
        scale: impl IntoTensor,
        event_dim: usize,
    ) -> Result<Self> {
        let loc = loc.into_tensor();
        let scale = scale.into_tensor();
        if scale.iter().any(|&s| s == 0.0 || !s.is_finite()) {
            return Err(Error::Validation(
                "affine scale must be finite and nonzero".into(),
            ));
        }
        Ok(Self { loc, scale, event_dim })
    }
}

impl Bijector for AffineTransform {
    fn domain(&self) -> Constraint {
        Constraint::Real
    }
    fn codomain(&self) -> Constraint {
        Constraint::Real
    }
    fn event_dim(&self) -> usize {
        self.event_dim
    }
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        map3(&self.loc, &self.scale, x, |l, s, v| l + s * v)
    }
    fn inverse(&self, y: &Tensor) -> Result<Tensor> {
        map3(&self.loc, &self.scale, y, |l, s, v| (v - l) / s)
    }
    fn log_abs_det_jacobian(&self, x: &Tensor, _y: &Tensor) -> Result<Tensor> {
        let per_elem = map2(x, &self.scale, |_, s| s.abs().ln())?;
        Ok(sum_trailing(&per_elem, self.event_dim))
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn same_as(&self, other: &dyn Bijector) -> bool {
        match other.as_any().downcast_ref::<AffineTransform>() {
            Some(o) => {
                self.event_dim == o.event_dim && self.loc == o.loc && self.scale == o.scale
            }
            None => false,
        }
    }
}

/// `x -> 1 / (1 + exp(-x))`: reals onto the open unit interval.
pub struct SigmoidTransform;

impl Bijector for SigmoidTransform {
    fn domain(&self) -> Constraint {
        Constraint::Real
    }
    fn codomain(&self) -> Constraint {
        Constraint::UnitInterval
    }
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        Ok(map1(x, sigmoid))
    }
    fn inverse(&self, y: &Tensor) -> Result<Tensor> {
        Ok(map1(y, |v| {
            let p = clamp_probs(v);
            p.ln() - (-p).ln_1p()
        }))
    }
    fn log_abs_det_jacobian(&self, x: &Tensor, _y: &Tensor) -> Result<Tensor> {
        // d sigmoid/dx = sigmoid(x) * sigmoid(-x)
        Ok(map1(x, |v| log_sigmoid(v) + log_sigmoid(-v)))
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn same_as(&self, other: &dyn Bijector) -> bool {
        other.as_any().is::<SigmoidTransform>()
    }
}

/// `x -> |x|`: a surjection onto the nonnegative reals.
///
/// The pseudo-inverse picks the positive branch.
pub struct AbsTransform;

impl Bijector for AbsTransform {
    fn domain(&self) -> Constraint {
        Constraint::Real
    }
    fn codomain(&self) -> Constraint {
        Constraint::Positive
    }
    fn bijective(&self) -> bool {
        false
    }
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        Ok(map1(x, f64::abs))
    }
    fn inverse(&self, y: &Tensor) -> Result<Tensor> {
        Ok(y.clone())
    }
    fn log_abs_det_jacobian(&self, x: &Tensor, _y: &Tensor) -> Result<Tensor> {
        // |d|x|/dx| = 1 almost everywhere
        Ok(map1(x, |_| 0.0))
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn same_as(&self, other: &dyn Bijector) -> bool {
        other.as_any().is::<AbsTransform>()
    }
}

/// Softmax over the last axis: a surjection onto the simplex.
///
/// The pseudo-inverse is the elementwise log, which softmax maps back to
/// the same simplex point.
pub struct BoltzmannTransform;

impl Bijector for BoltzmannTransform {
    fn domain(&self) -> Constraint {
        Constraint::Real
    }
    fn codomain(&self) -> Constraint {
        Constraint::Simplex
    }
    fn bijective(&self) -> bool {
        false
    }
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let k = last_axis_len(x)?;
        map_rows(x, k, |row, out| {
            out.copy_from_slice(&softmax_slice(row));
        })
    }
    fn inverse(&self, y: &Tensor) -> Result<Tensor> {
        Ok(map1(y, f64::ln))
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn same_as(&self, other: &dyn Bijector) -> bool {
        other.as_any().is::<BoltzmannTransform>()
    }
}

/// Stick-breaking bijection from `R^(K-1)` onto the interior of the
/// `K`-simplex.
///
/// Each coordinate is squashed through a sigmoid with an offset that
/// makes the uniform vector map to zero, then converted to a stick
/// length against the remaining mass.
pub struct StickBreakingTransform;

impl StickBreakingTransform {
    #[inline]
    fn z(row: &[f64], i: usize) -> f64 {
        // offset log(K-1-i) recenters so x = 0 maps to the uniform point
        sigmoid(row[i] - ((row.len() - i) as f64).ln())
    }
}

impl Bijector for StickBreakingTransform {
    fn domain(&self) -> Constraint {
        Constraint::Real
    }
    fn codomain(&self) -> Constraint {
        Constraint::Simplex
    }
    fn event_dim(&self) -> usize {
        1
    }
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let k1 = last_axis_len(x)?;
        map_rows(x, k1 + 1, |row, out| {
            let mut rest = 1.0;
            for i in 0..k1 {
                let z = Self::z(row, i);
                out[i] = z * rest;
                rest *= 1.0 - z;
            }
            out[k1] = rest;
        })
    }
    fn inverse(&self, y: &Tensor) -> Result<Tensor> {
        let k = last_axis_len(y)?;
        if k < 2 {
            return Err(Error::Validation(
                "stick-breaking inverse needs at least two categories".into(),
            ));
        }
        map_rows(y, k - 1, |row, out| {
            let mut rest: f64 = 1.0;
            for i in 0..k - 1 {
                let offset = ((k - 1 - i) as f64).ln();
                out[i] = row[i].ln() - rest.ln() + offset;
                rest -= row[i];
            }
        })
    }
    fn log_abs_det_jacobian(&self, x: &Tensor, y: &Tensor) -> Result<Tensor> {
        zip_reduce_rows(x, y, |xr, yr| {
            let mut acc = 0.0;
            for i in 0..xr.len() {
                let z = Self::z(xr, i);
                acc += (1.0 - z).ln() + yr[i].ln();
            }
            acc
        })
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn same_as(&self, other: &dyn Bijector) -> bool {
        other.as_any().is::<StickBreakingTransform>()
    }
}

/// Projection of square matrices onto lower-triangular matrices with a
/// positive diagonal (the Cholesky factor shape).
pub struct LowerCholeskyTransform;

impl LowerCholeskyTransform {
    fn per_matrix(
        t: &Tensor,
        diag: impl Fn(f64) -> f64,
    ) -> Result<Tensor> {
        if t.ndim() < 2 {
            return Err(Error::Validation(
                "lower-Cholesky transform needs at least two axes".into(),
            ));
        }
        let (r, c) = (t.shape()[t.ndim() - 2], t.shape()[t.ndim() - 1]);
        if r != c {
            return Err(Error::Validation(format!(
                "lower-Cholesky transform needs square trailing axes, got {}x{}",
                r, c
            )));
        }
        let lead: Vec<usize> = t.shape()[..t.ndim() - 2].to_vec();
        let n: usize = lead.iter().product();
        let flat = t
            .to_owned()
            .into_shape((n, r, c))
            .map_err(|e| Error::Computation(e.to_string()))?;
        let mut out = ndarray::Array3::<f64>::zeros((n, r, c));
        for b in 0..n {
            let m = flat.index_axis(Axis(0), b);
            for i in 0..r {
                for j in 0..i {
                    out[[b, i, j]] = m[(i, j)];
                }
                out[[b, i, i]] = diag(m[(i, i)]);
            }
        }
        let mut shape = lead;
        shape.push(r);
        shape.push(c);
        Ok(out
            .into_shape(IxDyn(&shape))
            .map_err(|e| Error::Computation(e.to_string()))?
            .into_shared())
    }
}

impl Bijector for LowerCholeskyTransform {
    fn domain(&self) -> Constraint {
        Constraint::Real
    }
    fn codomain(&self) -> Constraint {
        Constraint::LowerCholesky
    }
    fn bijective(&self) -> bool {
        false
    }
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        Self::per_matrix(x, f64::exp)
    }
    fn inverse(&self, y: &Tensor) -> Result<Tensor> {
        Self::per_matrix(y, f64::ln)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn same_as(&self, other: &dyn Bijector) -> bool {
        other.as_any().is::<LowerCholeskyTransform>()
    }
}

/// Chain of transforms applied left to right.
pub struct ComposeTransform {
    parts: Vec<Transform>,
}

impl ComposeTransform {
    /// Compose `parts`, applied in order on the forward pass.
    pub fn new(parts: Vec<Transform>) -> Self {
        Self { parts }
    }
}

impl Bijector for ComposeTransform {
    fn domain(&self) -> Constraint {
        match self.parts.first() {
            Some(t) => t.domain(),
            None => Constraint::Real,
        }
    }
    fn codomain(&self) -> Constraint {
        match self.parts.last() {
            Some(t) => t.codomain(),
            None => Constraint::Real,
        }
    }
    fn bijective(&self) -> bool {
        self.parts.iter().all(|t| t.bijective())
    }
    fn event_dim(&self) -> usize {
        self.parts.iter().map(|t| t.event_dim()).max().unwrap_or(0)
    }
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let mut cur = x.clone();
        for t in &self.parts {
            cur = t.forward(&cur)?;
        }
        Ok(cur)
    }
    fn inverse(&self, y: &Tensor) -> Result<Tensor> {
        let mut cur = y.clone();
        for t in self.parts.iter().rev() {
            cur = t.inverse(&cur)?;
        }
        Ok(cur)
    }
    fn log_abs_det_jacobian(&self, x: &Tensor, _y: &Tensor) -> Result<Tensor> {
        if self.parts.is_empty() {
            return Ok(map1(x, |_| 0.0));
        }
        let event_dim = self.event_dim();
        let mut acc: Option<Tensor> = None;
        let mut cur = x.clone();
        // Each contribution is evaluated at its own intermediate point and
        // summed up to the composite event_dim before accumulation.
        for t in &self.parts {
            let next = t.forward(&cur)?;
            let term = t.log_abs_det_jacobian(&cur, &next)?;
            let term = sum_trailing(&term, event_dim - t.event_dim());
            acc = Some(match acc {
                None => term,
                Some(a) => map2(&a, &term, |u, v| u + v)?,
            });
            cur = next;
        }
        Ok(acc.expect("nonempty composition"))
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn same_as(&self, other: &dyn Bijector) -> bool {
        match other.as_any().downcast_ref::<ComposeTransform>() {
            Some(o) => self.parts == o.parts,
            None => false,
        }
    }
    fn is_identity(&self) -> bool {
        self.parts.is_empty()
    }
}

fn last_axis_len(t: &Tensor) -> Result<usize> {
    if t.ndim() < 1 {
        return Err(Error::Validation(
            "transform needs at least one axis".into(),
        ));
    }
    Ok(t.shape()[t.ndim() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bd_core::tensor::{item, scalar};

    fn tensor(vals: &[f64]) -> Tensor {
        vals.to_vec().into_tensor()
    }

    fn assert_close(a: &Tensor, b: &Tensor, eps: f64) {
        assert_eq!(a.shape(), b.shape());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_relative_eq!(x, y, epsilon = eps, max_relative = eps);
        }
    }

    /// Numerical log|dt/dx| for a univariate transform.
    fn fd_log_jac(t: &Transform, x: f64) -> f64 {
        let eps = 1e-6;
        let hi = item(&t.forward(&scalar(x + eps)).unwrap());
        let lo = item(&t.forward(&scalar(x - eps)).unwrap());
        ((hi - lo) / (2.0 * eps)).abs().ln()
    }

    #[test]
    fn test_exp_roundtrip_and_jacobian() {
        let t = Transform::new(ExpTransform);
        let x = tensor(&[-2.0, 0.0, 1.5]);
        let y = t.forward(&x).unwrap();
        assert_close(&t.inverse(&y).unwrap(), &x, 1e-12);
        let ladj = t.log_abs_det_jacobian(&x, &y).unwrap();
        for (i, &xi) in x.iter().enumerate() {
            assert_relative_eq!(ladj[[i]], fd_log_jac(&t, xi), epsilon = 1e-5);
        }
    }

    #[test]
    fn test_affine_jacobian_sums_event_dims() {
        let t = Transform::new(
            AffineTransform::new(1.0, tensor(&[2.0, -4.0]), 1).unwrap(),
        );
        let x = tensor(&[0.3, 0.7]);
        let y = t.forward(&x).unwrap();
        let ladj = t.log_abs_det_jacobian(&x, &y).unwrap();
        assert_eq!(ladj.shape(), &[] as &[usize]);
        assert_relative_eq!(item(&ladj), 2.0_f64.ln() + 4.0_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_affine_rejects_zero_scale() {
        assert!(AffineTransform::new(0.0, 0.0, 0).is_err());
    }

    #[test]
    fn test_sigmoid_inverse_direction_negates_jacobian() {
        let t = Transform::new(SigmoidTransform);
        let x = tensor(&[-1.0, 0.25, 3.0]);
        let y = t.forward(&x).unwrap();
        let fwd = t.log_abs_det_jacobian(&x, &y).unwrap();
        let back = t.inv().log_abs_det_jacobian(&y, &x).unwrap();
        for i in 0..3 {
            assert_relative_eq!(fwd[[i]], -back[[i]], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_inv_view_roundtrips_to_same_objects() {
        let t = Transform::cached(ExpTransform);
        let back = t.inv().inv();
        assert!(Arc::ptr_eq(&t.kernel, &back.kernel));
        assert!(t == back);
    }

    #[test]
    fn test_identity_equals_its_inverse() {
        let id = identity_transform();
        assert!(id == id.inv());
        let x = tensor(&[1.0, 2.0]);
        assert_close(&id.forward(&x).unwrap(), &x, 0.0);
        assert_eq!(id.log_abs_det_jacobian(&x, &x).unwrap()[[0]], 0.0);
    }

    #[test]
    fn test_cache_returns_identical_storage() {
        let t = Transform::cached(ExpTransform);
        let x = tensor(&[0.5, 1.5]);
        let y = t.forward(&x).unwrap();
        let back = t.inv().forward(&y).unwrap();
        // The inverse view shares the cache, so the round-trip returns the
        // cached input buffer itself.
        assert!(same_storage(&back, &x));
        // A different operand forces recomputation.
        let y2 = tensor(&[2.0, 3.0]);
        let back2 = t.inverse(&y2).unwrap();
        assert!(!same_storage(&back2, &x));
        assert_relative_eq!(back2[[0]], 2.0_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_compose_jacobian_uses_intermediate_points() {
        // y = exp(2x + 1); log|dy/dx| = ln 2 + (2x + 1)
        let t = Transform::new(ComposeTransform::new(vec![
            Transform::new(AffineTransform::new(1.0, 2.0, 0).unwrap()),
            Transform::new(ExpTransform),
        ]));
        let x = tensor(&[-0.5, 0.0, 0.8]);
        let y = t.forward(&x).unwrap();
        let ladj = t.log_abs_det_jacobian(&x, &y).unwrap();
        for (i, &xi) in x.iter().enumerate() {
            assert_relative_eq!(ladj[[i]], 2.0_f64.ln() + 2.0 * xi + 1.0, epsilon = 1e-10);
            assert_relative_eq!(ladj[[i]], fd_log_jac(&t, xi), epsilon = 1e-4);
        }
    }

    #[test]
    fn test_stick_breaking_roundtrip() {
        let t = Transform::new(StickBreakingTransform);
        let x = tensor(&[0.3, -1.2, 0.9]);
        let y = t.forward(&x).unwrap();
        assert_eq!(y.shape(), &[4]);
        let sum: f64 = y.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
        assert!(y.iter().all(|&v| v > 0.0));
        assert_close(&t.inverse(&y).unwrap(), &x, 1e-9);
    }

    #[test]
    fn test_stick_breaking_jacobian_against_fd() {
        // 1-d case: K = 2, single coordinate; offset is log(1) = 0.
        let t = Transform::new(StickBreakingTransform);
        for x0 in [-1.0, 0.0, 1.3] {
            let x = tensor(&[x0]);
            let y = t.forward(&x).unwrap();
            let ladj = t.log_abs_det_jacobian(&x, &y).unwrap();
            let eps = 1e-6;
            let yh = t.forward(&tensor(&[x0 + eps])).unwrap();
            let yl = t.forward(&tensor(&[x0 - eps])).unwrap();
            let fd = ((yh[[0]] - yl[[0]]) / (2.0 * eps)).abs().ln();
            assert_relative_eq!(item(&ladj), fd, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_boltzmann_is_pseudo_inverse() {
        let t = Transform::new(BoltzmannTransform);
        assert!(!t.bijective());
        let x = tensor(&[1.0, -0.5, 0.2]);
        let y = t.forward(&x).unwrap();
        let again = t.forward(&t.inverse(&y).unwrap()).unwrap();
        assert_close(&again, &y, 1e-12);
    }

    #[test]
    fn test_lower_cholesky_projection() {
        let t = Transform::new(LowerCholeskyTransform);
        let x = ndarray::arr2(&[[0.5, 9.0], [-3.0, -1.0]])
            .into_dyn()
            .into_shared();
        let y = t.forward(&x).unwrap();
        assert_eq!(y[[0, 1]], 0.0);
        assert_relative_eq!(y[[0, 0]], 0.5_f64.exp(), epsilon = 1e-12);
        assert_relative_eq!(y[[1, 0]], -3.0, epsilon = 1e-12);
        assert!(Constraint::LowerCholesky.is_valid(&y).unwrap());
        let x2 = t.inverse(&y).unwrap();
        assert_relative_eq!(x2[[1, 1]], -1.0, epsilon = 1e-12);
        assert!(t.log_abs_det_jacobian(&x, &y).is_err());
    }

    #[test]
    fn test_equality_by_type_and_parameters() {
        let a = Transform::new(AffineTransform::new(0.0, 2.0, 0).unwrap());
        let b = Transform::new(AffineTransform::new(0.0, 2.0, 0).unwrap());
        let c = Transform::new(AffineTransform::new(0.0, 3.0, 0).unwrap());
        assert!(a == b);
        assert!(a != c);
        assert!(a != Transform::new(ExpTransform));
        assert!(Transform::new(ExpTransform) != Transform::new(ExpTransform).inv());
    }
}

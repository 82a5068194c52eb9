//! Exponential-family capability: generic entropy and the Bregman KL
//! fallback.
//!
//! Members factor their log-density as
//! `⟨η, T(x)⟩ - A(η) + carrier(x)` with a carrier-free natural
//! parameterization (so `mean_carrier_measure` is zero here unless a
//! family says otherwise). Both the generic entropy and the generic KL
//! need only `∇A`, which is obtained by seeding one dual tangent per
//! natural-parameter component — never hand-coded per family.

use bd_ad::Dual;
use bd_core::tensor::{broadcast_shapes, broadcast_to, Tensor};
use bd_core::{Error, Result};
use ndarray::{ArrayD, IxDyn};

use crate::distribution::Distribution;

/// A distribution family with exponential-family structure.
pub trait ExponentialFamily: Distribution {
    /// Natural parameter tensors.
    ///
    /// Each tensor's shape is `batch_shape` plus any per-event component
    /// axes (e.g. the Dirichlet concentration keeps its category axis).
    fn natural_params(&self) -> Vec<Tensor>;

    /// Log-normalizer `A(η)` for one event's flattened natural
    /// parameters.
    fn log_normalizer(&self, eta: &[Dual]) -> Dual;

    /// Expected carrier measure `E[carrier(x)]`.
    ///
    /// Zero for the carrier-free parameterizations used in this crate;
    /// families without a closed form return `NotImplemented`, which
    /// disables the generic entropy (but not the generic KL, where the
    /// carrier cancels).
    fn mean_carrier_measure(&self) -> Result<f64> {
        Ok(0.0)
    }
}

/// Flatten natural parameters into one row per batch element at the
/// given (broadcast) batch shape.
fn natural_rows(d: &dyn ExponentialFamily, batch_shape: &[usize]) -> Result<Vec<Vec<f64>>> {
    let n_batch: usize = batch_shape.iter().product();
    let own_batch = d.batch_shape().len();
    let mut rows = vec![Vec::new(); n_batch];
    for param in d.natural_params() {
        let extra: Vec<usize> = param.shape()[own_batch..].to_vec();
        let mut target = batch_shape.to_vec();
        target.extend_from_slice(&extra);
        let broadcast = broadcast_to(&param, &target)?;
        let stride: usize = extra.iter().product();
        let flat: Vec<f64> = broadcast.iter().cloned().collect();
        for (i, row) in rows.iter_mut().enumerate() {
            row.extend_from_slice(&flat[i * stride..(i + 1) * stride]);
        }
    }
    Ok(rows)
}

fn from_rows(batch_shape: &[usize], vals: Vec<f64>) -> Result<Tensor> {
    Ok(ArrayD::from_shape_vec(IxDyn(batch_shape), vals)
        .map_err(|e| Error::Computation(e.to_string()))?
        .into_shared())
}

/// Gradient of the log-normalizer at `row`, one dual pass per
/// component.
fn grad_log_normalizer(d: &dyn ExponentialFamily, row: &[f64]) -> Vec<f64> {
    let consts: Vec<Dual> = row.iter().map(|&v| Dual::constant(v)).collect();
    (0..row.len())
        .map(|i| {
            let mut seeded = consts.clone();
            seeded[i] = Dual::var(row[i]);
            d.log_normalizer(&seeded).dot
        })
        .collect()
}

/// Generic entropy: `A(η) - ⟨η, ∇A(η)⟩ - E[carrier]`.
pub fn ef_entropy(d: &dyn ExponentialFamily) -> Result<Tensor> {
    let carrier = d.mean_carrier_measure()?;
    let batch_shape = d.batch_shape().to_vec();
    let rows = natural_rows(d, &batch_shape)?;
    let vals: Vec<f64> = rows
        .iter()
        .map(|row| {
            let consts: Vec<Dual> = row.iter().map(|&v| Dual::constant(v)).collect();
            let a = d.log_normalizer(&consts).val;
            let grad = grad_log_normalizer(d, row);
            let dot: f64 = row.iter().zip(&grad).map(|(e, g)| e * g).sum();
            a - dot - carrier
        })
        .collect();
    from_rows(&batch_shape, vals)
}

/// Generic same-family KL: the Bregman divergence of the
/// log-normalizer,
/// `A(η_q) - A(η_p) - ⟨η_q - η_p, ∇A(η_p)⟩`.
///
/// Exactly zero when the natural parameters coincide.
pub fn ef_kl(p: &dyn ExponentialFamily, q: &dyn ExponentialFamily) -> Result<Tensor> {
    let batch_shape = broadcast_shapes(p.batch_shape(), q.batch_shape())?;
    let rows_p = natural_rows(p, &batch_shape)?;
    let rows_q = natural_rows(q, &batch_shape)?;
    let mut vals = Vec::with_capacity(rows_p.len());
    for (rp, rq) in rows_p.iter().zip(&rows_q) {
        if rp.len() != rq.len() {
            return Err(Error::Validation(
                "exponential-family KL needs matching natural parameter arity".into(),
            ));
        }
        let cp: Vec<Dual> = rp.iter().map(|&v| Dual::constant(v)).collect();
        let cq: Vec<Dual> = rq.iter().map(|&v| Dual::constant(v)).collect();
        let a_p = p.log_normalizer(&cp).val;
        let a_q = p.log_normalizer(&cq).val;
        let grad = grad_log_normalizer(p, rp);
        let cross: f64 = rp
            .iter()
            .zip(rq)
            .zip(&grad)
            .map(|((ep, eq), g)| (eq - ep) * g)
            .sum();
        vals.push(a_q - a_p - cross);
    }
    from_rows(&batch_shape, vals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bd_core::tensor::item;
    use crate::bernoulli::Bernoulli;
    use crate::beta::Beta;
    use crate::dirichlet::Dirichlet;
    use crate::exponential::Exponential;
    use crate::gamma::Gamma;
    use crate::normal::Normal;
    use crate::poisson::Poisson;

    fn assert_entropy_matches(d: &dyn ExponentialFamily) {
        let generic = ef_entropy(d).unwrap();
        let closed = d.entropy().unwrap();
        for (g, c) in generic.iter().zip(closed.iter()) {
            assert_relative_eq!(g, c, epsilon = 1e-8, max_relative = 1e-8);
        }
    }

    #[test]
    fn test_generic_entropy_matches_closed_forms() {
        assert_entropy_matches(&Normal::new(vec![0.0, 2.0], vec![1.0, 0.5]).unwrap());
        assert_entropy_matches(&Exponential::new(vec![0.5, 3.0]).unwrap());
        assert_entropy_matches(&Gamma::new(vec![1.0, 4.5], vec![2.0, 0.7]).unwrap());
        assert_entropy_matches(&Beta::new(2.0, 3.0).unwrap());
        assert_entropy_matches(&Bernoulli::from_probs(vec![0.2, 0.5, 0.9]).unwrap());
        assert_entropy_matches(&Dirichlet::new(vec![1.0, 2.0, 4.0]).unwrap());
    }

    #[test]
    fn test_generic_kl_is_zero_for_identical_params() {
        let p = Gamma::new(2.5, 1.5).unwrap();
        let q = Gamma::new(2.5, 1.5).unwrap();
        assert_eq!(item(&ef_kl(&p, &q).unwrap()), 0.0);
    }

    #[test]
    fn test_generic_kl_matches_normal_closed_form() {
        let p = Normal::new(0.0, 1.0).unwrap();
        let q = Normal::new(1.0, 2.0).unwrap();
        // KL = ln(σq/σp) + (σp² + Δμ²)/(2σq²) - ½
        let expect = 2.0_f64.ln() + (1.0 + 1.0) / 8.0 - 0.5;
        assert_relative_eq!(item(&ef_kl(&p, &q).unwrap()), expect, epsilon = 1e-8);
    }

    #[test]
    fn test_generic_kl_broadcasts_batch_shapes() {
        let p = Normal::new(vec![0.0, 1.0], 1.0).unwrap();
        let q = Normal::new(0.0, 1.0).unwrap();
        let kl = ef_kl(&p, &q).unwrap();
        assert_eq!(kl.shape(), &[2]);
        assert_eq!(kl[[0]], 0.0);
        assert!(kl[[1]] > 0.0);
    }

    #[test]
    fn test_poisson_generic_entropy_is_unavailable() {
        let d = Poisson::new(2.0).unwrap();
        assert!(ef_entropy(&d).is_err());
    }
}

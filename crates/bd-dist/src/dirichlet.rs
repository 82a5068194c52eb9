//! Dirichlet distribution over the probability simplex.

use std::any::Any;

use bd_ad::Dual;
use bd_core::rng::with_rng;
use bd_core::tensor::{map_rows, reduce_rows, zip_reduce_rows, IntoTensor, Tensor};
use bd_core::{Error, Result};
use ndarray::{ArrayD, IxDyn};
use statrs::function::gamma::{digamma, ln_gamma};

use crate::constraint::Constraint;
use crate::distribution::{check_log_prob_shape, extended_shape, validate_params, Distribution};
use crate::exp_family::ExponentialFamily;
use crate::math::standard_gamma;

/// Dirichlet distribution with a `concentration` vector along the last
/// axis.
///
/// The event is the whole simplex vector; `batch_shape` is the
/// concentration's leading shape.
#[derive(Debug, Clone)]
pub struct Dirichlet {
    concentration: Tensor,
    batch_shape: Vec<usize>,
    event_shape: Vec<usize>,
}

impl Dirichlet {
    /// Create a Dirichlet distribution; `concentration` needs at least
    /// one axis and strictly positive entries.
    pub fn new(concentration: impl IntoTensor) -> Result<Self> {
        let concentration = concentration.into_tensor();
        if concentration.ndim() < 1 {
            return Err(Error::Validation(
                "dirichlet concentration needs at least one axis".into(),
            ));
        }
        validate_params(&[("concentration", &concentration, &Constraint::Positive)])?;
        let shape = concentration.shape();
        let batch_shape = shape[..shape.len() - 1].to_vec();
        let event_shape = vec![shape[shape.len() - 1]];
        Ok(Self { concentration, batch_shape, event_shape })
    }

    /// Concentration parameter.
    pub fn concentration(&self) -> &Tensor {
        &self.concentration
    }

    fn k(&self) -> usize {
        self.event_shape[0]
    }
}

impl Distribution for Dirichlet {
    fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    fn event_shape(&self) -> &[usize] {
        &self.event_shape
    }

    fn support(&self) -> Constraint {
        Constraint::Simplex
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        vec![("concentration", Constraint::Positive)]
    }

    fn has_rsample(&self) -> bool {
        true
    }

    fn rsample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        let k = self.k();
        let n_batch: usize = self.batch_shape.iter().product();
        let reps: usize = sample_shape.iter().product();
        let conc: Vec<f64> = self.concentration.iter().cloned().collect();
        let mut out = Vec::with_capacity(reps * n_batch * k);
        with_rng(|rng| {
            for _ in 0..reps {
                for b in 0..n_batch {
                    let row = &conc[b * k..(b + 1) * k];
                    let gammas: Vec<f64> =
                        row.iter().map(|&a| standard_gamma(rng, a)).collect();
                    let total: f64 = gammas.iter().sum();
                    out.extend(gammas.iter().map(|g| g / total));
                }
            }
        });
        let shape = extended_shape(sample_shape, &self.batch_shape, &self.event_shape);
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), out)
            .map_err(|e| Error::Computation(e.to_string()))?
            .into_shared())
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &self.event_shape)?;
        zip_reduce_rows(value, &self.concentration, |x, alpha| {
            let a0: f64 = alpha.iter().sum();
            let mut lp = ln_gamma(a0);
            for (&xi, &ai) in x.iter().zip(alpha) {
                lp -= ln_gamma(ai);
                // A zero coordinate with a unit concentration contributes
                // nothing; other boundary cases are genuinely 0 or inf.
                if xi != 0.0 || ai != 1.0 {
                    lp += (ai - 1.0) * xi.ln();
                }
            }
            lp
        })
    }

    fn entropy(&self) -> Result<Tensor> {
        reduce_rows(&self.concentration, |alpha| {
            let k = alpha.len() as f64;
            let a0: f64 = alpha.iter().sum();
            let ln_b: f64 = alpha.iter().map(|&a| ln_gamma(a)).sum::<f64>() - ln_gamma(a0);
            let cross: f64 = alpha.iter().map(|&a| (a - 1.0) * digamma(a)).sum();
            ln_b + (a0 - k) * digamma(a0) - cross
        })
    }

    fn mean(&self) -> Result<Tensor> {
        let k = self.k();
        map_rows(&self.concentration, k, |alpha, out| {
            let a0: f64 = alpha.iter().sum();
            for (o, &a) in out.iter_mut().zip(alpha) {
                *o = a / a0;
            }
        })
    }

    fn variance(&self) -> Result<Tensor> {
        let k = self.k();
        map_rows(&self.concentration, k, |alpha, out| {
            let a0: f64 = alpha.iter().sum();
            for (o, &a) in out.iter_mut().zip(alpha) {
                *o = a * (a0 - a) / (a0 * a0 * (a0 + 1.0));
            }
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_exp_family(&self) -> Option<&dyn ExponentialFamily> {
        Some(self)
    }
}

impl ExponentialFamily for Dirichlet {
    fn natural_params(&self) -> Vec<Tensor> {
        vec![bd_core::tensor::map1(&self.concentration, |a| a - 1.0)]
    }

    fn log_normalizer(&self, eta: &[Dual]) -> Dual {
        // A(η) = Σ ln Γ(ηi+1) - ln Γ(Σ (ηi+1))
        let mut total = Dual::constant(0.0);
        let mut acc = Dual::constant(0.0);
        for &e in eta {
            let a = e + 1.0;
            total = total + a;
            acc = acc + a.ln_gamma();
        }
        acc - total.ln_gamma()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bd_core::tensor::item;

    #[test]
    fn test_shapes() {
        let d = Dirichlet::new(vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(d.batch_shape(), &[] as &[usize]);
        assert_eq!(d.event_shape(), &[3]);
        let s = d.sample(&[4]).unwrap();
        assert_eq!(s.shape(), &[4, 3]);
    }

    #[test]
    fn test_samples_lie_on_simplex() {
        bd_core::rng::seed(3);
        let d = Dirichlet::new(vec![0.5, 1.0, 2.0]).unwrap();
        let s = d.rsample(&[50]).unwrap();
        assert!(Constraint::Simplex.is_valid(&s).unwrap());
    }

    #[test]
    fn test_flat_concentration_is_uniform_on_simplex() {
        // Dirichlet(1, 1) is uniform: log_prob = ln Γ(2) = 0
        let d = Dirichlet::new(vec![1.0, 1.0]).unwrap();
        let lp = d.log_prob(&vec![0.3, 0.7].into_tensor()).unwrap();
        assert_relative_eq!(item(&lp), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_log_prob_matches_beta_for_two_categories() {
        let d = Dirichlet::new(vec![2.0, 5.0]).unwrap();
        let b = crate::beta::Beta::new(2.0, 5.0).unwrap();
        let x = 0.4;
        let lp_d = item(&d.log_prob(&vec![x, 1.0 - x].into_tensor()).unwrap());
        let lp_b = item(&b.log_prob(&x.into_tensor()).unwrap());
        assert_relative_eq!(lp_d, lp_b, epsilon = 1e-10);
    }

    #[test]
    fn test_event_shape_mismatch_is_an_error() {
        let d = Dirichlet::new(vec![1.0, 2.0, 3.0]).unwrap();
        assert!(d.log_prob(&vec![0.5, 0.5].into_tensor()).is_err());
    }

    #[test]
    fn test_mean_normalizes_concentration() {
        let d = Dirichlet::new(vec![1.0, 3.0]).unwrap();
        let m = d.mean().unwrap();
        assert_relative_eq!(m[[0]], 0.25, epsilon = 1e-12);
        assert_relative_eq!(m[[1]], 0.75, epsilon = 1e-12);
    }
}

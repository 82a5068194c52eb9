//! Numerically-stable scalar math used across distribution code.

use rand::Rng;
use rand_distr::{Distribution as RandDistribution, StandardNormal};

/// The Euler–Mascheroni constant γ.
pub const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Stable `log(1 + exp(x))`.
///
/// Branchless: `log(1+exp(x)) = max(x,0) + log(1+exp(-|x|))`.
#[inline]
pub fn log1pexp(x: f64) -> f64 {
    let e = (-x.abs()).exp(); // always in (0, 1], no overflow
    x.max(0.0) + e.ln_1p()
}

/// Stable sigmoid: `1 / (1 + exp(-x))`.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    let e = (-x.abs()).exp();
    let recip = 1.0 / (1.0 + e);
    if x >= 0.0 { recip } else { e * recip }
}

/// Stable `log(sigmoid(x))`.
#[inline]
pub fn log_sigmoid(x: f64) -> f64 {
    if x >= 0.0 { -(-x).exp().ln_1p() } else { x - x.exp().ln_1p() }
}

/// Stable softplus: `log(1 + exp(x))`.
#[inline]
pub fn softplus(x: f64) -> f64 {
    log1pexp(x)
}

/// Log-odds of a probability: `log(p / (1-p))`.
#[inline]
pub fn logit(p: f64) -> f64 {
    p.ln() - (-p).ln_1p()
}

/// Clamp a probability into the open unit interval.
///
/// The lower bound is the smallest positive normal `f64`, so `log` of the
/// result is finite; the upper bound leaves `1 - p` positive. Used only
/// where a boundary probability would otherwise produce a spurious
/// non-finite value; genuinely impossible outcomes keep their exact
/// `-inf` log-density through the unclamped formulas.
#[inline]
pub fn clamp_probs(p: f64) -> f64 {
    p.clamp(f64::MIN_POSITIVE, 1.0 - f64::EPSILON)
}

/// Convert a probability to a logit (binary case).
#[inline]
pub fn prob_to_logit(p: f64) -> f64 {
    logit(clamp_probs(p))
}

/// Stable `log(sum(exp(xs)))` over a slice.
pub fn logsumexp(xs: &[f64]) -> f64 {
    let m = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !m.is_finite() {
        return m;
    }
    let s: f64 = xs.iter().map(|&x| (x - m).exp()).sum();
    m + s.ln()
}

/// Softmax of a slice (stable; shifts by the max).
pub fn softmax_slice(xs: &[f64]) -> Vec<f64> {
    let m = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut out: Vec<f64> = xs.iter().map(|&x| (x - m).exp()).collect();
    let s: f64 = out.iter().sum();
    for v in &mut out {
        *v /= s;
    }
    out
}

/// Log-softmax of a slice.
pub fn log_softmax_slice(xs: &[f64]) -> Vec<f64> {
    let lse = logsumexp(xs);
    xs.iter().map(|&x| x - lse).collect()
}

/// Draw from the standard Gamma(`alpha`, 1) distribution.
///
/// Marsaglia–Tsang squeeze method; `alpha < 1` uses the boost
/// `Gamma(alpha) = Gamma(alpha+1) * U^(1/alpha)`. The draw is a smooth
/// function of the accepted normal/uniform noise, which is what makes
/// gamma-derived families reparameterizable.
pub fn standard_gamma(rng: &mut impl Rng, alpha: f64) -> f64 {
    if alpha < 1.0 {
        let u: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
        return standard_gamma(rng, alpha + 1.0) * u.powf(1.0 / alpha);
    }
    let d = alpha - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();
    loop {
        let x: f64 = StandardNormal.sample(rng);
        let v = (1.0 + c * x).powi(3);
        if v <= 0.0 {
            continue;
        }
        let u: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
        if u.ln() < 0.5 * x * x + d - d * v + d * v.ln() {
            return d * v;
        }
    }
}

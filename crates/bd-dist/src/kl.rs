//! Kullback-Leibler divergence with type-pair dispatch.
//!
//! `kl_divergence(p, q)` looks up the ordered pair of concrete runtime
//! types in a registry populated on first use. Registered closed forms
//! win; otherwise a same-type exponential-family pair falls back to the
//! Bregman divergence of the log-normalizer ([`crate::exp_family::ef_kl`]).

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::LazyLock;

use bd_core::tensor::{map2, zip_reduce_rows, Tensor};
use bd_core::{Error, Result};
use statrs::function::gamma::{digamma, ln_gamma};

use crate::bernoulli::Bernoulli;
use crate::beta::Beta;
use crate::categorical::Categorical;
use crate::chi2::Chi2;
use crate::dirichlet::Dirichlet;
use crate::distribution::Distribution;
use crate::exp_family::ef_kl;
use crate::exponential::Exponential;
use crate::gamma::Gamma;
use crate::geometric::Geometric;
use crate::gumbel::Gumbel;
use crate::laplace::Laplace;
use crate::log_normal::LogNormal;
use crate::math::EULER_GAMMA;
use crate::normal::Normal;
use crate::one_hot_categorical::OneHotCategorical;
use crate::pareto::Pareto;
use crate::poisson::Poisson;
use crate::uniform::Uniform;

type KlFn = fn(&dyn Distribution, &dyn Distribution) -> Result<Tensor>;

static KL_REGISTRY: LazyLock<HashMap<(TypeId, TypeId), KlFn>> = LazyLock::new(|| {
    let mut m: HashMap<(TypeId, TypeId), KlFn> = HashMap::new();
    m.insert(key::<Bernoulli, Bernoulli>(), kl_bernoulli_bernoulli);
    m.insert(key::<Beta, Beta>(), kl_beta_beta);
    m.insert(key::<Categorical, Categorical>(), kl_categorical_categorical);
    m.insert(key::<Chi2, Chi2>(), kl_chi2_chi2);
    m.insert(key::<Dirichlet, Dirichlet>(), kl_dirichlet_dirichlet);
    m.insert(key::<Exponential, Exponential>(), kl_exponential_exponential);
    m.insert(key::<Exponential, Gamma>(), kl_exponential_gamma);
    m.insert(key::<Gamma, Gamma>(), kl_gamma_gamma);
    m.insert(key::<Geometric, Geometric>(), kl_geometric_geometric);
    m.insert(key::<Gumbel, Gumbel>(), kl_gumbel_gumbel);
    m.insert(key::<Laplace, Laplace>(), kl_laplace_laplace);
    m.insert(key::<LogNormal, LogNormal>(), kl_lognormal_lognormal);
    m.insert(key::<Normal, Normal>(), kl_normal_normal);
    m.insert(
        key::<OneHotCategorical, OneHotCategorical>(),
        kl_onehot_onehot,
    );
    m.insert(key::<Pareto, Pareto>(), kl_pareto_pareto);
    m.insert(key::<Poisson, Poisson>(), kl_poisson_poisson);
    m.insert(key::<Uniform, Uniform>(), kl_uniform_uniform);
    m.insert(key::<Uniform, Beta>(), kl_uniform_beta);
    m
});

fn key<P: Distribution, Q: Distribution>() -> (TypeId, TypeId) {
    (TypeId::of::<P>(), TypeId::of::<Q>())
}

fn cast<'a, P: Distribution, Q: Distribution>(
    p: &'a dyn Distribution,
    q: &'a dyn Distribution,
) -> (&'a P, &'a Q) {
    let p = p.as_any().downcast_ref::<P>().expect("registry key matches p");
    let q = q.as_any().downcast_ref::<Q>().expect("registry key matches q");
    (p, q)
}

/// KL divergence `KL(p ‖ q)`, batched over the broadcast of the two
/// batch shapes.
///
/// Zero exactly when the parameters coincide; `+inf` wherever `q`
/// assigns zero mass to a region `p` gives positive probability.
pub fn kl_divergence(p: &dyn Distribution, q: &dyn Distribution) -> Result<Tensor> {
    let pair = (p.as_any().type_id(), q.as_any().type_id());
    if let Some(f) = KL_REGISTRY.get(&pair) {
        return f(p, q);
    }
    if pair.0 == pair.1 {
        if let (Some(pe), Some(qe)) = (p.as_exp_family(), q.as_exp_family()) {
            return ef_kl(pe, qe);
        }
    }
    Err(Error::NotImplemented(
        "kl_divergence for this pair of distribution types".into(),
    ))
}

#[inline]
fn kl_mass_term(p: f64, q: f64) -> f64 {
    // lim p->0 of p ln(p/q) is 0; q = 0 with p > 0 is a support violation.
    if p == 0.0 {
        0.0
    } else if q == 0.0 {
        f64::INFINITY
    } else {
        p * (p.ln() - q.ln())
    }
}

fn kl_bernoulli_bernoulli(p: &dyn Distribution, q: &dyn Distribution) -> Result<Tensor> {
    let (p, q) = cast::<Bernoulli, Bernoulli>(p, q);
    map2(&p.probs(), &q.probs(), |a, b| {
        kl_mass_term(a, b) + kl_mass_term(1.0 - a, 1.0 - b)
    })
}

fn kl_beta_params(a1: f64, b1: f64, a2: f64, b2: f64) -> f64 {
    let ln_b = |a: f64, b: f64| ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b);
    ln_b(a2, b2) - ln_b(a1, b1)
        + (a1 - a2) * digamma(a1)
        + (b1 - b2) * digamma(b1)
        + (a2 - a1 + b2 - b1) * digamma(a1 + b1)
}

fn kl_beta_beta(p: &dyn Distribution, q: &dyn Distribution) -> Result<Tensor> {
    let (p, q) = cast::<Beta, Beta>(p, q);
    let t1 = map2(p.concentration1(), q.concentration1(), |a, b| a - b)?;
    // Evaluate on the four broadcast parameter tensors via two passes.
    let a1 = map2(p.concentration1(), &t1, |a, _| a)?;
    let b1 = map2(p.concentration0(), &t1, |a, _| a)?;
    let a2 = map2(q.concentration1(), &t1, |a, _| a)?;
    let b2 = map2(q.concentration0(), &t1, |a, _| a)?;
    let mut out = a1.to_owned();
    ndarray::Zip::from(&mut out)
        .and(&b1)
        .and(&a2)
        .and(&b2)
        .for_each(|o, &b1, &a2, &b2| *o = kl_beta_params(*o, b1, a2, b2));
    Ok(out.into_shared())
}

fn kl_categorical_rows(p: &Categorical, q: &Categorical) -> Result<Tensor> {
    if p.num_events() != q.num_events() {
        return Err(Error::Validation(
            "categorical KL needs matching category counts".into(),
        ));
    }
    zip_reduce_rows(&p.log_probs()?, &q.log_probs()?, |lp, lq| {
        lp.iter()
            .zip(lq)
            .map(|(&a, &b)| {
                if a == f64::NEG_INFINITY {
                    0.0
                } else if b == f64::NEG_INFINITY {
                    f64::INFINITY
                } else {
                    a.exp() * (a - b)
                }
            })
            .sum()
    })
}

fn kl_categorical_categorical(p: &dyn Distribution, q: &dyn Distribution) -> Result<Tensor> {
    let (p, q) = cast::<Categorical, Categorical>(p, q);
    kl_categorical_rows(p, q)
}

fn kl_onehot_onehot(p: &dyn Distribution, q: &dyn Distribution) -> Result<Tensor> {
    let (p, q) = cast::<OneHotCategorical, OneHotCategorical>(p, q);
    // Identical mass function over one-hot encodings.
    kl_categorical_rows(p.inner(), q.inner())
}

fn kl_gamma_params(a1: f64, r1: f64, a2: f64, r2: f64) -> f64 {
    (a1 - a2) * digamma(a1) - ln_gamma(a1) + ln_gamma(a2) + a2 * (r1.ln() - r2.ln())
        + a1 * (r2 - r1) / r1
}

fn kl_gamma_gamma(p: &dyn Distribution, q: &dyn Distribution) -> Result<Tensor> {
    let (p, q) = cast::<Gamma, Gamma>(p, q);
    gamma_kl_from_params(p.concentration(), p.rate(), q.concentration(), q.rate())
}

fn kl_chi2_chi2(p: &dyn Distribution, q: &dyn Distribution) -> Result<Tensor> {
    let (p, q) = cast::<Chi2, Chi2>(p, q);
    gamma_kl_from_params(
        p.as_gamma().concentration(),
        p.as_gamma().rate(),
        q.as_gamma().concentration(),
        q.as_gamma().rate(),
    )
}

fn gamma_kl_from_params(
    a1: &Tensor,
    r1: &Tensor,
    a2: &Tensor,
    r2: &Tensor,
) -> Result<Tensor> {
    let a1b = map2(a1, a2, |a, _| a)?;
    let mut out = a1b.to_owned();
    let r1b = map2(r1, &a1b, |r, _| r)?;
    let a2b = map2(a2, &a1b, |a, _| a)?;
    let r2b = map2(r2, &a1b, |r, _| r)?;
    ndarray::Zip::from(&mut out)
        .and(&r1b)
        .and(&a2b)
        .and(&r2b)
        .for_each(|o, &r1, &a2, &r2| *o = kl_gamma_params(*o, r1, a2, r2));
    Ok(out.into_shared())
}

fn kl_dirichlet_dirichlet(p: &dyn Distribution, q: &dyn Distribution) -> Result<Tensor> {
    let (p, q) = cast::<Dirichlet, Dirichlet>(p, q);
    zip_reduce_rows(p.concentration(), q.concentration(), |ap, aq| {
        if ap.len() != aq.len() {
            return f64::NAN;
        }
        let a0p: f64 = ap.iter().sum();
        let a0q: f64 = aq.iter().sum();
        let mut acc = ln_gamma(a0p) - ln_gamma(a0q);
        for (&a, &b) in ap.iter().zip(aq) {
            acc += ln_gamma(b) - ln_gamma(a) + (a - b) * (digamma(a) - digamma(a0p));
        }
        acc
    })
}

fn kl_exponential_exponential(p: &dyn Distribution, q: &dyn Distribution) -> Result<Tensor> {
    let (p, q) = cast::<Exponential, Exponential>(p, q);
    map2(p.rate(), q.rate(), |a, b| a.ln() - b.ln() + b / a - 1.0)
}

fn kl_exponential_gamma(p: &dyn Distribution, q: &dyn Distribution) -> Result<Tensor> {
    let (p, q) = cast::<Exponential, Gamma>(p, q);
    let lam = map2(p.rate(), q.concentration(), |l, _| l)?;
    let mut out = lam.to_owned();
    let a = map2(q.concentration(), &lam, |a, _| a)?;
    let b = map2(q.rate(), &lam, |r, _| r)?;
    ndarray::Zip::from(&mut out).and(&a).and(&b).for_each(|o, &a, &b| {
        let lam = *o;
        *o = lam.ln() - 1.0 + (a - 1.0) * (EULER_GAMMA + lam.ln()) + b / lam
            - a * b.ln()
            + ln_gamma(a);
    });
    Ok(out.into_shared())
}

fn kl_geometric_geometric(p: &dyn Distribution, q: &dyn Distribution) -> Result<Tensor> {
    let (p, q) = cast::<Geometric, Geometric>(p, q);
    map2(&p.probs(), &q.probs(), |a, b| {
        let fail = if a == 1.0 {
            0.0
        } else if b == 1.0 {
            f64::INFINITY
        } else {
            (1.0 - a) / a * ((-a).ln_1p() - (-b).ln_1p())
        };
        fail + a.ln() - b.ln()
    })
}

fn kl_gumbel_gumbel(p: &dyn Distribution, q: &dyn Distribution) -> Result<Tensor> {
    let (p, q) = cast::<Gumbel, Gumbel>(p, q);
    let sp = map2(p.scale(), q.scale(), |a, _| a)?;
    let mut out = sp.to_owned();
    let sq = map2(q.scale(), &sp, |a, _| a)?;
    let lp = map2(p.loc(), &sp, |a, _| a)?;
    let lq = map2(q.loc(), &sp, |a, _| a)?;
    ndarray::Zip::from(&mut out)
        .and(&sq)
        .and(&lp)
        .and(&lq)
        .for_each(|o, &sq, &lp, &lq| {
            let ct1 = *o / sq;
            let ct2 = lq / sq;
            let ct3 = lp / sq;
            let t1 = -ct1.ln() - ct2 + ct3;
            let t2 = ct1 * EULER_GAMMA;
            let t3 = (ct2 + ln_gamma(1.0 + ct1) - ct3).exp();
            *o = t1 + t2 + t3 - (1.0 + EULER_GAMMA);
        });
    Ok(out.into_shared())
}

fn kl_laplace_laplace(p: &dyn Distribution, q: &dyn Distribution) -> Result<Tensor> {
    let (p, q) = cast::<Laplace, Laplace>(p, q);
    let bp = map2(p.scale(), q.scale(), |a, _| a)?;
    let mut out = bp.to_owned();
    let bq = map2(q.scale(), &bp, |a, _| a)?;
    let mp = map2(p.loc(), &bp, |a, _| a)?;
    let mq = map2(q.loc(), &bp, |a, _| a)?;
    ndarray::Zip::from(&mut out)
        .and(&bq)
        .and(&mp)
        .and(&mq)
        .for_each(|o, &bq, &mp, &mq| {
            let bp = *o;
            let d = (mp - mq).abs();
            *o = (bq / bp).ln() + d / bq + bp / bq * (-d / bp).exp() - 1.0;
        });
    Ok(out.into_shared())
}

fn kl_normal_params(m1: f64, s1: f64, m2: f64, s2: f64) -> f64 {
    let var_ratio = (s1 / s2) * (s1 / s2);
    let d = (m1 - m2) / s2;
    0.5 * (var_ratio + d * d - 1.0 - var_ratio.ln())
}

fn kl_normal_normal(p: &dyn Distribution, q: &dyn Distribution) -> Result<Tensor> {
    let (p, q) = cast::<Normal, Normal>(p, q);
    normal_kl_from_params(p.loc(), p.scale(), q.loc(), q.scale())
}

fn kl_lognormal_lognormal(p: &dyn Distribution, q: &dyn Distribution) -> Result<Tensor> {
    let (p, q) = cast::<LogNormal, LogNormal>(p, q);
    // KL is invariant under the shared exp transform.
    normal_kl_from_params(p.loc(), p.scale(), q.loc(), q.scale())
}

fn normal_kl_from_params(
    m1: &Tensor,
    s1: &Tensor,
    m2: &Tensor,
    s2: &Tensor,
) -> Result<Tensor> {
    let m1b = map2(m1, m2, |a, _| a)?;
    let mut out = m1b.to_owned();
    let s1b = map2(s1, &m1b, |a, _| a)?;
    let m2b = map2(m2, &m1b, |a, _| a)?;
    let s2b = map2(s2, &m1b, |a, _| a)?;
    ndarray::Zip::from(&mut out)
        .and(&s1b)
        .and(&m2b)
        .and(&s2b)
        .for_each(|o, &s1, &m2, &s2| *o = kl_normal_params(*o, s1, m2, s2));
    Ok(out.into_shared())
}

fn kl_pareto_pareto(p: &dyn Distribution, q: &dyn Distribution) -> Result<Tensor> {
    let (p, q) = cast::<Pareto, Pareto>(p, q);
    let mp = map2(p.scale(), q.scale(), |a, _| a)?;
    let mut out = mp.to_owned();
    let mq = map2(q.scale(), &mp, |a, _| a)?;
    let ap = map2(p.alpha(), &mp, |a, _| a)?;
    let aq = map2(q.alpha(), &mp, |a, _| a)?;
    ndarray::Zip::from(&mut out)
        .and(&mq)
        .and(&ap)
        .and(&aq)
        .for_each(|o, &mq, &ap, &aq| {
            let mp = *o;
            *o = if mp < mq {
                // q has no mass on [mp, mq)
                f64::INFINITY
            } else {
                aq * (mp / mq).ln() + (ap / aq).ln() + aq / ap - 1.0
            };
        });
    Ok(out.into_shared())
}

fn kl_poisson_poisson(p: &dyn Distribution, q: &dyn Distribution) -> Result<Tensor> {
    let (p, q) = cast::<Poisson, Poisson>(p, q);
    map2(p.rate(), q.rate(), |a, b| a * (a.ln() - b.ln()) - a + b)
}

fn kl_uniform_uniform(p: &dyn Distribution, q: &dyn Distribution) -> Result<Tensor> {
    let (p, q) = cast::<Uniform, Uniform>(p, q);
    let lp = map2(p.low(), q.low(), |a, _| a)?;
    let mut out = lp.to_owned();
    let hp = map2(p.high(), &lp, |a, _| a)?;
    let lq = map2(q.low(), &lp, |a, _| a)?;
    let hq = map2(q.high(), &lp, |a, _| a)?;
    ndarray::Zip::from(&mut out)
        .and(&hp)
        .and(&lq)
        .and(&hq)
        .for_each(|o, &hp, &lq, &hq| {
            let lp = *o;
            *o = if lq > lp || hq < hp {
                f64::INFINITY
            } else {
                ((hq - lq) / (hp - lp)).ln()
            };
        });
    Ok(out.into_shared())
}

fn kl_uniform_beta(p: &dyn Distribution, q: &dyn Distribution) -> Result<Tensor> {
    let (p, q) = cast::<Uniform, Beta>(p, q);
    let lo = map2(p.low(), q.concentration1(), |a, _| a)?;
    let mut out = lo.to_owned();
    let hi = map2(p.high(), &lo, |a, _| a)?;
    let a = map2(q.concentration1(), &lo, |v, _| v)?;
    let b = map2(q.concentration0(), &lo, |v, _| v)?;
    ndarray::Zip::from(&mut out)
        .and(&hi)
        .and(&a)
        .and(&b)
        .for_each(|o, &hi, &a, &b| {
            let lo = *o;
            if lo < 0.0 || hi > 1.0 {
                *o = f64::INFINITY;
                return;
            }
            let xlnx = |x: f64| if x == 0.0 { 0.0 } else { x * x.ln() };
            let width = hi - lo;
            // E_p[ln x] and E_p[ln(1-x)] in closed form
            let e_ln_x = (xlnx(hi) - xlnx(lo)) / width - 1.0;
            let e_ln_1mx = (xlnx(1.0 - lo) - xlnx(1.0 - hi)) / width - 1.0;
            let ln_beta = ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b);
            *o = -width.ln() - (a - 1.0) * e_ln_x - (b - 1.0) * e_ln_1mx + ln_beta;
        });
    Ok(out.into_shared())
}

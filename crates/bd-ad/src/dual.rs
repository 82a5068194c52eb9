//! Forward-mode automatic differentiation via dual numbers.

use std::iter::Sum;
use std::ops::{Add, Div, Mul, Neg, Sub};

use statrs::function::gamma::{digamma, ln_gamma};

/// A dual number for forward-mode AD.
///
/// `val` holds the primal value, `dot` holds the derivative with respect
/// to whichever input was seeded with [`Dual::var`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dual {
    /// Primal (function) value.
    pub val: f64,
    /// Tangent (derivative) value.
    pub dot: f64,
}

impl Dual {
    /// Create a constant (derivative = 0).
    #[inline]
    pub fn constant(val: f64) -> Self {
        Self { val, dot: 0.0 }
    }

    /// Create an independent variable (derivative = 1).
    #[inline]
    pub fn var(val: f64) -> Self {
        Self { val, dot: 1.0 }
    }

    /// Create a dual with explicit tangent.
    #[inline]
    pub fn new(val: f64, dot: f64) -> Self {
        Self { val, dot }
    }

    /// Natural logarithm: d/dx ln(x) = 1/x.
    #[inline]
    pub fn ln(self) -> Self {
        Self { val: self.val.ln(), dot: self.dot / self.val }
    }

    /// `ln(1 + x)`: d/dx = 1/(1+x).
    #[inline]
    pub fn ln_1p(self) -> Self {
        Self { val: self.val.ln_1p(), dot: self.dot / (1.0 + self.val) }
    }

    /// Exponential: d/dx exp(x) = exp(x).
    #[inline]
    pub fn exp(self) -> Self {
        let e = self.val.exp();
        Self { val: e, dot: self.dot * e }
    }

    /// Square root: d/dx sqrt(x) = 1/(2*sqrt(x)).
    #[inline]
    pub fn sqrt(self) -> Self {
        let s = self.val.sqrt();
        Self { val: s, dot: self.dot / (2.0 * s) }
    }

    /// Integer power: d/dx x^n = n * x^(n-1).
    #[inline]
    pub fn powi(self, n: i32) -> Self {
        Self { val: self.val.powi(n), dot: self.dot * (n as f64) * self.val.powi(n - 1) }
    }

    /// Log-gamma: d/dx ln Γ(x) = ψ(x) (the digamma function).
    #[inline]
    pub fn ln_gamma(self) -> Self {
        Self { val: ln_gamma(self.val), dot: self.dot * digamma(self.val) }
    }

    /// Stable `log(1 + exp(x))`; tangent is the sigmoid of `x`.
    #[inline]
    pub fn log1pexp(self) -> Self {
        let val = if self.val > 0.0 {
            self.val + (-self.val).exp().ln_1p()
        } else {
            self.val.exp().ln_1p()
        };
        let sig = 1.0 / (1.0 + (-self.val).exp());
        Self { val, dot: self.dot * sig }
    }
}

impl Add for Dual {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self { val: self.val + rhs.val, dot: self.dot + rhs.dot }
    }
}

impl Sub for Dual {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self { val: self.val - rhs.val, dot: self.dot - rhs.dot }
    }
}

impl Mul for Dual {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self { val: self.val * rhs.val, dot: self.dot * rhs.val + self.val * rhs.dot }
    }
}

impl Div for Dual {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        Self {
            val: self.val / rhs.val,
            dot: (self.dot * rhs.val - self.val * rhs.dot) / (rhs.val * rhs.val),
        }
    }
}

impl Neg for Dual {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self { val: -self.val, dot: -self.dot }
    }
}

impl Add<f64> for Dual {
    type Output = Self;
    #[inline]
    fn add(self, rhs: f64) -> Self {
        Self { val: self.val + rhs, dot: self.dot }
    }
}

impl Sub<f64> for Dual {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: f64) -> Self {
        Self { val: self.val - rhs, dot: self.dot }
    }
}

impl Mul<f64> for Dual {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f64) -> Self {
        Self { val: self.val * rhs, dot: self.dot * rhs }
    }
}

impl Sum for Dual {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Dual::constant(0.0), |acc, x| acc + x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fd(f: impl Fn(f64) -> f64, x: f64) -> f64 {
        let eps = 1e-6;
        (f(x + eps) - f(x - eps)) / (2.0 * eps)
    }

    #[test]
    fn test_ln_gamma_tangent_is_digamma() {
        for x in [0.3, 1.0, 2.5, 7.0] {
            let d = Dual::var(x).ln_gamma();
            assert_relative_eq!(d.val, ln_gamma(x), epsilon = 1e-12);
            assert_relative_eq!(d.dot, fd(ln_gamma, x), epsilon = 1e-5);
        }
    }

    #[test]
    fn test_log1pexp_matches_naive() {
        for x in [-30.0, -2.0, 0.0, 1.5, 30.0] {
            let d = Dual::var(x).log1pexp();
            let naive = if x > 500.0 { x } else { (1.0 + x.exp()).ln() };
            assert_relative_eq!(d.val, naive, epsilon = 1e-10);
            let sig = 1.0 / (1.0 + (-x).exp());
            assert_relative_eq!(d.dot, sig, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_product_rule() {
        // d/dx [x * ln(x)] = ln(x) + 1
        let x = 3.0;
        let d = Dual::var(x) * Dual::var(x).ln();
        assert_relative_eq!(d.dot, x.ln() + 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_quotient_and_neg() {
        // d/dx [-x^2 / (x + 1)] at x=2
        let x = Dual::var(2.0);
        let d = -(x * x) / (x + 1.0);
        let g = fd(|x| -(x * x) / (x + 1.0), 2.0);
        assert_relative_eq!(d.dot, g, epsilon = 1e-6);
    }
}

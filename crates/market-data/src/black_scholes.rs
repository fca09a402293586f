//! Black-Scholes pricing for European options.
//!
//! `black_scholes_price` is undefined when σ·√T is zero; callers check
//! [`BSInputs::is_priceable`] first.

use std::f64::consts::PI;
use crate::types::{BSInputs, OptionType};

/// Abramowitz–Stegun 26.2.17 coefficients
const P: f64 = 0.2316419;
const B1: f64 = 0.319381530;
const B2: f64 = -0.356563782;
const B3: f64 = 1.781477937;
const B4: f64 = -1.821255978;
const B5: f64 = 1.330274429;

pub fn norm_pdf(x: f64) -> f64 {
    (1.0 / (2.0 * PI).sqrt()) * (-0.5 * x * x).exp()
}

/// Standard normal CDF, absolute error below 7.5e-8
pub fn norm_cdf(x: f64) -> f64 {
    let k = 1.0 / (1.0 + P * x.abs());
    let poly = k * (B1 + k * (B2 + k * (B3 + k * (B4 + k * B5))));

    let approx = 1.0 - norm_pdf(x) * poly;

    if x >= 0.0 {
        approx
    } else {
        1.0 - approx
    }
}

pub fn d1_d2(input: &BSInputs) -> (f64, f64) {
    let s = input.spot;
    let k = input.strike;
    let t = input.time;
    let v = input.vol;
    let r = input.rate;

    let vol_sqrt_t = v * t.sqrt();
    let d1 = ((s / k).ln() + (r + 0.5 * v * v) * t) / vol_sqrt_t;
    let d2 = d1 - vol_sqrt_t;

    (d1, d2)
}

pub fn black_scholes_price(input: BSInputs) -> f64 {
    let (d1, d2) = d1_d2(&input);
    let s = input.spot;
    let k = input.strike;
    let discount = (-input.rate * input.time).exp();

    match input.option_type {
        OptionType::Call => s * norm_cdf(d1) - k * discount * norm_cdf(d2),
        OptionType::Put => k * discount * norm_cdf(-d2) - s * norm_cdf(-d1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(option_type: OptionType) -> BSInputs {
        BSInputs {
            spot: 100.0,
            strike: 100.0,
            time: 1.0,
            vol: 0.2,
            rate: 0.05,
            option_type,
        }
    }

    #[test]
    fn test_put_call_parity() {
        let call = black_scholes_price(inputs(OptionType::Call));
        let put = black_scholes_price(inputs(OptionType::Put));

        let parity_rhs = 100.0 - 100.0 * (-0.05_f64).exp();
        assert!((call - put - parity_rhs).abs() < 1e-6);
    }

    #[test]
    fn test_reference_values() {
        // Hull: S=K=100, T=1, r=5%, σ=20% → call 10.4506, put 5.5735
        let call = black_scholes_price(inputs(OptionType::Call));
        let put = black_scholes_price(inputs(OptionType::Put));
        assert!((call - 10.4506).abs() < 1e-3);
        assert!((put - 5.5735).abs() < 1e-3);
    }

    #[test]
    fn test_deep_itm_call_near_forward_intrinsic() {
        let mut input = inputs(OptionType::Call);
        input.spot = 200.0;
        let price = black_scholes_price(input);
        let forward_intrinsic = 200.0 - 100.0 * (-0.05_f64).exp();
        assert!((price - forward_intrinsic).abs() < 1e-3);
    }

    #[test]
    fn test_norm_cdf_symmetry() {
        assert!((norm_cdf(0.5) + norm_cdf(-0.5) - 1.0).abs() < 1e-10);
        assert!((norm_cdf(0.0) - 0.5).abs() < 1e-7);
    }

    #[test]
    fn test_norm_cdf_accuracy() {
        // Φ(1) = 0.841344746, Φ(-1.96) = 0.024997895
        assert!((norm_cdf(1.0) - 0.841344746).abs() < 7.5e-8);
        assert!((norm_cdf(-1.96) - 0.024997895).abs() < 7.5e-8);
    }

    #[test]
    fn test_norm_cdf_extreme() {
        assert!((norm_cdf(10.0) - 1.0).abs() < 1e-10);
        assert!(norm_cdf(-10.0).abs() < 1e-10);
    }

    #[test]
    fn test_zero_vol_time_is_undefined() {
        let mut input = inputs(OptionType::Call);
        input.time = 0.0;
        assert!(!input.is_priceable());
        assert!(black_scholes_price(input).is_nan());
    }
}

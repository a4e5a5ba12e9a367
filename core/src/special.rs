//! Special functions needed by the likelihoods and the closed-form predictions.

use std::f64::consts::PI;

const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEF: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// Natural log of |Γ(x)| (Lanczos approximation, reflection below 0.5).
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        return (PI / (PI * x).sin().abs()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let t = x + LANCZOS_G + 0.5;
    let series = LANCZOS_COEF
        .iter()
        .enumerate()
        .skip(1)
        .fold(LANCZOS_COEF[0], |acc, (i, c)| acc + c / (x + i as f64));
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

/// log(exp(a) + exp(b)) without overflow.
pub fn ln_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let hi = a.max(b);
    hi + ((a - hi).exp() + (b - hi).exp()).ln()
}

const HYP2F1_MAX_TERMS: usize = 200_000;

/// Gauss hypergeometric function 2F1(a, b; c; z) for 0 <= z < 1.
///
/// Returns NaN when z is outside [0, 1), when c is a non-positive integer,
/// or when the value does not fit in an f64. Use [`ln_hyp2f1`] when the
/// result can be very large.
pub fn hyp2f1(a: f64, b: f64, c: f64, z: f64) -> f64 {
    let ln = ln_hyp2f1(a, b, c, z);
    if ln.is_nan() {
        return f64::NAN;
    }
    let value = ln.exp();
    if value.is_finite() { value } else { f64::NAN }
}

/// Natural log of 2F1(a, b; c; z) for 0 <= z < 1, positive-valued cases.
///
/// Sums the power series directly. When that overflows or fails to settle,
/// which happens for large a, b as z approaches 1, falls back to Euler's
/// transformation
///   2F1(a, b; c; z) = (1 − z)^(c−a−b) · 2F1(c−a, c−b; c; z)
/// whose series has small parameters and is summed with a log offset.
pub fn ln_hyp2f1(a: f64, b: f64, c: f64, z: f64) -> f64 {
    if !(0.0..1.0).contains(&z) {
        return f64::NAN;
    }
    if c <= 0.0 && c.fract() == 0.0 {
        return f64::NAN;
    }
    if z == 0.0 {
        return 0.0;
    }

    let direct = ln_series(a, b, c, z);
    if direct.is_finite() {
        return direct;
    }
    let transformed = ln_series(c - a, c - b, c, z);
    if transformed.is_finite() {
        return transformed + (c - a - b) * (1.0 - z).ln();
    }
    f64::NAN
}

/// Power series for ln 2F1, rescaling the running sum so that huge partial
/// sums do not overflow. NaN when the sum is not positive or does not settle.
fn ln_series(a: f64, b: f64, c: f64, z: f64) -> f64 {
    const RESCALE_ABOVE: f64 = 1e250;

    let mut offset = 0.0;
    let mut term = 1.0;
    let mut sum = 1.0;
    for k in 0..HYP2F1_MAX_TERMS {
        let k = k as f64;
        term *= (a + k) * (b + k) / ((c + k) * (k + 1.0)) * z;
        sum += term;
        if !sum.is_finite() || !term.is_finite() {
            return f64::NAN;
        }
        if sum.abs() > RESCALE_ABOVE {
            offset += RESCALE_ABOVE.ln();
            sum /= RESCALE_ABOVE;
            term /= RESCALE_ABOVE;
        }
        if term == 0.0 || (term.abs() <= f64::EPSILON * sum.abs() && k > a.abs().max(b.abs())) {
            return if sum > 0.0 { sum.ln() + offset } else { f64::NAN };
        }
    }
    f64::NAN
}

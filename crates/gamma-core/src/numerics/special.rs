use std::f64::consts::PI;

const SERIES_CUTOFF: f64 = 2.0;
const CONTINUED_FRACTION_TERMS: usize = 80;
const SERIES_MAX_TERMS: usize = 200;

/// Error function, accurate to roughly 1e-14 over the whole real line.
///
/// Maclaurin series below `|x| = 2`, continued fraction for the complement above.
pub fn erf(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if x < 0.0 {
        return -erf(-x);
    }
    if x < SERIES_CUTOFF {
        erf_series(x)
    } else {
        1.0 - erfc_continued_fraction(x)
    }
}

fn erf_series(x: f64) -> f64 {
    let x_sq = x * x;
    let mut term = x;
    let mut sum = x;
    for n in 1..SERIES_MAX_TERMS {
        term *= -x_sq / n as f64;
        let contribution = term / (2 * n + 1) as f64;
        sum += contribution;
        if contribution.abs() <= f64::EPSILON * sum.abs() {
            break;
        }
    }
    sum * 2.0 / PI.sqrt()
}

fn erfc_continued_fraction(x: f64) -> f64 {
    if x.is_infinite() {
        return 0.0;
    }
    let mut tail = x;
    for n in (1..=CONTINUED_FRACTION_TERMS).rev() {
        tail = x + (n as f64 * 0.5) / tail;
    }
    (-x * x).exp() / (PI.sqrt() * tail)
}

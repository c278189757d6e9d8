//! Fit of the low-dimensional similarity curve `1 / (1 + a * x^(2b))`.
//!
//! The target is the offset exponential determined by `spread` and
//! `min_dist`: 1.0 below `min_dist`, `exp(-(x - min_dist) / spread)` above.
//! Fitted by Levenberg-Marquardt least squares from `(a, b) = (1, 1)`.

use crate::config::constants::umap;

const MAX_ITERATIONS: usize = 200;
const CONVERGENCE: f64 = 1e-12;

#[inline]
fn curve(x: f64, a: f64, b: f64) -> f64 {
    1.0 / (1.0 + a * x.powf(2.0 * b))
}

fn target(x: f64, spread: f64, min_dist: f64) -> f64 {
    if x < min_dist {
        1.0
    } else {
        (-(x - min_dist) / spread).exp()
    }
}

fn sum_squared_error(xs: &[f64], ys: &[f64], a: f64, b: f64) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(&x, &y)| {
            let r = curve(x, a, b) - y;
            r * r
        })
        .sum()
}

/// Fit `(a, b)` for the given `spread` and `min_dist`.
///
/// For `spread = 1.0, min_dist = 0.1` this yields approximately
/// `a = 1.577, b = 0.895`.
pub fn find_ab_params(spread: f64, min_dist: f64) -> (f64, f64) {
    let n = umap::CURVE_SAMPLES;
    let upper = 3.0 * spread;
    let xs: Vec<f64> = (0..n)
        .map(|i| upper * i as f64 / (n - 1) as f64)
        .collect();
    let ys: Vec<f64> = xs.iter().map(|&x| target(x, spread, min_dist)).collect();

    let mut a = 1.0;
    let mut b = 1.0;
    let mut damping = 1e-3;
    let mut cost = sum_squared_error(&xs, &ys, a, b);

    for _ in 0..MAX_ITERATIONS {
        // Normal equations J^T J and J^T r for the two parameters
        let (mut jaa, mut jab, mut jbb, mut ga, mut gb) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for (&x, &y) in xs.iter().zip(&ys) {
            let u = x.powf(2.0 * b);
            let denom = (1.0 + a * u).powi(2);
            let r = curve(x, a, b) - y;
            let da = -u / denom;
            let db = if x > 0.0 {
                -2.0 * a * u * x.ln() / denom
            } else {
                0.0
            };
            jaa += da * da;
            jab += da * db;
            jbb += db * db;
            ga += da * r;
            gb += db * r;
        }

        let mut improved = false;
        while damping < 1e12 {
            let m_aa = jaa * (1.0 + damping);
            let m_bb = jbb * (1.0 + damping);
            let det = m_aa * m_bb - jab * jab;
            if det.abs() < f64::MIN_POSITIVE {
                damping *= 10.0;
                continue;
            }
            let step_a = -(m_bb * ga - jab * gb) / det;
            let step_b = -(m_aa * gb - jab * ga) / det;
            let new_a = a + step_a;
            let new_b = b + step_b;
            if new_a > 0.0 && new_b > 0.0 {
                let new_cost = sum_squared_error(&xs, &ys, new_a, new_b);
                if new_cost < cost {
                    let delta = cost - new_cost;
                    a = new_a;
                    b = new_b;
                    cost = new_cost;
                    damping = (damping / 10.0).max(1e-12);
                    improved = delta > CONVERGENCE;
                    break;
                }
            }
            damping *= 10.0;
        }

        if !improved {
            break;
        }
    }

    tracing::debug!(spread, min_dist, a, b, residual = cost, "Fitted UMAP curve parameters");

    (a, b)
}

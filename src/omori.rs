//! Omori-law temporal machinery and magnitude scaling relations.
//!
//! The expected number of primary aftershocks between `t_min` and `t_max`
//! (days since the parent) integrates the modified Omori rate
//! `k * 10^(magMain - magMin) / (t + c)^p`; event times are drawn from the
//! matching inverse CDF. Counts are Poisson-distributed around the expected
//! number.

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Poisson};

pub const MILLIS_PER_DAY: f64 = 86_400_000.0;
pub const MILLIS_PER_YEAR: f64 = 365.25 * MILLIS_PER_DAY;

/// Expected number of primary aftershocks in `[t_min_days, t_max_days]`.
/// `p` must be > 1 (not checked).
pub fn expected_num_primary(
    k: f64,
    p: f64,
    mag_main: f64,
    mag_min: f64,
    c_days: f64,
    t_min_days: f64,
    t_max_days: f64,
) -> f64 {
    let one_minus_p = 1.0 - p;
    k * 10f64.powf(mag_main - mag_min) / one_minus_p
        * ((c_days + t_max_days).powf(one_minus_p) - (c_days + t_min_days).powf(one_minus_p))
}

/// A random event time in `[t_min, t_max]` days, drawn from the Omori-law
/// inverse CDF.
pub fn random_time_of_event(rng: &mut StdRng, c_days: f64, p: f64, t_min: f64, t_max: f64) -> f64 {
    let r = rng.random::<f64>();
    if p != 1.0 {
        let a1 = (t_max + c_days).powf(1.0 - p);
        let a2 = (t_min + c_days).powf(1.0 - p);
        let a3 = r * a1 + (1.0 - r) * a2;
        a3.powf(1.0 / (1.0 - p)) - c_days
    } else {
        let a1 = (t_max + c_days).ln();
        let a2 = (t_min + c_days).ln();
        (r * a1 + (1.0 - r) * a2).exp() - c_days
    }
}

/// A random set of primary aftershock event times (days since the parent):
/// Poisson count around the expected number, times drawn independently.
pub fn random_event_times(
    rng: &mut StdRng,
    k: f64,
    p: f64,
    mag_main: f64,
    mag_min: f64,
    c_days: f64,
    t_min_days: f64,
    t_max_days: f64,
) -> Vec<f64> {
    let expected = expected_num_primary(k, p, mag_main, mag_min, c_days, t_min_days, t_max_days);
    let num = poisson_draw(rng, expected);
    (0..num)
        .map(|_| random_time_of_event(rng, c_days, p, t_min_days, t_max_days))
        .collect()
}

/// A Poisson-distributed count with mean `lambda`; zero for non-positive or
/// non-finite means.
pub fn poisson_draw(rng: &mut StdRng, lambda: f64) -> usize {
    if !(lambda > 0.0) || !lambda.is_finite() {
        return 0;
    }
    match Poisson::new(lambda) {
        Ok(dist) => dist.sample(rng) as usize,
        Err(_) => 0,
    }
}

/// Analytic fraction of triggered events inside `distance` of the parent for
/// decay exponent `q` and minimum distance `d`.
pub fn decay_fraction_inside_distance(q: f64, min_dist: f64, distance: f64) -> f64 {
    let one_minus_q = 1.0 - q;
    -((distance + min_dist).powf(one_minus_q) - min_dist.powf(one_minus_q))
        / min_dist.powf(one_minus_q)
}

/// Rupture area in km^2 from magnitude, via `mag = log10(area) + 4`.
pub fn rupture_area_km2_from_mag(mag: f64) -> f64 {
    10f64.powf(mag - 4.0)
}

/// Rupture radius in km assuming a circular rupture of the above area.
pub fn rupture_radius_km_from_mag(mag: f64) -> f64 {
    (rupture_area_km2_from_mag(mag) / std::f64::consts::PI).sqrt()
}

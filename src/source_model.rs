//! Seam to the external long-term forecast.
//!
//! The cascade needs three things from the outer model: how many gridded
//! sources exist, a way to draw a concrete rupture (magnitude, rake) for a
//! source index from a uniform variate, and the total magnitude-frequency
//! distribution for the time-dependent spontaneous-rate correction. The
//! `SourceModel` trait captures exactly that; a truncated Gutenberg-Richter
//! implementation ships with the crate for tests and demos.

/// A discretized incremental magnitude-frequency distribution: annual rate
/// per magnitude bin.
#[derive(Debug, Clone)]
pub struct MagFreqDist {
    min_mag: f64,
    delta: f64,
    rates: Vec<f64>,
}

impl MagFreqDist {
    pub fn new(min_mag: f64, delta: f64, rates: Vec<f64>) -> Self {
        Self {
            min_mag,
            delta,
            rates,
        }
    }

    /// Truncated Gutenberg-Richter distribution with the given b-value,
    /// scaled so the incremental rates sum to `total_rate`.
    pub fn gutenberg_richter(
        min_mag: f64,
        max_mag: f64,
        delta: f64,
        total_rate: f64,
        b_value: f64,
    ) -> Self {
        let num_bins = (((max_mag - min_mag) / delta).round() as usize).max(1);
        let mut rates: Vec<f64> = (0..num_bins)
            .map(|i| {
                let mag = min_mag + (i as f64 + 0.5) * delta;
                10f64.powf(-b_value * mag)
            })
            .collect();
        let sum: f64 = rates.iter().sum();
        if sum > 0.0 {
            for r in &mut rates {
                *r *= total_rate / sum;
            }
        }
        Self {
            min_mag,
            delta,
            rates,
        }
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Bin-center magnitude of bin `i`.
    pub fn mag(&self, i: usize) -> f64 {
        self.min_mag + (i as f64 + 0.5) * self.delta
    }

    pub fn rate(&self, i: usize) -> f64 {
        self.rates[i]
    }

    /// Total incremental rate across all bins. May be NaN for malformed
    /// input; callers must guard before normalizing.
    pub fn total_rate(&self) -> f64 {
        self.rates.iter().sum()
    }

    pub fn scale(&mut self, factor: f64) {
        for r in &mut self.rates {
            *r *= factor;
        }
    }
}

/// A concrete rupture drawn from a source.
#[derive(Debug, Clone, Copy)]
pub struct SourceRupture {
    pub magnitude: f64,
    pub rake: f64,
}

/// The long-term forecast the cascade consumes.
///
/// Implementations must be shareable read-only across catalog workers.
pub trait SourceModel: Send + Sync {
    fn num_sources(&self) -> usize;

    /// Number of distinct ruptures the source can produce.
    fn num_ruptures_for_source(&self, source_index: usize) -> usize;

    /// Draw a rupture for the source from a uniform variate `u` in
    /// `[0, 1)`. Returns the rupture's index within the source along with
    /// its properties.
    fn draw_rupture(&self, source_index: usize, u: f64) -> (usize, SourceRupture);

    /// The total magnitude-frequency distribution summed over all sources.
    fn magnitude_frequency_dist(&self) -> &MagFreqDist;
}

/// Every source shares one truncated Gutenberg-Richter magnitude
/// distribution; rupture index = magnitude bin.
#[derive(Debug, Clone)]
pub struct GutenbergRichterSourceModel {
    num_sources: usize,
    mfd: MagFreqDist,
    /// Normalized CDF over magnitude bins for quantile draws.
    cdf: Vec<f64>,
    rake: f64,
}

impl GutenbergRichterSourceModel {
    pub fn new(num_sources: usize, mfd: MagFreqDist, rake: f64) -> Self {
        let total = mfd.total_rate();
        let mut running = 0.0;
        let cdf = (0..mfd.len())
            .map(|i| {
                running += mfd.rate(i);
                if total > 0.0 {
                    running / total
                } else {
                    1.0
                }
            })
            .collect();
        Self {
            num_sources,
            mfd,
            cdf,
            rake,
        }
    }
}

impl SourceModel for GutenbergRichterSourceModel {
    fn num_sources(&self) -> usize {
        self.num_sources
    }

    fn num_ruptures_for_source(&self, _source_index: usize) -> usize {
        self.mfd.len()
    }

    fn draw_rupture(&self, _source_index: usize, u: f64) -> (usize, SourceRupture) {
        let bin = self
            .cdf
            .partition_point(|c| *c <= u)
            .min(self.cdf.len().saturating_sub(1));
        (
            bin,
            SourceRupture {
                magnitude: self.mfd.mag(bin),
                rake: self.rake,
            },
        )
    }

    fn magnitude_frequency_dist(&self) -> &MagFreqDist {
        &self.mfd
    }
}

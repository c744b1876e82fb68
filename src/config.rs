//! Run configuration: ETAS parameters and simulation options.
//!
//! Values can be built in code (via `Default` + struct update) or loaded
//! from a TOML file. All parameters are validated once, at construction of
//! the simulation context; invalid discretizations or parameter ranges are
//! fatal there rather than deep inside the cascade loop.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid parameter '{param}': {value}")]
    InvalidParameter { param: &'static str, value: f64 },

    #[error("Invalid time horizon: start ({start_ms}) >= end ({end_ms})")]
    InvalidHorizon { start_ms: i64, end_ms: i64 },
}

/// How per-parent-location cube samplers are weighted.
///
/// Selected once per run; `RatesOnly` shares a single global sampler across
/// all parent locations, the other two build (and memoize) one sampler per
/// parent-location index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerWeighting {
    /// Long-term nucleation rates only, no spatial decay.
    RatesOnly,
    /// Spatial decay only, ignoring long-term rates (no-fault testing mode).
    DecayOnly,
    /// rate[cube] x decay(relative offset); the production mode.
    Combined,
}

impl Default for TriggerWeighting {
    fn default() -> Self {
        TriggerWeighting::Combined
    }
}

/// ETAS model parameters.
///
/// Defaults are the Hardebeck et al. (2008) California values:
/// k = 0.008, p = 1.34, c = 0.095 days, q = 1.96, d = 0.79 km,
/// completeness magnitude 2.5.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EtasParams {
    /// Productivity.
    pub k: f64,
    /// Omori temporal decay exponent (> 1).
    pub p: f64,
    /// Omori time offset, in days.
    pub c_days: f64,
    /// Distance-decay exponent q (> 1).
    pub dist_decay_q: f64,
    /// Minimum-distance offset d, in km.
    pub min_dist_km: f64,
    /// Minimum magnitude of completeness.
    pub mag_min: f64,
    /// Maximum triggering distance, in km; density is zero beyond this.
    pub max_trigger_dist_km: f64,
    /// Whether the elastic-rebound eligibility correction is applied.
    pub apply_elastic_rebound: bool,
    /// Half-width of the elastic-rebound eligibility ramp, in km.
    /// Empirical; the default is carried over unchanged from the source
    /// calibration and should not be silently re-tuned.
    pub ert_ramp_half_width_km: f64,
    /// Positional fuzz applied to parent trigger locations, in degrees
    /// (sign randomized per axis). Empirical; default carried over.
    pub trigger_loc_fuzz_deg: f64,
}

impl Default for EtasParams {
    fn default() -> Self {
        Self {
            k: 0.008,
            p: 1.34,
            c_days: 0.095,
            dist_decay_q: 1.96,
            min_dist_km: 0.79,
            mag_min: 2.5,
            max_trigger_dist_km: 1000.0,
            apply_elastic_rebound: true,
            ert_ramp_half_width_km: 1.24,
            trigger_loc_fuzz_deg: 0.005,
        }
    }
}

impl EtasParams {
    /// Validate parameter ranges. Called by the simulation context; fatal
    /// at construction time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, f64, bool); 8] = [
            ("k", self.k, self.k >= 0.0 && self.k.is_finite()),
            ("p", self.p, self.p > 1.0),
            ("c_days", self.c_days, self.c_days > 0.0),
            ("dist_decay_q", self.dist_decay_q, self.dist_decay_q > 1.0),
            ("min_dist_km", self.min_dist_km, self.min_dist_km > 0.0),
            ("mag_min", self.mag_min, self.mag_min.is_finite()),
            (
                "max_trigger_dist_km",
                self.max_trigger_dist_km,
                self.max_trigger_dist_km > 0.0,
            ),
            (
                "ert_ramp_half_width_km",
                self.ert_ramp_half_width_km,
                self.ert_ramp_half_width_km > 0.0,
            ),
        ];
        for (param, value, ok) in checks {
            if !ok {
                return Err(ConfigError::InvalidParameter { param, value });
            }
        }
        if self.trigger_loc_fuzz_deg < 0.0 {
            return Err(ConfigError::InvalidParameter {
                param: "trigger_loc_fuzz_deg",
                value: self.trigger_loc_fuzz_deg,
            });
        }
        Ok(())
    }
}

/// Options for a single simulation run (horizon, seeding, limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationOptions {
    /// Simulation horizon start, epoch milliseconds.
    pub sim_start_ms: i64,
    /// Simulation horizon end, epoch milliseconds.
    pub sim_end_ms: i64,
    /// Whether spontaneous background events are sampled at seeding.
    pub include_spontaneous: bool,
    /// Whether processed ruptures spawn their own offspring (second and
    /// later generations). With this off only seeded events are processed.
    pub include_indirect_triggering: bool,
    /// Start of the historic catalog used by the time-dependent
    /// spontaneous-rate correction; defaults to the simulation start.
    pub historic_catalog_start_ms: Option<i64>,
    /// Number of time bins for the discretized spontaneous-rate function.
    pub num_spontaneous_time_bins: usize,
    /// Maximum number of processed events before the run truncates.
    pub max_events: Option<usize>,
    /// Wall-clock budget before the run truncates, in seconds.
    pub max_wall_clock_secs: Option<u64>,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            sim_start_ms: 0,
            // one year
            sim_end_ms: 31_557_600_000,
            include_spontaneous: true,
            include_indirect_triggering: true,
            historic_catalog_start_ms: None,
            num_spontaneous_time_bins: 1000,
            max_events: None,
            max_wall_clock_secs: None,
        }
    }
}

impl SimulationOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sim_start_ms >= self.sim_end_ms {
            return Err(ConfigError::InvalidHorizon {
                start_ms: self.sim_start_ms,
                end_ms: self.sim_end_ms,
            });
        }
        if self.num_spontaneous_time_bins == 0 {
            return Err(ConfigError::InvalidParameter {
                param: "num_spontaneous_time_bins",
                value: 0.0,
            });
        }
        Ok(())
    }

    /// Horizon length in days.
    pub fn duration_days(&self) -> f64 {
        (self.sim_end_ms - self.sim_start_ms) as f64 / crate::omori::MILLIS_PER_DAY
    }
}

/// Top-level configuration: model parameters, run options, sampler mode.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EtasConfig {
    pub params: EtasParams,
    pub options: SimulationOptions,
    pub weighting: TriggerWeighting,
}

impl EtasConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: EtasConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.params.validate()?;
        self.options.validate()
    }
}

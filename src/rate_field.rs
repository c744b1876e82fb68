//! Per-cube long-term nucleation rates derived from the gridded sources.
//!
//! Each gridded source's annual rate is spread uniformly across the cubes
//! its cell maps into (`sub_points^2 * num_cube_depths` cubes per source
//! cell), so the sum over all cubes conserves the sum of the input source
//! rates. Built once per run; rebuilding is explicit and the owning context
//! drops dependent samplers when it happens.

use log::debug;
use ndarray::Array1;
use thiserror::Error;

use crate::region::CubedRegion;

#[derive(Error, Debug)]
pub enum RateFieldError {
    #[error("Source-rate array length {got} does not match the {expected} region source cells")]
    SourceCountMismatch { expected: usize, got: usize },
}

#[derive(Debug, Clone)]
pub struct RateField {
    rates: Array1<f64>,
    source_for_cube: Vec<Option<u32>>,
    total_rate: f64,
}

impl RateField {
    /// Build the field from one annual rate per gridded source.
    pub fn build(region: &CubedRegion, source_rates: &[f64]) -> Result<Self, RateFieldError> {
        if source_rates.len() != region.num_source_cells() {
            return Err(RateFieldError::SourceCountMismatch {
                expected: region.num_source_cells(),
                got: source_rates.len(),
            });
        }

        let cubes_per_source =
            (region.sub_points_per_axis() * region.sub_points_per_axis() * region.num_cube_depths())
                as f64;

        let num_cubes = region.num_cubes();
        let mut rates = Array1::zeros(num_cubes);
        let mut source_for_cube = vec![None; num_cubes];
        for cube in 0..num_cubes {
            let center = region.location_for_cube_index(cube);
            if let Some(source) = region.source_index_for_location(&center) {
                source_for_cube[cube] = Some(source as u32);
                rates[cube] = source_rates[source] / cubes_per_source;
            }
        }

        let total_rate = rates.sum();
        debug!(
            "rate field built: {} cubes, total rate {:.6e}/yr",
            num_cubes, total_rate
        );

        Ok(Self {
            rates,
            source_for_cube,
            total_rate,
        })
    }

    pub fn num_cubes(&self) -> usize {
        self.rates.len()
    }

    /// Long-term nucleation rate of the given cube (0 if no source maps in).
    pub fn rate_for_cube(&self, cube_index: usize) -> f64 {
        self.rates[cube_index]
    }

    /// The gridded source the cube maps back to through the forward
    /// rate-assignment table, if any.
    pub fn source_for_cube(&self, cube_index: usize) -> Option<usize> {
        self.source_for_cube[cube_index].map(|s| s as usize)
    }

    /// Sum of all cube rates; equals the sum of the input source rates up
    /// to discretization round-off.
    pub fn total_rate(&self) -> f64 {
        self.total_rate
    }

    pub fn rates(&self) -> &Array1<f64> {
        &self.rates
    }
}

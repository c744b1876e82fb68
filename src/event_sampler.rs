//! Primary-event sampling: which cube hosts the next triggered event, and
//! how a sampled cube becomes a concrete rupture.
//!
//! Per-parent-location cube samplers are expensive (one weight per cube)
//! and are memoized in an explicit cache owned by the sampler. The cache
//! gives single-flight semantics: under concurrent access from workers on
//! independent catalogs, at most one build runs per parent-location index
//! and latecomers block on (or reuse) the finished sampler, never reading
//! a partially built table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use log::debug;
use rand::rngs::StdRng;
use rand::Rng;
use thiserror::Error;

use crate::catalog::{PendingEvent, PendingKind, Rupture, RuptureArena};
use crate::config::{EtasParams, TriggerWeighting};
use crate::decay_kernel::DecayKernel;
use crate::omori::rupture_radius_km_from_mag;
use crate::rate_field::RateField;
use crate::region::{CubedRegion, Location};
use crate::sampler::WeightedSampler;
use crate::source_model::SourceModel;

/// Bounded retries when elastic-rebound eligibility rejects a sampled cube;
/// afterwards the candidate event is dropped as a miss.
const MAX_ELIGIBILITY_ATTEMPTS: usize = 8;

#[derive(Error, Debug)]
pub enum EventSamplerError {
    #[error(
        "Cube {cube_index} at ({lat}, {lon}, {depth_km} km) maps to no gridded source; \
         such cubes must be filtered before source resolution"
    )]
    NoSourceForCube {
        cube_index: usize,
        lat: f64,
        lon: f64,
        depth_km: f64,
    },

    #[error("Source {source_index} produced a non-finite magnitude: {magnitude}")]
    NonFiniteMagnitude { source_index: usize, magnitude: f64 },
}

/// Single-flight memoization of per-parent-location samplers.
#[derive(Debug, Default)]
pub struct SamplerCache {
    cells: Mutex<HashMap<usize, Arc<OnceLock<Arc<WeightedSampler>>>>>,
}

impl SamplerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached sampler for `key`, building it at most once even
    /// under concurrent callers. The map lock is held only to fetch the
    /// per-key cell; the build itself runs outside it.
    pub fn get_or_build<F>(&self, key: usize, build: F) -> Arc<WeightedSampler>
    where
        F: FnOnce() -> WeightedSampler,
    {
        let cell = {
            let mut cells = self.cells.lock().expect("sampler cache lock poisoned");
            cells.entry(key).or_default().clone()
        };
        cell.get_or_init(|| Arc::new(build())).clone()
    }

    pub fn len(&self) -> usize {
        self.cells.lock().expect("sampler cache lock poisoned").len()
    }

    pub fn clear(&self) {
        self.cells
            .lock()
            .expect("sampler cache lock poisoned")
            .clear();
    }
}

pub struct PrimaryEventSampler {
    region: Arc<CubedRegion>,
    rate_field: Arc<RateField>,
    kernel: Arc<DecayKernel>,
    params: EtasParams,
    weighting: TriggerWeighting,
    cache: SamplerCache,
    rates_only: OnceLock<Arc<WeightedSampler>>,
}

impl PrimaryEventSampler {
    pub fn new(
        region: Arc<CubedRegion>,
        rate_field: Arc<RateField>,
        kernel: Arc<DecayKernel>,
        params: EtasParams,
        weighting: TriggerWeighting,
    ) -> Self {
        Self {
            region,
            rate_field,
            kernel,
            params,
            weighting,
            cache: SamplerCache::new(),
            rates_only: OnceLock::new(),
        }
    }

    pub fn weighting(&self) -> TriggerWeighting {
        self.weighting
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// The global rate-only sampler, shared across all parent locations
    /// (and used directly for spontaneous events).
    pub fn rates_only_sampler(&self) -> Arc<WeightedSampler> {
        self.rates_only
            .get_or_init(|| {
                let weights = (0..self.rate_field.num_cubes())
                    .map(|cube| self.rate_field.rate_for_cube(cube))
                    .collect();
                Arc::new(WeightedSampler::from_weights(weights))
            })
            .clone()
    }

    /// The cube sampler for a parent location, per the configured
    /// weighting mode. Per-parent samplers are built once and memoized.
    pub fn cube_sampler(&self, parent_loc_index: usize) -> Arc<WeightedSampler> {
        match self.weighting {
            TriggerWeighting::RatesOnly => self.rates_only_sampler(),
            TriggerWeighting::DecayOnly => self
                .cache
                .get_or_build(parent_loc_index, || self.build_sampler(parent_loc_index, false)),
            TriggerWeighting::Combined => self
                .cache
                .get_or_build(parent_loc_index, || self.build_sampler(parent_loc_index, true)),
        }
    }

    fn build_sampler(&self, parent_loc_index: usize, include_rates: bool) -> WeightedSampler {
        let parent_loc = self.region.location_for_parent_index(parent_loc_index);
        let num_cubes = self.region.num_cubes();
        let mut weights = Vec::with_capacity(num_cubes);
        for cube in 0..num_cubes {
            let center = self.region.location_for_cube_index(cube);
            let density = self.kernel.density_at(
                center.lat - parent_loc.lat,
                center.lon - parent_loc.lon,
                center.depth,
                parent_loc.depth,
            );
            if include_rates {
                weights.push(self.rate_field.rate_for_cube(cube) * density);
            } else {
                weights.push(density);
            }
        }
        debug!(
            "built cube sampler for parent location {} ({:?})",
            parent_loc_index, self.weighting
        );
        WeightedSampler::from_weights(weights)
    }

    /// Map a cube back to its gridded source. Errors loudly for cubes with
    /// no source mapping: those indicate a cube outside any seismicity cell
    /// and the caller must already have filtered them.
    pub fn resolve_source_for_cube(&self, cube_index: usize) -> Result<usize, EventSamplerError> {
        self.rate_field.source_for_cube(cube_index).ok_or_else(|| {
            let loc = self.region.location_for_cube_index(cube_index);
            EventSamplerError::NoSourceForCube {
                cube_index,
                lat: loc.lat,
                lon: loc.lon,
                depth_km: loc.depth,
            }
        })
    }

    /// Degree to which `parent` can trigger an event at `cube_loc`:
    /// 1.0 for small parents (mag < 4) or with the correction disabled,
    /// otherwise a linear ramp on hypocentral distance against the parent
    /// source radius, with half-width one configured cube half-width.
    pub fn ert_eligible_fraction(&self, parent: &Rupture, cube_loc: &Location) -> f64 {
        if !self.params.apply_elastic_rebound || parent.magnitude < 4.0 {
            return 1.0;
        }
        let radius = rupture_radius_km_from_mag(parent.magnitude);
        let half_width = self.params.ert_ramp_half_width_km;
        let dist = self.region.distance_km(&parent.hypocenter, cube_loc);
        if dist <= radius - half_width {
            0.0
        } else if dist > radius + half_width {
            1.0
        } else {
            (dist - radius + half_width) / (2.0 * half_width)
        }
    }

    /// The minimum eligibility fraction over the whole ancestor chain; the
    /// most restrictive ancestor dominates. Bounded walk over integer
    /// parent ids (generation strictly decreases along the chain).
    pub fn ert_min_fraction(
        &self,
        arena: &RuptureArena,
        parent_id: u32,
        cube_loc: &Location,
    ) -> f64 {
        let mut min_fraction = 1.0_f64;
        let mut current = Some(parent_id);
        while let Some(id) = current {
            let Some(ancestor) = arena.get(id) else {
                break;
            };
            min_fraction = min_fraction.min(self.ert_eligible_fraction(ancestor, cube_loc));
            current = ancestor.parent_id;
        }
        min_fraction
    }

    /// Add +/- the configured fuzz to both lat and lon (independent random
    /// signs). Applied to trigger points before grid snapping to avoid
    /// numerical precision artifacts on cell boundaries.
    pub fn random_fuzzy_location(&self, rng: &mut StdRng, loc: &Location) -> Location {
        let sign1 = if rng.random::<f64>() < 0.5 { -1.0 } else { 1.0 };
        let sign2 = if rng.random::<f64>() < 0.5 { -1.0 } else { 1.0 };
        Location::new(
            loc.lat + sign1 * self.params.trigger_loc_fuzz_deg,
            loc.lon + sign2 * self.params.trigger_loc_fuzz_deg,
            loc.depth,
        )
    }

    /// Fill in a queued triggered event: pick a cube from the parent
    /// location's sampler (eligibility applied as a rejection weight),
    /// resolve a source and rupture, and place the hypocenter.
    ///
    /// Returns `Ok(None)` for recoverable misses: trigger location outside
    /// the region, degenerate sampler, eligibility exhaustion, or (in
    /// decay-only mode) a cube with no seismicity cell. The cascade drops
    /// the event and continues.
    pub fn sample_primary_event(
        &self,
        rng: &mut StdRng,
        arena: &RuptureArena,
        pending: &PendingEvent,
        source_model: &dyn SourceModel,
    ) -> Result<Option<Rupture>, EventSamplerError> {
        let PendingKind::Triggered {
            parent_id,
            trigger_loc,
        } = &pending.kind
        else {
            return Ok(None);
        };

        let Some(parent_index) = self.region.parent_index_for_location(trigger_loc) else {
            debug!(
                "event {}: trigger location ({}, {}, {}) outside region; dropped",
                pending.id, trigger_loc.lat, trigger_loc.lon, trigger_loc.depth
            );
            return Ok(None);
        };
        let snapped_loc = self.region.location_for_parent_index(parent_index);
        let sampler = self.cube_sampler(parent_index);

        let mut chosen = None;
        for _ in 0..MAX_ELIGIBILITY_ATTEMPTS {
            let Some(cube) = sampler.sample(rng.random()) else {
                return Ok(None);
            };
            if !self.params.apply_elastic_rebound {
                chosen = Some(cube);
                break;
            }
            let cube_loc = self.region.location_for_cube_index(cube);
            let fraction = self.ert_min_fraction(arena, *parent_id, &cube_loc);
            if fraction >= 1.0 || rng.random::<f64>() < fraction {
                chosen = Some(cube);
                break;
            }
        }
        let Some(cube) = chosen else {
            debug!("event {}: eligibility rejection exhausted; dropped", pending.id);
            return Ok(None);
        };

        let source_index = match self.weighting {
            // decay-only ignores rates, so sampled cubes may carry no
            // seismicity cell; treat those as misses
            TriggerWeighting::DecayOnly => match self.rate_field.source_for_cube(cube) {
                Some(source) => source,
                None => return Ok(None),
            },
            _ => self.resolve_source_for_cube(cube)?,
        };

        let (rupture_index, drawn) = source_model.draw_rupture(source_index, rng.random::<f64>());
        if !drawn.magnitude.is_finite() {
            return Err(EventSamplerError::NonFiniteMagnitude {
                source_index,
                magnitude: drawn.magnitude,
            });
        }

        // hypocenter: cube center + intra-cube jitter + the correction from
        // the snapped parent-grid node back to the actual trigger location,
        // restoring the sub-cell precision the parent grid discretized away
        let cube_center = self.region.location_for_cube_index(cube);
        let jitter = self.kernel.random_delta_loc(rng);
        let correction = snapped_loc.offset_to(trigger_loc);
        let mut hypocenter = cube_center.translated(&(jitter + correction));
        hypocenter.depth = hypocenter
            .depth
            .clamp(0.0001, self.region.max_depth_km() - 0.0001);

        let distance = self.region.distance_km(trigger_loc, &hypocenter);

        Ok(Some(Rupture {
            id: pending.id,
            parent_id: Some(*parent_id),
            generation: pending.generation,
            origin_time_ms: pending.origin_time_ms,
            magnitude: drawn.magnitude,
            rake: drawn.rake,
            hypocenter,
            parent_trigger_loc: Some(*trigger_loc),
            source_ref: Some(source_index as u32),
            rupture_index_in_source: Some(rupture_index as u32),
            distance_to_parent_km: Some(distance),
        }))
    }
}

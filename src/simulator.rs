//! The cascade simulator: event-driven growth of one time-ordered catalog.
//!
//! A run moves through `Init -> Running -> Draining -> Done`. Seeding fills
//! the queue with observed input ruptures, an optional scenario rupture,
//! and spontaneous background events; the running loop then repeatedly
//! pops the earliest pending event, turns it into a concrete rupture,
//! samples its offspring, and appends it to the catalog. Processing order
//! guarantees the output is sorted by origin time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::catalog::{
    Catalog, EventQueue, PendingEvent, PendingKind, Rupture, RuptureArena, SimulationMetadata,
};
use crate::config::{ConfigError, EtasConfig, EtasParams, SimulationOptions};
use crate::decay_kernel::DecayKernel;
use crate::event_sampler::{EventSamplerError, PrimaryEventSampler};
use crate::omori::{expected_num_primary, poisson_draw, random_event_times, MILLIS_PER_DAY, MILLIS_PER_YEAR};
use crate::rate_field::{RateField, RateFieldError};
use crate::region::{CubedRegion, Location, RegionError, RegionSpec};
use crate::sampler::WeightedSampler;
use crate::source_model::SourceModel;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Region(#[from] RegionError),

    #[error(transparent)]
    RateField(#[from] RateFieldError),

    #[error("Source model reports {got} sources but the region has {expected} source cells")]
    SourceModelMismatch { expected: usize, got: usize },
}

#[derive(Error, Debug)]
pub enum CascadeError {
    #[error(transparent)]
    EventSampler(#[from] EventSamplerError),

    #[error(
        "Negative spontaneous rate ({rate_per_year}/yr): expected triggered rate exceeds the \
         long-term total"
    )]
    NegativeSpontaneousRate { rate_per_year: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    Init,
    Running,
    Draining,
    Done,
}

/// An externally supplied rupture: an observed/historical event or the
/// scenario trigger.
#[derive(Debug, Clone, Copy)]
pub struct InputRupture {
    pub origin_time_ms: i64,
    pub magnitude: f64,
    pub rake: f64,
    pub hypocenter: Location,
}

/// Everything shared read-only between the catalogs of one batch: the
/// discretized region, the long-term rate field, the decay kernel, the
/// primary-event sampler (with its lazily populated cache), and the
/// source model.
pub struct SimulationContext {
    region: Arc<CubedRegion>,
    rate_field: Arc<RateField>,
    kernel: Arc<DecayKernel>,
    event_sampler: Arc<PrimaryEventSampler>,
    source_model: Arc<dyn SourceModel>,
    config: EtasConfig,
}

impl SimulationContext {
    pub fn new(
        spec: RegionSpec,
        source_rates: &[f64],
        source_model: Arc<dyn SourceModel>,
        config: EtasConfig,
    ) -> Result<Self, BuildError> {
        config.validate()?;
        let region = Arc::new(CubedRegion::new(spec)?);
        if source_model.num_sources() != region.num_source_cells() {
            return Err(BuildError::SourceModelMismatch {
                expected: region.num_source_cells(),
                got: source_model.num_sources(),
            });
        }
        let rate_field = Arc::new(RateField::build(&region, source_rates)?);
        let kernel = Arc::new(DecayKernel::build(&region, &config.params));
        let event_sampler = Arc::new(PrimaryEventSampler::new(
            region.clone(),
            rate_field.clone(),
            kernel.clone(),
            config.params.clone(),
            config.weighting,
        ));
        info!(
            "simulation context: {} cubes, {} parent locations, {} sources, total rate {:.4e}/yr",
            region.num_cubes(),
            region.num_parent_locs(),
            region.num_source_cells(),
            rate_field.total_rate()
        );
        Ok(Self {
            region,
            rate_field,
            kernel,
            event_sampler,
            source_model,
            config,
        })
    }

    pub fn region(&self) -> &Arc<CubedRegion> {
        &self.region
    }

    pub fn rate_field(&self) -> &Arc<RateField> {
        &self.rate_field
    }

    pub fn kernel(&self) -> &Arc<DecayKernel> {
        &self.kernel
    }

    pub fn event_sampler(&self) -> &Arc<PrimaryEventSampler> {
        &self.event_sampler
    }

    pub fn source_model(&self) -> &Arc<dyn SourceModel> {
        &self.source_model
    }

    pub fn params(&self) -> &EtasParams {
        &self.config.params
    }

    pub fn options(&self) -> &SimulationOptions {
        &self.config.options
    }

    /// Replace the long-term rate field. Dependent samplers are built from
    /// the field, so the primary-event sampler (and its cache) is rebuilt
    /// from scratch; this is the only event that invalidates cached
    /// samplers.
    pub fn rebuild_rate_field(&mut self, source_rates: &[f64]) -> Result<(), RateFieldError> {
        let rate_field = Arc::new(RateField::build(&self.region, source_rates)?);
        self.rate_field = rate_field.clone();
        self.event_sampler = Arc::new(PrimaryEventSampler::new(
            self.region.clone(),
            rate_field,
            self.kernel.clone(),
            self.config.params.clone(),
            self.config.weighting,
        ));
        Ok(())
    }
}

/// State machine over a single catalog. One simulator = one independently
/// seeded random stream; event processing is strictly sequential.
pub struct CascadeSimulator<'a> {
    ctx: &'a SimulationContext,
    rng: StdRng,
    state: SimulationState,
    queue: EventQueue,
    arena: RuptureArena,
    /// Ids of processed ruptures, in processing (= time) order.
    processed: Vec<u32>,
    metadata: SimulationMetadata,
}

impl<'a> CascadeSimulator<'a> {
    pub fn new(ctx: &'a SimulationContext, seed: u64) -> Self {
        let options = ctx.options();
        Self {
            ctx,
            rng: StdRng::seed_from_u64(seed),
            state: SimulationState::Init,
            queue: EventQueue::new(),
            arena: RuptureArena::new(),
            processed: Vec::new(),
            metadata: SimulationMetadata {
                seed,
                sim_start_ms: options.sim_start_ms,
                sim_end_ms: options.sim_end_ms,
                ..SimulationMetadata::default()
            },
        }
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    /// Run the cascade to completion and return the finished catalog.
    pub fn run(
        mut self,
        observed: &[InputRupture],
        scenario: Option<&InputRupture>,
    ) -> Result<Catalog, CascadeError> {
        self.seed_queue(observed, scenario)?;
        self.state = SimulationState::Running;

        let deadline = self
            .ctx
            .options()
            .max_wall_clock_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs));
        let max_events = self.ctx.options().max_events;

        while let Some(pending) = self.queue.pop() {
            let rupture = match &pending.kind {
                PendingKind::Spontaneous => self.build_spontaneous(&pending)?,
                PendingKind::Input {
                    magnitude,
                    rake,
                    hypocenter,
                } => Some(Rupture {
                    id: pending.id,
                    parent_id: None,
                    generation: 0,
                    origin_time_ms: pending.origin_time_ms,
                    magnitude: *magnitude,
                    rake: *rake,
                    hypocenter: *hypocenter,
                    parent_trigger_loc: None,
                    source_ref: None,
                    rupture_index_in_source: None,
                    distance_to_parent_km: None,
                }),
                PendingKind::Triggered { .. } => self.ctx.event_sampler().sample_primary_event(
                    &mut self.rng,
                    &self.arena,
                    &pending,
                    self.ctx.source_model().as_ref(),
                )?,
            };

            let Some(rupture) = rupture else {
                self.metadata.num_misses += 1;
                continue;
            };

            if matches!(pending.kind, PendingKind::Spontaneous) {
                self.metadata.num_spontaneous += 1;
            }

            self.spawn_offspring(&rupture);
            self.processed.push(rupture.id);
            self.arena.insert(rupture);
            self.metadata.num_processed += 1;

            let over_count = max_events.is_some_and(|max| self.metadata.num_processed >= max);
            let over_time = deadline.is_some_and(|d| Instant::now() >= d);
            if (over_count || over_time) && !self.queue.is_empty() {
                self.state = SimulationState::Draining;
                self.metadata.truncated = true;
                self.metadata.num_discarded = self.queue.len();
                while self.queue.pop().is_some() {}
                warn!(
                    "catalog truncated after {} events ({} queued events discarded)",
                    self.metadata.num_processed, self.metadata.num_discarded
                );
                break;
            }
        }

        self.state = SimulationState::Done;
        info!(
            "catalog done: {} events ({} spontaneous), {} misses{}",
            self.metadata.num_processed,
            self.metadata.num_spontaneous,
            self.metadata.num_misses,
            if self.metadata.truncated { ", truncated" } else { "" }
        );

        let ruptures = self
            .processed
            .iter()
            .filter_map(|id| self.arena.get(*id).cloned())
            .collect();
        Ok(Catalog {
            ruptures,
            metadata: self.metadata,
        })
    }

    // ---- seeding ---------------------------------------------------------

    fn seed_queue(
        &mut self,
        observed: &[InputRupture],
        scenario: Option<&InputRupture>,
    ) -> Result<(), CascadeError> {
        for input in observed.iter().chain(scenario) {
            let id = self.arena.alloc_id();
            self.queue.push(PendingEvent {
                id,
                generation: 0,
                origin_time_ms: input.origin_time_ms,
                kind: PendingKind::Input {
                    magnitude: input.magnitude,
                    rake: input.rake,
                    hypocenter: input.hypocenter,
                },
            });
        }

        let mut num_spontaneous = 0;
        if self.ctx.options().include_spontaneous {
            for origin_time_ms in self.spontaneous_event_times()? {
                let id = self.arena.alloc_id();
                self.queue.push(PendingEvent {
                    id,
                    generation: 0,
                    origin_time_ms,
                    kind: PendingKind::Spontaneous,
                });
                num_spontaneous += 1;
            }
        }

        info!(
            "seeded queue: {} input events, {} spontaneous events",
            observed.len() + scenario.iter().len(),
            num_spontaneous
        );
        Ok(())
    }

    /// Times of spontaneous background events over the horizon, from the
    /// time-dependent spontaneous-rate function: the long-term total rate
    /// minus the rate expected to be triggered by everything since the
    /// historic-catalog start. A malformed (NaN) total degrades to "no
    /// spontaneous events" rather than propagating NaN.
    fn spontaneous_event_times(&mut self) -> Result<Vec<i64>, CascadeError> {
        let params = self.ctx.params();
        let options = self.ctx.options();
        let mfd = self.ctx.source_model().magnitude_frequency_dist();

        let total_rate_per_year = mfd.total_rate();
        if !total_rate_per_year.is_finite() {
            warn!(
                "long-term MFD total rate is {}; skipping spontaneous seeding",
                total_rate_per_year
            );
            return Ok(Vec::new());
        }

        let num_bins = options.num_spontaneous_time_bins;
        let span_ms = (options.sim_end_ms - options.sim_start_ms) as f64;
        let delta_ms = span_ms / num_bins as f64;
        let hist_start_ms = options
            .historic_catalog_start_ms
            .unwrap_or(options.sim_start_ms);

        let mut bin_rates = Vec::with_capacity(num_bins);
        for bin in 0..num_bins {
            let t_ms = options.sim_start_ms as f64 + (bin as f64 + 0.5) * delta_ms;
            let hist_duration_days = (t_ms - hist_start_ms as f64) / MILLIS_PER_DAY;
            let mut triggered = 0.0;
            for m in 0..mfd.len() {
                // skip negligible-rate bins
                if mfd.rate(m) > 1e-10 {
                    triggered += expected_num_primary(
                        params.k,
                        params.p,
                        mfd.mag(m),
                        params.mag_min,
                        params.c_days,
                        0.0,
                        hist_duration_days.max(0.0),
                    ) * mfd.rate(m);
                }
            }
            bin_rates.push(total_rate_per_year - triggered);
        }

        let mean_rate_per_year = bin_rates.iter().sum::<f64>() / num_bins as f64;
        if mean_rate_per_year < 0.0 {
            return Err(CascadeError::NegativeSpontaneousRate {
                rate_per_year: mean_rate_per_year,
            });
        }

        let time_sampler =
            WeightedSampler::from_weights(bin_rates.iter().map(|r| r.max(0.0)).collect());
        let num_years = span_ms / MILLIS_PER_YEAR;
        let num_events = poisson_draw(&mut self.rng, mean_rate_per_year * num_years);

        let mut times = Vec::with_capacity(num_events);
        for _ in 0..num_events {
            let Some(bin) = time_sampler.sample(self.rng.random()) else {
                break;
            };
            let t = options.sim_start_ms as f64
                + (bin as f64 + 0.5) * delta_ms
                + (self.rng.random::<f64>() - 0.5) * delta_ms;
            times.push(t as i64);
        }
        debug!(
            "spontaneous seeding: mean rate {:.4}/yr over {:.2} yr -> {} events",
            mean_rate_per_year, num_years, num_events
        );
        Ok(times)
    }

    // ---- event processing ------------------------------------------------

    /// A spontaneous event's magnitude and location come straight from the
    /// long-term model: rate-only cube draw, source resolution, rupture
    /// draw, hypocenter at the cube center plus intra-cube jitter.
    fn build_spontaneous(
        &mut self,
        pending: &PendingEvent,
    ) -> Result<Option<Rupture>, CascadeError> {
        let sampler = self.ctx.event_sampler().rates_only_sampler();
        let Some(cube) = sampler.sample(self.rng.random()) else {
            return Ok(None);
        };
        let source_index = self.ctx.event_sampler().resolve_source_for_cube(cube)?;
        let (rupture_index, drawn) = self
            .ctx
            .source_model()
            .draw_rupture(source_index, self.rng.random::<f64>());
        if !drawn.magnitude.is_finite() {
            return Err(EventSamplerError::NonFiniteMagnitude {
                source_index,
                magnitude: drawn.magnitude,
            }
            .into());
        }

        let center = self.ctx.region().location_for_cube_index(cube);
        let jitter = self.ctx.kernel().random_delta_loc(&mut self.rng);
        let mut hypocenter = center.translated(&jitter);
        hypocenter.depth = hypocenter
            .depth
            .clamp(0.0001, self.ctx.region().max_depth_km() - 0.0001);

        Ok(Some(Rupture {
            id: pending.id,
            parent_id: None,
            generation: 0,
            origin_time_ms: pending.origin_time_ms,
            magnitude: drawn.magnitude,
            rake: drawn.rake,
            hypocenter,
            parent_trigger_loc: None,
            source_ref: Some(source_index as u32),
            rupture_index_in_source: Some(rupture_index as u32),
            distance_to_parent_km: None,
        }))
    }

    /// Sample the number and times of `rupture`'s own offspring over
    /// `[now, horizon end]` and enqueue them. Trigger locations get the
    /// configured positional fuzz before later grid snapping.
    fn spawn_offspring(&mut self, rupture: &Rupture) {
        let options = self.ctx.options();
        if !options.include_indirect_triggering {
            return;
        }
        let params = self.ctx.params();

        let end_days = (options.sim_end_ms - rupture.origin_time_ms) as f64 / MILLIS_PER_DAY;
        if end_days <= 0.0 {
            return;
        }
        let start_days =
            (options.sim_start_ms - rupture.origin_time_ms).max(0) as f64 / MILLIS_PER_DAY;

        let times = random_event_times(
            &mut self.rng,
            params.k,
            params.p,
            rupture.magnitude,
            params.mag_min,
            params.c_days,
            start_days,
            end_days,
        );

        for t_days in times {
            let origin_time_ms = rupture.origin_time_ms + (t_days * MILLIS_PER_DAY) as i64;
            if origin_time_ms > options.sim_end_ms {
                continue;
            }
            let mut trigger_loc = self
                .ctx
                .event_sampler()
                .random_fuzzy_location(&mut self.rng, &rupture.hypocenter);
            if trigger_loc.depth > self.ctx.region().max_depth_km() {
                trigger_loc.depth = self.ctx.region().max_depth_km();
            }
            let id = self.arena.alloc_id();
            self.queue.push(PendingEvent {
                id,
                generation: rupture.generation + 1,
                origin_time_ms,
                kind: PendingKind::Triggered {
                    parent_id: rupture.id,
                    trigger_loc,
                },
            });
        }
    }
}

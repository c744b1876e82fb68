use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use etas_sim::catalog::{Rupture, RuptureArena};
use etas_sim::config::{EtasConfig, EtasParams, TriggerWeighting};
use etas_sim::event_sampler::SamplerCache;
use etas_sim::region::{CubedRegion, Location, RegionSpec};
use etas_sim::sampler::WeightedSampler;
use etas_sim::simulator::SimulationContext;
use etas_sim::source_model::{GutenbergRichterSourceModel, MagFreqDist};

fn test_spec() -> RegionSpec {
    RegionSpec {
        min_lat: 34.0,
        max_lat: 35.0,
        min_lon: -118.0,
        max_lon: -117.0,
        source_spacing_deg: 0.2,
        sub_points_per_axis: 2,
        max_depth_km: 12.0,
        depth_step_km: 4.0,
    }
}

fn test_context(weighting: TriggerWeighting) -> SimulationContext {
    let config = EtasConfig {
        params: EtasParams {
            max_trigger_dist_km: 200.0,
            ..EtasParams::default()
        },
        weighting,
        ..EtasConfig::default()
    };
    let region = CubedRegion::new(test_spec()).unwrap();
    let num_sources = region.num_source_cells();
    let source_rates = vec![1.0; num_sources];
    let mfd = MagFreqDist::gutenberg_richter(2.5, 8.0, 0.1, 80.0, 1.0);
    let model = Arc::new(GutenbergRichterSourceModel::new(num_sources, mfd, 0.0));
    SimulationContext::new(test_spec(), &source_rates, model, config).unwrap()
}

fn parent_rupture(id: u32, parent_id: Option<u32>, magnitude: f64, hypocenter: Location) -> Rupture {
    Rupture {
        id,
        parent_id,
        generation: 0,
        origin_time_ms: 0,
        magnitude,
        rake: 0.0,
        hypocenter,
        parent_trigger_loc: None,
        source_ref: None,
        rupture_index_in_source: None,
        distance_to_parent_km: None,
    }
}

#[test]
fn test_rates_only_sampler_is_shared() {
    let ctx = test_context(TriggerWeighting::RatesOnly);
    let sampler = ctx.event_sampler();
    let a = sampler.cube_sampler(0);
    let b = sampler.cube_sampler(17);
    assert!(Arc::ptr_eq(&a, &b), "rate-only sampler must be shared");
    assert_eq!(sampler.cache_len(), 0);
}

#[test]
fn test_per_parent_samplers_are_memoized() {
    let ctx = test_context(TriggerWeighting::Combined);
    let sampler = ctx.event_sampler();

    let a = sampler.cube_sampler(40);
    let b = sampler.cube_sampler(40);
    assert!(Arc::ptr_eq(&a, &b), "repeat requests must reuse the build");
    assert_eq!(sampler.cache_len(), 1);

    let c = sampler.cube_sampler(41);
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(sampler.cache_len(), 2);
}

#[test]
fn test_combined_weights_are_rate_times_density() {
    let ctx = test_context(TriggerWeighting::Combined);
    let region = ctx.region();
    let parent_index = region
        .parent_index_for_location(&Location::new(34.5, -117.5, 8.0))
        .unwrap();
    let parent_loc = region.location_for_parent_index(parent_index);
    let sampler = ctx.event_sampler().cube_sampler(parent_index);

    for cube in (0..region.num_cubes()).step_by(37) {
        let center = region.location_for_cube_index(cube);
        let expected = ctx.rate_field().rate_for_cube(cube)
            * ctx.kernel().density_at(
                center.lat - parent_loc.lat,
                center.lon - parent_loc.lon,
                center.depth,
                parent_loc.depth,
            );
        assert!((sampler.weight(cube) - expected).abs() < 1e-15);
    }
}

#[test]
fn test_cache_single_flight_under_contention() {
    let cache = SamplerCache::new();
    let builds = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                cache.get_or_build(5, || {
                    builds.fetch_add(1, Ordering::SeqCst);
                    // widen the race window
                    std::thread::sleep(Duration::from_millis(20));
                    WeightedSampler::from_weights(vec![1.0, 2.0, 3.0])
                })
            });
        }
    });

    assert_eq!(builds.load(Ordering::SeqCst), 1, "must build at most once");
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_ert_fraction_ramp() {
    let ctx = test_context(TriggerWeighting::Combined);
    let sampler = ctx.event_sampler();
    let hypo = Location::new(34.5, -117.5, 6.0);

    // small parents never suppress triggering
    let small = parent_rupture(0, None, 3.9, hypo);
    assert_eq!(sampler.ert_eligible_fraction(&small, &Location::new(34.5, -117.5, 6.1)), 1.0);

    // M5: source radius sqrt(10/pi) ~ 1.784 km, ramp half-width 1.24 km
    let parent = parent_rupture(0, None, 5.0, hypo);
    let radius = (10f64 / std::f64::consts::PI).sqrt();

    // well inside the source radius: ineligible
    let inside = Location::new(34.5, -117.5, 6.0 + 0.3);
    assert_eq!(sampler.ert_eligible_fraction(&parent, &inside), 0.0);

    // well outside: fully eligible
    let outside = Location::new(34.5, -117.5, 6.0 + 5.0);
    assert_eq!(sampler.ert_eligible_fraction(&parent, &outside), 1.0);

    // exactly at the radius: mid-ramp
    let mid = Location::new(34.5, -117.5, 6.0 + radius);
    let fraction = sampler.ert_eligible_fraction(&parent, &mid);
    assert!((fraction - 0.5).abs() < 1e-9, "fraction {}", fraction);
}

#[test]
fn test_ert_minimum_over_ancestors() {
    let ctx = test_context(TriggerWeighting::Combined);
    let sampler = ctx.event_sampler();

    let big_hypo = Location::new(34.5, -117.5, 6.0);
    let mut arena = RuptureArena::new();
    let grandparent = arena.alloc_id();
    arena.insert(parent_rupture(grandparent, None, 7.0, big_hypo));
    // small direct parent far from the probe point
    let parent = arena.alloc_id();
    arena.insert(parent_rupture(
        parent,
        Some(grandparent),
        3.0,
        Location::new(34.9, -117.1, 2.0),
    ));

    // probe inside the grandparent's source radius (M7 -> ~17.8 km): the
    // most restrictive ancestor dominates even though the direct parent
    // would allow it
    let probe = Location::new(34.5, -117.5, 10.0);
    let direct = sampler.ert_eligible_fraction(arena.get(parent).unwrap(), &probe);
    assert_eq!(direct, 1.0);
    let chained = sampler.ert_min_fraction(&arena, parent, &probe);
    assert_eq!(chained, 0.0);
}

#[test]
fn test_ert_disabled_is_always_eligible() {
    let config = EtasConfig {
        params: EtasParams {
            apply_elastic_rebound: false,
            max_trigger_dist_km: 200.0,
            ..EtasParams::default()
        },
        ..EtasConfig::default()
    };
    let region = CubedRegion::new(test_spec()).unwrap();
    let num_sources = region.num_source_cells();
    let mfd = MagFreqDist::gutenberg_richter(2.5, 8.0, 0.1, 80.0, 1.0);
    let model = Arc::new(GutenbergRichterSourceModel::new(num_sources, mfd, 0.0));
    let ctx =
        SimulationContext::new(test_spec(), &vec![1.0; num_sources], model, config).unwrap();

    let parent = parent_rupture(0, None, 7.5, Location::new(34.5, -117.5, 6.0));
    let near = Location::new(34.5, -117.5, 6.1);
    assert_eq!(ctx.event_sampler().ert_eligible_fraction(&parent, &near), 1.0);
}

use etas_sim::config::EtasParams;
use etas_sim::decay_kernel::{hardebeck_density, DecayKernel};
use etas_sim::region::{CubedRegion, RegionSpec};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn test_region() -> CubedRegion {
    CubedRegion::new(RegionSpec {
        min_lat: 34.0,
        max_lat: 35.0,
        min_lon: -118.0,
        max_lon: -117.0,
        source_spacing_deg: 0.2,
        sub_points_per_axis: 2,
        max_depth_km: 12.0,
        depth_step_km: 4.0,
    })
    .unwrap()
}

fn test_params() -> EtasParams {
    EtasParams {
        max_trigger_dist_km: 200.0,
        ..EtasParams::default()
    }
}

#[test]
fn test_density_nonnegative_and_symmetric() {
    let region = test_region();
    let kernel = DecayKernel::build(&region, &test_params());

    for (rel_lat, rel_lon) in [(0.05, 0.15), (0.25, 0.05), (0.45, 0.35)] {
        let base = kernel.density_at(rel_lat, rel_lon, 6.0, 4.0);
        assert!(base >= 0.0);
        // quarter-volume symmetry: sign of the offsets is irrelevant
        assert_eq!(kernel.density_at(-rel_lat, rel_lon, 6.0, 4.0), base);
        assert_eq!(kernel.density_at(rel_lat, -rel_lon, 6.0, 4.0), base);
        assert_eq!(kernel.density_at(-rel_lat, -rel_lon, 6.0, 4.0), base);
    }
}

#[test]
fn test_density_decays_with_distance() {
    let region = test_region();
    let kernel = DecayKernel::build(&region, &test_params());

    let near = kernel.density_at(0.05, 0.05, 6.0, 4.0);
    let mid = kernel.density_at(0.35, 0.05, 6.0, 4.0);
    let far = kernel.density_at(0.95, 0.05, 6.0, 4.0);
    assert!(near > mid, "near {} !> mid {}", near, mid);
    assert!(mid > far, "mid {} !> far {}", mid, far);
}

#[test]
fn test_density_zero_beyond_max_distance() {
    let region = test_region();
    let mut params = test_params();
    params.max_trigger_dist_km = 50.0;
    let kernel = DecayKernel::build(&region, &params);

    // one degree of latitude is ~111 km > 50 km
    assert_eq!(kernel.density_at(1.0, 0.0, 6.0, 4.0), 0.0);
    assert!(kernel.density_at(0.05, 0.0, 6.0, 4.0) > 0.0);
}

#[test]
fn test_density_zero_outside_depth_range() {
    let region = test_region();
    let kernel = DecayKernel::build(&region, &test_params());

    assert_eq!(kernel.density_at(0.05, 0.05, -1.0, 4.0), 0.0);
    assert_eq!(kernel.density_at(0.05, 0.05, 30.0, 4.0), 0.0);
    // parent depth outside the parent layers
    assert_eq!(kernel.density_at(0.05, 0.05, 6.0, 40.0), 0.0);
}

#[test]
fn test_hardebeck_density_form() {
    let q = 1.96;
    let d = 0.79;
    // decreasing with distance in both geometry regimes
    let d1 = hardebeck_density(1.0, q, d, 24.0, 1000.0);
    let d2 = hardebeck_density(5.0, q, d, 24.0, 1000.0);
    let d3 = hardebeck_density(50.0, q, d, 24.0, 1000.0);
    let d4 = hardebeck_density(500.0, q, d, 24.0, 1000.0);
    assert!(d1 > d2 && d2 > d3 && d3 > d4);
    // hard cutoff
    assert_eq!(hardebeck_density(1001.0, q, d, 24.0, 1000.0), 0.0);
}

#[test]
fn test_random_delta_loc_stays_in_cube() {
    let region = test_region();
    let kernel = DecayKernel::build(&region, &test_params());
    let mut rng = StdRng::seed_from_u64(2);

    let half_latlon = region.cube_spacing_deg() / 2.0;
    let half_depth = region.depth_step_km() / 2.0;
    for _ in 0..10_000 {
        let delta = kernel.random_delta_loc(&mut rng);
        assert!(delta.x.abs() < half_latlon);
        assert!(delta.y.abs() < half_latlon);
        assert!(delta.z.abs() < half_depth);
    }
}

use approx::assert_relative_eq;
use etas_sim::rate_field::{RateField, RateFieldError};
use etas_sim::region::{CubedRegion, RegionSpec};

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

#[test]
fn test_rate_conservation() {
    let region = test_region();
    let source_rates: Vec<f64> = (0..region.num_source_cells())
        .map(|i| 0.1 + 0.01 * i as f64)
        .collect();
    let field = RateField::build(&region, &source_rates).unwrap();

    let input_total: f64 = source_rates.iter().sum();
    assert_relative_eq!(field.total_rate(), input_total, max_relative = 1e-6);
}

#[test]
fn test_rate_spread_uniform_within_source() {
    let region = test_region();
    let mut source_rates = vec![0.0; region.num_source_cells()];
    source_rates[7] = 2.4;
    let field = RateField::build(&region, &source_rates).unwrap();

    // sub^2 * num_depths cubes share the source's rate equally
    let cubes_per_source = 2 * 2 * 3;
    let expected = 2.4 / cubes_per_source as f64;
    let mut nonzero = 0;
    for cube in 0..field.num_cubes() {
        let rate = field.rate_for_cube(cube);
        if rate > 0.0 {
            assert!((rate - expected).abs() < 1e-12);
            assert_eq!(field.source_for_cube(cube), Some(7));
            nonzero += 1;
        }
    }
    assert_eq!(nonzero, cubes_per_source);
}

#[test]
fn test_every_cube_has_a_source() {
    let region = test_region();
    let source_rates = vec![1.0; region.num_source_cells()];
    let field = RateField::build(&region, &source_rates).unwrap();
    for cube in 0..field.num_cubes() {
        assert!(field.source_for_cube(cube).is_some());
    }
}

#[test]
fn test_length_mismatch_is_fatal() {
    let region = test_region();
    let result = RateField::build(&region, &[1.0, 2.0, 3.0]);
    assert!(matches!(
        result,
        Err(RateFieldError::SourceCountMismatch {
            expected: 25,
            got: 3
        })
    ));
}

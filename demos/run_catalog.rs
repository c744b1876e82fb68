//! End-to-end demo: build a simulation context over a 1x1 degree region,
//! run one scenario-triggered catalog plus a small parallel batch, and
//! write the scenario catalog to CSV.
//!
//! Run with: cargo run --example run_catalog

use std::sync::Arc;

use etas_sim::{
    CascadeSimulator, CatalogBatch, EtasConfig, EtasParams, GutenbergRichterSourceModel,
    InputRupture, Location, MagFreqDist, RegionSpec, SimulationContext, SimulationOptions,
    TriggerWeighting,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let spec = RegionSpec {
        min_lat: 34.0,
        max_lat: 35.0,
        min_lon: -118.0,
        max_lon: -117.0,
        source_spacing_deg: 0.1,
        sub_points_per_axis: 2,
        max_depth_km: 24.0,
        depth_step_km: 2.0,
    };

    let config = EtasConfig {
        params: EtasParams {
            max_trigger_dist_km: 300.0,
            ..EtasParams::default()
        },
        options: SimulationOptions {
            include_spontaneous: true,
            max_events: Some(200_000),
            ..SimulationOptions::default()
        },
        weighting: TriggerWeighting::Combined,
    };

    // a flat 120 events/yr background with a shared Gutenberg-Richter
    // magnitude distribution stands in for the external long-term model
    let total_rate_per_year = 120.0;
    let num_sources = 10 * 10;
    let source_rates = vec![total_rate_per_year / num_sources as f64; num_sources];
    let mfd = MagFreqDist::gutenberg_richter(2.5, 8.0, 0.1, total_rate_per_year, 1.0);
    let model = Arc::new(GutenbergRichterSourceModel::new(num_sources, mfd, 0.0));

    let ctx = SimulationContext::new(spec, &source_rates, model, config)?;

    let scenario = InputRupture {
        origin_time_ms: 0,
        magnitude: 7.0,
        rake: 0.0,
        hypocenter: Location::new(34.5, -117.5, 8.0),
    };

    let catalog = CascadeSimulator::new(&ctx, 42).run(&[], Some(&scenario))?;
    println!(
        "scenario catalog: {} events ({} spontaneous, {} misses{})",
        catalog.len(),
        catalog.metadata.num_spontaneous,
        catalog.metadata.num_misses,
        if catalog.metadata.truncated { ", truncated" } else { "" }
    );
    let max_generation = catalog.ruptures.iter().map(|r| r.generation).max().unwrap_or(0);
    println!("deepest triggering generation: {}", max_generation);

    catalog.write_csv("scenario_catalog.csv")?;
    println!("wrote scenario_catalog.csv");

    let batch = CatalogBatch::new(Arc::new(ctx))?;
    let catalogs = batch.run(8, 1000, &[], Some(&scenario));
    let mean_events =
        catalogs.iter().map(|c| c.len()).sum::<usize>() as f64 / catalogs.len().max(1) as f64;
    println!(
        "batch of {} catalogs: mean {:.1} events per catalog",
        catalogs.len(),
        mean_events
    );

    Ok(())
}

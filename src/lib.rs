//! Stochastic ETAS (Epidemic-Type Aftershock Sequence) catalog simulation
//! over a cubed 3-D seismicity volume.
//!
//! The engine grows synthetic earthquake catalogs by multi-generation
//! aftershock triggering: a gridded region is discretized into cubes, a
//! long-term rate field and a spatial decay kernel weight where triggered
//! events nucleate, and a discrete-event cascade with priority-ordered time
//! expands every processed rupture into its own Omori-law-decaying
//! offspring population.
//!
//! The main entry points are [`SimulationContext`] (shared read-only
//! state), [`CascadeSimulator`] (one catalog, one seeded random stream)
//! and [`CatalogBatch`] (many independent catalogs in parallel).

pub mod batch;
pub mod catalog;
pub mod config;
pub mod decay_kernel;
pub mod event_sampler;
pub mod omori;
pub mod rate_field;
pub mod region;
pub mod sampler;
pub mod simulator;
pub mod source_model;

pub use batch::{BatchError, CatalogBatch};
pub use catalog::{Catalog, CatalogError, Rupture, SimulationMetadata};
pub use config::{ConfigError, EtasConfig, EtasParams, SimulationOptions, TriggerWeighting};
pub use decay_kernel::DecayKernel;
pub use event_sampler::{EventSamplerError, PrimaryEventSampler};
pub use rate_field::{RateField, RateFieldError};
pub use region::{CubedRegion, Location, RegionError, RegionSpec};
pub use sampler::WeightedSampler;
pub use simulator::{
    BuildError, CascadeError, CascadeSimulator, InputRupture, SimulationContext, SimulationState,
};
pub use source_model::{GutenbergRichterSourceModel, MagFreqDist, SourceModel, SourceRupture};

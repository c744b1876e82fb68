//! Rupture records, the event queue, and the finished catalog.
//!
//! Ruptures live in an append-only arena indexed by integer id; parent
//! links are plain integer back-references, never object pointers, so
//! ancestor walks are bounded loops (generation strictly increases along
//! any parent chain). Queued-but-unprocessed events are a separate,
//! smaller record ordered purely by origin time.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::region::Location;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// A finished rupture in the output catalog. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Rupture {
    pub id: u32,
    /// Parent rupture id; `None` for spontaneous/background events.
    pub parent_id: Option<u32>,
    /// 0 for spontaneous events, parent generation + 1 otherwise.
    pub generation: u32,
    /// Epoch milliseconds.
    pub origin_time_ms: i64,
    pub magnitude: f64,
    pub rake: f64,
    pub hypocenter: Location,
    /// The point on the parent that did the triggering, if any.
    pub parent_trigger_loc: Option<Location>,
    /// Gridded source the rupture was resolved from, if any.
    pub source_ref: Option<u32>,
    /// Index of the drawn rupture within its source.
    pub rupture_index_in_source: Option<u32>,
    /// Hypocentral distance to the parent trigger location, km.
    pub distance_to_parent_km: Option<f64>,
}

/// Append-only rupture storage. Ids are allocated before an event is
/// queued; the slot is filled when (and only when) the event is processed
/// into a concrete rupture, so dropped/truncated events leave holes.
#[derive(Debug, Default)]
pub struct RuptureArena {
    slots: Vec<Option<Rupture>>,
}

impl RuptureArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next id.
    pub fn alloc_id(&mut self) -> u32 {
        self.slots.push(None);
        (self.slots.len() - 1) as u32
    }

    pub fn insert(&mut self, rupture: Rupture) {
        let slot = rupture.id as usize;
        self.slots[slot] = Some(rupture);
    }

    pub fn get(&self, id: u32) -> Option<&Rupture> {
        self.slots.get(id as usize).and_then(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// What a queued event still needs in order to become a rupture.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingKind {
    /// Background event; magnitude and location come from the long-term
    /// model when it is processed.
    Spontaneous,
    /// Aftershock of an already-processed rupture.
    Triggered {
        parent_id: u32,
        trigger_loc: Location,
    },
    /// Observed or scenario rupture supplied as input: already fully
    /// specified, processed verbatim.
    Input {
        magnitude: f64,
        rake: f64,
        hypocenter: Location,
    },
}

/// A rupture awaiting processing. Immutable once enqueued; ordered by
/// origin time (ties broken by id for determinism).
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    pub id: u32,
    pub generation: u32,
    pub origin_time_ms: i64,
    pub kind: PendingKind,
}

impl Eq for PendingEvent {}

impl Ord for PendingEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.origin_time_ms, self.id).cmp(&(other.origin_time_ms, other.id))
    }
}

impl PartialOrd for PendingEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Time-ordered multiset of pending events; strictly non-decreasing origin
/// time on pop.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<std::cmp::Reverse<PendingEvent>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: PendingEvent) {
        self.heap.push(std::cmp::Reverse(event));
    }

    pub fn pop(&mut self) -> Option<PendingEvent> {
        self.heap.pop().map(|std::cmp::Reverse(e)| e)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Run accounting attached to a finished catalog. Truncation is metadata,
/// not an error: a truncated catalog is valid but incomplete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationMetadata {
    pub seed: u64,
    pub sim_start_ms: i64,
    pub sim_end_ms: i64,
    pub num_processed: usize,
    pub num_spontaneous: usize,
    /// Candidate events dropped because their sampled location fell outside
    /// the gridded region or failed eligibility.
    pub num_misses: usize,
    pub truncated: bool,
    /// Queued events discarded when the run truncated.
    pub num_discarded: usize,
}

/// The finished, time-ordered catalog of one simulation.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub ruptures: Vec<Rupture>,
    pub metadata: SimulationMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
struct CatalogRow {
    id: u32,
    parent_id: Option<u32>,
    generation: u32,
    origin_time_ms: i64,
    magnitude: f64,
    rake: f64,
    lat: f64,
    lon: f64,
    depth_km: f64,
    source: Option<u32>,
    rupture_index: Option<u32>,
    distance_to_parent_km: Option<f64>,
}

impl Catalog {
    pub fn len(&self) -> usize {
        self.ruptures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ruptures.is_empty()
    }

    /// Write the catalog to CSV, one row per rupture in time order.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), CatalogError> {
        let mut writer = csv::Writer::from_path(path)?;
        for rupture in &self.ruptures {
            writer.serialize(CatalogRow {
                id: rupture.id,
                parent_id: rupture.parent_id,
                generation: rupture.generation,
                origin_time_ms: rupture.origin_time_ms,
                magnitude: rupture.magnitude,
                rake: rupture.rake,
                lat: rupture.hypocenter.lat,
                lon: rupture.hypocenter.lon,
                depth_km: rupture.hypocenter.depth,
                source: rupture.source_ref,
                rupture_index: rupture.rupture_index_in_source,
                distance_to_parent_km: rupture.distance_to_parent_km,
            })?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a catalog previously written with [`Catalog::write_csv`].
    /// Metadata is not round-tripped.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut ruptures = Vec::new();
        for row in reader.deserialize() {
            let row: CatalogRow = row?;
            ruptures.push(Rupture {
                id: row.id,
                parent_id: row.parent_id,
                generation: row.generation,
                origin_time_ms: row.origin_time_ms,
                magnitude: row.magnitude,
                rake: row.rake,
                hypocenter: Location::new(row.lat, row.lon, row.depth_km),
                parent_trigger_loc: None,
                source_ref: row.source,
                rupture_index_in_source: row.rupture_index,
                distance_to_parent_km: row.distance_to_parent_km,
            });
        }
        Ok(Self {
            ruptures,
            metadata: SimulationMetadata::default(),
        })
    }
}

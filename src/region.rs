//! Spatial discretization: the cubed gridded region and its index mappings.
//!
//! Three aligned grids share one bounding box:
//! - the coarse *source* grid (spacing = `source_spacing_deg`), one cell per
//!   gridded long-term seismicity source;
//! - the fine *cube* grid (spacing = source spacing / sub-points), cell
//!   centered, `num_cube_depths` layers of thickness `depth_step_km`;
//! - the *parent-location* grid, staggered half a cube from the cube grid
//!   (nodes sit at cube corners) with one extra depth layer.
//!
//! Index mappings are total bijections over the valid ranges and return
//! `None` outside them. They are pure arithmetic and sit in the innermost
//! loops of every other component.

use nalgebra::Vector3;
use serde::Deserialize;
use thiserror::Error;

/// Approximate km per degree of latitude.
pub const KM_PER_DEG: f64 = 111.0;

#[derive(Error, Debug)]
pub enum RegionError {
    #[error("Empty region extent: lat [{min_lat}, {max_lat}], lon [{min_lon}, {max_lon}]")]
    EmptyExtent {
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
    },

    #[error("Invalid source grid spacing: {0}")]
    InvalidSpacing(f64),

    #[error("Invalid sub-points-per-axis factor: {0}")]
    InvalidSubPoints(usize),

    #[error("Invalid depth discretization: max_depth={max_depth_km} km, step={depth_step_km} km")]
    InvalidDepthDiscretization { max_depth_km: f64, depth_step_km: f64 },

    #[error(
        "Region extent is not an integer number of source cells: \
         {extent_deg} deg / {spacing_deg} deg per cell"
    )]
    MisalignedExtent { extent_deg: f64, spacing_deg: f64 },
}

/// A geographic point: latitude/longitude in degrees, depth in km
/// (positive down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    pub depth: f64,
}

impl Location {
    pub fn new(lat: f64, lon: f64, depth: f64) -> Self {
        Self { lat, lon, depth }
    }

    /// Component-wise offset from `self` to `other`:
    /// `(dlat deg, dlon deg, ddepth km)`.
    pub fn offset_to(&self, other: &Location) -> Vector3<f64> {
        Vector3::new(other.lat - self.lat, other.lon - self.lon, other.depth - self.depth)
    }

    /// `self` translated by `(dlat deg, dlon deg, ddepth km)`.
    pub fn translated(&self, delta: &Vector3<f64>) -> Location {
        Location::new(self.lat + delta.x, self.lon + delta.y, self.depth + delta.z)
    }
}

/// Definition of the gridded region consumed from the outer model.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RegionSpec {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
    /// Grid spacing of the long-term gridded sources, in degrees.
    pub source_spacing_deg: f64,
    /// Point-source sub-sampling factor: cubes per source cell along each
    /// horizontal axis.
    pub sub_points_per_axis: usize,
    pub max_depth_km: f64,
    pub depth_step_km: f64,
}

/// The cubed region: bidirectional mappings between locations and linear
/// cube / parent-location / source-cell indices.
///
/// Linear cube index = `depth_index * cubes_per_layer + region_index`,
/// where `region_index = lat_index * num_lon_cubes + lon_index`; parent
/// indices split the same way against the parent per-layer count.
#[derive(Debug, Clone)]
pub struct CubedRegion {
    spec: RegionSpec,
    cube_spacing_deg: f64,
    num_lat_cubes: usize,
    num_lon_cubes: usize,
    num_cube_depths: usize,
    num_src_lat: usize,
    num_src_lon: usize,
    cos_mid_lat: f64,
}

impl CubedRegion {
    pub fn new(spec: RegionSpec) -> Result<Self, RegionError> {
        if !(spec.source_spacing_deg > 0.0) {
            return Err(RegionError::InvalidSpacing(spec.source_spacing_deg));
        }
        if spec.sub_points_per_axis == 0 {
            return Err(RegionError::InvalidSubPoints(spec.sub_points_per_axis));
        }
        if spec.max_lat <= spec.min_lat || spec.max_lon <= spec.min_lon {
            return Err(RegionError::EmptyExtent {
                min_lat: spec.min_lat,
                max_lat: spec.max_lat,
                min_lon: spec.min_lon,
                max_lon: spec.max_lon,
            });
        }
        if !(spec.depth_step_km > 0.0) || spec.max_depth_km < spec.depth_step_km {
            return Err(RegionError::InvalidDepthDiscretization {
                max_depth_km: spec.max_depth_km,
                depth_step_km: spec.depth_step_km,
            });
        }

        let num_src_lat = Self::cell_count(spec.max_lat - spec.min_lat, spec.source_spacing_deg)?;
        let num_src_lon = Self::cell_count(spec.max_lon - spec.min_lon, spec.source_spacing_deg)?;
        let num_cube_depths = (spec.max_depth_km / spec.depth_step_km).round() as usize;

        let mid_lat = (spec.min_lat + spec.max_lat) / 2.0;

        Ok(Self {
            cube_spacing_deg: spec.source_spacing_deg / spec.sub_points_per_axis as f64,
            num_lat_cubes: num_src_lat * spec.sub_points_per_axis,
            num_lon_cubes: num_src_lon * spec.sub_points_per_axis,
            num_cube_depths,
            num_src_lat,
            num_src_lon,
            cos_mid_lat: mid_lat.to_radians().cos(),
            spec,
        })
    }

    fn cell_count(extent_deg: f64, spacing_deg: f64) -> Result<usize, RegionError> {
        let cells = extent_deg / spacing_deg;
        if (cells - cells.round()).abs() > 1e-6 || cells.round() < 1.0 {
            return Err(RegionError::MisalignedExtent {
                extent_deg,
                spacing_deg,
            });
        }
        Ok(cells.round() as usize)
    }

    pub fn spec(&self) -> &RegionSpec {
        &self.spec
    }

    pub fn cube_spacing_deg(&self) -> f64 {
        self.cube_spacing_deg
    }

    pub fn depth_step_km(&self) -> f64 {
        self.spec.depth_step_km
    }

    pub fn max_depth_km(&self) -> f64 {
        self.spec.max_depth_km
    }

    pub fn sub_points_per_axis(&self) -> usize {
        self.spec.sub_points_per_axis
    }

    pub fn cos_mid_lat(&self) -> f64 {
        self.cos_mid_lat
    }

    pub fn cubes_per_layer(&self) -> usize {
        self.num_lat_cubes * self.num_lon_cubes
    }

    pub fn num_cube_depths(&self) -> usize {
        self.num_cube_depths
    }

    pub fn num_cubes(&self) -> usize {
        self.cubes_per_layer() * self.num_cube_depths
    }

    pub fn parents_per_layer(&self) -> usize {
        (self.num_lat_cubes + 1) * (self.num_lon_cubes + 1)
    }

    /// Parent grids carry one extra depth layer (nodes at layer boundaries).
    pub fn num_parent_depths(&self) -> usize {
        self.num_cube_depths + 1
    }

    pub fn num_parent_locs(&self) -> usize {
        self.parents_per_layer() * self.num_parent_depths()
    }

    pub fn num_source_cells(&self) -> usize {
        self.num_src_lat * self.num_src_lon
    }

    // ---- cube grid -------------------------------------------------------

    fn cube_depth_index(&self, depth: f64) -> Option<usize> {
        let step = self.spec.depth_step_km;
        let idx = ((depth - step / 2.0) / step).round();
        if idx < 0.0 || idx as usize >= self.num_cube_depths {
            None
        } else {
            Some(idx as usize)
        }
    }

    fn cube_depth(&self, depth_index: usize) -> f64 {
        (depth_index as f64 + 0.5) * self.spec.depth_step_km
    }

    /// Linear cube index for a location, or `None` outside the region or
    /// depth range.
    pub fn cube_index_for_location(&self, loc: &Location) -> Option<usize> {
        let i_lat = grid_cell(loc.lat - self.spec.min_lat, self.cube_spacing_deg, self.num_lat_cubes)?;
        let i_lon = grid_cell(loc.lon - self.spec.min_lon, self.cube_spacing_deg, self.num_lon_cubes)?;
        let i_dep = self.cube_depth_index(loc.depth)?;
        Some(i_dep * self.cubes_per_layer() + i_lat * self.num_lon_cubes + i_lon)
    }

    /// Center location of the cube with the given linear index.
    pub fn location_for_cube_index(&self, cube_index: usize) -> Location {
        let per_layer = self.cubes_per_layer();
        let i_dep = cube_index / per_layer;
        let region_index = cube_index % per_layer;
        let i_lat = region_index / self.num_lon_cubes;
        let i_lon = region_index % self.num_lon_cubes;
        Location::new(
            self.spec.min_lat + (i_lat as f64 + 0.5) * self.cube_spacing_deg,
            self.spec.min_lon + (i_lon as f64 + 0.5) * self.cube_spacing_deg,
            self.cube_depth(i_dep),
        )
    }

    // ---- parent-location grid -------------------------------------------

    fn parent_depth_index(&self, depth: f64) -> Option<usize> {
        let idx = (depth / self.spec.depth_step_km).round();
        if idx < 0.0 || idx as usize >= self.num_parent_depths() {
            None
        } else {
            Some(idx as usize)
        }
    }

    fn parent_depth(&self, depth_index: usize) -> f64 {
        depth_index as f64 * self.spec.depth_step_km
    }

    /// Linear parent-location index for a location, or `None` out of range.
    pub fn parent_index_for_location(&self, loc: &Location) -> Option<usize> {
        let i_lat = grid_node(loc.lat - self.spec.min_lat, self.cube_spacing_deg, self.num_lat_cubes + 1)?;
        let i_lon = grid_node(loc.lon - self.spec.min_lon, self.cube_spacing_deg, self.num_lon_cubes + 1)?;
        let i_dep = self.parent_depth_index(loc.depth)?;
        Some(i_dep * self.parents_per_layer() + i_lat * (self.num_lon_cubes + 1) + i_lon)
    }

    /// Node location of the parent-location grid for the given index.
    pub fn location_for_parent_index(&self, parent_index: usize) -> Location {
        let per_layer = self.parents_per_layer();
        let i_dep = parent_index / per_layer;
        let region_index = parent_index % per_layer;
        let i_lat = region_index / (self.num_lon_cubes + 1);
        let i_lon = region_index % (self.num_lon_cubes + 1);
        Location::new(
            self.spec.min_lat + i_lat as f64 * self.cube_spacing_deg,
            self.spec.min_lon + i_lon as f64 * self.cube_spacing_deg,
            self.parent_depth(i_dep),
        )
    }

    // ---- source grid -----------------------------------------------------

    /// Index of the gridded-source cell containing the location (depth is
    /// ignored; source cells span the whole seismogenic thickness), or
    /// `None` outside the region.
    pub fn source_index_for_location(&self, loc: &Location) -> Option<usize> {
        let i_lat = grid_cell(loc.lat - self.spec.min_lat, self.spec.source_spacing_deg, self.num_src_lat)?;
        let i_lon = grid_cell(loc.lon - self.spec.min_lon, self.spec.source_spacing_deg, self.num_src_lon)?;
        Some(i_lat * self.num_src_lon + i_lon)
    }

    /// Surface center of a source cell (depth 0).
    pub fn source_cell_center(&self, source_index: usize) -> Location {
        let i_lat = source_index / self.num_src_lon;
        let i_lon = source_index % self.num_src_lon;
        Location::new(
            self.spec.min_lat + (i_lat as f64 + 0.5) * self.spec.source_spacing_deg,
            self.spec.min_lon + (i_lon as f64 + 0.5) * self.spec.source_spacing_deg,
            0.0,
        )
    }

    // ---- geometry --------------------------------------------------------

    /// Approximate straight-line distance between two locations in km,
    /// using the region's mid-latitude to scale longitude.
    pub fn distance_km(&self, a: &Location, b: &Location) -> f64 {
        let d_lat = (a.lat - b.lat) * KM_PER_DEG;
        let d_lon = (a.lon - b.lon) * KM_PER_DEG * self.cos_mid_lat;
        let d_dep = a.depth - b.depth;
        (d_lat * d_lat + d_lon * d_lon + d_dep * d_dep).sqrt()
    }
}

/// Cell index for a cell-centered grid: any offset in `[i*s, (i+1)*s)` maps
/// to cell `i`.
fn grid_cell(offset: f64, spacing: f64, count: usize) -> Option<usize> {
    if offset < 0.0 {
        return None;
    }
    let idx = (offset / spacing).floor() as usize;
    (idx < count).then_some(idx)
}

/// Node index for a corner-anchored grid: offsets snap to the nearest node.
fn grid_node(offset: f64, spacing: f64, count: usize) -> Option<usize> {
    let idx = (offset / spacing).round();
    if idx < 0.0 || idx as usize >= count {
        None
    } else {
        Some(idx as usize)
    }
}

//! Precomputed spatial triggering-density lookup.
//!
//! The kernel tabulates the Hardebeck (2013) volumetric aftershock density
//! as a function of the offset between a cube center and a parent location,
//! one table per parent depth layer. North/south and east/west symmetry is
//! exploited by keying on `(|relLat|, |relLon|)`, so only a quarter volume
//! is stored. Lookups are nearest-bin.
//!
//! Edge truncation against the finite region is deliberately not corrected
//! here; the per-parent samplers renormalize over the cubes they actually
//! cover.

use nalgebra::Vector3;
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::Rng;

use crate::config::EtasParams;
use crate::region::{CubedRegion, KM_PER_DEG};

/// Aftershock density at 3-D distance `distance_km` from the parent,
/// following Hardebeck (2013) eqs. (5)-(8): a spherical-shell geometry
/// inside half the seismogenic thickness, cylindrical beyond, zero past
/// `max_dist_km`.
pub fn hardebeck_density(
    distance_km: f64,
    q: f64,
    min_dist_km: f64,
    seismo_thickness_km: f64,
    max_dist_km: f64,
) -> f64 {
    if distance_km > max_dist_km {
        return 0.0;
    }
    let one_minus_q = 1.0 - q;
    let cs = one_minus_q
        / ((max_dist_km + min_dist_km).powf(one_minus_q) - min_dist_km.powf(one_minus_q));
    let decay = cs * (distance_km + min_dist_km).powf(-q);
    if distance_km < seismo_thickness_km / 2.0 {
        decay / (4.0 * std::f64::consts::PI * distance_km * distance_km)
    } else {
        decay / (2.0 * std::f64::consts::PI * distance_km * seismo_thickness_km)
    }
}

#[derive(Debug, Clone)]
pub struct DecayKernel {
    q: f64,
    min_dist_km: f64,
    max_dist_km: f64,
    max_depth_km: f64,
    latlon_spacing_deg: f64,
    depth_step_km: f64,
    cos_mid_lat: f64,
    num_latlon_bins: usize,
    num_depth_bins: usize,
    /// One `[iLat][iLon][iDep]` table per parent depth layer.
    tables: Vec<Array3<f64>>,
}

impl DecayKernel {
    /// Precompute the density tables for the given region discretization
    /// and ETAS distance-decay parameters.
    pub fn build(region: &CubedRegion, params: &EtasParams) -> Self {
        let latlon_spacing_deg = region.cube_spacing_deg();
        let depth_step_km = region.depth_step_km();
        let cos_mid_lat = region.cos_mid_lat();
        let max_dist_km = params.max_trigger_dist_km;
        let max_depth_km = region.max_depth_km();

        let max_latlon_deg = max_dist_km / (KM_PER_DEG * cos_mid_lat);
        let num_latlon_bins = ((max_latlon_deg / latlon_spacing_deg).round() as usize).max(1);
        let num_depth_bins = region.num_cube_depths();
        let num_parent_depths = region.num_parent_depths();

        let cell_volume = (KM_PER_DEG * latlon_spacing_deg)
            * (KM_PER_DEG * cos_mid_lat * latlon_spacing_deg)
            * depth_step_km;

        let mut tables = Vec::with_capacity(num_parent_depths);
        for i_par_dep in 0..num_parent_depths {
            let parent_depth = i_par_dep as f64 * depth_step_km;
            let mut table = Array3::zeros((num_latlon_bins, num_latlon_bins, num_depth_bins));
            for i_lat in 0..num_latlon_bins {
                let rel_lat = (i_lat as f64 + 0.5) * latlon_spacing_deg;
                for i_lon in 0..num_latlon_bins {
                    let rel_lon = (i_lon as f64 + 0.5) * latlon_spacing_deg;
                    for i_dep in 0..num_depth_bins {
                        let cube_depth = (i_dep as f64 + 0.5) * depth_step_km;
                        let dist = distance_km(
                            rel_lat,
                            rel_lon,
                            cube_depth - parent_depth,
                            cos_mid_lat,
                        );
                        table[[i_lat, i_lon, i_dep]] = hardebeck_density(
                            dist,
                            params.dist_decay_q,
                            params.min_dist_km,
                            max_depth_km,
                            max_dist_km,
                        ) * cell_volume;
                    }
                }
            }
            tables.push(table);
        }

        Self {
            q: params.dist_decay_q,
            min_dist_km: params.min_dist_km,
            max_dist_km,
            max_depth_km,
            latlon_spacing_deg,
            depth_step_km,
            cos_mid_lat,
            num_latlon_bins,
            num_depth_bins,
            tables,
        }
    }

    pub fn q(&self) -> f64 {
        self.q
    }

    pub fn min_dist_km(&self) -> f64 {
        self.min_dist_km
    }

    pub fn max_dist_km(&self) -> f64 {
        self.max_dist_km
    }

    pub fn max_depth_km(&self) -> f64 {
        self.max_depth_km
    }

    pub fn cos_mid_lat(&self) -> f64 {
        self.cos_mid_lat
    }

    /// Triggering density for a cube at `(rel_lat, rel_lon)` degrees from
    /// the parent location, by nearest-bin lookup. Symmetric in the signs
    /// of both horizontal offsets; zero outside the tabulated volume.
    ///
    /// TODO: subdivide the first few bins around the parent; the density
    /// varies fastest exactly where the grid is crudest.
    pub fn density_at(
        &self,
        rel_lat: f64,
        rel_lon: f64,
        cube_depth: f64,
        parent_depth: f64,
    ) -> f64 {
        let i_lat = (rel_lat.abs() / self.latlon_spacing_deg) as usize;
        let i_lon = (rel_lon.abs() / self.latlon_spacing_deg) as usize;
        if i_lat >= self.num_latlon_bins || i_lon >= self.num_latlon_bins {
            return 0.0;
        }
        let i_dep = ((cube_depth - self.depth_step_km / 2.0) / self.depth_step_km).round();
        if i_dep < 0.0 || i_dep as usize >= self.num_depth_bins {
            return 0.0;
        }
        let i_par = (parent_depth / self.depth_step_km).round();
        if i_par < 0.0 || i_par as usize >= self.tables.len() {
            return 0.0;
        }
        self.tables[i_par as usize][[i_lat, i_lon, i_dep as usize]]
    }

    /// Uniform jitter within one cube, relative to the cube center:
    /// `(dlat deg, dlon deg, ddepth km)`. The 0.999 factor keeps jittered
    /// points strictly inside the cell.
    pub fn random_delta_loc(&self, rng: &mut StdRng) -> Vector3<f64> {
        Vector3::new(
            self.latlon_spacing_deg * (rng.random::<f64>() - 0.5) * 0.999,
            self.latlon_spacing_deg * (rng.random::<f64>() - 0.5) * 0.999,
            self.depth_step_km * (rng.random::<f64>() - 0.5) * 0.999,
        )
    }
}

fn distance_km(rel_lat_deg: f64, rel_lon_deg: f64, rel_depth_km: f64, cos_mid_lat: f64) -> f64 {
    let d_lat = rel_lat_deg * KM_PER_DEG;
    let d_lon = rel_lon_deg * KM_PER_DEG * cos_mid_lat;
    (d_lat * d_lat + d_lon * d_lon + rel_depth_km * rel_depth_km).sqrt()
}

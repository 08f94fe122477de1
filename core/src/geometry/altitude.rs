use ndarray::{s, Array2, Array3, Axis};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::OnceLock;

/// Fixed scan geometry of a cross-track scanning spaceborne radar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BeamGeometry {
    /// Half of the total cross-track swath angle (degrees).
    pub half_swath_deg: f64,
    pub beam_count: usize,
    /// Angular width of one beam, used to shift angles onto bin edges (degrees).
    pub beam_width_deg: f64,
    pub orbit_height_km: f64,
    pub earth_radius_km: f64,
    pub gate_spacing_km: f64,
    pub gate_count: usize,
    /// Beams kept downstream (the inner swath shared by both frequencies).
    pub inner_beams: Range<usize>,
}

impl BeamGeometry {
    /// GPM-DPR normal-scan geometry.
    pub fn gpm_dpr() -> Self {
        Self {
            half_swath_deg: 17.0,
            beam_count: 49,
            beam_width_deg: 0.70833333,
            orbit_height_km: 407.0,
            earth_radius_km: 6378.0,
            gate_spacing_km: 0.125,
            gate_count: crate::prelude::DPR_GATES,
            inner_beams: 12..37,
        }
    }

    /// Left-edge scan angle of every beam across the full swath (radians).
    pub fn scan_angles(&self) -> Vec<f64> {
        let total = 2.0 * self.half_swath_deg;
        let step = total / (self.beam_count - 1) as f64;
        (0..self.beam_count)
            .map(|beam| {
                let centre = -self.half_swath_deg + step * beam as f64;
                (centre - self.beam_width_deg / 2.0).to_radians()
            })
            .collect()
    }

    /// Height above sea level (km) of gate `gate` along a beam at `theta`.
    pub fn gate_altitude(&self, theta: f64, gate: usize) -> f64 {
        let ratio = (self.earth_radius_km + self.orbit_height_km) / self.earth_radius_km;
        let refraction = (ratio * theta.sin()).asin() - theta;
        (self.gate_count as f64 - gate as f64) * self.gate_spacing_km * (theta + refraction).cos()
    }
}

/// Altitude grid engine; the per-beam profile is computed once and reused.
pub struct SwathGeometry {
    beams: BeamGeometry,
    profile: OnceLock<Array2<f64>>,
}

impl SwathGeometry {
    pub fn new(beams: BeamGeometry) -> Self {
        Self {
            beams,
            profile: OnceLock::new(),
        }
    }

    pub fn beams(&self) -> &BeamGeometry {
        &self.beams
    }

    /// Full-swath (beam × gate) altitude table.
    pub fn beam_profile(&self) -> &Array2<f64> {
        self.profile.get_or_init(|| {
            let angles = self.beams.scan_angles();
            Array2::from_shape_fn((self.beams.beam_count, self.beams.gate_count), |(beam, gate)| {
                self.beams.gate_altitude(angles[beam], gate)
            })
        })
    }

    /// Altitude grid (along × inner cross × range) for `scans` along-track scans.
    pub fn altitude_grid(&self, scans: usize) -> Array3<f64> {
        let inner = self
            .beam_profile()
            .slice(s![self.beams.inner_beams.clone(), ..]);
        let mut grid = Array3::zeros((scans, inner.nrows(), inner.ncols()));
        for mut scan in grid.axis_iter_mut(Axis(0)) {
            scan.assign(&inner);
        }
        grid
    }
}

impl Default for SwathGeometry {
    fn default() -> Self {
        Self::new(BeamGeometry::gpm_dpr())
    }
}

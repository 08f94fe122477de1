use crate::masking::GateMask;
use crate::math::filter::GaussianFilter;
use crate::prelude::{ensure_shape, SwathResult};
use crate::telemetry::log::LogManager;
use ndarray::{Array3, ArrayView3, Axis, Zip};
use serde::{Deserialize, Serialize};

/// Stand-in reflectivity for missing gates before smoothing.
const NOISE_FLOOR_DBZ: f64 = -99.99;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CloudTopParams {
    pub sigma: f64,
    pub min_dbz: f64,
    /// Gates above this altitude are aircraft-near noise (km).
    pub max_altitude_km: f64,
}

impl Default for CloudTopParams {
    fn default() -> Self {
        Self {
            sigma: 1.0,
            min_dbz: 10.0,
            max_altitude_km: 10.0,
        }
    }
}

/// Airborne cloud-top noise mask from smoothed reflectivity.
pub struct CloudTopMasker {
    params: CloudTopParams,
    filter: GaussianFilter,
    logger: LogManager,
}

impl CloudTopMasker {
    pub fn new(params: CloudTopParams) -> Self {
        let filter = GaussianFilter::new(params.sigma);
        Self {
            params,
            filter,
            logger: LogManager::new("cloudtop"),
        }
    }

    /// Smooths each cross-track plane and excludes weak or too-high gates.
    pub fn build(
        &self,
        reflectivity: ArrayView3<f64>,
        altitude: ArrayView3<f64>,
    ) -> SwathResult<GateMask> {
        ensure_shape("alt", altitude.shape(), reflectivity.shape())?;
        let min_dbz = self.params.min_dbz;
        let max_alt = self.params.max_altitude_km;
        let mut mask = Array3::from_elem(reflectivity.raw_dim(), false);

        for (cross, mut plane_mask) in mask.axis_iter_mut(Axis(1)).enumerate() {
            let plane = reflectivity
                .index_axis(Axis(1), cross)
                .mapv(|v| if v.is_nan() { NOISE_FLOOR_DBZ } else { v });
            let smoothed = self.filter.apply(plane.view());
            Zip::from(&mut plane_mask)
                .and(&plane)
                .and(&smoothed)
                .and(altitude.index_axis(Axis(1), cross))
                .for_each(|excluded, &raw, &smooth, &alt| {
                    *excluded = smooth < min_dbz || raw < min_dbz || alt > max_alt;
                });
        }

        let excluded = mask.iter().filter(|excluded| **excluded).count();
        self.logger.detail(&format!(
            "cloud-top mask excluded {} of {} gates",
            excluded,
            mask.len()
        ));
        Ok(mask)
    }
}

impl Default for CloudTopMasker {
    fn default() -> Self {
        Self::new(CloudTopParams::default())
    }
}

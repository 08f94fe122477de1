use crate::dataset::SwathDataset;
use crate::enrichment::Enrichment;
use crate::math::{LinearInterpolator, StatsHelper};
use crate::prelude::{Field, SwathError, SwathResult, FILL_VALUE};
use crate::telemetry::log::LogManager;
use chrono::NaiveDateTime;
use ndarray::{s, Array3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Quantities resampled onto the gate grid by default.
pub const DEFAULT_QUANTITIES: [&str; 4] = ["T", "U", "V", "QV"];

/// One variable of a reanalysis column, level by level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileQuantity {
    pub units: String,
    pub standard_name: String,
    #[serde(with = "crate::nullable::values")]
    pub values: Vec<f64>,
}

/// Reanalysis column with level heights in metres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerticalProfile {
    #[serde(with = "crate::nullable::values")]
    pub heights_m: Vec<f64>,
    pub quantities: BTreeMap<String, ProfileQuantity>,
}

impl VerticalProfile {
    pub fn quantity(&self, name: &str) -> SwathResult<&ProfileQuantity> {
        self.quantities
            .get(name)
            .ok_or_else(|| SwathError::MissingField(format!("sounding quantity {}", name)))
    }

    /// Height (km) to value interpolant; `None` with fewer than two valid levels.
    ///
    /// Values at or below the fill value are missing levels.
    pub fn interpolator(&self, name: &str) -> SwathResult<Option<LinearInterpolator>> {
        let quantity = self.quantity(name)?;
        let heights_km: Vec<f64> = self.heights_m.iter().map(|h| h / 1000.0).collect();
        let values: Vec<f64> = quantity
            .values
            .iter()
            .map(|&v| if v <= FILL_VALUE { f64::NAN } else { v })
            .collect();
        Ok(LinearInterpolator::new(&heights_km, &values))
    }
}

/// Environmental profiles looked up by nearest neighbour.
pub trait EnvironmentalGrid {
    fn nearest_profile(
        &self,
        lon: f64,
        lat: f64,
        time: NaiveDateTime,
    ) -> SwathResult<Option<&VerticalProfile>>;
}

/// Regular lon/lat/time grid of profiles, stored time-major then latitude.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GriddedReanalysis {
    pub lons: Vec<f64>,
    pub lats: Vec<f64>,
    pub times: Vec<NaiveDateTime>,
    pub profiles: Vec<VerticalProfile>,
}

impl GriddedReanalysis {
    pub fn new(
        lons: Vec<f64>,
        lats: Vec<f64>,
        times: Vec<NaiveDateTime>,
        profiles: Vec<VerticalProfile>,
    ) -> SwathResult<Self> {
        let grid = Self {
            lons,
            lats,
            times,
            profiles,
        };
        grid.validate()?;
        Ok(grid)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> SwathResult<Self> {
        let path = path.as_ref();
        let unavailable = |err: String| {
            SwathError::ExternalResourceUnavailable(format!("{}: {}", path.display(), err))
        };
        let contents = fs::read_to_string(path).map_err(|err| unavailable(err.to_string()))?;
        let grid: GriddedReanalysis =
            serde_json::from_str(&contents).map_err(|err| unavailable(err.to_string()))?;
        grid.validate()?;
        Ok(grid)
    }

    fn validate(&self) -> SwathResult<()> {
        let expected = self.lons.len() * self.lats.len() * self.times.len();
        if expected == 0 || self.profiles.len() != expected {
            return Err(SwathError::InvalidConfiguration(format!(
                "reanalysis grid of {}x{}x{} needs {} profiles, found {}",
                self.times.len(),
                self.lats.len(),
                self.lons.len(),
                expected,
                self.profiles.len()
            )));
        }
        Ok(())
    }

    fn nearest_time(&self, time: NaiveDateTime) -> Option<usize> {
        self.times
            .iter()
            .enumerate()
            .min_by_key(|(_, t)| (**t - time).num_seconds().abs())
            .map(|(idx, _)| idx)
    }
}

impl EnvironmentalGrid for GriddedReanalysis {
    fn nearest_profile(
        &self,
        lon: f64,
        lat: f64,
        time: NaiveDateTime,
    ) -> SwathResult<Option<&VerticalProfile>> {
        if lon.is_nan() || lat.is_nan() {
            return Ok(None);
        }
        let found = StatsHelper::nearest_index(&self.lons, lon)
            .zip(StatsHelper::nearest_index(&self.lats, lat))
            .zip(self.nearest_time(time));
        Ok(found.and_then(|((x, y), t)| {
            let idx = (t * self.lats.len() + y) * self.lons.len() + x;
            self.profiles.get(idx)
        }))
    }
}

/// Resamples reanalysis quantities onto every column's gate altitudes.
pub struct SoundingInterpolator<G> {
    grid: G,
    quantities: Vec<String>,
    logger: LogManager,
}

impl<G: EnvironmentalGrid> SoundingInterpolator<G> {
    pub fn new(grid: G) -> Self {
        Self::with_quantities(grid, &DEFAULT_QUANTITIES)
    }

    pub fn with_quantities(grid: G, quantities: &[&str]) -> Self {
        Self {
            grid,
            quantities: quantities.iter().map(|q| q.to_string()).collect(),
            logger: LogManager::new("sounding"),
        }
    }

    fn interpolate(&self, dataset: &SwathDataset, name: &str) -> SwathResult<Field> {
        let mut values = Array3::from_elem(dataset.alt.raw_dim(), f64::NAN);
        let mut attributes: Option<(String, String)> = None;
        let mut short_columns = 0usize;

        for ((along, cross), lon) in dataset.lons.indexed_iter() {
            let lat = dataset.lats[[along, cross]];
            let time = dataset.time[[along, cross]];
            let Some(profile) = self.grid.nearest_profile(*lon, lat, time)? else {
                continue;
            };
            if attributes.is_none() {
                let quantity = profile.quantity(name)?;
                attributes = Some((quantity.units.clone(), quantity.standard_name.clone()));
            }
            let Some(interp) = profile.interpolator(name)? else {
                short_columns += 1;
                continue;
            };
            let gates = dataset.alt.slice(s![along, cross, ..]);
            values
                .slice_mut(s![along, cross, ..])
                .zip_mut_with(&gates, |value, &alt| *value = interp.eval(alt));
        }

        if short_columns > 0 {
            self.logger.note(&format!(
                "{}: {} columns with fewer than two valid levels left missing",
                name, short_columns
            ));
        }
        let (units, standard_name) =
            attributes.unwrap_or_else(|| ("unknown".to_string(), name.to_string()));
        Ok(Field::new(
            values.into_dyn(),
            &units,
            &format!("Interpolated {} to GPM height coord", standard_name),
        ))
    }
}

impl<G: EnvironmentalGrid> Enrichment for SoundingInterpolator<G> {
    fn name(&self) -> &str {
        "sounding"
    }

    fn derive(&self, dataset: &SwathDataset) -> SwathResult<Vec<(String, Field)>> {
        self.quantities
            .iter()
            .map(|name| Ok((name.clone(), self.interpolate(dataset, name)?)))
            .collect()
    }
}

use crate::dataset::SwathDataset;
use crate::enrichment::Enrichment;
use crate::math::{LinearInterpolator, StatsHelper};
use crate::pipeline::config::BoundingBox;
use crate::prelude::{Field, SwathError, SwathResult};
use crate::telemetry::log::LogManager;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Altitude bin edges are 0, 500, ..., 5500 m.
const BIN_WIDTH_M: f64 = 500.0;
const BIN_EDGES: usize = 12;

pub const T3D_FIELD: &str = "T3d";

/// One aircraft sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InSituObservation {
    pub lon: f64,
    pub lat: f64,
    #[serde(with = "crate::nullable::value")]
    pub alt_m: f64,
    #[serde(with = "crate::nullable::value")]
    pub temperature_c: f64,
}

/// Bin of `alt` among the edges 0, 500, ..., 5500 m: 0 below the first edge,
/// `i` for `edge[i-1] <= alt < edge[i]`, 12 at or above the last edge.
fn altitude_bin(alt_m: f64) -> usize {
    (0..BIN_EDGES)
        .take_while(|&edge| alt_m >= edge as f64 * BIN_WIDTH_M)
        .count()
}

/// Temperature profile from an aircraft spiral projected onto the gate grid.
pub struct InSituTemperature {
    observations: Vec<InSituObservation>,
    region: Option<BoundingBox>,
    logger: LogManager,
}

impl InSituTemperature {
    pub fn new(observations: Vec<InSituObservation>, region: Option<BoundingBox>) -> Self {
        Self {
            observations,
            region,
            logger: LogManager::new("insitu"),
        }
    }

    /// Reads a JSON list of observations.
    pub fn load<P: AsRef<Path>>(path: P, region: Option<BoundingBox>) -> SwathResult<Self> {
        let path = path.as_ref();
        let unavailable = |err: String| {
            SwathError::ExternalResourceUnavailable(format!("{}: {}", path.display(), err))
        };
        let contents = fs::read_to_string(path).map_err(|err| unavailable(err.to_string()))?;
        let observations: Vec<InSituObservation> =
            serde_json::from_str(&contents).map_err(|err| unavailable(err.to_string()))?;
        Ok(Self::new(observations, region))
    }

    /// Bin-averaged (altitude km, temperature) interpolant.
    pub fn profile(&self) -> SwathResult<LinearInterpolator> {
        let mut bins: BTreeMap<usize, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
        for obs in &self.observations {
            if let Some(region) = &self.region {
                if !region.contains(obs.lon, obs.lat) {
                    continue;
                }
            }
            if obs.alt_m.is_nan() {
                continue;
            }
            let (alts, temps) = bins.entry(altitude_bin(obs.alt_m)).or_default();
            alts.push(obs.alt_m);
            temps.push(obs.temperature_c);
        }

        let (alts, temps): (Vec<f64>, Vec<f64>) = bins
            .values()
            .map(|(alts, temps)| {
                (
                    StatsHelper::nanmean(alts) / 1000.0,
                    StatsHelper::nanmean(temps),
                )
            })
            .unzip();
        self.logger
            .detail(&format!("in-situ profile from {} altitude bins", alts.len()));
        LinearInterpolator::new(&alts, &temps).ok_or_else(|| {
            SwathError::NoDataInRegion("fewer than two in-situ altitude bins".to_string())
        })
    }
}

impl Enrichment for InSituTemperature {
    fn name(&self) -> &str {
        "insitu"
    }

    fn derive(&self, dataset: &SwathDataset) -> SwathResult<Vec<(String, Field)>> {
        let profile = self.profile()?;
        let values = dataset.alt.mapv(|alt| profile.eval(alt));
        Ok(vec![(
            T3D_FIELD.to_string(),
            Field::new(
                values.into_dyn(),
                "degC",
                "Temperature, inferred from Citation Spiral",
            ),
        )])
    }
}

use crate::masking::CloudTopParams;
use crate::prelude::{Campaign, SwathError, SwathResult};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Geographic region `[west, east, south, north]` in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, east: f64, south: f64, north: f64) -> SwathResult<Self> {
        let bbox = Self {
            west,
            east,
            south,
            north,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Parses the corner list used by configuration files and the CLI.
    pub fn from_slice(corners: &[f64]) -> SwathResult<Self> {
        match corners {
            [west, east, south, north] => Self::new(*west, *east, *south, *north),
            _ => Err(SwathError::InvalidConfiguration(format!(
                "bounding box needs 4 corners [west, east, south, north], got {}",
                corners.len()
            ))),
        }
    }

    pub fn validate(&self) -> SwathResult<()> {
        let finite = [self.west, self.east, self.south, self.north]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.west > self.east || self.south > self.north {
            return Err(SwathError::InvalidConfiguration(format!(
                "bounding box {:?} is not ordered west <= east, south <= north",
                self
            )));
        }
        Ok(())
    }

    /// Edges are inside; missing coordinates are not.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.west && lon <= self.east && lat >= self.south && lat <= self.north
    }

    pub fn column_mask(&self, lons: &Array2<f64>, lats: &Array2<f64>) -> Array2<bool> {
        Zip::from(lons)
            .and(lats)
            .map_collect(|&lon, &lat| self.contains(lon, lat))
    }
}

/// Surface precipitation-type filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecipFilter {
    #[default]
    None,
    /// Precipitation detected by both channels.
    Precip,
    /// Dual-channel precipitation flagged as surface snowfall.
    Snow,
}

impl FromStr for PrecipFilter {
    type Err = SwathError;

    fn from_str(value: &str) -> SwathResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "none" | "" => Ok(PrecipFilter::None),
            "precip" => Ok(PrecipFilter::Precip),
            "snow" => Ok(PrecipFilter::Snow),
            other => Err(SwathError::InvalidConfiguration(format!(
                "unknown precipitation type '{}'",
                other
            ))),
        }
    }
}

/// Options controlling field assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub bbox: Option<BoundingBox>,
    pub ptype: PrecipFilter,
    pub clutter: bool,
    pub echotop: bool,
    /// Airborne cloud-top noise mask; disabled when absent.
    pub cloudtop: Option<CloudTopParams>,
    /// Keep the clutter and echo-top masks as dataset entries.
    pub keep_masks: bool,
    pub near_surface_reference: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bbox: None,
            ptype: PrecipFilter::None,
            clutter: true,
            echotop: true,
            cloudtop: Some(CloudTopParams::default()),
            keep_masks: true,
            near_surface_reference: None,
        }
    }
}

impl PipelineConfig {
    /// Rejects option combinations the campaign cannot honor.
    pub fn validate(&self, campaign: Campaign) -> SwathResult<()> {
        if let Some(bbox) = &self.bbox {
            bbox.validate()?;
        }
        if campaign.is_airborne() && self.ptype != PrecipFilter::None {
            return Err(SwathError::InvalidConfiguration(format!(
                "precipitation-type filter is not defined for {:?}",
                campaign
            )));
        }
        if let Some(params) = &self.cloudtop {
            if params.sigma.is_nan() || params.sigma <= 0.0 {
                return Err(SwathError::InvalidConfiguration(format!(
                    "cloud-top sigma must be positive, got {}",
                    params.sigma
                )));
            }
        }
        Ok(())
    }

    pub fn surface_reference(&self, campaign: Campaign) -> String {
        self.near_surface_reference
            .clone()
            .unwrap_or_else(|| campaign.default_surface_reference().to_string())
    }
}

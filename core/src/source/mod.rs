//! Raw swath sources: the file-reading collaborator and the per-campaign parsers.

pub mod apr;
pub mod dpr;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod lease;
pub mod memory;

pub use apr::AprSource;
pub use dpr::DprSource;
pub use lease::SourceLease;
pub use memory::MemoryReader;

use crate::prelude::{Campaign, Field, SwathError, SwathResult};
use chrono::NaiveDateTime;
use ndarray::{Array2, Array3, ArrayD, Ix2, Ix3};

/// Named-array access to an opened instrument file.
pub trait SwathReader {
    /// Reads the array stored under a `group/field` key path.
    fn read(&mut self, key: &str) -> SwathResult<ArrayD<f64>>;

    /// Dimensions of a stored array, without reading its samples.
    fn shape(&self, key: &str) -> SwathResult<Vec<usize>>;

    /// Whether an optional dataset exists in this file.
    fn contains(&self, key: &str) -> bool;

    /// Releases the underlying handle.
    fn close(&mut self) {}
}

/// How the assembler masks a field before applying its floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskRule {
    None,
    Clutter,
    ClutterAndEchoTop,
    CloudTop,
}

#[derive(Debug, Clone)]
pub struct RawField {
    pub name: String,
    pub field: Field,
    pub rule: MaskRule,
    /// Values below this floor are indistinguishable from noise.
    pub floor: Option<f64>,
}

impl RawField {
    pub fn new(name: &str, field: Field, rule: MaskRule, floor: Option<f64>) -> Self {
        Self {
            name: name.to_string(),
            field,
            rule,
            floor,
        }
    }
}

/// Column geolocation, enough to test a bounding region before loading fields.
#[derive(Debug, Clone)]
pub struct SwathCoordinates {
    pub lons: Array2<f64>,
    pub lats: Array2<f64>,
}

/// Everything a parser extracts from one file, before masking.
#[derive(Debug, Clone)]
pub struct RawSwath {
    pub campaign: Campaign,
    pub lons: Array2<f64>,
    pub lats: Array2<f64>,
    pub time: Array2<NaiveDateTime>,
    pub alt: Array3<f64>,
    pub gate_lons: Option<Array3<f64>>,
    pub gate_lats: Option<Array3<f64>>,
    /// Clutter-free-bottom bins of the two channels, narrowed to the same beams.
    pub clutter_bins: Option<(Array2<f64>, Array2<f64>)>,
    /// Assembled field the echo-top is derived from.
    pub echo_top_reference: Option<String>,
    pub fields: Vec<RawField>,
    pub notes: Vec<String>,
}

/// Campaign-specific parser over an opened file.
pub trait RawSwathSource {
    fn campaign(&self) -> Campaign;

    fn coordinates(&mut self) -> SwathResult<SwathCoordinates>;

    fn load(&mut self) -> SwathResult<RawSwath>;

    fn release(&mut self);
}

/// Selects the parser for a campaign once, at load time.
pub fn open_source<R>(campaign: Campaign, reader: R) -> Box<dyn RawSwathSource>
where
    R: SwathReader + 'static,
{
    match campaign {
        Campaign::SpaceborneDpr => Box::new(DprSource::new(reader)),
        Campaign::AirborneGcpex | Campaign::AirborneOlympex => {
            Box::new(AprSource::new(campaign, reader))
        }
    }
}

pub(crate) fn into_2d(key: &str, values: ArrayD<f64>) -> SwathResult<Array2<f64>> {
    let found = values.ndim();
    values
        .into_dimensionality::<Ix2>()
        .map_err(|_| SwathError::UnexpectedRank {
            name: key.to_string(),
            expected: 2,
            found,
        })
}

pub(crate) fn into_3d(key: &str, values: ArrayD<f64>) -> SwathResult<Array3<f64>> {
    let found = values.ndim();
    values
        .into_dimensionality::<Ix3>()
        .map_err(|_| SwathError::UnexpectedRank {
            name: key.to_string(),
            expected: 3,
            found,
        })
}

/// Per-scan integer components stored as a 1-D float array.
pub(crate) fn read_integers(reader: &mut dyn SwathReader, key: &str) -> SwathResult<Vec<i64>> {
    let values = reader.read(key)?;
    if values.ndim() != 1 {
        return Err(SwathError::UnexpectedRank {
            name: key.to_string(),
            expected: 1,
            found: values.ndim(),
        });
    }
    Ok(values.iter().map(|v| v.round() as i64).collect())
}

use crate::math::StatsHelper;
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

/// Number of range gates in a GPM-DPR profile.
pub const DPR_GATES: usize = 176;

/// Number of range gates in an APR-2/APR-3 profile.
pub const APR_GATES: usize = 550;

/// Raw fill value used by the spaceborne products.
pub const FILL_VALUE: f64 = -9999.0;

/// Common error type for swath processing.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SwathError {
    #[error("no data in region: {0}")]
    NoDataInRegion(String),
    #[error("missing optional channel: {0}")]
    MissingOptionalChannel(String),
    #[error("degenerate column at ({along}, {cross})")]
    DegenerateColumn { along: usize, cross: usize },
    #[error("external resource unavailable: {0}")]
    ExternalResourceUnavailable(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("missing field: {0}")]
    MissingField(String),
    #[error("shape mismatch for {name}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("{name} has {found} dimensions, expected {expected}")]
    UnexpectedRank {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("invalid scan time: {0}")]
    InvalidScanTime(String),
}

pub type SwathResult<T> = Result<T, SwathError>;

/// Closed set of supported instruments and field campaigns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Campaign {
    SpaceborneDpr,
    AirborneGcpex,
    AirborneOlympex,
}

impl Campaign {
    pub fn is_airborne(&self) -> bool {
        !matches!(self, Campaign::SpaceborneDpr)
    }

    pub fn range_gates(&self) -> usize {
        if self.is_airborne() {
            APR_GATES
        } else {
            DPR_GATES
        }
    }

    /// Field used to locate the near-surface gate when none is configured.
    pub fn default_surface_reference(&self) -> &'static str {
        if self.is_airborne() {
            "Ku"
        } else {
            "NSKu_c"
        }
    }
}

impl std::str::FromStr for Campaign {
    type Err = SwathError;

    fn from_str(value: &str) -> SwathResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "dpr" | "gpm" | "spaceborne_dpr" => Ok(Campaign::SpaceborneDpr),
            "gcpex" | "airborne_gcpex" => Ok(Campaign::AirborneGcpex),
            "olympex" | "airborne_olympex" => Ok(Campaign::AirborneOlympex),
            other => Err(SwathError::InvalidConfiguration(format!(
                "unknown campaign '{}'",
                other
            ))),
        }
    }
}

/// Labeled array with descriptive attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub values: ArrayD<f64>,
    pub units: String,
    pub standard_name: String,
}

impl Field {
    pub fn new(values: ArrayD<f64>, units: &str, standard_name: &str) -> Self {
        Self {
            values,
            units: units.to_string(),
            standard_name: standard_name.to_string(),
        }
    }

    /// All-missing field of the given shape.
    pub fn missing(shape: &[usize], units: &str, standard_name: &str) -> Self {
        Self::new(
            ArrayD::from_elem(IxDyn(shape), f64::NAN),
            units,
            standard_name,
        )
    }

    pub fn is_profile(&self) -> bool {
        self.values.ndim() == 3
    }

    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }

    /// Share of non-missing samples, 0 for an empty field.
    pub fn valid_fraction(&self) -> f64 {
        StatsHelper::valid_fraction(self.values.iter())
    }
}

/// Checks that an array has the expected shape.
pub fn ensure_shape(name: &str, found: &[usize], expected: &[usize]) -> SwathResult<()> {
    if found == expected {
        Ok(())
    } else {
        Err(SwathError::ShapeMismatch {
            name: name.to_string(),
            expected: expected.to_vec(),
            found: found.to_vec(),
        })
    }
}

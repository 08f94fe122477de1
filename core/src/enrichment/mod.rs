//! Derived fields computed from an assembled swath.

pub mod distance;
pub mod insitu;
pub mod sounding;
pub mod timestamps;

pub use distance::DistanceToPoint;
pub use insitu::{InSituObservation, InSituTemperature};
pub use sounding::{
    EnvironmentalGrid, GriddedReanalysis, ProfileQuantity, SoundingInterpolator, VerticalProfile,
};

use crate::dataset::SwathDataset;
use crate::prelude::{Field, SwathResult};

/// A step that derives new named fields from an assembled dataset.
///
/// Implementations only read the dataset; the caller validates and merges the
/// returned fields, so a failing step leaves the dataset untouched.
pub trait Enrichment {
    fn name(&self) -> &str;

    fn derive(&self, dataset: &SwathDataset) -> SwathResult<Vec<(String, Field)>>;
}

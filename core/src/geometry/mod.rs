pub mod altitude;
pub mod distance;

pub use altitude::{BeamGeometry, SwathGeometry};
pub use distance::{AzimuthalEquidistant, ReferencePoint};

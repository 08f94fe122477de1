use crate::geometry::{AzimuthalEquidistant, ReferencePoint};
use crate::prelude::{ensure_shape, Field, SwathResult};
use ndarray::{Array2, Zip};

pub const DISTANCE_FIELD: &str = "distance";

/// Direct distance of each column to a reference point.
#[derive(Debug, Clone)]
pub struct DistanceToPoint {
    centre: ReferencePoint,
    projection: AzimuthalEquidistant,
}

impl DistanceToPoint {
    pub fn new(centre: ReferencePoint) -> Self {
        Self {
            centre,
            projection: AzimuthalEquidistant::new(centre),
        }
    }

    pub fn centre(&self) -> ReferencePoint {
        self.centre
    }

    /// Distance in km; missing coordinates and columns outside `valid` stay missing.
    pub fn distance_field(
        &self,
        lons: &Array2<f64>,
        lats: &Array2<f64>,
        valid: &Array2<bool>,
    ) -> SwathResult<Field> {
        ensure_shape("lats", lats.shape(), lons.shape())?;
        ensure_shape("near-surface columns", valid.shape(), lons.shape())?;
        let distance = Zip::from(lons)
            .and(lats)
            .and(valid)
            .map_collect(|&lon, &lat, &valid| {
                if !valid {
                    return f64::NAN;
                }
                self.projection.distance_km(lon, lat).unwrap_or(f64::NAN)
            });
        Ok(Field::new(
            distance.into_dyn(),
            "km",
            "distance, way of the crow (i.e. direct), to the reference point",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn distance_is_missing_without_surface_gate_or_coordinates() {
        let step = DistanceToPoint::new(ReferencePoint::new(0.0, 0.0));
        let lons = array![[0.0, 1.0, f64::NAN]];
        let lats = array![[0.0, 0.0, 0.0]];
        let valid = array![[true, true, true]];
        let field = step.distance_field(&lons, &lats, &valid).unwrap();
        assert_eq!(field.values[[0, 0]], 0.0);
        assert!((field.values[[0, 1]] - 111.319_49).abs() < 1e-3);
        assert!(field.values[[0, 2]].is_nan());

        let none_valid = array![[false, false, false]];
        let field = step.distance_field(&lons, &lats, &none_valid).unwrap();
        assert_eq!(field.valid_count(), 0);
        assert_eq!(field.units, "km");
    }
}

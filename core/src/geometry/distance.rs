use serde::{Deserialize, Serialize};

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const MEAN_RADIUS_M: f64 = 6_371_008.8;

/// Geographic point in degrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ReferencePoint {
    pub lon: f64,
    pub lat: f64,
}

impl ReferencePoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Azimuthal-equidistant projection on the WGS84 ellipsoid.
///
/// Projected coordinates are the geodesic distance from the centre along the
/// forward azimuth, so the planar radius equals the geodesic distance.
#[derive(Debug, Clone)]
pub struct AzimuthalEquidistant {
    centre: ReferencePoint,
}

impl AzimuthalEquidistant {
    pub fn new(centre: ReferencePoint) -> Self {
        Self { centre }
    }

    /// Projects a point to (easting, northing) in metres.
    pub fn project(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }
        let (distance, azimuth) = geodesic_inverse(self.centre.lat, self.centre.lon, lat, lon);
        Some((distance * azimuth.sin(), distance * azimuth.cos()))
    }

    /// Planar distance to the centre in kilometres.
    pub fn distance_km(&self, lon: f64, lat: f64) -> Option<f64> {
        self.project(lon, lat).map(|(x, y)| x.hypot(y) / 1000.0)
    }
}

/// Vincenty inverse solution; returns (distance m, forward azimuth rad).
fn geodesic_inverse(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> (f64, f64) {
    let b = WGS84_A * (1.0 - WGS84_F);
    let l = (lon2 - lon1).to_radians();
    let u1 = ((1.0 - WGS84_F) * lat1.to_radians().tan()).atan();
    let u2 = ((1.0 - WGS84_F) * lat2.to_radians().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    for _ in 0..200 {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let sin_sigma = ((cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
        .sqrt();
        if sin_sigma == 0.0 {
            return (0.0, 0.0);
        }
        let cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        let sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        let cos_2sigma_m = if cos_sq_alpha == 0.0 {
            0.0
        } else {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        };
        let c = WGS84_F / 16.0 * cos_sq_alpha * (4.0 + WGS84_F * (4.0 - 3.0 * cos_sq_alpha));
        let previous = lambda;
        lambda = l
            + (1.0 - c)
                * WGS84_F
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))));

        if (lambda - previous).abs() < 1e-12 {
            let u_sq = cos_sq_alpha * (WGS84_A * WGS84_A - b * b) / (b * b);
            let big_a =
                1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
            let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
            let delta_sigma = big_b
                * sin_sigma
                * (cos_2sigma_m
                    + big_b / 4.0
                        * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))
                            - big_b / 6.0
                                * cos_2sigma_m
                                * (-3.0 + 4.0 * sin_sigma.powi(2))
                                * (-3.0 + 4.0 * cos_2sigma_m.powi(2))));
            let distance = b * big_a * (sigma - delta_sigma);
            let (sin_lambda, cos_lambda) = lambda.sin_cos();
            let azimuth =
                (cos_u2 * sin_lambda).atan2(cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda);
            return (distance, azimuth);
        }
    }

    // Near-antipodal points do not converge; fall back to the sphere.
    spherical_inverse(lat1, lon1, lat2, lon2)
}

fn spherical_inverse(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> (f64, f64) {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_lambda = (lon2 - lon1).to_radians();
    let hav = ((phi2 - phi1) / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let distance = 2.0 * MEAN_RADIUS_M * hav.sqrt().min(1.0).asin();
    let azimuth = (d_lambda.sin() * phi2.cos())
        .atan2(phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos());
    (distance, azimuth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centre_projects_to_origin() {
        let proj = AzimuthalEquidistant::new(ReferencePoint::new(-88.2, 40.1));
        assert_eq!(proj.project(-88.2, 40.1), Some((0.0, 0.0)));
    }

    #[test]
    fn one_degree_of_latitude_on_the_equator() {
        let proj = AzimuthalEquidistant::new(ReferencePoint::new(0.0, 0.0));
        let (x, y) = proj.project(0.0, 1.0).unwrap();
        assert!(x.abs() < 1e-6);
        assert!((y - 110_574.4).abs() < 1.0);
        let km = proj.distance_km(1.0, 0.0).unwrap();
        assert!((km - 111.319_49).abs() < 1e-3);
    }

    #[test]
    fn missing_coordinates_have_no_projection() {
        let proj = AzimuthalEquidistant::new(ReferencePoint::new(10.0, 50.0));
        assert!(proj.project(f64::NAN, 50.0).is_none());
        assert!(proj.distance_km(10.0, f64::NAN).is_none());
    }
}

use anyhow::ensure;
use dprcore::prelude::{DPR_GATES, FILL_VALUE};
use dprcore::source::MemoryReader;
use ndarray::{Array1, Array2, Array3, Array4};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const NS_BEAMS: usize = 49;
const MS_BEAMS: usize = 25;

/// Configuration for generating a synthetic DPR granule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub scans: usize,
    pub seed: u64,
    /// Longitude and latitude of the first footprint of the first scan.
    pub origin: (f64, f64),
    /// Highest gate with echo; gates above are fill.
    pub echo_top_gate: usize,
    pub clutter_free_bin: usize,
    pub surface_dbz: f64,
    /// Reflectivity decrease per gate above the surface (dB).
    pub lapse_db_per_gate: f64,
    pub noise: f64,
    /// Fraction of columns flagged as surface snowfall.
    pub snow_fraction: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            scans: 16,
            seed: 0,
            origin: (-80.0, 35.0),
            echo_top_gate: 110,
            clutter_free_bin: 168,
            surface_dbz: 32.0,
            lapse_db_per_gate: 0.2,
            noise: 1.0,
            snow_fraction: 0.3,
        }
    }
}

fn profile(config: &GeneratorConfig, rng: &mut StdRng, beams: usize, offset: f64) -> Array3<f64> {
    Array3::from_shape_fn((config.scans, beams, DPR_GATES), |(_, _, gate)| {
        if gate < config.echo_top_gate {
            return FILL_VALUE;
        }
        let depth = (DPR_GATES - 1 - gate) as f64;
        let jitter = rng.gen_range(-config.noise..=config.noise);
        config.surface_dbz - offset - config.lapse_db_per_gate * depth + jitter
    })
}

/// Builds a granule with every key the DPR parser reads.
pub fn build_dpr_swath(config: &GeneratorConfig) -> anyhow::Result<MemoryReader> {
    ensure!(config.scans > 0, "synthetic swath needs at least one scan");
    ensure!(
        config.echo_top_gate < DPR_GATES && config.clutter_free_bin < DPR_GATES,
        "echo top and clutter bin must lie within {} gates",
        DPR_GATES
    );
    ensure!(config.noise >= 0.0, "noise amplitude must not be negative");

    let mut rng = StdRng::seed_from_u64(config.seed);
    let scans = config.scans;
    let (lon0, lat0) = config.origin;

    let lons = Array2::from_shape_fn((scans, NS_BEAMS), |(scan, beam)| {
        lon0 + 0.05 * beam as f64 + 0.01 * scan as f64
    });
    let lats = Array2::from_shape_fn((scans, NS_BEAMS), |(scan, beam)| {
        lat0 + 0.05 * scan as f64 - 0.005 * beam as f64
    });

    let ns_measured = profile(config, &mut rng, NS_BEAMS, 0.0);
    let ms_measured = profile(config, &mut rng, MS_BEAMS, 4.0);
    let ns_corrected = ns_measured.mapv(|v| if v <= FILL_VALUE { v } else { v + 1.5 });
    let ms_corrected = ms_measured.mapv(|v| if v <= FILL_VALUE { v } else { v + 2.5 });
    let rain = ns_corrected.mapv(|v| {
        if v <= FILL_VALUE {
            FILL_VALUE
        } else {
            // Marshall-Palmer Z = 200 R^1.6
            (10f64.powf(v / 10.0) / 200.0).powf(1.0 / 1.6)
        }
    });
    let dsd = Array4::from_shape_fn((scans, NS_BEAMS, DPR_GATES, 2), |(scan, beam, gate, p)| {
        let dbz = ns_corrected[[scan, beam, gate]];
        if dbz <= FILL_VALUE {
            FILL_VALUE
        } else if p == 0 {
            40.0 - 0.1 * dbz
        } else {
            0.5 + 0.04 * dbz
        }
    });

    let near_surface = |values: &Array3<f64>| {
        let bin = config.clutter_free_bin.saturating_sub(1);
        values.index_axis(ndarray::Axis(2), bin).to_owned()
    };
    let snow = Array2::from_shape_fn((scans, MS_BEAMS), |_| {
        if rng.gen_bool(config.snow_fraction.clamp(0.0, 1.0)) {
            1.0
        } else {
            0.0
        }
    });
    let component = |value: f64| Array1::from_elem(scans, value).into_dyn();
    let seconds = Array1::from_shape_fn(scans, |scan| (scan % 60) as f64);
    let minutes = Array1::from_shape_fn(scans, |scan| (scan / 60 % 60) as f64);

    Ok(MemoryReader::new()
        .with("NS/Longitude", lons.into_dyn())
        .with("NS/Latitude", lats.into_dyn())
        .with("NS/SLV/zFactorCorrectedNearSurface", near_surface(&ns_corrected).into_dyn())
        .with("MS/SLV/zFactorCorrectedNearSurface", near_surface(&ms_corrected).into_dyn())
        .with("NS/PRE/zFactorMeasured", ns_measured.into_dyn())
        .with("MS/PRE/zFactorMeasured", ms_measured.into_dyn())
        .with("NS/SLV/zFactorCorrected", ns_corrected.into_dyn())
        .with("MS/SLV/zFactorCorrected", ms_corrected.into_dyn())
        .with("NS/SLV/precipRate", rain.into_dyn())
        .with("NS/SLV/paramDSD", dsd.into_dyn())
        .with(
            "NS/PRE/binClutterFreeBottom",
            Array2::from_elem((scans, NS_BEAMS), config.clutter_free_bin as f64 + 2.0).into_dyn(),
        )
        .with(
            "MS/PRE/binClutterFreeBottom",
            Array2::from_elem((scans, MS_BEAMS), config.clutter_free_bin as f64).into_dyn(),
        )
        .with(
            "MS/PRE/flagPrecip",
            Array2::from_elem((scans, MS_BEAMS), 11.0).into_dyn(),
        )
        .with("MS/Experimental/flagSurfaceSnowfall", snow.into_dyn())
        .with("MS/ScanTime/Year", component(2018.0))
        .with("MS/ScanTime/Month", component(2.0))
        .with("MS/ScanTime/DayOfMonth", component(7.0))
        .with("MS/ScanTime/Hour", component(21.0))
        .with("MS/ScanTime/Minute", minutes.into_dyn())
        .with("MS/ScanTime/Second", seconds.into_dyn()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dprcore::source::SwathReader;

    #[test]
    fn generator_builds_every_dpr_key() {
        let mut reader = build_dpr_swath(&GeneratorConfig::default()).unwrap();
        assert_eq!(reader.keys().count(), 20);
        let ku = reader.read("NS/PRE/zFactorMeasured").unwrap();
        assert_eq!(ku.shape(), &[16, NS_BEAMS, DPR_GATES]);
        assert_eq!(reader.read("NS/SLV/paramDSD").unwrap().ndim(), 4);
    }

    #[test]
    fn generator_is_seeded() {
        let config = GeneratorConfig {
            scans: 2,
            seed: 13,
            ..Default::default()
        };
        let mut first = build_dpr_swath(&config).unwrap();
        let mut second = build_dpr_swath(&config).unwrap();
        assert_eq!(
            first.read("MS/PRE/zFactorMeasured").unwrap(),
            second.read("MS/PRE/zFactorMeasured").unwrap()
        );
    }

    #[test]
    fn invalid_generator_config_is_rejected() {
        let config = GeneratorConfig {
            scans: 0,
            ..Default::default()
        };
        assert!(build_dpr_swath(&config).is_err());
    }
}

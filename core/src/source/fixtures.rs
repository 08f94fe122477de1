//! Synthetic raw files shared by the parser and pipeline tests.

use crate::prelude::{Campaign, DPR_GATES, FILL_VALUE};
use crate::source::MemoryReader;
use ndarray::{Array1, Array2, Array3, Array4};

pub const DPR_BEAMS: usize = 49;
pub const MS_BEAMS: usize = 25;
pub const APR_BEAMS: usize = 3;
pub const APR_TEST_GATES: usize = 8;

/// First gate carrying echo in the synthetic DPR columns.
pub const DPR_ECHO_TOP: usize = 100;
pub const NS_CLUTTER_BIN: f64 = 170.0;
pub const MS_CLUTTER_BIN: f64 = 168.0;

fn profile(beams: usize, scans: usize, echo: f64) -> Array3<f64> {
    Array3::from_shape_fn((scans, beams, DPR_GATES), |(_, _, gate)| {
        if gate >= DPR_ECHO_TOP {
            echo
        } else {
            FILL_VALUE
        }
    })
}

/// DPR granule with `scans` scans, echo from gate 100 down to the surface.
pub fn dpr_reader(scans: usize) -> MemoryReader {
    let lons = Array2::from_shape_fn((scans, DPR_BEAMS), |(scan, beam)| {
        -80.0 + 0.1 * beam as f64 + 0.01 * scan as f64
    });
    let lats = Array2::from_shape_fn((scans, DPR_BEAMS), |(scan, _)| 35.0 + 0.05 * scan as f64);
    let dsd = Array4::from_shape_fn((scans, DPR_BEAMS, DPR_GATES, 2), |(_, _, gate, param)| {
        if gate < DPR_ECHO_TOP {
            FILL_VALUE
        } else if param == 0 {
            40.0
        } else {
            1.5
        }
    });
    let seconds = Array1::from_shape_fn(scans, |scan| scan as f64);
    let component = |value: f64| Array1::from_elem(scans, value).into_dyn();

    MemoryReader::new()
        .with("NS/Longitude", lons.into_dyn())
        .with("NS/Latitude", lats.into_dyn())
        .with("NS/PRE/zFactorMeasured", profile(DPR_BEAMS, scans, 30.0).into_dyn())
        .with("MS/PRE/zFactorMeasured", profile(MS_BEAMS, scans, 25.0).into_dyn())
        .with("NS/SLV/zFactorCorrected", profile(DPR_BEAMS, scans, 32.0).into_dyn())
        .with("MS/SLV/zFactorCorrected", profile(MS_BEAMS, scans, 27.0).into_dyn())
        .with(
            "NS/SLV/precipRate",
            Array3::from_elem((scans, DPR_BEAMS, DPR_GATES), 2.0).into_dyn(),
        )
        .with("NS/SLV/paramDSD", dsd.into_dyn())
        .with(
            "NS/SLV/zFactorCorrectedNearSurface",
            Array2::from_elem((scans, DPR_BEAMS), 30.0).into_dyn(),
        )
        .with(
            "MS/SLV/zFactorCorrectedNearSurface",
            Array2::from_elem((scans, MS_BEAMS), 25.0).into_dyn(),
        )
        .with(
            "NS/PRE/binClutterFreeBottom",
            Array2::from_elem((scans, DPR_BEAMS), NS_CLUTTER_BIN).into_dyn(),
        )
        .with(
            "MS/PRE/binClutterFreeBottom",
            Array2::from_elem((scans, MS_BEAMS), MS_CLUTTER_BIN).into_dyn(),
        )
        .with(
            "MS/PRE/flagPrecip",
            Array2::from_elem((scans, MS_BEAMS), 11.0).into_dyn(),
        )
        .with(
            "MS/Experimental/flagSurfaceSnowfall",
            Array2::from_elem((scans, MS_BEAMS), 0.0).into_dyn(),
        )
        .with("MS/ScanTime/Year", component(2020.0))
        .with("MS/ScanTime/Month", component(3.0))
        .with("MS/ScanTime/DayOfMonth", component(5.0))
        .with("MS/ScanTime/Hour", component(1.0))
        .with("MS/ScanTime/Minute", component(2.0))
        .with("MS/ScanTime/Second", seconds.into_dyn())
}

/// Airborne file stored (range, cross, along); gate altitude falls 500 m per gate
/// from 3.5 km to sea level and reflectivity is 20 dBZ everywhere but the top gate.
pub fn apr_reader(campaign: Campaign, scans: usize) -> MemoryReader {
    let gcpex = campaign == Campaign::AirborneGcpex;
    let shape = (APR_TEST_GATES, APR_BEAMS, scans);
    let (dbz_scale, geo_scale, geo_offset) = if gcpex {
        (100.0, 10.0, 1.0)
    } else {
        (1.0, 1.0, 0.0)
    };
    let stored = |value: f64| (value - geo_offset) * geo_scale;

    let alt = Array3::from_shape_fn(shape, |(gate, _, _)| {
        stored(3500.0 - 500.0 * gate as f64)
    });
    let lons = Array3::from_shape_fn(shape, |(gate, cross, along)| {
        stored(-123.0 + 0.01 * cross as f64 + 0.001 * along as f64 + 0.0001 * gate as f64)
    });
    let lats = Array3::from_shape_fn(shape, |(_, _, along)| stored(47.0 + 0.01 * along as f64));
    let dbz = |value: f64| {
        Array3::from_shape_fn(shape, |(gate, _, _)| {
            if gate == 0 {
                -99.0 * dbz_scale
            } else {
                value * dbz_scale
            }
        })
        .into_dyn()
    };
    let seconds = Array2::from_shape_fn((APR_BEAMS, scans), |(_, along)| {
        1_449_878_400.0 + along as f64
    });
    let roll = Array2::from_elem((APR_BEAMS, scans), 0.5);

    let prefix = if gcpex { "" } else { "lores/" };
    let key = |name: &str| format!("{}{}", prefix, name);
    let mut reader = MemoryReader::new()
        .with(&key("lon3D"), lons.into_dyn())
        .with(&key("lat3D"), lats.into_dyn())
        .with(&key("alt3D"), alt.into_dyn())
        .with(&key("zhh14"), dbz(20.0))
        .with(&key("zhh35"), dbz(18.0))
        .with(&key("ldr14"), dbz(-20.0))
        .with(&key("scantime"), seconds.into_dyn())
        .with(&key("roll"), roll.into_dyn());
    if gcpex {
        for name in ["lon3D", "lat3D", "alt3D"] {
            reader = reader
                .with(&format!("{}_scale", name), Array2::from_elem((1, 1), geo_scale).into_dyn())
                .with(
                    &format!("{}_offset", name),
                    Array2::from_elem((1, 1), geo_offset).into_dyn(),
                );
        }
    }
    reader
}

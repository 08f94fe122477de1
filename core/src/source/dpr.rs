use crate::enrichment::timestamps::{broadcast_scan_times, ScanTimeParts};
use crate::geometry::SwathGeometry;
use crate::prelude::{ensure_shape, Campaign, Field, SwathError, SwathResult, FILL_VALUE};
use crate::source::{
    into_2d, into_3d, read_integers, MaskRule, RawField, RawSwath, RawSwathSource,
    SwathCoordinates, SwathReader,
};
use crate::telemetry::log::LogManager;
use ndarray::{s, Array2, Array3, ArrayD, Axis, Ix4};

/// Lowest Ku-band reflectivity distinguishable from noise (dBZ).
pub const KU_FLOOR_DBZ: f64 = 12.0;
/// Lowest Ka-band reflectivity distinguishable from noise (dBZ).
pub const KA_FLOOR_DBZ: f64 = 15.0;

const NS_LONGITUDE: &str = "NS/Longitude";
const NS_LATITUDE: &str = "NS/Latitude";
const NS_MEASURED: &str = "NS/PRE/zFactorMeasured";
const MS_MEASURED: &str = "MS/PRE/zFactorMeasured";
const NS_CORRECTED: &str = "NS/SLV/zFactorCorrected";
const MS_CORRECTED: &str = "MS/SLV/zFactorCorrected";
const NS_NEAR_SURFACE: &str = "NS/SLV/zFactorCorrectedNearSurface";
const MS_NEAR_SURFACE: &str = "MS/SLV/zFactorCorrectedNearSurface";
const NS_CLUTTER_BIN: &str = "NS/PRE/binClutterFreeBottom";
const MS_CLUTTER_BIN: &str = "MS/PRE/binClutterFreeBottom";
const NS_PRECIP_RATE: &str = "NS/SLV/precipRate";
const NS_PARAM_DSD: &str = "NS/SLV/paramDSD";
const MS_FLAG_PRECIP: &str = "MS/PRE/flagPrecip";
const MS_FLAG_SNOW: &str = "MS/Experimental/flagSurfaceSnowfall";
const MS_SCAN_TIME: &str = "MS/ScanTime";

/// Parser for GPM-DPR level-2 swaths (normal scan narrowed to the matched scan).
pub struct DprSource<R> {
    reader: R,
    geometry: SwathGeometry,
    logger: LogManager,
}

impl<R: SwathReader> DprSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_geometry(reader, SwathGeometry::default())
    }

    pub fn with_geometry(reader: R, geometry: SwathGeometry) -> Self {
        Self {
            reader,
            geometry,
            logger: LogManager::new("dpr"),
        }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    fn inner_width(&self) -> usize {
        self.geometry.beams().inner_beams.len()
    }

    fn scan_count(&self) -> SwathResult<usize> {
        self.reader
            .shape(NS_MEASURED)?
            .first()
            .copied()
            .ok_or_else(|| SwathError::MissingField(NS_MEASURED.to_string()))
    }

    fn read_coordinates(&mut self, scans: usize) -> SwathResult<SwathCoordinates> {
        Ok(SwathCoordinates {
            lons: self.read_ns_2d(NS_LONGITUDE, scans)?,
            lats: self.read_ns_2d(NS_LATITUDE, scans)?,
        })
    }

    /// Narrows a full normal-scan array to the inner beams along axis 1.
    fn narrow(&self, key: &str, values: ArrayD<f64>) -> SwathResult<ArrayD<f64>> {
        let beams = self.geometry.beams();
        let found = values.shape().get(1).copied().unwrap_or(0);
        if found != beams.beam_count {
            return Err(SwathError::ShapeMismatch {
                name: key.to_string(),
                expected: vec![beams.beam_count],
                found: vec![found],
            });
        }
        let indices: Vec<usize> = beams.inner_beams.clone().collect();
        Ok(values.select(Axis(1), &indices))
    }

    fn read_ns(&mut self, key: &str) -> SwathResult<ArrayD<f64>> {
        let values = self.reader.read(key)?;
        self.narrow(key, values)
    }

    fn read_ns_2d(&mut self, key: &str, scans: usize) -> SwathResult<Array2<f64>> {
        let values = into_2d(key, self.read_ns(key)?)?;
        ensure_shape(key, values.shape(), &[scans, self.inner_width()])?;
        Ok(values)
    }

    fn read_ns_3d(&mut self, key: &str, scans: usize) -> SwathResult<Array3<f64>> {
        let values = into_3d(key, self.read_ns(key)?)?;
        ensure_shape(key, values.shape(), &self.profile_shape(scans))?;
        Ok(values)
    }

    fn read_ms_2d(&mut self, key: &str, scans: usize) -> SwathResult<Array2<f64>> {
        let values = into_2d(key, self.reader.read(key)?)?;
        ensure_shape(key, values.shape(), &[scans, self.inner_width()])?;
        Ok(values)
    }

    fn read_ms_3d(&mut self, key: &str, scans: usize) -> SwathResult<Array3<f64>> {
        let values = into_3d(key, self.reader.read(key)?)?;
        ensure_shape(key, values.shape(), &self.profile_shape(scans))?;
        Ok(values)
    }

    fn profile_shape(&self, scans: usize) -> [usize; 3] {
        [scans, self.inner_width(), self.geometry.beams().gate_count]
    }

    /// Drop-size-distribution parameter `index` (0 = Nw, 1 = Dm).
    fn read_param_dsd(&mut self, index: usize, scans: usize) -> SwathResult<Array3<f64>> {
        let raw = self.read_ns(NS_PARAM_DSD)?;
        let found = raw.ndim();
        let raw = raw
            .into_dimensionality::<Ix4>()
            .map_err(|_| SwathError::UnexpectedRank {
                name: NS_PARAM_DSD.to_string(),
                expected: 4,
                found,
            })?;
        let values = raw.slice(s![.., .., .., index]).to_owned();
        ensure_shape(NS_PARAM_DSD, values.shape(), &self.profile_shape(scans))?;
        Ok(values)
    }

    fn scan_times(&mut self, scans: usize) -> SwathResult<Array2<chrono::NaiveDateTime>> {
        let mut component =
            |name: &str| read_integers(&mut self.reader, &format!("{}/{}", MS_SCAN_TIME, name));
        let parts = ScanTimeParts {
            year: component("Year")?,
            month: component("Month")?,
            day: component("DayOfMonth")?,
            hour: component("Hour")?,
            minute: component("Minute")?,
            second: component("Second")?,
        };
        if parts.len() != scans {
            return Err(SwathError::ShapeMismatch {
                name: MS_SCAN_TIME.to_string(),
                expected: vec![scans],
                found: vec![parts.len()],
            });
        }
        broadcast_scan_times(&parts, self.inner_width())
    }
}

/// Raw fill values become missing.
fn clean<D: ndarray::Dimension>(mut values: ndarray::Array<f64, D>) -> ArrayD<f64> {
    values.mapv_inplace(|v| if v <= FILL_VALUE { f64::NAN } else { v });
    values.into_dyn()
}

impl<R: SwathReader> RawSwathSource for DprSource<R> {
    fn campaign(&self) -> Campaign {
        Campaign::SpaceborneDpr
    }

    fn coordinates(&mut self) -> SwathResult<SwathCoordinates> {
        let scans = self.scan_count()?;
        self.read_coordinates(scans)
    }

    fn load(&mut self) -> SwathResult<RawSwath> {
        let scans = self.scan_count()?;
        let coords = self.read_coordinates(scans)?;
        let time = self.scan_times(scans)?;
        let alt = self.geometry.altitude_grid(scans);
        let mut notes = Vec::new();

        let clutter_bins = (
            self.read_ns_2d(NS_CLUTTER_BIN, scans)?,
            self.read_ms_2d(MS_CLUTTER_BIN, scans)?,
        );

        let snow = if self.reader.contains(MS_FLAG_SNOW) {
            Field::new(
                clean(self.read_ms_2d(MS_FLAG_SNOW, scans)?),
                "none",
                "experimental flag to diagnose snow at surface",
            )
        } else {
            let note = SwathError::MissingOptionalChannel(MS_FLAG_SNOW.to_string()).to_string();
            self.logger.note(&note);
            notes.push(note);
            Field::missing(
                &[scans, self.inner_width()],
                "none",
                "experimental flag to diagnose snow at surface",
            )
        };

        let fields = vec![
            RawField::new("flagSurfaceSnow", snow, MaskRule::None, None),
            RawField::new(
                "flagPrecip",
                Field::new(
                    clean(self.read_ms_2d(MS_FLAG_PRECIP, scans)?),
                    "none",
                    "flag to diagnose precip at surface. 11 is precip from both, 10 is precip from just Ku-band",
                ),
                MaskRule::None,
                None,
            ),
            RawField::new(
                "nearsurfaceKu",
                Field::new(
                    clean(self.read_ns_2d(NS_NEAR_SURFACE, scans)?),
                    "dBZ",
                    "near surface Ku",
                ),
                MaskRule::None,
                Some(KU_FLOOR_DBZ),
            ),
            RawField::new(
                "nearsurfaceKa",
                Field::new(
                    clean(self.read_ms_2d(MS_NEAR_SURFACE, scans)?),
                    "dBZ",
                    "near surface Ka",
                ),
                MaskRule::None,
                Some(KA_FLOOR_DBZ),
            ),
            RawField::new(
                "NSKu_c",
                Field::new(
                    clean(self.read_ns_3d(NS_CORRECTED, scans)?),
                    "dBZ",
                    "corrected KuPR",
                ),
                MaskRule::Clutter,
                Some(KU_FLOOR_DBZ),
            ),
            RawField::new(
                "MSKa_c",
                Field::new(
                    clean(self.read_ms_3d(MS_CORRECTED, scans)?),
                    "dBZ",
                    "corrected KaPR, MS scan",
                ),
                MaskRule::Clutter,
                Some(KA_FLOOR_DBZ),
            ),
            RawField::new(
                "NSKu",
                Field::new(
                    clean(self.read_ns_3d(NS_MEASURED, scans)?),
                    "dBZ",
                    "measured KuPR",
                ),
                MaskRule::ClutterAndEchoTop,
                Some(KU_FLOOR_DBZ),
            ),
            RawField::new(
                "MSKa",
                Field::new(
                    clean(self.read_ms_3d(MS_MEASURED, scans)?),
                    "dBZ",
                    "measured KaPR, MS scan",
                ),
                MaskRule::ClutterAndEchoTop,
                Some(KA_FLOOR_DBZ),
            ),
            RawField::new(
                "R",
                Field::new(
                    clean(self.read_ns_3d(NS_PRECIP_RATE, scans)?),
                    "mm hr^-1",
                    "retrieved R, from DPR algo",
                ),
                MaskRule::ClutterAndEchoTop,
                None,
            ),
            RawField::new(
                "Dm_dpr",
                Field::new(
                    clean(self.read_param_dsd(1, scans)?),
                    "mm",
                    "retrieved Dm, from DPR algo",
                ),
                MaskRule::ClutterAndEchoTop,
                Some(0.0),
            ),
            RawField::new(
                "Nw_dpr",
                Field::new(
                    clean(self.read_param_dsd(0, scans)?),
                    "dBNw",
                    "retrieved Nw, from DPR algo",
                ),
                MaskRule::ClutterAndEchoTop,
                Some(0.0),
            ),
        ];

        self.logger.record(&format!(
            "loaded {} scans x {} beams x {} gates",
            scans,
            self.inner_width(),
            self.geometry.beams().gate_count
        ));

        Ok(RawSwath {
            campaign: Campaign::SpaceborneDpr,
            lons: coords.lons,
            lats: coords.lats,
            time,
            alt,
            gate_lons: None,
            gate_lats: None,
            clutter_bins: Some(clutter_bins),
            echo_top_reference: Some("NSKu_c".to_string()),
            fields,
            notes,
        })
    }

    fn release(&mut self) {
        self.reader.close();
    }
}

use crate::enrichment::timestamps::from_epoch_seconds;
use crate::math::StatsHelper;
use crate::prelude::{ensure_shape, Campaign, Field, SwathError, SwathResult};
use crate::source::{
    into_2d, into_3d, MaskRule, RawField, RawSwath, RawSwathSource, SwathCoordinates,
    SwathReader,
};
use crate::telemetry::log::LogManager;
use ndarray::{Array2, Array3, Axis};

/// Reflectivities at or below this value are missing (dBZ).
pub const MISSING_DBZ: f64 = -99.0;

/// Height of the gate used for the fixed-level near-surface reflectivity (km).
pub const NEAR_SURFACE_KM: f64 = 1.1;

const GCPEX_REFLECTIVITY_SCALE: f64 = 100.0;

/// Geolocated gate grid in (along, cross, range) layout, altitude in km.
struct GateGeolocation {
    lons: Array3<f64>,
    lats: Array3<f64>,
    alt: Array3<f64>,
}

impl GateGeolocation {
    /// Mean altitude of each range gate over the whole swath.
    fn mean_gate_altitude(&self) -> Vec<f64> {
        self.alt
            .axis_iter(Axis(2))
            .map(|gate| {
                let samples: Vec<f64> = gate.iter().copied().collect();
                StatsHelper::nanmean(&samples)
            })
            .collect()
    }

    fn gate_nearest(&self, height_km: f64) -> Option<usize> {
        StatsHelper::nearest_index(&self.mean_gate_altitude(), height_km)
    }

    /// Ground footprint from the gate closest to sea level.
    fn ground(&self) -> SwathResult<SwathCoordinates> {
        let gate = self
            .gate_nearest(0.0)
            .ok_or_else(|| SwathError::NoDataInRegion("no valid gate altitudes".to_string()))?;
        Ok(SwathCoordinates {
            lons: self.lons.index_axis(Axis(2), gate).to_owned(),
            lats: self.lats.index_axis(Axis(2), gate).to_owned(),
        })
    }
}

/// Parser for APR-2 (GCPEX) and APR-3 (OLYMPEX) airborne swaths.
pub struct AprSource<R> {
    campaign: Campaign,
    reader: R,
    logger: LogManager,
}

impl<R: SwathReader> AprSource<R> {
    pub fn new(campaign: Campaign, reader: R) -> Self {
        Self {
            campaign,
            reader,
            logger: LogManager::new("apr"),
        }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    fn key(&self, name: &str) -> String {
        match self.campaign {
            Campaign::AirborneOlympex => format!("lores/{}", name),
            _ => name.to_string(),
        }
    }

    /// Reads a (range, cross, along) volume into (along, cross, range).
    fn read_volume(&mut self, name: &str) -> SwathResult<Array3<f64>> {
        let key = self.key(name);
        let raw = into_3d(&key, self.reader.read(&key)?)?;
        Ok(raw.permuted_axes([2, 1, 0]).as_standard_layout().to_owned())
    }

    /// Reads a (cross, along) plane into (along, cross).
    fn read_plane(&mut self, name: &str) -> SwathResult<Array2<f64>> {
        let key = self.key(name);
        let raw = into_2d(&key, self.reader.read(&key)?)?;
        Ok(raw.reversed_axes().as_standard_layout().to_owned())
    }

    fn read_scalar(&mut self, name: &str) -> SwathResult<f64> {
        let key = self.key(name);
        let values = self.reader.read(&key)?;
        values
            .iter()
            .next()
            .copied()
            .ok_or_else(|| SwathError::MissingField(key))
    }

    /// GCPEX stores geolocation as `value / scale + offset`.
    fn read_geolocation_volume(&mut self, name: &str) -> SwathResult<Array3<f64>> {
        let mut values = self.read_volume(name)?;
        if self.campaign == Campaign::AirborneGcpex {
            let scale = self.read_scalar(&format!("{}_scale", name))?;
            let offset = self.read_scalar(&format!("{}_offset", name))?;
            values.mapv_inplace(|v| v / scale + offset);
        }
        Ok(values)
    }

    fn geolocation(&mut self) -> SwathResult<GateGeolocation> {
        let lons = self.read_geolocation_volume("lon3D")?;
        let lats = self.read_geolocation_volume("lat3D")?;
        let mut alt = self.read_geolocation_volume("alt3D")?;
        ensure_shape("lat3D", lats.shape(), lons.shape())?;
        ensure_shape("alt3D", alt.shape(), lons.shape())?;
        alt.mapv_inplace(|metres| metres / 1000.0);
        Ok(GateGeolocation { lons, lats, alt })
    }

    fn read_reflectivity(&mut self, name: &str, shape: &[usize]) -> SwathResult<Array3<f64>> {
        let mut values = self.read_volume(name)?;
        ensure_shape(name, values.shape(), shape)?;
        let scale = if self.campaign == Campaign::AirborneGcpex {
            GCPEX_REFLECTIVITY_SCALE
        } else {
            1.0
        };
        values.mapv_inplace(|v| {
            let v = v / scale;
            if v.is_nan() || v <= MISSING_DBZ {
                f64::NAN
            } else {
                v
            }
        });
        Ok(values)
    }

    /// W band exists only on some OLYMPEX files.
    fn read_w_band(&mut self, shape: &[usize], notes: &mut Vec<String>) -> SwathResult<Field> {
        let key = self.key("z95s");
        if self.campaign == Campaign::AirborneOlympex && self.reader.contains(&key) {
            let values = self.read_reflectivity("z95s", shape)?;
            return Ok(Field::new(values.into_dyn(), "dBZ", "W-band Reflectivity"));
        }
        let note = SwathError::MissingOptionalChannel(key).to_string();
        self.logger.note(&note);
        notes.push(note);
        Ok(Field::missing(shape, "dBZ", "W-band Reflectivity"))
    }
}

fn near_surface_slice(values: &Array3<f64>, gate: Option<usize>) -> Field {
    let (along, cross, _) = values.dim();
    match gate {
        Some(gate) => Field::new(
            values.index_axis(Axis(2), gate).to_owned().into_dyn(),
            "dBZ",
            "Near_surf Z",
        ),
        None => Field::missing(&[along, cross], "dBZ", "Near_surf Z"),
    }
}

impl<R: SwathReader> RawSwathSource for AprSource<R> {
    fn campaign(&self) -> Campaign {
        self.campaign
    }

    fn coordinates(&mut self) -> SwathResult<SwathCoordinates> {
        self.geolocation()?.ground()
    }

    fn load(&mut self) -> SwathResult<RawSwath> {
        let geo = self.geolocation()?;
        let ground = geo.ground()?;
        let (along, cross, gates) = geo.alt.dim();
        let shape = [along, cross, gates];
        let mut notes = Vec::new();

        let scan_seconds = self.read_plane("scantime")?;
        ensure_shape("scantime", scan_seconds.shape(), &[along, cross])?;
        let time = scan_seconds.mapv(from_epoch_seconds);

        let roll = self.read_plane("roll")?;
        ensure_shape("roll", roll.shape(), &[along, cross])?;

        let ku = self.read_reflectivity("zhh14", &shape)?;
        let ka = self.read_reflectivity("zhh35", &shape)?;
        let ldr = self.read_reflectivity("ldr14", &shape)?;
        let w = self.read_w_band(&shape, &mut notes)?;

        let near_gate = geo.gate_nearest(NEAR_SURFACE_KM);
        let ku_near = near_surface_slice(&ku, near_gate);
        let ka_near = near_surface_slice(&ka, near_gate);

        let fields = vec![
            RawField::new(
                "Ku",
                Field::new(ku.into_dyn(), "dBZ", "Ku-band Reflectivity"),
                MaskRule::CloudTop,
                None,
            ),
            RawField::new(
                "Ka",
                Field::new(ka.into_dyn(), "dBZ", "Ka-band Reflectivity"),
                MaskRule::None,
                None,
            ),
            RawField::new("W", w, MaskRule::None, None),
            RawField::new(
                "LDR",
                Field::new(ldr.into_dyn(), "dB", "LDR at Ku-band"),
                MaskRule::None,
                None,
            ),
            RawField::new(
                "Roll",
                Field::new(roll.into_dyn(), "degrees", "Left/Right Plane Roll"),
                MaskRule::None,
                None,
            ),
            RawField::new("Ku_nearsurf", ku_near, MaskRule::None, None),
            RawField::new("Ka_nearsurf", ka_near, MaskRule::None, None),
        ];

        self.logger.record(&format!(
            "loaded {:?} swath: {} scans x {} beams x {} gates",
            self.campaign, along, cross, gates
        ));

        Ok(RawSwath {
            campaign: self.campaign,
            lons: ground.lons,
            lats: ground.lats,
            time,
            alt: geo.alt,
            gate_lons: Some(geo.lons),
            gate_lats: Some(geo.lats),
            clutter_bins: None,
            echo_top_reference: None,
            fields,
            notes,
        })
    }

    fn release(&mut self) {
        self.reader.close();
    }
}

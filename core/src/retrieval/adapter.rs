use crate::dataset::SwathDataset;
use crate::enrichment::insitu::T3D_FIELD;
use crate::enrichment::Enrichment;
use crate::prelude::{ensure_shape, Field, SwathError, SwathResult};
use crate::retrieval::model::Predictor;
use crate::retrieval::scaler::StandardScaler;
use crate::telemetry::log::LogManager;
use ndarray::{Array2, ArrayD, IxDyn};
use std::f64::consts::PI;

pub const WATER_CONTENT_FIELD: &str = "IWC";

/// How a raw field value becomes a model input before standardization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureTransform {
    /// Reflectivity factor in dBZ to linear units.
    Linear,
    Identity,
}

impl FeatureTransform {
    fn apply(self, value: f64) -> f64 {
        match self {
            FeatureTransform::Linear => 10f64.powf(value / 10.0),
            FeatureTransform::Identity => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSpec {
    pub field: String,
    pub scaler_column: usize,
    pub transform: FeatureTransform,
}

impl FeatureSpec {
    pub fn new(field: &str, scaler_column: usize, transform: FeatureTransform) -> Self {
        Self {
            field: field.to_string(),
            scaler_column,
            transform,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputSpec {
    pub name: String,
    pub units: String,
    pub standard_name: String,
    /// Non-positive predictions become missing.
    pub positive_only: bool,
}

impl OutputSpec {
    pub fn new(name: &str, units: &str, standard_name: &str, positive_only: bool) -> Self {
        Self {
            name: name.to_string(),
            units: units.to_string(),
            standard_name: standard_name.to_string(),
            positive_only,
        }
    }
}

/// Runs an external predictor over the valid gates of a swath.
///
/// The first feature is the primary channel: a gate is retrieved only where
/// it is present and non-zero and every other feature is present.
pub struct RetrievalAdapter<P> {
    features: Vec<FeatureSpec>,
    outputs: Vec<OutputSpec>,
    input_scaler: StandardScaler,
    target_scaler: Option<StandardScaler>,
    predictor: P,
    /// Output positions of (log10 Nw, Dm) for the composite water content.
    water_content: Option<(usize, usize)>,
    logger: LogManager,
}

impl<P: Predictor> RetrievalAdapter<P> {
    pub fn new(
        features: Vec<FeatureSpec>,
        outputs: Vec<OutputSpec>,
        input_scaler: StandardScaler,
        predictor: P,
    ) -> SwathResult<Self> {
        if features.is_empty() || outputs.is_empty() {
            return Err(SwathError::InvalidConfiguration(
                "retrieval needs at least one feature and one output".to_string(),
            ));
        }
        if let Some(spec) = features
            .iter()
            .find(|spec| spec.scaler_column >= input_scaler.columns())
        {
            return Err(SwathError::InvalidConfiguration(format!(
                "feature {} uses scaler column {} of {}",
                spec.field,
                spec.scaler_column,
                input_scaler.columns()
            )));
        }
        Ok(Self {
            features,
            outputs,
            input_scaler,
            target_scaler: None,
            predictor,
            water_content: None,
            logger: LogManager::new("retrieval"),
        })
    }

    /// Predictions are inverted through `scaler`, one column per output.
    pub fn with_target_scaler(mut self, scaler: StandardScaler) -> SwathResult<Self> {
        if scaler.columns() < self.outputs.len() {
            return Err(SwathError::InvalidConfiguration(format!(
                "target scaler has {} columns for {} outputs",
                scaler.columns(),
                self.outputs.len()
            )));
        }
        self.target_scaler = Some(scaler);
        Ok(self)
    }

    /// Adds `IWC` computed from the named log10 Nw and Dm (mm) outputs.
    pub fn with_water_content(mut self, nw: &str, dm: &str) -> SwathResult<Self> {
        let position = |name: &str| {
            self.outputs
                .iter()
                .position(|spec| spec.name == name)
                .ok_or_else(|| {
                    SwathError::InvalidConfiguration(format!("no output named {}", name))
                })
        };
        self.water_content = Some((position(nw)?, position(dm)?));
        Ok(self)
    }

    /// Dual-frequency Dm for the spaceborne swath.
    pub fn dpr_dm(scaler: StandardScaler, predictor: P) -> SwathResult<Self> {
        Self::new(
            vec![
                FeatureSpec::new("NSKu", 0, FeatureTransform::Linear),
                FeatureSpec::new("MSKa", 2, FeatureTransform::Linear),
            ],
            vec![OutputSpec::new(
                "Dm",
                "mm",
                "retrieved Dm from the NN (Chase et al. 2020)",
                true,
            )],
            scaler,
            predictor,
        )
    }

    /// Nw, Dm and frozen Dm for the airborne swaths, optionally using `T3d`.
    pub fn airborne(
        input_scaler: StandardScaler,
        target_scaler: StandardScaler,
        predictor: P,
        with_temperature: bool,
    ) -> SwathResult<Self> {
        let mut features = vec![
            FeatureSpec::new("Ku", 0, FeatureTransform::Linear),
            FeatureSpec::new("Ka", 1, FeatureTransform::Linear),
        ];
        if with_temperature {
            features.push(FeatureSpec::new(T3D_FIELD, 2, FeatureTransform::Identity));
        }
        let outputs = vec![
            OutputSpec::new("Nw", "log(m^-4)", "Retrieved Liquid Eq. Nw", false),
            OutputSpec::new("Dm", "mm", "Retrieved Liquid Eq. Dm", true),
            OutputSpec::new("Dm_frozen", "mm", "Retrieved Frozen Dm", true),
        ];
        Self::new(features, outputs, input_scaler, predictor)?
            .with_target_scaler(target_scaler)?
            .with_water_content("Nw", "Dm")
    }

    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    pub fn outputs(&self) -> &[OutputSpec] {
        &self.outputs
    }

    /// Flattened feature values, one vector per feature, in dataset order.
    fn flatten(&self, dataset: &SwathDataset) -> SwathResult<Vec<Vec<f64>>> {
        let shape = dataset.alt.shape();
        self.features
            .iter()
            .map(|spec| {
                let field = dataset.require(&spec.field)?;
                ensure_shape(&spec.field, field.values.shape(), shape)?;
                Ok(field.values.iter().copied().collect())
            })
            .collect()
    }

    /// Flat indices of the gates handed to the predictor.
    fn select_gates(columns: &[Vec<f64>]) -> Vec<usize> {
        let Some(primary) = columns.first() else {
            return Vec::new();
        };
        (0..primary.len())
            .filter(|&idx| {
                let value = primary[idx];
                !value.is_nan()
                    && value != 0.0
                    && columns.iter().all(|column| !column[idx].is_nan())
            })
            .collect()
    }

    fn design_matrix(&self, columns: &[Vec<f64>], gates: &[usize]) -> SwathResult<Array2<f64>> {
        let mut matrix = Array2::zeros((gates.len(), self.features.len()));
        for (col, (spec, values)) in self.features.iter().zip(columns).enumerate() {
            for (row, &gate) in gates.iter().enumerate() {
                let linear = spec.transform.apply(values[gate]);
                matrix[[row, col]] = self.input_scaler.transform(spec.scaler_column, linear)?;
            }
        }
        Ok(matrix)
    }

    fn predict(&self, matrix: &Array2<f64>) -> SwathResult<Array2<f64>> {
        let mut predicted = self.predictor.predict(matrix.view())?;
        ensure_shape(
            "predictions",
            predicted.shape(),
            &[matrix.nrows(), self.outputs.len()],
        )?;
        if let Some(scaler) = &self.target_scaler {
            for ((_, col), value) in predicted.indexed_iter_mut() {
                *value = scaler.inverse(col, *value)?;
            }
        }
        Ok(predicted)
    }
}

/// Water content (g m^-3) from log10 Nw (m^-4) and Dm (mm).
pub fn water_content(log_nw: f64, dm_mm: f64) -> f64 {
    let nw = 10f64.powf(log_nw);
    let dm_m = dm_mm / 1000.0;
    nw * dm_m.powi(4) * 1000.0 * PI / 4f64.powi(4) * 1000.0
}

impl<P: Predictor> Enrichment for RetrievalAdapter<P> {
    fn name(&self) -> &str {
        "retrieval"
    }

    fn derive(&self, dataset: &SwathDataset) -> SwathResult<Vec<(String, Field)>> {
        let shape = IxDyn(dataset.alt.shape());
        let columns = self.flatten(dataset)?;
        let gates = Self::select_gates(&columns);
        let total = columns.first().map_or(0, Vec::len);

        let mut flat: Vec<Vec<f64>> = vec![vec![f64::NAN; total]; self.outputs.len()];
        if gates.is_empty() {
            self.logger
                .note("no gate qualifies for retrieval; outputs left missing");
        } else {
            let matrix = self.design_matrix(&columns, &gates)?;
            let predicted = self.predict(&matrix)?;
            for (out, values) in flat.iter_mut().enumerate() {
                for (row, &gate) in gates.iter().enumerate() {
                    values[gate] = predicted[[row, out]];
                }
            }
            self.logger.record(&format!(
                "retrieved {} outputs on {} of {} gates",
                self.outputs.len(),
                gates.len(),
                total
            ));
        }

        for (spec, values) in self.outputs.iter().zip(flat.iter_mut()) {
            if spec.positive_only {
                values
                    .iter_mut()
                    .filter(|v| **v <= 0.0)
                    .for_each(|v| *v = f64::NAN);
            }
        }
        let composite = self.water_content.map(|(nw, dm)| {
            flat[nw]
                .iter()
                .zip(&flat[dm])
                .map(|(&log_nw, &dm)| water_content(log_nw, dm))
                .collect::<Vec<f64>>()
        });

        let reshape = |name: &str, values: Vec<f64>| {
            ArrayD::from_shape_vec(shape.clone(), values).map_err(|_| SwathError::ShapeMismatch {
                name: name.to_string(),
                expected: dataset.alt.shape().to_vec(),
                found: vec![total],
            })
        };
        let mut derived = Vec::with_capacity(self.outputs.len() + 1);
        for (spec, values) in self.outputs.iter().zip(flat) {
            derived.push((
                spec.name.clone(),
                Field::new(reshape(&spec.name, values)?, &spec.units, &spec.standard_name),
            ));
        }
        if let Some(values) = composite {
            derived.push((
                WATER_CONTENT_FIELD.to_string(),
                Field::new(
                    reshape(WATER_CONTENT_FIELD, values)?,
                    "g m^-3",
                    "Retrieved IWC, calculated from Nw and Dm",
                ),
            ));
        }
        Ok(derived)
    }
}

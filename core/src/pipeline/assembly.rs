use crate::dataset::SwathDataset;
use crate::masking::{
    apply_exclusion, apply_floor, CloudTopMasker, ClutterMasker, EchoTopMasker, GateMask,
};
use crate::pipeline::config::{PipelineConfig, PrecipFilter};
use crate::prelude::{ensure_shape, Field, SwathError, SwathResult};
use crate::source::{MaskRule, RawField, RawSwath};
use crate::telemetry::log::LogManager;
use ndarray::{Array2, Ix2, Ix3, Zip};

/// Surface flag value for precipitation seen by both channels.
pub const PRECIP_BOTH_CHANNELS: f64 = 11.0;
/// Surface flag value for snowfall at the surface.
pub const SURFACE_SNOW: f64 = 1.0;

/// Gate masks shared by the fields of one swath.
#[derive(Default)]
struct SwathMasks {
    clutter: Option<GateMask>,
    echotop: Option<GateMask>,
    cloudtop: Option<GateMask>,
}

impl SwathMasks {
    fn for_rule(&self, rule: MaskRule) -> Vec<&GateMask> {
        match rule {
            MaskRule::None => Vec::new(),
            MaskRule::Clutter => self.clutter.iter().collect(),
            MaskRule::ClutterAndEchoTop => {
                self.clutter.iter().chain(self.echotop.iter()).collect()
            }
            MaskRule::CloudTop => self.cloudtop.iter().collect(),
        }
    }
}

/// Builds the labeled dataset from a parsed swath.
pub struct FieldAssembler {
    config: PipelineConfig,
    logger: LogManager,
}

impl FieldAssembler {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            logger: LogManager::new("assembly"),
        }
    }

    pub fn assemble(&self, raw: RawSwath) -> SwathResult<SwathDataset> {
        let RawSwath {
            campaign,
            lons,
            lats,
            time,
            alt,
            gate_lons,
            gate_lats,
            clutter_bins,
            echo_top_reference,
            fields,
            ..
        } = raw;
        let gates = alt.dim().2;

        let mut masks = SwathMasks::default();
        if self.config.clutter {
            if let Some((first, second)) = &clutter_bins {
                let masker = ClutterMasker::new(gates);
                masks.clutter = Some(masker.build(first.view(), second.view())?);
            }
        }
        if let Some(params) = &self.config.cloudtop {
            if let Some(reference) = fields.iter().find(|f| f.rule == MaskRule::CloudTop) {
                let values = reference
                    .field
                    .values
                    .view()
                    .into_dimensionality::<Ix3>()
                    .map_err(|_| {
                        rank_error(&reference.name, 3, reference.field.values.ndim())
                    })?;
                let masker = CloudTopMasker::new(params.clone());
                masks.cloudtop = Some(masker.build(values, alt.view())?);
            }
        }

        let mut dataset = SwathDataset::new(campaign, lons, lats, time, alt)?;
        if let Some(grid) = &gate_lons {
            ensure_shape("gate_lons", grid.shape(), dataset.alt.shape())?;
        }
        if let Some(grid) = &gate_lats {
            ensure_shape("gate_lats", grid.shape(), dataset.alt.shape())?;
        }
        dataset.gate_lons = gate_lons;
        dataset.gate_lats = gate_lats;

        let (deferred, immediate): (Vec<RawField>, Vec<RawField>) = fields
            .into_iter()
            .partition(|f| f.rule == MaskRule::ClutterAndEchoTop);

        for raw_field in immediate {
            self.insert(&mut dataset, raw_field, &masks)?;
        }

        if self.config.echotop {
            if let Some(reference) = &echo_top_reference {
                let corrected = dataset.require(reference)?;
                let values = corrected
                    .values
                    .view()
                    .into_dimensionality::<Ix3>()
                    .map_err(|_| rank_error(reference, 3, corrected.values.ndim()))?;
                masks.echotop = Some(EchoTopMasker::new().build(values));
            }
        }

        for raw_field in deferred {
            self.insert(&mut dataset, raw_field, &masks)?;
        }

        if self.config.keep_masks {
            let SwathMasks {
                clutter,
                echotop,
                cloudtop,
            } = masks;
            let kept = [("clutter", clutter), ("echotop", echotop), ("cloudtop", cloudtop)];
            for (name, mask) in kept {
                if let Some(mask) = mask {
                    dataset.insert_mask(name, mask)?;
                }
            }
        }

        self.filter_columns(&mut dataset)?;
        self.logger.detail(&format!(
            "assembled {} fields over {:?}",
            dataset.field_names().len(),
            dataset.dims()
        ));
        Ok(dataset)
    }

    fn insert(
        &self,
        dataset: &mut SwathDataset,
        raw_field: RawField,
        masks: &SwathMasks,
    ) -> SwathResult<()> {
        let RawField {
            name,
            mut field,
            rule,
            floor,
        } = raw_field;
        for mask in masks.for_rule(rule) {
            apply_exclusion(&name, &mut field.values, mask.view())?;
        }
        if let Some(floor) = floor {
            apply_floor(&mut field.values, floor);
        }
        dataset.insert_field(&name, field)
    }

    /// Precipitation-type and region filters, then removal of empty scans.
    fn filter_columns(&self, dataset: &mut SwathDataset) -> SwathResult<()> {
        let mut filtered = false;
        if self.config.ptype != PrecipFilter::None {
            let keep = self.precip_columns(dataset)?;
            dataset.mask_columns(&keep)?;
            filtered = true;
        }
        if let Some(bbox) = &self.config.bbox {
            let keep = bbox.column_mask(&dataset.lons, &dataset.lats);
            dataset.mask_columns(&keep)?;
            filtered = true;
        }
        if !filtered {
            return Ok(());
        }

        let dropped = dataset.drop_empty_rows();
        if dataset.dims().0 == 0 {
            let message = format!(
                "all {} scans empty after {:?} filter and bounding box {:?}",
                dropped, self.config.ptype, self.config.bbox
            );
            self.logger.note(&message);
            return Err(SwathError::NoDataInRegion(message));
        }
        self.logger.detail(&format!("dropped {} empty scans", dropped));
        Ok(())
    }

    fn precip_columns(&self, dataset: &SwathDataset) -> SwathResult<Array2<bool>> {
        let precip = surface_flag(dataset, "flagPrecip")?;
        let keep = precip.mapv(|flag| flag == PRECIP_BOTH_CHANNELS);
        if self.config.ptype == PrecipFilter::Snow {
            let snow = surface_flag(dataset, "flagSurfaceSnow")?;
            return Ok(Zip::from(&keep)
                .and(&snow)
                .map_collect(|&precip, &snow| precip && snow == SURFACE_SNOW));
        }
        Ok(keep)
    }
}

fn surface_flag(dataset: &SwathDataset, name: &str) -> SwathResult<Array2<f64>> {
    let field: &Field = dataset.require(name)?;
    field
        .values
        .clone()
        .into_dimensionality::<Ix2>()
        .map_err(|_| rank_error(name, 2, field.values.ndim()))
}

fn rank_error(name: &str, expected: usize, found: usize) -> SwathError {
    SwathError::UnexpectedRank {
        name: name.to_string(),
        expected,
        found,
    }
}

//! Load, mask and filter a raw swath into an [`AssembledSwath`].

pub mod assembly;
pub mod config;
pub mod stages;

pub use assembly::FieldAssembler;
pub use config::{BoundingBox, PipelineConfig, PrecipFilter};
pub use stages::{AssembledSwath, SurfaceSwath};

use crate::prelude::{Campaign, SwathError, SwathResult};
use crate::source::{RawSwathSource, SourceLease};
use crate::telemetry::log::LogManager;

pub struct SwathPipeline {
    campaign: Campaign,
    config: PipelineConfig,
    logger: LogManager,
}

impl SwathPipeline {
    /// Validates the configuration for the campaign before any file is touched.
    pub fn new(campaign: Campaign, config: PipelineConfig) -> SwathResult<Self> {
        config.validate(campaign)?;
        Ok(Self {
            campaign,
            config,
            logger: LogManager::new("pipeline"),
        })
    }

    pub fn campaign(&self) -> Campaign {
        self.campaign
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Reads, masks and filters one swath. The source is released on return,
    /// whether or not assembly succeeded.
    pub fn run(&self, source: &mut dyn RawSwathSource) -> SwathResult<AssembledSwath> {
        if source.campaign() != self.campaign {
            return Err(SwathError::InvalidConfiguration(format!(
                "pipeline for {:?} given a {:?} source",
                self.campaign,
                source.campaign()
            )));
        }

        let mut raw = {
            let mut lease = SourceLease::acquire(source);
            if let Some(bbox) = &self.config.bbox {
                let coords = lease.coordinates()?;
                let inside = bbox.column_mask(&coords.lons, &coords.lats);
                if !inside.iter().any(|&inside| inside) {
                    let message = format!("no column of the swath lies inside {:?}", bbox);
                    self.logger.note(&message);
                    return Err(SwathError::NoDataInRegion(message));
                }
            }
            lease.load()?
        };

        let notes = std::mem::take(&mut raw.notes);
        let dataset = FieldAssembler::new(self.config.clone()).assemble(raw)?;
        let (along, cross, range) = dataset.dims();
        self.logger.record(&format!(
            "assembled {:?} swath: {} x {} x {}",
            self.campaign, along, cross, range
        ));
        Ok(AssembledSwath::new(dataset, notes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::Enrichment;
    use crate::geometry::ReferencePoint;
    use crate::masking::CloudTopParams;
    use crate::prelude::{Field, DPR_GATES};
    use crate::source::fixtures::{
        apr_reader, dpr_reader, APR_BEAMS, APR_TEST_GATES, DPR_ECHO_TOP, MS_CLUTTER_BIN,
    };
    use crate::dataset::SwathDataset;
    use crate::source::{AprSource, DprSource};
    use ndarray::Array2;

    const CLUTTER_GATE: usize = MS_CLUTTER_BIN as usize;

    fn run_dpr(config: PipelineConfig, scans: usize) -> SwathResult<AssembledSwath> {
        let mut source = DprSource::new(dpr_reader(scans));
        SwathPipeline::new(Campaign::SpaceborneDpr, config)?.run(&mut source)
    }

    #[test]
    fn measured_channel_gets_clutter_and_echo_top_masks() {
        let swath = run_dpr(PipelineConfig::default(), 2).unwrap();
        let ds = swath.dataset();
        assert_eq!(ds.dims(), (2, 25, DPR_GATES));

        let ku = &ds.require("NSKu").unwrap().values;
        assert!(ku[[0, 0, DPR_ECHO_TOP - 1]].is_nan());
        assert_eq!(ku[[0, 0, DPR_ECHO_TOP]], 30.0);
        assert_eq!(ku[[0, 0, CLUTTER_GATE - 1]], 30.0);
        assert!(ku[[0, 0, CLUTTER_GATE]].is_nan());

        // precipitation rate has no echo of its own above the echo top
        let rain = &ds.require("R").unwrap().values;
        assert!(rain[[1, 4, 0]].is_nan());
        assert_eq!(rain[[1, 4, DPR_ECHO_TOP]], 2.0);

        let clutter = ds.mask("clutter").unwrap();
        assert!(clutter[[0, 0, CLUTTER_GATE]]);
        assert!(!ds.mask("echotop").unwrap()[[0, 0, DPR_ECHO_TOP]]);
    }

    #[test]
    fn disabled_masks_leave_profiles_alone() {
        let config = PipelineConfig {
            clutter: false,
            echotop: false,
            keep_masks: false,
            ..Default::default()
        };
        let swath = run_dpr(config, 1).unwrap();
        let rain = &swath.dataset().require("R").unwrap().values;
        assert_eq!(rain[[0, 0, 0]], 2.0);
        assert_eq!(rain[[0, 0, DPR_GATES - 1]], 2.0);
        assert!(swath.dataset().mask("clutter").is_none());
    }

    #[test]
    fn precip_filter_keeps_dual_channel_columns() {
        let config = PipelineConfig {
            ptype: PrecipFilter::Precip,
            ..Default::default()
        };
        let swath = run_dpr(config, 3).unwrap();
        assert_eq!(swath.dataset().dims().0, 3);
    }

    #[test]
    fn precip_filter_masks_single_channel_columns_and_drops_their_scans() {
        let mut reader = dpr_reader(3);
        let mut flags = Array2::from_elem((3, 25), 11.0);
        flags.row_mut(1).fill(10.0);
        flags[[0, 4]] = 10.0;
        reader.insert("MS/PRE/flagPrecip", flags.into_dyn());
        let config = PipelineConfig {
            ptype: PrecipFilter::Precip,
            ..Default::default()
        };
        let swath = SwathPipeline::new(Campaign::SpaceborneDpr, config)
            .unwrap()
            .run(&mut DprSource::new(reader))
            .unwrap();
        let ds = swath.dataset();
        assert_eq!(ds.along_track, vec![0, 2]);

        let ku = &ds.require("NSKu").unwrap().values;
        assert!(ku[[0, 4, DPR_ECHO_TOP]].is_nan());
        assert_eq!(ku[[0, 5, DPR_ECHO_TOP]], 30.0);
        assert_eq!(ku[[1, 4, DPR_ECHO_TOP]], 30.0);
        let near = &ds.require("nearsurfaceKu").unwrap().values;
        assert!(near[[0, 4]].is_nan());
        assert_eq!(near[[1, 4]], 30.0);
    }

    #[test]
    fn snow_filter_without_snow_has_no_data() {
        let config = PipelineConfig {
            ptype: PrecipFilter::Snow,
            ..Default::default()
        };
        assert!(matches!(
            run_dpr(config, 3),
            Err(SwathError::NoDataInRegion(_))
        ));
    }

    #[test]
    fn snow_filter_drops_scans_without_snow() {
        let mut reader = dpr_reader(3);
        let mut snow = Array2::<f64>::zeros((3, 25));
        snow.row_mut(1).fill(1.0);
        reader.insert("MS/Experimental/flagSurfaceSnowfall", snow.into_dyn());
        let config = PipelineConfig {
            ptype: PrecipFilter::Snow,
            ..Default::default()
        };
        let swath = SwathPipeline::new(Campaign::SpaceborneDpr, config)
            .unwrap()
            .run(&mut DprSource::new(reader))
            .unwrap();
        assert_eq!(swath.dataset().along_track, vec![1]);
        assert_eq!(swath.dataset().require("NSKu").unwrap().values.shape()[0], 1);
    }

    #[test]
    fn bounding_box_masks_outside_columns_and_drops_empty_scans() {
        let config = PipelineConfig {
            bbox: Some(BoundingBox::new(-78.0, -77.0, 35.0, 35.06).unwrap()),
            ..Default::default()
        };
        let swath = run_dpr(config, 3).unwrap();
        let ds = swath.dataset();
        assert_eq!(ds.along_track, vec![0, 1]);

        let near = &ds.require("nearsurfaceKu").unwrap().values;
        // beam 12 sits at -78.8 degrees, outside the box
        assert!(near[[0, 0]].is_nan());
        assert_eq!(near[[0, 10]], 30.0);
    }

    #[test]
    fn bounding_box_around_whole_swath_changes_nothing() {
        let plain = run_dpr(PipelineConfig::default(), 3).unwrap();
        let config = PipelineConfig {
            bbox: Some(BoundingBox::new(-180.0, 180.0, -90.0, 90.0).unwrap()),
            ..Default::default()
        };
        let boxed = run_dpr(config, 3).unwrap();

        let (plain, boxed) = (plain.dataset(), boxed.dataset());
        assert_eq!(boxed.along_track, plain.along_track);
        assert_eq!(boxed.dims(), plain.dims());
        let names: Vec<&String> = plain.fields().map(|(name, _)| name).collect();
        assert_eq!(boxed.fields().map(|(name, _)| name).collect::<Vec<_>>(), names);
        for (name, field) in plain.fields() {
            let other = &boxed.require(name).unwrap().values;
            let same = field
                .values
                .iter()
                .zip(other.iter())
                .all(|(a, b)| a == b || (a.is_nan() && b.is_nan()));
            assert!(same, "{} changed under a covering box", name);
        }
    }

    #[test]
    fn region_outside_swath_fails_before_loading_and_releases() {
        let config = PipelineConfig {
            bbox: Some(BoundingBox::new(10.0, 20.0, -10.0, 0.0).unwrap()),
            ..Default::default()
        };
        let pipeline = SwathPipeline::new(Campaign::SpaceborneDpr, config).unwrap();
        let mut source = DprSource::new(dpr_reader(2));
        assert!(matches!(
            pipeline.run(&mut source),
            Err(SwathError::NoDataInRegion(_))
        ));
        assert!(source.reader().is_closed());
    }

    #[test]
    fn failed_load_still_releases_the_source() {
        let mut reader = dpr_reader(2);
        reader.remove("NS/SLV/precipRate");
        let mut source = DprSource::new(reader);
        let pipeline = SwathPipeline::new(Campaign::SpaceborneDpr, PipelineConfig::default());
        assert!(pipeline.unwrap().run(&mut source).is_err());
        assert!(source.reader().is_closed());
    }

    #[test]
    fn campaign_mismatch_is_rejected() {
        let pipeline = SwathPipeline::new(Campaign::AirborneGcpex, PipelineConfig::default());
        let mut source = DprSource::new(dpr_reader(1));
        assert!(matches!(
            pipeline.unwrap().run(&mut source),
            Err(SwathError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn near_surface_extraction_and_distance() {
        let swath = run_dpr(PipelineConfig::default(), 2).unwrap();
        let mut surface = swath.extract_near_surface("NSKu_c").unwrap();
        assert_eq!(surface.index().gate(0, 0).unwrap(), CLUTTER_GATE - 1);

        let ds = surface.dataset();
        assert_eq!(ds.require("NSKu_nearSurf").unwrap().values[[1, 3]], 30.0);
        assert_eq!(ds.require("R_nearSurf").unwrap().values[[1, 3]], 2.0);
        let alt = ds.require("alt_nearSurf").unwrap();
        assert_eq!(alt.units, "km");
        assert!(alt.values[[0, 12]] > 1.0 && alt.values[[0, 12]] < 1.2);

        surface
            .with_distance(ReferencePoint::new(-78.8, 35.0))
            .unwrap();
        let distance = &surface.dataset().require("distance").unwrap().values;
        assert!(distance[[0, 0]].abs() < 1e-6);
        assert!(distance[[0, 1]] > 9.0 && distance[[0, 1]] < 9.2);
    }

    struct Constant(f64);

    impl Enrichment for Constant {
        fn name(&self) -> &str {
            "constant"
        }

        fn derive(&self, dataset: &SwathDataset) -> SwathResult<Vec<(String, Field)>> {
            let (along, cross, range) = dataset.dims();
            let mut good = Field::missing(&[along, cross, range], "K", "good");
            good.values.fill(self.0);
            let bad = Field::missing(&[along + 1, cross], "K", "bad");
            Ok(vec![("good".to_string(), good), ("bad".to_string(), bad)])
        }
    }

    #[test]
    fn failed_enrichment_leaves_dataset_untouched() {
        let mut swath = run_dpr(PipelineConfig::default(), 1).unwrap();
        let before = swath.dataset().field_names();
        assert!(swath.enrich(&Constant(1.0)).is_err());
        assert_eq!(swath.dataset().field_names(), before);
    }

    #[test]
    fn airborne_swath_gets_cloud_top_mask_and_ground_reference() {
        let mut source = AprSource::new(
            Campaign::AirborneOlympex,
            apr_reader(Campaign::AirborneOlympex, 3),
        );
        let pipeline =
            SwathPipeline::new(Campaign::AirborneOlympex, PipelineConfig::default()).unwrap();
        let swath = pipeline.run(&mut source).unwrap();
        assert_eq!(swath.notes().len(), 1);
        assert!(source.reader().is_closed());

        let ds = swath.dataset();
        assert_eq!(ds.dims(), (3, APR_BEAMS, APR_TEST_GATES));
        let ku = &ds.require("Ku").unwrap().values;
        // the gate under the missing top gate is smoothed below the threshold
        assert!(ku[[0, 0, 1]].is_nan());
        assert_eq!(ku[[0, 0, 2]], 20.0);
        assert_eq!(ds.require("Ka").unwrap().values[[0, 0, 1]], 18.0);
        assert!(ds.mask("cloudtop").is_some());
        assert!(ds.gate_lons.is_some());

        let reference = pipeline.config().surface_reference(Campaign::AirborneOlympex);
        let surface = swath.extract_near_surface(&reference).unwrap();
        assert_eq!(surface.index().gate(2, 1).unwrap(), APR_TEST_GATES - 1);
        let alt = &surface.dataset().require("alt_nearSurf").unwrap().values;
        assert!(alt[[2, 1]].abs() < 1e-9);
    }

    #[test]
    fn cloud_top_mask_can_be_disabled() {
        let config = PipelineConfig {
            cloudtop: None,
            ..Default::default()
        };
        let mut source =
            AprSource::new(Campaign::AirborneGcpex, apr_reader(Campaign::AirborneGcpex, 2));
        let swath = SwathPipeline::new(Campaign::AirborneGcpex, config)
            .unwrap()
            .run(&mut source)
            .unwrap();
        let ku = &swath.dataset().require("Ku").unwrap().values;
        assert!((ku[[0, 0, 1]] - 20.0).abs() < 1e-9);
        assert!(swath.dataset().mask("cloudtop").is_none());
    }

    #[test]
    fn airborne_ptype_filter_is_rejected_up_front() {
        let config = PipelineConfig {
            ptype: PrecipFilter::Snow,
            cloudtop: Some(CloudTopParams::default()),
            ..Default::default()
        };
        assert!(matches!(
            SwathPipeline::new(Campaign::AirborneGcpex, config),
            Err(SwathError::InvalidConfiguration(_))
        ));
    }
}

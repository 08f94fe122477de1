use crate::workflow::config::{RetrievalPaths, WorkflowConfig};
use anyhow::Context;
use dprcore::enrichment::insitu::T3D_FIELD;
use dprcore::enrichment::{GriddedReanalysis, InSituTemperature, SoundingInterpolator};
use dprcore::pipeline::{AssembledSwath, SurfaceSwath, SwathPipeline};
use dprcore::retrieval::{LinearModel, RetrievalAdapter, StandardScaler};
use dprcore::source::{open_source, MemoryReader};
use dprcore::telemetry::{MetricsRecorder, MetricsSnapshot};
use dprcore::{Campaign, Enrichment, RawSwathSource, SwathError, SwathResult};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct FieldSummary {
    pub name: String,
    pub units: String,
    pub valid: usize,
    pub valid_fraction: f64,
}

/// What one processed swath produced, written as JSON next to the others.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub input: String,
    pub campaign: Campaign,
    pub dims: (usize, usize, usize),
    pub along_track: Vec<usize>,
    pub near_surface_reference: String,
    pub near_surface_columns: usize,
    pub enrichments: Vec<String>,
    pub notes: Vec<String>,
    pub fields: Vec<FieldSummary>,
}

/// Scaler and model files read for the retrieval step.
struct RetrievalModels {
    scaler: StandardScaler,
    target_scaler: Option<StandardScaler>,
    model: LinearModel,
}

impl RetrievalModels {
    fn load(paths: &RetrievalPaths) -> SwathResult<Self> {
        let target_scaler = match &paths.target_scaler {
            Some(path) => Some(StandardScaler::load(path)?),
            None => None,
        };
        Ok(Self {
            scaler: StandardScaler::load(&paths.scaler)?,
            target_scaler,
            model: LinearModel::load(&paths.model)?,
        })
    }

    fn adapter(
        &self,
        campaign: Campaign,
        swath: &AssembledSwath,
    ) -> SwathResult<RetrievalAdapter<LinearModel>> {
        match (&self.target_scaler, campaign.is_airborne()) {
            (Some(target), true) => RetrievalAdapter::airborne(
                self.scaler.clone(),
                target.clone(),
                self.model.clone(),
                swath.dataset().contains(T3D_FIELD),
            ),
            _ => RetrievalAdapter::dpr_dm(self.scaler.clone(), self.model.clone()),
        }
    }
}

/// Enrichment resources, read once per batch.
///
/// A resource that cannot be read disables its step for every file and is
/// reported in each summary.
#[derive(Default)]
struct Resources {
    sounding: Option<SoundingInterpolator<GriddedReanalysis>>,
    insitu: Option<InSituTemperature>,
    retrieval: Option<RetrievalModels>,
    unavailable: Vec<String>,
}

impl Resources {
    fn load(config: &WorkflowConfig) -> anyhow::Result<Self> {
        let mut resources = Resources::default();
        if let Some(path) = &config.reanalysis {
            resources.sounding = resources
                .keep_available("sounding", GriddedReanalysis::load(path))?
                .map(SoundingInterpolator::new);
        }
        if let Some(path) = &config.insitu {
            resources.insitu = resources.keep_available(
                "insitu",
                InSituTemperature::load(path, config.pipeline.bbox),
            )?;
        }
        if let Some(paths) = &config.retrieval {
            resources.retrieval =
                resources.keep_available("retrieval", RetrievalModels::load(paths))?;
        }
        Ok(resources)
    }

    /// An unreadable resource is noted and skipped; anything else is fatal.
    fn keep_available<T>(
        &mut self,
        step: &str,
        loaded: SwathResult<T>,
    ) -> anyhow::Result<Option<T>> {
        match loaded {
            Ok(resource) => Ok(Some(resource)),
            Err(err @ SwathError::ExternalResourceUnavailable(_)) => {
                let note = format!("{} skipped: {}", step, err);
                log::warn!("{}", note);
                self.unavailable.push(note);
                Ok(None)
            }
            Err(err) => Err(err).with_context(|| format!("loading {} resources", step)),
        }
    }
}

pub struct Runner {
    config: WorkflowConfig,
    pipeline: SwathPipeline,
    resources: Resources,
    metrics: MetricsRecorder,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let pipeline = SwathPipeline::new(config.campaign, config.to_pipeline_config())
            .context("building swath pipeline")?;
        let resources = Resources::load(&config)?;
        Ok(Self {
            config,
            pipeline,
            resources,
            metrics: MetricsRecorder::new(),
        })
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Processes every configured input; failures are logged and counted.
    pub fn run_batch(&self) -> Vec<RunSummary> {
        let mut summaries = Vec::new();
        for input in &self.config.inputs {
            match self.run_file(input) {
                Ok(summary) => summaries.push(summary),
                Err(err) => {
                    if matches!(
                        err.downcast_ref::<SwathError>(),
                        Some(SwathError::NoDataInRegion(_))
                    ) {
                        self.metrics.record_empty_region();
                        log::warn!("{}: {:#}", input.display(), err);
                    } else {
                        self.metrics.record_error();
                        log::error!("{}: {:#}", input.display(), err);
                    }
                }
            }
        }
        summaries
    }

    /// Loads a JSON swath dump, processes it and writes its summary.
    pub fn run_file(&self, input: &Path) -> anyhow::Result<RunSummary> {
        let reader = MemoryReader::load(input)
            .with_context(|| format!("opening swath dump {}", input.display()))?;
        let mut source = open_source(self.config.campaign, reader);
        let summary = self.process(source.as_mut(), &input.display().to_string())?;
        let path = self.write_summary(input, &summary)?;
        log::info!("{} -> {}", input.display(), path.display());
        self.metrics.record_processed();
        Ok(summary)
    }

    pub fn process(
        &self,
        source: &mut dyn RawSwathSource,
        label: &str,
    ) -> anyhow::Result<RunSummary> {
        let mut swath = self
            .pipeline
            .run(source)
            .with_context(|| format!("assembling {}", label))?;

        let mut notes = self.resources.unavailable.clone();
        let enrichments = self.enrich(&mut swath, &mut notes)?;

        let reference = self.config.surface_reference();
        let mut surface = swath
            .extract_near_surface(&reference)
            .with_context(|| format!("extracting near-surface gates from {}", reference))?;
        if let Some(point) = self.config.reference_point {
            surface
                .with_distance(point)
                .context("computing distance to reference point")?;
        }

        let mut summary = summarize(label, &reference, enrichments, &surface);
        summary.notes.extend(notes);
        Ok(summary)
    }

    /// Runs the available steps in order; a step without data is skipped with a note.
    fn enrich(
        &self,
        swath: &mut AssembledSwath,
        notes: &mut Vec<String>,
    ) -> anyhow::Result<Vec<String>> {
        let mut added = Vec::new();
        if let Some(step) = &self.resources.sounding {
            added.extend(apply(swath, step, notes)?);
        }
        if let Some(step) = &self.resources.insitu {
            added.extend(apply(swath, step, notes)?);
        }
        if let Some(models) = &self.resources.retrieval {
            let adapter = models
                .adapter(self.config.campaign, swath)
                .context("building retrieval adapter")?;
            added.extend(apply(swath, &adapter, notes)?);
        }
        Ok(added)
    }

    fn write_summary(&self, input: &Path, summary: &RunSummary) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.config.output_dir).with_context(|| {
            format!("creating output dir {}", self.config.output_dir.display())
        })?;
        let stem = input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "swath".to_string());
        let path = self.config.output_dir.join(format!("{}.summary.json", stem));
        let contents = serde_json::to_string_pretty(summary).context("serializing run summary")?;
        fs::write(&path, contents)
            .with_context(|| format!("writing run summary {}", path.display()))?;
        Ok(path)
    }
}

fn apply(
    swath: &mut AssembledSwath,
    step: &dyn Enrichment,
    notes: &mut Vec<String>,
) -> anyhow::Result<Vec<String>> {
    match swath.enrich(step) {
        Ok(added) => Ok(added),
        Err(
            err @ (SwathError::ExternalResourceUnavailable(_) | SwathError::NoDataInRegion(_)),
        ) => {
            let note = format!("{} skipped: {}", step.name(), err);
            log::warn!("{}", note);
            notes.push(note);
            Ok(Vec::new())
        }
        Err(err) => Err(err).with_context(|| format!("running {} enrichment", step.name())),
    }
}

fn summarize(
    label: &str,
    reference: &str,
    enrichments: Vec<String>,
    surface: &SurfaceSwath,
) -> RunSummary {
    let dataset = surface.dataset();
    let fields = dataset
        .fields()
        .map(|(name, field)| FieldSummary {
            name: name.clone(),
            units: field.units.clone(),
            valid: field.valid_count(),
            valid_fraction: field.valid_fraction(),
        })
        .collect();
    RunSummary {
        input: label.to_string(),
        campaign: dataset.campaign,
        dims: dataset.dims(),
        along_track: dataset.along_track.clone(),
        near_surface_reference: reference.to_string(),
        near_surface_columns: surface.index().valid_count(),
        enrichments,
        notes: surface.notes().to_vec(),
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{build_dpr_swath, GeneratorConfig};
    use crate::workflow::config::RetrievalPaths;
    use dprcore::geometry::ReferencePoint;
    use dprcore::pipeline::{BoundingBox, PipelineConfig};
    use tempfile::TempDir;

    fn write_swath(dir: &TempDir, name: &str, config: &GeneratorConfig) -> PathBuf {
        let path = dir.path().join(name);
        build_dpr_swath(config).unwrap().save(&path).unwrap();
        path
    }

    fn config(dir: &TempDir, inputs: Vec<PathBuf>, pipeline: PipelineConfig) -> WorkflowConfig {
        WorkflowConfig::from_args(
            Campaign::SpaceborneDpr,
            inputs,
            dir.path().join("out"),
            pipeline,
        )
    }

    #[test]
    fn runner_processes_synthetic_swath_end_to_end() {
        let dir = TempDir::new().unwrap();
        let gen = GeneratorConfig {
            scans: 4,
            seed: 7,
            ..Default::default()
        };
        let input = write_swath(&dir, "granule.json", &gen);
        let scaler = dir.path().join("scaler.json");
        fs::write(&scaler, r#"{"mean": [0.0, 0.0, 0.0], "scale": [1.0, 1.0, 1.0]}"#).unwrap();
        let model = dir.path().join("model.json");
        fs::write(&model, r#"{"weights": [[0.0], [0.0]], "bias": [1.25]}"#).unwrap();

        let mut cfg = config(&dir, vec![input.clone()], PipelineConfig::default());
        cfg.reference_point = Some(ReferencePoint::new(-79.4, 35.0));
        cfg.retrieval = Some(RetrievalPaths {
            scaler,
            target_scaler: None,
            model,
        });
        let runner = Runner::new(cfg).unwrap();
        let summaries = runner.run_batch();
        assert_eq!(summaries.len(), 1);
        assert_eq!(runner.metrics().processed, 1);

        let summary = &summaries[0];
        assert_eq!(summary.dims, (4, 25, 176));
        assert_eq!(summary.near_surface_columns, 100);
        assert_eq!(summary.enrichments, vec!["Dm".to_string()]);
        let names: Vec<&str> = summary.fields.iter().map(|f| f.name.as_str()).collect();
        for expected in ["Dm", "Dm_nearSurf", "NSKu_nearSurf", "alt_nearSurf", "distance"] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
        let near_surface = summary
            .fields
            .iter()
            .find(|f| f.name == "NSKu_nearSurf")
            .unwrap();
        assert!(near_surface.valid > 0);
        assert_eq!(near_surface.valid_fraction, near_surface.valid as f64 / 100.0);
        assert!(dir.path().join("out/granule.summary.json").exists());
    }

    #[test]
    fn empty_region_is_counted_not_fatal() {
        let dir = TempDir::new().unwrap();
        let input = write_swath(&dir, "granule.json", &GeneratorConfig::default());
        let pipeline = PipelineConfig {
            bbox: Some(BoundingBox::new(100.0, 110.0, 0.0, 10.0).unwrap()),
            ..Default::default()
        };
        let runner = Runner::new(config(&dir, vec![input], pipeline)).unwrap();
        assert!(runner.run_batch().is_empty());
        let metrics = runner.metrics();
        assert_eq!(metrics.empty_regions, 1);
        assert_eq!(metrics.errors, 0);
    }

    #[test]
    fn unreadable_inputs_are_counted_as_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        let runner =
            Runner::new(config(&dir, vec![missing], PipelineConfig::default())).unwrap();
        assert!(runner.run_batch().is_empty());
        assert_eq!(runner.metrics().errors, 1);
    }

    #[test]
    fn unreadable_model_skips_retrieval_only() {
        let dir = TempDir::new().unwrap();
        let input = write_swath(&dir, "granule.json", &GeneratorConfig::default());
        let mut cfg = config(&dir, vec![input.clone()], PipelineConfig::default());
        cfg.retrieval = Some(RetrievalPaths {
            scaler: dir.path().join("nope.json"),
            target_scaler: None,
            model: dir.path().join("nope.json"),
        });
        let runner = Runner::new(cfg).unwrap();
        let summary = runner.run_file(&input).unwrap();

        assert!(summary.enrichments.is_empty());
        assert_eq!(summary.notes.len(), 1);
        assert!(summary.notes[0].starts_with("retrieval skipped"));
        let names: Vec<&str> = summary.fields.iter().map(|f| f.name.as_str()).collect();
        assert!(names.contains(&"NSKu_nearSurf"));
        assert!(!names.contains(&"Dm"));
        assert!(dir.path().join("out/granule.summary.json").exists());
        assert_eq!(runner.metrics().processed, 1);
    }

    #[test]
    fn missing_reanalysis_is_noted_for_every_file() {
        let dir = TempDir::new().unwrap();
        let gen = GeneratorConfig {
            scans: 2,
            ..Default::default()
        };
        let first = write_swath(&dir, "first.json", &gen);
        let second = write_swath(&dir, "second.json", &gen);
        let mut cfg = config(&dir, vec![first, second], PipelineConfig::default());
        cfg.reanalysis = Some(dir.path().join("era5.json"));
        let runner = Runner::new(cfg).unwrap();

        let summaries = runner.run_batch();
        assert_eq!(summaries.len(), 2);
        for summary in &summaries {
            assert!(summary.enrichments.is_empty());
            assert!(summary.notes.iter().any(|n| n.starts_with("sounding skipped")));
        }
        assert_eq!(runner.metrics().errors, 0);
    }

    #[test]
    fn insitu_without_enough_bins_is_skipped() {
        let dir = TempDir::new().unwrap();
        let input = write_swath(&dir, "granule.json", &GeneratorConfig::default());
        let insitu = dir.path().join("citation.json");
        fs::write(
            &insitu,
            r#"[{"lon": -80.0, "lat": 35.0, "alt_m": 100.0, "temperature_c": 2.0}]"#,
        )
        .unwrap();
        let mut cfg = config(&dir, vec![input.clone()], PipelineConfig::default());
        cfg.insitu = Some(insitu);
        let runner = Runner::new(cfg).unwrap();

        let summary = runner.run_file(&input).unwrap();
        assert!(summary.enrichments.is_empty());
        assert!(summary.notes.iter().any(|n| n.starts_with("insitu skipped")));
    }
}

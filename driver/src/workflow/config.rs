use anyhow::{bail, Context};
use dprcore::geometry::ReferencePoint;
use dprcore::pipeline::PipelineConfig;
use dprcore::Campaign;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Scaler and model files for the retrieval step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievalPaths {
    pub scaler: PathBuf,
    /// Required for the airborne campaigns, whose models predict standardized targets.
    pub target_scaler: Option<PathBuf>,
    pub model: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub campaign: Campaign,
    pub inputs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub pipeline: PipelineConfig,
    pub reference_point: Option<ReferencePoint>,
    pub reanalysis: Option<PathBuf>,
    pub insitu: Option<PathBuf>,
    pub retrieval: Option<RetrievalPaths>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            campaign: Campaign::SpaceborneDpr,
            inputs: Vec::new(),
            output_dir: PathBuf::from("summaries"),
            pipeline: PipelineConfig::default(),
            reference_point: None,
            reanalysis: None,
            insitu: None,
            retrieval: None,
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(
        campaign: Campaign,
        inputs: Vec<PathBuf>,
        output_dir: PathBuf,
        pipeline: PipelineConfig,
    ) -> Self {
        Self {
            campaign,
            inputs,
            output_dir,
            pipeline,
            ..Default::default()
        }
    }

    /// Checks option combinations before any swath is opened.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.pipeline
            .validate(self.campaign)
            .context("validating pipeline options")?;
        if let Some(retrieval) = &self.retrieval {
            if self.campaign.is_airborne() && retrieval.target_scaler.is_none() {
                bail!("{:?} retrieval needs a target scaler", self.campaign);
            }
        }
        Ok(())
    }

    pub fn to_pipeline_config(&self) -> PipelineConfig {
        self.pipeline.clone()
    }

    pub fn surface_reference(&self) -> String {
        self.pipeline.surface_reference(self.campaign)
    }
}

use anyhow::Context;
use clap::Parser;
use dprcore::geometry::ReferencePoint;
use dprcore::pipeline::{BoundingBox, PipelineConfig, PrecipFilter};
use dprcore::Campaign;
use generator::profile::{build_dpr_swath, GeneratorConfig};
use std::fs;
use std::path::PathBuf;
use workflow::config::{RetrievalPaths, WorkflowConfig};
use workflow::runner::Runner;

mod generator {
    pub mod profile;
}

mod workflow {
    pub mod config;
    pub mod runner;
}

#[derive(Parser)]
#[command(author, version, about = "Batch driver for GPM-DPR and APR swath processing")]
struct Args {
    /// JSON swath dumps to process
    inputs: Vec<PathBuf>,
    /// Load a workflow config from YAML (other options are then ignored)
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long, default_value = "dpr")]
    campaign: Campaign,
    /// Region as west east south north
    #[arg(long, num_args = 4, allow_hyphen_values = true)]
    bbox: Option<Vec<f64>>,
    /// Surface precipitation filter: none, precip or snow
    #[arg(long, default_value = "none")]
    ptype: PrecipFilter,
    #[arg(long, default_value_t = false)]
    no_clutter: bool,
    #[arg(long, default_value_t = false)]
    no_echotop: bool,
    #[arg(long, default_value_t = false)]
    no_cloudtop: bool,
    /// Field used to locate the near-surface gate
    #[arg(long)]
    surface_reference: Option<String>,
    /// Reference point as lon lat for the distance field
    #[arg(long, num_args = 2, allow_hyphen_values = true)]
    reference: Option<Vec<f64>>,
    #[arg(long)]
    reanalysis: Option<PathBuf>,
    #[arg(long)]
    insitu: Option<PathBuf>,
    #[arg(long, requires = "model")]
    scaler: Option<PathBuf>,
    #[arg(long)]
    target_scaler: Option<PathBuf>,
    #[arg(long, requires = "scaler")]
    model: Option<PathBuf>,
    #[arg(long, default_value = "summaries")]
    output_dir: PathBuf,
    /// Generate a synthetic DPR granule with this many scans and process it too
    #[arg(long)]
    synthetic: Option<usize>,
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

impl Args {
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let bbox = self
            .bbox
            .as_deref()
            .map(BoundingBox::from_slice)
            .transpose()
            .context("parsing --bbox")?;
        let defaults = PipelineConfig::default();
        Ok(PipelineConfig {
            bbox,
            ptype: self.ptype,
            clutter: !self.no_clutter,
            echotop: !self.no_echotop,
            cloudtop: if self.no_cloudtop {
                None
            } else {
                defaults.cloudtop.clone()
            },
            near_surface_reference: self.surface_reference.clone(),
            ..defaults
        })
    }

    fn workflow_config(&self) -> anyhow::Result<WorkflowConfig> {
        let mut config = WorkflowConfig::from_args(
            self.campaign,
            self.inputs.clone(),
            self.output_dir.clone(),
            self.pipeline_config()?,
        );
        config.reference_point = match self.reference.as_deref() {
            Some([lon, lat]) => Some(ReferencePoint::new(*lon, *lat)),
            _ => None,
        };
        config.reanalysis = self.reanalysis.clone();
        config.insitu = self.insitu.clone();
        if let (Some(scaler), Some(model)) = (&self.scaler, &self.model) {
            config.retrieval = Some(RetrievalPaths {
                scaler: scaler.clone(),
                target_scaler: self.target_scaler.clone(),
                model: model.clone(),
            });
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut workflow_config = if let Some(path) = &args.workflow {
        WorkflowConfig::load(path)?
    } else {
        args.workflow_config()?
    };

    if let Some(scans) = args.synthetic {
        anyhow::ensure!(
            !workflow_config.campaign.is_airborne(),
            "synthetic granules are only generated for the DPR campaign"
        );
        let generator_config = GeneratorConfig {
            scans,
            seed: args.seed,
            ..Default::default()
        };
        let reader = build_dpr_swath(&generator_config)?;
        fs::create_dir_all(&workflow_config.output_dir).with_context(|| {
            format!("creating output dir {}", workflow_config.output_dir.display())
        })?;
        let path = workflow_config
            .output_dir
            .join(format!("synthetic_dpr_seed{}.json", args.seed));
        reader
            .save(&path)
            .with_context(|| format!("writing synthetic swath {}", path.display()))?;
        workflow_config.inputs.push(path);
    }

    let runner = Runner::new(workflow_config)?;
    let summaries = runner.run_batch();
    for summary in &summaries {
        println!(
            "{} -> dims {:?}, {} scans kept, {} near-surface columns, added {:?}",
            summary.input,
            summary.dims,
            summary.along_track.len(),
            summary.near_surface_columns,
            summary.enrichments
        );
    }

    let metrics = runner.metrics();
    println!(
        "Batch done -> processed {}, empty regions {}, errors {}",
        metrics.processed, metrics.empty_regions, metrics.errors
    );
    Ok(())
}

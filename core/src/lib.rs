//! Swath processing core for GPM-DPR and APR precipitation radar data.
//!
//! Raw files are read through [`source::RawSwathSource`] parsers, masked and
//! filtered by a [`pipeline::SwathPipeline`] into an assembled swath, enriched
//! with environmental and retrieved fields, and reduced to near-surface
//! slices.

pub mod dataset;
pub mod enrichment;
pub mod extraction;
pub mod geometry;
pub mod masking;
pub mod math;
mod nullable;
pub mod pipeline;
pub mod prelude;
pub mod retrieval;
pub mod source;
pub mod telemetry;

pub use dataset::SwathDataset;
pub use enrichment::Enrichment;
pub use pipeline::{AssembledSwath, PipelineConfig, SurfaceSwath, SwathPipeline};
pub use prelude::{Campaign, Field, SwathError, SwathResult};
pub use source::{open_source, RawSwathSource, SwathReader};

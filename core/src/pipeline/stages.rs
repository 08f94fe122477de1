use crate::dataset::SwathDataset;
use crate::enrichment::distance::DISTANCE_FIELD;
use crate::enrichment::{DistanceToPoint, Enrichment};
use crate::extraction::{near_surface_fields, NearSurfaceIndex};
use crate::geometry::ReferencePoint;
use crate::prelude::SwathResult;
use crate::telemetry::log::LogManager;

/// Masked, filtered dataset ready for enrichment.
#[derive(Debug, Clone)]
pub struct AssembledSwath {
    dataset: SwathDataset,
    notes: Vec<String>,
}

impl AssembledSwath {
    pub(crate) fn new(dataset: SwathDataset, notes: Vec<String>) -> Self {
        Self { dataset, notes }
    }

    pub fn dataset(&self) -> &SwathDataset {
        &self.dataset
    }

    /// Recoverable conditions met while loading (substituted channels).
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn into_dataset(self) -> SwathDataset {
        self.dataset
    }

    /// Runs one enrichment step and merges its fields; returns the new names.
    ///
    /// Every derived field is checked before any is inserted, so a failing
    /// step leaves the dataset as it was.
    pub fn enrich(&mut self, step: &dyn Enrichment) -> SwathResult<Vec<String>> {
        let derived = step.derive(&self.dataset)?;
        for (name, field) in &derived {
            self.dataset.check_field(name, field)?;
        }
        let mut names = Vec::with_capacity(derived.len());
        for (name, field) in derived {
            self.dataset.insert_field(&name, field)?;
            names.push(name);
        }
        LogManager::new("enrich").record(&format!("{} added {:?}", step.name(), names));
        Ok(names)
    }

    /// Locates the lowest valid gate of `reference` and adds the near-surface slices.
    pub fn extract_near_surface(self, reference: &str) -> SwathResult<SurfaceSwath> {
        let Self { mut dataset, notes } = self;
        let index = NearSurfaceIndex::from_reference(reference, dataset.require(reference)?)?;
        for (name, field) in near_surface_fields(&dataset, &index)? {
            dataset.insert_field(&name, field)?;
        }
        LogManager::new("extraction").detail(&format!(
            "{} of {} columns have a near-surface gate in {}",
            index.valid_count(),
            index.gates().len(),
            reference
        ));
        Ok(SurfaceSwath {
            dataset,
            index,
            notes,
        })
    }
}

/// Dataset with near-surface slices and the index that produced them.
#[derive(Debug, Clone)]
pub struct SurfaceSwath {
    dataset: SwathDataset,
    index: NearSurfaceIndex,
    notes: Vec<String>,
}

impl SurfaceSwath {
    pub fn dataset(&self) -> &SwathDataset {
        &self.dataset
    }

    pub fn index(&self) -> &NearSurfaceIndex {
        &self.index
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn into_dataset(self) -> SwathDataset {
        self.dataset
    }

    /// Adds the `distance` field (km) to a reference point.
    pub fn with_distance(&mut self, centre: ReferencePoint) -> SwathResult<()> {
        let field = DistanceToPoint::new(centre).distance_field(
            &self.dataset.lons,
            &self.dataset.lats,
            &self.index.valid_columns(),
        )?;
        self.dataset.insert_field(DISTANCE_FIELD, field)
    }
}

//! Lowest valid gate per column and the 2-D near-surface slices it selects.

use crate::dataset::SwathDataset;
use crate::prelude::{ensure_shape, Field, SwathError, SwathResult};
use ndarray::{Array2, ArrayView3, Axis, Ix3, Zip};

pub const NEAR_SURFACE_SUFFIX: &str = "_nearSurf";

/// Per-column vertical index of the lowest valid gate of a reference field.
///
/// Higher gate indices are closer to the surface. Columns where the reference
/// is entirely missing carry `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct NearSurfaceIndex {
    reference: String,
    gates: Array2<Option<usize>>,
}

impl NearSurfaceIndex {
    pub fn from_profile(reference: &str, values: ArrayView3<f64>) -> Self {
        let gates = values.map_axis(Axis(2), |column| {
            column.iter().rposition(|value| !value.is_nan())
        });
        Self {
            reference: reference.to_string(),
            gates,
        }
    }

    pub fn from_reference(reference: &str, field: &Field) -> SwathResult<Self> {
        let values = field
            .values
            .view()
            .into_dimensionality::<Ix3>()
            .map_err(|_| SwathError::UnexpectedRank {
                name: reference.to_string(),
                expected: 3,
                found: field.values.ndim(),
            })?;
        Ok(Self::from_profile(reference, values))
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn gates(&self) -> &Array2<Option<usize>> {
        &self.gates
    }

    /// Gate index of one column; a column without any valid gate is degenerate.
    pub fn gate(&self, along: usize, cross: usize) -> SwathResult<usize> {
        self.gates
            .get((along, cross))
            .copied()
            .flatten()
            .ok_or(SwathError::DegenerateColumn { along, cross })
    }

    pub fn valid_columns(&self) -> Array2<bool> {
        self.gates.mapv(|gate| gate.is_some())
    }

    pub fn valid_count(&self) -> usize {
        self.gates.iter().filter(|gate| gate.is_some()).count()
    }

    /// Slices a profile at each column's near-surface gate.
    pub fn extract(&self, values: ArrayView3<f64>) -> SwathResult<Array2<f64>> {
        let (along, cross, _) = values.dim();
        ensure_shape(&self.reference, self.gates.shape(), &[along, cross])?;
        Ok(Zip::from(&self.gates)
            .and(values.lanes(Axis(2)))
            .map_collect(|gate, column| match gate {
                Some(gate) => column.get(*gate).copied().unwrap_or(f64::NAN),
                None => f64::NAN,
            }))
    }
}

/// `<name>_nearSurf` slices of every profile field plus `alt_nearSurf` (km).
pub fn near_surface_fields(
    dataset: &SwathDataset,
    index: &NearSurfaceIndex,
) -> SwathResult<Vec<(String, Field)>> {
    let mut derived = Vec::new();
    for (name, field) in dataset.fields() {
        if !field.is_profile() {
            continue;
        }
        let values = field
            .values
            .view()
            .into_dimensionality::<Ix3>()
            .map_err(|_| SwathError::UnexpectedRank {
                name: name.clone(),
                expected: 3,
                found: field.values.ndim(),
            })?;
        let slice = index.extract(values)?;
        derived.push((
            format!("{}{}", name, NEAR_SURFACE_SUFFIX),
            Field::new(
                slice.into_dyn(),
                &field.units,
                &format!("near-surface {}", field.standard_name),
            ),
        ));
    }

    let alt = index.extract(dataset.alt.view())?;
    derived.push((
        format!("alt{}", NEAR_SURFACE_SUFFIX),
        Field::new(alt.into_dyn(), "km", "altitude of the near-surface bin"),
    ));
    Ok(derived)
}

//! Labeled swath dataset shared by every stage after assembly.

use crate::masking::GateMask;
use crate::prelude::{ensure_shape, Campaign, Field, SwathError, SwathResult};
use chrono::NaiveDateTime;
use ndarray::{Array2, Array3, ArrayD, Axis, Ix2, Ix3, Zip};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct SwathDataset {
    pub campaign: Campaign,
    /// Source scan index of every remaining along-track row.
    pub along_track: Vec<usize>,
    pub lons: Array2<f64>,
    pub lats: Array2<f64>,
    pub time: Array2<NaiveDateTime>,
    /// Gate altitude above sea level (km).
    pub alt: Array3<f64>,
    pub gate_lons: Option<Array3<f64>>,
    pub gate_lats: Option<Array3<f64>>,
    fields: BTreeMap<String, Field>,
    masks: BTreeMap<String, GateMask>,
}

impl SwathDataset {
    pub fn new(
        campaign: Campaign,
        lons: Array2<f64>,
        lats: Array2<f64>,
        time: Array2<NaiveDateTime>,
        alt: Array3<f64>,
    ) -> SwathResult<Self> {
        let (along, cross, _) = alt.dim();
        ensure_shape("lons", lons.shape(), &[along, cross])?;
        ensure_shape("lats", lats.shape(), &[along, cross])?;
        ensure_shape("time", time.shape(), &[along, cross])?;
        Ok(Self {
            campaign,
            along_track: (0..along).collect(),
            lons,
            lats,
            time,
            alt,
            gate_lons: None,
            gate_lats: None,
            fields: BTreeMap::new(),
            masks: BTreeMap::new(),
        })
    }

    /// (along_track, cross_track, range) extents.
    pub fn dims(&self) -> (usize, usize, usize) {
        self.alt.dim()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn require(&self, name: &str) -> SwathResult<&Field> {
        self.fields
            .get(name)
            .ok_or_else(|| SwathError::MissingField(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Field)> {
        self.fields.iter()
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    /// Checks that a field fits the swath as a 2-D surface or 3-D profile.
    pub fn check_field(&self, name: &str, field: &Field) -> SwathResult<()> {
        let (along, cross, range) = self.dims();
        if field.values.ndim() == 3 {
            ensure_shape(name, field.values.shape(), &[along, cross, range])
        } else {
            ensure_shape(name, field.values.shape(), &[along, cross])
        }
    }

    pub fn insert_field(&mut self, name: &str, field: Field) -> SwathResult<()> {
        self.check_field(name, &field)?;
        self.fields.insert(name.to_string(), field);
        Ok(())
    }

    pub fn mask(&self, name: &str) -> Option<&GateMask> {
        self.masks.get(name)
    }

    pub fn insert_mask(&mut self, name: &str, mask: GateMask) -> SwathResult<()> {
        ensure_shape(name, mask.shape(), self.alt.shape())?;
        self.masks.insert(name.to_string(), mask);
        Ok(())
    }

    /// Marks every field missing at columns where `keep` is false.
    pub fn mask_columns(&mut self, keep: &Array2<bool>) -> SwathResult<()> {
        let (along, cross, _) = self.dims();
        ensure_shape("column filter", keep.shape(), &[along, cross])?;
        for (name, field) in self.fields.iter_mut() {
            mask_field_columns(name, &mut field.values, keep)?;
        }
        Ok(())
    }

    /// Drops along-track rows where every field is missing; returns how many went.
    pub fn drop_empty_rows(&mut self) -> usize {
        let along = self.dims().0;
        let mut occupied = vec![false; along];
        for field in self.fields.values() {
            for (row, values) in field.values.axis_iter(Axis(0)).enumerate() {
                if !occupied[row] && values.iter().any(|v| !v.is_nan()) {
                    occupied[row] = true;
                }
            }
        }

        let rows: Vec<usize> = (0..along).filter(|&row| occupied[row]).collect();
        let dropped = along - rows.len();
        if dropped > 0 {
            self.select_rows(&rows);
        }
        dropped
    }

    /// Keeps only the given along-track rows, in order.
    pub fn select_rows(&mut self, rows: &[usize]) {
        self.along_track = rows.iter().map(|&row| self.along_track[row]).collect();
        self.lons = self.lons.select(Axis(0), rows);
        self.lats = self.lats.select(Axis(0), rows);
        self.time = self.time.select(Axis(0), rows);
        self.alt = self.alt.select(Axis(0), rows);
        self.gate_lons = self.gate_lons.as_ref().map(|grid| grid.select(Axis(0), rows));
        self.gate_lats = self.gate_lats.as_ref().map(|grid| grid.select(Axis(0), rows));
        for field in self.fields.values_mut() {
            field.values = field.values.select(Axis(0), rows);
        }
        for mask in self.masks.values_mut() {
            *mask = mask.select(Axis(0), rows);
        }
    }
}

fn mask_field_columns(
    name: &str,
    values: &mut ArrayD<f64>,
    keep: &Array2<bool>,
) -> SwathResult<()> {
    let mismatch = |found: &[usize]| SwathError::ShapeMismatch {
        name: name.to_string(),
        expected: keep.shape().to_vec(),
        found: found.to_vec(),
    };
    let shape = values.shape().to_vec();
    match values.ndim() {
        2 => {
            let view = values
                .view_mut()
                .into_dimensionality::<Ix2>()
                .map_err(|_| mismatch(&shape))?;
            Zip::from(view).and(keep).for_each(|value, &kept| {
                if !kept {
                    *value = f64::NAN;
                }
            });
        }
        3 => {
            let mut view = values
                .view_mut()
                .into_dimensionality::<Ix3>()
                .map_err(|_| mismatch(&shape))?;
            Zip::from(view.lanes_mut(Axis(2)))
                .and(keep)
                .for_each(|mut column, &kept| {
                    if !kept {
                        column.fill(f64::NAN);
                    }
                });
        }
        _ => return Err(mismatch(&shape)),
    }
    Ok(())
}

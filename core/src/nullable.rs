//! JSON has no NaN: missing samples are written as `null` and read back as NaN.

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

fn to_option(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Scalar `f64` fields.
pub mod value {
    use super::*;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        to_option(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

/// `Vec<f64>` fields.
pub mod values {
    use super::*;

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let stored: Vec<Option<f64>> = values.iter().copied().map(to_option).collect();
        stored.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let stored: Vec<Option<f64>> = Vec::deserialize(deserializer)?;
        Ok(stored.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

#[derive(Serialize, Deserialize)]
struct StoredArray {
    shape: Vec<usize>,
    data: Vec<Option<f64>>,
}

/// Named n-dimensional arrays, stored row-major with their shape.
pub mod arrays {
    use super::*;

    pub fn serialize<S: Serializer>(
        arrays: &BTreeMap<String, ArrayD<f64>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let stored: BTreeMap<&str, StoredArray> = arrays
            .iter()
            .map(|(key, array)| {
                let stored = StoredArray {
                    shape: array.shape().to_vec(),
                    data: array.iter().copied().map(to_option).collect(),
                };
                (key.as_str(), stored)
            })
            .collect();
        stored.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, ArrayD<f64>>, D::Error> {
        let stored: BTreeMap<String, StoredArray> = BTreeMap::deserialize(deserializer)?;
        let mut arrays = BTreeMap::new();
        for (key, array) in stored {
            let data: Vec<f64> = array.data.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
            let values = ArrayD::from_shape_vec(IxDyn(&array.shape), data)
                .map_err(|err| {
                    <D::Error as serde::de::Error>::custom(format!("{}: {}", key, err))
                })?;
            arrays.insert(key, values);
        }
        Ok(arrays)
    }
}

use crate::prelude::{SwathError, SwathResult};
use crate::source::SwathReader;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// In-memory named-array store, used for JSON swath dumps and tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryReader {
    #[serde(with = "crate::nullable::arrays")]
    arrays: BTreeMap<String, ArrayD<f64>>,
    #[serde(skip)]
    closed: bool,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, values: ArrayD<f64>) {
        self.arrays.insert(key.to_string(), values);
    }

    pub fn with(mut self, key: &str, values: ArrayD<f64>) -> Self {
        self.insert(key, values);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<ArrayD<f64>> {
        self.arrays.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.arrays.keys()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Loads a JSON dump written by [`MemoryReader::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> SwathResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| {
            SwathError::ExternalResourceUnavailable(format!("{}: {}", path.display(), err))
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            SwathError::ExternalResourceUnavailable(format!("{}: {}", path.display(), err))
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> SwathResult<()> {
        let path = path.as_ref();
        let contents = serde_json::to_string(self).map_err(|err| {
            SwathError::ExternalResourceUnavailable(format!("{}: {}", path.display(), err))
        })?;
        fs::write(path, contents).map_err(|err| {
            SwathError::ExternalResourceUnavailable(format!("{}: {}", path.display(), err))
        })
    }
}

impl SwathReader for MemoryReader {
    fn read(&mut self, key: &str) -> SwathResult<ArrayD<f64>> {
        if self.closed {
            return Err(SwathError::ExternalResourceUnavailable(format!(
                "read of '{}' after release",
                key
            )));
        }
        self.arrays
            .get(key)
            .cloned()
            .ok_or_else(|| SwathError::MissingField(key.to_string()))
    }

    fn shape(&self, key: &str) -> SwathResult<Vec<usize>> {
        self.arrays
            .get(key)
            .map(|values| values.shape().to_vec())
            .ok_or_else(|| SwathError::MissingField(key.to_string()))
    }

    fn contains(&self, key: &str) -> bool {
        self.arrays.contains_key(key)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    #[test]
    fn missing_key_is_reported_by_name() {
        let mut reader = MemoryReader::new();
        assert_eq!(
            reader.read("NS/PRE/zFactorMeasured"),
            Err(SwathError::MissingField("NS/PRE/zFactorMeasured".into()))
        );
    }

    #[test]
    fn shape_is_reported_without_reading() {
        let reader = MemoryReader::new().with("NS/Latitude", ArrayD::zeros(IxDyn(&[3, 49])));
        assert_eq!(reader.shape("NS/Latitude").unwrap(), vec![3, 49]);
        assert!(matches!(reader.shape("NS/Longitude"), Err(SwathError::MissingField(_))));
    }

    #[test]
    fn closed_reader_refuses_reads() {
        let mut reader = MemoryReader::new().with("lat", ArrayD::zeros(IxDyn(&[2, 2])));
        assert!(reader.contains("lat"));
        reader.close();
        assert!(matches!(
            reader.read("lat"),
            Err(SwathError::ExternalResourceUnavailable(_))
        ));
    }

    #[test]
    fn json_dump_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swath.json");
        let values = ArrayD::from_shape_vec(IxDyn(&[2]), vec![1.5, -9999.9]).unwrap();
        MemoryReader::new().with("NS/Latitude", values.clone()).save(&path).unwrap();

        let mut loaded = MemoryReader::load(&path).unwrap();
        assert_eq!(loaded.read("NS/Latitude").unwrap(), values);
        assert!(matches!(
            MemoryReader::load(dir.path().join("absent.json")),
            Err(SwathError::ExternalResourceUnavailable(_))
        ));
    }

    #[test]
    fn missing_samples_survive_a_json_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swath.json");
        let zhh = ArrayD::from_shape_vec(IxDyn(&[1, 2, 2]), vec![1.5, f64::NAN, -3.0, f64::NAN])
            .unwrap();
        MemoryReader::new().with("lores/zhh14", zhh).save(&path).unwrap();

        let mut loaded = MemoryReader::load(&path).unwrap();
        let values = loaded.read("lores/zhh14").unwrap();
        assert_eq!(values.shape(), &[1, 2, 2]);
        assert_eq!(values[[0, 0, 0]], 1.5);
        assert!(values[[0, 0, 1]].is_nan());
        assert_eq!(values[[0, 1, 0]], -3.0);
        assert!(values[[0, 1, 1]].is_nan());
    }

    #[test]
    fn dump_with_wrong_sample_count_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swath.json");
        std::fs::write(&path, r#"{"arrays": {"lat": {"shape": [2, 2], "data": [1.0]}}}"#).unwrap();
        assert!(matches!(
            MemoryReader::load(&path),
            Err(SwathError::ExternalResourceUnavailable(_))
        ));
    }
}

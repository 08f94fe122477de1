use crate::prelude::{SwathError, SwathResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Per-column standardization learned at training time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> SwathResult<Self> {
        let scaler = Self { mean, scale };
        scaler.validate()?;
        Ok(scaler)
    }

    /// Reads `{"mean": [...], "scale": [...]}` from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> SwathResult<Self> {
        let path = path.as_ref();
        let unavailable = |err: String| {
            SwathError::ExternalResourceUnavailable(format!("{}: {}", path.display(), err))
        };
        let contents = fs::read_to_string(path).map_err(|err| unavailable(err.to_string()))?;
        let scaler: StandardScaler =
            serde_json::from_str(&contents).map_err(|err| unavailable(err.to_string()))?;
        scaler
            .validate()
            .map_err(|err| unavailable(err.to_string()))?;
        Ok(scaler)
    }

    fn validate(&self) -> SwathResult<()> {
        if self.mean.len() != self.scale.len() {
            return Err(SwathError::InvalidConfiguration(format!(
                "scaler has {} means but {} scales",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return Err(SwathError::InvalidConfiguration(
                "scaler scales must be finite and non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn columns(&self) -> usize {
        self.mean.len()
    }

    fn column(&self, column: usize) -> SwathResult<(f64, f64)> {
        match (self.mean.get(column), self.scale.get(column)) {
            (Some(mean), Some(scale)) => Ok((*mean, *scale)),
            _ => Err(SwathError::InvalidConfiguration(format!(
                "scaler column {} out of {}",
                column,
                self.columns()
            ))),
        }
    }

    pub fn transform(&self, column: usize, value: f64) -> SwathResult<f64> {
        let (mean, scale) = self.column(column)?;
        Ok((value - mean) / scale)
    }

    pub fn inverse(&self, column: usize, value: f64) -> SwathResult<f64> {
        let (mean, scale) = self.column(column)?;
        Ok(value * scale + mean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn transform_and_inverse_use_the_named_column() {
        let scaler = StandardScaler::new(vec![1.0, 10.0, 100.0], vec![2.0, 5.0, 50.0]).unwrap();
        assert_eq!(scaler.transform(2, 200.0).unwrap(), 2.0);
        assert_eq!(scaler.inverse(1, -1.0).unwrap(), 5.0);
        assert!(scaler.transform(3, 0.0).is_err());
    }

    #[test]
    fn zero_scale_is_rejected() {
        assert!(StandardScaler::new(vec![0.0], vec![0.0]).is_err());
        assert!(StandardScaler::new(vec![0.0, 1.0], vec![1.0]).is_err());
    }

    #[test]
    fn unreadable_files_are_unavailable_resources() {
        assert!(matches!(
            StandardScaler::load("/nonexistent/scaler.json"),
            Err(SwathError::ExternalResourceUnavailable(_))
        ));

        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(br#"{"mean": [1.0], "scale": [0.0]}"#).unwrap();
        assert!(matches!(
            StandardScaler::load(temp.path()),
            Err(SwathError::ExternalResourceUnavailable(_))
        ));

        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(br#"{"mean": [1.0, 2.0], "scale": [3.0, 4.0]}"#)
            .unwrap();
        assert_eq!(StandardScaler::load(temp.path()).unwrap().columns(), 2);
    }
}

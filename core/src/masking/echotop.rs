use crate::masking::GateMask;
use crate::telemetry::log::LogManager;
use ndarray::{s, Array2, Array3, ArrayView3, Axis};

/// Noise mask that cuts the measured profile above the corrected echo top.
pub struct EchoTopMasker {
    logger: LogManager,
}

impl EchoTopMasker {
    pub fn new() -> Self {
        Self {
            logger: LogManager::new("echotop"),
        }
    }

    /// Index of the topmost valid gate per column.
    pub fn top_gates(&self, corrected: ArrayView3<f64>) -> Array2<Option<usize>> {
        corrected.map_axis(Axis(2), |column| column.iter().position(|v| !v.is_nan()))
    }

    /// Excludes gates above the echo top; empty columns are excluded in full.
    pub fn build(&self, corrected: ArrayView3<f64>) -> GateMask {
        let tops = self.top_gates(corrected);
        let mut mask = Array3::from_elem(corrected.raw_dim(), false);

        let mut empty = 0usize;
        for (mut column, top) in mask.lanes_mut(Axis(2)).into_iter().zip(tops.iter()) {
            match top {
                Some(top) => column.slice_mut(s![..*top]).fill(true),
                None => {
                    column.fill(true);
                    empty += 1;
                }
            }
        }

        self.logger.detail(&format!(
            "echo-top mask: {} of {} columns without echo",
            empty,
            tops.len()
        ));
        mask
    }
}

impl Default for EchoTopMasker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn gates_above_first_echo_are_excluded() {
        let mut corrected = Array3::from_elem((1, 2, 6), f64::NAN);
        corrected
            .slice_mut(s![0, 0, 2..5])
            .assign(&ndarray::arr1(&[20.0, 25.0, 30.0]));
        corrected.slice_mut(s![0, 1, ..]).fill(18.0);

        let masker = EchoTopMasker::new();
        let mask = masker.build(corrected.view());
        assert_eq!(
            mask.slice(s![0, 0, ..]).to_vec(),
            vec![true, true, false, false, false, false]
        );
        assert!(mask.slice(s![0, 1, ..]).iter().all(|excluded| !excluded));
    }

    #[test]
    fn empty_column_is_fully_excluded() {
        let corrected = Array3::from_elem((2, 1, 4), f64::NAN);
        let masker = EchoTopMasker::default();
        assert_eq!(masker.top_gates(corrected.view())[[1, 0]], None);
        assert!(masker.build(corrected.view()).iter().all(|excluded| *excluded));
    }
}

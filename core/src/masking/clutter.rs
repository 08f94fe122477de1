use crate::masking::GateMask;
use crate::prelude::{ensure_shape, SwathResult};
use crate::telemetry::log::LogManager;
use ndarray::{s, Array2, Array3, ArrayView2, Axis, Zip};

/// Ground-clutter mask built from the clutter-free-bottom bins of two channels.
pub struct ClutterMasker {
    gates: usize,
    logger: LogManager,
}

impl ClutterMasker {
    pub fn new(gates: usize) -> Self {
        Self {
            gates,
            logger: LogManager::new("clutter"),
        }
    }

    /// Picks the more conservative (smaller) clutter-free bin per column.
    ///
    /// Ties keep the first channel. A missing or negative bin on either
    /// channel yields `None`.
    pub fn select_bins(
        &self,
        first: ArrayView2<f64>,
        second: ArrayView2<f64>,
    ) -> SwathResult<Array2<Option<usize>>> {
        ensure_shape("binClutterFreeBottom", second.shape(), first.shape())?;
        Ok(Zip::from(first).and(second).map_collect(|&a, &b| {
            let bin = if b < a { b } else { a };
            if a.is_nan() || b.is_nan() || bin < 0.0 {
                None
            } else {
                Some(bin as usize)
            }
        }))
    }

    /// Excludes every gate at or below the selected clutter-free bin.
    pub fn build(&self, first: ArrayView2<f64>, second: ArrayView2<f64>) -> SwathResult<GateMask> {
        let bins = self.select_bins(first, second)?;
        let (along, cross) = bins.dim();
        let mut mask = Array3::from_elem((along, cross, self.gates), false);

        let mut degenerate = 0usize;
        for (mut column, bin) in mask.lanes_mut(Axis(2)).into_iter().zip(bins.iter()) {
            match bin {
                Some(bin) => {
                    let start = (*bin).min(self.gates);
                    column.slice_mut(s![start..]).fill(true);
                }
                None => {
                    column.fill(true);
                    degenerate += 1;
                }
            }
        }

        if degenerate > 0 {
            self.logger.note(&format!(
                "{} columns without a clutter-free bin were excluded",
                degenerate
            ));
        }
        self.logger
            .detail(&format!("clutter mask built for {}x{} columns", along, cross));
        Ok(mask)
    }
}

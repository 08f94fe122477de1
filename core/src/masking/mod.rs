pub mod cloudtop;
pub mod clutter;
pub mod echotop;

pub use cloudtop::{CloudTopMasker, CloudTopParams};
pub use clutter::ClutterMasker;
pub use echotop::EchoTopMasker;

use crate::prelude::{ensure_shape, SwathResult};
use ndarray::{Array3, ArrayD, ArrayView3, Zip};

/// Per-gate exclusion flags: `true` removes the gate.
pub type GateMask = Array3<bool>;

/// Marks excluded gates of a profile field as missing.
pub fn apply_exclusion(
    name: &str,
    values: &mut ArrayD<f64>,
    mask: ArrayView3<bool>,
) -> SwathResult<()> {
    ensure_shape(name, values.shape(), mask.shape())?;
    Zip::from(values.view_mut())
        .and(mask.into_dyn())
        .for_each(|value, &excluded| {
            if excluded {
                *value = f64::NAN;
            }
        });
    Ok(())
}

/// Values below the instrument floor become missing.
pub fn apply_floor(values: &mut ArrayD<f64>, floor: f64) {
    values.mapv_inplace(|v| if v >= floor { v } else { f64::NAN });
}

/// Gate excluded by either mask.
pub fn union(first: &GateMask, second: &GateMask) -> GateMask {
    Zip::from(first).and(second).map_collect(|&a, &b| a || b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, IxDyn};

    #[test]
    fn floor_turns_weak_and_missing_values_missing() {
        let mut values =
            ArrayD::from_shape_vec(IxDyn(&[4]), vec![11.9, 12.0, f64::NAN, 40.0]).unwrap();
        apply_floor(&mut values, 12.0);
        assert!(values[[0]].is_nan());
        assert_eq!(values[[1]], 12.0);
        assert!(values[[2]].is_nan());
        assert_eq!(values[[3]], 40.0);
    }

    #[test]
    fn exclusion_rejects_mismatched_shapes() {
        let mut values = ArrayD::zeros(IxDyn(&[1, 2, 3]));
        let mask = Array3::from_elem((1, 2, 4), false);
        assert!(apply_exclusion("NSKu", &mut values, mask.view()).is_err());
    }

    #[test]
    fn union_combines_both_masks() {
        let mut a = Array3::from_elem((1, 1, 3), false);
        let mut b = Array3::from_elem((1, 1, 3), false);
        a[[0, 0, 0]] = true;
        b[[0, 0, 2]] = true;
        let both = union(&a, &b);
        assert_eq!(
            both.iter().cloned().collect::<Vec<_>>(),
            vec![true, false, true]
        );
    }
}

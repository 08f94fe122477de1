use ndarray::{Array2, ArrayView2, Axis};

/// Separable Gaussian smoother with half-sample symmetric boundaries.
pub struct GaussianFilter {
    kernel: Vec<f64>,
    radius: usize,
}

impl GaussianFilter {
    /// Kernel truncated at four standard deviations.
    pub fn new(sigma: f64) -> Self {
        let sigma = sigma.max(f64::EPSILON);
        let radius = (4.0 * sigma + 0.5) as usize;
        let mut kernel: Vec<f64> = (0..=2 * radius)
            .map(|i| {
                let offset = i as f64 - radius as f64;
                (-0.5 * (offset / sigma).powi(2)).exp()
            })
            .collect();
        let total: f64 = kernel.iter().sum();
        kernel.iter_mut().for_each(|w| *w /= total);
        Self { kernel, radius }
    }

    pub fn apply(&self, input: ArrayView2<f64>) -> Array2<f64> {
        let rows = self.smooth_axis(input, Axis(0));
        self.smooth_axis(rows.view(), Axis(1))
    }

    fn smooth_axis(&self, input: ArrayView2<f64>, axis: Axis) -> Array2<f64> {
        let mut output = Array2::<f64>::zeros(input.raw_dim());
        for (lane_in, mut lane_out) in input
            .lanes(axis)
            .into_iter()
            .zip(output.lanes_mut(axis))
        {
            let len = lane_in.len();
            for idx in 0..len {
                lane_out[idx] = self
                    .kernel
                    .iter()
                    .enumerate()
                    .map(|(k, w)| {
                        let offset = idx as isize + k as isize - self.radius as isize;
                        w * lane_in[reflect(offset, len)]
                    })
                    .sum();
            }
        }
        output
    }
}

fn reflect(mut idx: isize, len: usize) -> usize {
    let len = len as isize;
    if len == 1 {
        return 0;
    }
    let period = 2 * len;
    idx = idx.rem_euclid(period);
    if idx >= len {
        idx = period - 1 - idx;
    }
    idx as usize
}

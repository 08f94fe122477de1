/// Piecewise-linear interpolant over a strictly ascending abscissa.
///
/// Values outside the sampled range are extrapolated along the first or last
/// segment.
#[derive(Debug, Clone)]
pub struct LinearInterpolator {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl LinearInterpolator {
    /// Builds the interpolant from unordered samples.
    ///
    /// Pairs with a missing coordinate or value are dropped and duplicated
    /// abscissae keep their first sample. Returns `None` when fewer than two
    /// distinct samples remain.
    pub fn new(xs: &[f64], ys: &[f64]) -> Option<Self> {
        let mut pairs: Vec<(f64, f64)> = xs
            .iter()
            .zip(ys)
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|(&x, &y)| (x, y))
            .collect();
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        pairs.dedup_by(|next, prev| next.0 == prev.0);

        if pairs.len() < 2 {
            return None;
        }
        let (xs, ys) = pairs.into_iter().unzip();
        Some(Self { xs, ys })
    }

    pub fn eval(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        let last = self.xs.len() - 1;
        let upper = match self.xs.partition_point(|&sample| sample < x) {
            0 => 1,
            idx if idx > last => last,
            idx => idx,
        };
        let lower = upper - 1;

        let (x0, x1) = (self.xs[lower], self.xs[upper]);
        let (y0, y1) = (self.ys[lower], self.ys[upper]);
        y0 + (x - x0) * (y1 - y0) / (x1 - x0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_inside_range() {
        let interp = LinearInterpolator::new(&[0.0, 1.0, 2.0], &[0.0, 10.0, 30.0]).unwrap();
        assert_eq!(interp.eval(0.5), 5.0);
        assert_eq!(interp.eval(1.5), 20.0);
        assert_eq!(interp.eval(2.0), 30.0);
    }

    #[test]
    fn extrapolates_with_boundary_trend() {
        let interp = LinearInterpolator::new(&[1.0, 2.0, 3.0], &[10.0, 20.0, 40.0]).unwrap();
        assert_eq!(interp.eval(0.0), 0.0);
        assert_eq!(interp.eval(4.0), 60.0);
    }

    #[test]
    fn sorts_descending_samples_and_drops_missing() {
        let interp =
            LinearInterpolator::new(&[3.0, f64::NAN, 2.0, 1.0], &[30.0, 5.0, 20.0, f64::NAN])
                .unwrap();
        assert_eq!(interp.eval(2.5), 25.0);
    }

    #[test]
    fn rejects_single_sample() {
        assert!(LinearInterpolator::new(&[1.0, 1.0], &[2.0, 3.0]).is_none());
        assert!(LinearInterpolator::new(&[1.0, f64::NAN], &[2.0, 3.0]).is_none());
    }
}

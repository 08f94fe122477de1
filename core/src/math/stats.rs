pub struct StatsHelper;

impl StatsHelper {
    /// Mean of the non-missing samples, `NaN` when there are none.
    pub fn nanmean(samples: &[f64]) -> f64 {
        let (sum, count) = samples
            .iter()
            .filter(|v| !v.is_nan())
            .fold((0.0, 0usize), |(sum, count), &v| (sum + v, count + 1));
        if count == 0 {
            f64::NAN
        } else {
            sum / count as f64
        }
    }

    /// Index of the sample closest to `target`, ignoring missing samples.
    pub fn nearest_index(samples: &[f64], target: f64) -> Option<usize> {
        samples
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nan())
            .min_by(|(_, a), (_, b)| {
                (*a - target)
                    .abs()
                    .partial_cmp(&(*b - target).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(idx, _)| idx)
    }

    pub fn valid_fraction<'a, I>(samples: I) -> f64
    where
        I: IntoIterator<Item = &'a f64>,
    {
        let (valid, total) = samples.into_iter().fold((0usize, 0usize), |(valid, total), v| {
            (valid + usize::from(!v.is_nan()), total + 1)
        });
        if total == 0 {
            0.0
        } else {
            valid as f64 / total as f64
        }
    }
}

use crate::prelude::{SwathError, SwathResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use ndarray::Array2;

/// Year value marking a scan without a valid time.
pub const MISSING_YEAR: i64 = -9999;

const SCAN_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp substituted for scans without a valid time.
pub fn placeholder() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Calendar components of each along-track scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanTimeParts {
    pub year: Vec<i64>,
    pub month: Vec<i64>,
    pub day: Vec<i64>,
    pub hour: Vec<i64>,
    pub minute: Vec<i64>,
    pub second: Vec<i64>,
}

impl ScanTimeParts {
    pub fn len(&self) -> usize {
        self.year.len()
    }

    pub fn is_empty(&self) -> bool {
        self.year.is_empty()
    }

    fn check_lengths(&self) -> SwathResult<()> {
        let n = self.year.len();
        let lengths = [
            self.month.len(),
            self.day.len(),
            self.hour.len(),
            self.minute.len(),
            self.second.len(),
        ];
        if lengths.iter().all(|&len| len == n) {
            Ok(())
        } else {
            Err(SwathError::InvalidScanTime(format!(
                "component lengths differ: year {} vs {:?}",
                n, lengths
            )))
        }
    }
}

/// Builds the zero-padded scan time string and parses it.
pub fn scan_timestamp(
    year: i64,
    month: i64,
    day: i64,
    hour: i64,
    minute: i64,
    second: i64,
) -> SwathResult<NaiveDateTime> {
    if year == MISSING_YEAR {
        return Ok(placeholder());
    }
    let text = format!(
        "{}-{:02}-{:02} {:02}:{:02}:{:02}",
        year, month, day, hour, minute, second
    );
    NaiveDateTime::parse_from_str(&text, SCAN_TIME_FORMAT)
        .map_err(|err| SwathError::InvalidScanTime(format!("'{}': {}", text, err)))
}

/// Per-scan timestamps broadcast across `cross` cross-track positions.
pub fn broadcast_scan_times(
    parts: &ScanTimeParts,
    cross: usize,
) -> SwathResult<Array2<NaiveDateTime>> {
    parts.check_lengths()?;
    let per_scan = (0..parts.len())
        .map(|i| {
            scan_timestamp(
                parts.year[i],
                parts.month[i],
                parts.day[i],
                parts.hour[i],
                parts.minute[i],
                parts.second[i],
            )
        })
        .collect::<SwathResult<Vec<_>>>()?;
    Ok(Array2::from_shape_fn((per_scan.len(), cross), |(scan, _)| {
        per_scan[scan]
    }))
}

/// UTC timestamp from epoch seconds; non-finite input maps to the placeholder.
pub fn from_epoch_seconds(seconds: f64) -> NaiveDateTime {
    if !seconds.is_finite() {
        return placeholder();
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::<Utc>::from_timestamp(whole as i64, nanos)
        .map(|stamp| stamp.naive_utc())
        .unwrap_or_else(placeholder)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(year: i64) -> ScanTimeParts {
        ScanTimeParts {
            year: vec![2020, year],
            month: vec![3, 12],
            day: vec![5, 31],
            hour: vec![1, 23],
            minute: vec![2, 59],
            second: vec![3, 58],
        }
    }

    #[test]
    fn literal_scan_time_is_parsed() {
        let stamp = scan_timestamp(2020, 3, 5, 1, 2, 3).unwrap();
        assert_eq!(stamp.to_string(), "2020-03-05 01:02:03");
        assert_eq!(
            stamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "2020-03-05T01:02:03"
        );
    }

    #[test]
    fn missing_year_maps_to_placeholder_for_whole_scan() {
        let times = broadcast_scan_times(&parts(MISSING_YEAR), 25).unwrap();
        assert_eq!(times.dim(), (2, 25));
        assert!(times.row(1).iter().all(|t| *t == placeholder()));
        assert_eq!(times[[0, 24]].to_string(), "2020-03-05 01:02:03");
        assert_eq!(placeholder().to_string(), "1970-01-01 00:00:00");
    }

    #[test]
    fn impossible_date_is_an_error() {
        assert!(matches!(
            scan_timestamp(2021, 2, 30, 0, 0, 0),
            Err(SwathError::InvalidScanTime(_))
        ));
        let mut uneven = parts(2020);
        uneven.second.pop();
        assert!(broadcast_scan_times(&uneven, 3).is_err());
    }

    #[test]
    fn epoch_seconds_convert_to_utc() {
        assert_eq!(
            from_epoch_seconds(1_449_878_400.5).to_string(),
            "2015-12-12 00:00:00.500"
        );
        assert_eq!(from_epoch_seconds(f64::NAN), placeholder());
    }
}

//! Bucket-folding aggregation over a raw log window.
//!
//! Grounded on `shc.log.generic.AbstractAggregator` and its
//! `aggregate()` driver: the raw log (including the value already in
//! effect at `start`) is folded into fixed-width buckets, carrying the
//! last known value forward across buckets that see no new sample.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use hbus_core::{Value, ValueKind};

use crate::backend::LogEntry;
use crate::error::{DatalogError, DatalogResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationMethod {
    Average,
    Minimum,
    Maximum,
    OnTime,
    OnTimeRatio,
}

impl AggregationMethod {
    fn name(self) -> &'static str {
        match self {
            AggregationMethod::Average => "AVERAGE",
            AggregationMethod::Minimum => "MINIMUM",
            AggregationMethod::Maximum => "MAXIMUM",
            AggregationMethod::OnTime => "ON_TIME",
            AggregationMethod::OnTimeRatio => "ON_TIME_RATIO",
        }
    }

    fn requires_numeric(self) -> bool {
        matches!(self, AggregationMethod::Average | AggregationMethod::Minimum | AggregationMethod::Maximum)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub value: f64,
}

/// A value span: `value` was in effect from `start` (inclusive) to `end`
/// (exclusive), already clipped to the requested `[start, end)` window.
struct Segment {
    value: Value,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// Fold `entries` (sorted ascending, ideally including the sample in
/// effect at `start`) into fixed-width buckets over `[start, end)`.
///
/// Validates `kind` against `method` before looking at a single entry, so
/// an AVERAGE/MINIMUM/MAXIMUM request against a non-numeric variable fails
/// immediately rather than partway through.
pub fn aggregate(
    kind: ValueKind,
    entries: &[LogEntry],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    interval: ChronoDuration,
    method: AggregationMethod,
) -> DatalogResult<Vec<AggregatedBucket>> {
    if method.requires_numeric() && !matches!(kind, ValueKind::Bool | ValueKind::Int | ValueKind::Float) {
        return Err(DatalogError::UnsupportedAggregation { method: method.name(), kind });
    }
    if interval <= ChronoDuration::zero() {
        return Err(DatalogError::Decode("aggregation interval must be positive".into()));
    }

    let segments = build_segments(entries, start, end);
    if segments.is_empty() {
        return Ok(Vec::new());
    }

    let mut buckets = Vec::new();
    let mut bucket_start = start;
    while bucket_start < end {
        let bucket_end = (bucket_start + interval).min(end);
        if let Some(value) = fold_bucket(&segments, bucket_start, bucket_end, method) {
            buckets.push(AggregatedBucket { start: bucket_start, end: bucket_end, value });
        }
        bucket_start = bucket_end;
    }
    Ok(buckets)
}

fn build_segments(entries: &[LogEntry], start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Segment> {
    let mut segments = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let raw_end = entries.get(i + 1).map_or(end, |next| next.ts);
        let seg_start = entry.ts.max(start);
        let seg_end = raw_end.min(end);
        if seg_start < seg_end {
            segments.push(Segment {
                value: entry.value.clone(),
                start: seg_start,
                end: seg_end,
            });
        }
    }
    segments
}

/// Returns `None` when no segment overlaps the bucket at all — i.e. the
/// bucket lies entirely before the first available sample, and must be
/// omitted rather than emitted with a made-up value.
fn fold_bucket(segments: &[Segment], bucket_start: DateTime<Utc>, bucket_end: DateTime<Utc>, method: AggregationMethod) -> Option<f64> {
    let overlaps: Vec<(&Value, ChronoDuration)> = segments
        .iter()
        .filter_map(|seg| {
            let overlap_start = seg.start.max(bucket_start);
            let overlap_end = seg.end.min(bucket_end);
            (overlap_start < overlap_end).then(|| (&seg.value, overlap_end - overlap_start))
        })
        .collect();

    if overlaps.is_empty() {
        return None;
    }

    let bucket_len = bucket_end - bucket_start;
    match method {
        AggregationMethod::Average => {
            let mut weighted_sum = 0.0;
            let mut total_weight = 0.0;
            for (value, duration) in &overlaps {
                let weight = duration.num_nanoseconds().unwrap_or(0) as f64;
                weighted_sum += value.as_numeric().unwrap_or(0.0) * weight;
                total_weight += weight;
            }
            Some(if total_weight > 0.0 { weighted_sum / total_weight } else { 0.0 })
        }
        AggregationMethod::Minimum => overlaps
            .iter()
            .filter_map(|(v, _)| v.as_numeric())
            .fold(None, |acc, n| Some(acc.map_or(n, |a: f64| a.min(n))))
            .or(Some(f64::NAN)),
        AggregationMethod::Maximum => overlaps
            .iter()
            .filter_map(|(v, _)| v.as_numeric())
            .fold(None, |acc, n| Some(acc.map_or(n, |a: f64| a.max(n))))
            .or(Some(f64::NAN)),
        AggregationMethod::OnTime => {
            let on_nanos: i64 = overlaps
                .iter()
                .filter(|(v, _)| v.is_truthy())
                .map(|(_, d)| d.num_nanoseconds().unwrap_or(0))
                .sum();
            Some(on_nanos as f64 / 1_000_000_000.0)
        }
        AggregationMethod::OnTimeRatio => {
            let on_nanos: i64 = overlaps
                .iter()
                .filter(|(v, _)| v.is_truthy())
                .map(|(_, d)| d.num_nanoseconds().unwrap_or(0))
                .sum();
            let bucket_nanos = bucket_len.num_nanoseconds().unwrap_or(1).max(1) as f64;
            Some((on_nanos as f64 / 1_000_000_000.0) / (bucket_nanos / 1_000_000_000.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).unwrap()
    }

    #[test]
    fn average_applied_to_str_is_rejected_before_iterating() {
        let err = aggregate(
            ValueKind::Str,
            &[LogEntry { ts: ts(0), value: Value::Str("x".into()) }],
            ts(0),
            ts(10),
            ChronoDuration::seconds(5),
            AggregationMethod::Average,
        )
        .unwrap_err();
        assert!(matches!(err, DatalogError::UnsupportedAggregation { .. }));
    }

    #[test]
    fn average_time_weights_across_a_bucket() {
        // value 0 for the first half of the bucket, value 10 for the second half.
        let entries = vec![
            LogEntry { ts: ts(0), value: Value::Int(0) },
            LogEntry { ts: ts(5), value: Value::Int(10) },
        ];
        let buckets = aggregate(ValueKind::Int, &entries, ts(0), ts(10), ChronoDuration::seconds(10), AggregationMethod::Average).unwrap();
        assert_eq!(buckets.len(), 1);
        assert!((buckets[0].value - 5.0).abs() < 1e-9);
    }

    #[test]
    fn leading_bucket_before_first_sample_is_omitted() {
        let entries = vec![LogEntry { ts: ts(15), value: Value::Int(1) }];
        let buckets = aggregate(ValueKind::Int, &entries, ts(0), ts(20), ChronoDuration::seconds(10), AggregationMethod::Average).unwrap();
        // [0,10) has no data at all and is omitted; [10,20) is half-covered by the sample at ts(15).
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].start, ts(10));
    }

    #[test]
    fn carried_forward_value_covers_a_bucket_with_no_new_sample() {
        let entries = vec![
            LogEntry { ts: ts(0), value: Value::Int(7) },
            LogEntry { ts: ts(25), value: Value::Int(9) },
        ];
        let buckets = aggregate(ValueKind::Int, &entries, ts(0), ts(30), ChronoDuration::seconds(10), AggregationMethod::Minimum).unwrap();
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[1].value, 7.0); // [10,20) sees only the carried-forward 7
    }

    #[test]
    fn on_time_ratio_is_fraction_of_bucket_length() {
        let entries = vec![
            LogEntry { ts: ts(0), value: Value::Bool(true) },
            LogEntry { ts: ts(3), value: Value::Bool(false) },
        ];
        let buckets = aggregate(ValueKind::Bool, &entries, ts(0), ts(10), ChronoDuration::seconds(10), AggregationMethod::OnTimeRatio).unwrap();
        assert_eq!(buckets.len(), 1);
        assert!((buckets[0].value - 0.3).abs() < 1e-9);
    }
}

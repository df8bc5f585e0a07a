//! Trend aggregation engine.
//!
//! Turns raw [`TrendSample`]s into daily [`TrendRecord`]s:
//!
//! 1. group by `(keyword, day)`; intra-day timestamps are dropped here
//! 2. aggregate each group into mean, max and count
//! 3. sort each keyword's days ascending and take the previous day's mean
//!    as `prev_avg` (never across keywords)
//! 4. `delta = (avg - prev) / prev`, `None` when there is no previous day
//!    or it averaged zero
//! 5. label with the strict [`RISING_THRESHOLD`] / [`FALLING_THRESHOLD`]
//!    boundaries
//! 6. index the records by keyword
//!
//! The transform is pure: the same samples always give the same records
//! in the same order (keyword ascending, then date ascending).

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::ValidationError;
use crate::models::{TrendLabel, TrendRecord, TrendSample};

/// A delta strictly above this is `rising`.
pub const RISING_THRESHOLD: f64 = 0.15;

/// A delta strictly below this is `falling`.
pub const FALLING_THRESHOLD: f64 = -0.15;

/// Aggregate of every sample for one keyword on one day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyAggregate {
    pub keyword: String,
    pub date: NaiveDate,
    pub avg_value: f64,
    pub peak_value: f64,
    pub sample_count: usize,
}

/// Per-keyword records, each sequence ordered by date ascending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrendIndex {
    by_keyword: HashMap<String, Vec<TrendRecord>>,
}

impl TrendIndex {
    /// Records for `keyword`, oldest first.
    pub fn get(&self, keyword: &str) -> Option<&[TrendRecord]> {
        self.by_keyword.get(keyword).map(Vec::as_slice)
    }

    /// Most recent record for `keyword`.
    pub fn latest(&self, keyword: &str) -> Option<&TrendRecord> {
        self.by_keyword.get(keyword).and_then(|records| records.last())
    }

    /// Keywords in ascending order.
    pub fn keywords(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.by_keyword.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.by_keyword.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_keyword.is_empty()
    }
}

impl Serialize for TrendIndex {
    /// Keys are emitted sorted so the serialized index is deterministic.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.by_keyword.len()))?;
        for keyword in self.keywords() {
            map.serialize_entry(keyword, &self.by_keyword[keyword])?;
        }
        map.end()
    }
}

/// Output of [`analyze`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendAnalysis {
    pub records: Vec<TrendRecord>,
    pub index: TrendIndex,
}

impl TrendAnalysis {
    /// Count of records per label, for summaries.
    pub fn label_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.label.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

fn validate_samples(samples: &[TrendSample]) -> Result<(), ValidationError> {
    for (index, sample) in samples.iter().enumerate() {
        if sample.keyword.trim().is_empty() {
            return Err(ValidationError::EmptyKeyword { index });
        }
        if !sample.value.is_finite() || sample.value < 0.0 {
            return Err(ValidationError::InvalidTrendValue {
                index,
                value: sample.value,
            });
        }
    }
    Ok(())
}

/// Group samples by `(keyword, day)` and aggregate each group.
///
/// Output is ordered by keyword, then date.
pub fn aggregate_daily(samples: &[TrendSample]) -> Result<Vec<DailyAggregate>, ValidationError> {
    validate_samples(samples)?;

    struct Acc {
        sum: f64,
        peak: f64,
        count: usize,
    }

    let mut groups: BTreeMap<(&str, NaiveDate), Acc> = BTreeMap::new();
    for sample in samples {
        let acc = groups
            .entry((sample.keyword.as_str(), sample.day()))
            .or_insert(Acc {
                sum: 0.0,
                peak: f64::NEG_INFINITY,
                count: 0,
            });
        acc.sum += sample.value;
        acc.peak = acc.peak.max(sample.value);
        acc.count += 1;
    }

    Ok(groups
        .into_iter()
        .map(|((keyword, date), acc)| DailyAggregate {
            keyword: keyword.to_string(),
            date,
            avg_value: acc.sum / acc.count as f64,
            peak_value: acc.peak,
            sample_count: acc.count,
        })
        .collect())
}

/// Relative change from `prev` to `current`.
///
/// `None` when there is no previous value or it is zero.
pub fn delta_between(prev: Option<f64>, current: f64) -> Option<f64> {
    match prev {
        Some(p) if p != 0.0 => Some((current - p) / p),
        _ => None,
    }
}

/// Direction label for a delta. Both thresholds are exclusive.
pub fn label_trend(delta: Option<f64>) -> TrendLabel {
    match delta {
        None => TrendLabel::New,
        Some(d) if d > RISING_THRESHOLD => TrendLabel::Rising,
        Some(d) if d < FALLING_THRESHOLD => TrendLabel::Falling,
        Some(_) => TrendLabel::Stable,
    }
}

/// Attach `prev_avg`, `delta` and `label` to aggregates.
///
/// `aggregates` must be ordered by keyword then date, as produced by
/// [`aggregate_daily`]; the previous value resets at each keyword change.
pub fn compute_deltas(aggregates: Vec<DailyAggregate>) -> Vec<TrendRecord> {
    let mut records = Vec::with_capacity(aggregates.len());
    let mut prev: Option<(String, f64)> = None;

    for agg in aggregates {
        let prev_avg = match &prev {
            Some((keyword, avg)) if *keyword == agg.keyword => Some(*avg),
            _ => None,
        };
        let delta = delta_between(prev_avg, agg.avg_value);
        prev = Some((agg.keyword.clone(), agg.avg_value));

        records.push(TrendRecord {
            keyword: agg.keyword,
            date: agg.date,
            avg_value: agg.avg_value,
            peak_value: agg.peak_value,
            sample_count: agg.sample_count,
            prev_avg,
            delta,
            label: label_trend(delta),
        });
    }

    records
}

/// Build the per-keyword index from ordered records.
pub fn build_index(records: &[TrendRecord]) -> TrendIndex {
    let mut by_keyword: HashMap<String, Vec<TrendRecord>> = HashMap::new();
    for record in records {
        by_keyword
            .entry(record.keyword.clone())
            .or_default()
            .push(record.clone());
    }
    TrendIndex { by_keyword }
}

/// Run the full aggregation over `samples`.
///
/// # Errors
///
/// [`ValidationError::EmptyKeyword`] or
/// [`ValidationError::InvalidTrendValue`] (negative, NaN or infinite) for
/// the first offending sample.
pub fn analyze(samples: &[TrendSample]) -> Result<TrendAnalysis, ValidationError> {
    let records = compute_deltas(aggregate_daily(samples)?);
    let index = build_index(&records);
    Ok(TrendAnalysis { records, index })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone, Utc};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn series(keyword: &str, values: &[f64]) -> Vec<TrendSample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| TrendSample::on(keyword, day(i as u32 + 1), v))
            .collect()
    }

    #[test]
    fn test_boundary_is_stable() {
        let analysis = analyze(&series("k", &[100.0, 115.0])).unwrap();
        let second = &analysis.records[1];
        assert_eq!(second.delta, Some(0.15));
        assert_eq!(second.label, TrendLabel::Stable);
    }

    #[test]
    fn test_just_above_boundary_is_rising() {
        let analysis = analyze(&series("k", &[100.0, 116.0])).unwrap();
        let second = &analysis.records[1];
        assert!((second.delta.unwrap() - 0.16).abs() < 1e-12);
        assert_eq!(second.label, TrendLabel::Rising);
    }

    #[test]
    fn test_falling_boundary() {
        assert_eq!(label_trend(Some(-0.15)), TrendLabel::Stable);
        assert_eq!(label_trend(Some(-0.150001)), TrendLabel::Falling);
        assert_eq!(label_trend(Some(0.0)), TrendLabel::Stable);
        assert_eq!(label_trend(None), TrendLabel::New);
    }

    #[test]
    fn test_drop_to_zero_and_zero_prev() {
        let analysis = analyze(&series("k", &[100.0, 0.0, 50.0])).unwrap();
        let r = &analysis.records;
        assert_eq!(r[0].delta, None);
        assert_eq!(r[0].label, TrendLabel::New);
        assert_eq!(r[1].delta, Some(-1.0));
        assert_eq!(r[1].label, TrendLabel::Falling);
        // Previous day averaged zero: no delta, treated as new.
        assert_eq!(r[2].prev_avg, Some(0.0));
        assert_eq!(r[2].delta, None);
        assert_eq!(r[2].label, TrendLabel::New);
    }

    #[test]
    fn test_two_day_scenario() {
        let samples = vec![
            TrendSample::on("a", day(1), 100.0),
            TrendSample::on("a", day(2), 130.0),
        ];
        let analysis = analyze(&samples).unwrap();
        let records = analysis.index.get("a").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].prev_avg, None);
        assert_eq!(records[0].label, TrendLabel::New);
        assert_eq!(records[1].prev_avg, Some(100.0));
        assert!((records[1].delta.unwrap() - 0.30).abs() < 1e-12);
        assert_eq!(records[1].label, TrendLabel::Rising);
    }

    #[test]
    fn test_no_cross_keyword_leakage() {
        let mut samples = series("a", &[100.0, 200.0]);
        samples.extend(series("b", &[10.0]));
        let analysis = analyze(&samples).unwrap();
        let b = analysis.index.get("b").unwrap();
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].prev_avg, None);
        assert_eq!(b[0].label, TrendLabel::New);
    }

    #[test]
    fn test_intra_day_samples_grouped() {
        let samples = vec![
            TrendSample::at("k", Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap(), 10.0),
            TrendSample::at("k", Utc.with_ymd_and_hms(2024, 1, 1, 21, 30, 0).unwrap(), 30.0),
            TrendSample::at("k", Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap(), 20.0),
        ];
        let aggregates = aggregate_daily(&samples).unwrap();
        assert_eq!(aggregates.len(), 2);
        assert_eq!(aggregates[0].date, day(1));
        assert_eq!(aggregates[0].avg_value, 20.0);
        assert_eq!(aggregates[0].peak_value, 30.0);
        assert_eq!(aggregates[0].sample_count, 2);
        assert_eq!(aggregates[1].sample_count, 1);
    }

    #[test]
    fn test_offset_timestamp_grouped_by_written_date() {
        let seoul = FixedOffset::east_opt(9 * 3600).unwrap();
        let samples = vec![
            TrendSample::at("k", seoul.with_ymd_and_hms(2024, 1, 2, 1, 0, 0).unwrap(), 10.0),
            TrendSample::on("k", day(2), 30.0),
        ];
        let analysis = analyze(&samples).unwrap();
        assert_eq!(analysis.records.len(), 1);
        assert_eq!(analysis.records[0].date, day(2));
        assert_eq!(analysis.records[0].sample_count, 2);
    }

    #[test]
    fn test_unsorted_input_sorted_by_date() {
        let samples = vec![
            TrendSample::on("k", day(3), 3.0),
            TrendSample::on("k", day(1), 1.0),
            TrendSample::on("k", day(2), 2.0),
        ];
        let analysis = analyze(&samples).unwrap();
        let dates: Vec<NaiveDate> = analysis.records.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(1), day(2), day(3)]);
        assert_eq!(analysis.records[1].prev_avg, Some(1.0));
    }

    #[test]
    fn test_deterministic() {
        let mut samples = series("x", &[5.0, 6.0, 9.0]);
        samples.extend(series("y", &[1.0, 1.0]));
        let a = analyze(&samples).unwrap();
        samples.reverse();
        let b = analyze(&samples).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a.index).unwrap(),
            serde_json::to_string(&b.index).unwrap()
        );
    }

    #[test]
    fn test_index_serializes_sorted() {
        let mut samples = series("zeta", &[1.0]);
        samples.extend(series("alpha", &[1.0]));
        let analysis = analyze(&samples).unwrap();
        let json = serde_json::to_string(&analysis.index).unwrap();
        assert!(json.find("alpha").unwrap() < json.find("zeta").unwrap());
        assert_eq!(analysis.index.keywords(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_rejects_invalid_samples() {
        let negative = vec![TrendSample::on("k", day(1), -1.0)];
        assert!(matches!(
            analyze(&negative),
            Err(ValidationError::InvalidTrendValue { index: 0, .. })
        ));

        let blank = vec![TrendSample::on("k", day(1), 1.0), TrendSample::on(" ", day(1), 1.0)];
        assert_eq!(
            analyze(&blank).unwrap_err(),
            ValidationError::EmptyKeyword { index: 1 }
        );
    }

    #[test]
    fn test_empty_input() {
        let analysis = analyze(&[]).unwrap();
        assert!(analysis.records.is_empty());
        assert!(analysis.index.is_empty());
    }

    #[test]
    fn test_label_counts() {
        let analysis = analyze(&series("k", &[100.0, 200.0, 200.0])).unwrap();
        let counts = analysis.label_counts();
        assert_eq!(counts["new"], 1);
        assert_eq!(counts["rising"], 1);
        assert_eq!(counts["stable"], 1);
    }
}

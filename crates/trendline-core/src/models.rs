//! Core data models used throughout Trendline.
//!
//! These types represent the collected items, trend samples, derived trend
//! records, and pipeline run records that flow between the collectors, the
//! pure subsystems, and the run store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::identity::{item_identity, ContentHash};

/// Where an [`Item`] was collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    News,
    Trend,
    Image,
    Social,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::News => "news",
            Source::Trend => "trend",
            Source::Image => "image",
            Source::Social => "social",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = ValidationError;

    /// Accepts the canonical names plus the collector directory aliases
    /// (`google_trends`, `pinterest`, `instagram`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "news" | "rss" => Ok(Source::News),
            "trend" | "trends" | "google_trends" => Ok(Source::Trend),
            "image" | "images" => Ok(Source::Image),
            "social" | "pinterest" | "instagram" => Ok(Source::Social),
            _ => Err(ValidationError::UnknownSource(s.to_string())),
        }
    }
}

/// A single collected unit.
///
/// Identity is derived from the content via [`Item::identity`], never
/// assigned by a collector. Preprocessing may rewrite the text fields and
/// fill in `language`; after the embedding stage the item is not mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub source: Source,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    pub collected_at: DateTime<Utc>,
    #[serde(default)]
    pub language: Option<String>,
}

impl Item {
    /// An item with only a source and a collection timestamp.
    pub fn new(source: Source, collected_at: DateTime<Utc>) -> Self {
        Self {
            source,
            url: None,
            title: String::new(),
            summary: String::new(),
            content: String::new(),
            published_at: None,
            collected_at,
            language: None,
        }
    }

    /// Stable identity digest over `source`, `url`, title prefix, and
    /// publication time.
    pub fn identity(&self) -> ContentHash {
        let published = self.published_at.map(format_timestamp);
        item_identity(
            self.source.as_str(),
            self.url.as_deref().unwrap_or(""),
            &self.title,
            published.as_deref(),
        )
    }

    /// The non-empty text fields joined by a single space.
    ///
    /// This is the text used for the content dedup key, for language
    /// detection, and as embedding input.
    pub fn joined_text(&self) -> String {
        [&self.title, &self.summary, &self.content]
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A raw trend observation: one value for one keyword at one instant.
///
/// Deserializes from `{"keyword": .., "date": .., "value": ..}` where
/// `date` is either `YYYY-MM-DD` or a full timestamp. The offset written in
/// the timestamp is kept, so the day bucket is the calendar date as written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSample {
    pub keyword: String,
    #[serde(rename = "date", deserialize_with = "deserialize_offset_timestamp")]
    pub observed_at: DateTime<FixedOffset>,
    pub value: f64,
}

impl TrendSample {
    /// A sample observed at midnight UTC of `date`.
    pub fn on(keyword: &str, date: NaiveDate, value: f64) -> Self {
        Self {
            keyword: keyword.to_string(),
            observed_at: date.and_time(chrono::NaiveTime::MIN).and_utc().fixed_offset(),
            value,
        }
    }

    /// A sample observed at an exact instant.
    pub fn at(keyword: &str, observed_at: impl Into<DateTime<FixedOffset>>, value: f64) -> Self {
        Self {
            keyword: keyword.to_string(),
            observed_at: observed_at.into(),
            value,
        }
    }

    /// Day-level bucket of this sample, in the sample's own offset.
    pub fn day(&self) -> NaiveDate {
        self.observed_at.date_naive()
    }
}

/// Directional label attached to a [`TrendRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendLabel {
    New,
    Rising,
    Stable,
    Falling,
}

impl TrendLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendLabel::New => "new",
            TrendLabel::Rising => "rising",
            TrendLabel::Stable => "stable",
            TrendLabel::Falling => "falling",
        }
    }
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Daily aggregate for one keyword, with its change against the previous
/// observed day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRecord {
    pub keyword: String,
    pub date: NaiveDate,
    pub avg_value: f64,
    pub peak_value: f64,
    pub sample_count: usize,
    pub prev_avg: Option<f64>,
    pub delta: Option<f64>,
    pub label: TrendLabel,
}

/// Lifecycle state of a [`PipelineRun`].
///
/// `pending` is implicit: a run has no record until it is `running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(RunStatus::Running),
            "success" => Some(RunStatus::Success),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One end-to-end execution of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: String,
    pub run_date: NaiveDate,
    pub version: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub error_trace: Option<String>,
    pub failed_stage: Option<String>,
}

impl PipelineRun {
    /// A fresh `running` record with a newly allocated run id.
    pub fn start(version: &str, now: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            run_date: now.date_naive(),
            version: version.to_string(),
            status: RunStatus::Running,
            started_at: now,
            finished_at: None,
            error_message: None,
            error_trace: None,
            failed_stage: None,
        }
    }

    /// Apply a terminal transition to this record.
    pub fn apply(&mut self, completion: &RunCompletion) {
        self.status = completion.status;
        self.finished_at = Some(completion.finished_at);
        self.error_message = completion.error_message.clone();
        self.error_trace = completion.error_trace.clone();
        self.failed_stage = completion.failed_stage.clone();
    }
}

/// The single write that moves a run into a terminal state.
#[derive(Debug, Clone, PartialEq)]
pub struct RunCompletion {
    pub status: RunStatus,
    pub finished_at: DateTime<Utc>,
    pub error_message: Option<String>,
    pub error_trace: Option<String>,
    pub failed_stage: Option<String>,
}

impl RunCompletion {
    pub fn success(finished_at: DateTime<Utc>) -> Self {
        Self {
            status: RunStatus::Success,
            finished_at,
            error_message: None,
            error_trace: None,
            failed_stage: None,
        }
    }

    pub fn failure(
        finished_at: DateTime<Utc>,
        message: String,
        trace: String,
        stage: Option<String>,
    ) -> Self {
        Self {
            status: RunStatus::Failed,
            finished_at,
            error_message: Some(message),
            error_trace: Some(trace),
            failed_stage: stage,
        }
    }
}

/// Format a timestamp the way identity hashes see it (RFC 3339, seconds, `Z`).
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Parse the timestamp shapes collectors and trend feeds emit.
///
/// Accepts RFC 3339, RFC 2822 (RSS `pubDate`), naive `YYYY-MM-DDTHH:MM:SS`
/// or `YYYY-MM-DD HH:MM:SS` (taken as UTC), and bare `YYYY-MM-DD`
/// (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    parse_offset_timestamp(raw).map(|dt| dt.with_timezone(&Utc))
}

/// [`parse_timestamp`], keeping the offset written in `raw`.
pub fn parse_offset_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ndt.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc().fixed_offset())
}

fn deserialize_offset_timestamp<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_offset_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid date: '{}'", raw)))
}

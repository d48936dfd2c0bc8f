//! Name-similarity and trust-signal checks for package confusion
//!
//! A model is suspected of impersonating a popular model when its name is a
//! near-duplicate of a popular name, it is not itself popular, and its
//! metadata looks untrustworthy. All functions here are pure; fetching the
//! popular names is the service layer's job.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use similar::TextDiff;

use crate::error::{RegistryError, Result};
use crate::types::Metadata;

/// Character-level similarity in [0, 1], ignoring case.
///
/// Computed as `2 * matches / total_chars` over the character diff of the two
/// names, the same ratio a sequence matcher reports.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    f64::from(TextDiff::from_chars(a.as_str(), b.as_str()).ratio())
}

/// True iff `name` equals one of the popular names, ignoring case
pub fn is_canonical<S: AsRef<str>>(name: &str, popular_names: &[S]) -> bool {
    let name = name.to_lowercase();
    popular_names
        .iter()
        .any(|p| p.as_ref().to_lowercase() == name)
}

/// Popular name most similar to `name`, with its ratio
pub fn best_match<'a, S: AsRef<str>>(name: &str, popular_names: &'a [S]) -> Option<(&'a str, f64)> {
    popular_names
        .iter()
        .map(|p| (p.as_ref(), similarity_ratio(name, p.as_ref())))
        .fold(None, |best, (candidate, ratio)| match best {
            Some((_, best_ratio)) if best_ratio >= ratio => best,
            _ => Some((candidate, ratio)),
        })
}

/// Popularity and age signals read from artifact metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrustSignals {
    pub downloads: Option<u64>,
    pub likes: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
}

impl TrustSignals {
    /// Read `downloads`, `likes` and `created_at` from metadata.
    ///
    /// Missing or unparseable values are left as `None`.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            downloads: metadata.get("downloads").and_then(count_value),
            likes: metadata.get("likes").and_then(count_value),
            created_at: metadata
                .get("created_at")
                .and_then(Value::as_str)
                .and_then(|s| parse_timestamp(s).ok()),
        }
    }

    /// Whole days since creation, at least 1
    pub fn age_days(&self, now: DateTime<Utc>) -> Option<i64> {
        self.created_at
            .map(|created| (now - created).num_days().max(1))
    }
}

fn count_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse an ISO 8601 timestamp; a trailing `Z` or offset is honoured and
/// naive timestamps are taken as UTC
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(RegistryError::ValidationError(
            "Missing created_at timestamp".to_string(),
        ));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(RegistryError::ValidationError(format!(
        "Invalid timestamp: {}",
        raw
    )))
}

/// A download count reached within a short time after creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadBurst {
    pub within_days: i64,
    pub min_downloads: u64,
}

/// Thresholds for the confusion check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfusionPolicy {
    /// Ratio a name must exceed to count as a near-duplicate
    pub similarity_threshold: f64,
    /// Artifacts younger than this count as low-trust
    pub young_age_days: i64,
    /// Download count of an established artifact
    pub canonical_downloads: u64,
    /// Like count of an established artifact
    pub canonical_likes: u64,
    /// Bursts that look like inflated downloads
    pub anomalous_download_windows: Vec<DownloadBurst>,
}

impl Default for ConfusionPolicy {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            young_age_days: 30,
            canonical_downloads: 1_000_000,
            canonical_likes: 1_000,
            anomalous_download_windows: vec![
                DownloadBurst { within_days: 3, min_downloads: 100 },
                DownloadBurst { within_days: 7, min_downloads: 300 },
                DownloadBurst { within_days: 30, min_downloads: 1_000 },
            ],
        }
    }
}

/// Outcome of a confusion check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionAssessment {
    pub canonical: bool,
    /// Most similar popular name, if any were supplied
    pub best_match: Option<String>,
    pub similarity: f64,
    pub low_trust: bool,
    pub suspected: bool,
}

impl ConfusionPolicy {
    /// Validate thresholds
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(RegistryError::ValidationError(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.young_age_days < 0 {
            return Err(RegistryError::ValidationError(
                "young_age_days cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the signals indicate a low-trust artifact
    pub fn is_low_trust(&self, signals: &TrustSignals, now: DateTime<Utc>) -> bool {
        let age = signals.age_days(now);
        let young = age.is_some_and(|days| days <= self.young_age_days);

        let unpopular = signals.downloads.unwrap_or(0) < self.canonical_downloads
            && signals.likes.unwrap_or(0) < self.canonical_likes;

        let burst = match (age, signals.downloads) {
            (Some(days), Some(downloads)) => self
                .anomalous_download_windows
                .iter()
                .any(|w| days <= w.within_days && downloads >= w.min_downloads),
            _ => false,
        };

        young || unpopular || burst
    }

    /// Assess `name` against the popular names at the current time
    pub fn assess<S: AsRef<str>>(
        &self,
        name: &str,
        signals: &TrustSignals,
        popular_names: &[S],
    ) -> ConfusionAssessment {
        self.assess_at(name, signals, popular_names, Utc::now())
    }

    /// Assess `name` against the popular names at a given time
    pub fn assess_at<S: AsRef<str>>(
        &self,
        name: &str,
        signals: &TrustSignals,
        popular_names: &[S],
        now: DateTime<Utc>,
    ) -> ConfusionAssessment {
        let canonical = is_canonical(name, popular_names);
        let (best, similarity) = match best_match(name, popular_names) {
            Some((n, r)) => (Some(n.to_string()), r),
            None => (None, 0.0),
        };
        let low_trust = self.is_low_trust(signals, now);
        let suspected = !canonical && similarity > self.similarity_threshold && low_trust;

        ConfusionAssessment {
            canonical,
            best_match: best,
            similarity,
            low_trust,
            suspected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn popular() -> Vec<String> {
        vec![
            "bert-base-uncased".to_string(),
            "gpt2".to_string(),
            "openai/whisper-large".to_string(),
        ]
    }

    fn metadata(value: serde_json::Value) -> Metadata {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_similarity_ratio() {
        assert_eq!(similarity_ratio("gpt2", "GPT2"), 1.0);
        assert_eq!(similarity_ratio("", ""), 1.0);
        assert_eq!(similarity_ratio("abc", ""), 0.0);
        // "abcd" vs "abce": 3 matches over 8 chars
        assert!((similarity_ratio("abcd", "abce") - 0.75).abs() < 1e-6);
        assert!(similarity_ratio("bert-base-uncased", "bert-base-uncased1") > 0.9);
        assert!(similarity_ratio("resnet50", "gpt2") < 0.5);
    }

    #[test]
    fn test_canonical_ignores_unicode_case() {
        let names = ["Ünïcode-Modèl"];
        assert_eq!(similarity_ratio("ünïcode-modèl", names[0]), 1.0);
        assert!(is_canonical("ÜNÏCODE-MODÈL", &names));
        assert!(is_canonical("ünïcode-modèl", &names));
        assert!(!is_canonical("ünïcode-modèl2", &names));
    }

    #[test]
    fn test_best_match() {
        let names = popular();
        let (name, ratio) = best_match("bert-base-uncasd", &names).unwrap();
        assert_eq!(name, "bert-base-uncased");
        assert!(ratio > 0.9);
        assert!(best_match::<String>("x", &[]).is_none());
    }

    #[test]
    fn test_timestamp_parsing() {
        let z = parse_timestamp("2024-03-01T12:00:00Z").unwrap();
        let naive = parse_timestamp("2024-03-01T12:00:00").unwrap();
        assert_eq!(z, naive);
        let offset = parse_timestamp("2024-03-01T14:00:00+02:00").unwrap();
        assert_eq!(z, offset);
        assert!(parse_timestamp("2024-03-01").is_ok());
        assert!(parse_timestamp("yesterday").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn test_trust_signals_from_metadata() {
        let signals = TrustSignals::from_metadata(&metadata(json!({
            "downloads": 42,
            "likes": "7",
            "created_at": "2024-01-01T00:00:00Z"
        })));
        assert_eq!(signals.downloads, Some(42));
        assert_eq!(signals.likes, Some(7));
        assert!(signals.created_at.is_some());

        let empty = TrustSignals::from_metadata(&Metadata::new());
        assert_eq!(empty, TrustSignals::default());
    }

    #[test]
    fn test_age_is_at_least_one_day() {
        let now = Utc::now();
        let signals = TrustSignals {
            created_at: Some(now - Duration::hours(2)),
            ..Default::default()
        };
        assert_eq!(signals.age_days(now), Some(1));
    }

    #[test]
    fn test_canonical_is_never_suspected() {
        let policy = ConfusionPolicy::default();
        let now = Utc::now();
        let fresh = TrustSignals {
            downloads: Some(0),
            likes: Some(0),
            created_at: Some(now - Duration::days(1)),
        };
        let result = policy.assess_at("GPT2", &fresh, &popular(), now);
        assert!(result.canonical);
        assert!(result.low_trust);
        assert!(!result.suspected);
    }

    #[test]
    fn test_lookalike_with_low_trust_is_suspected() {
        let policy = ConfusionPolicy::default();
        let now = Utc::now();
        let signals = TrustSignals {
            downloads: Some(12),
            likes: Some(0),
            created_at: Some(now - Duration::days(2)),
        };
        let result = policy.assess_at("bert-base-uncased-v2", &signals, &popular(), now);
        assert_eq!(result.best_match.as_deref(), Some("bert-base-uncased"));
        assert!(result.similarity > 0.8);
        assert!(result.suspected);
    }

    #[test]
    fn test_established_lookalike_is_not_suspected() {
        let policy = ConfusionPolicy::default();
        let now = Utc::now();
        let signals = TrustSignals {
            downloads: Some(5_000_000),
            likes: Some(20),
            created_at: Some(now - Duration::days(900)),
        };
        let result = policy.assess_at("bert-base-uncased-v2", &signals, &popular(), now);
        assert!(!result.low_trust);
        assert!(!result.suspected);
    }

    #[test]
    fn test_dissimilar_name_is_not_suspected() {
        let policy = ConfusionPolicy::default();
        let result = policy.assess("my-tiny-classifier", &TrustSignals::default(), &popular());
        assert!(result.low_trust);
        assert!(!result.suspected);
    }

    #[test]
    fn test_download_burst_is_low_trust() {
        let policy = ConfusionPolicy {
            young_age_days: 0,
            canonical_downloads: 0,
            canonical_likes: 0,
            ..Default::default()
        };
        let now = Utc::now();
        let burst = TrustSignals {
            downloads: Some(350),
            likes: None,
            created_at: Some(now - Duration::days(6)),
        };
        assert!(policy.is_low_trust(&burst, now));

        let steady = TrustSignals {
            downloads: Some(350),
            likes: None,
            created_at: Some(now - Duration::days(60)),
        };
        assert!(!policy.is_low_trust(&steady, now));
    }

    #[test]
    fn test_policy_validation() {
        assert!(ConfusionPolicy::default().validate().is_ok());
        let bad = ConfusionPolicy {
            similarity_threshold: 1.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}

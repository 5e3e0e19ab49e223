use crate::errors::{CategorizedError, ErrorCategory, Severity};
use crate::rating::Badge;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Whether a probe counts toward the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    #[default]
    Gating,
    /// Outcome is reported as an advisory but never moves the success rate.
    Informational,
}

/// Static description of one probe. Built once per suite, never mutated.
#[derive(Debug, Clone)]
pub struct ProbeSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub timeout: Duration,
    pub kind: ProbeKind,
}

impl ProbeSpec {
    pub const fn gating(
        id: &'static str,
        name: &'static str,
        description: &'static str,
        timeout: Duration,
    ) -> Self {
        Self {
            id,
            name,
            description,
            timeout,
            kind: ProbeKind::Gating,
        }
    }

    pub const fn informational(
        id: &'static str,
        name: &'static str,
        description: &'static str,
        timeout: Duration,
    ) -> Self {
        Self {
            id,
            name,
            description,
            timeout,
            kind: ProbeKind::Informational,
        }
    }

    pub fn is_informational(&self) -> bool {
        self.kind == ProbeKind::Informational
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub probe_id: String,
    pub probe_name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub informational: bool,
}

impl ProbeResult {
    pub fn pass(spec: &ProbeSpec, latency_ms: u64) -> Self {
        Self {
            probe_id: spec.id.to_string(),
            probe_name: spec.name.to_string(),
            passed: true,
            error: None,
            error_category: None,
            latency_ms,
            metadata: None,
            informational: spec.is_informational(),
        }
    }

    pub fn fail(spec: &ProbeSpec, error: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            probe_id: spec.id.to_string(),
            probe_name: spec.name.to_string(),
            passed: false,
            error: Some(error.into()),
            error_category: None,
            latency_ms,
            metadata: None,
            informational: spec.is_informational(),
        }
    }

    /// Pass or fail on `ok`; `error` is only recorded on failure.
    pub fn check(spec: &ProbeSpec, ok: bool, error: &str, latency_ms: u64) -> Self {
        if ok {
            Self::pass(spec, latency_ms)
        } else {
            Self::fail(spec, error, latency_ms)
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Retry bookkeeping for one probe in one certification run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeAttemptMetrics {
    pub probe_id: String,
    pub attempts: u32,
    pub retries: u32,
    pub errors: Vec<String>,
    pub latency_ms: u64,
    pub total_duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Running,
    Passed,
    Failed,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Running => "running",
            ProbeStatus::Passed => "passed",
            ProbeStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificationStatus {
    #[default]
    Untested,
    Certified,
    QualityWarning,
    Failed,
}

impl CertificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificationStatus::Untested => "untested",
            CertificationStatus::Certified => "certified",
            CertificationStatus::QualityWarning => "quality_warning",
            CertificationStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "certified" => CertificationStatus::Certified,
            "quality_warning" => CertificationStatus::QualityWarning,
            "failed" => CertificationStatus::Failed,
            _ => CertificationStatus::Untested,
        }
    }

    /// CERTIFIED and QUALITY_WARNING models can still serve traffic.
    pub fn is_available(&self) -> bool {
        matches!(
            self,
            CertificationStatus::Certified | CertificationStatus::QualityWarning
        )
    }
}

impl fmt::Display for CertificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub probe_id: String,
    pub probe_name: String,
    pub error: String,
}

/// Persisted verdict, one per (model_id, region).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificationRecord {
    pub model_id: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    pub status: CertificationStatus,
    pub tests_passed: u32,
    pub tests_failed: u32,
    pub success_rate: f64,
    pub avg_latency_ms: u64,
    pub last_error: Option<String>,
    pub error_category: Option<ErrorCategory>,
    pub error_severity: Option<Severity>,
    pub last_tested_at: DateTime<Utc>,
    pub certified_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failure_reasons: Vec<FailureReason>,
    #[serde(default)]
    pub failed_probes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<Badge>,
}

impl CertificationRecord {
    /// True only when an expiry is set and still ahead of `now`.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(exp) if exp > now)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(exp) if exp <= now)
    }
}

/// Credentials for one provider account. Upstream owns encryption.
#[derive(Clone)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

impl Credentials {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: region.into(),
        }
    }

    /// Provider clients accept `ACCESS_KEY:SECRET_KEY`.
    pub fn api_key(&self) -> String {
        format!("{}:{}", self.access_key, self.secret_key)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CertificationResult {
    pub model_id: String,
    pub region: String,
    pub status: CertificationStatus,
    pub tests_passed: u32,
    pub tests_failed: u32,
    pub success_rate: f64,
    pub avg_latency_ms: u64,
    pub is_certified: bool,
    pub is_available: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub quality_issues: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub advisories: Vec<String>,
    pub results: Vec<ProbeResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<ProbeAttemptMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categorized_error: Option<CategorizedError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<Badge>,
    pub from_cache: bool,
}

impl CertificationResult {
    /// Placeholder for a model whose run could not complete in a batch.
    pub fn failed_placeholder(model_id: &str, region: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            region: region.to_string(),
            status: CertificationStatus::Failed,
            tests_passed: 0,
            tests_failed: 0,
            success_rate: 0.0,
            avg_latency_ms: 0,
            is_certified: false,
            is_available: false,
            quality_issues: Vec::new(),
            advisories: Vec::new(),
            results: Vec::new(),
            metrics: Vec::new(),
            categorized_error: None,
            overall_severity: None,
            rating: None,
            badge: None,
            from_cache: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn status_roundtrips_through_str() {
        for s in [
            CertificationStatus::Untested,
            CertificationStatus::Certified,
            CertificationStatus::QualityWarning,
            CertificationStatus::Failed,
        ] {
            assert_eq!(CertificationStatus::parse(s.as_str()), s);
        }
        assert_eq!(
            CertificationStatus::parse("garbage"),
            CertificationStatus::Untested
        );
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let creds = Credentials::new("AKIA", "s3cr3t", "us-east-1");
        let dbg = format!("{:?}", creds);
        assert!(!dbg.contains("s3cr3t"));
        assert_eq!(creds.api_key(), "AKIA:s3cr3t");
    }

    #[test]
    fn null_expiry_is_never_fresh() {
        let now = Utc::now();
        let mut rec = CertificationRecord {
            model_id: "m".into(),
            region: "r".into(),
            vendor: None,
            status: CertificationStatus::Failed,
            tests_passed: 0,
            tests_failed: 1,
            success_rate: 0.0,
            avg_latency_ms: 0,
            last_error: None,
            error_category: None,
            error_severity: None,
            last_tested_at: now,
            certified_at: None,
            expires_at: None,
            failure_reasons: vec![],
            failed_probes: vec![],
            rating: None,
            badge: None,
        };
        assert!(!rec.is_fresh_at(now));
        assert!(!rec.is_expired_at(now));

        rec.expires_at = Some(now + ChronoDuration::days(1));
        assert!(rec.is_fresh_at(now));
        assert!(rec.is_expired_at(now + ChronoDuration::days(2)));
    }
}

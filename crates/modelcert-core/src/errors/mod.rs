// errors - error taxonomy for certification runs
//
// Raw provider error text is mapped onto a fixed set of categories. Each
// category carries a severity, a retry policy and operator-facing advice.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub mod categories;
pub mod matchers;
pub mod registry;

pub use matchers::{Matcher, PatternMatcher, TokenMatcher};
pub use registry::{CategoryDef, CategoryRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Unavailable,
    PermissionError,
    AuthenticationError,
    ConfigurationError,
    ProvisioningRequired,
    RateLimit,
    Timeout,
    QualityIssue,
    NetworkError,
    Unknown,
}

impl ErrorCategory {
    /// Categories that force FAILED whatever the success rate.
    pub const BLOCKING: [ErrorCategory; 5] = [
        ErrorCategory::Unavailable,
        ErrorCategory::PermissionError,
        ErrorCategory::AuthenticationError,
        ErrorCategory::ConfigurationError,
        ErrorCategory::ProvisioningRequired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Unavailable => "UNAVAILABLE",
            ErrorCategory::PermissionError => "PERMISSION_ERROR",
            ErrorCategory::AuthenticationError => "AUTHENTICATION_ERROR",
            ErrorCategory::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorCategory::ProvisioningRequired => "PROVISIONING_REQUIRED",
            ErrorCategory::RateLimit => "RATE_LIMIT",
            ErrorCategory::Timeout => "TIMEOUT",
            ErrorCategory::QualityIssue => "QUALITY_ISSUE",
            ErrorCategory::NetworkError => "NETWORK_ERROR",
            ErrorCategory::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let c = match s {
            "UNAVAILABLE" => ErrorCategory::Unavailable,
            "PERMISSION_ERROR" => ErrorCategory::PermissionError,
            "AUTHENTICATION_ERROR" => ErrorCategory::AuthenticationError,
            "CONFIGURATION_ERROR" => ErrorCategory::ConfigurationError,
            "PROVISIONING_REQUIRED" => ErrorCategory::ProvisioningRequired,
            "RATE_LIMIT" => ErrorCategory::RateLimit,
            "TIMEOUT" => ErrorCategory::Timeout,
            "QUALITY_ISSUE" => ErrorCategory::QualityIssue,
            "NETWORK_ERROR" => ErrorCategory::NetworkError,
            "UNKNOWN" | "UNKNOWN_ERROR" => ErrorCategory::Unknown,
            _ => return None,
        };
        Some(c)
    }

    pub fn is_blocking(&self) -> bool {
        Self::BLOCKING.contains(self)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CRITICAL" => Some(Severity::Critical),
            "HIGH" => Some(Severity::High),
            "MEDIUM" => Some(Severity::Medium),
            "LOW" => Some(Severity::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-category retry budget. `max_retries == 0` disables retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    pub const NONE: RetryPolicy = RetryPolicy {
        max_retries: 0,
        base_delay_ms: 0,
    };

    pub const fn new(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
        }
    }

    /// `attempt` is the number of retries already spent (0-indexed).
    pub fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Exponential backoff: `base_delay_ms * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// Raw error text run through the registry. Only category and severity are persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedError {
    pub category: ErrorCategory,
    pub severity: Severity,
    pub message: String,
    pub original_error: String,
    pub suggested_actions: Vec<String>,
    pub is_temporary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let p = RetryPolicy::new(3, 2000);
        assert_eq!(p.delay_for(0), Duration::from_millis(2000));
        assert_eq!(p.delay_for(1), Duration::from_millis(4000));
        assert_eq!(p.delay_for(2), Duration::from_millis(8000));
        assert!(p.allows(2));
        assert!(!p.allows(3));
    }

    #[test]
    fn huge_attempt_saturates() {
        let p = RetryPolicy::new(1, 1000);
        assert_eq!(p.delay_for(200), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn no_policy_never_allows() {
        assert!(!RetryPolicy::NONE.allows(0));
    }

    #[test]
    fn category_strings_roundtrip() {
        for c in [
            ErrorCategory::Unavailable,
            ErrorCategory::PermissionError,
            ErrorCategory::AuthenticationError,
            ErrorCategory::ConfigurationError,
            ErrorCategory::ProvisioningRequired,
            ErrorCategory::RateLimit,
            ErrorCategory::Timeout,
            ErrorCategory::QualityIssue,
            ErrorCategory::NetworkError,
            ErrorCategory::Unknown,
        ] {
            assert_eq!(ErrorCategory::parse(c.as_str()), Some(c));
        }
        assert_eq!(ErrorCategory::parse("nope"), None);
    }

    #[test]
    fn blocking_set() {
        assert!(ErrorCategory::ProvisioningRequired.is_blocking());
        assert!(ErrorCategory::ConfigurationError.is_blocking());
        assert!(!ErrorCategory::RateLimit.is_blocking());
        assert!(!ErrorCategory::QualityIssue.is_blocking());
        assert!(!ErrorCategory::Unknown.is_blocking());
    }
}

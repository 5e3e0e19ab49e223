//! The built-in category table.
//!
//! Patterns are matched against lower-cased error text; tokens are matched
//! verbatim. Priorities decide ties: the first matching row wins.

use super::matchers::Matcher;
use super::registry::CategoryDef;
use super::{ErrorCategory, RetryPolicy, Severity};

const ECHO_LIMIT: usize = 200;

fn echo(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() <= ECHO_LIMIT {
        return trimmed.to_string();
    }
    let head: String = trimmed.chars().take(ECHO_LIMIT).collect();
    format!("{}...", head)
}

pub fn standard_definitions() -> Result<Vec<CategoryDef>, regex::Error> {
    Ok(vec![
        unavailable()?,
        permission()?,
        authentication()?,
        configuration()?,
        provisioning()?,
        rate_limit()?,
        timeout()?,
        quality()?,
        network()?,
    ])
}

pub fn unavailable() -> Result<CategoryDef, regex::Error> {
    Ok(CategoryDef {
        category: ErrorCategory::Unavailable,
        severity: Severity::Critical,
        priority: 10,
        temporary: false,
        retry: RetryPolicy::NONE,
        matchers: vec![
            Matcher::patterns(&[
                r"resourcenotfoundexception",
                r"model not found",
                r"model .*(does not exist|doesn't exist|was not found)",
                r"model identifier is invalid",
                r"invalid model (id|identifier)",
                r"unknown model",
                r"could not resolve the foundation model",
                r"end of (its )?life",
                r"no longer (available|supported)",
            ])?,
            Matcher::tokens(&["404"]),
        ],
        advice: &[
            "Check that the model identifier is spelled correctly",
            "Confirm the model is offered in the selected region",
            "Check whether the model has been retired by the provider",
        ],
        message: |_| "Model is unavailable: it does not exist in this region or the identifier is invalid".to_string(),
    })
}

pub fn permission() -> Result<CategoryDef, regex::Error> {
    Ok(CategoryDef {
        category: ErrorCategory::PermissionError,
        severity: Severity::Critical,
        priority: 20,
        temporary: false,
        retry: RetryPolicy::NONE,
        matchers: vec![
            Matcher::patterns(&[
                r"accessdeniedexception",
                r"access denied",
                r"not authorized to perform",
                r"forbidden",
                r"permission denied",
                r"insufficient permissions?",
                r"(do|does) not have (the )?(required )?permissions?",
            ])?,
            Matcher::tokens(&["403"]),
        ],
        advice: &[
            "Grant the IAM principal permission to invoke this model",
            "Check service control policies and permission boundaries on the account",
            "Verify the credentials belong to the intended account",
        ],
        message: |_| "Access denied: the credentials are not allowed to invoke this model".to_string(),
    })
}

pub fn authentication() -> Result<CategoryDef, regex::Error> {
    Ok(CategoryDef {
        category: ErrorCategory::AuthenticationError,
        severity: Severity::Critical,
        priority: 25,
        temporary: false,
        retry: RetryPolicy::NONE,
        matchers: vec![
            Matcher::patterns(&[
                r"unrecognizedclientexception",
                r"invalidsignatureexception",
                r"signaturedoesnotmatch",
                r"signature .*does not match",
                r"security token .*(invalid|expired)",
                r"expiredtokenexception",
                r"invalid credentials",
                r"unauthorized",
                r"(invalid|incorrect) api key",
                r"authentication failed",
                r"missing authentication",
            ])?,
            Matcher::tokens(&["401"]),
        ],
        advice: &[
            "Check the access key and secret key",
            "Rotate the credentials if they may have expired",
            "Make sure the system clock is correct so request signatures validate",
        ],
        message: |_| "Authentication failed: the provider rejected the credentials".to_string(),
    })
}

pub fn configuration() -> Result<CategoryDef, regex::Error> {
    Ok(CategoryDef {
        category: ErrorCategory::ConfigurationError,
        severity: Severity::High,
        priority: 30,
        temporary: false,
        retry: RetryPolicy::NONE,
        matchers: vec![Matcher::patterns(&[
            r"validationexception",
            r"inference profile",
            r"on-demand throughput",
            r"invalid request",
            r"malformed (request|input)",
            r"extraneous key",
            r"unsupported (parameter|value|field)",
            r"invalid parameter",
            r"cannot both be specified",
        ])?],
        advice: &[
            "Invoke the model through an inference profile if it requires one",
            "Check that the request parameters are supported by this model",
            "Review the model's documentation for special routing requirements",
        ],
        message: |_| "Configuration required: the model needs special routing or request settings".to_string(),
    })
}

pub fn provisioning() -> Result<CategoryDef, regex::Error> {
    Ok(CategoryDef {
        category: ErrorCategory::ProvisioningRequired,
        severity: Severity::Critical,
        priority: 35,
        temporary: false,
        retry: RetryPolicy::NONE,
        matchers: vec![Matcher::patterns(&[
            r"(don't|do not) have access to the model",
            r"model access",
            r"request access",
            r"enable (model )?access",
            r"not (been )?enabled",
            r"subscription",
            r"marketplace",
            r"agreement",
            r"provisioning required",
        ])?],
        advice: &[
            "Enable access to the model in the provider console (Bedrock > Model access)",
            "Accept the model's end user license agreement if one is required",
            "Wait for the access request to be approved, then re-run certification",
        ],
        message: |_| "Model requires account-level enablement before it can be used".to_string(),
    })
}

pub fn rate_limit() -> Result<CategoryDef, regex::Error> {
    Ok(CategoryDef {
        category: ErrorCategory::RateLimit,
        severity: Severity::Medium,
        priority: 40,
        temporary: true,
        retry: RetryPolicy::new(3, 2000),
        matchers: vec![
            Matcher::patterns(&[
                r"throttlingexception",
                r"throttl",
                r"too many requests",
                r"toomanyrequestsexception",
                r"rate limit",
                r"ratelimit",
                r"rate exceeded",
                r"provisionedthroughputexceededexception",
                r"servicequotaexceededexception",
                r"quota exceeded",
                r"too many tokens",
            ])?,
            Matcher::tokens(&["429"]),
        ],
        advice: &[
            "Wait a few minutes before trying again",
            "Request a quota increase for this model",
            "Reduce the number of concurrent requests",
        ],
        message: |_| "Rate limit reached: the provider is throttling requests".to_string(),
    })
}

pub fn timeout() -> Result<CategoryDef, regex::Error> {
    Ok(CategoryDef {
        category: ErrorCategory::Timeout,
        severity: Severity::Medium,
        priority: 45,
        temporary: true,
        retry: RetryPolicy::new(1, 5000),
        matchers: vec![
            Matcher::patterns(&[
                r"timeout",
                r"timed out",
                r"etimedout",
                r"deadline exceeded",
                r"modeltimeoutexception",
                r"took too long",
            ])?,
            Matcher::tokens(&["408", "504"]),
        ],
        advice: &[
            "Try again; the model may be under heavy load",
            "Check network latency to the provider region",
        ],
        message: |_| "Request timed out before the model responded".to_string(),
    })
}

pub fn quality() -> Result<CategoryDef, regex::Error> {
    Ok(CategoryDef {
        category: ErrorCategory::QualityIssue,
        severity: Severity::Low,
        priority: 50,
        temporary: false,
        retry: RetryPolicy::NONE,
        matchers: vec![Matcher::patterns(&[
            r"empty response",
            r"no response",
            r"response too short",
            r"too short",
            r"no chunks received",
            r"no content",
            r"did not remember",
            r"did not follow",
            r"exceeded max_tokens",
            r"malformed (output|response|json)",
            r"invalid json",
            r"unexpected output",
        ])?],
        advice: &[
            "The model works but its output did not meet the probe's expectations",
            "Review the failing probes before using the model for production traffic",
        ],
        message: |raw| format!("Model responded with a quality issue: {}", echo(raw)),
    })
}

pub fn network() -> Result<CategoryDef, regex::Error> {
    Ok(CategoryDef {
        category: ErrorCategory::NetworkError,
        severity: Severity::Medium,
        priority: 60,
        temporary: true,
        retry: RetryPolicy::new(2, 1000),
        matchers: vec![
            Matcher::patterns(&[
                r"econnreset",
                r"econnrefused",
                r"enotfound",
                r"ehostunreach",
                r"enetunreach",
                r"epipe",
                r"socket hang up",
                r"connection (reset|refused|closed|aborted|error)",
                r"broken pipe",
                r"error sending request",
                r"network",
                r"dns",
                r"unreachable",
                r"service ?unavailable",
                r"bad gateway",
            ])?,
            Matcher::tokens(&["502", "503"]),
        ],
        advice: &[
            "Check connectivity to the provider endpoint",
            "Retry once the network is stable",
            "Check proxy and firewall settings",
        ],
        message: |_| "Network error while contacting the provider".to_string(),
    })
}

/// Fallback row. Never registered in the ordered table.
pub fn unknown() -> CategoryDef {
    CategoryDef {
        category: ErrorCategory::Unknown,
        severity: Severity::Medium,
        priority: 999,
        temporary: false,
        retry: RetryPolicy::NONE,
        matchers: Vec::new(),
        advice: &[
            "Check the provider logs for more details",
            "Re-run certification; contact support if the error persists",
        ],
        message: |raw| format!("Unexpected error: {}", echo(raw)),
    }
}

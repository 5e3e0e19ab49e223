use crate::errors::{CategorizedError, CategoryRegistry, ErrorCategory, Severity};
use crate::model::CertificationStatus;

pub const CERTIFIED_THRESHOLD: f64 = 80.0;
pub const WARNING_THRESHOLD: f64 = 60.0;

const PROVISIONING_NOTES: [&str; 2] = [
    "Model requires prior enablement in the account",
    "Open the provider console → Bedrock → Model access to request access",
];

#[derive(Debug, Clone, PartialEq)]
pub struct StatusDecision {
    pub status: CertificationStatus,
    pub is_available: bool,
    pub is_certified: bool,
    pub categorized_error: Option<CategorizedError>,
    pub severity: Option<Severity>,
    pub quality_issues: Vec<String>,
}

/// Rows are checked top to bottom; the first that applies wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Row {
    Blocking,
    Certified,
    Warning,
    LowRate,
}

impl Row {
    fn select(rate: f64, category: Option<ErrorCategory>) -> Self {
        match category {
            Some(c) if c.is_blocking() => Row::Blocking,
            _ if rate >= CERTIFIED_THRESHOLD => Row::Certified,
            _ if rate >= WARNING_THRESHOLD => Row::Warning,
            _ => Row::LowRate,
        }
    }

    fn status(self) -> CertificationStatus {
        match self {
            Row::Certified => CertificationStatus::Certified,
            Row::Warning => CertificationStatus::QualityWarning,
            Row::Blocking | Row::LowRate => CertificationStatus::Failed,
        }
    }
}

pub fn determine(
    registry: &CategoryRegistry,
    model_id: &str,
    success_rate: f64,
    last_error: Option<&str>,
    mut quality_issues: Vec<String>,
) -> StatusDecision {
    let categorized_error = last_error.map(|e| registry.categorize(e));
    let category = categorized_error.as_ref().map(|c| c.category);
    let row = Row::select(success_rate, category);
    let status = row.status();

    if category == Some(ErrorCategory::ProvisioningRequired) {
        quality_issues.extend(PROVISIONING_NOTES.iter().map(|s| s.to_string()));
    }

    if row == Row::Blocking {
        tracing::warn!(
            event = "modelcert.status.blocked",
            model_id = %model_id,
            category = ?category,
            success_rate = success_rate,
            "blocking error forces FAILED"
        );
    } else {
        tracing::info!(
            event = "modelcert.status",
            model_id = %model_id,
            status = %status,
            success_rate = success_rate
        );
    }

    StatusDecision {
        status,
        is_available: status.is_available(),
        is_certified: status == CertificationStatus::Certified,
        severity: categorized_error.as_ref().map(|c| c.severity),
        categorized_error,
        quality_issues,
    }
}

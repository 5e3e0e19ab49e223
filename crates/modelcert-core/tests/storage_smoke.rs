use chrono::{Duration, SubsecRound, Utc};
use modelcert_core::errors::{ErrorCategory, Severity};
use modelcert_core::model::{CertificationRecord, CertificationStatus, FailureReason};
use modelcert_core::rating::Badge;
use modelcert_core::storage::{CertificationStore, Store};
use tempfile::tempdir;

#[test]
fn test_storage_smoke_lifecycle() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("certs.db");
    let now = Utc::now().trunc_subsecs(3);

    // 1. Open store, create schema
    let store = Store::open(&db_path)?;
    store.init_schema()?;

    // 2. Write a certified record and a failed one
    let certified = CertificationRecord {
        model_id: "cohere.command-r-v1:0".into(),
        region: "us-east-1".into(),
        vendor: Some("cohere".into()),
        status: CertificationStatus::Certified,
        tests_passed: 5,
        tests_failed: 1,
        success_rate: 83.33,
        avg_latency_ms: 812,
        last_error: Some("Model did not remember context".into()),
        error_category: Some(ErrorCategory::QualityIssue),
        error_severity: Some(Severity::Low),
        last_tested_at: now,
        certified_at: Some(now),
        expires_at: Some(now + Duration::days(7)),
        failure_reasons: vec![FailureReason {
            probe_id: "cohere-chat-history".into(),
            probe_name: "Cohere Chat History".into(),
            error: "Model did not remember context".into(),
        }],
        failed_probes: vec!["Cohere Chat History".into()],
        rating: Some(4.2),
        badge: Some(Badge::Recommended),
    };
    let failed = CertificationRecord {
        model_id: "amazon.titan-text-express-v1".into(),
        status: CertificationStatus::Failed,
        tests_passed: 0,
        tests_failed: 6,
        success_rate: 0.0,
        last_error: Some("ResourceNotFoundException: model not found".into()),
        error_category: Some(ErrorCategory::Unavailable),
        error_severity: Some(Severity::Critical),
        certified_at: None,
        expires_at: None,
        failure_reasons: vec![],
        failed_probes: vec![],
        rating: None,
        badge: None,
        ..certified.clone()
    };
    store.upsert(&certified)?;
    store.upsert(&failed)?;
    drop(store);

    // 3. Reopen and read back
    let store = Store::open(&db_path)?;
    store.init_schema()?;
    let got = store
        .get("cohere.command-r-v1:0", "us-east-1")?
        .expect("certified record survives reopen");
    assert_eq!(got, certified);

    let got = store
        .get("amazon.titan-text-express-v1", "us-east-1")?
        .expect("failed record survives reopen");
    assert_eq!(got, failed);

    assert_eq!(store.list()?.len(), 2);
    assert!(store.get("cohere.command-r-v1:0", "eu-west-1")?.is_none());
    Ok(())
}

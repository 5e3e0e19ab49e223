use crate::clock::Clock;
use crate::errors::CategoryRegistry;
use crate::model::{CertificationRecord, CertificationResult, CertificationStatus};
use crate::storage::CertificationStore;
use std::sync::Arc;

/// Read side of the certification table. A row only counts when its
/// expiry is set and still in the future.
#[derive(Clone)]
pub struct CertificationCache {
    store: Arc<dyn CertificationStore>,
    clock: Arc<dyn Clock>,
    registry: Arc<CategoryRegistry>,
}

impl CertificationCache {
    pub fn new(
        store: Arc<dyn CertificationStore>,
        clock: Arc<dyn Clock>,
        registry: Arc<CategoryRegistry>,
    ) -> Self {
        Self {
            store,
            clock,
            registry,
        }
    }

    pub fn get_cached(
        &self,
        model_id: &str,
        region: &str,
    ) -> anyhow::Result<Option<CertificationResult>> {
        let Some(record) = self.store.get(model_id, region)? else {
            tracing::debug!(
                event = "modelcert.cache.miss",
                model_id = %model_id,
                region = %region,
                reason = "absent"
            );
            return Ok(None);
        };

        let now = self.clock.now();
        if !record.is_fresh_at(now) {
            tracing::debug!(
                event = "modelcert.cache.miss",
                model_id = %model_id,
                region = %region,
                reason = if record.expires_at.is_some() { "expired" } else { "no_expiry" }
            );
            return Ok(None);
        }

        tracing::info!(
            event = "modelcert.cache.hit",
            model_id = %model_id,
            region = %region,
            status = %record.status
        );
        Ok(Some(self.rebuild(record)))
    }

    /// Cached results carry no per-probe detail.
    fn rebuild(&self, record: CertificationRecord) -> CertificationResult {
        let categorized_error = match (&record.error_category, &record.last_error) {
            (Some(_), Some(err)) => Some(self.registry.categorize(err)),
            _ => None,
        };

        CertificationResult {
            is_certified: record.status == CertificationStatus::Certified,
            is_available: record.status.is_available(),
            model_id: record.model_id,
            region: record.region,
            status: record.status,
            tests_passed: record.tests_passed,
            tests_failed: record.tests_failed,
            success_rate: record.success_rate,
            avg_latency_ms: record.avg_latency_ms,
            quality_issues: record.failed_probes,
            advisories: Vec::new(),
            results: Vec::new(),
            metrics: Vec::new(),
            categorized_error,
            overall_severity: record.error_severity,
            rating: record.rating,
            badge: record.badge,
            from_cache: true,
        }
    }
}

use crate::clock::Clock;
use crate::errors::{CategorizedError, CategoryRegistry};
use crate::model::{CertificationRecord, CertificationStatus};
use crate::storage::CertificationStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

const SECS_PER_DAY: f64 = 86_400.0;
const LOW_RATING: f64 = 3.0;

#[derive(Debug, Clone, Serialize)]
pub struct CertificationDetails {
    #[serde(flatten)]
    pub record: CertificationRecord,
    pub is_valid: bool,
    pub days_until_expiration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categorized_error: Option<CategorizedError>,
}

/// Read-only reporting over the certification table.
#[derive(Clone)]
pub struct CertificationQueries {
    store: Arc<dyn CertificationStore>,
    clock: Arc<dyn Clock>,
    registry: Arc<CategoryRegistry>,
}

impl CertificationQueries {
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

    /// Certified in some region and not past expiry.
    pub fn certified_models(&self) -> anyhow::Result<Vec<String>> {
        let now = self.clock.now();
        self.model_ids(|r| is_valid_at(r, now))
    }

    /// Everything not certified, quality warnings included.
    pub fn failed_models(&self) -> anyhow::Result<Vec<String>> {
        self.model_ids(|r| r.status != CertificationStatus::Certified)
    }

    /// FAILED because of a blocking error; these cannot serve traffic at all.
    pub fn unavailable_models(&self) -> anyhow::Result<Vec<String>> {
        self.model_ids(|r| {
            r.status == CertificationStatus::Failed
                && r.error_category.is_some_and(|c| c.is_blocking())
        })
    }

    pub fn all_failed_models(&self) -> anyhow::Result<Vec<String>> {
        self.model_ids(|r| r.status == CertificationStatus::Failed)
    }

    /// QUALITY_WARNING, plus certified models whose rating is low.
    pub fn quality_warning_models(&self) -> anyhow::Result<Vec<String>> {
        self.model_ids(|r| match r.status {
            CertificationStatus::QualityWarning => true,
            CertificationStatus::Certified => r.rating.is_some_and(|x| x < LOW_RATING),
            _ => false,
        })
    }

    pub fn is_certified(&self, model_id: &str, region: &str) -> anyhow::Result<bool> {
        let now = self.clock.now();
        Ok(self
            .store
            .get(model_id, region)?
            .is_some_and(|r| is_valid_at(&r, now)))
    }

    pub fn certification_details(
        &self,
        model_id: &str,
        region: &str,
    ) -> anyhow::Result<Option<CertificationDetails>> {
        let Some(record) = self.store.get(model_id, region)? else {
            return Ok(None);
        };
        let now = self.clock.now();

        let days_until_expiration = record.expires_at.map(|exp| {
            let secs = (exp - now).num_seconds() as f64;
            (secs / SECS_PER_DAY).ceil() as i64
        });
        let categorized_error = match (&record.error_category, &record.last_error) {
            (Some(_), Some(err)) => Some(self.registry.categorize(err)),
            _ => None,
        };

        Ok(Some(CertificationDetails {
            is_valid: is_valid_at(&record, now),
            days_until_expiration,
            categorized_error,
            record,
        }))
    }

    fn model_ids<F>(&self, keep: F) -> anyhow::Result<Vec<String>>
    where
        F: Fn(&CertificationRecord) -> bool,
    {
        let mut ids: Vec<String> = self
            .store
            .list()?
            .into_iter()
            .filter(|r| keep(r))
            .map(|r| r.model_id)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

fn is_valid_at(r: &CertificationRecord, now: DateTime<Utc>) -> bool {
    r.status == CertificationStatus::Certified && !r.is_expired_at(now)
}

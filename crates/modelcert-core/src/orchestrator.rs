use crate::cache::CertificationCache;
use crate::catalog::{resolve_vendor, ModelCatalog, StaticCatalog};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineSettings;
use crate::engine::{ProbeRunner, ProgressFn};
use crate::errors::CategoryRegistry;
use crate::model::{
    CertificationRecord, CertificationResult, CertificationStatus, Credentials, ProbeStatus,
};
use crate::probe::SuiteSelector;
use crate::queries::CertificationQueries;
use crate::providers::ChatProvider;
use crate::rating::{calculate_rating, RatingInputs};
use crate::status;
use crate::storage::CertificationStore;
use anyhow::Context;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const DEFAULT_VALIDITY_DAYS: i64 = 7;

/// Run-level progress, for hosts that stream certification status.
#[derive(Debug, Clone)]
pub enum CertificationEvent {
    Started {
        model_id: String,
        total: usize,
    },
    Progress {
        probe_name: String,
        status: ProbeStatus,
        completed: usize,
        total: usize,
    },
    Complete {
        result: Box<CertificationResult>,
    },
}

pub type ProgressSink = Arc<dyn Fn(CertificationEvent) + Send + Sync>;

pub struct CertificationService {
    provider: Arc<dyn ChatProvider>,
    store: Arc<dyn CertificationStore>,
    suites: Arc<dyn SuiteSelector>,
    catalog: Arc<dyn ModelCatalog>,
    clock: Arc<dyn Clock>,
    registry: Arc<CategoryRegistry>,
    validity: chrono::Duration,
}

impl CertificationService {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        store: Arc<dyn CertificationStore>,
        suites: Arc<dyn SuiteSelector>,
    ) -> Self {
        Self {
            provider,
            store,
            suites,
            catalog: Arc::new(StaticCatalog::default()),
            clock: Arc::new(SystemClock),
            registry: CategoryRegistry::shared(),
            validity: chrono::Duration::days(DEFAULT_VALIDITY_DAYS),
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn ModelCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_registry(mut self, registry: Arc<CategoryRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_validity(mut self, validity: chrono::Duration) -> Self {
        self.validity = validity;
        self
    }

    /// Applies validity window, categorization budget and model catalog.
    pub fn with_settings(self, settings: &EngineSettings) -> anyhow::Result<Self> {
        let registry = CategoryRegistry::standard()
            .context("failed to build error category table")?
            .with_budget(settings.categorization_budget());
        Ok(self
            .with_validity(chrono::Duration::days(settings.validity_days))
            .with_registry(Arc::new(registry))
            .with_catalog(Arc::new(settings.catalog())))
    }

    pub fn cache(&self) -> CertificationCache {
        CertificationCache::new(
            self.store.clone(),
            self.clock.clone(),
            self.registry.clone(),
        )
    }

    pub fn queries(&self) -> CertificationQueries {
        CertificationQueries::new(
            self.store.clone(),
            self.clock.clone(),
            self.registry.clone(),
        )
    }

    pub fn get_cached(
        &self,
        model_id: &str,
        region: &str,
    ) -> anyhow::Result<Option<CertificationResult>> {
        self.cache().get_cached(model_id, region)
    }

    pub async fn certify(
        &self,
        model_id: &str,
        credentials: &Credentials,
        force_refresh: bool,
    ) -> anyhow::Result<CertificationResult> {
        self.certify_with_progress(model_id, credentials, force_refresh, None)
            .await
    }

    pub async fn certify_with_progress(
        &self,
        model_id: &str,
        credentials: &Credentials,
        force_refresh: bool,
        sink: Option<ProgressSink>,
    ) -> anyhow::Result<CertificationResult> {
        let region = credentials.region.as_str();

        if force_refresh {
            tracing::info!(
                event = "modelcert.certify.forced",
                model_id = %model_id,
                region = %region
            );
        } else if let Some(hit) = self.get_cached(model_id, region)? {
            notify(&sink, || CertificationEvent::Complete {
                result: Box::new(hit.clone()),
            });
            return Ok(hit);
        }

        let vendor = resolve_vendor(self.catalog.as_ref(), model_id);
        let probes = self.suites.probes_for_vendor(&vendor);
        let total = probes.len();
        tracing::info!(
            event = "modelcert.certify.start",
            model_id = %model_id,
            region = %region,
            vendor = %vendor,
            probes = total
        );
        notify(&sink, || CertificationEvent::Started {
            model_id: model_id.to_string(),
            total,
        });

        let runner = ProbeRunner::new(self.provider.clone(), credentials.api_key())
            .with_registry(self.registry.clone());
        let run = runner
            .run_with_retry(model_id, &probes, progress_adapter(&sink, total))
            .await;

        let metrics = status::calculate(&run.results);
        let decision = status::determine(
            &self.registry,
            model_id,
            metrics.success_rate,
            metrics.last_error.as_deref(),
            metrics.quality_issues.clone(),
        );
        let rating = calculate_rating(model_id, RatingInputs::from_run(&metrics, &run.metrics));

        let now = self.clock.now();
        let certified = decision.status == CertificationStatus::Certified;
        let record = CertificationRecord {
            model_id: model_id.to_string(),
            region: region.to_string(),
            vendor: Some(vendor),
            status: decision.status,
            tests_passed: metrics.tests_passed,
            tests_failed: metrics.tests_failed,
            success_rate: metrics.success_rate,
            avg_latency_ms: metrics.avg_latency_ms,
            last_error: metrics.last_error.clone(),
            error_category: decision.categorized_error.as_ref().map(|c| c.category),
            error_severity: decision.severity,
            last_tested_at: now,
            certified_at: certified.then_some(now),
            expires_at: certified.then(|| now + self.validity),
            failure_reasons: metrics.failure_reasons.clone(),
            failed_probes: metrics.quality_issues.clone(),
            rating: Some(rating.rating),
            badge: Some(rating.badge),
        };
        self.store
            .upsert(&record)
            .with_context(|| format!("failed to persist certification for {}", model_id))?;

        tracing::info!(
            event = "modelcert.certify.done",
            model_id = %model_id,
            region = %region,
            status = %decision.status,
            success_rate = metrics.success_rate,
            rating = rating.rating
        );

        let result = CertificationResult {
            model_id: model_id.to_string(),
            region: region.to_string(),
            status: decision.status,
            tests_passed: metrics.tests_passed,
            tests_failed: metrics.tests_failed,
            success_rate: metrics.success_rate,
            avg_latency_ms: metrics.avg_latency_ms,
            is_certified: decision.is_certified,
            is_available: decision.is_available,
            quality_issues: decision.quality_issues,
            advisories: metrics.advisories,
            results: run.results,
            metrics: run.metrics,
            categorized_error: decision.categorized_error,
            overall_severity: decision.severity,
            rating: Some(rating.rating),
            badge: Some(rating.badge),
            from_cache: false,
        };
        notify(&sink, || CertificationEvent::Complete {
            result: Box::new(result.clone()),
        });
        Ok(result)
    }

    /// Certifies every active catalog model of `vendor`, one at a time.
    pub async fn certify_vendor(
        &self,
        vendor: &str,
        credentials: &Credentials,
    ) -> Vec<CertificationResult> {
        let models: Vec<String> = self
            .catalog
            .active_for_vendor(vendor)
            .into_iter()
            .map(|e| e.model_id)
            .collect();
        if models.is_empty() {
            tracing::warn!(
                event = "modelcert.batch.empty",
                vendor = %vendor,
                "no active models for vendor"
            );
        }
        self.certify_batch(&models, credentials).await
    }

    pub async fn certify_all(&self, credentials: &Credentials) -> Vec<CertificationResult> {
        let models: Vec<String> = self
            .catalog
            .active()
            .into_iter()
            .map(|e| e.model_id)
            .collect();
        self.certify_batch(&models, credentials).await
    }

    async fn certify_batch(
        &self,
        models: &[String],
        credentials: &Credentials,
    ) -> Vec<CertificationResult> {
        let mut out = Vec::with_capacity(models.len());
        for model_id in models {
            match self.certify(model_id, credentials, false).await {
                Ok(r) => out.push(r),
                Err(e) => {
                    tracing::error!(
                        event = "modelcert.batch.model_failed",
                        model_id = %model_id,
                        error = %format!("{:#}", e)
                    );
                    out.push(CertificationResult::failed_placeholder(
                        model_id,
                        &credentials.region,
                    ));
                }
            }
        }
        tracing::info!(
            event = "modelcert.batch.done",
            total = out.len(),
            certified = out.iter().filter(|r| r.is_certified).count()
        );
        out
    }
}

fn notify(sink: &Option<ProgressSink>, event: impl FnOnce() -> CertificationEvent) {
    if let Some(s) = sink {
        s(event());
    }
}

/// Turns per-probe callbacks into `Progress` events with a completed count.
fn progress_adapter(sink: &Option<ProgressSink>, total: usize) -> Option<ProgressFn> {
    let sink = sink.clone()?;
    let completed = Arc::new(AtomicUsize::new(0));
    Some(Arc::new(move |name: &str, status: ProbeStatus| {
        let done = if status == ProbeStatus::Running {
            completed.load(Ordering::SeqCst)
        } else {
            completed.fetch_add(1, Ordering::SeqCst) + 1
        };
        sink(CertificationEvent::Progress {
            probe_name: name.to_string(),
            status,
            completed: done,
            total,
        });
    }))
}

use super::CertificationStore;
use crate::errors::{ErrorCategory, Severity};
use crate::model::{CertificationRecord, CertificationStatus, FailureReason};
use crate::rating::Badge;
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const COLUMNS: &str = "model_id, region, vendor, status, tests_passed, tests_failed,
    success_rate, avg_latency_ms, last_error, error_category, error_severity,
    last_tested_at, certified_at, expires_at, failure_reasons_json,
    failed_probes_json, rating, badge";

/// SQLite-backed [`CertificationStore`].
#[derive(Clone)]
pub struct Store {
    pub conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite db {}", path.display()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite db")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(super::schema::DDL)
            .context("failed to create certification schema")?;
        Ok(())
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("certification store mutex poisoned"))
    }
}

impl CertificationStore for Store {
    fn get(&self, model_id: &str, region: &str) -> anyhow::Result<Option<CertificationRecord>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM certifications WHERE model_id = ?1 AND region = ?2",
            COLUMNS
        );
        let raw = conn
            .query_row(&sql, params![model_id, region], RawRecord::from_row)
            .optional()?;
        raw.map(RawRecord::into_record).transpose()
    }

    fn upsert(&self, r: &CertificationRecord) -> anyhow::Result<()> {
        let conn = self.lock()?;
        let failure_reasons = serde_json::to_string(&r.failure_reasons)?;
        let failed_probes = serde_json::to_string(&r.failed_probes)?;

        conn.execute(
            "INSERT INTO certifications(
                model_id, region, vendor, status, tests_passed, tests_failed,
                success_rate, avg_latency_ms, last_error, error_category, error_severity,
                last_tested_at, certified_at, expires_at, failure_reasons_json,
                failed_probes_json, rating, badge
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            ON CONFLICT(model_id, region) DO UPDATE SET
                vendor=excluded.vendor,
                status=excluded.status,
                tests_passed=excluded.tests_passed,
                tests_failed=excluded.tests_failed,
                success_rate=excluded.success_rate,
                avg_latency_ms=excluded.avg_latency_ms,
                last_error=excluded.last_error,
                error_category=excluded.error_category,
                error_severity=excluded.error_severity,
                last_tested_at=excluded.last_tested_at,
                certified_at=excluded.certified_at,
                expires_at=excluded.expires_at,
                failure_reasons_json=excluded.failure_reasons_json,
                failed_probes_json=excluded.failed_probes_json,
                rating=excluded.rating,
                badge=excluded.badge",
            params![
                r.model_id,
                r.region,
                r.vendor,
                r.status.as_str(),
                r.tests_passed,
                r.tests_failed,
                r.success_rate,
                r.avg_latency_ms as i64,
                r.last_error,
                r.error_category.map(|c| c.as_str()),
                r.error_severity.map(|s| s.as_str()),
                ts(&r.last_tested_at),
                r.certified_at.as_ref().map(ts),
                r.expires_at.as_ref().map(ts),
                failure_reasons,
                failed_probes,
                r.rating,
                r.badge.map(|b| b.as_str()),
            ],
        )
        .with_context(|| format!("failed to upsert certification for {}", r.model_id))?;

        tracing::debug!(
            event = "modelcert.store.upsert",
            model_id = %r.model_id,
            region = %r.region,
            status = %r.status
        );
        Ok(())
    }

    fn list(&self) -> anyhow::Result<Vec<CertificationRecord>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM certifications ORDER BY model_id, region",
            COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], RawRecord::from_row)?;

        let mut out = Vec::new();
        for raw in rows {
            out.push(raw?.into_record()?);
        }
        Ok(out)
    }
}

fn ts(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let t = DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid timestamp in certifications table: {}", s))?;
    Ok(t.with_timezone(&Utc))
}

/// Column values as stored; decoded outside the rusqlite closure so
/// conversion failures surface as `anyhow` errors.
struct RawRecord {
    model_id: String,
    region: String,
    vendor: Option<String>,
    status: String,
    tests_passed: u32,
    tests_failed: u32,
    success_rate: f64,
    avg_latency_ms: i64,
    last_error: Option<String>,
    error_category: Option<String>,
    error_severity: Option<String>,
    last_tested_at: String,
    certified_at: Option<String>,
    expires_at: Option<String>,
    failure_reasons_json: String,
    failed_probes_json: String,
    rating: Option<f64>,
    badge: Option<String>,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            model_id: row.get(0)?,
            region: row.get(1)?,
            vendor: row.get(2)?,
            status: row.get(3)?,
            tests_passed: row.get(4)?,
            tests_failed: row.get(5)?,
            success_rate: row.get(6)?,
            avg_latency_ms: row.get(7)?,
            last_error: row.get(8)?,
            error_category: row.get(9)?,
            error_severity: row.get(10)?,
            last_tested_at: row.get(11)?,
            certified_at: row.get(12)?,
            expires_at: row.get(13)?,
            failure_reasons_json: row.get(14)?,
            failed_probes_json: row.get(15)?,
            rating: row.get(16)?,
            badge: row.get(17)?,
        })
    }

    fn into_record(self) -> anyhow::Result<CertificationRecord> {
        let failure_reasons: Vec<FailureReason> = serde_json::from_str(&self.failure_reasons_json)
            .with_context(|| {
                format!(
                    "invalid failure_reasons_json for {}/{}",
                    self.model_id, self.region
                )
            })?;
        let failed_probes: Vec<String> = serde_json::from_str(&self.failed_probes_json)
            .with_context(|| {
                format!(
                    "invalid failed_probes_json for {}/{}",
                    self.model_id, self.region
                )
            })?;

        Ok(CertificationRecord {
            status: CertificationStatus::parse(&self.status),
            vendor: self.vendor,
            tests_passed: self.tests_passed,
            tests_failed: self.tests_failed,
            success_rate: self.success_rate,
            avg_latency_ms: self.avg_latency_ms.max(0) as u64,
            last_error: self.last_error,
            error_category: self.error_category.as_deref().and_then(ErrorCategory::parse),
            error_severity: self.error_severity.as_deref().and_then(Severity::parse),
            last_tested_at: parse_ts(&self.last_tested_at)?,
            certified_at: self.certified_at.as_deref().map(parse_ts).transpose()?,
            expires_at: self.expires_at.as_deref().map(parse_ts).transpose()?,
            failure_reasons,
            failed_probes,
            rating: self.rating,
            badge: self.badge.as_deref().and_then(Badge::parse),
            model_id: self.model_id,
            region: self.region,
        })
    }
}

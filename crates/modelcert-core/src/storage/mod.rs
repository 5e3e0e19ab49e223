use crate::model::CertificationRecord;

pub mod schema;
pub mod store;

pub use store::Store;

/// Persistence for certification verdicts, one record per `(model_id, region)`.
pub trait CertificationStore: Send + Sync {
    fn get(&self, model_id: &str, region: &str) -> anyhow::Result<Option<CertificationRecord>>;

    /// Inserts or replaces the record for its key in a single statement.
    fn upsert(&self, record: &CertificationRecord) -> anyhow::Result<()>;

    fn list(&self) -> anyhow::Result<Vec<CertificationRecord>>;
}

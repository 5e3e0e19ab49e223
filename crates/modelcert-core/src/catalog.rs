use serde::{Deserialize, Serialize};

/// Cross-region inference profile prefixes, as in `us.anthropic.claude-...`.
pub const REGION_PREFIXES: [&str; 4] = ["us", "eu", "apac", "global"];

pub const UNKNOWN_VENDOR: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub model_id: String,
    pub vendor: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl CatalogEntry {
    pub fn new(model_id: impl Into<String>, vendor: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            vendor: vendor.into(),
            active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Known models and their vendors.
pub trait ModelCatalog: Send + Sync {
    fn lookup(&self, model_id: &str) -> Option<CatalogEntry>;

    fn entries(&self) -> Vec<CatalogEntry>;

    /// Active entries for `vendor`, compared case-insensitively.
    fn active_for_vendor(&self, vendor: &str) -> Vec<CatalogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.active && e.vendor.eq_ignore_ascii_case(vendor))
            .collect()
    }

    fn active(&self) -> Vec<CatalogEntry> {
        self.entries().into_iter().filter(|e| e.active).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: Vec<CatalogEntry>,
}

impl StaticCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }
}

impl ModelCatalog for StaticCatalog {
    fn lookup(&self, model_id: &str) -> Option<CatalogEntry> {
        self.entries.iter().find(|e| e.model_id == model_id).cloned()
    }

    fn entries(&self) -> Vec<CatalogEntry> {
        self.entries.clone()
    }
}

/// Vendor segment of a provider model id, lower-cased.
///
/// `anthropic.claude-3-haiku` and `us.anthropic.claude-3-haiku` both give
/// `anthropic`. Ids without a `.` have no vendor segment.
pub fn vendor_from_model_id(model_id: &str) -> Option<String> {
    let mut parts = model_id.split('.');
    let first = parts.next()?;
    let second = parts.next()?;
    let vendor = if REGION_PREFIXES.contains(&first.to_ascii_lowercase().as_str()) {
        // a profile prefix is only a prefix if something follows the vendor
        parts.next().map(|_| second).unwrap_or(first)
    } else {
        first
    };
    if vendor.is_empty() {
        return None;
    }
    Some(vendor.to_ascii_lowercase())
}

/// Catalog vendor first, then the id's vendor segment, then `unknown`.
pub fn resolve_vendor(catalog: &dyn ModelCatalog, model_id: &str) -> String {
    if let Some(entry) = catalog.lookup(model_id) {
        return entry.vendor;
    }
    vendor_from_model_id(model_id).unwrap_or_else(|| UNKNOWN_VENDOR.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_segment_parsing() {
        let cases = [
            ("anthropic.claude-3-haiku-20240307-v1:0", Some("anthropic")),
            ("us.anthropic.claude-3-5-sonnet-20241022-v2:0", Some("anthropic")),
            ("eu.meta.llama3-2-1b-instruct-v1:0", Some("meta")),
            ("global.amazon.nova-micro-v1:0", Some("amazon")),
            ("Cohere.command-r-v1:0", Some("cohere")),
            ("amazon.titan-text-express-v1", Some("amazon")),
            ("us.model", Some("us")),
            ("gpt-4o", None),
            (".weird", None),
        ];
        for (id, want) in cases {
            assert_eq!(vendor_from_model_id(id).as_deref(), want, "{}", id);
        }
    }

    #[test]
    fn catalog_vendor_wins() {
        let cat = StaticCatalog::new(vec![CatalogEntry::new("amazon.custom-x", "Anthropic")]);
        assert_eq!(resolve_vendor(&cat, "amazon.custom-x"), "Anthropic");
        assert_eq!(resolve_vendor(&cat, "cohere.command-r"), "cohere");
        assert_eq!(resolve_vendor(&cat, "gpt-4o"), UNKNOWN_VENDOR);
    }

    #[test]
    fn vendor_filter_skips_inactive() {
        let cat = StaticCatalog::new(vec![
            CatalogEntry::new("anthropic.a", "Anthropic"),
            CatalogEntry::new("anthropic.b", "anthropic").inactive(),
            CatalogEntry::new("cohere.c", "Cohere"),
        ]);
        let ids: Vec<_> = cat
            .active_for_vendor("ANTHROPIC")
            .into_iter()
            .map(|e| e.model_id)
            .collect();
        assert_eq!(ids, vec!["anthropic.a"]);
        assert_eq!(cat.active().len(), 2);
    }
}

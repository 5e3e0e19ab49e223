use super::categories;
use super::matchers::Matcher;
use super::{CategorizedError, ErrorCategory, RetryPolicy, Severity};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Builds the user-facing message from the raw error text.
pub type MessageFn = fn(&str) -> String;

/// One row of the category table.
#[derive(Debug, Clone)]
pub struct CategoryDef {
    pub category: ErrorCategory,
    pub severity: Severity,
    /// Lower is checked first.
    pub priority: u16,
    pub temporary: bool,
    pub retry: RetryPolicy,
    pub matchers: Vec<Matcher>,
    pub advice: &'static [&'static str],
    pub message: MessageFn,
}

impl CategoryDef {
    pub fn matches(&self, raw: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(raw))
    }

    pub fn suggested_actions(&self) -> Vec<String> {
        self.advice.iter().map(|s| s.to_string()).collect()
    }

    pub fn user_message(&self, raw: &str) -> String {
        (self.message)(raw)
    }

    pub fn to_error(&self, raw: &str) -> CategorizedError {
        CategorizedError {
            category: self.category,
            severity: self.severity,
            message: self.user_message(raw),
            original_error: raw.to_string(),
            suggested_actions: self.suggested_actions(),
            is_temporary: self.temporary,
        }
    }
}

/// Priority-ordered category table with an UNKNOWN fallback.
#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    defs: Vec<CategoryDef>,
    fallback: CategoryDef,
    budget: Duration,
}

pub const DEFAULT_CATEGORIZATION_BUDGET: Duration = Duration::from_millis(1);

impl CategoryRegistry {
    pub fn empty(fallback: CategoryDef) -> Self {
        Self {
            defs: Vec::new(),
            fallback,
            budget: DEFAULT_CATEGORIZATION_BUDGET,
        }
    }

    /// The built-in taxonomy.
    pub fn standard() -> Result<Self, regex::Error> {
        let mut reg = Self::empty(categories::unknown());
        for def in categories::standard_definitions()? {
            reg.register(def);
        }
        tracing::debug!(
            event = "modelcert.categories.initialized",
            count = reg.len()
        );
        Ok(reg)
    }

    /// Process-wide read-only instance of [`CategoryRegistry::standard`].
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<CategoryRegistry>> = OnceLock::new();
        SHARED
            .get_or_init(|| {
                Arc::new(Self::standard().expect("built-in category patterns must compile"))
            })
            .clone()
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    /// Inserts after any existing definition with the same priority.
    pub fn register(&mut self, def: CategoryDef) {
        let pos = self.defs.partition_point(|d| d.priority <= def.priority);
        self.defs.insert(pos, def);
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn definitions(&self) -> &[CategoryDef] {
        &self.defs
    }

    pub fn find(&self, raw: &str) -> &CategoryDef {
        self.defs
            .iter()
            .find(|d| d.matches(raw))
            .unwrap_or(&self.fallback)
    }

    pub fn categorize(&self, raw: &str) -> CategorizedError {
        let start = Instant::now();
        let def = self.find(raw);
        let out = def.to_error(raw);
        let elapsed = start.elapsed();

        if elapsed > self.budget {
            let preview: String = raw.chars().take(100).collect();
            tracing::warn!(
                event = "modelcert.categorize.slow",
                category = %def.category,
                elapsed_us = elapsed.as_micros() as u64,
                budget_us = self.budget.as_micros() as u64,
                error = %preview,
                "error categorization exceeded budget"
            );
        }
        tracing::debug!(
            event = "modelcert.categorize",
            category = %def.category,
            severity = %def.severity,
            temporary = def.temporary,
            elapsed_us = elapsed.as_micros() as u64
        );
        out
    }

    pub fn definition(&self, category: ErrorCategory) -> &CategoryDef {
        self.defs
            .iter()
            .find(|d| d.category == category)
            .unwrap_or(&self.fallback)
    }

    pub fn retry_policy(&self, category: ErrorCategory) -> RetryPolicy {
        self.definition(category).retry
    }

    pub fn should_retry(&self, category: ErrorCategory, attempt: u32) -> bool {
        self.retry_policy(category).allows(attempt)
    }

    pub fn retry_delay(&self, category: ErrorCategory, attempt: u32) -> Duration {
        self.retry_policy(category).delay_for(attempt)
    }

    /// Only quality problems leave the model usable.
    pub fn is_model_available(&self, category: ErrorCategory) -> bool {
        category == ErrorCategory::QualityIssue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(category: ErrorCategory, priority: u16, pattern: &str) -> CategoryDef {
        CategoryDef {
            category,
            severity: Severity::Medium,
            priority,
            temporary: false,
            retry: RetryPolicy::NONE,
            matchers: vec![Matcher::patterns(&[pattern]).unwrap()],
            advice: &[],
            message: |raw| raw.to_string(),
        }
    }

    #[test]
    fn register_keeps_priority_order() {
        let mut reg = CategoryRegistry::empty(categories::unknown());
        reg.register(def(ErrorCategory::NetworkError, 60, "x"));
        reg.register(def(ErrorCategory::Unavailable, 10, "x"));
        reg.register(def(ErrorCategory::RateLimit, 40, "x"));
        let order: Vec<_> = reg.definitions().iter().map(|d| d.priority).collect();
        assert_eq!(order, vec![10, 40, 60]);
        assert_eq!(reg.find("x").category, ErrorCategory::Unavailable);
    }

    #[test]
    fn equal_priority_keeps_registration_order() {
        let mut reg = CategoryRegistry::empty(categories::unknown());
        reg.register(def(ErrorCategory::Timeout, 45, "boom"));
        reg.register(def(ErrorCategory::NetworkError, 45, "boom"));
        assert_eq!(reg.find("boom").category, ErrorCategory::Timeout);
    }

    #[test]
    fn falls_back_to_unknown() {
        let reg = CategoryRegistry::standard().unwrap();
        let c = reg.categorize("the flux capacitor melted");
        assert_eq!(c.category, ErrorCategory::Unknown);
        assert_eq!(c.severity, Severity::Medium);
        assert!(!c.is_temporary);
        assert!(!c.suggested_actions.is_empty());
        assert_eq!(reg.retry_policy(ErrorCategory::Unknown), RetryPolicy::NONE);
    }

    #[test]
    fn standard_table_is_sorted() {
        let reg = CategoryRegistry::standard().unwrap();
        assert_eq!(reg.len(), 9);
        let prios: Vec<_> = reg.definitions().iter().map(|d| d.priority).collect();
        let mut sorted = prios.clone();
        sorted.sort();
        assert_eq!(prios, sorted);
    }

    #[test]
    fn retry_helpers() {
        let reg = CategoryRegistry::standard().unwrap();
        assert!(reg.should_retry(ErrorCategory::RateLimit, 2));
        assert!(!reg.should_retry(ErrorCategory::RateLimit, 3));
        assert_eq!(
            reg.retry_delay(ErrorCategory::RateLimit, 1),
            Duration::from_millis(4000)
        );
        assert!(reg.should_retry(ErrorCategory::Timeout, 0));
        assert!(!reg.should_retry(ErrorCategory::Timeout, 1));
        assert!(!reg.should_retry(ErrorCategory::Unavailable, 0));
        assert!(reg.is_model_available(ErrorCategory::QualityIssue));
        assert!(!reg.is_model_available(ErrorCategory::RateLimit));
    }

    #[test]
    fn tight_budget_only_logs() {
        let reg = CategoryRegistry::standard()
            .unwrap()
            .with_budget(Duration::ZERO);
        let c = reg.categorize("ThrottlingException");
        assert_eq!(c.category, ErrorCategory::RateLimit);
    }
}

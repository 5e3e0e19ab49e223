//! Probe suites run against hosted chat models.
//!
//! Every model gets the base suite; models whose vendor is recognized also
//! get that vendor's probes appended.

use std::sync::Arc;

use modelcert_core::probe::{Probe, SuiteSelector};

mod amazon;
mod anthropic;
mod base;
mod cohere;

pub use amazon::{MaxTokensProbe, TextGenerationProbe};
pub use anthropic::{SystemMessageProbe, TemperatureTopPProbe};
pub use base::{BasicPromptProbe, ErrorHandlingProbe, ParameterValidationProbe, StreamingProbe};
pub use cohere::{ChatHistoryProbe, PreambleProbe};

pub fn base_probes() -> Vec<Arc<dyn Probe>> {
    vec![
        Arc::new(BasicPromptProbe),
        Arc::new(StreamingProbe),
        Arc::new(ParameterValidationProbe),
        Arc::new(ErrorHandlingProbe),
    ]
}

pub fn vendor_probes(vendor: &str) -> Vec<Arc<dyn Probe>> {
    match vendor.to_ascii_lowercase().as_str() {
        "anthropic" => vec![Arc::new(SystemMessageProbe), Arc::new(TemperatureTopPProbe)],
        "cohere" => vec![Arc::new(ChatHistoryProbe), Arc::new(PreambleProbe)],
        "amazon" => vec![Arc::new(TextGenerationProbe), Arc::new(MaxTokensProbe)],
        _ => Vec::new(),
    }
}

/// Base suite plus vendor-specific probes.
#[derive(Debug, Clone, Copy, Default)]
pub struct VendorSuites;

impl SuiteSelector for VendorSuites {
    fn probes_for_vendor(&self, vendor: &str) -> Vec<Arc<dyn Probe>> {
        let mut probes = base_probes();
        probes.extend(vendor_probes(vendor));
        probes
    }
}

pub fn default_suites() -> Arc<dyn SuiteSelector> {
    Arc::new(VendorSuites)
}

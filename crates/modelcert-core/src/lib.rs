pub mod cache;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod probe;
pub mod providers;
pub mod queries;
pub mod rating;
pub mod status;
pub mod storage;

pub use orchestrator::{CertificationEvent, CertificationService, ProgressSink};

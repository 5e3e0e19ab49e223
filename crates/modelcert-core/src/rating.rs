//! 0-5 star rating derived from a certification run.
//!
//! `rating = success * 0.5 + resilience + performance + stability`, where
//! success is scored 0-4 and the other three 0-1.

use crate::model::ProbeAttemptMetrics;
use crate::status::RunMetrics;
use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_COUNTED_RETRIES: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Badge {
    Premium,
    Recommended,
    Functional,
    Limited,
    NotRecommended,
    Unavailable,
}

impl Badge {
    pub fn for_rating(rating: f64) -> Self {
        match rating {
            r if r >= 4.8 => Badge::Premium,
            r if r >= 4.0 => Badge::Recommended,
            r if r >= 3.0 => Badge::Functional,
            r if r >= 2.0 => Badge::Limited,
            r if r >= 1.0 => Badge::NotRecommended,
            _ => Badge::Unavailable,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Badge::Premium => "PREMIUM",
            Badge::Recommended => "RECOMMENDED",
            Badge::Functional => "FUNCTIONAL",
            Badge::Limited => "LIMITED",
            Badge::NotRecommended => "NOT_RECOMMENDED",
            Badge::Unavailable => "UNAVAILABLE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PREMIUM" => Some(Badge::Premium),
            "RECOMMENDED" => Some(Badge::Recommended),
            "FUNCTIONAL" => Some(Badge::Functional),
            "LIMITED" => Some(Badge::Limited),
            "NOT_RECOMMENDED" => Some(Badge::NotRecommended),
            "UNAVAILABLE" => Some(Badge::Unavailable),
            _ => None,
        }
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to the rating, aggregated over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingInputs {
    pub tests_passed: u32,
    pub total_tests: u32,
    pub average_retries: f64,
    pub average_latency_ms: u64,
    pub error_count: u32,
}

impl RatingInputs {
    pub fn from_run(metrics: &RunMetrics, attempts: &[ProbeAttemptMetrics]) -> Self {
        let average_retries = if attempts.is_empty() {
            0.0
        } else {
            attempts.iter().map(|m| m.retries as f64).sum::<f64>() / attempts.len() as f64
        };
        Self {
            tests_passed: metrics.tests_passed,
            total_tests: metrics.total(),
            average_retries,
            average_latency_ms: metrics.avg_latency_ms,
            error_count: metrics.failure_reasons.len() as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub success: f64,
    pub resilience: f64,
    pub performance: f64,
    pub stability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRating {
    pub rating: f64,
    pub badge: Badge,
    pub scores: Scores,
    pub inputs: RatingInputs,
}

pub fn calculate_rating(model_id: &str, inputs: RatingInputs) -> ModelRating {
    let scores = Scores {
        success: success_score(&inputs),
        resilience: resilience_score(&inputs),
        performance: performance_score(&inputs),
        stability: stability_score(&inputs),
    };
    let raw = scores.success * 0.5 + scores.resilience + scores.performance + scores.stability;
    let rating = round_to(raw, 1);
    let badge = Badge::for_rating(rating);

    tracing::debug!(
        event = "modelcert.rating",
        model_id = %model_id,
        rating = rating,
        badge = %badge
    );
    ModelRating {
        rating,
        badge,
        scores,
        inputs,
    }
}

fn success_score(m: &RatingInputs) -> f64 {
    if m.total_tests == 0 {
        return 0.0;
    }
    round_to(m.tests_passed as f64 / m.total_tests as f64 * 4.0, 2)
}

fn resilience_score(m: &RatingInputs) -> f64 {
    let capped = m.average_retries.clamp(0.0, MAX_COUNTED_RETRIES);
    round_to((1.0 - capped / MAX_COUNTED_RETRIES * 0.5).max(0.5), 2)
}

fn performance_score(m: &RatingInputs) -> f64 {
    match m.average_latency_ms {
        l if l < 2_000 => 1.0,
        l if l < 5_000 => 0.7,
        l if l < 10_000 => 0.4,
        _ => 0.2,
    }
}

fn stability_score(m: &RatingInputs) -> f64 {
    if m.total_tests == 0 {
        return 0.0;
    }
    round_to((1.0 - m.error_count as f64 / m.total_tests as f64).max(0.0), 2)
}

fn round_to(v: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (v * f).round() / f
}

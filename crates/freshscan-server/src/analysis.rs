//! Analysis providers.
//!
//! The server only depends on the [`AnalysisProvider`] trait. The bundled
//! [`SyntheticAnalyzer`] fabricates plausible results and stands in until a
//! real model is wired up.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::debug;

use freshscan_shared::{ContentType, Freshness, NutritionClass};
use freshscan_store::AnalysisOutcome;

use crate::config::ServerConfig;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("empty input")]
    EmptyInput,

    #[error("provider error: {0}")]
    Provider(String),
}

/// Turns stored image bytes into an analysis outcome.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    async fn analyze(
        &self,
        bytes: &[u8],
        content_type: ContentType,
    ) -> Result<AnalysisOutcome, AnalysisError>;
}

pub const SYNTHETIC_MODEL_VERSION: &str = "synthetic-v1";

const RECOMMENDATIONS: &[&str] = &[
    "Store in a cool, dry place",
    "Consume within 2-3 days for best quality",
    "Refrigerate after opening",
    "Wash thoroughly before eating",
    "Good source of vitamins and fiber",
    "Pair with a protein for a balanced meal",
    "Keep away from direct sunlight",
    "Freeze portions you will not eat this week",
];

const WARNINGS: &[&str] = &[
    "Signs of bruising detected",
    "Check for mold before consuming",
    "Approaching end of shelf life",
    "Packaging may be damaged",
    "Color variation detected",
];

/// Fabricates results from a pseudo-random generator after a fixed delay.
///
/// With a seed the sequence of outcomes is reproducible.
pub struct SyntheticAnalyzer {
    rng: Mutex<StdRng>,
    delay: Duration,
}

impl SyntheticAnalyzer {
    pub fn new(seed: Option<u64>, delay: Duration) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
            delay,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.analysis_seed, config.analysis_delay)
    }

    fn fabricate(&self) -> AnalysisOutcome {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let quality_score: u8 = rng.gen_range(0..=100);
        let nutrition = *NutritionClass::ALL
            .choose(&mut *rng)
            .unwrap_or(&NutritionClass::Medium);

        let rec_count = rng.gen_range(2..=4);
        let recommendations = RECOMMENDATIONS
            .choose_multiple(&mut *rng, rec_count)
            .map(|s| s.to_string())
            .collect();

        let warn_count = rng.gen_range(0..=2);
        let warnings = WARNINGS
            .choose_multiple(&mut *rng, warn_count)
            .map(|s| s.to_string())
            .collect();

        let confidence = (rng.gen_range(0.70..=0.99_f64) * 100.0).round() / 100.0;

        AnalysisOutcome {
            quality_score,
            freshness: freshness_for_score(quality_score),
            nutrition,
            recommendations,
            warnings,
            processing_time_ms: 0,
            model_version: SYNTHETIC_MODEL_VERSION.to_string(),
            confidence,
        }
    }
}

#[async_trait]
impl AnalysisProvider for SyntheticAnalyzer {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn analyze(
        &self,
        bytes: &[u8],
        content_type: ContentType,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        if bytes.is_empty() {
            return Err(AnalysisError::EmptyInput);
        }

        let started = Instant::now();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut outcome = self.fabricate();
        outcome.processing_time_ms =
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        debug!(
            size = bytes.len(),
            %content_type,
            score = outcome.quality_score,
            freshness = %outcome.freshness,
            "Synthetic analysis complete"
        );
        Ok(outcome)
    }
}

/// Freshness category matching the score bands used in stats.
pub fn freshness_for_score(score: u8) -> Freshness {
    match score {
        90.. => Freshness::Excellent,
        70..=89 => Freshness::Good,
        50..=69 => Freshness::Fair,
        _ => Freshness::Poor,
    }
}

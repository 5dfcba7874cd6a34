//! Automated smoke checklist for a running MagicQuill backend
//!
//! Each check calls the backend the way a client would and records whether
//! the observed behaviour matches what the API contract promises:
//!
//! - `guess_prompt` succeeds with only the original image,
//! - `guess_prompt` succeeds with all three images,
//! - `process_background_img` resizes to the configured target resolution,
//! - `generate` is deterministic for a fixed seed,
//! - `generate` picks a seed when asked with `-1`.

pub mod resize;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::backend::traits::{
    FrontendImages, GenerateRequest, GenerationParams, PromptGuessRequest, QuillBackend,
    RANDOM_SEED,
};
use crate::config::ChecklistConfig;
use crate::error::{AppError, Result};
use crate::image::DataUri;

pub use resize::verify_resize;

/// 1x1 transparent PNG used when no sample image is configured
const BUILTIN_SAMPLE_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Passed,
    Failed,
    Skipped,
}

/// Result of a single check
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
    pub elapsed_ms: u64,
}

impl CheckOutcome {
    fn skipped(name: &str, reason: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Skipped,
            detail: reason.to_string(),
            elapsed_ms: 0,
        }
    }
}

/// All outcomes of one checklist run
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistReport {
    pub backend: String,
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<CheckOutcome>,
}

impl ChecklistReport {
    fn count(&self, status: CheckStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn passed(&self) -> usize {
        self.count(CheckStatus::Passed)
    }

    pub fn failed(&self) -> usize {
        self.count(CheckStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(CheckStatus::Skipped)
    }

    /// True when nothing failed; skipped checks do not count against it
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn outcome(&self, name: &str) -> Option<&CheckOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }
}

/// Runs the checklist against one backend
pub struct Checklist {
    backend: Arc<dyn QuillBackend>,
    config: ChecklistConfig,
    generation: GenerationParams,
}

impl Checklist {
    pub fn new(
        backend: Arc<dyn QuillBackend>,
        config: ChecklistConfig,
        generation: GenerationParams,
    ) -> Self {
        Self {
            backend,
            config,
            generation,
        }
    }

    /// Configured sample image, or the built-in one
    pub async fn sample_image(&self) -> Result<DataUri> {
        match &self.config.sample_image {
            Some(path) => DataUri::from_file(path).await,
            None => DataUri::parse(BUILTIN_SAMPLE_PNG),
        }
    }

    /// Run every check in order. Only failing to load the sample image is
    /// an error; backend failures are recorded as failed outcomes.
    pub async fn run(&self) -> Result<ChecklistReport> {
        let started_at = Utc::now();
        let image = self.sample_image().await?;

        info!(
            backend = %self.backend.name(),
            url = %self.backend.base_url(),
            target_resolution = self.config.target_resolution,
            "Running checklist"
        );

        let mut outcomes = vec![
            self.guess_prompt_minimal(&image).await,
            self.guess_prompt_full(&image).await,
            self.background_resize(&image).await,
        ];

        if self.config.include_generate {
            outcomes.push(self.generate_fixed_seed(&image).await);
            outcomes.push(self.generate_random_seed(&image).await);
        } else {
            let reason = "generate endpoint not enabled (checklist.include_generate = false)";
            outcomes.push(CheckOutcome::skipped("generate_fixed_seed_deterministic", reason));
            outcomes.push(CheckOutcome::skipped("generate_random_seed", reason));
        }

        let report = ChecklistReport {
            backend: self.backend.name().to_string(),
            started_at,
            outcomes,
        };

        info!(
            passed = report.passed(),
            failed = report.failed(),
            skipped = report.skipped(),
            "Checklist finished"
        );

        Ok(report)
    }

    async fn guess_prompt_minimal(&self, image: &DataUri) -> CheckOutcome {
        timed("guess_prompt_minimal", async {
            let prompt = self
                .backend
                .guess_prompt(PromptGuessRequest::new(image.clone()))
                .await?;
            Ok(format!("prompt: '{}'", prompt))
        })
        .await
    }

    async fn guess_prompt_full(&self, image: &DataUri) -> CheckOutcome {
        timed("guess_prompt_full", async {
            let request = PromptGuessRequest::new(image.clone())
                .with_color_image(image.clone())
                .with_edge_image(image.clone());
            let prompt = self.backend.guess_prompt(request).await?;
            Ok(format!("{} phrase(s)", prompt.phrases().len()))
        })
        .await
    }

    async fn background_resize(&self, image: &DataUri) -> CheckOutcome {
        let target = self.config.target_resolution;
        timed("background_resize", async move {
            let original = image.dimensions()?;
            let resized = self
                .backend
                .process_background_img(image.clone())
                .await?
                .dimensions()?;
            verify_resize(original, resized, target)?;
            Ok(format!("{} -> {} (target {})", original, resized, target))
        })
        .await
    }

    fn generate_request(&self, image: &DataUri, seed: i64) -> GenerateRequest {
        let images = FrontendImages {
            total_mask: image.clone(),
            original_image: image.clone(),
            add_color_image: image.clone(),
            add_edge_image: image.clone(),
            remove_edge_image: image.clone(),
        };
        GenerateRequest::new(
            images,
            self.config.prompt.clone(),
            self.generation.clone().with_seed(seed),
        )
    }

    async fn generate_fixed_seed(&self, image: &DataUri) -> CheckOutcome {
        let seed = self.config.fixed_seed;
        timed("generate_fixed_seed_deterministic", async move {
            if seed == RANDOM_SEED {
                return Err(AppError::InvalidRequest(
                    "checklist.fixed_seed must not be -1".to_string(),
                ));
            }

            let first = self.backend.generate(self.generate_request(image, seed)).await?;
            let second = self.backend.generate(self.generate_request(image, seed)).await?;

            if first.seed != seed || second.seed != seed {
                return Err(AppError::InvalidResponse(format!(
                    "requested seed {}, backend used {} and {}",
                    seed, first.seed, second.seed
                )));
            }
            if first.generated_image.decode()? != second.generated_image.decode()? {
                return Err(AppError::InvalidResponse(format!(
                    "seed {} produced different images",
                    seed
                )));
            }
            Ok(format!("seed {} reproduced the same image", seed))
        })
        .await
    }

    async fn generate_random_seed(&self, image: &DataUri) -> CheckOutcome {
        timed("generate_random_seed", async {
            let response = self
                .backend
                .generate(self.generate_request(image, RANDOM_SEED))
                .await?;
            if response.seed < 0 {
                return Err(AppError::InvalidResponse(format!(
                    "backend echoed seed {} instead of choosing one",
                    response.seed
                )));
            }
            Ok(format!("backend chose seed {}", response.seed))
        })
        .await
    }
}

/// Run one check, turning its result into an outcome
async fn timed<F>(name: &str, check: F) -> CheckOutcome
where
    F: Future<Output = Result<String>>,
{
    let started = Instant::now();
    let result = check.await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(detail) => {
            info!(check = %name, elapsed_ms = elapsed_ms, "Check passed");
            CheckOutcome {
                name: name.to_string(),
                status: CheckStatus::Passed,
                detail,
                elapsed_ms,
            }
        }
        Err(e) => {
            warn!(check = %name, elapsed_ms = elapsed_ms, error = %e, "Check failed");
            CheckOutcome {
                name: name.to_string(),
                status: CheckStatus::Failed,
                detail: e.to_string(),
                elapsed_ms,
            }
        }
    }
}

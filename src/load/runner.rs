//! Bounded-concurrency load runner for exercising a GPU-bound backend

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::backend::traits::{GenerateRequest, PromptGuessRequest, QuillBackend};
use crate::config::LoadConfig;
use crate::error::{AppError, Result};
use crate::image::DataUri;

/// The request each load iteration sends
#[derive(Debug, Clone)]
pub enum LoadTarget {
    GuessPrompt(PromptGuessRequest),
    Background(DataUri),
    Generate(GenerateRequest),
}

impl LoadTarget {
    pub fn label(&self) -> &'static str {
        match self {
            LoadTarget::GuessPrompt(_) => "guess_prompt",
            LoadTarget::Background(_) => "process_background_img",
            LoadTarget::Generate(_) => "generate",
        }
    }

    async fn call(&self, backend: &dyn QuillBackend) -> Result<()> {
        match self {
            LoadTarget::GuessPrompt(request) => backend.guess_prompt(request.clone()).await.map(|_| ()),
            LoadTarget::Background(image) => {
                backend.process_background_img(image.clone()).await.map(|_| ())
            }
            LoadTarget::Generate(request) => backend.generate(request.clone()).await.map(|_| ()),
        }
    }
}

/// Latency distribution over successful requests, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencySummary {
    pub min_ms: u64,
    pub mean_ms: u64,
    pub p95_ms: u64,
    pub max_ms: u64,
}

impl LatencySummary {
    /// Summarise samples; `None` when there are none
    pub fn from_samples(samples: &[u64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_unstable();
        let total: u64 = sorted.iter().sum();

        Some(Self {
            min_ms: sorted[0],
            mean_ms: total / sorted.len() as u64,
            p95_ms: percentile(&sorted, 95),
            max_ms: sorted[sorted.len() - 1],
        })
    }
}

/// Nearest-rank percentile of an ascending, non-empty slice
fn percentile(sorted: &[u64], pct: usize) -> u64 {
    let rank = (pct * sorted.len()).div_ceil(100).max(1);
    sorted[rank.min(sorted.len()) - 1]
}

/// Load run statistics
#[derive(Debug, Clone, Serialize)]
pub struct LoadStats {
    pub target: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub max_concurrent: usize,
    pub wall_ms: u64,
    pub latency: Option<LatencySummary>,
}

impl LoadStats {
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.total as f64
    }
}

/// Sends `config.requests` copies of a request with bounded concurrency
pub struct LoadRunner {
    backend: Arc<dyn QuillBackend>,
    config: LoadConfig,
}

impl LoadRunner {
    pub fn new(backend: Arc<dyn QuillBackend>, config: LoadConfig) -> Self {
        Self { backend, config }
    }

    pub async fn run(&self, target: LoadTarget) -> Result<LoadStats> {
        if self.config.max_concurrent == 0 {
            return Err(AppError::InvalidRequest(
                "max_concurrent must be at least 1".to_string(),
            ));
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        let latencies = Arc::new(Mutex::new(Vec::with_capacity(self.config.requests)));
        let failed = Arc::new(AtomicUsize::new(0));
        let timed_out = Arc::new(AtomicUsize::new(0));
        let target = Arc::new(target);
        let timeout = Duration::from_millis(self.config.timeout_ms);

        info!(
            backend = %self.backend.name(),
            target = target.label(),
            requests = self.config.requests,
            max_concurrent = self.config.max_concurrent,
            "Starting load run"
        );

        let started = Instant::now();
        let mut handles = Vec::with_capacity(self.config.requests);

        for index in 0..self.config.requests {
            let backend = self.backend.clone();
            let semaphore = semaphore.clone();
            let latencies = latencies.clone();
            let failed = failed.clone();
            let timed_out = timed_out.clone();
            let target = target.clone();

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                };

                let request_started = Instant::now();
                match tokio::time::timeout(timeout, target.call(&*backend)).await {
                    Ok(Ok(())) => {
                        let elapsed = request_started.elapsed().as_millis() as u64;
                        debug!(request = index, elapsed_ms = elapsed, "Request succeeded");
                        latencies.lock().push(elapsed);
                    }
                    Ok(Err(AppError::Timeout(_))) | Err(_) => {
                        warn!(request = index, "Request timed out");
                        timed_out.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(Err(e)) => {
                        warn!(request = index, error = %e, "Request failed");
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }));
        }

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "Load task panicked");
                failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        let samples = latencies.lock().clone();
        let stats = LoadStats {
            target: target.label().to_string(),
            total: self.config.requests,
            succeeded: samples.len(),
            failed: failed.load(Ordering::Relaxed),
            timed_out: timed_out.load(Ordering::Relaxed),
            max_concurrent: self.config.max_concurrent,
            wall_ms: started.elapsed().as_millis() as u64,
            latency: LatencySummary::from_samples(&samples),
        };

        info!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            timed_out = stats.timed_out,
            wall_ms = stats.wall_ms,
            "Load run finished"
        );

        Ok(stats)
    }
}

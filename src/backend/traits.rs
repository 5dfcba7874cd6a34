//! Request/response shapes and the trait implemented by MagicQuill backends

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, Result};
use crate::image::DataUri;

/// Seed value asking the backend to choose one
pub const RANDOM_SEED: i64 = -1;

/// Body of `POST /magic_quill/guess_prompt`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptGuessRequest {
    pub original_image: DataUri,

    /// Backend falls back to `original_image` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_color_image: Option<DataUri>,

    /// Backend falls back to an empty mask when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_edge_image: Option<DataUri>,
}

impl PromptGuessRequest {
    pub fn new(original_image: DataUri) -> Self {
        Self {
            original_image,
            add_color_image: None,
            add_edge_image: None,
        }
    }

    pub fn with_color_image(mut self, image: DataUri) -> Self {
        self.add_color_image = Some(image);
        self
    }

    pub fn with_edge_image(mut self, image: DataUri) -> Self {
        self.add_edge_image = Some(image);
        self
    }
}

/// Comma-separated prompt phrases guessed by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptGuessResponse(pub String);

impl PromptGuessResponse {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Individual phrases, trimmed, empty entries dropped
    pub fn phrases(&self) -> Vec<&str> {
        self.0
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect()
    }
}

impl fmt::Display for PromptGuessResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sampler names understood by the backend's diffusion pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sampler {
    #[serde(rename = "euler")]
    Euler,
    #[serde(rename = "euler_ancestral")]
    EulerAncestral,
    #[serde(rename = "heun")]
    Heun,
    #[serde(rename = "heunpp2")]
    Heunpp2,
    #[serde(rename = "dpm_2")]
    Dpm2,
    #[serde(rename = "dpm_2_ancestral")]
    Dpm2Ancestral,
    #[serde(rename = "lms")]
    Lms,
    #[serde(rename = "dpm_fast")]
    DpmFast,
    #[serde(rename = "dpm_adaptive")]
    DpmAdaptive,
    #[serde(rename = "dpmpp_2s_ancestral")]
    Dpmpp2sAncestral,
    #[serde(rename = "dpmpp_sde")]
    DpmppSde,
    #[serde(rename = "dpmpp_2m")]
    Dpmpp2m,
    #[serde(rename = "dpmpp_2m_sde")]
    Dpmpp2mSde,
    #[serde(rename = "dpmpp_3m_sde")]
    Dpmpp3mSde,
    #[serde(rename = "ddpm")]
    Ddpm,
    #[serde(rename = "lcm")]
    Lcm,
    #[serde(rename = "ddim")]
    Ddim,
    #[serde(rename = "uni_pc")]
    UniPc,
    #[serde(rename = "uni_pc_bh2")]
    UniPcBh2,
}

impl Sampler {
    pub const ALL: [Sampler; 19] = [
        Sampler::Euler,
        Sampler::EulerAncestral,
        Sampler::Heun,
        Sampler::Heunpp2,
        Sampler::Dpm2,
        Sampler::Dpm2Ancestral,
        Sampler::Lms,
        Sampler::DpmFast,
        Sampler::DpmAdaptive,
        Sampler::Dpmpp2sAncestral,
        Sampler::DpmppSde,
        Sampler::Dpmpp2m,
        Sampler::Dpmpp2mSde,
        Sampler::Dpmpp3mSde,
        Sampler::Ddpm,
        Sampler::Lcm,
        Sampler::Ddim,
        Sampler::UniPc,
        Sampler::UniPcBh2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sampler::Euler => "euler",
            Sampler::EulerAncestral => "euler_ancestral",
            Sampler::Heun => "heun",
            Sampler::Heunpp2 => "heunpp2",
            Sampler::Dpm2 => "dpm_2",
            Sampler::Dpm2Ancestral => "dpm_2_ancestral",
            Sampler::Lms => "lms",
            Sampler::DpmFast => "dpm_fast",
            Sampler::DpmAdaptive => "dpm_adaptive",
            Sampler::Dpmpp2sAncestral => "dpmpp_2s_ancestral",
            Sampler::DpmppSde => "dpmpp_sde",
            Sampler::Dpmpp2m => "dpmpp_2m",
            Sampler::Dpmpp2mSde => "dpmpp_2m_sde",
            Sampler::Dpmpp3mSde => "dpmpp_3m_sde",
            Sampler::Ddpm => "ddpm",
            Sampler::Lcm => "lcm",
            Sampler::Ddim => "ddim",
            Sampler::UniPc => "uni_pc",
            Sampler::UniPcBh2 => "uni_pc_bh2",
        }
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::EulerAncestral
    }
}

impl fmt::Display for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sampler {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|sampler| sampler.as_str() == wanted)
            .ok_or_else(|| AppError::InvalidRequest(format!("Unknown sampler '{}'", s)))
    }
}

/// Noise schedule names understood by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheduler {
    Normal,
    Karras,
    Exponential,
    SgmUniform,
    Simple,
    DdimUniform,
}

impl Scheduler {
    pub const ALL: [Scheduler; 6] = [
        Scheduler::Normal,
        Scheduler::Karras,
        Scheduler::Exponential,
        Scheduler::SgmUniform,
        Scheduler::Simple,
        Scheduler::DdimUniform,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheduler::Normal => "normal",
            Scheduler::Karras => "karras",
            Scheduler::Exponential => "exponential",
            Scheduler::SgmUniform => "sgm_uniform",
            Scheduler::Simple => "simple",
            Scheduler::DdimUniform => "ddim_uniform",
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::Karras
    }
}

impl fmt::Display for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheduler {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|scheduler| scheduler.as_str() == wanted)
            .ok_or_else(|| AppError::InvalidRequest(format!("Unknown scheduler '{}'", s)))
    }
}

/// Images drawn by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontendImages {
    pub total_mask: DataUri,
    pub original_image: DataUri,
    pub add_color_image: DataUri,
    pub add_edge_image: DataUri,
    pub remove_edge_image: DataUri,
}

/// Values the backend produced earlier in the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendContext {
    pub prompt: String,
}

/// Sampling parameters for a generate call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    /// Checkpoint (model weights) name
    pub ckpt_name: String,
    pub negative_prompt: String,
    pub grow_size: u32,
    pub edge_strength: f32,
    pub color_strength: f32,
    pub inpaint_strength: f32,
    /// `RANDOM_SEED` lets the backend pick
    pub seed: i64,
    pub steps: u32,
    pub cfg: f32,
    pub sampler_name: Sampler,
    pub scheduler: Scheduler,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            ckpt_name: "SD1.5/realisticVisionV60B1_v51VAE.safetensors".to_string(),
            negative_prompt: String::new(),
            grow_size: 15,
            edge_strength: 0.55,
            color_strength: 0.55,
            inpaint_strength: 1.0,
            seed: RANDOM_SEED,
            steps: 20,
            cfg: 5.0,
            sampler_name: Sampler::default(),
            scheduler: Scheduler::default(),
        }
    }
}

impl GenerationParams {
    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = seed;
        self
    }

    pub fn is_random_seed(&self) -> bool {
        self.seed == RANDOM_SEED
    }

    /// Reject values the backend cannot sample with
    pub fn validate(&self) -> Result<()> {
        if self.ckpt_name.trim().is_empty() {
            return Err(AppError::InvalidRequest(
                "Checkpoint name cannot be empty".to_string(),
            ));
        }

        for (name, value) in [
            ("edge_strength", self.edge_strength),
            ("color_strength", self.color_strength),
            ("inpaint_strength", self.inpaint_strength),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AppError::InvalidRequest(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.steps == 0 {
            return Err(AppError::InvalidRequest("steps must be at least 1".to_string()));
        }
        if !(self.cfg > 0.0) {
            return Err(AppError::InvalidRequest(format!(
                "cfg must be positive, got {}",
                self.cfg
            )));
        }
        if self.seed < RANDOM_SEED {
            return Err(AppError::InvalidRequest(format!(
                "seed must be -1 or non-negative, got {}",
                self.seed
            )));
        }

        Ok(())
    }
}

/// Body of the proposed `POST /magic_quill/generate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub from_frontend: FrontendImages,
    pub from_backend: BackendContext,
    pub params: GenerationParams,
}

impl GenerateRequest {
    pub fn new(images: FrontendImages, prompt: impl Into<String>, params: GenerationParams) -> Self {
        Self {
            from_frontend: images,
            from_backend: BackendContext {
                prompt: prompt.into(),
            },
            params,
        }
    }
}

/// Response of the proposed generate endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub generated_image: DataUri,
    /// Seed actually used, also when the request asked for `RANDOM_SEED`
    pub seed: i64,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Trait for MagicQuill-compatible backends
#[async_trait]
pub trait QuillBackend: Send + Sync {
    /// Get the backend name
    fn name(&self) -> &str;

    /// Root URL the endpoint paths are joined to
    fn base_url(&self) -> &str;

    /// Infer a prompt from the drawn strokes
    async fn guess_prompt(&self, request: PromptGuessRequest) -> Result<PromptGuessResponse>;

    /// Resize a background image to the backend's working resolution
    async fn process_background_img(&self, image: DataUri) -> Result<DataUri>;

    /// Run an edit (proposed endpoint)
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;
}

//! HTTP backend client implementation

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::backend::traits::{
    GenerateRequest, GenerateResponse, PromptGuessRequest, PromptGuessResponse, QuillBackend,
};
use crate::config::BackendConfig;
use crate::error::{AppError, Result};
use crate::image::DataUri;

/// MagicQuill backend reached over plain HTTP
pub struct HttpBackend {
    name: String,
    client: Client,
    base_url: String,
    health_check_path: String,
    guess_prompt_path: String,
    background_path: String,
    generate_path: String,
}

impl HttpBackend {
    /// Create a new HTTP backend from configuration
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            name: config.name.clone(),
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            health_check_path: config.health_check_path.clone(),
            guess_prompt_path: config.guess_prompt_path.clone(),
            background_path: config.background_path.clone(),
            generate_path: config.generate_path.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST a JSON body and return the full text of a successful response
    async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<String> {
        let url = self.url(path);
        let started = Instant::now();

        debug!(backend = %self.name, url = %url, "Sending request");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        let status = response.status();
        debug!(
            backend = %self.name,
            url = %url,
            status = %status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Received response"
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(backend = %self.name, url = %url, status = %status, "Backend returned an error");
            return Err(AppError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        self.read_body(&url, response).await
    }

    /// Read the body; the client timeout also covers this stage
    async fn read_body(&self, url: &str, response: Response) -> Result<String> {
        response
            .text()
            .await
            .map_err(|e| self.transport_error(url, e))
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(format!("Request to {} timed out", url))
        } else if e.is_connect() {
            AppError::Unreachable(format!("Connection failed to {}: {}", url, e))
        } else {
            AppError::HttpClient(e)
        }
    }
}

/// Decode a body that is either a JSON string literal or bare text
fn string_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.starts_with('"') {
        if let Ok(value) = serde_json::from_str::<String>(trimmed) {
            return value;
        }
    }
    trimmed.to_string()
}

#[async_trait]
impl QuillBackend for HttpBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn guess_prompt(&self, request: PromptGuessRequest) -> Result<PromptGuessResponse> {
        let body = self.post_json(&self.guess_prompt_path, &request).await?;

        let prompt = PromptGuessResponse(string_body(&body));
        debug!(backend = %self.name, prompt = %prompt, "Guessed prompt");
        Ok(prompt)
    }

    async fn process_background_img(&self, image: DataUri) -> Result<DataUri> {
        let body = self.post_json(&self.background_path, &image).await?;

        let resized = DataUri::parse_lenient(&string_body(&body))
            .map_err(|e| AppError::InvalidResponse(format!("background image: {}", e)))?;
        debug!(backend = %self.name, image = %resized, "Processed background image");
        Ok(resized)
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        request.params.validate()?;

        let body = self.post_json(&self.generate_path, &request).await?;

        let generated: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        debug!(
            backend = %self.name,
            requested_seed = request.params.seed,
            seed = generated.seed,
            "Generated image"
        );
        Ok(generated)
    }

    async fn health_check(&self) -> bool {
        let url = self.url(&self.health_check_path);

        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(backend = %self.name, url = %url, "Health check passed");
                true
            }
            Ok(response) => {
                debug!(
                    backend = %self.name,
                    url = %url,
                    status = %response.status(),
                    "Health check failed"
                );
                false
            }
            Err(e) => {
                debug!(backend = %self.name, url = %url, error = %e, "Health check failed");
                false
            }
        }
    }
}

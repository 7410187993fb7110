// Schema-constrained calls to the generative backend
// Each attempt must produce JSON that validates against the caller's schema; anything
// else (transport error, prose, wrong shape) is retried at a lower temperature after a
// fixed delay, and the last failure is returned once attempts run out.

use crate::provider::{GenerationRequest, GenerativeBackend, ResponseFormat, TransportError};
use crate::schema::{Schema, SchemaViolation};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttemptError {
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("Response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error(transparent)]
    Schema(#[from] SchemaViolation),

    #[error("Response does not fit the target type: {0}")]
    Deserialize(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("Generation failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: AttemptError,
    },
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    // Total attempts including the first
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub initial_temperature: f32,
    pub retry_temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
            initial_temperature: 0.7,
            retry_temperature: 0.2,
        }
    }
}

pub struct GenerativeSchemaClient {
    backend: Arc<dyn GenerativeBackend>,
    config: GenerationConfig,
}

impl GenerativeSchemaClient {
    pub fn new(backend: Arc<dyn GenerativeBackend>, config: GenerationConfig) -> Self {
        Self { backend, config }
    }

    // Validated JSON, deserialized into the caller's type
    pub async fn generate<T: DeserializeOwned>(
        &self,
        schema: &Schema,
        instruction: &str,
        prompt: &str,
    ) -> Result<T, GenerationError> {
        let system_instruction = build_system_instruction(instruction, schema);
        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let temperature = if attempt == 0 {
                self.config.initial_temperature
            } else {
                self.config.retry_temperature
            };

            match self
                .attempt::<T>(schema, &system_instruction, prompt, temperature)
                .await
            {
                Ok(value) => {
                    debug!(attempt, "Generation accepted");
                    return Ok(value);
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= attempts {
                        error!(attempts, error = %e, "Generation attempts exhausted");
                        return Err(GenerationError::Exhausted { attempts, last: e });
                    }
                    warn!(attempt, error = %e, "Generation attempt failed, retrying");
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        schema: &Schema,
        system_instruction: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<T, AttemptError> {
        let request = GenerationRequest {
            system_instruction: system_instruction.to_string(),
            user_prompt: prompt.to_string(),
            temperature,
            response_format: ResponseFormat::Json,
        };
        let raw = self.backend.generate(request).await?;
        let value = parse_response(&raw, schema)?;
        serde_json::from_value(value).map_err(|e| AttemptError::Deserialize(e.to_string()))
    }
}

pub fn build_system_instruction(instruction: &str, schema: &Schema) -> String {
    let example = serde_json::to_string_pretty(&schema.example()).unwrap_or_default();
    format!(
        "{}\n\nRespond with JSON only, without markdown or commentary. \
         The response must have exactly this structure:\n{}",
        instruction.trim(),
        example
    )
}

// Strip fences, parse, validate
pub fn parse_response(raw: &str, schema: &Schema) -> Result<Value, AttemptError> {
    let text = strip_code_fences(raw);
    let value: Value =
        serde_json::from_str(text).map_err(|e| AttemptError::InvalidJson(e.to_string()))?;
    schema.validate(&value)?;
    Ok(value)
}

pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the language tag (```json)
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

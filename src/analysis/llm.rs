//! LLM collaborator client (Anthropic or OpenAI via Rig).

use log::debug;
use rig::{
    client::{CompletionClient, ProviderClient},
    completion::Prompt,
    providers::{anthropic, openai},
};
use std::env;
use std::fmt;
use std::str::FromStr;

use super::{Analysis, AnalysisRequest, prompts};

const MAX_TOKENS: u64 = 4096;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Unknown LLM provider '{0}': expected claude or openai")]
    UnknownProvider(String),

    #[error("{var} is not set; it is required for the {provider} provider")]
    MissingApiKey {
        provider: LlmProvider,
        var: &'static str,
    },

    #[error("LLM request failed: {0}")]
    ProviderError(String),

    #[error("Could not parse the LLM response as an analysis: {0}")]
    MalformedResponse(String),

    #[error("Failed to build the analysis payload: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    #[default]
    Claude,
    OpenAi,
}

impl LlmProvider {
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Claude => "claude-sonnet-4-20250514",
            Self::OpenAi => "gpt-4o",
        }
    }

    pub fn api_key_var(self) -> &'static str {
        match self {
            Self::Claude => "ANTHROPIC_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }

    /// Environment variable overriding the default model.
    pub fn model_var(self) -> &'static str {
        match self {
            Self::Claude => "CLAUDE_MODEL",
            Self::OpenAi => "OPENAI_MODEL",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "claude" | "anthropic" => Ok(Self::Claude),
            "openai" | "gpt" => Ok(Self::OpenAi),
            other => Err(LlmError::UnknownProvider(other.to_string())),
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Claude => write!(f, "claude"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmClient {
    provider: LlmProvider,
    model: String,
}

impl LlmClient {
    /// Build a client, failing fast when the provider's API key is missing.
    ///
    /// Model precedence: `model` argument, then the provider's model
    /// environment variable, then `configured_model`, then the default.
    pub fn new(
        provider: LlmProvider,
        model: Option<String>,
        configured_model: Option<String>,
    ) -> Result<Self, LlmError> {
        let var = provider.api_key_var();
        if env::var(var).map(|k| k.trim().is_empty()).unwrap_or(true) {
            return Err(LlmError::MissingApiKey { provider, var });
        }

        let model = model
            .or_else(|| env::var(provider.model_var()).ok().filter(|m| !m.is_empty()))
            .or(configured_model)
            .unwrap_or_else(|| provider.default_model().to_string());

        Ok(Self { provider, model })
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send the request and parse the structured analysis.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis, LlmError> {
        let preamble = prompts::preamble(request);
        let prompt = prompts::user_prompt(request)?;
        debug!(
            "Sending {} byte prompt to {} ({})",
            prompt.len(),
            self.provider,
            self.model
        );

        let reply = self.complete(&preamble, &prompt).await?;
        parse_analysis(&reply)
    }

    async fn complete(&self, preamble: &str, prompt: &str) -> Result<String, LlmError> {
        match self.provider {
            LlmProvider::Claude => {
                let client = anthropic::Client::from_env();
                let agent = client
                    .agent(&self.model)
                    .preamble(preamble)
                    .max_tokens(MAX_TOKENS)
                    .build();
                agent
                    .prompt(prompt)
                    .await
                    .map_err(|e| LlmError::ProviderError(e.to_string()))
            }
            LlmProvider::OpenAi => {
                let client = openai::Client::from_env();
                let agent = client
                    .agent(&self.model)
                    .preamble(preamble)
                    .max_tokens(MAX_TOKENS)
                    .build();
                agent
                    .prompt(prompt)
                    .await
                    .map_err(|e| LlmError::ProviderError(e.to_string()))
            }
        }
    }
}

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the language tag line.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

pub fn parse_analysis(reply: &str) -> Result<Analysis, LlmError> {
    serde_json::from_str(strip_code_fences(reply)).map_err(|e| LlmError::MalformedResponse(e.to_string()))
}

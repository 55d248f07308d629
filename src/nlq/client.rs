//! NLQ Client for LLM interactions

use crate::config::{LLMProvider, NLQConfig};
use crate::nlq::{NLQError, NLQResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an expert in the authentication of classical Chinese paintings and seals.";

pub struct NLQClient {
    client: Client,
    config: NLQConfig,
    api_base_url: String,
}

impl NLQClient {
    pub fn new(config: &NLQConfig, timeout: Duration) -> NLQResult<Self> {
        if config.provider.requires_api_key() && config.api_key.is_none() {
            return Err(NLQError::ConfigError(format!(
                "{:?} requires an API key",
                config.provider
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NLQError::ConfigError(e.to_string()))?;

        let api_base_url = config
            .api_base_url
            .clone()
            .unwrap_or_else(|| config.provider.default_base_url().to_string());

        Ok(Self {
            client,
            config: config.clone(),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send one system + user exchange and return the reply text
    pub async fn chat(&self, system: Option<&str>, prompt: &str, temperature: f32) -> NLQResult<String> {
        let system = system
            .map(str::to_string)
            .or_else(|| self.config.system_prompt.clone())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        debug!("Sending {} character prompt to {:?}", prompt.len(), self.config.provider);

        match self.config.provider {
            LLMProvider::OpenAI | LLMProvider::DeepSeek => {
                self.openai_chat(&system, prompt, temperature).await
            }
            LLMProvider::Ollama => self.ollama_chat(&system, prompt, temperature).await,
            LLMProvider::Gemini => self.gemini_chat(&system, prompt, temperature).await,
        }
    }

    async fn openai_chat(&self, system: &str, prompt: &str, temperature: f32) -> NLQResult<String> {
        #[derive(Serialize)]
        struct Message<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            messages: Vec<Message<'a>>,
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct Response {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: MessageContent,
        }

        #[derive(Deserialize)]
        struct MessageContent {
            content: String,
        }

        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| NLQError::ConfigError("Chat completions require an API key".to_string()))?;

        let url = format!("{}/chat/completions", self.api_base_url);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&Request {
                model: &self.config.model,
                messages: vec![
                    Message { role: "system", content: system },
                    Message { role: "user", content: prompt },
                ],
                temperature,
            })
            .send()
            .await
            .map_err(|e| NLQError::NetworkError(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(NLQError::ApiError(format!("Chat completion error: {}", resp.status())));
        }

        let result: Response = resp
            .json()
            .await
            .map_err(|e| NLQError::SerializationError(e.to_string()))?;
        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| NLQError::ApiError("Empty completion".to_string()))
    }

    async fn ollama_chat(&self, system: &str, prompt: &str, temperature: f32) -> NLQResult<String> {
        #[derive(Serialize)]
        struct Options {
            temperature: f32,
        }

        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            prompt: &'a str,
            system: &'a str,
            stream: bool,
            options: Options,
        }

        #[derive(Deserialize)]
        struct Response {
            response: String,
        }

        let url = format!("{}/api/generate", self.api_base_url);
        let resp = self
            .client
            .post(&url)
            .json(&Request {
                model: &self.config.model,
                prompt,
                system,
                stream: false,
                options: Options { temperature },
            })
            .send()
            .await
            .map_err(|e| NLQError::NetworkError(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(NLQError::ApiError(format!("Ollama error: {}", resp.status())));
        }

        let result: Response = resp
            .json()
            .await
            .map_err(|e| NLQError::SerializationError(e.to_string()))?;
        Ok(result.response.trim().to_string())
    }

    async fn gemini_chat(&self, system: &str, prompt: &str, temperature: f32) -> NLQResult<String> {
        #[derive(Serialize)]
        struct Request {
            contents: Vec<Content>,
            #[serde(rename = "generationConfig")]
            generation_config: GenerationConfig,
        }

        #[derive(Serialize, Deserialize)]
        struct Content {
            role: Option<String>,
            parts: Vec<Part>,
        }

        #[derive(Serialize, Deserialize)]
        struct Part {
            text: String,
        }

        #[derive(Serialize)]
        struct GenerationConfig {
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct Response {
            candidates: Option<Vec<Candidate>>,
        }

        #[derive(Deserialize)]
        struct Candidate {
            content: Content,
        }

        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| NLQError::ConfigError("Gemini requires API key".to_string()))?;

        // v1beta has no system role on every endpoint; prepend the instruction
        let full_prompt = format!("{}\n\n{}", system, prompt);

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base_url, self.config.model, api_key
        );

        let resp = self
            .client
            .post(&url)
            .json(&Request {
                contents: vec![Content {
                    role: Some("user".to_string()),
                    parts: vec![Part { text: full_prompt }],
                }],
                generation_config: GenerationConfig { temperature },
            })
            .send()
            .await
            .map_err(|e| NLQError::NetworkError(e.to_string()))?;

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(NLQError::ApiError(format!("Gemini error: {}", text)));
        }

        let result: Response = resp
            .json()
            .await
            .map_err(|e| NLQError::SerializationError(e.to_string()))?;

        result
            .candidates
            .and_then(|candidates| candidates.into_iter().next())
            .and_then(|first| first.content.parts.into_iter().next())
            .map(|part| part.text.trim().to_string())
            .ok_or_else(|| NLQError::ApiError("Gemini returned no candidates".to_string()))
    }
}

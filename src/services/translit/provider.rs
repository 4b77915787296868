//! Transliteration provider contract and the HTTP tokenizer implementation.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{PoolKey, TranslitResult, TranslitToken};
use crate::Result;
use crate::error::LingoError;

/// A live transliteration backend instance.
///
/// Construction performs the (expensive) initialization handshake; a
/// constructed provider is ready to process text until [`close`] is called.
///
/// [`close`]: TranslitProvider::close
#[async_trait]
pub trait TranslitProvider: Send + Sync {
    /// Tokenize/romanize one text.
    async fn process_text(&self, text: &str) -> Result<TranslitResult>;

    /// Tear the instance down. Called by the pool on reap and shutdown.
    async fn close(&self) -> Result<()>;

    /// Human-readable provider name for logs.
    fn provider_name(&self) -> &str;

    /// ISO-639-3 language this instance was initialized for.
    fn lang(&self) -> &str;
}

/// Constructs providers for the pool; production wiring talks HTTP, tests
/// inject counting doubles.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    /// Create and initialize a provider for the key.
    async fn create(&self, key: &PoolKey) -> Result<Box<dyn TranslitProvider>>;
}

/// Provider backed by a tokenizer service speaking JSON over HTTP.
///
/// The service exposes `/init`, `/process` and `/close`; one session per
/// provider instance, identified by the session id the init call returns.
#[derive(Debug)]
pub struct HttpTokenizerProvider {
    client: Client,
    base_url: String,
    session_id: String,
    lang_code: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct InitRequest<'a> {
    lang: &'a str,
    style: &'a str,
}

#[derive(Debug, Deserialize)]
struct InitResponse {
    session_id: String,
    #[serde(default)]
    provider: Option<String>,
}

#[derive(Debug, Serialize)]
struct ProcessRequest<'a> {
    session_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ProcessResponse {
    #[serde(default)]
    tokens: Vec<RawToken>,
}

#[derive(Debug, Deserialize)]
struct RawToken {
    surface: String,
    #[serde(default)]
    romanized: Option<String>,
}

impl HttpTokenizerProvider {
    /// Connect and run the init handshake for `key`.
    pub async fn connect(base_url: &str, timeout: Duration, key: &PoolKey) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            LingoError::ProviderInit {
                provider: "tokenizer".into(),
                message: e.to_string(),
            }
        })?;

        let response = client
            .post(format!("{}/init", base_url))
            .json(&InitRequest {
                lang: &key.lang_code,
                style: key.style.as_str(),
            })
            .send()
            .await
            .map_err(|e| LingoError::ProviderInit {
                provider: "tokenizer".into(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(LingoError::ProviderInit {
                provider: "tokenizer".into(),
                message: format!("init returned {}", response.status()),
            });
        }
        let init: InitResponse = response.json().await.map_err(|e| LingoError::ProviderInit {
            provider: "tokenizer".into(),
            message: format!("bad init response: {}", e),
        })?;

        let name = init.provider.unwrap_or_else(|| "tokenizer".to_string());
        debug!("provider {} ready for {}", name, key);
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            session_id: init.session_id,
            lang_code: key.lang_code.clone(),
            name,
        })
    }
}

#[async_trait]
impl TranslitProvider for HttpTokenizerProvider {
    async fn process_text(&self, text: &str) -> Result<TranslitResult> {
        let response = self
            .client
            .post(format!("{}/process", self.base_url))
            .json(&ProcessRequest {
                session_id: &self.session_id,
                text,
            })
            .send()
            .await
            .map_err(|e| LingoError::provider(&self.name, e.to_string()))?;

        if !response.status().is_success() {
            return Err(LingoError::provider(
                &self.name,
                format!("process returned {}", response.status()),
            ));
        }
        let parsed: ProcessResponse = response
            .json()
            .await
            .map_err(|e| LingoError::provider(&self.name, format!("bad response: {}", e)))?;

        Ok(TranslitResult {
            tokens: parsed
                .tokens
                .into_iter()
                .map(|t| TranslitToken {
                    surface: t.surface,
                    romanized: t.romanized,
                })
                .collect(),
        })
    }

    async fn close(&self) -> Result<()> {
        self.client
            .post(format!("{}/close", self.base_url))
            .json(&serde_json::json!({ "session_id": self.session_id }))
            .send()
            .await
            .map_err(|e| LingoError::provider(&self.name, e.to_string()))?;
        Ok(())
    }

    fn provider_name(&self) -> &str {
        &self.name
    }

    fn lang(&self) -> &str {
        &self.lang_code
    }
}

/// Factory producing [`HttpTokenizerProvider`] instances.
pub struct HttpProviderFactory {
    base_url: String,
    timeout: Duration,
}

impl HttpProviderFactory {
    /// Factory for the service at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ProviderFactory for HttpProviderFactory {
    async fn create(&self, key: &PoolKey) -> Result<Box<dyn TranslitProvider>> {
        let provider = HttpTokenizerProvider::connect(&self.base_url, self.timeout, key).await?;
        Ok(Box::new(provider))
    }
}

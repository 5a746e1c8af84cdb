use failsafe::futures::CircuitBreaker;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::circuit_breaker::{create_provider_circuit_breaker, ProviderBreaker};
use crate::config::Config;
use crate::errors::DispatchError;

/// One plain-text message, in the provider's JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
}

/// Client for the transactional-email provider (Resend-compatible API).
#[derive(Clone)]
pub struct EmailClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    breaker: Arc<ProviderBreaker>,
}

impl EmailClient {
    /// Creates a new `EmailClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Provider base URL, without trailing slash.
    /// * `api_key` - Bearer credential.
    pub fn new(base_url: String, api_key: String) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                DispatchError::Transport(format!("Failed to create email client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            breaker: Arc::new(create_provider_circuit_breaker()),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, DispatchError> {
        Self::new(config.resend_base_url.clone(), config.resend_api_key.clone())
    }

    /// Sends one message. A single attempt; failures are returned, never retried.
    pub async fn send(&self, email: &OutboundEmail) -> Result<(), DispatchError> {
        match self.breaker.call(self.post(email)).await {
            Ok(()) => Ok(()),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => {
                tracing::warn!("⚠️  Email provider circuit open, notification not sent");
                Err(DispatchError::ProviderUnavailable)
            }
        }
    }

    async fn post(&self, email: &OutboundEmail) -> Result<(), DispatchError> {
        let url = format!("{}/emails", self.base_url);
        // Never log the API key.
        tracing::debug!("POST {} (to: {:?})", url, email.to);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(email)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Email provider returned error {}: {}", status, error_text);
            return Err(DispatchError::ProviderError {
                status: status.as_u16(),
                body: error_text,
            });
        }

        Ok(())
    }
}

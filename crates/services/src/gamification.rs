//! Gamification coefficients provider.
//!
//! The engine reads coefficients once per session lifecycle and caches them;
//! reward math itself lives in `prep_core::model::rewards` and never fails,
//! so an unreachable provider only means fallback coefficients.

use std::env;

use async_trait::async_trait;
use reqwest::Client;

use prep_core::model::RewardCoefficients;

use crate::error::CoefficientsError;

#[async_trait]
pub trait CoefficientsSource: Send + Sync {
    /// # Errors
    ///
    /// Returns `CoefficientsError` when the coefficients cannot be loaded.
    async fn get_coefficients(&self) -> Result<RewardCoefficients, CoefficientsError>;
}

#[derive(Clone, Debug)]
pub struct CoefficientsConfig {
    pub base_url: String,
    pub api_key: String,
}

impl CoefficientsConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("PREP_GAMIFICATION_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let api_key = env::var("PREP_API_KEY").unwrap_or_default();
        Some(Self { base_url, api_key })
    }
}

/// HTTP-backed coefficients source.
#[derive(Clone)]
pub struct HttpCoefficientsSource {
    client: Client,
    config: Option<CoefficientsConfig>,
}

impl HttpCoefficientsSource {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(CoefficientsConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<CoefficientsConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[async_trait]
impl CoefficientsSource for HttpCoefficientsSource {
    async fn get_coefficients(&self) -> Result<RewardCoefficients, CoefficientsError> {
        let config = self.config.as_ref().ok_or(CoefficientsError::Disabled)?;

        let url = format!("{}/settings", config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .bearer_auth(&config.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CoefficientsError::HttpStatus(response.status()));
        }

        let coefficients: RewardCoefficients = response.json().await?;
        Ok(coefficients)
    }
}

/// Fixed coefficients for tests and prototyping.
#[derive(Debug, Clone)]
pub struct StaticCoefficients(pub RewardCoefficients);

#[async_trait]
impl CoefficientsSource for StaticCoefficients {
    async fn get_coefficients(&self) -> Result<RewardCoefficients, CoefficientsError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_source_reports_disabled() {
        let source = HttpCoefficientsSource::new(None);
        assert!(!source.enabled());
        let err = source.get_coefficients().await.unwrap_err();
        assert!(matches!(err, CoefficientsError::Disabled));
    }

    #[tokio::test]
    async fn static_source_returns_its_coefficients() {
        let source = StaticCoefficients(RewardCoefficients {
            xp_per_correct: 5,
            ..RewardCoefficients::default()
        });
        let coefficients = source.get_coefficients().await.unwrap();
        assert_eq!(coefficients.xp_per_correct, 5);
    }
}

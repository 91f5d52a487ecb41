//! Allowance ("battery") gate integration.
//!
//! The engine never does quota math; it calls `consume` at session start and
//! per answer, and reads the outcome. Transport failures are folded into a
//! failed outcome so the caller always gets the `{success, error_kind}`
//! contract rather than a transport error.

use std::env;

use async_trait::async_trait;
use log::warn;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use prep_core::model::{ProgramId, UserId};

use crate::error::AccessError;

//
// ─── CONTRACT ──────────────────────────────────────────────────────────────────
//

/// Consumable action kinds, with the wire codes the quota service expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Session,
    Question,
}

impl ActionKind {
    #[must_use]
    pub fn wire_code(&self) -> &'static str {
        match self {
            ActionKind::Session => "practice_session",
            ActionKind::Question => "question",
        }
    }
}

/// Failure kinds the quota service reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowanceErrorKind {
    /// The distinct user-visible "out of battery" condition.
    Insufficient,
    Disabled,
    NotFound,
    Other(String),
}

impl AllowanceErrorKind {
    /// Map a wire error code to a kind, keeping unknown codes verbatim.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "insufficient_battery" | "insufficient" => AllowanceErrorKind::Insufficient,
            "battery_disabled" | "disabled" => AllowanceErrorKind::Disabled,
            "user_trail_not_found" | "not_found" => AllowanceErrorKind::NotFound,
            other => AllowanceErrorKind::Other(other.to_string()),
        }
    }
}

/// Result of one consume call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumeOutcome {
    pub success: bool,
    pub error_kind: Option<AllowanceErrorKind>,
}

impl ConsumeOutcome {
    #[must_use]
    pub fn granted() -> Self {
        Self {
            success: true,
            error_kind: None,
        }
    }

    #[must_use]
    pub fn denied(kind: AllowanceErrorKind) -> Self {
        Self {
            success: false,
            error_kind: Some(kind),
        }
    }

    /// True for the one failure kind that blocks a session start.
    #[must_use]
    pub fn is_insufficient(&self) -> bool {
        matches!(self.error_kind, Some(AllowanceErrorKind::Insufficient))
    }
}

/// Consumption-checked quota service.
#[async_trait]
pub trait AllowanceService: Send + Sync {
    async fn consume(
        &self,
        user: UserId,
        program: ProgramId,
        kind: ActionKind,
        metadata: serde_json::Value,
    ) -> ConsumeOutcome;
}

/// Source of the per-user unlimited-access flag.
#[async_trait]
pub trait UnlimitedAccessSource: Send + Sync {
    /// # Errors
    ///
    /// Returns `AccessError` when the status cannot be determined; the
    /// engine degrades that to "not unlimited".
    async fn is_unlimited(&self, user: UserId) -> Result<bool, AccessError>;
}

//
// ─── HTTP CLIENTS ──────────────────────────────────────────────────────────────
//

#[derive(Clone, Debug)]
pub struct AllowanceConfig {
    pub base_url: String,
    pub api_key: String,
}

impl AllowanceConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("PREP_ALLOWANCE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let api_key = env::var("PREP_API_KEY").unwrap_or_default();
        Some(Self { base_url, api_key })
    }
}

/// HTTP-backed allowance gate.
#[derive(Clone)]
pub struct HttpAllowanceClient {
    client: Client,
    config: Option<AllowanceConfig>,
}

impl HttpAllowanceClient {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(AllowanceConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<AllowanceConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// True when a quota endpoint is configured; otherwise every consume is
    /// granted (metering off).
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[derive(Debug, Serialize)]
struct ConsumeRequest<'a> {
    user_id: String,
    program_id: String,
    action: &'static str,
    metadata: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ConsumeResponse {
    success: bool,
    error: Option<String>,
}

#[async_trait]
impl AllowanceService for HttpAllowanceClient {
    async fn consume(
        &self,
        user: UserId,
        program: ProgramId,
        kind: ActionKind,
        metadata: serde_json::Value,
    ) -> ConsumeOutcome {
        let Some(config) = self.config.as_ref() else {
            return ConsumeOutcome::granted();
        };

        let url = format!("{}/consume", config.base_url.trim_end_matches('/'));
        let payload = ConsumeRequest {
            user_id: user.to_string(),
            program_id: program.to_string(),
            action: kind.wire_code(),
            metadata: &metadata,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                warn!("allowance consume failed: {e}");
                return ConsumeOutcome::denied(AllowanceErrorKind::Other(e.to_string()));
            }
        };

        if !response.status().is_success() {
            warn!("allowance consume returned status {}", response.status());
            return ConsumeOutcome::denied(AllowanceErrorKind::Other(
                response.status().to_string(),
            ));
        }

        match response.json::<ConsumeResponse>().await {
            Ok(body) if body.success => ConsumeOutcome::granted(),
            Ok(body) => ConsumeOutcome::denied(
                body.error
                    .as_deref()
                    .map_or(AllowanceErrorKind::Other("unknown".to_string()), |code| {
                        AllowanceErrorKind::from_code(code)
                    }),
            ),
            Err(e) => {
                warn!("allowance consume returned malformed body: {e}");
                ConsumeOutcome::denied(AllowanceErrorKind::Other(e.to_string()))
            }
        }
    }
}

/// HTTP-backed subscriber-status source.
#[derive(Clone)]
pub struct HttpAccessClient {
    client: Client,
    config: Option<AllowanceConfig>,
}

impl HttpAccessClient {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(AllowanceConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<AllowanceConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubscriberResponse {
    unlimited: bool,
}

#[async_trait]
impl UnlimitedAccessSource for HttpAccessClient {
    async fn is_unlimited(&self, user: UserId) -> Result<bool, AccessError> {
        let config = self.config.as_ref().ok_or(AccessError::Disabled)?;

        let url = format!(
            "{}/subscribers/{}",
            config.base_url.trim_end_matches('/'),
            user
        );
        let response = self
            .client
            .get(url)
            .bearer_auth(&config.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AccessError::HttpStatus(response.status()));
        }

        let body: SubscriberResponse = response.json().await?;
        Ok(body.unlimited)
    }
}

//
// ─── STATIC IMPLEMENTATIONS ────────────────────────────────────────────────────
//

/// Fixed-outcome allowance service for tests and prototyping.
#[derive(Debug, Clone)]
pub struct StaticAllowance {
    outcome: ConsumeOutcome,
}

impl StaticAllowance {
    #[must_use]
    pub fn granting() -> Self {
        Self {
            outcome: ConsumeOutcome::granted(),
        }
    }

    #[must_use]
    pub fn denying(kind: AllowanceErrorKind) -> Self {
        Self {
            outcome: ConsumeOutcome::denied(kind),
        }
    }
}

#[async_trait]
impl AllowanceService for StaticAllowance {
    async fn consume(
        &self,
        _user: UserId,
        _program: ProgramId,
        _kind: ActionKind,
        _metadata: serde_json::Value,
    ) -> ConsumeOutcome {
        self.outcome.clone()
    }
}

/// Fixed subscriber status for tests and prototyping.
#[derive(Debug, Clone, Copy)]
pub struct StaticAccess {
    pub unlimited: bool,
}

#[async_trait]
impl UnlimitedAccessSource for StaticAccess {
    async fn is_unlimited(&self, _user: UserId) -> Result<bool, AccessError> {
        Ok(self.unlimited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_maps_wire_codes() {
        assert_eq!(
            AllowanceErrorKind::from_code("insufficient_battery"),
            AllowanceErrorKind::Insufficient
        );
        assert_eq!(
            AllowanceErrorKind::from_code("user_trail_not_found"),
            AllowanceErrorKind::NotFound
        );
        assert!(matches!(
            AllowanceErrorKind::from_code("mystery"),
            AllowanceErrorKind::Other(_)
        ));
    }

    #[test]
    fn only_insufficient_blocks() {
        assert!(ConsumeOutcome::denied(AllowanceErrorKind::Insufficient).is_insufficient());
        assert!(!ConsumeOutcome::denied(AllowanceErrorKind::NotFound).is_insufficient());
        assert!(!ConsumeOutcome::granted().is_insufficient());
    }

    #[tokio::test]
    async fn unconfigured_client_grants() {
        let client = HttpAllowanceClient::new(None);
        assert!(!client.enabled());
        let outcome = client
            .consume(
                UserId::random(),
                ProgramId::random(),
                ActionKind::Session,
                serde_json::json!({}),
            )
            .await;
        assert!(outcome.success);
    }
}

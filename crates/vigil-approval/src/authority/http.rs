//! HTTP adapter for the remote authority.
//!
//! JSON over HTTPS. Stale signals ride on status codes: a 404 maps to
//! [`StatusLookup::NotFound`] / [`DecideOutcome::NotFound`] and a 409 on
//! decision submission maps to [`DecideOutcome::AlreadyDecided`]; every
//! other non-success status is surfaced as a transient error.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vigil_core::{ApprovalId, Decision, ProjectId};

use super::{ApprovalAuthority, AuthorityError, DecideOutcome, RemoteStatus, StatusLookup};
use crate::event::{PullApprovalPayload, SettingsPayload};

/// Default per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
}

#[derive(Debug, Serialize)]
struct DecideBody<'a> {
    decision: &'a str,
    note: &'a str,
}

#[derive(Debug, Serialize)]
struct ToggleBody {
    enabled: bool,
}

#[derive(Debug, Serialize)]
struct BudgetBody {
    total: u32,
    reset: bool,
}

#[derive(Debug, Serialize)]
struct ResumeBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    total: Option<u32>,
}

/// Authority client speaking the HTTP wire protocol.
#[derive(Debug, Clone)]
pub struct HttpAuthority {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthority {
    /// Create a client against the given base URL (no trailing slash).
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError::Transport`] when the underlying HTTP
    /// client cannot be constructed.
    pub fn new(base_url: impl Into<String>) -> Result<Self, AuthorityError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AuthorityError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_settings(&self, path: &str) -> Result<SettingsPayload, AuthorityError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| AuthorityError::Transport(e.to_string()))?;
        Self::decode_settings(response).await
    }

    async fn post_settings<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<SettingsPayload, AuthorityError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| AuthorityError::Transport(e.to_string()))?;
        Self::decode_settings(response).await
    }

    async fn decode_settings(
        response: reqwest::Response,
    ) -> Result<SettingsPayload, AuthorityError> {
        let status = response.status();
        if !status.is_success() {
            return Err(AuthorityError::Http {
                status: status.as_u16(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| AuthorityError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ApprovalAuthority for HttpAuthority {
    async fn status(&self, id: &ApprovalId) -> Result<StatusLookup, AuthorityError> {
        let response = self
            .client
            .get(self.url(&format!("/approvals/{id}/status")))
            .send()
            .await
            .map_err(|e| AuthorityError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(StatusLookup::NotFound);
        }
        if !status.is_success() {
            return Err(AuthorityError::Http {
                status: status.as_u16(),
            });
        }
        let body: StatusBody = response
            .json()
            .await
            .map_err(|e| AuthorityError::Decode(e.to_string()))?;
        Ok(StatusLookup::Found(RemoteStatus::from_label(&body.status)))
    }

    async fn decide(
        &self,
        id: &ApprovalId,
        decision: Decision,
        note: &str,
    ) -> Result<DecideOutcome, AuthorityError> {
        let body = DecideBody {
            decision: decision.as_str(),
            note,
        };
        let response = self
            .client
            .post(self.url(&format!("/approvals/{id}/decision")))
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthorityError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(DecideOutcome::NotFound);
        }
        if status == reqwest::StatusCode::CONFLICT {
            return Ok(DecideOutcome::AlreadyDecided);
        }
        if !status.is_success() {
            return Err(AuthorityError::Http {
                status: status.as_u16(),
            });
        }
        Ok(DecideOutcome::Accepted)
    }

    async fn fetch_pending(&self) -> Result<Vec<PullApprovalPayload>, AuthorityError> {
        let response = self
            .client
            .get(self.url("/approvals/pending"))
            .send()
            .await
            .map_err(|e| AuthorityError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthorityError::Http {
                status: status.as_u16(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| AuthorityError::Decode(e.to_string()))
    }

    async fn settings(&self, project: &ProjectId) -> Result<SettingsPayload, AuthorityError> {
        self.get_settings(&format!("/projects/{}/hitl", project.as_str()))
            .await
    }

    async fn toggle(
        &self,
        project: &ProjectId,
        enabled: bool,
    ) -> Result<SettingsPayload, AuthorityError> {
        self.post_settings(
            &format!("/projects/{}/hitl/toggle", project.as_str()),
            &ToggleBody { enabled },
        )
        .await
    }

    async fn set_budget(
        &self,
        project: &ProjectId,
        total: u32,
        reset: bool,
    ) -> Result<SettingsPayload, AuthorityError> {
        self.post_settings(
            &format!("/projects/{}/hitl/budget", project.as_str()),
            &BudgetBody { total, reset },
        )
        .await
    }

    async fn resume(
        &self,
        project: &ProjectId,
        total: Option<u32>,
    ) -> Result<SettingsPayload, AuthorityError> {
        self.post_settings(
            &format!("/projects/{}/hitl/resume", project.as_str()),
            &ResumeBody { total },
        )
        .await
    }

    async fn halt(&self, project: &ProjectId) -> Result<SettingsPayload, AuthorityError> {
        self.post_settings(
            &format!("/projects/{}/hitl/halt", project.as_str()),
            &serde_json::json!({}),
        )
        .await
    }
}

// crates/jobs/src/client.rs
//! Client for the backend alignment endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::AlignConfig;
use crate::error::AlignError;
use crate::summary::AlignResult;
use crate::types::JobPayload;

/// Path of the alignment endpoint relative to the API base.
pub const ALIGN_PATH: &str = "/align/iep-selected";

/// Request body in the backend's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlignRequest {
    pub student_ids: Vec<String>,
    pub courses: Vec<String>,
    pub units: Vec<String>,
}

impl From<&JobPayload> for AlignRequest {
    fn from(payload: &JobPayload) -> Self {
        Self {
            student_ids: payload.students.clone(),
            courses: payload.courses.clone(),
            units: payload.units.clone(),
        }
    }
}

/// A synchronous request/response call to the alignment backend.
#[async_trait]
pub trait AlignmentClient: Send + Sync {
    async fn align(&self, request: &AlignRequest) -> Result<AlignResult, AlignError>;
}

/// [`AlignmentClient`] over HTTP.
pub struct HttpAlignmentClient {
    client: reqwest::Client,
    api_base: String,
    auth_token: Option<String>,
    timeout: Option<Duration>,
}

impl HttpAlignmentClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            auth_token: None,
            timeout: None,
        }
    }

    pub fn from_config(config: &AlignConfig) -> Self {
        let mut client = Self::new(&config.api_base);
        client.auth_token = config.auth_token.clone();
        client.timeout = config.request_timeout();
        client
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}{ALIGN_PATH}", self.api_base)
    }
}

#[async_trait]
impl AlignmentClient for HttpAlignmentClient {
    async fn align(&self, request: &AlignRequest) -> Result<AlignResult, AlignError> {
        let mut builder = self.client.post(self.endpoint()).json(request);
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let resp = builder.send().await.map_err(AlignError::Network)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Alignment endpoint rejected request");
            return Err(AlignError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<AlignResult>().await.map_err(AlignError::Decode)
    }
}

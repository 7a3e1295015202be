//! HTTP client for the profile collaborator.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

use crate::application::sources::{ProfileSource, SourceError};
use crate::domain::profiles::ProfileSnapshot;
use crate::domain::subject::SubjectId;

use super::error::InfraError;

/// Profile source over the platform's profile HTTP API.
///
/// One GET per subject; 404 is a definitive absent, 5xx and timeouts are
/// retryable and left to the fetcher's retry discipline.
pub struct HttpProfileSource {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpProfileSource {
    pub fn new(base_url: Url, request_timeout: Duration) -> Result<Self, InfraError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| {
                InfraError::configuration(format!("failed to build profile client: {err}"))
            })?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl ProfileSource for HttpProfileSource {
    async fn fetch(&self, id: &SubjectId) -> Result<Option<ProfileSnapshot>, SourceError> {
        let url = self
            .base_url
            .join(&format!("profiles/{id}"))
            .map_err(SourceError::invalid_response)?;

        let response = self.client.get(url).send().await.map_err(|err| {
            if err.is_timeout() {
                SourceError::timeout(err)
            } else {
                SourceError::unavailable(err)
            }
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<ProfileSnapshot>()
                .await
                .map(Some)
                .map_err(SourceError::invalid_response),
            status if status.is_server_error() => Err(SourceError::unavailable(format!(
                "profile source returned {status}"
            ))),
            status => Err(SourceError::invalid_response(format!(
                "profile source returned unexpected status {status}"
            ))),
        }
    }
}

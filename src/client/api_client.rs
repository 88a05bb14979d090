use log::debug;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::models::envelope::ApiEnvelope;
use crate::models::filter::{ImportReport, PersistedFilter};
use crate::utils::error::ClientError;

/// Typed client for `/api/logs/filters`
#[derive(Clone)]
pub struct FilterApiClient {
    http: Client,
    base_url: String,
}

impl FilterApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/logs/filters{}", self.base_url, path)
    }

    /// Decode the envelope whatever the HTTP status; code 200 is the only
    /// success
    async fn unwrap_envelope<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        let envelope: ApiEnvelope<T> = response.json().await?;
        debug!("Envelope {} (HTTP {}): {}", envelope.code, status, envelope.message);
        if !envelope.is_success() {
            return Err(ClientError::Api {
                code: envelope.code,
                message: envelope.message,
            });
        }
        envelope.data.ok_or(ClientError::EmptyResponse)
    }

    pub async fn list(&self, user_id: Option<u64>) -> Result<Vec<PersistedFilter>, ClientError> {
        let mut request = self.http.get(self.url(""));
        if let Some(user_id) = user_id {
            request = request.query(&[("userId", user_id)]);
        }
        Self::unwrap_envelope(request.send().await?).await
    }

    pub async fn get(&self, id: u64) -> Result<PersistedFilter, ClientError> {
        let response = self.http.get(self.url(&format!("/{}", id))).send().await?;
        Self::unwrap_envelope(response).await
    }

    pub async fn create(&self, filter: &PersistedFilter) -> Result<PersistedFilter, ClientError> {
        let response = self.http.post(self.url("")).json(filter).send().await?;
        Self::unwrap_envelope(response).await
    }

    pub async fn update(&self, id: u64, filter: &PersistedFilter) -> Result<PersistedFilter, ClientError> {
        let response = self
            .http
            .put(self.url(&format!("/{}", id)))
            .json(filter)
            .send()
            .await?;
        Self::unwrap_envelope(response).await
    }

    pub async fn delete(&self, id: u64) -> Result<(), ClientError> {
        let response = self.http.delete(self.url(&format!("/{}", id))).send().await?;
        Self::unwrap_envelope::<u64>(response).await.map(|_| ())
    }

    pub async fn import(&self, filters: &[PersistedFilter]) -> Result<ImportReport, ClientError> {
        let response = self.http.post(self.url("/import")).json(filters).send().await?;
        Self::unwrap_envelope(response).await
    }
}

//! HTTP client for the feedback REST API
//!
//! A thin wrapper over `reqwest`; everything above it talks to the
//! [`FeedbackApi`] trait so the sync engine can run against other backends.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::ClientConfig;
use crate::error::{FeedbackError, Result};
use crate::model::{AnalyticsSummary, HealthStatus, NewReview, Review, ReviewList};
use crate::query::ReviewQuery;

const HEALTH_TIMEOUT_SECS: u64 = 5;

/// Operations the dashboard needs from the backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedbackApi: Send + Sync {
  async fn create_review(&self, review: &NewReview) -> Result<Review>;
  async fn list_reviews(&self, query: &ReviewQuery) -> Result<ReviewList>;
  async fn analytics(&self) -> Result<AnalyticsSummary>;
  async fn health(&self) -> Result<HealthStatus>;
}

pub struct ApiClient {
  client: Client,
  config: ClientConfig,
}

impl ApiClient {
  pub fn new(config: ClientConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| FeedbackError::network(format!("failed to create HTTP client: {e}")))?;

    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }

  async fn send(&self, request: reqwest::RequestBuilder, secs: u64) -> Result<Response> {
    let response = timeout(Duration::from_secs(secs), request.send())
      .await
      .map_err(|_| FeedbackError::network(format!("request timed out after {secs}s")))??;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(FeedbackError::status(status.as_u16(), body));
    }

    Ok(response)
  }

  async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| FeedbackError::decode(e.to_string()))
  }
}

#[async_trait]
impl FeedbackApi for ApiClient {
  async fn create_review(&self, review: &NewReview) -> Result<Review> {
    let request = self.client.post(self.url("/api/reviews")).json(review);
    let response = self.send(request, self.config.timeout_secs).await?;
    Self::decode(response).await
  }

  async fn list_reviews(&self, query: &ReviewQuery) -> Result<ReviewList> {
    let request = self.client.get(self.url("/api/reviews")).query(query);
    let response = self.send(request, self.config.timeout_secs).await?;
    Self::decode(response).await
  }

  async fn analytics(&self) -> Result<AnalyticsSummary> {
    let request = self.client.get(self.url("/api/analytics"));
    let response = self.send(request, self.config.timeout_secs).await?;
    Self::decode(response).await
  }

  async fn health(&self) -> Result<HealthStatus> {
    let request = self.client.get(self.url("/api/health"));
    let response = self.send(request, HEALTH_TIMEOUT_SECS).await?;
    Self::decode(response).await
  }
}

use crate::api::error::ApiError;
use crate::api::types::{Health, QuoteAck};
use crate::config::Settings;
use crate::domain::{DateRange, Listing, Recommendation};
use crate::time::calendar;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_BASE_URL: &str = "/api";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

// Every operation threads an explicit cancellation token; a fired token
// resolves the call to ApiError::Cancelled.
#[async_trait]
pub trait PricingApi: Send + Sync {
    async fn listings(&self, cancel: &CancellationToken) -> Result<Vec<Listing>, ApiError>;

    async fn listing(&self, id: &str, cancel: &CancellationToken) -> Result<Listing, ApiError>;

    async fn recommendations(
        &self,
        id: &str,
        range: DateRange,
        cancel: &CancellationToken,
    ) -> Result<Vec<Recommendation>, ApiError>;

    async fn trigger_quote(
        &self,
        payload: &Value,
        cancel: &CancellationToken,
    ) -> Result<QuoteAck, ApiError>;

    async fn health(&self, cancel: &CancellationToken) -> Result<Health, ApiError>;
}

#[derive(Debug, Clone)]
pub struct HttpApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(ApiError::Transport)?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ApiError> {
        let base_url = settings
            .api_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::with_timeout(base_url, Duration::from_secs(timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<T, ApiError> {
        let req = self.http.get(self.url(path)).query(query);
        let res = guarded(cancel, req.send()).await?;

        let status = res.status();
        let text = guarded(cancel, res.text()).await?;
        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str::<T>(&text).map_err(|err| ApiError::decode(err, &text))
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
        cancel: &CancellationToken,
    ) -> Result<T, ApiError> {
        let req = self.http.post(self.url(path)).json(body);
        let res = guarded(cancel, req.send()).await?;

        let status = res.status();
        let text = guarded(cancel, res.text()).await?;
        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str::<T>(&text).map_err(|err| ApiError::decode(err, &text))
    }
}

#[async_trait]
impl PricingApi for HttpApiClient {
    async fn listings(&self, cancel: &CancellationToken) -> Result<Vec<Listing>, ApiError> {
        self.get_json("/listings/", &[], cancel).await
    }

    async fn listing(&self, id: &str, cancel: &CancellationToken) -> Result<Listing, ApiError> {
        self.get_json(&format!("/listings/{id}/"), &[], cancel).await
    }

    async fn recommendations(
        &self,
        id: &str,
        range: DateRange,
        cancel: &CancellationToken,
    ) -> Result<Vec<Recommendation>, ApiError> {
        let query = [
            ("from", calendar::to_iso(range.from)),
            ("to", calendar::to_iso(range.to)),
        ];
        self.get_json(&format!("/listings/{id}/recommendations/"), &query, cancel)
            .await
    }

    async fn trigger_quote(
        &self,
        payload: &Value,
        cancel: &CancellationToken,
    ) -> Result<QuoteAck, ApiError> {
        self.post_json("/llm/quote/", payload, cancel).await
    }

    async fn health(&self, cancel: &CancellationToken) -> Result<Health, ApiError> {
        self.get_json("/health/", &[], cancel).await
    }
}

// Dropping the in-flight future aborts the request when the transport allows
// it; abort is best-effort, so callers still discard late results themselves.
async fn guarded<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, reqwest::Error>>,
) -> Result<T, ApiError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApiError::Cancelled),
        res = fut => res.map_err(ApiError::Transport),
    }
}

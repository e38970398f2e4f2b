use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// HTTP client for the PostgREST-style document store. Each service owns a
/// handle injected at construction; the service key is process-wide state
/// loaded once from the environment.
pub struct StoreClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl StoreClient {
    pub fn new(base_url: String, service_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url,
            service_key,
        }
    }

    fn headers(&self, returning: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.service_key).unwrap());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.service_key)).unwrap(),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if returning {
            headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        }

        headers
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> reqwest::Result<reqwest::Response> {
        let returning = method != Method::GET;
        let mut req = self
            .client
            .request(method, url)
            .headers(self.headers(returning));

        if let Some(body_data) = body {
            req = req.json(body_data);
        }

        req.send().await
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Store request: {} {}", method, url);

        // Single retry on transport-level failures; HTTP errors are not retried.
        let response = match self.send_once(method.clone(), &url, body.as_ref()).await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() || e.is_connect() => {
                warn!("Store request failed ({}), retrying once", e);
                self.send_once(method, &url, body.as_ref()).await?
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("Store error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Store authentication error: {}", error_text),
                404 => anyhow!("Resource not found: {}", error_text),
                _ => anyhow!("Store error ({}): {}", status, error_text),
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    pub async fn select(&self, path: &str) -> Result<Vec<Value>> {
        self.request(Method::GET, path, None).await
    }

    pub async fn insert(&self, path: &str, body: Value) -> Result<Vec<Value>> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// Insert that treats a uniqueness conflict as `Ok(None)` rather than an
    /// error. Used for lock rows where losing the race is an expected outcome.
    pub async fn try_insert(&self, path: &str, body: Value) -> Result<Option<Vec<Value>>> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Store conditional insert: {}", url);

        let response = match self.send_once(Method::POST, &url, Some(&body)).await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() || e.is_connect() => {
                warn!("Store insert failed ({}), retrying once", e);
                self.send_once(Method::POST, &url, Some(&body)).await?
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        if status == StatusCode::CONFLICT {
            return Ok(None);
        }
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("Store error ({}): {}", status, error_text);
            return Err(anyhow!("Store error ({}): {}", status, error_text));
        }

        let data = response.json().await?;
        Ok(Some(data))
    }

    /// PATCH matching rows, returning the updated representation. An empty
    /// result means no row matched the filter.
    pub async fn update(&self, path: &str, body: Value) -> Result<Vec<Value>> {
        self.request(Method::PATCH, path, Some(body)).await
    }

    /// DELETE matching rows, returning the deleted representation.
    pub async fn delete(&self, path: &str) -> Result<Vec<Value>> {
        self.request(Method::DELETE, path, None).await
    }
}

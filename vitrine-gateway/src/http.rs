//! reqwest-backed [`DataProvider`].

use async_trait::async_trait;
use std::time::Duration;

use vitrine_core::{DataProvider, FetchError, Method, ProviderRequest, ProviderResponse};

/// Sends provider requests to `base_url` over HTTP.
///
/// Parameters become the query string, the body is sent as JSON. Any
/// status is returned as a response; only transport failures are errors.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                FetchError::transport(base_url, format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a provider address.
    pub fn url_for(&self, address: &str) -> String {
        if address.starts_with('/') {
            format!("{}{}", self.base_url, address)
        } else {
            format!("{}/{}", self.base_url, address)
        }
    }
}

fn http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl DataProvider for HttpProvider {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, FetchError> {
        let mut builder = self
            .client
            .request(http_method(request.method), self.url_for(&request.address));

        let query = request.query_pairs();
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::transport(&request.address, e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::transport(&request.address, e))?;

        tracing::trace!(
            method = %request.method,
            address = %request.address,
            status,
            "provider response"
        );
        Ok(ProviderResponse::new(status, body))
    }
}

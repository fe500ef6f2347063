use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::common::{start_token, ApiErrorDetails, ApiErrorResponse, ApiQueryParams, Paginated};
use super::error::ApiError;

pub const DEFAULT_API_VERSION: &str = "2024-11-12";
const PAGE_LIMIT: u32 = 50;
const MERGE_PATCH: &str = "application/merge-patch+json";

/// VPC API client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    auth_header: String,
    api_version: String,
    retry_config: RetryConfig,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            timeout_seconds: 30,
        }
    }
}

impl RetryConfig {
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(
            self.initial_backoff_ms
                .saturating_mul(factor)
                .min(self.max_backoff_ms),
        )
    }
}

impl Client {
    /// Create a new API client with default retry configuration
    pub fn new(endpoint: &str, api_token: &str, api_version: &str) -> Result<Self, ApiError> {
        Self::with_config(endpoint, api_token, api_version, RetryConfig::default())
    }

    pub fn with_config(
        endpoint: &str,
        api_token: &str,
        api_version: &str,
        retry_config: RetryConfig,
    ) -> Result<Self, ApiError> {
        let base_url = endpoint.trim_end_matches('/').to_string();
        url::Url::parse(&base_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", endpoint, e)))?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(retry_config.timeout_seconds))
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                auth_header: format!("Bearer {}", api_token),
                api_version: api_version.to_string(),
                retry_config,
            }),
        })
    }

    pub fn load_balancers(&self) -> crate::api::load_balancers::LoadBalancersApi<'_> {
        crate::api::load_balancers::LoadBalancersApi::new(self)
    }

    pub fn subnets(&self) -> crate::api::subnets::SubnetsApi<'_> {
        crate::api::subnets::SubnetsApi::new(self)
    }

    pub fn virtual_network_interfaces(
        &self,
    ) -> crate::api::virtual_network_interfaces::VirtualNetworkInterfacesApi<'_> {
        crate::api::virtual_network_interfaces::VirtualNetworkInterfacesApi::new(self)
    }

    pub fn instances(&self) -> crate::api::instances::InstancesApi<'_> {
        crate::api::instances::InstancesApi::new(self)
    }

    pub fn bare_metal_servers(&self) -> crate::api::bare_metal_servers::BareMetalServersApi<'_> {
        crate::api::bare_metal_servers::BareMetalServersApi::new(self)
    }

    fn request(&self, method: Method, path: &str, params: &ApiQueryParams) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.inner.base_url, path);
        tracing::debug!("{} request to: {}", method, url);

        self.inner
            .http_client
            .request(method, &url)
            .header(AUTHORIZATION, &self.inner.auth_header)
            .header(ACCEPT, "application/json")
            .query(&[
                ("version", self.inner.api_version.as_str()),
                ("generation", "2"),
            ])
            .query(params.pairs())
    }

    /// Execute a GET request with retry logic
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ApiError> {
        self.get_with_params(path, &ApiQueryParams::new()).await
    }

    pub async fn get_with_params<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &ApiQueryParams,
    ) -> Result<T, ApiError> {
        let response = self
            .execute_with_retry(|| self.request(Method::GET, path, params).send(), path)
            .await?;
        self.parse_success_response(response).await
    }

    /// Execute a POST request with retry logic
    pub async fn post<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .execute_with_retry(
                || {
                    self.request(Method::POST, path, &ApiQueryParams::new())
                        .json(body)
                        .send()
                },
                path,
            )
            .await?;
        self.parse_success_response(response).await
    }

    /// POST to an action endpoint that answers without a body
    pub async fn post_action<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        self.execute_with_retry(
            || {
                self.request(Method::POST, path, &ApiQueryParams::new())
                    .json(body)
                    .send()
            },
            path,
        )
        .await?;
        Ok(())
    }

    /// Execute a merge-patch PATCH request with retry logic
    pub async fn patch<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let payload = serde_json::to_vec(body)
            .map_err(|e| ApiError::ParseError(format!("Failed to encode patch: {}", e)))?;
        let response = self
            .execute_with_retry(
                || {
                    self.request(Method::PATCH, path, &ApiQueryParams::new())
                        .header(CONTENT_TYPE, MERGE_PATCH)
                        .body(payload.clone())
                        .send()
                },
                path,
            )
            .await?;
        self.parse_success_response(response).await
    }

    /// Execute a DELETE request with retry logic
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute_with_retry(
            || self.request(Method::DELETE, path, &ApiQueryParams::new()).send(),
            path,
        )
        .await?;
        Ok(())
    }

    /// Follow `next.href` links until the collection is exhausted
    pub async fn list_all<P: Paginated>(
        &self,
        path: &str,
        params: &ApiQueryParams,
    ) -> Result<Vec<P::Item>, ApiError> {
        let mut items = Vec::new();
        let mut start: Option<String> = None;

        loop {
            let page_params = params
                .clone()
                .add("limit", PAGE_LIMIT)
                .add_optional("start", start.as_deref());
            let page: P = self.get_with_params(path, &page_params).await?;
            let (mut page_items, next) = page.into_page();
            items.append(&mut page_items);

            let next_start = match next {
                Some(next) => start_token(&next)?,
                None => None,
            };
            match next_start {
                None => break,
                Some(token) if start.as_deref() == Some(token.as_str()) => {
                    return Err(ApiError::ParseError(format!(
                        "pagination of {} repeated start token {}",
                        path, token
                    )));
                }
                Some(token) => start = Some(token),
            }
        }

        tracing::debug!("Listed {} items from {}", items.len(), path);
        Ok(items)
    }

    /// Execute request with retry logic, returning the successful response
    async fn execute_with_retry<F, Fut>(
        &self,
        request_fn: F,
        path: &str,
    ) -> Result<reqwest::Response, ApiError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let retry = &self.inner.retry_config;
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= retry.max_retries {
            if attempt > 0 {
                let backoff = retry.backoff(attempt);
                tracing::debug!(
                    "Retrying request to {} after {:?} (attempt {})",
                    path,
                    backoff,
                    attempt
                );
                tokio::time::sleep(backoff).await;
            }

            match request_fn().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    match status {
                        StatusCode::UNAUTHORIZED => return Err(ApiError::AuthError),
                        StatusCode::TOO_MANY_REQUESTS => last_error = Some(ApiError::RateLimited),
                        StatusCode::BAD_GATEWAY
                        | StatusCode::SERVICE_UNAVAILABLE
                        | StatusCode::GATEWAY_TIMEOUT => {
                            last_error = Some(ApiError::ServiceUnavailable)
                        }
                        _ => return Err(self.error_from_response(response).await),
                    }
                }
                Err(e) => {
                    if e.is_connect() {
                        last_error = Some(ApiError::RequestError(e));
                    } else if e.is_timeout() {
                        return Err(ApiError::Timeout(retry.timeout_seconds));
                    } else {
                        return Err(ApiError::RequestError(e));
                    }
                }
            }

            attempt += 1;
        }

        Err(last_error.unwrap_or(ApiError::ServiceUnavailable))
    }

    async fn parse_success_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        tracing::debug!("API response body: {}", text);

        serde_json::from_str::<T>(&text).map_err(|e| {
            tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
            ApiError::ParseError(format!("Failed to parse response: {}", e))
        })
    }

    async fn error_from_response(&self, response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        match serde_json::from_str::<ApiErrorResponse>(&text) {
            Ok(body) if !body.errors.is_empty() => {
                let details = ApiErrorDetails::from(body);
                ApiError::ApiError {
                    status,
                    message: details.to_string(),
                    details: Some(Box::new(details)),
                }
            }
            _ => ApiError::ApiError {
                status,
                message: text,
                details: None,
            },
        }
    }
}

use std::time::Duration;

use futures_util::StreamExt;
use leadwatch_core::{ApiError, FailureKind, JobProgressSnapshot, JobResults};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::WatchSettings;

/// The scrape-job REST backend and the address of its progress socket.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn job_status(&self, job_id: &str) -> Result<JobProgressSnapshot, ApiError>;

    async fn job_results(&self, job_id: &str, timeout: Duration)
        -> Result<JobResults, ApiError>;

    /// Raw CSV export of the job's leads.
    async fn download_csv(&self, job_id: &str) -> Result<Vec<u8>, ApiError>;

    fn progress_socket_url(&self, job_id: &str) -> Result<Url, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    settings: WatchSettings,
    client: reqwest::Client,
}

impl ReqwestBackend {
    pub fn new(settings: WatchSettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    fn endpoint(&self, job_id: &str, leaf: &str) -> Result<Url, ApiError> {
        job_url(&self.settings.base_url, &["api", "scrape", job_id, leaf])
    }

    async fn get(&self, url: Url, timeout: Duration) -> Result<reqwest::Response, ApiError> {
        let mut request = self.client.get(url).timeout(timeout);
        if let Some(token) = &self.settings.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.bytes().await.unwrap_or_default();
        Err(http_error(status.as_u16(), &body))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        timeout: Duration,
    ) -> Result<T, ApiError> {
        let response = self.get(url, timeout).await?;
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        serde_json::from_slice(&body)
            .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
    }
}

#[async_trait::async_trait]
impl Backend for ReqwestBackend {
    async fn job_status(&self, job_id: &str) -> Result<JobProgressSnapshot, ApiError> {
        let url = self.endpoint(job_id, "status")?;
        self.get_json(url, self.settings.poll_timeout).await
    }

    async fn job_results(
        &self,
        job_id: &str,
        timeout: Duration,
    ) -> Result<JobResults, ApiError> {
        let url = self.endpoint(job_id, "results")?;
        self.get_json(url, timeout).await
    }

    async fn download_csv(&self, job_id: &str) -> Result<Vec<u8>, ApiError> {
        let url = self.endpoint(job_id, "download")?;
        let response = self.get(url, self.settings.results_timeout).await?;
        let max_bytes = self.settings.max_download_bytes;

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            if bytes.len() as u64 + chunk.len() as u64 > max_bytes {
                return Err(ApiError::new(
                    FailureKind::Decode,
                    format!("download exceeds {max_bytes} bytes"),
                ));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }

    fn progress_socket_url(&self, job_id: &str) -> Result<Url, ApiError> {
        let mut url = job_url(&self.settings.base_url, &["ws", "scrape", job_id])?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme).map_err(|()| {
            ApiError::new(FailureKind::InvalidUrl, format!("cannot use {scheme} for {url}"))
        })?;
        Ok(url)
    }
}

fn job_url(base: &Url, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| ApiError::new(FailureKind::InvalidUrl, format!("{base} cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Normalizes an HTTP error response into one kind and message.
///
/// The backend reports failures as `{"detail": ...}` where `detail` is either
/// a string or a list of validation entries, or occasionally `{"message": ...}`.
pub fn http_error(code: u16, body: &[u8]) -> ApiError {
    let kind = match code {
        404 => FailureKind::NotFound,
        401 => FailureKind::Unauthorized,
        other => FailureKind::HttpStatus(other),
    };
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| error_detail(&value))
        .unwrap_or_else(|| default_message(code));
    ApiError::new(kind, message)
}

fn error_detail(value: &Value) -> Option<String> {
    match value.get("detail").or_else(|| value.get("message"))? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Array(entries) => {
            let messages: Vec<&str> = entries
                .iter()
                .filter_map(|entry| entry.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        Value::Null | Value::String(_) => None,
        other => Some(other.to_string()),
    }
}

fn default_message(code: u16) -> String {
    match code {
        400 => "Invalid request. Please check your input and try again.".to_string(),
        401 => "Please log in to continue.".to_string(),
        403 => "You don't have permission to perform this action.".to_string(),
        404 => leadwatch_core::JOB_NOT_FOUND_MESSAGE.to_string(),
        429 => "Too many requests. Please try again later.".to_string(),
        500 => "Internal server error. Please try again later.".to_string(),
        503 => "Service unavailable. The server may be temporarily overloaded.".to_string(),
        other => format!("Request failed with status {other}. Please try again."),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(
            FailureKind::Timeout,
            format!("Request timed out. The server may be slow or unresponsive. ({err})"),
        );
    }
    if err.is_decode() {
        return ApiError::new(FailureKind::Decode, err.to_string());
    }
    if err.is_builder() {
        return ApiError::new(FailureKind::InvalidUrl, err.to_string());
    }
    ApiError::new(
        FailureKind::Network,
        format!("Unable to reach the API server. ({err})"),
    )
}

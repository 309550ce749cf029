//! Client for the job-style `.doc` conversion service.
//!
//! `POST {endpoint}/jobs` submits `{filename, base64, outputFormat}` and answers `{id}` (or an
//! immediate `{url, output}`); `GET {endpoint}/jobs/{id}` reports
//! `{status: queued|processing|finished|error, url?, output?, detail?}`.

use crate::config::{ConvertConfig, ENV_CONVERT_API_KEY, ENV_CONVERT_ENDPOINT};
use docscope_core::{ConversionBackend, ConversionError, ConversionOutcome, ConversionRequest};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct JobConversionClient {
    client: reqwest::Client,
    endpoint: url::Url,
    api_key: String,
    poll_interval: Duration,
    timeout: Duration,
}

#[derive(Debug, Default, Deserialize)]
struct JobResponse {
    id: Option<String>,
    status: Option<String>,
    url: Option<String>,
    output: Option<String>,
    detail: Option<String>,
}

impl JobResponse {
    fn outcome(self) -> Option<ConversionOutcome> {
        self.url.filter(|u| !u.trim().is_empty()).map(|url| ConversionOutcome {
            url,
            output: self.output,
        })
    }
}

enum JobState {
    Pending,
    Done(ConversionOutcome),
}

impl JobConversionClient {
    /// Client with its own HTTP stack; per-request stalls are bounded, the job as a whole by
    /// `cfg.timeout`.
    pub fn new(cfg: &ConvertConfig) -> Result<Self, ConversionError> {
        let client = reqwest::Client::builder()
            .user_agent("docscope-local/0.1")
            .redirect(reqwest::redirect::Policy::limited(5))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ConversionError::NotConfigured(e.to_string()))?;
        Self::from_config(client, cfg)
    }

    pub fn from_config(
        client: reqwest::Client,
        cfg: &ConvertConfig,
    ) -> Result<Self, ConversionError> {
        let endpoint = cfg
            .endpoint
            .as_deref()
            .ok_or_else(|| ConversionError::NotConfigured(format!("missing {ENV_CONVERT_ENDPOINT}")))?;
        let api_key = cfg
            .api_key
            .clone()
            .ok_or_else(|| ConversionError::NotConfigured(format!("missing {ENV_CONVERT_API_KEY}")))?;
        // A trailing slash makes `join("jobs")` append instead of replacing the last segment.
        let normalized = format!("{}/", endpoint.trim_end_matches('/'));
        let endpoint = url::Url::parse(&normalized)
            .map_err(|e| ConversionError::NotConfigured(format!("invalid endpoint: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            poll_interval: cfg.poll_interval,
            timeout: cfg.timeout,
        })
    }

    fn url(&self, path: &str) -> Result<url::Url, ConversionError> {
        self.endpoint
            .join(path)
            .map_err(|e| ConversionError::NotConfigured(format!("invalid endpoint path: {e}")))
    }

    async fn submit(&self, req: &ConversionRequest) -> Result<JobResponse, ConversionError> {
        let resp = self
            .client
            .post(self.url("jobs")?)
            .bearer_auth(&self.api_key)
            .json(req)
            .send()
            .await
            .map_err(|e| ConversionError::Transport(e.to_string()))?;
        let status = resp.status();
        let body: JobResponse = resp.json().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ConversionError::Rejected(format!(
                "HTTP {status}: {}",
                body.detail.unwrap_or_else(|| "no detail".to_string())
            )));
        }
        Ok(body)
    }

    async fn poll(&self, id: &str) -> Result<JobState, ConversionError> {
        let resp = self
            .client
            .get(self.url(&format!("jobs/{id}"))?)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ConversionError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ConversionError::Transport(format!("job status HTTP {status}")));
        }
        let body: JobResponse = resp
            .json()
            .await
            .map_err(|e| ConversionError::Transport(e.to_string()))?;
        let state = body.status.clone().unwrap_or_default();
        match state.as_str() {
            "finished" => body
                .outcome()
                .map(JobState::Done)
                .ok_or_else(|| ConversionError::JobFailed("finished without url".to_string())),
            "error" => Err(ConversionError::JobFailed(
                body.detail.unwrap_or_else(|| "unknown error".to_string()),
            )),
            other => {
                tracing::debug!(job = %id, status = other, "conversion pending");
                Ok(JobState::Pending)
            }
        }
    }

    async fn wait_for(&self, id: &str) -> Result<ConversionOutcome, ConversionError> {
        loop {
            tokio::time::sleep(self.poll_interval).await;
            if let JobState::Done(outcome) = self.poll(id).await? {
                return Ok(outcome);
            }
        }
    }
}

#[async_trait::async_trait]
impl ConversionBackend for JobConversionClient {
    fn name(&self) -> &'static str {
        "jobs"
    }

    async fn convert(&self, req: &ConversionRequest) -> Result<ConversionOutcome, ConversionError> {
        let t0 = Instant::now();
        let submitted = self.submit(req).await?;
        let id = match submitted.id.clone() {
            Some(id) if !id.trim().is_empty() => id,
            _ => {
                return submitted
                    .outcome()
                    .ok_or_else(|| ConversionError::Rejected("response had no job id".to_string()));
            }
        };
        tracing::debug!(job = %id, file = %req.filename, "conversion submitted");
        let remaining = self.timeout.saturating_sub(t0.elapsed());
        match tokio::time::timeout(remaining, self.wait_for(&id)).await {
            Ok(result) => result,
            Err(_) => Err(ConversionError::TimedOut {
                waited_ms: t0.elapsed().as_millis() as u64,
            }),
        }
    }

    async fn download(&self, outcome: &ConversionOutcome) -> Result<Vec<u8>, ConversionError> {
        let url = self
            .endpoint
            .join(&outcome.url)
            .map_err(|e| ConversionError::JobFailed(format!("invalid result url: {e}")))?;
        let same_origin = url.origin() == self.endpoint.origin();
        let mut req = self.client.get(url);
        if same_origin {
            req = req.bearer_auth(&self.api_key);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| ConversionError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ConversionError::Transport(format!("download HTTP {status}")));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ConversionError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

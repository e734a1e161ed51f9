use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context};
use reqwest::blocking::{multipart, Client};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::ServiceParams;

/// Endpoint each batched request is replayed against by the remote service.
pub const COMPLETIONS_ENDPOINT: &str = "/v1/chat/completions";

const TERMINAL_FAILURES: [&str; 4] = ["failed", "expired", "cancelling", "cancelled"];

const TIMEOUT_SECS: u64 = 60;
const ERROR_SNIPPET_MAX_CHARS: usize = 400;

#[derive(Clone, Debug)]
pub struct JobStatus {
    pub status: String,
    pub output_file_id: Option<String>,
}

impl JobStatus {
    pub fn is_success(&self) -> bool {
        self.status == "completed"
    }

    pub fn is_failure(&self) -> bool {
        TERMINAL_FAILURES.contains(&self.status.as_str())
    }
}

/// The four operations consumed from the remote translation service.
/// Everything else about the service is opaque to this crate.
pub trait TranslationService {
    /// Upload a job file as an opaque blob; returns the remote file id.
    fn upload_batch_file(&self, path: &Path) -> anyhow::Result<String>;

    /// Create a job referencing an uploaded file; returns the job id.
    fn create_job(&self, input_file_id: &str) -> anyhow::Result<String>;

    fn job_status(&self, job_id: &str) -> anyhow::Result<JobStatus>;

    fn download_output(&self, file_id: &str) -> anyhow::Result<Vec<u8>>;
}

pub struct HttpBatchService {
    client: Client,
    base_url: String,
    api_key: String,
    completion_window: String,
}

impl HttpBatchService {
    pub fn from_params(params: &ServiceParams) -> anyhow::Result<Self> {
        let api_key = std::env::var(&params.api_key_env)
            .with_context(|| format!("read api key from ${}", params.api_key_env))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url: params.base_url.trim_end_matches('/').to_string(),
            api_key,
            completion_window: params.completion_window.clone(),
        })
    }

    /// Read the body as text first so error messages survive a JSON
    /// decode failure, then deserialize on success.
    fn read_json<T: for<'de> Deserialize<'de>>(
        &self,
        resp: reqwest::blocking::Response,
        what: &str,
    ) -> anyhow::Result<T> {
        let status = resp.status();
        let text = resp
            .text()
            .with_context(|| format!("read {what} response"))?;
        if !status.is_success() {
            return Err(anyhow!(extract_error_message(status, &text)));
        }
        serde_json::from_str(&text).with_context(|| format!("parse {what} response"))
    }
}

#[derive(Debug, Deserialize)]
struct FileObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct BatchObject {
    id: String,
    status: String,
    #[serde(default)]
    output_file_id: Option<String>,
}

impl TranslationService for HttpBatchService {
    fn upload_batch_file(&self, path: &Path) -> anyhow::Result<String> {
        let form = multipart::Form::new()
            .text("purpose", "batch")
            .file("file", path)
            .with_context(|| format!("open job file: {}", path.display()))?;
        let resp = self
            .client
            .post(format!("{}/files", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .context("upload job file")?;
        let file: FileObject = self.read_json(resp, "file upload")?;
        Ok(file.id)
    }

    fn create_job(&self, input_file_id: &str) -> anyhow::Result<String> {
        let body = serde_json::json!({
            "input_file_id": input_file_id,
            "endpoint": COMPLETIONS_ENDPOINT,
            "completion_window": self.completion_window,
        });
        let resp = self
            .client
            .post(format!("{}/batches", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .context("create batch job")?;
        let job: BatchObject = self.read_json(resp, "job creation")?;
        Ok(job.id)
    }

    fn job_status(&self, job_id: &str) -> anyhow::Result<JobStatus> {
        let resp = self
            .client
            .get(format!("{}/batches/{job_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .with_context(|| format!("poll job {job_id}"))?;
        let job: BatchObject = self.read_json(resp, "job status")?;
        Ok(JobStatus {
            status: job.status,
            output_file_id: job.output_file_id,
        })
    }

    fn download_output(&self, file_id: &str) -> anyhow::Result<Vec<u8>> {
        let resp = self
            .client
            .get(format!("{}/files/{file_id}/content", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .with_context(|| format!("download result file {file_id}"))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().context("read download error body")?;
            return Err(anyhow!(extract_error_message(status, &text)));
        }
        let bytes = resp.bytes().context("read result file body")?;
        Ok(bytes.to_vec())
    }
}

fn extract_error_message(status: StatusCode, body_text: &str) -> String {
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(body_text) {
        if let Some(msg) = v
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return format!("HTTP {}: {}", status.as_u16(), msg);
        }
        if let Some(msg) = v.get("message").and_then(|m| m.as_str()) {
            return format!("HTTP {}: {}", status.as_u16(), msg);
        }
    }

    let trimmed = body_text.trim();
    let mut snippet: String = trimmed.chars().take(ERROR_SNIPPET_MAX_CHARS).collect();
    if snippet.len() < trimmed.len() {
        snippet.push_str("...");
    }
    format!("HTTP {}: {}", status.as_u16(), snippet)
}

use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::config::ModelParams;
use crate::pipeline::grouping::LocalizationMap;
use crate::service::COMPLETIONS_ENDPOINT;

/// One line of a job file: a chunk wrapped with its correlation id and
/// the request the service replays against the completions endpoint.
#[derive(Debug, Serialize)]
pub struct JobRequest {
    pub custom_id: String,
    pub method: String,
    pub url: String,
    pub body: RequestBody,
}

#[derive(Debug, Serialize)]
pub struct RequestBody {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub response_format: ResponseFormat,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct UserPayload<'a> {
    requested: &'a [String],
    data: &'a LocalizationMap,
}

/// Build one request per chunk. The custom id is
/// `<category>-<seq>-<run_stamp>`; it only has to be unique enough to
/// correlate results, the format carries no other meaning.
pub fn build_category_requests(
    category: &str,
    chunks: &[LocalizationMap],
    languages: &[String],
    model: &ModelParams,
    system_prompt: &str,
    run_stamp: u64,
) -> anyhow::Result<Vec<JobRequest>> {
    let mut requests = Vec::with_capacity(chunks.len());

    for (seq, chunk) in chunks.iter().enumerate() {
        let payload = UserPayload {
            requested: languages,
            data: chunk,
        };
        let user_message =
            serde_json::to_string(&payload).context("serialize request payload")?;

        requests.push(JobRequest {
            custom_id: format!("{category}-{seq}-{run_stamp}"),
            method: "POST".to_string(),
            url: COMPLETIONS_ENDPOINT.to_string(),
            body: RequestBody {
                model: model.name.clone(),
                temperature: model.temperature,
                max_tokens: model.max_tokens,
                response_format: ResponseFormat {
                    kind: "json_object".to_string(),
                },
                messages: vec![
                    ChatMessage {
                        role: "system".to_string(),
                        content: system_prompt.to_string(),
                    },
                    ChatMessage {
                        role: "user".to_string(),
                        content: user_message,
                    },
                ],
            },
        });
    }

    Ok(requests)
}

/// Language codes are sorted so the name is stable regardless of the
/// order the language list is configured in.
pub fn job_file_name(prefix: &str, category: &str, languages: &[String]) -> String {
    let mut langs: Vec<&str> = languages.iter().map(String::as_str).collect();
    langs.sort_unstable();
    format!("{prefix}-{category}-{}.jsonl", langs.join("-"))
}

/// Newline-delimited JSON, one request per line.
pub fn write_job_file(path: &Path, requests: &[JobRequest]) -> anyhow::Result<()> {
    let mut out = String::new();
    for request in requests {
        let line = serde_json::to_string(request).context("serialize job request")?;
        out.push_str(&line);
        out.push('\n');
    }
    std::fs::write(path, out).with_context(|| format!("write job file: {}", path.display()))?;
    Ok(())
}

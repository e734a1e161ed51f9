use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use regex::Regex;

/// key -> (language code -> translated string), merged across all result
/// lines and files of one run. BTreeMap keeps it sorted for output.
pub type CleanedMapping = BTreeMap<String, BTreeMap<String, String>>;

pub const CLEANED_RESPONSES_FILE: &str = "cleaned_responses.json";

/// Merge a run's downloaded result files into one mapping. Any line that
/// fails the outer or the embedded parse aborts the whole cleaning run;
/// there is no line-level skip.
pub fn clean_result_files(paths: &[PathBuf]) -> anyhow::Result<CleanedMapping> {
    let mut cleaned = CleanedMapping::new();

    for path in paths {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read result file: {}", path.display()))?;
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            merge_result_line(line, &mut cleaned)
                .with_context(|| format!("{}:{}", path.display(), lineno + 1))?;
        }
    }

    Ok(cleaned)
}

/// A result line nests the actual translations twice: the record's
/// message content is itself a JSON-encoded key -> {lang -> text}
/// object. Later lines overwrite earlier ones on key collision.
fn merge_result_line(line: &str, cleaned: &mut CleanedMapping) -> anyhow::Result<()> {
    let record: serde_json::Value =
        serde_json::from_str(line).context("parse result line")?;

    let content = record
        .get("response")
        .and_then(|r| r.get("body"))
        .and_then(|b| b.get("choices"))
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow!("missing response.body.choices[0].message.content"))?;

    let translations: CleanedMapping =
        serde_json::from_str(content).context("parse embedded translation payload")?;
    cleaned.extend(translations);

    Ok(())
}

/// Pretty-printed with a trailing newline; serde_json leaves non-ASCII
/// characters unescaped.
pub fn write_cleaned_responses(path: &Path, cleaned: &CleanedMapping) -> anyhow::Result<()> {
    let mut text =
        serde_json::to_string_pretty(cleaned).context("serialize cleaned responses")?;
    text.push('\n');
    std::fs::write(path, text)
        .with_context(|| format!("write cleaned responses: {}", path.display()))?;
    Ok(())
}

/// Result files of a run, `<prefix>-<category>-<langs>-results.jsonl`,
/// in name order.
pub fn find_result_files(results_dir: &Path, prefix: &str) -> anyhow::Result<Vec<PathBuf>> {
    let pattern = Regex::new(&format!(r"^{}-.+-results\.jsonl$", regex::escape(prefix)))
        .context("result file pattern")?;

    let mut files = Vec::new();
    let entries = std::fs::read_dir(results_dir)
        .with_context(|| format!("read results dir: {}", results_dir.display()))?;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("read results dir: {}", results_dir.display()))?;
        if let Some(name) = entry.file_name().to_str() {
            if pattern.is_match(name) {
                files.push(entry.path());
            }
        }
    }
    files.sort();

    Ok(files)
}

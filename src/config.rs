use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub languages: LanguagesSection,
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub service: ServiceSection,
    #[serde(default)]
    pub prompts: PromptsSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PipelineSection {
    /// Root directory holding one timestamped subdirectory per run.
    #[serde(default)]
    pub batch_root: Option<String>,

    /// Prefix of generated job file names.
    #[serde(default)]
    pub job_file_prefix: Option<String>,

    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct LanguagesSection {
    /// Target language codes (ll_CC). One translation per code per key.
    #[serde(default)]
    pub targets: Option<Vec<String>>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ModelSection {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ServiceSection {
    #[serde(default)]
    pub base_url: Option<String>,

    /// Name of the environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default)]
    pub completion_window: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PromptsSection {
    #[serde(default)]
    pub translate_batch: Option<String>,

    /// Words the model must leave untranslated.
    #[serde(default)]
    pub keep_terms: Option<Vec<String>>,
}

/// Model parameters resolved from config + defaults.
#[derive(Clone, Debug)]
pub struct ModelParams {
    pub name: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct ServiceParams {
    pub base_url: String,
    pub api_key_env: String,
    pub completion_window: String,
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 8) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::{load_config, AppConfig};

    #[test]
    fn parses_all_sections() {
        let text = r#"
[pipeline]
batch_root = "out"
job_file_prefix = "demo"
poll_interval_secs = 3

[languages]
targets = ["de_DE", "hu_HU"]

[model]
name = "gpt-4o-2024-08-06"
temperature = 0.1
max_tokens = 16384

[service]
base_url = "https://example.test/v1"
api_key_env = "DEMO_KEY"
completion_window = "24h"

[prompts]
translate_batch = "prompts/translate_batch.txt"
keep_terms = ["guild"]
"#;
        let cfg: AppConfig = toml::from_str(text).expect("parse config");
        assert_eq!(cfg.pipeline.batch_root.as_deref(), Some("out"));
        assert_eq!(cfg.pipeline.poll_interval_secs, Some(3));
        assert_eq!(
            cfg.languages.targets.as_deref(),
            Some(&["de_DE".to_string(), "hu_HU".to_string()][..])
        );
        assert_eq!(cfg.model.max_tokens, Some(16384));
        assert_eq!(cfg.service.api_key_env.as_deref(), Some("DEMO_KEY"));
        assert_eq!(cfg.prompts.keep_terms.as_deref(), Some(&["guild".to_string()][..]));
    }

    #[test]
    fn empty_config_is_all_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("parse empty config");
        assert!(cfg.pipeline.batch_root.is_none());
        assert!(cfg.languages.targets.is_none());
        assert!(cfg.model.name.is_none());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = load_config(std::path::Path::new("does-not-exist.toml"))
            .expect_err("missing file");
        assert!(err.to_string().contains("read config"));
    }
}

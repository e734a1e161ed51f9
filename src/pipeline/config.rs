use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use crate::config::{
    find_default_config, load_config, AppConfig, ModelParams, ServiceParams,
};
use crate::pipeline::prompts::{default_prompt_files, PromptSet, DEFAULT_PROMPTS_DIR};

pub const CONFIG_FILE_NAME: &str = "locbatch.toml";
pub const CONFIG_ENV_VAR: &str = "LOCBATCH_CONFIG";

pub const DEFAULT_BATCH_ROOT: &str = "batch_files";
pub const DEFAULT_JOB_FILE_PREFIX: &str = "config-translation";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

pub const DEFAULT_MODEL_NAME: &str = "gpt-4o-2024-08-06";
pub const DEFAULT_TEMPERATURE: f64 = 0.1;
pub const DEFAULT_MAX_TOKENS: u32 = 16384;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_COMPLETION_WINDOW: &str = "24h";

pub fn default_languages() -> Vec<String> {
    [
        "hu_HU", "nl_NL", "pl_PL", "es_ES", "fr_FR", "de_DE", "it_IT", "pt_PT", "ru_RU",
        "ja_JP", "ko_KR", "zh_CN", "zh_TW",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Fully resolved settings for one invocation: config file values,
/// command-line overrides, and defaults folded together.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub config_path: PathBuf,
    pub batch_root: PathBuf,
    pub job_file_prefix: String,
    pub poll_interval: Duration,
    pub languages: Vec<String>,
    pub model: ModelParams,
    pub service: ServiceParams,
    pub prompts: PromptSet,
}

impl PipelineConfig {
    pub fn from_args(
        config_path: Option<PathBuf>,
        batch_root: Option<PathBuf>,
        poll_interval_secs: Option<u64>,
    ) -> anyhow::Result<Self> {
        let cfg_file = config_path
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
            .or_else(|| find_default_config(CONFIG_FILE_NAME));

        let mut file_cfg = AppConfig::default();
        if let Some(p) = cfg_file.as_ref() {
            if p.exists() {
                file_cfg = load_config(p)?;
            }
        }
        let cfg_path = cfg_file.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

        Self::resolve(file_cfg, cfg_path, batch_root, poll_interval_secs)
    }

    pub(crate) fn resolve(
        file_cfg: AppConfig,
        config_path: PathBuf,
        batch_root: Option<PathBuf>,
        poll_interval_secs: Option<u64>,
    ) -> anyhow::Result<Self> {
        let batch_root = batch_root
            .or_else(|| file_cfg.pipeline.batch_root.clone().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BATCH_ROOT));

        let job_file_prefix = file_cfg
            .pipeline
            .job_file_prefix
            .clone()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_JOB_FILE_PREFIX.to_string());

        let poll_interval = Duration::from_secs(
            poll_interval_secs
                .or(file_cfg.pipeline.poll_interval_secs)
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
                .max(1),
        );

        let languages = file_cfg
            .languages
            .targets
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(default_languages);

        let model = ModelParams {
            name: file_cfg
                .model
                .name
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
            temperature: file_cfg.model.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: file_cfg.model.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        };

        let service = ServiceParams {
            base_url: file_cfg
                .service
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key_env: file_cfg
                .service
                .api_key_env
                .clone()
                .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string()),
            completion_window: file_cfg
                .service
                .completion_window
                .clone()
                .unwrap_or_else(|| DEFAULT_COMPLETION_WINDOW.to_string()),
        };

        let prompts = PromptSet::load(&config_path, &file_cfg).context("load prompts")?;

        Ok(Self {
            config_path,
            batch_root,
            job_file_prefix,
            poll_interval,
            languages,
            model,
            service,
            prompts,
        })
    }
}

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILE_NAME);

    let prompts_dir = dir.join(DEFAULT_PROMPTS_DIR);
    std::fs::create_dir_all(&prompts_dir)
        .with_context(|| format!("create prompts dir: {}", prompts_dir.display()))?;

    for (fname, body) in default_prompt_files() {
        let p = prompts_dir.join(fname);
        if p.exists() && !force {
            continue;
        }
        std::fs::write(&p, body).with_context(|| format!("write prompt: {}", p.display()))?;
    }

    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }

    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

const DEFAULT_CONFIG_TOML: &str = r#"[pipeline]
batch_root = "batch_files"
job_file_prefix = "config-translation"
# Seconds between job status polls.
poll_interval_secs = 10

[languages]
targets = [
  "hu_HU", "nl_NL", "pl_PL", "es_ES", "fr_FR", "de_DE", "it_IT",
  "pt_PT", "ru_RU", "ja_JP", "ko_KR", "zh_CN", "zh_TW",
]

[model]
name = "gpt-4o-2024-08-06"
temperature = 0.1
max_tokens = 16384

[service]
base_url = "https://api.openai.com/v1"
# Name of the environment variable holding the API key.
api_key_env = "OPENAI_API_KEY"
completion_window = "24h"

[prompts]
translate_batch = "prompts/translate_batch.txt"
# Words the model must leave untranslated.
keep_terms = ["lootrun", "class", "guild", "wynntils", "hades"]
"#;

#[cfg(test)]
mod tests {
    use super::{init_default_config, PipelineConfig, DEFAULT_JOB_FILE_PREFIX};
    use crate::config::AppConfig;

    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn empty_config_resolves_to_defaults() {
        let cfg = PipelineConfig::resolve(
            AppConfig::default(),
            PathBuf::from("locbatch.toml"),
            None,
            None,
        )
        .expect("resolve");

        assert_eq!(cfg.batch_root, PathBuf::from("batch_files"));
        assert_eq!(cfg.job_file_prefix, DEFAULT_JOB_FILE_PREFIX);
        assert_eq!(cfg.poll_interval, Duration::from_secs(10));
        assert_eq!(cfg.languages.len(), 13);
        assert_eq!(cfg.model.name, "gpt-4o-2024-08-06");
        assert_eq!(cfg.service.api_key_env, "OPENAI_API_KEY");
        assert!(!cfg.prompts.translate_batch.is_empty());
    }

    #[test]
    fn cli_overrides_beat_config_values() {
        let mut file_cfg = AppConfig::default();
        file_cfg.pipeline.batch_root = Some("from_file".to_string());
        file_cfg.pipeline.poll_interval_secs = Some(30);

        let cfg = PipelineConfig::resolve(
            file_cfg,
            PathBuf::from("locbatch.toml"),
            Some(PathBuf::from("from_cli")),
            Some(2),
        )
        .expect("resolve");

        assert_eq!(cfg.batch_root, PathBuf::from("from_cli"));
        assert_eq!(cfg.poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn poll_interval_has_a_floor_of_one_second() {
        let cfg = PipelineConfig::resolve(
            AppConfig::default(),
            PathBuf::from("locbatch.toml"),
            None,
            Some(0),
        )
        .expect("resolve");
        assert_eq!(cfg.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn init_writes_config_and_prompt_then_resolves() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = init_default_config(dir.path(), false).expect("init");
        assert!(cfg_path.exists());
        assert!(dir.path().join("prompts/translate_batch.txt").exists());

        let file_cfg = crate::config::load_config(&cfg_path).expect("load");
        let cfg = PipelineConfig::resolve(file_cfg, cfg_path, None, None).expect("resolve");
        assert_eq!(cfg.languages[0], "hu_HU");
        assert!(cfg.prompts.translate_batch.contains("lootrun"));
    }

    #[test]
    fn init_keeps_existing_files_without_force() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("locbatch.toml");
        std::fs::write(&cfg_path, "# my config\n").expect("seed");

        init_default_config(dir.path(), false).expect("init");
        let text = std::fs::read_to_string(&cfg_path).expect("read");
        assert_eq!(text, "# my config\n");

        init_default_config(dir.path(), true).expect("init force");
        let text = std::fs::read_to_string(&cfg_path).expect("read");
        assert!(text.contains("[pipeline]"));
    }
}

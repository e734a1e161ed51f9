use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};

use crate::config::AppConfig;

pub const DEFAULT_PROMPTS_DIR: &str = "prompts";
pub const DEFAULT_TRANSLATE_BATCH: &str = "translate_batch.txt";

/// The system instruction sent with every batched request, with config
/// variables already rendered in.
#[derive(Clone, Debug)]
pub struct PromptSet {
    pub translate_batch: String,
}

impl PromptSet {
    /// Load the prompt template and render `{{keep_terms}}`. A path named
    /// in the config must exist; with no config entry the default file is
    /// used when present, otherwise the embedded default text.
    pub fn load(config_path: &Path, cfg: &AppConfig) -> anyhow::Result<Self> {
        let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

        let template = match cfg.prompts.translate_batch.as_deref() {
            Some(rel) => {
                let mut p = PathBuf::from(rel);
                if p.is_relative() {
                    p = config_dir.join(&p);
                }
                if !p.exists() {
                    return Err(anyhow!(
                        "prompt file not found: {} (run: locbatch --init-config)",
                        p.display()
                    ));
                }
                std::fs::read_to_string(&p)
                    .with_context(|| format!("read prompt: {}", p.display()))?
            }
            None => {
                let p = config_dir
                    .join(DEFAULT_PROMPTS_DIR)
                    .join(DEFAULT_TRANSLATE_BATCH);
                if p.exists() {
                    std::fs::read_to_string(&p)
                        .with_context(|| format!("read prompt: {}", p.display()))?
                } else {
                    DEFAULT_TRANSLATE_BATCH_TEXT.to_string()
                }
            }
        };

        let keep_terms = cfg
            .prompts
            .keep_terms
            .clone()
            .unwrap_or_else(default_keep_terms);
        let quoted: Vec<String> = keep_terms.iter().map(|t| format!("\"{t}\"")).collect();
        let translate_batch = render_template(&template, &[("keep_terms", &quoted.join(", "))]);

        Ok(Self { translate_batch })
    }
}

pub fn default_keep_terms() -> Vec<String> {
    ["lootrun", "class", "guild", "wynntils", "hades"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (k, v) in vars {
        let pat = format!("{{{{{k}}}}}");
        out = out.replace(&pat, v);
    }
    out
}

pub fn default_prompt_files() -> Vec<(&'static str, &'static str)> {
    vec![(DEFAULT_TRANSLATE_BATCH, DEFAULT_TRANSLATE_BATCH_TEXT)]
}

pub const DEFAULT_TRANSLATE_BATCH_TEXT: &str = r#"You are an excellent translator. You always try to be as accurate as possible.
You MUST translate all the localization lines you receive.

You are given a JSON file, which is a list of localization strings,
in american english, and your job is to translate it into the requested language.
The localization strings are related to each other, most of the time, they refer to a single feature.
You can reword the strings if needed, but you need to keep the original meaning.
The localization also has format strings (%s, %d, etc.), you need to keep them in the translated string,
in a way that it makes sense in the requested language.
Try to use a language that is suitable for an MMORPG game.

None of these words should be translated: {{keep_terms}}.
Do not translate the localization keys, only the localization strings.
Do not translate strings in (escaped) quotes, only the remaining text.

The requested language code is either a single string, or an array of strings, in ISO 639-1 language code format.

You are only allowed to answer as a JSON object, where the keys are the original localization keys,
and the values are an object with the requested language code as the key, and the translated string as the value.

Input JSON format:
```
{
   "requested": ["hu_HU", "de_DE"],
   "data":{
      "command.wynntils.bomb.description": "List previously announced bombs",
      "command.wynntils.bomb.clickHere": "Click here to confirm."
      ...
   }
}
```

Output JSON format:
```
{
    "command.wynntils.bomb.description": {
        "hu_HU": "Listázza a korábban bejelentett bombákat",
        "de_DE": "Liste zuvor angekündigter Bomben"
        ...
    },
    "command.wynntils.bomb.clickHere": {
        "hu_HU": "Kattintson ide a megerősítéshez.",
        "de_DE": "Klicken Sie hier, um zu bestätigen."
        ...
    },
    ...
}
```
"#;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;

use crate::pipeline::clean::CleanedMapping;

/// Explode the cleaned mapping into one `<lang>.json` per language code.
/// Each (key, lang) pair is applied as its own read-modify-write so the
/// file on disk is valid sorted JSON after every single update.
pub fn write_language_files(cleaned: &CleanedMapping, output_dir: &Path) -> anyhow::Result<()> {
    for (loc_key, loc_values) in cleaned {
        for (lang, loc_value) in loc_values {
            update_language_file(output_dir, lang, loc_key, loc_value)?;
        }
    }
    Ok(())
}

/// Set one key in one language file, creating the file as an empty
/// object first if needed. The whole mapping is rewritten sorted.
pub fn update_language_file(
    dir: &Path,
    lang: &str,
    key: &str,
    value: &str,
) -> anyhow::Result<()> {
    let path = dir.join(format!("{lang}.json"));

    let mut lang_data: BTreeMap<String, String> = if path.exists() {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("read language file: {}", path.display()))?;
        if text.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_json::from_str(&text)
                .with_context(|| format!("parse language file: {}", path.display()))?
        }
    } else {
        BTreeMap::new()
    };

    lang_data.insert(key.to_string(), value.to_string());

    let mut text =
        serde_json::to_string_pretty(&lang_data).context("serialize language file")?;
    text.push('\n');
    std::fs::write(&path, text)
        .with_context(|| format!("write language file: {}", path.display()))?;

    Ok(())
}

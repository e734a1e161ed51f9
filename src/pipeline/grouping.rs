use anyhow::bail;
use indexmap::IndexMap;

/// Flat localization map as loaded from the source file. Insertion order
/// is the file order and is preserved through grouping and chunking.
pub type LocalizationMap = IndexMap<String, String>;

/// category -> feature -> (key -> value)
pub type GroupedMap = IndexMap<String, IndexMap<String, LocalizationMap>>;

/// One request payload carries at most this many entries.
pub const MAX_CHUNK_ENTRIES: usize = 50;

/// Group a flat localization map by category and feature. Keys are
/// dot-delimited, `<category>.<project>.<feature>.<rest>`; segment 0 is
/// the category, segment 2 the feature. Keys are expected to be unique
/// across the whole map.
pub fn group_by_category(data: &LocalizationMap) -> anyhow::Result<GroupedMap> {
    let mut grouped = GroupedMap::new();

    for (key, value) in data {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.len() < 3 {
            bail!("localization key has fewer than 3 dot segments: {key}");
        }

        grouped
            .entry(parts[0].to_string())
            .or_default()
            .entry(parts[2].to_string())
            .or_default()
            .insert(key.clone(), value.clone());
    }

    Ok(grouped)
}

/// Flatten a category's features in grouping order and partition into
/// chunks of at most [`MAX_CHUNK_ENTRIES`] entries; the last chunk may be
/// smaller. Chunk boundaries do not respect feature boundaries, so one
/// feature's entries can land in two chunks.
pub fn split_category(features: &IndexMap<String, LocalizationMap>) -> Vec<LocalizationMap> {
    let mut chunks: Vec<LocalizationMap> = Vec::new();
    let mut current = LocalizationMap::new();

    for lines in features.values() {
        for (key, value) in lines {
            current.insert(key.clone(), value.clone());
            if current.len() >= MAX_CHUNK_ENTRIES {
                chunks.push(std::mem::take(&mut current));
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

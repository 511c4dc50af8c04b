//! Label maps to backend `key:value` tags and back

use coffer_core::{ProviderError, Result};
use std::collections::BTreeMap;

const COMPONENT: &str = "rest-labels";

/// Separator between label key and value inside a tag
pub const TAG_SEPARATOR: char = ':';

/// Encode labels as tags; keys must be non-empty and free of `:`
pub fn labels_to_tags(labels: &BTreeMap<String, String>) -> Result<Vec<String>> {
    labels
        .iter()
        .map(|(key, value)| {
            if key.is_empty() || key.contains(TAG_SEPARATOR) {
                return Err(ProviderError::invalid_config(
                    COMPONENT,
                    "label keys must be non-empty and must not contain ':'",
                )
                .with_context("label", key.as_str()));
            }
            Ok(format!("{}{}{}", key, TAG_SEPARATOR, value))
        })
        .collect()
}

/// Decode tags; a tag without `:` becomes a label with an empty value
pub fn tags_to_labels(tags: &[String]) -> BTreeMap<String, String> {
    tags.iter()
        .map(|tag| match tag.split_once(TAG_SEPARATOR) {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (tag.clone(), String::new()),
        })
        .collect()
}

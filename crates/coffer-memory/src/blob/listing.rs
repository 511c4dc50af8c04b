//! Lexicographic object listing with delimiter grouping

use super::StoredObject;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as TOKEN_ENCODING, Engine};
use coffer_core::types::{ListObjectsOutput, ListObjectsRequest, MAX_PAGE_SIZE};
use coffer_core::{ProviderError, Result};
use std::collections::BTreeMap;

const COMPONENT: &str = "blob";

enum Entry<'a> {
    Object(&'a StoredObject),
    Prefix(String),
}

impl Entry<'_> {
    fn id(&self) -> &str {
        match self {
            Entry::Object(object) => &object.meta.key,
            Entry::Prefix(prefix) => prefix,
        }
    }
}

fn encode_token(last: &str) -> String {
    TOKEN_ENCODING.encode(last)
}

fn decode_token(token: &str) -> Result<String> {
    TOKEN_ENCODING
        .decode(token)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| {
            ProviderError::invalid_config(COMPONENT, "invalid continuation token")
                .with_context("token", token)
        })
}

/// One page of a listing over a committed snapshot
pub(crate) fn list(
    objects: &BTreeMap<String, StoredObject>,
    request: &ListObjectsRequest,
) -> Result<ListObjectsOutput> {
    let max_keys = request.max_keys.unwrap_or(MAX_PAGE_SIZE);
    if max_keys == 0 || max_keys > MAX_PAGE_SIZE {
        return Err(ProviderError::invalid_config(
            COMPONENT,
            format!("max_keys must be between 1 and {}", MAX_PAGE_SIZE),
        )
        .with_context("max_keys", max_keys.to_string()));
    }

    let prefix = request.prefix.as_deref().unwrap_or("");
    let delimiter = request.delimiter.as_deref().filter(|d| !d.is_empty());
    let after = request
        .continuation_token
        .as_deref()
        .map(decode_token)
        .transpose()?;

    let mut entries: Vec<Entry<'_>> = Vec::new();
    for (key, object) in objects {
        if !key.starts_with(prefix) {
            continue;
        }
        if after.as_deref().is_some_and(|after| key.as_str() <= after) {
            continue;
        }

        let grouped = delimiter.and_then(|delimiter| {
            key[prefix.len()..]
                .find(delimiter)
                .map(|idx| key[..prefix.len() + idx + delimiter.len()].to_string())
        });

        let entry = match grouped {
            Some(common) => {
                // Keys sort contiguously under their common prefix
                let seen = matches!(entries.last(), Some(Entry::Prefix(last)) if *last == common);
                let before_token = after.as_deref().is_some_and(|after| common.as_str() <= after);
                if seen || before_token {
                    continue;
                }
                Entry::Prefix(common)
            }
            None => Entry::Object(object),
        };

        entries.push(entry);
        if entries.len() > max_keys {
            break;
        }
    }

    let is_truncated = entries.len() > max_keys;
    entries.truncate(max_keys);
    let next_continuation_token = if is_truncated {
        entries.last().map(|entry| encode_token(entry.id()))
    } else {
        None
    };

    let mut output = ListObjectsOutput {
        is_truncated,
        next_continuation_token,
        ..ListObjectsOutput::default()
    };
    for entry in entries {
        match entry {
            Entry::Object(object) => output.objects.push(object.meta.clone()),
            Entry::Prefix(prefix) => output.common_prefixes.push(prefix),
        }
    }
    Ok(output)
}

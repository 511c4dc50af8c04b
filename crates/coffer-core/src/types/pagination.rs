//! Offset-style pagination with opaque continuation tokens

use crate::error::{ProviderError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as TOKEN_ENCODING, Engine};
use serde::{Deserialize, Serialize};

const COMPONENT: &str = "pagination";

/// Page size used when the caller does not specify one
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Largest page a caller may request
pub const MAX_PAGE_SIZE: usize = 1000;

const TOKEN_PREFIX: &str = "offset:";

/// Request for one page of a listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Maximum number of items to return
    pub limit: Option<usize>,
    /// Continuation token from a previous page
    pub token: Option<String>,
}

impl PageRequest {
    /// First page with the given limit
    pub fn first(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            token: None,
        }
    }

    /// Continue from a token with the given limit
    pub fn after(token: impl Into<String>, limit: usize) -> Self {
        Self {
            limit: Some(limit),
            token: Some(token.into()),
        }
    }

    /// Effective page size, validated against [`MAX_PAGE_SIZE`]
    pub fn page_size(&self) -> Result<usize> {
        match self.limit {
            None => Ok(DEFAULT_PAGE_SIZE),
            Some(0) => Err(ProviderError::invalid_config(
                COMPONENT,
                "page limit must be greater than zero",
            )),
            Some(n) if n > MAX_PAGE_SIZE => Err(ProviderError::invalid_config(
                COMPONENT,
                format!("page limit {} exceeds maximum of {}", n, MAX_PAGE_SIZE),
            )),
            Some(n) => Ok(n),
        }
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Token for the next page, absent on the last page
    pub next_token: Option<String>,
}

/// Encode an offset as an opaque token
pub fn encode_offset_token(offset: usize) -> String {
    TOKEN_ENCODING.encode(format!("{}{}", TOKEN_PREFIX, offset))
}

/// Decode an opaque token produced by [`encode_offset_token`]
pub fn decode_offset_token(token: &str) -> Result<usize> {
    let invalid = || {
        ProviderError::invalid_config(COMPONENT, "invalid continuation token")
            .with_context("token", token)
    };
    let bytes = TOKEN_ENCODING.decode(token).map_err(|_| invalid())?;
    let text = String::from_utf8(bytes).map_err(|_| invalid())?;
    text.strip_prefix(TOKEN_PREFIX)
        .and_then(|offset| offset.parse::<usize>().ok())
        .ok_or_else(invalid)
}

/// Slice an already ordered snapshot into one page
pub fn paginate<T>(items: Vec<T>, request: &PageRequest) -> Result<Page<T>> {
    let limit = request.page_size()?;
    let offset = match request.token.as_deref() {
        Some(token) => decode_offset_token(token)?,
        None => 0,
    };

    let total = items.len();
    if offset > total {
        return Err(ProviderError::invalid_config(
            COMPONENT,
            "continuation token is past the end of the listing",
        ));
    }

    let end = offset.saturating_add(limit).min(total);
    let next_token = (end < total).then(|| encode_offset_token(end));
    let items = items.into_iter().skip(offset).take(end - offset).collect();

    Ok(Page { items, next_token })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_token_roundtrip() {
        let token = encode_offset_token(42);
        assert_eq!(decode_offset_token(&token).unwrap(), 42);
    }

    #[test]
    fn test_garbage_token_rejected() {
        let err = decode_offset_token("not-a-token!").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_paginate_walks_all_items() {
        let items: Vec<u32> = (0..5).collect();
        let first = paginate(items.clone(), &PageRequest::first(2)).unwrap();
        assert_eq!(first.items, vec![0, 1]);

        let token = first.next_token.unwrap();
        let second = paginate(items.clone(), &PageRequest::after(token, 2)).unwrap();
        assert_eq!(second.items, vec![2, 3]);

        let third = paginate(items, &PageRequest::after(second.next_token.unwrap(), 2)).unwrap();
        assert_eq!(third.items, vec![4]);
        assert!(third.next_token.is_none());
    }

    #[test]
    fn test_zero_limit_rejected() {
        let err = paginate(vec![1], &PageRequest::first(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_oversized_limit_rejected() {
        let err = PageRequest::first(MAX_PAGE_SIZE + 1).page_size().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }
}

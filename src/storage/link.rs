use crate::storage::error::{StorageError, StorageResult};
use chrono::{DateTime, Local};
use std::time::Duration;
use url::Url;

/// Public download reference: `{base_url}/files/{name}`
///
/// The name is appended as a single, percent-encoded path segment.
pub fn public_link(base_url: &str, name: &str) -> StorageResult<String> {
    let mut url = Url::parse(base_url).map_err(|e| StorageError::InvalidBaseUrl(e.to_string()))?;

    url.path_segments_mut()
        .map_err(|_| StorageError::InvalidBaseUrl(base_url.to_string()))?
        .pop_if_empty()
        .push("files")
        .push(name);

    Ok(url.to_string())
}

/// Expiration advertised to the requester, counted from now
pub fn expires_at(ttl: Duration) -> DateTime<Local> {
    let now = Local::now();
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(now)
}

pub fn format_expiry(at: &DateTime<Local>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

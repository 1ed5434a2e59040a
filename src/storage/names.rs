//! File name validation
//!
//! A stored name is a single path component. Anything that could address
//! a different directory is rejected before the filesystem is touched.

use crate::storage::error::{StorageError, StorageResult};

/// Longest accepted name, in bytes
pub const MAX_NAME_LEN: usize = 255;

/// Validate a requested file name and return the name to store under
///
/// Surrounding whitespace is trimmed. Rejected:
/// - empty names and names longer than [`MAX_NAME_LEN`]
/// - directory separators (`/`, `\`)
/// - control characters, including NUL
/// - a leading `.`, which covers `..` and hidden staging files
pub fn sanitize_name(raw: &str) -> StorageResult<String> {
    let name = raw.trim();

    let invalid = name.is_empty()
        || name.len() > MAX_NAME_LEN
        || name.starts_with('.')
        || name
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control());

    if invalid {
        return Err(StorageError::InvalidName(raw.to_string()));
    }

    Ok(name.to_string())
}

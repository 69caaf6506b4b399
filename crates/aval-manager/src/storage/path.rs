use super::StorageError;

const OBJECT_PREFIX: &str = "storage/v1/object/";
const PUBLIC_PREFIX: &str = "public/";
const FALLBACK_FILENAME: &str = "archivo";

/// Reduces any accepted spelling of an object reference to its key inside `bucket`.
///
/// Accepts bare keys, keys prefixed with `/`, `public/` or the bucket name, and absolute
/// storage URLs. A `..` segment is rejected; an empty result is an error.
pub fn normalize_path(raw: &str, bucket: &str) -> Result<String, StorageError> {
    let mut cleaned = raw.trim();
    if cleaned.starts_with("http://") || cleaned.starts_with("https://") {
        cleaned = cleaned.split(['?', '#']).next().unwrap_or_default();
        if let Some((_, key)) = cleaned.split_once("/storage/v1/object/") {
            cleaned = key;
        }
    }
    cleaned = cleaned.trim_start_matches('/');
    if let Some(rest) = cleaned.strip_prefix(OBJECT_PREFIX) {
        cleaned = rest.trim_start_matches('/');
    }
    if let Some(rest) = cleaned.strip_prefix(PUBLIC_PREFIX) {
        cleaned = rest.trim_start_matches('/');
    }
    if let Some(rest) = cleaned
        .strip_prefix(bucket)
        .and_then(|rest| rest.strip_prefix('/'))
    {
        cleaned = rest;
    }

    let mut segments = Vec::new();
    for segment in cleaned.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(StorageError::InvalidPath("path traversal is not allowed".into())),
            segment => segments.push(segment),
        }
    }
    if segments.is_empty() {
        return Err(StorageError::InvalidPath("storage path is empty".into()));
    }
    Ok(segments.join("/"))
}

/// Last path segment with every run of unsafe characters replaced by `_`.
pub fn sanitize_filename(path: &str) -> String {
    let base = path.rsplit('/').next().unwrap_or_default();
    let mut sanitized = String::with_capacity(base.len());
    let mut in_run = false;
    for c in base.chars() {
        if c.is_alphanumeric() || matches!(c, '_' | '.' | '-') {
            sanitized.push(c);
            in_run = false;
        } else if !in_run {
            sanitized.push('_');
            in_run = true;
        }
    }
    if sanitized.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        sanitized
    }
}

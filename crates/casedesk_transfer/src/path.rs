use casedesk_contract::UploadCategory;
use chrono::{DateTime, Utc};

use crate::sequencer::UploadError;

/// Builds `{category}/{YYYY}/{MM}/{DD}/{owner}/{millis}-{sequence}-{file}`.
///
/// `sequence` distinguishes files submitted in the same millisecond, so equal
/// file names never share a path.
pub fn storage_path(
    category: UploadCategory,
    owner_id: &str,
    submitted_at: DateTime<Utc>,
    sequence: u64,
    file_name: &str,
) -> Result<String, UploadError> {
    let owner = sanitize_segment(owner_id);
    if owner.is_empty() {
        return Err(UploadError::InvalidPath(format!(
            "owner id {owner_id:?} has no usable characters"
        )));
    }
    let mut name = sanitize_segment(file_name);
    if name.is_empty() {
        name = "file".to_string();
    }

    Ok(format!(
        "{}/{}/{}/{}-{}-{}",
        category.as_str(),
        submitted_at.format("%Y/%m/%d"),
        owner,
        submitted_at.timestamp_millis(),
        sequence,
        name
    ))
}

/// Keeps `[A-Za-z0-9._-]`, maps everything else to `_`, and strips leading
/// dots so a segment can never be `..` or hidden.
pub fn sanitize_segment(raw: &str) -> String {
    let mapped: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut collapsed = String::with_capacity(mapped.len());
    for c in mapped.chars() {
        if c == '.' && collapsed.ends_with('.') {
            continue;
        }
        collapsed.push(c);
    }
    collapsed.trim_start_matches('.').to_string()
}

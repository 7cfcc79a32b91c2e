//! Storage key generation.

use uuid::Uuid;

/// Longest single path component most filesystems accept.
const MAX_NAME_BYTES: usize = 255;
/// `{uuid}_` in front of the sanitized name.
const KEY_PREFIX_BYTES: usize = 37;
/// Longer suffixes are not treated as an extension when truncating.
const MAX_EXTENSION_BYTES: usize = 16;

/// Generate a fresh storage key for `filename` uploaded by `owner_id`.
///
/// Every call yields a distinct key so two uploads of the same name never collide.
/// The last component stays within [`MAX_NAME_BYTES`]; long names lose the end
/// of their stem but keep their extension.
pub fn generate_storage_key(owner_id: Uuid, filename: &str) -> String {
    let name = truncate_name(
        &sanitize_filename(filename),
        MAX_NAME_BYTES - KEY_PREFIX_BYTES,
    );
    format!("files/{}/{}_{}", owner_id, Uuid::new_v4(), name)
}

/// `name` is ASCII (see [`sanitize_filename`]), so byte offsets are char boundaries.
fn truncate_name(name: &str, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }
    let extension = name
        .rfind('.')
        .filter(|&dot| dot > 0 && name.len() - dot <= MAX_EXTENSION_BYTES)
        .map_or("", |dot| &name[dot..]);
    let stem = &name[..max_bytes - extension.len()];
    format!("{}{}", stem.trim_end_matches('.'), extension)
}

fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(&['/', '\\'][..]).next().unwrap_or(filename);
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.replace("..", "_");
    if cleaned.trim_matches('_').is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

//! Upload filename rules.

use thiserror::Error;

/// Container extensions accepted for upload.
pub const ALLOWED_EXTENSIONS: [&str; 7] = ["mp4", "avi", "mov", "wmv", "flv", "webm", "mkv"];

/// Request-shape errors, rejected before a job is created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("No video file provided")]
    MissingFile,

    #[error("Invalid file")]
    InvalidFile,
}

/// Lowercased extension of `filename`, if it is one we accept.
pub fn is_allowed_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Reduce a client-supplied filename to a safe basename.
///
/// Path separators become spaces, anything outside `[A-Za-z0-9._-]` is
/// dropped, whitespace runs collapse to `_`, and leading or trailing `.`/`_`
/// are trimmed so the result can never address a parent directory.
pub fn sanitize_filename(raw: &str) -> String {
    let spaced: String = raw
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");

    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Validate an uploaded filename, returning `(sanitized_name, extension)`.
pub fn validate_upload_filename(raw: &str) -> Result<(String, String), UploadError> {
    if raw.is_empty() {
        return Err(UploadError::InvalidFile);
    }

    let sanitized = sanitize_filename(raw);
    let ext = is_allowed_extension(&sanitized).ok_or(UploadError::InvalidFile)?;
    Ok((sanitized, ext))
}

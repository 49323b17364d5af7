//! MIME type resolution for file attachments.

use std::path::Path;

/// Fallback MIME type for unknown content.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Resolves the MIME type of a local file.
pub trait MimeResolver {
    /// MIME type for the file at `path`.
    fn resolve(&self, path: &Path) -> String;
}

/// Resolves MIME types from the file extension alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionResolver;

impl MimeResolver for ExtensionResolver {
    fn resolve(&self, path: &Path) -> String {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(OCTET_STREAM, mime_for_extension)
            .to_string()
    }
}

impl<F> MimeResolver for F
where
    F: Fn(&Path) -> String,
{
    fn resolve(&self, path: &Path) -> String {
        self(path)
    }
}

/// MIME type for a file extension (case-insensitive, without the dot).
#[must_use]
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        // Images
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "bmp" => "image/bmp",
        // Documents
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        // Text
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "csv" => "text/csv",
        "md" => "text/markdown",
        // Archives
        "zip" => "application/zip",
        "gz" | "gzip" => "application/gzip",
        "tar" => "application/x-tar",
        // Audio/Video
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        _ => OCTET_STREAM,
    }
}

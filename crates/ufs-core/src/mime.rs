//! Static extension to MIME type registry.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Known extensions and their content types.
static MIME_TYPES: &[(&str, &str)] = &[
    // Images
    ("avif", "image/avif"),
    ("bmp", "image/bmp"),
    ("gif", "image/gif"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
    ("ico", "image/x-icon"),
    ("jpe", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("png", "image/png"),
    ("svg", "image/svg+xml"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("webp", "image/webp"),
    // Audio
    ("aac", "audio/aac"),
    ("flac", "audio/flac"),
    ("m4a", "audio/mp4"),
    ("mid", "audio/midi"),
    ("midi", "audio/midi"),
    ("mp3", "audio/mpeg"),
    ("oga", "audio/ogg"),
    ("ogg", "audio/ogg"),
    ("opus", "audio/opus"),
    ("wav", "audio/wav"),
    ("weba", "audio/webm"),
    // Video
    ("3gp", "video/3gpp"),
    ("avi", "video/x-msvideo"),
    ("m4v", "video/x-m4v"),
    ("mkv", "video/x-matroska"),
    ("mov", "video/quicktime"),
    ("mp4", "video/mp4"),
    ("mpeg", "video/mpeg"),
    ("mpg", "video/mpeg"),
    ("ogv", "video/ogg"),
    ("webm", "video/webm"),
    // Text
    ("css", "text/css"),
    ("csv", "text/csv"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("ics", "text/calendar"),
    ("log", "text/plain"),
    ("md", "text/markdown"),
    ("txt", "text/plain"),
    ("vcf", "text/vcard"),
    ("xml", "application/xml"),
    ("yaml", "application/yaml"),
    ("yml", "application/yaml"),
    // Documents
    ("doc", "application/msword"),
    ("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
    ("epub", "application/epub+zip"),
    ("odp", "application/vnd.oasis.opendocument.presentation"),
    ("ods", "application/vnd.oasis.opendocument.spreadsheet"),
    ("odt", "application/vnd.oasis.opendocument.text"),
    ("pdf", "application/pdf"),
    ("ppt", "application/vnd.ms-powerpoint"),
    ("pptx", "application/vnd.openxmlformats-officedocument.presentationml.presentation"),
    ("rtf", "application/rtf"),
    ("xls", "application/vnd.ms-excel"),
    ("xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
    // Archives
    ("7z", "application/x-7z-compressed"),
    ("bz2", "application/x-bzip2"),
    ("gz", "application/gzip"),
    ("rar", "application/vnd.rar"),
    ("tar", "application/x-tar"),
    ("tgz", "application/gzip"),
    ("zip", "application/zip"),
    // Code and data
    ("js", "text/javascript"),
    ("json", "application/json"),
    ("mjs", "text/javascript"),
    ("sh", "application/x-sh"),
    ("wasm", "application/wasm"),
    // Fonts
    ("otf", "font/otf"),
    ("ttf", "font/ttf"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    // Executables and packages
    ("apk", "application/vnd.android.package-archive"),
    ("bin", "application/octet-stream"),
    ("dll", "application/x-msdownload"),
    ("exe", "application/x-msdownload"),
    ("jar", "application/java-archive"),
    ("msi", "application/x-msi"),
    // Mail
    ("eml", "message/rfc822"),
];

static BY_EXTENSION: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| MIME_TYPES.iter().copied().collect());

/// Content type used when nothing more specific is known.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Returns the content type registered for `extension`.
///
/// Lookup ignores case and a leading dot.
pub fn lookup(extension: &str) -> Option<&'static str> {
    let extension = normalize_extension(extension)?;
    BY_EXTENSION.get(extension.as_str()).copied()
}

/// Returns every registered `(extension, content type)` pair.
pub fn mime_types() -> &'static [(&'static str, &'static str)] {
    MIME_TYPES
}

/// Returns the extensions registered for `content_type`.
pub fn extensions_for(content_type: &str) -> impl Iterator<Item = &'static str> + '_ {
    let essence = essence(content_type);
    MIME_TYPES
        .iter()
        .filter(move |(_, mime)| mime.eq_ignore_ascii_case(essence))
        .map(|(ext, _)| *ext)
}

/// Strips parameters such as `; charset=utf-8` from a content type.
pub fn essence(content_type: &str) -> &str {
    content_type
        .split_once(';')
        .map_or(content_type, |(essence, _)| essence)
        .trim()
}

/// Lowercases an extension and strips a leading dot.
///
/// Empty input and extensions with characters outside `[A-Za-z0-9_+-]`
/// yield `None`, so a normalized extension is always safe in a path.
pub fn normalize_extension(extension: &str) -> Option<String> {
    let extension = extension.trim().trim_start_matches('.');
    let valid = !extension.is_empty()
        && extension
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+'));
    valid.then(|| extension.to_ascii_lowercase())
}

/// Extracts the normalized extension of a file name.
pub fn extension_of(name: &str) -> Option<String> {
    let (stem, extension) = name.rsplit_once('.')?;
    if stem.is_empty() || extension.contains(['/', '\\']) {
        return None;
    }
    normalize_extension(extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(lookup("PNG"), Some("image/png"));
        assert_eq!(lookup(".jpg"), Some("image/jpeg"));
        assert_eq!(lookup("unknown-ext"), None);
        assert_eq!(lookup(""), None);
    }

    #[test]
    fn extensions_for_ignores_parameters() {
        let exts: Vec<_> = extensions_for("text/plain; charset=utf-8").collect();
        assert!(exts.contains(&"txt"));
        assert!(exts.contains(&"log"));
    }

    #[test]
    fn extension_of_handles_edge_cases() {
        assert_eq!(extension_of("a.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension_of(".bashrc"), None);
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of("dir.d/file"), None);
    }

    #[test]
    fn normalize_rejects_path_characters() {
        assert_eq!(normalize_extension(".PNG").as_deref(), Some("png"));
        assert_eq!(normalize_extension("c++").as_deref(), Some("c++"));
        assert_eq!(normalize_extension("../etc"), None);
        assert_eq!(normalize_extension("a b"), None);
    }

    #[test]
    fn table_has_unique_extensions() {
        assert_eq!(BY_EXTENSION.len(), mime_types().len());
    }
}

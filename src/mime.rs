use std::path::Path;

pub const TEXT_PLAIN: &str = "text/plain";
pub const TEXT_HTML: &str = "text/html";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Non-`text/*` types whose payload is still character data.
const TEXTUAL: [&str; 5] = [
    "application/json",
    "application/javascript",
    "application/xml",
    "application/ld+json",
    "application/yaml",
];

const BY_EXTENSION: &[(&str, &str)] = &[
    ("html", TEXT_HTML),
    ("htm", TEXT_HTML),
    ("css", "text/css"),
    ("csv", "text/csv"),
    ("txt", TEXT_PLAIN),
    ("md", "text/markdown"),
    ("js", "application/javascript"),
    ("mjs", "application/javascript"),
    ("json", "application/json"),
    ("jsonld", "application/ld+json"),
    ("xml", "application/xml"),
    ("yaml", "application/yaml"),
    ("yml", "application/yaml"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("ico", "image/vnd.microsoft.icon"),
    ("webp", "image/webp"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("pdf", "application/pdf"),
    ("wasm", "application/wasm"),
    ("zip", "application/zip"),
];

/// Guess a mimetype from the file extension of `path`.
pub fn guess(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return OCTET_STREAM;
    };

    BY_EXTENSION
        .iter()
        .find_map(|&(known, mimetype)| known.eq_ignore_ascii_case(ext).then_some(mimetype))
        .unwrap_or(OCTET_STREAM)
}

/// Returns `true` iff bodies of given mimetype are text and should declare a charset.
///
/// Parameters (anything after `;`) are ignored.
pub fn is_text(mimetype: &[u8]) -> bool {
    let essence = match mimetype.iter().position(|&b| b == b';') {
        Some(at) => &mimetype[..at],
        None => mimetype,
    };
    let essence = essence.trim_ascii();

    if essence.len() > 5 && essence[..5].eq_ignore_ascii_case(b"text/") {
        return true;
    }

    TEXTUAL
        .iter()
        .any(|textual| essence.eq_ignore_ascii_case(textual.as_bytes()))
}

/// Returns `true` iff the mimetype already carries a `charset` parameter.
pub(crate) fn has_charset(mimetype: &[u8]) -> bool {
    mimetype
        .split(|&b| b == b';')
        .skip(1)
        .any(|param| {
            let param = param.trim_ascii();
            param.len() >= 8 && param[..8].eq_ignore_ascii_case(b"charset=")
        })
}

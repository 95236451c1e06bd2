//! # Tipos MIME
//! src/http/mime.rs
//!
//! Tabla de tipos por extensión, ampliable con la opción `mime_types`.

use std::path::Path;

/// Tipo por defecto cuando la extensión no es conocida
pub const DEFAULT_MIME_TYPE: &str = "text/plain";

const BUILTIN_TYPES: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("htm", "text/html"),
    ("shtm", "text/html"),
    ("shtml", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("json", "application/json"),
    ("xml", "text/xml"),
    ("txt", "text/plain"),
    ("ico", "image/x-icon"),
    ("gif", "image/gif"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("svg", "image/svg+xml"),
    ("bmp", "image/bmp"),
    ("torrent", "application/x-bittorrent"),
    ("wav", "audio/x-wav"),
    ("mp3", "audio/x-mp3"),
    ("mid", "audio/mid"),
    ("m3u", "audio/x-mpegurl"),
    ("ram", "audio/x-pn-realaudio"),
    ("ra", "audio/x-pn-realaudio"),
    ("doc", "application/msword"),
    ("exe", "application/octet-stream"),
    ("zip", "application/x-zip-compressed"),
    ("xls", "application/excel"),
    ("tgz", "application/x-tar-gz"),
    ("tar", "application/x-tar"),
    ("gz", "application/x-gunzip"),
    ("arj", "application/x-arj-compressed"),
    ("rar", "application/x-arj-compressed"),
    ("rtf", "application/rtf"),
    ("pdf", "application/pdf"),
    ("swf", "application/x-shockwave-flash"),
    ("mpg", "video/mpeg"),
    ("mpeg", "video/mpeg"),
    ("mp4", "video/mp4"),
    ("asf", "video/x-ms-asf"),
    ("avi", "video/x-msvideo"),
];

/// Devuelve el tipo MIME de `path`.
///
/// `extra` son pares `(extensión, tipo)` configurados por el usuario y
/// tienen prioridad sobre la tabla interna. La extensión puede venir con o
/// sin punto inicial.
///
/// # Ejemplo
/// ```
/// use std::path::Path;
/// use emberd::http::mime::mime_type;
///
/// assert_eq!(mime_type(Path::new("a/b.PNG"), &[]), "image/png");
/// let extra = vec![(".foo".to_string(), "application/x-foo".to_string())];
/// assert_eq!(mime_type(Path::new("x.foo"), &extra), "application/x-foo");
/// ```
pub fn mime_type(path: &Path, extra: &[(String, String)]) -> String {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.to_ascii_lowercase(),
        None => return DEFAULT_MIME_TYPE.to_string(),
    };

    if let Some((_, mime)) = extra
        .iter()
        .find(|(e, _)| e.trim_start_matches('.').eq_ignore_ascii_case(&ext))
    {
        return mime.clone();
    }

    BUILTIN_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| mime.to_string())
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        assert_eq!(mime_type(Path::new("index.html"), &[]), "text/html");
        assert_eq!(mime_type(Path::new("style.css"), &[]), "text/css");
    }

    #[test]
    fn test_unknown_and_missing_extension() {
        assert_eq!(mime_type(Path::new("README"), &[]), DEFAULT_MIME_TYPE);
        assert_eq!(mime_type(Path::new("data.xyz"), &[]), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn test_extra_overrides_builtin() {
        let extra = vec![("html".to_string(), "application/xhtml+xml".to_string())];
        assert_eq!(mime_type(Path::new("a.html"), &extra), "application/xhtml+xml");
    }
}

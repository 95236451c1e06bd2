//! # Archivos Estáticos
//! src/files/static_file.rs
//!
//! Envía archivos con `Content-Type` según la extensión, `Last-Modified`,
//! `ETag` y soporte para un único rango `bytes=a-b` (contesta 206, o 416 si
//! el rango empieza después del final del archivo).

use crate::http::mime::mime_type;
use crate::http::{Method, Request, Response, StatusCode};
use crate::router::send_error;
use crate::server::{Connection, ServerState};
use std::fs::{File, Metadata};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

/// Fecha de modificación redondeada a segundos (precisión de HTTP-date)
fn modified_secs(metadata: &Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn last_modified(metadata: &Metadata) -> String {
    httpdate::fmt_http_date(UNIX_EPOCH + Duration::from_secs(modified_secs(metadata)))
}

/// `"<mtime hex>.<tamaño hex>"`
pub fn etag(metadata: &Metadata) -> String {
    format!("\"{:x}.{:x}\"", modified_secs(metadata), metadata.len())
}

/// ¿`If-Modified-Since` dice que el cliente ya tiene esta versión?
pub fn is_not_modified(req: &Request, metadata: &Metadata) -> bool {
    let Some(value) = req.header("If-Modified-Since") else {
        return false;
    };
    match httpdate::parse_http_date(value) {
        Ok(since) => {
            let modified = UNIX_EPOCH + Duration::from_secs(modified_secs(metadata));
            modified <= since
        }
        Err(_) => false,
    }
}

/// Parsea `Range: bytes=a-` o `bytes=a-b`.
///
/// Rangos múltiples o de sufijo (`bytes=-n`) no se soportan y se ignoran.
pub fn parse_range(value: &str) -> Option<(u64, Option<u64>)> {
    let spec = value.trim().strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }

    let (start, end) = spec.split_once('-')?;
    let start: u64 = start.trim().parse().ok()?;
    let end = match end.trim() {
        "" => None,
        end => Some(end.parse::<u64>().ok()?),
    };

    match end {
        Some(end) if end < start => None,
        _ => Some((start, end)),
    }
}

/// Contesta 304 sin body
pub fn send_not_modified(conn: &mut Connection, req: &mut Request, metadata: &Metadata) {
    req.set_status_code(StatusCode::NotModified.as_u16());
    let response = Response::new(StatusCode::NotModified)
        .with_header("Last-Modified", &last_modified(metadata))
        .with_header("ETag", &etag(metadata));
    if conn.send_response(response, false).is_err() {
        conn.close_after_response();
    }
}

/// Envía un archivo completo o el rango pedido
pub fn send_file(
    state: &ServerState,
    conn: &mut Connection,
    req: &mut Request,
    path: &Path,
    metadata: &Metadata,
) {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            let detail = format!("Cannot open {}: {}", path.display(), e);
            send_error(state, conn, req, StatusCode::InternalServerError, &detail);
            return;
        }
    };

    let size = metadata.len();
    let mut status = StatusCode::Ok;
    let mut length = size;
    let mut content_range = None;

    if let Some((start, end)) = req.header("Range").and_then(parse_range) {
        if start >= size {
            send_range_not_satisfiable(conn, req, size);
            return;
        }
        let end = end.map_or(size - 1, |e| e.min(size - 1));
        if let Err(e) = file.seek(SeekFrom::Start(start)) {
            let detail = format!("Cannot seek {}: {}", path.display(), e);
            send_error(state, conn, req, StatusCode::InternalServerError, &detail);
            return;
        }
        status = StatusCode::PartialContent;
        length = end - start + 1;
        content_range = Some(format!("bytes {}-{}/{}", start, end, size));
    }

    let extra_types = state.options.mime_types.get();
    let mut response = Response::new(status)
        .with_header("Content-Type", &mime_type(path, &extra_types))
        .with_header("Content-Length", &length.to_string())
        .with_header("Last-Modified", &last_modified(metadata))
        .with_header("ETag", &etag(metadata))
        .with_header("Accept-Ranges", "bytes");
    if let Some(range) = content_range {
        response.add_header("Content-Range", &range);
    }

    req.set_status_code(status.as_u16());
    if conn.send_response(response, false).is_err() {
        conn.close_after_response();
        return;
    }

    if req.method() != Method::HEAD && io::copy(&mut file.take(length), conn).is_err() {
        conn.close_after_response();
    }
}

fn send_range_not_satisfiable(conn: &mut Connection, req: &mut Request, size: u64) {
    req.set_status_code(StatusCode::RangeNotSatisfiable.as_u16());
    let response = Response::new(StatusCode::RangeNotSatisfiable)
        .with_header("Content-Range", &format!("bytes */{}", size))
        .with_body("");
    if conn.send_response(response, true).is_err() {
        conn.close_after_response();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("bytes=0-99"), Some((0, Some(99))));
        assert_eq!(parse_range("bytes=100-"), Some((100, None)));
        assert_eq!(parse_range(" bytes=5-5 "), Some((5, Some(5))));
    }

    #[test]
    fn test_parse_range_unsupported() {
        assert_eq!(parse_range("bytes=-500"), None);
        assert_eq!(parse_range("bytes=0-1,5-6"), None);
        assert_eq!(parse_range("bytes=9-3"), None);
        assert_eq!(parse_range("items=0-1"), None);
        assert_eq!(parse_range("bytes=a-b"), None);
    }

    #[test]
    fn test_etag_and_not_modified() {
        let path = std::env::temp_dir().join(format!("emberd-static-{}", std::process::id()));
        std::fs::write(&path, b"0123456789").unwrap();
        let metadata = std::fs::metadata(&path).unwrap();

        let tag = etag(&metadata);
        assert!(tag.starts_with('"') && tag.ends_with(".a\""));

        let fresh = format!(
            "GET / HTTP/1.1\r\nIf-Modified-Since: {}\r\n\r\n",
            last_modified(&metadata)
        );
        let req = Request::parse(fresh.as_bytes()).unwrap();
        assert!(is_not_modified(&req, &metadata));

        let stale = b"GET / HTTP/1.1\r\nIf-Modified-Since: Thu, 01 Jan 1970 00:00:00 GMT\r\n\r\n";
        let req = Request::parse(stale).unwrap();
        assert!(!is_not_modified(&req, &metadata));

        let garbage = b"GET / HTTP/1.1\r\nIf-Modified-Since: yesterday\r\n\r\n";
        let req = Request::parse(garbage).unwrap();
        assert!(!is_not_modified(&req, &metadata));

        std::fs::remove_file(&path).unwrap();
    }
}

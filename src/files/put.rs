//! # PUT y DELETE
//! src/files/put.rs
//!
//! PUT crea los directorios intermedios que falten y escribe el body en el
//! archivo: 201 si el archivo es nuevo, 200 si se reemplazó. Con
//! `Content-Range: bytes a-b/total` se escribe a partir del byte `a` sin
//! truncar y se contesta 206.

use crate::http::{Request, Response, StatusCode};
use crate::router::send_error;
use crate::server::{Connection, ServerState};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

/// Primer byte de `Content-Range: bytes a-b/total`
pub fn parse_content_range(value: &str) -> Option<u64> {
    let spec = value.trim().strip_prefix("bytes")?.trim_start();
    let (start, _) = spec.split_once('-')?;
    start.trim().parse().ok()
}

/// Guarda el body del request en `path`
pub fn put_file(state: &ServerState, conn: &mut Connection, req: &mut Request, path: &Path) {
    if path.is_dir() {
        send_error(state, conn, req, StatusCode::Forbidden, "Cannot PUT a directory");
        return;
    }

    let existed = path.exists();
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            let detail = format!("Cannot create {}: {}", parent.display(), e);
            send_error(state, conn, req, StatusCode::InternalServerError, &detail);
            return;
        }
    }

    let offset = req.header("Content-Range").and_then(parse_content_range);
    let mut file = match open_for_put(path, offset) {
        Ok(file) => file,
        Err(e) => {
            let detail = format!("Cannot open {}: {}", path.display(), e);
            send_error(state, conn, req, StatusCode::InternalServerError, &detail);
            return;
        }
    };

    if let Err(e) = copy_body(conn, &mut file) {
        conn.close_after_response();
        let detail = format!("Cannot write {}: {}", path.display(), e);
        send_error(state, conn, req, StatusCode::InternalServerError, &detail);
        return;
    }

    let status = match (offset, existed) {
        (Some(_), _) => StatusCode::PartialContent,
        (None, true) => StatusCode::Ok,
        (None, false) => StatusCode::Created,
    };
    debug!(path = %path.display(), status = status.as_u16(), "PUT");
    send_empty(conn, req, status);
}

/// Borra el archivo de `path`
pub fn delete_file(state: &ServerState, conn: &mut Connection, req: &mut Request, path: &Path) {
    match fs::metadata(path) {
        Err(_) => send_error(state, conn, req, StatusCode::NotFound, "File not found"),
        Ok(metadata) if metadata.is_dir() => {
            send_error(state, conn, req, StatusCode::Forbidden, "Cannot delete a directory")
        }
        Ok(_) => match fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "DELETE");
                send_empty(conn, req, StatusCode::Ok);
            }
            Err(e) => {
                let detail = format!("Cannot delete {}: {}", path.display(), e);
                send_error(state, conn, req, StatusCode::InternalServerError, &detail);
            }
        },
    }
}

fn open_for_put(path: &Path, offset: Option<u64>) -> io::Result<File> {
    match offset {
        Some(offset) => {
            let mut file = OpenOptions::new().write(true).create(true).truncate(false).open(path)?;
            file.seek(SeekFrom::Start(offset))?;
            Ok(file)
        }
        None => File::create(path),
    }
}

fn copy_body(conn: &mut Connection, file: &mut File) -> io::Result<()> {
    let mut chunk = [0u8; 8192];
    loop {
        let n = conn.read_body(&mut chunk)?;
        if n == 0 {
            return file.flush();
        }
        file.write_all(&chunk[..n])?;
    }
}

fn send_empty(conn: &mut Connection, req: &mut Request, status: StatusCode) {
    req.set_status_code(status.as_u16());
    let response = Response::new(status).with_body("");
    if conn.send_response(response, true).is_err() {
        conn.close_after_response();
    }
}

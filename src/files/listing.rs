//! # Listado de Directorios
//! src/files/listing.rs
//!
//! El query string elige el orden: primer carácter `n` (nombre), `s`
//! (tamaño) o `d` (fecha); segundo carácter `d` para descendente. Los
//! directorios siempre van primero.

use crate::auth::passwords::PASSWORDS_FILE_NAME;
use crate::http::url::{html_escape, url_encode};
use crate::http::{Method, Request, Response, StatusCode};
use crate::router::send_error;
use crate::server::{Connection, ServerState};
use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Size,
    Date,
}

/// Una entrada del listado
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: SystemTime,
}

/// Orden pedido en el query string: `(clave, descendente)`
pub fn parse_sort(query: Option<&str>) -> (SortKey, bool) {
    let bytes = query.unwrap_or("").as_bytes();
    let key = match bytes.first() {
        Some(b's') => SortKey::Size,
        Some(b'd') => SortKey::Date,
        _ => SortKey::Name,
    };
    let descending = bytes.get(1) == Some(&b'd');
    (key, descending)
}

/// Entradas de `dir`, sin `.`, `..` ni archivos de passwords
pub fn read_entries(dir: &Path) -> io::Result<Vec<DirEntry>> {
    let mut entries = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == "." || name == ".." || name == PASSWORDS_FILE_NAME {
            continue;
        }

        // fs::metadata sigue symlinks, igual que al servir el archivo
        let Ok(metadata) = fs::metadata(entry.path()) else {
            continue;
        };

        entries.push(DirEntry {
            name,
            is_dir: metadata.is_dir(),
            size: metadata.len(),
            modified: metadata.modified().unwrap_or(UNIX_EPOCH),
        });
    }

    Ok(entries)
}

/// Ordena con los directorios primero
pub fn sort_entries(entries: &mut [DirEntry], key: SortKey, descending: bool) {
    entries.sort_by(|a, b| match (a.is_dir, b.is_dir) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => {
            let order = match key {
                SortKey::Name => a.name.cmp(&b.name),
                SortKey::Size => a.size.cmp(&b.size),
                SortKey::Date => a.modified.cmp(&b.modified),
            };
            if descending {
                order.reverse()
            } else {
                order
            }
        }
    });
}

/// Tamaño legible: `512`, `1.5k`, `3.2M`, `1.0G`
fn human_size(size: u64) -> String {
    const KB: f64 = 1024.0;
    let size_f = size as f64;
    if size < 1024 {
        size.to_string()
    } else if size_f < KB * KB {
        format!("{:.1}k", size_f / KB)
    } else if size_f < KB * KB * KB {
        format!("{:.1}M", size_f / (KB * KB))
    } else {
        format!("{:.1}G", size_f / (KB * KB * KB))
    }
}

/// Arma el HTML del listado de `uri`
pub fn render_listing(uri: &str, entries: &[DirEntry], descending: bool) -> String {
    // Los encabezados invierten el orden actual
    let toggle = if descending { 'a' } else { 'd' };
    let title = html_escape(uri);

    let mut html = format!(
        "<html><head><title>Index of {title}</title>\
         <style>th {{text-align: left;}}</style></head>\
         <body><h1>Index of {title}</h1><pre><table cellpadding=\"0\">\
         <tr><th><a href=\"?n{toggle}\">Name</a></th>\
         <th><a href=\"?d{toggle}\">Modified</a></th>\
         <th><a href=\"?s{toggle}\">Size</a></th></tr>\
         <tr><td colspan=\"3\"><hr></td></tr>\n"
    );

    if uri != "/" {
        html.push_str(
            "<tr><td><a href=\"../\">Parent directory</a></td>\
             <td>&nbsp;-</td><td>&nbsp;&nbsp;-</td></tr>\n",
        );
    }

    for entry in entries {
        let slash = if entry.is_dir { "/" } else { "" };
        let size = if entry.is_dir {
            "[DIRECTORY]".to_string()
        } else {
            human_size(entry.size)
        };
        html.push_str(&format!(
            "<tr><td><a href=\"{}{}\">{}{}</a></td><td>&nbsp;{}</td><td>&nbsp;&nbsp;{}</td></tr>\n",
            url_encode(entry.name.as_bytes()),
            slash,
            html_escape(&entry.name),
            slash,
            httpdate::fmt_http_date(entry.modified),
            size
        ));
    }

    html.push_str("</table></pre></body></html>\n");
    html
}

/// Contesta con el listado de `dir`
pub fn send_directory(state: &ServerState, conn: &mut Connection, req: &mut Request, dir: &Path) {
    let mut entries = match read_entries(dir) {
        Ok(entries) => entries,
        Err(e) => {
            let detail = format!("Cannot open directory: {}", e);
            send_error(state, conn, req, StatusCode::InternalServerError, &detail);
            return;
        }
    };

    let (key, descending) = parse_sort(req.query_string());
    sort_entries(&mut entries, key, descending);
    let html = render_listing(req.uri(), &entries, descending);

    req.set_status_code(StatusCode::Ok.as_u16());
    let response = Response::new(StatusCode::Ok)
        .with_header("Content-Type", "text/html; charset=utf-8")
        .with_body(&html);
    if conn
        .send_response(response, req.method() != Method::HEAD)
        .is_err()
    {
        conn.close_after_response();
    }
}

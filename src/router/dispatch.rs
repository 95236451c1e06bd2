//! # Despacho de Requests
//! src/router/dispatch.rs
//!
//! Orden de resolución de un request ya validado:
//!
//! 1. Archivos de passwords (siempre 403) y autorización (chequeo
//!    registrado o archivo de passwords)
//! 2. Página de administración
//! 3. Handler de URI registrado por la aplicación
//! 4. PUT / DELETE (requieren `auth_put`)
//! 5. Archivo o directorio bajo `root` (o un alias): índice, listado, CGI,
//!    SSI o archivo estático

use crate::admin;
use crate::auth;
use crate::cgi;
use crate::config::options::OptionStore;
use crate::files::{self, listing, put, static_file};
use crate::http::url::url_encode;
use crate::http::{Method, Request, Response, StatusCode};
use crate::server::{Connection, ServerState};
use crate::ssi;
use std::fs;

/// Resuelve un request y escribe la respuesta
pub fn dispatch(state: &ServerState, conn: &mut Connection, req: &mut Request) {
    let uri = req.uri().to_string();
    let path = files::resolve_path(&state.options, &uri);

    if files::is_passwords_file(&path) {
        send_error(state, conn, req, StatusCode::Forbidden, "Access forbidden");
        return;
    }

    if !auth::check_authorization(state, req, &path) {
        auth::send_authorization_request(state, conn, req);
        return;
    }

    if state.options.admin_uri.get().as_deref() == Some(uri.as_str()) {
        admin::handle(state, conn, req);
        return;
    }

    if let Some(handler) = state.router.find_uri_handler(&uri) {
        if req.method().expects_body() {
            match conn.read_body_to_end() {
                Ok(body) => req.set_body(body),
                Err(e) => {
                    conn.close_after_response();
                    let detail = format!("Cannot read request body: {}", e);
                    send_error(state, conn, req, StatusCode::BadRequest, &detail);
                    return;
                }
            }
        }
        conn.close_after_response();
        req.set_status_code(StatusCode::Ok.as_u16());
        handler.handle(conn, req);
        return;
    }

    if matches!(req.method(), Method::PUT | Method::DELETE) {
        if !auth::check_put_authorization(state, req) {
            auth::send_authorization_request(state, conn, req);
        } else if req.method() == Method::PUT {
            put::put_file(state, conn, req, &path);
        } else {
            put::delete_file(state, conn, req, &path);
        }
        return;
    }

    let metadata = match fs::metadata(&path) {
        Ok(metadata) => metadata,
        Err(_) => {
            send_error(state, conn, req, StatusCode::NotFound, "File not found");
            return;
        }
    };

    let (path, metadata) = if metadata.is_dir() {
        if !uri.ends_with('/') {
            redirect_to_directory(conn, req, &uri);
            return;
        }
        match files::find_index_file(&state.options, &path) {
            Some(found) => found,
            None if state.options.dir_list.get() => {
                listing::send_directory(state, conn, req, &path);
                return;
            }
            None => {
                send_error(state, conn, req, StatusCode::Forbidden, "Directory listing denied");
                return;
            }
        }
    } else {
        (path, metadata)
    };

    if OptionStore::has_extension(&state.options.cgi_extensions.get(), &path) {
        if matches!(req.method(), Method::GET | Method::POST) {
            cgi::run_cgi(state, conn, req, &path);
        } else {
            send_error(state, conn, req, StatusCode::NotImplemented, "Method not supported by CGI");
        }
    } else if OptionStore::has_extension(&state.options.ssi_extensions.get(), &path) {
        ssi::send_ssi(state, conn, req, &path);
    } else if static_file::is_not_modified(req, &metadata) {
        static_file::send_not_modified(conn, req, &metadata);
    } else {
        static_file::send_file(state, conn, req, &path, &metadata);
    }
}

/// Único camino para contestar errores.
///
/// Si la aplicación registró un handler para el status se le cede la
/// respuesta; si no, se manda un cuerpo de texto con el detalle.
pub fn send_error(
    state: &ServerState,
    conn: &mut Connection,
    req: &mut Request,
    status: StatusCode,
    detail: &str,
) {
    req.set_status_code(status.as_u16());
    state
        .logs
        .log_error(conn.remote_addr(), Some(&*req), &format!("{}: {}", status, detail));

    if let Some(handler) = state.router.find_error_handler(status.as_u16()) {
        conn.close_after_response();
        handler.handle(conn, req);
        return;
    }

    let include_body = req.method() != Method::HEAD;
    if conn
        .send_response(Response::error(status, detail), include_body)
        .is_err()
    {
        conn.close_after_response();
    }
}

/// `/dir` → `301 Location: /dir/`
fn redirect_to_directory(conn: &mut Connection, req: &mut Request, uri: &str) {
    let mut location = format!("{}/", url_encode(uri.as_bytes()));
    if let Some(query) = req.query_string() {
        location.push('?');
        location.push_str(query);
    }

    req.set_status_code(StatusCode::MovedPermanently.as_u16());
    let response = Response::new(StatusCode::MovedPermanently)
        .with_header("Location", &location)
        .with_body("");
    if conn.send_response(response, true).is_err() {
        conn.close_after_response();
    }
}

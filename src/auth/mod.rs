//! # Autorización
//! src/auth/mod.rs
//!
//! Para decidir si un request puede pasar se usa, en este orden:
//!
//! 1. Un chequeo registrado con `protect_uri` que encaje con el URI
//! 2. El archivo de passwords global (`auth_gpass`)
//! 3. El archivo que la opción `protect` asocia al URI
//! 4. Un `.htpasswd` en el directorio del recurso
//!
//! Si no hay nada de eso el recurso es público. PUT y DELETE además exigen
//! credenciales válidas en `auth_put`.

pub mod digest;
pub mod passwords;

use crate::http::{Method, Request, Response, StatusCode};
use crate::router::glob;
use crate::server::{Connection, ServerState};
use passwords::PASSWORDS_FILE_NAME;
use std::path::{Path, PathBuf};

/// ¿El request puede acceder a `path`?
///
/// Si las credenciales son válidas queda registrado el usuario en el request.
pub fn check_authorization(state: &ServerState, req: &mut Request, path: &Path) -> bool {
    if let Some(check) = state.router.find_auth_check(req.uri()) {
        return check.authorize(req);
    }

    match passwords_file_for(state, req.uri(), path) {
        Some(file) => authorize_with_file(state, req, &file),
        None => true,
    }
}

/// ¿El request trae credenciales válidas para PUT/DELETE?
pub fn check_put_authorization(state: &ServerState, req: &mut Request) -> bool {
    match state.options.auth_put.get() {
        Some(file) => authorize_with_file(state, req, &file),
        None => false,
    }
}

fn passwords_file_for(state: &ServerState, uri: &str, path: &Path) -> Option<PathBuf> {
    if let Some(global) = state.options.auth_gpass.get() {
        return Some(global);
    }

    if let Some((_, file)) = state
        .options
        .protect
        .get()
        .into_iter()
        .find(|(pattern, _)| glob::matches(pattern, uri))
    {
        return Some(file);
    }

    let dir = if path.is_dir() { path } else { path.parent()? };
    let candidate = dir.join(PASSWORDS_FILE_NAME);
    candidate.is_file().then_some(candidate)
}

/// Valida el header `Authorization` contra un archivo de passwords.
///
/// Un archivo que no se puede abrir deniega el acceso.
pub fn authorize_with_file(state: &ServerState, req: &mut Request, file: &Path) -> bool {
    let Some(creds) = req.header("Authorization").and_then(digest::parse_authorization) else {
        return false;
    };

    let realm = state.options.auth_realm.get();
    match passwords::lookup_ha1(file, &creds.username, &realm) {
        Ok(Some(ha1)) if digest::check_response(&ha1, req.method().as_str(), &creds) => {
            req.set_remote_user(Some(creds.username));
            true
        }
        Ok(_) => false,
        Err(e) => {
            let message = format!("Cannot open passwords file {}: {}", file.display(), e);
            state.logs.log_error(req.remote_addr(), Some(&*req), &message);
            false
        }
    }
}

/// Contesta 401 con el desafío Digest
pub fn send_authorization_request(state: &ServerState, conn: &mut Connection, req: &mut Request) {
    req.set_status_code(StatusCode::Unauthorized.as_u16());

    let realm = state.options.auth_realm.get();
    let response = Response::new(StatusCode::Unauthorized)
        .with_header("WWW-Authenticate", &digest::challenge(&realm))
        .with_header("Content-Type", "text/plain")
        .with_body("Authorization required");

    if conn
        .send_response(response, req.method() != Method::HEAD)
        .is_err()
    {
        conn.close_after_response();
    }
}

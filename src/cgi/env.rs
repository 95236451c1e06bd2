//! # Entorno CGI/1.1
//! src/cgi/env.rs
//!
//! El bloque de variables tiene un tope de `MAX_ENV_BYTES` bytes y
//! `MAX_ENV_VARS` variables; lo que no entra se descarta y se registra, y
//! el script se ejecuta igual.

use crate::http::Request;
use crate::server::{Connection, ServerState};
use std::path::Path;
use tracing::warn;

pub const MAX_ENV_BYTES: usize = 4096;
pub const MAX_ENV_VARS: usize = 64;

/// Variables del proceso servidor que pasan al script
const PASSTHROUGH_VARS: [&str; 6] = ["PATH", "TMP", "TEMP", "TMPDIR", "LD_LIBRARY_PATH", "PERLLIB"];

const DEFAULT_PATH: &str = "/sbin:/bin:/usr/sbin:/usr/bin";

/// Bloque de variables de entorno con tope de tamaño
#[derive(Debug, Default)]
pub struct CgiEnv {
    vars: Vec<(String, String)>,
    bytes: usize,
}

impl CgiEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega `name=value` si todavía hay lugar
    pub fn add(&mut self, name: &str, value: &str) {
        // name + '=' + value + '\0'
        let size = name.len() + value.len() + 2;
        if self.vars.len() >= MAX_ENV_VARS || self.bytes + size > MAX_ENV_BYTES {
            warn!(var = name, "entorno CGI lleno, variable descartada");
            return;
        }
        self.bytes += size;
        self.vars.push((name.to_string(), value.to_string()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// `User-Agent` → `HTTP_USER_AGENT`
pub fn header_var_name(header: &str) -> String {
    let mut name = String::with_capacity(header.len() + 5);
    name.push_str("HTTP_");
    for ch in header.chars() {
        name.push(if ch == '-' { '_' } else { ch.to_ascii_uppercase() });
    }
    name
}

/// Arma el entorno de un script
pub fn build_env(
    state: &ServerState,
    conn: &Connection,
    req: &Request,
    script: &Path,
) -> CgiEnv {
    let mut env = CgiEnv::new();
    let root = state.options.root.get();
    let root = root.canonicalize().unwrap_or(root);

    let server_name = req
        .header("Host")
        .map(|host| host.split(':').next().unwrap_or(host).to_string())
        .unwrap_or_else(|| state.options.auth_realm.get());

    env.add("SERVER_SOFTWARE", concat!("emberd/", env!("CARGO_PKG_VERSION")));
    env.add("SERVER_NAME", &server_name);
    env.add("SERVER_PROTOCOL", &format!("HTTP/{}", req.version()));
    env.add("SERVER_PORT", &conn.local_addr().port().to_string());
    env.add("SERVER_ROOT", &root.to_string_lossy());
    env.add("DOCUMENT_ROOT", &root.to_string_lossy());
    env.add("GATEWAY_INTERFACE", "CGI/1.1");
    env.add("REDIRECT_STATUS", "200");
    env.add("REQUEST_METHOD", req.method().as_str());
    env.add("REQUEST_URI", req.raw_uri());
    env.add("REMOTE_ADDR", &conn.remote_addr().ip().to_string());
    env.add("REMOTE_PORT", &conn.remote_addr().port().to_string());
    env.add("QUERY_STRING", req.query_string().unwrap_or(""));
    env.add("HTTPS", if conn.is_tls() { "on" } else { "off" });

    let script_name = match script.strip_prefix(&root) {
        Ok(relative) => format!("/{}", relative.to_string_lossy()),
        Err(_) => req.uri().to_string(),
    };
    env.add("SCRIPT_NAME", &script_name);
    env.add("SCRIPT_FILENAME", &script.to_string_lossy());
    env.add("PATH_TRANSLATED", &script.to_string_lossy());

    if let Some(user) = req.remote_user() {
        env.add("REMOTE_USER", user);
        env.add("AUTH_TYPE", "Digest");
    }
    if let Some(content_type) = req.header("Content-Type") {
        env.add("CONTENT_TYPE", content_type);
    }
    if let Some(length) = req.header("Content-Length") {
        env.add("CONTENT_LENGTH", length.trim());
    }

    for var in PASSTHROUGH_VARS {
        match std::env::var(var) {
            Ok(value) => env.add(var, &value),
            Err(_) if var == "PATH" => env.add(var, DEFAULT_PATH),
            Err(_) => {}
        }
    }

    for (name, value) in req.headers() {
        env.add(&header_var_name(name), value);
    }

    for (name, value) in state.options.cgi_environment.get() {
        env.add(&name, &value);
    }

    env
}

//! # Logs
//! src/logging.rs
//!
//! Dos salidas:
//!
//! - `tracing` para el log de diagnóstico del proceso (stderr, filtrable con
//!   `RUST_LOG`)
//! - archivos append-only de access log (formato common log) y error log,
//!   configurables en caliente con `access_log` / `error_log`

use crate::http::Request;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Inicializa el subscriber de `tracing` (nivel `info` si no hay `RUST_LOG`).
///
/// Llamarlo más de una vez no tiene efecto.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Archivos de log abiertos por el servidor
#[derive(Debug, Default)]
pub struct LogFiles {
    access: Mutex<Option<File>>,
    error: Mutex<Option<File>>,
}

impl LogFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abre (o cierra, con `None`) el access log
    pub fn reopen_access(&self, path: Option<&Path>) -> io::Result<()> {
        let file = path.map(open_append).transpose()?;
        *self.access.lock().unwrap() = file;
        Ok(())
    }

    /// Abre (o cierra, con `None`) el error log
    pub fn reopen_error(&self, path: Option<&Path>) -> io::Result<()> {
        let file = path.map(open_append).transpose()?;
        *self.error.lock().unwrap() = file;
        Ok(())
    }

    /// Registra un request terminado en formato common log
    ///
    /// `127.0.0.1 - alice [date] "GET /x HTTP/1.1" 200 512 "referer" "agent"`
    pub fn log_access(&self, req: &Request, bytes_sent: u64) {
        let mut guard = self.access.lock().unwrap();
        let Some(file) = guard.as_mut() else {
            return;
        };

        let line = format!(
            "{} - {} [{}] \"{} {} HTTP/{}\" {} {} \"{}\" \"{}\"\n",
            req.remote_addr().ip(),
            req.remote_user().unwrap_or("-"),
            httpdate::fmt_http_date(SystemTime::now()),
            req.method().as_str(),
            req.raw_uri(),
            req.version(),
            req.status_code(),
            bytes_sent,
            req.header("Referer").unwrap_or("-"),
            req.header("User-Agent").unwrap_or("-"),
        );

        if let Err(e) = file.write_all(line.as_bytes()) {
            warn!(error = %e, "no se pudo escribir el access log");
        }
    }

    /// Registra un error asociado a un cliente.
    ///
    /// Siempre pasa por `tracing`; además se agrega al error log si está
    /// configurado.
    pub fn log_error(&self, remote: SocketAddr, req: Option<&Request>, message: &str) {
        let (method, uri) = req
            .map(|r| (r.method().as_str(), r.raw_uri()))
            .unwrap_or(("-", "-"));

        warn!(client = %remote.ip(), method, uri, "{}", message);

        let mut guard = self.error.lock().unwrap();
        if let Some(file) = guard.as_mut() {
            let line = format!(
                "[{}] [error] [client {}] {} {}: {}\n",
                httpdate::fmt_http_date(SystemTime::now()),
                remote.ip(),
                method,
                uri,
                message
            );
            let _ = file.write_all(line.as_bytes());
        }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

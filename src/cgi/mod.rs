//! # CGI
//! src/cgi/mod.rs
//!
//! Ejecuta scripts CGI/1.1:
//!
//! 1. Arma el entorno (`env::build_env`)
//! 2. Lanza el intérprete (`cgi_interpreter`, la línea `#!` del script o el
//!    script mismo) con el directorio del script como directorio actual
//! 3. Pasa el body del POST por stdin
//! 4. Lee las cabeceras que imprime el script: `Status:` cambia la status
//!    line y un `Location:` sin `Status:` contesta 302
//! 5. Copia el resto de la salida al cliente. Si el script no manda
//!    `Content-Length` la conexión se cierra al terminar

pub mod env;

use crate::http::request::{request_len, MAX_HEADERS};
use crate::http::{Method, Request, StatusCode};
use crate::process::{self, ChildGuard};
use crate::router::send_error;
use crate::server::{Connection, ServerState};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;
use tracing::debug;

/// Tamaño máximo de las cabeceras que imprime un script
pub const MAX_CGI_HEADER_SIZE: usize = 16 * 1024;

/// Cabeceras de la salida de un script ya interpretadas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgiHead {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
}

impl CgiHead {
    fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

/// Interpreta el bloque de cabeceras de un script
pub fn parse_cgi_head(block: &[u8]) -> io::Result<CgiHead> {
    let text = String::from_utf8_lossy(block);
    let mut status = None;
    let mut headers = Vec::new();

    for line in text.split('\n').map(|l| l.trim_end_matches('\r')) {
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(malformed(format!("bad CGI header line: {}", line)));
        };
        let (name, value) = (name.trim(), value.trim());

        if name.eq_ignore_ascii_case("Status") {
            let (code, reason) = value.split_once(' ').unwrap_or((value, ""));
            let code: u16 = code
                .parse()
                .map_err(|_| malformed(format!("bad CGI status: {}", value)))?;
            status = Some((code, reason.trim().to_string()));
        } else if !name.eq_ignore_ascii_case("Connection") {
            if headers.len() >= MAX_HEADERS {
                return Err(malformed("too many CGI headers".to_string()));
            }
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let redirect = headers
        .iter()
        .any(|(n, _)| n.eq_ignore_ascii_case("Location"));
    let (status, reason) = match status {
        Some(status) => status,
        None if redirect => (302, String::new()),
        None => (200, String::new()),
    };
    let reason = if reason.is_empty() {
        StatusCode::from_u16(status)
            .map(|s| s.reason_phrase().to_string())
            .unwrap_or_else(|| "OK".to_string())
    } else {
        reason
    };

    Ok(CgiHead {
        status,
        reason,
        headers,
    })
}

fn malformed(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// Programa y argumentos para ejecutar `script`
fn command_for(state: &ServerState, script: &Path) -> io::Result<(OsString, Vec<OsString>)> {
    if let Some(interpreter) = state.options.cgi_interpreter.get() {
        return Ok((interpreter.into_os_string(), vec![script.as_os_str().to_owned()]));
    }

    let mut first_line = String::new();
    BufReader::new(File::open(script)?)
        .take(1024)
        .read_line(&mut first_line)?;

    if let Some(shebang) = first_line.strip_prefix("#!") {
        let mut words = shebang.split_whitespace();
        if let Some(program) = words.next() {
            let mut args: Vec<OsString> = words.map(OsString::from).collect();
            args.push(script.as_os_str().to_owned());
            return Ok((OsString::from(program), args));
        }
    }

    Ok((script.as_os_str().to_owned(), Vec::new()))
}

/// Lee de `stdout` hasta el final de las cabeceras.
///
/// Devuelve el bloque de cabeceras y lo que ya se leyó del body.
fn read_cgi_head(stdout: &mut impl Read) -> io::Result<(Vec<u8>, Vec<u8>)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        if let Some(n) = request_len(&buf) {
            let body = buf.split_off(n);
            return Ok((buf, body));
        }
        if buf.len() >= MAX_CGI_HEADER_SIZE {
            return Err(malformed("CGI headers too large".to_string()));
        }

        let n = stdout.read(&mut chunk)?;
        if n == 0 {
            return Err(malformed("CGI program sent no header terminator".to_string()));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Ejecuta un script CGI y envía su salida
pub fn run_cgi(state: &ServerState, conn: &mut Connection, req: &mut Request, script: &Path) {
    let script = match fs::canonicalize(script) {
        Ok(script) => script,
        Err(e) => {
            let detail = format!("Cannot resolve {}: {}", script.display(), e);
            send_error(state, conn, req, StatusCode::InternalServerError, &detail);
            return;
        }
    };

    let env = env::build_env(state, conn, req, &script);
    let spawned = command_for(state, &script).and_then(|(program, args)| {
        debug!(program = ?program, script = %script.display(), "lanzando CGI");
        process::spawn_piped(&program, &args, script.parent(), Some(env.vars()))
    });
    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            let detail = format!("Cannot run CGI program {}: {}", script.display(), e);
            send_error(state, conn, req, StatusCode::InternalServerError, &detail);
            return;
        }
    };

    if let Err(e) = forward_body(conn, req, &mut child) {
        conn.close_after_response();
        let detail = format!("Cannot pass request body to CGI: {}", e);
        send_error(state, conn, req, StatusCode::InternalServerError, &detail);
        return;
    }

    let Some(mut stdout) = child.take_stdout() else {
        send_error(state, conn, req, StatusCode::InternalServerError, "CGI stdout unavailable");
        return;
    };

    let head = read_cgi_head(&mut stdout).and_then(|(block, body)| Ok((parse_cgi_head(&block)?, body)));
    let (head, body_start) = match head {
        Ok(parsed) => parsed,
        Err(e) => {
            let detail = format!("CGI program sent malformed headers: {}", e);
            send_error(state, conn, req, StatusCode::InternalServerError, &detail);
            return;
        }
    };

    req.set_status_code(head.status);
    if !head.has_header("Content-Length") {
        conn.close_after_response();
    }

    if send_cgi_output(conn, &head, &body_start, &mut stdout).is_err() {
        conn.close_after_response();
        return;
    }

    drop(stdout);
    match child.wait() {
        Ok(status) => debug!(script = %script.display(), %status, "CGI terminado"),
        Err(e) => debug!(script = %script.display(), error = %e, "no se pudo esperar al CGI"),
    }
}

/// Copia el body del POST al stdin del script y lo cierra
fn forward_body(conn: &mut Connection, req: &Request, child: &mut ChildGuard) -> io::Result<()> {
    let Some(mut stdin) = child.take_stdin() else {
        return Ok(());
    };
    if req.method() != Method::POST {
        return Ok(());
    }

    let mut chunk = [0u8; 8192];
    loop {
        let n = conn.read_body(&mut chunk)?;
        if n == 0 {
            return Ok(());
        }
        stdin.write_all(&chunk[..n])?;
    }
}

fn send_cgi_output(
    conn: &mut Connection,
    head: &CgiHead,
    body_start: &[u8],
    stdout: &mut impl Read,
) -> io::Result<()> {
    let mut out = format!("HTTP/1.1 {} {}\r\n", head.status, head.reason);
    for (name, value) in &head.headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    let connection = if conn.keep_alive() { "keep-alive" } else { "close" };
    out.push_str(&format!("Connection: {}\r\n\r\n", connection));
    conn.write_all(out.as_bytes())?;

    conn.write_all(body_start)?;
    io::copy(stdout, conn)?;
    conn.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_status() {
        let head = parse_cgi_head(b"Content-Type: text/plain\r\n\r\n").unwrap();
        assert_eq!(head.status, 200);
        assert_eq!(head.reason, "OK");
        assert_eq!(head.headers, vec![("Content-Type".to_string(), "text/plain".to_string())]);
    }

    #[test]
    fn test_parse_status_header() {
        let head = parse_cgi_head(b"Status: 404 Nope\nContent-Type: text/html\n\n").unwrap();
        assert_eq!(head.status, 404);
        assert_eq!(head.reason, "Nope");
        assert!(!head.has_header("Status"));

        let head = parse_cgi_head(b"Status: 500\n\n").unwrap();
        assert_eq!(head.reason, "Internal Server Error");
    }

    #[test]
    fn test_parse_location_redirect() {
        let head = parse_cgi_head(b"Location: /elsewhere\r\n\r\n").unwrap();
        assert_eq!(head.status, 302);
        assert_eq!(head.reason, "Found");
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse_cgi_head(b"no colon here\n\n").is_err());
        assert!(parse_cgi_head(b"Status: abc\n\n").is_err());
    }

    #[test]
    fn test_read_cgi_head_splits_body() {
        let mut output: &[u8] = b"Content-Type: text/plain\n\nhello";
        let (block, body) = read_cgi_head(&mut output).unwrap();
        assert_eq!(block, b"Content-Type: text/plain\n\n");
        assert_eq!(body, b"hello");
    }

    #[test]
    fn test_read_cgi_head_without_terminator() {
        let mut output: &[u8] = b"Content-Type: text/plain\n";
        assert!(read_cgi_head(&mut output).is_err());
    }
}

//! # Server Side Includes
//! src/ssi/mod.rs
//!
//! Se procesan dos directivas dentro de archivos con extensión SSI:
//!
//! - `<!--#include virtual="p" -->`: `p` relativo al document root
//! - `<!--#include file="p" -->`: `p` relativo al directorio actual del
//!   servidor, o absoluto
//! - `<!--#include "p" -->`: `p` relativo al archivo que incluye
//! - `<!--#exec "cmd" -->`: salida de `cmd` ejecutado con `sh -c`
//!
//! Los includes se procesan recursivamente hasta `MAX_INCLUDE_DEPTH`
//! niveles. Todo lo demás (incluido cualquier otro `<...>`) se copia tal
//! cual. Las respuestas SSI no llevan `Content-Length` y cierran la
//! conexión.

use crate::config::options::OptionStore;
use crate::http::{Method, Request, Response, StatusCode};
use crate::process;
use crate::router::send_error;
use crate::server::{Connection, ServerState};
use regex::Regex;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::warn;

pub const MAX_INCLUDE_DEPTH: usize = 10;
pub const MAX_TAG_SIZE: usize = 8 * 1024;

/// Directiva reconocida dentro de un tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    IncludeVirtual(String),
    IncludeFile(String),
    IncludeRelative(String),
    Exec(String),
}

fn include_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^<!--#include\s+(?:(virtual|file)\s*=\s*)?"([^"]*)"\s*-->$"#)
            .expect("include regex")
    })
}

fn exec_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^<!--#exec\s+"([^"]*)"\s*-->$"#).expect("exec regex"))
}

/// ¿Es un tag `<!--#...-->`?
fn is_directive(tag: &[u8]) -> bool {
    tag.starts_with(b"<!--#") && tag.ends_with(b"-->")
}

/// Reconoce una directiva; `None` si la sintaxis no es válida
///
/// # Ejemplo
/// ```
/// use emberd::ssi::{parse_directive, Directive};
///
/// assert_eq!(
///     parse_directive(r#"<!--#include virtual="/header.html" -->"#),
///     Some(Directive::IncludeVirtual("/header.html".to_string()))
/// );
/// assert_eq!(parse_directive("<!--#echo var=\"x\" -->"), None);
/// ```
pub fn parse_directive(tag: &str) -> Option<Directive> {
    if let Some(caps) = include_regex().captures(tag) {
        let target = caps[2].to_string();
        return Some(match caps.get(1).map(|m| m.as_str()) {
            Some("virtual") => Directive::IncludeVirtual(target),
            Some(_) => Directive::IncludeFile(target),
            None => Directive::IncludeRelative(target),
        });
    }
    exec_regex()
        .captures(tag)
        .map(|caps| Directive::Exec(caps[1].to_string()))
}

/// Path de un include según su tipo
fn include_path(options: &OptionStore, current: &Path, directive: &Directive) -> Option<PathBuf> {
    match directive {
        Directive::IncludeVirtual(p) => Some(crate::files::resolve_path(options, p)),
        Directive::IncludeFile(p) => Some(PathBuf::from(p)),
        Directive::IncludeRelative(p) => Some(current.parent().unwrap_or(Path::new(".")).join(p)),
        Directive::Exec(_) => None,
    }
}

/// Contesta con un archivo SSI procesado
pub fn send_ssi(state: &ServerState, conn: &mut Connection, req: &mut Request, path: &Path) {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            let detail = format!("Cannot open {}: {}", path.display(), e);
            send_error(state, conn, req, StatusCode::InternalServerError, &detail);
            return;
        }
    };

    conn.close_after_response();
    req.set_status_code(StatusCode::Ok.as_u16());
    let response = Response::new(StatusCode::Ok).with_header("Content-Type", "text/html");
    if conn.send_response(response, false).is_err() || req.method() == Method::HEAD {
        return;
    }

    let processor = SsiProcessor { state, req };
    if let Err(e) = processor.process(conn, path, file, 0) {
        warn!(path = %path.display(), error = %e, "error enviando SSI");
    }
}

struct SsiProcessor<'a> {
    state: &'a ServerState,
    req: &'a Request,
}

impl SsiProcessor<'_> {
    /// Copia `input` a `out` resolviendo las directivas
    fn process(&self, out: &mut impl Write, path: &Path, input: impl Read, depth: usize) -> io::Result<()> {
        let mut pending: Vec<u8> = Vec::with_capacity(8192);
        let mut tag: Vec<u8> = Vec::new();
        let mut in_tag = false;

        for byte in BufReader::new(input).bytes() {
            let ch = byte?;

            if in_tag {
                if ch == b'<' {
                    // Un `<` nuevo: lo anterior no era un tag
                    pending.append(&mut tag);
                    tag.push(ch);
                    continue;
                }
                tag.push(ch);
                if ch == b'>' {
                    in_tag = false;
                    if is_directive(&tag) {
                        out.write_all(&pending)?;
                        pending.clear();
                        self.run_directive(out, path, &tag, depth)?;
                    } else {
                        pending.append(&mut tag);
                    }
                    tag.clear();
                } else if tag.len() >= MAX_TAG_SIZE {
                    self.log(&format!("SSI tag too large in {}", path.display()));
                    in_tag = false;
                    pending.append(&mut tag);
                }
            } else if ch == b'<' {
                in_tag = true;
                tag.push(ch);
            } else {
                pending.push(ch);
            }

            if pending.len() >= 8192 {
                out.write_all(&pending)?;
                pending.clear();
            }
        }

        pending.append(&mut tag);
        out.write_all(&pending)
    }

    fn run_directive(&self, out: &mut impl Write, path: &Path, tag: &[u8], depth: usize) -> io::Result<()> {
        let text = String::from_utf8_lossy(tag);
        let Some(directive) = parse_directive(&text) else {
            self.log(&format!("Unknown SSI directive in {}: {}", path.display(), text));
            return Ok(());
        };

        if let Directive::Exec(command) = &directive {
            return self.exec(out, command);
        }

        if depth + 1 >= MAX_INCLUDE_DEPTH {
            self.log(&format!("SSI #include level is too deep ({})", path.display()));
            return Ok(());
        }

        let Some(target) = include_path(&self.state.options, path, &directive) else {
            return Ok(());
        };
        match File::open(&target) {
            Ok(file) => {
                let nested_ssi = OptionStore::has_extension(&self.state.options.ssi_extensions.get(), &target);
                if nested_ssi {
                    self.process(out, &target, file, depth + 1)
                } else {
                    io::copy(&mut BufReader::new(file), out).map(|_| ())
                }
            }
            Err(e) => {
                self.log(&format!("Cannot open SSI #include {}: {}", target.display(), e));
                Ok(())
            }
        }
    }

    fn exec(&self, out: &mut impl Write, command: &str) -> io::Result<()> {
        let (program, args) = process::shell_command(command);
        let mut child = match process::spawn_piped(&program, &args, None, None) {
            Ok(child) => child,
            Err(e) => {
                self.log(&format!("Cannot run SSI #exec \"{}\": {}", command, e));
                return Ok(());
            }
        };
        drop(child.take_stdin());

        if let Some(mut stdout) = child.take_stdout() {
            io::copy(&mut stdout, out)?;
        }
        let _ = child.wait();
        Ok(())
    }

    fn log(&self, message: &str) {
        self.state
            .logs
            .log_error(self.req.remote_addr(), Some(self.req), message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_include_variants() {
        assert_eq!(
            parse_directive(r#"<!--#include file="/etc/motd" -->"#),
            Some(Directive::IncludeFile("/etc/motd".to_string()))
        );
        assert_eq!(
            parse_directive(r#"<!--#include "footer.html"-->"#),
            Some(Directive::IncludeRelative("footer.html".to_string()))
        );
        assert_eq!(
            parse_directive(r#"<!--#include virtual = "/a.html" -->"#),
            Some(Directive::IncludeVirtual("/a.html".to_string()))
        );
    }

    #[test]
    fn test_parse_exec() {
        assert_eq!(
            parse_directive(r#"<!--#exec "ls -l" -->"#),
            Some(Directive::Exec("ls -l".to_string()))
        );
        assert_eq!(parse_directive("<!--#exec ls -->"), None);
    }

    #[test]
    fn test_is_directive() {
        assert!(is_directive(b"<!--#include \"x\" -->"));
        assert!(!is_directive(b"<!-- comment -->"));
        assert!(!is_directive(b"<b>"));
    }

    #[test]
    fn test_relative_include_path() {
        let options = OptionStore::new().unwrap();
        let path = include_path(
            &options,
            Path::new("/www/docs/page.shtml"),
            &Directive::IncludeRelative("part.html".to_string()),
        );
        assert_eq!(path, Some(PathBuf::from("/www/docs/part.html")));
    }
}

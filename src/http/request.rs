//! # Parsing de Requests HTTP/1.1
//! src/http/request.rs
//!
//! Este módulo implementa el parser de la cabecera de un request y la
//! estructura `Request` ("request info") que el router y los callbacks
//! consultan. La estructura se reconstruye para cada request de una
//! conexión keep-alive.
//!
//! ## Formato de un Request
//!
//! ```text
//! GET /path?param1=value1 HTTP/1.1\r\n
//! Host: localhost:8080\r\n
//! Content-Length: 5\r\n
//! \r\n
//! hello
//! ```
//!
//! El parser solo recibe la parte anterior a la línea vacía. El body lo lee
//! la conexión según `Content-Length`.

use crate::http::url::{get_var, remove_double_dots, url_decode};
use crate::http::StatusCode;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use thiserror::Error;

/// Máximo de headers aceptados por request
pub const MAX_HEADERS: usize = 64;

/// Métodos HTTP soportados
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Obtener un recurso
    GET,

    /// HEAD - Como GET pero solo retorna headers
    HEAD,

    /// POST - Enviar datos a un recurso
    POST,

    /// PUT - Subir un archivo
    PUT,

    /// DELETE - Borrar un archivo
    DELETE,
}

impl Method {
    /// Parsea un método HTTP desde un string
    ///
    /// # Errores
    ///
    /// Retorna error si el método no es soportado
    fn from_str(s: &str) -> Result<Self, ParseError> {
        match s {
            "GET" => Ok(Method::GET),
            "HEAD" => Ok(Method::HEAD),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "DELETE" => Ok(Method::DELETE),
            _ => Err(ParseError::UnsupportedMethod(s.to_string())),
        }
    }

    /// Convierte el método a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
        }
    }

    /// Métodos que llevan body y por tanto exigen `Content-Length`
    pub fn expects_body(&self) -> bool {
        matches!(self, Method::POST | Method::PUT)
    }
}

/// Errores que pueden ocurrir durante el parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Request vacío
    #[error("Empty request")]
    EmptyRequest,

    /// Formato inválido de la request line
    #[error("Invalid request line format")]
    InvalidRequestLine,

    /// Método HTTP no soportado
    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// Versión HTTP que no es 1.0 ni 1.1
    #[error("Unsupported HTTP version: {0}")]
    InvalidHttpVersion(String),

    /// Header malformado
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Más de `MAX_HEADERS` headers
    #[error("Too many headers")]
    TooManyHeaders,

    /// `Content-Length` no numérico
    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),
}

impl ParseError {
    /// Status con el que se contesta este error
    pub fn status(&self) -> StatusCode {
        match self {
            ParseError::InvalidHttpVersion(_) => StatusCode::HttpVersionNotSupported,
            _ => StatusCode::BadRequest,
        }
    }
}

/// Longitud de la cabecera de un request contenido en `buf`.
///
/// Retorna `Some(n)` si `buf[..n]` termina en la línea vacía (`\r\n\r\n` o
/// `\n\n`), `None` si todavía falta recibir datos.
///
/// # Ejemplo
/// ```
/// use emberd::http::request::request_len;
///
/// assert_eq!(request_len(b"GET / HTTP/1.1\r\n\r\nextra"), Some(18));
/// assert_eq!(request_len(b"GET / HTTP/1.1\r\nHost: x"), None);
/// ```
pub fn request_len(buf: &[u8]) -> Option<usize> {
    for i in 0..buf.len() {
        if buf[i] != b'\n' {
            continue;
        }
        if buf.get(i + 1) == Some(&b'\n') {
            return Some(i + 2);
        }
        if buf.get(i + 1) == Some(&b'\r') && buf.get(i + 2) == Some(&b'\n') {
            return Some(i + 3);
        }
    }
    None
}

/// Request HTTP parseado más el estado que el servidor le va agregando
/// (usuario autenticado, status resuelto, body leído).
#[derive(Debug, Clone)]
pub struct Request {
    /// Método HTTP
    method: Method,

    /// URI decodificado y normalizado (sin `..`)
    uri: String,

    /// URI tal como llegó en la request line, con query string
    raw_uri: String,

    /// Query string sin decodificar (lo que sigue al `?`)
    query_string: Option<String>,

    /// Versión HTTP ("1.0" o "1.1")
    version: String,

    /// Headers en el orden recibido
    headers: Vec<(String, String)>,

    /// Body, solo se llena para callbacks de usuario
    body: Vec<u8>,

    /// Dirección del cliente
    remote_addr: SocketAddr,

    /// Usuario autenticado por Digest
    remote_user: Option<String>,

    /// Status con el que se contestó
    status_code: u16,
}

impl Request {
    /// Parsea la cabecera de un request (hasta la línea vacía incluida)
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use emberd::http::Request;
    ///
    /// let raw = b"GET /docs/%41.txt?x=1 HTTP/1.1\r\nHost: a\r\n\r\n";
    /// let request = Request::parse(raw).unwrap();
    ///
    /// assert_eq!(request.uri(), "/docs/A.txt");
    /// assert_eq!(request.query_string(), Some("x=1"));
    /// assert_eq!(request.header("host"), Some("a"));
    /// ```
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        // Los headers se tratan como Latin-1/UTF-8 con pérdida
        let text = String::from_utf8_lossy(buffer);
        let mut lines = text.split('\n').map(|l| l.trim_end_matches('\r'));

        let request_line = lines.next().unwrap_or("");
        if request_line.trim().is_empty() {
            return Err(ParseError::EmptyRequest);
        }

        // 1. Request line
        let (method, raw_uri, version) = Self::parse_request_line(request_line)?;

        // 2. Headers hasta la línea vacía
        let headers = Self::parse_headers(lines)?;

        // 3. URI: separar query, decodificar y normalizar
        let (path, query_string) = match raw_uri.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (raw_uri.as_str(), None),
        };
        let decoded = String::from_utf8_lossy(&url_decode(path.as_bytes(), false)).into_owned();
        let uri = remove_double_dots(&decoded);

        let request = Request {
            method,
            uri,
            raw_uri,
            query_string,
            version,
            headers,
            body: Vec::new(),
            remote_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)),
            remote_user: None,
            status_code: 0,
        };

        // Validar Content-Length aquí para contestar 400 antes de rutear
        if let Some(value) = request.header("Content-Length") {
            if value.trim().parse::<u64>().is_err() {
                return Err(ParseError::InvalidContentLength(value.to_string()));
            }
        }

        Ok(request)
    }

    /// Request vacío para reportar errores ocurridos antes del parsing
    pub fn placeholder(remote_addr: SocketAddr) -> Self {
        Request {
            method: Method::GET,
            uri: "-".to_string(),
            raw_uri: "-".to_string(),
            query_string: None,
            version: "1.1".to_string(),
            headers: Vec::new(),
            body: Vec::new(),
            remote_addr,
            remote_user: None,
            status_code: 0,
        }
    }

    /// Parsea la request line
    ///
    /// Formato: `GET /path?query HTTP/1.1`
    fn parse_request_line(line: &str) -> Result<(Method, String, String), ParseError> {
        let parts: Vec<&str> = line.split_whitespace().collect();

        // Debe tener exactamente 3 partes: METHOD URI VERSION
        if parts.len() != 3 {
            return Err(ParseError::InvalidRequestLine);
        }

        let method = Method::from_str(parts[0])?;

        let uri = parts[1];
        if !uri.starts_with('/') {
            return Err(ParseError::InvalidRequestLine);
        }

        let version = parts[2]
            .strip_prefix("HTTP/")
            .ok_or(ParseError::InvalidRequestLine)?;
        if version != "1.0" && version != "1.1" {
            return Err(ParseError::InvalidHttpVersion(parts[2].to_string()));
        }

        Ok((method, uri.to_string(), version.to_string()))
    }

    /// Parsea los headers HTTP
    ///
    /// Cada header tiene formato: "Name: Value"
    fn parse_headers<'a>(
        lines: impl Iterator<Item = &'a str>,
    ) -> Result<Vec<(String, String)>, ParseError> {
        let mut headers = Vec::new();

        for line in lines {
            // La línea vacía marca el fin de los headers
            if line.is_empty() {
                break;
            }

            if headers.len() >= MAX_HEADERS {
                return Err(ParseError::TooManyHeaders);
            }

            match line.split_once(':') {
                Some((name, value)) if !name.trim().is_empty() => {
                    headers.push((name.trim().to_string(), value.trim().to_string()));
                }
                _ => return Err(ParseError::InvalidHeader(line.to_string())),
            }
        }

        Ok(headers)
    }

    // === Métodos públicos para acceder a los campos ===

    /// Obtiene el método HTTP del request
    pub fn method(&self) -> Method {
        self.method
    }

    /// URI decodificado y normalizado
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// URI original, sin decodificar
    pub fn raw_uri(&self) -> &str {
        &self.raw_uri
    }

    /// Query string sin decodificar
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    /// Versión HTTP ("1.0" o "1.1")
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Todos los headers, en orden de llegada
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Obtiene un header (sin distinguir mayúsculas)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Valor de `Content-Length`, si existe
    pub fn content_length(&self) -> Option<u64> {
        self.header("Content-Length")
            .and_then(|v| v.trim().parse().ok())
    }

    /// Variable de la query string, decodificada
    ///
    /// # Ejemplo
    /// ```
    /// use emberd::http::Request;
    ///
    /// let raw = b"GET /test?num=42&q=a+b HTTP/1.0\r\n\r\n";
    /// let request = Request::parse(raw).unwrap();
    ///
    /// assert_eq!(request.query_var("num").as_deref(), Some("42"));
    /// assert_eq!(request.query_var("q").as_deref(), Some("a b"));
    /// assert_eq!(request.query_var("missing"), None);
    /// ```
    pub fn query_var(&self, name: &str) -> Option<String> {
        self.query_string.as_deref().and_then(|q| get_var(q, name))
    }

    /// Variable de un body `application/x-www-form-urlencoded`
    pub fn form_var(&self, name: &str) -> Option<String> {
        let body = std::str::from_utf8(&self.body).ok()?;
        get_var(body, name)
    }

    /// Body del request (vacío salvo para callbacks POST/PUT)
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub(crate) fn set_body(&mut self, body: Vec<u8>) {
        self.body = body;
    }

    /// Dirección del cliente
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub(crate) fn set_remote_addr(&mut self, addr: SocketAddr) {
        self.remote_addr = addr;
    }

    /// Usuario autenticado por Digest, si lo hay
    pub fn remote_user(&self) -> Option<&str> {
        self.remote_user.as_deref()
    }

    pub(crate) fn set_remote_user(&mut self, user: Option<String>) {
        self.remote_user = user;
    }

    /// Status con el que se contestó (0 mientras no se haya contestado)
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn set_status_code(&mut self, code: u16) {
        self.status_code = code;
    }

    /// ¿El cliente pide mantener la conexión abierta?
    ///
    /// HTTP/1.1 es keep-alive por defecto; un header `Connection` explícito
    /// manda sobre la versión.
    pub fn wants_keep_alive(&self) -> bool {
        match self.header("Connection") {
            Some(value) if value.eq_ignore_ascii_case("keep-alive") => true,
            Some(value) if value.eq_ignore_ascii_case("close") => false,
            _ => self.version == "1.1",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_get() {
        let raw = b"GET / HTTP/1.1\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.uri(), "/");
        assert_eq!(request.version(), "1.1");
        assert!(request.query_string().is_none());
    }

    #[test]
    fn test_parse_all_methods() {
        for (text, method) in [
            ("GET", Method::GET),
            ("HEAD", Method::HEAD),
            ("POST", Method::POST),
            ("PUT", Method::PUT),
            ("DELETE", Method::DELETE),
        ] {
            let raw = format!("{} /x HTTP/1.0\r\n\r\n", text);
            assert_eq!(Request::parse(raw.as_bytes()).unwrap().method(), method);
        }
    }

    #[test]
    fn test_uri_is_decoded_and_normalized() {
        let raw = b"GET /a/%2e%2e/../b%20c/./d+e HTTP/1.1\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.uri(), "/b c/d+e");
        assert_eq!(request.raw_uri(), "/a/%2e%2e/../b%20c/./d+e");
    }

    #[test]
    fn test_parse_with_headers() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost:8080\r\nUser-Agent: test\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.header("Host"), Some("localhost:8080"));
        assert_eq!(request.header("user-agent"), Some("test"));
        assert_eq!(request.headers().len(), 2);
    }

    #[test]
    fn test_bare_newlines_accepted() {
        let raw = b"GET /x HTTP/1.0\nHost: a\n\n";
        let request = Request::parse(raw).unwrap();
        assert_eq!(request.header("Host"), Some("a"));
    }

    #[test]
    fn test_invalid_method() {
        let raw = b"BREW /pot HTTP/1.1\r\n\r\n";
        let result = Request::parse(raw);

        assert!(matches!(result, Err(ParseError::UnsupportedMethod(_))));
        assert_eq!(result.unwrap_err().status(), StatusCode::BadRequest);
    }

    #[test]
    fn test_invalid_version() {
        let raw = b"GET / HTTP/2.0\r\n\r\n";
        let result = Request::parse(raw);

        assert!(matches!(result, Err(ParseError::InvalidHttpVersion(_))));
        assert_eq!(result.unwrap_err().status(), StatusCode::HttpVersionNotSupported);
    }

    #[test]
    fn test_garbage_version_is_bad_request() {
        let result = Request::parse(b"GET / FTP/1.0\r\n\r\n");
        assert_eq!(result.unwrap_err(), ParseError::InvalidRequestLine);
    }

    #[test]
    fn test_empty_request() {
        assert!(matches!(Request::parse(b""), Err(ParseError::EmptyRequest)));
    }

    #[test]
    fn test_invalid_request_line() {
        assert!(matches!(
            Request::parse(b"GET\r\n\r\n"),
            Err(ParseError::InvalidRequestLine)
        ));
        assert!(matches!(
            Request::parse(b"GET relative HTTP/1.1\r\n\r\n"),
            Err(ParseError::InvalidRequestLine)
        ));
    }

    #[test]
    fn test_invalid_header() {
        let result = Request::parse(b"GET / HTTP/1.1\r\nno colon here\r\n\r\n");
        assert!(matches!(result, Err(ParseError::InvalidHeader(_))));
    }

    #[test]
    fn test_too_many_headers() {
        let mut raw = String::from("GET / HTTP/1.1\r\n");
        for i in 0..=MAX_HEADERS {
            raw.push_str(&format!("X-H{}: v\r\n", i));
        }
        raw.push_str("\r\n");
        assert_eq!(
            Request::parse(raw.as_bytes()).unwrap_err(),
            ParseError::TooManyHeaders
        );
    }

    #[test]
    fn test_invalid_content_length() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: abc\r\n\r\n";
        assert!(matches!(
            Request::parse(raw),
            Err(ParseError::InvalidContentLength(_))
        ));
    }

    #[test]
    fn test_keep_alive_rules() {
        let v11 = Request::parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        let v10 = Request::parse(b"GET / HTTP/1.0\r\n\r\n").unwrap();
        let v11_close = Request::parse(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n").unwrap();
        let v10_ka = Request::parse(b"GET / HTTP/1.0\r\nConnection: Keep-Alive\r\n\r\n").unwrap();

        assert!(v11.wants_keep_alive());
        assert!(!v10.wants_keep_alive());
        assert!(!v11_close.wants_keep_alive());
        assert!(v10_ka.wants_keep_alive());
    }

    #[test]
    fn test_form_var_from_body() {
        let mut request = Request::parse(b"POST /f HTTP/1.1\r\nContent-Length: 13\r\n\r\n").unwrap();
        request.set_body(b"name=a+b&x=%41".to_vec());

        assert_eq!(request.form_var("name").as_deref(), Some("a b"));
        assert_eq!(request.form_var("x").as_deref(), Some("A"));
        assert_eq!(request.content_length(), Some(13));
    }

    #[test]
    fn test_request_len_variants() {
        assert_eq!(request_len(b"GET / HTTP/1.0\n\n"), Some(16));
        assert_eq!(request_len(b""), None);
        assert_eq!(request_len(b"GET / HTTP/1.1\r\n"), None);
    }
}

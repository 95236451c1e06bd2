//! # Construcción de Respuestas HTTP
//! src/http/response.rs
//!
//! API para construir la cabecera (y opcionalmente un body pequeño) de una
//! respuesta HTTP/1.1. Los bodies grandes (archivos, salida CGI, SSI) no
//! pasan por aquí: se escribe la cabecera con `head_bytes` y luego se
//! copian los datos directamente al socket.
//!
//! ## Ejemplo de uso
//!
//! ```
//! use emberd::http::{Response, StatusCode};
//!
//! let response = Response::new(StatusCode::Ok)
//!     .with_header("Content-Type", "text/plain")
//!     .with_body("Hello");
//!
//! let bytes = response.to_bytes();
//! assert!(bytes.starts_with(b"HTTP/1.1 200 OK\r\n"));
//! ```

use super::StatusCode;

/// Representa una respuesta HTTP/1.1
#[derive(Debug, Clone)]
pub struct Response {
    /// Código de estado HTTP (200, 404, etc.)
    status: StatusCode,

    /// Headers en el orden en que se agregaron
    headers: Vec<(String, String)>,

    /// Cuerpo de la respuesta (puede ser vacío)
    body: Vec<u8>,
}

impl Response {
    /// Crea una nueva respuesta con el código de estado especificado
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Agrega un header a la respuesta
    ///
    /// Si el header ya existe, se sobrescribe.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.add_header(name, value);
        self
    }

    /// Agrega un header a una respuesta existente (versión mutable)
    pub fn add_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    /// Establece el cuerpo de la respuesta desde un string
    ///
    /// Automáticamente calcula y agrega el header `Content-Length`.
    pub fn with_body(self, body: &str) -> Self {
        self.with_body_bytes(body.as_bytes().to_vec())
    }

    /// Establece el cuerpo de la respuesta desde bytes
    pub fn with_body_bytes(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        let len = self.body.len().to_string();
        self.add_header("Content-Length", &len);
        self
    }

    /// Respuesta de error en texto plano: `Error 404: Not Found` más detalle
    ///
    /// # Ejemplo
    /// ```
    /// use emberd::http::{Response, StatusCode};
    ///
    /// let response = Response::error(StatusCode::NotFound, "File not found");
    /// assert_eq!(response.body(), b"Error 404: Not Found\nFile not found");
    /// ```
    pub fn error(status: StatusCode, message: &str) -> Self {
        let mut body = format!("Error {}: {}", status.as_u16(), status.reason_phrase());
        if !message.is_empty() {
            body.push('\n');
            body.push_str(message);
        }
        Self::new(status)
            .with_header("Content-Type", "text/plain")
            .with_body(&body)
    }

    /// Status line + headers + línea vacía, sin body
    pub fn head_bytes(&self) -> Vec<u8> {
        let mut result = Vec::new();

        // 1. Status line
        result.extend_from_slice(format!("HTTP/1.1 {}\r\n", self.status).as_bytes());

        // 2. Headers
        for (name, value) in &self.headers {
            result.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }

        // 3. Línea vacía que separa headers del body
        result.extend_from_slice(b"\r\n");

        result
    }

    /// Convierte la respuesta completa a bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = self.head_bytes();
        result.extend_from_slice(&self.body);
        result
    }

    /// Obtiene el código de estado de la respuesta
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Obtiene un header por nombre (sin distinguir mayúsculas)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Obtiene una referencia a los headers
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Obtiene una referencia al body
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_response() {
        let response = Response::new(StatusCode::Ok);
        assert_eq!(response.status(), StatusCode::Ok);
        assert!(response.headers().is_empty());
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_header_overwrite_keeps_position() {
        let response = Response::new(StatusCode::Ok)
            .with_header("Content-Type", "text/plain")
            .with_header("X-Custom", "value")
            .with_header("content-type", "text/html");

        assert_eq!(response.headers().len(), 2);
        assert_eq!(response.headers()[0].1, "text/html");
        assert_eq!(response.header("x-custom"), Some("value"));
    }

    #[test]
    fn test_with_body() {
        let response = Response::new(StatusCode::Ok).with_body("Hello World");

        assert_eq!(response.body(), b"Hello World");
        assert_eq!(response.header("Content-Length"), Some("11"));
    }

    #[test]
    fn test_to_bytes() {
        let response = Response::new(StatusCode::Created)
            .with_header("Content-Type", "text/plain")
            .with_body("Test");

        let text = String::from_utf8(response.to_bytes()).unwrap();

        assert!(text.starts_with("HTTP/1.1 201 Created\r\n"));
        assert!(text.contains("Content-Type: text/plain\r\n"));
        assert!(text.contains("Content-Length: 4\r\n"));
        assert!(text.ends_with("\r\n\r\nTest"));
    }

    #[test]
    fn test_head_bytes_has_no_body() {
        let response = Response::new(StatusCode::Ok).with_body("payload");
        let head = String::from_utf8(response.head_bytes()).unwrap();

        assert!(head.ends_with("\r\n\r\n"));
        assert!(!head.contains("payload"));
    }

    #[test]
    fn test_error_without_detail() {
        let response = Response::error(StatusCode::Forbidden, "");
        assert_eq!(response.body(), b"Error 403: Forbidden");
    }
}

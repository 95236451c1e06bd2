//! # Códigos de Estado HTTP
//! src/http/status.rs
//!
//! Este módulo define los códigos de estado HTTP/1.1 que usa el servidor.
//! Según el RFC 2616 los códigos se agrupan en 5 categorías:
//!
//! - **1xx**: Informacional (100 Continue)
//! - **2xx**: Éxito (200, 201, 206)
//! - **3xx**: Redirección y caché (301, 302, 304)
//! - **4xx**: Error del cliente (400, 401, 403, 404, 411, 416, 417)
//! - **5xx**: Error del servidor (500, 501, 505)

/// Representa los códigos de estado HTTP que soporta nuestro servidor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// 100 Continue - Respuesta intermedia a `Expect: 100-continue`
    Continue = 100,

    /// 200 OK - La petición fue exitosa
    Ok = 200,

    /// 201 Created - PUT creó un recurso nuevo
    Created = 201,

    /// 206 Partial Content - Respuesta a un `Range`
    PartialContent = 206,

    /// 301 Moved Permanently - Directorio pedido sin `/` final
    MovedPermanently = 301,

    /// 302 Found - Redirección emitida por un script CGI
    Found = 302,

    /// 304 Not Modified - `If-Modified-Since` todavía vigente
    NotModified = 304,

    /// 400 Bad Request - Request malformado
    BadRequest = 400,

    /// 401 Unauthorized - Faltan credenciales Digest válidas
    Unauthorized = 401,

    /// 403 Forbidden - Listado deshabilitado o archivo de passwords
    Forbidden = 403,

    /// 404 Not Found - Recurso no encontrado
    NotFound = 404,

    /// 411 Length Required - POST/PUT sin `Content-Length`
    LengthRequired = 411,

    /// 416 Range Not Satisfiable - `Range` fuera del archivo
    RangeNotSatisfiable = 416,

    /// 417 Expectation Failed - `Expect` distinto de `100-continue`
    ExpectationFailed = 417,

    /// 500 Internal Server Error - Error interno del servidor
    InternalServerError = 500,

    /// 501 Not Implemented - Método no soportado para CGI
    NotImplemented = 501,

    /// 505 HTTP Version Not Supported
    HttpVersionNotSupported = 505,
}

impl StatusCode {
    /// Convierte el código a su valor numérico
    ///
    /// # Ejemplo
    /// ```
    /// use emberd::http::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// ```
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Busca el código a partir de su valor numérico
    pub fn from_u16(code: u16) -> Option<Self> {
        let status = match code {
            100 => StatusCode::Continue,
            200 => StatusCode::Ok,
            201 => StatusCode::Created,
            206 => StatusCode::PartialContent,
            301 => StatusCode::MovedPermanently,
            302 => StatusCode::Found,
            304 => StatusCode::NotModified,
            400 => StatusCode::BadRequest,
            401 => StatusCode::Unauthorized,
            403 => StatusCode::Forbidden,
            404 => StatusCode::NotFound,
            411 => StatusCode::LengthRequired,
            416 => StatusCode::RangeNotSatisfiable,
            417 => StatusCode::ExpectationFailed,
            500 => StatusCode::InternalServerError,
            501 => StatusCode::NotImplemented,
            505 => StatusCode::HttpVersionNotSupported,
            _ => return None,
        };
        Some(status)
    }

    /// Retorna el texto de razón (reason phrase) asociado al código
    ///
    /// # Ejemplo
    /// ```
    /// use emberd::http::StatusCode;
    /// assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    /// assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
    /// ```
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Continue => "Continue",
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::PartialContent => "Partial Content",
            StatusCode::MovedPermanently => "Moved Permanently",
            StatusCode::Found => "Found",
            StatusCode::NotModified => "Not Modified",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Unauthorized => "Unauthorized",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::LengthRequired => "Length Required",
            StatusCode::RangeNotSatisfiable => "Requested Range Not Satisfiable",
            StatusCode::ExpectationFailed => "Expectation Failed",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::NotImplemented => "Not Implemented",
            StatusCode::HttpVersionNotSupported => "HTTP Version Not Supported",
        }
    }

    /// Verifica si el código indica éxito (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.as_u16())
    }

    /// Verifica si el código indica error (4xx o 5xx)
    ///
    /// # Ejemplo
    /// ```
    /// use emberd::http::StatusCode;
    /// assert!(StatusCode::BadRequest.is_error());
    /// assert!(!StatusCode::NotModified.is_error());
    /// ```
    pub fn is_error(&self) -> bool {
        self.as_u16() >= 400
    }
}

impl std::fmt::Display for StatusCode {
    /// Formato: "200 OK"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(StatusCode::NotModified.to_string(), "304 Not Modified");
        assert_eq!(
            StatusCode::HttpVersionNotSupported.to_string(),
            "505 HTTP Version Not Supported"
        );
    }

    #[test]
    fn test_from_u16_roundtrip() {
        for code in [200u16, 201, 206, 301, 304, 401, 403, 404, 411, 417, 500, 501, 505] {
            assert_eq!(StatusCode::from_u16(code).unwrap().as_u16(), code);
        }
        assert_eq!(StatusCode::from_u16(418), None);
    }

    #[test]
    fn test_categories() {
        assert!(StatusCode::Created.is_success());
        assert!(!StatusCode::Found.is_success());
        assert!(StatusCode::Unauthorized.is_error());
        assert!(StatusCode::InternalServerError.is_error());
    }
}

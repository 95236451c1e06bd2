//! # Módulo HTTP
//! src/http/mod.rs
//!
//! Este módulo implementa el subconjunto de HTTP/1.1 que habla el servidor,
//! sin librerías de alto nivel:
//!
//! - Parsing de la cabecera de requests (GET/HEAD/POST/PUT/DELETE)
//! - Construcción de responses
//! - Códigos de estado
//! - Decodificación de URLs y normalización de paths
//! - Tipos MIME
//!
//! ## Limitaciones
//!
//! - No hay chunked transfer-encoding: los bodies se delimitan con
//!   `Content-Length`
//! - Solo se atiende un rango por request (`Range: bytes=a-b`)
//!
//! ### Formato de Request
//!
//! ```text
//! GET /path?query=value HTTP/1.1\r\n
//! Header-Name: Header-Value\r\n
//! \r\n
//! ```

pub mod mime; // Tipos MIME por extensión
pub mod request; // Parsing de HTTP requests
pub mod response; // Construcción de HTTP responses
pub mod status; // Códigos de estado HTTP
pub mod url; // Decodificación y normalización de URLs

// Re-exportamos los tipos principales para facilitar su uso
pub use request::{Method, ParseError, Request};
pub use response::Response;
pub use status::StatusCode;

//! # emberd
//! src/lib.rs
//!
//! Servidor HTTP/1.1 embebible: una aplicación lo arranca con
//! `Context::start`, registra sus propios handlers y deja que el servidor
//! atienda el resto (archivos estáticos, listados de directorios, CGI, SSI,
//! PUT/DELETE y autenticación Digest).
//!
//! ## Arquitectura
//!
//! El servidor está dividido en módulos especializados:
//! - `http`: Parsing de requests, construcción de responses y utilidades de URL
//! - `config`: Configuración de arranque (CLI / variables de entorno) y
//!   almacén de opciones modificables en caliente
//! - `server`: Listeners, master thread, límite de workers y conexiones
//! - `router`: Registros de la aplicación y despacho de cada request
//! - `auth`: Autenticación Digest y archivos de passwords
//! - `files`: Archivos estáticos, listados y PUT/DELETE
//! - `cgi` / `ssi`: Contenido dinámico
//! - `admin`: Página de administración de opciones
//! - `logging`: `tracing` más access log y error log
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use emberd::config::Config;
//! use emberd::http::{Response, StatusCode};
//! use emberd::server::Context;
//!
//! let config = Config { root: "/srv/www".to_string(), ..Config::default() };
//! let ctx = Context::start(&config).expect("Error al iniciar servidor");
//!
//! ctx.bind_to_uri("/api/time", |conn, _req| {
//!     let response = Response::new(StatusCode::Ok).with_body("12:00");
//!     let _ = conn.send_response(response, true);
//! });
//! ```

pub mod admin;
pub mod auth;
pub mod cgi;
pub mod config;
pub mod error;
pub mod files;
pub mod http;
pub mod logging;
pub mod process;
pub mod router;
pub mod server;
pub mod ssi;

pub use error::ServerError;

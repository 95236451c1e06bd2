//! # Sistema de Routing
//! src/router/mod.rs
//!
//! Este módulo guarda los registros de la aplicación y decide qué se hace
//! con cada request.
//!
//! ## Arquitectura
//!
//! ```text
//! Request → autenticación → callback de usuario → PUT/DELETE
//!         → archivo / directorio → CGI | SSI | estático
//! ```
//!
//! Hay tres tipos de registro, todos en una sola lista en orden de alta:
//!
//! - handlers de URI (patrón glob, gana el primero que encaje)
//! - handlers de error (por status exacto o para cualquier status)
//! - chequeos de autorización (reemplazan al archivo de passwords)

pub mod dispatch;
pub mod glob;

pub use dispatch::{dispatch, send_error};

use crate::http::Request;
use crate::server::Connection;
use std::sync::{Arc, RwLock};

/// Handler registrado por la aplicación. Escribe la respuesta directo en
/// la conexión.
pub trait Handler: Send + Sync {
    fn handle(&self, conn: &mut Connection, req: &Request);
}

impl<F> Handler for F
where
    F: Fn(&mut Connection, &Request) + Send + Sync,
{
    fn handle(&self, conn: &mut Connection, req: &Request) {
        self(conn, req)
    }
}

/// Chequeo de autorización registrado por la aplicación
pub trait AuthCheck: Send + Sync {
    fn authorize(&self, req: &Request) -> bool;
}

impl<F> AuthCheck for F
where
    F: Fn(&Request) -> bool + Send + Sync,
{
    fn authorize(&self, req: &Request) -> bool {
        self(req)
    }
}

enum Binding {
    Uri {
        pattern: String,
        handler: Arc<dyn Handler>,
    },
    Error {
        status: Option<u16>,
        handler: Arc<dyn Handler>,
    },
    Auth {
        pattern: String,
        check: Arc<dyn AuthCheck>,
    },
}

/// Registros de la aplicación
#[derive(Default)]
pub struct Router {
    bindings: RwLock<Vec<Binding>>,
}

impl Router {
    /// Crea un router vacío
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra un handler para los URIs que encajan con `pattern`
    ///
    /// # Ejemplo
    /// ```
    /// use emberd::router::Router;
    ///
    /// let router = Router::new();
    /// router.bind_to_uri("/api/*", |_conn, _req| {});
    /// assert!(router.find_uri_handler("/api/users").is_some());
    /// assert!(router.find_uri_handler("/other").is_none());
    /// ```
    pub fn bind_to_uri<F>(&self, pattern: &str, handler: F)
    where
        F: Fn(&mut Connection, &Request) + Send + Sync + 'static,
    {
        self.push(Binding::Uri {
            pattern: pattern.to_string(),
            handler: Arc::new(handler),
        });
    }

    /// Registra un handler de errores; `None` atiende cualquier status
    pub fn bind_to_error_code<F>(&self, status: Option<u16>, handler: F)
    where
        F: Fn(&mut Connection, &Request) + Send + Sync + 'static,
    {
        self.push(Binding::Error {
            status,
            handler: Arc::new(handler),
        });
    }

    /// Registra un chequeo de autorización para los URIs de `pattern`
    pub fn protect_uri<F>(&self, pattern: &str, check: F)
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.push(Binding::Auth {
            pattern: pattern.to_string(),
            check: Arc::new(check),
        });
    }

    fn push(&self, binding: Binding) {
        self.bindings.write().unwrap().push(binding);
    }

    /// Primer handler de URI cuyo patrón encaja
    pub fn find_uri_handler(&self, uri: &str) -> Option<Arc<dyn Handler>> {
        self.bindings.read().unwrap().iter().find_map(|b| match b {
            Binding::Uri { pattern, handler } if glob::matches(pattern, uri) => {
                Some(Arc::clone(handler))
            }
            _ => None,
        })
    }

    /// Primer handler de errores para `status` (exacto o genérico)
    pub fn find_error_handler(&self, status: u16) -> Option<Arc<dyn Handler>> {
        self.bindings.read().unwrap().iter().find_map(|b| match b {
            Binding::Error {
                status: code,
                handler,
            } if code.map_or(true, |c| c == status) => Some(Arc::clone(handler)),
            _ => None,
        })
    }

    /// Primer chequeo de autorización cuyo patrón encaja
    pub fn find_auth_check(&self, uri: &str) -> Option<Arc<dyn AuthCheck>> {
        self.bindings.read().unwrap().iter().find_map(|b| match b {
            Binding::Auth { pattern, check } if glob::matches(pattern, uri) => {
                Some(Arc::clone(check))
            }
            _ => None,
        })
    }

    /// Cantidad de registros
    pub fn len(&self) -> usize {
        self.bindings.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

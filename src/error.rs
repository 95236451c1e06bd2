//! # Errores del Servidor
//! src/error.rs
//!
//! Errores que pueden escapar de la API pública del servidor. Los errores
//! de una petición individual nunca llegan aquí: se contestan con un status
//! HTTP desde el router. Solo el arranque (bind de puertos, TLS) y los
//! cambios de opciones en caliente devuelven `ServerError`.

use std::net::SocketAddr;
use thiserror::Error;

/// Error de alto nivel del servidor
#[derive(Debug, Error)]
pub enum ServerError {
    /// Error de I/O genérico
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No se pudo abrir un socket de escucha
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Nombre de opción desconocido
    #[error("unknown option: {0}")]
    UnknownOption(String),

    /// Valor inválido para una opción conocida
    #[error("invalid value for option {name}: {reason}")]
    InvalidOption { name: &'static str, reason: String },

    /// Error cargando el certificado o configurando TLS
    #[error("TLS error: {0}")]
    Tls(String),
}

impl ServerError {
    /// Atajo para construir `InvalidOption`
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ServerError::InvalidOption {
            name,
            reason: reason.into(),
        }
    }
}

impl From<rustls::Error> for ServerError {
    fn from(e: rustls::Error) -> Self {
        ServerError::Tls(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_option_message() {
        let err = ServerError::invalid("max_threads", "must be >= 1");
        assert_eq!(
            err.to_string(),
            "invalid value for option max_threads: must be >= 1"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ServerError = io.into();
        assert!(matches!(err, ServerError::Io(_)));
    }
}

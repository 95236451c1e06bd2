//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! Este módulo implementa el servidor TCP que:
//! 1. Escucha en uno o más puertos (planos o TLS)
//! 2. Acepta conexiones entrantes y las filtra por ACL
//! 3. Atiende cada conexión en su propio worker thread, con un máximo de
//!    `max_threads` simultáneos
//! 4. Lee, parsea y rutea los requests de cada conexión (keep-alive)

pub mod acl; // Reglas de acceso por IP
pub mod connection; // Conexión con un cliente
pub mod context; // Arranque, parada y estado compartido
pub mod gate; // Límite de workers simultáneos
pub mod listener; // Sockets de escucha
pub mod tls; // Certificados y handshake TLS

// Re-exportar para facilitar el uso
pub use connection::Connection;
pub use context::{Context, ServerState};

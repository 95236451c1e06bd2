//! # TLS
//! src/server/tls.rs
//!
//! Carga de certificados para los puertos marcados con `s` y handshake del
//! lado servidor. El archivo de `ssl_cert` es un PEM con la cadena de
//! certificados y la clave privada juntos.

use crate::error::ServerError;
use rustls::{ServerConfig, ServerConnection, StreamOwned};
use std::fs::File;
use std::io::{self, BufReader};
use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;

/// Stream TLS ya negociado
pub type TlsStream = StreamOwned<ServerConnection, TcpStream>;

/// Lee el PEM de `ssl_cert` y arma la configuración de rustls
pub fn load_server_config(pem: &Path) -> Result<Arc<ServerConfig>, ServerError> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(File::open(pem)?))
        .collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(ServerError::Tls(format!(
            "no certificates found in {}",
            pem.display()
        )));
    }

    let key = rustls_pemfile::private_key(&mut BufReader::new(File::open(pem)?))?
        .ok_or_else(|| ServerError::Tls(format!("no private key found in {}", pem.display())))?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    Ok(Arc::new(config))
}

/// Completa el handshake sobre un socket recién aceptado
pub fn handshake(config: Arc<ServerConfig>, mut tcp: TcpStream) -> io::Result<TlsStream> {
    let mut conn = ServerConnection::new(config)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    while conn.is_handshaking() {
        conn.complete_io(&mut tcp)?;
    }

    Ok(StreamOwned::new(conn, tcp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_pem_is_io_error() {
        let result = load_server_config(Path::new("/nonexistent/emberd.pem"));
        assert!(matches!(result, Err(ServerError::Io(_))));
    }

    #[test]
    fn test_pem_without_certificates() {
        let path = std::env::temp_dir().join(format!("emberd-tls-{}.pem", std::process::id()));
        fs::write(&path, "not a certificate\n").unwrap();

        let result = load_server_config(&path);
        assert!(matches!(result, Err(ServerError::Tls(_))));

        fs::remove_file(&path).unwrap();
    }
}

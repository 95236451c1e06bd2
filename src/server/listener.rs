//! # Sockets de Escucha
//! src/server/listener.rs
//!
//! Cada entrada de la opción `ports` tiene la forma `[ip:]port[s]`: la IP
//! por defecto es `0.0.0.0` y la `s` final marca el puerto como TLS. Los
//! listeners se dejan en modo no bloqueante y el master thread los vigila
//! con `poll(2)` para poder revisar la bandera de parada cada segundo.

use crate::error::ServerError;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::os::fd::AsFd;
use std::str::FromStr;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Una entrada de la opción `ports`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSpec {
    pub addr: SocketAddr,
    pub tls: bool,
}

impl FromStr for PortSpec {
    type Err = String;

    /// # Ejemplo
    /// ```
    /// use emberd::server::listener::PortSpec;
    ///
    /// let spec: PortSpec = "127.0.0.1:8443s".parse().unwrap();
    /// assert!(spec.tls);
    /// assert_eq!(spec.addr.port(), 8443);
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (s, tls) = match s.strip_suffix('s') {
            Some(rest) => (rest, true),
            None => (s, false),
        };

        let (ip, port) = match s.rsplit_once(':') {
            Some((ip, port)) => {
                let ip: IpAddr = ip
                    .trim_start_matches('[')
                    .trim_end_matches(']')
                    .parse()
                    .map_err(|_| format!("bad listening address: {}", s))?;
                (ip, port)
            }
            None => (IpAddr::V4(Ipv4Addr::UNSPECIFIED), s),
        };

        let port: u16 = port
            .parse()
            .map_err(|_| format!("bad listening port: {}", s))?;

        Ok(PortSpec {
            addr: SocketAddr::new(ip, port),
            tls,
        })
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.addr, if self.tls { "s" } else { "" })
    }
}

/// Socket de escucha abierto
#[derive(Debug)]
pub struct Listener {
    socket: TcpListener,
    local_addr: SocketAddr,
    tls: bool,
}

impl Listener {
    /// Abre el socket de una entrada de `ports`
    pub fn bind(spec: PortSpec) -> Result<Self, ServerError> {
        let bind_err = |source| ServerError::Bind {
            addr: spec.addr,
            source,
        };

        let socket = TcpListener::bind(spec.addr).map_err(bind_err)?;
        socket.set_nonblocking(true).map_err(bind_err)?;
        let local_addr = socket.local_addr().map_err(bind_err)?;

        Ok(Listener {
            socket,
            local_addr,
            tls: spec.tls,
        })
    }

    /// Dirección real (con el puerto asignado si se pidió el 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_tls(&self) -> bool {
        self.tls
    }
}

/// Abre todos los puertos; si uno falla no queda ninguno abierto
pub fn bind_all(specs: &[PortSpec]) -> Result<Vec<Listener>, ServerError> {
    specs.iter().map(|spec| Listener::bind(*spec)).collect()
}

/// Conexión recién aceptada
#[derive(Debug)]
pub struct Accepted {
    pub stream: TcpStream,
    pub peer: SocketAddr,
    pub tls: bool,
}

/// Espera hasta `timeout_ms` a que algún listener tenga conexiones
/// pendientes y las acepta todas.
pub fn accept_pending(listeners: &[Listener], timeout_ms: u16) -> Vec<Accepted> {
    if listeners.is_empty() {
        thread::sleep(Duration::from_millis(timeout_ms.into()));
        return Vec::new();
    }

    let mut fds: Vec<PollFd> = listeners
        .iter()
        .map(|l| PollFd::new(l.socket.as_fd(), PollFlags::POLLIN))
        .collect();

    match poll(&mut fds, PollTimeout::from(timeout_ms)) {
        Ok(0) | Err(Errno::EINTR) => return Vec::new(),
        Ok(_) => {}
        Err(e) => {
            warn!(error = %e, "poll() falló");
            thread::sleep(Duration::from_millis(timeout_ms.into()));
            return Vec::new();
        }
    }

    let mut accepted = Vec::new();
    for listener in listeners {
        loop {
            match listener.socket.accept() {
                Ok((stream, peer)) => accepted.push(Accepted {
                    stream,
                    peer,
                    tls: listener.tls,
                }),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(addr = %listener.local_addr, error = %e, "accept() falló");
                    break;
                }
            }
        }
    }
    accepted
}

//! # Conexión con un Cliente
//! src/server/connection.rs
//!
//! Cada worker thread atiende una conexión de principio a fin:
//!
//! 1. Lee la cabecera del request (máximo `MAX_REQUEST_SIZE` bytes)
//! 2. La parsea y decide keep-alive
//! 3. Resuelve `Expect` y `Content-Length` antes de rutear
//! 4. Llama al router
//! 5. Registra el access log, descarta el body que nadie leyó y vuelve a 1
//!    si la conexión sigue viva
//!
//! Los bytes que llegan pegados al final de un request (pipelining) se
//! quedan en el buffer para el siguiente.

use crate::http::request::request_len;
use crate::http::{Request, Response, StatusCode};
use crate::router;
use crate::server::context::ServerState;
use crate::server::tls::{self, TlsStream};
use rustls::ServerConfig;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::debug;

/// Tamaño máximo de la cabecera de un request
pub const MAX_REQUEST_SIZE: usize = 16 * 1024;

/// Cada cuánto se despierta una lectura bloqueada para revisar la parada
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Socket plano o TLS
enum Transport {
    Plain(TcpStream),
    Tls(Box<TlsStream>),
}

impl Transport {
    fn tcp(&self) -> &TcpStream {
        match self {
            Transport::Plain(stream) => stream,
            Transport::Tls(stream) => stream.get_ref(),
        }
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(stream) => stream.read(buf),
            Transport::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(stream) => stream.write(buf),
            Transport::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Transport::Plain(stream) => stream.flush(),
            Transport::Tls(stream) => stream.flush(),
        }
    }
}

/// Resultado de esperar la cabecera de un request
enum HeadRead {
    Complete(usize),
    Closed,
    TooLarge,
}

/// Conexión con un cliente.
///
/// Los handlers de usuario la reciben para leer el body del request y
/// escribir la respuesta (implementa `Write`).
pub struct Connection {
    stream: Transport,
    state: Arc<ServerState>,
    remote_addr: SocketAddr,
    local_addr: SocketAddr,
    birth: SystemTime,
    buf: Vec<u8>,
    body_remaining: u64,
    bytes_sent: u64,
    keep_alive: bool,
}

impl Connection {
    /// Prepara un socket recién aceptado; si el puerto es TLS hace el
    /// handshake aquí, ya dentro del worker.
    pub(crate) fn accept(
        stream: TcpStream,
        remote_addr: SocketAddr,
        tls_config: Option<Arc<ServerConfig>>,
        state: Arc<ServerState>,
    ) -> io::Result<Self> {
        stream.set_nonblocking(false)?;
        let local_addr = stream.local_addr()?;

        let stream = match tls_config {
            Some(config) => {
                let idle = Duration::from_secs(state.options.idle_time.get().max(1));
                stream.set_read_timeout(Some(idle))?;
                let tls_stream = tls::handshake(config, stream)?;
                Transport::Tls(Box::new(tls_stream))
            }
            None => Transport::Plain(stream),
        };
        stream.tcp().set_read_timeout(Some(POLL_INTERVAL))?;

        Ok(Connection {
            stream,
            state,
            remote_addr,
            local_addr,
            birth: SystemTime::now(),
            buf: Vec::new(),
            body_remaining: 0,
            bytes_sent: 0,
            keep_alive: false,
        })
    }

    /// Dirección del cliente
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Dirección local del socket aceptado
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// ¿La conexión llegó por un puerto TLS?
    pub fn is_tls(&self) -> bool {
        matches!(self.stream, Transport::Tls(_))
    }

    /// Momento en que se aceptó la conexión
    pub fn birth(&self) -> SystemTime {
        self.birth
    }

    /// Bytes escritos al cliente desde que se abrió la conexión
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// ¿Se va a seguir usando la conexión después de este request?
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Marca la conexión para cerrarse al terminar el request actual
    pub fn close_after_response(&mut self) {
        self.keep_alive = false;
    }

    /// Lee bytes del body del request actual; `Ok(0)` cuando se terminó
    pub fn read_body(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.body_remaining == 0 || out.is_empty() {
            return Ok(0);
        }
        let deadline = self.idle_deadline();
        if self.buf.is_empty() && self.fill(deadline)? == 0 {
            self.body_remaining = 0;
            self.keep_alive = false;
            return Ok(0);
        }

        let n = out
            .len()
            .min(self.buf.len())
            .min(usize::try_from(self.body_remaining).unwrap_or(usize::MAX));
        out[..n].copy_from_slice(&self.buf[..n]);
        self.buf.drain(..n);
        self.body_remaining -= n as u64;
        Ok(n)
    }

    /// Lee todo lo que quede del body del request actual
    pub fn read_body_to_end(&mut self) -> io::Result<Vec<u8>> {
        let mut body = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            let n = self.read_body(&mut chunk)?;
            if n == 0 {
                return Ok(body);
            }
            body.extend_from_slice(&chunk[..n]);
        }
    }

    /// Envía una respuesta agregando `Date` y `Connection`.
    ///
    /// Con `include_body = false` solo se mandan status y headers (HEAD, o
    /// cuando el body se va a escribir después con `Write`).
    pub fn send_response(&mut self, mut response: Response, include_body: bool) -> io::Result<()> {
        response.add_header("Date", &httpdate::fmt_http_date(SystemTime::now()));
        response.add_header(
            "Connection",
            if self.keep_alive { "keep-alive" } else { "close" },
        );

        self.write_all(&response.head_bytes())?;
        if include_body && !response.body().is_empty() {
            self.write_all(response.body())?;
        }
        self.flush()
    }

    /// Atiende requests hasta que el cliente cierre, se agote `idle_time`,
    /// algún request pida cerrar o el servidor se detenga.
    pub(crate) fn serve(mut self) {
        let state = Arc::clone(&self.state);
        debug!(peer = %self.remote_addr, tls = self.is_tls(), "conexión aceptada");

        loop {
            let sent_before = self.bytes_sent;

            let head_len = match self.read_request_head() {
                Ok(HeadRead::Complete(n)) => n,
                Ok(HeadRead::Closed) => break,
                Ok(HeadRead::TooLarge) => {
                    self.keep_alive = false;
                    let mut req = Request::placeholder(self.remote_addr);
                    router::send_error(
                        &state,
                        &mut self,
                        &mut req,
                        StatusCode::BadRequest,
                        "Request headers too large",
                    );
                    state.logs.log_access(&req, self.bytes_sent - sent_before);
                    break;
                }
                Err(e) => {
                    debug!(peer = %self.remote_addr, error = %e, "error leyendo request");
                    break;
                }
            };

            let head: Vec<u8> = self.buf.drain(..head_len).collect();
            let mut req = match Request::parse(&head) {
                Ok(req) => req,
                Err(e) => {
                    self.keep_alive = false;
                    let mut req = Request::placeholder(self.remote_addr);
                    router::send_error(&state, &mut self, &mut req, e.status(), &e.to_string());
                    state.logs.log_access(&req, self.bytes_sent - sent_before);
                    break;
                }
            };
            req.set_remote_addr(self.remote_addr);
            self.body_remaining = req.content_length().unwrap_or(0);
            self.keep_alive = req.wants_keep_alive();

            self.process(&state, &mut req);
            state.logs.log_access(&req, self.bytes_sent - sent_before);

            if !self.keep_alive || state.is_stopping() || !self.discard_body() {
                break;
            }
        }

        debug!(peer = %self.remote_addr, "conexión cerrada");
    }

    /// Validaciones previas al router
    fn process(&mut self, state: &ServerState, req: &mut Request) {
        if req.method().expects_body() && req.content_length().is_none() {
            self.keep_alive = false;
            router::send_error(
                state,
                self,
                req,
                StatusCode::LengthRequired,
                "Content-Length is required",
            );
            return;
        }

        if let Some(expect) = req.header("Expect") {
            if !expect.trim().eq_ignore_ascii_case("100-continue") {
                self.keep_alive = false;
                let detail = format!("Unsupported expectation: {}", expect);
                router::send_error(state, self, req, StatusCode::ExpectationFailed, &detail);
                return;
            }
            if self.body_remaining > 0 {
                let interim = format!("HTTP/1.1 {}\r\n\r\n", StatusCode::Continue);
                if self.write_all(interim.as_bytes()).is_err() {
                    self.keep_alive = false;
                    return;
                }
            }
        }

        router::dispatch(state, self, req);
    }

    /// Descarta lo que quede del body; `false` si no se pudo leer
    fn discard_body(&mut self) -> bool {
        let mut scratch = [0u8; 8192];
        loop {
            match self.read_body(&mut scratch) {
                Ok(0) => return self.keep_alive,
                Ok(_) => {}
                Err(_) => return false,
            }
        }
    }

    /// Espera una cabecera completa; `idle_time` cuenta desde el primer
    /// intento, no desde el último byte recibido.
    fn read_request_head(&mut self) -> io::Result<HeadRead> {
        let deadline = self.idle_deadline();
        loop {
            if let Some(n) = request_len(&self.buf) {
                if n > MAX_REQUEST_SIZE {
                    return Ok(HeadRead::TooLarge);
                }
                return Ok(HeadRead::Complete(n));
            }
            if self.buf.len() >= MAX_REQUEST_SIZE {
                return Ok(HeadRead::TooLarge);
            }

            match self.fill(deadline) {
                Ok(0) => return Ok(HeadRead::Closed),
                Ok(_) if Instant::now() >= deadline && request_len(&self.buf).is_none() => {
                    return Ok(HeadRead::Closed)
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(HeadRead::Closed),
                Err(e) => return Err(e),
            }
        }
    }

    fn idle_deadline(&self) -> Instant {
        Instant::now() + Duration::from_secs(self.state.options.idle_time.get())
    }

    /// Lee lo que haya en el socket al buffer, esperando como máximo hasta
    /// `deadline`.
    fn fill(&mut self, deadline: Instant) -> io::Result<usize> {
        let mut chunk = [0u8; 8192];

        loop {
            match self.stream.read(&mut chunk) {
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(n);
                }
                Err(e) if is_timeout(&e) => {
                    if self.state.is_stopping() || Instant::now() >= deadline {
                        return Err(io::Error::new(io::ErrorKind::TimedOut, "idle timeout"));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.stream.write(buf)?;
        self.bytes_sent += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

//! # Contexto del Servidor
//! src/server/context.rs
//!
//! `Context` es el handle de un servidor en marcha. Al arrancar aplica la
//! configuración, abre los puertos y lanza el master thread, que:
//!
//! 1. Espera conexiones en todos los listeners con `poll(2)`
//! 2. Descarta las que la ACL no permite
//! 3. Reserva un lugar en el `WorkerGate` (se bloquea si hay
//!    `max_threads` workers activos)
//! 4. Lanza un worker thread por conexión
//!
//! `stop()` (o el drop del `Context`) levanta la bandera de parada; el master
//! cierra los listeners y espera a que terminen todos los workers.

use crate::config::options::{OptionName, OptionStore};
use crate::config::Config;
use crate::error::ServerError;
use crate::http::Request;
use crate::logging::LogFiles;
use crate::router::Router;
use crate::server::connection::Connection;
use crate::server::gate::WorkerGate;
use crate::server::listener::{self, Accepted, Listener, PortSpec};
use crate::server::tls;
use rustls::ServerConfig;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Timeout de `poll(2)` en el master thread
const MASTER_POLL_MS: u16 = 1000;

/// Estado compartido entre el master thread y los workers
pub struct ServerState {
    pub options: OptionStore,
    pub router: Router,
    pub logs: LogFiles,
    listeners: Mutex<Vec<Listener>>,
    tls: RwLock<Option<Arc<ServerConfig>>>,
    gate: Arc<WorkerGate>,
    stopping: AtomicBool,
}

impl ServerState {
    fn new() -> Result<Self, ServerError> {
        Ok(ServerState {
            options: OptionStore::new()?,
            router: Router::new(),
            logs: LogFiles::new(),
            listeners: Mutex::new(Vec::new()),
            tls: RwLock::new(None),
            gate: Arc::new(WorkerGate::new()),
            stopping: AtomicBool::new(false),
        })
    }

    /// ¿Se pidió detener el servidor?
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Valor actual de una opción; `None` si el nombre no existe
    pub fn get_option(&self, name: &str) -> Option<String> {
        name.parse::<OptionName>()
            .ok()
            .map(|option| self.options.get(option))
    }

    /// Cambia una opción en caliente y aplica sus efectos (reabrir puertos,
    /// recargar el certificado, reabrir logs).
    pub fn set_option(&self, name: &str, value: &str) -> Result<(), ServerError> {
        let option: OptionName = name.parse()?;
        let previous = self.options.get(option);
        self.options.set(option, value)?;
        if let Err(e) = self.apply(option) {
            // El valor anterior ya estaba aplicado
            let _ = self.options.set(option, &previous);
            return Err(e);
        }
        info!(option = option.as_str(), value, "opción actualizada");
        Ok(())
    }

    fn apply(&self, option: OptionName) -> Result<(), ServerError> {
        match option {
            OptionName::Ports => self.rebind_listeners(),
            OptionName::SslCert => {
                let config = match self.options.ssl_cert.get() {
                    Some(pem) => Some(tls::load_server_config(&pem)?),
                    None => None,
                };
                *self.tls.write().unwrap() = config;
                Ok(())
            }
            OptionName::AccessLog => {
                let path = self.options.access_log.get();
                self.logs.reopen_access(path.as_deref()).map_err(Into::into)
            }
            OptionName::ErrorLog => {
                let path = self.options.error_log.get();
                self.logs.reopen_error(path.as_deref()).map_err(Into::into)
            }
            _ => Ok(()),
        }
    }

    /// Reemplaza los puertos abiertos por los de la opción `ports`.
    ///
    /// Si algún puerto nuevo no se puede abrir quedan abiertos los mismos
    /// puertos que antes.
    fn rebind_listeners(&self) -> Result<(), ServerError> {
        let specs = self.options.ports.get();
        if specs.iter().any(|spec| spec.tls) && self.tls_config().is_none() {
            return Err(ServerError::Tls(
                "TLS ports require the ssl_cert option".to_string(),
            ));
        }

        let mut listeners = self.listeners.lock().unwrap();
        let fresh = match listener::bind_all(&specs) {
            Ok(fresh) => fresh,
            Err(_) if !listeners.is_empty() => {
                // Puede que el conflicto sea con nuestros propios puertos
                let previous: Vec<PortSpec> = listeners
                    .iter()
                    .map(|l| PortSpec {
                        addr: l.local_addr(),
                        tls: l.is_tls(),
                    })
                    .collect();
                listeners.clear();
                match listener::bind_all(&specs) {
                    Ok(fresh) => fresh,
                    Err(e) => {
                        match listener::bind_all(&previous) {
                            Ok(restored) => *listeners = restored,
                            Err(restore) => {
                                error!(error = %restore, "no se pudieron reabrir los puertos anteriores")
                            }
                        }
                        return Err(e);
                    }
                }
            }
            Err(e) => return Err(e),
        };
        *listeners = fresh;

        for l in listeners.iter() {
            info!(addr = %l.local_addr(), tls = l.is_tls(), "escuchando");
        }
        Ok(())
    }

    pub(crate) fn tls_config(&self) -> Option<Arc<ServerConfig>> {
        self.tls.read().unwrap().clone()
    }

    /// Direcciones en las que se está escuchando
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners
            .lock()
            .unwrap()
            .iter()
            .map(Listener::local_addr)
            .collect()
    }

    /// Workers atendiendo conexiones en este momento
    pub fn active_workers(&self) -> usize {
        self.gate.active()
    }
}

/// Loop del master thread
fn master_loop(state: Arc<ServerState>) {
    info!("master thread iniciado");

    while !state.is_stopping() {
        let accepted = {
            let listeners = state.listeners.lock().unwrap();
            listener::accept_pending(&listeners, MASTER_POLL_MS)
        };
        for conn in accepted {
            admit(&state, conn);
        }
    }

    state.listeners.lock().unwrap().clear();
    state.gate.wait_idle();
    info!("master thread terminado");
}

/// Filtra por ACL, espera lugar en el gate y lanza el worker
fn admit(state: &Arc<ServerState>, accepted: Accepted) {
    let Accepted { stream, peer, tls } = accepted;

    if !state.options.acl.get().allows(peer.ip()) {
        state.logs.log_error(peer, None, "connection rejected by ACL");
        return;
    }

    let tls_config = if tls {
        match state.tls_config() {
            Some(config) => Some(config),
            None => {
                state.logs.log_error(peer, None, "TLS port without certificate");
                return;
            }
        }
    } else {
        None
    };

    let slot = state.gate.acquire(state.options.max_threads.get());
    let worker_state = Arc::clone(state);

    let spawned = thread::Builder::new()
        .name("emberd-worker".to_string())
        .spawn(move || {
            let _slot = slot;
            match Connection::accept(stream, peer, tls_config, worker_state) {
                Ok(conn) => conn.serve(),
                Err(e) => debug!(peer = %peer, error = %e, "no se pudo preparar la conexión"),
            }
        });

    if let Err(e) = spawned {
        error!(error = %e, "no se pudo crear el worker thread");
    }
}

/// Servidor en marcha
///
/// # Ejemplo
/// ```no_run
/// use emberd::config::Config;
/// use emberd::server::Context;
/// use std::io::Write;
///
/// let ctx = Context::start(&Config::default()).unwrap();
/// ctx.bind_to_uri("/hello", |conn, _req| {
///     let _ = conn.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi");
/// });
/// ctx.stop();
/// ```
pub struct Context {
    state: Arc<ServerState>,
    master: Option<JoinHandle<()>>,
}

impl Context {
    /// Aplica la configuración, abre los puertos y arranca el master thread.
    ///
    /// Si alguna opción es inválida o un puerto no se puede abrir, no queda
    /// nada corriendo.
    pub fn start(config: &Config) -> Result<Self, ServerError> {
        let state = ServerState::new()?;
        for (name, value) in config.to_pairs() {
            state.options.set(name, &value)?;
            state.apply(name)?;
        }
        let state = Arc::new(state);

        let master = thread::Builder::new()
            .name("emberd-master".to_string())
            .spawn({
                let state = Arc::clone(&state);
                move || master_loop(state)
            })?;

        Ok(Context {
            state,
            master: Some(master),
        })
    }

    /// Detiene el servidor y espera a que terminen todos los workers
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(master) = self.master.take() {
            info!("deteniendo servidor");
            self.state.stopping.store(true, Ordering::SeqCst);
            if master.join().is_err() {
                error!("el master thread terminó con panic");
            }
            info!("servidor detenido");
        }
    }

    /// Registra un handler para los URIs que encajan con `pattern`.
    /// Gana el primer registro que encaje.
    pub fn bind_to_uri<F>(&self, pattern: &str, handler: F)
    where
        F: Fn(&mut Connection, &Request) + Send + Sync + 'static,
    {
        self.state.router.bind_to_uri(pattern, handler);
    }

    /// Registra un handler de errores para un status (o para todos con `None`)
    pub fn bind_to_error_code<F>(&self, status: Option<u16>, handler: F)
    where
        F: Fn(&mut Connection, &Request) + Send + Sync + 'static,
    {
        self.state.router.bind_to_error_code(status, handler);
    }

    /// Reemplaza la autenticación de los URIs que encajan con `pattern`
    pub fn protect_uri<F>(&self, pattern: &str, check: F)
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.state.router.protect_uri(pattern, check);
    }

    pub fn get_option(&self, name: &str) -> Option<String> {
        self.state.get_option(name)
    }

    pub fn set_option(&self, name: &str, value: &str) -> Result<(), ServerError> {
        self.state.set_option(name, value)
    }

    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.state.local_addrs()
    }

    pub fn active_workers(&self) -> usize {
        self.state.active_workers()
    }

    /// Estado compartido con los workers
    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            ports: "127.0.0.1:0".to_string(),
            root: std::env::temp_dir().to_string_lossy().into_owned(),
            ..Config::default()
        }
    }

    #[test]
    fn test_start_and_stop() {
        let ctx = Context::start(&test_config()).unwrap();
        let addrs = ctx.local_addrs();
        assert_eq!(addrs.len(), 1);
        assert_ne!(addrs[0].port(), 0);
        assert_eq!(ctx.active_workers(), 0);
        ctx.stop();
    }

    #[test]
    fn test_get_and_set_option() {
        let ctx = Context::start(&test_config()).unwrap();
        assert_eq!(ctx.get_option("max_threads").as_deref(), Some("100"));
        assert_eq!(ctx.get_option("no_such_option"), None);

        ctx.set_option("max_threads", "7").unwrap();
        assert_eq!(ctx.get_option("max_threads").as_deref(), Some("7"));

        let err = ctx.set_option("no_such_option", "1").unwrap_err();
        assert!(matches!(err, ServerError::UnknownOption(_)));

        assert!(ctx.set_option("max_threads", "zero").is_err());
        assert_eq!(ctx.get_option("max_threads").as_deref(), Some("7"));
    }

    #[test]
    fn test_rebind_ports() {
        let ctx = Context::start(&test_config()).unwrap();
        let before = ctx.local_addrs();

        ctx.set_option("ports", "127.0.0.1:0,127.0.0.1:0").unwrap();
        let after = ctx.local_addrs();
        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn test_tls_port_without_cert_fails() {
        let mut config = test_config();
        config.ports = "127.0.0.1:0s".to_string();
        assert!(matches!(Context::start(&config), Err(ServerError::Tls(_))));
    }

    #[test]
    fn test_bad_root_fails() {
        let mut config = test_config();
        config.root = "/nonexistent/emberd-root".to_string();
        assert!(matches!(
            Context::start(&config),
            Err(ServerError::InvalidOption { name: "root", .. })
        ));
    }
}

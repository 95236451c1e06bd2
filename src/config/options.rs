//! # Almacén de Opciones en Tiempo de Ejecución
//! src/config/options.rs
//!
//! Cada opción del servidor es un campo con nombre dentro de `OptionStore`,
//! protegido por su propio lock. Junto al valor tipado se guarda el string
//! original, que es lo que devuelve `get`. Escribir una opción pasa por un
//! paso de validación propio de esa opción; los efectos secundarios
//! (re-bind de puertos, recargar TLS, reabrir logs) los aplica
//! `ServerState::set_option`.

use crate::error::ServerError;
use crate::server::acl::Acl;
use crate::server::listener::PortSpec;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::RwLock;

/// Nombre de cada opción configurable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionName {
    Root,
    IndexFiles,
    DirList,
    Protect,
    CgiExtensions,
    CgiInterpreter,
    CgiEnvironment,
    SsiExtensions,
    AuthRealm,
    AuthGpass,
    AuthPut,
    AccessLog,
    ErrorLog,
    MimeTypes,
    SslCert,
    Aliases,
    Acl,
    AdminUri,
    MaxThreads,
    IdleTime,
    Ports,
}

impl OptionName {
    /// Todas las opciones, en el orden en que se aplican al arrancar.
    /// `ssl_cert` va antes que `ports` para que los puertos TLS encuentren
    /// el certificado cargado.
    pub const ALL: [OptionName; 21] = [
        OptionName::Root,
        OptionName::IndexFiles,
        OptionName::DirList,
        OptionName::Protect,
        OptionName::CgiExtensions,
        OptionName::CgiInterpreter,
        OptionName::CgiEnvironment,
        OptionName::SsiExtensions,
        OptionName::AuthRealm,
        OptionName::AuthGpass,
        OptionName::AuthPut,
        OptionName::AccessLog,
        OptionName::ErrorLog,
        OptionName::MimeTypes,
        OptionName::SslCert,
        OptionName::Aliases,
        OptionName::Acl,
        OptionName::AdminUri,
        OptionName::MaxThreads,
        OptionName::IdleTime,
        OptionName::Ports,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionName::Root => "root",
            OptionName::IndexFiles => "index_files",
            OptionName::DirList => "dir_list",
            OptionName::Protect => "protect",
            OptionName::CgiExtensions => "cgi_extensions",
            OptionName::CgiInterpreter => "cgi_interpreter",
            OptionName::CgiEnvironment => "cgi_environment",
            OptionName::SsiExtensions => "ssi_extensions",
            OptionName::AuthRealm => "auth_realm",
            OptionName::AuthGpass => "auth_gpass",
            OptionName::AuthPut => "auth_put",
            OptionName::AccessLog => "access_log",
            OptionName::ErrorLog => "error_log",
            OptionName::MimeTypes => "mime_types",
            OptionName::SslCert => "ssl_cert",
            OptionName::Aliases => "aliases",
            OptionName::Acl => "acl",
            OptionName::AdminUri => "admin_uri",
            OptionName::MaxThreads => "max_threads",
            OptionName::IdleTime => "idle_time",
            OptionName::Ports => "ports",
        }
    }

    /// Valor por defecto (como string, igual que lo escribiría el usuario)
    pub fn default_value(&self) -> &'static str {
        match self {
            OptionName::Root => ".",
            OptionName::IndexFiles => "index.html,index.htm,index.cgi,index.shtml",
            OptionName::DirList => "yes",
            OptionName::CgiExtensions => ".cgi,.pl,.php",
            OptionName::SsiExtensions => ".shtml,.shtm",
            OptionName::AuthRealm => "mydomain.com",
            OptionName::MaxThreads => "100",
            OptionName::IdleTime => "10",
            OptionName::Ports => "8080",
            _ => "",
        }
    }

    /// Descripción corta para la ayuda y la página de administración
    pub fn description(&self) -> &'static str {
        match self {
            OptionName::Root => "Web root directory",
            OptionName::IndexFiles => "Index files, comma separated",
            OptionName::DirList => "Directory listing, yes|no",
            OptionName::Protect => "URI to password file mapping, uri_glob=file,...",
            OptionName::CgiExtensions => "CGI extensions, comma separated",
            OptionName::CgiInterpreter => "CGI interpreter for all scripts",
            OptionName::CgiEnvironment => "Extra CGI environment, VAR=VALUE,...",
            OptionName::SsiExtensions => "SSI extensions, comma separated",
            OptionName::AuthRealm => "Authentication realm",
            OptionName::AuthGpass => "Global passwords file",
            OptionName::AuthPut => "PUT and DELETE passwords file",
            OptionName::AccessLog => "Access log file",
            OptionName::ErrorLog => "Error log file",
            OptionName::MimeTypes => "Additional mime types, ext=type,...",
            OptionName::SslCert => "PEM file with SSL certificate and key",
            OptionName::Aliases => "Path aliases, /uri=/dir,...",
            OptionName::Acl => "Allow/deny IP addresses, +net/bits or -net/bits,...",
            OptionName::AdminUri => "URI of the administration page",
            OptionName::MaxThreads => "Maximum number of worker threads",
            OptionName::IdleTime => "Keep-alive idle time in seconds",
            OptionName::Ports => "Listening ports, [ip:]port[s],...",
        }
    }
}

impl FromStr for OptionName {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OptionName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| ServerError::UnknownOption(s.to_string()))
    }
}

impl fmt::Display for OptionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Una opción: string original + valor tipado bajo un mismo lock
#[derive(Debug, Default)]
pub struct Setting<T> {
    inner: RwLock<(String, T)>,
}

impl<T: Clone> Setting<T> {
    /// Copia del valor tipado
    pub fn get(&self) -> T {
        self.inner.read().unwrap().1.clone()
    }

    /// String con el que se configuró la opción
    pub fn raw(&self) -> String {
        self.inner.read().unwrap().0.clone()
    }

    /// Reemplaza string y valor de una vez; el valor anterior se libera aquí
    fn replace(&self, raw: &str, value: T) {
        *self.inner.write().unwrap() = (raw.to_string(), value);
    }
}

/// Todas las opciones del servidor
#[derive(Debug, Default)]
pub struct OptionStore {
    pub root: Setting<PathBuf>,
    pub index_files: Setting<Vec<String>>,
    pub dir_list: Setting<bool>,
    pub protect: Setting<Vec<(String, PathBuf)>>,
    pub cgi_extensions: Setting<Vec<String>>,
    pub cgi_interpreter: Setting<Option<PathBuf>>,
    pub cgi_environment: Setting<Vec<(String, String)>>,
    pub ssi_extensions: Setting<Vec<String>>,
    pub auth_realm: Setting<String>,
    pub auth_gpass: Setting<Option<PathBuf>>,
    pub auth_put: Setting<Option<PathBuf>>,
    pub access_log: Setting<Option<PathBuf>>,
    pub error_log: Setting<Option<PathBuf>>,
    pub mime_types: Setting<Vec<(String, String)>>,
    pub ssl_cert: Setting<Option<PathBuf>>,
    pub aliases: Setting<Vec<(String, PathBuf)>>,
    pub acl: Setting<Acl>,
    pub admin_uri: Setting<Option<String>>,
    pub max_threads: Setting<usize>,
    pub idle_time: Setting<u64>,
    pub ports: Setting<Vec<PortSpec>>,
}

impl OptionStore {
    /// Crea el almacén con todos los valores por defecto
    pub fn new() -> Result<Self, ServerError> {
        let store = OptionStore::default();
        for name in OptionName::ALL {
            store.set(name, name.default_value())?;
        }
        Ok(store)
    }

    /// Valor actual de una opción, como string
    pub fn get(&self, name: OptionName) -> String {
        match name {
            OptionName::Root => self.root.raw(),
            OptionName::IndexFiles => self.index_files.raw(),
            OptionName::DirList => self.dir_list.raw(),
            OptionName::Protect => self.protect.raw(),
            OptionName::CgiExtensions => self.cgi_extensions.raw(),
            OptionName::CgiInterpreter => self.cgi_interpreter.raw(),
            OptionName::CgiEnvironment => self.cgi_environment.raw(),
            OptionName::SsiExtensions => self.ssi_extensions.raw(),
            OptionName::AuthRealm => self.auth_realm.raw(),
            OptionName::AuthGpass => self.auth_gpass.raw(),
            OptionName::AuthPut => self.auth_put.raw(),
            OptionName::AccessLog => self.access_log.raw(),
            OptionName::ErrorLog => self.error_log.raw(),
            OptionName::MimeTypes => self.mime_types.raw(),
            OptionName::SslCert => self.ssl_cert.raw(),
            OptionName::Aliases => self.aliases.raw(),
            OptionName::Acl => self.acl.raw(),
            OptionName::AdminUri => self.admin_uri.raw(),
            OptionName::MaxThreads => self.max_threads.raw(),
            OptionName::IdleTime => self.idle_time.raw(),
            OptionName::Ports => self.ports.raw(),
        }
    }

    /// Valida y guarda una opción.
    ///
    /// Si el valor es inválido la opción conserva su valor anterior.
    pub fn set(&self, name: OptionName, value: &str) -> Result<(), ServerError> {
        let key = name.as_str();
        let value = value.trim();

        match name {
            OptionName::Root => {
                let dir = PathBuf::from(value);
                if !dir.is_dir() {
                    return Err(ServerError::invalid(key, format!("{} is not a directory", value)));
                }
                self.root.replace(value, dir);
            }
            OptionName::IndexFiles => self.index_files.replace(value, parse_list(value)),
            OptionName::DirList => self.dir_list.replace(value, parse_bool(key, value)?),
            OptionName::Protect => self.protect.replace(
                value,
                parse_pairs(key, value)?
                    .into_iter()
                    .map(|(uri, file)| (uri, PathBuf::from(file)))
                    .collect(),
            ),
            OptionName::CgiExtensions => self.cgi_extensions.replace(value, parse_list(value)),
            OptionName::CgiInterpreter => self.cgi_interpreter.replace(value, parse_path(value)),
            OptionName::CgiEnvironment => {
                self.cgi_environment.replace(value, parse_pairs(key, value)?)
            }
            OptionName::SsiExtensions => self.ssi_extensions.replace(value, parse_list(value)),
            OptionName::AuthRealm => self.auth_realm.replace(value, value.to_string()),
            OptionName::AuthGpass => self.auth_gpass.replace(value, parse_path(value)),
            OptionName::AuthPut => self.auth_put.replace(value, parse_path(value)),
            OptionName::AccessLog => self.access_log.replace(value, parse_path(value)),
            OptionName::ErrorLog => self.error_log.replace(value, parse_path(value)),
            OptionName::MimeTypes => self.mime_types.replace(value, parse_pairs(key, value)?),
            OptionName::SslCert => self.ssl_cert.replace(value, parse_path(value)),
            OptionName::Aliases => {
                let mut aliases = Vec::new();
                for (uri, dir) in parse_pairs(key, value)? {
                    if !uri.starts_with('/') {
                        return Err(ServerError::invalid(key, format!("alias must start with /: {}", uri)));
                    }
                    aliases.push((uri, PathBuf::from(dir)));
                }
                self.aliases.replace(value, aliases);
            }
            OptionName::Acl => {
                let acl: Acl = value.parse().map_err(|e| ServerError::invalid(key, e))?;
                self.acl.replace(value, acl);
            }
            OptionName::AdminUri => {
                let uri = if value.is_empty() { None } else { Some(value.to_string()) };
                if matches!(&uri, Some(u) if !u.starts_with('/')) {
                    return Err(ServerError::invalid(key, "must start with /"));
                }
                self.admin_uri.replace(value, uri);
            }
            OptionName::MaxThreads => {
                let n: usize = value
                    .parse()
                    .map_err(|_| ServerError::invalid(key, format!("not a number: {}", value)))?;
                if n == 0 {
                    return Err(ServerError::invalid(key, "must be >= 1"));
                }
                self.max_threads.replace(value, n);
            }
            OptionName::IdleTime => {
                let secs: u64 = value
                    .parse()
                    .map_err(|_| ServerError::invalid(key, format!("not a number: {}", value)))?;
                self.idle_time.replace(value, secs);
            }
            OptionName::Ports => {
                let mut ports = Vec::new();
                for spec in parse_list(value) {
                    ports.push(spec.parse::<PortSpec>().map_err(|e| ServerError::invalid(key, e))?);
                }
                self.ports.replace(value, ports);
            }
        }

        Ok(())
    }

    /// ¿`path` tiene una de las extensiones de la lista?
    pub fn has_extension(extensions: &[String], path: &Path) -> bool {
        let name = path.to_string_lossy().to_ascii_lowercase();
        extensions
            .iter()
            .any(|ext| !ext.is_empty() && name.ends_with(&ext.to_ascii_lowercase()))
    }
}

/// "a, b,,c" → ["a", "b", "c"]
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// "a=1,b=2" → [("a","1"), ("b","2")]
fn parse_pairs(key: &'static str, value: &str) -> Result<Vec<(String, String)>, ServerError> {
    parse_list(value)
        .into_iter()
        .map(|entry| match entry.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.trim().to_string())),
            _ => Err(ServerError::invalid(key, format!("expected name=value, got {}", entry))),
        })
        .collect()
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ServerError> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" | "on" | "1" => Ok(true),
        "no" | "false" | "off" | "0" => Ok(false),
        _ => Err(ServerError::invalid(key, format!("expected yes or no, got {}", value))),
    }
}

fn parse_path(value: &str) -> Option<PathBuf> {
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

//! # Configuración del Servidor
//! src/config/mod.rs
//!
//! Este módulo define la configuración de arranque del servidor con soporte
//! para argumentos CLI y variables de entorno. Cada campo corresponde a una
//! opción de `OptionStore`; al arrancar, `Context::start` aplica todos los
//! campos con `to_pairs()` y desde ahí las opciones se pueden cambiar en
//! caliente.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./emberd --root /srv/www \
//!   --ports 8080,8443s \
//!   --ssl-cert server.pem \
//!   --max-threads 50
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! EMBER_ROOT=/srv/www EMBER_PORTS=80 ./emberd
//! ```
//!
//! ### Editar un archivo de passwords
//! ```bash
//! ./emberd --passwd .htpasswd mydomain.com alice secreto
//! ```

pub mod options;

use clap::Parser;
use options::OptionName;

/// Configuración de arranque del servidor
#[derive(Debug, Clone, Parser)]
#[command(name = "emberd")]
#[command(about = "Servidor HTTP/1.1 embebible con soporte CGI, SSI y autenticación Digest")]
#[command(version = "0.1.0")]
pub struct Config {
    // === Red ===
    /// Puertos de escucha, `[ip:]port[s]` separados por coma (`s` = TLS)
    #[arg(long, default_value = "8080", env = "EMBER_PORTS")]
    pub ports: String,

    /// Archivo PEM con certificado y clave para los puertos TLS
    #[arg(long = "ssl-cert", default_value = "", env = "EMBER_SSL_CERT")]
    pub ssl_cert: String,

    /// Reglas de acceso por IP: `+red/bits` o `-red/bits`
    #[arg(long, default_value = "", env = "EMBER_ACL")]
    pub acl: String,

    // === Contenido ===
    /// Directorio raíz de documentos
    #[arg(short, long, default_value = ".", env = "EMBER_ROOT")]
    pub root: String,

    /// Archivos índice de directorio
    #[arg(long = "index-files", default_value = "index.html,index.htm,index.cgi,index.shtml", env = "EMBER_INDEX_FILES")]
    pub index_files: String,

    /// Listado de directorios (yes|no)
    #[arg(long = "dir-list", default_value = "yes", env = "EMBER_DIR_LIST")]
    pub dir_list: String,

    /// Alias de paths: `/uri=/dir,...`
    #[arg(long, default_value = "", env = "EMBER_ALIASES")]
    pub aliases: String,

    /// Tipos MIME adicionales: `ext=type,...`
    #[arg(long = "mime-types", default_value = "", env = "EMBER_MIME_TYPES")]
    pub mime_types: String,

    // === CGI / SSI ===
    /// Extensiones CGI
    #[arg(long = "cgi-extensions", default_value = ".cgi,.pl,.php", env = "EMBER_CGI_EXTENSIONS")]
    pub cgi_extensions: String,

    /// Intérprete para todos los scripts CGI
    #[arg(long = "cgi-interpreter", default_value = "", env = "EMBER_CGI_INTERPRETER")]
    pub cgi_interpreter: String,

    /// Variables de entorno extra para CGI: `VAR=VALUE,...`
    #[arg(long = "cgi-environment", default_value = "", env = "EMBER_CGI_ENVIRONMENT")]
    pub cgi_environment: String,

    /// Extensiones SSI
    #[arg(long = "ssi-extensions", default_value = ".shtml,.shtm", env = "EMBER_SSI_EXTENSIONS")]
    pub ssi_extensions: String,

    // === Autenticación ===
    /// Realm de la autenticación Digest
    #[arg(long = "auth-realm", default_value = "mydomain.com", env = "EMBER_AUTH_REALM")]
    pub auth_realm: String,

    /// Archivo de passwords global
    #[arg(long = "auth-gpass", default_value = "", env = "EMBER_AUTH_GPASS")]
    pub auth_gpass: String,

    /// Archivo de passwords para PUT y DELETE
    #[arg(long = "auth-put", default_value = "", env = "EMBER_AUTH_PUT")]
    pub auth_put: String,

    /// Mapeo URI → archivo de passwords: `uri_glob=file,...`
    #[arg(long, default_value = "", env = "EMBER_PROTECT")]
    pub protect: String,

    // === Logs ===
    /// Archivo de access log
    #[arg(long = "access-log", default_value = "", env = "EMBER_ACCESS_LOG")]
    pub access_log: String,

    /// Archivo de error log
    #[arg(long = "error-log", default_value = "", env = "EMBER_ERROR_LOG")]
    pub error_log: String,

    // === Administración y límites ===
    /// URI de la página de administración (vacío = deshabilitada)
    #[arg(long = "admin-uri", default_value = "", env = "EMBER_ADMIN_URI")]
    pub admin_uri: String,

    /// Máximo de threads worker simultáneos
    #[arg(long = "max-threads", default_value = "100", env = "EMBER_MAX_THREADS")]
    pub max_threads: String,

    /// Segundos que una conexión keep-alive puede estar inactiva
    #[arg(long = "idle-time", default_value = "10", env = "EMBER_IDLE_TIME")]
    pub idle_time: String,

    // === Utilidades ===
    /// Edita un archivo de passwords y termina: FILE REALM USER [PASSWORD]
    /// (sin PASSWORD se borra el usuario)
    #[arg(long, num_args = 3..=4, value_names = ["FILE", "REALM", "USER", "PASSWORD"])]
    pub passwd: Option<Vec<String>>,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Pares (opción, valor) en el orden en que se aplican
    pub fn to_pairs(&self) -> Vec<(OptionName, String)> {
        OptionName::ALL
            .iter()
            .map(|name| (*name, self.value_of(*name).to_string()))
            .collect()
    }

    fn value_of(&self, name: OptionName) -> &str {
        match name {
            OptionName::Root => &self.root,
            OptionName::IndexFiles => &self.index_files,
            OptionName::DirList => &self.dir_list,
            OptionName::Protect => &self.protect,
            OptionName::CgiExtensions => &self.cgi_extensions,
            OptionName::CgiInterpreter => &self.cgi_interpreter,
            OptionName::CgiEnvironment => &self.cgi_environment,
            OptionName::SsiExtensions => &self.ssi_extensions,
            OptionName::AuthRealm => &self.auth_realm,
            OptionName::AuthGpass => &self.auth_gpass,
            OptionName::AuthPut => &self.auth_put,
            OptionName::AccessLog => &self.access_log,
            OptionName::ErrorLog => &self.error_log,
            OptionName::MimeTypes => &self.mime_types,
            OptionName::SslCert => &self.ssl_cert,
            OptionName::Aliases => &self.aliases,
            OptionName::Acl => &self.acl,
            OptionName::AdminUri => &self.admin_uri,
            OptionName::MaxThreads => &self.max_threads,
            OptionName::IdleTime => &self.idle_time,
            OptionName::Ports => &self.ports,
        }
    }

    /// Valida la configuración sin tocar el sistema de archivos ni la red
    ///
    /// Retorna errores si hay valores inválidos
    pub fn validate(&self) -> Result<(), String> {
        if self.ports.trim().is_empty() {
            return Err("At least one listening port is required".to_string());
        }
        match self.max_threads.trim().parse::<usize>() {
            Ok(n) if n >= 1 => {}
            _ => return Err("max_threads must be >= 1".to_string()),
        }
        if self.idle_time.trim().parse::<u64>().is_err() {
            return Err("idle_time must be a number of seconds".to_string());
        }
        if self.ports.contains('s') && self.ssl_cert.trim().is_empty() {
            return Err("TLS ports require ssl_cert".to_string());
        }
        Ok(())
    }

    /// Imprime un resumen de la configuración
    pub fn print_summary(&self) {
        println!("╔══════════════════════════════════════════════════════════════╗");
        println!("║              emberd HTTP/1.1 Server Configuration            ║");
        println!("╚══════════════════════════════════════════════════════════════╝");
        println!();
        for (name, value) in self.to_pairs() {
            let shown = if value.is_empty() { "-" } else { value.as_str() };
            println!("   {:<16} {}", name.as_str(), shown);
        }
        println!();
        println!("═══════════════════════════════════════════════════════════════");
        println!();
    }
}

impl Default for Config {
    /// Configuración por defecto (los mismos valores que `OptionName::default_value`)
    fn default() -> Self {
        let value = |name: OptionName| name.default_value().to_string();
        Self {
            ports: value(OptionName::Ports),
            ssl_cert: value(OptionName::SslCert),
            acl: value(OptionName::Acl),
            root: value(OptionName::Root),
            index_files: value(OptionName::IndexFiles),
            dir_list: value(OptionName::DirList),
            aliases: value(OptionName::Aliases),
            mime_types: value(OptionName::MimeTypes),
            cgi_extensions: value(OptionName::CgiExtensions),
            cgi_interpreter: value(OptionName::CgiInterpreter),
            cgi_environment: value(OptionName::CgiEnvironment),
            ssi_extensions: value(OptionName::SsiExtensions),
            auth_realm: value(OptionName::AuthRealm),
            auth_gpass: value(OptionName::AuthGpass),
            auth_put: value(OptionName::AuthPut),
            protect: value(OptionName::Protect),
            access_log: value(OptionName::AccessLog),
            error_log: value(OptionName::ErrorLog),
            admin_uri: value(OptionName::AdminUri),
            max_threads: value(OptionName::MaxThreads),
            idle_time: value(OptionName::IdleTime),
            passwd: None,
        }
    }
}

//! # Archivos bajo el Document Root
//! src/files/mod.rs
//!
//! Traducción de URIs a paths del sistema de archivos y los distintos
//! modos de servir lo que se encuentra ahí:
//!
//! - `static_file`: archivos estáticos con rangos y `If-Modified-Since`
//! - `listing`: listado HTML de directorios
//! - `put`: subida y borrado de archivos (PUT / DELETE)

pub mod listing;
pub mod put;
pub mod static_file;

use crate::auth::passwords::PASSWORDS_FILE_NAME;
use crate::config::options::OptionStore;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};

/// Traduce un URI ya normalizado a un path.
///
/// Si el URI empieza con el prefijo de un alias se usa el directorio del
/// alias; si no, el `root`. El resultado siempre queda debajo de uno de
/// los dos.
///
/// # Ejemplo
/// ```
/// use emberd::config::options::OptionStore;
/// use emberd::files::resolve_path;
/// use std::path::Path;
///
/// let options = OptionStore::new().unwrap();
/// assert_eq!(resolve_path(&options, "/a/b.txt"), Path::new("./a/b.txt"));
/// ```
pub fn resolve_path(options: &OptionStore, uri: &str) -> PathBuf {
    for (prefix, dir) in options.aliases.get() {
        if let Some(rest) = uri.strip_prefix(prefix.as_str()) {
            if rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/') {
                return join_segments(&dir, rest);
            }
        }
    }
    join_segments(&options.root.get(), uri)
}

/// Agrega los segmentos del URI uno por uno, sin `.` ni `..`
fn join_segments(base: &Path, uri: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    for segment in uri
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
    {
        path.push(segment);
    }
    path
}

/// ¿Es un archivo de passwords? Nunca se sirven.
pub fn is_passwords_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name == PASSWORDS_FILE_NAME)
        .unwrap_or(false)
}

/// Primer archivo índice que exista dentro de `dir`
pub fn find_index_file(options: &OptionStore, dir: &Path) -> Option<(PathBuf, Metadata)> {
    options.index_files.get().into_iter().find_map(|name| {
        let candidate = dir.join(name);
        match fs::metadata(&candidate) {
            Ok(metadata) if metadata.is_file() => Some((candidate, metadata)),
            _ => None,
        }
    })
}

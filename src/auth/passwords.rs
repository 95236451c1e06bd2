//! # Archivos de Passwords
//! src/auth/passwords.rs
//!
//! Una línea por usuario: `user:realm:ha1`, con `ha1 = MD5(user:realm:pass)`
//! en hexadecimal.

use crate::auth::digest;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

/// Nombre del archivo de passwords por directorio
pub const PASSWORDS_FILE_NAME: &str = ".htpasswd";

/// Busca el HA1 de `user` en `realm`
pub fn lookup_ha1(file: &Path, user: &str, realm: &str) -> io::Result<Option<String>> {
    let reader = BufReader::new(File::open(file)?);

    for line in reader.lines() {
        let line = line?;
        if let Some((u, r, ha1)) = split_line(&line) {
            if u == user && r == realm {
                return Ok(Some(ha1.to_string()));
            }
        }
    }

    Ok(None)
}

fn split_line(line: &str) -> Option<(&str, &str, &str)> {
    let mut parts = line.trim_end().splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(user), Some(realm), Some(ha1)) if !user.is_empty() => Some((user, realm, ha1)),
        _ => None,
    }
}

/// Agrega, cambia o (con `password = None`) borra un usuario.
///
/// El archivo se reescribe completo a través de un temporal y un rename.
///
/// # Ejemplo
/// ```
/// use emberd::auth::passwords::{lookup_ha1, modify_passwords_file};
///
/// let file = std::env::temp_dir().join(format!("emberd-doc-{}.htpasswd", std::process::id()));
/// modify_passwords_file(&file, "realm", "ana", Some("secreto")).unwrap();
/// assert!(lookup_ha1(&file, "ana", "realm").unwrap().is_some());
///
/// modify_passwords_file(&file, "realm", "ana", None).unwrap();
/// assert!(lookup_ha1(&file, "ana", "realm").unwrap().is_none());
/// # std::fs::remove_file(&file).unwrap();
/// ```
pub fn modify_passwords_file(
    file: &Path,
    realm: &str,
    user: &str,
    password: Option<&str>,
) -> io::Result<()> {
    let existing = match fs::read_to_string(file) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e),
    };

    let new_line = password.map(|p| format!("{}:{}:{}", user, realm, digest::ha1(user, realm, p)));
    let mut lines = Vec::new();
    let mut replaced = false;

    for line in existing.lines() {
        match split_line(line) {
            Some((u, r, _)) if u == user && r == realm => {
                if let Some(new_line) = &new_line {
                    if !replaced {
                        lines.push(new_line.clone());
                    }
                }
                replaced = true;
            }
            _ => lines.push(line.to_string()),
        }
    }
    if let (Some(new_line), false) = (new_line, replaced) {
        lines.push(new_line);
    }

    let mut tmp_name = file.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = Path::new(&tmp_name);
    {
        let mut out = File::create(tmp)?;
        for line in &lines {
            writeln!(out, "{}", line)?;
        }
        out.sync_all()?;
    }
    fs::rename(tmp, file)
}

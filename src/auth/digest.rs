//! # Autenticación HTTP Digest
//! src/auth/digest.rs
//!
//! Solo `qop="auth"` con MD5:
//!
//! ```text
//! HA1      = MD5(user:realm:password)      (guardado en el archivo)
//! HA2      = MD5(method:uri)
//! response = MD5(HA1:nonce:nc:cnonce:qop:HA2)
//! ```
//!
//! El nonce es la hora actual y no se guarda; cualquier nonce que mande el
//! cliente se acepta si la respuesta cuadra.

use md5::{Digest, Md5};
use std::time::{SystemTime, UNIX_EPOCH};

/// Campos del header `Authorization: Digest ...`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestCredentials {
    pub username: String,
    pub realm: String,
    pub nonce: String,
    pub uri: String,
    pub qop: String,
    pub nc: String,
    pub cnonce: String,
    pub response: String,
}

/// Parsea el header `Authorization`.
///
/// Devuelve `None` si no es Digest o si falta algún campo obligatorio.
///
/// # Ejemplo
/// ```
/// use emberd::auth::digest::parse_authorization;
///
/// let header = r#"Digest username="bob", nonce="1", uri="/", qop=auth, nc=00000001, cnonce="x", response="ff""#;
/// let creds = parse_authorization(header).unwrap();
/// assert_eq!(creds.username, "bob");
/// assert_eq!(creds.qop, "auth");
/// ```
pub fn parse_authorization(header: &str) -> Option<DigestCredentials> {
    let header = header.trim();
    let (scheme, params) = header.split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("Digest") {
        return None;
    }

    let mut creds = DigestCredentials::default();
    for (name, value) in parse_params(params)? {
        let field = match name.as_str() {
            "username" => &mut creds.username,
            "realm" => &mut creds.realm,
            "nonce" => &mut creds.nonce,
            "uri" => &mut creds.uri,
            "qop" => &mut creds.qop,
            "nc" => &mut creds.nc,
            "cnonce" => &mut creds.cnonce,
            "response" => &mut creds.response,
            _ => continue,
        };
        *field = value;
    }

    let required = [
        &creds.username,
        &creds.nonce,
        &creds.uri,
        &creds.qop,
        &creds.nc,
        &creds.cnonce,
        &creds.response,
    ];
    if required.iter().any(|value| value.is_empty()) {
        return None;
    }
    Some(creds)
}

/// `name=value, name="quoted \" value", ...`; `None` si una comilla no cierra
fn parse_params(mut rest: &str) -> Option<Vec<(String, String)>> {
    let mut params = Vec::new();

    loop {
        rest = rest.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
        if rest.is_empty() {
            return Some(params);
        }

        let eq = rest.find('=')?;
        let name = rest[..eq].trim().to_ascii_lowercase();
        rest = rest[eq + 1..].trim_start();

        let value = if let Some(quoted) = rest.strip_prefix('"') {
            let mut value = String::new();
            let mut escaped = false;
            let mut end = None;
            for (i, ch) in quoted.char_indices() {
                if escaped {
                    value.push(ch);
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == '"' {
                    end = Some(i);
                    break;
                } else {
                    value.push(ch);
                }
            }
            rest = &quoted[end? + 1..];
            value
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            let value = rest[..end].trim().to_string();
            rest = &rest[end..];
            value
        };

        params.push((name, value));
    }
}

/// MD5 en hexadecimal de las partes unidas con `:`
///
/// # Ejemplo
/// ```
/// use emberd::auth::digest::md5_hex;
///
/// assert_eq!(md5_hex(&["a", "b"]), md5_hex(&["a:b"]));
/// assert_eq!(md5_hex(&[""]), "d41d8cd98f00b204e9800998ecf8427e");
/// ```
pub fn md5_hex(parts: &[&str]) -> String {
    let mut hasher = Md5::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b":");
        }
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// HA1 tal como se guarda en el archivo de passwords
pub fn ha1(user: &str, realm: &str, password: &str) -> String {
    md5_hex(&[user, realm, password])
}

/// Respuesta que debería mandar un cliente que conoce el password
pub fn expected_response(ha1: &str, method: &str, creds: &DigestCredentials) -> String {
    let ha2 = md5_hex(&[method, &creds.uri]);
    md5_hex(&[
        ha1,
        &creds.nonce,
        &creds.nc,
        &creds.cnonce,
        &creds.qop,
        &ha2,
    ])
}

/// ¿La respuesta del cliente corresponde al HA1 guardado?
pub fn check_response(ha1: &str, method: &str, creds: &DigestCredentials) -> bool {
    expected_response(ha1, method, creds).eq_ignore_ascii_case(&creds.response)
}

/// Nonce nuevo: segundos desde epoch en hexadecimal
pub fn new_nonce() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{:x}", secs)
}

/// Valor del header `WWW-Authenticate` para un 401
pub fn challenge(realm: &str) -> String {
    format!(
        "Digest qop=\"auth\", realm=\"{}\", nonce=\"{}\"",
        realm,
        new_nonce()
    )
}

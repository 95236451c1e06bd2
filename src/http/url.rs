//! # Codificación de URLs
//! src/http/url.rs
//!
//! Decodificación `%XX`, normalización de paths y búsqueda de variables en
//! query strings / formularios. La sustitución `+` → espacio solo aplica a
//! datos de formulario; los segmentos de path la conservan tal cual.

/// Decodifica secuencias `%XX`.
///
/// Una secuencia incompleta o con dígitos no hexadecimales se copia sin
/// cambios. Con `is_form` el `+` se convierte en espacio.
///
/// # Ejemplo
/// ```
/// use emberd::http::url::url_decode;
///
/// assert_eq!(url_decode(b"a%20b+c", false), b"a b+c");
/// assert_eq!(url_decode(b"a%20b+c", true), b"a b c");
/// ```
pub fn url_decode(src: &[u8], is_form: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    let mut i = 0;

    while i < src.len() {
        match src[i] {
            b'%' if i + 2 < src.len() => {
                match (hex_value(src[i + 1]), hex_value(src[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                        continue;
                    }
                    _ => out.push(b'%'),
                }
            }
            b'+' if is_form => out.push(b' '),
            byte => out.push(byte),
        }
        i += 1;
    }

    out
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Codifica todo lo que no sea alfanumérico o `-_.~/`.
///
/// `url_decode(url_encode(x), false) == x` para cualquier secuencia de bytes.
pub fn url_encode(src: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(src.len() * 3);

    for &byte in src {
        if byte.is_ascii_alphanumeric() || b"-_.~/".contains(&byte) {
            out.push(byte as char);
        } else {
            out.push('%');
            out.push(HEX[(byte >> 4) as usize] as char);
            out.push(HEX[(byte & 0x0f) as usize] as char);
        }
    }

    out
}

/// Colapsa los segmentos `.` y `..` de un URI ya decodificado.
///
/// El resultado siempre empieza por `/` y nunca sube por encima de la raíz.
/// Las barras invertidas se tratan como separadores y las barras repetidas
/// se colapsan. Se conserva la `/` final.
///
/// # Ejemplo
/// ```
/// use emberd::http::url::remove_double_dots;
///
/// assert_eq!(remove_double_dots("/a/../../etc/passwd"), "/etc/passwd");
/// assert_eq!(remove_double_dots("/docs/./img/"), "/docs/img/");
/// ```
pub fn remove_double_dots(uri: &str) -> String {
    let unified = uri.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();

    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut normalized = String::with_capacity(unified.len());
    for segment in &segments {
        normalized.push('/');
        normalized.push_str(segment);
    }

    let trailing = unified.ends_with('/') || unified.ends_with("/.") || unified.ends_with("/..");
    if normalized.is_empty() || trailing {
        normalized.push('/');
    }

    normalized
}

/// Busca `name` en datos `a=1&b=2` y devuelve el valor decodificado.
///
/// La comparación del nombre no distingue mayúsculas. Sirve tanto para
/// query strings como para cuerpos `application/x-www-form-urlencoded`.
///
/// # Ejemplo
/// ```
/// use emberd::http::url::get_var;
///
/// assert_eq!(get_var("user=ana+maria&x=1", "user").as_deref(), Some("ana maria"));
/// assert_eq!(get_var("user=ana", "missing"), None);
/// ```
pub fn get_var(data: &str, name: &str) -> Option<String> {
    data.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key.eq_ignore_ascii_case(name) {
            Some(String::from_utf8_lossy(&url_decode(value.as_bytes(), true)).into_owned())
        } else {
            None
        }
    })
}

/// Escapa texto para insertarlo en HTML
pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

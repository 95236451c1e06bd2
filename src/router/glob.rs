//! # Patrones de URI
//! src/router/glob.rs
//!
//! El único comodín es `*`, que acepta todo lo que quede del texto (lo que
//! haya después del `*` en el patrón se ignora). El resto del patrón se
//! compara literalmente, byte a byte.

/// ¿`text` encaja con `pattern`?
///
/// # Ejemplo
/// ```
/// use emberd::router::glob::matches;
///
/// assert!(matches("/api/*", "/api/users/1"));
/// assert!(matches("/exact", "/exact"));
/// assert!(!matches("/exact", "/exact/more"));
/// ```
pub fn matches(pattern: &str, text: &str) -> bool {
    match_bytes(pattern.as_bytes(), text.as_bytes())
}

fn match_bytes(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.split_first(), text.split_first()) {
        (None, _) => text.is_empty(),
        (Some((&b'*', _)), _) => true,
        (Some((p, pattern_rest)), Some((t, text_rest))) if p == t => {
            match_bytes(pattern_rest, text_rest)
        }
        _ => false,
    }
}

//! # Página de Administración
//! src/admin.rs
//!
//! Se sirve en el URI de la opción `admin_uri` (deshabilitada si está
//! vacía):
//!
//! - `GET` muestra una tabla con todas las opciones y un formulario para
//!   cambiarlas
//! - `GET ?json` devuelve lo mismo en JSON
//! - `POST` con campos `o` (nombre) y `v` (valor) cambia una opción en
//!   caliente

use crate::config::options::OptionName;
use crate::http::url::{get_var, html_escape};
use crate::http::{Method, Request, Response, StatusCode};
use crate::router::send_error;
use crate::server::{Connection, ServerState};
use serde::Serialize;

/// Una fila de la tabla de opciones
#[derive(Debug, Clone, Serialize)]
pub struct OptionView {
    pub name: &'static str,
    pub value: String,
    pub description: &'static str,
}

/// Respuesta JSON de la página
#[derive(Debug, Clone, Serialize)]
pub struct AdminView {
    pub version: &'static str,
    pub active_workers: usize,
    pub options: Vec<OptionView>,
}

/// Estado actual de todas las opciones
pub fn snapshot(state: &ServerState) -> AdminView {
    AdminView {
        version: env!("CARGO_PKG_VERSION"),
        active_workers: state.active_workers(),
        options: OptionName::ALL
            .iter()
            .map(|name| OptionView {
                name: name.as_str(),
                value: state.options.get(*name),
                description: name.description(),
            })
            .collect(),
    }
}

/// Tabla HTML con un formulario por opción
pub fn render_html(admin_uri: &str, view: &AdminView, message: Option<&str>) -> String {
    let mut html = String::from(
        "<html><head><title>emberd admin</title>\
         <style>td, th {text-align: left; padding: 2px 8px;}</style></head><body>\
         <h1>emberd admin</h1>\n",
    );

    if let Some(message) = message {
        html.push_str(&format!("<p><b>{}</b></p>\n", html_escape(message)));
    }
    html.push_str(&format!(
        "<p>Version {}, {} active workers</p>\n<table>\
         <tr><th>Option</th><th>Value</th><th>Description</th></tr>\n",
        view.version, view.active_workers
    ));

    let action = html_escape(admin_uri);
    for option in &view.options {
        html.push_str(&format!(
            "<tr><td>{name}</td><td><form method=\"POST\" action=\"{action}\">\
             <input type=\"hidden\" name=\"o\" value=\"{name}\">\
             <input type=\"text\" name=\"v\" value=\"{value}\" size=\"40\">\
             <input type=\"submit\" value=\"set\"></form></td><td>{description}</td></tr>\n",
            name = option.name,
            action = action,
            value = html_escape(&option.value),
            description = html_escape(option.description),
        ));
    }

    html.push_str("</table></body></html>\n");
    html
}

/// Atiende la página de administración
pub fn handle(state: &ServerState, conn: &mut Connection, req: &mut Request) {
    let message = match req.method() {
        Method::GET | Method::HEAD => None,
        Method::POST => match update_option(conn, req, state) {
            Ok(message) => Some(message),
            Err(detail) => {
                send_error(state, conn, req, StatusCode::BadRequest, &detail);
                return;
            }
        },
        _ => {
            send_error(state, conn, req, StatusCode::NotImplemented, "Method not supported");
            return;
        }
    };

    let view = snapshot(state);
    let wants_json = req
        .query_string()
        .map(|q| q.split('&').any(|p| p == "json"))
        .unwrap_or(false);

    let response = if wants_json {
        match serde_json::to_string_pretty(&view) {
            Ok(body) => Response::new(StatusCode::Ok)
                .with_header("Content-Type", "application/json")
                .with_body(&body),
            Err(e) => {
                let detail = format!("Cannot serialize options: {}", e);
                send_error(state, conn, req, StatusCode::InternalServerError, &detail);
                return;
            }
        }
    } else {
        Response::new(StatusCode::Ok)
            .with_header("Content-Type", "text/html; charset=utf-8")
            .with_header("Cache-Control", "no-cache")
            .with_body(&render_html(req.uri(), &view, message.as_deref()))
    };

    req.set_status_code(StatusCode::Ok.as_u16());
    if conn
        .send_response(response, req.method() != Method::HEAD)
        .is_err()
    {
        conn.close_after_response();
    }
}

/// Lee el formulario `o=...&v=...` y cambia la opción
fn update_option(conn: &mut Connection, req: &mut Request, state: &ServerState) -> Result<String, String> {
    let body = conn
        .read_body_to_end()
        .map_err(|e| format!("Cannot read form: {}", e))?;
    let form = String::from_utf8_lossy(&body).into_owned();
    req.set_body(body);

    let name = get_var(&form, "o").ok_or("Missing option name (o)")?;
    let value = get_var(&form, "v").unwrap_or_default();

    state
        .set_option(&name, &value)
        .map(|()| format!("{} set to \"{}\"", name, value))
        .map_err(|e| e.to_string())
}

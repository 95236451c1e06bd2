//! # emberd - Entry Point
//! src/main.rs
//!
//! Arranca el servidor con la configuración de la línea de comandos (o de
//! las variables `EMBER_*`) y lo detiene con Ctrl-C.
//!
//! Con `--passwd FILE REALM USER [PASSWORD]` solo edita un archivo de
//! passwords y termina.

use emberd::auth::passwords::modify_passwords_file;
use emberd::config::Config;
use emberd::logging::init_tracing;
use emberd::server::Context;
use std::path::Path;
use std::sync::mpsc;
use tracing::{error, info};

fn main() {
    init_tracing();
    let config = Config::new();

    if let Some(args) = &config.passwd {
        let password = args.get(3).map(String::as_str);
        match modify_passwords_file(Path::new(&args[0]), &args[1], &args[2], password) {
            Ok(()) => info!(file = %args[0], user = %args[2], "archivo de passwords actualizado"),
            Err(e) => {
                error!(file = %args[0], error = %e, "no se pudo editar el archivo de passwords");
                std::process::exit(1);
            }
        }
        return;
    }

    if let Err(e) = config.validate() {
        eprintln!("Configuración inválida: {}", e);
        std::process::exit(1);
    }
    config.print_summary();

    let ctx = match Context::start(&config) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(error = %e, "no se pudo iniciar el servidor");
            std::process::exit(1);
        }
    };
    for addr in ctx.local_addrs() {
        info!(%addr, "emberd escuchando");
    }

    let (tx, rx) = mpsc::channel();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = tx.send(());
    }) {
        error!(error = %e, "no se pudo instalar el handler de Ctrl-C");
        ctx.stop();
        std::process::exit(1);
    }

    // Bloquea hasta Ctrl-C
    let _ = rx.recv();
    ctx.stop();
}

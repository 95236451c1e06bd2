//! # Procesos Hijos
//! src/process.rs
//!
//! Lanzamiento de programas externos para CGI y `#exec` de SSI. El hijo
//! queda envuelto en un `ChildGuard` que lo mata y recoge su status si se
//! hace drop antes de que termine, así una conexión que se corta no deja
//! procesos zombie.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};

/// Proceso hijo con stdin y stdout conectados por pipes
#[derive(Debug)]
pub struct ChildGuard {
    child: Child,
}

impl ChildGuard {
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Espera a que el hijo termine
    pub fn wait(mut self) -> io::Result<ExitStatus> {
        self.child.wait()
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

/// Lanza `program args...` con stdin/stdout en pipes y stderr heredado.
///
/// Con `env = Some(..)` el hijo recibe solamente esas variables.
pub fn spawn_piped(
    program: &OsStr,
    args: &[OsString],
    cwd: Option<&Path>,
    env: Option<&[(String, String)]>,
) -> io::Result<ChildGuard> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());

    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    if let Some(vars) = env {
        command.env_clear();
        command.envs(vars.iter().map(|(name, value)| (name, value)));
    }

    Ok(ChildGuard {
        child: command.spawn()?,
    })
}

/// Programa y argumentos para correr `line` en el shell
pub fn shell_command(line: &str) -> (OsString, Vec<OsString>) {
    (
        OsString::from("sh"),
        vec![OsString::from("-c"), OsString::from(line)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_shell_command_output() {
        let (program, args) = shell_command("echo hola");
        let mut child = spawn_piped(&program, &args, None, None).unwrap();
        drop(child.take_stdin());

        let mut output = String::new();
        child.take_stdout().unwrap().read_to_string(&mut output).unwrap();
        assert_eq!(output, "hola\n");
        assert!(child.wait().unwrap().success());
    }

    #[test]
    fn test_env_is_replaced() {
        let (program, args) = shell_command("printf %s \"$EMBER_TEST_VAR\"");
        let env = vec![
            ("PATH".to_string(), "/usr/bin:/bin".to_string()),
            ("EMBER_TEST_VAR".to_string(), "valor".to_string()),
        ];
        let mut child = spawn_piped(&program, &args, None, Some(&env)).unwrap();
        drop(child.take_stdin());

        let mut output = String::new();
        child.take_stdout().unwrap().read_to_string(&mut output).unwrap();
        assert_eq!(output, "valor");
    }

    #[test]
    fn test_stdin_is_forwarded() {
        let (program, args) = shell_command("cat");
        let mut child = spawn_piped(&program, &args, None, None).unwrap();
        {
            let mut stdin = child.take_stdin().unwrap();
            stdin.write_all(b"data").unwrap();
        }

        let mut output = String::new();
        child.take_stdout().unwrap().read_to_string(&mut output).unwrap();
        assert_eq!(output, "data");
    }

    #[test]
    fn test_drop_kills_running_child() {
        let (program, args) = shell_command("sleep 30");
        let child = spawn_piped(&program, &args, None, None).unwrap();
        let started = std::time::Instant::now();
        drop(child);
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }
}

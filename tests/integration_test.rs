//! Tests de integración para el servidor HTTP
//! tests/integration_test.rs
//!
//! Cada test arranca su propio servidor en un puerto efímero de 127.0.0.1
//! con un document root temporal, y habla HTTP crudo por TCP.

use emberd::auth::digest::{self, DigestCredentials};
use emberd::auth::passwords::{modify_passwords_file, PASSWORDS_FILE_NAME};
use emberd::config::Config;
use emberd::http::{Response, StatusCode};
use emberd::server::Context;
use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

const REALM: &str = "mydomain.com";

/// Servidor de prueba con un directorio propio
struct TestServer {
    ctx: Context,
    base: PathBuf,
    root: PathBuf,
    addr: SocketAddr,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.base);
    }
}

/// Arranca un servidor; `configure` puede ajustar la configuración (el
/// root ya apunta a `<base>/www`).
fn start_server(name: &str, configure: impl FnOnce(&mut Config, &PathBuf)) -> TestServer {
    let base = std::env::temp_dir().join(format!("emberd-it-{}-{}", std::process::id(), name));
    let _ = fs::remove_dir_all(&base);
    let root = base.join("www");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("a.txt"), "hello world").unwrap();

    let mut config = Config {
        root: root.to_string_lossy().into_owned(),
        ports: "127.0.0.1:0".to_string(),
        ..Config::default()
    };
    configure(&mut config, &base);

    let ctx = Context::start(&config).expect("server should start");
    let addr = ctx.local_addrs()[0];
    TestServer {
        ctx,
        base,
        root,
        addr,
    }
}

/// Envía bytes crudos y lee hasta que el servidor cierre
fn send(addr: SocketAddr, raw: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    let _ = stream.write_all(raw);

    let mut response = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => response.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&response).into_owned()
}

fn get(addr: SocketAddr, uri: &str) -> String {
    send(addr, format!("GET {} HTTP/1.0\r\n\r\n", uri).as_bytes())
}

/// Status de la primera response
fn status_of(response: &str) -> u16 {
    response
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

fn body_of(response: &str) -> &str {
    response
        .find("\r\n\r\n")
        .map(|pos| &response[pos + 4..])
        .unwrap_or("")
}

/// Header `Authorization` que mandaría un cliente Digest
fn digest_header(user: &str, password: &str, method: &str, uri: &str) -> String {
    let mut creds = DigestCredentials {
        username: user.to_string(),
        realm: REALM.to_string(),
        nonce: "5f5e100".to_string(),
        uri: uri.to_string(),
        qop: "auth".to_string(),
        nc: "00000001".to_string(),
        cnonce: "c0ffee".to_string(),
        response: String::new(),
    };
    let ha1 = digest::ha1(user, REALM, password);
    creds.response = digest::expected_response(&ha1, method, &creds);

    format!(
        "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", qop={}, nc={}, cnonce=\"{}\", response=\"{}\"",
        creds.username, creds.realm, creds.nonce, creds.uri, creds.qop, creds.nc, creds.cnonce, creds.response
    )
}

#[test]
fn test_static_file() {
    let server = start_server("static", |_, _| {});

    let response = get(server.addr, "/a.txt");
    assert_eq!(status_of(&response), 200, "got: {}", response);
    assert!(response.contains("Content-Length: 11"));
    assert!(response.contains("Content-Type: text/plain"));
    assert!(response.contains("ETag: \""));
    assert_eq!(body_of(&response), "hello world");

    let head = send(server.addr, b"HEAD /a.txt HTTP/1.0\r\n\r\n");
    assert_eq!(status_of(&head), 200);
    assert_eq!(body_of(&head), "");
}

#[test]
fn test_missing_file_is_404() {
    let server = start_server("missing", |_, _| {});
    let response = get(server.addr, "/nope.html");
    assert_eq!(status_of(&response), 404);
    assert!(body_of(&response).starts_with("Error 404: Not Found"));
}

#[test]
fn test_no_traversal_outside_root() {
    let server = start_server("traversal", |_, _| {});
    fs::write(server.base.join("secret.txt"), "top secret").unwrap();

    for uri in ["/../secret.txt", "/%2e%2e/secret.txt", "/x/../../secret.txt", "/..%5csecret.txt"] {
        let response = get(server.addr, uri);
        assert_eq!(status_of(&response), 404, "{} leaked: {}", uri, response);
        assert!(!response.contains("top secret"));
    }
}

#[test]
fn test_range_request() {
    let server = start_server("range", |_, _| {});

    let response = send(server.addr, b"GET /a.txt HTTP/1.0\r\nRange: bytes=6-\r\n\r\n");
    assert_eq!(status_of(&response), 206);
    assert!(response.contains("Content-Range: bytes 6-10/11"));
    assert_eq!(body_of(&response), "world");

    let response = send(server.addr, b"GET /a.txt HTTP/1.0\r\nRange: bytes=50-60\r\n\r\n");
    assert_eq!(status_of(&response), 416);
}

#[test]
fn test_if_modified_since() {
    let server = start_server("ims", |_, _| {});

    let first = get(server.addr, "/a.txt");
    let last_modified = first
        .lines()
        .find_map(|l| l.strip_prefix("Last-Modified: "))
        .unwrap()
        .to_string();

    let request = format!("GET /a.txt HTTP/1.0\r\nIf-Modified-Since: {}\r\n\r\n", last_modified);
    let response = send(server.addr, request.as_bytes());
    assert_eq!(status_of(&response), 304);
    assert_eq!(body_of(&response), "");
}

#[test]
fn test_directory_handling() {
    let server = start_server("dirs", |_, _| {});
    fs::create_dir(server.root.join("docs")).unwrap();
    fs::write(server.root.join("docs").join("readme.txt"), "r").unwrap();

    let response = get(server.addr, "/docs");
    assert_eq!(status_of(&response), 301);
    assert!(response.contains("Location: /docs/"));

    let response = get(server.addr, "/docs/");
    assert_eq!(status_of(&response), 200);
    assert!(response.contains("readme.txt"));

    fs::write(server.root.join("docs").join("index.html"), "<h1>index</h1>").unwrap();
    let response = get(server.addr, "/docs/");
    assert_eq!(body_of(&response), "<h1>index</h1>");
}

#[test]
fn test_directory_listing_disabled_at_runtime() {
    let server = start_server("nolist", |_, _| {});
    assert_eq!(status_of(&get(server.addr, "/")), 200);

    server.ctx.set_option("dir_list", "no").unwrap();
    assert_eq!(server.ctx.get_option("dir_list").as_deref(), Some("no"));
    assert_eq!(status_of(&get(server.addr, "/")), 403);
}

#[test]
fn test_uri_handler_first_match_wins() {
    let server = start_server("handlers", |_, _| {});
    server.ctx.bind_to_uri("/api/*", |conn, _req| {
        let _ = conn.send_response(Response::new(StatusCode::Ok).with_body("first"), true);
    });
    server.ctx.bind_to_uri("/api/exact", |conn, _req| {
        let _ = conn.send_response(Response::new(StatusCode::Ok).with_body("second"), true);
    });

    let response = get(server.addr, "/api/exact");
    assert_eq!(body_of(&response), "first");

    let response = get(server.addr, "/apix");
    assert_eq!(status_of(&response), 404);
}

#[test]
fn test_uri_handler_reads_query_and_body() {
    let server = start_server("form", |_, _| {});
    server.ctx.bind_to_uri("/echo", |conn, req| {
        let body = format!(
            "q={} f={}",
            req.query_var("q").unwrap_or_default(),
            req.form_var("f").unwrap_or_default()
        );
        let _ = conn.send_response(Response::new(StatusCode::Ok).with_body(&body), true);
    });

    let response = send(
        server.addr,
        b"POST /echo?q=a+b HTTP/1.0\r\nContent-Length: 9\r\n\r\nf=x%20y&z",
    );
    assert_eq!(status_of(&response), 200);
    assert_eq!(body_of(&response), "q=a b f=x y");
}

#[test]
fn test_error_handler() {
    let server = start_server("errors", |_, _| {});
    server.ctx.bind_to_error_code(Some(404), |conn, req| {
        let body = format!("custom {} {}", req.status_code(), req.uri());
        let _ = conn.send_response(Response::new(StatusCode::NotFound).with_body(&body), true);
    });

    let response = get(server.addr, "/ghost");
    assert_eq!(status_of(&response), 404);
    assert_eq!(body_of(&response), "custom 404 /ghost");
}

#[test]
fn test_digest_authentication() {
    let server = start_server("digest", |_, _| {});
    let private = server.root.join("private");
    fs::create_dir(&private).unwrap();
    fs::write(private.join("data.txt"), "classified").unwrap();
    modify_passwords_file(&private.join(PASSWORDS_FILE_NAME), REALM, "alice", Some("wonderland")).unwrap();

    let response = get(server.addr, "/private/data.txt");
    assert_eq!(status_of(&response), 401);
    assert!(response.contains("WWW-Authenticate: Digest qop=\"auth\", realm=\"mydomain.com\", nonce=\""));

    let auth = digest_header("alice", "wonderland", "GET", "/private/data.txt");
    let request = format!("GET /private/data.txt HTTP/1.0\r\nAuthorization: {}\r\n\r\n", auth);
    let response = send(server.addr, request.as_bytes());
    assert_eq!(status_of(&response), 200);
    assert_eq!(body_of(&response), "classified");

    let bad = digest_header("alice", "looking-glass", "GET", "/private/data.txt");
    let request = format!("GET /private/data.txt HTTP/1.0\r\nAuthorization: {}\r\n\r\n", bad);
    assert_eq!(status_of(&send(server.addr, request.as_bytes())), 401);

    // Usuario correcto pero nc o cnonce distintos de los firmados
    let good = digest_header("alice", "wonderland", "GET", "/private/data.txt");
    for replay in [
        good.replace("nc=00000001", "nc=00000002"),
        good.replace("cnonce=\"c0ffee\"", "cnonce=\"decaf\""),
    ] {
        assert_ne!(replay, good);
        let request = format!("GET /private/data.txt HTTP/1.0\r\nAuthorization: {}\r\n\r\n", replay);
        assert_eq!(status_of(&send(server.addr, request.as_bytes())), 401);
    }

    // El archivo de passwords nunca se sirve, ni siquiera se pide login
    let uri = format!("/private/{}", PASSWORDS_FILE_NAME);
    assert_eq!(status_of(&get(server.addr, &uri)), 403);
    let auth = digest_header("alice", "wonderland", "GET", &uri);
    let request = format!("GET {} HTTP/1.0\r\nAuthorization: {}\r\n\r\n", uri, auth);
    assert_eq!(status_of(&send(server.addr, request.as_bytes())), 403);

    // Lo que no está en el directorio protegido sigue siendo público
    assert_eq!(status_of(&get(server.addr, "/a.txt")), 200);
}

#[test]
fn test_protect_uri_callback() {
    let server = start_server("protect", |_, _| {});
    server
        .ctx
        .protect_uri("/a.txt", |req| req.header("X-Token") == Some("ok"));

    assert_eq!(status_of(&get(server.addr, "/a.txt")), 401);
    let response = send(server.addr, b"GET /a.txt HTTP/1.0\r\nX-Token: ok\r\n\r\n");
    assert_eq!(status_of(&response), 200);
}

#[test]
fn test_put_and_delete() {
    let server = start_server("put", |config, base| {
        let passwd = base.join("put.passwd");
        fs::create_dir_all(base).unwrap();
        modify_passwords_file(&passwd, REALM, "bob", Some("builder")).unwrap();
        config.auth_put = passwd.to_string_lossy().into_owned();
    });

    let put = |auth: Option<String>, body: &str| {
        let mut request = format!("PUT /up/new.txt HTTP/1.0\r\nContent-Length: {}\r\n", body.len());
        if let Some(auth) = auth {
            request.push_str(&format!("Authorization: {}\r\n", auth));
        }
        request.push_str("\r\n");
        request.push_str(body);
        status_of(&send(server.addr, request.as_bytes()))
    };

    assert_eq!(put(None, "nope"), 401);
    assert!(!server.root.join("up").join("new.txt").exists());

    let auth = digest_header("bob", "builder", "PUT", "/up/new.txt");
    assert_eq!(put(Some(auth.clone()), "first"), 201);
    assert_eq!(put(Some(auth), "second"), 200);
    assert_eq!(fs::read_to_string(server.root.join("up").join("new.txt")).unwrap(), "second");

    let delete = || {
        let auth = digest_header("bob", "builder", "DELETE", "/up/new.txt");
        let request = format!("DELETE /up/new.txt HTTP/1.0\r\nAuthorization: {}\r\n\r\n", auth);
        status_of(&send(server.addr, request.as_bytes()))
    };
    assert_eq!(delete(), 200);
    assert_eq!(delete(), 404);
    assert_eq!(delete(), 404);
}

#[test]
fn test_put_without_auth_put_is_denied() {
    let server = start_server("noput", |_, _| {});
    let response = send(server.addr, b"PUT /x.txt HTTP/1.0\r\nContent-Length: 1\r\n\r\nx");
    assert_eq!(status_of(&response), 401);
    assert!(!server.root.join("x.txt").exists());
}

#[test]
fn test_protocol_errors() {
    let server = start_server("protocol", |_, _| {});

    assert_eq!(status_of(&send(server.addr, b"GARBAGE\r\n\r\n")), 400);
    assert_eq!(status_of(&send(server.addr, b"GET /a.txt HTTP/2.0\r\n\r\n")), 505);
    assert_eq!(status_of(&send(server.addr, b"POST /a.txt HTTP/1.1\r\nHost: x\r\n\r\n")), 411);
    assert_eq!(
        status_of(&send(server.addr, b"GET /a.txt HTTP/1.1\r\nExpect: magic\r\n\r\n")),
        417
    );

    // Cabecera sin terminar que llena exactamente el buffer de request
    let mut huge = b"GET /a.txt HTTP/1.0\r\nX-Big: ".to_vec();
    huge.resize(16 * 1024, b'x');
    assert_eq!(status_of(&send(server.addr, &huge)), 400);
}

#[test]
fn test_expect_100_continue() {
    let server = start_server("expect", |_, _| {});
    server.ctx.bind_to_uri("/upload", |conn, req| {
        let body = req.body().to_vec();
        let _ = conn.send_response(Response::new(StatusCode::Ok).with_body_bytes(body), true);
    });

    let response = send(
        server.addr,
        b"POST /upload HTTP/1.1\r\nHost: x\r\nExpect: 100-continue\r\nContent-Length: 4\r\n\r\nabcd",
    );
    assert!(response.starts_with("HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK"), "got: {}", response);
    assert!(response.ends_with("abcd"));
}

#[test]
fn test_keep_alive_pipelining() {
    let server = start_server("pipeline", |_, _| {});
    let response = send(
        server.addr,
        b"GET /a.txt HTTP/1.1\r\nHost: x\r\n\r\nGET /a.txt HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n",
    );
    assert_eq!(response.matches("HTTP/1.1 200 OK").count(), 2);
    assert!(response.contains("Connection: keep-alive"));
    assert!(response.contains("Connection: close"));
}

#[test]
fn test_cgi_script() {
    let server = start_server("cgi", |_, _| {});
    fs::write(
        server.root.join("env.cgi"),
        "#!/bin/sh\necho \"Content-Type: text/plain\"\necho\necho \"method=$REQUEST_METHOD query=$QUERY_STRING gw=$GATEWAY_INTERFACE\"\n",
    )
    .unwrap();
    fs::write(
        server.root.join("echo.cgi"),
        "#!/bin/sh\necho \"Status: 201 Made\"\necho \"Content-Type: text/plain\"\necho\ncat\n",
    )
    .unwrap();

    let response = get(server.addr, "/env.cgi?x=1");
    assert_eq!(status_of(&response), 200, "got: {}", response);
    assert!(body_of(&response).contains("method=GET query=x=1 gw=CGI/1.1"));

    let response = send(server.addr, b"POST /echo.cgi HTTP/1.0\r\nContent-Length: 4\r\n\r\nping");
    assert!(response.starts_with("HTTP/1.1 201 Made"), "got: {}", response);
    assert_eq!(body_of(&response), "ping");

    let response = send(server.addr, b"DELETE /env.cgi HTTP/1.0\r\n\r\n");
    assert_eq!(status_of(&response), 401);

    // Un script solo acepta GET y POST
    let response = send(server.addr, b"HEAD /env.cgi HTTP/1.0\r\n\r\n");
    assert_eq!(status_of(&response), 501);
}

#[test]
fn test_ssi_includes_and_exec() {
    let server = start_server("ssi", |_, _| {});
    fs::create_dir(server.root.join("inc")).unwrap();
    fs::write(server.root.join("inc").join("part.txt"), "PART").unwrap();
    fs::write(server.root.join("sibling.txt"), "SIB").unwrap();
    fs::write(
        server.root.join("page.shtml"),
        "<html><!--#include virtual=\"/inc/part.txt\" --> [<!--#include \"sibling.txt\" -->] <!--#exec \"echo hi\" --><b>x</b></html>",
    )
    .unwrap();
    fs::write(server.root.join("loop.shtml"), "X<!--#include \"loop.shtml\" -->").unwrap();

    let response = get(server.addr, "/page.shtml");
    assert_eq!(status_of(&response), 200);
    assert!(response.contains("Content-Type: text/html"));
    assert_eq!(body_of(&response), "<html>PART [SIB] hi\n<b>x</b></html>");

    let response = get(server.addr, "/loop.shtml");
    assert_eq!(status_of(&response), 200);
    assert_eq!(body_of(&response), "X".repeat(10));
}

#[test]
fn test_max_threads_gate() {
    let server = start_server("gate", |config, _| {
        config.max_threads = "1".to_string();
        config.idle_time = "2".to_string();
    });

    // Una conexión ociosa ocupa el único worker
    let _idle = TcpStream::connect(server.addr).unwrap();
    thread::sleep(Duration::from_millis(300));
    assert_eq!(server.ctx.active_workers(), 1);

    let started = Instant::now();
    let response = get(server.addr, "/a.txt");
    assert_eq!(status_of(&response), 200);
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert!(server.ctx.active_workers() <= 1);
}

#[test]
fn test_max_threads_runs_n_callbacks_in_parallel() {
    let server = start_server("parallel", |config, _| {
        config.max_threads = "3".to_string();
    });
    let period = Duration::from_millis(1500);
    server.ctx.bind_to_uri("/slow", move |conn, _req| {
        thread::sleep(period);
        let _ = conn.send_response(Response::new(StatusCode::Ok).with_body("done"), true);
    });

    let started = Instant::now();
    let clients: Vec<_> = (0..4)
        .map(|_| {
            let addr = server.addr;
            thread::spawn(move || {
                let response = get(addr, "/slow");
                (status_of(&response), started.elapsed())
            })
        })
        .collect();

    let mut elapsed: Vec<Duration> = clients
        .into_iter()
        .map(|client| {
            let (status, elapsed) = client.join().unwrap();
            assert_eq!(status, 200);
            elapsed
        })
        .collect();
    elapsed.sort();

    // Tres en la primera vuelta, el cuarto espera un lugar libre
    assert!(elapsed[2] < period * 2 - Duration::from_millis(300), "{:?}", elapsed);
    assert!(elapsed[3] >= period * 2 - Duration::from_millis(200), "{:?}", elapsed);
}

#[test]
fn test_slow_header_is_cut_at_idle_time() {
    let server = start_server("trickle", |config, _| {
        config.idle_time = "2".to_string();
    });

    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_millis(700))).unwrap();
    let started = Instant::now();
    let mut closed = false;
    let mut chunk = [0u8; 64];

    // Un byte de cabecera cada 700 ms, nunca la línea vacía final
    for _ in 0..12 {
        if stream.write_all(b"G").is_err() {
            closed = true;
            break;
        }
        match stream.read(&mut chunk) {
            Ok(0) => {
                closed = true;
                break;
            }
            Ok(_) => {}
            Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {}
            Err(_) => {
                closed = true;
                break;
            }
        }
    }

    assert!(closed, "connection still open after {:?}", started.elapsed());
    assert!(started.elapsed() < Duration::from_secs(6));
}

#[test]
fn test_failed_rebind_keeps_old_ports() {
    let server = start_server("rebind", |_, _| {});
    let before = server.ctx.local_addrs();
    let held = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let busy = held.local_addr().unwrap();

    let ports = format!("127.0.0.1:0,{}", busy);
    assert!(server.ctx.set_option("ports", &ports).is_err());

    assert_eq!(server.ctx.get_option("ports").as_deref(), Some("127.0.0.1:0"));
    assert_eq!(server.ctx.local_addrs(), before);
    assert_eq!(status_of(&get(server.addr, "/a.txt")), 200);
}

#[test]
fn test_acl_rejects_connection() {
    let server = start_server("acl", |config, _| {
        config.acl = "-0.0.0.0/0".to_string();
    });
    assert_eq!(get(server.addr, "/a.txt"), "");

    server.ctx.set_option("acl", "-0.0.0.0/0,+127.0.0.1").unwrap();
    assert_eq!(status_of(&get(server.addr, "/a.txt")), 200);
}

#[test]
fn test_admin_page() {
    let server = start_server("admin", |config, _| {
        config.admin_uri = "/admin".to_string();
    });

    let response = get(server.addr, "/admin");
    assert_eq!(status_of(&response), 200);
    assert!(response.contains("idle_time"));

    let response = send(server.addr, b"POST /admin HTTP/1.0\r\nContent-Length: 15\r\n\r\no=dir_list&v=no");
    assert_eq!(status_of(&response), 200);
    assert_eq!(server.ctx.get_option("dir_list").as_deref(), Some("no"));

    let response = send(server.addr, b"POST /admin HTTP/1.0\r\nContent-Length: 11\r\n\r\no=bogus&v=1");
    assert_eq!(status_of(&response), 400);

    let response = get(server.addr, "/admin?json");
    assert!(response.contains("application/json"));
    assert!(body_of(&response).contains("\"dir_list\""));
}

#[test]
fn test_access_log() {
    let server = start_server("accesslog", |config, base| {
        fs::create_dir_all(base).unwrap();
        config.access_log = base.join("access.log").to_string_lossy().into_owned();
    });

    get(server.addr, "/a.txt");
    get(server.addr, "/missing");

    let log = fs::read_to_string(server.base.join("access.log")).unwrap();
    assert!(log.contains("\"GET /a.txt HTTP/1.0\" 200 "));
    assert!(log.contains("\"GET /missing HTTP/1.0\" 404 "));
}

#[test]
fn test_stop_waits_for_workers() {
    let server = start_server("stop", |_, _| {});
    let _client = TcpStream::connect(server.addr).unwrap();
    thread::sleep(Duration::from_millis(200));

    let state = std::sync::Arc::clone(server.ctx.state());
    drop(server);
    assert_eq!(state.active_workers(), 0);
}

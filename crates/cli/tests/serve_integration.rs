//! Integration tests for the `obra serve` HTTP API.
//!
//! Each test starts the server as a child process on a unique port, backed by
//! the in-memory ledger unless stated otherwise, makes HTTP requests, and
//! verifies the responses.

#[path = "../../ledger/tests/support/mod.rs"]
mod support;

use std::io::Read;
use std::net::TcpStream;
use std::path::Path;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use serde_json::{json, Value};

/// Atomic port counter to avoid port conflicts between parallel tests.
/// Base port is derived from process ID so parallel test binaries don't
/// collide on the same port range.
static NEXT_PORT: AtomicU16 = AtomicU16::new(0);
static PORT_INIT: std::sync::Once = std::sync::Once::new();

fn next_port() -> u16 {
    PORT_INIT.call_once(|| {
        let base = 20000 + (std::process::id() as u16 % 20000);
        NEXT_PORT.store(base, Ordering::SeqCst);
    });
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

/// Kills the server when a test ends, pass or fail.
struct Server {
    child: Child,
    port: u16,
    _dir: tempfile::TempDir,
}

impl Drop for Server {
    fn drop(&mut self) {
        self.child.kill().ok();
        self.child.wait().ok();
    }
}

/// Helper: start `obra serve` on a fresh port.
fn start_server(in_memory: bool) -> Server {
    start_server_with(|cmd, _| {
        if in_memory {
            cmd.arg("--in-memory");
        }
    })
}

/// Helper: start `obra serve`, letting `configure` add arguments and
/// environment or write files into the server's working directory.
fn start_server_with(configure: impl FnOnce(&mut Command, &Path)) -> Server {
    let port = next_port();
    let dir = tempfile::TempDir::new().expect("temp dir");

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_obra"));
    cmd.current_dir(dir.path());
    for var in [
        "OBRA_CONFIG",
        "OBRA_DEPLOYMENT",
        "OBRA_REQUEST_TIMEOUT_SECS",
        "BLOCKCHAIN_RPC_URL",
        "PORT",
        "CORS_ORIGIN",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("RUST_LOG", "warn");
    cmd.arg("serve").arg("--port").arg(port.to_string());
    configure(&mut cmd, dir.path());
    cmd.stdout(std::process::Stdio::null());
    cmd.stderr(std::process::Stdio::null());

    let child = cmd.spawn().expect("failed to start obra serve");
    // Wait for server to be ready by polling the port
    for _ in 0..50 {
        if TcpStream::connect(format!("127.0.0.1:{}", port)).is_ok() {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    Server {
        child,
        port,
        _dir: dir,
    }
}

/// Helper: send a raw HTTP request and return (status, headers, body).
fn http(port: u16, method: &str, path: &str, extra: &str, body: &str) -> (u16, String, String) {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", port)).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();

    let request = format!(
        "{} {} HTTP/1.1\r\nHost: localhost:{}\r\n{}Content-Type: application/json\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        method,
        path,
        port,
        extra,
        body.len(),
        body
    );
    std::io::Write::write_all(&mut stream, request.as_bytes()).expect("failed to write");

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);

    parse_http_response(&response)
}

fn get(server: &Server, path: &str) -> (u16, Value) {
    let (status, _, body) = http(server.port, "GET", path, "", "");
    (status, serde_json::from_str(&body).expect("valid JSON"))
}

fn post(server: &Server, path: &str, body: &Value) -> (u16, Value) {
    let (status, _, body) = http(server.port, "POST", path, "", &body.to_string());
    (status, serde_json::from_str(&body).expect("valid JSON"))
}

/// Parse an HTTP response into (status_code, headers_string, body).
fn parse_http_response(response: &str) -> (u16, String, String) {
    let parts: Vec<&str> = response.splitn(2, "\r\n\r\n").collect();
    let headers = parts.first().unwrap_or(&"").to_string();
    let body = parts.get(1).unwrap_or(&"").to_string();

    let status = headers
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);

    let body = if headers
        .to_lowercase()
        .contains("transfer-encoding: chunked")
    {
        decode_chunked(&body)
    } else {
        body
    };

    (status, headers, body)
}

/// Decode chunked transfer encoding.
fn decode_chunked(data: &str) -> String {
    let mut result = String::new();
    let mut remaining = data;

    while let Some(line_end) = remaining.find("\r\n") {
        let size = match usize::from_str_radix(remaining[..line_end].trim(), 16) {
            Ok(s) => s,
            Err(_) => break,
        };
        if size == 0 {
            break;
        }
        let chunk_start = line_end + 2;
        let chunk_end = (chunk_start + size).min(remaining.len());
        result.push_str(&remaining[chunk_start..chunk_end]);
        remaining = remaining.get(chunk_end + 2..).unwrap_or("");
    }

    result
}

fn obra(location: &str, kind: &str) -> Value {
    json!({
        "datosJSON": {"informacionGeneral": {"ubicacionObservada": location}, "riesgo": "alto"},
        "ubicacion": location,
        "tipoObra": kind,
    })
}

// ──────────────────────────────────────────────
// Status routes
// ──────────────────────────────────────────────

#[test]
fn health_reports_connected_ledger() {
    let server = start_server(true);
    let (status, json) = get(&server, "/health");
    assert_eq!(status, 200);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["blockchain"], "connected");
    assert!(json["timestamp"].as_str().unwrap().contains('T'));
}

#[test]
fn info_describes_endpoints() {
    let server = start_server(true);
    let (status, json) = get(&server, "/");
    assert_eq!(status, 200);
    assert_eq!(json["endpoints"]["obras"]["create"], "POST /api/obras");
    assert_eq!(json["blockchain"]["connected"], true);
    assert_eq!(json["blockchain"]["contractAddress"], "not deployed");
    assert_eq!(json["blockchain"]["rpcUrl"], "http://localhost:4545");
}

#[test]
fn empty_registry_stats() {
    let server = start_server(true);
    let (status, json) = get(&server, "/api/stats");
    assert_eq!(status, 200);
    assert_eq!(json["totalObras"], "0");
    assert_eq!(json["obrasActivas"], "0");
    assert_eq!(json["obrasInactivas"], "0");
    assert_eq!(json["blockNumber"], "0");
}

#[test]
fn unknown_route_is_404() {
    let server = start_server(true);
    let (status, json) = get(&server, "/api/nothing");
    assert_eq!(status, 404);
    assert_eq!(json["error"], "not found");
}

// ──────────────────────────────────────────────
// Write then read
// ──────────────────────────────────────────────

#[test]
fn registered_obra_is_readable_everywhere() {
    let server = start_server(true);

    let (status, created) = post(&server, "/api/obras", &obra("Río Virilla, San José", "Canal"));
    assert_eq!(status, 201);
    assert_eq!(created["success"], true);
    assert_eq!(created["obraId"], "1");
    assert_eq!(created["verificada"], false);
    assert!(created["transactionHash"].as_str().unwrap().starts_with("0x"));

    let mut verified = obra("Lima, Peru", "Puente");
    verified["verificar"] = json!(true);
    let (status, created) = post(&server, "/api/obras", &verified);
    assert_eq!(status, 201);
    assert_eq!(created["obraId"], "2");
    assert_eq!(created["verificada"], true);

    let (status, one) = get(&server, "/api/obras/1");
    assert_eq!(status, 200);
    assert_eq!(one["id"], "1");
    assert_eq!(one["ubicacion"], "Río Virilla, San José");
    assert_eq!(one["tipoObra"], "Canal");
    assert_eq!(one["activo"], true);
    assert_eq!(one["datos"]["riesgo"], "alto");
    assert!(one["fecha"].as_str().unwrap().ends_with('Z'));

    let (status, all) = get(&server, "/api/obras");
    assert_eq!(status, 200);
    assert_eq!(all["total"], 2);
    assert_eq!(all["obras"][0]["id"], "1");
    assert_eq!(all["obras"][1]["id"], "2");

    let (status, active) = get(&server, "/api/obras?activas=true");
    assert_eq!(status, 200);
    assert_eq!(active["total"], 2);

    let (status, found) = get(&server, "/api/obras/ubicacion/SAN%20JOS%C3%89");
    assert_eq!(status, 200);
    assert_eq!(found["ciudad"], "SAN JOSÉ");
    assert_eq!(found["total"], 1);
    assert_eq!(found["obras"][0]["id"], "1");

    let (status, stats) = get(&server, "/api/stats");
    assert_eq!(status, 200);
    assert_eq!(stats["totalObras"], "2");
    assert_eq!(stats["obrasActivas"], "2");
    assert_eq!(stats["obrasInactivas"], "0");
    assert_eq!(stats["blockNumber"], "2");
}

#[test]
fn incomplete_post_is_400() {
    let server = start_server(true);
    let (status, json) = post(
        &server,
        "/api/obras",
        &json!({"datosJSON": {"a": 1}, "ubicacion": "Lima"}),
    );
    assert_eq!(status, 400);
    assert!(json["message"].as_str().unwrap().contains("tipoObra"));

    let (status, _) = post(
        &server,
        "/api/obras",
        &json!({"datosJSON": null, "ubicacion": "Lima", "tipoObra": "Canal"}),
    );
    assert_eq!(status, 400);

    let (status, _) = post(
        &server,
        "/api/obras",
        &json!({"datosJSON": {}, "ubicacion": "   ", "tipoObra": "Canal"}),
    );
    assert_eq!(status, 400);

    let (_, stats) = get(&server, "/api/stats");
    assert_eq!(stats["totalObras"], "0");
}

// ──────────────────────────────────────────────
// Lookup errors
// ──────────────────────────────────────────────

#[test]
fn bad_ids_are_400_and_missing_ids_404() {
    let server = start_server(true);
    post(&server, "/api/obras", &obra("Lima", "Canal"));

    for path in ["/api/obras/abc", "/api/obras/0", "/api/obras/-3"] {
        let (status, json) = get(&server, path);
        assert_eq!(status, 400, "{path}");
        assert!(json["error"].is_string());
    }

    let (status, json) = get(&server, "/api/obras/2");
    assert_eq!(status, 404);
    assert_eq!(json["error"], "obra not found");
}

#[test]
fn blank_location_search_is_400() {
    let server = start_server(true);
    let (status, _) = get(&server, "/api/obras/ubicacion/%20");
    assert_eq!(status, 400);
}

// ──────────────────────────────────────────────
// Without a ledger
// ──────────────────────────────────────────────

#[test]
fn unconnected_server_still_answers_health() {
    let server = start_server(false);
    let (status, json) = get(&server, "/health");
    assert_eq!(status, 200);
    assert_eq!(json["blockchain"], "disconnected");

    let (_, info) = get(&server, "/");
    assert_eq!(info["blockchain"]["connected"], false);
}

#[test]
fn unconnected_ledger_routes_are_503() {
    let server = start_server(false);
    for path in ["/api/stats", "/api/obras", "/api/obras/1", "/api/obras/ubicacion/lima"] {
        let (status, json) = get(&server, path);
        assert_eq!(status, 503, "{path}");
        assert_eq!(json["error"], "ledger not connected");
    }
    let (status, _) = post(&server, "/api/obras", &obra("Lima", "Canal"));
    assert_eq!(status, 503);
}

#[test]
fn stalled_node_times_out_with_504() {
    let (url, node) = support::spawn_node_thread();
    let server = start_server_with(|cmd, dir| {
        let deployment = dir.join("deployment.json");
        std::fs::write(&deployment, support::DEPLOYMENT).expect("write deployment");
        cmd.env("OBRA_DEPLOYMENT", &deployment)
            .env("BLOCKCHAIN_RPC_URL", &url)
            .env("OBRA_REQUEST_TIMEOUT_SECS", "1");
    });

    let (status, health) = get(&server, "/health");
    assert_eq!(status, 200);
    assert_eq!(health["blockchain"], "connected");

    node.state.lock().unwrap().stall_calls = true;
    let (status, json) = get(&server, "/api/stats");
    assert_eq!(status, 504);
    assert_eq!(json["error"], "request timed out");
    assert!(json["message"].as_str().unwrap().contains("1s"));
}

// ──────────────────────────────────────────────
// CORS
// ──────────────────────────────────────────────

#[test]
fn cors_allows_any_origin_by_default() {
    let server = start_server(true);
    let (status, headers, _) = http(
        server.port,
        "GET",
        "/health",
        "Origin: https://obras.example\r\n",
        "",
    );
    assert_eq!(status, 200);
    assert!(headers
        .to_lowercase()
        .contains("access-control-allow-origin: *"));
}

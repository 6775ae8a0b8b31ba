//! Shared utilities for integration testing: a scriptable mock forward
//! proxy (absolute-form and CONNECT), a stalling proxy, and a gateway
//! launcher.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use relay_gateway::config::{GatewayConfig, Target, TargetScheme, TimeoutConfig, UpstreamProxy};
use relay_gateway::{GatewayServer, Shutdown};

/// Requests observed by a mock server: full head plus any body text.
pub type Captured = Arc<Mutex<Vec<String>>>;

/// Read one HTTP request (head and, if Content-Length says so, body) from
/// the stream. Returns None when the peer closed before sending anything.
async fn read_request<R>(reader: &mut R) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut text = String::new();
    let mut content_length = 0usize;

    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await.ok()?;
        if n == 0 {
            return if text.is_empty() { None } else { Some(text) };
        }
        if let Some((name, value)) = line.trim_end().split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
        let is_blank = line.trim_end_matches(['\r', '\n']).is_empty();
        text.push_str(&line);
        if is_blank {
            break;
        }
    }

    if content_length > 0 {
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).await.ok()?;
        text.push_str(&String::from_utf8_lossy(&body));
    }

    Some(text)
}

/// Start a plaintext mock forward proxy that records each request and
/// answers with a fixed canned response.
pub async fn start_recording_proxy(response: Vec<u8>) -> (SocketAddr, Captured) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let cap = captured.clone();

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let cap = cap.clone();
            let response = response.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                if let Some(request) = read_request(&mut reader).await {
                    cap.lock().unwrap().push(request);
                    let mut socket = reader.into_inner();
                    let _ = socket.write_all(&response).await;
                    let _ = socket.shutdown().await;
                }
            });
        }
    });

    (addr, captured)
}

/// Start a mock forward proxy that expects CONNECT. On `connect_status` 200
/// it accepts a TLS session for `backend.test` over the tunnel (self-signed
/// cert, the gateway runs with verification off) and answers the in-tunnel
/// request with the canned response; any other status refuses the tunnel.
pub async fn start_connect_proxy(
    connect_status: u16,
    backend_response: Vec<u8>,
) -> (SocketAddr, Captured) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let cap = captured.clone();
    let acceptor = tls_acceptor("backend.test");

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let cap = cap.clone();
            let acceptor = acceptor.clone();
            let backend_response = backend_response.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                let Some(connect_request) = read_request(&mut reader).await else {
                    return;
                };
                cap.lock().unwrap().push(connect_request);
                let mut socket = reader.into_inner();

                if connect_status != 200 {
                    let reply = format!(
                        "HTTP/1.1 {connect_status} Forbidden\r\nContent-Length: 0\r\n\r\n"
                    );
                    let _ = socket.write_all(reply.as_bytes()).await;
                    let _ = socket.shutdown().await;
                    return;
                }

                if socket
                    .write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
                    .await
                    .is_err()
                {
                    return;
                }

                let Ok(tls) = acceptor.accept(socket).await else {
                    return;
                };
                let mut reader = BufReader::new(tls);
                if let Some(request) = read_request(&mut reader).await {
                    cap.lock().unwrap().push(request);
                    let mut tls = reader.into_inner();
                    let _ = tls.write_all(&backend_response).await;
                    let _ = tls.shutdown().await;
                }
            });
        }
    });

    (addr, captured)
}

/// Start a proxy that accepts and reads the request but never answers.
pub async fn start_stalling_proxy() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                let _ = read_request(&mut reader).await;
                // Hold the connection open without ever responding.
                tokio::time::sleep(Duration::from_secs(3600)).await;
                drop(reader);
            });
        }
    });

    addr
}

fn tls_acceptor(hostname: &str) -> tokio_rustls::TlsAcceptor {
    let cert = rcgen::generate_simple_self_signed(vec![hostname.to_string()]).unwrap();
    let cert_der = cert.cert.der().clone();
    let key_der = rustls::pki_types::PrivateKeyDer::Pkcs8(cert.key_pair.serialize_der().into());
    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], key_der)
        .unwrap();
    tokio_rustls::TlsAcceptor::from(Arc::new(config))
}

/// Test configuration pointing at a plaintext mock proxy.
pub fn gateway_config(proxy_addr: SocketAddr, scheme: TargetScheme) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.target = Target {
        scheme,
        hostname: "backend.test".to_string(),
    };
    config.upstream_proxy = UpstreamProxy {
        host: proxy_addr.ip().to_string(),
        port: proxy_addr.port(),
        username: "user".to_string(),
        password: "pass".to_string(),
        tls: false,
        tls_skip_verify: true,
    };
    config.timeouts = TimeoutConfig {
        connect_secs: 2,
        forward_secs: 5,
        request_secs: 8,
    };
    config
}

pub fn scratch_config_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "relay-gateway-it-{tag}-{}.json",
        std::process::id()
    ))
}

/// Spawn a gateway on an ephemeral port. The returned Shutdown handle must
/// stay alive for the duration of the test.
pub async fn spawn_gateway(config: GatewayConfig, tag: &str) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (_config_tx, config_updates) = mpsc::unbounded_channel();
    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();

    let server = GatewayServer::new(config, scratch_config_path(tag));
    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, shutdown_rx).await;
    });

    (addr, shutdown)
}

/// Client with proxying and redirect-following disabled.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

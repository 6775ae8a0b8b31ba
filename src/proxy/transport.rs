//! Upstream proxy transport.
//!
//! Opens a connection to the upstream forward proxy and, depending on the
//! target scheme, either issues absolute-form requests over the proxy link
//! (plain `http` targets) or negotiates a CONNECT tunnel and layers a TLS
//! client on the raw pipe (`https` targets). Responses are drained in full
//! before control returns, so header rewriting downstream always happens
//! before the first byte reaches the caller.

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Method, StatusCode};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::config::{GatewayConfig, Target, TargetScheme, UpstreamProxy};
use crate::proxy::error::{GatewayError, GatewayResult};

/// The backend's reply with the body fully materialized.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

trait ProxyStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> ProxyStream for T {}

/// How the request target is written on the wire.
enum RequestForm {
    /// Absolute-form (`GET http://host/path`), the proxy relays it.
    Absolute,
    /// Origin-form (`GET /path`), used inside a CONNECT tunnel.
    Origin,
}

/// An established channel to the backend, ready for one exchange.
pub struct ProxyChannel {
    stream: BufReader<Box<dyn ProxyStream>>,
    form: RequestForm,
    origin: String,
}

/// Transport to the fixed backend through the upstream forward proxy.
///
/// Built once per configuration snapshot; connections are opened fresh per
/// request, so correctness never depends on reuse.
pub struct ProxyTransport {
    upstream: UpstreamProxy,
    connect_timeout: Duration,
    proxy_tls: Option<TlsConnector>,
    backend_tls: TlsConnector,
    auth: Option<String>,
}

impl ProxyTransport {
    pub fn new(config: &GatewayConfig) -> Self {
        let upstream = config.upstream_proxy.clone();
        Self {
            connect_timeout: Duration::from_secs(config.timeouts.connect_secs),
            proxy_tls: upstream.tls.then(|| tls_connector(upstream.tls_skip_verify)),
            backend_tls: tls_connector(!config.forwarding.backend_tls_verify),
            auth: basic_auth(&upstream),
            upstream,
        }
    }

    /// Open a channel to the backend through the proxy.
    pub async fn connect(&self, target: &Target) -> GatewayResult<ProxyChannel> {
        let host = self.upstream.host.as_str();
        let port = self.upstream.port;

        let tcp = tokio::time::timeout(self.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| {
                GatewayError::UpstreamUnavailable(format!("connect to proxy {host}:{port} timed out"))
            })?
            .map_err(|e| {
                GatewayError::UpstreamUnavailable(format!("connect to proxy {host}:{port}: {e}"))
            })?;
        let _ = tcp.set_nodelay(true);

        let link: Box<dyn ProxyStream> = match &self.proxy_tls {
            Some(connector) => {
                let name = server_name(host)?;
                let tls = connector.connect(name, tcp).await.map_err(|e| {
                    GatewayError::UpstreamUnavailable(format!("TLS handshake with proxy {host}: {e}"))
                })?;
                Box::new(tls)
            }
            None => Box::new(tcp),
        };
        let mut link = BufReader::new(link);

        match target.scheme {
            TargetScheme::Http => Ok(ProxyChannel {
                stream: link,
                form: RequestForm::Absolute,
                origin: target.origin(),
            }),
            TargetScheme::Https => {
                self.establish_tunnel(&mut link, &target.hostname).await?;
                let name = server_name(&target.hostname)?;
                let tls = self.backend_tls.connect(name, link).await.map_err(|e| {
                    GatewayError::UpstreamUnavailable(format!(
                        "TLS handshake with backend {}: {e}",
                        target.hostname
                    ))
                })?;
                Ok(ProxyChannel {
                    stream: BufReader::new(Box::new(tls) as Box<dyn ProxyStream>),
                    form: RequestForm::Origin,
                    origin: target.origin(),
                })
            }
        }
    }

    /// Write one request over the channel and drain the full response.
    pub async fn send(
        &self,
        channel: &mut ProxyChannel,
        method: &Method,
        path_and_query: &str,
        headers: &HeaderMap,
        body: &[u8],
    ) -> GatewayResult<UpstreamResponse> {
        let request_target = match channel.form {
            RequestForm::Absolute => format!("{}{}", channel.origin, path_and_query),
            RequestForm::Origin => path_and_query.to_string(),
        };

        let mut head = Vec::with_capacity(512);
        head.extend_from_slice(format!("{method} {request_target} HTTP/1.1\r\n").as_bytes());
        for (name, value) in headers.iter() {
            // The transport owns body framing.
            if *name == header::CONTENT_LENGTH || *name == header::TRANSFER_ENCODING {
                continue;
            }
            head.extend_from_slice(name.as_str().as_bytes());
            head.extend_from_slice(b": ");
            head.extend_from_slice(value.as_bytes());
            head.extend_from_slice(b"\r\n");
        }
        if matches!(channel.form, RequestForm::Absolute) {
            if let Some(auth) = &self.auth {
                head.extend_from_slice(format!("proxy-authorization: {auth}\r\n").as_bytes());
            }
        }
        if !body.is_empty() || request_has_body(method) {
            head.extend_from_slice(format!("content-length: {}\r\n", body.len()).as_bytes());
        }
        head.extend_from_slice(b"\r\n");

        channel
            .stream
            .write_all(&head)
            .await
            .map_err(|e| io_err("write request", e))?;
        if !body.is_empty() {
            channel
                .stream
                .write_all(body)
                .await
                .map_err(|e| io_err("write request body", e))?;
        }
        channel.stream.flush().await.map_err(|e| io_err("flush request", e))?;

        read_response(&mut channel.stream, method).await
    }

    /// `CONNECT host:443` handshake over the proxy link. Anything but 200 is
    /// a hard failure.
    async fn establish_tunnel(
        &self,
        link: &mut BufReader<Box<dyn ProxyStream>>,
        hostname: &str,
    ) -> GatewayResult<()> {
        let mut request = format!("CONNECT {hostname}:443 HTTP/1.1\r\nHost: {hostname}:443\r\n");
        if let Some(auth) = &self.auth {
            request.push_str(&format!("Proxy-Authorization: {auth}\r\n"));
        }
        request.push_str("\r\n");

        link.write_all(request.as_bytes())
            .await
            .map_err(|e| io_err("write CONNECT", e))?;
        link.flush().await.map_err(|e| io_err("flush CONNECT", e))?;

        let (status, _headers) = read_head(link).await?;
        if status != StatusCode::OK {
            return Err(GatewayError::UpstreamUnavailable(format!(
                "proxy refused CONNECT to {hostname}:443: {status}"
            )));
        }
        Ok(())
    }
}

fn server_name(host: &str) -> GatewayResult<ServerName<'static>> {
    ServerName::try_from(host.to_string())
        .map_err(|_| GatewayError::UpstreamUnavailable(format!("invalid TLS server name {host:?}")))
}

/// Precomputed `Basic` credential for the Proxy-Authorization header. Empty
/// credentials disable proxy auth entirely.
pub(crate) fn basic_auth(upstream: &UpstreamProxy) -> Option<String> {
    if !upstream.has_credentials() {
        return None;
    }
    let credentials = format!("{}:{}", upstream.username, upstream.password);
    Some(format!("Basic {}", BASE64.encode(credentials.as_bytes())))
}

fn request_has_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

fn io_err(context: &str, e: std::io::Error) -> GatewayError {
    GatewayError::UpstreamUnavailable(format!("{context}: {e}"))
}

/// TLS client configuration for either link. With verification skipped, the
/// peer is identified by network address and credentials only.
fn tls_connector(skip_verify: bool) -> TlsConnector {
    let config = if skip_verify {
        rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerify::new()))
            .with_no_client_auth()
    } else {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth()
    };
    TlsConnector::from(Arc::new(config))
}

#[derive(Debug)]
struct NoVerify(Arc<rustls::crypto::CryptoProvider>);

impl NoVerify {
    fn new() -> Self {
        Self(Arc::new(rustls::crypto::ring::default_provider()))
    }
}

impl rustls::client::danger::ServerCertVerifier for NoVerify {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

/// Read a status line plus headers up to the blank line.
async fn read_head<R>(reader: &mut R) -> GatewayResult<(StatusCode, HeaderMap)>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .await
        .map_err(|e| io_err("read status line", e))?;
    if read == 0 {
        return Err(GatewayError::UpstreamUnavailable(
            "connection closed before the status line".to_string(),
        ));
    }

    let status_line = line.trim_end_matches(['\r', '\n']);
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(GatewayError::MalformedUpstreamResponse(format!(
            "bad status line: {status_line:?}"
        )));
    }
    let status = parts
        .next()
        .and_then(|s| s.parse::<u16>().ok())
        .and_then(|c| StatusCode::from_u16(c).ok())
        .ok_or_else(|| {
            GatewayError::MalformedUpstreamResponse(format!("bad status line: {status_line:?}"))
        })?;

    let mut headers = HeaderMap::new();
    loop {
        let mut line = String::new();
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| io_err("read response headers", e))?;
        if read == 0 {
            return Err(GatewayError::UpstreamUnavailable(
                "connection closed while reading headers".to_string(),
            ));
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.trim().as_bytes()),
                HeaderValue::from_str(value.trim()),
            ) {
                headers.append(name, value);
            }
        }
    }

    Ok((status, headers))
}

fn expects_body(method: &Method, status: StatusCode) -> bool {
    if *method == Method::HEAD || status.is_informational() {
        return false;
    }
    status != StatusCode::NO_CONTENT
        && status != StatusCode::RESET_CONTENT
        && status != StatusCode::NOT_MODIFIED
}

fn is_chunked(headers: &HeaderMap) -> bool {
    headers
        .get(header::TRANSFER_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|raw| {
            raw.to_ascii_lowercase()
                .split(',')
                .any(|enc| enc.trim() == "chunked")
        })
        .unwrap_or(false)
}

/// Read one full response: status line, headers, then the body according to
/// Content-Length, chunked coding, or connection close.
pub(crate) async fn read_response<R>(
    reader: &mut R,
    method: &Method,
) -> GatewayResult<UpstreamResponse>
where
    R: AsyncBufRead + Unpin,
{
    let (status, headers) = read_head(reader).await?;

    let body = if !expects_body(method, status) {
        Bytes::new()
    } else if is_chunked(&headers) {
        read_chunked_body(reader).await?
    } else if let Some(value) = headers.get(header::CONTENT_LENGTH) {
        let len: usize = value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(|| {
                GatewayError::MalformedUpstreamResponse(format!(
                    "unparseable Content-Length: {value:?}"
                ))
            })?;
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).await.map_err(|_| {
            GatewayError::UpstreamUnavailable("connection closed mid-body".to_string())
        })?;
        Bytes::from(buf)
    } else {
        // No framing: the body runs until the server closes the connection.
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| io_err("read response body", e))?;
        Bytes::from(buf)
    };

    Ok(UpstreamResponse {
        status,
        headers,
        body,
    })
}

async fn read_chunked_body<R>(reader: &mut R) -> GatewayResult<Bytes>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Vec::new();
    loop {
        let mut size_line = String::new();
        let read = reader
            .read_line(&mut size_line)
            .await
            .map_err(|e| io_err("read chunk size", e))?;
        if read == 0 {
            return Err(GatewayError::UpstreamUnavailable(
                "connection closed mid-body".to_string(),
            ));
        }

        let size_str = size_line.trim_end_matches(['\r', '\n']);
        let size_token = size_str.split(';').next().unwrap_or(size_str).trim();
        let size = usize::from_str_radix(size_token, 16).map_err(|_| {
            GatewayError::MalformedUpstreamResponse(format!("invalid chunk size: {size_token:?}"))
        })?;

        if size == 0 {
            // Trailer section up to the final blank line.
            loop {
                let mut line = String::new();
                let read = reader
                    .read_line(&mut line)
                    .await
                    .map_err(|e| io_err("read chunk trailers", e))?;
                if read == 0 || line.trim_end_matches(['\r', '\n']).is_empty() {
                    break;
                }
            }
            break;
        }

        let mut chunk = vec![0u8; size];
        reader.read_exact(&mut chunk).await.map_err(|_| {
            GatewayError::UpstreamUnavailable("connection closed mid-body".to_string())
        })?;
        body.extend_from_slice(&chunk);

        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf).await.map_err(|_| {
            GatewayError::UpstreamUnavailable("connection closed mid-body".to_string())
        })?;
        if crlf != [b'\r', b'\n'] {
            return Err(GatewayError::MalformedUpstreamResponse(
                "chunk missing CRLF terminator".to_string(),
            ));
        }
    }
    Ok(Bytes::from(body))
}

//! Connection configuration and the HTTP transport.
//!
//! Configuration is resolved in the following order (later overrides earlier):
//! 1. Default values (`https://localhost:8443/exist/xmlrpc`, guest/guest)
//! 2. Builder methods or [`ConnectionConfig::from_url`]
//! 3. Environment variables, when [`ConnectionConfig::apply_env_overrides`] is called

use crate::error::{truncate_body, ClientError};
use crate::tls::{create_insecure_tls_connector, create_tls_connector, server_name};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use existrpc_protocol::{CONTENT_TYPE, DEFAULT_XMLRPC_PATH};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::client::conn::http1;
use hyper::header::{
    AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE as CONTENT_TYPE_HEADER, HOST, USER_AGENT,
};
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

/// Default port when none is configured.
pub const DEFAULT_PORT: u16 = 8443;

/// Default cap on a response body (64 MiB).
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 64 * 1024 * 1024;

/// Environment variable holding the server URL (`https://host:port`).
pub const ENV_SERVER: &str = "EXISTDB_SERVER";
/// Environment variable holding the user name.
pub const ENV_USER: &str = "EXISTDB_USER";
/// Environment variable holding the password.
pub const ENV_PASS: &str = "EXISTDB_PASS";

/// HTTP basic auth credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub user: String,
    pub pass: String,
}

impl BasicAuth {
    pub fn new(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            pass: pass.into(),
        }
    }

    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> String {
        format!(
            "Basic {}",
            STANDARD.encode(format!("{}:{}", self.user, self.pass))
        )
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}

/// TLS settings for HTTPS endpoints.
#[derive(Debug, Clone, Default)]
pub struct TlsClientConfig {
    /// Path to PEM-encoded CA certificate(s) for server verification.
    /// If None, the bundled web PKI roots are used.
    pub ca_cert_path: Option<PathBuf>,
    /// Server name for SNI (defaults to the host).
    pub server_name: Option<String>,
}

impl TlsClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }
}

/// Connection configuration: one endpoint, fixed credentials.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Host name or address; IPv6 literals in brackets (`[::1]`).
    pub host: String,
    /// Port; None means the scheme default (443 or 80).
    pub port: Option<u16>,
    /// Request path of the XML-RPC endpoint.
    pub path: String,
    /// Use HTTPS.
    pub secure: bool,
    /// Credentials sent with every call.
    pub basic_auth: Option<BasicAuth>,
    /// Explicit certificate verification override.
    pub reject_unauthorized: Option<bool>,
    /// TCP connect (and TLS handshake) timeout.
    pub connect_timeout: Duration,
    /// Timeout for one full request/response exchange.
    pub request_timeout: Duration,
    /// Largest response body accepted, in bytes.
    pub max_response_size: usize,
    pub user_agent: String,
    pub tls: TlsClientConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: Some(DEFAULT_PORT),
            path: DEFAULT_XMLRPC_PATH.to_string(),
            secure: true,
            basic_auth: Some(BasicAuth::new("guest", "guest")),
            reject_unauthorized: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            user_agent: concat!("existrpc/", env!("CARGO_PKG_VERSION")).to_string(),
            tls: TlsClientConfig::default(),
        }
    }
}

impl ConnectionConfig {
    /// Default configuration for the given host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Parses an endpoint URL such as `https://db.example.com:8443/exist/xmlrpc`.
    ///
    /// A URL without a path (or with `/`) keeps the default endpoint path.
    pub fn from_url(endpoint: &str) -> Result<Self, ClientError> {
        let mut config = Self::default();
        let url = config.apply_server_url(endpoint)?;
        if !matches!(url.path(), "" | "/") {
            config.path = url.path().to_string();
        }
        Ok(config)
    }

    /// Defaults overridden by the environment.
    pub fn from_env() -> Result<Self, ClientError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Applies `EXISTDB_SERVER`, `EXISTDB_USER` and `EXISTDB_PASS`.
    pub fn apply_env_overrides(&mut self) -> Result<(), ClientError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from any key lookup.
    ///
    /// The server URL sets scheme, host and port only. Credentials change
    /// only when a non-empty user and a password are both present.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(server) = lookup(ENV_SERVER) {
            self.apply_server_url(&server)?;
        }

        if let (Some(user), Some(pass)) = (lookup(ENV_USER), lookup(ENV_PASS)) {
            if !user.is_empty() {
                self.basic_auth = Some(BasicAuth::new(user, pass));
            }
        }

        Ok(())
    }

    fn apply_server_url(&mut self, server: &str) -> Result<url::Url, ClientError> {
        let url = url::Url::parse(server).map_err(|e| {
            ClientError::InvalidConfig(format!("invalid server URL {:?}: {}", server, e))
        })?;

        self.secure = match url.scheme() {
            "https" => true,
            "http" => false,
            other => {
                return Err(ClientError::InvalidConfig(format!(
                    "unknown protocol: {:?}",
                    other
                )))
            }
        };
        self.host = url
            .host_str()
            .ok_or_else(|| ClientError::InvalidConfig(format!("no host in {:?}", server)))?
            .to_string();
        self.port = url.port();

        Ok(url)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_basic_auth(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.basic_auth = Some(BasicAuth::new(user, pass));
        self
    }

    pub fn without_auth(mut self) -> Self {
        self.basic_auth = None;
        self
    }

    pub fn with_reject_unauthorized(mut self, reject: bool) -> Self {
        self.reject_unauthorized = Some(reject);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_response_size(mut self, bytes: usize) -> Self {
        self.max_response_size = bytes;
        self
    }

    pub fn with_tls(mut self, tls: TlsClientConfig) -> Self {
        self.tls = tls;
        self
    }

    /// Returns whether the host is a loopback name or address.
    pub fn is_loopback(&self) -> bool {
        matches!(
            self.host.as_str(),
            "localhost" | "127.0.0.1" | "[::1]" | "::1"
        )
    }

    /// Returns whether server certificates are verified.
    ///
    /// An explicit `reject_unauthorized` wins. Otherwise verification is
    /// relaxed only for TLS connections to a loopback host.
    pub fn verifies_certificates(&self) -> bool {
        self.reject_unauthorized
            .unwrap_or(!(self.secure && self.is_loopback()))
    }

    /// Port to connect to, falling back to the scheme default.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.secure { 443 } else { 80 })
    }

    /// `Host` header value.
    pub fn authority(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }

    /// Full endpoint URL, for logs and diagnostics.
    pub fn endpoint(&self) -> String {
        format!(
            "{}://{}{}",
            if self.secure { "https" } else { "http" },
            self.authority(),
            self.path
        )
    }
}

/// Carries one encoded request body to the server and returns the response body.
///
/// Implementations perform exactly one round trip per call and never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, body: Bytes) -> Result<Bytes, ClientError>;
}

/// HTTP(S) transport for one configured endpoint.
///
/// Holds only configuration, so it can be shared across concurrent calls.
/// Each call opens its own connection.
pub struct Connection {
    config: ConnectionConfig,
    tls: Option<TlsConnector>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.config.endpoint())
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

impl Connection {
    /// Creates a transport, building the TLS connector up front.
    pub fn new(config: ConnectionConfig) -> Result<Self, ClientError> {
        if !config.is_loopback() {
            if !config.secure {
                tracing::warn!(
                    "Connecting to remote host {} using an unencrypted channel",
                    config.host
                );
            }
            if config.reject_unauthorized == Some(false) {
                tracing::warn!(
                    "Connecting to remote host {} allowing invalid certificates",
                    config.host
                );
            }
        }

        let tls = if config.secure {
            if config.verifies_certificates() {
                Some(create_tls_connector(&config.tls)?)
            } else {
                tracing::debug!("TLS certificate verification disabled for {}", config.host);
                Some(create_insecure_tls_connector())
            }
        } else {
            None
        };

        Ok(Self { config, tls })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// POSTs `body` to the endpoint and returns the response body.
    ///
    /// Non-2xx statuses are errors. The whole exchange is bounded by the
    /// request timeout.
    pub async fn exchange(&self, body: Bytes) -> Result<Bytes, ClientError> {
        let host = self
            .config
            .host
            .trim_start_matches('[')
            .trim_end_matches(']');
        let port = self.config.effective_port();

        tracing::debug!("Connecting to {}:{}...", host, port);
        let connect = TcpStream::connect((host, port));
        let tcp = tokio::time::timeout(self.config.connect_timeout, connect)
            .await
            .map_err(|_| {
                tracing::debug!("Connection timeout");
                ClientError::Timeout
            })?
            .map_err(|e| {
                tracing::debug!("Connection failed: {}", e);
                ClientError::Io(e)
            })?;
        tcp.set_nodelay(true).ok();

        let request_timeout = self.config.request_timeout;
        let result = match self.tls {
            Some(ref connector) => {
                let name = server_name(&self.config.tls, &self.config.host)?;
                let stream = tokio::time::timeout(
                    self.config.connect_timeout,
                    connector.connect(name, tcp),
                )
                .await
                .map_err(|_| ClientError::Timeout)?
                .map_err(|e| ClientError::TlsHandshake(e.to_string()))?;
                tracing::debug!("TLS handshake complete");
                tokio::time::timeout(request_timeout, self.send(stream, body)).await
            }
            None => tokio::time::timeout(request_timeout, self.send(tcp, body)).await,
        };

        result.map_err(|_| {
            tracing::debug!("Request to {} timed out", self.config.endpoint());
            ClientError::Timeout
        })?
    }

    /// Runs one HTTP/1.1 exchange over an established stream.
    ///
    /// The connection driver is polled alongside the request instead of
    /// being spawned.
    async fn send<S>(&self, stream: S, body: Bytes) -> Result<Bytes, ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sender, conn) = http1::handshake(TokioIo::new(stream)).await?;

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(self.config.path.as_str())
            .header(HOST, self.config.authority())
            .header(USER_AGENT, self.config.user_agent.as_str())
            .header(CONTENT_TYPE_HEADER, CONTENT_TYPE)
            .header(CONTENT_LENGTH, body.len());
        if let Some(ref auth) = self.config.basic_auth {
            builder = builder.header(AUTHORIZATION, auth.header_value());
        }
        let request = builder
            .body(Full::new(body))
            .map_err(|e| ClientError::InvalidConfig(e.to_string()))?;

        let limit = self.config.max_response_size;
        let exchange = async move {
            let response = sender.send_request(request).await?;
            let status = response.status();
            let body = Limited::new(response.into_body(), limit)
                .collect()
                .await
                .map_err(|e| body_error(e, limit))?
                .to_bytes();
            Ok::<_, ClientError>((status, body))
        };
        tokio::pin!(exchange);
        tokio::pin!(conn);

        let (status, body) = tokio::select! {
            biased;
            res = &mut exchange => res?,
            res = &mut conn => {
                res?;
                exchange.await?
            }
        };

        tracing::debug!("Response status {} ({} bytes)", status, body.len());
        if !status.is_success() {
            return Err(ClientError::HttpStatus {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }
        Ok(body)
    }
}

fn body_error(err: Box<dyn std::error::Error + Send + Sync>, limit: usize) -> ClientError {
    if err.is::<LengthLimitError>() {
        return ClientError::ResponseTooLarge { limit };
    }
    match err.downcast::<hyper::Error>() {
        Ok(e) => ClientError::Http(*e),
        Err(other) => ClientError::Io(std::io::Error::new(std::io::ErrorKind::Other, other)),
    }
}

#[async_trait]
impl Transport for Connection {
    async fn post(&self, body: Bytes) -> Result<Bytes, ClientError> {
        self.exchange(body).await
    }
}

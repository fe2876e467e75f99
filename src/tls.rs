// Copyright 2026 The fastnet Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! TLS overlay. `SslServer` and `SslClient` conform to the plain TCP
//! contract; sessions behind them are ordinary [`Session`]s whose stream
//! happens to be encrypted.

use std::fs::File;
use std::io;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tokio_rustls::rustls;
use tokio_rustls::rustls::Certificate;
use tokio_rustls::rustls::ClientConfig;
use tokio_rustls::rustls::OwnedTrustAnchor;
use tokio_rustls::rustls::PrivateKey;
use tokio_rustls::rustls::RootCertStore;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::TlsConnector;

use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::session::Session;
use crate::session::SessionHandler;
use crate::session::SessionId;
use crate::tcp::ClientOptions;
use crate::tcp::ServerCore;
use crate::tcp::ServerOptions;
use crate::tcp::ServerState;
use crate::tcp::StreamAcceptor;
use crate::tcp::TcpClient;
use crate::tcp::TlsConnect;

/// Certificate/key context consumed by the TLS server and client variants.
pub struct SslContext {
  acceptor: Option<TlsAcceptor>,
  connector: Option<TlsConnector>,
}

impl SslContext {
  /// Server-side context from PEM-encoded certificate chain and private key
  /// files. PKCS#8, RSA and SEC1 keys are accepted.
  pub fn server_from_pem(
    cert_chain: impl AsRef<Path>,
    private_key: impl AsRef<Path>,
  ) -> Result<Self, Error> {
    let certs = load_certs(cert_chain.as_ref())?;
    let key = load_key(private_key.as_ref())?;
    let config = ServerConfig::builder()
      .with_safe_defaults()
      .with_no_client_auth()
      .with_single_cert(certs, key)?;
    Ok(SslContext {
      acceptor: Some(TlsAcceptor::from(Arc::new(config))),
      connector: None,
    })
  }

  /// Client-side context trusting the bundled webpki roots.
  pub fn client() -> Self {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.0.iter().map(
      |anchor| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
          anchor.subject,
          anchor.spki,
          anchor.name_constraints,
        )
      },
    ));
    Self::client_with_roots(roots)
  }

  /// Client-side context trusting a caller-supplied PEM CA bundle, for
  /// self-signed deployments.
  pub fn client_from_pem(ca_bundle: impl AsRef<Path>) -> Result<Self, Error> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(ca_bundle.as_ref())? {
      roots.add(&cert)?;
    }
    Ok(Self::client_with_roots(roots))
  }

  fn client_with_roots(roots: RootCertStore) -> Self {
    let config = ClientConfig::builder()
      .with_safe_defaults()
      .with_root_certificates(roots)
      .with_no_client_auth();
    SslContext {
      acceptor: None,
      connector: Some(TlsConnector::from(Arc::new(config))),
    }
  }

  fn require_acceptor(&self) -> Result<TlsAcceptor, Error> {
    self.acceptor.clone().ok_or(Error::InvalidState)
  }

  pub(crate) fn require_connector(&self) -> Result<TlsConnector, Error> {
    self.connector.clone().ok_or(Error::InvalidState)
  }
}

fn load_certs(path: &Path) -> Result<Vec<Certificate>, Error> {
  let mut reader = BufReader::new(File::open(path)?);
  let certs = rustls_pemfile::certs(&mut reader)?;
  if certs.is_empty() {
    return Err(Error::Io(io::Error::new(
      io::ErrorKind::InvalidInput,
      format!("no certificates in {}", path.display()),
    )));
  }
  Ok(certs.into_iter().map(Certificate).collect())
}

fn load_key(path: &Path) -> Result<PrivateKey, Error> {
  let mut reader = BufReader::new(File::open(path)?);
  while let Some(item) = rustls_pemfile::read_one(&mut reader)? {
    match item {
      rustls_pemfile::Item::PKCS8Key(key)
      | rustls_pemfile::Item::RSAKey(key)
      | rustls_pemfile::Item::ECKey(key) => return Ok(PrivateKey(key)),
      _ => continue,
    }
  }
  Err(Error::Io(io::Error::new(
    io::ErrorKind::InvalidInput,
    format!("no private key in {}", path.display()),
  )))
}

/// Maps a TLS I/O failure onto [`Error::Tls`] when the underlying rustls
/// error is recoverable from the wrapper, [`Error::Io`] otherwise.
pub(crate) fn tls_io_error(err: io::Error) -> Error {
  let kind = err.kind();
  match err.into_inner() {
    Some(inner) => match inner.downcast::<rustls::Error>() {
      Ok(tls) => Error::Tls(*tls),
      Err(other) => Error::Io(io::Error::new(kind, other)),
    },
    None => Error::Io(io::Error::from(kind)),
  }
}

/// TLS server: the TCP accept loop followed by a TLS handshake on every
/// accepted stream. Failed handshakes are logged and never become sessions.
pub struct SslServer {
  core: Arc<ServerCore>,
}

impl SslServer {
  pub fn new<E, F>(
    endpoint: E,
    context: &SslContext,
    factory: F,
  ) -> Result<Self, Error>
  where
    E: Into<Endpoint>,
    F: Fn() -> Box<dyn SessionHandler> + Send + Sync + 'static,
  {
    Self::with_options(endpoint, ServerOptions::default(), context, factory)
  }

  pub fn with_options<E, F>(
    endpoint: E,
    options: ServerOptions,
    context: &SslContext,
    factory: F,
  ) -> Result<Self, Error>
  where
    E: Into<Endpoint>,
    F: Fn() -> Box<dyn SessionHandler> + Send + Sync + 'static,
  {
    let acceptor = context.require_acceptor()?;
    Ok(SslServer {
      core: ServerCore::new(
        endpoint.into(),
        options,
        StreamAcceptor::Tls(acceptor),
        Box::new(factory),
      ),
    })
  }

  pub async fn start(&self) -> Result<(), Error> {
    self.core.start().await
  }

  pub async fn stop(&self) -> Result<(), Error> {
    self.core.stop().await
  }

  pub async fn restart(&self) -> Result<(), Error> {
    self.core.restart().await
  }

  pub fn state(&self) -> ServerState {
    self.core.state()
  }

  pub fn is_started(&self) -> bool {
    self.core.state() == ServerState::Started
  }

  pub fn local_addr(&self) -> Option<SocketAddr> {
    self.core.local_addr()
  }

  pub fn endpoint(&self) -> &Endpoint {
    self.core.endpoint()
  }

  pub fn multicast(&self, data: &[u8]) -> usize {
    self.core.multicast(data)
  }

  pub fn find_session(&self, id: SessionId) -> Option<Arc<Session>> {
    self.core.find_session(id)
  }

  pub fn connected_sessions(&self) -> usize {
    self.core.connected_sessions()
  }

  pub async fn disconnect_all(&self) {
    self.core.disconnect_all().await
  }
}

/// TLS client. The endpoint host doubles as the SNI name unless overridden.
pub struct SslClient {
  inner: TcpClient,
}

impl SslClient {
  pub fn new(
    endpoint: impl Into<Endpoint>,
    context: &SslContext,
  ) -> Result<Self, Error> {
    Self::with_options(endpoint, ClientOptions::default(), context)
  }

  pub fn with_options(
    endpoint: impl Into<Endpoint>,
    options: ClientOptions,
    context: &SslContext,
  ) -> Result<Self, Error> {
    let endpoint = endpoint.into();
    let connector = context.require_connector()?;
    let domain = endpoint.host().to_string();
    Ok(SslClient {
      inner: TcpClient::with_tls(
        endpoint,
        options,
        TlsConnect { connector, domain },
      ),
    })
  }

  pub fn endpoint(&self) -> &Endpoint {
    self.inner.endpoint()
  }

  pub async fn connect(
    &self,
    handler: Box<dyn SessionHandler>,
  ) -> Result<Arc<Session>, Error> {
    self.inner.connect(handler).await
  }

  pub fn connect_async(&self, handler: Box<dyn SessionHandler>) -> bool {
    self.inner.connect_async(handler)
  }

  pub fn session(&self) -> Option<Arc<Session>> {
    self.inner.session()
  }

  pub fn is_connected(&self) -> bool {
    self.inner.is_connected()
  }

  pub async fn send(&self, data: &[u8]) -> usize {
    self.inner.send(data).await
  }

  pub fn send_async(&self, data: &[u8]) -> bool {
    self.inner.send_async(data)
  }

  pub async fn disconnect(&self) -> bool {
    self.inner.disconnect().await
  }

  pub fn disconnect_async(&self) -> bool {
    self.inner.disconnect_async()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn client_context_has_no_acceptor() {
    let context = SslContext::client();
    assert!(context.require_acceptor().is_err());
    assert!(context.require_connector().is_ok());
  }

  #[test]
  fn missing_cert_file_is_io_error() {
    let result =
      SslContext::server_from_pem("/nonexistent/cert.pem", "/nonexistent/key.pem");
    match result {
      Err(Error::Io(_)) => {}
      other => panic!("expected io error, got {:?}", other.map(|_| ())),
    }
  }
}

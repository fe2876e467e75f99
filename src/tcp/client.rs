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

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use log::warn;
use socket2::SockRef;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_rustls::rustls::ServerName;
use tokio_rustls::TlsConnector;

use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::session;
use crate::session::BoxedStream;
use crate::session::Session;
use crate::session::SessionHandler;
use crate::session::SessionState;
use crate::session::DEFAULT_RECV_BUFFER_SIZE;
use crate::tcp::server::configure_stream;
use crate::tls::tls_io_error;

/// Socket options applied to the outbound stream after connect.
#[derive(Clone, Debug, Default)]
pub struct ClientOptions {
  pub no_delay: bool,
  pub keep_alive: bool,
  pub keep_alive_time: Option<Duration>,
  pub keep_alive_interval: Option<Duration>,
  pub keep_alive_retries: Option<u32>,
  pub receive_buffer_size: Option<usize>,
  pub send_buffer_size: Option<usize>,
}

#[derive(Clone)]
pub(crate) struct TlsConnect {
  pub(crate) connector: TlsConnector,
  pub(crate) domain: String,
}

type SessionSlot = Arc<Mutex<Option<Arc<Session>>>>;

/// Outbound counterpart to a server session: same I/O contract, one peer.
///
/// Reconnection is caller policy; after a disconnect the client can
/// `connect` again with a fresh handler.
pub struct TcpClient {
  endpoint: Endpoint,
  options: ClientOptions,
  tls: Option<TlsConnect>,
  session: SessionSlot,
}

impl TcpClient {
  pub fn new(endpoint: impl Into<Endpoint>) -> Self {
    Self::with_options(endpoint, ClientOptions::default())
  }

  pub fn with_options(
    endpoint: impl Into<Endpoint>,
    options: ClientOptions,
  ) -> Self {
    TcpClient {
      endpoint: endpoint.into(),
      options,
      tls: None,
      session: Arc::new(Mutex::new(None)),
    }
  }

  pub(crate) fn with_tls(
    endpoint: impl Into<Endpoint>,
    options: ClientOptions,
    tls: TlsConnect,
  ) -> Self {
    TcpClient {
      endpoint: endpoint.into(),
      options,
      tls: Some(tls),
      session: Arc::new(Mutex::new(None)),
    }
  }

  pub fn endpoint(&self) -> &Endpoint {
    &self.endpoint
  }

  /// Connects and runs the session until it disconnects. Resolves once the
  /// session reached `Connected`; the returned handle is also available
  /// through [`TcpClient::session`].
  pub async fn connect(
    &self,
    handler: Box<dyn SessionHandler>,
  ) -> Result<Arc<Session>, Error> {
    if self.is_connected() {
      return Err(Error::InvalidState);
    }
    connect_inner(
      self.endpoint.clone(),
      self.options.clone(),
      self.tls.clone(),
      self.session.clone(),
      handler,
    )
    .await
  }

  /// Starts the connect in the background. Connection errors are reported to
  /// the log only; hosts that need them use [`TcpClient::connect`].
  pub fn connect_async(&self, handler: Box<dyn SessionHandler>) -> bool {
    if self.is_connected() {
      return false;
    }
    let endpoint = self.endpoint.clone();
    let options = self.options.clone();
    let tls = self.tls.clone();
    let slot = self.session.clone();
    tokio::spawn(async move {
      if let Err(err) =
        connect_inner(endpoint.clone(), options, tls, slot, handler).await
      {
        warn!("connect to {} failed: {}", endpoint, err);
      }
    });
    true
  }

  pub fn session(&self) -> Option<Arc<Session>> {
    self.session.lock().unwrap().clone()
  }

  pub fn is_connected(&self) -> bool {
    self
      .session()
      .map(|session| session.is_connected())
      .unwrap_or(false)
  }

  pub async fn send(&self, data: &[u8]) -> usize {
    match self.session() {
      Some(session) => session.send(data).await,
      None => 0,
    }
  }

  pub fn send_async(&self, data: &[u8]) -> bool {
    match self.session() {
      Some(session) => session.send_async(data),
      None => false,
    }
  }

  pub async fn disconnect(&self) -> bool {
    match self.session() {
      Some(session) => session.disconnect().await,
      None => false,
    }
  }

  pub fn disconnect_async(&self) -> bool {
    match self.session() {
      Some(session) => session.disconnect_async(),
      None => false,
    }
  }
}

async fn connect_inner(
  endpoint: Endpoint,
  options: ClientOptions,
  tls: Option<TlsConnect>,
  slot: SessionSlot,
  handler: Box<dyn SessionHandler>,
) -> Result<Arc<Session>, Error> {
  let addr = endpoint.resolve().await?;
  let stream = TcpStream::connect(addr).await?;
  configure_stream(
    &stream,
    options.no_delay,
    options.keep_alive,
    options.keep_alive_time,
    options.keep_alive_interval,
    options.keep_alive_retries,
  )?;
  if let Some(size) = options.receive_buffer_size {
    SockRef::from(&stream).set_recv_buffer_size(size)?;
  }
  if let Some(size) = options.send_buffer_size {
    SockRef::from(&stream).set_send_buffer_size(size)?;
  }
  let local = stream.local_addr()?;
  let peer = stream.peer_addr()?;

  let stream: BoxedStream = match &tls {
    None => Box::new(stream),
    Some(tls) => {
      let name = ServerName::try_from(tls.domain.as_str())
        .map_err(|_| Error::Dns(tls.domain.clone()))?;
      match tls.connector.connect(name, stream).await {
        Ok(stream) => Box::new(stream),
        Err(err) => return Err(tls_io_error(err)),
      }
    }
  };

  let (session, rx) = Session::new(local, peer);
  *slot.lock().unwrap() = Some(session.clone());
  let (ready, connected) = oneshot::channel();
  let recv_buffer = options
    .receive_buffer_size
    .unwrap_or(DEFAULT_RECV_BUFFER_SIZE);
  tokio::spawn(session::run(
    session.clone(),
    stream,
    rx,
    handler,
    None,
    recv_buffer,
    Some(ready),
  ));
  let _ = connected.await;
  debug_assert_ne!(session.state(), SessionState::Created);
  Ok(session)
}

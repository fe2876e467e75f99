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

use std::net::SocketAddr;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use log::debug;
use log::info;
use log::trace;
use log::warn;
use socket2::Domain;
use socket2::Protocol;
use socket2::SockAddr;
use socket2::SockRef;
use socket2::Socket;
use socket2::TcpKeepalive;
use socket2::Type;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::session;
use crate::session::BoxedStream;
use crate::session::Session;
use crate::session::SessionHandler;
use crate::session::SessionId;
use crate::session::SessionMap;
use crate::session::DEFAULT_RECV_BUFFER_SIZE;
use crate::tls::tls_io_error;

/// Listener socket options, applied on `start` and to every accepted stream.
#[derive(Clone, Debug)]
pub struct ServerOptions {
  /// Disable Nagle's algorithm on accepted streams.
  pub no_delay: bool,
  pub keep_alive: bool,
  pub keep_alive_time: Option<Duration>,
  pub keep_alive_interval: Option<Duration>,
  pub keep_alive_retries: Option<u32>,
  pub reuse_address: bool,
  /// Windows-only exclusive binding; ignored elsewhere.
  pub exclusive_address_use: bool,
  /// Accept both IPv4 and IPv6 on an IPv6 endpoint.
  pub dual_mode: bool,
  /// OS receive buffer and the per-read chunk handed to `on_received`.
  pub receive_buffer_size: Option<usize>,
  pub send_buffer_size: Option<usize>,
  pub acceptor_backlog: i32,
}

impl Default for ServerOptions {
  fn default() -> Self {
    ServerOptions {
      no_delay: false,
      keep_alive: false,
      keep_alive_time: None,
      keep_alive_interval: None,
      keep_alive_retries: None,
      reuse_address: false,
      exclusive_address_use: false,
      dual_mode: false,
      receive_buffer_size: None,
      send_buffer_size: None,
      acceptor_backlog: 1024,
    }
  }
}

/// Server lifecycle. Restartable: `Stopped` permits a new `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerState {
  Created = 0,
  Starting = 1,
  Started = 2,
  Stopping = 3,
  Stopped = 4,
}

impl ServerState {
  fn from_u8(value: u8) -> Self {
    match value {
      0 => ServerState::Created,
      1 => ServerState::Starting,
      2 => ServerState::Started,
      3 => ServerState::Stopping,
      _ => ServerState::Stopped,
    }
  }
}

/// Upgrades an accepted TCP stream into the stream a session runs over.
#[derive(Clone)]
pub(crate) enum StreamAcceptor {
  Plain,
  Tls(TlsAcceptor),
}

impl StreamAcceptor {
  async fn accept(&self, stream: TcpStream) -> Result<BoxedStream, Error> {
    match self {
      StreamAcceptor::Plain => Ok(Box::new(stream)),
      StreamAcceptor::Tls(acceptor) => match acceptor.accept(stream).await {
        Ok(stream) => Ok(Box::new(stream)),
        Err(err) => Err(tls_io_error(err)),
      },
    }
  }
}

type SessionFactory = Box<dyn Fn() -> Box<dyn SessionHandler> + Send + Sync>;

/// Shared accept machinery behind `TcpServer` and `SslServer`.
pub(crate) struct ServerCore {
  endpoint: Endpoint,
  options: ServerOptions,
  state: AtomicU8,
  sessions: SessionMap,
  factory: SessionFactory,
  acceptor: StreamAcceptor,
  stop: Notify,
  task: Mutex<Option<JoinHandle<()>>>,
  bound: Mutex<Option<SocketAddr>>,
}

impl ServerCore {
  pub(crate) fn new(
    endpoint: Endpoint,
    options: ServerOptions,
    acceptor: StreamAcceptor,
    factory: SessionFactory,
  ) -> Arc<Self> {
    Arc::new(ServerCore {
      endpoint,
      options,
      state: AtomicU8::new(ServerState::Created as u8),
      sessions: Arc::new(DashMap::new()),
      factory,
      acceptor,
      stop: Notify::new(),
      task: Mutex::new(None),
      bound: Mutex::new(None),
    })
  }

  pub(crate) fn state(&self) -> ServerState {
    ServerState::from_u8(self.state.load(Ordering::Acquire))
  }

  fn transition(&self, from: &[ServerState], to: ServerState) -> bool {
    loop {
      let current = self.state.load(Ordering::Acquire);
      if !from.contains(&ServerState::from_u8(current)) {
        return false;
      }
      let exchanged = self.state.compare_exchange(
        current,
        to as u8,
        Ordering::AcqRel,
        Ordering::Acquire,
      );
      if exchanged.is_ok() {
        return true;
      }
    }
  }

  pub(crate) async fn start(self: &Arc<Self>) -> Result<(), Error> {
    if !self.transition(
      &[ServerState::Created, ServerState::Stopped],
      ServerState::Starting,
    ) {
      return Err(Error::InvalidState);
    }

    let listener = match self.bind().await {
      Ok(listener) => listener,
      Err(err) => {
        self.state.store(ServerState::Stopped as u8, Ordering::Release);
        return Err(err);
      }
    };

    let local = listener.local_addr()?;
    *self.bound.lock().unwrap() = Some(local);
    info!("server listening on {}", local);

    let core = self.clone();
    let handle = tokio::spawn(async move {
      core.accept_loop(listener).await;
    });
    *self.task.lock().unwrap() = Some(handle);
    self.state.store(ServerState::Started as u8, Ordering::Release);
    Ok(())
  }

  pub(crate) async fn stop(&self) -> Result<(), Error> {
    if !self.transition(&[ServerState::Started], ServerState::Stopping) {
      return Err(Error::InvalidState);
    }
    self.stop.notify_one();
    let handle = self.task.lock().unwrap().take();
    if let Some(handle) = handle {
      let _ = handle.await;
    }
    self.disconnect_all().await;
    self.state.store(ServerState::Stopped as u8, Ordering::Release);
    info!("server on {} stopped", self.endpoint);
    Ok(())
  }

  pub(crate) async fn restart(self: &Arc<Self>) -> Result<(), Error> {
    self.stop().await?;
    self.start().await
  }

  async fn bind(&self) -> Result<TcpListener, Error> {
    let addr = self.endpoint.resolve().await?;
    let socket =
      Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    if addr.is_ipv6() && self.options.dual_mode {
      socket.set_only_v6(false)?;
    }
    if self.options.reuse_address {
      socket.set_reuse_address(true)?;
    }
    #[cfg(windows)]
    if self.options.exclusive_address_use {
      socket.set_exclusiveaddruse(true)?;
    }
    if let Some(size) = self.options.receive_buffer_size {
      socket.set_recv_buffer_size(size)?;
    }
    if let Some(size) = self.options.send_buffer_size {
      socket.set_send_buffer_size(size)?;
    }
    socket.set_nonblocking(true)?;
    socket.bind(&SockAddr::from(addr))?;
    socket.listen(self.options.acceptor_backlog)?;
    Ok(TcpListener::from_std(socket.into())?)
  }

  async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
    loop {
      tokio::select! {
        _ = self.stop.notified() => break,
        accepted = listener.accept() => match accepted {
          Ok((stream, peer)) => self.spawn_session(stream, peer),
          Err(err) => warn!("accept error: {}", err),
        },
      }
    }
  }

  fn spawn_session(self: &Arc<Self>, stream: TcpStream, peer: SocketAddr) {
    if let Err(err) = configure_accepted(&stream, &self.options) {
      warn!("failed to configure stream from {}: {}", peer, err);
    }
    let local = stream
      .local_addr()
      .ok()
      .or_else(|| self.local_addr())
      .unwrap_or(peer);
    let handler = (self.factory)();
    let acceptor = self.acceptor.clone();
    let sessions = self.sessions.clone();
    let recv_buffer = self
      .options
      .receive_buffer_size
      .unwrap_or(DEFAULT_RECV_BUFFER_SIZE);

    tokio::spawn(async move {
      let stream = match acceptor.accept(stream).await {
        Ok(stream) => stream,
        Err(err) => {
          debug!("handshake with {} failed: {}", peer, err);
          return;
        }
      };
      let (session, rx) = Session::new(local, peer);
      trace!("session {} accepted from {}", session.id(), peer);
      session::run(
        session,
        stream,
        rx,
        handler,
        Some(sessions),
        recv_buffer,
        None,
      )
      .await;
    });
  }

  pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
    *self.bound.lock().unwrap()
  }

  pub(crate) fn endpoint(&self) -> &Endpoint {
    &self.endpoint
  }

  pub(crate) fn options(&self) -> &ServerOptions {
    &self.options
  }

  /// Fans `data` out to every connected session. Iteration takes the map's
  /// consistent snapshot view, so concurrent accepts and disconnects are
  /// safe. Returns the number of sessions that accepted the bytes.
  pub(crate) fn multicast(&self, data: &[u8]) -> usize {
    let mut accepted = 0;
    for entry in self.sessions.iter() {
      if entry.value().send_async(data) {
        accepted += 1;
      }
    }
    accepted
  }

  pub(crate) fn find_session(&self, id: SessionId) -> Option<Arc<Session>> {
    self.sessions.get(&id).map(|entry| entry.value().clone())
  }

  pub(crate) fn connected_sessions(&self) -> usize {
    self.sessions.len()
  }

  pub(crate) async fn disconnect_all(&self) {
    let snapshot: Vec<Arc<Session>> = self
      .sessions
      .iter()
      .map(|entry| entry.value().clone())
      .collect();
    for session in snapshot {
      session.disconnect().await;
    }
  }
}

fn configure_accepted(
  stream: &TcpStream,
  options: &ServerOptions,
) -> std::io::Result<()> {
  configure_stream(
    stream,
    options.no_delay,
    options.keep_alive,
    options.keep_alive_time,
    options.keep_alive_interval,
    options.keep_alive_retries,
  )
}

pub(crate) fn configure_stream(
  stream: &TcpStream,
  no_delay: bool,
  keep_alive: bool,
  time: Option<Duration>,
  interval: Option<Duration>,
  retries: Option<u32>,
) -> std::io::Result<()> {
  if no_delay {
    stream.set_nodelay(true)?;
  }
  if keep_alive {
    let mut params = TcpKeepalive::new();
    if let Some(time) = time {
      params = params.with_time(time);
    }
    if let Some(interval) = interval {
      params = params.with_interval(interval);
    }
    #[cfg(not(windows))]
    if let Some(retries) = retries {
      params = params.with_retries(retries);
    }
    #[cfg(windows)]
    let _ = retries;
    SockRef::from(stream).set_tcp_keepalive(&params)?;
  }
  Ok(())
}

/// Accepts TCP connections and owns the table of live sessions.
///
/// Each accepted peer gets a fresh handler from the factory (the
/// `create_session` hook) and its own I/O task. A session is present in the
/// table exactly while it is connected.
pub struct TcpServer {
  core: Arc<ServerCore>,
}

impl TcpServer {
  pub fn new<E, F>(endpoint: E, factory: F) -> Self
  where
    E: Into<Endpoint>,
    F: Fn() -> Box<dyn SessionHandler> + Send + Sync + 'static,
  {
    Self::with_options(endpoint, ServerOptions::default(), factory)
  }

  pub fn with_options<E, F>(
    endpoint: E,
    options: ServerOptions,
    factory: F,
  ) -> Self
  where
    E: Into<Endpoint>,
    F: Fn() -> Box<dyn SessionHandler> + Send + Sync + 'static,
  {
    TcpServer {
      core: ServerCore::new(
        endpoint.into(),
        options,
        StreamAcceptor::Plain,
        Box::new(factory),
      ),
    }
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

  /// The bound address, available once started. With port `0` this is the
  /// OS-assigned port.
  pub fn local_addr(&self) -> Option<SocketAddr> {
    self.core.local_addr()
  }

  pub fn endpoint(&self) -> &Endpoint {
    self.core.endpoint()
  }

  pub fn options(&self) -> &ServerOptions {
    self.core.options()
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

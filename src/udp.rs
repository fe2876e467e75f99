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

//! Datagram endpoints. There is no connection state and no session table:
//! sends name a peer endpoint per call, receives deliver the source endpoint
//! with every datagram.

use std::net::SocketAddr;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use log::info;
use log::warn;
use socket2::Domain;
use socket2::Protocol;
use socket2::SockAddr;
use socket2::Socket;
use socket2::Type;
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::tcp::ServerState;

/// Largest payload a single UDP datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65507;

#[derive(Clone, Debug, Default)]
pub struct UdpOptions {
  pub reuse_address: bool,
  pub dual_mode: bool,
  pub receive_buffer_size: Option<usize>,
  pub send_buffer_size: Option<usize>,
}

/// Datagram event hooks. One handler object per endpoint lifetime, produced
/// by the factory on every `start`/`connect`; the receive task serializes
/// all invocations.
#[async_trait]
pub trait UdpHandler: Send + 'static {
  async fn on_started(&mut self, _socket: &Arc<UdpSocket>) {}
  async fn on_received(
    &mut self,
    _socket: &Arc<UdpSocket>,
    _peer: SocketAddr,
    _data: &[u8],
  ) {
  }
  async fn on_error(&mut self, _error: &Error) {}
  async fn on_stopped(&mut self) {}
}

type UdpFactory = Box<dyn Fn() -> Box<dyn UdpHandler> + Send + Sync>;

struct UdpCore {
  endpoint: Endpoint,
  options: UdpOptions,
  state: AtomicU8,
  factory: UdpFactory,
  socket: Mutex<Option<Arc<UdpSocket>>>,
  bound: Mutex<Option<SocketAddr>>,
  stop: Notify,
  task: Mutex<Option<JoinHandle<()>>>,
}

impl UdpCore {
  fn new(endpoint: Endpoint, options: UdpOptions, factory: UdpFactory) -> Arc<Self> {
    Arc::new(UdpCore {
      endpoint,
      options,
      state: AtomicU8::new(ServerState::Created as u8),
      factory,
      socket: Mutex::new(None),
      bound: Mutex::new(None),
      stop: Notify::new(),
      task: Mutex::new(None),
    })
  }

  fn state(&self) -> ServerState {
    match self.state.load(Ordering::Acquire) {
      0 => ServerState::Created,
      1 => ServerState::Starting,
      2 => ServerState::Started,
      3 => ServerState::Stopping,
      _ => ServerState::Stopped,
    }
  }

  fn transition(&self, from: &[ServerState], to: ServerState) -> bool {
    loop {
      let current = self.state.load(Ordering::Acquire);
      let state = match current {
        0 => ServerState::Created,
        1 => ServerState::Starting,
        2 => ServerState::Started,
        3 => ServerState::Stopping,
        _ => ServerState::Stopped,
      };
      if !from.contains(&state) {
        return false;
      }
      if self
        .state
        .compare_exchange(current, to as u8, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
      {
        return true;
      }
    }
  }

  async fn start(self: &Arc<Self>, connect_peer: Option<SocketAddr>) -> Result<(), Error> {
    if !self.transition(
      &[ServerState::Created, ServerState::Stopped],
      ServerState::Starting,
    ) {
      return Err(Error::InvalidState);
    }

    let socket = match self.bind(connect_peer).await {
      Ok(socket) => Arc::new(socket),
      Err(err) => {
        self.state.store(ServerState::Stopped as u8, Ordering::Release);
        return Err(err);
      }
    };
    let local = socket.local_addr()?;
    *self.bound.lock().unwrap() = Some(local);
    *self.socket.lock().unwrap() = Some(socket.clone());
    info!("datagram endpoint bound on {}", local);

    let core = self.clone();
    let mut handler = (self.factory)();
    let handle = tokio::spawn(async move {
      handler.on_started(&socket).await;
      let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
      loop {
        tokio::select! {
          _ = core.stop.notified() => break,
          received = socket.recv_from(&mut buf) => match received {
            Ok((n, peer)) => handler.on_received(&socket, peer, &buf[..n]).await,
            Err(err) => {
              let error = Error::Io(err);
              handler.on_error(&error).await;
            }
          },
        }
      }
      handler.on_stopped().await;
    });
    *self.task.lock().unwrap() = Some(handle);
    self.state.store(ServerState::Started as u8, Ordering::Release);
    Ok(())
  }

  async fn stop(&self) -> Result<(), Error> {
    if !self.transition(&[ServerState::Started], ServerState::Stopping) {
      return Err(Error::InvalidState);
    }
    self.stop.notify_one();
    let handle = self.task.lock().unwrap().take();
    if let Some(handle) = handle {
      let _ = handle.await;
    }
    *self.socket.lock().unwrap() = None;
    self.state.store(ServerState::Stopped as u8, Ordering::Release);
    Ok(())
  }

  async fn bind(&self, connect_peer: Option<SocketAddr>) -> Result<UdpSocket, Error> {
    let addr = self.endpoint.resolve().await?;
    let socket =
      Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    if addr.is_ipv6() && self.options.dual_mode {
      socket.set_only_v6(false)?;
    }
    if self.options.reuse_address {
      socket.set_reuse_address(true)?;
    }
    if let Some(size) = self.options.receive_buffer_size {
      socket.set_recv_buffer_size(size)?;
    }
    if let Some(size) = self.options.send_buffer_size {
      socket.set_send_buffer_size(size)?;
    }
    socket.set_nonblocking(true)?;
    socket.bind(&SockAddr::from(addr))?;
    let socket = UdpSocket::from_std(socket.into())?;
    if let Some(peer) = connect_peer {
      socket.connect(peer).await?;
    }
    Ok(socket)
  }

  fn socket(&self) -> Option<Arc<UdpSocket>> {
    self.socket.lock().unwrap().clone()
  }

  fn local_addr(&self) -> Option<SocketAddr> {
    *self.bound.lock().unwrap()
  }

  async fn send_to(&self, peer: SocketAddr, data: &[u8]) -> usize {
    match self.socket() {
      Some(socket) => match socket.send_to(data, peer).await {
        Ok(n) => n,
        Err(err) => {
          warn!("send to {} failed: {}", peer, err);
          0
        }
      },
      None => 0,
    }
  }

  fn send_to_async(&self, peer: SocketAddr, data: &[u8]) -> bool {
    match self.socket() {
      Some(socket) => socket.try_send_to(data, peer).is_ok(),
      None => false,
    }
  }
}

/// Bound datagram receiver with a send side usable from any task.
pub struct UdpServer {
  core: Arc<UdpCore>,
}

impl UdpServer {
  pub fn new<E, F>(endpoint: E, factory: F) -> Self
  where
    E: Into<Endpoint>,
    F: Fn() -> Box<dyn UdpHandler> + Send + Sync + 'static,
  {
    Self::with_options(endpoint, UdpOptions::default(), factory)
  }

  pub fn with_options<E, F>(endpoint: E, options: UdpOptions, factory: F) -> Self
  where
    E: Into<Endpoint>,
    F: Fn() -> Box<dyn UdpHandler> + Send + Sync + 'static,
  {
    UdpServer {
      core: UdpCore::new(endpoint.into(), options, Box::new(factory)),
    }
  }

  pub async fn start(&self) -> Result<(), Error> {
    self.core.start(None).await
  }

  pub async fn stop(&self) -> Result<(), Error> {
    self.core.stop().await
  }

  pub async fn restart(&self) -> Result<(), Error> {
    self.core.stop().await?;
    self.core.start(None).await
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
    &self.core.endpoint
  }

  /// Sends one datagram to `peer`. Returns bytes written, `0` on failure or
  /// when not started.
  pub async fn send(&self, peer: SocketAddr, data: &[u8]) -> usize {
    self.core.send_to(peer, data).await
  }

  /// Non-blocking send; `false` when the socket is not ready or not started.
  pub fn send_async(&self, peer: SocketAddr, data: &[u8]) -> bool {
    self.core.send_to_async(peer, data)
  }
}

/// Datagram client: binds an ephemeral local port and sets `peer` as the
/// default destination.
pub struct UdpClient {
  peer: Endpoint,
  core: Arc<UdpCore>,
}

impl UdpClient {
  pub fn new<E, F>(peer: E, factory: F) -> Self
  where
    E: Into<Endpoint>,
    F: Fn() -> Box<dyn UdpHandler> + Send + Sync + 'static,
  {
    Self::with_options(peer, UdpOptions::default(), factory)
  }

  pub fn with_options<E, F>(peer: E, options: UdpOptions, factory: F) -> Self
  where
    E: Into<Endpoint>,
    F: Fn() -> Box<dyn UdpHandler> + Send + Sync + 'static,
  {
    let peer = peer.into();
    UdpClient {
      peer: peer.clone(),
      core: UdpCore::new(Endpoint::new("0.0.0.0", 0), options, Box::new(factory)),
    }
  }

  /// Binds and starts the receive loop. The peer endpoint becomes the
  /// default destination for [`UdpClient::send`].
  pub async fn connect(&self) -> Result<(), Error> {
    let peer = self.peer.resolve().await?;
    self.core.start(Some(peer)).await
  }

  pub async fn disconnect(&self) -> Result<(), Error> {
    self.core.stop().await
  }

  pub fn is_connected(&self) -> bool {
    self.core.state() == ServerState::Started
  }

  pub fn local_addr(&self) -> Option<SocketAddr> {
    self.core.local_addr()
  }

  pub fn endpoint(&self) -> &Endpoint {
    &self.peer
  }

  /// Sends to the connected peer. Returns bytes written, `0` on failure.
  pub async fn send(&self, data: &[u8]) -> usize {
    match self.core.socket() {
      Some(socket) => match socket.send(data).await {
        Ok(n) => n,
        Err(err) => {
          warn!("send to {} failed: {}", self.peer, err);
          0
        }
      },
      None => 0,
    }
  }

  pub fn send_async(&self, data: &[u8]) -> bool {
    match self.core.socket() {
      Some(socket) => socket.try_send(data).is_ok(),
      None => false,
    }
  }

  /// Sends to an explicit endpoint, bypassing the default peer.
  pub async fn send_to(&self, peer: SocketAddr, data: &[u8]) -> usize {
    self.core.send_to(peer, data).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::sync::mpsc;

  struct Collect {
    datagrams: mpsc::UnboundedSender<(SocketAddr, Vec<u8>)>,
  }

  #[async_trait]
  impl UdpHandler for Collect {
    async fn on_received(
      &mut self,
      _socket: &Arc<UdpSocket>,
      peer: SocketAddr,
      data: &[u8],
    ) {
      let _ = self.datagrams.send((peer, data.to_vec()));
    }
  }

  #[tokio::test]
  async fn datagram_round_trip() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let server = UdpServer::new(("127.0.0.1", 0), move || {
      Box::new(Collect {
        datagrams: tx.clone(),
      }) as Box<dyn UdpHandler>
    });
    server.start().await.unwrap();
    let server_addr = server.local_addr().unwrap();

    let client = UdpClient::new(Endpoint::from(server_addr), || {
      Box::new(Collect {
        datagrams: mpsc::unbounded_channel().0,
      }) as Box<dyn UdpHandler>
    });
    client.connect().await.unwrap();
    assert_eq!(client.send(b"ping").await, 4);

    let (peer, data) = rx.recv().await.unwrap();
    assert_eq!(data, b"ping");
    assert_eq!(peer.port(), client.local_addr().unwrap().port());

    // reply goes back to the datagram's source endpoint
    assert_eq!(server.send(peer, b"pong").await, 4);

    client.disconnect().await.unwrap();
    server.stop().await.unwrap();
    assert_eq!(server.state(), ServerState::Stopped);
  }

  #[tokio::test]
  async fn send_before_start_is_rejected() {
    let server = UdpServer::new(("127.0.0.1", 0), || {
      Box::new(Collect {
        datagrams: mpsc::unbounded_channel().0,
      }) as Box<dyn UdpHandler>
    });
    let peer: SocketAddr = "127.0.0.1:9".parse().unwrap();
    assert_eq!(server.send(peer, b"x").await, 0);
    assert!(!server.send_async(peer, b"x"));
  }
}

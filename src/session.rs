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
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use log::debug;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::Error;

/// Stable 128-bit session identifier, generated at session creation.
pub type SessionId = Uuid;

pub(crate) trait StreamIo: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> StreamIo for T {}

pub(crate) type BoxedStream = Box<dyn StreamIo>;

pub(crate) type SessionMap = Arc<DashMap<SessionId, Arc<Session>>>;

pub(crate) const DEFAULT_RECV_BUFFER_SIZE: usize = 8192;

/// Transport lifecycle of a session. Terminal state is `Disconnected`; only
/// `Connected` permits user I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
  Created = 0,
  Connecting = 1,
  Connected = 2,
  Disconnecting = 3,
  Disconnected = 4,
}

impl SessionState {
  fn from_u8(value: u8) -> Self {
    match value {
      0 => SessionState::Created,
      1 => SessionState::Connecting,
      2 => SessionState::Connected,
      3 => SessionState::Disconnecting,
      _ => SessionState::Disconnected,
    }
  }
}

/// Per-session event hooks.
///
/// One handler object is owned by each session's I/O task, which serializes
/// every invocation; methods therefore take `&mut self`. Data passed to
/// [`SessionHandler::on_received`] is a view into the session's receive
/// buffer, valid for the duration of the call.
///
/// Handlers must not await [`Session::send`] or [`Session::disconnect`] on
/// their own session: both resolve through the I/O task the callback is
/// running on. The `_async` variants enqueue and return immediately and are
/// safe from any context.
#[async_trait]
pub trait SessionHandler: Send + 'static {
  async fn on_connecting(&mut self, _session: &Arc<Session>) {}
  async fn on_connected(&mut self, _session: &Arc<Session>) {}
  async fn on_received(&mut self, _session: &Arc<Session>, _data: &[u8]) {}
  async fn on_sent(
    &mut self,
    _session: &Arc<Session>,
    _sent: usize,
    _pending: usize,
  ) {
  }
  async fn on_empty(&mut self, _session: &Arc<Session>) {}
  async fn on_disconnecting(&mut self, _session: &Arc<Session>) {}
  async fn on_disconnected(&mut self, _session: &Arc<Session>) {}
  async fn on_error(&mut self, _session: &Arc<Session>, _error: &Error) {}
}

pub(crate) enum Command {
  Send {
    data: Bytes,
    ack: Option<oneshot::Sender<usize>>,
  },
  Shutdown,
}

/// One connected peer's I/O context.
///
/// Sends are enqueued FIFO and written by the session's I/O task one at a
/// time, so successive `send_async` calls from one thread arrive in order and
/// each frame-sized enqueue is written contiguously. The same type backs
/// plain TCP and TLS sessions.
pub struct Session {
  id: SessionId,
  local_addr: SocketAddr,
  peer_addr: SocketAddr,
  state: AtomicU8,
  pending: AtomicUsize,
  bytes_sent: AtomicU64,
  bytes_received: AtomicU64,
  by_user: AtomicBool,
  tx: mpsc::UnboundedSender<Command>,
  closed: watch::Sender<bool>,
}

impl Session {
  pub(crate) fn new(
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
  ) -> (Arc<Session>, mpsc::UnboundedReceiver<Command>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (closed, _) = watch::channel(false);
    let session = Arc::new(Session {
      id: Uuid::new_v4(),
      local_addr,
      peer_addr,
      state: AtomicU8::new(SessionState::Created as u8),
      pending: AtomicUsize::new(0),
      bytes_sent: AtomicU64::new(0),
      bytes_received: AtomicU64::new(0),
      by_user: AtomicBool::new(false),
      tx,
      closed,
    });
    (session, rx)
  }

  #[inline]
  pub fn id(&self) -> SessionId {
    self.id
  }

  #[inline]
  pub fn state(&self) -> SessionState {
    SessionState::from_u8(self.state.load(Ordering::Acquire))
  }

  #[inline]
  pub fn is_connected(&self) -> bool {
    self.state() == SessionState::Connected
  }

  pub fn local_addr(&self) -> SocketAddr {
    self.local_addr
  }

  pub fn peer_addr(&self) -> SocketAddr {
    self.peer_addr
  }

  /// Bytes enqueued but not yet written to the socket.
  pub fn bytes_pending(&self) -> usize {
    self.pending.load(Ordering::Acquire)
  }

  pub fn bytes_sent(&self) -> u64 {
    self.bytes_sent.load(Ordering::Relaxed)
  }

  pub fn bytes_received(&self) -> u64 {
    self.bytes_received.load(Ordering::Relaxed)
  }

  /// Enqueues `data` for transmission. Returns `false` if the session is not
  /// connected or is shutting down.
  pub fn send_async(&self, data: &[u8]) -> bool {
    if self.state() != SessionState::Connected {
      return false;
    }
    self.pending.fetch_add(data.len(), Ordering::AcqRel);
    let sent = self.tx.send(Command::Send {
      data: Bytes::copy_from_slice(data),
      ack: None,
    });
    if sent.is_err() {
      self.pending.fetch_sub(data.len(), Ordering::AcqRel);
      return false;
    }
    true
  }

  /// Enqueues `data` and waits until the socket accepted it. Returns the
  /// number of bytes written, `0` when the session is not connected.
  pub async fn send(&self, data: &[u8]) -> usize {
    if self.state() != SessionState::Connected {
      return 0;
    }
    let (ack, done) = oneshot::channel();
    self.pending.fetch_add(data.len(), Ordering::AcqRel);
    let sent = self.tx.send(Command::Send {
      data: Bytes::copy_from_slice(data),
      ack: Some(ack),
    });
    if sent.is_err() {
      self.pending.fetch_sub(data.len(), Ordering::AcqRel);
      return 0;
    }
    done.await.unwrap_or(0)
  }

  /// Initiates the close protocol. Idempotent: the first call from the
  /// `Connecting`/`Connected` states wins, later calls return `false`.
  /// Queued sends are still flushed before the socket shuts down.
  pub fn disconnect_async(&self) -> bool {
    loop {
      let current = self.state.load(Ordering::Acquire);
      match SessionState::from_u8(current) {
        SessionState::Connecting | SessionState::Connected => {}
        _ => return false,
      }
      let exchanged = self.state.compare_exchange(
        current,
        SessionState::Disconnecting as u8,
        Ordering::AcqRel,
        Ordering::Acquire,
      );
      if exchanged.is_ok() {
        self.by_user.store(true, Ordering::Release);
        return self.tx.send(Command::Shutdown).is_ok();
      }
    }
  }

  /// Initiates the close protocol and waits for the `Disconnected`
  /// transition. Must not be awaited from this session's own callbacks.
  pub async fn disconnect(&self) -> bool {
    let initiated = self.disconnect_async();
    let mut rx = self.closed.subscribe();
    while !*rx.borrow_and_update() {
      if rx.changed().await.is_err() {
        break;
      }
    }
    initiated
  }

  fn set_state(&self, state: SessionState) {
    self.state.store(state as u8, Ordering::Release);
  }
}

/// Drives one session until the peer closes, an error occurs or the user
/// disconnects. Receive completions and send completions are serialized with
/// respect to each other here; this task is the session's completion context.
pub(crate) async fn run(
  session: Arc<Session>,
  stream: BoxedStream,
  mut rx: mpsc::UnboundedReceiver<Command>,
  mut handler: Box<dyn SessionHandler>,
  registry: Option<SessionMap>,
  recv_buffer_size: usize,
  ready: Option<oneshot::Sender<()>>,
) {
  session.set_state(SessionState::Connecting);
  handler.on_connecting(&session).await;
  session.set_state(SessionState::Connected);
  if let Some(map) = &registry {
    map.insert(session.id(), session.clone());
  }
  if let Some(ready) = ready {
    let _ = ready.send(());
  }
  handler.on_connected(&session).await;

  let (mut reader, mut writer) = tokio::io::split(stream);
  let mut buf = vec![0u8; recv_buffer_size.max(1)];
  let mut error: Option<Error> = None;

  'io: loop {
    tokio::select! {
      command = rx.recv() => match command {
        Some(Command::Send { data, ack }) => {
          match writer.write_all(&data).await {
            Ok(()) => {
              let sent = data.len();
              session.bytes_sent.fetch_add(sent as u64, Ordering::Relaxed);
              let pending =
                session.pending.fetch_sub(sent, Ordering::AcqRel) - sent;
              if let Some(ack) = ack {
                let _ = ack.send(sent);
              }
              handler.on_sent(&session, sent, pending).await;
              if pending == 0 {
                handler.on_empty(&session).await;
              }
            }
            Err(err) => {
              if let Some(ack) = ack {
                let _ = ack.send(0);
              }
              error = Some(err.into());
              break 'io;
            }
          }
        }
        Some(Command::Shutdown) | None => {
          let _ = writer.shutdown().await;
          break 'io;
        }
      },
      result = reader.read(&mut buf) => match result {
        Ok(0) => break 'io,
        Ok(n) => {
          session.bytes_received.fetch_add(n as u64, Ordering::Relaxed);
          handler.on_received(&session, &buf[..n]).await;
        }
        Err(err) => {
          error = Some(err.into());
          break 'io;
        }
      },
    }
  }

  if let Some(err) = &error {
    handler.on_error(&session, err).await;
  }

  debug!(
    "session {} closing ({})",
    session.id(),
    if session.by_user.load(Ordering::Acquire) {
      "initiated locally"
    } else if error.is_some() {
      "transport error"
    } else {
      "closed by peer"
    }
  );

  session.set_state(SessionState::Disconnecting);
  if let Some(map) = &registry {
    map.remove(&session.id());
  }
  handler.on_disconnecting(&session).await;
  session.set_state(SessionState::Disconnected);
  handler.on_disconnected(&session).await;
  rx.close();
  let _ = session.closed.send(true);
}

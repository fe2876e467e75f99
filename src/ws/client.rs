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
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::Mutex;

use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::error::WebSocketError;
use crate::tcp::ClientOptions;
use crate::tcp::TcpClient;
use crate::tls::SslContext;
use crate::ws::frame::OpCode;
use crate::ws::session::WsClientSession;
use crate::ws::session::WsHandler;
use crate::ws::session::WsSession;

type MessageQueue = mpsc::UnboundedReceiver<(OpCode, Vec<u8>)>;

/// Queueing handler backing the channel-mode client: complete messages are
/// parked until the host drains them with the receive helpers.
struct QueueHandler {
  queue: mpsc::UnboundedSender<(OpCode, Vec<u8>)>,
}

#[async_trait]
impl WsHandler for QueueHandler {
  async fn on_ws_received(
    &mut self,
    _ws: &Arc<WsSession>,
    opcode: OpCode,
    payload: &[u8],
  ) {
    let _ = self.queue.send((opcode, payload.to_vec()));
  }

  async fn on_ws_close(
    &mut self,
    _ws: &Arc<WsSession>,
    code: u16,
    reason: &[u8],
  ) {
    let mut payload = Vec::with_capacity(2 + reason.len());
    payload.extend_from_slice(&code.to_be_bytes());
    payload.extend_from_slice(reason);
    let _ = self.queue.send((OpCode::Close, payload));
  }
}

/// WebSocket client over plain TCP (`ws://`).
///
/// Two modes: [`WsClient::connect`] installs an internal queue and the
/// `receive*` helpers await messages; [`WsClient::connect_with`] installs a
/// caller handler and the helpers are inert.
pub struct WsClient {
  client: TcpClient,
  host: String,
  path: String,
  ws: StdMutex<Option<Arc<WsSession>>>,
  queue: Mutex<Option<MessageQueue>>,
}

impl WsClient {
  pub fn new(endpoint: impl Into<Endpoint>, path: impl Into<String>) -> Self {
    Self::with_options(endpoint, ClientOptions::default(), path)
  }

  pub fn with_options(
    endpoint: impl Into<Endpoint>,
    options: ClientOptions,
    path: impl Into<String>,
  ) -> Self {
    let endpoint = endpoint.into();
    let host = endpoint.to_string();
    WsClient {
      client: TcpClient::with_options(endpoint, options),
      host,
      path: path.into(),
      ws: StdMutex::new(None),
      queue: Mutex::new(None),
    }
  }

  pub(crate) fn new_secure(
    endpoint: impl Into<Endpoint>,
    options: ClientOptions,
    context: &SslContext,
    path: impl Into<String>,
  ) -> Result<Self, Error> {
    let endpoint = endpoint.into();
    let host = endpoint.to_string();
    let connector = context.require_connector()?;
    let domain = endpoint.host().to_string();
    Ok(WsClient {
      client: TcpClient::with_tls(
        endpoint,
        options,
        crate::tcp::TlsConnect { connector, domain },
      ),
      host,
      path: path.into(),
      ws: StdMutex::new(None),
      queue: Mutex::new(None),
    })
  }

  pub fn endpoint(&self) -> &Endpoint {
    self.client.endpoint()
  }

  /// Connects, performs the upgrade, and queues incoming messages for the
  /// `receive*` helpers. Resolves once the handshake succeeded.
  pub async fn connect(&self) -> Result<Arc<WsSession>, Error> {
    let (tx, rx) = mpsc::unbounded_channel();
    *self.queue.lock().await = Some(rx);
    self.connect_with(Box::new(QueueHandler { queue: tx })).await
  }

  /// Connects with a caller-supplied handler. Resolves once the handshake
  /// succeeded.
  pub async fn connect_with(
    &self,
    handler: Box<dyn WsHandler>,
  ) -> Result<Arc<WsSession>, Error> {
    let (handshaked_tx, handshaked_rx) = oneshot::channel();
    let adapter = WsClientSession::new(
      handler,
      self.host.clone(),
      self.path.clone(),
      Some(handshaked_tx),
    );
    self.client.connect(Box::new(adapter)).await?;
    let ws = match handshaked_rx.await {
      Ok(Ok(ws)) => ws,
      Ok(Err(err)) => return Err(err),
      Err(_) => {
        return Err(Error::WebSocket(WebSocketError::ConnectionClosed))
      }
    };
    *self.ws.lock().unwrap() = Some(ws.clone());
    Ok(ws)
  }

  pub fn ws(&self) -> Option<Arc<WsSession>> {
    self.ws.lock().unwrap().clone()
  }

  pub fn is_connected(&self) -> bool {
    self.ws().map(|ws| ws.is_connected()).unwrap_or(false)
  }

  pub fn send_text_async(&self, text: &str) -> bool {
    self.ws().map(|ws| ws.send_text_async(text)).unwrap_or(false)
  }

  pub async fn send_text(&self, text: &str) -> usize {
    match self.ws() {
      Some(ws) => ws.send_text(text).await,
      None => 0,
    }
  }

  pub fn send_binary_async(&self, data: &[u8]) -> bool {
    self.ws().map(|ws| ws.send_binary_async(data)).unwrap_or(false)
  }

  pub async fn send_binary(&self, data: &[u8]) -> usize {
    match self.ws() {
      Some(ws) => ws.send_binary(data).await,
      None => 0,
    }
  }

  pub fn send_ping_async(&self, payload: &[u8]) -> bool {
    self.ws().map(|ws| ws.send_ping_async(payload)).unwrap_or(false)
  }

  pub fn send_close_async(&self, code: u16, reason: &[u8]) -> bool {
    self
      .ws()
      .map(|ws| ws.send_close_async(code, reason))
      .unwrap_or(false)
  }

  pub async fn send_close(&self, code: u16, reason: &[u8]) -> usize {
    match self.ws() {
      Some(ws) => ws.send_close(code, reason).await,
      None => 0,
    }
  }

  /// Flushes a CLOSE frame, then disconnects the transport.
  pub async fn close(&self, code: u16, reason: &[u8]) -> bool {
    match self.ws() {
      Some(ws) => ws.close(code, reason).await,
      None => false,
    }
  }

  pub async fn disconnect(&self) -> bool {
    self.client.disconnect().await
  }

  pub fn disconnect_async(&self) -> bool {
    self.client.disconnect_async()
  }

  /// Next queued message (channel mode only): data opcodes carry payloads,
  /// `Close` carries the big-endian code plus reason. `None` once the
  /// connection is gone.
  pub async fn receive(&self) -> Option<(OpCode, Vec<u8>)> {
    let mut queue = self.queue.lock().await;
    match queue.as_mut() {
      Some(rx) => rx.recv().await,
      None => None,
    }
  }

  /// Waits for the next TEXT message, skipping other frames.
  pub async fn receive_text(&self) -> Option<String> {
    loop {
      match self.receive().await? {
        (OpCode::Text, payload) => return String::from_utf8(payload).ok(),
        (OpCode::Close, _) => return None,
        _ => continue,
      }
    }
  }

  /// Waits for the next BINARY message, skipping other frames.
  pub async fn receive_binary(&self) -> Option<Vec<u8>> {
    loop {
      match self.receive().await? {
        (OpCode::Binary, payload) => return Some(payload),
        (OpCode::Close, _) => return None,
        _ => continue,
      }
    }
  }
}

/// WebSocket client over TLS (`wss://`). The endpoint host is the SNI name.
pub struct WssClient {
  inner: WsClient,
}

impl WssClient {
  pub fn new(
    endpoint: impl Into<Endpoint>,
    context: &SslContext,
    path: impl Into<String>,
  ) -> Result<Self, Error> {
    Self::with_options(endpoint, ClientOptions::default(), context, path)
  }

  pub fn with_options(
    endpoint: impl Into<Endpoint>,
    options: ClientOptions,
    context: &SslContext,
    path: impl Into<String>,
  ) -> Result<Self, Error> {
    Ok(WssClient {
      inner: WsClient::new_secure(endpoint, options, context, path)?,
    })
  }

  pub fn endpoint(&self) -> &Endpoint {
    self.inner.endpoint()
  }

  pub async fn connect(&self) -> Result<Arc<WsSession>, Error> {
    self.inner.connect().await
  }

  pub async fn connect_with(
    &self,
    handler: Box<dyn WsHandler>,
  ) -> Result<Arc<WsSession>, Error> {
    self.inner.connect_with(handler).await
  }

  pub fn ws(&self) -> Option<Arc<WsSession>> {
    self.inner.ws()
  }

  pub fn is_connected(&self) -> bool {
    self.inner.is_connected()
  }

  pub async fn send_text(&self, text: &str) -> usize {
    self.inner.send_text(text).await
  }

  pub fn send_text_async(&self, text: &str) -> bool {
    self.inner.send_text_async(text)
  }

  pub async fn send_binary(&self, data: &[u8]) -> usize {
    self.inner.send_binary(data).await
  }

  pub fn send_binary_async(&self, data: &[u8]) -> bool {
    self.inner.send_binary_async(data)
  }

  pub async fn send_close(&self, code: u16, reason: &[u8]) -> usize {
    self.inner.send_close(code, reason).await
  }

  pub async fn close(&self, code: u16, reason: &[u8]) -> bool {
    self.inner.close(code, reason).await
  }

  pub async fn disconnect(&self) -> bool {
    self.inner.disconnect().await
  }

  pub async fn receive(&self) -> Option<(OpCode, Vec<u8>)> {
    self.inner.receive().await
  }

  pub async fn receive_text(&self) -> Option<String> {
    self.inner.receive_text().await
  }

  pub async fn receive_binary(&self) -> Option<Vec<u8>> {
    self.inner.receive_binary().await
  }
}

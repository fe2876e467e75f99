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

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio::sync::oneshot;

use crate::error::Error;
use crate::error::WebSocketError;
use crate::http::HttpRequest;
use crate::http::HttpResponse;
use crate::session::Session;
use crate::session::SessionHandler;
use crate::session::SessionId;
use crate::ws::frame::Frame;
use crate::ws::frame::FrameDecoder;
use crate::ws::frame::OpCode;
use crate::ws::fragment::FragmentCollector;
use crate::ws::handshake;
use crate::ws::CloseCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
  Server,
  Client,
}

/// A handshaked WebSocket peer.
///
/// Every send helper encodes one complete frame into an owned buffer and
/// enqueues it with a single FIFO write, so frame emission is atomic with
/// respect to concurrent senders. Client-role frames are masked with a fresh
/// random key per frame.
pub struct WsSession {
  session: Arc<Session>,
  role: Role,
  close_sent: AtomicBool,
}

impl WsSession {
  pub(crate) fn new(session: Arc<Session>, role: Role) -> Arc<Self> {
    Arc::new(WsSession {
      session,
      role,
      close_sent: AtomicBool::new(false),
    })
  }

  pub fn session(&self) -> &Arc<Session> {
    &self.session
  }

  pub fn id(&self) -> SessionId {
    self.session.id()
  }

  pub fn role(&self) -> Role {
    self.role
  }

  pub fn is_connected(&self) -> bool {
    self.session.is_connected()
  }

  fn encode(&self, mut frame: Frame) -> Vec<u8> {
    if self.role == Role::Client {
      frame.mask();
    }
    if frame.opcode == OpCode::Close {
      self.close_sent.store(true, Ordering::Release);
    }
    let mut buf = Vec::with_capacity(frame.payload.len() + 14);
    frame.write(&mut buf);
    buf
  }

  pub(crate) fn close_sent(&self) -> bool {
    self.close_sent.load(Ordering::Acquire)
  }

  /// Enqueues one frame; `false` when the transport is not connected.
  pub fn send_frame_async(&self, frame: Frame) -> bool {
    let wire = self.encode(frame);
    self.session.send_async(&wire)
  }

  /// Writes one frame and waits for the socket to accept it. Returns wire
  /// bytes written, `0` when not connected.
  pub async fn send_frame(&self, frame: Frame) -> usize {
    let wire = self.encode(frame);
    self.session.send(&wire).await
  }

  pub fn send_text_async(&self, text: &str) -> bool {
    self.send_frame_async(Frame::text(text.as_bytes().to_vec()))
  }

  pub async fn send_text(&self, text: &str) -> usize {
    self.send_frame(Frame::text(text.as_bytes().to_vec())).await
  }

  pub fn send_binary_async(&self, data: &[u8]) -> bool {
    self.send_frame_async(Frame::binary(data.to_vec()))
  }

  pub async fn send_binary(&self, data: &[u8]) -> usize {
    self.send_frame(Frame::binary(data.to_vec())).await
  }

  pub fn send_ping_async(&self, payload: &[u8]) -> bool {
    self.send_frame_async(Frame::ping(payload.to_vec()))
  }

  pub async fn send_ping(&self, payload: &[u8]) -> usize {
    self.send_frame(Frame::ping(payload.to_vec())).await
  }

  pub fn send_pong_async(&self, payload: &[u8]) -> bool {
    self.send_frame_async(Frame::pong(payload.to_vec()))
  }

  pub async fn send_pong(&self, payload: &[u8]) -> usize {
    self.send_frame(Frame::pong(payload.to_vec())).await
  }

  /// Enqueues a CLOSE frame with a big-endian status code.
  pub fn send_close_async(&self, code: u16, reason: &[u8]) -> bool {
    self.send_frame_async(Frame::close(code, reason))
  }

  /// Writes a CLOSE frame and waits until the socket accepted it, so the
  /// frame cannot race a following FIN.
  pub async fn send_close(&self, code: u16, reason: &[u8]) -> usize {
    self.send_frame(Frame::close(code, reason)).await
  }

  /// Flushes a CLOSE frame, then runs the transport close protocol to
  /// completion. Must not be awaited from this session's own callbacks; use
  /// [`WsSession::send_close_async`] plus
  /// [`Session::disconnect_async`] there.
  pub async fn close(&self, code: u16, reason: &[u8]) -> bool {
    self.send_close(code, reason).await;
    self.session.disconnect().await
  }
}

/// WebSocket event hooks. Mirrors [`SessionHandler`]'s ownership rules: one
/// boxed handler per session, all calls serialized by the session's I/O
/// task.
#[async_trait]
pub trait WsHandler: Send + 'static {
  /// Server side, before the `101` reply is sent: inspect the upgrade
  /// request, add response headers, or return `false` to refuse the
  /// upgrade.
  async fn on_ws_connecting(
    &mut self,
    _request: &HttpRequest,
    _response: &mut HttpResponse,
  ) -> bool {
    true
  }

  async fn on_ws_connected(&mut self, _ws: &Arc<WsSession>) {}

  /// A complete (defragmented) TEXT or BINARY message.
  async fn on_ws_received(
    &mut self,
    _ws: &Arc<WsSession>,
    _opcode: OpCode,
    _payload: &[u8],
  ) {
  }

  async fn on_ws_ping(&mut self, _ws: &Arc<WsSession>, _payload: &[u8]) {}
  async fn on_ws_pong(&mut self, _ws: &Arc<WsSession>, _payload: &[u8]) {}

  /// Peer sent CLOSE. `code` is `1005` when the payload carried none. The
  /// transport disconnects after this returns.
  async fn on_ws_close(
    &mut self,
    _ws: &Arc<WsSession>,
    _code: u16,
    _reason: &[u8],
  ) {
  }

  async fn on_ws_disconnected(&mut self) {}
  async fn on_ws_error(&mut self, _error: &Error) {}
}

/// Post-handshake receive pipeline: decoder, fragment assembly, control
/// dispatch.
pub(crate) struct WsEngine {
  decoder: FrameDecoder,
  collector: FragmentCollector,
}

impl WsEngine {
  pub(crate) fn new() -> Self {
    WsEngine {
      decoder: FrameDecoder::new(),
      collector: FragmentCollector::new(),
    }
  }

  /// Whether the transport stopped feeding us mid-frame or mid-message.
  pub(crate) fn interrupted(&self) -> bool {
    self.decoder.is_partial() || self.collector.is_assembling()
  }

  pub(crate) async fn process(
    &mut self,
    ws: &Arc<WsSession>,
    handler: &mut Box<dyn WsHandler>,
    data: &[u8],
  ) {
    self.decoder.push(data);
    loop {
      match self.decoder.next() {
        Ok(Some(frame)) => {
          if !self.dispatch(ws, handler, frame).await {
            return;
          }
        }
        Ok(None) => return,
        Err(err) => {
          handler.on_ws_error(&Error::WebSocket(err)).await;
          protocol_close(ws);
          return;
        }
      }
    }
  }

  async fn dispatch(
    &mut self,
    ws: &Arc<WsSession>,
    handler: &mut Box<dyn WsHandler>,
    frame: Frame,
  ) -> bool {
    match frame.opcode {
      OpCode::Close => {
        let (code, reason) = match frame.payload.len() {
          0 => (u16::from(CloseCode::Status), Vec::new()),
          1 => {
            handler
              .on_ws_error(&Error::WebSocket(WebSocketError::InvalidCloseFrame))
              .await;
            protocol_close(ws);
            return false;
          }
          _ => {
            let code =
              u16::from_be_bytes([frame.payload[0], frame.payload[1]]);
            if !CloseCode::from(code).is_allowed() {
              handler
                .on_ws_error(&Error::WebSocket(
                  WebSocketError::InvalidCloseCode,
                ))
                .await;
              protocol_close(ws);
              return false;
            }
            if std::str::from_utf8(&frame.payload[2..]).is_err() {
              handler
                .on_ws_error(&Error::WebSocket(WebSocketError::InvalidUTF8))
                .await;
              protocol_close(ws);
              return false;
            }
            (code, frame.payload[2..].to_vec())
          }
        };
        handler.on_ws_close(ws, code, &reason).await;
        if !ws.close_sent() {
          ws.send_frame_async(Frame::close_raw(frame.payload));
        }
        ws.session().disconnect_async();
        false
      }
      OpCode::Ping => {
        // one pong per ping, echoing the payload, before any queued data
        ws.send_pong_async(&frame.payload);
        handler.on_ws_ping(ws, &frame.payload).await;
        true
      }
      OpCode::Pong => {
        handler.on_ws_pong(ws, &frame.payload).await;
        true
      }
      _ => match self.collector.accept(frame) {
        Ok(Some(message)) => {
          handler
            .on_ws_received(ws, message.opcode, &message.payload)
            .await;
          true
        }
        Ok(None) => true,
        Err(err) => {
          handler.on_ws_error(&Error::WebSocket(err)).await;
          protocol_close(ws);
          false
        }
      },
    }
  }
}

/// Frame-level violation: close 1002 and drop the transport.
fn protocol_close(ws: &Arc<WsSession>) {
  ws.send_close_async(u16::from(CloseCode::Protocol), b"");
  ws.session().disconnect_async();
}

/// Server-side session: parses the upgrade request, answers `101`, then
/// switches permanently to the frame codec. Once handshaked, no HTTP bytes
/// are parsed again on this connection.
pub struct WsServerSession {
  handler: Box<dyn WsHandler>,
  request: HttpRequest,
  ws: Option<Arc<WsSession>>,
  engine: WsEngine,
}

impl WsServerSession {
  pub fn new(handler: Box<dyn WsHandler>) -> Self {
    WsServerSession {
      handler,
      request: HttpRequest::new(),
      ws: None,
      engine: WsEngine::new(),
    }
  }

  fn reject(session: &Arc<Session>, status: u16, reason: &str) {
    let mut response = HttpResponse::new();
    response.make_error_response(status, reason);
    session.send_async(response.as_bytes());
    session.disconnect_async();
  }
}

#[async_trait]
impl SessionHandler for WsServerSession {
  async fn on_received(&mut self, session: &Arc<Session>, data: &[u8]) {
    if let Some(ws) = self.ws.clone() {
      self.engine.process(&ws, &mut self.handler, data).await;
      return;
    }

    if self.request.is_pending_header() {
      self.request.receive_header(data);
    } else {
      self.request.receive_body(data);
    }
    if self.request.is_error_set() {
      debug!(
        "session {} sent a malformed upgrade request: {}",
        session.id(),
        self.request.error().unwrap_or("parse error")
      );
      Self::reject(session, 400, "Bad Request");
      return;
    }
    if !self.request.is_complete() {
      return;
    }

    match handshake::validate_upgrade_request(&self.request) {
      Ok(accept) => {
        let mut response = HttpResponse::new();
        handshake::make_upgrade_response(&mut response, &accept);
        if !self.handler.on_ws_connecting(&self.request, &mut response).await {
          Self::reject(session, 403, "WebSocket upgrade refused");
          return;
        }
        response.set_body(b"");
        session.send_async(response.as_bytes());

        let ws = WsSession::new(session.clone(), Role::Server);
        let surplus = self.request.take_surplus();
        self.ws = Some(ws.clone());
        self.handler.on_ws_connected(&ws).await;
        if !surplus.is_empty() {
          self.engine.process(&ws, &mut self.handler, &surplus).await;
        }
      }
      Err(err) => {
        self.handler.on_ws_error(&Error::WebSocket(err)).await;
        Self::reject(session, 400, "WebSocket upgrade required");
      }
    }
  }

  async fn on_disconnected(&mut self, _session: &Arc<Session>) {
    let cut_short = self
      .ws
      .as_ref()
      .map(|ws| !ws.close_sent())
      .unwrap_or(false)
      && self.engine.interrupted();
    if cut_short {
      self
        .handler
        .on_ws_error(&Error::WebSocket(WebSocketError::UnexpectedEOF))
        .await;
    }
    self.handler.on_ws_disconnected().await;
  }

  async fn on_error(&mut self, _session: &Arc<Session>, error: &Error) {
    self.handler.on_ws_error(error).await;
  }
}

/// Client-side session: sends the upgrade request on connect, validates the
/// `101` reply, then switches to the frame codec. Bytes that trailed the
/// reply in the same segment are re-fed into the decoder.
pub struct WsClientSession {
  handler: Box<dyn WsHandler>,
  host: String,
  path: String,
  key: String,
  response: HttpResponse,
  ws: Option<Arc<WsSession>>,
  engine: WsEngine,
  handshaked: Option<oneshot::Sender<Result<Arc<WsSession>, Error>>>,
}

impl WsClientSession {
  pub fn new(
    handler: Box<dyn WsHandler>,
    host: String,
    path: String,
    handshaked: Option<oneshot::Sender<Result<Arc<WsSession>, Error>>>,
  ) -> Self {
    WsClientSession {
      handler,
      host,
      path,
      key: handshake::generate_key(),
      response: HttpResponse::new(),
      ws: None,
      engine: WsEngine::new(),
      handshaked,
    }
  }

  async fn fail(&mut self, session: &Arc<Session>, error: Error) {
    self.handler.on_ws_error(&error).await;
    if let Some(tx) = self.handshaked.take() {
      let _ = tx.send(Err(error));
    }
    session.disconnect_async();
  }
}

#[async_trait]
impl SessionHandler for WsClientSession {
  async fn on_connected(&mut self, session: &Arc<Session>) {
    let mut request = HttpRequest::new();
    handshake::make_upgrade_request(
      &mut request,
      &self.host,
      &self.path,
      &self.key,
    );
    session.send_async(request.as_bytes());
  }

  async fn on_received(&mut self, session: &Arc<Session>, data: &[u8]) {
    if let Some(ws) = self.ws.clone() {
      self.engine.process(&ws, &mut self.handler, data).await;
      return;
    }

    if self.response.is_pending_header() {
      if !self.response.receive_header(data) {
        if self.response.is_error_set() {
          let error = self.response.error().unwrap_or("HTTP parse error");
          self.fail(session, Error::Http(error)).await;
        }
        return;
      }
    } else {
      self.response.receive_body(data);
      if !self.response.is_complete() {
        return;
      }
    }

    match handshake::validate_upgrade_response(&self.response, &self.key) {
      Ok(()) => {
        // frames that followed the 101 land in the response body (no
        // declared length) or past its end; both re-enter the codec here
        let trailing = if self.response.is_complete() {
          self.response.take_surplus()
        } else {
          self.response.body().to_vec()
        };

        let ws = WsSession::new(session.clone(), Role::Client);
        self.ws = Some(ws.clone());
        if let Some(tx) = self.handshaked.take() {
          let _ = tx.send(Ok(ws.clone()));
        }
        self.handler.on_ws_connected(&ws).await;
        if !trailing.is_empty() {
          self.engine.process(&ws, &mut self.handler, &trailing).await;
        }
      }
      Err(err) => {
        self.fail(session, Error::WebSocket(err)).await;
      }
    }
  }

  async fn on_disconnected(&mut self, _session: &Arc<Session>) {
    if let Some(tx) = self.handshaked.take() {
      let _ = tx.send(Err(Error::WebSocket(WebSocketError::ConnectionClosed)));
    }
    let cut_short = self
      .ws
      .as_ref()
      .map(|ws| !ws.close_sent())
      .unwrap_or(false)
      && self.engine.interrupted();
    if cut_short {
      self
        .handler
        .on_ws_error(&Error::WebSocket(WebSocketError::UnexpectedEOF))
        .await;
    }
    self.handler.on_ws_disconnected().await;
  }

  async fn on_error(&mut self, _session: &Arc<Session>, error: &Error) {
    self.handler.on_ws_error(error).await;
  }
}

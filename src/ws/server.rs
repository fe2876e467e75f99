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
use std::sync::Arc;

use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::session::Session;
use crate::session::SessionHandler;
use crate::session::SessionId;
use crate::tcp::ServerOptions;
use crate::tcp::ServerState;
use crate::tcp::TcpServer;
use crate::tls::SslContext;
use crate::tls::SslServer;
use crate::ws::frame::Frame;
use crate::ws::session::WsHandler;
use crate::ws::session::WsServerSession;

fn encode_unmasked(frame: Frame) -> Vec<u8> {
  let mut wire = Vec::with_capacity(frame.payload.len() + 14);
  frame.write(&mut wire);
  wire
}

/// WebSocket server over plain TCP. The factory produces one [`WsHandler`]
/// per accepted peer; sessions speak HTTP until their upgrade completes.
pub struct WsServer {
  server: TcpServer,
}

impl WsServer {
  pub fn new<E, F>(endpoint: E, factory: F) -> Self
  where
    E: Into<Endpoint>,
    F: Fn() -> Box<dyn WsHandler> + Send + Sync + 'static,
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
    F: Fn() -> Box<dyn WsHandler> + Send + Sync + 'static,
  {
    WsServer {
      server: TcpServer::with_options(endpoint, options, move || {
        Box::new(WsServerSession::new(factory())) as Box<dyn SessionHandler>
      }),
    }
  }

  pub async fn start(&self) -> Result<(), Error> {
    self.server.start().await
  }

  pub async fn stop(&self) -> Result<(), Error> {
    self.server.stop().await
  }

  pub async fn restart(&self) -> Result<(), Error> {
    self.server.restart().await
  }

  pub fn state(&self) -> ServerState {
    self.server.state()
  }

  pub fn is_started(&self) -> bool {
    self.server.is_started()
  }

  pub fn local_addr(&self) -> Option<SocketAddr> {
    self.server.local_addr()
  }

  pub fn endpoint(&self) -> &Endpoint {
    self.server.endpoint()
  }

  pub fn find_session(&self, id: SessionId) -> Option<Arc<Session>> {
    self.server.find_session(id)
  }

  pub fn connected_sessions(&self) -> usize {
    self.server.connected_sessions()
  }

  pub async fn disconnect_all(&self) {
    self.server.disconnect_all().await
  }

  /// Encodes one TEXT frame and fans it out to every connected session.
  ///
  /// Sessions still in their handshake receive the frame bytes too; hosts
  /// that need to exclude them should multicast from their own session
  /// registry built in `on_ws_connected`.
  pub fn multicast_text(&self, text: &str) -> usize {
    let wire = encode_unmasked(Frame::text(text.as_bytes().to_vec()));
    self.server.multicast(&wire)
  }

  /// Encodes one BINARY frame and fans it out to every connected session.
  pub fn multicast_binary(&self, data: &[u8]) -> usize {
    let wire = encode_unmasked(Frame::binary(data.to_vec()));
    self.server.multicast(&wire)
  }
}

/// WebSocket server over TLS (`wss://`).
pub struct WssServer {
  server: SslServer,
}

impl WssServer {
  pub fn new<E, F>(
    endpoint: E,
    context: &SslContext,
    factory: F,
  ) -> Result<Self, Error>
  where
    E: Into<Endpoint>,
    F: Fn() -> Box<dyn WsHandler> + Send + Sync + 'static,
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
    F: Fn() -> Box<dyn WsHandler> + Send + Sync + 'static,
  {
    Ok(WssServer {
      server: SslServer::with_options(endpoint, options, context, move || {
        Box::new(WsServerSession::new(factory())) as Box<dyn SessionHandler>
      })?,
    })
  }

  pub async fn start(&self) -> Result<(), Error> {
    self.server.start().await
  }

  pub async fn stop(&self) -> Result<(), Error> {
    self.server.stop().await
  }

  pub async fn restart(&self) -> Result<(), Error> {
    self.server.restart().await
  }

  pub fn state(&self) -> ServerState {
    self.server.state()
  }

  pub fn is_started(&self) -> bool {
    self.server.is_started()
  }

  pub fn local_addr(&self) -> Option<SocketAddr> {
    self.server.local_addr()
  }

  pub fn endpoint(&self) -> &Endpoint {
    self.server.endpoint()
  }

  pub fn find_session(&self, id: SessionId) -> Option<Arc<Session>> {
    self.server.find_session(id)
  }

  pub fn connected_sessions(&self) -> usize {
    self.server.connected_sessions()
  }

  pub async fn disconnect_all(&self) {
    self.server.disconnect_all().await
  }

  pub fn multicast_text(&self, text: &str) -> usize {
    let wire = encode_unmasked(Frame::text(text.as_bytes().to_vec()));
    self.server.multicast(&wire)
  }

  pub fn multicast_binary(&self, data: &[u8]) -> usize {
    let wire = encode_unmasked(Frame::binary(data.to_vec()));
    self.server.multicast(&wire)
  }
}

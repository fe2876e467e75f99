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
use crate::http::HttpHandler;
use crate::http::HttpSession;
use crate::session::Session;
use crate::session::SessionHandler;
use crate::session::SessionId;
use crate::tcp::ServerOptions;
use crate::tcp::ServerState;
use crate::tcp::TcpServer;

/// A TCP server whose sessions run the HTTP request codec. The factory
/// produces one [`HttpHandler`] per accepted peer.
pub struct HttpServer {
  server: TcpServer,
}

impl HttpServer {
  pub fn new<E, F>(endpoint: E, factory: F) -> Self
  where
    E: Into<Endpoint>,
    F: Fn() -> Box<dyn HttpHandler> + Send + Sync + 'static,
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
    F: Fn() -> Box<dyn HttpHandler> + Send + Sync + 'static,
  {
    HttpServer {
      server: TcpServer::with_options(endpoint, options, move || {
        Box::new(HttpSession::new(factory())) as Box<dyn SessionHandler>
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

  pub fn multicast(&self, data: &[u8]) -> usize {
    self.server.multicast(data)
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
}

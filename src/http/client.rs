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

use async_trait::async_trait;

use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::http::HttpRequest;
use crate::http::HttpResponse;
use crate::session::Session;
use crate::session::SessionHandler;
use crate::tcp::ClientOptions;
use crate::tcp::TcpClient;

/// Response-level hooks for an HTTP client connection.
#[async_trait]
pub trait HttpClientHandler: Send + 'static {
  async fn on_connected(&mut self, _session: &Arc<Session>) {}
  async fn on_disconnected(&mut self, _session: &Arc<Session>) {}

  /// A complete response was parsed.
  async fn on_received_response(
    &mut self,
    session: &Arc<Session>,
    response: &HttpResponse,
  );

  async fn on_received_response_error(
    &mut self,
    _session: &Arc<Session>,
    _response: &HttpResponse,
    _error: &str,
  ) {
  }

  async fn on_error(&mut self, _session: &Arc<Session>, _error: &Error) {}
}

/// Session adapter parsing responses. A response whose length was never
/// declared is finalized when the peer closes.
struct HttpClientSession {
  response: HttpResponse,
  handler: Box<dyn HttpClientHandler>,
}

impl HttpClientSession {
  async fn process_chunk(
    &mut self,
    session: &Arc<Session>,
    data: &[u8],
  ) -> Option<Vec<u8>> {
    if self.response.is_pending_header() {
      self.response.receive_header(data);
    } else {
      self.response.receive_body(data);
    }

    if self.response.is_error_set() {
      let error = self.response.error().unwrap_or("HTTP parse error");
      self
        .handler
        .on_received_response_error(session, &self.response, error)
        .await;
      session.disconnect_async();
      return None;
    }

    if !self.response.is_complete() {
      return None;
    }

    self.handler.on_received_response(session, &self.response).await;
    let surplus = self.response.take_surplus();
    self.response.clear();
    Some(surplus)
  }
}

#[async_trait]
impl SessionHandler for HttpClientSession {
  async fn on_connected(&mut self, session: &Arc<Session>) {
    self.handler.on_connected(session).await;
  }

  async fn on_received(&mut self, session: &Arc<Session>, data: &[u8]) {
    let mut surplus = match self.process_chunk(session, data).await {
      Some(surplus) => surplus,
      None => return,
    };
    while !surplus.is_empty() {
      match self.process_chunk(session, &surplus).await {
        Some(next) => surplus = next,
        None => return,
      }
    }
  }

  async fn on_disconnected(&mut self, session: &Arc<Session>) {
    if self.response.complete_on_close() {
      self.handler.on_received_response(session, &self.response).await;
    }
    self.handler.on_disconnected(session).await;
  }

  async fn on_error(&mut self, session: &Arc<Session>, error: &Error) {
    self.handler.on_error(session, error).await;
  }
}

/// HTTP/1.1 client over a single TCP connection. No pooling: one connection,
/// sequential request/response exchanges.
pub struct HttpClient {
  client: TcpClient,
}

impl HttpClient {
  pub fn new(endpoint: impl Into<Endpoint>) -> Self {
    Self::with_options(endpoint, ClientOptions::default())
  }

  pub fn with_options(
    endpoint: impl Into<Endpoint>,
    options: ClientOptions,
  ) -> Self {
    HttpClient {
      client: TcpClient::with_options(endpoint, options),
    }
  }

  pub fn endpoint(&self) -> &Endpoint {
    self.client.endpoint()
  }

  pub async fn connect(
    &self,
    handler: Box<dyn HttpClientHandler>,
  ) -> Result<Arc<Session>, Error> {
    self
      .client
      .connect(Box::new(HttpClientSession {
        response: HttpResponse::new(),
        handler,
      }))
      .await
  }

  pub fn connect_async(&self, handler: Box<dyn HttpClientHandler>) -> bool {
    self.client.connect_async(Box::new(HttpClientSession {
      response: HttpResponse::new(),
      handler,
    }))
  }

  pub fn session(&self) -> Option<Arc<Session>> {
    self.client.session()
  }

  pub fn is_connected(&self) -> bool {
    self.client.is_connected()
  }

  /// Writes the request and waits for the socket to accept it. The response
  /// arrives through the handler.
  pub async fn send_request(&self, request: &HttpRequest) -> usize {
    self.client.send(request.as_bytes()).await
  }

  pub fn send_request_async(&self, request: &HttpRequest) -> bool {
    self.client.send_async(request.as_bytes())
  }

  pub async fn disconnect(&self) -> bool {
    self.client.disconnect().await
  }

  pub fn disconnect_async(&self) -> bool {
    self.client.disconnect_async()
  }
}

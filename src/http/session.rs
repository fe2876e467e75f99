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

use crate::error::Error;
use crate::http::HttpRequest;
use crate::session::Session;
use crate::session::SessionHandler;

/// Request-level hooks for an HTTP server session.
///
/// Respond by building an [`crate::http::HttpResponse`] and writing its
/// bytes with `session.send_async(response.as_bytes())`.
#[async_trait]
pub trait HttpHandler: Send + 'static {
  async fn on_connected(&mut self, _session: &Arc<Session>) {}
  async fn on_disconnected(&mut self, _session: &Arc<Session>) {}

  /// A complete request was parsed.
  async fn on_received_request(
    &mut self,
    session: &Arc<Session>,
    request: &HttpRequest,
  );

  /// The parser hit a structural violation; the session disconnects after
  /// this returns.
  async fn on_received_request_error(
    &mut self,
    _session: &Arc<Session>,
    _request: &HttpRequest,
    _error: &str,
  ) {
  }

  async fn on_error(&mut self, _session: &Arc<Session>, _error: &Error) {}
}

/// Applies the HTTP request codec to a transport session.
///
/// Keep-alive is the default: after each dispatched request the parser is
/// reset, and surplus bytes already buffered (pipelined successors) are
/// re-fed, so every request in a segment is parsed.
pub struct HttpSession {
  request: HttpRequest,
  handler: Box<dyn HttpHandler>,
}

impl HttpSession {
  pub fn new(handler: Box<dyn HttpHandler>) -> Self {
    HttpSession {
      request: HttpRequest::new(),
      handler,
    }
  }

  /// Feeds one chunk into the parser. Returns the surplus beyond a complete
  /// message, `None` when more bytes are needed or the session is done.
  async fn process_chunk(
    &mut self,
    session: &Arc<Session>,
    data: &[u8],
  ) -> Option<Vec<u8>> {
    if self.request.is_pending_header() {
      self.request.receive_header(data);
    } else {
      self.request.receive_body(data);
    }

    if self.request.is_error_set() {
      let error = self.request.error().unwrap_or("HTTP parse error");
      self
        .handler
        .on_received_request_error(session, &self.request, error)
        .await;
      session.disconnect_async();
      return None;
    }

    if !self.request.is_complete() {
      return None;
    }

    self.handler.on_received_request(session, &self.request).await;
    let surplus = self.request.take_surplus();
    self.request.clear();
    Some(surplus)
  }
}

#[async_trait]
impl SessionHandler for HttpSession {
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
    self.handler.on_disconnected(session).await;
  }

  async fn on_error(&mut self, session: &Arc<Session>, error: &Error) {
    self.handler.on_error(session, error).await;
  }
}

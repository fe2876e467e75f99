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

//! _fastnet_ is a fast asynchronous server & client library for TCP, UDP and
//! TLS transports, with an HTTP/1.1 codec and an RFC 6455 WebSocket engine
//! built on top.
//!
//! Servers own a concurrent table of sessions keyed by a stable 128-bit id.
//! Each session runs one I/O task that serializes its receive and send
//! completions and drives a boxed handler object; servers create one handler
//! per accepted peer through a factory closure. Fire-and-forget calls
//! (`send_async`, `disconnect_async`) enqueue and return immediately, while
//! their awaited counterparts resolve when the OS accepted the bytes or the
//! session reached its terminal state.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use fastnet::Session;
//! use fastnet::SessionHandler;
//! use fastnet::TcpServer;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl SessionHandler for Echo {
//!   async fn on_received(&mut self, session: &Arc<Session>, data: &[u8]) {
//!     session.send_async(data);
//!   }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!   let server = TcpServer::new(("127.0.0.1", 1111), || {
//!     Box::new(Echo) as Box<dyn SessionHandler>
//!   });
//!   server.start().await?;
//!   tokio::signal::ctrl_c().await?;
//!   server.stop().await?;
//!   Ok(())
//! }
//! ```
//!
//! ## WebSocket
//!
//! The `ws` module bridges the HTTP upgrade to frame I/O. Fragmented
//! messages are reassembled before delivery, pings are answered
//! automatically, and client-role frames are masked per frame.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use fastnet::ws::OpCode;
//! use fastnet::ws::WsHandler;
//! use fastnet::ws::WsServer;
//! use fastnet::ws::WsSession;
//!
//! struct EchoWs;
//!
//! #[async_trait]
//! impl WsHandler for EchoWs {
//!   async fn on_ws_received(
//!     &mut self,
//!     ws: &Arc<WsSession>,
//!     opcode: OpCode,
//!     payload: &[u8],
//!   ) {
//!     match opcode {
//!       OpCode::Text => ws.send_binary_async(payload),
//!       OpCode::Binary => ws.send_binary_async(payload),
//!       _ => false,
//!     };
//!   }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!   let server = WsServer::new(("127.0.0.1", 8080), || {
//!     Box::new(EchoWs) as Box<dyn WsHandler>
//!   });
//!   server.start().await?;
//!   tokio::signal::ctrl_c().await?;
//!   server.stop().await?;
//!   Ok(())
//! }
//! ```
//!
//! ## TLS
//!
//! `SslServer`/`SslClient` (and the `Wss` variants) conform to the plain TCP
//! contract; the only addition is an [`SslContext`] built from PEM files or
//! the bundled webpki roots. TLS failures surface as a distinct error kind.

#![cfg_attr(docsrs, feature(doc_cfg))]

mod buffer;
mod endpoint;
mod error;
/// HTTP/1.1 message codec and session overlays.
pub mod http;
mod session;
mod tcp;
mod tls;
mod udp;
/// RFC 6455 WebSocket codec, handshake and session overlays.
pub mod ws;

pub use crate::buffer::Buffer;
pub use crate::endpoint::Endpoint;
pub use crate::error::Error;
pub use crate::error::WebSocketError;
pub use crate::http::HttpClient;
pub use crate::http::HttpRequest;
pub use crate::http::HttpResponse;
pub use crate::http::HttpServer;
pub use crate::session::Session;
pub use crate::session::SessionHandler;
pub use crate::session::SessionId;
pub use crate::session::SessionState;
pub use crate::tcp::ClientOptions;
pub use crate::tcp::ServerOptions;
pub use crate::tcp::ServerState;
pub use crate::tcp::TcpClient;
pub use crate::tcp::TcpServer;
pub use crate::tls::SslClient;
pub use crate::tls::SslContext;
pub use crate::tls::SslServer;
pub use crate::udp::UdpClient;
pub use crate::udp::UdpHandler;
pub use crate::udp::UdpOptions;
pub use crate::udp::UdpServer;
pub use crate::ws::CloseCode;
pub use crate::ws::Frame;
pub use crate::ws::OpCode;
pub use crate::ws::WsClient;
pub use crate::ws::WsServer;
pub use crate::ws::WsSession;

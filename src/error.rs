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

use std::io;

/// WebSocket protocol violations, raised by the frame codec and by the
/// handshake validators.
#[derive(Debug, thiserror::Error)]
pub enum WebSocketError {
  #[error("Invalid fragment")]
  InvalidFragment,
  #[error("Invalid UTF-8")]
  InvalidUTF8,
  #[error("Invalid continuation frame")]
  InvalidContinuationFrame,
  #[error("Invalid close frame")]
  InvalidCloseFrame,
  #[error("Invalid close code")]
  InvalidCloseCode,
  #[error("Invalid opcode")]
  InvalidOpCode,
  #[error("Reserved bits are not zero")]
  ReservedBitsNotZero,
  #[error("Control frame must not be fragmented")]
  ControlFrameFragmented,
  #[error("Ping frame too large")]
  PingFrameTooLarge,
  #[error("Frame too large")]
  FrameTooLarge,
  #[error("Connection is closed")]
  ConnectionClosed,
  #[error("Unexpected EOF")]
  UnexpectedEOF,
  #[error("Invalid upgrade request")]
  InvalidUpgradeRequest,
  #[error("Invalid upgrade response")]
  InvalidUpgradeResponse,
  #[error("Missing Sec-WebSocket-Key header")]
  MissingSecWebSocketKey,
  #[error("Sec-WebSocket-Version must be 13")]
  InvalidSecWebsocketVersion,
  #[error("Sec-WebSocket-Accept does not match the sent key")]
  InvalidSecWebsocketAccept,
}

/// Crate-wide error type.
///
/// The kinds are non-overlapping: transport failures wrap [`io::Error`],
/// protocol failures carry either an HTTP parse description or a
/// [`WebSocketError`], TLS failures wrap the rustls error, and lifecycle
/// misuse surfaces as [`Error::InvalidState`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error(transparent)]
  Io(#[from] io::Error),
  #[error(transparent)]
  Tls(#[from] tokio_rustls::rustls::Error),
  #[error("invalid DNS name: {0}")]
  Dns(String),
  #[error("HTTP parse error: {0}")]
  Http(&'static str),
  #[error(transparent)]
  WebSocket(#[from] WebSocketError),
  #[error("invalid call for the current state")]
  InvalidState,
}

impl Error {
  /// Whether this error came from the socket layer rather than a protocol
  /// or lifecycle violation.
  pub fn is_transport(&self) -> bool {
    matches!(self, Error::Io(_))
  }
}

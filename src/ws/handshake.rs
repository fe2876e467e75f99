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

//! RFC 6455 opening handshake, both sides. Version 13 only; no extensions
//! are negotiated.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha1::Digest;
use sha1::Sha1;

use crate::error::WebSocketError;
use crate::http::HttpRequest;
use crate::http::HttpResponse;

const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Generates a random 16-byte nonce, base64-encoded, for
/// `Sec-WebSocket-Key`.
pub fn generate_key() -> String {
  STANDARD.encode(rand::random::<[u8; 16]>())
}

/// The server's handshake proof: `base64(sha1(key + GUID))`.
pub fn accept_key(key: &str) -> String {
  let mut sha1 = Sha1::new();
  sha1.update(key.as_bytes());
  sha1.update(WEBSOCKET_GUID.as_bytes());
  STANDARD.encode(sha1.finalize())
}

/// Validates a client upgrade request and returns the accept key to send
/// back.
pub(crate) fn validate_upgrade_request(
  request: &HttpRequest,
) -> Result<String, WebSocketError> {
  let upgrade = request
    .header_value("Upgrade")
    .ok_or(WebSocketError::InvalidUpgradeRequest)?;
  if !upgrade.trim().eq_ignore_ascii_case("websocket") {
    return Err(WebSocketError::InvalidUpgradeRequest);
  }

  let connection = request
    .header_value("Connection")
    .ok_or(WebSocketError::InvalidUpgradeRequest)?;
  if !connection.to_ascii_lowercase().contains("upgrade") {
    return Err(WebSocketError::InvalidUpgradeRequest);
  }

  let version = request
    .header_value("Sec-WebSocket-Version")
    .ok_or(WebSocketError::InvalidSecWebsocketVersion)?;
  if version.trim() != "13" {
    return Err(WebSocketError::InvalidSecWebsocketVersion);
  }

  let key = request
    .header_value("Sec-WebSocket-Key")
    .ok_or(WebSocketError::MissingSecWebSocketKey)?;
  Ok(accept_key(key.trim()))
}

/// Builds the `101 Switching Protocols` reply. The caller terminates the
/// header block after adding any extra headers.
pub(crate) fn make_upgrade_response(
  response: &mut HttpResponse,
  accept: &str,
) {
  response
    .set_begin(101)
    .set_header("Connection", "Upgrade")
    .set_header("Upgrade", "websocket")
    .set_header("Sec-WebSocket-Accept", accept);
}

/// Builds the client upgrade request for `path` with the given nonce key.
pub(crate) fn make_upgrade_request(
  request: &mut HttpRequest,
  host: &str,
  path: &str,
  key: &str,
) {
  request
    .set_begin("GET", path)
    .set_header("Host", host)
    .set_header("Upgrade", "websocket")
    .set_header("Connection", "Upgrade")
    .set_header("Sec-WebSocket-Key", key)
    .set_header("Sec-WebSocket-Version", "13")
    .set_body(b"");
}

/// Validates the server's reply against the key the client sent.
pub(crate) fn validate_upgrade_response(
  response: &HttpResponse,
  sent_key: &str,
) -> Result<(), WebSocketError> {
  if response.status() != 101 {
    return Err(WebSocketError::InvalidUpgradeResponse);
  }
  let accept = response
    .header_value("Sec-WebSocket-Accept")
    .ok_or(WebSocketError::InvalidUpgradeResponse)?;
  if accept.trim() != accept_key(sent_key) {
    return Err(WebSocketError::InvalidSecWebsocketAccept);
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  // RFC 6455 section 1.3 sample handshake
  const SAMPLE_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";
  const SAMPLE_ACCEPT: &str = "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=";

  #[test]
  fn rfc_sample_accept_key() {
    assert_eq!(accept_key(SAMPLE_KEY), SAMPLE_ACCEPT);
  }

  #[test]
  fn generated_keys_decode_to_16_bytes() {
    let key = generate_key();
    assert_eq!(STANDARD.decode(&key).unwrap().len(), 16);
    assert_ne!(key, generate_key());
  }

  fn sample_request() -> HttpRequest {
    let mut request = HttpRequest::new();
    request
      .set_begin("GET", "/chat")
      .set_header("Host", "server.example.com")
      .set_header("Upgrade", "websocket")
      .set_header("Connection", "Upgrade")
      .set_header("Sec-WebSocket-Key", SAMPLE_KEY)
      .set_header("Sec-WebSocket-Version", "13")
      .set_body(b"");
    request
  }

  #[test]
  fn valid_request_yields_accept() {
    assert_eq!(
      validate_upgrade_request(&sample_request()).unwrap(),
      SAMPLE_ACCEPT
    );
  }

  #[test]
  fn keep_alive_upgrade_connection_accepted() {
    let mut request = HttpRequest::new();
    request
      .set_begin("GET", "/")
      .set_header("Upgrade", "websocket")
      .set_header("Connection", "keep-alive, Upgrade")
      .set_header("Sec-WebSocket-Key", SAMPLE_KEY)
      .set_header("Sec-WebSocket-Version", "13")
      .set_body(b"");
    assert!(validate_upgrade_request(&request).is_ok());
  }

  #[test]
  fn wrong_version_rejected() {
    let mut request = HttpRequest::new();
    request
      .set_begin("GET", "/")
      .set_header("Upgrade", "websocket")
      .set_header("Connection", "Upgrade")
      .set_header("Sec-WebSocket-Key", SAMPLE_KEY)
      .set_header("Sec-WebSocket-Version", "8")
      .set_body(b"");
    assert!(matches!(
      validate_upgrade_request(&request),
      Err(WebSocketError::InvalidSecWebsocketVersion)
    ));
  }

  #[test]
  fn missing_key_rejected() {
    let mut request = HttpRequest::new();
    request
      .set_begin("GET", "/")
      .set_header("Upgrade", "websocket")
      .set_header("Connection", "Upgrade")
      .set_header("Sec-WebSocket-Version", "13")
      .set_body(b"");
    assert!(matches!(
      validate_upgrade_request(&request),
      Err(WebSocketError::MissingSecWebSocketKey)
    ));
  }

  #[test]
  fn response_round_trip_validates() {
    let mut response = HttpResponse::new();
    make_upgrade_response(&mut response, &accept_key(SAMPLE_KEY));
    response.set_body(b"");

    let mut parsed = HttpResponse::new();
    assert!(parsed.receive_header(response.as_bytes()));
    assert!(validate_upgrade_response(&parsed, SAMPLE_KEY).is_ok());
    assert!(matches!(
      validate_upgrade_response(&parsed, "b3RoZXIgbm9uY2UgdmFsdWU="),
      Err(WebSocketError::InvalidSecWebsocketAccept)
    ));
  }

  #[test]
  fn non_101_response_rejected() {
    let mut response = HttpResponse::new();
    response.make_error_response(400, "no");
    let mut parsed = HttpResponse::new();
    assert!(parsed.receive_header(response.as_bytes()));
    assert!(matches!(
      validate_upgrade_response(&parsed, SAMPLE_KEY),
      Err(WebSocketError::InvalidUpgradeResponse)
    ));
  }
}

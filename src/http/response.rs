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

use std::borrow::Cow;

use crate::buffer::Buffer;
use crate::http::find_byte;
use crate::http::find_crlf;
use crate::http::status_phrase;
use crate::http::Span;

/// An HTTP/1.1 response: builder and incremental parser over one cache
/// buffer, mirroring [`crate::http::HttpRequest`] with a status line instead
/// of a request line.
///
/// A response without `Content-Length` is terminated by a trailing empty
/// line or by peer close (the session overlay finalizes it on disconnect).
#[derive(Default)]
pub struct HttpResponse {
  error: Option<&'static str>,
  status: u16,
  phrase: Span,
  protocol: Span,
  headers: Vec<(Span, Span)>,
  body_index: usize,
  body_size: usize,
  body_length: usize,
  body_length_provided: bool,
  header_received: bool,
  complete: bool,
  message_end: usize,
  cache: Buffer,
  cache_size: usize,
}

impl HttpResponse {
  pub fn new() -> Self {
    Self::default()
  }

  /// `true` while no wire bytes have been appended (built or received).
  pub fn is_empty(&self) -> bool {
    self.cache.is_empty()
  }

  pub fn is_error_set(&self) -> bool {
    self.error.is_some()
  }

  pub fn error(&self) -> Option<&'static str> {
    self.error
  }

  pub fn status(&self) -> u16 {
    self.status
  }

  pub fn status_phrase(&self) -> &str {
    self.phrase.str(&self.cache)
  }

  pub fn protocol(&self) -> &str {
    self.protocol.str(&self.cache)
  }

  pub fn headers_count(&self) -> usize {
    self.headers.len()
  }

  pub fn header(&self, index: usize) -> Option<(&str, &str)> {
    self
      .headers
      .get(index)
      .map(|(name, value)| (name.str(&self.cache), value.str(&self.cache)))
  }

  pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
    self
      .headers
      .iter()
      .map(|(name, value)| (name.str(&self.cache), value.str(&self.cache)))
  }

  /// First header with the given name, case-insensitive.
  pub fn header_value(&self, name: &str) -> Option<&str> {
    self
      .headers()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v)
  }

  pub fn body(&self) -> &[u8] {
    &self.cache.as_slice()[self.body_index..self.body_index + self.body_size]
  }

  pub fn body_str(&self) -> Cow<'_, str> {
    self.cache.extract_string(self.body_index, self.body_size)
  }

  pub fn body_length(&self) -> usize {
    self.body_length
  }

  pub fn body_length_provided(&self) -> bool {
    self.body_length_provided
  }

  /// The response's wire bytes.
  pub fn as_bytes(&self) -> &[u8] {
    self.cache.as_slice()
  }

  // --- builder ---

  pub fn clear(&mut self) -> &mut Self {
    *self = HttpResponse {
      cache: std::mem::take(&mut self.cache),
      ..HttpResponse::default()
    };
    self.cache.clear();
    self
  }

  /// Starts a status line with protocol `HTTP/1.1` and the standard reason
  /// phrase for `status`.
  pub fn set_begin(&mut self, status: u16) -> &mut Self {
    self.set_begin_with_phrase(status, status_phrase(status))
  }

  pub fn set_begin_with_phrase(
    &mut self,
    status: u16,
    phrase: &str,
  ) -> &mut Self {
    self.clear();
    let protocol = "HTTP/1.1";
    self.protocol = Span::new(self.cache.len(), protocol.len());
    self.cache.append_str(protocol);
    self.cache.append_char(' ');
    self.status = status;
    self.cache.append_str(&status.to_string());
    self.cache.append_char(' ');
    self.phrase = Span::new(self.cache.len(), phrase.len());
    self.cache.append_str(phrase);
    self.cache.append_str("\r\n");
    self
  }

  pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
    let name_span = Span::new(self.cache.len(), name.len());
    self.cache.append_str(name);
    self.cache.append_str(": ");
    let value_span = Span::new(self.cache.len(), value.len());
    self.cache.append_str(value);
    self.cache.append_str("\r\n");
    self.headers.push((name_span, value_span));
    self
  }

  /// Emits a `Set-Cookie` header with the standard attribute set.
  #[allow(clippy::too_many_arguments)]
  pub fn set_cookie(
    &mut self,
    name: &str,
    value: &str,
    max_age: u64,
    domain: &str,
    path: &str,
    secure: bool,
    strict: bool,
    http_only: bool,
  ) -> &mut Self {
    let mut cookie = format!("{}={}; Max-Age={}", name, value, max_age);
    if !domain.is_empty() {
      cookie.push_str("; Domain=");
      cookie.push_str(domain);
    }
    if !path.is_empty() {
      cookie.push_str("; Path=");
      cookie.push_str(path);
    }
    if secure {
      cookie.push_str("; Secure");
    }
    if strict {
      cookie.push_str("; SameSite=Strict");
    }
    if http_only {
      cookie.push_str("; HttpOnly");
    }
    self.set_header("Set-Cookie", &cookie)
  }

  /// Terminates the header block with a `Content-Length` and appends the
  /// body.
  pub fn set_body(&mut self, body: impl AsRef<[u8]>) -> &mut Self {
    let body = body.as_ref();
    let length = body.len().to_string();
    self.set_header("Content-Length", &length);
    self.cache.append_str("\r\n");
    self.body_index = self.cache.len();
    self.cache.append(body);
    self.body_size = body.len();
    self.body_length = body.len();
    self.body_length_provided = true;
    self.header_received = true;
    self.complete = true;
    self.message_end = self.cache.len();
    self.cache_size = self.cache.len();
    self
  }

  /// Terminates the header block declaring `length` body bytes to follow.
  pub fn set_body_length(&mut self, length: usize) -> &mut Self {
    let value = length.to_string();
    self.set_header("Content-Length", &value);
    self.cache.append_str("\r\n");
    self.body_index = self.cache.len();
    self.body_size = 0;
    self.body_length = length;
    self.body_length_provided = true;
    self.header_received = true;
    self.complete = length == 0;
    self.message_end = self.cache.len();
    self.cache_size = self.cache.len();
    self
  }

  pub fn make_ok_response(&mut self) -> &mut Self {
    self.set_begin(200).set_body(b"")
  }

  pub fn make_error_response(
    &mut self,
    status: u16,
    content: &str,
  ) -> &mut Self {
    self
      .set_begin(status)
      .set_header("Content-Type", "text/plain; charset=UTF-8")
      .set_body(content)
  }

  pub fn make_head_response(&mut self) -> &mut Self {
    self.set_begin(200).set_body(b"")
  }

  pub fn make_options_response(&mut self, allow: &str) -> &mut Self {
    self.set_begin(200).set_header("Allow", allow).set_body(b"")
  }

  /// Echoes the request's wire bytes back as `message/http` content.
  pub fn make_trace_response(&mut self, request: &[u8]) -> &mut Self {
    self
      .set_begin(200)
      .set_header("Content-Type", "message/http")
      .set_body(request)
  }

  // --- parser ---

  pub fn is_pending_header(&self) -> bool {
    self.error.is_none() && !self.header_received
  }

  pub fn is_pending_body(&self) -> bool {
    self.error.is_none() && self.header_received && !self.complete
  }

  pub fn is_complete(&self) -> bool {
    self.complete
  }

  /// Appends `data` and tries to finish the status line and headers.
  /// Returns `true` once the header block is fully parsed.
  pub fn receive_header(&mut self, data: &[u8]) -> bool {
    self.cache.append(data);
    if self.error.is_some() {
      return false;
    }
    if self.header_received {
      return true;
    }

    let scan_from = self.cache_size.saturating_sub(3);
    let terminator = {
      let bytes = self.cache.as_slice();
      let mut i = scan_from;
      let mut found = None;
      while i + 4 <= bytes.len() {
        if &bytes[i..i + 4] == b"\r\n\r\n" {
          found = Some(i);
          break;
        }
        i += 1;
      }
      found
    };

    let end = match terminator {
      Some(end) => end,
      None => {
        self.cache_size = self.cache.len();
        return false;
      }
    };

    match parse_head(self.cache.as_slice(), end) {
      Ok(head) => {
        self.protocol = head.protocol;
        self.status = head.status;
        self.phrase = head.phrase;
        self.headers = head.headers;
        self.body_length = head.body_length;
        self.body_length_provided = head.body_length_provided;
        self.header_received = true;
        self.body_index = end + 4;
        self.body_size = self.cache.len() - self.body_index;
        self.cache_size = self.cache.len();
        self.update_body_state();
        true
      }
      Err(message) => {
        self.error = Some(message);
        false
      }
    }
  }

  /// Appends `data` to the body. Returns `true` once the message is
  /// complete.
  pub fn receive_body(&mut self, data: &[u8]) -> bool {
    self.cache.append(data);
    if self.error.is_some() || !self.header_received {
      return false;
    }
    self.cache_size = self.cache.len();
    if self.complete {
      return true;
    }
    self.body_size += data.len();
    self.update_body_state();
    self.complete
  }

  /// Peer close ends a response whose length was never declared.
  pub(crate) fn complete_on_close(&mut self) -> bool {
    if self.error.is_none() && self.header_received && !self.complete {
      self.body_length = self.body_size;
      self.message_end = self.body_index + self.body_size;
      self.complete = true;
      return true;
    }
    false
  }

  /// Bytes buffered beyond the end of the complete message (for WebSocket
  /// upgrades, frames that followed the 101 in the same segment).
  pub(crate) fn take_surplus(&mut self) -> Vec<u8> {
    if !self.complete || self.message_end >= self.cache.len() {
      return Vec::new();
    }
    self.cache.as_slice()[self.message_end..].to_vec()
  }

  fn update_body_state(&mut self) {
    if self.body_length_provided {
      if self.body_size >= self.body_length {
        self.body_size = self.body_length;
        self.message_end = self.body_index + self.body_length;
        self.complete = true;
      }
      return;
    }

    let body_end = self.body_index + self.body_size;
    let bytes = self.cache.as_slice();
    if self.body_size >= 4 && bytes[..body_end].ends_with(b"\r\n\r\n") {
      self.body_size -= 4;
      self.body_length = self.body_size;
      self.message_end = body_end;
      self.complete = true;
    }
  }
}

struct ParsedHead {
  protocol: Span,
  status: u16,
  phrase: Span,
  headers: Vec<(Span, Span)>,
  body_length: usize,
  body_length_provided: bool,
}

/// Parses the header block `bytes[..end + 2]` where `end` is the position of
/// the `\r\n\r\n` terminator.
fn parse_head(bytes: &[u8], end: usize) -> Result<ParsedHead, &'static str> {
  let limit = end + 2;
  let mut start = 0;

  // status line: PROTOCOL SP STATUS [SP PHRASE] CRLF
  let line_end =
    find_crlf(bytes, start, limit).ok_or("Invalid HTTP response")?;
  let sp1 = find_byte(bytes, start, line_end, b' ')
    .ok_or("Invalid HTTP protocol version")?;
  if sp1 == start {
    return Err("Invalid HTTP protocol version");
  }
  let protocol = Span::new(start, sp1 - start);

  let mut pos = sp1 + 1;
  let mut status = 0u16;
  let mut digits = 0;
  while pos < line_end && bytes[pos] != b' ' {
    if !bytes[pos].is_ascii_digit() {
      return Err("Invalid HTTP status");
    }
    status = status.saturating_mul(10).saturating_add((bytes[pos] - b'0') as u16);
    digits += 1;
    pos += 1;
  }
  if digits == 0 {
    return Err("Invalid HTTP status");
  }
  let phrase = if pos < line_end {
    Span::new(pos + 1, line_end - pos - 1)
  } else {
    Span::new(pos, 0)
  };

  let mut head = ParsedHead {
    protocol,
    status,
    phrase,
    headers: Vec::new(),
    body_length: 0,
    body_length_provided: false,
  };
  start = line_end + 2;

  while start < limit {
    let line_end =
      find_crlf(bytes, start, limit).ok_or("Invalid HTTP header")?;
    let colon =
      find_byte(bytes, start, line_end, b':').ok_or("Invalid HTTP header")?;
    if colon == start {
      return Err("Invalid HTTP header name");
    }
    let name = Span::new(start, colon - start);

    let mut value_start = colon + 1;
    while value_start < line_end
      && (bytes[value_start] == b' ' || bytes[value_start] == b'\t')
    {
      value_start += 1;
    }
    let value = Span::new(value_start, line_end - value_start);
    head.headers.push((name, value));

    if bytes[start..colon].eq_ignore_ascii_case(b"content-length") {
      let mut length = 0usize;
      for &digit in &bytes[value_start..line_end] {
        if !digit.is_ascii_digit() {
          return Err("Invalid Content-Length value");
        }
        length = length * 10 + (digit - b'0') as usize;
      }
      head.body_length = length;
      head.body_length_provided = true;
    }

    start = line_end + 2;
  }

  Ok(head)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_status_line() {
    let mut response = HttpResponse::new();
    assert!(response.receive_header(
      b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi"
    ));
    assert_eq!(response.protocol(), "HTTP/1.1");
    assert_eq!(response.status(), 200);
    assert_eq!(response.status_phrase(), "OK");
    assert_eq!(response.body(), b"hi");
    assert!(response.is_complete());
  }

  #[test]
  fn multiword_phrase_and_missing_phrase() {
    let mut response = HttpResponse::new();
    assert!(response.receive_header(
      b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\n\r\n"
    ));
    assert_eq!(response.status(), 101);
    assert_eq!(response.status_phrase(), "Switching Protocols");

    let mut terse = HttpResponse::new();
    assert!(terse
      .receive_header(b"HTTP/1.1 204\r\nContent-Length: 0\r\n\r\n"));
    assert_eq!(terse.status(), 204);
    assert_eq!(terse.status_phrase(), "");
  }

  #[test]
  fn non_digit_status_sets_error() {
    let mut response = HttpResponse::new();
    assert!(!response.receive_header(b"HTTP/1.1 2a0 OK\r\n\r\n"));
    assert!(response.is_error_set());
  }

  #[test]
  fn undeclared_length_finishes_on_close() {
    let mut response = HttpResponse::new();
    assert!(response.receive_header(b"HTTP/1.1 200 OK\r\n\r\npartial"));
    assert!(response.is_pending_body());
    response.receive_body(b" data");
    assert!(response.is_pending_body());
    assert!(response.complete_on_close());
    assert_eq!(response.body(), b"partial data");
  }

  #[test]
  fn undeclared_length_finishes_on_terminator() {
    let mut response = HttpResponse::new();
    assert!(response.receive_header(b"HTTP/1.1 200 OK\r\n\r\nbody"));
    assert!(response.receive_body(b"\r\n\r\n"));
    assert_eq!(response.body(), b"body");
  }

  #[test]
  fn builder_output_reparses_identically() {
    let mut built = HttpResponse::new();
    built
      .set_begin(404)
      .set_header("Server", "fastnet")
      .set_body(b"missing");

    let mut parsed = HttpResponse::new();
    assert!(parsed.receive_header(built.as_bytes()));
    assert_eq!(parsed.status(), 404);
    assert_eq!(parsed.status_phrase(), "Not Found");
    assert_eq!(parsed.header_value("Server"), Some("fastnet"));
    assert_eq!(parsed.body(), b"missing");
  }

  #[test]
  fn cookie_attributes_are_emitted() {
    let mut response = HttpResponse::new();
    response.set_begin(200).set_cookie(
      "sid", "42", 86400, "example.com", "/", true, true, true,
    );
    response.set_body(b"");
    let wire = String::from_utf8(response.as_bytes().to_vec()).unwrap();
    assert!(wire.contains(
      "Set-Cookie: sid=42; Max-Age=86400; Domain=example.com; Path=/; Secure; SameSite=Strict; HttpOnly\r\n"
    ));
  }

  #[test]
  fn error_response_has_plain_text_type() {
    let mut response = HttpResponse::new();
    response.make_error_response(500, "boom");
    assert_eq!(response.status(), 500);
    assert_eq!(
      response.header_value("Content-Type"),
      Some("text/plain; charset=UTF-8")
    );
    assert_eq!(response.body(), b"boom");
  }

  #[test]
  fn split_at_every_point_round_trips() {
    let wire: &[u8] =
      b"HTTP/1.1 201 Created\r\nLocation: /x/1\r\nContent-Length: 3\r\n\r\nnew";
    for k in 0..=wire.len() {
      let mut response = HttpResponse::new();
      if !response.receive_header(&wire[..k]) {
        if response.is_pending_header() {
          response.receive_header(&wire[k..]);
        } else {
          response.receive_body(&wire[k..]);
        }
      } else {
        response.receive_body(&wire[k..]);
      }
      assert!(response.is_complete(), "split at {}", k);
      assert_eq!(response.status(), 201);
      assert_eq!(response.header_value("location"), Some("/x/1"));
      assert_eq!(response.body(), b"new");
    }
  }
}

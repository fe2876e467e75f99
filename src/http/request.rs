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
use crate::http::Span;

/// Methods that carry no body unless a `Content-Length` says otherwise.
const BODYLESS_METHODS: [&[u8]; 5] =
  [b"HEAD", b"GET", b"DELETE", b"OPTIONS", b"TRACE"];

/// An HTTP/1.1 request: builder and incremental parser over one cache buffer.
///
/// Builder setters append wire bytes as they are called, so the cache is
/// byte-identical to the eventual output at every step. The parser consumes
/// bytes appended by the transport layer and re-enters the header scan from
/// where the previous read stopped, keeping total scanning linear.
///
/// Not thread-safe; the owning session serializes access.
#[derive(Default)]
pub struct HttpRequest {
  error: Option<&'static str>,
  method: Span,
  url: Span,
  protocol: Span,
  headers: Vec<(Span, Span)>,
  cookies: Vec<(Span, Span)>,
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

impl HttpRequest {
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

  pub fn method(&self) -> &str {
    self.method.str(&self.cache)
  }

  pub fn url(&self) -> &str {
    self.url.str(&self.cache)
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

  pub fn cookies_count(&self) -> usize {
    self.cookies.len()
  }

  pub fn cookies(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
    self
      .cookies
      .iter()
      .map(|(name, value)| (name.str(&self.cache), value.str(&self.cache)))
  }

  pub fn cookie(&self, name: &str) -> Option<&str> {
    self.cookies().find(|(n, _)| *n == name).map(|(_, v)| v)
  }

  pub fn body(&self) -> &[u8] {
    &self.cache.as_slice()[self.body_index..self.body_index + self.body_size]
  }

  pub fn body_str(&self) -> Cow<'_, str> {
    self.cache.extract_string(self.body_index, self.body_size)
  }

  /// Declared body length; meaningful when
  /// [`HttpRequest::body_length_provided`] is `true`.
  pub fn body_length(&self) -> usize {
    self.body_length
  }

  /// Whether the message carried a `Content-Length` header.
  pub fn body_length_provided(&self) -> bool {
    self.body_length_provided
  }

  /// The request's wire bytes.
  pub fn as_bytes(&self) -> &[u8] {
    self.cache.as_slice()
  }

  // --- builder ---

  pub fn clear(&mut self) -> &mut Self {
    *self = HttpRequest {
      cache: std::mem::take(&mut self.cache),
      ..HttpRequest::default()
    };
    self.cache.clear();
    self
  }

  /// Starts a request line with protocol `HTTP/1.1`.
  pub fn set_begin(&mut self, method: &str, url: &str) -> &mut Self {
    self.set_begin_with_protocol(method, url, "HTTP/1.1")
  }

  pub fn set_begin_with_protocol(
    &mut self,
    method: &str,
    url: &str,
    protocol: &str,
  ) -> &mut Self {
    self.clear();
    self.method = Span::new(self.cache.len(), method.len());
    self.cache.append_str(method);
    self.cache.append_char(' ');
    self.url = Span::new(self.cache.len(), url.len());
    self.cache.append_str(url);
    self.cache.append_char(' ');
    self.protocol = Span::new(self.cache.len(), protocol.len());
    self.cache.append_str(protocol);
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

  /// Emits a `Cookie` header and records the pair.
  pub fn set_cookie(&mut self, name: &str, value: &str) -> &mut Self {
    let header_name = Span::new(self.cache.len(), "Cookie".len());
    self.cache.append_str("Cookie: ");
    let name_span = Span::new(self.cache.len(), name.len());
    self.cache.append_str(name);
    self.cache.append_char('=');
    let value_span = Span::new(self.cache.len(), value.len());
    self.cache.append_str(value);
    let header_value =
      Span::new(name_span.offset, self.cache.len() - name_span.offset);
    self.cache.append_str("\r\n");
    self.headers.push((header_name, header_value));
    self.cookies.push((name_span, value_span));
    self
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

  /// Terminates the header block declaring `length` body bytes to follow
  /// through the transport.
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

  pub fn make_head_request(&mut self, url: &str) -> &mut Self {
    self.set_begin("HEAD", url).set_body(b"")
  }

  pub fn make_get_request(&mut self, url: &str) -> &mut Self {
    self.set_begin("GET", url).set_body(b"")
  }

  pub fn make_post_request(&mut self, url: &str, content: impl AsRef<[u8]>) -> &mut Self {
    self.set_begin("POST", url).set_body(content)
  }

  pub fn make_put_request(&mut self, url: &str, content: impl AsRef<[u8]>) -> &mut Self {
    self.set_begin("PUT", url).set_body(content)
  }

  pub fn make_delete_request(&mut self, url: &str) -> &mut Self {
    self.set_begin("DELETE", url).set_body(b"")
  }

  pub fn make_options_request(&mut self, url: &str) -> &mut Self {
    self.set_begin("OPTIONS", url).set_body(b"")
  }

  pub fn make_trace_request(&mut self, url: &str) -> &mut Self {
    self.set_begin("TRACE", url).set_body(b"")
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

  /// Appends `data` to the cache and tries to finish the header block.
  /// Returns `true` once the header is fully parsed; `false` while more
  /// bytes are needed or on a structural violation (which also sets the
  /// error flag).
  pub fn receive_header(&mut self, data: &[u8]) -> bool {
    self.cache.append(data);
    if self.error.is_some() {
      return false;
    }
    if self.header_received {
      return true;
    }

    // Re-enter three bytes back to catch a terminator split across reads.
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

    let parsed = parse_head(self.cache.as_slice(), end);
    match parsed {
      Ok(head) => {
        self.method = head.method;
        self.url = head.url;
        self.protocol = head.protocol;
        self.headers = head.headers;
        self.cookies = head.cookies;
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

  /// Bytes buffered beyond the end of the complete message, belonging to a
  /// pipelined successor.
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

    let method = self.method.slice(&self.cache);
    if BODYLESS_METHODS.iter().any(|m| *m == method) {
      self.body_size = 0;
      self.body_length = 0;
      self.message_end = self.body_index;
      self.complete = true;
      return;
    }

    // Terminator-delimited body: complete on a trailing empty line, which
    // is excluded from the body itself.
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
  method: Span,
  url: Span,
  protocol: Span,
  headers: Vec<(Span, Span)>,
  cookies: Vec<(Span, Span)>,
  body_length: usize,
  body_length_provided: bool,
}

/// Parses the header block `bytes[..end + 2]` where `end` is the position of
/// the `\r\n\r\n` terminator.
fn parse_head(bytes: &[u8], end: usize) -> Result<ParsedHead, &'static str> {
  let limit = end + 2;
  let mut start = 0;

  // request line
  let line_end = find_crlf(bytes, start, limit).ok_or("Invalid HTTP request")?;
  let sp1 =
    find_byte(bytes, start, line_end, b' ').ok_or("Invalid HTTP method")?;
  if sp1 == start {
    return Err("Invalid HTTP method");
  }
  let sp2 = find_byte(bytes, sp1 + 1, line_end, b' ').ok_or("Invalid URL")?;
  if sp2 == sp1 + 1 {
    return Err("Invalid URL");
  }
  if sp2 + 1 == line_end {
    return Err("Invalid HTTP protocol version");
  }
  let mut head = ParsedHead {
    method: Span::new(start, sp1 - start),
    url: Span::new(sp1 + 1, sp2 - sp1 - 1),
    protocol: Span::new(sp2 + 1, line_end - sp2 - 1),
    headers: Vec::new(),
    cookies: Vec::new(),
    body_length: 0,
    body_length_provided: false,
  };
  start = line_end + 2;

  // headers
  while start < limit {
    let line_end = find_crlf(bytes, start, limit).ok_or("Invalid HTTP header")?;
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

    let name_bytes = &bytes[start..colon];
    if name_bytes.eq_ignore_ascii_case(b"content-length") {
      let mut length = 0usize;
      for &digit in &bytes[value_start..line_end] {
        if !digit.is_ascii_digit() {
          return Err("Invalid Content-Length value");
        }
        length = length * 10 + (digit - b'0') as usize;
      }
      head.body_length = length;
      head.body_length_provided = true;
    } else if name_bytes.eq_ignore_ascii_case(b"cookie") {
      split_cookies(bytes, value, &mut head.cookies);
    }

    start = line_end + 2;
  }

  Ok(head)
}

/// Splits a `Cookie` header value into name/value pairs.
///
/// Tokens are separated by `;`, with `=` between name and value; whitespace
/// around either part is skipped, and a token without `=` is dropped.
pub(crate) fn split_cookies(
  bytes: &[u8],
  value: Span,
  out: &mut Vec<(Span, Span)>,
) {
  enum State {
    Start,
    InName,
    EqSeen,
    InValue,
  }

  let end = value.offset + value.size;
  let mut state = State::Start;
  let mut name = Span::default();
  let mut val = Span::default();

  for i in value.offset..end {
    let b = bytes[i];
    match state {
      State::Start => {
        if b != b' ' && b != b'\t' && b != b';' {
          name = Span::new(i, 1);
          state = State::InName;
        }
      }
      State::InName => {
        if b == b'=' {
          val = Span::new(i + 1, 0);
          state = State::EqSeen;
        } else if b == b';' {
          state = State::Start;
        } else if b != b' ' && b != b'\t' {
          name.size = i + 1 - name.offset;
        }
      }
      State::EqSeen => {
        if b == b';' {
          out.push((name, Span::new(i, 0)));
          state = State::Start;
        } else if b != b' ' && b != b'\t' {
          val = Span::new(i, 1);
          state = State::InValue;
        }
      }
      State::InValue => {
        if b == b';' {
          out.push((name, val));
          state = State::Start;
        } else if b != b' ' && b != b'\t' {
          val.size = i + 1 - val.offset;
        }
      }
    }
  }

  match state {
    State::EqSeen => out.push((name, Span::new(end, 0))),
    State::InValue => out.push((name, val)),
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn feed(request: &mut HttpRequest, chunks: &[&[u8]]) {
    for chunk in chunks {
      if request.is_pending_header() {
        request.receive_header(chunk);
      } else {
        request.receive_body(chunk);
      }
    }
  }

  #[test]
  fn parses_get_in_one_shot() {
    let mut request = HttpRequest::new();
    assert!(request.receive_header(b"GET /index HTTP/1.1\r\nHost: x\r\n\r\n"));
    assert!(!request.is_error_set());
    assert_eq!(request.method(), "GET");
    assert_eq!(request.url(), "/index");
    assert_eq!(request.protocol(), "HTTP/1.1");
    assert_eq!(request.headers_count(), 1);
    assert_eq!(request.header(0), Some(("Host", "x")));
    assert_eq!(request.body_length(), 0);
    assert!(request.is_complete());
  }

  #[test]
  fn parses_post_body_across_reads() {
    let mut request = HttpRequest::new();
    assert!(request
      .receive_header(b"POST /a HTTP/1.1\r\nContent-Length: 5\r\n\r\nhel"));
    assert!(request.is_pending_body());
    assert_eq!(request.body().len(), 3);
    assert!(request.receive_body(b"lo"));
    assert_eq!(request.body(), b"hello");
    assert_eq!(request.body_length(), 5);
    assert!(request.body_length_provided());
  }

  #[test]
  fn any_split_point_parses_identically() {
    let wire: &[u8] = b"POST /submit HTTP/1.1\r\nHost: example.com\r\nCookie: id=7; theme=dark\r\nContent-Length: 4\r\n\r\nbody";
    for k in 0..=wire.len() {
      let mut request = HttpRequest::new();
      feed(&mut request, &[&wire[..k]]);
      let scanned_after_first = request.cache_size;
      feed(&mut request, &[&wire[k..]]);
      assert!(request.cache_size >= scanned_after_first, "split at {}", k);
      assert!(request.is_complete(), "split at {}", k);
      assert!(!request.is_error_set(), "split at {}", k);
      assert_eq!(request.method(), "POST");
      assert_eq!(request.url(), "/submit");
      assert_eq!(request.header_value("host"), Some("example.com"));
      assert_eq!(request.cookie("id"), Some("7"));
      assert_eq!(request.cookie("theme"), Some("dark"));
      assert_eq!(request.body(), b"body");
    }
  }

  #[test]
  fn header_terminator_split_byte_by_byte() {
    let wire: &[u8] = b"GET / HTTP/1.1\r\nHost: a\r\n\r\n";
    let mut request = HttpRequest::new();
    for (i, byte) in wire.iter().enumerate() {
      let done = request.receive_header(&[*byte]);
      assert_eq!(done, i == wire.len() - 1);
    }
    assert_eq!(request.header_value("Host"), Some("a"));
  }

  #[test]
  fn cookie_whitespace_variants() {
    let mut request = HttpRequest::new();
    assert!(request
      .receive_header(b"GET / HTTP/1.1\r\nCookie: a=1; b=2 ;c=3\r\n\r\n"));
    let cookies: Vec<_> = request.cookies().collect();
    assert_eq!(cookies, vec![("a", "1"), ("b", "2"), ("c", "3")]);
  }

  #[test]
  fn cookie_without_value_is_dropped() {
    let mut request = HttpRequest::new();
    assert!(request
      .receive_header(b"GET / HTTP/1.1\r\nCookie: bare; x=; a=1\r\n\r\n"));
    let cookies: Vec<_> = request.cookies().collect();
    assert_eq!(cookies, vec![("x", ""), ("a", "1")]);
  }

  #[test]
  fn empty_header_value_accepted_empty_name_rejected() {
    let mut request = HttpRequest::new();
    assert!(request.receive_header(b"GET / HTTP/1.1\r\nX-Empty:\r\n\r\n"));
    assert_eq!(request.header_value("X-Empty"), Some(""));

    let mut bad = HttpRequest::new();
    assert!(!bad.receive_header(b"GET / HTTP/1.1\r\n: value\r\n\r\n"));
    assert!(bad.is_error_set());
  }

  #[test]
  fn missing_colon_sets_error() {
    let mut request = HttpRequest::new();
    assert!(!request.receive_header(b"GET / HTTP/1.1\r\nBroken header\r\n\r\n"));
    assert!(request.is_error_set());
  }

  #[test]
  fn non_digit_content_length_sets_error() {
    let mut request = HttpRequest::new();
    assert!(!request
      .receive_header(b"POST / HTTP/1.1\r\nContent-Length: 5x\r\n\r\n"));
    assert!(request.is_error_set());
  }

  #[test]
  fn builder_output_reparses_identically() {
    let mut built = HttpRequest::new();
    built
      .set_begin("POST", "/api/items")
      .set_header("Host", "localhost")
      .set_cookie("session", "abc123")
      .set_body(b"payload!");

    let mut parsed = HttpRequest::new();
    assert!(parsed.receive_header(built.as_bytes()));
    assert_eq!(parsed.method(), "POST");
    assert_eq!(parsed.url(), "/api/items");
    assert_eq!(parsed.header_value("Host"), Some("localhost"));
    assert_eq!(parsed.header_value("Cookie"), Some("session=abc123"));
    assert_eq!(parsed.cookie("session"), Some("abc123"));
    assert_eq!(parsed.body(), b"payload!");
    assert_eq!(parsed.body_length(), 8);
    assert!(parsed.is_complete());
  }

  #[test]
  fn get_request_helper_is_complete() {
    let mut request = HttpRequest::new();
    request.make_get_request("/status");
    assert!(request.as_bytes().starts_with(b"GET /status HTTP/1.1\r\n"));
    assert!(request.as_bytes().ends_with(b"Content-Length: 0\r\n\r\n"));
  }

  #[test]
  fn pipelined_surplus_is_recoverable() {
    let mut request = HttpRequest::new();
    let wire = b"POST /a HTTP/1.1\r\nContent-Length: 2\r\n\r\nhiGET /b HTTP/1.1\r\n\r\n";
    assert!(request.receive_header(wire));
    assert!(request.is_complete());
    assert_eq!(request.body(), b"hi");
    let surplus = request.take_surplus();
    assert_eq!(surplus, b"GET /b HTTP/1.1\r\n\r\n");
  }
}

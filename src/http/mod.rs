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

//! HTTP/1.1 message codec and the session overlays that apply it to TCP
//! transports. Messages are incremental: the same object accumulates wire
//! bytes across partial reads and re-enters the scan where it left off.
//!
//! Framing is `Content-Length` only; chunked transfer encoding and HTTP/2
//! are out of scope.

mod client;
mod request;
mod response;
mod server;
mod session;

pub use client::HttpClient;
pub use client::HttpClientHandler;
pub use request::HttpRequest;
pub use response::HttpResponse;
pub use server::HttpServer;
pub use session::HttpHandler;
pub use session::HttpSession;

use crate::buffer::Buffer;

/// A byte range into a message's cache buffer.
#[derive(Clone, Copy, Default)]
pub(crate) struct Span {
  pub(crate) offset: usize,
  pub(crate) size: usize,
}

impl Span {
  pub(crate) fn new(offset: usize, size: usize) -> Self {
    Span { offset, size }
  }

  pub(crate) fn slice<'a>(&self, cache: &'a Buffer) -> &'a [u8] {
    &cache.as_slice()[self.offset..self.offset + self.size]
  }

  pub(crate) fn str<'a>(&self, cache: &'a Buffer) -> &'a str {
    std::str::from_utf8(self.slice(cache)).unwrap_or("")
  }
}

/// Scans for the next `\r\n` at or after `from`, up to `limit` (exclusive of
/// the pair's second byte).
pub(crate) fn find_crlf(bytes: &[u8], from: usize, limit: usize) -> Option<usize> {
  let mut i = from;
  while i + 2 <= limit {
    if bytes[i] == b'\r' && bytes[i + 1] == b'\n' {
      return Some(i);
    }
    i += 1;
  }
  None
}

pub(crate) fn find_byte(
  bytes: &[u8],
  from: usize,
  limit: usize,
  needle: u8,
) -> Option<usize> {
  bytes[from..limit].iter().position(|&b| b == needle).map(|p| from + p)
}

/// Standard reason phrase for a status code.
pub(crate) fn status_phrase(status: u16) -> &'static str {
  match status {
    100 => "Continue",
    101 => "Switching Protocols",
    200 => "OK",
    201 => "Created",
    202 => "Accepted",
    204 => "No Content",
    206 => "Partial Content",
    301 => "Moved Permanently",
    302 => "Found",
    304 => "Not Modified",
    307 => "Temporary Redirect",
    308 => "Permanent Redirect",
    400 => "Bad Request",
    401 => "Unauthorized",
    403 => "Forbidden",
    404 => "Not Found",
    405 => "Method Not Allowed",
    408 => "Request Timeout",
    409 => "Conflict",
    410 => "Gone",
    411 => "Length Required",
    413 => "Payload Too Large",
    415 => "Unsupported Media Type",
    416 => "Range Not Satisfiable",
    426 => "Upgrade Required",
    429 => "Too Many Requests",
    500 => "Internal Server Error",
    501 => "Not Implemented",
    502 => "Bad Gateway",
    503 => "Service Unavailable",
    504 => "Gateway Timeout",
    505 => "HTTP Version Not Supported",
    _ => "Unknown",
  }
}

/// MIME type for a file extension, with or without the leading dot.
pub fn mime_type(extension: &str) -> Option<&'static str> {
  let ext = extension.strip_prefix('.').unwrap_or(extension);
  let mime = match ext.to_ascii_lowercase().as_str() {
    "html" | "htm" => "text/html",
    "css" => "text/css",
    "js" => "text/javascript",
    "json" => "application/json",
    "xml" => "application/xml",
    "txt" => "text/plain",
    "csv" => "text/csv",
    "md" => "text/markdown",
    "png" => "image/png",
    "jpg" | "jpeg" => "image/jpeg",
    "gif" => "image/gif",
    "svg" => "image/svg+xml",
    "ico" => "image/x-icon",
    "webp" => "image/webp",
    "pdf" => "application/pdf",
    "zip" => "application/zip",
    "gz" => "application/gzip",
    "tar" => "application/x-tar",
    "wasm" => "application/wasm",
    "wav" => "audio/wav",
    "mp3" => "audio/mpeg",
    "mp4" => "video/mp4",
    "webm" => "video/webm",
    _ => return None,
  };
  Some(mime)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mime_lookup() {
    assert_eq!(mime_type(".json"), Some("application/json"));
    assert_eq!(mime_type("html"), Some("text/html"));
    assert_eq!(mime_type("JPG"), Some("image/jpeg"));
    assert_eq!(mime_type(".unknown"), None);
  }

  #[test]
  fn phrases_for_common_codes() {
    assert_eq!(status_phrase(200), "OK");
    assert_eq!(status_phrase(101), "Switching Protocols");
    assert_eq!(status_phrase(404), "Not Found");
    assert_eq!(status_phrase(999), "Unknown");
  }
}

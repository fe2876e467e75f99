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

use std::fmt;
use std::io;
use std::net::SocketAddr;

/// A host/port pair, resolved to a socket address at bind or connect time.
///
/// Servers keep their `Endpoint` across `restart`, so a hostname is
/// re-resolved on every `start`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
  host: String,
  port: u16,
}

impl Endpoint {
  pub fn new(host: impl Into<String>, port: u16) -> Self {
    Endpoint {
      host: host.into(),
      port,
    }
  }

  pub fn host(&self) -> &str {
    &self.host
  }

  pub fn port(&self) -> u16 {
    self.port
  }

  /// Resolves to the first matching socket address.
  pub async fn resolve(&self) -> io::Result<SocketAddr> {
    let mut addrs =
      tokio::net::lookup_host((self.host.as_str(), self.port)).await?;
    addrs.next().ok_or_else(|| {
      io::Error::new(
        io::ErrorKind::NotFound,
        format!("no address found for {}", self),
      )
    })
  }
}

impl From<SocketAddr> for Endpoint {
  fn from(addr: SocketAddr) -> Self {
    Endpoint {
      host: addr.ip().to_string(),
      port: addr.port(),
    }
  }
}

impl From<(&str, u16)> for Endpoint {
  fn from((host, port): (&str, u16)) -> Self {
    Endpoint::new(host, port)
  }
}

impl fmt::Display for Endpoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.host, self.port)
  }
}

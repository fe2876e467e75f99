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
use std::time::Duration;

use async_trait::async_trait;
use fastnet::Endpoint;
use fastnet::ServerState;
use fastnet::Session;
use fastnet::SessionHandler;
use fastnet::SessionState;
use fastnet::TcpClient;
use fastnet::TcpServer;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn init_logging() {
  let _ = env_logger::builder().is_test(true).try_init();
}

struct Echo;

#[async_trait]
impl SessionHandler for Echo {
  async fn on_received(&mut self, session: &Arc<Session>, data: &[u8]) {
    session.send_async(data);
  }
}

struct Collect {
  tx: mpsc::UnboundedSender<Vec<u8>>,
}

#[async_trait]
impl SessionHandler for Collect {
  async fn on_received(&mut self, _session: &Arc<Session>, data: &[u8]) {
    let _ = self.tx.send(data.to_vec());
  }
}

async fn recv_exactly(
  rx: &mut mpsc::UnboundedReceiver<Vec<u8>>,
  n: usize,
) -> Vec<u8> {
  let mut out = Vec::new();
  while out.len() < n {
    let chunk = timeout(WAIT, rx.recv())
      .await
      .expect("timed out waiting for bytes")
      .expect("channel closed early");
    out.extend_from_slice(&chunk);
  }
  out
}

async fn eventually(mut condition: impl FnMut() -> bool) {
  for _ in 0..1000 {
    if condition() {
      return;
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
  }
  panic!("condition not reached within the deadline");
}

#[tokio::test]
async fn echo_five_bytes() {
  init_logging();
  let server = TcpServer::new(("127.0.0.1", 0), || {
    Box::new(Echo) as Box<dyn SessionHandler>
  });
  server.start().await.unwrap();
  let addr = server.local_addr().unwrap();

  let (tx, mut rx) = mpsc::unbounded_channel();
  let client = TcpClient::new(Endpoint::from(addr));
  let session = client.connect(Box::new(Collect { tx })).await.unwrap();
  assert!(session.is_connected());

  assert_eq!(session.send(b"hello").await, 5);
  let echoed = recv_exactly(&mut rx, 5).await;
  assert_eq!(String::from_utf8(echoed).unwrap(), "hello");

  client.disconnect().await;
  server.stop().await.unwrap();
}

#[tokio::test]
async fn send_async_bursts_arrive_in_order() {
  init_logging();
  let (tx, mut rx) = mpsc::unbounded_channel();
  let server = TcpServer::new(("127.0.0.1", 0), move || {
    Box::new(Collect { tx: tx.clone() }) as Box<dyn SessionHandler>
  });
  server.start().await.unwrap();
  let addr = server.local_addr().unwrap();

  let client = TcpClient::new(Endpoint::from(addr));
  let session = client
    .connect(Box::new(Echo) as Box<dyn SessionHandler>)
    .await
    .unwrap();

  let mut expected = Vec::new();
  for i in 0..100u32 {
    let part = format!("part-{:03};", i);
    expected.extend_from_slice(part.as_bytes());
    assert!(session.send_async(part.as_bytes()));
  }

  let received = recv_exactly(&mut rx, expected.len()).await;
  assert_eq!(received, expected);

  client.disconnect().await;
  server.stop().await.unwrap();
}

struct Announce {
  tx: mpsc::UnboundedSender<Arc<Session>>,
}

#[async_trait]
impl SessionHandler for Announce {
  async fn on_connected(&mut self, session: &Arc<Session>) {
    let _ = self.tx.send(session.clone());
  }
}

#[tokio::test]
async fn session_table_tracks_connected_state() {
  init_logging();
  let (tx, mut rx) = mpsc::unbounded_channel();
  let server = TcpServer::new(("127.0.0.1", 0), move || {
    Box::new(Announce { tx: tx.clone() }) as Box<dyn SessionHandler>
  });
  server.start().await.unwrap();
  let addr = server.local_addr().unwrap();

  let client = TcpClient::new(Endpoint::from(addr));
  let session = client
    .connect(Box::new(Echo) as Box<dyn SessionHandler>)
    .await
    .unwrap();

  let server_side = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
  assert_eq!(server_side.state(), SessionState::Connected);
  let found = server.find_session(server_side.id()).unwrap();
  assert_eq!(found.id(), server_side.id());
  assert_eq!(server.connected_sessions(), 1);

  client.disconnect().await;
  assert_eq!(session.state(), SessionState::Disconnected);
  {
    let server = &server;
    eventually(move || server.connected_sessions() == 0).await;
  }
  let server_side_id = server_side.id();
  {
    let server_side = &server_side;
    eventually(move || server_side.state() == SessionState::Disconnected).await;
  }
  assert!(server.find_session(server_side_id).is_none());

  server.stop().await.unwrap();
  assert_eq!(server.state(), ServerState::Stopped);
}

#[tokio::test]
async fn multicast_reaches_every_session() {
  init_logging();
  let server = TcpServer::new(("127.0.0.1", 0), || {
    Box::new(Echo) as Box<dyn SessionHandler>
  });
  server.start().await.unwrap();
  let addr = server.local_addr().unwrap();

  let (tx1, mut rx1) = mpsc::unbounded_channel();
  let (tx2, mut rx2) = mpsc::unbounded_channel();
  let client1 = TcpClient::new(Endpoint::from(addr));
  let client2 = TcpClient::new(Endpoint::from(addr));
  client1.connect(Box::new(Collect { tx: tx1 })).await.unwrap();
  client2.connect(Box::new(Collect { tx: tx2 })).await.unwrap();

  {
    let server = &server;
    eventually(move || server.connected_sessions() == 2).await;
  }

  assert_eq!(server.multicast(b"broadcast"), 2);
  assert_eq!(recv_exactly(&mut rx1, 9).await, b"broadcast");
  assert_eq!(recv_exactly(&mut rx2, 9).await, b"broadcast");

  server.disconnect_all().await;
  {
    let server = &server;
    eventually(move || server.connected_sessions() == 0).await;
  }
  server.stop().await.unwrap();
}

#[tokio::test]
async fn server_restart_preserves_endpoint() {
  init_logging();
  let server = TcpServer::new(("127.0.0.1", 0), || {
    Box::new(Echo) as Box<dyn SessionHandler>
  });
  server.start().await.unwrap();
  assert_eq!(server.state(), ServerState::Started);
  assert!(server.start().await.is_err());

  server.restart().await.unwrap();
  assert_eq!(server.state(), ServerState::Started);

  // still serving after restart
  let addr = server.local_addr().unwrap();
  let (tx, mut rx) = mpsc::unbounded_channel();
  let client = TcpClient::new(Endpoint::from(addr));
  let session = client.connect(Box::new(Collect { tx })).await.unwrap();
  session.send_async(b"ping");
  assert_eq!(recv_exactly(&mut rx, 4).await, b"ping");

  client.disconnect().await;
  server.stop().await.unwrap();
  assert!(server.stop().await.is_err());
}

#[tokio::test]
async fn disconnected_session_rejects_io() {
  init_logging();
  let server = TcpServer::new(("127.0.0.1", 0), || {
    Box::new(Echo) as Box<dyn SessionHandler>
  });
  server.start().await.unwrap();
  let addr = server.local_addr().unwrap();

  let client = TcpClient::new(Endpoint::from(addr));
  let session = client
    .connect(Box::new(Echo) as Box<dyn SessionHandler>)
    .await
    .unwrap();

  assert!(session.disconnect().await);
  assert_eq!(session.state(), SessionState::Disconnected);
  assert!(!session.send_async(b"late"));
  assert_eq!(session.send(b"late").await, 0);
  assert!(!session.disconnect_async());

  server.stop().await.unwrap();
}

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
use fastnet::ws::WsHandler;
use fastnet::Endpoint;
use fastnet::Frame;
use fastnet::OpCode;
use fastnet::SessionState;
use fastnet::WsClient;
use fastnet::WsServer;
use fastnet::WsSession;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn init_logging() {
  let _ = env_logger::builder().is_test(true).try_init();
}

struct EchoWs;

#[async_trait]
impl WsHandler for EchoWs {
  async fn on_ws_received(
    &mut self,
    ws: &Arc<WsSession>,
    opcode: OpCode,
    payload: &[u8],
  ) {
    match opcode {
      OpCode::Text => {
        ws.send_text_async(std::str::from_utf8(payload).unwrap())
      }
      _ => ws.send_binary_async(payload),
    };
  }
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
async fn handshake_and_text_echo() {
  init_logging();
  let server = WsServer::new(("127.0.0.1", 0), || {
    Box::new(EchoWs) as Box<dyn WsHandler>
  });
  server.start().await.unwrap();
  let endpoint = Endpoint::from(server.local_addr().unwrap());

  let client = WsClient::new(endpoint, "/chat");
  let ws = client.connect().await.unwrap();
  assert!(ws.is_connected());

  assert!(client.send_text("Hello").await > 0);
  let echoed = timeout(WAIT, client.receive_text()).await.unwrap().unwrap();
  assert_eq!(echoed, "Hello");

  client.disconnect().await;
  server.stop().await.unwrap();
}

#[tokio::test]
async fn binary_echo_with_large_payload() {
  init_logging();
  let server = WsServer::new(("127.0.0.1", 0), || {
    Box::new(EchoWs) as Box<dyn WsHandler>
  });
  server.start().await.unwrap();
  let endpoint = Endpoint::from(server.local_addr().unwrap());

  let client = WsClient::new(endpoint, "/");
  client.connect().await.unwrap();

  // 70 000 bytes exercises the 64-bit length encoding end to end
  let payload: Vec<u8> = (0..70_000u32).map(|i| (i % 241) as u8).collect();
  client.send_binary(&payload).await;
  let echoed =
    timeout(WAIT, client.receive_binary()).await.unwrap().unwrap();
  assert_eq!(echoed, payload);

  client.disconnect().await;
  server.stop().await.unwrap();
}

/// Sends `Hello` fragmented into TEXT+CONTINUATION with a PING in between.
struct FragmentedGreeter {
  pongs: mpsc::UnboundedSender<Vec<u8>>,
}

#[async_trait]
impl WsHandler for FragmentedGreeter {
  async fn on_ws_connected(&mut self, ws: &Arc<WsSession>) {
    ws.send_frame_async(Frame::new(
      false,
      OpCode::Text,
      None,
      b"Hel".to_vec(),
    ));
    ws.send_ping_async(b"mid-message");
    ws.send_frame_async(Frame::new(
      true,
      OpCode::Continuation,
      None,
      b"lo".to_vec(),
    ));
  }

  async fn on_ws_pong(&mut self, _ws: &Arc<WsSession>, payload: &[u8]) {
    let _ = self.pongs.send(payload.to_vec());
  }
}

#[tokio::test]
async fn fragmented_message_assembles_once_and_ping_gets_one_pong() {
  init_logging();
  let (pongs_tx, mut pongs_rx) = mpsc::unbounded_channel();
  let server = WsServer::new(("127.0.0.1", 0), move || {
    Box::new(FragmentedGreeter {
      pongs: pongs_tx.clone(),
    }) as Box<dyn WsHandler>
  });
  server.start().await.unwrap();
  let endpoint = Endpoint::from(server.local_addr().unwrap());

  let client = WsClient::new(endpoint, "/");
  client.connect().await.unwrap();

  // the client reassembles exactly one "Hello" despite the interleaved ping
  let message = timeout(WAIT, client.receive_text()).await.unwrap().unwrap();
  assert_eq!(message, "Hello");

  // the client's automatic pong echoed the ping payload
  let pong = timeout(WAIT, pongs_rx.recv()).await.unwrap().unwrap();
  assert_eq!(pong, b"mid-message");

  client.disconnect().await;
  server.stop().await.unwrap();
}

struct PongProbe {
  pongs: mpsc::UnboundedSender<Vec<u8>>,
}

#[async_trait]
impl WsHandler for PongProbe {
  async fn on_ws_pong(&mut self, _ws: &Arc<WsSession>, payload: &[u8]) {
    let _ = self.pongs.send(payload.to_vec());
  }
}

#[tokio::test]
async fn client_ping_is_answered_by_server() {
  init_logging();
  let server = WsServer::new(("127.0.0.1", 0), || {
    Box::new(EchoWs) as Box<dyn WsHandler>
  });
  server.start().await.unwrap();
  let endpoint = Endpoint::from(server.local_addr().unwrap());

  let (pongs_tx, mut pongs_rx) = mpsc::unbounded_channel();
  let client = WsClient::new(endpoint, "/");
  let ws = client
    .connect_with(Box::new(PongProbe { pongs: pongs_tx }))
    .await
    .unwrap();

  ws.send_ping_async(b"probe-42");
  let pong = timeout(WAIT, pongs_rx.recv()).await.unwrap().unwrap();
  assert_eq!(pong, b"probe-42");

  client.disconnect().await;
  server.stop().await.unwrap();
}

struct CloseProbe {
  closes: mpsc::UnboundedSender<(u16, Vec<u8>)>,
}

#[async_trait]
impl WsHandler for CloseProbe {
  async fn on_ws_close(
    &mut self,
    _ws: &Arc<WsSession>,
    code: u16,
    reason: &[u8],
  ) {
    let _ = self.closes.send((code, reason.to_vec()));
  }
}

#[tokio::test]
async fn close_with_status_and_reason_disconnects() {
  init_logging();
  let (closes_tx, mut closes_rx) = mpsc::unbounded_channel();
  let server = WsServer::new(("127.0.0.1", 0), move || {
    Box::new(CloseProbe {
      closes: closes_tx.clone(),
    }) as Box<dyn WsHandler>
  });
  server.start().await.unwrap();
  let endpoint = Endpoint::from(server.local_addr().unwrap());

  let client = WsClient::new(endpoint, "/");
  let ws = client.connect().await.unwrap();

  client.close(1000, b"bye").await;

  let (code, reason) = timeout(WAIT, closes_rx.recv()).await.unwrap().unwrap();
  assert_eq!(code, 1000);
  assert_eq!(reason, b"bye");

  assert_eq!(ws.session().state(), SessionState::Disconnected);
  {
    let server = &server;
    eventually(move || server.connected_sessions() == 0).await;
  }
  server.stop().await.unwrap();
}

#[tokio::test]
async fn multicast_text_reaches_all_clients() {
  init_logging();
  let server = WsServer::new(("127.0.0.1", 0), || {
    Box::new(EchoWs) as Box<dyn WsHandler>
  });
  server.start().await.unwrap();
  let endpoint = Endpoint::from(server.local_addr().unwrap());

  let client1 = WsClient::new(endpoint.clone(), "/");
  let client2 = WsClient::new(endpoint, "/");
  client1.connect().await.unwrap();
  client2.connect().await.unwrap();

  {
    let server = &server;
    eventually(move || server.connected_sessions() == 2).await;
  }
  assert_eq!(server.multicast_text("announcement"), 2);

  let first = timeout(WAIT, client1.receive_text()).await.unwrap().unwrap();
  let second = timeout(WAIT, client2.receive_text()).await.unwrap().unwrap();
  assert_eq!(first, "announcement");
  assert_eq!(second, "announcement");

  client1.disconnect().await;
  client2.disconnect().await;
  server.stop().await.unwrap();
}

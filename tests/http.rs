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
use fastnet::http::HttpClientHandler;
use fastnet::http::HttpHandler;
use fastnet::Endpoint;
use fastnet::HttpClient;
use fastnet::HttpRequest;
use fastnet::HttpResponse;
use fastnet::HttpServer;
use fastnet::Session;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn init_logging() {
  let _ = env_logger::builder().is_test(true).try_init();
}

/// Answers GET with `ok:<url>` and echoes the body of everything else.
struct Api;

#[async_trait]
impl HttpHandler for Api {
  async fn on_received_request(
    &mut self,
    session: &Arc<Session>,
    request: &HttpRequest,
  ) {
    let mut response = HttpResponse::new();
    if request.method() == "GET" {
      response
        .set_begin(200)
        .set_header("Server", "fastnet")
        .set_body(format!("ok:{}", request.url()));
    } else {
      response.set_begin(200).set_body(request.body().to_vec());
    }
    session.send_async(response.as_bytes());
  }
}

struct Sink {
  tx: mpsc::UnboundedSender<(u16, Vec<u8>)>,
}

#[async_trait]
impl HttpClientHandler for Sink {
  async fn on_received_response(
    &mut self,
    _session: &Arc<Session>,
    response: &HttpResponse,
  ) {
    let _ = self.tx.send((response.status(), response.body().to_vec()));
  }
}

async fn start_server() -> (HttpServer, Endpoint) {
  let server =
    HttpServer::new(("127.0.0.1", 0), || Box::new(Api) as Box<dyn HttpHandler>);
  server.start().await.unwrap();
  let endpoint = Endpoint::from(server.local_addr().unwrap());
  (server, endpoint)
}

#[tokio::test]
async fn get_round_trip() {
  init_logging();
  let (server, endpoint) = start_server().await;

  let (tx, mut rx) = mpsc::unbounded_channel();
  let client = HttpClient::new(endpoint);
  client.connect(Box::new(Sink { tx })).await.unwrap();

  let mut request = HttpRequest::new();
  request.make_get_request("/index");
  assert!(client.send_request(&request).await > 0);

  let (status, body) = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
  assert_eq!(status, 200);
  assert_eq!(body, b"ok:/index");

  client.disconnect().await;
  server.stop().await.unwrap();
}

#[tokio::test]
async fn keep_alive_serves_sequential_requests() {
  init_logging();
  let (server, endpoint) = start_server().await;

  let (tx, mut rx) = mpsc::unbounded_channel();
  let client = HttpClient::new(endpoint);
  client.connect(Box::new(Sink { tx })).await.unwrap();

  let mut request = HttpRequest::new();
  request.make_get_request("/first");
  client.send_request(&request).await;
  let (_, body) = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
  assert_eq!(body, b"ok:/first");

  // same connection, next exchange
  request.make_post_request("/echo", b"posted payload");
  client.send_request(&request).await;
  let (status, body) = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
  assert_eq!(status, 200);
  assert_eq!(body, b"posted payload");

  assert!(client.is_connected());
  client.disconnect().await;
  server.stop().await.unwrap();
}

#[tokio::test]
async fn large_post_crosses_read_boundaries() {
  init_logging();
  let (server, endpoint) = start_server().await;

  let (tx, mut rx) = mpsc::unbounded_channel();
  let client = HttpClient::new(endpoint);
  client.connect(Box::new(Sink { tx })).await.unwrap();

  let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
  let mut request = HttpRequest::new();
  request.make_post_request("/upload", &payload);
  client.send_request(&request).await;

  let (status, body) = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
  assert_eq!(status, 200);
  assert_eq!(body, payload);

  client.disconnect().await;
  server.stop().await.unwrap();
}

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

//! RFC 6455 WebSocket: frame codec, opening handshake, fragmented-message
//! assembly, and the server/client overlays bridging HTTP upgrades to frame
//! I/O. Version 13 only; permessage-deflate is not supported.

mod client;
mod close;
mod fragment;
mod frame;
/// Opening handshake.
pub mod handshake;
mod mask;
mod server;
mod session;

pub use client::WsClient;
pub use client::WssClient;
pub use close::CloseCode;
pub use fragment::FragmentCollector;
pub use frame::is_control;
pub use frame::Frame;
pub use frame::FrameDecoder;
pub use frame::OpCode;
pub use mask::unmask;
pub use server::WsServer;
pub use server::WssServer;
pub use session::Role;
pub use session::WsClientSession;
pub use session::WsHandler;
pub use session::WsServerSession;
pub use session::WsSession;

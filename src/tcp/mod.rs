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

mod client;
mod server;

pub use client::ClientOptions;
pub use client::TcpClient;
pub use server::ServerOptions;
pub use server::ServerState;
pub use server::TcpServer;

pub(crate) use client::TlsConnect;
pub(crate) use server::ServerCore;
pub(crate) use server::StreamAcceptor;

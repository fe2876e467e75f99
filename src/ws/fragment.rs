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

use crate::error::WebSocketError;
use crate::ws::frame::Frame;
use crate::ws::frame::OpCode;

/// Reassembles fragmented messages: a TEXT/BINARY frame without FIN opens a
/// message, CONTINUATION frames append, FIN closes it. Control frames pass
/// through without touching the assembly state, so they may interleave with
/// a fragmented message. Text messages are UTF-8 validated once assembled.
pub struct FragmentCollector {
  opcode: Option<OpCode>,
  buffer: Vec<u8>,
  max_message_size: usize,
}

impl Default for FragmentCollector {
  fn default() -> Self {
    Self::new()
  }
}

impl FragmentCollector {
  pub fn new() -> Self {
    FragmentCollector {
      opcode: None,
      buffer: Vec::new(),
      max_message_size: 64 << 20,
    }
  }

  pub fn set_max_message_size(&mut self, max_message_size: usize) {
    self.max_message_size = max_message_size;
  }

  /// Whether a fragmented message is still waiting for its FIN frame.
  pub fn is_assembling(&self) -> bool {
    self.opcode.is_some()
  }

  /// Feeds one frame; returns a complete message frame when one finishes.
  pub fn accept(
    &mut self,
    frame: Frame,
  ) -> Result<Option<Frame>, WebSocketError> {
    match frame.opcode {
      OpCode::Text | OpCode::Binary => {
        if self.opcode.is_some() {
          return Err(WebSocketError::InvalidFragment);
        }
        if frame.fin {
          if frame.opcode == OpCode::Text && !frame.is_utf8() {
            return Err(WebSocketError::InvalidUTF8);
          }
          return Ok(Some(frame));
        }
        self.opcode = Some(frame.opcode);
        self.buffer.clear();
        self.buffer.extend_from_slice(&frame.payload);
        Ok(None)
      }
      OpCode::Continuation => {
        let opcode =
          self.opcode.ok_or(WebSocketError::InvalidContinuationFrame)?;
        if self.buffer.len() + frame.payload.len() > self.max_message_size {
          return Err(WebSocketError::FrameTooLarge);
        }
        self.buffer.extend_from_slice(&frame.payload);
        if !frame.fin {
          return Ok(None);
        }
        self.opcode = None;
        let assembled =
          Frame::new(true, opcode, None, std::mem::take(&mut self.buffer));
        if opcode == OpCode::Text && !assembled.is_utf8() {
          return Err(WebSocketError::InvalidUTF8);
        }
        Ok(Some(assembled))
      }
      _ => Ok(Some(frame)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn two_part_text_assembles_once() {
    let mut collector = FragmentCollector::new();
    let first = Frame::new(false, OpCode::Text, None, b"Hel".to_vec());
    let second = Frame::new(true, OpCode::Continuation, None, b"lo".to_vec());

    assert!(collector.accept(first).unwrap().is_none());
    assert!(collector.is_assembling());
    let message = collector.accept(second).unwrap().unwrap();
    assert!(message.fin);
    assert_eq!(message.opcode, OpCode::Text);
    assert_eq!(message.payload, b"Hello");
    assert!(!collector.is_assembling());
  }

  #[test]
  fn ping_interleaves_without_disturbing_assembly() {
    let mut collector = FragmentCollector::new();
    let first = Frame::new(false, OpCode::Binary, None, vec![1, 2]);
    let ping = Frame::ping(b"keepalive".to_vec());
    let last = Frame::new(true, OpCode::Continuation, None, vec![3]);

    assert!(collector.accept(first).unwrap().is_none());
    let passed = collector.accept(ping).unwrap().unwrap();
    assert_eq!(passed.opcode, OpCode::Ping);
    let message = collector.accept(last).unwrap().unwrap();
    assert_eq!(message.payload, vec![1, 2, 3]);
  }

  #[test]
  fn continuation_without_start_is_rejected() {
    let mut collector = FragmentCollector::new();
    let orphan = Frame::new(true, OpCode::Continuation, None, vec![0]);
    assert!(matches!(
      collector.accept(orphan),
      Err(WebSocketError::InvalidContinuationFrame)
    ));
  }

  #[test]
  fn new_data_frame_inside_fragmented_message_is_rejected() {
    let mut collector = FragmentCollector::new();
    let first = Frame::new(false, OpCode::Text, None, b"a".to_vec());
    assert!(collector.accept(first).unwrap().is_none());
    let intruder = Frame::text(b"b".to_vec());
    assert!(matches!(
      collector.accept(intruder),
      Err(WebSocketError::InvalidFragment)
    ));
  }

  #[test]
  fn invalid_utf8_text_is_rejected() {
    let mut collector = FragmentCollector::new();
    let bad = Frame::text(vec![0xFF, 0xFE]);
    assert!(matches!(
      collector.accept(bad),
      Err(WebSocketError::InvalidUTF8)
    ));

    // split across fragments: only the assembled message is validated
    let first = Frame::new(false, OpCode::Text, None, vec![0xC3]);
    let second = Frame::new(true, OpCode::Continuation, None, vec![0xA9]);
    assert!(collector.accept(first).unwrap().is_none());
    let message = collector.accept(second).unwrap().unwrap();
    assert_eq!(message.payload, "é".as_bytes());
  }
}

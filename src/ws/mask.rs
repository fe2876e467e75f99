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

/// Applies the RFC 6455 4-byte XOR mask in place. Masking is an involution,
/// so the same call masks and unmasks.
pub fn unmask(payload: &mut [u8], mask: [u8; 4]) {
  let mut chunks = payload.chunks_exact_mut(4);
  for chunk in &mut chunks {
    chunk[0] ^= mask[0];
    chunk[1] ^= mask[1];
    chunk[2] ^= mask[2];
    chunk[3] ^= mask[3];
  }
  for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
    *byte ^= mask[i];
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unmask_small() {
    let mut payload = [0u8; 15];
    let mask = [1, 2, 3, 4];
    unmask(&mut payload, mask);
    assert_eq!(
      payload,
      [1, 2, 3, 4, 1, 2, 3, 4, 1, 2, 3, 4, 1, 2, 3]
    );
  }

  #[test]
  fn mask_is_involution() {
    let original: Vec<u8> = (0..=255).collect();
    let mut payload = original.clone();
    let mask = [0xDE, 0xAD, 0xBE, 0xEF];
    unmask(&mut payload, mask);
    assert_ne!(payload, original);
    unmask(&mut payload, mask);
    assert_eq!(payload, original);
  }
}

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
use std::ops::Index;

/// Growable append-only byte store.
///
/// The logical size is tracked independently of storage capacity; capacity
/// grows by doubling. `resize` guarantees `data[0..n]` is addressable but may
/// leave garbage beyond the previous size. Not thread-safe; the owning
/// session or message serializes access.
#[derive(Default)]
pub struct Buffer {
  data: Vec<u8>,
  size: usize,
}

impl Buffer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_capacity(capacity: usize) -> Self {
    Buffer {
      data: vec![0; capacity],
      size: 0,
    }
  }

  /// Logical length, not storage capacity.
  #[inline]
  pub fn len(&self) -> usize {
    self.size
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.size == 0
  }

  #[inline]
  pub fn capacity(&self) -> usize {
    self.data.len()
  }

  /// Read-only view of the logical contents.
  #[inline]
  pub fn as_slice(&self) -> &[u8] {
    &self.data[..self.size]
  }

  pub fn clear(&mut self) {
    self.size = 0;
  }

  /// Sets the logical size to `n`, growing storage as needed. Bytes between
  /// the old and new size are unspecified; the caller fills them.
  pub fn resize(&mut self, n: usize) {
    self.grow_to(n);
    self.size = n;
  }

  pub fn append(&mut self, bytes: &[u8]) {
    let offset = self.size;
    self.grow_to(offset + bytes.len());
    self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    self.size += bytes.len();
  }

  pub fn append_byte(&mut self, byte: u8) {
    self.grow_to(self.size + 1);
    self.data[self.size] = byte;
    self.size += 1;
  }

  pub fn append_str(&mut self, s: &str) {
    self.append(s.as_bytes());
  }

  /// Appends a single character, UTF-8 encoded.
  pub fn append_char(&mut self, c: char) {
    let mut utf8 = [0u8; 4];
    self.append(c.encode_utf8(&mut utf8).as_bytes());
  }

  /// Extracts `size` bytes starting at `offset` as a UTF-8 string. Invalid
  /// sequences are replaced.
  pub fn extract_string(&self, offset: usize, size: usize) -> Cow<'_, str> {
    String::from_utf8_lossy(&self.data[offset..offset + size])
  }

  fn grow_to(&mut self, needed: usize) {
    if needed <= self.data.len() {
      return;
    }
    let mut capacity = self.data.len().max(64);
    while capacity < needed {
      capacity *= 2;
    }
    self.data.resize(capacity, 0);
  }
}

impl Index<usize> for Buffer {
  type Output = u8;

  fn index(&self, index: usize) -> &u8 {
    &self.data[..self.size][index]
  }
}

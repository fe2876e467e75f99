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

/// Status codes used in CLOSE frames, RFC 6455 section 7.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
  /// 1000
  Normal,
  /// 1001
  Away,
  /// 1002
  Protocol,
  /// 1003
  Unsupported,
  /// 1005, reserved: no status code was present
  Status,
  /// 1006, reserved: abnormal closure
  Abnormal,
  /// 1007
  Invalid,
  /// 1008
  Policy,
  /// 1009
  Size,
  /// 1010
  Extension,
  /// 1011
  Error,
  /// 1012
  Restart,
  /// 1013
  Again,
  /// 1015, reserved: TLS failure
  Tls,
  /// Reserved ranges (1004, 1014, 1016-2999)
  Reserved(u16),
  /// Registered with IANA (3000-3999)
  Iana(u16),
  /// Application-defined (4000-4999)
  Library(u16),
  /// Out of range
  Bad(u16),
}

impl CloseCode {
  /// Whether the code may appear on the wire in a CLOSE frame.
  pub fn is_allowed(self) -> bool {
    !matches!(
      self,
      CloseCode::Bad(_)
        | CloseCode::Reserved(_)
        | CloseCode::Status
        | CloseCode::Abnormal
        | CloseCode::Tls
    )
  }
}

impl From<u16> for CloseCode {
  fn from(code: u16) -> Self {
    match code {
      1000 => CloseCode::Normal,
      1001 => CloseCode::Away,
      1002 => CloseCode::Protocol,
      1003 => CloseCode::Unsupported,
      1005 => CloseCode::Status,
      1006 => CloseCode::Abnormal,
      1007 => CloseCode::Invalid,
      1008 => CloseCode::Policy,
      1009 => CloseCode::Size,
      1010 => CloseCode::Extension,
      1011 => CloseCode::Error,
      1012 => CloseCode::Restart,
      1013 => CloseCode::Again,
      1015 => CloseCode::Tls,
      1004 | 1014 | 1016..=2999 => CloseCode::Reserved(code),
      3000..=3999 => CloseCode::Iana(code),
      4000..=4999 => CloseCode::Library(code),
      _ => CloseCode::Bad(code),
    }
  }
}

impl From<CloseCode> for u16 {
  fn from(code: CloseCode) -> Self {
    match code {
      CloseCode::Normal => 1000,
      CloseCode::Away => 1001,
      CloseCode::Protocol => 1002,
      CloseCode::Unsupported => 1003,
      CloseCode::Status => 1005,
      CloseCode::Abnormal => 1006,
      CloseCode::Invalid => 1007,
      CloseCode::Policy => 1008,
      CloseCode::Size => 1009,
      CloseCode::Extension => 1010,
      CloseCode::Error => 1011,
      CloseCode::Restart => 1012,
      CloseCode::Again => 1013,
      CloseCode::Tls => 1015,
      CloseCode::Reserved(code)
      | CloseCode::Iana(code)
      | CloseCode::Library(code)
      | CloseCode::Bad(code) => code,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wire_codes_round_trip() {
    for code in [1000u16, 1001, 1002, 1003, 1007, 1008, 1011, 3000, 4999] {
      let close = CloseCode::from(code);
      assert!(close.is_allowed(), "{}", code);
      assert_eq!(u16::from(close), code);
    }
  }

  #[test]
  fn reserved_codes_rejected() {
    for code in [999u16, 1004, 1005, 1006, 1014, 1015, 2999, 5000] {
      assert!(!CloseCode::from(code).is_allowed(), "{}", code);
    }
  }
}

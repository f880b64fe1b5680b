// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Versioned JSON envelope for bus payloads and stored session values:
//! `{"v": 1, "data": ...}`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tasktally_core::TasktallyError;

/// Envelope version written by this build.
pub const WIRE_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a, T: ?Sized> {
    v: u32,
    data: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    v: u32,
    data: serde_json::Value,
}

/// Wraps `value` in the current envelope.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, TasktallyError> {
    serde_json::to_vec(&EnvelopeRef {
        v: WIRE_VERSION,
        data: value,
    })
    .map_err(|e| TasktallyError::decode("failed to encode payload", e))
}

/// Unwraps an envelope, rejecting versions this build does not understand.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TasktallyError> {
    let envelope: Envelope = serde_json::from_slice(bytes)
        .map_err(|e| TasktallyError::decode("payload is not a versioned envelope", e))?;
    if envelope.v != WIRE_VERSION {
        return Err(TasktallyError::Decode {
            message: format!(
                "unsupported envelope version {} (expected {WIRE_VERSION})",
                envelope.v
            ),
            source: None,
        });
    }
    serde_json::from_value(envelope.data)
        .map_err(|e| TasktallyError::decode("payload has unexpected shape", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasktally_core::{AuthErrorKind, AuthNotification, ChatId};

    #[test]
    fn encodes_with_version_tag() {
        let bytes = encode(&AuthNotification::success(ChatId(42))).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["v"], 1);
        assert_eq!(value["data"]["chat_id"], 42);
    }

    #[test]
    fn decodes_current_version() {
        let bytes = br#"{"v":1,"data":{"chat_id":42,"successful":false,"type":"timeout"}}"#;
        let n: AuthNotification = decode(bytes).unwrap();
        assert_eq!(n.error_kind, Some(AuthErrorKind::Timeout));
    }

    #[test]
    fn rejects_unknown_version() {
        let err = decode::<AuthNotification>(br#"{"v":2,"data":{}}"#).unwrap_err();
        assert!(err.to_string().contains("unsupported envelope version 2"));
    }

    #[test]
    fn rejects_bare_payload() {
        let err = decode::<AuthNotification>(br#"{"chat_id":42,"successful":true}"#).unwrap_err();
        assert!(matches!(err, TasktallyError::Decode { .. }));
    }
}

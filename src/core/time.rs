//! Shared timestamp/identifier helpers for deterministic envelopes.

use serde_json::Value as JsonValue;
use ulid::Ulid;

/// Returns unix-epoch seconds as a signed integer.
pub fn now_epoch() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Returns unix-epoch seconds with `Z` suffix (e.g. `1771220592Z`).
pub fn now_epoch_z() -> String {
    format!("{}Z", now_epoch())
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Standard command response envelope shape used across CLI surfaces.
pub fn command_envelope(cmd: &str, status: &str, extra: JsonValue) -> JsonValue {
    let mut base = serde_json::json!({
        "envelope_version": "1.0.0",
        "ts": now_epoch_z(),
        "event_id": new_event_id(),
        "cmd": cmd,
        "status": status
    });
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_epoch_z_format() {
        let result = now_epoch_z();
        assert!(result.ends_with('Z'));
        let numeric_part = result.trim_end_matches('Z');
        assert!(numeric_part.parse::<i64>().is_ok());
    }

    #[test]
    fn test_new_event_id_is_unique() {
        let id1 = new_event_id();
        let id2 = new_event_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_command_envelope_merges_extra() {
        let extra = serde_json::json!({"instance": "abc", "score": 66.7});
        let envelope = command_envelope("instance.submit", "ok", extra);
        assert_eq!(envelope["cmd"], "instance.submit");
        assert_eq!(envelope["status"], "ok");
        assert_eq!(envelope["instance"], "abc");
        assert_eq!(envelope["score"], 66.7);
        assert!(envelope["ts"].is_string());
    }
}

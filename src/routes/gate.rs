//! Access gate — room-id validation and admin identity checks.
//!
//! DESIGN
//! ======
//! Applied at the top of every admin-only handler, before the engine is
//! reached: the room id must parse to a positive number, and the caller's
//! network address must be the one that created the room. Admin identity is
//! the creating IP — a deliberate simplification, not a security boundary
//! against network-level spoofing.

use std::net::IpAddr;

use crate::error::ApiError;
use crate::services::room;
use crate::state::AppState;

/// Parse a room id from a path or query string.
///
/// # Errors
///
/// Returns `BadRequest` unless the string parses to a positive number.
pub fn parse_room_id(raw: &str) -> Result<u32, ApiError> {
    match raw.trim().parse::<u32>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::BadRequest("Invalid room id".into())),
    }
}

/// Coerce a JSON body field into a room id. Clients send both numbers and
/// strings here.
///
/// # Errors
///
/// Returns `BadRequest` if the field is missing or not a positive number.
pub fn room_id_from_value(value: Option<&serde_json::Value>) -> Result<u32, ApiError> {
    match value {
        Some(serde_json::Value::Number(n)) => {
            let id = n
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .filter(|id| *id > 0)
                .ok_or_else(|| ApiError::BadRequest("Invalid room id".into()))?;
            Ok(id)
        }
        Some(serde_json::Value::String(s)) => parse_room_id(s),
        _ => Err(ApiError::BadRequest("Room id is required".into())),
    }
}

/// Short-circuit any admin-only mutation from a non-admin caller.
///
/// # Errors
///
/// Returns `Forbidden` unless `addr` created the room.
pub async fn require_admin(state: &AppState, room_id: u32, addr: IpAddr) -> Result<(), ApiError> {
    if room::is_admin(state, room_id, addr).await {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Only the room admin can do this".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_helpers::{self, ip};

    #[test]
    fn parse_accepts_positive_numbers() {
        assert_eq!(parse_room_id("123456").unwrap(), 123_456);
        assert_eq!(parse_room_id(" 7 ").unwrap(), 7);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_room_id("0").is_err());
        assert!(parse_room_id("-5").is_err());
        assert!(parse_room_id("abc").is_err());
        assert!(parse_room_id("").is_err());
        assert!(parse_room_id("12.5").is_err());
    }

    #[test]
    fn value_coercion_accepts_number_and_string() {
        assert_eq!(room_id_from_value(Some(&serde_json::json!(42))).unwrap(), 42);
        assert_eq!(room_id_from_value(Some(&serde_json::json!("42"))).unwrap(), 42);
    }

    #[test]
    fn value_coercion_rejects_missing_and_malformed() {
        assert!(room_id_from_value(None).is_err());
        assert!(room_id_from_value(Some(&serde_json::json!(null))).is_err());
        assert!(room_id_from_value(Some(&serde_json::json!(-1))).is_err());
        assert!(room_id_from_value(Some(&serde_json::json!([1]))).is_err());
    }

    #[tokio::test]
    async fn require_admin_distinguishes_addresses() {
        let state = test_helpers::test_app_state();
        let room_id = test_helpers::seed_room(&state, "A").await;

        assert!(require_admin(&state, room_id, ip(test_helpers::ADMIN_ADDR)).await.is_ok());

        let err = require_admin(&state, room_id, ip("10.0.0.9")).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn require_admin_is_forbidden_for_unknown_room() {
        let state = test_helpers::test_app_state();
        let err = require_admin(&state, 1, ip("10.0.0.1")).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }
}

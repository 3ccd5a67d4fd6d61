//! Validation helpers for DTOs.

use std::collections::HashSet;

use validator::ValidationError;

/// Longest player identifier accepted from clients.
pub const MAX_PLAYER_ID_LENGTH: usize = 64;

/// Validates that a player ID is non-blank, reasonably short and printable.
///
/// # Examples
///
/// ```ignore
/// validate_player_id("alice")     // Ok
/// validate_player_id("   ")       // Err - blank
/// validate_player_id("bob\n")     // Err - control character
/// ```
pub fn validate_player_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        let mut err = ValidationError::new("player_id_blank");
        err.message = Some("Player ID must not be blank".into());
        return Err(err);
    }

    if id.chars().count() > MAX_PLAYER_ID_LENGTH {
        let mut err = ValidationError::new("player_id_length");
        err.message = Some(
            format!(
                "Player ID must be at most {MAX_PLAYER_ID_LENGTH} characters (got {})",
                id.chars().count()
            )
            .into(),
        );
        return Err(err);
    }

    if id.chars().any(char::is_control) {
        let mut err = ValidationError::new("player_id_format");
        err.message = Some("Player ID must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates every ID of a list and rejects repeated entries.
pub fn validate_player_ids(ids: &[String]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for id in ids {
        validate_player_id(id)?;
        if !seen.insert(id.as_str()) {
            let mut err = ValidationError::new("player_id_duplicate");
            err.message = Some(format!("Player ID `{id}` is listed more than once").into());
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_player_id_valid() {
        assert!(validate_player_id("alice").is_ok());
        assert!(validate_player_id("player-42").is_ok());
        assert!(validate_player_id("Ž").is_ok());
    }

    #[test]
    fn test_validate_player_id_blank() {
        assert!(validate_player_id("").is_err());
        assert!(validate_player_id("   ").is_err());
    }

    #[test]
    fn test_validate_player_id_invalid_format() {
        assert!(validate_player_id("bob\n").is_err());
        assert!(validate_player_id(&"x".repeat(MAX_PLAYER_ID_LENGTH + 1)).is_err());
        assert!(validate_player_id(&"x".repeat(MAX_PLAYER_ID_LENGTH)).is_ok());
    }

    #[test]
    fn test_validate_player_ids_rejects_duplicates() {
        assert!(validate_player_ids(&["a".into(), "b".into()]).is_ok());
        let err = validate_player_ids(&["a".into(), "b".into(), "a".into()]).unwrap_err();
        assert_eq!(err.code, "player_id_duplicate");
    }
}

//! Validation helpers for DTOs.

use validator::ValidationError;

const MAX_DEVICE_ID_LEN: usize = 64;
const MAX_PLAYER_NAME_LEN: usize = 32;

/// Validates a display name once surrounding whitespace is trimmed.
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    let len = name.trim().chars().count();
    if len == 0 || len > MAX_PLAYER_NAME_LEN {
        let mut err = ValidationError::new("player_name_length");
        err.message = Some(
            format!("Name must contain between 1 and {MAX_PLAYER_NAME_LEN} characters (got {len})")
                .into(),
        );
        return Err(err);
    }
    Ok(())
}

/// Validates a client-persisted device identifier.
///
/// ```ignore
/// validate_device_id("3f2c9a1e-player")  // Ok
/// validate_device_id("")                 // Err - empty
/// validate_device_id("has space")        // Err - invalid character
/// ```
pub fn validate_device_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_DEVICE_ID_LEN {
        let mut err = ValidationError::new("device_id_length");
        err.message = Some(
            format!(
                "Device ID must contain between 1 and {MAX_DEVICE_ID_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("device_id_format");
        err.message = Some("Device ID may only contain letters, digits, '-' and '_'".into());
        return Err(err);
    }

    Ok(())
}

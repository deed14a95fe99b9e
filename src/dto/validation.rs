//! Validation helpers for DTOs.

use validator::ValidationError;

const MAX_DISPLAY_NAME_CHARS: usize = 24;
const MAX_FULL_NAME_CHARS: usize = 80;

/// Validates that a nickname is non-blank, short, and free of control characters.
///
/// # Examples
///
/// ```ignore
/// validate_display_name("Ana")       // Ok
/// validate_display_name("   ")       // Err - blank
/// validate_display_name("a\u{7}b")   // Err - control character
/// ```
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("display_name_blank");
        err.message = Some("Nickname must not be blank".into());
        return Err(err);
    }

    let length = trimmed.chars().count();
    if length > MAX_DISPLAY_NAME_CHARS {
        let mut err = ValidationError::new("display_name_length");
        err.message = Some(
            format!("Nickname must be at most {MAX_DISPLAY_NAME_CHARS} characters (got {length})")
                .into(),
        );
        return Err(err);
    }

    if trimmed.chars().any(char::is_control) {
        let mut err = ValidationError::new("display_name_format");
        err.message = Some("Nickname must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a loose international phone number: optional leading `+`, then
/// 6 to 15 digits, with spaces, dashes and dots allowed as separators.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let body = phone.trim().strip_prefix('+').unwrap_or(phone.trim());
    let mut digits = 0;
    for c in body.chars() {
        match c {
            '0'..='9' => digits += 1,
            ' ' | '-' | '.' => {}
            _ => {
                let mut err = ValidationError::new("phone_format");
                err.message = Some("Phone number may only contain digits and separators".into());
                return Err(err);
            }
        }
    }

    if !(6..=15).contains(&digits) {
        let mut err = ValidationError::new("phone_length");
        err.message = Some(format!("Phone number must have 6 to 15 digits (got {digits})").into());
        return Err(err);
    }

    Ok(())
}

/// Full names are free text; blank counts as absent.
pub fn validate_full_name(name: &str) -> Result<(), ValidationError> {
    let length = name.trim().chars().count();
    if length > MAX_FULL_NAME_CHARS {
        let mut err = ValidationError::new("full_name_length");
        err.message = Some(
            format!("Full name must be at most {MAX_FULL_NAME_CHARS} characters (got {length})")
                .into(),
        );
        return Err(err);
    }
    if name.chars().any(char::is_control) {
        let mut err = ValidationError::new("full_name_format");
        err.message = Some("Full name must not contain control characters".into());
        return Err(err);
    }
    Ok(())
}

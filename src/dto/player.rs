use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dto::validation::{validate_display_name, validate_full_name, validate_phone};

/// Payload of `POST /players/register`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(custom(function = "validate_display_name"))]
    pub display_name: String,
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    /// Legal name for the controller's contact list; never shown on screens.
    #[serde(default)]
    #[validate(custom(function = "validate_full_name"))]
    pub full_name: Option<String>,
}

/// Payload of `POST /players/login`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
}

/// Identity handed back after registering or logging in.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JoinResponse {
    pub player_id: Uuid,
    /// Link to the game screen for this player.
    pub join_link: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_rejects_bad_email_and_phone() {
        let request = RegisterRequest {
            display_name: "ana".into(),
            email: "not-an-email".into(),
            phone: Some("abc".into()),
            full_name: Some("x".repeat(200)),
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("phone"));
        assert!(fields.contains_key("full_name"));
    }

    #[test]
    fn phone_and_full_name_are_optional() {
        let request: RegisterRequest =
            serde_json::from_str(r#"{"display_name":"ana","email":"ana@example.com"}"#).unwrap();
        assert!(request.validate().is_ok());
    }
}

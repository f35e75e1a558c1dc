use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
}

/// A user that has not been assigned an id yet.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 5, message = "Ensure this field has at least 5 characters."))]
    pub password: String,
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters."))]
    pub name: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    #[validate(length(min = 5, message = "Ensure this field has at least 5 characters."))]
    pub password: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters."))]
    pub name: Option<String>,
}

impl From<CreateUserRequest> for UpdateUserRequest {
    fn from(req: CreateUserRequest) -> Self {
        Self {
            email: Some(req.email),
            password: Some(req.password),
            name: Some(req.name),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TokenRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub password: String,
}

/// Lowercases the domain part of an address, leaving the local part as typed.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email_lowercases_domain() {
        assert_eq!(normalize_email("correo@CORREO.COM"), "correo@correo.com");
    }

    #[test]
    fn test_normalize_email_keeps_local_part_case() {
        assert_eq!(normalize_email("Some.One@Example.Org"), "Some.One@example.org");
    }

    #[test]
    fn test_normalize_email_without_at_sign_is_trimmed_only() {
        assert_eq!(normalize_email("  not-an-email "), "not-an-email");
    }

    #[test]
    fn test_create_user_request_rejects_short_password() {
        let req = CreateUserRequest {
            email: "test@correo.com".to_string(),
            password: "pw".to_string(),
            name: "Test".to_string(),
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));
    }

    #[test]
    fn test_create_user_request_rejects_invalid_email() {
        let req = CreateUserRequest {
            email: "one".to_string(),
            password: "testpass".to_string(),
            name: "Test".to_string(),
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
    }

    #[test]
    fn test_update_user_request_allows_empty_patch() {
        assert!(UpdateUserRequest::default().validate().is_ok());
    }
}

use crate::domain::error::DomainError;
use crate::domain::repository::UserRepository;
use crate::domain::user::{
    CreateUserRequest, NewUser, TokenRequest, UpdateUserRequest, User, normalize_email,
};
use crate::infrastructure::security::{generate_token, hash_password, verify_password};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, trace, warn};
use validator::Validate;

const BAD_CREDENTIALS: &str = "Unable to authenticate with provided credentials";

pub struct UserService<R: UserRepository> {
    user_repository: Arc<R>,
    jwt_secret: String,
    token_ttl_secs: u64,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(user_repository: Arc<R>, jwt_secret: String, token_ttl_secs: u64) -> Self {
        Self {
            user_repository,
            jwt_secret,
            token_ttl_secs,
        }
    }

    /// Creates a regular account. The email must be non-empty; it is stored normalized.
    #[instrument(skip(self, password))]
    pub async fn create_user(&self, email: &str, password: &str, name: &str) -> Result<User> {
        self.insert_user(email, password, name, false).await
    }

    #[instrument(skip(self, password))]
    pub async fn create_superuser(&self, email: &str, password: &str) -> Result<User> {
        self.insert_user(email, password, "", true).await
    }

    async fn insert_user(
        &self,
        email: &str,
        password: &str,
        name: &str,
        elevated: bool,
    ) -> Result<User> {
        if email.trim().is_empty() {
            warn!("Rejected user without email");
            return Err(DomainError::Validation("Users must have an email address".to_string()).into());
        }

        let password_hash = hash_password(password).map_err(|e| {
            error!(error = %e, "Failed to hash password");
            DomainError::Internal(format!("Failed to hash password: {}", e))
        })?;

        let user = self
            .user_repository
            .create_user(NewUser {
                email: normalize_email(email),
                name: name.to_string(),
                password_hash,
                is_staff: elevated,
                is_superuser: elevated,
            })
            .await?;

        info!(user_id = user.id, email = %user.email, superuser = elevated, "User created");
        Ok(user)
    }

    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn register(&self, req: CreateUserRequest) -> Result<User> {
        trace!("Starting user registration");
        req.validate().map_err(DomainError::from)?;
        self.create_user(&req.email, &req.password, &req.name).await
    }

    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn issue_token(&self, req: TokenRequest) -> Result<String> {
        req.validate().map_err(DomainError::from)?;

        let email = normalize_email(&req.email);
        let user = self
            .user_repository
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| {
                warn!("User not found during token request");
                DomainError::Validation(BAD_CREDENTIALS.to_string())
            })?;

        let is_valid = verify_password(&req.password, &user.password_hash).map_err(|e| {
            error!(error = %e, "Failed to verify password");
            DomainError::Internal(format!("Failed to verify password: {}", e))
        })?;

        if !is_valid || !user.is_active {
            warn!(user_id = user.id, active = user.is_active, "Rejected token request");
            return Err(DomainError::Validation(BAD_CREDENTIALS.to_string()).into());
        }

        let token = generate_token(user.id, &self.jwt_secret, self.token_ttl_secs).map_err(|e| {
            error!(error = %e, "Failed to generate token");
            DomainError::Internal(format!("Failed to generate token: {}", e))
        })?;

        info!(user_id = user.id, "Token issued");
        Ok(token)
    }

    /// Resolves the subject of a verified token to a live account.
    #[instrument(skip(self))]
    pub async fn authenticate(&self, user_id: u64) -> Result<User> {
        match self.user_repository.find_user_by_id(user_id).await? {
            Some(user) if user.is_active => Ok(user),
            _ => {
                warn!(user_id, "Token subject inactive or deleted");
                Err(DomainError::Unauthorized("User inactive or deleted.".to_string()).into())
            }
        }
    }

    #[instrument(skip(self, user, changes), fields(user_id = user.id))]
    pub async fn update_profile(&self, user: &User, changes: UpdateUserRequest) -> Result<User> {
        changes.validate().map_err(DomainError::from)?;

        let mut updated = user.clone();
        if let Some(email) = changes.email {
            updated.email = normalize_email(&email);
        }
        if let Some(name) = changes.name {
            updated.name = name;
        }
        if let Some(password) = changes.password {
            debug!("Re-hashing password");
            updated.password_hash = hash_password(&password).map_err(|e| {
                error!(error = %e, "Failed to hash password");
                DomainError::Internal(format!("Failed to hash password: {}", e))
            })?;
        }

        self.user_repository.update_user(updated.clone()).await?;
        info!("Profile updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, user_id: u64) -> Result<()> {
        if !self.user_repository.delete_user(user_id).await? {
            return Err(DomainError::NotFound(format!("User {}", user_id)).into());
        }
        info!(user_id, "User deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::user_repository::InMemoryUserRepository;
    use crate::infrastructure::security::validate_token;

    const SECRET: &str = "user-service-test-secret";

    fn service() -> UserService<InMemoryUserRepository> {
        UserService::new(
            Arc::new(InMemoryUserRepository::new()),
            SECRET.to_string(),
            3600,
        )
    }

    fn token_request(email: &str, password: &str) -> TokenRequest {
        TokenRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_user_with_email_successful() {
        let users = service();
        let user = users
            .create_user("correo@correo.com", "Testpass123", "")
            .await
            .unwrap();

        assert_eq!(user.email, "correo@correo.com");
        assert!(verify_password("Testpass123", &user.password_hash).unwrap());
        assert!(user.is_active);
        assert!(!user.is_staff);
        assert!(!user.is_superuser);
    }

    #[tokio::test]
    async fn test_new_user_email_normalized() {
        let users = service();
        let user = users
            .create_user("correo@CORREO.COM", "test123", "")
            .await
            .unwrap();

        assert_eq!(user.email, "correo@correo.com");
    }

    #[tokio::test]
    async fn test_new_user_without_email_fails() {
        let users = service();
        let err = users.create_user("", "Test123", "").await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_create_new_superuser() {
        let users = service();
        let user = users
            .create_superuser("correo@correo.com", "test123")
            .await
            .unwrap();

        assert!(user.is_superuser);
        assert!(user.is_staff);
    }

    #[tokio::test]
    async fn test_issue_token_for_valid_credentials() {
        let users = service();
        let user = users
            .create_user("test@correo.com", "testpass", "")
            .await
            .unwrap();

        let token = users
            .issue_token(token_request("test@CORREO.com", "testpass"))
            .await
            .unwrap();
        assert_eq!(validate_token(&token, SECRET).unwrap(), user.id);
    }

    #[tokio::test]
    async fn test_issue_token_rejects_wrong_password() {
        let users = service();
        users
            .create_user("test@correo.com", "testpass", "")
            .await
            .unwrap();

        let err = users
            .issue_token(token_request("test@correo.com", "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_issue_token_rejects_inactive_user() {
        let users = service();
        let mut user = users
            .create_user("idle@correo.com", "testpass", "")
            .await
            .unwrap();
        user.is_active = false;
        users.user_repository.update_user(user.clone()).await.unwrap();

        assert!(
            users
                .issue_token(token_request("idle@correo.com", "testpass"))
                .await
                .is_err()
        );
        assert!(users.authenticate(user.id).await.is_err());
    }

    #[tokio::test]
    async fn test_update_profile_changes_name_and_password() {
        let users = service();
        let user = users
            .create_user("me@correo.com", "testpass", "Old")
            .await
            .unwrap();

        let updated = users
            .update_profile(
                &user,
                UpdateUserRequest {
                    name: Some("New name".to_string()),
                    password: Some("newpassword".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "New name");
        assert!(verify_password("newpassword", &updated.password_hash).unwrap());
        assert_eq!(updated.email, "me@correo.com");
    }

    #[tokio::test]
    async fn test_delete_user_twice_is_not_found() {
        let users = service();
        let user = users
            .create_user("bye@correo.com", "testpass", "")
            .await
            .unwrap();

        users.delete_user(user.id).await.unwrap();
        assert!(users.delete_user(user.id).await.is_err());
        assert!(users.authenticate(user.id).await.is_err());
    }
}

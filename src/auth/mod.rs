/*!
 * # Authentication
 *
 * Bearer-token authentication for the storefront API. Tokens are HS256 JWTs
 * issued by the account service; this module only verifies them and turns
 * the claims into an [`AuthUser`] for handlers.
 *
 * - [`AuthUser`] is extracted on every customer route (401 without a valid token)
 * - [`AdminUser`] additionally requires the `admin` role (403 otherwise)
 */

use crate::{config::AppConfig, errors::ServiceError, AppState};
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
    response::{IntoResponse, Response},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub const ADMIN_ROLE: &str = "admin";

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,        // Subject (user ID)
    #[serde(default)]
    pub roles: Vec<String>, // User's roles
    pub jti: String,        // JWT ID
    pub iat: i64,           // Issued at time
    pub exp: i64,           // Expiration time
    pub iss: String,        // Issuer
    pub aud: String,        // Audience
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub roles: Vec<String>,
    pub token_id: String,
}

impl AuthUser {
    /// Check if the user has a specific role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Check if the user is an admin
    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }
}

/// An authenticated user holding the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            jwt_secret: cfg.jwt_secret.clone(),
            jwt_audience: cfg.auth_audience.clone(),
            jwt_issuer: cfg.auth_issuer.clone(),
        }
    }
}

/// Verifies (and, for tooling and tests, issues) access tokens
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.jwt_issuer.as_str()]);
        validation.set_audience(&[config.jwt_audience.as_str()]);

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            config,
            validation,
        }
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }

    /// Signs an access token for `user_id`
    pub fn issue_token(
        &self,
        user_id: Uuid,
        roles: &[&str],
        ttl: Duration,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let ttl = ChronoDuration::from_std(ttl)
            .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        let claims = Claims {
            sub: user_id.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Resolves the `Authorization: Bearer` header into a user
    pub fn authenticate(&self, parts: &Parts) -> Result<AuthUser, AuthError> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthError::MissingToken)?
            .to_str()
            .map_err(|_| AuthError::InvalidToken)?;

        let token = header_value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = self.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        Ok(AuthUser {
            user_id,
            roles: claims.roles,
            token_id: claims.jti,
        })
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No authentication token provided")]
    MissingToken,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InsufficientPermissions => ServiceError::Forbidden(err.to_string()),
            AuthError::TokenCreation(msg) => ServiceError::InternalError(msg),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = state.auth.authenticate(parts).map_err(|err| {
            debug!(error = %err, "Rejected bearer token");
            err
        })?;
        Ok(user)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AuthError::InsufficientPermissions);
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn service() -> AuthService {
        AuthService::new(AuthConfig {
            jwt_secret: "test_secret_that_is_long_enough_for_hs256".into(),
            jwt_audience: "storefront-api".into(),
            jwt_issuer: "storefront-auth".into(),
        })
    }

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/v1/cart");
        if let Some(value) = header {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn issued_token_round_trips_to_user() {
        let auth = service();
        let user_id = Uuid::new_v4();
        let token = auth
            .issue_token(user_id, &[ADMIN_ROLE], Duration::from_secs(60))
            .unwrap();

        let user = auth
            .authenticate(&parts_with(Some(&format!("Bearer {}", token))))
            .unwrap();
        assert_eq!(user.user_id, user_id);
        assert!(user.is_admin());
    }

    #[test]
    fn missing_header_is_rejected() {
        assert!(matches!(
            service().authenticate(&parts_with(None)),
            Err(AuthError::MissingToken)
        ));
    }

    #[test]
    fn token_for_another_audience_is_rejected() {
        let other = AuthService::new(AuthConfig {
            jwt_secret: "test_secret_that_is_long_enough_for_hs256".into(),
            jwt_audience: "someone-else".into(),
            jwt_issuer: "storefront-auth".into(),
        });
        let token = other
            .issue_token(Uuid::new_v4(), &[], Duration::from_secs(60))
            .unwrap();

        assert!(matches!(
            service().authenticate(&parts_with(Some(&format!("Bearer {}", token)))),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn auth_errors_map_to_401_and_403() {
        use axum::http::StatusCode;
        assert_eq!(
            ServiceError::from(AuthError::InvalidToken).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::from(AuthError::InsufficientPermissions).status_code(),
            StatusCode::FORBIDDEN
        );
    }
}

use crate::error::AppError;
use argon2::Argon2;
use axum::{
    async_trait,
    extract::{FromRequest, RequestParts, TypedHeader},
    headers::{authorization::Bearer, Authorization},
    http::StatusCode,
};
use jsonwebtoken::{
    errors::Result as JwtResult, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use password_hash::{
    self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use serde::{Deserialize, Serialize};
use std::{ops::Deref, time::Duration};

/// Tokens handed out at sign-up and login expire after one day.
pub const SESSION_LENGTH: Duration = Duration::from_secs(24 * 60 * 60);

pub fn hash_password(password: impl AsRef<[u8]>) -> password_hash::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_ref(), &salt)
        .map(|h| h.to_string())
}

pub fn verify_password(
    password: impl AsRef<[u8]>,
    password_hash: impl AsRef<str>,
) -> password_hash::Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash.as_ref())?;
    Ok(Argon2::default()
        .verify_password(password.as_ref(), &parsed_hash)
        .is_ok())
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

lazy_static::lazy_static! {
    // TODO: read the secret through `Config` so tests do not need the env var
    static ref KEYS: Keys = {
        let secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");
        Keys {
            encoding: EncodingKey::from_base64_secret(&secret).expect("JWT_SECRET is not valid base64"),
            decoding: DecodingKey::from_base64_secret(&secret).expect("JWT_SECRET is not valid base64"),
        }
    };
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    #[serde(default)]
    pub admin: bool,
    pub exp: u64,
}

#[allow(unused_must_use)]
pub fn ensure_jwt_secret_is_valid() {
    KEYS.deref();
}

pub fn generate_jwt(user_id: i32, admin: bool, exp: Duration) -> JwtResult<String> {
    jsonwebtoken::encode(
        &Header::default(),
        &Claims {
            user_id,
            admin,
            exp: jsonwebtoken::get_current_timestamp() + exp.as_secs(),
        },
        &KEYS.encoding,
    )
}

pub fn validate_jwt(token: &str) -> JwtResult<TokenData<Claims>> {
    jsonwebtoken::decode::<Claims>(token, &KEYS.decoding, &Validation::default())
}

/// Any signed-in user.
pub struct ExtractAuth(pub Claims);

#[async_trait]
impl<B: Send> FromRequest<B> for ExtractAuth {
    type Rejection = AppError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request(req)
                .await
                .map_err(|_| AppError::from(StatusCode::UNAUTHORIZED, "sign in required"))?;

        claims_from_token(bearer.token()).map(ExtractAuth)
    }
}

/// A signed-in user carrying the admin flag.
pub struct AdminOnly(pub Claims);

#[async_trait]
impl<B: Send> FromRequest<B> for AdminOnly {
    type Rejection = AppError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let ExtractAuth(claims) = ExtractAuth::from_request(req).await?;
        if !claims.admin {
            return Err(AppError::from(StatusCode::FORBIDDEN, "admin access required"));
        }
        Ok(AdminOnly(claims))
    }
}

pub fn claims_from_token(token: &str) -> Result<Claims, AppError> {
    validate_jwt(token)
        .map(|data| data.claims)
        .map_err(|_| AppError::from(StatusCode::UNAUTHORIZED, "invalid or expired token"))
}

#[cfg(test)]
pub(crate) fn set_test_secret() {
    // base64 of "clubhouse-test-secret-clubhouse"
    std::env::set_var("JWT_SECRET", "Y2x1YmhvdXNlLXRlc3Qtc2VjcmV0LWNsdWJob3VzZQ==");
}

use jsonwebtoken::{DecodingKey, TokenData as JwtTokenData, Validation, decode};
use serde::{Deserialize, Serialize};
use std::env;
use uuid::Uuid;

/// Claims minted by the platform's identity service. This service only
/// verifies them; it never issues tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid, // Subject (user ID)
    pub email: String,
    pub exp: i64, // Expiration time
    pub iat: i64, // Issued at
}

pub fn verify_jwt(token: &str) -> Result<JwtTokenData<Claims>, jsonwebtoken::errors::Error> {
    let secret = get_jwt_secret();
    let validation = Validation::default();

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )
}

fn get_jwt_secret() -> String {
    env::var("JWT_SECRET").unwrap_or_else(|_| {
        tracing::warn!("JWT_SECRET not set, using default (insecure for production)");
        "your-secret-key".to_string()
    })
}

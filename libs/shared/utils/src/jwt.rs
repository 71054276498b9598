use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tracing::debug;

use shared_models::auth::{AuthUser, JwtClaims, UserRole};

type HmacSha256 = Hmac<Sha256>;

/// Issue a signed HS256 bearer token for an authenticated user.
pub fn create_token(
    email: &str,
    user_id: &str,
    role: UserRole,
    paciente_id: Option<&str>,
    jwt_secret: &str,
    expiry_minutes: i64,
) -> Result<String, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let now = Utc::now();
    let exp = now + Duration::minutes(expiry_minutes);

    let header = json!({
        "alg": "HS256",
        "typ": "JWT"
    });

    let mut claims = json!({
        "sub": email,
        "user_id": user_id,
        "role": role.as_str(),
        "iat": now.timestamp(),
        "exp": exp.timestamp()
    });
    if let Some(paciente_id) = paciente_id {
        claims["paciente_id"] = json!(paciente_id);
    }

    let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims.to_string());
    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(signing_input.as_bytes());
    let signature = mac.finalize().into_bytes();

    Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
}

/// Verify a bearer token's signature and expiry and extract the caller.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<AuthUser, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    // Split token into parts
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("Invalid token format".to_string());
    }

    let header_b64 = parts[0];
    let claims_b64 = parts[1];
    let signature_b64 = parts[2];

    let signature = match URL_SAFE_NO_PAD.decode(signature_b64) {
        Ok(sig) => sig,
        Err(e) => {
            debug!("Failed to decode signature: {}", e);
            return Err("Invalid signature encoding".to_string());
        }
    };

    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = match HmacSha256::new_from_slice(jwt_secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return Err("Failed to create HMAC".to_string()),
    };

    mac.update(signing_input.as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err("Invalid token signature".to_string());
    }

    // Decode claims
    let claims_json = match URL_SAFE_NO_PAD.decode(claims_b64) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(json_str) => json_str,
            Err(_) => return Err("Invalid claims encoding".to_string()),
        },
        Err(_) => return Err("Invalid claims encoding".to_string()),
    };

    let claims: JwtClaims = match serde_json::from_str(&claims_json) {
        Ok(c) => c,
        Err(e) => {
            debug!("Failed to parse claims: {}", e);
            return Err("Invalid claims format".to_string());
        },
    };

    // Check expiration
    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp() as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err("Token expired".to_string());
        }
    }

    let user = AuthUser {
        id: claims.user_id,
        email: claims.sub,
        role: claims.role,
        paciente_id: claims.paciente_id,
    };

    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

    #[test]
    fn round_trip_token() {
        let token = create_token("ana@clinic.test", "user-1", UserRole::Radiologo, None, SECRET, 60)
            .unwrap();

        let user = validate_token(&token, SECRET).unwrap();
        assert_eq!(user.email, "ana@clinic.test");
        assert_eq!(user.id, "user-1");
        assert_eq!(user.role, UserRole::Radiologo);
        assert!(user.paciente_id.is_none());
    }

    #[test]
    fn patient_token_carries_paciente_id() {
        let token = create_token(
            "p@clinic.test", "user-2", UserRole::Paciente, Some("pac-9"), SECRET, 60,
        ).unwrap();

        let user = validate_token(&token, SECRET).unwrap();
        assert_eq!(user.paciente_id.as_deref(), Some("pac-9"));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = create_token("a@b.c", "user-3", UserRole::Admin, None, SECRET, -5).unwrap();
        assert_eq!(validate_token(&token, SECRET).unwrap_err(), "Token expired");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_token("a@b.c", "user-4", UserRole::Admin, None, SECRET, 60).unwrap();
        assert!(validate_token(&token, "other-secret").is_err());
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert!(validate_token("not.a-token", SECRET).is_err());
        assert!(validate_token("", SECRET).is_err());
    }
}

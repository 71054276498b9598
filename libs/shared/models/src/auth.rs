use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Radiologo,
    Secretario,
    Tecnico,
    Paciente,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Radiologo => "radiologo",
            UserRole::Secretario => "secretario",
            UserRole::Tecnico => "tecnico",
            UserRole::Paciente => "paciente",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject, the user's email.
    pub sub: String,
    pub user_id: String,
    pub role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paciente_id: Option<String>,
    pub iat: Option<u64>,
    pub exp: Option<u64>,
}

/// Authenticated caller, extracted from a verified bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub role: UserRole,
    pub paciente_id: Option<String>,
}

impl AuthUser {
    pub fn has_role(&self, allowed: &[UserRole]) -> bool {
        allowed.contains(&self.role)
    }
}

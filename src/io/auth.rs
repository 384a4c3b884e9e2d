//! Caller authentication and role guards
//!
//! Callers present a pre-shared API token from the config file, either as
//! `Authorization: Bearer <token>` or as basic credentials
//! (`Basic base64(email:token)`). Role checks are plain guard functions
//! composed in front of the mutating handlers.

use crate::domain::error::ApiError;
use crate::domain::types::{Caller, Role};
use crate::infra::Config;
use base64::{engine::general_purpose::STANDARD, Engine};
use rustc_hash::FxHashMap;
use tracing::warn;

pub struct Authenticator {
    /// token -> caller identity
    tokens: FxHashMap<String, Caller>,
}

impl Authenticator {
    /// Build the token table from config. Entries with an unknown role are
    /// skipped with a warning rather than failing startup.
    pub fn from_config(config: &Config) -> Self {
        let mut tokens = FxHashMap::default();
        for entry in config.tokens() {
            let Ok(role) = entry.rol.parse::<Role>() else {
                warn!(email = %entry.email, rol = %entry.rol, "auth_token_unknown_role");
                continue;
            };
            tokens.insert(
                entry.token.clone(),
                Caller { email: entry.email.clone(), role },
            );
        }
        Self { tokens }
    }

    /// Resolve the Authorization header value to a caller
    pub fn authenticate(&self, header: Option<&str>) -> Result<Caller, ApiError> {
        let header = header.ok_or(ApiError::NotAuthenticated)?;

        if let Some(token) = header.strip_prefix("Bearer ") {
            return self.lookup(token.trim()).ok_or(ApiError::NotAuthenticated);
        }

        if let Some(encoded) = header.strip_prefix("Basic ") {
            let decoded = STANDARD
                .decode(encoded.trim())
                .map_err(|_| ApiError::NotAuthenticated)?;
            let decoded = String::from_utf8(decoded).map_err(|_| ApiError::NotAuthenticated)?;
            let (email, token) = decoded.split_once(':').ok_or(ApiError::NotAuthenticated)?;

            let caller = self.lookup(token).ok_or(ApiError::NotAuthenticated)?;
            if caller.email != email {
                return Err(ApiError::NotAuthenticated);
            }
            return Ok(caller);
        }

        Err(ApiError::NotAuthenticated)
    }

    fn lookup(&self, token: &str) -> Option<Caller> {
        self.tokens.get(token).cloned()
    }
}

/// Guard: the caller must hold one of the allowed roles
pub fn require_role(caller: &Caller, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&caller.role) {
        Ok(())
    } else {
        Err(ApiError::PermissionDenied)
    }
}

/// Guard for registry writes: ADMIN only
pub fn require_admin(caller: &Caller) -> Result<(), ApiError> {
    require_role(caller, &[Role::Admin])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> Authenticator {
        let config = Config::default()
            .with_token("t-admin", "admin@example.com", "ADMIN")
            .with_token("t-op", "operador@example.com", "OPERADOR")
            .with_token("t-bad", "raro@example.com", "SUPERUSUARIO");
        Authenticator::from_config(&config)
    }

    #[test]
    fn test_bearer_token() {
        let auth = authenticator();
        let caller = auth.authenticate(Some("Bearer t-admin")).unwrap();
        assert_eq!(caller.email, "admin@example.com");
        assert_eq!(caller.role, Role::Admin);
    }

    #[test]
    fn test_basic_credentials() {
        let auth = authenticator();
        let encoded = STANDARD.encode("operador@example.com:t-op");
        let caller = auth.authenticate(Some(&format!("Basic {encoded}"))).unwrap();
        assert_eq!(caller.role, Role::Operator);
    }

    #[test]
    fn test_basic_credentials_email_must_match() {
        let auth = authenticator();
        let encoded = STANDARD.encode("admin@example.com:t-op");
        assert!(auth.authenticate(Some(&format!("Basic {encoded}"))).is_err());
    }

    #[test]
    fn test_missing_or_unknown_token() {
        let auth = authenticator();
        assert!(matches!(auth.authenticate(None), Err(ApiError::NotAuthenticated)));
        assert!(auth.authenticate(Some("Bearer nope")).is_err());
        assert!(auth.authenticate(Some("Token t-admin")).is_err());
    }

    #[test]
    fn test_unknown_role_entry_skipped() {
        let auth = authenticator();
        assert!(auth.authenticate(Some("Bearer t-bad")).is_err());
    }

    #[test]
    fn test_role_guards() {
        let admin = Caller { email: "a@example.com".to_string(), role: Role::Admin };
        let operator = Caller { email: "o@example.com".to_string(), role: Role::Operator };

        assert!(require_admin(&admin).is_ok());
        assert!(matches!(require_admin(&operator), Err(ApiError::PermissionDenied)));
        assert!(require_role(&operator, &[Role::Admin, Role::Operator]).is_ok());
    }
}

//! Bearer-token verification.
//!
//! Token issuance, refresh, and password flows belong to the external
//! identity provider. The server only needs to answer one question per
//! request: which user does this bearer token belong to? [`TokenVerifier`]
//! is that seam; [`StaticTokenVerifier`] backs it with the configured token
//! table.

use std::collections::HashMap;

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Opaque user identifier assigned by the identity provider.
    pub user_id: String,
}

/// Verification seam for bearer tokens.
pub trait TokenVerifier: Send + Sync {
    /// Resolve a bearer token to its user, or `None` when invalid.
    fn verify(&self, token: &str) -> Option<AuthUser>;
}

/// Verifier backed by a static `token -> user_id` table from configuration.
#[derive(Debug, Clone)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, String>,
}

impl StaticTokenVerifier {
    /// Create a verifier from a token table.
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Option<AuthUser> {
        self.tokens.get(token).map(|user_id| AuthUser {
            user_id: user_id.clone(),
        })
    }
}

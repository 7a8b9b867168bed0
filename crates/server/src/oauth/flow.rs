//! Pending login flows.
//!
//! Between the redirect to the provider and the callback, the only thing
//! tying the two requests together is the random `state` value. This store
//! keeps the PKCE verifier and flow metadata for each outstanding state,
//! with one-shot consumption and a TTL. State lives in-process; deployments
//! running several instances need sticky routing for the login endpoints.

use crate::error::OAuthFlowError;
use base64::Engine;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a login handshake may take before the state expires.
const FLOW_TTL: Duration = Duration::from_secs(600);

/// A login handshake that has been started but not completed.
#[derive(Debug, Clone)]
pub struct PendingLogin {
    pub provider: String,
    pub pkce_verifier: String,
    /// Optional post-login path on the frontend, passed through from the
    /// initial request.
    pub return_to: Option<String>,
    started_at: Instant,
}

impl PendingLogin {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.started_at.elapsed() > ttl
    }
}

/// Generate a secure random URL-safe token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes).expect("Failed to generate random bytes");
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// S256 PKCE challenge for a verifier.
pub fn pkce_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

#[derive(Clone)]
pub struct FlowStore {
    pending: Arc<DashMap<String, PendingLogin>>,
    ttl: Duration,
}

impl Default for FlowStore {
    fn default() -> Self {
        Self::with_ttl(FLOW_TTL)
    }
}

impl FlowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Start a handshake: returns the state value and the PKCE challenge to
    /// embed in the authorization URL.
    pub fn begin(&self, provider: &str, return_to: Option<String>) -> (String, String) {
        let state = generate_token();
        let verifier = generate_token();
        let challenge = pkce_challenge(&verifier);
        self.pending.insert(
            state.clone(),
            PendingLogin {
                provider: provider.to_string(),
                pkce_verifier: verifier,
                return_to,
                started_at: Instant::now(),
            },
        );
        (state, challenge)
    }

    /// Consume a state value. Each state is accepted at most once; expired
    /// or unknown states fail, and a mismatched provider fails without
    /// giving the state back.
    pub fn consume(&self, provider: &str, state: &str) -> Result<PendingLogin, OAuthFlowError> {
        let (_, pending) = self
            .pending
            .remove(state)
            .ok_or(OAuthFlowError::InvalidState)?;
        if pending.is_expired(self.ttl) || pending.provider != provider {
            return Err(OAuthFlowError::InvalidState);
        }
        Ok(pending)
    }

    /// Drop expired entries. Called from a periodic background task.
    pub fn purge_expired(&self) -> usize {
        let mut purged = 0;
        self.pending.retain(|_, pending| {
            let keep = !pending.is_expired(self.ttl);
            if !keep {
                purged += 1;
            }
            keep
        });
        purged
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_is_consumed_exactly_once() {
        let store = FlowStore::new();
        let (state, _challenge) = store.begin("github", None);

        let pending = store.consume("github", &state).unwrap();
        assert_eq!(pending.provider, "github");

        // Second consumption must fail.
        assert!(matches!(
            store.consume("github", &state),
            Err(OAuthFlowError::InvalidState)
        ));
    }

    #[test]
    fn unknown_state_rejected() {
        let store = FlowStore::new();
        assert!(store.consume("github", "no-such-state").is_err());
    }

    #[test]
    fn provider_mismatch_rejected_and_not_replayable() {
        let store = FlowStore::new();
        let (state, _) = store.begin("github", None);
        assert!(store.consume("google", &state).is_err());
        // The state was consumed by the failed attempt.
        assert!(store.consume("github", &state).is_err());
    }

    #[test]
    fn return_to_round_trips() {
        let store = FlowStore::new();
        let (state, _) = store.begin("github", Some("/settings".into()));
        let pending = store.consume("github", &state).unwrap();
        assert_eq!(pending.return_to.as_deref(), Some("/settings"));
    }

    #[test]
    fn tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(!a.contains('+') && !a.contains('/') && !a.contains('='));
    }

    #[test]
    fn pkce_challenge_matches_rfc7636_vector() {
        // RFC 7636 appendix B
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            pkce_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn purge_keeps_fresh_entries() {
        let store = FlowStore::new();
        store.begin("github", None);
        assert_eq!(store.purge_expired(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn expired_state_is_rejected() {
        let store = FlowStore::with_ttl(Duration::ZERO);
        let (state, _) = store.begin("github", None);
        assert!(matches!(
            store.consume("github", &state),
            Err(OAuthFlowError::InvalidState)
        ));
    }

    #[test]
    fn purge_drops_expired_entries() {
        let store = FlowStore::with_ttl(Duration::ZERO);
        store.begin("github", None);
        store.begin("google", None);
        assert_eq!(store.purge_expired(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn purge_count_ignores_entries_added_during_the_sweep() {
        // The removal count only reflects what the sweep itself dropped, so
        // concurrent begin() calls cannot make it go negative.
        let store = FlowStore::with_ttl(Duration::ZERO);
        store.begin("github", None);
        let purged = store.purge_expired();
        store.begin("github", None);
        assert_eq!(purged, 1);
        assert_eq!(store.len(), 1);
    }
}

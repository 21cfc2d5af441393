//! External identity provider redirect support.
//!
//! The provider protocol itself is delegated; this module only covers the
//! CSRF state parameter handed out on initiate and checked on callback.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// TTL for pending state entries (10 minutes).
const STATE_TTL: Duration = Duration::from_secs(600);

/// Generate a cryptographic state parameter (CSRF token).
pub fn generate_state() -> String {
    use base64::Engine;
    use rand::RngCore;

    let mut bytes = [0u8; 24];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// In-memory store for state parameters issued between initiate and callback.
#[derive(Default)]
pub struct OAuthStateStore {
    states: DashMap<String, Instant>,
}

impl OAuthStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue and remember a fresh state parameter.
    pub fn issue(&self) -> String {
        let state = generate_state();
        self.states.insert(state.clone(), Instant::now());
        state
    }

    /// Take (remove and check) a state entry.
    /// Returns `false` if unknown or expired.
    pub fn take(&self, state: &str) -> bool {
        let Some((_, issued_at)) = self.states.remove(state) else {
            return false;
        };
        issued_at.elapsed() <= STATE_TTL
    }

    /// Evict expired entries.
    pub fn cleanup(&self) {
        self.states.retain(|_, issued| issued.elapsed() <= STATE_TTL);
    }
}

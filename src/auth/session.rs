//! Session store for the todo service.
//!
//! The [`Session`] is the single authoritative holder of the bearer token and
//! the authenticated profile. All token mutation funnels through its
//! operations; nothing else writes auth state. The only durable piece is the
//! token string itself, kept under a fixed path by [`TokenStore`] - the
//! profile is re-verified against `GET /auth/me` on every startup rather
//! than trusted from disk.
//!
//! Lifecycle: empty at process start; populated by login, register, or an
//! OAuth callback; rehydrated by [`Session::restore`]; destroyed by logout
//! or any verification failure.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::models::UserProfile;

/// Token file name in the config directory - the one fixed durable key
const TOKEN_FILE: &str = "token";

/// Durable storage for the bearer token. Exactly one token string lives at
/// a fixed path; clearing the session removes the file.
#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Read the persisted token, if any. An empty file counts as absent.
    pub fn load(&self) -> Result<Option<String>> {
        let path = self.token_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read token file")?;
        let token = contents.trim();
        if token.is_empty() {
            Ok(None)
        } else {
            Ok(Some(token.to_string()))
        }
    }

    pub fn save(&self, token: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir).context("Failed to create config directory")?;
        std::fs::write(self.token_path(), token).context("Failed to write token file")?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        let path = self.token_path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove token file")?;
        }
        Ok(())
    }

    fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }
}

pub struct Session {
    store: TokenStore,
    token: Option<String>,
    user: Option<UserProfile>,
    /// Callback tokens already handled; a replayed callback must not trigger
    /// a second verification request
    consumed_callbacks: HashSet<String>,
}

impl Session {
    pub fn new(store: TokenStore) -> Self {
        Self {
            store,
            token: None,
            user: None,
            consumed_callbacks: HashSet::new(),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    /// A session is authenticated once its token has been verified, which is
    /// exactly when a profile is present
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    /// Read the persisted token without verifying it. Used by logout, which
    /// needs a token to notify the service but must clear state regardless.
    pub fn stored_token(&self) -> Option<String> {
        match self.store.load() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted token");
                None
            }
        }
    }

    /// Adopt a server-issued token and profile, persisting the token.
    /// A storage failure is logged, not surfaced - the in-memory session is
    /// still good for the rest of this process.
    pub fn establish(&mut self, token: String, user: UserProfile) {
        if let Err(e) = self.store.save(&token) {
            warn!(error = %e, "Failed to persist token");
        }
        self.token = Some(token);
        self.user = Some(user);
    }

    /// Replace the profile after a profile-update response. The server's
    /// copy wins wholesale; ignored if the session is not authenticated.
    pub fn replace_user(&mut self, user: UserProfile) {
        if self.token.is_some() {
            self.user = Some(user);
        }
    }

    /// Drop token, profile, and the persisted token file
    pub fn clear(&mut self) {
        self.token = None;
        self.user = None;
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to remove persisted token");
        }
    }

    /// Rehydrate the session at startup: verify any persisted token against
    /// `GET /auth/me`. On any failure - auth rejection or network - the
    /// persisted token is cleared along with the in-memory state, so a
    /// broken token never lingers. Returns whether a session is now active.
    ///
    /// Callers await this before issuing any authenticated request.
    pub async fn restore(&mut self, api: &mut ApiClient) -> bool {
        let token = match self.stored_token() {
            Some(token) => token,
            None => return false,
        };

        api.set_token(token.clone());
        match api.me().await {
            Ok(user) => {
                debug!(username = %user.username, "Session restored");
                self.token = Some(token);
                self.user = Some(user);
                true
            }
            Err(e) => {
                debug!(error = %e, "Persisted token rejected, clearing session");
                api.clear_token();
                self.clear();
                false
            }
        }
    }

    /// Complete the OAuth redirect flow with the token carried in the
    /// callback URL: adopt it, verify it via `GET /auth/me`, persist on
    /// success, clear everything on failure.
    ///
    /// Idempotent per callback: replaying the same callback token reports
    /// the current authentication state without another verification call.
    pub async fn complete_oauth_callback(&mut self, api: &mut ApiClient, token: String) -> bool {
        if !self.consume_callback(&token) {
            debug!("Callback already processed, skipping verification");
            return self.is_authenticated();
        }

        api.set_token(token.clone());
        match api.me().await {
            Ok(user) => {
                debug!(username = %user.username, "OAuth sign-in verified");
                self.establish(token, user);
                true
            }
            Err(e) => {
                warn!(error = %e, "OAuth callback token rejected");
                api.clear_token();
                self.clear();
                false
            }
        }
    }

    /// One-shot latch keyed on the callback token. True exactly once per key.
    fn consume_callback(&mut self, token: &str) -> bool {
        self.consumed_callbacks.insert(token.to_string())
    }
}

/// Extract the `token` query parameter from an OAuth redirect URL,
/// percent-decoded. Returns None when the parameter is missing or empty.
pub fn parse_callback_token(url: &str) -> Option<String> {
    let query = url.splitn(2, '?').nth(1)?;
    let query = query.split('#').next().unwrap_or(query);

    for pair in query.split('&') {
        let mut parts = pair.splitn(2, '=');
        if parts.next() == Some("token") {
            let raw = parts.next().unwrap_or("");
            if raw.is_empty() {
                return None;
            }
            return urlencoding::decode(raw).ok().map(|s| s.into_owned());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> TokenStore {
        let dir = std::env::temp_dir().join(format!(
            "todoterm-test-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        TokenStore::new(dir)
    }

    #[test]
    fn test_token_store_round_trip() {
        let store = temp_store("round-trip");
        assert!(store.load().expect("load").is_none());

        store.save("abc123").expect("save");
        assert_eq!(store.load().expect("load").as_deref(), Some("abc123"));

        store.clear().expect("clear");
        assert!(store.load().expect("load").is_none());
        // Clearing twice is fine
        store.clear().expect("clear again");
    }

    #[test]
    fn test_token_store_treats_blank_file_as_absent() {
        let store = temp_store("blank");
        store.save("  \n").expect("save");
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn test_establish_persists_and_clear_wipes() {
        let store = temp_store("establish");
        let mut session = Session::new(store.clone());

        let user: UserProfile =
            serde_json::from_str(r#"{"id": 1, "username": "bob"}"#).expect("profile");
        session.establish("tok-1".to_string(), user);

        assert!(session.is_authenticated());
        assert_eq!(session.token(), Some("tok-1"));
        assert_eq!(store.load().expect("load").as_deref(), Some("tok-1"));

        session.clear();
        assert!(!session.is_authenticated());
        assert!(session.token().is_none());
        assert!(session.user().is_none());
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn test_replace_user_requires_token() {
        let mut session = Session::new(temp_store("replace"));
        let user: UserProfile =
            serde_json::from_str(r#"{"id": 1, "username": "bob"}"#).expect("profile");

        // No token yet - a stray late profile must not attach
        session.replace_user(user.clone());
        assert!(session.user().is_none());

        session.establish("tok".to_string(), user);
        let renamed: UserProfile =
            serde_json::from_str(r#"{"id": 1, "username": "bob", "first_name": "Bob"}"#)
                .expect("profile");
        session.replace_user(renamed);
        assert_eq!(
            session.user().and_then(|u| u.first_name.as_deref()),
            Some("Bob")
        );
    }

    #[test]
    fn test_callback_latch_is_one_shot() {
        let mut session = Session::new(temp_store("latch"));
        assert!(session.consume_callback("cb-token"));
        assert!(!session.consume_callback("cb-token"));
        // A different callback instance gets its own shot
        assert!(session.consume_callback("other-token"));
    }

    #[test]
    fn test_parse_callback_token() {
        assert_eq!(
            parse_callback_token("https://app.example.com/auth/callback?token=abc123"),
            Some("abc123".to_string())
        );
        assert_eq!(
            parse_callback_token("https://x.test/cb?state=1&token=a%2Bb&next=%2F"),
            Some("a+b".to_string())
        );
        // Fragment after the query must not leak into the token
        assert_eq!(
            parse_callback_token("https://x.test/cb?token=abc#section"),
            Some("abc".to_string())
        );
        assert_eq!(parse_callback_token("https://x.test/cb?token="), None);
        assert_eq!(parse_callback_token("https://x.test/cb?other=1"), None);
        assert_eq!(parse_callback_token("https://x.test/cb"), None);
    }
}

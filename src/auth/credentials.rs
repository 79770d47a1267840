use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "todoterm";

/// Optional password storage in the OS keychain, used by `login --remember`.
/// The bearer token never goes through here; only the password the user
/// chose to save.
pub struct CredentialStore;

impl CredentialStore {
    /// Save the password for a username in the OS keychain
    pub fn save(username: &str, password: &str) -> Result<()> {
        Entry::new(SERVICE_NAME, username)
            .context("Failed to create keyring entry")?
            .set_password(password)
            .context("Failed to save password in keychain")?;
        Ok(())
    }

    /// Look up a saved password for a username
    pub fn lookup(username: &str) -> Result<String> {
        Entry::new(SERVICE_NAME, username)
            .context("Failed to create keyring entry")?
            .get_password()
            .context("Failed to read password from keychain")
    }

    /// Remove the saved password for a username
    pub fn forget(username: &str) -> Result<()> {
        Entry::new(SERVICE_NAME, username)
            .context("Failed to create keyring entry")?
            .delete_credential()
            .context("Failed to remove password from keychain")?;
        Ok(())
    }

    /// Whether a password is saved for this username
    pub fn exists(username: &str) -> bool {
        Entry::new(SERVICE_NAME, username)
            .map(|entry| entry.get_password().is_ok())
            .unwrap_or(false)
    }
}

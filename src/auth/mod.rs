//! Authentication: the session/token lifecycle and keychain helpers.
//!
//! - `Session`: bearer token + verified profile, with the persisted token as
//!   the only durable state
//! - `CredentialStore`: optional password storage in the OS keychain

pub mod credentials;
pub mod session;

pub use credentials::CredentialStore;
pub use session::{parse_callback_token, Session, TokenStore};

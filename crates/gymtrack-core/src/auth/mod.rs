//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `SessionManager`: Sign-in/out, token refresh and profile edits
//! - `TokenStore`: Persistence of the token pair and user snapshot, with
//!   file, OS keychain and in-memory backends
//!
//! Only the session manager writes to the token store.

pub mod keyring_store;
pub mod session;
pub mod store;
pub mod tokens;

pub use keyring_store::KeyringTokenStore;
pub use session::{SessionManager, SessionState};
pub use store::{FileTokenStore, MemoryTokenStore, StoreError, TokenStore};
pub use tokens::{StoredSession, TokenPair};

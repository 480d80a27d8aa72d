//! Session lifecycle: sign-in, sign-out, token refresh and profile edits.
//!
//! [`SessionManager`] is the only writer of the token store and of the
//! in-memory session. Consumers read the current [`SessionState`] or
//! subscribe to transitions through a `tokio::sync::watch` channel.
//!
//! Every change to the credentials (sign-in, sign-out, refresh) bumps a
//! generation counter. A request remembers the generation its token came
//! from, which is how concurrent 401s find out that a refresh already
//! happened while they were waiting for the refresh lock.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::store::TokenStore;
use super::tokens::{StoredSession, TokenPair};
use crate::api::http::{ApiRequest, FilePart, HttpTransport};
use crate::api::{ApiClient, ApiError, Authenticator, Grant};
use crate::error::{Error, Result};
use crate::models::{AvatarUpload, ProfileUpdate, User};
use crate::validation;

/// Message used when the backend rejects a sign-in without explaining why
const DEFAULT_INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Authenticated-or-not status of the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Stored session not read yet.
    Unknown,
    Authenticated(User),
    Unauthenticated,
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    /// False until the stored session has been read.
    pub fn is_settled(&self) -> bool {
        !matches!(self, SessionState::Unknown)
    }
}

#[derive(Debug, Deserialize)]
struct SignInResponse {
    token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: User,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AvatarResponse {
    avatar: String,
}

#[derive(Debug, Default)]
struct Credentials {
    tokens: Option<TokenPair>,
    user: Option<User>,
    generation: u64,
}

impl Credentials {
    fn grant(&self) -> Option<Grant> {
        self.tokens.as_ref().map(|tokens| Grant {
            access_token: tokens.access_token.clone(),
            generation: self.generation,
        })
    }
}

struct SessionInner {
    http: HttpTransport,
    store: Arc<dyn TokenStore>,
    credentials: Mutex<Credentials>,
    state: watch::Sender<SessionState>,
    /// Held for the duration of a refresh call so only one runs at a time.
    refresh_lock: tokio::sync::Mutex<()>,
}

/// Owner of the current session.
/// Clone is cheap - clones share the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    pub fn new(http: HttpTransport, store: Arc<dyn TokenStore>) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        Self {
            inner: Arc::new(SessionInner {
                http,
                store,
                credentials: Mutex::new(Credentials::default()),
                state,
                refresh_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    // =========================================================================
    // State access
    // =========================================================================

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn current_user(&self) -> Option<User> {
        self.inner.lock_credentials().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    /// API client that authenticates with this session.
    pub fn api(&self) -> ApiClient {
        let auth: Arc<dyn Authenticator> = self.inner.clone();
        ApiClient::new(self.inner.http.clone(), auth)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Restore the session saved by a previous run. The token is not checked
    /// against the backend here; the first authenticated request does that.
    pub fn bootstrap(&self) -> Result<SessionState> {
        let inner = &self.inner;
        let mut creds = inner.lock_credentials();

        let loaded = inner.store.load();
        let stored = match loaded {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to load stored session");
                inner.reset(&mut creds);
                return Err(e.into());
            }
        };

        match stored {
            Some(stored) => {
                debug!(
                    user_id = %stored.user.id,
                    age_minutes = stored.age_minutes(),
                    "Restored stored session"
                );
                creds.tokens = Some(stored.tokens);
                creds.user = Some(stored.user.clone());
                creds.generation += 1;
                inner.state.send_replace(SessionState::Authenticated(stored.user));
            }
            None => {
                debug!("No stored session");
                inner.reset(&mut creds);
            }
        }

        Ok(inner.state.borrow().clone())
    }

    /// Authenticate with email and password, persisting the returned session.
    ///
    /// Rejected credentials leave the manager `Unauthenticated` with an empty
    /// store; a failure without a usable answer leaves the prior state alone.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        let request = ApiRequest::post(&["sessions"], json!({ "email": email, "password": password }));

        let response: SignInResponse = match self.inner.http.send_json(&request, None).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Sign-in failed");
                let err = sign_in_error(e);
                if matches!(err, Error::InvalidCredentials(_)) {
                    // A rejected sign-in ends whatever session came before
                    self.inner.discard_session();
                }
                return Err(err);
            }
        };

        let tokens = TokenPair::new(response.token, response.refresh_token);
        let user = response.user;
        self.inner.commit_session(tokens, user.clone())?;

        info!(user_id = %user.id, "Signed in");
        Ok(user)
    }

    /// Register a new account. Does not sign in; call [`sign_in`](Self::sign_in) next.
    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<()> {
        let request = ApiRequest::post(
            &["users"],
            json!({ "name": name, "email": email, "password": password }),
        );

        self.inner.http.send(&request, None).await.map_err(|e| {
            warn!(error = %e, "Sign-up failed");
            match e {
                ApiError::Unauthorized(Some(message)) => Error::Validation(message),
                other => Error::from(other),
            }
        })?;

        info!("Account created");
        Ok(())
    }

    /// Exchange the stored refresh token for a new access token.
    pub async fn refresh(&self) -> Result<()> {
        let grant = self.inner.lock_credentials().grant().ok_or(Error::Unauthenticated)?;
        self.inner.refresh_after_grant(grant).await.map(|_| ())
    }

    /// Change the user's name and optionally their password.
    /// On failure the current user is left untouched.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<User> {
        let current = self.current_user().ok_or(Error::Unauthenticated)?;
        let merged = update.merged_into(&current);

        let mut body = json!({ "name": merged.name });
        if let Some(ref password) = update.password {
            body["password"] = json!(password.new_password);
            body["old_password"] = json!(password.old_password);
        }

        self.api()
            .execute_empty(&ApiRequest::put(&["users"], body))
            .await?;

        let user = self
            .inner
            .commit_user(&current.id, |user| update.merged_into(user))?;
        info!(user_id = %user.id, password_changed = update.password.is_some(), "Profile updated");
        Ok(user)
    }

    /// Upload a new profile photo and store the returned avatar reference.
    pub async fn update_avatar(&self, upload: AvatarUpload) -> Result<User> {
        if let Some(message) = validation::validate_avatar(upload.size()).remove("avatar") {
            return Err(Error::Validation(message));
        }
        let current = self.current_user().ok_or(Error::Unauthenticated)?;

        let part = FilePart {
            field: "avatar".to_string(),
            file_name: upload.file_name,
            content_type: upload.content_type,
            bytes: upload.bytes,
        };
        let response: AvatarResponse = self
            .api()
            .execute_json(&ApiRequest::patch_file(&["users", "avatar"], part))
            .await?;

        let user = self.inner.commit_user(&current.id, |user| User {
            avatar: Some(response.avatar.clone()),
            ..user.clone()
        })?;
        info!(user_id = %user.id, "Avatar updated");
        Ok(user)
    }

    /// End the session. The in-memory session is always dropped; an error
    /// means the stored copy could not be erased.
    pub fn sign_out(&self) -> Result<()> {
        let mut creds = self.inner.lock_credentials();
        let cleared = self.inner.store.clear();
        self.inner.reset(&mut creds);
        drop(creds);

        match cleared {
            Ok(()) => {
                info!("Signed out");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Signed out but failed to erase stored session");
                Err(e.into())
            }
        }
    }
}

fn sign_in_error(err: ApiError) -> Error {
    match err {
        ApiError::Unauthorized(message) => Error::InvalidCredentials(
            message.unwrap_or_else(|| DEFAULT_INVALID_CREDENTIALS.to_string()),
        ),
        ApiError::Rejected { status, message } if status.is_client_error() => {
            Error::InvalidCredentials(message)
        }
        other => Error::from(other),
    }
}

impl SessionInner {
    fn lock_credentials(&self) -> MutexGuard<'_, Credentials> {
        self.credentials
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drop in-memory credentials and broadcast `Unauthenticated`.
    fn reset(&self, creds: &mut Credentials) {
        creds.tokens = None;
        creds.user = None;
        creds.generation += 1;
        self.state.send_replace(SessionState::Unauthenticated);
    }

    /// Persist and install a new session. Nothing changes if the store write fails.
    /// The store runs inline under the credential lock (see [`TokenStore`]).
    fn commit_session(&self, tokens: TokenPair, user: User) -> Result<()> {
        let mut creds = self.lock_credentials();
        self.store
            .save(&StoredSession::new(tokens.clone(), user.clone()))?;

        creds.tokens = Some(tokens);
        creds.user = Some(user.clone());
        creds.generation += 1;
        self.state.send_replace(SessionState::Authenticated(user));
        Ok(())
    }

    /// Apply `change` to the current user if it is still `user_id`, persist,
    /// then broadcast. Tokens are left as they are.
    fn commit_user(&self, user_id: &str, change: impl FnOnce(&User) -> User) -> Result<User> {
        let mut creds = self.lock_credentials();
        let (tokens, current) = match (&creds.tokens, &creds.user) {
            (Some(tokens), Some(user)) if user.id == user_id => (tokens.clone(), user),
            _ => {
                debug!("Session changed during profile update, not applying");
                return Err(Error::Unauthenticated);
            }
        };

        let updated = change(current);
        self.store
            .save(&StoredSession::new(tokens, updated.clone()))?;

        creds.user = Some(updated.clone());
        self.state
            .send_replace(SessionState::Authenticated(updated.clone()));
        Ok(updated)
    }

    /// Install refreshed tokens unless a sign-in or sign-out happened while
    /// the refresh was in flight, in which case the newer credentials win.
    fn commit_refresh(&self, started_at: u64, tokens: TokenPair) -> Result<Grant> {
        let mut creds = self.lock_credentials();
        if creds.generation != started_at {
            debug!("Discarding refresh superseded by a newer session change");
            return creds.grant().ok_or(Error::Unauthenticated);
        }
        let user = creds.user.clone().ok_or(Error::Unauthenticated)?;
        self.store.save(&StoredSession::new(tokens.clone(), user))?;

        creds.tokens = Some(tokens);
        creds.generation += 1;
        creds.grant().ok_or(Error::Unauthenticated)
    }

    /// Sign out if the session is still the one `generation` belongs to.
    fn expire_generation(&self, generation: u64) {
        let mut creds = self.lock_credentials();
        if creds.generation != generation {
            return;
        }
        self.clear_store();
        self.reset(&mut creds);
        info!("Session expired");
    }

    /// Drop the current session, if any, after a rejected sign-in.
    fn discard_session(&self) {
        let mut creds = self.lock_credentials();
        if creds.tokens.is_some() {
            info!("Previous session discarded");
        }
        self.clear_store();
        self.reset(&mut creds);
    }

    fn clear_store(&self) {
        if let Err(e) = self.store.clear() {
            error!(error = %e, "Failed to erase stored session");
        }
    }

    async fn refresh_after_grant(&self, rejected: Grant) -> Result<Grant> {
        let _guard = self.refresh_lock.lock().await;

        let tokens = {
            let creds = self.lock_credentials();
            if creds.generation != rejected.generation {
                // Someone else refreshed (or signed in/out) while we waited
                return creds.grant().ok_or(Error::Unauthenticated);
            }
            creds.tokens.clone().ok_or(Error::Unauthenticated)?
        };

        debug!(generation = rejected.generation, "Refreshing access token");
        let request = ApiRequest::post(
            &["sessions", "refresh-token"],
            json!({ "refresh_token": tokens.refresh_credential() }),
        );

        match self.http.send_json::<RefreshResponse>(&request, None).await {
            Ok(response) => {
                let rotated = tokens.rotated(response.token, response.refresh_token);
                let grant = self.commit_refresh(rejected.generation, rotated)?;
                info!(generation = grant.generation, "Access token refreshed");
                Ok(grant)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, signing out");
                self.expire_generation(rejected.generation);
                Err(Error::Unauthenticated)
            }
        }
    }
}

impl Authenticator for SessionInner {
    fn grant(&self) -> Option<Grant> {
        self.lock_credentials().grant()
    }

    fn refresh_after(&self, rejected: Grant) -> BoxFuture<'_, Result<Grant>> {
        Box::pin(self.refresh_after_grant(rejected))
    }

    fn expire(&self, rejected: Grant) {
        self.expire_generation(rejected.generation);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::auth::MemoryTokenStore;
    use crate::validation::MAX_AVATAR_BYTES;

    fn ana() -> User {
        User {
            id: "1".to_string(),
            name: "Ana".to_string(),
            email: "a@b.com".to_string(),
            avatar: None,
        }
    }

    fn manager(store: Arc<MemoryTokenStore>) -> SessionManager {
        // Nothing listens here; these tests never reach the network
        let http = HttpTransport::new("http://127.0.0.1:9", Duration::from_secs(1)).expect("transport");
        SessionManager::new(http, store)
    }

    #[test]
    fn test_initial_state_is_unknown() {
        let session = manager(Arc::new(MemoryTokenStore::new()));
        assert_eq!(session.state(), SessionState::Unknown);
        assert!(!session.state().is_settled());
        assert!(session.current_user().is_none());
    }

    #[test]
    fn test_bootstrap_restores_stored_user() {
        let store = Arc::new(MemoryTokenStore::new());
        store
            .save(&StoredSession::new(TokenPair::new("T1", None), ana()))
            .expect("seed store");

        let session = manager(store);
        let state = session.bootstrap().expect("bootstrap");
        assert_eq!(state, SessionState::Authenticated(ana()));
        assert_eq!(session.inner.grant().map(|g| g.access_token), Some("T1".to_string()));
    }

    #[test]
    fn test_sign_out_broadcasts_and_clears() {
        let store = Arc::new(MemoryTokenStore::new());
        store
            .save(&StoredSession::new(TokenPair::new("T1", None), ana()))
            .expect("seed store");
        let session = manager(store.clone());
        session.bootstrap().expect("bootstrap");

        let mut rx = session.subscribe();
        session.sign_out().expect("sign out");

        assert!(rx.has_changed().expect("sender alive"));
        assert_eq!(*rx.borrow_and_update(), SessionState::Unauthenticated);
        assert!(store.is_empty());
        assert!(session.inner.grant().is_none());

        // Signing out twice is fine
        session.sign_out().expect("sign out again");
        assert_eq!(session.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_commit_refresh_discards_superseded_result() {
        let session = manager(Arc::new(MemoryTokenStore::new()));
        session
            .inner
            .commit_session(TokenPair::new("T1", None), ana())
            .expect("commit");
        let started = session.inner.grant().expect("grant").generation;

        session.sign_out().expect("sign out");

        let result = session
            .inner
            .commit_refresh(started, TokenPair::new("T2", None));
        assert!(matches!(result, Err(Error::Unauthenticated)));
        assert_eq!(session.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_commit_user_requires_same_user() {
        let session = manager(Arc::new(MemoryTokenStore::new()));
        session
            .inner
            .commit_session(TokenPair::new("T1", None), ana())
            .expect("commit");

        let result = session.inner.commit_user("2", |u| u.clone());
        assert!(matches!(result, Err(Error::Unauthenticated)));

        let renamed = session
            .inner
            .commit_user("1", |u| ProfileUpdate::name("Ana Maria").merged_into(u))
            .expect("commit user");
        assert_eq!(renamed.name, "Ana Maria");
        assert_eq!(session.state().user().map(|u| u.name.as_str()), Some("Ana Maria"));
    }

    #[tokio::test]
    async fn test_update_avatar_rejects_large_files_locally() {
        let session = manager(Arc::new(MemoryTokenStore::new()));
        session
            .inner
            .commit_session(TokenPair::new("T1", None), ana())
            .expect("commit");

        let upload = AvatarUpload {
            file_name: "ana.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![0; MAX_AVATAR_BYTES + 1],
        };
        let err = session.update_avatar(upload).await.expect_err("too large");
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(session.current_user(), Some(ana()));
    }

    #[tokio::test]
    async fn test_refresh_without_session_is_unauthenticated() {
        let session = manager(Arc::new(MemoryTokenStore::new()));
        session.bootstrap().expect("bootstrap");
        let err = session.refresh().await.expect_err("no session");
        assert!(err.requires_sign_in());
    }
}

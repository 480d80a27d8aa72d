//! Core library for gymtrack - session management and API access for the
//! fitness tracking app.
//!
//! The app's screens never talk to the backend or the token store directly.
//! They go through two types:
//!
//! - [`SessionManager`]: sign-in, sign-up, sign-out, profile edits and the
//!   current [`SessionState`], observable through a watch channel
//! - [`ApiClient`]: authenticated data access (groups, exercises, history),
//!   obtained from [`SessionManager::api`]; expired tokens are refreshed
//!   transparently, at most once per rejection
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! let config = gymtrack_core::Config::load()?;
//! let session = config.session_manager()?;
//!
//! if !session.bootstrap()?.is_authenticated() {
//!     session.sign_in("a@b.com", "secret1").await?;
//! }
//! let groups = session.api().fetch_groups().await?;
//! # let _ = groups;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod validation;

pub use api::{ApiClient, ApiError};
pub use auth::{SessionManager, SessionState, TokenStore};
pub use config::Config;
pub use error::{Error, Result};

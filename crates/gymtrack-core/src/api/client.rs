//! Authenticated API client for the gymtrack backend.
//!
//! Every data call made by the app goes through [`ApiClient`]. It attaches
//! the session's current access token and, when the backend rejects that
//! token, asks the session to refresh it once and retries the call once.

use std::fmt;
use std::sync::Arc;

use futures::future::{try_join_all, BoxFuture};
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, warn};

use super::http::{ApiRequest, HttpTransport};
use super::ApiError;
use crate::error::{Error, Result};
use crate::models::{Catalog, Exercise, GroupExercises, User};

/// The access token in force when a request was sent, tagged with the
/// credential generation it belongs to.
#[derive(Clone, PartialEq, Eq)]
pub struct Grant {
    pub access_token: String,
    pub generation: u64,
}

impl fmt::Debug for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grant")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Source of credentials for [`ApiClient`]. Implemented by the session manager.
pub trait Authenticator: Send + Sync {
    /// Token to attach right now, if signed in.
    fn grant(&self) -> Option<Grant>;

    /// Obtain a replacement for a grant the backend rejected. Callers that
    /// arrive while a refresh is already running share its outcome.
    fn refresh_after(&self, rejected: Grant) -> BoxFuture<'_, Result<Grant>>;

    /// A freshly refreshed grant was rejected too; end the session it belongs to.
    fn expire(&self, rejected: Grant);
}

/// API client bound to a session.
/// Clone is cheap - the transport and the session are both shared.
#[derive(Clone)]
pub struct ApiClient {
    http: HttpTransport,
    auth: Arc<dyn Authenticator>,
}

impl ApiClient {
    pub fn new(http: HttpTransport, auth: Arc<dyn Authenticator>) -> Self {
        Self { http, auth }
    }

    pub fn transport(&self) -> &HttpTransport {
        &self.http
    }

    /// Send a request with the current token, refreshing and retrying once on 401.
    pub async fn execute(&self, request: &ApiRequest) -> Result<Response> {
        let grant = self.auth.grant();
        let token = grant.as_ref().map(|g| g.access_token.as_str());

        let rejected = match self.http.send(request, token).await {
            Err(ApiError::Unauthorized(_)) => match grant {
                Some(grant) => grant,
                None => return Err(Error::Unauthenticated),
            },
            other => return other.map_err(Error::from),
        };

        debug!(path = %request.path(), generation = rejected.generation, "Access token rejected, refreshing");
        let fresh = self.auth.refresh_after(rejected).await?;

        match self.http.send(request, Some(&fresh.access_token)).await {
            Err(ApiError::Unauthorized(_)) => {
                warn!(path = %request.path(), "Refreshed token rejected, ending session");
                self.auth.expire(fresh);
                Err(Error::Unauthenticated)
            }
            other => other.map_err(Error::from),
        }
    }

    pub async fn execute_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        let response = self.execute(request).await?;
        Ok(HttpTransport::decode(response, &request.path()).await?)
    }

    /// For endpoints whose success body carries nothing of interest.
    pub async fn execute_empty(&self, request: &ApiRequest) -> Result<()> {
        self.execute(request).await.map(|_| ())
    }

    // ===== Data Fetching Methods =====

    /// Fetch muscle group names in display order
    pub async fn fetch_groups(&self) -> Result<Vec<String>> {
        self.execute_json(&ApiRequest::get(&["groups"])).await
    }

    /// Fetch exercise summaries for one muscle group
    pub async fn fetch_exercises_by_group(&self, group: &str) -> Result<Vec<Exercise>> {
        self.execute_json(&ApiRequest::get(&["exercises", "bygroup", group]))
            .await
    }

    /// Fetch a single exercise's detail
    pub async fn fetch_exercise(&self, exercise_id: &str) -> Result<Exercise> {
        self.execute_json(&ApiRequest::get(&["exercises", exercise_id]))
            .await
    }

    /// Record that the user completed an exercise
    pub async fn register_history(&self, exercise_id: &str) -> Result<()> {
        let body = json!({ "exercise_id": exercise_id });
        self.execute_empty(&ApiRequest::post(&["history"], body)).await?;
        info!(exercise_id = exercise_id, "Exercise registered in history");
        Ok(())
    }

    /// Fetch every group with its exercises. Group requests run concurrently;
    /// the first failure fails the whole catalog.
    pub async fn fetch_catalog(&self) -> Result<Catalog> {
        let groups = self.fetch_groups().await?;

        let fetches = groups.into_iter().map(|group| async move {
            let exercises = self.fetch_exercises_by_group(&group).await?;
            Ok::<_, Error>(GroupExercises { group, exercises })
        });
        let groups = try_join_all(fetches).await?;

        let catalog = Catalog { groups };
        debug!(
            groups = catalog.groups.len(),
            exercises = catalog.exercise_count(),
            "Catalog fetched"
        );
        Ok(catalog)
    }

    // ===== Media URLs =====

    fn media_url(&self, segments: &[&str]) -> Option<String> {
        self.http.endpoint(segments).ok().map(String::from)
    }

    pub fn exercise_demo_url(&self, exercise: &Exercise) -> Option<String> {
        if exercise.demo.is_empty() {
            return None;
        }
        self.media_url(&["exercise", "demo", &exercise.demo])
    }

    pub fn exercise_thumb_url(&self, exercise: &Exercise) -> Option<String> {
        let thumb = exercise.thumb.as_deref().filter(|t| !t.is_empty())?;
        self.media_url(&["exercise", "thumb", thumb])
    }

    pub fn avatar_url(&self, user: &User) -> Option<String> {
        let avatar = user.avatar.as_deref().filter(|a| !a.is_empty())?;
        self.media_url(&["avatar", avatar])
    }
}

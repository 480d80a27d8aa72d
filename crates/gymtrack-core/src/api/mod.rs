//! REST API client module for the gymtrack backend.
//!
//! This module provides the `ApiClient` used for every backend call after
//! sign-in, and the lower-level `HttpTransport` it is built on.
//!
//! The API uses bearer token authentication; tokens are obtained and
//! refreshed by the session manager.

pub mod client;
pub mod error;
pub mod http;

pub use client::{ApiClient, Authenticator, Grant};
pub use error::ApiError;
pub use http::{ApiRequest, FilePart, HttpTransport, RequestBody};

//! Data models for gymtrack API entities.
//!
//! This module contains the wire and domain types shared by the session
//! manager and the API adapter:
//!
//! - `User`: The authenticated account snapshot
//! - `ProfileUpdate`, `PasswordChange`, `AvatarUpload`: Profile edit inputs
//! - `Exercise`, `Catalog`: Exercises grouped by muscle group

mod de;
pub mod exercise;
pub mod user;

pub use exercise::{Catalog, Exercise, GroupExercises};
pub use user::{AvatarUpload, PasswordChange, ProfileUpdate, User};

use serde::{Deserialize, Serialize};

use super::de;

/// The authenticated account as returned by `POST /sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    #[serde(deserialize_with = "de::string_or_number")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl User {
    pub fn has_avatar(&self) -> bool {
        self.avatar.as_deref().is_some_and(|a| !a.is_empty())
    }
}

/// Fields a profile edit may change. `None` leaves the field as it is.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub password: Option<PasswordChange>,
}

impl ProfileUpdate {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            password: None,
        }
    }

    pub fn with_password(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.password = Some(PasswordChange {
            old_password: old.into(),
            new_password: new.into(),
        });
        self
    }

    /// Apply the changed fields to a copy of `user`.
    pub fn merged_into(&self, user: &User) -> User {
        let mut merged = user.clone();
        if let Some(ref name) = self.name {
            merged.name = name.clone();
        }
        merged
    }
}

#[derive(Debug, Clone)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
}

/// A photo picked by the user, ready for `PATCH /users/avatar`.
#[derive(Debug, Clone)]
pub struct AvatarUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl AvatarUpload {
    /// Build an upload for a picked photo. The file is named after the
    /// user's name with spaces removed, lowercased, plus `extension`.
    pub fn for_user(user: &User, extension: &str, bytes: Vec<u8>) -> Self {
        let extension = extension.trim_start_matches('.').to_lowercase();
        let subtype = match extension.as_str() {
            "jpg" => "jpeg",
            other => other,
        };
        Self {
            file_name: format!("{}.{}", user.name.replace(' ', "").to_lowercase(), extension),
            content_type: format!("image/{}", subtype),
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

//! Form validation rules for the sign-in, sign-up and profile screens.
//!
//! Each validator is a pure function returning the failed fields mapped to
//! the message to show under them. An empty map means the form can be
//! submitted.

use std::collections::BTreeMap;

/// Largest accepted profile photo (3 MiB)
pub const MAX_AVATAR_BYTES: usize = 3 * 1024 * 1024;

/// Minimum password length enforced at sign-up and password change
pub const MIN_PASSWORD_LEN: usize = 6;

pub const AVATAR_TOO_LARGE: &str = "This image is too large, choose one up to 3MB";

/// Field name -> message.
pub type FieldErrors = BTreeMap<&'static str, String>;

#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileForm {
    pub name: String,
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl ProfileForm {
    /// True when the user filled in any of the password fields.
    pub fn changes_password(&self) -> bool {
        !(self.old_password.is_empty()
            && self.new_password.is_empty()
            && self.confirm_password.is_empty())
    }
}

pub fn validate_sign_in(email: &str, password: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if email.trim().is_empty() {
        errors.insert("email", "Enter your email".to_string());
    }
    if password.is_empty() {
        errors.insert("password", "Enter your password".to_string());
    }
    errors
}

pub fn validate_sign_up(form: &SignUpForm) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if form.name.trim().is_empty() {
        errors.insert("name", "Enter your name".to_string());
    }

    if form.email.trim().is_empty() {
        errors.insert("email", "Enter your email".to_string());
    } else if !is_valid_email(form.email.trim()) {
        errors.insert("email", "Invalid email".to_string());
    }

    if let Some(message) = password_error(&form.password, "Enter a password") {
        errors.insert("password", message);
    }

    if form.password_confirm.is_empty() {
        errors.insert("password_confirm", "Confirm the password".to_string());
    } else if form.password_confirm != form.password {
        errors.insert("password_confirm", "Passwords do not match".to_string());
    }

    errors
}

/// Name is required. Password fields are optional as a group, but once any
/// is filled the old password is required and the new one must be valid
/// and confirmed.
pub fn validate_profile(form: &ProfileForm) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if form.name.trim().is_empty() {
        errors.insert("name", "Enter your name".to_string());
    }

    if !form.changes_password() {
        return errors;
    }

    if form.old_password.is_empty() {
        errors.insert("old_password", "Enter your current password".to_string());
    }
    if let Some(message) = password_error(&form.new_password, "Enter the new password") {
        errors.insert("new_password", message);
    }
    if form.confirm_password != form.new_password {
        errors.insert("confirm_password", "Passwords do not match".to_string());
    }

    errors
}

pub fn validate_avatar(size_bytes: usize) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if size_bytes > MAX_AVATAR_BYTES {
        errors.insert("avatar", AVATAR_TOO_LARGE.to_string());
    }
    errors
}

fn password_error(password: &str, missing: &str) -> Option<String> {
    if password.is_empty() {
        Some(missing.to_string())
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        Some(format!("Use at least {} characters", MIN_PASSWORD_LEN))
    } else {
        None
    }
}

/// Loose shape check: one `@`, non-empty local part, dotted domain, no spaces.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

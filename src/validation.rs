// Field-level validation shared by the write paths

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};

pub const NAME_MAX_LEN: usize = 200;
pub const USER_FIELD_MAX_LEN: usize = 150;
pub const EMAIL_MAX_LEN: usize = 254;

pub static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid username pattern"));
pub static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid slug pattern"));
pub static COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[A-Fa-f0-9]{6}$").expect("valid color pattern"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern"));

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";

/// Validation messages keyed by field name, serialized as `{field: [messages]}`
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// `Ok(())` when nothing was recorded, otherwise a validation error
    pub fn into_result(self) -> AppResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

/// Required, non-blank text of at most `max_len` characters
pub fn check_text(errors: &mut FieldErrors, field: &str, value: Option<&str>, max_len: Option<usize>) {
    match value {
        None => errors.add(field, REQUIRED),
        Some(v) if v.trim().is_empty() => errors.add(field, BLANK),
        Some(v) => {
            if let Some(max) = max_len {
                if v.chars().count() > max {
                    errors.add(
                        field,
                        format!("Ensure this field has no more than {} characters.", max),
                    );
                }
            }
        }
    }
}

pub fn check_range(errors: &mut FieldErrors, field: &str, value: i64, min: i64, max: i64) {
    if value < min {
        errors.add(
            field,
            format!("Ensure this value is greater than or equal to {}.", min),
        );
    } else if value > max {
        errors.add(
            field,
            format!("Ensure this value is less than or equal to {}.", max),
        );
    }
}

pub fn check_email(errors: &mut FieldErrors, value: Option<&str>) {
    check_text(errors, "email", value, Some(EMAIL_MAX_LEN));
    if let Some(v) = value {
        if !v.trim().is_empty() && !EMAIL_RE.is_match(v) {
            errors.add("email", "Enter a valid email address.");
        }
    }
}

pub fn check_username(errors: &mut FieldErrors, value: Option<&str>) {
    check_text(errors, "username", value, Some(USER_FIELD_MAX_LEN));
    if let Some(v) = value {
        if v.trim().is_empty() {
            return;
        }
        if !USERNAME_RE.is_match(v) {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }
        if v.eq_ignore_ascii_case("me") {
            errors.add("username", "Username \"me\" is not allowed.");
        }
    }
}

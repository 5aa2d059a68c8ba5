//! Input validation shared by the HTTP handlers and the storage layer.
//!
//! `Checks` collects every problem in a payload before failing, so a form
//! can highlight all offending fields at once.

use std::collections::HashSet;
use std::sync::LazyLock;

use helpdesk_common::models::ActionFieldType;
use regex::Regex;

use crate::desk::db::NewActionField;
use crate::errors::{DeskError, DeskResult, FieldErrors};

// Compile regexes once using LazyLock
static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

static FIELD_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").unwrap());

static COLOR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").unwrap());

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_NAME_LEN: usize = 255;

#[derive(Debug, Default)]
pub struct Checks {
    errors: FieldErrors,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) -> &mut Self {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
        self
    }

    /// Non-blank and at most `MAX_NAME_LEN` characters.
    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.add(field, format!("The {} field is required.", human(field)));
        } else if value.chars().count() > MAX_NAME_LEN {
            self.add(
                field,
                format!(
                    "The {} field must not be greater than {} characters.",
                    human(field),
                    MAX_NAME_LEN
                ),
            );
        }
        self
    }

    pub fn required_opt(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            self.required(field, value);
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if !EMAIL_REGEX.is_match(value.trim()) {
            self.add(field, format!("The {} field must be a valid email address.", human(field)));
        }
        self
    }

    pub fn email_opt(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            self.email(field, value);
        }
        self
    }

    pub fn password(&mut self, field: &str, value: &str) -> &mut Self {
        if value.chars().count() < MIN_PASSWORD_LEN {
            self.add(
                field,
                format!(
                    "The {} field must be at least {} characters.",
                    human(field),
                    MIN_PASSWORD_LEN
                ),
            );
        }
        self
    }

    pub fn color(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value
            && !COLOR_REGEX.is_match(value)
        {
            self.add(
                field,
                format!("The {} field must be a hex color like #1a2b3c.", human(field)),
            );
        }
        self
    }

    /// Fail with a 400 carrying every collected error.
    pub fn finish(self) -> DeskResult<()> {
        let mut messages = self.errors.values().flatten();
        let Some(first) = messages.next() else {
            return Ok(());
        };
        let rest = messages.count();
        let message = match rest {
            0 => first.clone(),
            1 => format!("{} (and 1 more error)", first),
            n => format!("{} (and {} more errors)", first, n),
        };
        Err(DeskError::Validation {
            message,
            errors: self.errors,
        })
    }
}

/// `category_id` -> `category id`, matching the wording form clients show.
fn human(field: &str) -> String {
    field.rsplit('.').next().unwrap_or(field).replace('_', " ")
}

/// Validate an action's field list: names are snake_case identifiers unique
/// within the action, labels are present, and only `select` fields carry
/// options (at least one).
pub fn action_fields(fields: &[NewActionField]) -> DeskResult<()> {
    let mut checks = Checks::new();
    let mut seen = HashSet::new();
    for (i, field) in fields.iter().enumerate() {
        let name_key = format!("fields.{}.name", i);
        if !FIELD_NAME_REGEX.is_match(&field.name) {
            checks.add(
                &name_key,
                "The field name must start with a lowercase letter and contain only lowercase letters, digits and underscores.",
            );
        } else if !seen.insert(field.name.as_str()) {
            checks.add(
                &name_key,
                format!("The field name '{}' is used more than once.", field.name),
            );
        }
        checks.required(&format!("fields.{}.label", i), &field.label);

        let options_key = format!("fields.{}.options", i);
        match field.field_type {
            ActionFieldType::Select => {
                if field.options.iter().all(|o| o.trim().is_empty()) {
                    checks.add(&options_key, "Select fields need at least one option.");
                }
            }
            _ if !field.options.is_empty() => {
                checks.add(&options_key, "Only select fields may define options.");
            }
            _ => {}
        }
    }
    checks.finish()
}

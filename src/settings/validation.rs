//! Settings validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and addresses
//! - Detect duplicate or malformed bindings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: StoreSettings → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::settings::schema::StoreSettings;

const MAX_DEBOUNCE_MS: u64 = 60_000;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem, tagged with the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_settings(settings: &StoreSettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.watch.debounce_ms > MAX_DEBOUNCE_MS {
        errors.push(ValidationError::new(
            "watch.debounce_ms",
            format!("must be at most {}", MAX_DEBOUNCE_MS),
        ));
    }

    let level = settings.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "logging.level",
            format!("unknown level `{}`", settings.logging.level),
        ));
    }

    if settings.observability.metrics_enabled
        && settings.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", settings.observability.metrics_address),
        ));
    }

    let mut kinds = HashSet::new();
    for (i, binding) in settings.bindings.iter().enumerate() {
        let field = format!("bindings[{}]", i);
        if binding.kind.trim().is_empty() {
            errors.push(ValidationError::new(format!("{}.kind", field), "must not be empty"));
        } else if !kinds.insert(binding.kind.as_str()) {
            errors.push(ValidationError::new(
                format!("{}.kind", field),
                format!("`{}` is bound more than once", binding.kind),
            ));
        }

        if binding.path.trim().is_empty() {
            errors.push(ValidationError::new(format!("{}.path", field), "must not be empty"));
        } else if !braces_balanced(&binding.path) {
            errors.push(ValidationError::new(
                format!("{}.path", field),
                "unbalanced `{` `}` in path template",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn braces_balanced(template: &str) -> bool {
    let mut open = false;
    for c in template.chars() {
        match c {
            '{' if open => return false,
            '{' => open = true,
            '}' if !open => return false,
            '}' => open = false,
            _ => {}
        }
    }
    !open
}

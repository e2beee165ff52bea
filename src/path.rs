//! Placeholder expansion for document path templates.
//!
//! Templates embed `{name}` tokens, e.g. `configs/{server}/settings.yml`.
//! Resolution is a pure function: no filesystem access happens here.

use std::path::PathBuf;
use crate::error::{StoreError, StoreResult};

/// A single named substitution applied to a path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    name: String,
    value: String,
}

impl Substitution {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parse a `name=value` pair, as given on the command line.
    pub fn parse(pair: &str) -> Option<Self> {
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self::new(name, value))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    fn token(&self) -> String {
        format!("{{{}}}", self.name)
    }
}

/// Expand every `{name}` token in `template` using `substitutions`.
///
/// The template is scanned once, so text inserted by a substitution is never
/// expanded again. Braces around anything that is not a token name (for
/// example `{a b}`) are copied through unchanged.
pub fn resolve(template: &str, substitutions: &[Substitution]) -> StoreResult<PathBuf> {
    let fail = |reason: String| StoreError::Resolution {
        template: template.to_string(),
        reason,
    };

    let mut resolved = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        resolved.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let Some(name) = token_name(candidate) else {
            resolved.push('{');
            rest = &candidate[1..];
            continue;
        };
        let token = &candidate[..name.len() + 2];
        let substitution = substitutions
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| fail(format!("no substitution for placeholder {}", token)))?;
        if substitution.value.trim().is_empty() {
            return Err(fail(format!("placeholder {} produced no value", substitution.token())));
        }
        resolved.push_str(&substitution.value);
        rest = &candidate[token.len()..];
    }
    resolved.push_str(rest);

    if resolved.trim().is_empty() {
        return Err(fail("resolved path is empty".to_string()));
    }

    if resolved.contains('\0') {
        return Err(fail("resolved path contains a NUL byte".to_string()));
    }

    Ok(PathBuf::from(resolved))
}

/// Name of the token at the start of `text`, if `text` starts with `{name}`.
fn token_name(text: &str) -> Option<&str> {
    let end = text.find('}')?;
    let name = &text[1..end];
    let is_token = !name.is_empty()
        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.');
    is_token.then_some(name)
}

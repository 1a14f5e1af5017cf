//! LDAP filter helpers
//!
//! Value escaping (RFC 4515) and single-placeholder filter templates.

use crate::error::{DirectoryError, DirectoryResult};

/// Placeholder substituted by [`render_template`].
pub const PLACEHOLDER: &str = "{}";

/// Escape special characters in LDAP filter values (RFC 4515).
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\5c"),
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Substitute the escaped `value` into a filter template.
///
/// Templates carry exactly one `{}` placeholder, e.g.
/// `(&(objectClass=person)(sAMAccountName={}))`.
pub fn render_template(template: &str, value: &str) -> String {
    template.replacen(PLACEHOLDER, &escape_filter_value(value), 1)
}

/// Check that a filter template has exactly one placeholder.
pub fn validate_template(name: &str, template: &str) -> DirectoryResult<()> {
    match template.matches(PLACEHOLDER).count() {
        1 => Ok(()),
        n => Err(DirectoryError::InvalidConfiguration {
            message: format!("filter template '{name}' must contain exactly one '{{}}', found {n}"),
        }),
    }
}

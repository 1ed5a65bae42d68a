//! Slug normalization and validation for short links.

use crate::classify::is_reserved_route;
use crate::error::{RedirectError, RedirectResult};

/// Normalizes user input into a slug: trims, turns every whitespace run
/// into a single `-`, then drops everything outside `[A-Za-z0-9_-]`.
/// Case is preserved.
///
/// ```
/// assert_eq!(folio_routes::normalize_slug("  My App "), "My-App");
/// assert_eq!(folio_routes::normalize_slug("café/β"), "caf");
/// ```
#[must_use]
pub fn normalize_slug(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut in_space = false;
    for c in input.trim().chars() {
        if c.is_whitespace() {
            if !in_space {
                slug.push('-');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            slug.push(c);
        }
    }
    slug
}

/// Whether `slug` collides with one of the site's own routes.
#[must_use]
pub fn is_reserved_slug(slug: &str) -> bool {
    is_reserved_route(slug)
}

/// Normalizes `input` and rejects slugs that can never resolve.
pub fn validate_slug(input: &str) -> RedirectResult<String> {
    let slug = normalize_slug(input);
    if slug.is_empty() {
        return Err(RedirectError::EmptySlug);
    }
    if is_reserved_slug(&slug) {
        return Err(RedirectError::ReservedSlug(slug));
    }
    Ok(slug)
}

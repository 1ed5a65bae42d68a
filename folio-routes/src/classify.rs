//! Decides whether an incoming path may be a short link.

use serde::{Deserialize, Serialize};

/// First-level routes owned by the site itself. Never valid slugs.
pub const RESERVED_ROUTES: [&str; 4] = ["portfolio", "tools", "admin", "go"];

/// Outcome of classifying a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum RouteClass {
    /// Handled by normal routing. Carries the trimmed path.
    Reserved(String),
    /// A single segment that may name a short link.
    Candidate(String),
}

impl RouteClass {
    /// The slug, when this is a candidate.
    #[must_use]
    pub fn candidate(&self) -> Option<&str> {
        match self {
            Self::Candidate(slug) => Some(slug),
            Self::Reserved(_) => None,
        }
    }
}

/// Classifies a request path.
///
/// Leading and trailing separators are ignored and empty segments dropped.
/// Anything but exactly one segment is reserved, as is a segment in
/// [`RESERVED_ROUTES`]. The comparison is case-sensitive: `/Portfolio` is a
/// candidate.
#[must_use]
pub fn classify(path: &str) -> RouteClass {
    let segments: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    match segments.as_slice() {
        [segment] if !is_reserved_route(segment) => RouteClass::Candidate((*segment).to_string()),
        _ => RouteClass::Reserved(segments.join("/")),
    }
}

/// Whether `segment` is one of the site's own routes.
#[must_use]
pub fn is_reserved_route(segment: &str) -> bool {
    RESERVED_ROUTES.contains(&segment)
}

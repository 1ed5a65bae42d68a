//! Short-link routing for Folio.
//!
//! - [`classify`] decides whether a path can name a short link at all
//! - [`normalize_slug`] / [`validate_slug`] apply the slug rules
//! - [`RedirectResolver`] looks a slug up once and navigates
//! - [`RedirectBook`] administers the `redirects` collection
//!
//! ```
//! use folio_routes::{RouteClass, classify};
//!
//! assert_eq!(classify("/portfolio"), RouteClass::Reserved("portfolio".into()));
//! assert_eq!(classify("/MyLink"), RouteClass::Candidate("MyLink".into()));
//! assert_eq!(classify("/a/b"), RouteClass::Reserved("a/b".into()));
//! ```

mod classify;
mod error;
mod redirects;
mod resolver;
mod slug;

pub use classify::{RESERVED_ROUTES, RouteClass, classify, is_reserved_route};
pub use error::{RedirectError, RedirectResult};
pub use redirects::RedirectBook;
pub use resolver::{Navigator, RedirectResolver, ResolveState};
pub use slug::{is_reserved_slug, normalize_slug, validate_slug};

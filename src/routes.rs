//! Route Registry
//!
//! The fixed set of paths the compiled application can render. Pages are reconciled
//! against this set; it is never mutated at runtime.

use crate::error::CmsError;
use crate::types::{path_for_slug, validate_slug};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Routes compiled into the application: (slug, core).
const BUILTIN_ROUTES: &[(&str, bool)] = &[
    ("home", true),
    ("membership", true),
    ("classes", true),
    ("schedule", true),
    ("shop", true),
    ("staff", true),
    ("about", false),
    ("contact", true),
    ("privacy", false),
];

/// A path known to the application, independent of the content store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub path: String,
    pub slug: String,
    /// Core routes receive a navigation entry when an empty nav store is bootstrapped
    #[serde(default = "default_core")]
    pub core: bool,
}

fn default_core() -> bool {
    true
}

impl Route {
    pub fn from_slug(slug: &str) -> Self {
        Self {
            path: path_for_slug(slug),
            slug: slug.to_string(),
            core: true,
        }
    }

    pub fn non_core(mut self) -> Self {
        self.core = false;
        self
    }
}

/// Validated, ordered route list
#[derive(Debug, Clone)]
pub struct RouteRegistry {
    routes: Vec<Route>,
}

impl RouteRegistry {
    /// Validate and wrap a route list.
    ///
    /// Every path must equal the path derived from its slug, and slugs must be unique.
    pub fn new(routes: Vec<Route>) -> Result<Self, CmsError> {
        let mut seen = HashSet::new();
        for route in &routes {
            validate_slug(&route.slug).map_err(CmsError::Validation)?;
            let expected = path_for_slug(&route.slug);
            if route.path != expected {
                return Err(CmsError::Validation(format!(
                    "route '{}' has path '{}', expected '{}'",
                    route.slug, route.path, expected
                )));
            }
            if !seen.insert(route.slug.as_str()) {
                return Err(CmsError::Validation(format!(
                    "duplicate route slug '{}'",
                    route.slug
                )));
            }
        }
        Ok(Self { routes })
    }

    /// The application's compiled route set.
    pub fn builtin() -> Self {
        let routes = BUILTIN_ROUTES
            .iter()
            .map(|(slug, core)| {
                let route = Route::from_slug(slug);
                if *core {
                    route
                } else {
                    route.non_core()
                }
            })
            .collect();
        Self { routes }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn core_routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(|r| r.core)
    }

    pub fn find_by_slug(&self, slug: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.slug == slug)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

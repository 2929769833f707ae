//! Core record types: pages, navigation items and content blocks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Group name that addresses the main navigation bar.
pub const MAIN_NAV_GROUP: &str = "main";

/// Slug of the page served at `/`.
pub const HOME_SLUG: &str = "home";

macro_rules! record_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn as_u64(self) -> u64 {
                self.0
            }

            pub(crate) fn to_key(self) -> [u8; 8] {
                self.0.to_be_bytes()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                $name(raw)
            }
        }
    };
}

record_id!(
    /// Page identifier, allocated by the store
    PageId
);
record_id!(
    /// Navigation item identifier, allocated by the store
    NavItemId
);
record_id!(
    /// Content block identifier, allocated by the store
    BlockId
);

/// Persisted page record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    /// Path this page is served at.
    pub fn path(&self) -> String {
        path_for_slug(&self.slug)
    }
}

/// Fields required to create a page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPage {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

/// Partial page update; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PagePatch {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub meta: Option<BTreeMap<String, String>>,
}

/// Persisted navigation entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavItem {
    pub id: NavItemId,
    pub label: String,
    pub path: String,
    pub order_index: i64,
    #[serde(default)]
    pub nav_group: Option<String>,
    pub visible: bool,
    #[serde(default)]
    pub linked_page_id: Option<PageId>,
}

impl NavItem {
    /// Ordering scope of this item: its group, or the main bar.
    pub fn scope(&self) -> &str {
        self.nav_group.as_deref().unwrap_or(MAIN_NAV_GROUP)
    }
}

/// Fields required to create a navigation entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNavItem {
    pub label: String,
    pub path: String,
    pub order_index: i64,
    #[serde(default)]
    pub nav_group: Option<String>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub linked_page_id: Option<PageId>,
}

fn default_visible() -> bool {
    true
}

impl NewNavItem {
    pub fn new(label: impl Into<String>, path: impl Into<String>, order_index: i64) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
            order_index,
            nav_group: None,
            visible: true,
            linked_page_id: None,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.nav_group = Some(group.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn linked_to(mut self, page_id: PageId) -> Self {
        self.linked_page_id = Some(page_id);
        self
    }
}

/// Partial navigation entry update.
///
/// Double options distinguish "leave unchanged" (`None`) from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavItemPatch {
    pub label: Option<String>,
    pub path: Option<String>,
    pub order_index: Option<i64>,
    pub nav_group: Option<Option<String>>,
    pub visible: Option<bool>,
    pub linked_page_id: Option<Option<PageId>>,
}

/// One reorderable block of page content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub id: BlockId,
    pub page_id: PageId,
    pub order_index: u32,
    pub block_type: String,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// Operator-supplied block body, before an id and position are assigned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockDraft {
    pub block_type: String,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl BlockDraft {
    pub fn new(block_type: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            block_type: block_type.into(),
            content,
            properties: serde_json::Value::Null,
        }
    }
}

/// Content edit that never touches the block position
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockPatch {
    pub block_type: Option<String>,
    pub content: Option<serde_json::Value>,
    pub properties: Option<serde_json::Value>,
}

/// `home` maps to `/`, every other slug to `/{slug}`.
pub fn path_for_slug(slug: &str) -> String {
    if slug == HOME_SLUG {
        "/".to_string()
    } else {
        format!("/{}", slug)
    }
}

/// Inverse of [`path_for_slug`]; `None` for nested or empty paths.
pub fn slug_for_path(path: &str) -> Option<String> {
    if path == "/" {
        return Some(HOME_SLUG.to_string());
    }
    let slug = path.strip_prefix('/')?;
    if slug.is_empty() || slug.contains('/') {
        return None;
    }
    Some(slug.to_string())
}

/// Checks the URL-safe slug alphabet: lowercase ascii, digits and inner dashes.
pub fn validate_slug(slug: &str) -> Result<(), String> {
    if slug.is_empty() {
        return Err("slug cannot be empty".to_string());
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(format!("slug '{}' cannot start or end with '-'", slug));
    }
    if let Some(bad) = slug
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(format!("slug '{}' contains invalid character '{}'", slug, bad));
    }
    Ok(())
}

/// Default page title derived from a slug: `class-schedule` -> `Class Schedule`.
pub fn default_title(slug: &str) -> String {
    slug.split('-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

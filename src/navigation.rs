//! Navigation Assembler
//!
//! Pure transformation of persisted navigation items and pages into the grouped,
//! ordered structure the application renders.

use crate::types::{NavItem, Page, PageId, MAIN_NAV_GROUP};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A navigation item joined to the page it links to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedNavItem {
    #[serde(flatten)]
    pub item: NavItem,
    /// `None` when the item has no link or the link no longer resolves
    pub linked_page: Option<Page>,
}

impl ResolvedNavItem {
    /// Link target: the linked page's path when the link resolves, else the item's path.
    pub fn href(&self) -> String {
        match &self.linked_page {
            Some(page) => page.path(),
            None => self.item.path.clone(),
        }
    }
}

/// Render-ready navigation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Navigation {
    pub main_items: Vec<ResolvedNavItem>,
    /// Dropdown buckets keyed by group name; a group whose items are all hidden is
    /// kept as an empty bucket
    pub dropdowns: BTreeMap<String, Vec<ResolvedNavItem>>,
}

impl Navigation {
    pub fn main_is_empty(&self) -> bool {
        self.main_items.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.main_items.is_empty() && self.dropdowns.values().all(Vec::is_empty)
    }

    pub fn visible_count(&self) -> usize {
        self.main_items.len() + self.dropdowns.values().map(Vec::len).sum::<usize>()
    }
}

/// Assemble navigation from raw records.
///
/// Deterministic for fixed inputs: buckets are ordered by group name and items within a
/// bucket by `order_index`, with ties kept in input order.
pub fn assemble(nav_items: &[NavItem], pages: &[Page]) -> Navigation {
    let pages_by_id: HashMap<PageId, &Page> = pages.iter().map(|p| (p.id, p)).collect();

    let mut navigation = Navigation::default();
    for item in nav_items {
        let group = item
            .nav_group
            .as_deref()
            .filter(|g| *g != MAIN_NAV_GROUP);

        // Register the bucket before filtering so all-hidden groups still show up.
        let bucket = match group {
            None => &mut navigation.main_items,
            Some(name) => navigation.dropdowns.entry(name.to_string()).or_default(),
        };
        if !item.visible {
            continue;
        }

        let linked_page = item
            .linked_page_id
            .and_then(|id| pages_by_id.get(&id))
            .map(|page| (*page).clone());
        bucket.push(ResolvedNavItem {
            item: item.clone(),
            linked_page,
        });
    }

    navigation.main_items.sort_by_key(|r| r.item.order_index);
    for items in navigation.dropdowns.values_mut() {
        items.sort_by_key(|r| r.item.order_index);
    }
    navigation
}

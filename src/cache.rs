//! Read Cache
//!
//! Read-through cache for the navigation inputs and page listings, plus the static
//! invalidation table every mutation goes through.
//!
//! Each cached read carries a generation. A fetch only fills the cache if no
//! invalidation of that key happened while it was in flight, so a read that started
//! before a mutation can never repopulate pre-mutation data.

use crate::error::CmsError;
use crate::navigation::{assemble, Navigation};
use crate::store::Stores;
use crate::types::{ContentBlock, NavItem, Page, PageId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Cached read families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReadKey {
    Pages,
    NavItems,
    Navigation,
    ContentBlocks,
}

impl ReadKey {
    pub const ALL: [ReadKey; 4] = [
        ReadKey::Pages,
        ReadKey::NavItems,
        ReadKey::Navigation,
        ReadKey::ContentBlocks,
    ];

    fn slot(self) -> usize {
        match self {
            ReadKey::Pages => 0,
            ReadKey::NavItems => 1,
            ReadKey::Navigation => 2,
            ReadKey::ContentBlocks => 3,
        }
    }
}

/// Every kind of write the core performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    PageCreated,
    PageUpdated,
    PageDeleted,
    NavItemCreated,
    NavItemUpdated,
    NavItemDeleted,
    NavItemsReordered,
    BlocksRestructured,
    BlockContentUpdated,
    PagesSynced,
    NavigationBootstrapped,
}

impl MutationKind {
    pub const ALL: [MutationKind; 11] = [
        MutationKind::PageCreated,
        MutationKind::PageUpdated,
        MutationKind::PageDeleted,
        MutationKind::NavItemCreated,
        MutationKind::NavItemUpdated,
        MutationKind::NavItemDeleted,
        MutationKind::NavItemsReordered,
        MutationKind::BlocksRestructured,
        MutationKind::BlockContentUpdated,
        MutationKind::PagesSynced,
        MutationKind::NavigationBootstrapped,
    ];

    /// Reads made stale by this mutation.
    pub const fn invalidates(self) -> &'static [ReadKey] {
        use ReadKey::*;
        match self {
            MutationKind::PageCreated | MutationKind::PageUpdated | MutationKind::PagesSynced => {
                &[Pages, Navigation]
            }
            // Deleting a page also drops its blocks.
            MutationKind::PageDeleted => &[Pages, Navigation, ContentBlocks],
            MutationKind::NavItemCreated
            | MutationKind::NavItemUpdated
            | MutationKind::NavItemDeleted
            | MutationKind::NavItemsReordered => &[NavItems, Navigation],
            MutationKind::BlocksRestructured | MutationKind::BlockContentUpdated => {
                &[ContentBlocks]
            }
            MutationKind::NavigationBootstrapped => &[Pages, NavItems, Navigation],
        }
    }
}

#[derive(Default)]
struct CacheState {
    generations: [u64; 4],
    pages: Option<Arc<Vec<Page>>>,
    nav_items: Option<Arc<Vec<NavItem>>>,
    navigation: Option<Arc<Navigation>>,
    blocks: HashMap<PageId, Arc<Vec<ContentBlock>>>,
}

impl CacheState {
    fn generation(&self, key: ReadKey) -> u64 {
        self.generations[key.slot()]
    }

    fn drop_keys(&mut self, keys: &[ReadKey]) {
        for key in keys {
            self.generations[key.slot()] += 1;
            match key {
                ReadKey::Pages => self.pages = None,
                ReadKey::NavItems => self.nav_items = None,
                ReadKey::Navigation => self.navigation = None,
                ReadKey::ContentBlocks => self.blocks.clear(),
            }
        }
    }
}

const NAVIGATION_INPUTS: &[ReadKey] = &[ReadKey::Pages, ReadKey::NavItems, ReadKey::Navigation];

/// Read-through cache over the site stores
pub struct ReadCache {
    stores: Stores,
    state: RwLock<CacheState>,
}

impl ReadCache {
    pub fn new(stores: Stores) -> Self {
        Self {
            stores,
            state: RwLock::new(CacheState::default()),
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Drop every read listed for `kind` in the invalidation table.
    pub fn invalidate(&self, kind: MutationKind) {
        self.state.write().drop_keys(kind.invalidates());
        trace!(?kind, keys = ?kind.invalidates(), "Invalidated reads");
    }

    pub fn generation(&self, key: ReadKey) -> u64 {
        self.state.read().generation(key)
    }

    pub fn is_cached(&self, key: ReadKey) -> bool {
        let state = self.state.read();
        match key {
            ReadKey::Pages => state.pages.is_some(),
            ReadKey::NavItems => state.nav_items.is_some(),
            ReadKey::Navigation => state.navigation.is_some(),
            ReadKey::ContentBlocks => !state.blocks.is_empty(),
        }
    }

    pub async fn pages(&self) -> Result<Arc<Vec<Page>>, CmsError> {
        let generation = {
            let state = self.state.read();
            if let Some(ref pages) = state.pages {
                return Ok(pages.clone());
            }
            state.generation(ReadKey::Pages)
        };
        let pages = Arc::new(self.stores.pages.list_pages().await?);
        let mut state = self.state.write();
        if state.generation(ReadKey::Pages) == generation {
            state.pages = Some(pages.clone());
        }
        Ok(pages)
    }

    pub async fn nav_items(&self) -> Result<Arc<Vec<NavItem>>, CmsError> {
        let generation = {
            let state = self.state.read();
            if let Some(ref items) = state.nav_items {
                return Ok(items.clone());
            }
            state.generation(ReadKey::NavItems)
        };
        let items = Arc::new(self.stores.nav_items.list_nav_items().await?);
        let mut state = self.state.write();
        if state.generation(ReadKey::NavItems) == generation {
            state.nav_items = Some(items.clone());
        }
        Ok(items)
    }

    /// Assembled navigation over the cached page and nav-item reads.
    pub async fn navigation(&self) -> Result<Arc<Navigation>, CmsError> {
        let generation = {
            let state = self.state.read();
            if let Some(ref navigation) = state.navigation {
                return Ok(navigation.clone());
            }
            state.generation(ReadKey::Navigation)
        };
        let (nav_items, pages) = futures::try_join!(self.nav_items(), self.pages())?;
        let navigation = Arc::new(assemble(&nav_items, &pages));
        let mut state = self.state.write();
        if state.generation(ReadKey::Navigation) == generation {
            state.navigation = Some(navigation.clone());
        }
        Ok(navigation)
    }

    /// Re-read pages and nav items from the store and reassemble.
    ///
    /// Unlike [`ReadCache::navigation`] this never serves a cached result, so a store
    /// that went away since the last read surfaces as an error here.
    pub async fn refetch_navigation(&self) -> Result<Arc<Navigation>, CmsError> {
        self.state.write().drop_keys(NAVIGATION_INPUTS);
        trace!("Refetching navigation inputs");
        self.navigation().await
    }

    pub async fn blocks(&self, page_id: PageId) -> Result<Arc<Vec<ContentBlock>>, CmsError> {
        let generation = {
            let state = self.state.read();
            if let Some(blocks) = state.blocks.get(&page_id) {
                return Ok(blocks.clone());
            }
            state.generation(ReadKey::ContentBlocks)
        };
        let blocks = Arc::new(self.stores.blocks.list_blocks(page_id).await?);
        let mut state = self.state.write();
        if state.generation(ReadKey::ContentBlocks) == generation {
            state.blocks.insert(page_id, blocks.clone());
        }
        Ok(blocks)
    }
}

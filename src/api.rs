//! Site API
//!
//! Operator-facing surface over the sync engine, the degraded-mode controller and the
//! content-block ordering service. Every mutation invalidates the reads it affects
//! before returning, so a caller that reads right after a successful write sees it.

use crate::cache::{MutationKind, ReadCache};
use crate::config::SiteConfig;
use crate::controller::{
    ControllerTiming, NavMode, NavigationController, NavigationView, RestoreOutcome,
};
use crate::error::CmsError;
use crate::navigation::Navigation;
use crate::ordering::OrderingService;
use crate::routes::RouteRegistry;
use crate::store::{SledSiteStore, Stores};
use crate::sync::{SyncEngine, SyncOutcome};
use crate::types::{
    BlockDraft, BlockId, BlockPatch, ContentBlock, NavItem, NavItemId, NavItemPatch, NewNavItem,
    NewPage, Page, PageId, PagePatch, MAIN_NAV_GROUP,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Site API service
pub struct SiteApi {
    stores: Stores,
    cache: Arc<ReadCache>,
    sync: Arc<SyncEngine>,
    ordering: OrderingService,
    controller: NavigationController,
    sync_on_startup: bool,
}

impl SiteApi {
    /// Wire the services over an existing set of stores.
    pub fn new(stores: Stores, routes: RouteRegistry, timing: ControllerTiming) -> Self {
        let cache = Arc::new(ReadCache::new(stores.clone()));
        let sync = Arc::new(SyncEngine::new(routes, stores.clone(), cache.clone()));
        let ordering = OrderingService::new(stores.clone(), cache.clone());
        let controller = NavigationController::new(cache.clone(), sync.clone(), timing);
        Self {
            stores,
            cache,
            sync,
            ordering,
            controller,
            sync_on_startup: true,
        }
    }

    /// Open the sled store named by `config` and wire the built-in routes over it.
    pub fn open(config: &SiteConfig, workspace_root: &Path) -> Result<Self, CmsError> {
        config.clone().validated()?;
        let store_path = config.resolve_store_path(workspace_root);
        std::fs::create_dir_all(&store_path).map_err(|e| {
            CmsError::Transport(format!(
                "Failed to create store directory {}: {}",
                store_path.display(),
                e
            ))
        })?;
        let store = Arc::new(SledSiteStore::open(&store_path)?);
        info!(store = %store_path.display(), "Opened site store");

        let mut api = Self::new(
            Stores::from_shared(store),
            RouteRegistry::builtin(),
            ControllerTiming::from(&config.navigation),
        );
        api.sync_on_startup = config.sync.on_startup;
        Ok(api)
    }

    pub fn with_sync_on_startup(mut self, enabled: bool) -> Self {
        self.sync_on_startup = enabled;
        self
    }

    pub fn controller(&self) -> &NavigationController {
        &self.controller
    }

    pub fn cache(&self) -> &ReadCache {
        &self.cache
    }

    pub fn routes(&self) -> &RouteRegistry {
        self.sync.routes()
    }

    /// Startup sequence: optional incremental sync, then the first navigation load.
    ///
    /// A sync failure is logged and does not stop the load; the controller decides
    /// what gets rendered.
    pub async fn start(&self) -> NavMode {
        if self.sync_on_startup {
            match self.trigger_sync().await {
                Ok(SyncOutcome::Failed { error, .. }) => {
                    warn!(error = %error, "Startup sync failed")
                }
                Err(e) => warn!(error = %e, kind = e.kind(), "Startup sync rejected"),
                Ok(SyncOutcome::Completed(_)) => {}
            }
        }
        self.controller.refresh().await
    }

    // --- operator operations ---

    /// Create pages for routes that have none.
    pub async fn trigger_sync(&self) -> Result<SyncOutcome, CmsError> {
        self.sync.incremental_sync().await
    }

    /// Manual restore; accepted only while navigation is degraded.
    pub async fn trigger_force_bootstrap(&self) -> Result<RestoreOutcome, CmsError> {
        self.controller.restore().await
    }

    /// Reorder a page's blocks so they match `ordered_ids`, which must name every
    /// block of the page exactly once.
    pub async fn reorder_content_blocks(
        &self,
        page_id: PageId,
        ordered_ids: Vec<BlockId>,
    ) -> Result<Vec<ContentBlock>, CmsError> {
        self.ordering.reorder(page_id, ordered_ids).await
    }

    // --- reads ---

    pub async fn navigation(&self) -> Result<Arc<Navigation>, CmsError> {
        self.cache.navigation().await
    }

    pub async fn pages(&self) -> Result<Arc<Vec<Page>>, CmsError> {
        self.cache.pages().await
    }

    pub async fn nav_items(&self) -> Result<Arc<Vec<NavItem>>, CmsError> {
        self.cache.nav_items().await
    }

    /// What the navigation UI should draw right now.
    pub fn view(&self) -> NavigationView {
        self.controller.view()
    }

    // --- pages ---

    pub async fn create_page(&self, page: NewPage) -> Result<Page, CmsError> {
        let page = self.stores.pages.create_page(page).await?;
        self.cache.invalidate(MutationKind::PageCreated);
        info!(page_id = %page.id, slug = %page.slug, "Created page");
        Ok(page)
    }

    pub async fn update_page(&self, id: PageId, patch: PagePatch) -> Result<Page, CmsError> {
        let page = self.stores.pages.update_page(id, patch).await?;
        self.cache.invalidate(MutationKind::PageUpdated);
        Ok(page)
    }

    /// Delete a page and its content blocks. Nav items linked to it stay and render
    /// through their own path.
    pub async fn delete_page(&self, id: PageId) -> Result<(), CmsError> {
        self.stores.pages.get_page(id).await?;
        let removed = self.stores.blocks.delete_page_blocks(id).await?;
        if removed > 0 {
            self.cache.invalidate(MutationKind::BlocksRestructured);
        }
        self.stores.pages.delete_page(id).await?;
        self.cache.invalidate(MutationKind::PageDeleted);
        info!(page_id = %id, blocks_removed = removed, "Deleted page");
        Ok(())
    }

    // --- navigation items ---

    pub async fn create_nav_item(&self, item: NewNavItem) -> Result<NavItem, CmsError> {
        if let Some(page_id) = item.linked_page_id {
            self.stores.pages.get_page(page_id).await?;
        }
        let item = self.stores.nav_items.create_nav_item(item).await?;
        self.cache.invalidate(MutationKind::NavItemCreated);
        Ok(item)
    }

    pub async fn update_nav_item(
        &self,
        id: NavItemId,
        patch: NavItemPatch,
    ) -> Result<NavItem, CmsError> {
        if let Some(Some(page_id)) = patch.linked_page_id {
            self.stores.pages.get_page(page_id).await?;
        }
        let item = self.stores.nav_items.update_nav_item(id, patch).await?;
        self.cache.invalidate(MutationKind::NavItemUpdated);
        Ok(item)
    }

    pub async fn delete_nav_item(&self, id: NavItemId) -> Result<(), CmsError> {
        self.stores.nav_items.delete_nav_item(id).await?;
        self.cache.invalidate(MutationKind::NavItemDeleted);
        Ok(())
    }

    /// Renumber one nav group so its items follow `ordered_ids`.
    ///
    /// `group` is `None` for the main bar. The ids must be exactly the items of that
    /// group; the new order indexes are their positions.
    pub async fn reorder_nav_items(
        &self,
        group: Option<&str>,
        ordered_ids: &[NavItemId],
    ) -> Result<Vec<NavItem>, CmsError> {
        let scope = group.unwrap_or(MAIN_NAV_GROUP);
        let items = self.stores.nav_items.list_nav_items().await?;
        let members: HashSet<NavItemId> = items
            .iter()
            .filter(|item| item.scope() == scope)
            .map(|item| item.id)
            .collect();

        let requested: HashSet<NavItemId> = ordered_ids.iter().copied().collect();
        if requested.len() != ordered_ids.len() {
            return Err(CmsError::Validation(
                "nav item reorder lists an item more than once".to_string(),
            ));
        }
        if requested != members {
            return Err(CmsError::Validation(format!(
                "nav item reorder must list exactly the {} items of group '{}'",
                members.len(),
                scope
            )));
        }

        let mut reordered = Vec::with_capacity(ordered_ids.len());
        for (position, id) in ordered_ids.iter().enumerate() {
            let patch = NavItemPatch {
                order_index: Some(position as i64),
                ..Default::default()
            };
            match self.stores.nav_items.update_nav_item(*id, patch).await {
                Ok(item) => reordered.push(item),
                Err(e) => {
                    // Earlier items may already be renumbered.
                    self.cache.invalidate(MutationKind::NavItemsReordered);
                    return Err(e.into());
                }
            }
        }
        self.cache.invalidate(MutationKind::NavItemsReordered);
        Ok(reordered)
    }

    // --- content blocks ---

    pub async fn list_blocks(&self, page_id: PageId) -> Result<Arc<Vec<ContentBlock>>, CmsError> {
        self.ordering.list(page_id).await
    }

    /// Insert a new block at position `at` (`0..=len`).
    pub async fn insert_block(
        &self,
        page_id: PageId,
        draft: BlockDraft,
        at: usize,
    ) -> Result<Vec<ContentBlock>, CmsError> {
        self.stores.pages.get_page(page_id).await?;
        self.ordering.insert(page_id, draft, at).await
    }

    pub async fn remove_block(&self, id: BlockId) -> Result<Vec<ContentBlock>, CmsError> {
        self.ordering.remove(id).await
    }

    pub async fn move_block(&self, id: BlockId, to: usize) -> Result<Vec<ContentBlock>, CmsError> {
        self.ordering.move_to(id, to).await
    }

    /// Copy a block into the slot right after it.
    pub async fn duplicate_block(&self, id: BlockId) -> Result<Vec<ContentBlock>, CmsError> {
        self.ordering.duplicate(id).await
    }

    pub async fn update_block(
        &self,
        id: BlockId,
        patch: BlockPatch,
    ) -> Result<ContentBlock, CmsError> {
        self.ordering.update(id, patch).await
    }
}

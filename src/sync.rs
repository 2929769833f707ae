//! Sync Engine
//!
//! Reconciles the route registry against the page store. The incremental pass creates
//! missing pages; the force-bootstrap pass additionally seeds a minimal navigation when
//! the nav-item store is entirely empty.
//!
//! Every write is an upsert keyed by slug (or a seed guarded by emptiness), so any
//! number of concurrent passes converge on one record per slug without locking.

use crate::cache::{MutationKind, ReadCache};
use crate::error::CmsError;
use crate::routes::RouteRegistry;
use crate::store::Stores;
use crate::types::{default_title, NewNavItem, NewPage, Page, PageId};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Counts from one sync pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Slugs whose page was created by this pass
    pub pages_created: Vec<String>,
    /// Routes that already had a page
    pub pages_existing: usize,
    /// Navigation items seeded into an empty store
    pub nav_items_seeded: usize,
}

impl SyncReport {
    pub fn changed(&self) -> bool {
        !self.pages_created.is_empty() || self.nav_items_seeded > 0
    }
}

/// Outcome of a sync pass.
///
/// Transport and lookup failures end up here as [`SyncOutcome::Failed`]; validation
/// and consistency faults are returned as `Err` by the engine instead.
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    Completed(SyncReport),
    Failed { report: SyncReport, error: CmsError },
}

impl SyncOutcome {
    pub fn report(&self) -> &SyncReport {
        match self {
            SyncOutcome::Completed(report) | SyncOutcome::Failed { report, .. } => report,
        }
    }

    pub fn error(&self) -> Option<&CmsError> {
        match self {
            SyncOutcome::Completed(_) => None,
            SyncOutcome::Failed { error, .. } => Some(error),
        }
    }

    /// Whether a restore may count this pass as a success.
    ///
    /// A pass that created nothing is not a repair, even without an error.
    pub fn is_repair(&self) -> bool {
        matches!(self, SyncOutcome::Completed(report) if report.changed())
    }
}

/// Reconciles routes against persisted pages
pub struct SyncEngine {
    routes: RouteRegistry,
    stores: Stores,
    cache: Arc<ReadCache>,
}

impl SyncEngine {
    pub fn new(routes: RouteRegistry, stores: Stores, cache: Arc<ReadCache>) -> Self {
        Self {
            routes,
            stores,
            cache,
        }
    }

    pub fn routes(&self) -> &RouteRegistry {
        &self.routes
    }

    /// Create a page for every route without one. Existing pages are never touched.
    #[instrument(skip(self), fields(routes = self.routes.len()))]
    pub async fn incremental_sync(&self) -> Result<SyncOutcome, CmsError> {
        let mut report = SyncReport::default();
        let result = self.ensure_pages(&mut report).await.map(|_| ());
        self.finish("incremental", report, result, MutationKind::PagesSynced)
    }

    /// Recovery pass: idempotent page creation, then a minimal navigation seed when the
    /// nav-item store holds no items at all.
    #[instrument(skip(self), fields(routes = self.routes.len()))]
    pub async fn force_bootstrap(&self) -> Result<SyncOutcome, CmsError> {
        let mut report = SyncReport::default();
        let result = match self.ensure_pages(&mut report).await {
            Ok(pages) => self.seed_navigation(&pages, &mut report).await,
            Err(e) => Err(e),
        };
        self.finish(
            "force_bootstrap",
            report,
            result,
            MutationKind::NavigationBootstrapped,
        )
    }

    /// Upsert one page per route; returns slug -> page id for every route.
    async fn ensure_pages(
        &self,
        report: &mut SyncReport,
    ) -> Result<HashMap<String, PageId>, CmsError> {
        let mut pages = HashMap::with_capacity(self.routes.len());
        for route in self.routes.routes() {
            let draft = NewPage {
                slug: route.slug.clone(),
                title: default_title(&route.slug),
                meta: Default::default(),
            };
            let outcome = self.stores.pages.create_page_if_absent(draft).await?;
            let created = outcome.was_created();
            let page: Page = outcome.into_inner();
            if created {
                debug!(slug = %page.slug, page_id = %page.id, "Created page for route");
                report.pages_created.push(page.slug.clone());
            } else {
                report.pages_existing += 1;
            }
            pages.insert(page.slug, page.id);
        }
        Ok(pages)
    }

    async fn seed_navigation(
        &self,
        pages: &HashMap<String, PageId>,
        report: &mut SyncReport,
    ) -> Result<(), CmsError> {
        let seed: Vec<NewNavItem> = self
            .routes
            .core_routes()
            .enumerate()
            .map(|(position, route)| {
                let item =
                    NewNavItem::new(default_title(&route.slug), &route.path, position as i64);
                match pages.get(&route.slug) {
                    Some(page_id) => item.linked_to(*page_id),
                    None => item,
                }
            })
            .collect();
        let seeded = self.stores.nav_items.seed_nav_items_if_empty(seed).await?;
        if seeded.is_empty() {
            debug!("Nav-item store not empty, skipping navigation seed");
        }
        report.nav_items_seeded = seeded.len();
        Ok(())
    }

    fn finish(
        &self,
        pass: &'static str,
        report: SyncReport,
        result: Result<(), CmsError>,
        mutation: MutationKind,
    ) -> Result<SyncOutcome, CmsError> {
        // Partial work is still a mutation; readers must not keep the old view.
        if report.changed() {
            self.cache.invalidate(mutation);
        }
        match result {
            Ok(()) => {
                info!(
                    pass,
                    pages_created = report.pages_created.len(),
                    pages_existing = report.pages_existing,
                    nav_items_seeded = report.nav_items_seeded,
                    "Sync pass completed"
                );
                Ok(SyncOutcome::Completed(report))
            }
            Err(error) if error.is_absorbable() => {
                warn!(
                    pass,
                    error = %error,
                    kind = error.kind(),
                    pages_created = report.pages_created.len(),
                    "Sync pass failed"
                );
                Ok(SyncOutcome::Failed { report, error })
            }
            Err(error) => Err(error),
        }
    }
}

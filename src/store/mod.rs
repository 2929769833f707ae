//! Site Store
//!
//! Persistence interface for pages, navigation items and content blocks. Every call
//! is awaited and may fail with a transport or validation error.

pub mod persistence;

pub use persistence::SledSiteStore;

use crate::error::StoreError;
use crate::types::{
    BlockId, BlockPatch, ContentBlock, NavItem, NavItemId, NavItemPatch, NewNavItem, NewPage,
    Page, PageId, PagePatch,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Result of an upsert-by-key write
#[derive(Debug, Clone, PartialEq)]
pub enum Upsert<T> {
    Created(T),
    Existing(T),
}

impl<T> Upsert<T> {
    pub fn was_created(&self) -> bool {
        matches!(self, Upsert::Created(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Upsert::Created(value) | Upsert::Existing(value) => value,
        }
    }
}

/// Complete structural change to one page's blocks, applied atomically
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockBatch {
    /// Blocks to write as-is (new blocks or changed positions)
    pub upserts: Vec<ContentBlock>,
    /// Blocks to delete
    pub removals: Vec<BlockId>,
}

impl BlockBatch {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }
}

/// A page's blocks together with the block revision they were read at
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockSnapshot {
    /// Bumped by every batch applied to the page; 0 before the first one
    pub revision: u64,
    pub blocks: Vec<ContentBlock>,
}

/// Page Store interface
#[async_trait]
pub trait PageStore: Send + Sync {
    async fn list_pages(&self) -> Result<Vec<Page>, StoreError>;

    async fn get_page(&self, id: PageId) -> Result<Page, StoreError>;

    async fn find_page_by_slug(&self, slug: &str) -> Result<Option<Page>, StoreError>;

    /// Create a page; a slug already in use is a validation error.
    async fn create_page(&self, page: NewPage) -> Result<Page, StoreError>;

    /// Create a page unless one with the same slug exists.
    ///
    /// The check and the insert are one atomic step, so concurrent callers converge on
    /// a single record per slug.
    async fn create_page_if_absent(&self, page: NewPage) -> Result<Upsert<Page>, StoreError>;

    async fn update_page(&self, id: PageId, patch: PagePatch) -> Result<Page, StoreError>;

    async fn delete_page(&self, id: PageId) -> Result<(), StoreError>;
}

/// Nav-Item Store interface
#[async_trait]
pub trait NavItemStore: Send + Sync {
    /// All items in insertion order.
    async fn list_nav_items(&self) -> Result<Vec<NavItem>, StoreError>;

    async fn get_nav_item(&self, id: NavItemId) -> Result<NavItem, StoreError>;

    async fn create_nav_item(&self, item: NewNavItem) -> Result<NavItem, StoreError>;

    async fn update_nav_item(
        &self,
        id: NavItemId,
        patch: NavItemPatch,
    ) -> Result<NavItem, StoreError>;

    async fn delete_nav_item(&self, id: NavItemId) -> Result<(), StoreError>;

    /// Insert `items` only if the store holds no items at all; returns what was created.
    async fn seed_nav_items_if_empty(
        &self,
        items: Vec<NewNavItem>,
    ) -> Result<Vec<NavItem>, StoreError>;
}

/// Content-Block Store interface
///
/// Structural writes go through [`ContentBlockStore::apply_block_batch`] only, so the
/// ordering service stays the single owner of `order_index`.
#[async_trait]
pub trait ContentBlockStore: Send + Sync {
    /// Blocks of one page, ascending by `order_index`.
    async fn list_blocks(&self, page_id: PageId) -> Result<Vec<ContentBlock>, StoreError>;

    /// Blocks of one page plus the revision to pass back to
    /// [`ContentBlockStore::apply_block_batch`].
    async fn block_snapshot(&self, page_id: PageId) -> Result<BlockSnapshot, StoreError>;

    async fn get_block(&self, id: BlockId) -> Result<ContentBlock, StoreError>;

    /// Allocate an identity for a block that has not been written yet.
    async fn next_block_id(&self) -> Result<BlockId, StoreError>;

    async fn update_block(&self, id: BlockId, patch: BlockPatch)
        -> Result<ContentBlock, StoreError>;

    /// Apply a whole-page batch atomically: readers see all of it or none of it.
    ///
    /// With `expected_revision` set, the batch is written only if the page is still at
    /// that revision, otherwise nothing is written and [`StoreError::Conflict`] is
    /// returned.
    async fn apply_block_batch(
        &self,
        page_id: PageId,
        expected_revision: Option<u64>,
        batch: &BlockBatch,
    ) -> Result<(), StoreError>;

    async fn delete_page_blocks(&self, page_id: PageId) -> Result<usize, StoreError>;
}

/// Shared handles to the three stores
#[derive(Clone)]
pub struct Stores {
    pub pages: Arc<dyn PageStore>,
    pub nav_items: Arc<dyn NavItemStore>,
    pub blocks: Arc<dyn ContentBlockStore>,
}

impl Stores {
    pub fn new(
        pages: Arc<dyn PageStore>,
        nav_items: Arc<dyn NavItemStore>,
        blocks: Arc<dyn ContentBlockStore>,
    ) -> Self {
        Self {
            pages,
            nav_items,
            blocks,
        }
    }

    /// Back all three stores with one implementation.
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: PageStore + NavItemStore + ContentBlockStore + 'static,
    {
        Self {
            pages: store.clone(),
            nav_items: store.clone(),
            blocks: store,
        }
    }
}

//! Sled-backed persistence for the site stores

use crate::error::StoreError;
use crate::store::{
    BlockBatch, BlockSnapshot, ContentBlockStore, NavItemStore, PageStore, Upsert,
};
use crate::types::{
    validate_slug, BlockId, BlockPatch, ContentBlock, NavItem, NavItemId, NavItemPatch,
    NewNavItem, NewPage, Page, PageId, PagePatch,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use std::path::Path;
use tracing::debug;

const TREE_PAGES: &str = "pages";
const TREE_PAGE_SLUGS: &str = "page_slugs";
const TREE_NAV_ITEMS: &str = "nav_items";
const TREE_BLOCKS: &str = "content_blocks";
const TREE_BLOCK_INDEX: &str = "content_block_index";
const TREE_BLOCK_REVISIONS: &str = "content_block_revisions";

/// One sled database holding pages, navigation items and content blocks.
///
/// Block records are keyed `page_id ++ block_id` so a page's blocks are one prefix
/// scan; `content_block_index` maps a block id back to its page, and
/// `content_block_revisions` counts the batches applied to each page.
pub struct SledSiteStore {
    db: Db,
    pages: Tree,
    page_slugs: Tree,
    nav_items: Tree,
    blocks: Tree,
    block_index: Tree,
    block_revisions: Tree,
    seed_lock: Mutex<()>,
}

impl SledSiteStore {
    /// Open (or create) the store at the given directory
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            StoreError::Transport(format!(
                "Failed to open sled database at {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::with_db(db)
    }

    pub fn with_db(db: Db) -> Result<Self, StoreError> {
        let pages = db.open_tree(TREE_PAGES).map_err(to_transport)?;
        let page_slugs = db.open_tree(TREE_PAGE_SLUGS).map_err(to_transport)?;
        let nav_items = db.open_tree(TREE_NAV_ITEMS).map_err(to_transport)?;
        let blocks = db.open_tree(TREE_BLOCKS).map_err(to_transport)?;
        let block_index = db.open_tree(TREE_BLOCK_INDEX).map_err(to_transport)?;
        let block_revisions = db.open_tree(TREE_BLOCK_REVISIONS).map_err(to_transport)?;
        Ok(Self {
            db,
            pages,
            page_slugs,
            nav_items,
            blocks,
            block_index,
            block_revisions,
            seed_lock: Mutex::new(()),
        })
    }

    /// Get the underlying sled database
    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush().map_err(to_transport)?;
        Ok(())
    }

    fn next_id(&self) -> Result<u64, StoreError> {
        self.db.generate_id().map_err(to_transport)
    }

    // --- pages ---

    fn list_pages_sync(&self) -> Result<Vec<Page>, StoreError> {
        decode_all(&self.pages)
    }

    fn get_page_sync(&self, id: PageId) -> Result<Page, StoreError> {
        let raw = self
            .pages
            .get(id.to_key())
            .map_err(to_transport)?
            .ok_or_else(|| StoreError::not_found("page", id))?;
        decode(&raw)
    }

    fn find_page_by_slug_sync(&self, slug: &str) -> Result<Option<Page>, StoreError> {
        let Some(raw_id) = self.page_slugs.get(slug.as_bytes()).map_err(to_transport)? else {
            return Ok(None);
        };
        let Some(raw) = self.pages.get(&raw_id).map_err(to_transport)? else {
            return Err(StoreError::Transport(format!(
                "slug index for '{}' points at a missing page",
                slug
            )));
        };
        Ok(Some(decode(&raw)?))
    }

    /// Shared insert path for manual and upsert creation.
    fn insert_page(&self, page: NewPage, reuse_existing: bool) -> Result<Upsert<Page>, StoreError> {
        validate_slug(&page.slug).map_err(StoreError::Validation)?;
        if page.title.trim().is_empty() {
            return Err(StoreError::Validation(format!(
                "page '{}' needs a title",
                page.slug
            )));
        }

        let now = Utc::now();
        let record = Page {
            id: PageId(self.next_id()?),
            slug: page.slug,
            title: page.title,
            meta: page.meta,
            created_at: now,
            updated_at: now,
        };
        let key = record.id.to_key().to_vec();
        let value = encode(&record)?;

        let result: Result<Upsert<Page>, TransactionError<StoreError>> =
            (&self.pages, &self.page_slugs).transaction(|(pages, slugs)| {
                if let Some(existing_id) = slugs.get(record.slug.as_bytes())? {
                    if !reuse_existing {
                        return Err(ConflictableTransactionError::Abort(StoreError::Validation(
                            format!("a page with slug '{}' already exists", record.slug),
                        )));
                    }
                    let raw = pages.get(&existing_id)?.ok_or_else(|| {
                        ConflictableTransactionError::Abort(StoreError::Transport(format!(
                            "slug index for '{}' points at a missing page",
                            record.slug
                        )))
                    })?;
                    let existing: Page = decode(&raw).map_err(ConflictableTransactionError::Abort)?;
                    return Ok(Upsert::Existing(existing));
                }
                pages.insert(key.clone(), value.clone())?;
                slugs.insert(record.slug.as_bytes(), key.clone())?;
                Ok(Upsert::Created(record.clone()))
            });
        let outcome = result.map_err(from_tx)?;
        if outcome.was_created() {
            debug!(slug = %record.slug, page_id = %record.id, "Page created");
        }
        Ok(outcome)
    }

    fn update_page_sync(&self, id: PageId, patch: PagePatch) -> Result<Page, StoreError> {
        if let Some(ref slug) = patch.slug {
            validate_slug(slug).map_err(StoreError::Validation)?;
        }
        if matches!(patch.title, Some(ref t) if t.trim().is_empty()) {
            return Err(StoreError::Validation("page title cannot be empty".to_string()));
        }
        let key = id.to_key().to_vec();

        let result: Result<Page, TransactionError<StoreError>> =
            (&self.pages, &self.page_slugs).transaction(|(pages, slugs)| {
                let raw = pages.get(&key)?.ok_or_else(|| {
                    ConflictableTransactionError::Abort(StoreError::not_found("page", id))
                })?;
                let mut page: Page = decode(&raw).map_err(ConflictableTransactionError::Abort)?;

                if let Some(ref slug) = patch.slug {
                    if *slug != page.slug {
                        if let Some(owner) = slugs.get(slug.as_bytes())? {
                            if &*owner != key.as_slice() {
                                return Err(ConflictableTransactionError::Abort(
                                    StoreError::Validation(format!(
                                        "a page with slug '{}' already exists",
                                        slug
                                    )),
                                ));
                            }
                        }
                        slugs.remove(page.slug.as_bytes())?;
                        slugs.insert(slug.as_bytes(), key.clone())?;
                        page.slug = slug.clone();
                    }
                }
                if let Some(ref title) = patch.title {
                    page.title = title.clone();
                }
                if let Some(ref meta) = patch.meta {
                    page.meta = meta.clone();
                }
                page.updated_at = Utc::now();

                let value = encode(&page).map_err(ConflictableTransactionError::Abort)?;
                pages.insert(key.clone(), value)?;
                Ok(page)
            });
        result.map_err(from_tx)
    }

    fn delete_page_sync(&self, id: PageId) -> Result<(), StoreError> {
        let key = id.to_key().to_vec();
        let result: Result<(), TransactionError<StoreError>> =
            (&self.pages, &self.page_slugs).transaction(|(pages, slugs)| {
                let raw = pages.remove(key.clone())?.ok_or_else(|| {
                    ConflictableTransactionError::Abort(StoreError::not_found("page", id))
                })?;
                let page: Page = decode(&raw).map_err(ConflictableTransactionError::Abort)?;
                slugs.remove(page.slug.as_bytes())?;
                Ok(())
            });
        result.map_err(from_tx)
    }

    // --- navigation items ---

    fn get_nav_item_sync(&self, id: NavItemId) -> Result<NavItem, StoreError> {
        let raw = self
            .nav_items
            .get(id.to_key())
            .map_err(to_transport)?
            .ok_or_else(|| StoreError::not_found("nav item", id))?;
        decode(&raw)
    }

    fn create_nav_item_sync(&self, item: NewNavItem) -> Result<NavItem, StoreError> {
        validate_nav_fields(&item.label, &item.path)?;
        let record = NavItem {
            id: NavItemId(self.next_id()?),
            label: item.label,
            path: item.path,
            order_index: item.order_index,
            nav_group: item.nav_group,
            visible: item.visible,
            linked_page_id: item.linked_page_id,
        };
        self.nav_items
            .insert(record.id.to_key(), encode(&record)?)
            .map_err(to_transport)?;
        Ok(record)
    }

    fn update_nav_item_sync(
        &self,
        id: NavItemId,
        patch: NavItemPatch,
    ) -> Result<NavItem, StoreError> {
        let mut item = self.get_nav_item_sync(id)?;
        if let Some(label) = patch.label {
            item.label = label;
        }
        if let Some(path) = patch.path {
            item.path = path;
        }
        if let Some(order_index) = patch.order_index {
            item.order_index = order_index;
        }
        if let Some(nav_group) = patch.nav_group {
            item.nav_group = nav_group;
        }
        if let Some(visible) = patch.visible {
            item.visible = visible;
        }
        if let Some(linked) = patch.linked_page_id {
            item.linked_page_id = linked;
        }
        validate_nav_fields(&item.label, &item.path)?;
        self.nav_items
            .insert(id.to_key(), encode(&item)?)
            .map_err(to_transport)?;
        Ok(item)
    }

    fn delete_nav_item_sync(&self, id: NavItemId) -> Result<(), StoreError> {
        match self.nav_items.remove(id.to_key()).map_err(to_transport)? {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found("nav item", id)),
        }
    }

    fn seed_nav_items_sync(&self, items: Vec<NewNavItem>) -> Result<Vec<NavItem>, StoreError> {
        // sled holds an exclusive lock on its directory, so an in-process mutex makes the
        // emptiness check and the inserts a single step.
        let _guard = self.seed_lock.lock();
        if !self.nav_items.is_empty() {
            return Ok(Vec::new());
        }

        let mut batch = sled::Batch::default();
        let mut created = Vec::with_capacity(items.len());
        for item in items {
            validate_nav_fields(&item.label, &item.path)?;
            let record = NavItem {
                id: NavItemId(self.next_id()?),
                label: item.label,
                path: item.path,
                order_index: item.order_index,
                nav_group: item.nav_group,
                visible: item.visible,
                linked_page_id: item.linked_page_id,
            };
            batch.insert(record.id.to_key().to_vec(), encode(&record)?);
            created.push(record);
        }
        self.nav_items.apply_batch(batch).map_err(to_transport)?;
        Ok(created)
    }

    // --- content blocks ---

    fn list_blocks_sync(&self, page_id: PageId) -> Result<Vec<ContentBlock>, StoreError> {
        let mut out = Vec::new();
        for entry in self.blocks.scan_prefix(page_id.to_key()) {
            let (_, value) = entry.map_err(to_transport)?;
            out.push(decode::<ContentBlock>(&value)?);
        }
        out.sort_by_key(|b| (b.order_index, b.id));
        Ok(out)
    }

    fn block_snapshot_sync(&self, page_id: PageId) -> Result<BlockSnapshot, StoreError> {
        // Revision first: a batch landing between the two reads makes the snapshot
        // stale, and the batch check rejects it.
        let revision = match self
            .block_revisions
            .get(page_id.to_key())
            .map_err(to_transport)?
        {
            Some(raw) => decode_u64(&raw)?,
            None => 0,
        };
        Ok(BlockSnapshot {
            revision,
            blocks: self.list_blocks_sync(page_id)?,
        })
    }

    fn get_block_sync(&self, id: BlockId) -> Result<ContentBlock, StoreError> {
        let raw_page = self
            .block_index
            .get(id.to_key())
            .map_err(to_transport)?
            .ok_or_else(|| StoreError::not_found("content block", id))?;
        let page_id = PageId(decode_u64(&raw_page)?);
        let raw = self
            .blocks
            .get(block_key(page_id, id))
            .map_err(to_transport)?
            .ok_or_else(|| StoreError::not_found("content block", id))?;
        decode(&raw)
    }

    fn update_block_sync(
        &self,
        id: BlockId,
        patch: BlockPatch,
    ) -> Result<ContentBlock, StoreError> {
        let mut block = self.get_block_sync(id)?;
        if let Some(block_type) = patch.block_type {
            if block_type.trim().is_empty() {
                return Err(StoreError::Validation("block type cannot be empty".to_string()));
            }
            block.block_type = block_type;
        }
        if let Some(content) = patch.content {
            block.content = content;
        }
        if let Some(properties) = patch.properties {
            block.properties = properties;
        }
        self.blocks
            .insert(block_key(block.page_id, id), encode(&block)?)
            .map_err(to_transport)?;
        Ok(block)
    }

    fn apply_block_batch_sync(
        &self,
        page_id: PageId,
        expected_revision: Option<u64>,
        batch: &BlockBatch,
    ) -> Result<(), StoreError> {
        let mut upserts = Vec::with_capacity(batch.upserts.len());
        for block in &batch.upserts {
            if block.page_id != page_id {
                return Err(StoreError::Validation(format!(
                    "block {} belongs to page {}, not {}",
                    block.id, block.page_id, page_id
                )));
            }
            upserts.push((block.id, encode(block)?));
        }
        let page_key = page_id.to_key().to_vec();

        let trees = (&self.blocks, &self.block_index, &self.block_revisions);
        let result: Result<u64, TransactionError<StoreError>> =
            trees.transaction(|(blocks, index, revisions)| {
                let current = match revisions.get(&page_key)? {
                    Some(raw) => decode_u64(&raw).map_err(ConflictableTransactionError::Abort)?,
                    None => 0,
                };
                if let Some(expected) = expected_revision {
                    if current != expected {
                        return Err(ConflictableTransactionError::Abort(StoreError::Conflict(
                            format!(
                                "blocks of page {} changed while the batch was planned \
                                 (revision {} expected, found {})",
                                page_id, expected, current
                            ),
                        )));
                    }
                }
                revisions.insert(page_key.clone(), (current + 1).to_be_bytes().to_vec())?;
                for id in &batch.removals {
                    blocks.remove(block_key(page_id, *id))?;
                    index.remove(id.to_key().to_vec())?;
                }
                for (id, value) in &upserts {
                    blocks.insert(block_key(page_id, *id), value.clone())?;
                    index.insert(id.to_key().to_vec(), page_key.clone())?;
                }
                Ok(current + 1)
            });
        let revision = result.map_err(from_tx)?;
        debug!(
            page_id = %page_id,
            revision,
            upserts = batch.upserts.len(),
            removals = batch.removals.len(),
            "Applied content block batch"
        );
        Ok(())
    }

    fn delete_page_blocks_sync(&self, page_id: PageId) -> Result<usize, StoreError> {
        let removals = self
            .list_blocks_sync(page_id)?
            .into_iter()
            .map(|b| b.id)
            .collect::<Vec<_>>();
        let count = removals.len();
        self.apply_block_batch_sync(
            page_id,
            None,
            &BlockBatch {
                upserts: Vec::new(),
                removals,
            },
        )?;
        Ok(count)
    }
}

#[async_trait]
impl PageStore for SledSiteStore {
    async fn list_pages(&self) -> Result<Vec<Page>, StoreError> {
        self.list_pages_sync()
    }

    async fn get_page(&self, id: PageId) -> Result<Page, StoreError> {
        self.get_page_sync(id)
    }

    async fn find_page_by_slug(&self, slug: &str) -> Result<Option<Page>, StoreError> {
        self.find_page_by_slug_sync(slug)
    }

    async fn create_page(&self, page: NewPage) -> Result<Page, StoreError> {
        self.insert_page(page, false).map(Upsert::into_inner)
    }

    async fn create_page_if_absent(&self, page: NewPage) -> Result<Upsert<Page>, StoreError> {
        self.insert_page(page, true)
    }

    async fn update_page(&self, id: PageId, patch: PagePatch) -> Result<Page, StoreError> {
        self.update_page_sync(id, patch)
    }

    async fn delete_page(&self, id: PageId) -> Result<(), StoreError> {
        self.delete_page_sync(id)
    }
}

#[async_trait]
impl NavItemStore for SledSiteStore {
    async fn list_nav_items(&self) -> Result<Vec<NavItem>, StoreError> {
        decode_all(&self.nav_items)
    }

    async fn get_nav_item(&self, id: NavItemId) -> Result<NavItem, StoreError> {
        self.get_nav_item_sync(id)
    }

    async fn create_nav_item(&self, item: NewNavItem) -> Result<NavItem, StoreError> {
        self.create_nav_item_sync(item)
    }

    async fn update_nav_item(
        &self,
        id: NavItemId,
        patch: NavItemPatch,
    ) -> Result<NavItem, StoreError> {
        self.update_nav_item_sync(id, patch)
    }

    async fn delete_nav_item(&self, id: NavItemId) -> Result<(), StoreError> {
        self.delete_nav_item_sync(id)
    }

    async fn seed_nav_items_if_empty(
        &self,
        items: Vec<NewNavItem>,
    ) -> Result<Vec<NavItem>, StoreError> {
        self.seed_nav_items_sync(items)
    }
}

#[async_trait]
impl ContentBlockStore for SledSiteStore {
    async fn list_blocks(&self, page_id: PageId) -> Result<Vec<ContentBlock>, StoreError> {
        self.list_blocks_sync(page_id)
    }

    async fn block_snapshot(&self, page_id: PageId) -> Result<BlockSnapshot, StoreError> {
        self.block_snapshot_sync(page_id)
    }

    async fn get_block(&self, id: BlockId) -> Result<ContentBlock, StoreError> {
        self.get_block_sync(id)
    }

    async fn next_block_id(&self) -> Result<BlockId, StoreError> {
        Ok(BlockId(self.next_id()?))
    }

    async fn update_block(
        &self,
        id: BlockId,
        patch: BlockPatch,
    ) -> Result<ContentBlock, StoreError> {
        self.update_block_sync(id, patch)
    }

    async fn apply_block_batch(
        &self,
        page_id: PageId,
        expected_revision: Option<u64>,
        batch: &BlockBatch,
    ) -> Result<(), StoreError> {
        self.apply_block_batch_sync(page_id, expected_revision, batch)
    }

    async fn delete_page_blocks(&self, page_id: PageId) -> Result<usize, StoreError> {
        self.delete_page_blocks_sync(page_id)
    }
}

fn validate_nav_fields(label: &str, path: &str) -> Result<(), StoreError> {
    if label.trim().is_empty() {
        return Err(StoreError::Validation("nav item label cannot be empty".to_string()));
    }
    if !path.starts_with('/') {
        return Err(StoreError::Validation(format!(
            "nav item path '{}' must start with '/'",
            path
        )));
    }
    Ok(())
}

fn block_key(page_id: PageId, block_id: BlockId) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&page_id.to_key());
    key.extend_from_slice(&block_id.to_key());
    key
}

fn decode_u64(raw: &[u8]) -> Result<u64, StoreError> {
    let bytes: [u8; 8] = raw
        .try_into()
        .map_err(|_| StoreError::Transport(format!("malformed id of {} bytes", raw.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

fn decode_all<T: DeserializeOwned>(tree: &Tree) -> Result<Vec<T>, StoreError> {
    let mut out = Vec::new();
    for entry in tree.iter() {
        let (_, value) = entry.map_err(to_transport)?;
        out.push(decode(&value)?);
    }
    Ok(out)
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(to_data)
}

fn decode<T: DeserializeOwned>(raw: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(raw).map_err(to_data)
}

fn to_transport(err: sled::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}

fn to_data(err: serde_json::Error) -> StoreError {
    StoreError::Transport(format!("corrupt record: {}", err))
}

fn from_tx(err: TransactionError<StoreError>) -> StoreError {
    match err {
        TransactionError::Abort(inner) => inner,
        TransactionError::Storage(inner) => to_transport(inner),
    }
}

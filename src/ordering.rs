//! Content-Block Ordering Service
//!
//! Keeps each page's block indices on the contiguous range `[0, n-1]`. Every operation
//! is planned as a pure function over the page's current blocks, checked, diffed and
//! submitted as one atomic batch, so readers see either the old or the new ordering.

use crate::cache::{MutationKind, ReadCache};
use crate::error::CmsError;
use crate::store::{BlockBatch, Stores};
use crate::types::{BlockDraft, BlockId, BlockPatch, ContentBlock, PageId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Structural change to one page's block list
#[derive(Debug, Clone, PartialEq)]
pub enum BlockOperation {
    /// Insert a new block at `at`; `at == len` appends
    Insert { block: ContentBlock, at: usize },
    Remove { id: BlockId },
    /// Remove then re-insert at `to`
    Move { id: BlockId, to: usize },
    /// Copy type, content and properties under `new_id`, right after the source
    Duplicate { id: BlockId, new_id: BlockId },
    /// Full permutation of the page's blocks
    Reorder { ordered_ids: Vec<BlockId> },
}

/// Compute the complete ordering after `op`.
///
/// `blocks` must all belong to one page. They are taken in `(order_index, id)` order, so
/// a gap left by an older write is closed by the same operation. The result is always
/// verified with [`check_contiguous`] before it is returned.
pub fn plan(blocks: &[ContentBlock], op: BlockOperation) -> Result<Vec<ContentBlock>, CmsError> {
    let mut ordered: Vec<ContentBlock> = blocks.to_vec();
    ordered.sort_by_key(|b| (b.order_index, b.id));

    match op {
        BlockOperation::Insert { block, at } => {
            if at > ordered.len() {
                return Err(CmsError::Consistency(format!(
                    "insert position {} is past the end of {} blocks",
                    at,
                    ordered.len()
                )));
            }
            if ordered.iter().any(|b| b.id == block.id) {
                return Err(CmsError::Consistency(format!(
                    "block {} is already on the page",
                    block.id
                )));
            }
            ordered.insert(at, block);
        }
        BlockOperation::Remove { id } => {
            let position = position_of(&ordered, id)?;
            ordered.remove(position);
        }
        BlockOperation::Move { id, to } => {
            let position = position_of(&ordered, id)?;
            if to >= ordered.len() {
                return Err(CmsError::Consistency(format!(
                    "move target {} is out of range for {} blocks",
                    to,
                    ordered.len()
                )));
            }
            let block = ordered.remove(position);
            ordered.insert(to, block);
        }
        BlockOperation::Duplicate { id, new_id } => {
            let position = position_of(&ordered, id)?;
            if ordered.iter().any(|b| b.id == new_id) {
                return Err(CmsError::Consistency(format!(
                    "duplicate id {} is already on the page",
                    new_id
                )));
            }
            let copy = ContentBlock {
                id: new_id,
                ..ordered[position].clone()
            };
            ordered.insert(position + 1, copy);
        }
        BlockOperation::Reorder { ordered_ids } => {
            let mut by_id: HashMap<BlockId, ContentBlock> =
                ordered.drain(..).map(|b| (b.id, b)).collect();
            if ordered_ids.len() != by_id.len() {
                return Err(CmsError::Consistency(format!(
                    "reorder lists {} blocks but the page has {}",
                    ordered_ids.len(),
                    by_id.len()
                )));
            }
            for id in ordered_ids {
                let block = by_id.remove(&id).ok_or_else(|| {
                    CmsError::Consistency(format!(
                        "reorder names block {} which is not on the page or is repeated",
                        id
                    ))
                })?;
                ordered.push(block);
            }
        }
    }

    for (index, block) in ordered.iter_mut().enumerate() {
        block.order_index = index as u32;
    }
    check_contiguous(&ordered)?;
    Ok(ordered)
}

/// Verify one page's blocks: same page, unique ids, indices exactly `{0, ..., n-1}`.
pub fn check_contiguous(blocks: &[ContentBlock]) -> Result<(), CmsError> {
    let Some(first) = blocks.first() else {
        return Ok(());
    };
    let mut seen_ids = HashSet::with_capacity(blocks.len());
    let mut seen_indices = vec![false; blocks.len()];
    for block in blocks {
        if block.page_id != first.page_id {
            return Err(CmsError::Consistency(format!(
                "block {} belongs to page {}, expected {}",
                block.id, block.page_id, first.page_id
            )));
        }
        if !seen_ids.insert(block.id) {
            return Err(CmsError::Consistency(format!("block {} appears twice", block.id)));
        }
        let index = block.order_index as usize;
        if index >= blocks.len() || seen_indices[index] {
            return Err(CmsError::Consistency(format!(
                "order index {} is a gap or duplicate for {} blocks",
                block.order_index,
                blocks.len()
            )));
        }
        seen_indices[index] = true;
    }
    Ok(())
}

/// Minimal batch turning `before` into `after`.
pub fn diff(before: &[ContentBlock], after: &[ContentBlock]) -> BlockBatch {
    let previous: HashMap<BlockId, &ContentBlock> = before.iter().map(|b| (b.id, b)).collect();
    let kept: HashSet<BlockId> = after.iter().map(|b| b.id).collect();

    let upserts = after
        .iter()
        .filter(|b| previous.get(&b.id).map_or(true, |old| *old != *b))
        .cloned()
        .collect();
    let removals = before
        .iter()
        .filter(|b| !kept.contains(&b.id))
        .map(|b| b.id)
        .collect();
    BlockBatch { upserts, removals }
}

fn position_of(blocks: &[ContentBlock], id: BlockId) -> Result<usize, CmsError> {
    blocks
        .iter()
        .position(|b| b.id == id)
        .ok_or_else(|| CmsError::not_found("content block", id))
}

/// Applies block operations against the content-block store
///
/// Each operation is planned against a revisioned snapshot of the page. If another
/// batch lands on the page first, the operation fails with a consistency error and
/// nothing is written.
pub struct OrderingService {
    stores: Stores,
    cache: Arc<ReadCache>,
}

impl OrderingService {
    pub fn new(stores: Stores, cache: Arc<ReadCache>) -> Self {
        Self { stores, cache }
    }

    pub async fn list(&self, page_id: PageId) -> Result<Arc<Vec<ContentBlock>>, CmsError> {
        self.cache.blocks(page_id).await
    }

    pub async fn insert(
        &self,
        page_id: PageId,
        draft: BlockDraft,
        at: usize,
    ) -> Result<Vec<ContentBlock>, CmsError> {
        if draft.block_type.trim().is_empty() {
            return Err(CmsError::Validation("block type cannot be empty".to_string()));
        }
        let id = self.stores.blocks.next_block_id().await?;
        let block = ContentBlock {
            id,
            page_id,
            order_index: 0,
            block_type: draft.block_type,
            content: draft.content,
            properties: draft.properties,
        };
        self.apply(page_id, BlockOperation::Insert { block, at }).await
    }

    pub async fn remove(&self, id: BlockId) -> Result<Vec<ContentBlock>, CmsError> {
        let page_id = self.page_of(id).await?;
        self.apply(page_id, BlockOperation::Remove { id }).await
    }

    pub async fn move_to(&self, id: BlockId, to: usize) -> Result<Vec<ContentBlock>, CmsError> {
        let page_id = self.page_of(id).await?;
        self.apply(page_id, BlockOperation::Move { id, to }).await
    }

    pub async fn duplicate(&self, id: BlockId) -> Result<Vec<ContentBlock>, CmsError> {
        let page_id = self.page_of(id).await?;
        let new_id = self.stores.blocks.next_block_id().await?;
        self.apply(page_id, BlockOperation::Duplicate { id, new_id })
            .await
    }

    pub async fn reorder(
        &self,
        page_id: PageId,
        ordered_ids: Vec<BlockId>,
    ) -> Result<Vec<ContentBlock>, CmsError> {
        self.apply(page_id, BlockOperation::Reorder { ordered_ids })
            .await
    }

    /// Content edit; the block keeps its position.
    pub async fn update(&self, id: BlockId, patch: BlockPatch) -> Result<ContentBlock, CmsError> {
        let block = self.stores.blocks.update_block(id, patch).await?;
        self.cache.invalidate(MutationKind::BlockContentUpdated);
        Ok(block)
    }

    async fn page_of(&self, id: BlockId) -> Result<PageId, CmsError> {
        Ok(self.stores.blocks.get_block(id).await?.page_id)
    }

    async fn apply(
        &self,
        page_id: PageId,
        op: BlockOperation,
    ) -> Result<Vec<ContentBlock>, CmsError> {
        let snapshot = self.stores.blocks.block_snapshot(page_id).await?;
        let before = snapshot.blocks;
        let after = match plan(&before, op) {
            Ok(after) => after,
            Err(e) => {
                warn!(page_id = %page_id, error = %e, "Rejected block operation");
                return Err(e);
            }
        };
        let batch = diff(&before, &after);
        if batch.is_empty() {
            return Ok(after);
        }
        let applied = self
            .stores
            .blocks
            .apply_block_batch(page_id, Some(snapshot.revision), &batch)
            .await;
        if let Err(e) = applied {
            warn!(page_id = %page_id, error = %e, "Block batch not applied");
            return Err(e.into());
        }
        self.cache.invalidate(MutationKind::BlocksRestructured);
        debug!(
            page_id = %page_id,
            blocks = after.len(),
            changed = batch.upserts.len() + batch.removals.len(),
            "Reindexed content blocks"
        );
        Ok(after)
    }
}

//! Content-block ordering through the site API

use serde_json::json;
use sitenav::api::SiteApi;
use sitenav::error::CmsError;
use sitenav::ordering::check_contiguous;
use sitenav::store::{BlockBatch, ContentBlockStore};
use sitenav::types::{BlockDraft, BlockId, BlockPatch, ContentBlock, NewPage, Page};

use std::time::Duration;

use crate::integration::test_utils::{create_test_api, Injected};

async fn page_with_blocks(api: &SiteApi, count: usize) -> (Page, Vec<ContentBlock>) {
    let page = api
        .create_page(NewPage {
            slug: "classes".to_string(),
            title: "Classes".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let mut blocks = Vec::new();
    for i in 0..count {
        blocks = api
            .insert_block(page.id, BlockDraft::new("text", json!({ "n": i })), i)
            .await
            .unwrap();
    }
    (page, blocks)
}

fn ids(blocks: &[ContentBlock]) -> Vec<BlockId> {
    blocks.iter().map(|b| b.id).collect()
}

fn indices(blocks: &[ContentBlock]) -> Vec<u32> {
    blocks.iter().map(|b| b.order_index).collect()
}

#[tokio::test]
async fn test_remove_middle_block_reindexes_remaining() {
    let (api, _store, _temp_dir) = create_test_api();
    let (page, blocks) = page_with_blocks(&api, 3).await;
    assert_eq!(indices(&blocks), vec![0, 1, 2]);

    let after = api.remove_block(blocks[1].id).await.unwrap();
    assert_eq!(indices(&after), vec![0, 1]);
    assert_eq!(ids(&after), vec![blocks[0].id, blocks[2].id]);

    let stored = api.list_blocks(page.id).await.unwrap();
    assert_eq!(stored.as_ref(), &after);
}

#[tokio::test]
async fn test_insert_move_duplicate_keep_contiguous_order() {
    let (api, _store, _temp_dir) = create_test_api();
    let (page, blocks) = page_with_blocks(&api, 3).await;
    let (a, b, c) = (blocks[0].id, blocks[1].id, blocks[2].id);

    let after = api
        .insert_block(page.id, BlockDraft::new("image", json!({ "src": "/x.png" })), 0)
        .await
        .unwrap();
    let d = after[0].id;
    assert_eq!(ids(&after), vec![d, a, b, c]);

    let after = api.move_block(d, 3).await.unwrap();
    assert_eq!(ids(&after), vec![a, b, c, d]);

    let after = api.duplicate_block(b).await.unwrap();
    assert_eq!(after.len(), 5);
    assert_eq!(after[1].id, b);
    assert_eq!(after[2].content, after[1].content);
    assert_ne!(after[2].id, b);

    let stored = api.list_blocks(page.id).await.unwrap();
    check_contiguous(&stored).unwrap();
    assert_eq!(indices(&stored), vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_reorder_content_blocks() {
    let (api, _store, _temp_dir) = create_test_api();
    let (page, blocks) = page_with_blocks(&api, 3).await;
    let reversed: Vec<_> = ids(&blocks).into_iter().rev().collect();

    let after = api
        .reorder_content_blocks(page.id, reversed.clone())
        .await
        .unwrap();
    assert_eq!(ids(&after), reversed);
    assert_eq!(indices(&after), vec![0, 1, 2]);

    let partial = api
        .reorder_content_blocks(page.id, reversed[..2].to_vec())
        .await
        .unwrap_err();
    assert!(matches!(partial, CmsError::Consistency(_)));
}

#[tokio::test]
async fn test_out_of_range_and_unknown_ids_persist_nothing() {
    let (api, _store, _temp_dir) = create_test_api();
    let (page, blocks) = page_with_blocks(&api, 2).await;

    let err = api.move_block(blocks[0].id, 7).await.unwrap_err();
    assert!(matches!(err, CmsError::Consistency(_)));
    let err = api
        .insert_block(page.id, BlockDraft::new("text", json!({})), 9)
        .await
        .unwrap_err();
    assert!(matches!(err, CmsError::Consistency(_)));
    let err = api.remove_block(BlockId(9_999)).await.unwrap_err();
    assert!(matches!(err, CmsError::NotFound { .. }));

    let stored = api.list_blocks(page.id).await.unwrap();
    assert_eq!(stored.as_ref(), &blocks);
}

#[tokio::test]
async fn test_failed_batch_leaves_ordering_untouched() {
    let (api, store, _temp_dir) = create_test_api();
    let (page, blocks) = page_with_blocks(&api, 3).await;

    store.fail_writes(Some(Injected::Transport));
    let err = api.remove_block(blocks[0].id).await.unwrap_err();
    assert!(matches!(err, CmsError::Transport(_)));
    store.fail_writes(None);

    let stored = store.inner().list_blocks(page.id).await.unwrap();
    assert_eq!(stored, blocks);
}

#[tokio::test]
async fn test_concurrent_inserts_never_duplicate_an_index() {
    let (api, store, _temp_dir) = create_test_api();
    let (page, _blocks) = page_with_blocks(&api, 2).await;

    // Both inserts plan against the same two blocks before either batch lands.
    store.delay_writes(Duration::from_millis(50));
    let (first, second) = tokio::join!(
        api.insert_block(page.id, BlockDraft::new("text", json!({ "n": "a" })), 1),
        api.insert_block(page.id, BlockDraft::new("text", json!({ "n": "b" })), 1),
    );
    store.delay_writes(Duration::ZERO);

    let (won, lost) = match (first, second) {
        (Ok(won), Err(lost)) | (Err(lost), Ok(won)) => (won, lost),
        other => panic!("expected exactly one insert to win, got {:?}", other),
    };
    assert!(matches!(lost, CmsError::Consistency(_)), "{:?}", lost);

    let stored = store.inner().list_blocks(page.id).await.unwrap();
    check_contiguous(&stored).unwrap();
    assert_eq!(indices(&stored), vec![0, 1, 2]);
    assert_eq!(stored, won);
    assert_eq!(api.list_blocks(page.id).await.unwrap().as_slice(), won.as_slice());

    // The loser can simply retry against the new ordering.
    let retried = api
        .insert_block(page.id, BlockDraft::new("text", json!({ "n": "b" })), 1)
        .await
        .unwrap();
    assert_eq!(indices(&retried), vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_legacy_gap_is_closed_by_next_operation() {
    let (api, store, _temp_dir) = create_test_api();
    let (page, mut blocks) = page_with_blocks(&api, 3).await;

    // Simulate an older writer that left indices 0, 4, 9.
    blocks[1].order_index = 4;
    blocks[2].order_index = 9;
    store
        .inner()
        .apply_block_batch(
            page.id,
            None,
            &BlockBatch {
                upserts: blocks[1..].to_vec(),
                removals: Vec::new(),
            },
        )
        .await
        .unwrap();

    let after = api
        .insert_block(page.id, BlockDraft::new("text", json!({})), 3)
        .await
        .unwrap();
    assert_eq!(indices(&after), vec![0, 1, 2, 3]);
    assert_eq!(&ids(&after)[..3], &ids(&blocks)[..]);
}

#[tokio::test]
async fn test_update_block_keeps_position() {
    let (api, _store, _temp_dir) = create_test_api();
    let (page, blocks) = page_with_blocks(&api, 2).await;

    let updated = api
        .update_block(
            blocks[1].id,
            BlockPatch {
                content: Some(json!({ "body": "edited" })),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.order_index, 1);

    let stored = api.list_blocks(page.id).await.unwrap();
    assert_eq!(stored[1].content, json!({ "body": "edited" }));
}

#[tokio::test]
async fn test_blocks_stay_on_their_own_page() {
    let (api, _store, _temp_dir) = create_test_api();
    let (classes, class_blocks) = page_with_blocks(&api, 2).await;
    let shop = api
        .create_page(NewPage {
            slug: "shop".to_string(),
            title: "Shop".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    api.insert_block(shop.id, BlockDraft::new("text", json!({})), 0)
        .await
        .unwrap();

    let err = api
        .reorder_content_blocks(shop.id, ids(&class_blocks))
        .await
        .unwrap_err();
    assert!(matches!(err, CmsError::Consistency(_)));
    assert_eq!(api.list_blocks(classes.id).await.unwrap().len(), 2);
}

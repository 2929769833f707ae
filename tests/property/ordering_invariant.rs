//! Every block operation leaves a page contiguous and keeps relative order

use proptest::prelude::*;
use serde_json::json;
use sitenav::error::CmsError;
use sitenav::ordering::{check_contiguous, diff, plan, BlockOperation};
use sitenav::types::{BlockId, ContentBlock, PageId};

fn block(id: u64, order_index: u32) -> ContentBlock {
    ContentBlock {
        id: BlockId(id),
        page_id: PageId(1),
        order_index,
        block_type: "text".to_string(),
        content: json!({ "id": id }),
        properties: json!({}),
    }
}

/// A page of blocks whose stored indices may have gaps and ties.
fn page_strategy() -> impl Strategy<Value = Vec<ContentBlock>> {
    prop::collection::vec(0u32..40, 0..12).prop_map(|indices| {
        indices
            .into_iter()
            .enumerate()
            .map(|(i, order_index)| block(i as u64 + 1, order_index))
            .collect()
    })
}

#[derive(Debug, Clone)]
enum Op {
    Insert(usize),
    Remove(usize),
    Move(usize, usize),
    Duplicate(usize),
    Shuffle(Vec<usize>),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..16).prop_map(Op::Insert),
        (0usize..16).prop_map(Op::Remove),
        (0usize..16, 0usize..16).prop_map(|(a, b)| Op::Move(a, b)),
        (0usize..16).prop_map(Op::Duplicate),
        prop::collection::vec(any::<usize>(), 0..16).prop_map(Op::Shuffle),
    ]
}

fn to_operation(blocks: &[ContentBlock], op: &Op, next_id: u64) -> Option<BlockOperation> {
    let pick = |i: usize| blocks.get(i % blocks.len().max(1)).map(|b| b.id);
    match op {
        Op::Insert(at) => Some(BlockOperation::Insert {
            block: block(next_id, 0),
            at: at % (blocks.len() + 1),
        }),
        Op::Remove(i) => pick(*i).map(|id| BlockOperation::Remove { id }),
        Op::Move(i, to) => pick(*i).map(|id| BlockOperation::Move {
            id,
            to: to % blocks.len(),
        }),
        Op::Duplicate(i) => pick(*i).map(|id| BlockOperation::Duplicate {
            id,
            new_id: BlockId(next_id),
        }),
        Op::Shuffle(keys) => {
            let mut ids: Vec<BlockId> = blocks.iter().map(|b| b.id).collect();
            let mut keyed: Vec<(usize, BlockId)> = ids
                .drain(..)
                .enumerate()
                .map(|(i, id)| (keys.get(i).copied().unwrap_or(i), id))
                .collect();
            keyed.sort();
            Some(BlockOperation::Reorder {
                ordered_ids: keyed.into_iter().map(|(_, id)| id).collect(),
            })
        }
    }
}

fn normalized(blocks: &[ContentBlock]) -> Vec<BlockId> {
    let mut sorted = blocks.to_vec();
    sorted.sort_by_key(|b| (b.order_index, b.id));
    sorted.into_iter().map(|b| b.id).collect()
}

proptest! {
    #[test]
    fn valid_operations_keep_indices_contiguous(
        initial in page_strategy(),
        ops in prop::collection::vec(op_strategy(), 1..20),
    ) {
        let mut blocks = initial;
        let mut next_id = 1_000;
        for op in &ops {
            let Some(operation) = to_operation(&blocks, op, next_id) else {
                continue;
            };
            next_id += 1;
            let after = plan(&blocks, operation).unwrap();
            check_contiguous(&after).unwrap();
            for (index, b) in after.iter().enumerate() {
                prop_assert_eq!(b.order_index as usize, index);
            }
            blocks = after;
        }
    }

    #[test]
    fn remove_preserves_relative_order(initial in page_strategy(), pick in any::<usize>()) {
        prop_assume!(!initial.is_empty());
        let order = normalized(&initial);
        let removed = order[pick % order.len()];

        let after = plan(&initial, BlockOperation::Remove { id: removed }).unwrap();
        let expected: Vec<BlockId> = order.into_iter().filter(|id| *id != removed).collect();
        prop_assert_eq!(after.iter().map(|b| b.id).collect::<Vec<_>>(), expected);
    }

    #[test]
    fn out_of_range_moves_are_rejected(initial in page_strategy(), extra in 0usize..5) {
        prop_assume!(!initial.is_empty());
        let id = initial[0].id;
        let to = initial.len() + extra;
        let err = plan(&initial, BlockOperation::Move { id, to }).unwrap_err();
        prop_assert!(matches!(err, CmsError::Consistency(_)));
    }

    #[test]
    fn diff_applied_to_before_reproduces_after(initial in page_strategy(), op in op_strategy()) {
        let Some(operation) = to_operation(&initial, &op, 1_000) else {
            return Ok(());
        };
        let after = plan(&initial, operation).unwrap();
        let batch = diff(&initial, &after);

        let mut applied: Vec<ContentBlock> = initial
            .iter()
            .filter(|b| !batch.removals.contains(&b.id))
            .filter(|b| !batch.upserts.iter().any(|u| u.id == b.id))
            .cloned()
            .collect();
        applied.extend(batch.upserts.iter().cloned());
        applied.sort_by_key(|b| b.order_index);
        prop_assert_eq!(applied, after);
    }
}

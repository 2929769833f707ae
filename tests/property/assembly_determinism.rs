//! Navigation assembly is a pure function of its inputs

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use sitenav::navigation::assemble;
use sitenav::types::{NavItem, NavItemId, Page, PageId};

fn page(id: u64) -> Page {
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Page {
        id: PageId(id),
        slug: format!("page-{}", id),
        title: format!("Page {}", id),
        meta: Default::default(),
        created_at: at,
        updated_at: at,
    }
}

fn nav_strategy() -> impl Strategy<Value = Vec<NavItem>> {
    prop::collection::vec(
        (
            -3i64..6,
            prop::option::of(prop::sample::select(vec!["main", "about", "shop"])),
            any::<bool>(),
            prop::option::of(0u64..6),
        ),
        0..15,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (order_index, group, visible, linked))| NavItem {
                id: NavItemId(i as u64 + 1),
                label: format!("Item {}", i),
                path: format!("/item-{}", i),
                order_index,
                nav_group: group.map(str::to_string),
                visible,
                linked_page_id: linked.map(PageId),
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn assemble_is_deterministic(items in nav_strategy()) {
        let pages: Vec<Page> = (0..4).map(page).collect();
        let first = assemble(&items, &pages);
        let second = assemble(&items, &pages);
        prop_assert_eq!(&first, &second);

        for item in &first.main_items {
            prop_assert!(item.item.visible);
            prop_assert_eq!(item.item.scope(), "main");
        }
        for window in first.main_items.windows(2) {
            prop_assert!(window[0].item.order_index <= window[1].item.order_index);
        }
        for (group, bucket) in &first.dropdowns {
            prop_assert_ne!(group.as_str(), "main");
            for item in bucket {
                prop_assert!(item.item.visible);
            }
        }
    }

    #[test]
    fn hidden_items_never_render(items in nav_strategy()) {
        let nav = assemble(&items, &[]);
        let visible = items.iter().filter(|i| i.visible).count();
        prop_assert_eq!(nav.visible_count(), visible);
    }

    #[test]
    fn links_resolve_only_to_existing_pages(items in nav_strategy()) {
        let pages: Vec<Page> = (0..4).map(page).collect();
        let nav = assemble(&items, &pages);
        for item in nav.main_items.iter().chain(nav.dropdowns.values().flatten()) {
            match (&item.linked_page, item.item.linked_page_id) {
                (Some(page), Some(id)) => prop_assert_eq!(page.id, id),
                (Some(_), None) => prop_assert!(false, "resolved a link that was never set"),
                (None, Some(id)) => prop_assert!(id.as_u64() >= 4),
                (None, None) => {}
            }
        }
    }
}

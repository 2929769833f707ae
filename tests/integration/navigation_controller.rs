//! Degraded-mode controller: settle window, fallback rendering and restore

use sitenav::api::SiteApi;
use sitenav::controller::{
    NavMode, RenderedNavigation, RestoreOutcome, RestoreRejected, FALLBACK_LINKS,
    RESTORE_FAILED_NOTICE,
};
use sitenav::store::NavItemStore;
use sitenav::types::NewNavItem;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

use crate::integration::test_utils::{create_test_api, test_timing, FlakyStore, Injected};

async fn wait_for_mode(api: &SiteApi, mode: NavMode) {
    let mut rx = api.controller().subscribe();
    rx.wait_for(|view| view.mode == mode).await.unwrap();
}

/// Pages synced, nav-item store empty, controller degraded.
async fn degraded_api() -> (SiteApi, Arc<FlakyStore>, TempDir) {
    let (api, store, temp_dir) = create_test_api();
    api.trigger_sync().await.unwrap();
    assert_eq!(api.controller().refresh().await, NavMode::Loading);
    wait_for_mode(&api, NavMode::Degraded).await;
    (api, store, temp_dir)
}

#[tokio::test(start_paused = true)]
async fn test_good_load_renders_cms_navigation() {
    let (api, _store, _temp_dir) = create_test_api();
    api.create_nav_item(NewNavItem::new("Home", "/", 0)).await.unwrap();

    assert_eq!(api.controller().refresh().await, NavMode::Normal);
    let view = api.view();
    assert!(!view.restore_enabled);
    match view.items {
        RenderedNavigation::Cms(nav) => assert_eq!(nav.main_items.len(), 1),
        other => panic!("expected CMS navigation, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_failing_load_degrades_after_settle_window() {
    let (api, store, _temp_dir) = create_test_api();
    let settle = test_timing().settle;
    store.delay_reads(Duration::from_millis(2000));
    store.fail_reads(Some(Injected::Transport));

    let started = Instant::now();
    assert_eq!(api.controller().refresh().await, NavMode::Loading);
    let failed_at = Instant::now();
    assert!(failed_at - started >= Duration::from_millis(2000));
    assert!(matches!(api.view().items, RenderedNavigation::Pending));

    wait_for_mode(&api, NavMode::Degraded).await;
    let waited = Instant::now() - failed_at;
    assert!(waited >= settle, "degraded after {:?}", waited);
    assert!(waited < settle + Duration::from_millis(100), "degraded after {:?}", waited);

    let view = api.view();
    assert!(view.restore_enabled);
    assert!(view.notice.is_none());
    match view.items {
        RenderedNavigation::Fallback(links) => assert_eq!(links, FALLBACK_LINKS),
        other => panic!("expected fallback, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_hanging_load_counts_as_failure() {
    let (api, store, _temp_dir) = create_test_api();
    store.hang_reads(true);

    let started = Instant::now();
    assert_eq!(api.controller().refresh().await, NavMode::Loading);
    assert!(Instant::now() - started >= test_timing().load_timeout);

    wait_for_mode(&api, NavMode::Degraded).await;
}

#[tokio::test(start_paused = true)]
async fn test_good_load_inside_settle_window_cancels_degrade() {
    let (api, store, _temp_dir) = create_test_api();
    store.fail_reads(Some(Injected::Transport));
    assert_eq!(api.controller().refresh().await, NavMode::Loading);

    store.fail_reads(None);
    api.create_nav_item(NewNavItem::new("Home", "/", 0)).await.unwrap();
    tokio::time::sleep(test_timing().settle / 2).await;
    assert_eq!(api.controller().refresh().await, NavMode::Normal);

    tokio::time::sleep(test_timing().settle * 2).await;
    assert_eq!(api.controller().mode(), NavMode::Normal);
}

#[tokio::test(start_paused = true)]
async fn test_normal_keeps_last_navigation_while_failure_settles() {
    let (api, store, _temp_dir) = create_test_api();
    api.create_nav_item(NewNavItem::new("Home", "/", 0)).await.unwrap();
    assert_eq!(api.controller().refresh().await, NavMode::Normal);

    store.fail_reads(Some(Injected::Transport));
    assert_eq!(api.controller().refresh().await, NavMode::Normal);
    assert!(matches!(api.view().items, RenderedNavigation::Cms(_)));

    wait_for_mode(&api, NavMode::Degraded).await;
}

#[tokio::test(start_paused = true)]
async fn test_store_outage_after_good_load_degrades() {
    let (api, store, _temp_dir) = create_test_api();
    let settle = test_timing().settle;
    api.create_nav_item(NewNavItem::new("Home", "/", 0)).await.unwrap();
    assert_eq!(api.controller().refresh().await, NavMode::Normal);

    store.fail_reads(Some(Injected::Transport));
    let failed_at = Instant::now();
    let mut modes = Vec::new();
    for _ in 0..3 {
        modes.push(api.controller().refresh().await);
        tokio::time::sleep(settle / 4).await;
    }
    // Repeated failures keep the first deadline.
    assert_eq!(modes, vec![NavMode::Normal; 3]);
    wait_for_mode(&api, NavMode::Degraded).await;
    assert!(Instant::now() - failed_at < settle + Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_refresh_sees_navigation_written_behind_the_cache() {
    let (api, store, _temp_dir) = degraded_api().await;
    store
        .create_nav_item(NewNavItem::new("Home", "/", 0))
        .await
        .unwrap();
    assert_eq!(api.controller().refresh().await, NavMode::Normal);
}

#[tokio::test(start_paused = true)]
async fn test_restore_is_rejected_unless_degraded() {
    let (api, _store, _temp_dir) = create_test_api();

    // Loading never goes straight to Restoring.
    let outcome = api.trigger_force_bootstrap().await.unwrap();
    assert_eq!(outcome, RestoreOutcome::Rejected(RestoreRejected::NotDegraded));
    assert_eq!(api.controller().mode(), NavMode::Loading);

    api.create_nav_item(NewNavItem::new("Home", "/", 0)).await.unwrap();
    api.controller().refresh().await;
    let outcome = api.trigger_force_bootstrap().await.unwrap();
    assert_eq!(outcome, RestoreOutcome::Rejected(RestoreRejected::NotDegraded));
}

#[tokio::test(start_paused = true)]
async fn test_restore_seeds_navigation_and_returns_to_normal() {
    let (api, store, _temp_dir) = degraded_api().await;
    let writes_before = store.write_count();

    let outcome = api.trigger_force_bootstrap().await.unwrap();
    assert_eq!(outcome, RestoreOutcome::Restored);
    assert!(store.write_count() > writes_before);

    let view = api.view();
    assert_eq!(view.mode, NavMode::Normal);
    assert!(!view.restore_enabled);
    match view.items {
        RenderedNavigation::Cms(nav) => {
            assert_eq!(nav.main_items.len(), api.routes().core_routes().count());
            assert_eq!(nav.main_items[0].href(), "/");
        }
        other => panic!("expected CMS navigation, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_restore_leaves_restore_available() {
    let (api, store, _temp_dir) = degraded_api().await;
    store.fail_writes(Some(Injected::Transport));

    let outcome = api.trigger_force_bootstrap().await.unwrap();
    assert_eq!(outcome, RestoreOutcome::StillDegraded);
    let view = api.view();
    assert_eq!(view.mode, NavMode::Degraded);
    assert!(view.restore_enabled);
    assert_eq!(view.notice, Some(RESTORE_FAILED_NOTICE));

    store.fail_writes(None);
    let retry = api.trigger_force_bootstrap().await.unwrap();
    assert_eq!(retry, RestoreOutcome::Restored);
    assert_eq!(api.controller().mode(), NavMode::Normal);
}

#[tokio::test(start_paused = true)]
async fn test_restore_that_changes_nothing_stays_degraded() {
    let (api, _store, _temp_dir) = create_test_api();
    api.trigger_sync().await.unwrap();
    // Only a dropdown item: the main bar is empty but the nav store is not.
    api.create_nav_item(NewNavItem::new("Blog", "/blog", 0).in_group("more"))
        .await
        .unwrap();
    api.controller().refresh().await;
    wait_for_mode(&api, NavMode::Degraded).await;

    let outcome = api.trigger_force_bootstrap().await.unwrap();
    assert_eq!(outcome, RestoreOutcome::StillDegraded);
    assert_eq!(api.view().notice, Some(RESTORE_FAILED_NOTICE));
    assert!(api.view().restore_enabled);
}

#[tokio::test(start_paused = true)]
async fn test_second_restore_while_restoring_is_rejected() {
    let (api, store, _temp_dir) = degraded_api().await;
    store.delay_writes(Duration::from_millis(500));

    let (first, second) = tokio::join!(api.trigger_force_bootstrap(), async {
        tokio::task::yield_now().await;
        let view = api.view();
        assert_eq!(view.mode, NavMode::Restoring);
        assert!(!view.restore_enabled);
        api.trigger_force_bootstrap().await
    });
    assert_eq!(first.unwrap(), RestoreOutcome::Restored);
    assert_eq!(
        second.unwrap(),
        RestoreOutcome::Rejected(RestoreRejected::AlreadyRestoring)
    );
}

#[tokio::test(start_paused = true)]
async fn test_restore_that_never_finishes_times_out() {
    let (api, store, _temp_dir) = degraded_api().await;
    store.delay_writes(test_timing().restore_timeout * 2);

    let started = Instant::now();
    let outcome = api.trigger_force_bootstrap().await.unwrap();
    assert_eq!(outcome, RestoreOutcome::StillDegraded);
    assert!(Instant::now() - started >= test_timing().restore_timeout);
    assert!(api.view().restore_enabled);
}

#[tokio::test(start_paused = true)]
async fn test_degraded_recovers_on_later_good_refresh() {
    let (api, _store, _temp_dir) = degraded_api().await;
    api.create_nav_item(NewNavItem::new("Home", "/", 0)).await.unwrap();
    assert_eq!(api.controller().refresh().await, NavMode::Normal);
}

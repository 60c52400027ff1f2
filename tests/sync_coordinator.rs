mod common;

use common::{FlakyStore, entry, ids, seeded};
use diary::{
    Applied, DiaryEntry, EntryFilter, LocalStore, PageStatus, RemoteStore, Row, SyncCoordinator,
    SyncError,
};
use std::sync::Arc;
use std::time::Duration;
use time::macros::datetime;

fn month_ids<'a, S: RemoteStore + 'static>(
    coordinator: &'a SyncCoordinator<S>,
    month: &str,
) -> Vec<&'a str> {
    ids(coordinator.index().entries(month))
}

fn abc() -> Vec<DiaryEntry> {
    vec![
        entry("A", "2024-01-05 09:00:00"),
        entry("B", "2024-01-20 09:00:00"),
        entry("C", "2024-02-01 09:00:00"),
    ]
}

#[tokio::test]
async fn pages_grow_the_month_index() {
    let store = Arc::new(seeded(abc()));
    let mut coordinator = SyncCoordinator::new(store, EntryFilter::Active, 2);

    assert!(coordinator.refresh());
    assert!(coordinator.is_loading());
    assert!(!coordinator.request_next_page());

    match coordinator.pump().await.unwrap() {
        Applied::Refreshed { count, status } => {
            assert_eq!(count, 2);
            assert_eq!(status, PageStatus::More);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(ids(coordinator.entries().all()), ["C", "B"]);
    assert_eq!(coordinator.index().months(), ["2024.02", "2024.01"]);

    assert!(coordinator.request_next_page());
    match coordinator.pump().await.unwrap() {
        Applied::Page { appended, status } => {
            assert_eq!(appended, 1);
            assert_eq!(status, PageStatus::Exhausted);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(month_ids(&coordinator, "2024.01"), ["B", "A"]);

    assert!(coordinator.request_next_page());
    match coordinator.pump().await.unwrap() {
        Applied::Page { appended, status } => {
            assert_eq!(appended, 0);
            assert_eq!(status, PageStatus::Exhausted);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(coordinator.entries().len(), 3);
}

#[tokio::test]
async fn live_feed_replaces_contents() {
    let store = Arc::new(seeded(abc()[..2].to_vec()));
    let mut coordinator = SyncCoordinator::new(Arc::clone(&store), EntryFilter::Active, 10);
    coordinator.start_live_feed();

    assert!(matches!(coordinator.pump().await, Some(Applied::Live { count: 2 })));

    store.write(abc()[2].clone()).await.unwrap();

    assert!(matches!(coordinator.pump().await, Some(Applied::Live { count: 3 })));
    assert_eq!(coordinator.index().months(), ["2024.02", "2024.01"]);
    assert_eq!(month_ids(&coordinator, "2024.02"), ["C"]);
    assert_eq!(month_ids(&coordinator, "2024.01"), ["B", "A"]);
}

#[tokio::test]
async fn live_addition_in_same_month_merges_in_order() {
    let store = Arc::new(seeded(abc()[..2].to_vec()));
    let mut coordinator = SyncCoordinator::new(Arc::clone(&store), EntryFilter::Active, 10);
    coordinator.start_live_feed();
    coordinator.pump().await.unwrap();

    store
        .write(entry("M", "2024-01-10 09:00:00"))
        .await
        .unwrap();

    assert!(matches!(coordinator.pump().await, Some(Applied::Live { count: 3 })));
    assert_eq!(coordinator.index().months(), ["2024.01"]);
    assert_eq!(month_ids(&coordinator, "2024.01"), ["B", "M", "A"]);
}

#[tokio::test]
async fn live_feed_drops_trashed_entries() {
    let store = Arc::new(seeded(abc()));
    let mut coordinator = SyncCoordinator::new(Arc::clone(&store), EntryFilter::Active, 10);
    coordinator.start_live_feed();
    coordinator.pump().await.unwrap();

    let b = abc()[1].trashed(datetime!(2024-03-01 00:00 UTC));
    store.write(b).await.unwrap();

    assert!(matches!(coordinator.pump().await, Some(Applied::Live { count: 2 })));
    assert!(!coordinator.entries().contains("B"));
    assert_eq!(month_ids(&coordinator, "2024.01"), ["A"]);
}

#[tokio::test]
async fn pages_after_live_snapshot_do_not_duplicate() {
    let store = Arc::new(seeded(abc()));
    let mut coordinator = SyncCoordinator::new(Arc::clone(&store), EntryFilter::Active, 2);
    coordinator.start_live_feed();
    coordinator.pump().await.unwrap();

    assert!(coordinator.request_next_page());
    match coordinator.pump().await.unwrap() {
        Applied::Page { appended, .. } => assert_eq!(appended, 0),
        other => panic!("unexpected {other:?}"),
    }

    assert_eq!(coordinator.entries().len(), 3);
    assert_eq!(coordinator.index().len(), 3);
}

#[tokio::test]
async fn filter_switch_discards_in_flight_page() {
    let deleted_at = datetime!(2024-03-01 00:00 UTC);
    let mut entries = abc();
    entries.push(entry("T", "2024-01-25 09:00:00").trashed(deleted_at));
    let store = Arc::new(seeded(entries));
    let mut coordinator = SyncCoordinator::new(store, EntryFilter::Active, 10);

    assert!(coordinator.request_next_page());
    coordinator.set_filter(EntryFilter::Trash);

    let mut discarded = 0;
    let mut refreshed = 0;
    for _ in 0..2 {
        match coordinator.pump().await.unwrap() {
            Applied::Discarded => discarded += 1,
            Applied::Refreshed { count, .. } => {
                assert_eq!(count, 1);
                refreshed += 1;
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    assert_eq!((discarded, refreshed), (1, 1));
    assert_eq!(ids(coordinator.entries().all()), ["T"]);
    assert_eq!(month_ids(&coordinator, "2024.01"), ["T"]);
}

#[tokio::test]
async fn trash_view_ignores_live_feed() {
    let store = Arc::new(seeded(abc()));
    let mut coordinator = SyncCoordinator::new(Arc::clone(&store), EntryFilter::Trash, 10);
    coordinator.start_live_feed();

    assert!(matches!(coordinator.pump().await, Some(Applied::Discarded)));
    assert!(coordinator.entries().is_empty());
}

#[tokio::test]
async fn search_suspends_paging_and_live_updates() {
    let mut entries = abc();
    entries[1].content = "Saw a HERON by the river".into();
    let store = Arc::new(seeded(entries));
    let mut coordinator = SyncCoordinator::new(Arc::clone(&store), EntryFilter::Active, 10);
    coordinator.start_live_feed();
    coordinator.pump().await.unwrap();

    coordinator.begin_search("heron");
    assert!(coordinator.is_searching());
    assert!(!coordinator.request_next_page());
    assert!(!coordinator.refresh());

    assert!(matches!(coordinator.pump().await, Some(Applied::Search { count: 1 })));
    assert_eq!(ids(coordinator.entries().all()), ["B"]);

    store.write(entry("D", "2024-02-02 09:00:00")).await.unwrap();
    assert!(matches!(coordinator.pump().await, Some(Applied::Discarded)));
    assert_eq!(coordinator.entries().len(), 1);

    coordinator.end_search();
    assert!(!coordinator.is_searching());
    match coordinator.pump().await.unwrap() {
        Applied::Refreshed { count, .. } => assert_eq!(count, 4),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn search_results_arriving_after_exit_are_dropped() {
    let store = Arc::new(seeded(abc()));
    let mut coordinator = SyncCoordinator::new(store, EntryFilter::Active, 10);

    coordinator.begin_search("title A");
    coordinator.end_search();

    let mut results = Vec::new();
    for _ in 0..2 {
        results.push(coordinator.pump().await.unwrap());
    }

    assert!(results.iter().any(|r| matches!(r, Applied::Discarded)));
    assert!(results.iter().any(|r| matches!(r, Applied::Refreshed { count: 3, .. })));
    assert_eq!(coordinator.entries().len(), 3);
}

#[tokio::test]
async fn failed_page_reports_and_allows_retry() {
    let store = Arc::new(FlakyStore::new(seeded(abc())));
    let mut coordinator = SyncCoordinator::new(Arc::clone(&store), EntryFilter::Active, 2);

    store.fail_next(1);
    coordinator.refresh();
    match coordinator.pump().await.unwrap() {
        Applied::Failed(SyncError::FetchFailed(_)) => {}
        other => panic!("unexpected {other:?}"),
    }
    assert!(!coordinator.is_loading());
    assert!(coordinator.entries().is_empty());

    coordinator.refresh();
    assert!(matches!(
        coordinator.pump().await,
        Some(Applied::Refreshed { count: 2, .. })
    ));
}

#[tokio::test]
async fn signed_out_user_sees_an_empty_list() {
    let store = Arc::new(LocalStore::with_entries(None, abc()));
    let mut coordinator = SyncCoordinator::new(store, EntryFilter::Active, 2);

    coordinator.refresh();

    match coordinator.pump().await.unwrap() {
        Applied::Refreshed { count, status } => {
            assert_eq!(count, 0);
            assert_eq!(status, PageStatus::Unauthenticated);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn upload_placeholder_stays_out_of_the_store() {
    let store = Arc::new(seeded(abc()));
    let mut coordinator = SyncCoordinator::new(store, EntryFilter::Active, 10);

    coordinator.set_uploading(true);
    let empty = coordinator.snapshot();
    assert_eq!(empty.sections.len(), 1);
    assert_eq!(empty.sections[0].rows, vec![Row::UploadPlaceholder]);

    coordinator.refresh();
    coordinator.pump().await.unwrap();

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.sections[0].key, "2024.02");
    assert_eq!(snapshot.sections[0].rows[0], Row::UploadPlaceholder);
    assert_eq!(snapshot.sections[0].rows.len(), 2);
    assert_eq!(snapshot.sections[1].rows.len(), 2);
    assert_eq!(coordinator.entries().len(), 3);
    assert_eq!(coordinator.index().len(), 3);

    coordinator.set_uploading(false);
    assert_eq!(coordinator.snapshot().sections[0].rows.len(), 1);
}

#[tokio::test]
async fn cover_urls_follow_display_order() {
    let mut entries = abc();
    entries[0].image_urls = vec!["file://a1".into(), "file://a2".into()];
    entries[2].image_urls = vec!["file://c1".into()];
    let store = Arc::new(seeded(entries));
    let mut coordinator = SyncCoordinator::new(store, EntryFilter::Active, 10);

    coordinator.refresh();
    coordinator.pump().await.unwrap();

    let snapshot = coordinator.snapshot();
    let urls: Vec<_> = snapshot.cover_urls().collect();
    assert_eq!(urls, ["file://c1", "file://a1"]);
}

#[tokio::test]
async fn pump_ready_applies_queued_results() {
    let store = Arc::new(seeded(abc()));
    let mut coordinator = SyncCoordinator::new(store, EntryFilter::Active, 10);

    assert!(coordinator.pump_ready().is_empty());

    coordinator.refresh();

    let applied = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            tokio::task::yield_now().await;
            let applied = coordinator.pump_ready();
            if !applied.is_empty() {
                break applied;
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(applied.len(), 1);
    assert!(matches!(applied[0], Applied::Refreshed { count: 3, .. }));
    assert_eq!(coordinator.entries().len(), 3);
}

async fn pump_until<S: RemoteStore + 'static>(
    coordinator: &mut SyncCoordinator<S>,
    wanted: impl Fn(&Applied) -> bool,
) -> Applied {
    loop {
        let applied = coordinator.pump().await.unwrap();
        if wanted(&applied) {
            return applied;
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn refresh_during_page_load_keeps_every_page() {
    let entries: Vec<_> = (0..6)
        .map(|i| entry(&format!("e{i}"), &format!("2024-01-{:02} 08:00:00", i + 1)))
        .collect();
    let store = Arc::new(seeded(entries));

    for _ in 0..300 {
        let mut coordinator = SyncCoordinator::new(Arc::clone(&store), EntryFilter::Active, 2);
        coordinator.refresh();
        coordinator.pump().await.unwrap();

        assert!(coordinator.request_next_page());
        assert!(coordinator.refresh());
        pump_until(&mut coordinator, |a| matches!(a, Applied::Refreshed { .. })).await;

        assert!(coordinator.request_next_page());
        pump_until(&mut coordinator, |a| matches!(a, Applied::Page { .. })).await;

        assert_eq!(ids(coordinator.entries().all()), ["e5", "e4", "e3", "e2"]);
    }
}

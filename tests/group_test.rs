//! Group lifecycle: atomic creation, updates, deletion and designer stats.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use art_catalog::access::Caller;
use art_catalog::error::AppError;
use art_catalog::model::{GroupChanges, GroupStatus, ListParams};
use common::*;

fn visible_total(t: &TestCatalog) -> usize {
    t.catalog
        .list_groups(&admin(), &ListParams { include_hidden: true, ..Default::default() })
        .unwrap()
        .total
}

#[tokio::test]
async fn create_group_writes_group_primary_and_stats() {
    let t = setup();
    let dana = Caller::designer("dana");

    let group_id = t.catalog.create_group(&dana, new_group("Summer sale", FEED)).await.unwrap();

    let detail = t.catalog.get_group(&dana, group_id).unwrap();
    assert_eq!(detail.group.title, "Summer sale");
    assert_eq!(detail.group.designer_id, "dana");
    assert_eq!(detail.group.status, GroupStatus::Active);
    assert!(detail.group.is_visible);
    assert_eq!(detail.variations.len(), 1);
    assert!(detail.variations[0].is_primary);

    assert_eq!(t.catalog.designer_stats("dana").unwrap().art_count, 1);
}

#[tokio::test]
async fn storage_failure_leaves_no_group() {
    let t = setup();
    let dana = Caller::designer("dana");
    t.catalog.create_group(&dana, new_group("Existing", FEED)).await.unwrap();
    let before = visible_total(&t);

    t.storage.fail.store(true, Ordering::SeqCst);
    let err = t.catalog.create_group(&dana, new_group("Doomed", FEED)).await.unwrap_err();
    assert!(matches!(err, AppError::StorageFailure(_)));

    assert_eq!(visible_total(&t), before);
    assert_eq!(t.catalog.designer_stats("dana").unwrap().art_count, 1);
}

#[tokio::test]
async fn slow_storage_times_out_without_partial_rows() {
    let t = setup();
    *t.storage.delay.lock().unwrap() = Some(Duration::from_secs(5));

    let err = t
        .catalog
        .create_group(&Caller::designer("dana"), new_group("Slow", FEED))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StorageFailure(_)));
    assert_eq!(visible_total(&t), 0);
}

#[tokio::test]
async fn create_group_validates_before_upload() {
    let t = setup();
    let dana = Caller::designer("dana");

    let err = t.catalog.create_group(&dana, new_group("   ", FEED)).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let mut unknown_category = new_group("Poster", FEED);
    unknown_category.category_id = 99;
    let err = t.catalog.create_group(&dana, unknown_category).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = t.catalog.create_group(&dana, new_group("Poster", 99)).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let mut zero_pixels = new_group("Poster", FEED);
    zero_pixels.first_variation.image = image("0x100");
    let err = t.catalog.create_group(&dana, zero_pixels).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = t
        .catalog
        .create_group(&Caller::anonymous(), new_group("Poster", FEED))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));

    assert_eq!(visible_total(&t), 0);
    // Only the zero-pixel image reached storage, and it was discarded
    assert_eq!(t.storage.stored_count(), 1);
    assert_eq!(t.storage.discarded.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn admin_may_publish_for_designer() {
    let t = setup();
    let mut input = new_group("Commissioned", FEED);
    input.designer_id = Some("dana".into());

    let group_id = t.catalog.create_group(&admin(), input).await.unwrap();
    let detail = t.catalog.get_group(&admin(), group_id).unwrap();
    assert_eq!(detail.group.designer_id, "dana");
    assert_eq!(t.catalog.designer_stats("dana").unwrap().art_count, 1);
    assert_eq!(t.catalog.designer_stats(ADMIN).unwrap().art_count, 0);

    let mut impersonation = new_group("Fake", FEED);
    impersonation.designer_id = Some("dana".into());
    let err = t
        .catalog
        .create_group(&Caller::designer("eve"), impersonation)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));
}

#[tokio::test]
async fn delete_group_cascades_and_floors_stats() {
    let t = setup();
    let dana = Caller::designer("dana");
    let group_id = t.catalog.create_group(&dana, new_group("Gone soon", FEED)).await.unwrap();
    t.catalog
        .add_variation(&dana, group_id, variation(STORIES, "1080x1920"), false)
        .await
        .unwrap();
    assert_eq!(t.catalog.designer_stats("dana").unwrap().art_count, 1);

    t.catalog.delete_group(&admin(), group_id).unwrap();
    assert_eq!(t.catalog.designer_stats("dana").unwrap().art_count, 0);
    assert!(matches!(
        t.catalog.get_group(&admin(), group_id).unwrap_err(),
        AppError::NotFound(_)
    ));

    let err = t.catalog.delete_group(&admin(), group_id).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(t.catalog.designer_stats("dana").unwrap().art_count, 0);
    assert_eq!(visible_total(&t), 0);
}

#[tokio::test]
async fn delete_group_is_admin_only() {
    let t = setup();
    let dana = Caller::designer("dana");
    let group_id = t.catalog.create_group(&dana, new_group("Mine", FEED)).await.unwrap();

    let err = t.catalog.delete_group(&dana, group_id).unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));
    assert_eq!(visible_total(&t), 1);
}

#[tokio::test]
async fn update_group_rules() {
    let t = setup();
    let dana = Caller::designer("dana");
    let group_id = t.catalog.create_group(&dana, new_group("Draft title", FEED)).await.unwrap();

    let err = t.catalog.update_group(&dana, group_id, GroupChanges::default()).unwrap_err();
    assert!(matches!(err, AppError::NoOp));

    let updated = t
        .catalog
        .update_group(
            &dana,
            group_id,
            GroupChanges {
                title: Some("Final title".into()),
                category_id: Some(FLYERS),
                is_premium: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.title, "Final title");
    assert_eq!(updated.category_id, FLYERS);
    assert!(updated.is_premium);

    let err = t
        .catalog
        .update_group(&dana, group_id, GroupChanges { is_visible: Some(false), ..Default::default() })
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));

    let err = t
        .catalog
        .update_group(&dana, group_id, GroupChanges { status: Some(GroupStatus::Inactive), ..Default::default() })
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));

    let err = t
        .catalog
        .update_group(&Caller::designer("eve"), group_id, GroupChanges { title: Some("Mine now".into()), ..Default::default() })
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));

    let err = t
        .catalog
        .update_group(&dana, group_id, GroupChanges { category_id: Some(404), ..Default::default() })
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let hidden = t
        .catalog
        .update_group(
            &admin(),
            group_id,
            GroupChanges {
                is_visible: Some(false),
                status: Some(GroupStatus::Inactive),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(!hidden.is_visible);
    assert_eq!(hidden.status, GroupStatus::Inactive);
    // Rejected updates never reached the store
    assert_eq!(hidden.title, "Final title");
    assert_eq!(hidden.category_id, FLYERS);
}

#[tokio::test]
async fn views_and_downloads_feed_counters() {
    let t = setup();
    let dana = Caller::designer("dana");
    let group_id = t.catalog.create_group(&dana, new_group("Popular", FEED)).await.unwrap();

    t.catalog.get_group(&Caller::anonymous(), group_id).unwrap();
    t.catalog.get_group(&Caller::designer("eve"), group_id).unwrap();

    let target = t.catalog.record_download(&Caller::designer("eve"), group_id, None).unwrap();
    assert_eq!(target.group_id, group_id);

    let detail = t.catalog.get_group(&admin(), group_id).unwrap();
    assert_eq!(detail.group.view_count, 2);
    assert_eq!(detail.group.download_count, 1);
    assert_eq!(detail.variations[0].id, target.variation_id);

    let stats = t.catalog.designer_stats("dana").unwrap();
    assert_eq!(stats.download_count, 1);
    assert!(stats.view_count >= 2);
}

#[tokio::test]
async fn premium_download_requires_sign_in() {
    let t = setup();
    let dana = Caller::designer("dana");
    let mut input = new_group("Premium pack", FEED);
    input.is_premium = true;
    let group_id = t.catalog.create_group(&dana, input).await.unwrap();
    let stories_id = t
        .catalog
        .add_variation(&dana, group_id, variation(STORIES, "1080x1920"), false)
        .await
        .unwrap();

    let err = t.catalog.record_download(&Caller::anonymous(), group_id, None).unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));

    let target = t
        .catalog
        .record_download(&Caller::designer("eve"), group_id, Some(stories_id))
        .unwrap();
    assert_eq!(target.variation_id, stories_id);

    let err = t
        .catalog
        .record_download(&Caller::designer("eve"), group_id, Some(12345))
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn stats_for_unknown_designer_are_zero() {
    let t = setup();
    let stats = t.catalog.designer_stats("nobody").unwrap();
    assert_eq!(stats.art_count, 0);
    assert_eq!(stats.designer_id, "nobody");
}

#[tokio::test]
async fn lookups_are_admin_managed_and_unique() {
    use art_catalog::model::LookupKind;

    let t = setup();
    let err = t
        .catalog
        .create_lookup(&Caller::designer("dana"), LookupKind::Format, "square")
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));

    let err = t.catalog.create_lookup(&admin(), LookupKind::Format, "FEED").unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let square = t.catalog.create_lookup(&admin(), LookupKind::Format, "square").unwrap();
    assert_eq!(square.id, 6);
    let names: Vec<_> = t
        .catalog
        .list_lookups(LookupKind::Format)
        .unwrap()
        .into_iter()
        .map(|l| l.name)
        .collect();
    assert_eq!(names, ["feed", "stories", "banner", "reels", "cover", "square"]);
}

#[tokio::test]
async fn relaxed_counter_commits_survive_reopen() {
    let TestCatalog { catalog, storage, _db: db } = setup();
    let dana = Caller::designer("dana");
    let group_id = catalog.create_group(&dana, new_group("Kept", FEED)).await.unwrap();

    catalog.get_group(&Caller::anonymous(), group_id).unwrap();
    catalog.get_group(&Caller::anonymous(), group_id).unwrap();
    catalog.record_download(&Caller::designer("eve"), group_id, None).unwrap();
    // Visible to readers right away; this read counts as the third view
    assert_eq!(catalog.get_group(&admin(), group_id).unwrap().group.view_count, 2);

    // A regular commit makes the earlier counter commits durable
    catalog.create_group(&dana, new_group("Later", FEED)).await.unwrap();
    drop(catalog);

    let reopened = open_catalog(db.path(), storage);
    let stats = reopened.designer_stats("dana").unwrap();
    assert_eq!(stats.view_count, 3);
    assert_eq!(stats.download_count, 1);
    assert_eq!(stats.art_count, 2);
    let detail = reopened.get_group(&admin(), group_id).unwrap();
    assert_eq!(detail.group.view_count, 3);
    assert_eq!(detail.group.download_count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_and_deletes_keep_art_count_exact() {
    let t = setup();
    let tasks = 20;

    let mut handles = vec![];
    for i in 0..tasks {
        let catalog = t.catalog.clone();
        handles.push(tokio::spawn(async move {
            let dana = Caller::designer("dana");
            catalog.create_group(&dana, new_group(&format!("Rush {i}"), FEED)).await.unwrap()
        }));
    }
    let mut group_ids = vec![];
    for handle in handles {
        group_ids.push(handle.await.unwrap());
    }

    assert_eq!(t.catalog.designer_stats("dana").unwrap().art_count, tasks);
    assert_eq!(visible_total(&t), tasks as usize);

    let mut handles = vec![];
    for group_id in group_ids {
        let catalog = t.catalog.clone();
        handles.push(tokio::task::spawn_blocking(move || catalog.delete_group(&admin(), group_id)));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(t.catalog.designer_stats("dana").unwrap().art_count, 0);
    assert_eq!(visible_total(&t), 0);
}

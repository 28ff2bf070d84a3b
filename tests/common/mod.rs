//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::NamedTempFile;

use art_catalog::access::{Caller, StaticRoleDirectory};
use art_catalog::catalog::Catalog;
use art_catalog::database::{init_db, AppState};
use art_catalog::model::{ImageUpload, LookupKind, NewGroup, NewVariation};
use art_catalog::storage::{ImageStorage, StorageError, StoredImage};

pub const POSTERS: u64 = 1;
pub const FLYERS: u64 = 2;

pub const FEED: u64 = 1;
pub const STORIES: u64 = 2;
pub const BANNER: u64 = 3;
pub const REELS: u64 = 4;
pub const COVER: u64 = 5;

pub const PNG: u64 = 1;
pub const PSD: u64 = 2;

pub const ADMIN: &str = "root";

/// Storage double: the upload bytes spell the dimensions, e.g. `b"1080x1920"`
#[derive(Default)]
pub struct FakeStorage {
    pub fail: AtomicBool,
    pub delay: Mutex<Option<Duration>>,
    pub discarded: Mutex<Vec<String>>,
    counter: AtomicU64,
}

impl FakeStorage {
    pub fn stored_count(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

fn parse_dimensions(data: &[u8]) -> (u32, u32) {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.split_once('x'))
        .and_then(|(w, h)| Some((w.trim().parse().ok()?, h.trim().parse().ok()?)))
        .unwrap_or((100, 100))
}

#[async_trait]
impl ImageStorage for FakeStorage {
    async fn store(&self, upload: &ImageUpload) -> Result<StoredImage, StorageError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("fake outage".into()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let (width, height) = parse_dimensions(&upload.data);
        Ok(StoredImage { url: format!("https://cdn.test/{n}.png"), width, height })
    }

    async fn discard(&self, url: &str) -> Result<(), StorageError> {
        self.discarded.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

pub struct TestCatalog {
    pub catalog: Catalog,
    pub storage: Arc<FakeStorage>,
    pub _db: NamedTempFile,
}

impl TestCatalog {
    pub fn app_state(&self, auth_secret: Option<&str>) -> AppState {
        AppState {
            catalog: self.catalog.clone(),
            roles: Arc::new(StaticRoleDirectory::new([ADMIN])),
            auth_secret: auth_secret.map(String::from),
        }
    }
}

pub fn admin() -> Caller {
    Caller::admin(ADMIN)
}

/// Catalog over the database file at `path`, uploads going to `storage`
pub fn open_catalog(path: &Path, storage: Arc<FakeStorage>) -> Catalog {
    let db = init_db(path.to_str().unwrap()).expect("Failed to initialize test database");
    Catalog::new(Arc::new(db), storage).with_upload_timeout(Duration::from_millis(500))
}

/// Catalog over a throwaway database with reference data in place
pub fn setup() -> TestCatalog {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let storage = Arc::new(FakeStorage::default());
    let catalog = open_catalog(temp_db.path(), storage.clone());

    let admin = admin();
    for name in ["Posters", "Flyers"] {
        catalog.create_lookup(&admin, LookupKind::Category, name).unwrap();
    }
    for name in ["feed", "stories", "banner", "reels", "cover"] {
        catalog.create_lookup(&admin, LookupKind::Format, name).unwrap();
    }
    for name in ["png", "psd"] {
        catalog.create_lookup(&admin, LookupKind::FileType, name).unwrap();
    }

    TestCatalog { catalog, storage, _db: temp_db }
}

pub fn image(dimensions: &str) -> ImageUpload {
    ImageUpload { data: dimensions.as_bytes().to_vec(), file_name: Some("art.png".into()) }
}

pub fn variation(format_id: u64, dimensions: &str) -> NewVariation {
    NewVariation { format_id, file_type_id: PNG, image: image(dimensions), edit_url: None }
}

pub fn new_group(title: &str, format_id: u64) -> NewGroup {
    NewGroup {
        title: title.to_string(),
        category_id: POSTERS,
        designer_id: None,
        is_premium: false,
        first_variation: variation(format_id, "1080x1080"),
    }
}

/// Asserts exactly one primary in the group's committed state
pub fn assert_single_primary(catalog: &Catalog, group_id: u64) {
    let detail = catalog.get_group(&admin(), group_id).unwrap();
    let primaries = detail.variations.iter().filter(|v| v.is_primary).count();
    assert_eq!(primaries, 1, "group {group_id} has {primaries} primaries: {:?}", detail.variations);
    assert!(detail.variations[0].is_primary, "primary must be listed first");
}

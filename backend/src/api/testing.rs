//! Fixtures shared by the database tests.

use async_trait::async_trait;
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use mlib_core::blob::{BlobStore, Upload};
use mlib_core::model::{self as sqlm, type_enum::BlobKind};
use mlib_core::{Principal, Result};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use std::sync::Mutex;

/// Fresh migrated in-memory database. One pooled connection, so every
/// query sees the same memory store.
pub async fn setup_db() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

async fn insert_user(db: &DatabaseConnection, username: &str, is_staff: bool) -> Principal {
    let now = Utc::now();
    let user = sqlm::user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(format!("{}@example.com", username)),
        is_staff: Set(is_staff),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();
    Principal::from(&user)
}

pub async fn seed_user(db: &DatabaseConnection, username: &str) -> Principal {
    insert_user(db, username, false).await
}

pub async fn seed_staff(db: &DatabaseConnection, username: &str) -> Principal {
    insert_user(db, username, true).await
}

pub async fn seed_artist(db: &DatabaseConnection, name: &str) -> sqlm::artist::Model {
    let now = Utc::now();
    sqlm::artist::ActiveModel {
        name: Set(name.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_album(
    db: &DatabaseConnection,
    artist_id: i64,
    title: &str,
) -> sqlm::album::Model {
    let now = Utc::now();
    sqlm::album::ActiveModel {
        title: Set(title.to_string()),
        artist_id: Set(artist_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_genre(db: &DatabaseConnection, name: &str) -> sqlm::genre::Model {
    let now = Utc::now();
    sqlm::genre::ActiveModel {
        name: Set(name.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_song(
    db: &DatabaseConnection,
    owner: &Principal,
    artist_id: i64,
    title: &str,
    is_public: bool,
) -> sqlm::song::Model {
    sqlm::song::ActiveModel {
        title: Set(title.to_string()),
        artist_id: Set(artist_id),
        album_id: Set(None),
        genre_id: Set(None),
        audio_file: Set(format!("songs/{}.mp3", title.to_lowercase().replace(' ', "_"))),
        duration: Set(Some(200)),
        lyrics: Set(String::new()),
        release_year: Set(None),
        uploaded_by: Set(owner.id),
        upload_date: Set(Utc::now()),
        play_count: Set(0),
        download_count: Set(0),
        is_public: Set(is_public),
        is_featured: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub fn audio(file_name: &str) -> Upload {
    Upload {
        file_name: file_name.to_string(),
        content_type: Some("audio/mpeg".to_string()),
        data: vec![0u8; 64],
    }
}

pub fn image(file_name: &str) -> Upload {
    Upload {
        file_name: file_name.to_string(),
        content_type: Some("image/png".to_string()),
        data: vec![0u8; 64],
    }
}

/// Keeps every stored blob in memory.
#[derive(Default)]
pub struct MemoryBlobStore {
    pub blobs: Mutex<Vec<(BlobKind, String, usize)>>,
}

impl MemoryBlobStore {
    pub fn count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, kind: BlobKind, upload: Upload) -> Result<String> {
        let mut blobs = self.blobs.lock().unwrap();
        let reference = format!("{}/{}-{}", kind, blobs.len(), upload.file_name);
        blobs.push((kind, reference.clone(), upload.size()));
        Ok(reference)
    }
}

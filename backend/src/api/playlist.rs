use chrono::Utc;
use mlib_core::blob::{self, BlobStore, Upload};
use mlib_core::form::PlaylistForm;
use mlib_core::model::{self as sqlm, type_enum::BlobKind};
use mlib_core::{LibraryError, Principal, Result};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait, TryInsertResult,
};
use serde::Serialize;

use super::access;

pub const PUBLIC_PLAYLIST_LIMIT: u64 = 10;

pub async fn create_playlist(
    db: &DatabaseConnection,
    blobs: &dyn BlobStore,
    principal: &Principal,
    form: PlaylistForm,
    cover: Option<Upload>,
) -> Result<sqlm::playlist::Model> {
    let form = form.clean()?;
    if let Some(cover) = &cover {
        blob::validate(BlobKind::Image, "cover_image", cover)?;
    }
    let cover_image = match cover {
        Some(cover) => Some(blob::store(blobs, BlobKind::Image, "cover_image", cover).await?),
        None => None,
    };

    let now = Utc::now();
    let playlist = sqlm::playlist::ActiveModel {
        name: Set(form.name),
        description: Set(form.description),
        user_id: Set(principal.id),
        cover_image: Set(cover_image),
        is_public: Set(form.is_public),
        is_collaborative: Set(form.is_collaborative),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    tracing::info!("user {} created playlist {} ({})", principal.id, playlist.id, playlist.name);
    Ok(playlist)
}

/// Replaces the editable fields; the cover is only replaced when a new one
/// is sent.
pub async fn update_playlist(
    db: &DatabaseConnection,
    blobs: &dyn BlobStore,
    principal: &Principal,
    id: i64,
    form: PlaylistForm,
    cover: Option<Upload>,
) -> Result<sqlm::playlist::Model> {
    let form = form.clean()?;
    if let Some(cover) = &cover {
        blob::validate(BlobKind::Image, "cover_image", cover)?;
    }
    let playlist = access::editable_playlist(db, principal, id).await?;

    let mut am = playlist.into_active_model();
    if let Some(cover) = cover {
        am.cover_image = Set(Some(
            blob::store(blobs, BlobKind::Image, "cover_image", cover).await?,
        ));
    }
    am.name = Set(form.name);
    am.description = Set(form.description);
    am.is_public = Set(form.is_public);
    am.is_collaborative = Set(form.is_collaborative);
    am.updated_at = Set(Utc::now());
    Ok(am.update(db).await?)
}

pub async fn delete_playlist(
    db: &DatabaseConnection,
    principal: &Principal,
    id: i64,
) -> Result<()> {
    let playlist = access::editable_playlist(db, principal, id).await?;
    sqlm::playlist::Entity::delete_by_id(playlist.id).exec(db).await?;
    tracing::info!("user {} deleted playlist {}", principal.id, playlist.id);
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaylistDetail {
    pub playlist: sqlm::playlist::Model,
    pub songs: Vec<sqlm::song::Model>,
    pub is_owner: bool,
    pub song_count: u64,
    /// seconds
    pub total_duration: i64,
}

/// Member songs in insertion order, limited to those the caller may see;
/// the count and duration cover only those songs.
pub async fn playlist_detail(
    db: &DatabaseConnection,
    principal: &Principal,
    id: i64,
) -> Result<PlaylistDetail> {
    let playlist = access::visible_playlist(db, principal, id).await?;

    let songs: Vec<sqlm::song::Model> = sqlm::playlist_song::Entity::find()
        .find_also_related(sqlm::song::Entity)
        .filter(sqlm::playlist_song::Column::PlaylistId.eq(playlist.id))
        .filter(sqlm::song::visible_condition(principal))
        .order_by_asc(sqlm::playlist_song::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .filter_map(|(_, song)| song)
        .collect();

    Ok(PlaylistDetail {
        is_owner: playlist.user_id == principal.id,
        song_count: songs.len() as u64,
        total_duration: songs.iter().filter_map(|s| s.duration).sum(),
        playlist,
        songs,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaylistOverview {
    pub user_playlists: Vec<sqlm::playlist::Model>,
    pub public_playlists: Vec<sqlm::playlist::Model>,
}

pub async fn list_playlists(
    db: &DatabaseConnection,
    principal: &Principal,
) -> Result<PlaylistOverview> {
    let user_playlists = sqlm::playlist::Entity::find()
        .filter(sqlm::playlist::Column::UserId.eq(principal.id))
        .order_by_desc(sqlm::playlist::Column::CreatedAt)
        .order_by_desc(sqlm::playlist::Column::Id)
        .all(db)
        .await?;
    // visible and not owned means public playlists of other users
    let public_playlists = access::visible_playlists(principal)
        .filter(sqlm::playlist::Column::UserId.ne(principal.id))
        .order_by_desc(sqlm::playlist::Column::CreatedAt)
        .order_by_desc(sqlm::playlist::Column::Id)
        .limit(PUBLIC_PLAYLIST_LIMIT)
        .all(db)
        .await?;
    Ok(PlaylistOverview {
        user_playlists,
        public_playlists,
    })
}

/// Returns false when the song is already in the playlist.
pub async fn add_to_playlist(
    db: &DatabaseConnection,
    principal: &Principal,
    playlist_id: i64,
    song_id: i64,
) -> Result<bool> {
    let txn = db.begin().await?;
    let playlist = access::find_playlist(&txn, playlist_id).await?;
    if !playlist.accepts_songs_from(principal) {
        return Err(LibraryError::denied(
            "You do not have permission to add songs to this playlist.",
        ));
    }
    access::visible_song(&txn, principal, song_id).await?;

    let res = sqlm::playlist_song::Entity::insert(sqlm::playlist_song::ActiveModel {
        playlist_id: Set(playlist.id),
        song_id: Set(song_id),
        added_at: Set(Utc::now()),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([
            sqlm::playlist_song::Column::PlaylistId,
            sqlm::playlist_song::Column::SongId,
        ])
        .do_nothing()
        .to_owned(),
    )
    .do_nothing()
    .exec(&txn)
    .await?;
    let added = matches!(res, TryInsertResult::Inserted(_));
    if added {
        sqlm::playlist::Entity::update_many()
            .col_expr(
                sqlm::playlist::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(Utc::now()),
            )
            .filter(sqlm::playlist::Column::Id.eq(playlist.id))
            .exec(&txn)
            .await?;
    }
    txn.commit().await?;

    tracing::debug!(
        "user {} add song {} to playlist {}: {}",
        principal.id,
        song_id,
        playlist.id,
        added
    );
    Ok(added)
}

/// Returns whether a membership row was removed.
pub async fn remove_from_playlist(
    db: &DatabaseConnection,
    principal: &Principal,
    playlist_id: i64,
    song_id: i64,
) -> Result<bool> {
    let playlist = access::editable_playlist(db, principal, playlist_id).await?;
    let res = sqlm::playlist_song::Entity::delete_many()
        .filter(sqlm::playlist_song::Column::PlaylistId.eq(playlist.id))
        .filter(sqlm::playlist_song::Column::SongId.eq(song_id))
        .exec(db)
        .await?;
    Ok(res.rows_affected > 0)
}

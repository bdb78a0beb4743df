//! Favorites, ratings, comments and plays.

use chrono::Utc;
use mlib_core::db::DbOper;
use mlib_core::form::{clean_comment, clean_rating, PlayForm};
use mlib_core::model::{self as sqlm, type_enum::ItemType};
use mlib_core::{LibraryError, Principal, Result};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;

use super::access;
use super::pagination::{fetch_page, Page, PageParams};

/// Adds the favorite when absent, removes it when present. Returns whether
/// the song is now a favorite.
pub async fn toggle_favorite(
    db: &DatabaseConnection,
    principal: &Principal,
    song_id: i64,
) -> Result<bool> {
    let txn = db.begin().await?;
    access::visible_song(&txn, principal, song_id).await?;

    let removed = sqlm::favorite::Entity::delete_many()
        .filter(sqlm::favorite::Column::UserId.eq(principal.id))
        .filter(sqlm::favorite::Column::SongId.eq(song_id))
        .exec(&txn)
        .await?;

    let now_favorite = if removed.rows_affected > 0 {
        false
    } else {
        sqlm::favorite::Entity::insert(sqlm::favorite::ActiveModel {
            user_id: Set(principal.id),
            song_id: Set(song_id),
            added_at: Set(Utc::now()),
            ..Default::default()
        })
        .on_conflict(
            OnConflict::columns([sqlm::favorite::Column::UserId, sqlm::favorite::Column::SongId])
                .do_nothing()
                .to_owned(),
        )
        .do_nothing()
        .exec(&txn)
        .await?;
        true
    };
    txn.commit().await?;

    tracing::debug!(
        "user {} favorite song {}: {}",
        principal.id,
        song_id,
        now_favorite
    );
    Ok(now_favorite)
}

pub async fn is_favorite<C: ConnectionTrait>(db: &C, user_id: i64, song_id: i64) -> Result<bool> {
    Ok(sqlm::favorite::Entity::find()
        .filter(sqlm::favorite::Column::UserId.eq(user_id))
        .filter(sqlm::favorite::Column::SongId.eq(song_id))
        .count(db)
        .await?
        > 0)
}

#[derive(Debug, Clone, Serialize)]
pub struct FavoriteEntry {
    pub added_at: chrono::DateTime<Utc>,
    pub song: sqlm::song::Model,
}

/// The caller's favorites still visible to them, newest first.
pub async fn list_favorites<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
) -> Result<Vec<FavoriteEntry>> {
    let rows = sqlm::favorite::Entity::find()
        .find_also_related(sqlm::song::Entity)
        .filter(sqlm::favorite::Column::UserId.eq(principal.id))
        .filter(sqlm::song::visible_condition(principal))
        .order_by_desc(sqlm::favorite::Column::AddedAt)
        .order_by_desc(sqlm::favorite::Column::Id)
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .filter_map(|(fav, song)| {
            song.map(|song| FavoriteEntry {
                added_at: fav.added_at,
                song,
            })
        })
        .collect())
}

/// Insert or overwrite the caller's rating for the song.
pub async fn set_rating(
    db: &DatabaseConnection,
    principal: &Principal,
    song_id: i64,
    value: i32,
) -> Result<sqlm::rating::Model> {
    let value = clean_rating(value)?;
    access::visible_song(db, principal, song_id).await?;

    let now = Utc::now();
    DbOper::upsert(
        db,
        sqlm::rating::ActiveModel {
            user_id: Set(principal.id),
            song_id: Set(song_id),
            value: Set(value),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        },
        &[sqlm::rating::Column::UserId, sqlm::rating::Column::SongId],
        &[sqlm::rating::Column::Id, sqlm::rating::Column::CreatedAt],
    )
    .await?;

    let rating = sqlm::rating::Entity::find()
        .filter(sqlm::rating::Column::UserId.eq(principal.id))
        .filter(sqlm::rating::Column::SongId.eq(song_id))
        .one(db)
        .await?
        .ok_or_else(|| LibraryError::from(anyhow::anyhow!("rating missing after upsert")))?;
    tracing::debug!("user {} rated song {}: {}", principal.id, song_id, value);
    Ok(rating)
}

pub async fn user_rating<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    song_id: i64,
) -> Result<Option<i32>> {
    Ok(sqlm::rating::Entity::find()
        .select_only()
        .column(sqlm::rating::Column::Value)
        .filter(sqlm::rating::Column::UserId.eq(user_id))
        .filter(sqlm::rating::Column::SongId.eq(song_id))
        .into_tuple::<i32>()
        .one(db)
        .await?)
}

pub async fn add_comment(
    db: &DatabaseConnection,
    principal: &Principal,
    song_id: i64,
    text: &str,
) -> Result<sqlm::comment::Model> {
    let text = clean_comment(text)?;
    access::visible_song(db, principal, song_id).await?;

    let now = Utc::now();
    let comment = sqlm::comment::ActiveModel {
        song_id: Set(song_id),
        user_id: Set(principal.id),
        text: Set(text),
        created_at: Set(now),
        updated_at: Set(now),
        is_edited: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await?;
    tracing::debug!("user {} commented on song {}", principal.id, song_id);
    Ok(comment)
}

async fn find_comment<C: ConnectionTrait>(db: &C, id: i64) -> Result<sqlm::comment::Model> {
    sqlm::comment::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(LibraryError::not_found(ItemType::Comment, id))
}

/// Only the author may edit.
pub async fn edit_comment(
    db: &DatabaseConnection,
    principal: &Principal,
    comment_id: i64,
    text: &str,
) -> Result<sqlm::comment::Model> {
    let text = clean_comment(text)?;
    let comment = find_comment(db, comment_id).await?;
    if comment.user_id != principal.id {
        return Err(LibraryError::denied("You can only edit your own comments."));
    }
    access::visible_song(db, principal, comment.song_id).await?;

    let mut am = comment.into_active_model();
    am.text = Set(text);
    am.updated_at = Set(Utc::now());
    am.is_edited = Set(true);
    Ok(am.update(db).await?)
}

/// The author or staff may delete.
pub async fn delete_comment(
    db: &DatabaseConnection,
    principal: &Principal,
    comment_id: i64,
) -> Result<()> {
    let comment = find_comment(db, comment_id).await?;
    if comment.user_id != principal.id && !principal.is_staff {
        return Err(LibraryError::denied("You can only delete your own comments."));
    }
    sqlm::comment::Entity::delete_by_id(comment.id).exec(db).await?;
    tracing::debug!("user {} deleted comment {}", principal.id, comment.id);
    Ok(())
}

/// Bumps the play counter and appends a history row in one transaction.
/// Returns the new play count.
pub async fn record_play(
    db: &DatabaseConnection,
    principal: &Principal,
    song_id: i64,
    form: PlayForm,
) -> Result<i64> {
    let form = form.clean()?;
    let txn = db.begin().await?;
    access::visible_song(&txn, principal, song_id).await?;

    DbOper::increment::<sqlm::song::Entity, _>(
        &txn,
        sqlm::song::Column::PlayCount,
        sqlm::song::Column::Id.eq(song_id),
    )
    .await?;
    sqlm::play_history::ActiveModel {
        user_id: Set(principal.id),
        song_id: Set(song_id),
        played_at: Set(Utc::now()),
        play_duration: Set(form.play_duration),
        completed: Set(form.completed),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let play_count = access::find_song(&txn, song_id).await?.play_count;
    txn.commit().await?;
    tracing::debug!("user {} played song {} ({})", principal.id, song_id, play_count);
    Ok(play_count)
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub entry: sqlm::play_history::Model,
    pub song: sqlm::song::Model,
}

fn history_of(
    principal: &Principal,
) -> sea_orm::SelectTwo<sqlm::play_history::Entity, sqlm::song::Entity> {
    sqlm::play_history::Entity::find()
        .find_also_related(sqlm::song::Entity)
        .filter(sqlm::play_history::Column::UserId.eq(principal.id))
        .filter(sqlm::song::visible_condition(principal))
        .order_by_desc(sqlm::play_history::Column::PlayedAt)
        .order_by_desc(sqlm::play_history::Column::Id)
}

fn into_entries(
    rows: Vec<(sqlm::play_history::Model, Option<sqlm::song::Model>)>,
) -> Vec<HistoryEntry> {
    rows.into_iter()
        .filter_map(|(entry, song)| song.map(|song| HistoryEntry { entry, song }))
        .collect()
}

pub async fn recent_plays<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
    limit: u64,
) -> Result<Vec<HistoryEntry>> {
    let rows = history_of(principal).limit(limit).all(db).await?;
    Ok(into_entries(rows))
}

/// The caller's plays, newest first.
pub async fn play_history<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
    page: PageParams,
) -> Result<Page<HistoryEntry>> {
    let page = fetch_page(history_of(principal), db, page).await?;
    let Page {
        items,
        total,
        page,
        num_pages,
        page_size,
    } = page;
    Ok(Page {
        items: into_entries(items),
        total,
        page,
        num_pages,
        page_size,
    })
}

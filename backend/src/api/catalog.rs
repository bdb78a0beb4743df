//! Genres, artists and albums: resolution, browsing and removal.

use anyhow::anyhow;
use chrono::Utc;
use mlib_core::error::is_unique_violation;
use mlib_core::form::{clean_required, MAX_NAME_LEN, MAX_TITLE_LEN};
use mlib_core::model::{self as sqlm, type_enum::ItemType};
use mlib_core::{LibraryError, Principal, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
};
use serde::Serialize;
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

use super::access;
use super::filter::SongFilter;
use super::pagination::{fetch_page, Page, PageParams};

/// Trimmed, NFC-normalized natural key.
pub fn catalog_key(field: &str, raw: &str, max: usize) -> Result<String> {
    let key: String = raw.trim().nfc().collect();
    clean_required(field, &key, max)
}

/// Read, insert when missing, and on a lost race read the winner's row.
async fn get_or_create<C, E, A>(db: &C, find: Select<E>, model: A) -> Result<E::Model>
where
    C: ConnectionTrait,
    E: EntityTrait,
    A: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
    E::Model: IntoActiveModel<A>,
{
    if let Some(existing) = find.clone().one(db).await? {
        return Ok(existing);
    }
    match model.insert(db).await {
        Ok(created) => Ok(created),
        Err(e) if is_unique_violation(&e) => find.one(db).await?.ok_or_else(|| {
            LibraryError::from(anyhow!("row vanished after unique violation: {}", e))
        }),
        Err(e) => Err(e.into()),
    }
}

pub async fn resolve_artist<C: ConnectionTrait>(db: &C, name: &str) -> Result<sqlm::artist::Model> {
    let name = catalog_key("artist_name", name, MAX_NAME_LEN)?;
    let now = Utc::now();
    let artist = get_or_create(
        db,
        sqlm::artist::Entity::find().filter(sqlm::artist::Column::Name.eq(name.as_str())),
        sqlm::artist::ActiveModel {
            name: Set(name.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        },
    )
    .await?;
    tracing::debug!("resolved artist {} -> {}", name, artist.id);
    Ok(artist)
}

/// The artist a supplied name would resolve to, without creating it.
pub async fn lookup_artist<C: ConnectionTrait>(
    db: &C,
    name: &str,
) -> Result<Option<sqlm::artist::Model>> {
    let name = catalog_key("artist_name", name, MAX_NAME_LEN)?;
    Ok(sqlm::artist::Entity::find()
        .filter(sqlm::artist::Column::Name.eq(name.as_str()))
        .one(db)
        .await?)
}

pub async fn resolve_album<C: ConnectionTrait>(
    db: &C,
    title: &str,
    artist: &sqlm::artist::Model,
) -> Result<sqlm::album::Model> {
    let title = catalog_key("album_title", title, MAX_TITLE_LEN)?;
    let now = Utc::now();
    let album = get_or_create(
        db,
        sqlm::album::Entity::find()
            .filter(sqlm::album::Column::Title.eq(title.as_str()))
            .filter(sqlm::album::Column::ArtistId.eq(artist.id)),
        sqlm::album::ActiveModel {
            title: Set(title.clone()),
            artist_id: Set(artist.id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        },
    )
    .await?;
    tracing::debug!("resolved album {} ({}) -> {}", title, artist.name, album.id);
    Ok(album)
}

pub async fn resolve_genre<C: ConnectionTrait>(db: &C, name: &str) -> Result<sqlm::genre::Model> {
    let name = catalog_key("genre_name", name, MAX_NAME_LEN)?;
    let now = Utc::now();
    get_or_create(
        db,
        sqlm::genre::Entity::find().filter(sqlm::genre::Column::Name.eq(name.as_str())),
        sqlm::genre::ActiveModel {
            name: Set(name.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        },
    )
    .await
}

pub async fn find_artist<C: ConnectionTrait>(db: &C, id: i64) -> Result<sqlm::artist::Model> {
    sqlm::artist::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(LibraryError::not_found(ItemType::Artist, id))
}

pub async fn find_album<C: ConnectionTrait>(db: &C, id: i64) -> Result<sqlm::album::Model> {
    sqlm::album::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(LibraryError::not_found(ItemType::Album, id))
}

pub async fn find_genre<C: ConnectionTrait>(db: &C, id: i64) -> Result<sqlm::genre::Model> {
    sqlm::genre::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(LibraryError::not_found(ItemType::Genre, id))
}

/// Direct create; an existing name is a validation error here.
pub async fn create_genre<C: ConnectionTrait>(
    db: &C,
    name: &str,
    description: &str,
) -> Result<sqlm::genre::Model> {
    let name = catalog_key("name", name, MAX_NAME_LEN)?;
    let taken = || LibraryError::validation("name", "Genre with this name already exists.");
    if sqlm::genre::Entity::find()
        .filter(sqlm::genre::Column::Name.eq(name.as_str()))
        .one(db)
        .await?
        .is_some()
    {
        return Err(taken());
    }

    let now = Utc::now();
    let res = sqlm::genre::ActiveModel {
        name: Set(name),
        description: Set(description.trim().to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await;
    match res {
        Ok(genre) => {
            tracing::info!("created genre {} ({})", genre.name, genre.id);
            Ok(genre)
        }
        Err(e) if is_unique_violation(&e) => Err(taken()),
        Err(e) => Err(e.into()),
    }
}

/// Visible song counts grouped by a song foreign key column.
async fn song_counts_by<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
    col: sqlm::song::Column,
) -> Result<HashMap<i64, u64>> {
    let rows: Vec<(Option<i64>, i64)> = access::visible_songs(principal)
        .select_only()
        .column(col)
        .column_as(
            Expr::col((sqlm::song::Entity, sqlm::song::Column::Id)).count(),
            "song_count",
        )
        .group_by(col)
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .filter_map(|(id, n)| id.map(|id| (id, n as u64)))
        .collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct GenreItem {
    #[serde(flatten)]
    pub genre: sqlm::genre::Model,
    pub song_count: u64,
}

pub async fn list_genres<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
) -> Result<Vec<GenreItem>> {
    let genres = sqlm::genre::Entity::find()
        .order_by_asc(sqlm::genre::Column::Name)
        .all(db)
        .await?;
    let counts = song_counts_by(db, principal, sqlm::song::Column::GenreId).await?;
    Ok(genres
        .into_iter()
        .map(|genre| GenreItem {
            song_count: counts.get(&genre.id).copied().unwrap_or(0),
            genre,
        })
        .collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtistItem {
    #[serde(flatten)]
    pub artist: sqlm::artist::Model,
    pub song_count: u64,
}

pub async fn list_artists<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
    page: PageParams,
) -> Result<Page<ArtistItem>> {
    let artists = fetch_page(
        sqlm::artist::Entity::find()
            .order_by_asc(sqlm::artist::Column::Name)
            .order_by_asc(sqlm::artist::Column::Id),
        db,
        page,
    )
    .await?;
    let counts = song_counts_by(db, principal, sqlm::song::Column::ArtistId).await?;
    Ok(artists.map(|artist| ArtistItem {
        song_count: counts.get(&artist.id).copied().unwrap_or(0),
        artist,
    }))
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtistDetail {
    pub artist: sqlm::artist::Model,
    pub albums: Vec<sqlm::album::Model>,
    pub songs: Vec<sqlm::song::Model>,
    pub song_count: u64,
    pub album_count: u64,
}

pub async fn artist_detail<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
    id: i64,
) -> Result<ArtistDetail> {
    let artist = find_artist(db, id).await?;
    let albums = sqlm::album::Entity::find()
        .filter(sqlm::album::Column::ArtistId.eq(id))
        .order_by_desc(sqlm::album::Column::ReleaseDate)
        .order_by_asc(sqlm::album::Column::Title)
        .all(db)
        .await?;
    let by_artist = SongFilter {
        artist: Some(id),
        ..Default::default()
    };
    let songs = access::list_visible_songs(db, principal, &by_artist).await?;
    Ok(ArtistDetail {
        song_count: songs.len() as u64,
        album_count: albums.len() as u64,
        artist,
        albums,
        songs,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct AlbumDetail {
    pub album: sqlm::album::Model,
    pub artist: sqlm::artist::Model,
    pub songs: Vec<sqlm::song::Model>,
    pub song_count: u64,
    /// seconds
    pub total_duration: i64,
}

pub async fn album_detail<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
    id: i64,
) -> Result<AlbumDetail> {
    let album = find_album(db, id).await?;
    let artist = find_artist(db, album.artist_id).await?;
    let songs = access::visible_songs(principal)
        .filter(sqlm::song::Column::AlbumId.eq(id))
        .order_by_asc(sqlm::song::Column::Id)
        .all(db)
        .await?;
    Ok(AlbumDetail {
        song_count: songs.len() as u64,
        total_duration: songs.iter().filter_map(|s| s.duration).sum(),
        album,
        artist,
        songs,
    })
}

pub async fn count_artists<C: ConnectionTrait>(db: &C) -> Result<u64> {
    Ok(sqlm::artist::Entity::find().count(db).await?)
}

pub async fn count_albums<C: ConnectionTrait>(db: &C) -> Result<u64> {
    Ok(sqlm::album::Entity::find().count(db).await?)
}

/// Removes the artist with its albums and songs.
pub async fn delete_artist<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
    id: i64,
) -> Result<()> {
    access::require_staff(principal)?;
    let artist = find_artist(db, id).await?;
    sqlm::artist::Entity::delete_by_id(artist.id).exec(db).await?;
    tracing::info!("deleted artist {} ({})", artist.name, artist.id);
    Ok(())
}

/// Songs of the album stay, detached from it.
pub async fn delete_album<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
    id: i64,
) -> Result<()> {
    access::require_staff(principal)?;
    let album = find_album(db, id).await?;
    sqlm::album::Entity::delete_by_id(album.id).exec(db).await?;
    tracing::info!("deleted album {} ({})", album.title, album.id);
    Ok(())
}

pub async fn delete_genre<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
    id: i64,
) -> Result<()> {
    access::require_staff(principal)?;
    let genre = find_genre(db, id).await?;
    sqlm::genre::Entity::delete_by_id(genre.id).exec(db).await?;
    tracing::info!("deleted genre {} ({})", genre.name, genre.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::*;

    #[tokio::test]
    async fn test_resolve_artist_idempotent() {
        let db = setup_db().await;
        let a = resolve_artist(&db, "Radiohead").await.unwrap();
        let b = resolve_artist(&db, "  Radiohead ").await.unwrap();
        assert_eq!(a.id, b.id);
        let n = sqlm::artist::Entity::find()
            .filter(sqlm::artist::Column::Name.eq("Radiohead"))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(n, 1);
    }

    #[tokio::test]
    async fn test_resolve_normalizes_unicode() {
        let db = setup_db().await;
        // precomposed vs combining acute
        let a = resolve_artist(&db, "Beyonc\u{e9}").await.unwrap();
        let b = resolve_artist(&db, "Beyonce\u{301}").await.unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_resolve_rejects_blank() {
        let db = setup_db().await;
        match resolve_genre(&db, "   ").await {
            Err(LibraryError::Validation { field, .. }) => assert_eq!(field, "genre_name"),
            r => panic!("unexpected {:?}", r),
        }
    }

    #[tokio::test]
    async fn test_resolve_album_keyed_by_artist() {
        let db = setup_db().await;
        let weezer = resolve_artist(&db, "Weezer").await.unwrap();
        let peter = resolve_artist(&db, "Peter Gabriel").await.unwrap();
        let blue = resolve_album(&db, "Blue", &weezer).await.unwrap();
        let again = resolve_album(&db, "Blue", &weezer).await.unwrap();
        let other = resolve_album(&db, "Blue", &peter).await.unwrap();
        assert_eq!(blue.id, again.id);
        assert_ne!(blue.id, other.id);
    }

    #[tokio::test]
    async fn test_get_or_create_returns_existing_row() {
        let db = setup_db().await;
        let existing = seed_artist(&db, "Massive Attack").await;
        let got = get_or_create(
            &db,
            sqlm::artist::Entity::find().filter(sqlm::artist::Column::Name.eq("Massive Attack")),
            sqlm::artist::ActiveModel {
                name: Set("Massive Attack".to_string()),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(got.id, existing.id);

        let err = sqlm::artist::ActiveModel {
            name: Set("Massive Attack".to_string()),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_create_genre_duplicate() {
        let db = setup_db().await;
        create_genre(&db, "Trip Hop", "Bristol").await.unwrap();
        match create_genre(&db, " Trip Hop ", "").await {
            Err(LibraryError::Validation { field, .. }) => assert_eq!(field, "name"),
            r => panic!("unexpected {:?}", r),
        }
    }

    #[tokio::test]
    async fn test_list_genres_counts_visible_songs() {
        let db = setup_db().await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;
        let artist = seed_artist(&db, "Portishead").await;
        let genre = seed_genre(&db, "Trip Hop").await;
        seed_genre(&db, "Ambient").await;
        for (title, public) in [("Roads", true), ("Glory Box", false)] {
            let song = seed_song(&db, &alice, artist.id, title, public).await;
            let mut am = song.into_active_model();
            am.genre_id = Set(Some(genre.id));
            am.update(&db).await.unwrap();
        }

        let genres = list_genres(&db, &bob).await.unwrap();
        assert_eq!(genres[0].genre.name, "Ambient");
        assert_eq!(genres[0].song_count, 0);
        assert_eq!(genres[1].song_count, 1);
        let genres = list_genres(&db, &alice).await.unwrap();
        assert_eq!(genres[1].song_count, 2);
    }

    #[tokio::test]
    async fn test_list_artists_paged_by_name() {
        let db = setup_db().await;
        let alice = seed_user(&db, "alice").await;
        for i in 0..30 {
            seed_artist(&db, &format!("Artist {:02}", i)).await;
        }
        let first = seed_artist(&db, "AAA").await;
        seed_song(&db, &alice, first.id, "One", true).await;

        let page = list_artists(&db, &alice, PageParams::parse(Some("1"), 24)).await.unwrap();
        assert_eq!(page.items.len(), 24);
        assert_eq!(page.num_pages, 2);
        assert_eq!(page.items[0].artist.name, "AAA");
        assert_eq!(page.items[0].song_count, 1);
        assert_eq!(page.items[1].song_count, 0);

        let last = list_artists(&db, &alice, PageParams::parse(Some("7"), 24)).await.unwrap();
        assert_eq!(last.page, 2);
        assert_eq!(last.items.len(), 7);
    }

    #[tokio::test]
    async fn test_artist_and_album_detail_filter_songs() {
        let db = setup_db().await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;
        let artist = seed_artist(&db, "Portishead").await;
        let album = seed_album(&db, artist.id, "Dummy").await;
        for (title, public) in [("Roads", true), ("Glory Box", false)] {
            let song = seed_song(&db, &alice, artist.id, title, public).await;
            let mut am = song.into_active_model();
            am.album_id = Set(Some(album.id));
            am.update(&db).await.unwrap();
        }

        let detail = artist_detail(&db, &bob, artist.id).await.unwrap();
        assert_eq!(detail.song_count, 1);
        assert_eq!(detail.album_count, 1);
        let detail = album_detail(&db, &alice, album.id).await.unwrap();
        assert_eq!(detail.song_count, 2);
        assert_eq!(detail.total_duration, 400);
        assert_eq!(detail.artist.id, artist.id);

        assert!(matches!(
            album_detail(&db, &bob, 4242).await,
            Err(LibraryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_artist_cascades() {
        let db = setup_db().await;
        let alice = seed_user(&db, "alice").await;
        let staff = seed_staff(&db, "root").await;
        let artist = seed_artist(&db, "Portishead").await;
        let album = seed_album(&db, artist.id, "Dummy").await;
        let song = seed_song(&db, &alice, artist.id, "Roads", true).await;
        let mut am = song.clone().into_active_model();
        am.album_id = Set(Some(album.id));
        am.update(&db).await.unwrap();

        assert!(matches!(
            delete_artist(&db, &alice, artist.id).await,
            Err(LibraryError::PermissionDenied(_))
        ));
        delete_artist(&db, &staff, artist.id).await.unwrap();

        assert!(sqlm::album::Entity::find_by_id(album.id).one(&db).await.unwrap().is_none());
        assert!(sqlm::song::Entity::find_by_id(song.id).one(&db).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_genre_and_album_detach_songs() {
        let db = setup_db().await;
        let alice = seed_user(&db, "alice").await;
        let staff = seed_staff(&db, "root").await;
        let artist = seed_artist(&db, "Portishead").await;
        let album = seed_album(&db, artist.id, "Dummy").await;
        let genre = seed_genre(&db, "Trip Hop").await;
        let song = seed_song(&db, &alice, artist.id, "Roads", true).await;
        let mut am = song.clone().into_active_model();
        am.album_id = Set(Some(album.id));
        am.genre_id = Set(Some(genre.id));
        am.update(&db).await.unwrap();

        delete_genre(&db, &staff, genre.id).await.unwrap();
        let kept = sqlm::song::Entity::find_by_id(song.id).one(&db).await.unwrap().unwrap();
        assert_eq!(kept.genre_id, None);
        assert_eq!(kept.album_id, Some(album.id));

        delete_album(&db, &staff, album.id).await.unwrap();
        let kept = sqlm::song::Entity::find_by_id(song.id).one(&db).await.unwrap().unwrap();
        assert_eq!(kept.album_id, None);
        assert_eq!(kept.artist_id, artist.id);
    }
}

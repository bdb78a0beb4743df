//! Songs: upload, edit, listing, detail, download, home page and search.

use chrono::Utc;
use mlib_core::blob::{self, BlobStore, Upload};
use mlib_core::db::DbOper;
use mlib_core::form::{SongForm, SongUpdate};
use mlib_core::model::{self as sqlm, type_enum::BlobKind};
use mlib_core::{LibraryError, Principal, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;

use super::access;
use super::catalog;
use super::engagement::{self, HistoryEntry};
use super::filter::{contains, SongFilter};
use super::helper_sort::{song_sort_col, SongSort};
use super::pagination::{fetch_page, Page, PageParams};
use super::stats;

pub const RELATED_LIMIT: u64 = 6;
pub const SEARCH_SONG_LIMIT: u64 = 50;
pub const SEARCH_CATALOG_LIMIT: u64 = 20;

/// Store the audio, then resolve the catalog and insert the song in one
/// transaction.
pub async fn upload_song(
    db: &DatabaseConnection,
    blobs: &dyn BlobStore,
    principal: &Principal,
    form: SongForm,
    audio: Upload,
) -> Result<sqlm::song::Model> {
    let form = form.clean()?;
    blob::validate(BlobKind::Audio, "audio_file", &audio)?;

    // every referenced row is checked before the blob is stored
    let known_artist = match (form.artist_id, form.artist_name.as_deref()) {
        (Some(id), _) => Some(catalog::find_artist(db, id).await?),
        (None, Some(name)) => catalog::lookup_artist(db, name).await?,
        (None, None) => None,
    };
    if let Some(id) = form.album_id {
        let album = catalog::find_album(db, id).await?;
        check_album_artist(&album, known_artist.as_ref().map(|a| a.id))?;
    }
    if let Some(id) = form.genre_id {
        catalog::find_genre(db, id).await?;
    }
    let audio_file = blob::store(blobs, BlobKind::Audio, "audio_file", audio).await?;

    let txn = db.begin().await?;
    let artist = match (form.artist_id, form.artist_name.as_deref()) {
        (Some(id), _) => catalog::find_artist(&txn, id).await?,
        (None, Some(name)) => catalog::resolve_artist(&txn, name).await?,
        (None, None) => {
            return Err(LibraryError::validation(
                "artist",
                "Please select an artist or enter a new artist name.",
            ))
        }
    };
    let album_id = match (form.album_id, form.album_title.as_deref()) {
        (Some(id), _) => {
            let album = catalog::find_album(&txn, id).await?;
            check_album_artist(&album, Some(artist.id))?;
            Some(album.id)
        }
        (None, Some(title)) => Some(catalog::resolve_album(&txn, title, &artist).await?.id),
        (None, None) => None,
    };
    let genre_id = match (form.genre_id, form.genre_name.as_deref()) {
        (Some(id), _) => Some(catalog::find_genre(&txn, id).await?.id),
        (None, Some(name)) => Some(catalog::resolve_genre(&txn, name).await?.id),
        (None, None) => None,
    };

    let song = sqlm::song::ActiveModel {
        title: Set(form.title),
        artist_id: Set(artist.id),
        album_id: Set(album_id),
        genre_id: Set(genre_id),
        audio_file: Set(audio_file),
        duration: Set(form.duration),
        lyrics: Set(form.lyrics),
        release_year: Set(form.release_year),
        uploaded_by: Set(principal.id),
        upload_date: Set(Utc::now()),
        play_count: Set(0),
        download_count: Set(0),
        is_public: Set(form.is_public),
        is_featured: Set(form.is_featured),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    tracing::info!(
        "user {} uploaded song {} ({}) by {}",
        principal.id,
        song.id,
        song.title,
        artist.name
    );
    Ok(song)
}

/// An album can only be picked for a song of the album's own artist.
fn check_album_artist(album: &sqlm::album::Model, artist_id: Option<i64>) -> Result<()> {
    if artist_id != Some(album.artist_id) {
        return Err(LibraryError::validation(
            "album",
            "The selected album does not belong to this artist.",
        ));
    }
    Ok(())
}

pub async fn update_song(
    db: &DatabaseConnection,
    principal: &Principal,
    id: i64,
    changes: SongUpdate,
) -> Result<sqlm::song::Model> {
    let changes = changes.clean()?;
    let song = access::editable_song(db, principal, id).await?;

    if let Some(Some(album_id)) = changes.album_id {
        let album = catalog::find_album(db, album_id).await?;
        check_album_artist(&album, Some(song.artist_id))?;
    }
    if let Some(Some(genre_id)) = changes.genre_id {
        catalog::find_genre(db, genre_id).await?;
    }

    let mut am = song.into_active_model();
    if let Some(title) = changes.title {
        am.title = Set(title);
    }
    if let Some(album_id) = changes.album_id {
        am.album_id = Set(album_id);
    }
    if let Some(genre_id) = changes.genre_id {
        am.genre_id = Set(genre_id);
    }
    if let Some(duration) = changes.duration {
        am.duration = Set(Some(duration));
    }
    if let Some(lyrics) = changes.lyrics {
        am.lyrics = Set(lyrics);
    }
    if let Some(year) = changes.release_year {
        am.release_year = Set(Some(year));
    }
    if let Some(is_public) = changes.is_public {
        am.is_public = Set(is_public);
    }
    if let Some(is_featured) = changes.is_featured {
        am.is_featured = Set(is_featured);
    }

    let song = am.update(db).await?;
    tracing::debug!("user {} updated song {}", principal.id, song.id);
    Ok(song)
}

pub async fn delete_song(db: &DatabaseConnection, principal: &Principal, id: i64) -> Result<()> {
    let song = access::editable_song(db, principal, id).await?;
    sqlm::song::Entity::delete_by_id(song.id).exec(db).await?;
    tracing::info!("user {} deleted song {} ({})", principal.id, song.id, song.title);
    Ok(())
}

pub async fn get_song(
    db: &DatabaseConnection,
    principal: &Principal,
    id: i64,
) -> Result<sqlm::song::Model> {
    access::visible_song(db, principal, id).await
}

/// Visible songs, filtered, sorted by an allow-listed key and paged.
pub async fn query_songs(
    db: &DatabaseConnection,
    principal: &Principal,
    filter: &SongFilter,
    sort: SongSort,
    page: PageParams,
) -> Result<Page<sqlm::song::Model>> {
    let mut select = access::visible_songs(principal).filter(filter.condition());
    if sort.needs_artist_join() {
        select = select.inner_join(sqlm::artist::Entity);
    }
    let (expr, order) = song_sort_col(sort);
    let select = select
        .order_by(expr, order)
        .order_by_desc(sqlm::song::Column::Id);
    Ok(fetch_page(select, db, page).await?)
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadTicket {
    pub song_id: i64,
    pub title: String,
    pub audio_file: String,
    pub download_count: i64,
}

pub async fn download_song(
    db: &DatabaseConnection,
    principal: &Principal,
    id: i64,
) -> Result<DownloadTicket> {
    let song = access::visible_song(db, principal, id).await?;
    DbOper::increment::<sqlm::song::Entity, _>(
        db,
        sqlm::song::Column::DownloadCount,
        sqlm::song::Column::Id.eq(song.id),
    )
    .await?;
    let song = access::find_song(db, song.id).await?;
    tracing::debug!("user {} downloaded song {}", principal.id, song.id);
    Ok(DownloadTicket {
        song_id: song.id,
        title: song.title,
        audio_file: song.audio_file,
        download_count: song.download_count,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: sqlm::comment::Model,
    pub author: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SongDetail {
    pub song: sqlm::song::Model,
    pub duration_formatted: String,
    pub artist: Option<sqlm::artist::Model>,
    pub album: Option<sqlm::album::Model>,
    pub genre: Option<sqlm::genre::Model>,
    pub is_favorite: bool,
    pub user_rating: Option<i32>,
    pub average_rating: Option<f64>,
    pub rating_count: u64,
    pub comments: Vec<CommentView>,
    pub related: Vec<sqlm::song::Model>,
}

pub async fn song_detail(
    db: &DatabaseConnection,
    principal: &Principal,
    id: i64,
) -> Result<SongDetail> {
    let song = get_song(db, principal, id).await?;

    let artist = sqlm::artist::Entity::find_by_id(song.artist_id).one(db).await?;
    let album = match song.album_id {
        Some(album_id) => sqlm::album::Entity::find_by_id(album_id).one(db).await?,
        None => None,
    };
    let genre = match song.genre_id {
        Some(genre_id) => sqlm::genre::Entity::find_by_id(genre_id).one(db).await?,
        None => None,
    };

    let comments = sqlm::comment::Entity::find()
        .filter(sqlm::comment::Column::SongId.eq(song.id))
        .find_also_related(sqlm::user::Entity)
        .order_by_desc(sqlm::comment::Column::CreatedAt)
        .order_by_desc(sqlm::comment::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|(comment, user)| CommentView {
            comment,
            author: user.map(|u| u.username).unwrap_or_default(),
        })
        .collect();

    Ok(SongDetail {
        duration_formatted: song.duration_formatted(),
        artist,
        album,
        genre,
        is_favorite: engagement::is_favorite(db, principal.id, song.id).await?,
        user_rating: engagement::user_rating(db, principal.id, song.id).await?,
        average_rating: stats::average_rating(db, song.id).await?,
        rating_count: stats::rating_count(db, song.id).await?,
        comments,
        related: related_songs(db, &song).await?,
        song,
    })
}

/// Public songs sharing the artist or the genre.
pub async fn related_songs<C: ConnectionTrait>(
    db: &C,
    song: &sqlm::song::Model,
) -> Result<Vec<sqlm::song::Model>> {
    let mut same = Condition::any().add(sqlm::song::Column::ArtistId.eq(song.artist_id));
    if let Some(genre_id) = song.genre_id {
        same = same.add(sqlm::song::Column::GenreId.eq(genre_id));
    }
    Ok(sqlm::song::Entity::find()
        .filter(same)
        .filter(sqlm::song::Column::IsPublic.eq(true))
        .filter(sqlm::song::Column::Id.ne(song.id))
        .order_by_desc(sqlm::song::Column::PlayCount)
        .order_by_desc(sqlm::song::Column::Id)
        .limit(RELATED_LIMIT)
        .all(db)
        .await?)
}

#[derive(Debug, Clone, Serialize)]
pub struct Home {
    pub recent_songs: Vec<sqlm::song::Model>,
    pub popular_songs: Vec<sqlm::song::Model>,
    pub featured_songs: Vec<sqlm::song::Model>,
    pub user_playlists: Vec<sqlm::playlist::Model>,
    pub recent_plays: Vec<HistoryEntry>,
    pub total_songs: u64,
    pub total_artists: u64,
    pub total_albums: u64,
}

pub async fn home(db: &DatabaseConnection, principal: &Principal) -> Result<Home> {
    let public = || sqlm::song::Entity::find().filter(sqlm::song::Column::IsPublic.eq(true));

    let recent_songs = public()
        .order_by_desc(sqlm::song::Column::UploadDate)
        .order_by_desc(sqlm::song::Column::Id)
        .limit(10)
        .all(db)
        .await?;
    let popular_songs = public()
        .order_by_desc(sqlm::song::Column::PlayCount)
        .order_by_desc(sqlm::song::Column::Id)
        .limit(10)
        .all(db)
        .await?;
    let featured_songs = public()
        .filter(sqlm::song::Column::IsFeatured.eq(true))
        .order_by_desc(sqlm::song::Column::UploadDate)
        .limit(5)
        .all(db)
        .await?;
    let user_playlists = sqlm::playlist::Entity::find()
        .filter(sqlm::playlist::Column::UserId.eq(principal.id))
        .order_by_desc(sqlm::playlist::Column::CreatedAt)
        .order_by_desc(sqlm::playlist::Column::Id)
        .limit(5)
        .all(db)
        .await?;
    let recent_plays = engagement::recent_plays(db, principal, 5).await?;

    Ok(Home {
        recent_songs,
        popular_songs,
        featured_songs,
        user_playlists,
        recent_plays,
        total_songs: public().count(db).await?,
        total_artists: catalog::count_artists(db).await?,
        total_albums: catalog::count_albums(db).await?,
    })
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub songs: Vec<sqlm::song::Model>,
    pub artists: Vec<sqlm::artist::Model>,
    pub albums: Vec<sqlm::album::Model>,
}

/// Case-insensitive substring search; a blank query finds nothing.
pub async fn search(
    db: &DatabaseConnection,
    principal: &Principal,
    q: &str,
) -> Result<SearchResults> {
    let q = q.trim();
    if q.is_empty() {
        return Ok(SearchResults::default());
    }

    let songs = access::visible_songs(principal)
        .left_join(sqlm::artist::Entity)
        .left_join(sqlm::album::Entity)
        .filter(
            Condition::any()
                .add(contains(sqlm::song::Column::Title, q))
                .add(contains(sqlm::artist::Column::Name, q))
                .add(contains(sqlm::album::Column::Title, q))
                .add(contains(sqlm::song::Column::Lyrics, q)),
        )
        .distinct()
        .order_by_desc(sqlm::song::Column::UploadDate)
        .order_by_desc(sqlm::song::Column::Id)
        .limit(SEARCH_SONG_LIMIT)
        .all(db)
        .await?;

    let artists = sqlm::artist::Entity::find()
        .filter(contains(sqlm::artist::Column::Name, q))
        .order_by_asc(sqlm::artist::Column::Name)
        .limit(SEARCH_CATALOG_LIMIT)
        .all(db)
        .await?;

    let albums = sqlm::album::Entity::find()
        .left_join(sqlm::artist::Entity)
        .filter(
            Condition::any()
                .add(contains(sqlm::album::Column::Title, q))
                .add(contains(sqlm::artist::Column::Name, q)),
        )
        .order_by_asc(sqlm::album::Column::Title)
        .limit(SEARCH_CATALOG_LIMIT)
        .all(db)
        .await?;

    Ok(SearchResults {
        query: q.to_string(),
        songs,
        artists,
        albums,
    })
}

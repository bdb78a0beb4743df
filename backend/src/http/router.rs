//! JSON request routing onto the library operations.

use hyper::body::{Body, Bytes};
use hyper::http::request::Parts;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use mlib_core::form::{PlayForm, PlaylistForm, ProfileForm, RegisterForm, SongForm, SongUpdate};
use mlib_core::{LibraryError, Principal};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::body::{error_response, json, no_content, read_json, ResponseBody, UploadPayload};
use crate::api::filter::SongFilter;
use crate::api::helper_sort::SongSort;
use crate::api::pagination::{PageParams, ARTIST_PAGE_SIZE, HISTORY_PAGE_SIZE, SONG_PAGE_SIZE};
use crate::api::{account, catalog, engagement, library, playlist, stats};
use crate::context::BackendContext;
use crate::error::ProcessError;

pub const HEADER_USER_ID: &str = "x-user-id";

#[derive(Debug, Default)]
struct ListQuery {
    page: Option<String>,
    sort: Option<String>,
    genre: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    q: Option<String>,
}

impl ListQuery {
    /// Unknown keys are ignored and a repeated key keeps its last value.
    fn parse(raw: Option<&str>) -> Result<Self, ProcessError> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw.unwrap_or(""))?;
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "page" => &mut query.page,
                "sort" => &mut query.sort,
                "genre" => &mut query.genre,
                "artist" => &mut query.artist,
                "album" => &mut query.album,
                "q" => &mut query.q,
                _ => continue,
            };
            *slot = Some(value);
        }
        Ok(query)
    }
}

#[derive(Deserialize)]
struct SongUpload {
    #[serde(flatten)]
    song: SongForm,
    audio_file: UploadPayload,
}

#[derive(Deserialize)]
struct PlaylistUpload {
    #[serde(flatten)]
    playlist: PlaylistForm,
    #[serde(default)]
    cover_image: Option<UploadPayload>,
}

#[derive(Deserialize)]
struct ProfileUpload {
    #[serde(flatten)]
    profile: ProfileForm,
    #[serde(default)]
    profile_picture: Option<UploadPayload>,
}

#[derive(Deserialize)]
struct RatingBody {
    rating: i32,
}

#[derive(Deserialize)]
struct CommentBody {
    text: String,
}

#[derive(Deserialize)]
struct GenreBody {
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Serialize)]
struct FavoriteState {
    is_favorite: bool,
}

#[derive(Serialize)]
struct RatingState {
    rating: i32,
    average_rating: Option<f64>,
}

#[derive(Serialize)]
struct PlayState {
    play_count: i64,
}

#[derive(Serialize)]
struct Added {
    added: bool,
}

#[derive(Serialize)]
struct Removed {
    removed: bool,
}

fn ok<T: Serialize>(value: &T) -> Result<Response<ResponseBody>, ProcessError> {
    json(StatusCode::OK, value)
}

fn created<T: Serialize>(value: &T) -> Result<Response<ResponseBody>, ProcessError> {
    json(StatusCode::CREATED, value)
}

fn parse_id(id: &str) -> Result<i64, ProcessError> {
    id.parse().map_err(|_| ProcessError::WrongId(id.to_string()))
}

/// The identity provider has already authenticated the caller; only look it up.
async fn identify(ctx: &BackendContext, headers: &HeaderMap) -> Result<Principal, ProcessError> {
    let id = headers
        .get(HEADER_USER_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .ok_or(ProcessError::Unauthorized)?;
    match account::principal_for(&ctx.db, id).await {
        Ok(principal) => Ok(principal),
        Err(LibraryError::NotFound { .. }) => Err(ProcessError::Unauthorized),
        Err(e) => Err(e.into()),
    }
}

pub async fn process_http<B>(ctx: &Arc<BackendContext>, req: Request<B>) -> Response<ResponseBody>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    match route(ctx, req).await {
        Ok(rsp) => {
            tracing::debug!("{} {} -> {}", method, path, rsp.status());
            rsp
        }
        Err(e) => {
            if e.status().is_server_error() {
                tracing::error!("{} {} failed: {}", method, path, e);
            } else {
                tracing::warn!("{} {} -> {}: {}", method, path, e.status(), e);
            }
            error_response(&e)
        }
    }
}

async fn route<B>(
    ctx: &Arc<BackendContext>,
    req: Request<B>,
) -> Result<Response<ResponseBody>, ProcessError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();
    let Parts {
        method, uri, headers, ..
    } = parts;
    let query = ListQuery::parse(uri.query())?;
    let segments: Vec<&str> = uri.path().split('/').filter(|s| !s.is_empty()).collect();
    let db = &ctx.db;
    let blobs = ctx.blobs.as_ref();

    // registration is the only anonymous route
    if method == Method::POST && segments.as_slice() == ["users"] {
        let form: RegisterForm = read_json(body).await?;
        return created(&account::register(db, form).await?);
    }

    let principal = identify(ctx, &headers).await?;
    let page = |size| PageParams::parse(query.page.as_deref(), size);

    match (&method, segments.as_slice()) {
        (&Method::GET, ["home"]) => ok(&library::home(db, &principal).await?),
        (&Method::GET, ["search"]) => {
            ok(&library::search(db, &principal, query.q.as_deref().unwrap_or("")).await?)
        }

        (&Method::GET, ["songs"]) => {
            let filter = SongFilter::parse(
                query.genre.as_deref(),
                query.artist.as_deref(),
                query.album.as_deref(),
            );
            let sort = SongSort::parse(query.sort.as_deref());
            ok(&library::query_songs(db, &principal, &filter, sort, page(SONG_PAGE_SIZE)).await?)
        }
        (&Method::POST, ["songs"]) => {
            let upload: SongUpload = read_json(body).await?;
            let audio = upload.audio_file.decode()?;
            created(&library::upload_song(db, blobs, &principal, upload.song, audio).await?)
        }
        (&Method::GET, ["songs", id]) => {
            ok(&library::song_detail(db, &principal, parse_id(id)?).await?)
        }
        (&Method::PUT, ["songs", id]) => {
            let id = parse_id(id)?;
            let changes: SongUpdate = read_json(body).await?;
            ok(&library::update_song(db, &principal, id, changes).await?)
        }
        (&Method::DELETE, ["songs", id]) => {
            library::delete_song(db, &principal, parse_id(id)?).await?;
            no_content()
        }
        (&Method::POST, ["songs", id, "play"]) => {
            let id = parse_id(id)?;
            let form: PlayForm = read_json(body).await?;
            let play_count = engagement::record_play(db, &principal, id, form).await?;
            ok(&PlayState { play_count })
        }
        (&Method::POST, ["songs", id, "download"]) => {
            ok(&library::download_song(db, &principal, parse_id(id)?).await?)
        }
        (&Method::POST, ["songs", id, "favorite"]) => {
            let is_favorite = engagement::toggle_favorite(db, &principal, parse_id(id)?).await?;
            ok(&FavoriteState { is_favorite })
        }
        (&Method::POST, ["songs", id, "rating"]) => {
            let id = parse_id(id)?;
            let body: RatingBody = read_json(body).await?;
            let rating = engagement::set_rating(db, &principal, id, body.rating).await?;
            ok(&RatingState {
                rating: rating.value,
                average_rating: stats::average_rating(db, id).await?,
            })
        }
        (&Method::POST, ["songs", id, "comments"]) => {
            let id = parse_id(id)?;
            let body: CommentBody = read_json(body).await?;
            created(&engagement::add_comment(db, &principal, id, &body.text).await?)
        }
        (&Method::PUT, ["comments", id]) => {
            let id = parse_id(id)?;
            let body: CommentBody = read_json(body).await?;
            ok(&engagement::edit_comment(db, &principal, id, &body.text).await?)
        }
        (&Method::DELETE, ["comments", id]) => {
            engagement::delete_comment(db, &principal, parse_id(id)?).await?;
            no_content()
        }

        (&Method::GET, ["playlists"]) => ok(&playlist::list_playlists(db, &principal).await?),
        (&Method::POST, ["playlists"]) => {
            let upload: PlaylistUpload = read_json(body).await?;
            let cover = upload.cover_image.map(UploadPayload::decode).transpose()?;
            let playlist =
                playlist::create_playlist(db, blobs, &principal, upload.playlist, cover).await?;
            created(&playlist)
        }
        (&Method::GET, ["playlists", id]) => {
            ok(&playlist::playlist_detail(db, &principal, parse_id(id)?).await?)
        }
        (&Method::PUT, ["playlists", id]) => {
            let id = parse_id(id)?;
            let upload: PlaylistUpload = read_json(body).await?;
            let cover = upload.cover_image.map(UploadPayload::decode).transpose()?;
            ok(&playlist::update_playlist(db, blobs, &principal, id, upload.playlist, cover).await?)
        }
        (&Method::DELETE, ["playlists", id]) => {
            playlist::delete_playlist(db, &principal, parse_id(id)?).await?;
            no_content()
        }
        (&Method::POST, ["playlists", id, "songs", song_id]) => {
            let added =
                playlist::add_to_playlist(db, &principal, parse_id(id)?, parse_id(song_id)?).await?;
            ok(&Added { added })
        }
        (&Method::DELETE, ["playlists", id, "songs", song_id]) => {
            let removed =
                playlist::remove_from_playlist(db, &principal, parse_id(id)?, parse_id(song_id)?)
                    .await?;
            ok(&Removed { removed })
        }

        (&Method::GET, ["artists"]) => {
            ok(&catalog::list_artists(db, &principal, page(ARTIST_PAGE_SIZE)).await?)
        }
        (&Method::GET, ["artists", id]) => {
            ok(&catalog::artist_detail(db, &principal, parse_id(id)?).await?)
        }
        (&Method::DELETE, ["artists", id]) => {
            catalog::delete_artist(db, &principal, parse_id(id)?).await?;
            no_content()
        }
        (&Method::GET, ["albums", id]) => {
            ok(&catalog::album_detail(db, &principal, parse_id(id)?).await?)
        }
        (&Method::DELETE, ["albums", id]) => {
            catalog::delete_album(db, &principal, parse_id(id)?).await?;
            no_content()
        }
        (&Method::GET, ["genres"]) => ok(&catalog::list_genres(db, &principal).await?),
        (&Method::POST, ["genres"]) => {
            let body: GenreBody = read_json(body).await?;
            created(&catalog::create_genre(db, &body.name, &body.description).await?)
        }
        (&Method::DELETE, ["genres", id]) => {
            catalog::delete_genre(db, &principal, parse_id(id)?).await?;
            no_content()
        }

        (&Method::GET, ["favorites"]) => ok(&engagement::list_favorites(db, &principal).await?),
        (&Method::GET, ["history"]) => {
            ok(&engagement::play_history(db, &principal, page(HISTORY_PAGE_SIZE)).await?)
        }
        (&Method::GET, ["stats"]) => ok(&stats::user_stats(db, &principal).await?),

        (&Method::GET, ["users", "me"]) => ok(&account::profile(db, &principal).await?),
        (&Method::PUT, ["users", "me"]) => {
            let upload: ProfileUpload = read_json(body).await?;
            let picture = upload.profile_picture.map(UploadPayload::decode).transpose()?;
            ok(&account::update_profile(db, blobs, &principal, upload.profile, picture).await?)
        }
        (&Method::DELETE, ["users", id]) => {
            account::delete_user(db, &principal, parse_id(id)?).await?;
            no_content()
        }

        _ => Err(ProcessError::NoRoute(uri.path().to_string())),
    }
}

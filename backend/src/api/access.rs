//! Visibility and ownership checks.
//!
//! Every fetch re-reads the row and decides from its current owner and flags.

use mlib_core::model::{self as sqlm, type_enum::ItemType};
use mlib_core::{LibraryError, Principal, Result};
use sea_orm::{ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Select};

use super::filter::SongFilter;

/// Songs the principal may see: public or uploaded by them.
pub fn visible_songs(principal: &Principal) -> Select<sqlm::song::Entity> {
    sqlm::song::Entity::find().filter(sqlm::song::visible_condition(principal))
}

pub fn visible_playlists(principal: &Principal) -> Select<sqlm::playlist::Entity> {
    sqlm::playlist::Entity::find().filter(sqlm::playlist::visible_condition(principal))
}

pub async fn list_visible_songs<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
    filter: &SongFilter,
) -> Result<Vec<sqlm::song::Model>> {
    Ok(visible_songs(principal)
        .filter(filter.condition())
        .order_by_desc(sqlm::song::Column::UploadDate)
        .order_by_desc(sqlm::song::Column::Id)
        .all(db)
        .await?)
}

pub async fn find_song<C: ConnectionTrait>(db: &C, id: i64) -> Result<sqlm::song::Model> {
    sqlm::song::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(LibraryError::not_found(ItemType::Song, id))
}

pub async fn visible_song<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
    id: i64,
) -> Result<sqlm::song::Model> {
    let song = find_song(db, id).await?;
    if !song.visible_to(principal) {
        return Err(LibraryError::denied("This song is private."));
    }
    Ok(song)
}

pub async fn editable_song<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
    id: i64,
) -> Result<sqlm::song::Model> {
    let song = find_song(db, id).await?;
    if !song.editable_by(principal) {
        return Err(LibraryError::denied(
            "You do not have permission to modify this song.",
        ));
    }
    Ok(song)
}

pub async fn find_playlist<C: ConnectionTrait>(db: &C, id: i64) -> Result<sqlm::playlist::Model> {
    sqlm::playlist::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(LibraryError::not_found(ItemType::Playlist, id))
}

pub async fn visible_playlist<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
    id: i64,
) -> Result<sqlm::playlist::Model> {
    let playlist = find_playlist(db, id).await?;
    if !playlist.visible_to(principal) {
        return Err(LibraryError::denied("This playlist is private."));
    }
    Ok(playlist)
}

pub async fn editable_playlist<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
    id: i64,
) -> Result<sqlm::playlist::Model> {
    let playlist = find_playlist(db, id).await?;
    if !playlist.editable_by(principal) {
        return Err(LibraryError::denied(
            "You do not have permission to modify this playlist.",
        ));
    }
    Ok(playlist)
}

pub fn require_staff(principal: &Principal) -> Result<()> {
    if !principal.is_staff {
        return Err(LibraryError::denied("Administrator access required."));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::*;

    #[tokio::test]
    async fn test_private_song_visible_only_to_owner() {
        let db = setup_db().await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;
        let artist = seed_artist(&db, "Portishead").await;
        let public = seed_song(&db, &alice, artist.id, "Roads", true).await;
        let private = seed_song(&db, &alice, artist.id, "Glory Box", false).await;
        let bobs = seed_song(&db, &bob, artist.id, "Sour Times", false).await;

        let ids =
            |songs: Vec<sqlm::song::Model>| songs.into_iter().map(|s| s.id).collect::<Vec<_>>();

        let all = SongFilter::default();
        let seen_by_alice = ids(list_visible_songs(&db, &alice, &all).await.unwrap());
        assert!(seen_by_alice.contains(&public.id));
        assert!(seen_by_alice.contains(&private.id));
        assert!(!seen_by_alice.contains(&bobs.id));

        let seen_by_bob = ids(list_visible_songs(&db, &bob, &all).await.unwrap());
        assert!(seen_by_bob.contains(&public.id));
        assert!(!seen_by_bob.contains(&private.id));
        assert!(seen_by_bob.contains(&bobs.id));

        // staff get no read bypass
        let staff = seed_staff(&db, "root").await;
        let seen_by_staff = ids(list_visible_songs(&db, &staff, &all).await.unwrap());
        assert_eq!(seen_by_staff, vec![public.id]);
    }

    #[tokio::test]
    async fn test_fetch_checks() {
        let db = setup_db().await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;
        let staff = seed_staff(&db, "root").await;
        let artist = seed_artist(&db, "Portishead").await;
        let private = seed_song(&db, &alice, artist.id, "Glory Box", false).await;

        assert!(visible_song(&db, &alice, private.id).await.is_ok());
        assert!(matches!(
            visible_song(&db, &bob, private.id).await,
            Err(LibraryError::PermissionDenied(_))
        ));
        assert!(matches!(
            visible_song(&db, &bob, 9999).await,
            Err(LibraryError::NotFound { .. })
        ));
        assert!(matches!(
            editable_song(&db, &bob, private.id).await,
            Err(LibraryError::PermissionDenied(_))
        ));
        assert!(editable_song(&db, &staff, private.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_visibility_follows_current_flag() {
        use sea_orm::{ActiveModelTrait, IntoActiveModel, Set};

        let db = setup_db().await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;
        let artist = seed_artist(&db, "Portishead").await;
        let song = seed_song(&db, &alice, artist.id, "Roads", true).await;
        assert!(visible_song(&db, &bob, song.id).await.is_ok());

        let mut am = song.into_active_model();
        am.is_public = Set(false);
        let song = am.update(&db).await.unwrap();
        assert!(visible_song(&db, &bob, song.id).await.is_err());
    }
}

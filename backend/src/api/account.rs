use chrono::Utc;
use mlib_core::blob::{self, BlobStore, Upload};
use mlib_core::error::is_unique_violation;
use mlib_core::form::{ProfileForm, RegisterForm};
use mlib_core::model::{self as sqlm, type_enum::BlobKind, type_enum::ItemType};
use mlib_core::{LibraryError, Principal, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, Set,
};
use serde::Serialize;

use super::stats;

const USERNAME_TAKEN: &str = "This username is already taken.";
const EMAIL_TAKEN: &str = "This email address is already registered.";

pub async fn find_user<C: ConnectionTrait>(db: &C, id: i64) -> Result<sqlm::user::Model> {
    sqlm::user::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(LibraryError::not_found(ItemType::User, id))
}

/// Resolve an authenticated user id into a principal with its current staff flag.
pub async fn principal_for<C: ConnectionTrait>(db: &C, user_id: i64) -> Result<Principal> {
    Ok(Principal::from(&find_user(db, user_id).await?))
}

/// Field-level uniqueness checks; `except` skips the caller's own row.
async fn check_unique<C: ConnectionTrait>(
    db: &C,
    username: Option<&str>,
    email: Option<&str>,
    except: Option<i64>,
) -> Result<()> {
    let others = || {
        let q = sqlm::user::Entity::find();
        match except {
            Some(id) => q.filter(sqlm::user::Column::Id.ne(id)),
            None => q,
        }
    };
    if let Some(username) = username {
        if others()
            .filter(sqlm::user::Column::Username.eq(username))
            .count(db)
            .await?
            > 0
        {
            return Err(LibraryError::validation("username", USERNAME_TAKEN));
        }
    }
    if let Some(email) = email {
        if others()
            .filter(sqlm::user::Column::Email.eq(email))
            .count(db)
            .await?
            > 0
        {
            return Err(LibraryError::validation("email", EMAIL_TAKEN));
        }
    }
    Ok(())
}

/// A concurrent writer may still win between the check and the write.
fn map_unique(e: sea_orm::DbErr) -> LibraryError {
    if is_unique_violation(&e) {
        let msg = e.to_string();
        if msg.contains("email") {
            LibraryError::validation("email", EMAIL_TAKEN)
        } else {
            LibraryError::validation("username", USERNAME_TAKEN)
        }
    } else {
        e.into()
    }
}

pub async fn register(db: &DatabaseConnection, form: RegisterForm) -> Result<sqlm::user::Model> {
    let form = form.clean()?;
    check_unique(db, Some(&form.username), Some(&form.email), None).await?;

    let now = Utc::now();
    let user = sqlm::user::ActiveModel {
        username: Set(form.username),
        email: Set(form.email),
        first_name: Set(form.first_name),
        last_name: Set(form.last_name),
        is_staff: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(map_unique)?;
    tracing::info!("registered user {} ({})", user.username, user.id);
    Ok(user)
}

pub async fn update_profile(
    db: &DatabaseConnection,
    blobs: &dyn BlobStore,
    principal: &Principal,
    form: ProfileForm,
    picture: Option<Upload>,
) -> Result<sqlm::user::Model> {
    let form = form.clean()?;
    if let Some(picture) = &picture {
        blob::validate(BlobKind::Image, "profile_picture", picture)?;
    }
    let user = find_user(db, principal.id).await?;
    check_unique(
        db,
        form.username.as_deref(),
        form.email.as_deref(),
        Some(user.id),
    )
    .await?;

    let mut am = user.into_active_model();
    if let Some(picture) = picture {
        am.profile_picture = Set(Some(
            blob::store(blobs, BlobKind::Image, "profile_picture", picture).await?,
        ));
    }
    if let Some(username) = form.username {
        am.username = Set(username);
    }
    if let Some(email) = form.email {
        am.email = Set(email);
    }
    if let Some(first_name) = form.first_name {
        am.first_name = Set(first_name.trim().to_string());
    }
    if let Some(last_name) = form.last_name {
        am.last_name = Set(last_name.trim().to_string());
    }
    if let Some(bio) = form.bio {
        am.bio = Set(bio);
    }
    if let Some(dob) = form.date_of_birth {
        am.date_of_birth = Set(Some(dob));
    }
    am.updated_at = Set(Utc::now());
    let user = am.update(db).await.map_err(map_unique)?;
    tracing::debug!("user {} updated profile", user.id);
    Ok(user)
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub user: sqlm::user::Model,
    pub full_name: String,
    pub total_uploads: u64,
    pub total_playlists: u64,
    pub total_favorites: u64,
}

pub async fn profile<C: ConnectionTrait>(db: &C, principal: &Principal) -> Result<Profile> {
    let user = find_user(db, principal.id).await?;
    Ok(Profile {
        full_name: user.full_name(),
        total_uploads: stats::total_uploads(db, user.id).await?,
        total_playlists: stats::total_playlists(db, user.id).await?,
        total_favorites: stats::total_favorites(db, user.id).await?,
        user,
    })
}

/// Self or staff. Everything the user owns goes with them.
pub async fn delete_user<C: ConnectionTrait>(db: &C, principal: &Principal, id: i64) -> Result<()> {
    if principal.id != id && !principal.is_staff {
        return Err(LibraryError::denied("You can only delete your own account."));
    }
    let user = find_user(db, id).await?;
    sqlm::user::Entity::delete_by_id(user.id).exec(db).await?;
    tracing::info!("user {} deleted account {} ({})", principal.id, user.id, user.username);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::*;
    use crate::api::{engagement, playlist};
    use mlib_core::form::PlaylistForm;

    fn register_form(username: &str, email: &str) -> RegisterForm {
        RegisterForm {
            username: username.to_string(),
            email: email.to_string(),
            first_name: "Laiba".to_string(),
            last_name: String::new(),
        }
    }

    #[tokio::test]
    async fn test_register_uniqueness() {
        let db = setup_db().await;
        let user = register(&db, register_form(" laiba ", "Laiba@Example.com")).await.unwrap();
        assert_eq!(user.username, "laiba");
        assert_eq!(user.email, "laiba@example.com");
        assert!(!user.is_staff);

        match register(&db, register_form("laiba", "other@example.com")).await {
            Err(LibraryError::Validation { field, message }) => {
                assert_eq!(field, "username");
                assert_eq!(message, USERNAME_TAKEN);
            }
            r => panic!("unexpected {:?}", r),
        }
        match register(&db, register_form("other", "laiba@example.com")).await {
            Err(LibraryError::Validation { field, .. }) => assert_eq!(field, "email"),
            r => panic!("unexpected {:?}", r),
        }
        assert!(register(&db, register_form("x", "no-at-sign")).await.is_err());
    }

    #[tokio::test]
    async fn test_update_profile() {
        let db = setup_db().await;
        let blobs = MemoryBlobStore::default();
        let alice = seed_user(&db, "alice").await;
        seed_user(&db, "bob").await;

        // keeping one's own email is fine
        let user = update_profile(
            &db,
            &blobs,
            &alice,
            ProfileForm {
                email: Some("alice@example.com".to_string()),
                first_name: Some("Alice".to_string()),
                bio: Some("Hi".to_string()),
                ..Default::default()
            },
            Some(image("me.jpg")),
        )
        .await
        .unwrap();
        assert_eq!(user.first_name, "Alice");
        assert_eq!(user.bio, "Hi");
        assert!(user.profile_picture.is_some());

        let taken = update_profile(
            &db,
            &blobs,
            &alice,
            ProfileForm {
                username: Some("bob".to_string()),
                ..Default::default()
            },
            None,
        )
        .await;
        assert!(matches!(
            taken,
            Err(LibraryError::Validation { ref field, .. }) if field == "username"
        ));

        let long_bio = update_profile(
            &db,
            &blobs,
            &alice,
            ProfileForm {
                bio: Some("b".repeat(501)),
                ..Default::default()
            },
            None,
        )
        .await;
        assert!(matches!(
            long_bio,
            Err(LibraryError::Validation { ref field, .. }) if field == "bio"
        ));
    }

    #[tokio::test]
    async fn test_profile_counters() {
        let db = setup_db().await;
        let blobs = MemoryBlobStore::default();
        let alice = seed_user(&db, "alice").await;
        let artist = seed_artist(&db, "Portishead").await;
        let song = seed_song(&db, &alice, artist.id, "Roads", true).await;
        engagement::toggle_favorite(&db, &alice, song.id).await.unwrap();
        playlist::create_playlist(
            &db,
            &blobs,
            &alice,
            PlaylistForm {
                name: "Mine".to_string(),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

        let p = profile(&db, &alice).await.unwrap();
        assert_eq!(p.full_name, "alice");
        assert_eq!(p.total_uploads, 1);
        assert_eq!(p.total_playlists, 1);
        assert_eq!(p.total_favorites, 1);
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let db = setup_db().await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;
        let artist = seed_artist(&db, "Portishead").await;
        let song = seed_song(&db, &alice, artist.id, "Roads", true).await;
        engagement::toggle_favorite(&db, &bob, song.id).await.unwrap();
        engagement::record_play(&db, &bob, song.id, Default::default()).await.unwrap();
        engagement::add_comment(&db, &bob, song.id, "nice one").await.unwrap();

        assert!(matches!(
            delete_user(&db, &bob, alice.id).await,
            Err(LibraryError::PermissionDenied(_))
        ));
        delete_user(&db, &alice, alice.id).await.unwrap();

        assert!(sqlm::song::Entity::find_by_id(song.id).one(&db).await.unwrap().is_none());
        assert_eq!(sqlm::favorite::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(sqlm::play_history::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(sqlm::comment::Entity::find().count(&db).await.unwrap(), 0);
        assert!(principal_for(&db, bob.id).await.is_ok());
        assert!(matches!(
            principal_for(&db, alice.id).await,
            Err(LibraryError::NotFound { .. })
        ));
    }
}

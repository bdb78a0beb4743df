//! Aggregates derived from the engagement tables, always computed live.

use mlib_core::model as sqlm;
use mlib_core::{Principal, Result};
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::Serialize;
use std::collections::HashMap;

pub const USER_TOP_SONGS: u64 = 10;

/// Mean of all ratings for the song; `None` when nobody rated it.
pub async fn average_rating<C: ConnectionTrait>(db: &C, song_id: i64) -> Result<Option<f64>> {
    let avg: Option<Option<f64>> = sqlm::rating::Entity::find()
        .select_only()
        .column_as(
            SimpleExpr::from(Func::avg(Expr::col((
                sqlm::rating::Entity,
                sqlm::rating::Column::Value,
            )))),
            "average",
        )
        .filter(sqlm::rating::Column::SongId.eq(song_id))
        .into_tuple()
        .one(db)
        .await?;
    Ok(avg.flatten())
}

pub async fn rating_count<C: ConnectionTrait>(db: &C, song_id: i64) -> Result<u64> {
    Ok(sqlm::rating::Entity::find()
        .filter(sqlm::rating::Column::SongId.eq(song_id))
        .count(db)
        .await?)
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayedSong {
    #[serde(flatten)]
    pub song: sqlm::song::Model,
    pub plays: i64,
}

/// The principal's history grouped by song: most plays first, ties broken by
/// the latest play.
pub async fn most_played<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
    limit: u64,
) -> Result<Vec<PlayedSong>> {
    let plays = Expr::col((sqlm::play_history::Entity, sqlm::play_history::Column::Id)).count();
    let last_played =
        Expr::col((sqlm::play_history::Entity, sqlm::play_history::Column::PlayedAt)).max();

    let rows: Vec<(i64, i64)> = sqlm::play_history::Entity::find()
        .select_only()
        .column(sqlm::play_history::Column::SongId)
        .column_as(plays.clone(), "plays")
        .inner_join(sqlm::song::Entity)
        .filter(sqlm::play_history::Column::UserId.eq(principal.id))
        .filter(sqlm::song::visible_condition(principal))
        .group_by(sqlm::play_history::Column::SongId)
        .order_by_desc(plays)
        .order_by_desc(last_played)
        .limit(limit)
        .into_tuple()
        .all(db)
        .await?;

    let mut songs: HashMap<i64, sqlm::song::Model> = sqlm::song::Entity::find()
        .filter(sqlm::song::Column::Id.is_in(rows.iter().map(|(id, _)| *id)))
        .all(db)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();

    Ok(rows
        .into_iter()
        .filter_map(|(id, plays)| songs.remove(&id).map(|song| PlayedSong { song, plays }))
        .collect())
}

pub async fn total_uploads<C: ConnectionTrait>(db: &C, user_id: i64) -> Result<u64> {
    Ok(sqlm::song::Entity::find()
        .filter(sqlm::song::Column::UploadedBy.eq(user_id))
        .count(db)
        .await?)
}

pub async fn total_playlists<C: ConnectionTrait>(db: &C, user_id: i64) -> Result<u64> {
    Ok(sqlm::playlist::Entity::find()
        .filter(sqlm::playlist::Column::UserId.eq(user_id))
        .count(db)
        .await?)
}

pub async fn total_favorites<C: ConnectionTrait>(db: &C, user_id: i64) -> Result<u64> {
    Ok(sqlm::favorite::Entity::find()
        .filter(sqlm::favorite::Column::UserId.eq(user_id))
        .count(db)
        .await?)
}

pub async fn total_plays<C: ConnectionTrait>(db: &C, user_id: i64) -> Result<u64> {
    Ok(sqlm::play_history::Entity::find()
        .filter(sqlm::play_history::Column::UserId.eq(user_id))
        .count(db)
        .await?)
}

#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub total_uploads: u64,
    pub total_playlists: u64,
    pub total_favorites: u64,
    pub total_plays: u64,
    pub most_played: Vec<PlayedSong>,
}

pub async fn user_stats<C: ConnectionTrait>(db: &C, principal: &Principal) -> Result<UserStats> {
    Ok(UserStats {
        total_uploads: total_uploads(db, principal.id).await?,
        total_playlists: total_playlists(db, principal.id).await?,
        total_favorites: total_favorites(db, principal.id).await?,
        total_plays: total_plays(db, principal.id).await?,
        most_played: most_played(db, principal, USER_TOP_SONGS).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::engagement::{record_play, set_rating, toggle_favorite};
    use crate::api::testing::*;
    use chrono::{Duration, Utc};
    use sea_orm::{ActiveModelTrait, Set};

    async fn play_at(
        db: &sea_orm::DatabaseConnection,
        user: &Principal,
        song_id: i64,
        minutes_ago: i64,
    ) {
        sqlm::play_history::ActiveModel {
            user_id: Set(user.id),
            song_id: Set(song_id),
            played_at: Set(Utc::now() - Duration::minutes(minutes_ago)),
            play_duration: Set(None),
            completed: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_average_rating() {
        let db = setup_db().await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;
        let artist = seed_artist(&db, "Portishead").await;
        let song = seed_song(&db, &alice, artist.id, "Roads", true).await;

        assert_eq!(average_rating(&db, song.id).await.unwrap(), None);
        set_rating(&db, &alice, song.id, 2).await.unwrap();
        set_rating(&db, &bob, song.id, 5).await.unwrap();
        assert_eq!(average_rating(&db, song.id).await.unwrap(), Some(3.5));
        assert_eq!(rating_count(&db, song.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_most_played_order() {
        let db = setup_db().await;
        let alice = seed_user(&db, "alice").await;
        let artist = seed_artist(&db, "Portishead").await;
        let s1 = seed_song(&db, &alice, artist.id, "Roads", true).await;
        let s2 = seed_song(&db, &alice, artist.id, "Glory Box", true).await;
        let s3 = seed_song(&db, &alice, artist.id, "Sour Times", true).await;

        for _ in 0..3 {
            record_play(&db, &alice, s1.id, Default::default()).await.unwrap();
        }
        for _ in 0..5 {
            record_play(&db, &alice, s2.id, Default::default()).await.unwrap();
        }
        record_play(&db, &alice, s3.id, Default::default()).await.unwrap();

        let top = most_played(&db, &alice, 10).await.unwrap();
        let order: Vec<_> = top.iter().map(|p| (p.song.id, p.plays)).collect();
        assert_eq!(order, vec![(s2.id, 5), (s1.id, 3), (s3.id, 1)]);

        let top = most_played(&db, &alice, 2).await.unwrap();
        assert_eq!(top.len(), 2);
    }

    #[tokio::test]
    async fn test_most_played_tie_breaks_on_latest_play() {
        let db = setup_db().await;
        let alice = seed_user(&db, "alice").await;
        let artist = seed_artist(&db, "Portishead").await;
        let old = seed_song(&db, &alice, artist.id, "Roads", true).await;
        let fresh = seed_song(&db, &alice, artist.id, "Glory Box", true).await;

        play_at(&db, &alice, old.id, 60).await;
        play_at(&db, &alice, old.id, 50).await;
        play_at(&db, &alice, fresh.id, 40).await;
        play_at(&db, &alice, fresh.id, 1).await;

        let top = most_played(&db, &alice, 10).await.unwrap();
        assert_eq!(top[0].song.id, fresh.id);
        assert_eq!(top[1].song.id, old.id);
    }

    #[tokio::test]
    async fn test_user_stats_are_live() {
        let db = setup_db().await;
        let alice = seed_user(&db, "alice").await;
        let artist = seed_artist(&db, "Portishead").await;
        let song = seed_song(&db, &alice, artist.id, "Roads", true).await;
        seed_song(&db, &alice, artist.id, "Glory Box", false).await;
        toggle_favorite(&db, &alice, song.id).await.unwrap();
        record_play(&db, &alice, song.id, Default::default()).await.unwrap();

        let stats = user_stats(&db, &alice).await.unwrap();
        assert_eq!(stats.total_uploads, 2);
        assert_eq!(stats.total_favorites, 1);
        assert_eq!(stats.total_playlists, 0);
        assert_eq!(stats.total_plays, 1);
        assert_eq!(stats.most_played.len(), 1);

        toggle_favorite(&db, &alice, song.id).await.unwrap();
        assert_eq!(total_favorites(&db, alice.id).await.unwrap(), 0);
    }
}

use crate::identity::Principal;
use sea_orm::entity::prelude::*;
use sea_orm::Condition;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "song")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub title: String,
    pub artist_id: i64,
    #[sea_orm(nullable)]
    pub album_id: Option<i64>,
    #[sea_orm(nullable)]
    pub genre_id: Option<i64>,
    /// blob store reference
    pub audio_file: String,
    /// seconds
    #[serde(default)]
    pub duration: Option<i64>,
    #[sea_orm(column_type = "Text")]
    #[serde(default)]
    pub lyrics: String,
    #[serde(default)]
    pub release_year: Option<i32>,
    pub uploaded_by: i64,
    pub upload_date: DateTimeUtc,
    #[serde(default)]
    pub play_count: i64,
    #[serde(default)]
    pub download_count: i64,
    pub is_public: bool,
    #[serde(default)]
    pub is_featured: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::artist::Entity",
        from = "Column::ArtistId",
        to = "super::artist::Column::Id",
        on_delete = "Cascade"
    )]
    Artist,
    #[sea_orm(
        belongs_to = "super::album::Entity",
        from = "Column::AlbumId",
        to = "super::album::Column::Id",
        on_delete = "SetNull"
    )]
    Album,
    #[sea_orm(
        belongs_to = "super::genre::Entity",
        from = "Column::GenreId",
        to = "super::genre::Column::Id",
        on_delete = "SetNull"
    )]
    Genre,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UploadedBy",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Uploader,
    #[sea_orm(has_many = "super::favorite::Entity")]
    Favorite,
    #[sea_orm(has_many = "super::rating::Entity")]
    Rating,
    #[sea_orm(has_many = "super::comment::Entity")]
    Comment,
    #[sea_orm(has_many = "super::play_history::Entity")]
    PlayHistory,
}

impl Related<super::artist::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Artist.def()
    }
}

impl Related<super::album::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Album.def()
    }
}

impl Related<super::genre::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Genre.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Uploader.def()
    }
}

impl Related<super::favorite::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Favorite.def()
    }
}

impl Related<super::rating::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rating.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comment.def()
    }
}

impl Related<super::play_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PlayHistory.def()
    }
}

impl Related<super::playlist::Entity> for Entity {
    fn to() -> RelationDef {
        super::playlist_song::Relation::Playlist.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::playlist_song::Relation::Song.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn visible_to(&self, principal: &Principal) -> bool {
        self.is_public || self.uploaded_by == principal.id
    }

    pub fn editable_by(&self, principal: &Principal) -> bool {
        self.uploaded_by == principal.id || principal.is_staff
    }

    /// "m:ss"
    pub fn duration_formatted(&self) -> String {
        let total = self.duration.unwrap_or(0).max(0);
        format!("{}:{:02}", total / 60, total % 60)
    }
}

/// Rows a principal may see: public ones plus everything they uploaded.
pub fn visible_condition(principal: &Principal) -> Condition {
    Condition::any()
        .add(Column::IsPublic.eq(true))
        .add(Column::UploadedBy.eq(principal.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(uploaded_by: i64, is_public: bool) -> Model {
        Model {
            id: 1,
            title: "Reckoner".to_string(),
            artist_id: 1,
            album_id: None,
            genre_id: None,
            audio_file: "audio/reckoner.mp3".to_string(),
            duration: Some(290),
            lyrics: String::new(),
            release_year: Some(2007),
            uploaded_by,
            upload_date: chrono::Utc::now(),
            play_count: 0,
            download_count: 0,
            is_public,
            is_featured: false,
        }
    }

    #[test]
    fn test_visibility() {
        let owner = Principal::new(7);
        let other = Principal::new(8);
        assert!(song(7, false).visible_to(&owner));
        assert!(!song(7, false).visible_to(&other));
        assert!(song(7, true).visible_to(&other));
    }

    #[test]
    fn test_editable() {
        let staff = Principal::staff(9);
        assert!(song(7, true).editable_by(&Principal::new(7)));
        assert!(!song(7, true).editable_by(&Principal::new(8)));
        assert!(song(7, false).editable_by(&staff));
    }

    #[test]
    fn test_duration_formatted() {
        assert_eq!(song(1, true).duration_formatted(), "4:50");
        let mut s = song(1, true);
        s.duration = None;
        assert_eq!(s.duration_formatted(), "0:00");
    }
}

use crate::identity::Principal;
use sea_orm::entity::prelude::*;
use sea_orm::Condition;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "playlist")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub user_id: i64,
    #[serde(default)]
    pub cover_image: Option<String>,
    pub is_public: bool,
    pub is_collaborative: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(has_many = "super::playlist_song::Entity")]
    PlaylistSong,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::playlist_song::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PlaylistSong.def()
    }
}

impl Related<super::song::Entity> for Entity {
    fn to() -> RelationDef {
        super::playlist_song::Relation::Song.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::playlist_song::Relation::Playlist.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn visible_to(&self, principal: &Principal) -> bool {
        self.is_public || self.user_id == principal.id
    }

    pub fn editable_by(&self, principal: &Principal) -> bool {
        self.user_id == principal.id || principal.is_staff
    }

    /// Owners always may add songs; others only to a visible collaborative playlist.
    pub fn accepts_songs_from(&self, principal: &Principal) -> bool {
        self.user_id == principal.id || (self.is_collaborative && self.visible_to(principal))
    }
}

pub fn visible_condition(principal: &Principal) -> Condition {
    Condition::any()
        .add(Column::IsPublic.eq(true))
        .add(Column::UserId.eq(principal.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist(is_public: bool, is_collaborative: bool) -> Model {
        Model {
            id: 1,
            name: "Road trip".to_string(),
            description: String::new(),
            user_id: 3,
            cover_image: None,
            is_public,
            is_collaborative,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_collaborative_membership() {
        let guest = Principal::new(4);
        assert!(!playlist(true, false).accepts_songs_from(&guest));
        assert!(playlist(true, true).accepts_songs_from(&guest));
        // private collaborative playlists stay closed to others
        assert!(!playlist(false, true).accepts_songs_from(&guest));
        assert!(playlist(false, false).accepts_songs_from(&Principal::new(3)));
    }
}

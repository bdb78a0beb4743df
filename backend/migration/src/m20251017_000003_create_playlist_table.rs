use sea_orm_migration::prelude::*;

use crate::{unique_index, unique_index_name};
use mlib_core::model::{playlist, playlist_song, song, user};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(playlist::Entity)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(playlist::Column::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(playlist::Column::Name).string().not_null())
                    .col(
                        ColumnDef::new(playlist::Column::Description)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(playlist::Column::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(playlist::Column::CoverImage).string())
                    .col(
                        ColumnDef::new(playlist::Column::IsPublic)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(playlist::Column::IsCollaborative)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(playlist::Column::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(playlist::Column::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-playlist-user_id")
                            .from(playlist::Entity, playlist::Column::UserId)
                            .to(user::Entity, user::Column::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-playlist-user_id")
                    .table(playlist::Entity)
                    .col(playlist::Column::UserId)
                    .col(playlist::Column::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(playlist_song::Entity)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(playlist_song::Column::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(playlist_song::Column::PlaylistId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(playlist_song::Column::SongId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(playlist_song::Column::AddedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-playlist_song-playlist_id")
                            .from(playlist_song::Entity, playlist_song::Column::PlaylistId)
                            .to(playlist::Entity, playlist::Column::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-playlist_song-song_id")
                            .from(playlist_song::Entity, playlist_song::Column::SongId)
                            .to(song::Entity, song::Column::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(unique_index!(
                playlist_song::Entity,
                playlist_song::Column::PlaylistId,
                playlist_song::Column::SongId
            ))
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(playlist_song::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(playlist::Entity).to_owned())
            .await
    }
}

use sea_orm_migration::prelude::*;

use crate::{unique_index, unique_index_name};
use mlib_core::model::{comment, favorite, play_history, rating, song, user};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// `user_id` and `song_id` columns with their cascading foreign keys.
fn user_song_refs<T, U, S>(
    table: &mut TableCreateStatement,
    entity: T,
    name: &str,
    user_col: U,
    song_col: S,
) where
    T: IntoTableRef + Copy + 'static,
    U: IntoIden + Copy + 'static,
    S: IntoIden + Copy + 'static,
{
    table
        .col(ColumnDef::new(user_col).big_integer().not_null())
        .col(ColumnDef::new(song_col).big_integer().not_null())
        .foreign_key(
            ForeignKey::create()
                .name(format!("fk-{}-user_id", name))
                .from(entity, user_col)
                .to(user::Entity, user::Column::Id)
                .on_delete(ForeignKeyAction::Cascade)
                .on_update(ForeignKeyAction::Cascade),
        )
        .foreign_key(
            ForeignKey::create()
                .name(format!("fk-{}-song_id", name))
                .from(entity, song_col)
                .to(song::Entity, song::Column::Id)
                .on_delete(ForeignKeyAction::Cascade)
                .on_update(ForeignKeyAction::Cascade),
        );
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // favorite
        let mut table = Table::create();
        table.table(favorite::Entity).if_not_exists().col(
            ColumnDef::new(favorite::Column::Id)
                .big_integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        );
        user_song_refs(
            &mut table,
            favorite::Entity,
            "favorite",
            favorite::Column::UserId,
            favorite::Column::SongId,
        );
        table.col(
            ColumnDef::new(favorite::Column::AddedAt)
                .timestamp_with_time_zone()
                .not_null()
                .default(Expr::current_timestamp()),
        );
        manager.create_table(table.to_owned()).await?;
        manager
            .create_index(unique_index!(
                favorite::Entity,
                favorite::Column::UserId,
                favorite::Column::SongId
            ))
            .await?;

        // rating
        let mut table = Table::create();
        table.table(rating::Entity).if_not_exists().col(
            ColumnDef::new(rating::Column::Id)
                .big_integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        );
        user_song_refs(
            &mut table,
            rating::Entity,
            "rating",
            rating::Column::UserId,
            rating::Column::SongId,
        );
        table
            .col(
                ColumnDef::new(rating::Column::Value)
                    .integer()
                    .not_null()
                    .check(Expr::col(rating::Column::Value).between(1, 5)),
            )
            .col(
                ColumnDef::new(rating::Column::CreatedAt)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .col(
                ColumnDef::new(rating::Column::UpdatedAt)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            );
        manager.create_table(table.to_owned()).await?;
        manager
            .create_index(unique_index!(
                rating::Entity,
                rating::Column::UserId,
                rating::Column::SongId
            ))
            .await?;

        // comment
        let mut table = Table::create();
        table.table(comment::Entity).if_not_exists().col(
            ColumnDef::new(comment::Column::Id)
                .big_integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        );
        user_song_refs(
            &mut table,
            comment::Entity,
            "comment",
            comment::Column::UserId,
            comment::Column::SongId,
        );
        table
            .col(ColumnDef::new(comment::Column::Text).text().not_null())
            .col(
                ColumnDef::new(comment::Column::CreatedAt)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .col(
                ColumnDef::new(comment::Column::UpdatedAt)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .col(
                ColumnDef::new(comment::Column::IsEdited)
                    .boolean()
                    .not_null()
                    .default(false),
            );
        manager.create_table(table.to_owned()).await?;
        manager
            .create_index(
                Index::create()
                    .name("idx-comment-song_id")
                    .table(comment::Entity)
                    .col(comment::Column::SongId)
                    .col(comment::Column::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // play_history, one row per play so no uniqueness here
        let mut table = Table::create();
        table.table(play_history::Entity).if_not_exists().col(
            ColumnDef::new(play_history::Column::Id)
                .big_integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        );
        user_song_refs(
            &mut table,
            play_history::Entity,
            "play_history",
            play_history::Column::UserId,
            play_history::Column::SongId,
        );
        table
            .col(
                ColumnDef::new(play_history::Column::PlayedAt)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .col(ColumnDef::new(play_history::Column::PlayDuration).big_integer())
            .col(
                ColumnDef::new(play_history::Column::Completed)
                    .boolean()
                    .not_null()
                    .default(false),
            );
        manager.create_table(table.to_owned()).await?;
        for (name, col) in [
            ("idx-play_history-user_id", play_history::Column::UserId),
            ("idx-play_history-song_id", play_history::Column::SongId),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(play_history::Entity)
                        .col(col)
                        .col(play_history::Column::PlayedAt)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(play_history::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(comment::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(rating::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(favorite::Entity).to_owned())
            .await
    }
}

use sea_orm_migration::prelude::*;

use crate::{unique_index, unique_index_name};
use mlib_core::model::{album, artist, genre, song, user};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(genre::Entity)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(genre::Column::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(genre::Column::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(genre::Column::Description)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(genre::Column::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(genre::Column::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(artist::Entity)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(artist::Column::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(artist::Column::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(artist::Column::Bio)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(artist::Column::Image).string())
                    .col(
                        ColumnDef::new(artist::Column::Country)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(artist::Column::Website)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(artist::Column::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(artist::Column::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(album::Entity)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(album::Column::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(album::Column::Title).string().not_null())
                    .col(
                        ColumnDef::new(album::Column::ArtistId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(album::Column::CoverImage).string())
                    .col(ColumnDef::new(album::Column::ReleaseDate).date())
                    .col(
                        ColumnDef::new(album::Column::Description)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(album::Column::RecordLabel)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(album::Column::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(album::Column::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-album-artist_id")
                            .from(album::Entity, album::Column::ArtistId)
                            .to(artist::Entity, artist::Column::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(unique_index!(
                album::Entity,
                album::Column::Title,
                album::Column::ArtistId
            ))
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(song::Entity)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(song::Column::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(song::Column::Title).string().not_null())
                    .col(
                        ColumnDef::new(song::Column::ArtistId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(song::Column::AlbumId).big_integer())
                    .col(ColumnDef::new(song::Column::GenreId).big_integer())
                    .col(ColumnDef::new(song::Column::AudioFile).string().not_null())
                    .col(ColumnDef::new(song::Column::Duration).big_integer())
                    .col(
                        ColumnDef::new(song::Column::Lyrics)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(song::Column::ReleaseYear).integer())
                    .col(
                        ColumnDef::new(song::Column::UploadedBy)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(song::Column::UploadDate)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(song::Column::PlayCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(song::Column::DownloadCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(song::Column::IsPublic)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(song::Column::IsFeatured)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-song-artist_id")
                            .from(song::Entity, song::Column::ArtistId)
                            .to(artist::Entity, artist::Column::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-song-album_id")
                            .from(song::Entity, song::Column::AlbumId)
                            .to(album::Entity, album::Column::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-song-genre_id")
                            .from(song::Entity, song::Column::GenreId)
                            .to(genre::Entity, genre::Column::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-song-uploaded_by")
                            .from(song::Entity, song::Column::UploadedBy)
                            .to(user::Entity, user::Column::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        for (name, cols) in [
            ("idx-song-title", vec![song::Column::Title]),
            ("idx-song-artist_id", vec![song::Column::ArtistId]),
            ("idx-song-genre_id", vec![song::Column::GenreId]),
            ("idx-song-play_count", vec![song::Column::PlayCount]),
            ("idx-song-upload_date", vec![song::Column::UploadDate]),
        ] {
            let mut index = Index::create();
            index.name(name).table(song::Entity);
            for c in cols {
                index.col(c);
            }
            manager.create_index(index.to_owned()).await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name(unique_index_name!(
                        album::Entity,
                        album::Column::Title,
                        album::Column::ArtistId
                    ))
                    .table(album::Entity)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(song::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(album::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(artist::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(genre::Entity).to_owned())
            .await
    }
}

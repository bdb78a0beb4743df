pub use sea_orm_migration::{prelude::*, Migration, MigrationStatus};

mod m20251017_000001_create_user_table;
mod m20251017_000002_create_catalog_table;
mod m20251017_000003_create_playlist_table;
mod m20251017_000004_create_engagement_table;

pub struct Migrator;

#[macro_export]
macro_rules! unique_index_name {
    ($entity:path, $($column:path),+) => {
        concat!(
            stringify!($entity), "_",
            $(stringify!($column), "_"),+
        ).trim_end_matches('_')
    };
}

#[macro_export]
macro_rules! unique_index {
    ($entity:path, $($column:path),+) => {
        sea_query::Index::create()
            .name(unique_index_name!($entity, $($column),+))
            .table($entity)
            $(.col($column))+
            .unique()
            .to_owned()
    };
}

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        log::debug!("collecting library migrations");
        vec![
            Box::new(m20251017_000001_create_user_table::Migration),
            Box::new(m20251017_000002_create_catalog_table::Migration),
            Box::new(m20251017_000003_create_playlist_table::Migration),
            Box::new(m20251017_000004_create_engagement_table::Migration),
        ]
    }
}

use mlib_core::model as sqlm;
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::Order;
use strum_macros::{AsRefStr, EnumString};

/// Allowed song orderings, by their wire names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, AsRefStr)]
pub enum SongSort {
    #[default]
    #[strum(serialize = "-upload_date")]
    Newest,
    #[strum(serialize = "upload_date")]
    Oldest,
    #[strum(serialize = "title")]
    Title,
    #[strum(serialize = "-title")]
    TitleDesc,
    #[strum(serialize = "-play_count")]
    MostPlayed,
    #[strum(serialize = "artist__name")]
    ArtistName,
}

impl SongSort {
    /// Unknown or missing keys fall back to newest-first.
    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.trim().parse().ok()).unwrap_or_default()
    }

    pub fn needs_artist_join(&self) -> bool {
        matches!(self, SongSort::ArtistName)
    }
}

pub fn song_sort_col(sort: SongSort) -> (SimpleExpr, Order) {
    let song_col =
        |c: sqlm::song::Column| -> SimpleExpr { Expr::col((sqlm::song::Entity, c)).into() };
    match sort {
        SongSort::Newest => (song_col(sqlm::song::Column::UploadDate), Order::Desc),
        SongSort::Oldest => (song_col(sqlm::song::Column::UploadDate), Order::Asc),
        SongSort::Title => (song_col(sqlm::song::Column::Title), Order::Asc),
        SongSort::TitleDesc => (song_col(sqlm::song::Column::Title), Order::Desc),
        SongSort::MostPlayed => (song_col(sqlm::song::Column::PlayCount), Order::Desc),
        SongSort::ArtistName => (
            Expr::col((sqlm::artist::Entity, sqlm::artist::Column::Name)).into(),
            Order::Asc,
        ),
    }
}

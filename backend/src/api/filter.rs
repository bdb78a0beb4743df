use mlib_core::model as sqlm;
use sea_orm::sea_query::{Expr, LikeExpr, SimpleExpr};
use sea_orm::{ColumnTrait, Condition};

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Substring match with `LIKE`, case-insensitive for ASCII on SQLite.
pub fn contains<C>(col: C, s: &str) -> SimpleExpr
where
    C: ColumnTrait,
{
    let pattern = format!("%{}%", escape_like(s));
    Expr::col((col.entity_name(), col)).like(LikeExpr::new(pattern).escape('\\'))
}

/// Optional catalog filters on a song listing; all present ones must hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SongFilter {
    pub genre: Option<i64>,
    pub artist: Option<i64>,
    pub album: Option<i64>,
}

impl SongFilter {
    /// Raw query values that are not ids are ignored.
    pub fn parse(genre: Option<&str>, artist: Option<&str>, album: Option<&str>) -> Self {
        let id = |s: Option<&str>| s.and_then(|s| s.trim().parse::<i64>().ok());
        Self {
            genre: id(genre),
            artist: id(artist),
            album: id(album),
        }
    }

    pub fn condition(&self) -> Condition {
        let mut cond = Condition::all();
        if let Some(id) = self.genre {
            cond = cond.add(sqlm::song::Column::GenreId.eq(id));
        }
        if let Some(id) = self.artist {
            cond = cond.add(sqlm::song::Column::ArtistId.eq(id));
        }
        if let Some(id) = self.album {
            cond = cond.add(sqlm::song::Column::AlbumId.eq(id));
        }
        cond
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter() {
        let f = SongFilter::parse(Some("3"), Some("x"), None);
        assert_eq!(
            f,
            SongFilter {
                genre: Some(3),
                artist: None,
                album: None
            }
        );
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%_a\\b"), "100\\%\\_a\\\\b");
        assert_eq!(escape_like("radio"), "radio");
    }
}

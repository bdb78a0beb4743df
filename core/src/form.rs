//! Request forms and their cleaning rules.
//!
//! Every `clean` runs before anything is written, so a rejected form never
//! touches the store.

use crate::error::{LibraryError, Result};
use crate::model::{comment, rating};
use chrono::NaiveDate;
use serde::Deserialize;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_NAME_LEN: usize = 200;
pub const MAX_USERNAME_LEN: usize = 150;
pub const MAX_BIO_LEN: usize = 500;
pub const MIN_RELEASE_YEAR: i32 = 1900;
pub const MAX_RELEASE_YEAR: i32 = 2100;

fn default_true() -> bool {
    true
}

/// Tells an explicit `null` (`Some(None)`) apart from an absent field (`None`).
fn nullable<'de, D, T>(de: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Trim and bound a required single-line field.
pub fn clean_required(field: &str, value: &str, max: usize) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(LibraryError::validation(field, "This field is required."));
    }
    if value.chars().count() > max {
        return Err(LibraryError::validation(
            field,
            format!("Ensure this value has at most {} characters.", max),
        ));
    }
    Ok(value.to_string())
}

/// Trimmed, `None` when blank.
pub fn clean_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn clean_rating(value: i32) -> Result<i32> {
    if !(rating::MIN_VALUE..=rating::MAX_VALUE).contains(&value) {
        return Err(LibraryError::validation(
            "rating",
            format!(
                "Rating must be between {} and {}.",
                rating::MIN_VALUE,
                rating::MAX_VALUE
            ),
        ));
    }
    Ok(value)
}

pub fn clean_comment(text: &str) -> Result<String> {
    let text = text.trim();
    let len = text.chars().count();
    if len < comment::MIN_LEN {
        return Err(LibraryError::validation(
            "text",
            "Comment must be at least 2 characters long.",
        ));
    }
    if len > comment::MAX_LEN {
        return Err(LibraryError::validation(
            "text",
            "Comment cannot exceed 1000 characters.",
        ));
    }
    Ok(text.to_string())
}

pub fn clean_bio(bio: &str) -> Result<String> {
    if bio.chars().count() > MAX_BIO_LEN {
        return Err(LibraryError::validation(
            "bio",
            "Bio cannot exceed 500 characters.",
        ));
    }
    Ok(bio.to_string())
}

pub fn clean_email(email: &str) -> Result<String> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    };
    if !valid {
        return Err(LibraryError::validation(
            "email",
            "Enter a valid email address.",
        ));
    }
    Ok(email.to_lowercase())
}

pub fn clean_release_year(year: Option<i32>) -> Result<Option<i32>> {
    match year {
        Some(y) if !(MIN_RELEASE_YEAR..=MAX_RELEASE_YEAR).contains(&y) => {
            Err(LibraryError::validation(
                "release_year",
                format!(
                    "Release year must be between {} and {}.",
                    MIN_RELEASE_YEAR, MAX_RELEASE_YEAR
                ),
            ))
        }
        _ => Ok(year),
    }
}

pub fn clean_duration(field: &str, secs: Option<i64>) -> Result<Option<i64>> {
    match secs {
        Some(s) if s < 0 => Err(LibraryError::validation(
            field,
            "Duration cannot be negative.",
        )),
        _ => Ok(secs),
    }
}

/// Song metadata sent along with an upload.
///
/// The catalog side accepts either an existing id or a new name; a name is
/// resolved with get-or-create.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SongForm {
    pub title: String,
    #[serde(default)]
    pub artist_id: Option<i64>,
    #[serde(default)]
    pub artist_name: Option<String>,
    #[serde(default)]
    pub album_id: Option<i64>,
    #[serde(default)]
    pub album_title: Option<String>,
    #[serde(default)]
    pub genre_id: Option<i64>,
    #[serde(default)]
    pub genre_name: Option<String>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub lyrics: String,
    #[serde(default)]
    pub release_year: Option<i32>,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default)]
    pub is_featured: bool,
}

impl SongForm {
    pub fn clean(mut self) -> Result<Self> {
        self.title = clean_required("title", &self.title, MAX_TITLE_LEN)?;
        self.artist_name = clean_optional(self.artist_name.as_deref());
        self.album_title = clean_optional(self.album_title.as_deref());
        self.genre_name = clean_optional(self.genre_name.as_deref());
        if self.artist_id.is_none() && self.artist_name.is_none() {
            return Err(LibraryError::validation(
                "artist",
                "Please select an artist or enter a new artist name.",
            ));
        }
        for (field, name) in [
            ("artist_name", &self.artist_name),
            ("album_title", &self.album_title),
            ("genre_name", &self.genre_name),
        ] {
            if let Some(name) = name {
                clean_required(field, name, MAX_NAME_LEN)?;
            }
        }
        self.duration = clean_duration("duration", self.duration)?;
        self.release_year = clean_release_year(self.release_year)?;
        Ok(self)
    }
}

/// Partial edit of an existing song. Absent fields are left untouched; a
/// `null` album or genre clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SongUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub album_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub genre_id: Option<Option<i64>>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub lyrics: Option<String>,
    #[serde(default)]
    pub release_year: Option<i32>,
    #[serde(default)]
    pub is_public: Option<bool>,
    #[serde(default)]
    pub is_featured: Option<bool>,
}

impl SongUpdate {
    pub fn clean(mut self) -> Result<Self> {
        if let Some(title) = &self.title {
            self.title = Some(clean_required("title", title, MAX_TITLE_LEN)?);
        }
        self.duration = clean_duration("duration", self.duration)?;
        self.release_year = clean_release_year(self.release_year)?;
        Ok(self)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaylistForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_collaborative: bool,
}

impl PlaylistForm {
    pub fn clean(mut self) -> Result<Self> {
        self.name = clean_required("name", &self.name, MAX_NAME_LEN)?;
        self.description = self.description.trim().to_string();
        Ok(self)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl RegisterForm {
    pub fn clean(mut self) -> Result<Self> {
        self.username = clean_required("username", &self.username, MAX_USERNAME_LEN)?;
        self.email = clean_email(&self.email)?;
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        Ok(self)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
}

impl ProfileForm {
    pub fn clean(mut self) -> Result<Self> {
        if let Some(username) = &self.username {
            self.username = Some(clean_required(
                "username",
                username,
                MAX_USERNAME_LEN,
            )?);
        }
        if let Some(email) = &self.email {
            self.email = Some(clean_email(email)?);
        }
        if let Some(bio) = &self.bio {
            self.bio = Some(clean_bio(bio)?);
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayForm {
    #[serde(default)]
    pub play_duration: Option<i64>,
    #[serde(default)]
    pub completed: bool,
}

impl PlayForm {
    pub fn clean(mut self) -> Result<Self> {
        self.play_duration = clean_duration("play_duration", self.play_duration)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: LibraryError) -> String {
        match err {
            LibraryError::Validation { field, .. } => field,
            e => panic!("Expected validation error, got {e:?}"),
        }
    }

    #[test]
    fn test_clean_rating() {
        assert_eq!(clean_rating(1).unwrap(), 1);
        assert_eq!(clean_rating(5).unwrap(), 5);
        assert_eq!(field_of(clean_rating(0).unwrap_err()), "rating");
        assert!(clean_rating(6).is_err());
    }

    #[test]
    fn test_clean_comment() {
        assert_eq!(clean_comment("  nice  ").unwrap(), "nice");
        assert!(clean_comment("  a ").is_err());
        assert!(clean_comment(&"x".repeat(1000)).is_ok());
        assert!(clean_comment(&"x".repeat(1001)).is_err());
    }

    #[test]
    fn test_song_form_requires_artist() {
        let form = SongForm {
            title: "Idioteque".to_string(),
            artist_name: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(field_of(form.clean().unwrap_err()), "artist");

        let form = SongForm {
            title: " Idioteque ".to_string(),
            artist_name: Some(" Radiohead ".to_string()),
            album_title: Some("".to_string()),
            ..Default::default()
        }
        .clean()
        .unwrap();
        assert_eq!(form.title, "Idioteque");
        assert_eq!(form.artist_name.as_deref(), Some("Radiohead"));
        assert_eq!(form.album_title, None);
    }

    #[test]
    fn test_song_form_defaults_public() {
        let form: SongForm =
            serde_json::from_str(r#"{"title": "Airbag", "artist_id": 1}"#).unwrap();
        assert!(form.is_public);
        assert!(!form.is_featured);
    }

    #[test]
    fn test_song_update_null_clears() {
        let update: SongUpdate = serde_json::from_str(r#"{"album_id": null}"#).unwrap();
        assert_eq!(update.album_id, Some(None));
        assert_eq!(update.genre_id, None);

        let update: SongUpdate = serde_json::from_str(r#"{"genre_id": 4}"#).unwrap();
        assert_eq!(update.genre_id, Some(Some(4)));
        assert_eq!(update.album_id, None);
    }

    #[test]
    fn test_release_year_bounds() {
        assert!(clean_release_year(Some(1899)).is_err());
        assert!(clean_release_year(Some(1997)).is_ok());
        assert!(clean_release_year(None).is_ok());
    }

    #[test]
    fn test_clean_bio_and_email() {
        assert!(clean_bio(&"b".repeat(500)).is_ok());
        assert_eq!(field_of(clean_bio(&"b".repeat(501)).unwrap_err()), "bio");
        assert_eq!(clean_email(" Thom@Example.com ").unwrap(), "thom@example.com");
        assert!(clean_email("thom").is_err());
        assert!(clean_email("@example.com").is_err());
    }
}

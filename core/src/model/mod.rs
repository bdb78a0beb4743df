pub mod type_enum;

pub mod user;

pub mod album;
pub mod artist;
pub mod genre;
pub mod song;

pub mod playlist;
pub mod playlist_song;

pub mod comment;
pub mod favorite;
pub mod play_history;
pub mod rating;

pub mod display;
pub mod playlists;

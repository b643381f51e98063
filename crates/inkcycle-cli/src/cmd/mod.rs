pub mod config;
pub mod init;
pub mod playlist;
pub mod serve;

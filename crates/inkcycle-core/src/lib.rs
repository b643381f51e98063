pub mod config;
pub mod display;
pub mod error;
pub mod io;
pub mod orchestrator;
pub mod paths;
pub mod playlist;
pub mod provider;
pub mod store;
pub mod types;

pub use error::{InkError, Result};

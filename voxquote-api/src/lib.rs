pub mod config;
pub mod database;
pub mod handlers;
pub mod helpers;
pub mod jobs;
pub mod sync;

pub use database::Database;

pub mod catalog;
pub mod checkpoint;
pub mod config;
pub mod detail;
pub mod driver;
pub mod error;
pub mod export;
mod html;
pub mod images;
pub mod models;
pub mod partition;
pub mod reconcile;
pub mod source;
pub mod utils;

pub mod classifier;
pub mod config;
pub mod discovery;
pub mod error;
pub mod models;
pub mod sleuth;

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod predictor;
pub mod records;
pub mod state;
pub mod store;
